use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;

use greasepack::bundle::CommandBundler;
use greasepack::pipeline::{self, BuiltScript, Mode};
use greasepack::{config, watch};

#[derive(Parser)]
#[command(
    name = "greasepack",
    version,
    about = "Bundle userscript entry modules into distributable single-file scripts"
)]
struct Cli {
    /// Rebuild on source changes instead of exiting after one build
    #[arg(long)]
    watch: bool,
    /// With --watch, point update/download locations at the local dev server
    #[arg(long, requires = "watch")]
    remote: bool,
    /// Configuration file (default: greasepack.toml when present)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Poll interval for watch mode, in milliseconds
    #[arg(long, default_value_t = 300, value_name = "MS")]
    poll: u64,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let config = config::load(cli.config.as_deref())?;
    let bundler = CommandBundler::from_config(&config.bundler);
    let mode = match (cli.watch, cli.remote) {
        (false, _) => Mode::Production,
        (true, false) => Mode::WatchLocal,
        (true, true) => Mode::WatchRemote,
    };

    if cli.watch {
        log::info!(
            "watching {} (poll {}ms)",
            config.src_dir.display(),
            cli.poll
        );
        watch::watch(
            &config,
            mode,
            &bundler,
            Duration::from_millis(cli.poll),
            |outputs| {
                if let Err(err) = write_outputs(outputs) {
                    log::error!("{err:#}");
                }
            },
        );
    }

    let outputs = pipeline::build(&config, mode, &bundler);
    write_outputs(&outputs)?;
    log::info!("built {} script(s)", outputs.len());
    Ok(())
}

fn write_outputs(outputs: &[BuiltScript]) -> anyhow::Result<()> {
    for output in outputs {
        if let Some(parent) = output.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        fs::write(&output.path, &output.content)
            .with_context(|| format!("failed to write {}", output.path.display()))?;
        log::info!("wrote {}", output.path.display());
    }
    Ok(())
}
