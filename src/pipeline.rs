//! Build orchestration.
//!
//! Drives the per-entry pipeline: bundle, extract, resolve metadata,
//! synthesize the header, reassemble. Every entry is independent, so the
//! whole set runs as parallel tasks and joins at the end; a failed entry is
//! reported with its input path and never disturbs its siblings.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::assemble;
use crate::bundle::Bundler;
use crate::config::Config;
use crate::discovery::{self, EntryDescriptor};
use crate::error::EntryError;
use crate::extract;
use crate::header;
use crate::meta::{self, MetaRecord};

/// Build mode. Content is mode-independent except through metadata: mode
/// selects the output directory and which computed fields are active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Production,
    WatchLocal,
    WatchRemote,
}

impl Mode {
    pub fn out_dir(self, config: &Config) -> &Path {
        match self {
            Mode::Production => &config.dist.production,
            Mode::WatchLocal | Mode::WatchRemote => &config.dist.dev,
        }
    }
}

/// One successfully built script, not yet written anywhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltScript {
    pub path: PathBuf,
    pub content: String,
}

/// Run the whole pipeline once. Returns a record per successful entry;
/// failed entries are logged and yield nothing.
pub fn build(config: &Config, mode: Mode, bundler: &dyn Bundler) -> Vec<BuiltScript> {
    let entries = discovery::discover_entries(config);
    report_collisions(&entries);

    let out_dir = mode.out_dir(config);
    entries
        .par_iter()
        .filter_map(|entry| match build_entry(config, mode, bundler, entry) {
            Ok(content) => Some(BuiltScript {
                path: out_dir.join(&entry.output_name),
                content,
            }),
            Err(err) => {
                log::warn!("{}: {}", entry.input_path.display(), err);
                None
            }
        })
        .collect()
}

fn build_entry(
    config: &Config,
    mode: Mode,
    bundler: &dyn Bundler,
    entry: &EntryDescriptor,
) -> Result<String, EntryError> {
    let bundled = bundler.bundle(&entry.input_path)?;
    let extracted = extract::extract(&bundled)?;
    let mut record = meta::resolve(
        &config.default_meta,
        &extracted.overrides,
        &entry.script_name,
    )?;
    apply_mode(&mut record, mode, config, entry);
    let head = header::synthesize(&record)?;
    Ok(assemble::assemble(&head, &extracted))
}

/// Remote watch substitutes the update/download locations with the local dev
/// server so the userscript manager pulls rebuilt scripts; local watch
/// deactivates them entirely.
fn apply_mode(record: &mut MetaRecord, mode: Mode, config: &Config, entry: &EntryDescriptor) {
    match mode {
        Mode::Production => {}
        Mode::WatchLocal => {
            record.update_url = None;
            record.download_url = None;
        }
        Mode::WatchRemote => {
            let local = format!(
                "http://127.0.0.1:{}/{}",
                config.dev_server.port, entry.output_name
            );
            record.update_url = Some(local.clone());
            record.download_url = Some(local);
        }
    }
}

/// Two entries resolving to the same output name is a configuration error:
/// the last writer wins, surfaced here rather than silently tolerated.
fn report_collisions(entries: &[EntryDescriptor]) {
    let mut by_output: HashMap<&str, Vec<&EntryDescriptor>> = HashMap::new();
    for entry in entries {
        by_output
            .entry(entry.output_name.as_str())
            .or_default()
            .push(entry);
    }
    let mut colliding: Vec<_> = by_output
        .into_iter()
        .filter(|(_, group)| group.len() > 1)
        .collect();
    colliding.sort_by_key(|(name, _)| *name);
    for (name, group) in colliding {
        let inputs = group
            .iter()
            .map(|e| e.input_path.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        log::warn!("output name collision: `{name}` is produced by {inputs}; the last write wins");
    }
}
