//! Configuration loading.
//!
//! `greasepack.toml` mirrors the shape of the entry-descriptor overrides:
//! camelCase keys, a `defaultMeta` block shared by every script, and the
//! directory/naming conventions the discovery step uses. A malformed file is
//! fatal to the whole run; metadata is shared context.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;
use crate::meta::MetaDefaults;

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "greasepack.toml";

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct Config {
    /// Directory scanned for `<name>/index.user.{js,ts}` entries.
    pub src_dir: PathBuf,
    pub sources: Sources,
    pub naming: Naming,
    pub dist: Dist,
    pub dev_server: DevServer,
    pub bundler: BundlerConfig,
    pub default_meta: MetaDefaults,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            src_dir: PathBuf::from("src"),
            sources: Sources::default(),
            naming: Naming::default(),
            dist: Dist::default(),
            dev_server: DevServer::default(),
            bundler: BundlerConfig::default(),
            default_meta: MetaDefaults::default(),
        }
    }
}

/// Explicit entry files, bypassing directory discovery when non-empty.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct Sources {
    pub paths: Vec<PathBuf>,
}

/// Naming templates. `{dir}` is the entry's parent directory name, `{stem}`
/// the entry file stem, `{scriptName}` the resolved script name.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct Naming {
    pub script_name: String,
    pub output_name: String,
}

impl Default for Naming {
    fn default() -> Self {
        Self {
            script_name: "{dir}".to_string(),
            output_name: "{scriptName}.user.js".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct Dist {
    pub production: PathBuf,
    pub dev: PathBuf,
}

impl Default for Dist {
    fn default() -> Self {
        Self {
            production: PathBuf::from("dist"),
            dev: PathBuf::from(".dev"),
        }
    }
}

/// Local server the remote-watch mode points update/download locations at.
/// Serving the dev directory is outside this tool.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct DevServer {
    pub port: u16,
}

impl Default for DevServer {
    fn default() -> Self {
        Self { port: 8787 }
    }
}

/// External bundling engine invocation. The engine is opaque: it receives an
/// entry path as final argument and must print the bundled program to stdout.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct BundlerConfig {
    pub command: String,
    pub args: Vec<String>,
}

impl Default for BundlerConfig {
    fn default() -> Self {
        Self {
            command: "esbuild".to_string(),
            args: vec![
                "--bundle".to_string(),
                "--format=esm".to_string(),
                "--charset=utf8".to_string(),
                "--legal-comments=inline".to_string(),
            ],
        }
    }
}

/// Load configuration. An explicit path must exist; without one, a missing
/// `greasepack.toml` simply yields the defaults.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let fallback = PathBuf::from(CONFIG_FILE);
            if !fallback.exists() {
                return Ok(Config::default());
            }
            fallback
        }
    };
    let text = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
        path: path.clone(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path,
        source: Box::new(source),
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use std::io::Write;

    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.src_dir, PathBuf::from("src"));
        assert_eq!(config.dist.dev, PathBuf::from(".dev"));
        assert_eq!(config.bundler.command, "esbuild");
    }

    #[test]
    fn full_file_round_trips() {
        let config: Config = toml::from_str(
            r#"
srcDir = "scripts"

[naming]
scriptName = "{dir}"
outputName = "{scriptName}.user.js"

[dist]
production = "out"
dev = ".cache/dev"

[devServer]
port = 9000

[bundler]
command = "esbuild"
args = ["--bundle", "--format=esm"]

[defaultMeta]
icon = "https://www.google.com/s2/favicons?domain=example.com"
runAt = "document-end"
updateURL = "https://dl.example/{scriptName}.user.js"
match = ["https://example.com/*"]
"#,
        )
        .unwrap();

        assert_eq!(config.src_dir, PathBuf::from("scripts"));
        assert_eq!(config.dist.production, PathBuf::from("out"));
        assert_eq!(config.dev_server.port, 9000);
        assert_eq!(config.default_meta.run_at.as_deref(), Some("document-end"));
        assert_eq!(
            config.default_meta.update_url.as_deref(),
            Some("https://dl.example/{scriptName}.user.js")
        );
        assert_eq!(config.default_meta.matches, vec!["https://example.com/*"]);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(toml::from_str::<Config>("sourceDir = \"src\"\n").is_err());
    }

    #[test]
    fn explicit_missing_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(load(Some(&missing)).is_err());
    }

    #[test]
    fn explicit_path_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("greasepack.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "srcDir = \"entries\"").unwrap();

        let config = load(Some(&path)).unwrap();
        assert_eq!(config.src_dir, PathBuf::from("entries"));
    }
}
