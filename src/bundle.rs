//! Bundling-engine seam.
//!
//! The module bundler is an external collaborator: given an entry path it
//! produces one bundled program text, and nothing else about it is observed.
//! The default engine is esbuild invoked as a subprocess, configured the way
//! the watch and production builds both need it (single ESM output on stdout,
//! inline legal comments so the preservation marker survives bundling).

use std::path::Path;
use std::process::Command;

use crate::config::BundlerConfig;
use crate::error::BundleError;

/// Opaque bundling engine: source text in, one bundled program text out.
pub trait Bundler: Sync {
    fn bundle(&self, entry: &Path) -> Result<String, BundleError>;
}

/// Runs an external bundler command with the entry path appended as the
/// final argument, capturing the bundled program from stdout.
#[derive(Debug, Clone)]
pub struct CommandBundler {
    command: String,
    args: Vec<String>,
}

impl CommandBundler {
    pub fn from_config(config: &BundlerConfig) -> Self {
        Self {
            command: config.command.clone(),
            args: config.args.clone(),
        }
    }
}

impl Bundler for CommandBundler {
    fn bundle(&self, entry: &Path) -> Result<String, BundleError> {
        let output = Command::new(&self.command)
            .args(&self.args)
            .arg(entry)
            .output()
            .map_err(|source| BundleError::Spawn {
                command: self.command.clone(),
                source,
            })?;
        if !output.status.success() {
            return Err(BundleError::Failed {
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn captures_stdout_of_the_command() {
        let dir = tempfile::tempdir().unwrap();
        let entry = dir.path().join("index.user.js");
        let mut file = std::fs::File::create(&entry).unwrap();
        write!(file, "defineUserScript({{ main: () => {{}} }})").unwrap();

        let bundler = CommandBundler {
            command: "cat".to_string(),
            args: vec![],
        };
        let bundled = bundler.bundle(&entry).unwrap();
        assert_eq!(bundled, "defineUserScript({ main: () => {} })");
    }

    #[test]
    fn nonzero_exit_is_a_failure() {
        let bundler = CommandBundler {
            command: "false".to_string(),
            args: vec![],
        };
        assert!(matches!(
            bundler.bundle(Path::new("whatever.js")),
            Err(BundleError::Failed { .. })
        ));
    }

    #[test]
    fn missing_command_is_a_spawn_error() {
        let bundler = CommandBundler {
            command: "greasepack-no-such-bundler".to_string(),
            args: vec![],
        };
        assert!(matches!(
            bundler.bundle(Path::new("whatever.js")),
            Err(BundleError::Spawn { .. })
        ));
    }
}
