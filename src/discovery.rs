//! Entry discovery.
//!
//! Scans the source directory for the `<name>/index.user.{js,ts}` convention
//! and derives each entry's script and output names. Explicit source paths in
//! the configuration bypass the scan. Results are sorted so a build run is
//! deterministic regardless of directory iteration order.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::config::Config;

/// One buildable entry. `script_name` feeds the metadata resolve context;
/// `output_name` is the file name written under the mode's output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryDescriptor {
    pub input_path: PathBuf,
    pub script_name: String,
    pub output_name: String,
}

const ENTRY_FILE_NAMES: &[&str] = &["index.user.js", "index.user.ts"];

/// Discover all entries for a build run.
pub fn discover_entries(config: &Config) -> Vec<EntryDescriptor> {
    let mut inputs = if config.sources.paths.is_empty() {
        find_entry_files(&config.src_dir)
    } else {
        config.sources.paths.clone()
    };
    inputs.sort();
    inputs.dedup();
    inputs
        .into_iter()
        .map(|path| describe(config, path))
        .collect()
}

/// Entries live exactly one directory below the source root.
fn find_entry_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(2)
        .max_depth(2)
        .follow_links(true)
    {
        if let Ok(entry) = entry {
            let path = entry.path();
            if path.is_file() {
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    if ENTRY_FILE_NAMES.contains(&name) {
                        files.push(path.to_path_buf());
                    }
                }
            }
        }
    }
    files
}

fn describe(config: &Config, input_path: PathBuf) -> EntryDescriptor {
    let dir = input_path
        .parent()
        .and_then(Path::file_name)
        .and_then(|n| n.to_str())
        .unwrap_or("script")
        .to_string();
    let stem = input_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("script")
        .to_string();
    let script_name = config
        .naming
        .script_name
        .replace("{dir}", &dir)
        .replace("{stem}", &stem);
    let output_name = config
        .naming
        .output_name
        .replace("{dir}", &dir)
        .replace("{stem}", &stem)
        .replace("{scriptName}", &script_name);
    EntryDescriptor {
        input_path,
        script_name,
        output_name,
    }
}
