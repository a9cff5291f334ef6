//! Watch-mode triggering.
//!
//! A polling loop keyed on a content digest of the watched sources. Every
//! change reruns the full per-entry pipeline from scratch; there is no
//! incremental caching and no cancellation of an in-flight build. A failed
//! entry leaves its previously emitted file untouched and is retried on the
//! next change.

use std::fs;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::bundle::Bundler;
use crate::config::Config;
use crate::pipeline::{self, BuiltScript, Mode};

const WATCHED_EXTENSIONS: &[&str] = &["js", "ts"];

/// Digest of every watched source file, path and content, in sorted order.
/// Any edit, addition, or removal changes the digest.
pub fn digest_sources(config: &Config) -> String {
    let mut files: Vec<PathBuf> = Vec::new();
    for entry in WalkDir::new(&config.src_dir).follow_links(true) {
        if let Ok(entry) = entry {
            let path = entry.path();
            if path.is_file() {
                if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
                    if WATCHED_EXTENSIONS.contains(&ext) {
                        files.push(path.to_path_buf());
                    }
                }
            }
        }
    }
    files.extend(config.sources.paths.iter().cloned());
    files.sort();
    files.dedup();

    let mut hasher = Sha256::new();
    for file in files {
        hasher.update(file.to_string_lossy().as_bytes());
        if let Ok(content) = fs::read(&file) {
            hasher.update(&content);
        }
    }
    format!("{:x}", hasher.finalize())
}

/// Poll for changes and hand each build's outputs to `sink`. The first poll
/// always builds.
pub fn watch(
    config: &Config,
    mode: Mode,
    bundler: &dyn Bundler,
    poll: Duration,
    mut sink: impl FnMut(&[BuiltScript]),
) -> ! {
    let mut last = String::new();
    loop {
        let digest = digest_sources(config);
        if digest != last {
            last = digest;
            let outputs = pipeline::build(config, mode, bundler);
            sink(&outputs);
        }
        thread::sleep(poll);
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn digest_tracks_content_changes() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(src.join("demo")).unwrap();
        let entry = src.join("demo/index.user.js");
        fs::write(&entry, "defineUserScript({ main: () => {} })\n").unwrap();

        let mut config = Config::default();
        config.src_dir = src;

        let before = digest_sources(&config);
        assert_eq!(before, digest_sources(&config));

        fs::write(&entry, "defineUserScript({ main: () => { go() } })\n").unwrap();
        assert_ne!(before, digest_sources(&config));
    }

    #[test]
    fn digest_ignores_unrelated_files() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(&src).unwrap();

        let mut config = Config::default();
        config.src_dir = src.clone();

        let before = digest_sources(&config);
        fs::write(src.join("notes.md"), "scratch").unwrap();
        assert_eq!(before, digest_sources(&config));
    }
}
