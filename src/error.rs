//! Error types for the build pipeline.
//!
//! Two failure scopes exist: configuration errors abort the whole run before
//! any entry is built, everything else aborts a single entry and leaves its
//! siblings alone.

use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

/// Malformed or unreadable configuration. Fatal to the run.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: Box<toml::de::Error>,
    },
}

/// The external bundling engine failed to produce a program.
#[derive(Debug, Error)]
pub enum BundleError {
    #[error("failed to run bundler `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("bundler exited with {status}: {stderr}")]
    Failed { status: ExitStatus, stderr: String },
}

/// Extraction of the entry-descriptor call from a bundled program failed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error("bundled program failed to parse: {0}")]
    Parse(String),
    #[error("no defineUserScript call found")]
    MissingEntryCall,
    #[error("{0} defineUserScript calls found, expected exactly one")]
    MultipleEntryCalls(usize),
    #[error("multiple declarations carry the preservation marker")]
    MultipleConfigBlocks,
    #[error("unsupported `main` value: expected an arrow function, a function expression, or a method")]
    UnsupportedMain,
    #[error("metadata field `{0}` is not a static literal")]
    UnsupportedMetaValue(String),
}

/// A metadata field could not be resolved.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MetaError {
    #[error("metadata field `{field}`: {reason}")]
    Field { field: String, reason: String },
}

/// A resolved metadata value cannot be framed as a header line.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HeaderError {
    #[error("header field `{0}` contains a line break")]
    MultilineValue(String),
}

/// Any failure that aborts one entry's build. Caught at the orchestrator
/// boundary and reported with the offending input path.
#[derive(Debug, Error)]
pub enum EntryError {
    #[error(transparent)]
    Bundle(#[from] BundleError),
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error(transparent)]
    Meta(#[from] MetaError),
    #[error(transparent)]
    Header(#[from] HeaderError),
}
