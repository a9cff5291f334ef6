//! # greasepack
//!
//! Turns a project of independently bundled entry modules into distributable
//! userscripts: single-file browser scripts carrying the structured
//! `==UserScript==` header a userscript manager consumes.
//!
//! ## Pipeline invariants
//!
//! 1. **One entry call**: a bundled program contains exactly one
//!    `defineUserScript({ ..., main })` call in its top-level scope. Zero or
//!    several is ambiguous input and aborts that entry.
//!
//! 2. **Form families survive**: `main` may be an arrow function, a function
//!    expression, or a method shorthand. The rewritten invocation stays in
//!    the source's form family and the body is carried byte-for-byte, so the
//!    emitted script diffs minimally against what the author wrote.
//!
//! 3. **Passthrough is verbatim**: every statement outside the entry call,
//!    including the bundler's module-boundary comments and all indentation,
//!    passes through untouched. Only the entry-descriptor call is rewritten.
//!
//! 4. **Hoisting is textual**: a declaration marked `// @preserve
//!    scriptConfig` moves verbatim to the top of the output, right under the
//!    header, where end users can edit it.
//!
//! 5. **Determinism**: identical source and metadata produce byte-identical
//!    output, header field order included. Timestamps and generated
//!    identifiers never enter program text.
//!
//! Entries are independent: the orchestrator fans them out in parallel and a
//! failure in one never disturbs another. Configuration errors, by contrast,
//! halt the run before any entry is built.

pub mod assemble;
pub mod bundle;
pub mod config;
pub mod discovery;
pub mod error;
pub mod extract;
pub mod header;
pub mod meta;
pub mod pipeline;
pub mod watch;

pub use assemble::assemble;
pub use bundle::{Bundler, CommandBundler};
pub use config::Config;
pub use discovery::EntryDescriptor;
pub use extract::{extract, ConfigBlock, ExtractedProgram, MainForm, MainProcedure};
pub use header::synthesize;
pub use meta::{resolve, MetaDefaults, MetaRecord, MetaValue};
pub use pipeline::{build, BuiltScript, Mode};
