//!
//! # Techdsl21
//!
//! Reader for the line-oriented technology keyword language.
//!
//! Each logical line (continued with a trailing `\`) passes through
//! the preprocessor ([preproc]), `$(name)` substitution ([vars]) and inline `eval(...)` splicing ([eval]),
//! before its leading keyword is dispatched: first to the technology preamble and layer blocks ([layer]),
//! then to the registered [KeywordDispatch] extensions ([ext]).
//!
//! Like the Cadence readers, lines with problems are logged to the database's diagnostics and skipped.
//! Preprocessor structure errors and I/O failures abort the read.
//!

// Std-Lib
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

// Crates.io
use derive_builder::Builder;

// Workspace
pub use techdb21::{TechDb, TechError, TechResult};

pub mod eval;
pub mod ext;
pub mod layer;
pub mod pmap;
pub mod preproc;
pub mod reader;
pub mod vars;

pub use ext::{DrcKeywords, ScriptBlocks, StdViaKeywords};
pub use pmap::{get_filled, get_pmap};
pub use reader::{DslReader, DslSession, KeywordDispatch};
pub use vars::TechVars;

/// # Line Dispatch Status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineStatus {
    /// Recognized and applied
    Matched,
    /// Not recognized by this dispatcher
    NoMatch,
    /// Recognized, but could not be applied
    Error(String),
}
impl LineStatus {
    pub fn error(msg: impl Into<String>) -> Self {
        Self::Error(msg.into())
    }
    pub fn is_match(&self) -> bool {
        matches!(self, Self::Matched)
    }
}
impl<E: std::fmt::Display> From<Result<(), E>> for LineStatus {
    fn from(r: Result<(), E>) -> Self {
        match r {
            Ok(()) => Self::Matched,
            Err(e) => Self::Error(e.to_string()),
        }
    }
}

/// # Keyword-Language Options
#[derive(Debug, Clone, Builder)]
#[builder(pattern = "owned", setter(into))]
pub struct DslOptions {
    /// Keywords whose arguments are never `eval`-spliced, lower-cased
    #[builder(default = "default_verbatim()")]
    pub verbatim: BTreeSet<String>,
    /// Fall back to the process environment for `$(name)` substitutions
    #[builder(default = "true")]
    pub use_env: bool,
    /// Log each dispatched line
    #[builder(default)]
    pub verbose: bool,
    /// Abort on the first line that cannot be applied
    #[builder(default)]
    pub stop_on_error: bool,
    /// Directories searched by `#include`
    #[builder(default)]
    pub search_path: Vec<PathBuf>,
}
impl DslOptions {
    /// Boolean indication of whether `keyword`'s arguments are kept verbatim
    pub fn is_verbatim(&self, keyword: &str) -> bool {
        self.verbatim.contains(&keyword.to_ascii_lowercase())
    }
}
impl Default for DslOptions {
    fn default() -> Self {
        Self {
            verbatim: default_verbatim(),
            use_env: true,
            verbose: false,
            stop_on_error: false,
            search_path: Vec::new(),
        }
    }
}
fn default_verbatim() -> BTreeSet<String> {
    ["description"].iter().map(|s| s.to_string()).collect()
}

/// Read keyword-language file `path` into `db`, with the built-in extensions
pub fn read_dsl(db: &mut TechDb, path: impl AsRef<Path>, opts: &DslOptions) -> TechResult<()> {
    let mut reader = DslReader::new(std::mem::take(db), opts.clone());
    let rv = reader.read_file(path);
    *db = reader.into_db();
    rv
}
/// Read keyword-language content `src` into `db`, with the built-in extensions
pub fn read_dsl_str(db: &mut TechDb, src: &str, opts: &DslOptions) -> TechResult<()> {
    let mut reader = DslReader::new(std::mem::take(db), opts.clone());
    let rv = reader.read_str(src);
    *db = reader.into_db();
    rv
}

#[cfg(test)]
mod tests;
