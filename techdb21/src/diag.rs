//!
//! # Diagnostics Log
//!
//! Structured, non-fatal warnings collected during a read.
//! Each entry is also forwarded to the `log` facade as it is recorded.
//!

use serde::{Deserialize, Serialize};
use tech21utils::enumstr;

enumstr!(
    /// # Diagnostic Categories
    DiagCategory {
        Syntax: "syntax",
        Malformed: "malformed",
        Unresolved: "unresolved",
        UnknownKeyword: "unknown",
        Validation: "validation",
        Unsupported: "unsupported",
        Io: "io",
        Internal: "internal",
    }
);

/// # Diagnostic Entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub category: DiagCategory,
    pub message: String,
    /// Source file, if known
    pub file: Option<String>,
    /// One-based source line, if known
    pub line: Option<usize>,
}
impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.file, self.line) {
            (Some(file), Some(line)) => write!(f, "{}:{}: ", file, line)?,
            (None, Some(line)) => write!(f, "line {}: ", line)?,
            (Some(file), None) => write!(f, "{}: ", file)?,
            (None, None) => (),
        }
        write!(f, "[{}] {}", self.category, self.message)
    }
}

/// # Diagnostics Log
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}
impl Diagnostics {
    /// Record a warning without source location
    pub fn warn(&mut self, category: DiagCategory, message: impl Into<String>) {
        self.push(Diagnostic {
            category,
            message: message.into(),
            file: None,
            line: None,
        })
    }
    /// Record a warning at `file`:`line`
    pub fn warn_at(
        &mut self,
        category: DiagCategory,
        file: Option<&str>,
        line: Option<usize>,
        message: impl Into<String>,
    ) {
        self.push(Diagnostic {
            category,
            message: message.into(),
            file: file.map(String::from),
            line,
        })
    }
    fn push(&mut self, diag: Diagnostic) {
        log::warn!("{}", diag);
        self.entries.push(diag);
    }
    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }
    /// Number of entries in `category`
    pub fn count(&self, category: DiagCategory) -> usize {
        self.entries.iter().filter(|d| d.category == category).count()
    }
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
    pub fn len(&self) -> usize {
        self.entries.len()
    }
    /// Remove and return all entries
    pub fn take(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.entries)
    }
}
