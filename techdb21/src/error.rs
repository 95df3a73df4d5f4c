//!
//! # Technology Database Error Type
//!

/// # Technology Error Enumeration
#[derive(Debug)]
pub enum TechError {
    /// Syntax errors in a technology source, with optional file and line context
    Syntax {
        file: Option<String>,
        line: Option<usize>,
        msg: String,
    },
    /// File I/O errors, with the offending path
    Io {
        path: String,
        err: std::io::Error,
    },
    /// Wrapped errors, generally from other crates
    Boxed(Box<dyn std::error::Error>),
    /// String message-valued errors
    Str(String),
    /// Several independent failures from one operation, e.g. writing a set of output files
    Aggregate(Vec<TechError>),
}
impl TechError {
    /// Create a [TechError::Syntax] without location
    pub fn syntax(msg: impl Into<String>) -> Self {
        Self::Syntax {
            file: None,
            line: None,
            msg: msg.into(),
        }
    }
    /// Create a [TechError::Io], attaching `path`
    pub fn io(path: impl AsRef<std::path::Path>, err: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().display().to_string(),
            err,
        }
    }
    /// Return failure with a string message
    pub fn fail<T>(msg: impl Into<String>) -> TechResult<T> {
        Err(Self::Str(msg.into()))
    }
    /// Collapse a list of errors: none is success, one is itself, more are an [TechError::Aggregate]
    pub fn aggregate(mut errs: Vec<TechError>) -> TechResult<()> {
        match errs.len() {
            0 => Ok(()),
            1 => Err(errs.remove(0)),
            _ => Err(Self::Aggregate(errs)),
        }
    }
}
impl From<std::io::Error> for TechError {
    fn from(e: std::io::Error) -> Self {
        Self::Boxed(Box::new(e))
    }
}
impl From<rust_decimal::Error> for TechError {
    fn from(e: rust_decimal::Error) -> Self {
        Self::Boxed(Box::new(e))
    }
}
impl From<tech21utils::ser::Error> for TechError {
    fn from(e: tech21utils::ser::Error) -> Self {
        Self::Boxed(Box::new(e))
    }
}
impl From<String> for TechError {
    /// Convert string-based errors by wrapping them
    fn from(e: String) -> Self {
        Self::Str(e)
    }
}
impl From<&str> for TechError {
    /// Convert string-based errors by wrapping them
    fn from(e: &str) -> Self {
        Self::Str(e.into())
    }
}
impl std::fmt::Display for TechError {
    /// Delegates to the [Debug] implementation
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        std::fmt::Debug::fmt(self, f)
    }
}
impl std::error::Error for TechError {}

/// Tech21 Library-Wide Result Type
pub type TechResult<T> = Result<T, TechError>;
