//!
//! # S-Expression Error Type
//!

use crate::read::ParserState;

/// # S-Expression Error Enumeration
#[derive(Debug)]
pub enum SexpError {
    /// Lexer Errors
    Lex {
        next_char: Option<char>,
        line: usize,
        pos: usize,
    },
    /// Parser Errors
    Parse { msg: String, state: ParserState },
    /// Evaluation Errors, at the line of the form being evaluated
    Eval { msg: String, line: usize },
    /// Wrapped errors, generally from other crates
    Boxed(Box<dyn std::error::Error>),
    /// String message-valued errors
    Str(String),
}
impl SexpError {
    /// Boolean indication of a syntax (lex or parse) error
    pub fn is_syntax(&self) -> bool {
        matches!(self, Self::Lex { .. } | Self::Parse { .. })
    }
    /// Source line, where known
    pub fn line(&self) -> Option<usize> {
        match self {
            Self::Lex { line, .. } | Self::Eval { line, .. } => Some(*line),
            Self::Parse { state, .. } => Some(state.line_num),
            _ => None,
        }
    }
}
impl From<std::io::Error> for SexpError {
    fn from(e: std::io::Error) -> Self {
        Self::Boxed(Box::new(e))
    }
}
impl From<rust_decimal::Error> for SexpError {
    fn from(e: rust_decimal::Error) -> Self {
        Self::Boxed(Box::new(e))
    }
}
impl From<String> for SexpError {
    /// Convert string-based errors by wrapping them
    fn from(e: String) -> Self {
        Self::Str(e)
    }
}
impl From<&str> for SexpError {
    /// Convert string-based errors by wrapping them
    fn from(e: &str) -> Self {
        Self::Str(e.into())
    }
}
impl std::fmt::Display for SexpError {
    /// Delegates to the [Debug] implementation
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        std::fmt::Debug::fmt(self, f)
    }
}
impl std::error::Error for SexpError {}

/// Sexp21 Library-Wide Result Type
pub type SexpResult<T> = Result<T, SexpError>;
