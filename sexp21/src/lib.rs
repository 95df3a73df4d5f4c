//!
//! # Sexp21
//!
//! Reader and evaluator for the parenthesized (SKILL-style) dialect of technology files.
//!
//! * [read] tokenizes and parses text into [Node] trees
//! * [Environment] evaluates them, dispatching each named form to a registered [Handler]
//! * [Arena] holds the nodes created while evaluating, recycled per top-level form
//!
//! Vendor grammars are sets of handlers registered into an [Environment].
//!

pub mod arena;
pub mod env;
pub mod error;
pub mod node;
pub mod read;

pub use arena::{Arena, ArenaMark, NodeKey};
pub use env::*;
pub use error::*;
pub use node::*;
pub use read::{parse_file, parse_number, parse_str, ParserState, SexpParser};

#[cfg(test)]
mod tests;
