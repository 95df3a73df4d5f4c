//!
//! # Tech21 Internal Utilities Crate
//!

pub mod ser;
pub use ser::*;

pub mod enumstr;
pub use enumstr::*;

pub mod indent;
pub use indent::*;
