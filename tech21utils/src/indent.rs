//!
//! # Writer Indentation Helper
//!
//! Shared by the text-format writers. Tracks a nesting level and its whitespace prefix.
//!

use std::ops::{AddAssign, SubAssign};

/// # Indentation State
#[derive(Debug, Clone)]
pub struct Indent {
    unit: String,
    level: usize,
    state: String,
}
impl Indent {
    /// Create a new [Indent], initially at level 0
    pub fn new(unit: impl Into<String>) -> Self {
        Self {
            unit: unit.into(),
            level: 0,
            state: String::new(),
        }
    }
    /// Current whitespace prefix
    pub fn state(&self) -> &str {
        &self.state
    }
    /// Current nesting level
    pub fn level(&self) -> usize {
        self.level
    }
}
impl AddAssign<usize> for Indent {
    fn add_assign(&mut self, rhs: usize) {
        self.level += rhs;
        self.state = self.unit.repeat(self.level);
    }
}
impl SubAssign<usize> for Indent {
    /// Saturates at level zero
    fn sub_assign(&mut self, rhs: usize) {
        self.level = self.level.saturating_sub(rhs);
        self.state = self.unit.repeat(self.level);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indents() {
        let mut ind = Indent::new("  ");
        assert_eq!(ind.state(), "");
        ind += 2;
        assert_eq!(ind.state(), "    ");
        ind -= 1;
        assert_eq!(ind.state(), "  ");
        ind -= 5;
        assert_eq!(ind.level(), 0);
    }
}
