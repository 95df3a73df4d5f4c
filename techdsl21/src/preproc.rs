//!
//! # Line Preprocessor
//!
//! `#define`, `#undef`, `#ifdef`, `#ifndef`, `#else`, `#endif` and `#include` directives,
//! and whole-word macro expansion.
//! Other lines starting with `#` are comments.
//!

// Std-Lib
use std::collections::BTreeMap;

// Crates.io
use tech21utils::{enumstr, EnumStr};

enumstr!(
    /// # Preprocessor Directives
    DirectiveKind {
        Define: "#define",
        Undef: "#undef",
        Ifdef: "#ifdef",
        Ifndef: "#ifndef",
        Else: "#else",
        Endif: "#endif",
        Include: "#include",
    }
);
impl DirectiveKind {
    /// Boolean indication of whether this directive needs multi-line input
    pub fn is_block(&self) -> bool {
        !matches!(self, Self::Define | Self::Undef)
    }
}

/// # Parsed Directive Line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive<'a> {
    pub kind: DirectiveKind,
    /// Remaining text, trimmed
    pub args: &'a str,
}
impl<'a> Directive<'a> {
    /// Parse `line`, which starts with `#`.
    /// Returns `None` for comment lines.
    pub fn parse(line: &'a str) -> Option<Self> {
        let line = line.trim();
        let (first, args) = match line.split_once(char::is_whitespace) {
            Some((first, args)) => (first, args.trim()),
            None => (line, ""),
        };
        let kind = DirectiveKind::from_str_nocase(first)?;
        Some(Self { kind, args })
    }
}

/// Conditional-block state
#[derive(Debug, Clone)]
struct Cond {
    /// Whether the enclosing block is active
    parent: bool,
    /// Whether the condition held
    taken: bool,
    in_else: bool,
}

/// # Preprocessor State
#[derive(Debug, Clone, Default)]
pub struct Preproc {
    macros: BTreeMap<String, String>,
    conds: Vec<Cond>,
}
impl Preproc {
    /// Boolean indication of whether lines are currently kept
    pub fn active(&self) -> bool {
        match self.conds.last() {
            None => true,
            Some(c) => c.parent && (c.taken != c.in_else),
        }
    }
    /// Nesting depth of open conditional blocks
    pub fn depth(&self) -> usize {
        self.conds.len()
    }
    pub fn is_defined(&self, name: &str) -> bool {
        self.macros.contains_key(name)
    }
    pub fn define(&mut self, name: impl Into<String>, val: impl Into<String>) {
        self.macros.insert(name.into(), val.into());
    }
    /// Apply a non-include directive
    pub fn apply(&mut self, dir: &Directive) -> Result<(), String> {
        let active = self.active();
        match dir.kind {
            DirectiveKind::Define if active => {
                let (name, val) = match dir.args.split_once(char::is_whitespace) {
                    Some((name, val)) => (name, val.trim()),
                    None => (dir.args, ""),
                };
                if name.is_empty() {
                    return Err("#define requires a name".into());
                }
                self.define(name, val);
            }
            DirectiveKind::Undef if active => {
                self.macros.remove(dir.args);
            }
            DirectiveKind::Define | DirectiveKind::Undef => (),
            DirectiveKind::Ifdef | DirectiveKind::Ifndef => {
                if dir.args.is_empty() {
                    return Err(format!("{} requires a name", dir.kind));
                }
                let defined = self.is_defined(dir.args);
                self.conds.push(Cond {
                    parent: active,
                    taken: defined == (dir.kind == DirectiveKind::Ifdef),
                    in_else: false,
                });
            }
            DirectiveKind::Else => match self.conds.last_mut() {
                Some(c) if !c.in_else => c.in_else = true,
                Some(_) => return Err("Duplicate #else".into()),
                None => return Err("#else without #ifdef".into()),
            },
            DirectiveKind::Endif => {
                if self.conds.pop().is_none() {
                    return Err("#endif without #ifdef".into());
                }
            }
            DirectiveKind::Include => return Err("#include is applied by the reader".into()),
        }
        Ok(())
    }
    /// Close conditional blocks opened beyond `depth`, reporting whether any were open
    pub fn unwind(&mut self, depth: usize) -> bool {
        let open = self.conds.len() > depth;
        self.conds.truncate(depth);
        open
    }
    /// Replace each whole-word macro name in `text` with its value
    pub fn expand(&self, text: &str) -> String {
        if self.macros.is_empty() {
            return text.to_string();
        }
        let mut out = String::with_capacity(text.len());
        let mut word = String::new();
        for c in text.chars() {
            if c.is_ascii_alphanumeric() || c == '_' {
                word.push(c);
                continue;
            }
            self.flush(&mut word, &mut out);
            out.push(c);
        }
        self.flush(&mut word, &mut out);
        out
    }
    fn flush(&self, word: &mut String, out: &mut String) {
        match self.macros.get(word.as_str()) {
            Some(val) => out.push_str(val),
            None => out.push_str(word),
        }
        word.clear();
    }
}
