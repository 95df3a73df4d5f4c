//!
//! # S-Expression Nodes & Values
//!

// Crates.io
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// Workspace
use tech21utils::Indent;

/// # S-Expression Node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Node {
    /// Named `name(...)` or unnamed `(...)` list
    List {
        name: Option<String>,
        args: Vec<Node>,
    },
    Identifier(String),
    Number(Decimal),
    /// Infix operator, e.g. `lhs = value`
    Operator {
        op: String,
        lhs: Box<Node>,
        args: Vec<Node>,
    },
    QuotedString(String),
}
impl Node {
    /// The empty, unnamed list. Stands for an absent value.
    pub fn nil() -> Self {
        Self::List {
            name: None,
            args: Vec::new(),
        }
    }
    /// Boolean indication of the nil list
    pub fn is_nil(&self) -> bool {
        matches!(self, Self::List { name: None, args } if args.is_empty())
    }
    /// Create a named list
    pub fn named(name: impl Into<String>, args: Vec<Node>) -> Self {
        Self::List {
            name: Some(name.into()),
            args,
        }
    }
    /// Create an unnamed list
    pub fn unnamed(args: Vec<Node>) -> Self {
        Self::List { name: None, args }
    }
    pub fn ident(s: impl Into<String>) -> Self {
        Self::Identifier(s.into())
    }
    pub fn string(s: impl Into<String>) -> Self {
        Self::QuotedString(s.into())
    }
    /// Name of a named list
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::List { name: Some(n), .. } => Some(n),
            _ => None,
        }
    }
    /// List elements, or operator right-hand side. Empty for atoms.
    pub fn args(&self) -> &[Node] {
        match self {
            Self::List { args, .. } | Self::Operator { args, .. } => args,
            _ => &[],
        }
    }
    pub fn is_list(&self) -> bool {
        matches!(self, Self::List { .. })
    }
    /// Text of an identifier or quoted string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Identifier(s) | Self::QuotedString(s) => Some(s),
            _ => None,
        }
    }
    pub fn as_number(&self) -> Option<Decimal> {
        match self {
            Self::Number(d) => Some(*d),
            _ => None,
        }
    }
    /// Multi-line rendering, breaking lists that do not fit in `width` characters
    pub fn pretty(&self, width: usize) -> String {
        let mut out = String::new();
        let mut indent = Indent::new("  ");
        self.pretty_into(&mut out, &mut indent, width);
        out
    }
    fn pretty_into(&self, out: &mut String, indent: &mut Indent, width: usize) {
        let flat = self.to_string();
        if flat.len() + indent.state().len() <= width || self.args().is_empty() || !self.is_list() {
            out.push_str(&flat);
            return;
        }
        if let Some(n) = self.name() {
            out.push_str(n);
        }
        out.push('(');
        *indent += 1;
        for arg in self.args() {
            out.push('\n');
            out.push_str(indent.state());
            arg.pretty_into(out, indent, width);
        }
        *indent -= 1;
        out.push('\n');
        out.push_str(indent.state());
        out.push(')');
    }
}
impl std::fmt::Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::List { name, args } => {
                if let Some(n) = name {
                    write!(f, "{}", n)?;
                } else if args.is_empty() {
                    return write!(f, "nil");
                }
                write!(f, "(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
            Self::Identifier(s) => write!(f, "{}", s),
            Self::Number(d) => write!(f, "{}", d),
            Self::Operator { op, lhs, args } => {
                write!(f, "{} {}", lhs, op)?;
                for arg in args {
                    write!(f, " {}", arg)?;
                }
                Ok(())
            }
            Self::QuotedString(s) => write!(f, "\"{}\"", escape(s)),
        }
    }
}

/// Escape string-literal content for output
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out
}

/// # Evaluated Value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    True,
    Number(Decimal),
    Str(String),
    /// Identifier with no binding, taken literally
    Symbol(String),
    List(Vec<Value>),
    /// Named form with no value-function, left unevaluated
    Form(Node),
}
impl Value {
    pub fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }
    /// Text of a string or symbol
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) | Self::Symbol(s) => Some(s),
            _ => None,
        }
    }
    pub fn as_number(&self) -> Option<Decimal> {
        match self {
            Self::Number(d) => Some(*d),
            _ => None,
        }
    }
    /// Integer value, for numbers without fractional part
    pub fn as_int(&self) -> Option<i64> {
        use rust_decimal::prelude::ToPrimitive;
        match self {
            Self::Number(d) if d.fract().is_zero() => d.to_i64(),
            _ => None,
        }
    }
    /// Truthiness: `nil` is false, `t` true, numbers true when non-zero
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Nil => Some(false),
            Self::True => Some(true),
            Self::Number(d) => Some(!d.is_zero()),
            Self::Symbol(s) if s == "nil" => Some(false),
            Self::Symbol(s) if s == "t" => Some(true),
            _ => None,
        }
    }
    /// List elements. Nil is the empty list.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(v) => Some(v),
            Self::Nil => Some(&[]),
            _ => None,
        }
    }
}
impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Nil => write!(f, "nil"),
            Self::True => write!(f, "t"),
            Self::Number(d) => write!(f, "{}", d),
            Self::Str(s) => write!(f, "\"{}\"", escape(s)),
            Self::Symbol(s) => write!(f, "{}", s),
            Self::List(v) => {
                write!(f, "(")?;
                for (i, val) in v.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", val)?;
                }
                write!(f, ")")
            }
            Self::Form(n) => write!(f, "{}", n),
        }
    }
}
