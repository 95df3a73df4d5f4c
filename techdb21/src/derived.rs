//!
//! # Derived Layers
//!
//! Layers computed by boolean expressions over other layers.
//!

use serde::{Deserialize, Serialize};

use crate::error::{TechError, TechResult};
use tech21utils::{enumstr, EnumStr};

enumstr!(
    /// # Derived-Layer Boolean Operators
    /// `not` is the two-operand difference, `a not b`.
    DerivedOp {
        And: "and",
        Or: "or",
        Not: "not",
        Xor: "xor",
    }
);

/// # Derived-Layer Expression Tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayerExpr {
    Layer(String),
    Binary {
        op: DerivedOp,
        lhs: Box<LayerExpr>,
        rhs: Box<LayerExpr>,
    },
}
impl LayerExpr {
    /// Create a two-operand expression over layer names
    pub fn binary(op: DerivedOp, lhs: impl Into<String>, rhs: impl Into<String>) -> Self {
        Self::Binary {
            op,
            lhs: Box::new(Self::Layer(lhs.into())),
            rhs: Box::new(Self::Layer(rhs.into())),
        }
    }
    /// Parse from text such as `M1 and (M2 or M3)`.
    /// Operators are case-insensitive and left-associative, all at equal precedence.
    pub fn parse(txt: &str) -> TechResult<Self> {
        let tokens = tokenize(txt);
        let mut pos = 0;
        let expr = parse_seq(&tokens, &mut pos)?;
        if pos != tokens.len() {
            return Err(TechError::syntax(format!(
                "Unexpected `{}` in derived-layer expression `{}`",
                tokens[pos], txt
            )));
        }
        Ok(expr)
    }
    /// All layer names referenced, left to right
    pub fn layers(&self) -> Vec<&str> {
        match self {
            Self::Layer(name) => vec![name.as_str()],
            Self::Binary { lhs, rhs, .. } => {
                let mut v = lhs.layers();
                v.extend(rhs.layers());
                v
            }
        }
    }
    /// Normalized text. Nested operands are parenthesized.
    pub fn expr_string(&self) -> String {
        match self {
            Self::Layer(name) => name.clone(),
            Self::Binary { op, lhs, rhs } => {
                format!("{} {} {}", lhs.operand_string(), op, rhs.operand_string())
            }
        }
    }
    fn operand_string(&self) -> String {
        match self {
            Self::Layer(name) => name.clone(),
            Self::Binary { .. } => format!("({})", self.expr_string()),
        }
    }
}
impl std::fmt::Display for LayerExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.expr_string())
    }
}

fn tokenize(txt: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut cur = String::new();
    for c in txt.chars() {
        if c == '(' || c == ')' || c.is_whitespace() {
            if !cur.is_empty() {
                tokens.push(std::mem::take(&mut cur));
            }
            if !c.is_whitespace() {
                tokens.push(c.to_string());
            }
        } else {
            cur.push(c);
        }
    }
    if !cur.is_empty() {
        tokens.push(cur);
    }
    tokens
}
fn parse_operand(tokens: &[String], pos: &mut usize) -> TechResult<LayerExpr> {
    let tok = tokens
        .get(*pos)
        .ok_or_else(|| TechError::syntax("Derived-layer expression ends early"))?;
    *pos += 1;
    if tok == "(" {
        let inner = parse_seq(tokens, pos)?;
        match tokens.get(*pos) {
            Some(t) if t == ")" => {
                *pos += 1;
                Ok(inner)
            }
            _ => Err(TechError::syntax("Unbalanced parentheses in derived-layer expression")),
        }
    } else if tok == ")" || DerivedOp::from_str_nocase(tok).is_some() {
        Err(TechError::syntax(format!("Expected layer name, got `{}`", tok)))
    } else {
        Ok(LayerExpr::Layer(tok.clone()))
    }
}
fn parse_seq(tokens: &[String], pos: &mut usize) -> TechResult<LayerExpr> {
    let mut lhs = parse_operand(tokens, pos)?;
    while let Some(tok) = tokens.get(*pos) {
        let op = match DerivedOp::from_str_nocase(tok) {
            Some(op) => op,
            None => break,
        };
        *pos += 1;
        let rhs = parse_operand(tokens, pos)?;
        lhs = LayerExpr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        };
    }
    Ok(lhs)
}

/// # Derived-Layer Definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedLayer {
    pub expr: LayerExpr,
    /// Normalized expression text
    pub expr_string: String,
}
impl DerivedLayer {
    pub fn new(expr: LayerExpr) -> Self {
        let expr_string = expr.expr_string();
        Self { expr, expr_string }
    }
}
