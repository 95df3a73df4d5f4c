//!
//! # Inline Expressions
//!
//! `eval(...)` calls within a line are evaluated in `f64` and replaced by their values.
//! Expressions support `+ - * /`, parentheses, unary minus, and the functions
//! `sqrt`, `abs`, `min`, `max`, `floor`, `ceil` and `round`.
//!

const EVAL: &str = "eval(";

/// Replace each `eval(...)` in `text` with its value, last occurrence first
pub fn splice(text: &str) -> Result<String, String> {
    let mut text = text.to_string();
    while let Some(start) = find_call(&text) {
        let open = start + EVAL.len();
        let close = matching_paren(&text, open)
            .ok_or_else(|| format!("Unbalanced parentheses in `{}`", &text[start..]))?;
        let val = evaluate(&text[open..close])?;
        text.replace_range(start..close + 1, &format_value(val));
    }
    Ok(text)
}

/// Start of the last `eval(` not embedded in a longer identifier
fn find_call(text: &str) -> Option<usize> {
    let mut end = text.len();
    while let Some(idx) = text[..end].rfind(EVAL) {
        let embedded = text[..idx]
            .chars()
            .last()
            .map(|c| c.is_ascii_alphanumeric() || c == '_')
            .unwrap_or(false);
        if !embedded {
            return Some(idx);
        }
        end = idx;
    }
    None
}

/// Index of the `)` closing the paren opened just before `open`
fn matching_paren(text: &str, open: usize) -> Option<usize> {
    let mut depth = 1;
    for (idx, c) in text[open..].char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + idx);
                }
            }
            _ => (),
        }
    }
    None
}

/// Format with up to nine decimals, without trailing zeros
pub fn format_value(val: f64) -> String {
    let txt = format!("{:.9}", val);
    let txt = txt.trim_end_matches('0').trim_end_matches('.');
    match txt {
        "-0" | "" => "0".into(),
        t => t.into(),
    }
}

/// Evaluate arithmetic expression `expr`
pub fn evaluate(expr: &str) -> Result<f64, String> {
    let tokens = tokenize(expr)?;
    let mut parser = ExprParser { tokens, pos: 0 };
    let val = parser.sum()?;
    if let Some(tok) = parser.tokens.get(parser.pos) {
        return Err(format!("Unexpected `{}` in `{}`", tok, expr));
    }
    if !val.is_finite() {
        return Err(format!("`{}` has no finite value", expr));
    }
    Ok(val)
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Num(f64),
    Ident(String),
    Op(char),
}
impl std::fmt::Display for Tok {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tok::Num(n) => write!(f, "{}", n),
            Tok::Ident(s) => write!(f, "{}", s),
            Tok::Op(c) => write!(f, "{}", c),
        }
    }
}

fn tokenize(expr: &str) -> Result<Vec<Tok>, String> {
    let chars: Vec<char> = expr.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c.is_ascii_digit() || c == '.' {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            // Exponent, only when followed by digits
            if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                let mut j = i + 1;
                if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
                    j += 1;
                }
                if j < chars.len() && chars[j].is_ascii_digit() {
                    i = j;
                    while i < chars.len() && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                }
            }
            let txt: String = chars[start..i].iter().collect();
            let num = txt
                .parse::<f64>()
                .map_err(|_| format!("Invalid number `{}`", txt))?;
            tokens.push(Tok::Num(num));
        } else if c.is_ascii_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            tokens.push(Tok::Ident(chars[start..i].iter().collect()));
        } else if "+-*/(),".contains(c) {
            tokens.push(Tok::Op(c));
            i += 1;
        } else {
            return Err(format!("Invalid character `{}` in `{}`", c, expr));
        }
    }
    Ok(tokens)
}

/// Recursive-descent evaluator over [Tok]s
struct ExprParser {
    tokens: Vec<Tok>,
    pos: usize,
}
impl ExprParser {
    fn peek_op(&self) -> Option<char> {
        match self.tokens.get(self.pos) {
            Some(Tok::Op(c)) => Some(*c),
            _ => None,
        }
    }
    fn expect(&mut self, op: char) -> Result<(), String> {
        if self.peek_op() == Some(op) {
            self.pos += 1;
            return Ok(());
        }
        Err(format!("Expected `{}`", op))
    }
    fn sum(&mut self) -> Result<f64, String> {
        let mut val = self.product()?;
        while let Some(op) = self.peek_op() {
            match op {
                '+' => {
                    self.pos += 1;
                    val += self.product()?;
                }
                '-' => {
                    self.pos += 1;
                    val -= self.product()?;
                }
                _ => break,
            }
        }
        Ok(val)
    }
    fn product(&mut self) -> Result<f64, String> {
        let mut val = self.unary()?;
        while let Some(op) = self.peek_op() {
            match op {
                '*' => {
                    self.pos += 1;
                    val *= self.unary()?;
                }
                '/' => {
                    self.pos += 1;
                    let rhs = self.unary()?;
                    if rhs == 0.0 {
                        return Err("Division by zero".into());
                    }
                    val /= rhs;
                }
                _ => break,
            }
        }
        Ok(val)
    }
    fn unary(&mut self) -> Result<f64, String> {
        match self.peek_op() {
            Some('-') => {
                self.pos += 1;
                Ok(-self.unary()?)
            }
            Some('+') => {
                self.pos += 1;
                self.unary()
            }
            _ => self.primary(),
        }
    }
    fn primary(&mut self) -> Result<f64, String> {
        let tok = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or_else(|| String::from("Expression ends early"))?;
        self.pos += 1;
        match tok {
            Tok::Num(n) => Ok(n),
            Tok::Op('(') => {
                let val = self.sum()?;
                self.expect(')')?;
                Ok(val)
            }
            Tok::Ident(name) => {
                self.expect('(')?;
                let mut args = vec![self.sum()?];
                while self.peek_op() == Some(',') {
                    self.pos += 1;
                    args.push(self.sum()?);
                }
                self.expect(')')?;
                call(&name, &args)
            }
            Tok::Op(c) => Err(format!("Unexpected `{}`", c)),
        }
    }
}

fn call(name: &str, args: &[f64]) -> Result<f64, String> {
    let one = || match args {
        [a] => Ok(*a),
        _ => Err(format!("{}() takes one argument", name)),
    };
    match name.to_ascii_lowercase().as_str() {
        "sqrt" => {
            let a = one()?;
            if a < 0.0 {
                return Err(format!("sqrt() of negative value {}", a));
            }
            Ok(a.sqrt())
        }
        "abs" => Ok(one()?.abs()),
        "floor" => Ok(one()?.floor()),
        "ceil" => Ok(one()?.ceil()),
        "round" => Ok(one()?.round()),
        "min" => args
            .iter()
            .copied()
            .reduce(f64::min)
            .ok_or_else(|| "min() requires arguments".into()),
        "max" => args
            .iter()
            .copied()
            .reduce(f64::max)
            .ok_or_else(|| "max() requires arguments".into()),
        _ => Err(format!("Unknown function `{}`", name)),
    }
}
