//!
//! # S-Expression Reading Module
//!
//! Lexer and recursive-descent parser producing [Node] trees.
//! The reader only builds trees; evaluation is the job of the [crate::Environment].
//!

// Standard Lib Imports
use std::path::Path;
use std::str::{Chars, FromStr};

// Crates.io Imports
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// Local imports
use crate::error::{SexpError, SexpResult};
use crate::node::Node;

/// Parse all top-level forms in file `fname`
pub fn parse_file(fname: impl AsRef<Path>) -> SexpResult<Vec<Node>> {
    let src = std::fs::read_to_string(fname)?;
    parse_str(&src)
}
/// Parse all top-level forms in string `src`
pub fn parse_str(src: &str) -> SexpResult<Vec<Node>> {
    let mut parser = SexpParser::new(src)?;
    let mut forms = Vec::new();
    while let Some((_line, form)) = parser.parse_form()? {
        forms.push(form);
    }
    Ok(forms)
}

/// # S-Expression Lexer / Tokenizer
///
/// Breaks input string `src` into a stream of [Token]s,
/// discarding whitespace and `;` and `/* */` comments.
///
pub struct SexpLexer<'src> {
    /// Source-string character iterator
    chars: Chars<'src>,
    /// Peekable next character
    next_char: Option<char>,
    /// Peekable next Token
    next_tok: Option<Token>,
    /// Byte offset of the current token start
    start: usize,
    /// Line of the current token start
    start_line: usize,
    /// Active byte offset
    pos: usize,
    /// Active line number
    line: usize,
    /// Byte offset at the beginning of the current line
    linestart: usize,
}
impl<'src> SexpLexer<'src> {
    pub(crate) fn new(src: &'src str) -> SexpResult<Self> {
        let mut chars = src.chars();
        let next_char = chars.next();
        let mut lex = Self {
            chars,
            next_char,
            next_tok: None,
            start: 0,
            start_line: 1,
            pos: 0,
            line: 1,
            linestart: 0,
        };
        lex.next_tok = lex._next_token()?;
        Ok(lex)
    }
    /// Get and return our next character, updating our position along the way
    fn next_char(&mut self) -> Option<char> {
        let ch = self.next_char?;
        self.pos += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.linestart = self.pos;
        }
        self.next_char = self.chars.next();
        Some(ch)
    }
    /// Peek at our next character, without advancing
    fn peek_char(&self) -> Option<char> {
        self.next_char
    }
    /// Peek at the character after next
    fn peek_second(&self) -> Option<char> {
        self.chars.clone().next()
    }
    #[inline(always)]
    fn peek_token(&self) -> &Option<Token> {
        &self.next_tok
    }
    /// Get and return our next token
    fn next_token(&mut self) -> SexpResult<Option<Token>> {
        if self.next_tok.is_none() {
            return Ok(None);
        }
        let mut tok = self._next_token()?;
        std::mem::swap(&mut tok, &mut self.next_tok);
        Ok(tok)
    }
    /// Pull our next [Token], skipping whitespace and comments
    fn _next_token(&mut self) -> SexpResult<Option<Token>> {
        use TokenType::{Comment, WhiteSpace};
        loop {
            match self.lex_one()? {
                None => return Ok(None),
                Some(t) => match t.ttype {
                    WhiteSpace | Comment => continue,
                    _ => return Ok(Some(t)),
                },
            }
        }
    }
    /// Emit a [Token] of [TokenType] `ttype` spanning from the token start to the current position
    fn emit(&mut self, ttype: TokenType) -> Token {
        let loc = SourceLocation {
            start: self.start,
            stop: self.pos,
            line: self.start_line,
        };
        self.start = self.pos;
        Token { loc, ttype }
    }
    /// Accept a character if it meets predicate-function `f`
    fn accept(&mut self, f: impl Fn(char) -> bool) -> bool {
        match self.peek_char() {
            Some(ch) if f(ch) => {
                self.next_char();
                true
            }
            _ => false,
        }
    }
    /// Accept a single-character match
    fn accept_char(&mut self, c: char) -> bool {
        self.accept(|a| a == c)
    }
    /// Lex the next [Token]
    fn lex_one(&mut self) -> SexpResult<Option<Token>> {
        self.start = self.pos;
        self.start_line = self.line;
        let ch = match self.peek_char() {
            None => return Ok(None),
            Some(ch) => ch,
        };
        if self.accept(char::is_whitespace) {
            while self.accept(char::is_whitespace) {
                continue;
            }
            return Ok(Some(self.emit(TokenType::WhiteSpace)));
        }
        if self.accept_char(';') {
            while self.accept(|c| c != '\n') {
                continue;
            }
            return Ok(Some(self.emit(TokenType::Comment)));
        }
        if ch == '/' && self.peek_second() == Some('*') {
            return self.lex_block_comment();
        }
        if self.accept_char('(') {
            return Ok(Some(self.emit(TokenType::LParen)));
        }
        if self.accept_char(')') {
            return Ok(Some(self.emit(TokenType::RParen)));
        }
        if self.accept_char('\'') {
            return Ok(Some(self.emit(TokenType::Quote)));
        }
        if self.accept_char('=') {
            return Ok(Some(self.emit(TokenType::Equals)));
        }
        if self.accept_char('"') {
            return self.lex_string_literal();
        }
        if self.starts_number(ch) {
            return self.lex_number();
        }
        if self.accept(is_name_char) {
            while self.accept(is_name_char) {
                continue;
            }
            return Ok(Some(self.emit(TokenType::Name)));
        }
        self.fail()
    }
    /// Boolean indication of whether `ch`, our next character, starts a number
    fn starts_number(&self, ch: char) -> bool {
        if ch.is_ascii_digit() {
            return true;
        }
        if ch == '-' || ch == '+' || ch == '.' {
            let mut rest = self.chars.clone();
            return match rest.next() {
                Some(c) if c.is_ascii_digit() => true,
                Some('.') if ch != '.' => matches!(rest.next(), Some(c) if c.is_ascii_digit()),
                _ => false,
            };
        }
        false
    }
    /// Lex a number. Greedily accepts anything that could continue one.
    fn lex_number(&mut self) -> SexpResult<Option<Token>> {
        while self.accept(|c| c.is_ascii_digit() || "+-.eE".contains(c)) {
            continue;
        }
        Ok(Some(self.emit(TokenType::Number)))
    }
    /// Lex a string literal, including its quotes
    fn lex_string_literal(&mut self) -> SexpResult<Option<Token>> {
        loop {
            match self.next_char() {
                None => return self.fail(),
                Some('"') => break,
                Some('\\') => {
                    self.next_char();
                }
                Some(_) => continue,
            }
        }
        Ok(Some(self.emit(TokenType::StringLiteral)))
    }
    /// Lex a `/* */` comment
    fn lex_block_comment(&mut self) -> SexpResult<Option<Token>> {
        self.next_char();
        self.next_char();
        loop {
            match self.next_char() {
                None => return self.fail(),
                Some('*') if self.accept_char('/') => break,
                Some(_) => continue,
            }
        }
        Ok(Some(self.emit(TokenType::Comment)))
    }
    /// Error-Generation Helper
    fn fail<T>(&self) -> SexpResult<T> {
        Err(SexpError::Lex {
            next_char: self.peek_char(),
            line: self.line,
            pos: self.pos - self.linestart,
        })
    }
}

/// Characters valid in identifiers
fn is_name_char(c: char) -> bool {
    !c.is_whitespace() && !"()\"';=".contains(c)
}

/// Location of a [Token] in the source string
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    /// Start byte offset (inclusive)
    start: usize,
    /// End byte offset (exclusive)
    stop: usize,
    /// Line number
    line: usize,
}
/// Lexer Token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    loc: SourceLocation,
    ttype: TokenType,
}
impl Token {
    /// Return a sub-string of input-string `src` over our locations
    pub(crate) fn substr<'src>(&self, src: &'src str) -> &'src str {
        &src[self.loc.start..self.loc.stop]
    }
}
/// Token Types Enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenType {
    LParen,
    RParen,
    Name,
    Number,
    StringLiteral,
    Quote,
    Equals,
    WhiteSpace,
    Comment,
}

/// # S-Expression Parser
pub struct SexpParser<'src> {
    /// Source string
    src: &'src str,
    /// Lexer
    lex: SexpLexer<'src>,
    /// Names of the lists being parsed, outermost first
    ctx: Vec<String>,
}
impl<'src> SexpParser<'src> {
    /// Construct a [SexpParser] of input-text `src`
    pub fn new(src: &'src str) -> SexpResult<Self> {
        Ok(Self {
            src,
            lex: SexpLexer::new(src)?,
            ctx: Vec::new(),
        })
    }
    #[inline(always)]
    fn next_token(&mut self) -> SexpResult<Option<Token>> {
        self.lex.next_token()
    }
    #[inline(always)]
    fn advance(&mut self) -> SexpResult<()> {
        let _ = self.lex.next_token()?;
        Ok(())
    }
    #[inline(always)]
    fn peek_token(&self) -> &Option<Token> {
        self.lex.peek_token()
    }
    /// Boolean indication of whether our next Token is of [TokenType] `ttype`
    fn matches(&self, ttype: TokenType) -> bool {
        matches!(self.peek_token(), Some(t) if t.ttype == ttype)
    }
    #[inline(always)]
    fn txt(&self, tok: &Token) -> &'src str {
        tok.substr(self.src)
    }
    /// Parse the next top-level form, returning it with its starting line.
    /// Returns `None` at end of input.
    pub fn parse_form(&mut self) -> SexpResult<Option<(usize, Node)>> {
        let line = match self.peek_token() {
            None => return Ok(None),
            Some(t) => t.loc.line,
        };
        let node = self.parse_element()?;
        Ok(Some((line, node)))
    }
    /// Parse a single element: atom, list, or operator expression
    fn parse_element(&mut self) -> SexpResult<Node> {
        let tok = match self.next_token()? {
            Some(t) => t,
            None => return self.fail("Unexpected end of input"),
        };
        match tok.ttype {
            TokenType::LParen => self.parse_list_body(None),
            TokenType::RParen => self.fail("Unexpected `)`"),
            TokenType::Equals => self.fail("Unexpected `=`"),
            // Quote prefixes carry no meaning for us; drop them
            TokenType::Quote => self.parse_element(),
            TokenType::Number => {
                let txt = self.txt(&tok);
                match parse_number(txt) {
                    Some(d) => Ok(Node::Number(d)),
                    None => self.fail(format!("Invalid number `{}`", txt)),
                }
            }
            TokenType::StringLiteral => {
                let txt = self.txt(&tok);
                Ok(Node::QuotedString(unescape(&txt[1..txt.len() - 1])))
            }
            TokenType::Name => {
                let name = self.txt(&tok).to_string();
                // A name immediately followed by `(` opens a named list
                if let Some(next) = *self.peek_token() {
                    if next.ttype == TokenType::LParen && next.loc.start == tok.loc.stop {
                        self.advance()?;
                        return self.parse_list_body(Some(name));
                    }
                }
                if self.matches(TokenType::Equals) {
                    self.advance()?;
                    let rhs = self.parse_element()?;
                    return Ok(Node::Operator {
                        op: "=".into(),
                        lhs: Box::new(Node::Identifier(name)),
                        args: vec![rhs],
                    });
                }
                Ok(Node::Identifier(name))
            }
            TokenType::WhiteSpace | TokenType::Comment => self.fail("Internal error: unfiltered token"),
        }
    }
    /// Parse list contents through the closing `)`. The opening `(` has been consumed.
    fn parse_list_body(&mut self, name: Option<String>) -> SexpResult<Node> {
        self.ctx.push(name.clone().unwrap_or_else(|| "()".into()));
        let mut args = Vec::new();
        loop {
            match *self.peek_token() {
                None => return self.fail("Unclosed list"),
                Some(t) if t.ttype == TokenType::RParen => {
                    self.advance()?;
                    break;
                }
                Some(_) => args.push(self.parse_element()?),
            }
        }
        self.ctx.pop();
        Ok(Node::List { name, args })
    }
    /// Error-Generation Helper
    fn fail<T>(&self, msg: impl Into<String>) -> SexpResult<T> {
        Err(SexpError::Parse {
            msg: msg.into(),
            state: self.state(),
        })
    }
    /// Extract the state of the parser, for error reporting
    fn state(&self) -> ParserState {
        let token = match self.lex.next_tok {
            Some(t) => self.txt(&t),
            None => "EOF",
        }
        .to_string();
        const MAX_CHARS_IN_LINE: usize = 200;
        let rest = &self.src[self.lex.linestart..];
        let line_content: String = rest
            .chars()
            .take_while(|c| *c != '\n')
            .take(MAX_CHARS_IN_LINE)
            .collect();
        ParserState {
            ctx: self.ctx.clone(),
            token,
            line_content,
            line_num: self.lex.line,
            pos: self.lex.pos - self.lex.linestart,
        }
    }
}

/// Parse a numeric token, as a plain decimal or in scientific notation
pub fn parse_number(txt: &str) -> Option<Decimal> {
    let txt = txt.strip_prefix('+').unwrap_or(txt);
    let (sign, body) = match txt.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", txt),
    };
    let lead = if body.starts_with('.') { "0" } else { "" };
    let txt = format!("{}{}{}", sign, lead, body);
    Decimal::from_str(&txt)
        .ok()
        .or_else(|| Decimal::from_scientific(&txt).ok())
}

/// Resolve string-literal escapes
fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// # Parser State
/// Captured on errors, for reporting
#[derive(Debug, Clone)]
pub struct ParserState {
    pub ctx: Vec<String>,
    pub token: String,
    pub line_content: String,
    pub line_num: usize,
    pub pos: usize,
}
