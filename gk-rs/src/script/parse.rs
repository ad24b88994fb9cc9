//! Parser for the command language.
//!
//! Grammar, dispatching on the first character after leading whitespace:
//!
//! | Start | Form |
//! |-------|------|
//! | `"` | string literal with `\n`, `\\`, `\"` escapes |
//! | ASCII digit | integer literal, must fit in 32 bits |
//! | letter | `name` (variable reference) or `name(arg, …)` (call) |
//!
//! A script is any number of expressions separated by whitespace.  Running out
//! of input between expressions ends the script; running out anywhere else
//! is an error.  Calls may nest at most [`MAX_NESTING`] levels deep.

use thiserror::Error;

use super::expr::{Expr, Funcall};

/// Deepest call nesting the parser accepts.
pub const MAX_NESTING: usize = 256;

// ── ParseError ────────────────────────────────────────────────────────────────

/// A syntax error.  Offsets are byte offsets into the source text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Unexpected character {found:?} at offset {offset}")]
    UnexpectedCharacter { found: char, offset: usize },
    #[error("Unexpected end of source at offset {offset}")]
    EndOfSource { offset: usize },
    #[error("Expected \" to close the string starting at offset {start}")]
    UnterminatedString { start: usize },
    #[error("Unfinished escape sequence at offset {offset}")]
    UnfinishedEscape { offset: usize },
    #[error("Unknown escape sequence starting with `{found}` at offset {offset}")]
    UnknownEscape { found: char, offset: usize },
    #[error("Integer literal `{literal}` at offset {offset} is out of range")]
    IntegerOverflow { literal: String, offset: usize },
    #[error("Expected an argument after `,` at offset {offset}")]
    ExpectedArgument { offset: usize },
    #[error("Expected ) at offset {offset}")]
    ExpectedCloseParen { offset: usize },
    #[error("Calls nested deeper than {MAX_NESTING} levels at offset {offset}")]
    NestingTooDeep { offset: usize },
}

impl ParseError {
    /// Byte offset the error points at.
    pub fn offset(&self) -> usize {
        match self {
            ParseError::UnexpectedCharacter { offset, .. }
            | ParseError::EndOfSource { offset }
            | ParseError::UnfinishedEscape { offset }
            | ParseError::UnknownEscape { offset, .. }
            | ParseError::IntegerOverflow { offset, .. }
            | ParseError::ExpectedArgument { offset }
            | ParseError::ExpectedCloseParen { offset }
            | ParseError::NestingTooDeep { offset } => *offset,
            ParseError::UnterminatedString { start } => *start,
        }
    }
}

// ── Parser ────────────────────────────────────────────────────────────────────

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Parser { src, pos: 0, depth: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.advance();
        }
    }

    /// Consume the longest run of characters matching `pred`.
    fn span(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if pred(c)) {
            self.advance();
        }
        &self.src[start..self.pos]
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    // ── Grammar ───────────────────────────────────────────────────────────────

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.skip_ws();
        match self.peek() {
            None => Err(ParseError::EndOfSource { offset: self.pos }),
            Some('"') => self.parse_string(),
            Some(c) if c.is_ascii_digit() => self.parse_int(),
            Some(c) if c.is_alphabetic() => self.parse_name(),
            Some(found) => Err(ParseError::UnexpectedCharacter {
                found,
                offset: self.pos,
            }),
        }
    }

    fn parse_string(&mut self) -> Result<Expr, ParseError> {
        let start = self.pos;
        self.advance(); // opening quote
        let mut literal = String::new();
        loop {
            let offset = self.pos;
            match self.advance() {
                None => return Err(ParseError::UnterminatedString { start }),
                Some('"') => return Ok(Expr::Str(literal)),
                Some('\\') => match self.advance() {
                    None => return Err(ParseError::UnfinishedEscape { offset }),
                    Some('n') => literal.push('\n'),
                    Some('\\') => literal.push('\\'),
                    Some('"') => literal.push('"'),
                    Some(found) => {
                        return Err(ParseError::UnknownEscape {
                            found,
                            offset: offset + 1,
                        })
                    }
                },
                Some(c) => literal.push(c),
            }
        }
    }

    fn parse_int(&mut self) -> Result<Expr, ParseError> {
        let offset = self.pos;
        let digits = self.span(|c| c.is_ascii_digit());
        digits
            .parse::<i32>()
            .map(|n| Expr::Int(i64::from(n)))
            .map_err(|_| ParseError::IntegerOverflow {
                literal: digits.to_owned(),
                offset,
            })
    }

    fn parse_name(&mut self) -> Result<Expr, ParseError> {
        let name = self
            .span(|c| c.is_alphanumeric() || c == '_')
            .to_owned();
        let after_name = self.pos;
        self.skip_ws();
        if !self.eat('(') {
            self.pos = after_name;
            return Ok(Expr::Var(name));
        }
        if self.depth >= MAX_NESTING {
            return Err(ParseError::NestingTooDeep { offset: after_name });
        }
        self.depth += 1;
        let args = self.parse_args();
        self.depth -= 1;
        Ok(Expr::Funcall(Funcall { name, args: args? }))
    }

    /// Arguments of a call whose `(` has been consumed, through the `)`.
    fn parse_args(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut args = Vec::new();
        self.skip_ws();
        if self.eat(')') {
            return Ok(args);
        }
        loop {
            self.skip_ws();
            match self.peek() {
                None => return Err(ParseError::ExpectedCloseParen { offset: self.pos }),
                Some(')') if !args.is_empty() => {
                    return Err(ParseError::ExpectedArgument { offset: self.pos })
                }
                _ => {}
            }
            args.push(self.parse_expr()?);
            self.skip_ws();
            if !self.eat(',') {
                break;
            }
        }
        if !self.eat(')') {
            return Err(ParseError::ExpectedCloseParen { offset: self.pos });
        }
        Ok(args)
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Parse every top-level expression in `source`.
pub fn parse_all(source: &str) -> Result<Vec<Expr>, ParseError> {
    let mut parser = Parser::new(source);
    let mut exprs = Vec::new();
    loop {
        parser.skip_ws();
        if parser.at_end() {
            return Ok(exprs);
        }
        exprs.push(parser.parse_expr()?);
    }
}

/// Parse exactly one expression; trailing non-whitespace input is an error.
pub fn parse_expr(source: &str) -> Result<Expr, ParseError> {
    let mut parser = Parser::new(source);
    let expr = parser.parse_expr()?;
    parser.skip_ws();
    match parser.peek() {
        None => Ok(expr),
        Some(found) => Err(ParseError::UnexpectedCharacter {
            found,
            offset: parser.pos,
        }),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
