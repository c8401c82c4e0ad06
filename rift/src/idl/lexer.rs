//! Tokenizer for Thrift IDL source text.

use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message} at line {line}, column {column}")]
pub struct LexError {
    pub offset: usize,
    pub line: u32,
    pub column: u32,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Identifier or keyword: `[A-Za-z_][A-Za-z0-9_.]*`
    Ident(String),
    /// Decimal or hex integer literal, optionally signed.
    Int(i64),
    /// Floating-point literal.
    Double(f64),
    /// Single- or double-quoted string literal, unescaped.
    Str(String),
    LBrace,
    RBrace,
    LParen,
    RParen,
    LAngle,
    RAngle,
    LBracket,
    RBracket,
    Comma,
    Semicolon,
    Colon,
    Equals,
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Ident(s) => write!(f, "identifier `{}`", s),
            TokenKind::Int(v) => write!(f, "integer `{}`", v),
            TokenKind::Double(v) => write!(f, "double `{}`", v),
            TokenKind::Str(_) => write!(f, "string literal"),
            TokenKind::LBrace => write!(f, "`{{`"),
            TokenKind::RBrace => write!(f, "`}}`"),
            TokenKind::LParen => write!(f, "`(`"),
            TokenKind::RParen => write!(f, "`)`"),
            TokenKind::LAngle => write!(f, "`<`"),
            TokenKind::RAngle => write!(f, "`>`"),
            TokenKind::LBracket => write!(f, "`[`"),
            TokenKind::RBracket => write!(f, "`]`"),
            TokenKind::Comma => write!(f, "`,`"),
            TokenKind::Semicolon => write!(f, "`;`"),
            TokenKind::Colon => write!(f, "`:`"),
            TokenKind::Equals => write!(f, "`=`"),
            TokenKind::Eof => write!(f, "end of input"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub offset: usize,
    pub line: u32,
    pub column: u32,
}

/// Hand-written scanner over IDL source text.
///
/// Whitespace is insignificant; `//`, `#`, and `/* ... */` comments are
/// discarded. Every token carries its byte offset and line/column for
/// diagnostics.
pub struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    line: u32,
    column: u32,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    /// Consumes the whole input, producing a token stream ending in `Eof`.
    pub fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn error(&self, message: impl Into<String>) -> LexError {
        LexError {
            offset: self.pos,
            line: self.line,
            column: self.column,
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek2(&self) -> Option<char> {
        let mut it = self.src[self.pos..].chars();
        it.next();
        it.next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn skip_trivia(&mut self) -> Result<(), LexError> {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('#') => self.skip_line(),
                Some('/') if self.peek2() == Some('/') => self.skip_line(),
                Some('/') if self.peek2() == Some('*') => self.skip_block_comment()?,
                Some('/') => return Err(self.error("stray `/`")),
                _ => return Ok(()),
            }
        }
    }

    fn skip_line(&mut self) {
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.bump();
        }
    }

    fn skip_block_comment(&mut self) -> Result<(), LexError> {
        let start = (self.pos, self.line, self.column);
        self.bump(); // '/'
        self.bump(); // '*'
        loop {
            match self.peek() {
                Some('*') if self.peek2() == Some('/') => {
                    self.bump();
                    self.bump();
                    return Ok(());
                }
                Some(_) => {
                    self.bump();
                }
                None => {
                    return Err(LexError {
                        offset: start.0,
                        line: start.1,
                        column: start.2,
                        message: "unterminated block comment".into(),
                    })
                }
            }
        }
    }

    fn next_token(&mut self) -> Result<Token, LexError> {
        self.skip_trivia()?;
        let (offset, line, column) = (self.pos, self.line, self.column);
        let kind = match self.peek() {
            None => TokenKind::Eof,
            Some(c) if c.is_ascii_alphabetic() || c == '_' => self.lex_identifier(),
            Some(c) if c.is_ascii_digit() => self.lex_number()?,
            Some(c @ ('+' | '-')) => {
                match self.peek2() {
                    Some(d) if d.is_ascii_digit() || d == '.' => self.lex_number()?,
                    _ => return Err(self.error(format!("stray `{}`", c))),
                }
            }
            Some('.') if matches!(self.peek2(), Some(d) if d.is_ascii_digit()) => {
                self.lex_number()?
            }
            Some('"') | Some('\'') => self.lex_string()?,
            Some(c) => {
                let punct = match c {
                    '{' => TokenKind::LBrace,
                    '}' => TokenKind::RBrace,
                    '(' => TokenKind::LParen,
                    ')' => TokenKind::RParen,
                    '<' => TokenKind::LAngle,
                    '>' => TokenKind::RAngle,
                    '[' => TokenKind::LBracket,
                    ']' => TokenKind::RBracket,
                    ',' => TokenKind::Comma,
                    ';' => TokenKind::Semicolon,
                    ':' => TokenKind::Colon,
                    '=' => TokenKind::Equals,
                    other => return Err(self.error(format!("stray character `{}`", other))),
                };
                self.bump();
                punct
            }
        };
        Ok(Token {
            kind,
            offset,
            line,
            column,
        })
    }

    fn lex_identifier(&mut self) -> TokenKind {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' || c == '.' {
                self.bump();
            } else {
                break;
            }
        }
        TokenKind::Ident(self.src[start..self.pos].to_string())
    }

    fn lex_number(&mut self) -> Result<TokenKind, LexError> {
        let start = self.pos;
        if matches!(self.peek(), Some('+' | '-')) {
            self.bump();
        }
        // Hex integers: 0x... / 0X...
        if self.peek() == Some('0') && matches!(self.peek2(), Some('x' | 'X')) {
            self.bump();
            self.bump();
            let digits_start = self.pos;
            while matches!(self.peek(), Some(c) if c.is_ascii_hexdigit()) {
                self.bump();
            }
            if self.pos == digits_start {
                return Err(self.error("hex literal without digits"));
            }
            let text = &self.src[start..self.pos];
            let negative = text.starts_with('-');
            let digits = &self.src[digits_start..self.pos];
            let magnitude = i64::from_str_radix(digits, 16)
                .map_err(|_| self.error(format!("invalid hex literal `{}`", text)))?;
            return Ok(TokenKind::Int(if negative { -magnitude } else { magnitude }));
        }
        let mut is_double = false;
        while let Some(c) = self.peek() {
            match c {
                '0'..='9' => {
                    self.bump();
                }
                '.' => {
                    is_double = true;
                    self.bump();
                }
                'e' | 'E' => {
                    is_double = true;
                    self.bump();
                    if matches!(self.peek(), Some('+' | '-')) {
                        self.bump();
                    }
                }
                _ => break,
            }
        }
        let text = &self.src[start..self.pos];
        if is_double {
            text.parse::<f64>()
                .map(TokenKind::Double)
                .map_err(|_| self.error(format!("invalid float literal `{}`", text)))
        } else {
            text.parse::<i64>()
                .map(TokenKind::Int)
                .map_err(|_| self.error(format!("invalid integer literal `{}`", text)))
        }
    }

    fn lex_string(&mut self) -> Result<TokenKind, LexError> {
        let (offset, line, column) = (self.pos, self.line, self.column);
        let quote = self.bump().unwrap();
        let mut out = String::new();
        loop {
            match self.bump() {
                None => {
                    return Err(LexError {
                        offset,
                        line,
                        column,
                        message: "unterminated string literal".into(),
                    })
                }
                Some(c) if c == quote => return Ok(TokenKind::Str(out)),
                Some('\\') => match self.bump() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some('r') => out.push('\r'),
                    Some('\\') => out.push('\\'),
                    Some('/') => out.push('/'),
                    Some('\'') => out.push('\''),
                    Some('"') => out.push('"'),
                    Some(other) => {
                        return Err(self.error(format!("unknown escape `\\{}`", other)))
                    }
                    None => {
                        return Err(LexError {
                            offset,
                            line,
                            column,
                            message: "unterminated string literal".into(),
                        })
                    }
                },
                Some(c) => out.push(c),
            }
        }
    }
}
