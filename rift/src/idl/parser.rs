//! Recursive-descent parser for the Thrift declaration grammar.

use super::ast::*;
use super::lexer::{Token, TokenKind};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
#[error("expected {expected}, found {found} at line {line}, column {column}")]
pub struct ParseError {
    pub line: u32,
    pub column: u32,
    pub expected: String,
    pub found: String,
}

type Result<T> = std::result::Result<T, ParseError>;

/// Top-down parser over a token stream produced by [`super::Lexer`].
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    pub fn parse_document(mut self) -> Result<Document> {
        let mut doc = Document::default();
        loop {
            match self.peek_ident() {
                Some("include") => {
                    self.bump();
                    doc.includes.push(self.expect_string()?);
                }
                Some("cpp_include") => {
                    self.bump();
                    doc.cpp_includes.push(self.expect_string()?);
                }
                Some("namespace") => {
                    self.bump();
                    let scope = self.expect_ident("namespace scope")?;
                    let name = self.expect_ident("namespace name")?;
                    doc.namespaces.push((scope, name));
                }
                Some("typedef") => {
                    let decl = self.parse_typedef()?;
                    doc.definitions.push(Definition::Typedef(decl));
                }
                Some("const") => {
                    let decl = self.parse_const()?;
                    doc.definitions.push(Definition::Const(decl));
                }
                Some("enum") => {
                    let decl = self.parse_enum()?;
                    doc.definitions.push(Definition::Enum(decl));
                }
                Some("struct") => {
                    let decl = self.parse_struct(StructKind::Struct)?;
                    doc.definitions.push(Definition::Struct(decl));
                }
                Some("union") => {
                    let decl = self.parse_struct(StructKind::Union)?;
                    doc.definitions.push(Definition::Struct(decl));
                }
                Some("exception") => {
                    let decl = self.parse_struct(StructKind::Exception)?;
                    doc.definitions.push(Definition::Struct(decl));
                }
                Some("service") => {
                    let decl = self.parse_service()?;
                    doc.definitions.push(Definition::Service(decl));
                }
                Some(other) => {
                    let other = other.to_string();
                    return Err(self.err_here("a declaration keyword", format!("`{}`", other)));
                }
                None => {
                    if self.peek_kind() == &TokenKind::Eof {
                        return Ok(doc);
                    }
                    let found = self.peek_kind().to_string();
                    return Err(self.err_here("a declaration keyword", found));
                }
            }
        }
    }

    // ── declarations ────────────────────────────────────────────────

    fn parse_typedef(&mut self) -> Result<TypedefDecl> {
        let line = self.here().0;
        self.bump(); // `typedef`
        let ty = self.parse_type()?;
        let name = self.expect_ident("typedef name")?;
        self.eat_separator();
        Ok(TypedefDecl { ty, name, line })
    }

    fn parse_const(&mut self) -> Result<ConstDecl> {
        let line = self.here().0;
        self.bump(); // `const`
        let ty = self.parse_type()?;
        let name = self.expect_ident("constant name")?;
        self.expect_punct(TokenKind::Equals)?;
        let value = self.parse_const_expr()?;
        self.eat_separator();
        Ok(ConstDecl {
            ty,
            name,
            value,
            line,
        })
    }

    fn parse_enum(&mut self) -> Result<EnumDecl> {
        let line = self.here().0;
        self.bump(); // `enum`
        let name = self.expect_ident("enum name")?;
        self.expect_punct(TokenKind::LBrace)?;
        let mut members = Vec::new();
        while !self.eat_punct(&TokenKind::RBrace) {
            let line = self.here().0;
            let name = self.expect_ident("enum member")?;
            let value = if self.eat_punct(&TokenKind::Equals) {
                Some(self.expect_enum_value()?)
            } else {
                None
            };
            self.eat_separator();
            members.push(EnumMemberDecl { name, value, line });
        }
        Ok(EnumDecl {
            name,
            members,
            line,
        })
    }

    fn parse_struct(&mut self, kind: StructKind) -> Result<StructDecl> {
        let line = self.here().0;
        self.bump(); // `struct` / `union` / `exception`
        let name = self.expect_ident("type name")?;
        self.expect_punct(TokenKind::LBrace)?;
        let mut fields = Vec::new();
        while !self.eat_punct(&TokenKind::RBrace) {
            fields.push(self.parse_field()?);
        }
        Ok(StructDecl {
            kind,
            name,
            fields,
            line,
        })
    }

    fn parse_field(&mut self) -> Result<FieldDecl> {
        let line = self.here().0;
        let id = if let TokenKind::Int(v) = self.peek_kind() {
            let v = *v;
            // Only `N:` is a field id; a bare integer here is an error anyway.
            self.bump();
            self.expect_punct(TokenKind::Colon)?;
            let id = i16::try_from(v)
                .map_err(|_| self.err_at(line, "a field id in i16 range", v.to_string()))?;
            Some(id)
        } else {
            None
        };
        let requiredness = match self.peek_ident() {
            Some("required") => {
                self.bump();
                Some(Requiredness::Required)
            }
            Some("optional") => {
                self.bump();
                Some(Requiredness::Optional)
            }
            _ => None,
        };
        let ty = self.parse_type()?;
        let name = self.expect_ident("field name")?;
        let default = if self.eat_punct(&TokenKind::Equals) {
            Some(self.parse_const_expr()?)
        } else {
            None
        };
        self.eat_separator();
        Ok(FieldDecl {
            id,
            requiredness,
            ty,
            name,
            default,
            line,
        })
    }

    fn parse_service(&mut self) -> Result<ServiceDecl> {
        let line = self.here().0;
        self.bump(); // `service`
        let name = self.expect_ident("service name")?;
        let extends = if self.peek_ident() == Some("extends") {
            self.bump();
            Some(self.expect_ident("parent service name")?)
        } else {
            None
        };
        self.expect_punct(TokenKind::LBrace)?;
        let mut methods = Vec::new();
        while !self.eat_punct(&TokenKind::RBrace) {
            methods.push(self.parse_method()?);
        }
        Ok(ServiceDecl {
            name,
            extends,
            methods,
            line,
        })
    }

    fn parse_method(&mut self) -> Result<MethodDecl> {
        let line = self.here().0;
        let oneway = if self.peek_ident() == Some("oneway") {
            self.bump();
            true
        } else {
            false
        };
        let returns = if self.peek_ident() == Some("void") {
            self.bump();
            None
        } else {
            Some(self.parse_type()?)
        };
        let name = self.expect_ident("method name")?;
        self.expect_punct(TokenKind::LParen)?;
        let mut args = Vec::new();
        while !self.eat_punct(&TokenKind::RParen) {
            args.push(self.parse_field()?);
        }
        let mut throws = Vec::new();
        if self.peek_ident() == Some("throws") {
            self.bump();
            self.expect_punct(TokenKind::LParen)?;
            while !self.eat_punct(&TokenKind::RParen) {
                throws.push(self.parse_field()?);
            }
        }
        self.eat_separator();
        Ok(MethodDecl {
            oneway,
            returns,
            name,
            args,
            throws,
            line,
        })
    }

    // ── types and constants ─────────────────────────────────────────

    fn parse_type(&mut self) -> Result<Ty> {
        let name = self.expect_ident("a type")?;
        Ok(match name.as_str() {
            "bool" => Ty::Bool,
            "byte" | "i8" => Ty::Byte,
            "i16" => Ty::I16,
            "i32" => Ty::I32,
            "i64" => Ty::I64,
            "double" => Ty::Double,
            "string" => Ty::String,
            "binary" => Ty::Binary,
            "list" => {
                self.expect_punct(TokenKind::LAngle)?;
                let elem = self.parse_type()?;
                self.expect_punct(TokenKind::RAngle)?;
                Ty::List(Box::new(elem))
            }
            "set" => {
                self.expect_punct(TokenKind::LAngle)?;
                let elem = self.parse_type()?;
                self.expect_punct(TokenKind::RAngle)?;
                Ty::Set(Box::new(elem))
            }
            "map" => {
                self.expect_punct(TokenKind::LAngle)?;
                let key = self.parse_type()?;
                self.expect_punct(TokenKind::Comma)?;
                let value = self.parse_type()?;
                self.expect_punct(TokenKind::RAngle)?;
                Ty::Map(Box::new(key), Box::new(value))
            }
            _ => Ty::Named(name),
        })
    }

    fn parse_const_expr(&mut self) -> Result<ConstExpr> {
        match self.peek_kind().clone() {
            TokenKind::Int(v) => {
                self.bump();
                Ok(ConstExpr::Int(v))
            }
            TokenKind::Double(v) => {
                self.bump();
                Ok(ConstExpr::Double(v))
            }
            TokenKind::Str(s) => {
                self.bump();
                Ok(ConstExpr::Str(s))
            }
            TokenKind::Ident(name) => {
                self.bump();
                Ok(ConstExpr::Ident(name))
            }
            TokenKind::LBracket => {
                self.bump();
                let mut items = Vec::new();
                while !self.eat_punct(&TokenKind::RBracket) {
                    items.push(self.parse_const_expr()?);
                    self.eat_separator();
                }
                Ok(ConstExpr::List(items))
            }
            TokenKind::LBrace => {
                self.bump();
                let mut pairs = Vec::new();
                while !self.eat_punct(&TokenKind::RBrace) {
                    let key = self.parse_const_expr()?;
                    self.expect_punct(TokenKind::Colon)?;
                    let value = self.parse_const_expr()?;
                    self.eat_separator();
                    pairs.push((key, value));
                }
                Ok(ConstExpr::Map(pairs))
            }
            other => Err(self.err_here("a constant expression", other.to_string())),
        }
    }

    fn expect_enum_value(&mut self) -> Result<i32> {
        match self.peek_kind() {
            TokenKind::Int(v) => {
                let v = *v;
                let v = i32::try_from(v)
                    .map_err(|_| self.err_here("an enum value in i32 range", v.to_string()))?;
                self.bump();
                Ok(v)
            }
            other => {
                let found = other.to_string();
                Err(self.err_here("an integer enum value", found))
            }
        }
    }

    // ── token plumbing ──────────────────────────────────────────────

    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    fn peek_ident(&self) -> Option<&str> {
        match self.peek_kind() {
            TokenKind::Ident(s) => Some(s.as_str()),
            _ => None,
        }
    }

    fn here(&self) -> (u32, u32) {
        let t = self.peek();
        (t.line, t.column)
    }

    fn bump(&mut self) {
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
    }

    fn err_here(&self, expected: impl Into<String>, found: impl Into<String>) -> ParseError {
        let (line, column) = self.here();
        ParseError {
            line,
            column,
            expected: expected.into(),
            found: found.into(),
        }
    }

    fn err_at(&self, line: u32, expected: impl Into<String>, found: impl Into<String>) -> ParseError {
        ParseError {
            line,
            column: 0,
            expected: expected.into(),
            found: found.into(),
        }
    }

    fn expect_ident(&mut self, expected: &str) -> Result<String> {
        match self.peek_kind() {
            TokenKind::Ident(s) => {
                let s = s.clone();
                self.bump();
                Ok(s)
            }
            other => {
                let found = other.to_string();
                Err(self.err_here(expected, found))
            }
        }
    }

    fn expect_string(&mut self) -> Result<String> {
        match self.peek_kind() {
            TokenKind::Str(s) => {
                let s = s.clone();
                self.bump();
                Ok(s)
            }
            other => {
                let found = other.to_string();
                Err(self.err_here("a string literal", found))
            }
        }
    }

    fn expect_punct(&mut self, kind: TokenKind) -> Result<()> {
        if self.peek_kind() == &kind {
            self.bump();
            Ok(())
        } else {
            let found = self.peek_kind().to_string();
            Err(self.err_here(kind.to_string(), found))
        }
    }

    fn eat_punct(&mut self, kind: &TokenKind) -> bool {
        if self.peek_kind() == kind {
            self.bump();
            true
        } else {
            false
        }
    }

    /// Field and member separators (`,` or `;`) are optional everywhere.
    fn eat_separator(&mut self) {
        while matches!(self.peek_kind(), TokenKind::Comma | TokenKind::Semicolon) {
            self.bump();
        }
    }
}
