//! Syntactic declaration tree produced by the parser.
//!
//! Names are unresolved strings; the resolver turns a set of documents into
//! a closed [`crate::schema::Schema`].

use serde::{Deserialize, Serialize};

/// A parsed `.thrift` file before resolution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    /// `include "path"` targets, in declaration order.
    pub includes: Vec<String>,
    /// `cpp_include` targets; parsed and otherwise ignored.
    pub cpp_includes: Vec<String>,
    /// `namespace <scope> <name>` pairs; stored, no runtime effect.
    pub namespaces: Vec<(String, String)>,
    pub definitions: Vec<Definition>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Definition {
    Typedef(TypedefDecl),
    Const(ConstDecl),
    Enum(EnumDecl),
    Struct(StructDecl),
    Service(ServiceDecl),
}

/// Unresolved type expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Ty {
    Bool,
    Byte,
    I16,
    I32,
    I64,
    Double,
    String,
    Binary,
    List(Box<Ty>),
    Set(Box<Ty>),
    Map(Box<Ty>, Box<Ty>),
    /// A user-declared name, possibly qualified (`module.Name`).
    Named(String),
}

/// Constant expression as written in the source.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstExpr {
    Int(i64),
    Double(f64),
    Str(String),
    /// Identifier reference: enum member (`PhoneType.MOBILE`), another
    /// constant, or the literals `true`/`false`.
    Ident(String),
    List(Vec<ConstExpr>),
    Map(Vec<(ConstExpr, ConstExpr)>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Requiredness {
    Required,
    Optional,
    /// Neither keyword written; written when present, tolerated when absent.
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructKind {
    Struct,
    Union,
    Exception,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypedefDecl {
    pub ty: Ty,
    pub name: String,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstDecl {
    pub ty: Ty,
    pub name: String,
    pub value: ConstExpr,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumDecl {
    pub name: String,
    pub members: Vec<EnumMemberDecl>,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumMemberDecl {
    pub name: String,
    /// Explicit `= value`; omitted values auto-assign max-prior+1 from 0.
    pub value: Option<i32>,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructDecl {
    pub kind: StructKind,
    pub name: String,
    pub fields: Vec<FieldDecl>,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    /// Explicit `N:` id; omitted ids are assigned by the resolver.
    pub id: Option<i16>,
    pub requiredness: Option<Requiredness>,
    pub ty: Ty,
    pub name: String,
    pub default: Option<ConstExpr>,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceDecl {
    pub name: String,
    pub extends: Option<String>,
    pub methods: Vec<MethodDecl>,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodDecl {
    pub oneway: bool,
    /// `None` for `void`.
    pub returns: Option<Ty>,
    pub name: String,
    pub args: Vec<FieldDecl>,
    pub throws: Vec<FieldDecl>,
    pub line: u32,
}
