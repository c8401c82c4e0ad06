//! Include loading, name resolution, and semantic validation.
//!
//! Resolution is two-pass: pass 1 registers every declared name (so that
//! recursive and mutually recursive types resolve), pass 2 builds the
//! definitions in dependency order (enums, typedefs, constants, structs,
//! services). Non-structural errors are accumulated and reported together.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use super::registry::{NamedType, TypeRegistry};
use super::types::{
    ConstDef, ConstValue, EnumDef, FieldDef, MethodDef, Module, Requiredness, Schema, ServiceDef,
    StructDef, StructKind, TypeRef, TypedefDef, SUCCESS_FIELD_ID,
};
use crate::config::RuntimeConfig;
use crate::idl::ast::{self, ConstExpr, Definition, Document};
use crate::idl::{LexError, Lexer, ParseError, Parser};

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("failed to read `{}`: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("in `{}`: {source}", .path.display())]
    Lex {
        path: PathBuf,
        #[source]
        source: LexError,
    },

    #[error("in `{}`: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },

    #[error("include cycle through `{}`", .path.display())]
    IncludeCycle { path: PathBuf },

    #[error("include `{target}` not found")]
    IncludeNotFound { target: String },

    #[error("duplicate name `{name}`")]
    DuplicateName { name: String },

    #[error("unknown type `{name}` in module `{module}`")]
    UnknownType { name: String, module: String },

    #[error("`{name}` is a {kind} and cannot be used here")]
    NotAType { name: String, kind: &'static str },

    #[error("duplicate field id {id} in `{strukt}`")]
    DuplicateFieldId { strukt: String, id: i16 },

    #[error("non-positive field id {id} on `{strukt}.{field}`")]
    NonPositiveFieldId {
        strukt: String,
        field: String,
        id: i16,
    },

    #[error("duplicate value {value} in enum `{name}`")]
    DuplicateEnumValue { name: String, value: i32 },

    #[error("union `{union}` declares required field `{field}`")]
    RequiredUnionField { union: String, field: String },

    #[error("typedef cycle through `{name}`")]
    TypedefCycle { name: String },

    #[error("constant `{name}`: expected {expected}, found {found}")]
    ConstTypeMismatch {
        name: String,
        expected: String,
        found: String,
    },

    #[error("enum `{enum_name}` has no member `{member}`")]
    UnknownEnumMember { enum_name: String, member: String },

    #[error("unknown constant `{name}`")]
    UnknownConst { name: String },

    #[error("service inheritance cycle through `{service}`")]
    ServiceCycle { service: String },

    #[error("oneway method `{method}` declares a result or throws")]
    OnewayWithResult { method: String },

    #[error("{} resolve errors, first: {}", .0.len(), .0[0])]
    Multiple(Vec<ResolveError>),
}

type Result<T> = std::result::Result<T, ResolveError>;

/// Loads a root IDL file and its transitive includes into a [`Schema`].
pub struct Resolver {
    config: RuntimeConfig,
}

/// A parsed module awaiting resolution.
struct RawModule {
    name: String,
    path: PathBuf,
    doc: Document,
    include_names: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeclKind {
    Enum,
    Struct,
    Union,
    Exception,
    Typedef,
    Service,
    Const,
}

impl DeclKind {
    fn name(self) -> &'static str {
        match self {
            DeclKind::Enum => "enum",
            DeclKind::Struct => "struct",
            DeclKind::Union => "union",
            DeclKind::Exception => "exception",
            DeclKind::Typedef => "typedef",
            DeclKind::Service => "service",
            DeclKind::Const => "constant",
        }
    }
}

impl Resolver {
    pub fn new(config: RuntimeConfig) -> Self {
        Self { config }
    }

    /// Loads `root` and everything it includes.
    pub fn load(&self, root: &Path) -> Result<Schema> {
        let mut modules = Vec::new();
        let mut loaded = HashMap::new();
        let mut stack = Vec::new();
        self.load_file(root, &mut modules, &mut loaded, &mut stack)?;
        Build::new(&self.config, modules).run()
    }

    /// Resolves a single in-memory source as module `name`.
    ///
    /// Includes are looked up through the configured search paths only.
    pub fn load_str(&self, name: &str, source: &str) -> Result<Schema> {
        let virtual_path = PathBuf::from(format!("<{}>", name));
        let doc = parse_source(&virtual_path, source)?;
        let mut modules = Vec::new();
        let mut loaded = HashMap::new();
        let mut stack = Vec::new();
        let mut include_names = Vec::new();
        for target in &doc.includes {
            let path = self.find_include(None, target)?;
            let inc = self.load_file(&path, &mut modules, &mut loaded, &mut stack)?;
            include_names.push(inc);
        }
        modules.push(RawModule {
            name: name.to_string(),
            path: virtual_path,
            doc,
            include_names,
        });
        Build::new(&self.config, modules).run()
    }

    fn load_file(
        &self,
        path: &Path,
        modules: &mut Vec<RawModule>,
        loaded: &mut HashMap<PathBuf, String>,
        stack: &mut Vec<PathBuf>,
    ) -> Result<String> {
        let canonical = path.canonicalize().map_err(|source| ResolveError::Io {
            path: path.to_owned(),
            source,
        })?;
        if stack.contains(&canonical) {
            return Err(ResolveError::IncludeCycle {
                path: path.to_owned(),
            });
        }
        if let Some(name) = loaded.get(&canonical) {
            return Ok(name.clone());
        }
        let source = std::fs::read_to_string(path).map_err(|source| ResolveError::Io {
            path: path.to_owned(),
            source,
        })?;
        let doc = parse_source(path, &source)?;
        let name = module_name(path)?;
        if modules.iter().any(|m| m.name == name) {
            return Err(ResolveError::DuplicateName { name });
        }

        stack.push(canonical.clone());
        let mut include_names = Vec::new();
        for target in &doc.includes {
            let inc_path = self.find_include(path.parent(), target)?;
            let inc_name = self.load_file(&inc_path, modules, loaded, stack)?;
            include_names.push(inc_name);
        }
        stack.pop();

        loaded.insert(canonical, name.clone());
        modules.push(RawModule {
            name: name.clone(),
            path: path.to_owned(),
            doc,
            include_names,
        });
        Ok(name)
    }

    /// `include` targets resolve relative to the including file, then
    /// through the configured search paths.
    fn find_include(&self, including_dir: Option<&Path>, target: &str) -> Result<PathBuf> {
        if let Some(dir) = including_dir {
            let candidate = dir.join(target);
            if candidate.is_file() {
                return Ok(candidate);
            }
        }
        for dir in &self.config.include_search_paths {
            let candidate = dir.join(target);
            if candidate.is_file() {
                return Ok(candidate);
            }
        }
        Err(ResolveError::IncludeNotFound {
            target: target.to_string(),
        })
    }
}

fn parse_source(path: &Path, source: &str) -> Result<Document> {
    let tokens = Lexer::new(source)
        .tokenize()
        .map_err(|source| ResolveError::Lex {
            path: path.to_owned(),
            source,
        })?;
    Parser::new(tokens)
        .parse_document()
        .map_err(|source| ResolveError::Parse {
            path: path.to_owned(),
            source,
        })
}

fn module_name(path: &Path) -> Result<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(|s| s.to_string())
        .ok_or_else(|| ResolveError::Io {
            path: path.to_owned(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a module path"),
        })
}

/// Two-pass resolution over the loaded module set.
struct Build<'a> {
    config: &'a RuntimeConfig,
    raws: Vec<RawModule>,
    decls: HashMap<String, DeclKind>,
    registry: TypeRegistry,
    constants: HashMap<String, ConstDef>,
    errors: Vec<ResolveError>,
}

impl<'a> Build<'a> {
    fn new(config: &'a RuntimeConfig, raws: Vec<RawModule>) -> Self {
        Self {
            config,
            raws,
            decls: HashMap::new(),
            registry: TypeRegistry::new(),
            constants: HashMap::new(),
            errors: Vec::new(),
        }
    }

    fn run(mut self) -> Result<Schema> {
        self.collect_decls();
        self.build_enums();
        self.build_typedefs();
        self.build_constants();
        self.build_structs();
        self.build_services();
        let modules = self.build_modules();

        match self.errors.len() {
            0 => Ok(Schema {
                modules,
                registry: self.registry,
            }),
            1 => Err(self.errors.pop().unwrap()),
            _ => Err(ResolveError::Multiple(self.errors)),
        }
    }

    // ── pass 1: name table ──────────────────────────────────────────

    fn collect_decls(&mut self) {
        for raw in &self.raws {
            for def in &raw.doc.definitions {
                let (name, kind) = match def {
                    Definition::Enum(d) => (&d.name, DeclKind::Enum),
                    Definition::Typedef(d) => (&d.name, DeclKind::Typedef),
                    Definition::Const(d) => (&d.name, DeclKind::Const),
                    Definition::Struct(d) => (
                        &d.name,
                        match d.kind {
                            StructKind::Struct => DeclKind::Struct,
                            StructKind::Union => DeclKind::Union,
                            StructKind::Exception => DeclKind::Exception,
                        },
                    ),
                    Definition::Service(d) => (&d.name, DeclKind::Service),
                };
                let qualified = format!("{}.{}", raw.name, name);
                if self.decls.insert(qualified.clone(), kind).is_some() {
                    self.errors
                        .push(ResolveError::DuplicateName { name: qualified });
                }
            }
        }
    }

    // ── name resolution ─────────────────────────────────────────────

    fn resolve_named(&self, raw: &RawModule, name: &str) -> Result<(String, DeclKind)> {
        let local = format!("{}.{}", raw.name, name);
        if let Some(kind) = self.decls.get(&local) {
            return Ok((local, *kind));
        }
        if let Some((first, _rest)) = name.split_once('.') {
            if first == raw.name || raw.include_names.iter().any(|n| n == first) {
                if let Some(kind) = self.decls.get(name) {
                    return Ok((name.to_string(), *kind));
                }
            }
        }
        Err(ResolveError::UnknownType {
            name: name.to_string(),
            module: raw.name.clone(),
        })
    }

    fn resolve_ty(&self, raw: &RawModule, ty: &ast::Ty) -> Result<TypeRef> {
        Ok(match ty {
            ast::Ty::Bool => TypeRef::Bool,
            ast::Ty::Byte => TypeRef::Byte,
            ast::Ty::I16 => TypeRef::I16,
            ast::Ty::I32 => TypeRef::I32,
            ast::Ty::I64 => TypeRef::I64,
            ast::Ty::Double => TypeRef::Double,
            ast::Ty::String => TypeRef::String,
            ast::Ty::Binary => TypeRef::Binary,
            ast::Ty::List(elem) => TypeRef::List(Box::new(self.resolve_ty(raw, elem)?)),
            ast::Ty::Set(elem) => TypeRef::Set(Box::new(self.resolve_ty(raw, elem)?)),
            ast::Ty::Map(key, value) => TypeRef::Map(
                Box::new(self.resolve_ty(raw, key)?),
                Box::new(self.resolve_ty(raw, value)?),
            ),
            ast::Ty::Named(name) => {
                let (qualified, kind) = self.resolve_named(raw, name)?;
                match kind {
                    DeclKind::Enum => TypeRef::Enum(qualified),
                    DeclKind::Struct | DeclKind::Union | DeclKind::Exception => {
                        TypeRef::Struct(qualified)
                    }
                    DeclKind::Typedef => TypeRef::Typedef(qualified),
                    DeclKind::Service | DeclKind::Const => {
                        return Err(ResolveError::NotAType {
                            name: qualified,
                            kind: kind.name(),
                        })
                    }
                }
            }
        })
    }

    /// Alias expansion against the partially built registry.
    fn see_through(&self, ty: &TypeRef) -> TypeRef {
        let mut current = ty.clone();
        let mut seen = HashSet::new();
        while let TypeRef::Typedef(name) = &current {
            if !seen.insert(name.clone()) {
                break; // cycle reported separately
            }
            match self.registry.get(name) {
                Some(NamedType::Typedef(def)) => current = def.target.clone(),
                _ => break,
            }
        }
        current
    }

    // ── pass 2: definitions ─────────────────────────────────────────

    fn build_enums(&mut self) {
        for i in 0..self.raws.len() {
            let raw = &self.raws[i];
            let mut built = Vec::new();
            for def in &raw.doc.definitions {
                let Definition::Enum(decl) = def else { continue };
                let qualified = format!("{}.{}", raw.name, decl.name);
                let mut members: Vec<(String, i32)> = Vec::new();
                let mut next = 0i32;
                let mut ok = true;
                for member in &decl.members {
                    let value = member.value.unwrap_or(next);
                    next = value.saturating_add(1);
                    if members.iter().any(|(_, v)| *v == value) {
                        self.errors.push(ResolveError::DuplicateEnumValue {
                            name: qualified.clone(),
                            value,
                        });
                        ok = false;
                        continue;
                    }
                    if members.iter().any(|(n, _)| n == &member.name) {
                        self.errors.push(ResolveError::DuplicateName {
                            name: format!("{}.{}", qualified, member.name),
                        });
                        ok = false;
                        continue;
                    }
                    members.push((member.name.clone(), value));
                }
                if ok {
                    built.push(EnumDef {
                        name: qualified,
                        members,
                    });
                }
            }
            for def in built {
                let name = def.name.clone();
                if let Err(e) = self.registry.insert(name, NamedType::Enum(Arc::new(def))) {
                    self.errors.push(e);
                }
            }
        }
    }

    fn build_typedefs(&mut self) {
        for i in 0..self.raws.len() {
            let raw = &self.raws[i];
            let mut built = Vec::new();
            for def in &raw.doc.definitions {
                let Definition::Typedef(decl) = def else { continue };
                let qualified = format!("{}.{}", raw.name, decl.name);
                match self.resolve_ty(raw, &decl.ty) {
                    Ok(target) => built.push(TypedefDef {
                        name: qualified,
                        target,
                    }),
                    Err(e) => self.errors.push(e),
                }
            }
            for def in built {
                let name = def.name.clone();
                if let Err(e) = self.registry.insert(name, NamedType::Typedef(Arc::new(def))) {
                    self.errors.push(e);
                }
            }
        }
        self.check_typedef_cycles();
    }

    fn check_typedef_cycles(&mut self) {
        let names: Vec<String> = self
            .decls
            .iter()
            .filter(|(_, k)| **k == DeclKind::Typedef)
            .map(|(n, _)| n.clone())
            .collect();
        // Each cycle is reported once, for whichever member is walked first.
        let mut reported: HashSet<String> = HashSet::new();
        for name in names {
            if reported.contains(&name) {
                continue;
            }
            let mut seen = HashSet::new();
            let mut current = name.clone();
            loop {
                if !seen.insert(current.clone()) {
                    reported.extend(seen);
                    self.errors.push(ResolveError::TypedefCycle { name });
                    break;
                }
                match self.registry.get(&current) {
                    Some(NamedType::Typedef(def)) => match &def.target {
                        TypeRef::Typedef(next) => current = next.clone(),
                        _ => break,
                    },
                    _ => break,
                }
            }
        }
    }

    fn build_constants(&mut self) {
        // Constants go into the table as they evaluate, in module load order
        // and declaration order, so later constants can reference earlier
        // ones.
        for i in 0..self.raws.len() {
            let raw = &self.raws[i];
            for def in &raw.doc.definitions {
                let Definition::Const(decl) = def else { continue };
                let result = self.resolve_ty(raw, &decl.ty).and_then(|ty| {
                    let value = self.eval_const(raw, &decl.name, &ty, &decl.value)?;
                    Ok(ConstDef {
                        name: decl.name.clone(),
                        ty,
                        value,
                    })
                });
                match result {
                    Ok(built) => {
                        self.constants
                            .insert(format!("{}.{}", raw.name, built.name), built);
                    }
                    Err(e) => self.errors.push(e),
                }
            }
        }
    }

    fn eval_const(
        &self,
        raw: &RawModule,
        name: &str,
        ty: &TypeRef,
        expr: &ConstExpr,
    ) -> Result<ConstValue> {
        let ty = self.see_through(ty);
        let mismatch = |found: &str| ResolveError::ConstTypeMismatch {
            name: name.to_string(),
            expected: describe_type(&ty),
            found: found.to_string(),
        };
        match (&ty, expr) {
            (TypeRef::Bool, ConstExpr::Int(v)) if *v == 0 || *v == 1 => {
                Ok(ConstValue::Bool(*v == 1))
            }
            (TypeRef::Bool, ConstExpr::Ident(s)) if s == "true" || s == "false" => {
                Ok(ConstValue::Bool(s == "true"))
            }
            (TypeRef::Byte, ConstExpr::Int(v)) => {
                i8::try_from(*v).map_err(|_| mismatch("out-of-range integer"))?;
                Ok(ConstValue::Int(*v))
            }
            (TypeRef::I16, ConstExpr::Int(v)) => {
                i16::try_from(*v).map_err(|_| mismatch("out-of-range integer"))?;
                Ok(ConstValue::Int(*v))
            }
            (TypeRef::I32, ConstExpr::Int(v)) => {
                i32::try_from(*v).map_err(|_| mismatch("out-of-range integer"))?;
                Ok(ConstValue::Int(*v))
            }
            (TypeRef::I64, ConstExpr::Int(v)) => Ok(ConstValue::Int(*v)),
            (TypeRef::Double, ConstExpr::Int(v)) => Ok(ConstValue::Double(*v as f64)),
            (TypeRef::Double, ConstExpr::Double(v)) => Ok(ConstValue::Double(*v)),
            (TypeRef::String, ConstExpr::Str(s)) | (TypeRef::Binary, ConstExpr::Str(s)) => {
                Ok(ConstValue::Str(s.clone()))
            }
            (TypeRef::Enum(enum_name), ConstExpr::Int(v)) => {
                let value =
                    i32::try_from(*v).map_err(|_| mismatch("out-of-range integer"))?;
                let def = self.expect_enum(enum_name)?;
                if def.symbol_of(value).is_none() {
                    return Err(ResolveError::UnknownEnumMember {
                        enum_name: enum_name.clone(),
                        member: value.to_string(),
                    });
                }
                Ok(ConstValue::Int(*v))
            }
            (TypeRef::Enum(enum_name), ConstExpr::Ident(s)) => {
                let member = s.rsplit('.').next().unwrap_or(s.as_str());
                let def = self.expect_enum(enum_name)?;
                match def.value_of(member) {
                    Some(value) => Ok(ConstValue::Int(value as i64)),
                    None => Err(ResolveError::UnknownEnumMember {
                        enum_name: enum_name.clone(),
                        member: member.to_string(),
                    }),
                }
            }
            (TypeRef::List(elem), ConstExpr::List(items))
            | (TypeRef::Set(elem), ConstExpr::List(items)) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.eval_const(raw, name, elem, item)?);
                }
                Ok(ConstValue::List(out))
            }
            (TypeRef::Map(key_ty, value_ty), ConstExpr::Map(pairs)) => {
                let mut out = Vec::with_capacity(pairs.len());
                for (k, v) in pairs {
                    out.push((
                        self.eval_const(raw, name, key_ty, k)?,
                        self.eval_const(raw, name, value_ty, v)?,
                    ));
                }
                Ok(ConstValue::Map(out))
            }
            (TypeRef::Struct(struct_name), ConstExpr::Map(pairs)) => {
                // Struct constants are written as map literals keyed by field name.
                let strukt = struct_name.clone();
                let mut out = Vec::with_capacity(pairs.len());
                for (k, v) in pairs {
                    let ConstExpr::Str(field_name) = k else {
                        return Err(mismatch("non-string struct field key"));
                    };
                    let field_ty = self
                        .field_ty_by_name(&strukt, field_name)
                        .ok_or_else(|| mismatch(&format!("unknown field `{}`", field_name)))?;
                    out.push((
                        ConstValue::Str(field_name.clone()),
                        self.eval_const(raw, name, &field_ty, v)?,
                    ));
                }
                Ok(ConstValue::Map(out))
            }
            (_, ConstExpr::Ident(s)) => {
                // A reference to another constant, or to an enum member used
                // as an integer.
                if let Some(def) = self.lookup_const(raw, s) {
                    if const_matches(&ty, &def.value) {
                        return Ok(def.value.clone());
                    }
                    return Err(mismatch(&format!("constant `{}`", s)));
                }
                if matches!(ty, TypeRef::Byte | TypeRef::I16 | TypeRef::I32 | TypeRef::I64) {
                    if let Some((prefix, member)) = s.rsplit_once('.') {
                        if let Ok((qualified, DeclKind::Enum)) = self.resolve_named(raw, prefix) {
                            let def = self.expect_enum(&qualified)?;
                            if let Some(value) = def.value_of(member) {
                                return Ok(ConstValue::Int(value as i64));
                            }
                        }
                    }
                }
                Err(ResolveError::UnknownConst {
                    name: s.to_string(),
                })
            }
            (_, found) => Err(mismatch(describe_expr(found))),
        }
    }

    fn expect_enum(&self, qualified: &str) -> Result<Arc<EnumDef>> {
        match self.registry.get(qualified) {
            Some(NamedType::Enum(def)) => Ok(Arc::clone(def)),
            _ => Err(ResolveError::UnknownType {
                name: qualified.to_string(),
                module: String::new(),
            }),
        }
    }

    /// The type of `strukt.field_name`, from the raw declarations (struct
    /// bodies are not in the registry yet while constants evaluate). Type
    /// names resolve in the declaring module's context.
    fn field_ty_by_name(&self, strukt: &str, field_name: &str) -> Option<TypeRef> {
        let (module_name, local) = strukt.split_once('.')?;
        let module = self.raws.iter().find(|m| m.name == module_name)?;
        for def in &module.doc.definitions {
            let Definition::Struct(decl) = def else { continue };
            if decl.name != local {
                continue;
            }
            let field = decl.fields.iter().find(|f| f.name == field_name)?;
            return self.resolve_ty(module, &field.ty).ok();
        }
        None
    }

    fn lookup_const(&self, raw: &RawModule, name: &str) -> Option<&ConstDef> {
        if let Some(def) = self.constants.get(&format!("{}.{}", raw.name, name)) {
            return Some(def);
        }
        if let Some((first, _)) = name.split_once('.') {
            if raw.include_names.iter().any(|n| n == first) {
                return self.constants.get(name);
            }
        }
        None
    }

    fn build_structs(&mut self) {
        for i in 0..self.raws.len() {
            let raw = &self.raws[i];
            let mut built = Vec::new();
            for def in &raw.doc.definitions {
                let Definition::Struct(decl) = def else { continue };
                let qualified = format!("{}.{}", raw.name, decl.name);
                let (fields, errors) =
                    self.build_fields(raw, &qualified, &decl.fields, decl.kind == StructKind::Union);
                if errors.is_empty() {
                    built.push(StructDef {
                        name: qualified,
                        kind: decl.kind,
                        fields,
                    });
                } else {
                    self.errors.extend(errors);
                }
            }
            for def in built {
                let name = def.name.clone();
                if let Err(e) = self.registry.insert(name, NamedType::Struct(Arc::new(def))) {
                    self.errors.push(e);
                }
            }
        }
    }

    /// Shared by struct bodies, method args, and throws clauses.
    fn build_fields(
        &self,
        raw: &RawModule,
        owner: &str,
        decls: &[ast::FieldDecl],
        union: bool,
    ) -> (Vec<FieldDef>, Vec<ResolveError>) {
        let mut errors = Vec::new();
        let mut fields: Vec<FieldDef> = Vec::new();

        let explicit: HashSet<i16> = decls.iter().filter_map(|f| f.id).collect();
        let mut next_auto = -1i16;

        for decl in decls {
            let id = match decl.id {
                Some(id) if id > 0 => id,
                Some(id) if id < 0 && self.config.allow_legacy_negative_ids => id,
                Some(id) => {
                    errors.push(ResolveError::NonPositiveFieldId {
                        strukt: owner.to_string(),
                        field: decl.name.clone(),
                        id,
                    });
                    continue;
                }
                None => {
                    while explicit.contains(&next_auto) {
                        next_auto -= 1;
                    }
                    let id = next_auto;
                    next_auto -= 1;
                    tracing::warn!(
                        owner,
                        field = %decl.name,
                        id,
                        "field declared without an id; auto-assigning a negative id"
                    );
                    id
                }
            };

            let requiredness = if union {
                if decl.requiredness == Some(Requiredness::Required) {
                    errors.push(ResolveError::RequiredUnionField {
                        union: owner.to_string(),
                        field: decl.name.clone(),
                    });
                    continue;
                }
                Requiredness::Optional
            } else {
                decl.requiredness.unwrap_or(Requiredness::Default)
            };

            let ty = match self.resolve_ty(raw, &decl.ty) {
                Ok(ty) => ty,
                Err(e) => {
                    errors.push(e);
                    continue;
                }
            };

            let default = match &decl.default {
                Some(expr) => match self.eval_const(raw, &decl.name, &ty, expr) {
                    Ok(value) => Some(value),
                    Err(e) => {
                        errors.push(e);
                        continue;
                    }
                },
                None => None,
            };

            if fields.iter().any(|f| f.id == id) {
                errors.push(ResolveError::DuplicateFieldId {
                    strukt: owner.to_string(),
                    id,
                });
                continue;
            }

            fields.push(FieldDef {
                id,
                name: decl.name.clone(),
                requiredness,
                ty,
                default,
            });
        }

        (fields, errors)
    }

    fn build_services(&mut self) {
        // Detect inheritance cycles on the name graph before building bodies.
        let mut extends_map: HashMap<String, String> = HashMap::new();
        for raw in &self.raws {
            for def in &raw.doc.definitions {
                let Definition::Service(decl) = def else { continue };
                let qualified = format!("{}.{}", raw.name, decl.name);
                if let Some(parent) = &decl.extends {
                    if let Ok((parent_q, kind)) = self.resolve_named(raw, parent) {
                        if kind == DeclKind::Service {
                            extends_map.insert(qualified, parent_q);
                        }
                    }
                }
            }
        }
        let mut cycle_errors = Vec::new();
        for start in extends_map.keys() {
            let mut seen = HashSet::new();
            let mut current = start.clone();
            while let Some(parent) = extends_map.get(&current) {
                if !seen.insert(current.clone()) {
                    cycle_errors.push(ResolveError::ServiceCycle {
                        service: start.clone(),
                    });
                    break;
                }
                current = parent.clone();
            }
        }
        self.errors.extend(cycle_errors);

        for i in 0..self.raws.len() {
            let raw = &self.raws[i];
            let mut built = Vec::new();
            for def in &raw.doc.definitions {
                let Definition::Service(decl) = def else { continue };
                let qualified = format!("{}.{}", raw.name, decl.name);
                match self.build_service(raw, &qualified, decl) {
                    Ok(service) => built.push(service),
                    Err(e) => self.errors.push(e),
                }
            }
            for def in built {
                let name = def.name.clone();
                if let Err(e) = self
                    .registry
                    .insert(name, NamedType::Service(Arc::new(def)))
                {
                    self.errors.push(e);
                }
            }
        }
    }

    fn build_service(
        &self,
        raw: &RawModule,
        qualified: &str,
        decl: &ast::ServiceDecl,
    ) -> Result<ServiceDef> {
        let extends = match &decl.extends {
            Some(parent) => {
                let (parent_q, kind) = self.resolve_named(raw, parent)?;
                if kind != DeclKind::Service {
                    return Err(ResolveError::NotAType {
                        name: parent_q,
                        kind: kind.name(),
                    });
                }
                Some(parent_q)
            }
            None => None,
        };

        let mut methods: Vec<Arc<MethodDef>> = Vec::new();
        for method in &decl.methods {
            if methods.iter().any(|m| m.name == method.name) {
                return Err(ResolveError::DuplicateName {
                    name: format!("{}.{}", qualified, method.name),
                });
            }
            methods.push(Arc::new(self.build_method(raw, qualified, method)?));
        }

        Ok(ServiceDef {
            name: qualified.to_string(),
            extends,
            methods,
        })
    }

    fn build_method(
        &self,
        raw: &RawModule,
        service: &str,
        decl: &ast::MethodDecl,
    ) -> Result<MethodDef> {
        if decl.oneway && (decl.returns.is_some() || !decl.throws.is_empty()) {
            return Err(ResolveError::OnewayWithResult {
                method: format!("{}.{}", service, decl.name),
            });
        }

        let returns = match &decl.returns {
            Some(ty) => Some(self.resolve_ty(raw, ty)?),
            None => None,
        };

        let args_name = format!("{}.{}_args", service, decl.name);
        let (args_fields, errors) = self.build_fields(raw, &args_name, &decl.args, false);
        if let Some(first) = errors.into_iter().next() {
            return Err(first);
        }
        let args = Arc::new(StructDef {
            name: args_name,
            kind: StructKind::Struct,
            fields: args_fields,
        });

        let result_name = format!("{}.{}_result", service, decl.name);
        let (throw_fields, errors) = self.build_fields(raw, &result_name, &decl.throws, false);
        if let Some(first) = errors.into_iter().next() {
            return Err(first);
        }
        let mut result_fields = Vec::new();
        if let Some(ret) = &returns {
            result_fields.push(FieldDef {
                id: SUCCESS_FIELD_ID,
                name: "success".to_string(),
                requiredness: Requiredness::Optional,
                ty: ret.clone(),
                default: None,
            });
        }
        for mut field in throw_fields {
            // Declared exceptions are present only when thrown.
            field.requiredness = Requiredness::Optional;
            result_fields.push(field);
        }
        let result = Arc::new(StructDef {
            name: result_name,
            kind: StructKind::Struct,
            fields: result_fields,
        });

        Ok(MethodDef {
            name: decl.name.clone(),
            oneway: decl.oneway,
            returns,
            args,
            result,
        })
    }

    fn build_modules(&mut self) -> BTreeMap<String, Arc<Module>> {
        let mut modules = BTreeMap::new();
        for raw in &self.raws {
            let mut constants = BTreeMap::new();
            let mut type_names = Vec::new();
            let mut service_names = Vec::new();
            for def in &raw.doc.definitions {
                match def {
                    Definition::Const(decl) => {
                        let key = format!("{}.{}", raw.name, decl.name);
                        if let Some(def) = self.constants.get(&key) {
                            constants.insert(decl.name.clone(), def.clone());
                        }
                    }
                    Definition::Enum(d) => {
                        type_names.push(format!("{}.{}", raw.name, d.name));
                    }
                    Definition::Typedef(d) => {
                        type_names.push(format!("{}.{}", raw.name, d.name));
                    }
                    Definition::Struct(d) => {
                        type_names.push(format!("{}.{}", raw.name, d.name));
                    }
                    Definition::Service(d) => {
                        service_names.push(format!("{}.{}", raw.name, d.name));
                    }
                }
            }
            modules.insert(
                raw.name.clone(),
                Arc::new(Module {
                    name: raw.name.clone(),
                    path: raw.path.clone(),
                    includes: raw.include_names.clone(),
                    namespaces: raw.doc.namespaces.clone(),
                    constants,
                    type_names,
                    service_names,
                }),
            );
        }
        modules
    }
}

fn describe_type(ty: &TypeRef) -> String {
    match ty {
        TypeRef::Bool => "bool".into(),
        TypeRef::Byte => "byte".into(),
        TypeRef::I16 => "i16".into(),
        TypeRef::I32 => "i32".into(),
        TypeRef::I64 => "i64".into(),
        TypeRef::Double => "double".into(),
        TypeRef::String => "string".into(),
        TypeRef::Binary => "binary".into(),
        TypeRef::List(e) => format!("list<{}>", describe_type(e)),
        TypeRef::Set(e) => format!("set<{}>", describe_type(e)),
        TypeRef::Map(k, v) => format!("map<{}, {}>", describe_type(k), describe_type(v)),
        TypeRef::Enum(n) | TypeRef::Struct(n) | TypeRef::Typedef(n) | TypeRef::Service(n) => {
            n.clone()
        }
    }
}

fn describe_expr(expr: &ConstExpr) -> &'static str {
    match expr {
        ConstExpr::Int(_) => "integer literal",
        ConstExpr::Double(_) => "double literal",
        ConstExpr::Str(_) => "string literal",
        ConstExpr::Ident(_) => "identifier",
        ConstExpr::List(_) => "list literal",
        ConstExpr::Map(_) => "map literal",
    }
}

/// Shallow structural agreement between a type and an evaluated constant.
fn const_matches(ty: &TypeRef, value: &ConstValue) -> bool {
    matches!(
        (ty, value),
        (TypeRef::Bool, ConstValue::Bool(_))
            | (TypeRef::Byte, ConstValue::Int(_))
            | (TypeRef::I16, ConstValue::Int(_))
            | (TypeRef::I32, ConstValue::Int(_))
            | (TypeRef::I64, ConstValue::Int(_))
            | (TypeRef::Enum(_), ConstValue::Int(_))
            | (TypeRef::Double, ConstValue::Double(_))
            | (TypeRef::String, ConstValue::Str(_))
            | (TypeRef::Binary, ConstValue::Str(_))
            | (TypeRef::List(_), ConstValue::List(_))
            | (TypeRef::Set(_), ConstValue::List(_))
            | (TypeRef::Map(..), ConstValue::Map(_))
            | (TypeRef::Struct(_), ConstValue::Map(_))
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(source: &str) -> Schema {
        Resolver::new(RuntimeConfig::default())
            .load_str("test", source)
            .unwrap()
    }

    fn resolve_err(source: &str) -> ResolveError {
        Resolver::new(RuntimeConfig::default())
            .load_str("test", source)
            .unwrap_err()
    }

    #[test]
    fn test_enum_auto_values() {
        let schema = resolve("enum E { A, B, C = 10, D }");
        let def = schema.enum_def("test.E").unwrap();
        assert_eq!(
            def.members,
            vec![
                ("A".into(), 0),
                ("B".into(), 1),
                ("C".into(), 10),
                ("D".into(), 11)
            ]
        );
        assert_eq!(def.default_symbol(), Some("A"));
    }

    #[test]
    fn test_duplicate_enum_value_rejected() {
        let err = resolve_err("enum E { A = 1, B = 1 }");
        assert!(matches!(err, ResolveError::DuplicateEnumValue { .. }));
    }

    #[test]
    fn test_typedef_transparency() {
        let schema = resolve("typedef i32 timestamp\nstruct S { 1: timestamp t }");
        let def = schema.struct_def("test.S").unwrap();
        let ty = &def.fields[0].ty;
        assert_eq!(ty, &TypeRef::Typedef("test.timestamp".into()));
        assert_eq!(schema.resolve_alias(ty), &TypeRef::I32);
    }

    #[test]
    fn test_typedef_cycle_rejected() {
        let err = resolve_err("typedef a b\ntypedef b a");
        assert!(matches!(err, ResolveError::TypedefCycle { .. }));
    }

    #[test]
    fn test_recursive_struct() {
        let schema = resolve("struct Node { 1: i32 value, 2: optional Node next }");
        let def = schema.struct_def("test.Node").unwrap();
        assert_eq!(def.fields[1].ty, TypeRef::Struct("test.Node".into()));
    }

    #[test]
    fn test_auto_assigned_negative_ids() {
        let schema = resolve("struct S { i32 a, 2: i32 b, i32 c }");
        let def = schema.struct_def("test.S").unwrap();
        let ids: Vec<i16> = def.fields.iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![-1, 2, -2]);
    }

    #[test]
    fn test_explicit_negative_id_rejected_by_default() {
        let err = resolve_err("struct S { -1: i32 a }");
        assert!(matches!(err, ResolveError::NonPositiveFieldId { id: -1, .. }));
    }

    #[test]
    fn test_explicit_negative_id_allowed_when_legacy() {
        let config = RuntimeConfig {
            allow_legacy_negative_ids: true,
            ..RuntimeConfig::default()
        };
        let schema = Resolver::new(config)
            .load_str("test", "struct S { -1: i32 a }")
            .unwrap();
        assert_eq!(schema.struct_def("test.S").unwrap().fields[0].id, -1);
    }

    #[test]
    fn test_zero_field_id_always_rejected() {
        let config = RuntimeConfig {
            allow_legacy_negative_ids: true,
            ..RuntimeConfig::default()
        };
        let err = Resolver::new(config)
            .load_str("test", "struct S { 0: i32 a }")
            .unwrap_err();
        assert!(matches!(err, ResolveError::NonPositiveFieldId { id: 0, .. }));
    }

    #[test]
    fn test_duplicate_field_id_rejected() {
        let err = resolve_err("struct S { 1: i32 a, 1: i32 b }");
        assert!(matches!(err, ResolveError::DuplicateFieldId { id: 1, .. }));
    }

    #[test]
    fn test_union_fields_forced_optional() {
        let schema = resolve("union U { 1: i32 a, 2: string b }");
        let def = schema.struct_def("test.U").unwrap();
        assert!(def.is_union());
        assert!(def.fields.iter().all(|f| f.requiredness == Requiredness::Optional));
    }

    #[test]
    fn test_union_required_field_rejected() {
        let err = resolve_err("union U { 1: required i32 a }");
        assert!(matches!(err, ResolveError::RequiredUnionField { .. }));
    }

    #[test]
    fn test_unknown_type() {
        let err = resolve_err("struct S { 1: Missing m }");
        assert!(matches!(err, ResolveError::UnknownType { .. }));
    }

    #[test]
    fn test_const_enum_member() {
        let schema = resolve("enum E { A, B }\nconst E DEFAULT = E.B");
        let module = schema.module("test").unwrap();
        assert_eq!(
            module.constant("DEFAULT").unwrap().value,
            ConstValue::Int(1)
        );
    }

    #[test]
    fn test_const_containers() {
        let schema = resolve(
            "const list<i32> XS = [1, 2, 3]\nconst map<string, i32> M = {\"a\": 1}",
        );
        let module = schema.module("test").unwrap();
        assert_eq!(
            module.constant("XS").unwrap().value,
            ConstValue::List(vec![
                ConstValue::Int(1),
                ConstValue::Int(2),
                ConstValue::Int(3)
            ])
        );
    }

    #[test]
    fn test_const_reference() {
        let schema = resolve("const i32 A = 5\nconst i32 B = A");
        let module = schema.module("test").unwrap();
        assert_eq!(module.constant("B").unwrap().value, ConstValue::Int(5));
    }

    #[test]
    fn test_const_type_mismatch() {
        let err = resolve_err("const i32 X = \"nope\"");
        assert!(matches!(err, ResolveError::ConstTypeMismatch { .. }));
    }

    #[test]
    fn test_struct_const_default() {
        let schema = resolve(
            "struct P { 1: string name, 2: i32 age }\nconst P DEFAULT_P = {\"name\": \"bob\", \"age\": 3}",
        );
        let module = schema.module("test").unwrap();
        assert!(matches!(
            module.constant("DEFAULT_P").unwrap().value,
            ConstValue::Map(_)
        ));
    }

    #[test]
    fn test_service_methods_and_result_synthesis() {
        let schema = resolve(
            "exception NotFound { 1: string message }\nservice Store {\n  string get(1: string key) throws (1: NotFound missing)\n  oneway void poke()\n}",
        );
        let method = schema.method("test.Store", "get").unwrap();
        assert_eq!(method.args.fields.len(), 1);
        assert_eq!(method.args.fields[0].id, 1);
        let success = method.success_field().unwrap();
        assert_eq!(success.ty, TypeRef::String);
        let throws: Vec<_> = method.throws().collect();
        assert_eq!(throws.len(), 1);
        assert_eq!(throws[0].ty, TypeRef::Struct("test.NotFound".into()));
        assert_eq!(throws[0].requiredness, Requiredness::Optional);

        let poke = schema.method("test.Store", "poke").unwrap();
        assert!(poke.oneway);
        assert!(poke.result.fields.is_empty());
    }

    #[test]
    fn test_oneway_with_result_rejected() {
        let err = resolve_err("service S { oneway i32 bad() }");
        assert!(matches!(err, ResolveError::OnewayWithResult { .. }));
    }

    #[test]
    fn test_service_extends_lookup() {
        let schema = resolve(
            "service Base { bool ping() }\nservice Child extends Base { bool hello() }",
        );
        assert!(schema.method("test.Child", "ping").is_some());
        assert_eq!(schema.service_methods("test.Child").len(), 2);
    }

    #[test]
    fn test_service_cycle_rejected() {
        let err = resolve_err(
            "service A extends B { bool x() }\nservice B extends A { bool y() }",
        );
        assert!(matches!(
            err,
            ResolveError::Multiple(_) | ResolveError::ServiceCycle { .. }
        ));
    }

    #[test]
    fn test_includes_and_qualified_names() {
        let dir = tempfile::tempdir().unwrap();
        let shared = dir.path().join("shared.thrift");
        std::fs::write(&shared, "enum Color { RED, GREEN }\n").unwrap();
        let root = dir.path().join("root.thrift");
        std::fs::write(
            &root,
            "include \"shared.thrift\"\nstruct S { 1: shared.Color c = shared.Color.GREEN }\n",
        )
        .unwrap();

        let schema = Resolver::new(RuntimeConfig::default()).load(&root).unwrap();
        let def = schema.struct_def("root.S").unwrap();
        assert_eq!(def.fields[0].ty, TypeRef::Enum("shared.Color".into()));
        assert_eq!(def.fields[0].default, Some(ConstValue::Int(1)));
        assert!(schema.module("shared").is_some());
    }

    #[test]
    fn test_include_cycle_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.thrift");
        let b = dir.path().join("b.thrift");
        std::fs::write(&a, "include \"b.thrift\"\n").unwrap();
        std::fs::write(&b, "include \"a.thrift\"\n").unwrap();

        let err = Resolver::new(RuntimeConfig::default()).load(&a).unwrap_err();
        assert!(matches!(err, ResolveError::IncludeCycle { .. }));
    }

    #[test]
    fn test_include_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("root.thrift");
        std::fs::write(&root, "include \"missing.thrift\"\n").unwrap();
        let err = Resolver::new(RuntimeConfig::default()).load(&root).unwrap_err();
        assert!(matches!(err, ResolveError::IncludeNotFound { .. }));
    }
}
