//! Schema node definitions.
//!
//! The schema is a closed graph: cross references between named types are
//! qualified-name lookups through [`super::TypeRegistry`], never owning
//! pointers, so recursive and mutually recursive types need no special
//! handling. Everything here is immutable once the resolver returns.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

pub use crate::idl::ast::{Requiredness, StructKind};

use super::registry::{NamedType, TypeRegistry};

/// Reference to a concrete or named type.
///
/// `String` and `Binary` are distinct here even though the binary protocol
/// treats them identically on the wire; JSON (base64) and value typing
/// depend on the distinction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeRef {
    Bool,
    Byte,
    I16,
    I32,
    I64,
    Double,
    String,
    Binary,
    List(Box<TypeRef>),
    Set(Box<TypeRef>),
    Map(Box<TypeRef>, Box<TypeRef>),
    /// Qualified name of an [`EnumDef`].
    Enum(String),
    /// Qualified name of a [`StructDef`] (struct, union, or exception).
    Struct(String),
    /// Qualified name of a [`TypedefDef`]; transparent at wire level.
    Typedef(String),
    /// Qualified name of a [`ServiceDef`]; only legal in `extends` position.
    Service(String),
}

/// Evaluated constant literal, structurally checked against its type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstValue {
    Bool(bool),
    Int(i64),
    Double(f64),
    Str(String),
    List(Vec<ConstValue>),
    Map(Vec<(ConstValue, ConstValue)>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumDef {
    /// Qualified name (`module.Name`).
    pub name: String,
    /// Ordered (symbol, value) pairs as declared; values unique.
    pub members: Vec<(String, i32)>,
}

impl EnumDef {
    pub fn value_of(&self, symbol: &str) -> Option<i32> {
        self.members
            .iter()
            .find(|(name, _)| name == symbol)
            .map(|(_, value)| *value)
    }

    pub fn symbol_of(&self, value: i32) -> Option<&str> {
        self.members
            .iter()
            .find(|(_, v)| *v == value)
            .map(|(name, _)| name.as_str())
    }

    /// The first declared symbol.
    pub fn default_symbol(&self) -> Option<&str> {
        self.members.first().map(|(name, _)| name.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypedefDef {
    /// Qualified name of the alias.
    pub name: String,
    pub target: TypeRef,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstDef {
    pub name: String,
    pub ty: TypeRef,
    pub value: ConstValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    /// The wire key. Positive for declared ids; negative only for
    /// auto-assigned ids on id-less sources.
    pub id: i16,
    pub name: String,
    pub requiredness: Requiredness,
    pub ty: TypeRef,
    pub default: Option<ConstValue>,
}

impl FieldDef {
    pub fn is_required(&self) -> bool {
        self.requiredness == Requiredness::Required
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructDef {
    /// Qualified name (`module.Name`).
    pub name: String,
    pub kind: StructKind,
    /// Declaration order; ids unique within the struct.
    pub fields: Vec<FieldDef>,
}

impl StructDef {
    pub fn field_by_id(&self, id: i16) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.id == id)
    }

    pub fn field_by_name(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn is_union(&self) -> bool {
        self.kind == StructKind::Union
    }
}

/// Field id of the synthesized `success` field in method result structs.
pub const SUCCESS_FIELD_ID: i16 = 0;

#[derive(Debug, Clone)]
pub struct MethodDef {
    pub name: String,
    pub oneway: bool,
    /// `None` for `void`.
    pub returns: Option<TypeRef>,
    /// Synthesized argument struct (`Service.method_args`).
    pub args: Arc<StructDef>,
    /// Synthesized result struct (`Service.method_result`): `success` at
    /// field id 0 plus declared exceptions at their declared ids.
    pub result: Arc<StructDef>,
}

impl MethodDef {
    /// Declared exception fields of the result struct.
    pub fn throws(&self) -> impl Iterator<Item = &FieldDef> {
        self.result.fields.iter().filter(|f| f.id != SUCCESS_FIELD_ID)
    }

    pub fn success_field(&self) -> Option<&FieldDef> {
        self.result.field_by_id(SUCCESS_FIELD_ID)
    }
}

#[derive(Debug, Clone)]
pub struct ServiceDef {
    /// Qualified name (`module.Name`).
    pub name: String,
    /// Qualified name of the parent service, single-inheritance.
    pub extends: Option<String>,
    pub methods: Vec<Arc<MethodDef>>,
}

impl ServiceDef {
    pub fn method(&self, name: &str) -> Option<&Arc<MethodDef>> {
        self.methods.iter().find(|m| m.name == name)
    }
}

/// One `.thrift` file after resolution.
#[derive(Debug, Clone)]
pub struct Module {
    pub name: String,
    pub path: PathBuf,
    /// Names of directly included modules.
    pub includes: Vec<String>,
    /// `namespace` declarations; stored, no runtime effect.
    pub namespaces: Vec<(String, String)>,
    /// Evaluated constants, keyed by local name.
    pub constants: BTreeMap<String, ConstDef>,
    /// Qualified names of types declared here, in declaration order.
    pub type_names: Vec<String>,
    /// Qualified names of services declared here.
    pub service_names: Vec<String>,
}

impl Module {
    pub fn constant(&self, name: &str) -> Option<&ConstDef> {
        self.constants.get(name)
    }
}

/// The immutable root of a resolved module set.
///
/// Built once by the resolver, then shared read-only (`Arc<Schema>`) across
/// however many workers the host runs.
#[derive(Debug, Clone)]
pub struct Schema {
    pub(crate) modules: BTreeMap<String, Arc<Module>>,
    pub(crate) registry: TypeRegistry,
}

impl Schema {
    pub fn module(&self, name: &str) -> Option<&Arc<Module>> {
        self.modules.get(name)
    }

    pub fn modules(&self) -> impl Iterator<Item = &Arc<Module>> {
        self.modules.values()
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn enum_def(&self, qname: &str) -> Option<&Arc<EnumDef>> {
        match self.registry.get(qname) {
            Some(NamedType::Enum(def)) => Some(def),
            _ => None,
        }
    }

    pub fn struct_def(&self, qname: &str) -> Option<&Arc<StructDef>> {
        match self.registry.get(qname) {
            Some(NamedType::Struct(def)) => Some(def),
            _ => None,
        }
    }

    pub fn typedef_def(&self, qname: &str) -> Option<&Arc<TypedefDef>> {
        match self.registry.get(qname) {
            Some(NamedType::Typedef(def)) => Some(def),
            _ => None,
        }
    }

    pub fn service_def(&self, qname: &str) -> Option<&Arc<ServiceDef>> {
        match self.registry.get(qname) {
            Some(NamedType::Service(def)) => Some(def),
            _ => None,
        }
    }

    /// Sees through typedef aliases to the underlying type.
    ///
    /// The resolver guarantees alias chains are acyclic, so this terminates.
    pub fn resolve_alias<'a>(&'a self, ty: &'a TypeRef) -> &'a TypeRef {
        let mut current = ty;
        while let TypeRef::Typedef(name) = current {
            match self.typedef_def(name) {
                Some(def) => current = &def.target,
                None => return current,
            }
        }
        current
    }

    /// Looks up a method on a service, walking the inheritance chain.
    pub fn method(&self, service: &str, name: &str) -> Option<Arc<MethodDef>> {
        let mut current = self.service_def(service);
        while let Some(svc) = current {
            if let Some(method) = svc.method(name) {
                return Some(Arc::clone(method));
            }
            current = svc.extends.as_deref().and_then(|p| self.service_def(p));
        }
        None
    }

    /// All methods a service exposes, including inherited ones.
    pub fn service_methods(&self, service: &str) -> Vec<Arc<MethodDef>> {
        let mut out = Vec::new();
        let mut current = self.service_def(service);
        while let Some(svc) = current {
            out.extend(svc.methods.iter().cloned());
            current = svc.extends.as_deref().and_then(|p| self.service_def(p));
        }
        out
    }
}
