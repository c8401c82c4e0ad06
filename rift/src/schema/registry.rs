//! Registry of named types, keyed by fully-qualified name.

use std::collections::HashMap;
use std::sync::Arc;

use super::resolver::ResolveError;
use super::types::{EnumDef, ServiceDef, StructDef, TypedefDef};

/// A named declaration reachable through the registry.
#[derive(Debug, Clone)]
pub enum NamedType {
    Enum(Arc<EnumDef>),
    Struct(Arc<StructDef>),
    Typedef(Arc<TypedefDef>),
    Service(Arc<ServiceDef>),
}

impl NamedType {
    pub fn kind_name(&self) -> &'static str {
        match self {
            NamedType::Enum(_) => "enum",
            NamedType::Struct(def) => match def.kind {
                super::types::StructKind::Struct => "struct",
                super::types::StructKind::Union => "union",
                super::types::StructKind::Exception => "exception",
            },
            NamedType::Typedef(_) => "typedef",
            NamedType::Service(_) => "service",
        }
    }
}

/// Lookup table for every named declaration in a resolved module set.
///
/// Keys are fully-qualified (`module.Name`). Cross references in the schema
/// store these keys rather than owning pointers, which is what makes
/// recursive struct definitions unremarkable.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: HashMap<String, NamedType>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a named type, rejecting duplicates.
    pub(crate) fn insert(&mut self, name: String, ty: NamedType) -> Result<(), ResolveError> {
        if self.types.contains_key(&name) {
            return Err(ResolveError::DuplicateName { name });
        }
        self.types.insert(name, ty);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&NamedType> {
        self.types.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// All registered qualified names, unordered.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(|s| s.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_rejected() {
        let mut registry = TypeRegistry::new();
        let def = Arc::new(EnumDef {
            name: "m.E".into(),
            members: vec![("A".into(), 0)],
        });
        registry
            .insert("m.E".into(), NamedType::Enum(Arc::clone(&def)))
            .unwrap();
        let err = registry
            .insert("m.E".into(), NamedType::Enum(def))
            .unwrap_err();
        assert!(matches!(err, ResolveError::DuplicateName { .. }));
        assert_eq!(registry.len(), 1);
    }
}
