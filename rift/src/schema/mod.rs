//! Runtime type model: the immutable schema graph built from parsed IDL.

pub mod registry;
pub mod resolver;
pub mod types;

pub use registry::{NamedType, TypeRegistry};
pub use resolver::{ResolveError, Resolver};
pub use types::{
    ConstDef, ConstValue, EnumDef, FieldDef, MethodDef, Module, Requiredness, Schema, ServiceDef,
    StructDef, StructKind, TypeRef, TypedefDef, SUCCESS_FIELD_ID,
};

use crate::config::RuntimeConfig;
use crate::error::Result;
use std::path::Path;

/// Loads a root `.thrift` file and everything it includes into a [`Schema`].
///
/// Convenience wrapper over [`Resolver`] with default configuration.
pub fn load_schema(path: impl AsRef<Path>) -> Result<Schema> {
    let resolver = Resolver::new(RuntimeConfig::default());
    Ok(resolver.load(path.as_ref())?)
}
