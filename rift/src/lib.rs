//! Schema-driven Thrift runtime.
//!
//! Loads `.thrift` IDL files into an immutable [`schema::Schema`], encodes and
//! decodes dynamic [`value::Value`]s over the binary, compact, and JSON wire
//! protocols, and dispatches RPC calls through [`rpc::Processor`].

pub mod config;
pub mod error;
pub mod idl;
pub mod protocol;
pub mod rpc;
pub mod schema;
pub mod transport;
pub mod value;

pub use config::RuntimeConfig;
pub use error::{Result, RiftError};
pub use schema::{load_schema, Schema};
pub use value::{StructValue, Value};
