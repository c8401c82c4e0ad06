use thiserror::Error;

use crate::idl::{LexError, ParseError};
use crate::protocol::ProtocolError;
use crate::rpc::ApplicationError;
use crate::schema::ResolveError;
use crate::transport::TransportError;

/// Umbrella error for the crate-level entry points.
///
/// The individual layers keep their own error types (a schema-build failure
/// can never occur at request time and vice versa); this enum exists so that
/// callers of `load_schema` and friends get a single conversion target.
#[derive(Error, Debug)]
pub enum RiftError {
    #[error("lex error: {0}")]
    Lex(#[from] LexError),

    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("resolve error: {0}")]
    Resolve(#[from] ResolveError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("application error: {0}")]
    Application(#[from] ApplicationError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("unknown service `{0}`")]
    UnknownService(String),

    #[error("unknown method `{0}`")]
    UnknownMethod(String),
}

pub type Result<T> = std::result::Result<T, RiftError>;
