use thiserror::Error;

use rift::protocol::ProtocolError;
use rift::rpc::ApplicationError;
use rift::value::StructValue;

/// What a call can come back with, disjoint and typed.
#[derive(Error, Debug)]
pub enum CallError {
    /// An exception declared in the method's `throws` clause.
    #[error("declared exception `{name}`")]
    Declared { name: String, value: StructValue },

    /// A well-formed `EXCEPTION` message from the server.
    #[error(transparent)]
    Application(#[from] ApplicationError),

    /// Malformed wire data, or a transport failure underneath it.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("unknown service `{0}`")]
    UnknownService(String),

    #[error("unknown method `{0}`")]
    UnknownMethod(String),
}

pub type Result<T> = std::result::Result<T, CallError>;
