//! RPC machinery: the application-exception envelope, the request
//! processor, and a blocking thread-per-connection server.

pub mod processor;
pub mod server;

pub use processor::{Handler, HandlerError, HandlerResult, Processor};
pub use server::{FramingKind, ProtocolKind, ThreadedServer};

use thiserror::Error;

use crate::protocol::{skip, Protocol, ProtocolResult, WireType};

/// Kinds carried in the `type` field of an application exception.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplicationErrorKind {
    Unknown = 0,
    UnknownMethod = 1,
    InvalidMessageType = 2,
    WrongMethodName = 3,
    BadSequenceId = 4,
    MissingResult = 5,
    InternalError = 6,
    ProtocolError = 7,
}

impl ApplicationErrorKind {
    pub fn from_i32(v: i32) -> Self {
        match v {
            1 => ApplicationErrorKind::UnknownMethod,
            2 => ApplicationErrorKind::InvalidMessageType,
            3 => ApplicationErrorKind::WrongMethodName,
            4 => ApplicationErrorKind::BadSequenceId,
            5 => ApplicationErrorKind::MissingResult,
            6 => ApplicationErrorKind::InternalError,
            7 => ApplicationErrorKind::ProtocolError,
            _ => ApplicationErrorKind::Unknown,
        }
    }
}

/// A well-formed `EXCEPTION` message payload.
///
/// Wire shape: field 1 `message: string`, field 2 `type: i32`.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{kind:?}: {message}")]
pub struct ApplicationError {
    pub kind: ApplicationErrorKind,
    pub message: String,
}

impl ApplicationError {
    pub fn new(kind: ApplicationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Decodes the exception struct from the current message body.
    pub fn read(prot: &mut dyn Protocol) -> ProtocolResult<Self> {
        let mut message = String::new();
        let mut kind = ApplicationErrorKind::Unknown;
        prot.read_struct_begin()?;
        while let Some(header) = prot.read_field_begin()? {
            match (header.id, header.ty) {
                (1, WireType::String) => message = prot.read_string()?,
                (2, WireType::I32) => kind = ApplicationErrorKind::from_i32(prot.read_i32()?),
                _ => skip(prot, header.ty)?,
            }
            prot.read_field_end()?;
        }
        prot.read_struct_end()?;
        Ok(Self { kind, message })
    }

    /// Encodes the exception struct as the current message body.
    pub fn write(&self, prot: &mut dyn Protocol) -> ProtocolResult<()> {
        prot.write_struct_begin("TApplicationException")?;
        prot.write_field_begin(WireType::String, 1)?;
        prot.write_string(&self.message)?;
        prot.write_field_end()?;
        prot.write_field_begin(WireType::I32, 2)?;
        prot.write_i32(self.kind as i32)?;
        prot.write_field_end()?;
        prot.write_field_stop()?;
        prot.write_struct_end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{BinaryProtocol, CompactProtocol};
    use crate::transport::MemoryTransport;

    #[test]
    fn test_wire_round_trip() {
        let exc = ApplicationError::new(ApplicationErrorKind::UnknownMethod, "no such method");
        let mut prot = BinaryProtocol::new(MemoryTransport::new());
        exc.write(&mut prot).unwrap();
        assert_eq!(ApplicationError::read(&mut prot).unwrap(), exc);

        let mut prot = CompactProtocol::new(MemoryTransport::new());
        exc.write(&mut prot).unwrap();
        assert_eq!(ApplicationError::read(&mut prot).unwrap(), exc);
    }

    #[test]
    fn test_unknown_kind_maps_to_unknown() {
        assert_eq!(
            ApplicationErrorKind::from_i32(42),
            ApplicationErrorKind::Unknown
        );
    }
}
