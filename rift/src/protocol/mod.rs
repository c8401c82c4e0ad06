//! Wire protocol abstraction and the schema-driven value codec.
//!
//! All three protocols (binary, compact, JSON) implement [`Protocol`] over a
//! [`crate::transport::Transport`]; [`codec`] walks struct definitions
//! against dynamic values on top of that surface. A protocol instance is
//! single-threaded with respect to its transport.

pub mod binary;
pub mod codec;
pub mod compact;
pub mod json;

pub use binary::BinaryProtocol;
pub use codec::{read_struct, read_value, write_message, write_struct, write_value};
pub use compact::CompactProtocol;
pub use json::JsonProtocol;

use thiserror::Error;

use crate::transport::TransportError;

/// The 1-byte tag describing a value's shape on the wire.
///
/// Distinct from the logical [`crate::schema::TypeRef`]: enums travel as
/// `I32`, `string` and `binary` share `String`, and typedefs are invisible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireType {
    Bool,
    Byte,
    Double,
    I16,
    I32,
    I64,
    String,
    Struct,
    Map,
    Set,
    List,
}

impl WireType {
    /// Binary-protocol type code.
    pub fn to_u8(self) -> u8 {
        match self {
            WireType::Bool => 2,
            WireType::Byte => 3,
            WireType::Double => 4,
            WireType::I16 => 6,
            WireType::I32 => 8,
            WireType::I64 => 10,
            WireType::String => 11,
            WireType::Struct => 12,
            WireType::Map => 13,
            WireType::Set => 14,
            WireType::List => 15,
        }
    }

    pub fn from_u8(code: u8) -> Result<Self, ProtocolError> {
        Ok(match code {
            2 => WireType::Bool,
            3 => WireType::Byte,
            4 => WireType::Double,
            6 => WireType::I16,
            8 => WireType::I32,
            10 => WireType::I64,
            11 => WireType::String,
            12 => WireType::Struct,
            13 => WireType::Map,
            14 => WireType::Set,
            15 => WireType::List,
            other => {
                return Err(ProtocolError::UnexpectedType {
                    expected: "a wire type code".into(),
                    found: format!("{:#04x}", other),
                })
            }
        })
    }
}

/// RPC message envelope kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Call = 1,
    Reply = 2,
    Exception = 3,
    Oneway = 4,
}

impl MessageKind {
    pub fn from_u8(code: u8) -> Result<Self, ProtocolError> {
        Ok(match code {
            1 => MessageKind::Call,
            2 => MessageKind::Reply,
            3 => MessageKind::Exception,
            4 => MessageKind::Oneway,
            other => return Err(ProtocolError::BadMessageType(other)),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MessageHeader {
    pub name: String,
    pub kind: MessageKind,
    pub seqid: i32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldHeader {
    pub ty: WireType,
    pub id: i16,
}

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("bad protocol version: {0}")]
    BadVersion(String),

    #[error("bad message type {0}")]
    BadMessageType(u8),

    #[error("unexpected type: expected {expected}, found {found}")]
    UnexpectedType { expected: String, found: String },

    #[error("size {size} exceeds limit {limit}")]
    SizeLimit { size: i64, limit: usize },

    #[error("invalid utf-8 in string")]
    BadUtf8,

    #[error("malformed input: {0}")]
    Truncated(String),

    #[error("recursion depth limit exceeded")]
    DepthLimit,

    #[error("required field {field_id} missing on `{strukt}`")]
    RequiredFieldMissing { strukt: String, field_id: i16 },

    #[error("reply carries neither a result nor a declared exception")]
    MissingResult,

    #[error("union `{union}` has {count} fields set")]
    UnionCardinality { union: String, count: usize },

    #[error(transparent)]
    Transport(#[from] TransportError),
}

pub type ProtocolResult<T> = std::result::Result<T, ProtocolError>;

/// The abstract read/write surface all three protocols implement.
///
/// Symmetric begin/end pairs; `read_field_begin` returns `None` on the stop
/// marker. Implementations own their transport and flush through it.
pub trait Protocol {
    fn write_message_begin(&mut self, header: &MessageHeader) -> ProtocolResult<()>;
    fn write_message_end(&mut self) -> ProtocolResult<()>;
    fn write_struct_begin(&mut self, name: &str) -> ProtocolResult<()>;
    fn write_struct_end(&mut self) -> ProtocolResult<()>;
    fn write_field_begin(&mut self, ty: WireType, id: i16) -> ProtocolResult<()>;
    fn write_field_end(&mut self) -> ProtocolResult<()>;
    fn write_field_stop(&mut self) -> ProtocolResult<()>;
    fn write_map_begin(&mut self, key: WireType, value: WireType, size: usize)
        -> ProtocolResult<()>;
    fn write_map_end(&mut self) -> ProtocolResult<()>;
    fn write_list_begin(&mut self, elem: WireType, size: usize) -> ProtocolResult<()>;
    fn write_list_end(&mut self) -> ProtocolResult<()>;
    fn write_set_begin(&mut self, elem: WireType, size: usize) -> ProtocolResult<()>;
    fn write_set_end(&mut self) -> ProtocolResult<()>;
    fn write_bool(&mut self, v: bool) -> ProtocolResult<()>;
    fn write_byte(&mut self, v: i8) -> ProtocolResult<()>;
    fn write_i16(&mut self, v: i16) -> ProtocolResult<()>;
    fn write_i32(&mut self, v: i32) -> ProtocolResult<()>;
    fn write_i64(&mut self, v: i64) -> ProtocolResult<()>;
    fn write_double(&mut self, v: f64) -> ProtocolResult<()>;
    fn write_string(&mut self, v: &str) -> ProtocolResult<()>;
    fn write_binary(&mut self, v: &[u8]) -> ProtocolResult<()>;

    fn read_message_begin(&mut self) -> ProtocolResult<MessageHeader>;
    fn read_message_end(&mut self) -> ProtocolResult<()>;
    fn read_struct_begin(&mut self) -> ProtocolResult<()>;
    fn read_struct_end(&mut self) -> ProtocolResult<()>;
    fn read_field_begin(&mut self) -> ProtocolResult<Option<FieldHeader>>;
    fn read_field_end(&mut self) -> ProtocolResult<()>;
    fn read_map_begin(&mut self) -> ProtocolResult<(WireType, WireType, usize)>;
    fn read_map_end(&mut self) -> ProtocolResult<()>;
    fn read_list_begin(&mut self) -> ProtocolResult<(WireType, usize)>;
    fn read_list_end(&mut self) -> ProtocolResult<()>;
    fn read_set_begin(&mut self) -> ProtocolResult<(WireType, usize)>;
    fn read_set_end(&mut self) -> ProtocolResult<()>;
    fn read_bool(&mut self) -> ProtocolResult<bool>;
    fn read_byte(&mut self) -> ProtocolResult<i8>;
    fn read_i16(&mut self) -> ProtocolResult<i16>;
    fn read_i32(&mut self) -> ProtocolResult<i32>;
    fn read_i64(&mut self) -> ProtocolResult<i64>;
    fn read_double(&mut self) -> ProtocolResult<f64>;
    fn read_string(&mut self) -> ProtocolResult<String>;
    fn read_binary(&mut self) -> ProtocolResult<Vec<u8>>;

    /// Flushes the underlying transport.
    fn flush(&mut self) -> ProtocolResult<()>;

    /// Depth budget for [`skip`] and the value codec.
    fn recursion_limit(&self) -> usize;
}

/// Consumes and discards one value of the given wire type.
///
/// Written entirely in terms of the primitive reads, so it works for every
/// protocol; nested structs and containers are skipped recursively within
/// the protocol's depth budget.
pub fn skip(prot: &mut dyn Protocol, ty: WireType) -> ProtocolResult<()> {
    let limit = prot.recursion_limit();
    skip_depth(prot, ty, limit)
}

fn skip_depth(prot: &mut dyn Protocol, ty: WireType, depth: usize) -> ProtocolResult<()> {
    match ty {
        WireType::Bool => {
            prot.read_bool()?;
        }
        WireType::Byte => {
            prot.read_byte()?;
        }
        WireType::Double => {
            prot.read_double()?;
        }
        WireType::I16 => {
            prot.read_i16()?;
        }
        WireType::I32 => {
            prot.read_i32()?;
        }
        WireType::I64 => {
            prot.read_i64()?;
        }
        WireType::String => {
            prot.read_binary()?;
        }
        WireType::Struct => {
            if depth == 0 {
                return Err(ProtocolError::DepthLimit);
            }
            prot.read_struct_begin()?;
            while let Some(field) = prot.read_field_begin()? {
                skip_depth(prot, field.ty, depth - 1)?;
                prot.read_field_end()?;
            }
            prot.read_struct_end()?;
        }
        WireType::Map => {
            if depth == 0 {
                return Err(ProtocolError::DepthLimit);
            }
            let (key_ty, value_ty, size) = prot.read_map_begin()?;
            for _ in 0..size {
                skip_depth(prot, key_ty, depth - 1)?;
                skip_depth(prot, value_ty, depth - 1)?;
            }
            prot.read_map_end()?;
        }
        WireType::Set => {
            if depth == 0 {
                return Err(ProtocolError::DepthLimit);
            }
            let (elem_ty, size) = prot.read_set_begin()?;
            for _ in 0..size {
                skip_depth(prot, elem_ty, depth - 1)?;
            }
            prot.read_set_end()?;
        }
        WireType::List => {
            if depth == 0 {
                return Err(ProtocolError::DepthLimit);
            }
            let (elem_ty, size) = prot.read_list_begin()?;
            for _ in 0..size {
                skip_depth(prot, elem_ty, depth - 1)?;
            }
            prot.read_list_end()?;
        }
    }
    Ok(())
}
