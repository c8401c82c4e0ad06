//! Thrift compact protocol: varints, zig-zag integers, field-id deltas.

use std::sync::Arc;

use super::{
    FieldHeader, MessageHeader, MessageKind, Protocol, ProtocolError, ProtocolResult, WireType,
};
use crate::config::RuntimeConfig;
use crate::transport::Transport;

const PROTOCOL_ID: u8 = 0x82;
const VERSION: u8 = 1;
const VERSION_MASK: u8 = 0x1f;
const TYPE_SHIFT: u8 = 5;

// Compact type codes; booleans inline their value into the type nibble.
const CT_STOP: u8 = 0x00;
const CT_BOOL_TRUE: u8 = 0x01;
const CT_BOOL_FALSE: u8 = 0x02;
const CT_BYTE: u8 = 0x03;
const CT_I16: u8 = 0x04;
const CT_I32: u8 = 0x05;
const CT_I64: u8 = 0x06;
const CT_DOUBLE: u8 = 0x07;
const CT_BINARY: u8 = 0x08;
const CT_LIST: u8 = 0x09;
const CT_SET: u8 = 0x0a;
const CT_MAP: u8 = 0x0b;
const CT_STRUCT: u8 = 0x0c;

fn compact_type(ty: WireType) -> u8 {
    match ty {
        WireType::Bool => CT_BOOL_TRUE,
        WireType::Byte => CT_BYTE,
        WireType::I16 => CT_I16,
        WireType::I32 => CT_I32,
        WireType::I64 => CT_I64,
        WireType::Double => CT_DOUBLE,
        WireType::String => CT_BINARY,
        WireType::List => CT_LIST,
        WireType::Set => CT_SET,
        WireType::Map => CT_MAP,
        WireType::Struct => CT_STRUCT,
    }
}

fn wire_type(code: u8) -> ProtocolResult<WireType> {
    Ok(match code {
        CT_BOOL_TRUE | CT_BOOL_FALSE => WireType::Bool,
        CT_BYTE => WireType::Byte,
        CT_I16 => WireType::I16,
        CT_I32 => WireType::I32,
        CT_I64 => WireType::I64,
        CT_DOUBLE => WireType::Double,
        CT_BINARY => WireType::String,
        CT_LIST => WireType::List,
        CT_SET => WireType::Set,
        CT_MAP => WireType::Map,
        CT_STRUCT => WireType::Struct,
        other => {
            return Err(ProtocolError::UnexpectedType {
                expected: "a compact type code".into(),
                found: format!("{:#04x}", other),
            })
        }
    })
}

fn zigzag_encode(v: i64) -> u64 {
    ((v << 1) ^ (v >> 63)) as u64
}

fn zigzag_decode(v: u64) -> i64 {
    ((v >> 1) as i64) ^ -((v & 1) as i64)
}

/// The compact protocol over any transport.
///
/// Struct fields are delta-encoded against the previous field id; nested
/// structs save and restore the delta state.
pub struct CompactProtocol<T> {
    trans: T,
    config: Arc<RuntimeConfig>,
    last_field_id: i16,
    field_id_stack: Vec<i16>,
    /// Field id held back until `write_bool` merges it with the value.
    pending_bool_field: Option<i16>,
    /// Bool value carried in the field-type nibble, awaiting `read_bool`.
    pending_bool_value: Option<bool>,
}

impl<T: Transport> CompactProtocol<T> {
    pub fn new(trans: T) -> Self {
        Self::with_config(trans, Arc::new(RuntimeConfig::default()))
    }

    pub fn with_config(trans: T, config: Arc<RuntimeConfig>) -> Self {
        Self {
            trans,
            config,
            last_field_id: 0,
            field_id_stack: Vec::new(),
            pending_bool_field: None,
            pending_bool_value: None,
        }
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.trans
    }

    pub fn into_transport(self) -> T {
        self.trans
    }

    fn write_u8(&mut self, v: u8) -> ProtocolResult<()> {
        self.trans.write(&[v])?;
        Ok(())
    }

    fn read_u8(&mut self) -> ProtocolResult<u8> {
        let mut buf = [0u8; 1];
        self.trans.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    fn write_varint(&mut self, mut v: u64) -> ProtocolResult<()> {
        loop {
            if v & !0x7f == 0 {
                return self.write_u8(v as u8);
            }
            self.write_u8((v as u8 & 0x7f) | 0x80)?;
            v >>= 7;
        }
    }

    fn read_varint(&mut self) -> ProtocolResult<u64> {
        let mut result = 0u64;
        let mut shift = 0;
        loop {
            let byte = self.read_u8()?;
            result |= ((byte & 0x7f) as u64) << shift;
            if byte & 0x80 == 0 {
                return Ok(result);
            }
            shift += 7;
            if shift >= 64 {
                return Err(ProtocolError::Truncated("varint longer than 10 bytes".into()));
            }
        }
    }

    fn write_field_header(&mut self, type_code: u8, id: i16) -> ProtocolResult<()> {
        let delta = id as i32 - self.last_field_id as i32;
        if delta > 0 && delta <= 15 {
            self.write_u8(((delta as u8) << 4) | type_code)?;
        } else {
            self.write_u8(type_code)?;
            self.write_varint(zigzag_encode(id as i64))?;
        }
        self.last_field_id = id;
        Ok(())
    }

    fn check_container_size(&self, size: u64) -> ProtocolResult<usize> {
        if size > self.config.container_length_limit as u64 {
            return Err(ProtocolError::SizeLimit {
                size: size as i64,
                limit: self.config.container_length_limit,
            });
        }
        Ok(size as usize)
    }

    fn read_len_prefixed(&mut self) -> ProtocolResult<Vec<u8>> {
        let len = self.read_varint()?;
        if len > self.config.string_length_limit as u64 {
            return Err(ProtocolError::SizeLimit {
                size: len as i64,
                limit: self.config.string_length_limit,
            });
        }
        let mut buf = vec![0u8; len as usize];
        self.trans.read_exact(&mut buf)?;
        Ok(buf)
    }
}

impl<T: Transport> Protocol for CompactProtocol<T> {
    fn write_message_begin(&mut self, header: &MessageHeader) -> ProtocolResult<()> {
        self.write_u8(PROTOCOL_ID)?;
        self.write_u8((VERSION & VERSION_MASK) | ((header.kind as u8) << TYPE_SHIFT))?;
        self.write_varint(header.seqid as u32 as u64)?;
        self.write_varint(header.name.len() as u64)?;
        self.trans.write(header.name.as_bytes())?;
        Ok(())
    }

    fn write_message_end(&mut self) -> ProtocolResult<()> {
        Ok(())
    }

    fn write_struct_begin(&mut self, _name: &str) -> ProtocolResult<()> {
        self.field_id_stack.push(self.last_field_id);
        self.last_field_id = 0;
        Ok(())
    }

    fn write_struct_end(&mut self) -> ProtocolResult<()> {
        self.last_field_id = self.field_id_stack.pop().unwrap_or(0);
        Ok(())
    }

    fn write_field_begin(&mut self, ty: WireType, id: i16) -> ProtocolResult<()> {
        if ty == WireType::Bool {
            // Header emission waits for the value.
            self.pending_bool_field = Some(id);
            Ok(())
        } else {
            self.write_field_header(compact_type(ty), id)
        }
    }

    fn write_field_end(&mut self) -> ProtocolResult<()> {
        Ok(())
    }

    fn write_field_stop(&mut self) -> ProtocolResult<()> {
        self.write_u8(CT_STOP)
    }

    fn write_map_begin(
        &mut self,
        key: WireType,
        value: WireType,
        size: usize,
    ) -> ProtocolResult<()> {
        if size == 0 {
            return self.write_varint(0);
        }
        self.write_varint(size as u64)?;
        self.write_u8((compact_type(key) << 4) | compact_type(value))
    }

    fn write_map_end(&mut self) -> ProtocolResult<()> {
        Ok(())
    }

    fn write_list_begin(&mut self, elem: WireType, size: usize) -> ProtocolResult<()> {
        if size < 15 {
            self.write_u8(((size as u8) << 4) | compact_type(elem))
        } else {
            self.write_u8(0xf0 | compact_type(elem))?;
            self.write_varint(size as u64)
        }
    }

    fn write_list_end(&mut self) -> ProtocolResult<()> {
        Ok(())
    }

    fn write_set_begin(&mut self, elem: WireType, size: usize) -> ProtocolResult<()> {
        self.write_list_begin(elem, size)
    }

    fn write_set_end(&mut self) -> ProtocolResult<()> {
        Ok(())
    }

    fn write_bool(&mut self, v: bool) -> ProtocolResult<()> {
        let code = if v { CT_BOOL_TRUE } else { CT_BOOL_FALSE };
        match self.pending_bool_field.take() {
            Some(id) => self.write_field_header(code, id),
            None => self.write_u8(code),
        }
    }

    fn write_byte(&mut self, v: i8) -> ProtocolResult<()> {
        self.write_u8(v as u8)
    }

    fn write_i16(&mut self, v: i16) -> ProtocolResult<()> {
        self.write_varint(zigzag_encode(v as i64))
    }

    fn write_i32(&mut self, v: i32) -> ProtocolResult<()> {
        self.write_varint(zigzag_encode(v as i64))
    }

    fn write_i64(&mut self, v: i64) -> ProtocolResult<()> {
        self.write_varint(zigzag_encode(v))
    }

    fn write_double(&mut self, v: f64) -> ProtocolResult<()> {
        // Little-endian, unlike the binary protocol.
        self.trans.write(&v.to_bits().to_le_bytes())?;
        Ok(())
    }

    fn write_string(&mut self, v: &str) -> ProtocolResult<()> {
        self.write_binary(v.as_bytes())
    }

    fn write_binary(&mut self, v: &[u8]) -> ProtocolResult<()> {
        self.write_varint(v.len() as u64)?;
        self.trans.write(v)?;
        Ok(())
    }

    fn read_message_begin(&mut self) -> ProtocolResult<MessageHeader> {
        let id = self.read_u8()?;
        if id != PROTOCOL_ID {
            return Err(ProtocolError::BadVersion(format!(
                "bad compact protocol id {:#04x}",
                id
            )));
        }
        let word = self.read_u8()?;
        if word & VERSION_MASK != VERSION {
            return Err(ProtocolError::BadVersion(format!(
                "bad compact version {}",
                word & VERSION_MASK
            )));
        }
        let kind = MessageKind::from_u8((word >> TYPE_SHIFT) & 0x07)?;
        let seqid = self.read_varint()? as u32 as i32;
        let name = String::from_utf8(self.read_len_prefixed()?)
            .map_err(|_| ProtocolError::BadUtf8)?;
        Ok(MessageHeader { name, kind, seqid })
    }

    fn read_message_end(&mut self) -> ProtocolResult<()> {
        Ok(())
    }

    fn read_struct_begin(&mut self) -> ProtocolResult<()> {
        self.field_id_stack.push(self.last_field_id);
        self.last_field_id = 0;
        Ok(())
    }

    fn read_struct_end(&mut self) -> ProtocolResult<()> {
        self.last_field_id = self.field_id_stack.pop().unwrap_or(0);
        Ok(())
    }

    fn read_field_begin(&mut self) -> ProtocolResult<Option<FieldHeader>> {
        let byte = self.read_u8()?;
        if byte == CT_STOP {
            return Ok(None);
        }
        let type_code = byte & 0x0f;
        let delta = (byte >> 4) & 0x0f;
        let id = if delta == 0 {
            zigzag_decode(self.read_varint()?) as i16
        } else {
            self.last_field_id.wrapping_add(delta as i16)
        };
        self.last_field_id = id;
        if type_code == CT_BOOL_TRUE || type_code == CT_BOOL_FALSE {
            self.pending_bool_value = Some(type_code == CT_BOOL_TRUE);
        }
        Ok(Some(FieldHeader {
            ty: wire_type(type_code)?,
            id,
        }))
    }

    fn read_field_end(&mut self) -> ProtocolResult<()> {
        Ok(())
    }

    fn read_map_begin(&mut self) -> ProtocolResult<(WireType, WireType, usize)> {
        let raw_size = self.read_varint()?;
        let size = self.check_container_size(raw_size)?;
        if size == 0 {
            // No type byte follows an empty map.
            return Ok((WireType::Bool, WireType::Bool, 0));
        }
        let types = self.read_u8()?;
        Ok((wire_type(types >> 4)?, wire_type(types & 0x0f)?, size))
    }

    fn read_map_end(&mut self) -> ProtocolResult<()> {
        Ok(())
    }

    fn read_list_begin(&mut self) -> ProtocolResult<(WireType, usize)> {
        let byte = self.read_u8()?;
        let elem = wire_type(byte & 0x0f)?;
        let nibble = (byte >> 4) & 0x0f;
        let size = if nibble == 15 {
            let raw_size = self.read_varint()?;
            self.check_container_size(raw_size)?
        } else {
            nibble as usize
        };
        Ok((elem, size))
    }

    fn read_list_end(&mut self) -> ProtocolResult<()> {
        Ok(())
    }

    fn read_set_begin(&mut self) -> ProtocolResult<(WireType, usize)> {
        self.read_list_begin()
    }

    fn read_set_end(&mut self) -> ProtocolResult<()> {
        Ok(())
    }

    fn read_bool(&mut self) -> ProtocolResult<bool> {
        match self.pending_bool_value.take() {
            Some(v) => Ok(v),
            None => Ok(self.read_u8()? == CT_BOOL_TRUE),
        }
    }

    fn read_byte(&mut self) -> ProtocolResult<i8> {
        Ok(self.read_u8()? as i8)
    }

    fn read_i16(&mut self) -> ProtocolResult<i16> {
        Ok(zigzag_decode(self.read_varint()?) as i16)
    }

    fn read_i32(&mut self) -> ProtocolResult<i32> {
        Ok(zigzag_decode(self.read_varint()?) as i32)
    }

    fn read_i64(&mut self) -> ProtocolResult<i64> {
        Ok(zigzag_decode(self.read_varint()?))
    }

    fn read_double(&mut self) -> ProtocolResult<f64> {
        let mut buf = [0u8; 8];
        self.trans.read_exact(&mut buf)?;
        Ok(f64::from_bits(u64::from_le_bytes(buf)))
    }

    fn read_string(&mut self) -> ProtocolResult<String> {
        String::from_utf8(self.read_len_prefixed()?).map_err(|_| ProtocolError::BadUtf8)
    }

    fn read_binary(&mut self) -> ProtocolResult<Vec<u8>> {
        self.read_len_prefixed()
    }

    fn flush(&mut self) -> ProtocolResult<()> {
        self.trans.flush()?;
        Ok(())
    }

    fn recursion_limit(&self) -> usize {
        self.config.recursion_depth_limit
    }
}
