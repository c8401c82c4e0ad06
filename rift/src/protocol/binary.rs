//! Thrift binary protocol: big-endian fixed-width encoding.

use std::sync::Arc;

use super::{
    FieldHeader, MessageHeader, MessageKind, Protocol, ProtocolError, ProtocolResult, WireType,
};
use crate::config::RuntimeConfig;
use crate::transport::Transport;

const VERSION_1: u32 = 0x8001_0000;
const VERSION_MASK: u32 = 0xffff_0000;

/// The binary protocol over any transport.
///
/// `strict_write` (default) emits the versioned message header; with
/// `strict_read` set, unversioned headers are rejected with `BadVersion`.
pub struct BinaryProtocol<T> {
    trans: T,
    config: Arc<RuntimeConfig>,
}

impl<T: Transport> BinaryProtocol<T> {
    pub fn new(trans: T) -> Self {
        Self::with_config(trans, Arc::new(RuntimeConfig::default()))
    }

    pub fn with_config(trans: T, config: Arc<RuntimeConfig>) -> Self {
        Self { trans, config }
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.trans
    }

    pub fn into_transport(self) -> T {
        self.trans
    }

    fn read_u8(&mut self) -> ProtocolResult<u8> {
        let mut buf = [0u8; 1];
        self.trans.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    fn check_size(&self, size: i32, limit: usize) -> ProtocolResult<usize> {
        if size < 0 || size as usize > limit {
            return Err(ProtocolError::SizeLimit {
                size: size as i64,
                limit,
            });
        }
        Ok(size as usize)
    }

    fn read_len_prefixed(&mut self) -> ProtocolResult<Vec<u8>> {
        let len = self.read_i32()?;
        let len = self.check_size(len, self.config.string_length_limit)?;
        let mut buf = vec![0u8; len];
        self.trans.read_exact(&mut buf)?;
        Ok(buf)
    }
}

impl<T: Transport> Protocol for BinaryProtocol<T> {
    fn write_message_begin(&mut self, header: &MessageHeader) -> ProtocolResult<()> {
        if self.config.strict_write {
            let word = VERSION_1 | header.kind as u32;
            self.write_i32(word as i32)?;
            self.write_string(&header.name)?;
            self.write_i32(header.seqid)
        } else {
            self.write_string(&header.name)?;
            self.write_byte(header.kind as i8)?;
            self.write_i32(header.seqid)
        }
    }

    fn write_message_end(&mut self) -> ProtocolResult<()> {
        Ok(())
    }

    fn write_struct_begin(&mut self, _name: &str) -> ProtocolResult<()> {
        Ok(())
    }

    fn write_struct_end(&mut self) -> ProtocolResult<()> {
        Ok(())
    }

    fn write_field_begin(&mut self, ty: WireType, id: i16) -> ProtocolResult<()> {
        self.write_byte(ty.to_u8() as i8)?;
        self.write_i16(id)
    }

    fn write_field_end(&mut self) -> ProtocolResult<()> {
        Ok(())
    }

    fn write_field_stop(&mut self) -> ProtocolResult<()> {
        self.write_byte(0)
    }

    fn write_map_begin(
        &mut self,
        key: WireType,
        value: WireType,
        size: usize,
    ) -> ProtocolResult<()> {
        self.write_byte(key.to_u8() as i8)?;
        self.write_byte(value.to_u8() as i8)?;
        self.write_i32(size as i32)
    }

    fn write_map_end(&mut self) -> ProtocolResult<()> {
        Ok(())
    }

    fn write_list_begin(&mut self, elem: WireType, size: usize) -> ProtocolResult<()> {
        self.write_byte(elem.to_u8() as i8)?;
        self.write_i32(size as i32)
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
        self.write_byte(v as i8)
    }

    fn write_byte(&mut self, v: i8) -> ProtocolResult<()> {
        self.trans.write(&[v as u8])?;
        Ok(())
    }

    fn write_i16(&mut self, v: i16) -> ProtocolResult<()> {
        self.trans.write(&v.to_be_bytes())?;
        Ok(())
    }

    fn write_i32(&mut self, v: i32) -> ProtocolResult<()> {
        self.trans.write(&v.to_be_bytes())?;
        Ok(())
    }

    fn write_i64(&mut self, v: i64) -> ProtocolResult<()> {
        self.trans.write(&v.to_be_bytes())?;
        Ok(())
    }

    fn write_double(&mut self, v: f64) -> ProtocolResult<()> {
        self.trans.write(&v.to_bits().to_be_bytes())?;
        Ok(())
    }

    fn write_string(&mut self, v: &str) -> ProtocolResult<()> {
        self.write_binary(v.as_bytes())
    }

    fn write_binary(&mut self, v: &[u8]) -> ProtocolResult<()> {
        self.write_i32(v.len() as i32)?;
        self.trans.write(v)?;
        Ok(())
    }

    fn read_message_begin(&mut self) -> ProtocolResult<MessageHeader> {
        let first = self.read_i32()?;
        if first < 0 {
            let word = first as u32;
            if word & VERSION_MASK != VERSION_1 {
                return Err(ProtocolError::BadVersion(format!(
                    "bad version word {:#010x}",
                    word
                )));
            }
            let kind = MessageKind::from_u8((word & 0xff) as u8)?;
            let name = self.read_string()?;
            let seqid = self.read_i32()?;
            Ok(MessageHeader { name, kind, seqid })
        } else {
            if self.config.strict_read {
                return Err(ProtocolError::BadVersion(
                    "message header lacks version prefix".into(),
                ));
            }
            let len = self.check_size(first, self.config.string_length_limit)?;
            let mut buf = vec![0u8; len];
            self.trans.read_exact(&mut buf)?;
            let name = String::from_utf8(buf).map_err(|_| ProtocolError::BadUtf8)?;
            let kind = MessageKind::from_u8(self.read_byte()? as u8)?;
            let seqid = self.read_i32()?;
            Ok(MessageHeader { name, kind, seqid })
        }
    }

    fn read_message_end(&mut self) -> ProtocolResult<()> {
        Ok(())
    }

    fn read_struct_begin(&mut self) -> ProtocolResult<()> {
        Ok(())
    }

    fn read_struct_end(&mut self) -> ProtocolResult<()> {
        Ok(())
    }

    fn read_field_begin(&mut self) -> ProtocolResult<Option<FieldHeader>> {
        let code = self.read_u8()?;
        if code == 0 {
            return Ok(None);
        }
        let ty = WireType::from_u8(code)?;
        let id = self.read_i16()?;
        Ok(Some(FieldHeader { ty, id }))
    }

    fn read_field_end(&mut self) -> ProtocolResult<()> {
        Ok(())
    }

    fn read_map_begin(&mut self) -> ProtocolResult<(WireType, WireType, usize)> {
        let key = WireType::from_u8(self.read_u8()?)?;
        let value = WireType::from_u8(self.read_u8()?)?;
        let size = self.read_i32()?;
        let size = self.check_size(size, self.config.container_length_limit)?;
        Ok((key, value, size))
    }

    fn read_map_end(&mut self) -> ProtocolResult<()> {
        Ok(())
    }

    fn read_list_begin(&mut self) -> ProtocolResult<(WireType, usize)> {
        let elem = WireType::from_u8(self.read_u8()?)?;
        let size = self.read_i32()?;
        let size = self.check_size(size, self.config.container_length_limit)?;
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
        Ok(self.read_byte()? != 0)
    }

    fn read_byte(&mut self) -> ProtocolResult<i8> {
        Ok(self.read_u8()? as i8)
    }

    fn read_i16(&mut self) -> ProtocolResult<i16> {
        let mut buf = [0u8; 2];
        self.trans.read_exact(&mut buf)?;
        Ok(i16::from_be_bytes(buf))
    }

    fn read_i32(&mut self) -> ProtocolResult<i32> {
        let mut buf = [0u8; 4];
        self.trans.read_exact(&mut buf)?;
        Ok(i32::from_be_bytes(buf))
    }

    fn read_i64(&mut self) -> ProtocolResult<i64> {
        let mut buf = [0u8; 8];
        self.trans.read_exact(&mut buf)?;
        Ok(i64::from_be_bytes(buf))
    }

    fn read_double(&mut self) -> ProtocolResult<f64> {
        let mut buf = [0u8; 8];
        self.trans.read_exact(&mut buf)?;
        Ok(f64::from_bits(u64::from_be_bytes(buf)))
    }

    fn read_string(&mut self) -> ProtocolResult<String> {
        let bytes = self.read_len_prefixed()?;
        String::from_utf8(bytes).map_err(|_| ProtocolError::BadUtf8)
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryTransport;

    fn protocol() -> BinaryProtocol<MemoryTransport> {
        BinaryProtocol::new(MemoryTransport::new())
    }

    #[test]
    fn test_string_field_layout() {
        // Field 1, type string, length 5, "Alice".
        let mut prot = protocol();
        prot.write_field_begin(WireType::String, 1).unwrap();
        prot.write_string("Alice").unwrap();
        assert_eq!(
            prot.transport_mut().bytes(),
            &[0x0b, 0x00, 0x01, 0x00, 0x00, 0x00, 0x05, b'A', b'l', b'i', b'c', b'e']
        );
    }

    #[test]
    fn test_primitive_round_trip() {
        let mut prot = protocol();
        prot.write_bool(true).unwrap();
        prot.write_byte(-3).unwrap();
        prot.write_i16(-2).unwrap();
        prot.write_i32(123456).unwrap();
        prot.write_i64(-98765432109).unwrap();
        prot.write_double(3.5).unwrap();
        prot.write_string("héllo").unwrap();
        prot.write_binary(&[0, 255]).unwrap();

        assert!(prot.read_bool().unwrap());
        assert_eq!(prot.read_byte().unwrap(), -3);
        assert_eq!(prot.read_i16().unwrap(), -2);
        assert_eq!(prot.read_i32().unwrap(), 123456);
        assert_eq!(prot.read_i64().unwrap(), -98765432109);
        assert_eq!(prot.read_double().unwrap(), 3.5);
        assert_eq!(prot.read_string().unwrap(), "héllo");
        assert_eq!(prot.read_binary().unwrap(), vec![0, 255]);
    }

    #[test]
    fn test_message_header_round_trip() {
        let mut prot = protocol();
        let header = MessageHeader {
            name: "ping".into(),
            kind: MessageKind::Call,
            seqid: 7,
        };
        prot.write_message_begin(&header).unwrap();
        prot.write_message_end().unwrap();
        // Strict header starts with the version word.
        assert_eq!(&prot.transport_mut().bytes()[..4], &[0x80, 0x01, 0x00, 0x01]);
        assert_eq!(prot.read_message_begin().unwrap(), header);
    }

    #[test]
    fn test_strict_read_rejects_old_header() {
        let mut old = BinaryProtocol::with_config(
            MemoryTransport::new(),
            Arc::new(RuntimeConfig {
                strict_write: false,
                ..RuntimeConfig::default()
            }),
        );
        old.write_message_begin(&MessageHeader {
            name: "ping".into(),
            kind: MessageKind::Call,
            seqid: 1,
        })
        .unwrap();
        let bytes = old.transport_mut().take_bytes();

        let mut strict = BinaryProtocol::new(MemoryTransport::from_bytes(bytes.clone()));
        assert!(matches!(
            strict.read_message_begin(),
            Err(ProtocolError::BadVersion(_))
        ));

        let mut lenient = BinaryProtocol::with_config(
            MemoryTransport::from_bytes(bytes),
            Arc::new(RuntimeConfig {
                strict_read: false,
                ..RuntimeConfig::default()
            }),
        );
        assert_eq!(lenient.read_message_begin().unwrap().name, "ping");
    }

    #[test]
    fn test_negative_size_rejected() {
        let mut prot = protocol();
        prot.write_i32(-5).unwrap();
        assert!(matches!(
            prot.read_string(),
            Err(ProtocolError::SizeLimit { size: -5, .. })
        ));
    }

    #[test]
    fn test_string_limit_enforced() {
        let config = Arc::new(RuntimeConfig {
            string_length_limit: 4,
            ..RuntimeConfig::default()
        });
        let mut prot = BinaryProtocol::with_config(MemoryTransport::new(), config);
        prot.write_string("too long").unwrap();
        assert!(matches!(
            prot.read_string(),
            Err(ProtocolError::SizeLimit { size: 8, limit: 4 })
        ));
    }

    #[test]
    fn test_bad_utf8() {
        let mut prot = protocol();
        prot.write_binary(&[0xff, 0xfe]).unwrap();
        assert!(matches!(prot.read_string(), Err(ProtocolError::BadUtf8)));
    }
}
