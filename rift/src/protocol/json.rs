//! Thrift JSON protocol (TJSON wire form).
//!
//! Messages are `[1,"name",type,seqid,payload]`; structs are objects keyed
//! by stringified field id, each field an object of `{"typeTag": value}`;
//! containers carry their element tags and size; `binary` travels as base64.
//! The reader is incremental over the transport with one byte of pushback,
//! so framing is not required.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use super::{
    FieldHeader, MessageHeader, MessageKind, Protocol, ProtocolError, ProtocolResult, WireType,
};
use crate::config::RuntimeConfig;
use crate::transport::Transport;

const VERSION: i64 = 1;

fn tag(ty: WireType) -> &'static str {
    match ty {
        WireType::Bool => "tf",
        WireType::Byte => "i8",
        WireType::I16 => "i16",
        WireType::I32 => "i32",
        WireType::I64 => "i64",
        WireType::Double => "dbl",
        WireType::String => "str",
        WireType::Struct => "rec",
        WireType::Map => "map",
        WireType::Set => "set",
        WireType::List => "lst",
    }
}

fn from_tag(tag: &str) -> ProtocolResult<WireType> {
    Ok(match tag {
        "tf" => WireType::Bool,
        "i8" => WireType::Byte,
        "i16" => WireType::I16,
        "i32" => WireType::I32,
        "i64" => WireType::I64,
        "dbl" => WireType::Double,
        "str" => WireType::String,
        "rec" => WireType::Struct,
        "map" => WireType::Map,
        "set" => WireType::Set,
        "lst" => WireType::List,
        other => {
            return Err(ProtocolError::UnexpectedType {
                expected: "a JSON type tag".into(),
                found: format!("`{}`", other),
            })
        }
    })
}

/// Comma/colon bookkeeping for one nesting level.
#[derive(Debug, Clone, Copy)]
enum Ctx {
    List { first: bool },
    Object { first: bool, expect_key: bool },
}

/// The JSON protocol over any transport.
pub struct JsonProtocol<T> {
    trans: T,
    config: Arc<RuntimeConfig>,
    write_ctx: Vec<Ctx>,
    read_ctx: Vec<Ctx>,
    pushback: Option<u8>,
}

impl<T: Transport> JsonProtocol<T> {
    pub fn new(trans: T) -> Self {
        Self::with_config(trans, Arc::new(RuntimeConfig::default()))
    }

    pub fn with_config(trans: T, config: Arc<RuntimeConfig>) -> Self {
        Self {
            trans,
            config,
            write_ctx: Vec::new(),
            read_ctx: Vec::new(),
            pushback: None,
        }
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.trans
    }

    pub fn into_transport(self) -> T {
        self.trans
    }

    // ── writer ──────────────────────────────────────────────────────

    fn wr(&mut self, bytes: &[u8]) -> ProtocolResult<()> {
        self.trans.write(bytes)?;
        Ok(())
    }

    /// True when the next written token sits in object-key position, where
    /// JSON demands a string (numbers get quoted).
    fn writing_key(&self) -> bool {
        matches!(
            self.write_ctx.last(),
            Some(Ctx::Object { expect_key: true, .. })
        )
    }

    /// Emits the separator the enclosing context requires and advances it.
    fn write_separator(&mut self) -> ProtocolResult<()> {
        match self.write_ctx.last_mut() {
            Some(Ctx::List { first }) => {
                if *first {
                    *first = false;
                } else {
                    self.trans.write(b",")?;
                }
            }
            Some(Ctx::Object { first, expect_key }) => {
                if *expect_key {
                    let sep = !*first;
                    *first = false;
                    *expect_key = false;
                    if sep {
                        self.trans.write(b",")?;
                    }
                } else {
                    *expect_key = true;
                    self.trans.write(b":")?;
                }
            }
            None => {}
        }
        Ok(())
    }

    fn write_array_start(&mut self) -> ProtocolResult<()> {
        self.write_separator()?;
        self.write_ctx.push(Ctx::List { first: true });
        self.wr(b"[")
    }

    fn write_array_end(&mut self) -> ProtocolResult<()> {
        self.write_ctx.pop();
        self.wr(b"]")
    }

    fn write_object_start(&mut self) -> ProtocolResult<()> {
        self.write_separator()?;
        self.write_ctx.push(Ctx::Object {
            first: true,
            expect_key: true,
        });
        self.wr(b"{")
    }

    fn write_object_end(&mut self) -> ProtocolResult<()> {
        self.write_ctx.pop();
        self.wr(b"}")
    }

    fn write_json_string(&mut self, s: &str) -> ProtocolResult<()> {
        self.write_separator()?;
        let mut out = Vec::with_capacity(s.len() + 2);
        out.push(b'"');
        for c in s.chars() {
            match c {
                '"' => out.extend_from_slice(b"\\\""),
                '\\' => out.extend_from_slice(b"\\\\"),
                '\n' => out.extend_from_slice(b"\\n"),
                '\r' => out.extend_from_slice(b"\\r"),
                '\t' => out.extend_from_slice(b"\\t"),
                '\u{8}' => out.extend_from_slice(b"\\b"),
                '\u{c}' => out.extend_from_slice(b"\\f"),
                c if (c as u32) < 0x20 => {
                    out.extend_from_slice(format!("\\u{:04x}", c as u32).as_bytes())
                }
                c => {
                    let mut buf = [0u8; 4];
                    out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
                }
            }
        }
        out.push(b'"');
        self.wr(&out)
    }

    fn write_json_number(&mut self, text: &str) -> ProtocolResult<()> {
        let quoted = self.writing_key();
        self.write_separator()?;
        if quoted {
            self.wr(b"\"")?;
            self.wr(text.as_bytes())?;
            self.wr(b"\"")
        } else {
            self.wr(text.as_bytes())
        }
    }

    fn write_json_i64(&mut self, v: i64) -> ProtocolResult<()> {
        self.write_json_number(&v.to_string())
    }

    // ── reader ──────────────────────────────────────────────────────

    fn read_raw(&mut self) -> ProtocolResult<u8> {
        if let Some(b) = self.pushback.take() {
            return Ok(b);
        }
        let mut buf = [0u8; 1];
        self.trans.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    fn unread(&mut self, b: u8) {
        debug_assert!(self.pushback.is_none());
        self.pushback = Some(b);
    }

    /// Next non-whitespace byte, consumed.
    fn read_skip_ws(&mut self) -> ProtocolResult<u8> {
        loop {
            let b = self.read_raw()?;
            if !b.is_ascii_whitespace() {
                return Ok(b);
            }
        }
    }

    /// Next non-whitespace byte, left in place.
    fn peek_skip_ws(&mut self) -> ProtocolResult<u8> {
        let b = self.read_skip_ws()?;
        self.unread(b);
        Ok(b)
    }

    fn expect(&mut self, expected: u8) -> ProtocolResult<()> {
        let b = self.read_skip_ws()?;
        if b != expected {
            return Err(ProtocolError::Truncated(format!(
                "expected `{}`, found `{}`",
                expected as char, b as char
            )));
        }
        Ok(())
    }

    /// Consumes the separator the enclosing context requires.
    fn read_separator(&mut self) -> ProtocolResult<()> {
        let needed = match self.read_ctx.last_mut() {
            Some(Ctx::List { first }) => {
                if *first {
                    *first = false;
                    None
                } else {
                    Some(b',')
                }
            }
            Some(Ctx::Object { first, expect_key }) => {
                if *expect_key {
                    let sep = !*first;
                    *first = false;
                    *expect_key = false;
                    sep.then_some(b',')
                } else {
                    *expect_key = true;
                    Some(b':')
                }
            }
            None => None,
        };
        match needed {
            Some(sep) => self.expect(sep),
            None => Ok(()),
        }
    }

    fn read_array_start(&mut self) -> ProtocolResult<()> {
        self.read_separator()?;
        self.expect(b'[')?;
        self.read_ctx.push(Ctx::List { first: true });
        Ok(())
    }

    fn read_array_end(&mut self) -> ProtocolResult<()> {
        self.read_ctx.pop();
        self.expect(b']')
    }

    fn read_object_start(&mut self) -> ProtocolResult<()> {
        self.read_separator()?;
        self.expect(b'{')?;
        self.read_ctx.push(Ctx::Object {
            first: true,
            expect_key: true,
        });
        Ok(())
    }

    fn read_object_end(&mut self) -> ProtocolResult<()> {
        self.read_ctx.pop();
        self.expect(b'}')
    }

    fn read_json_string_value(&mut self) -> ProtocolResult<String> {
        self.read_separator()?;
        self.expect(b'"')?;
        let mut out: Vec<u8> = Vec::new();
        loop {
            if out.len() > self.config.string_length_limit {
                return Err(ProtocolError::SizeLimit {
                    size: out.len() as i64,
                    limit: self.config.string_length_limit,
                });
            }
            let b = self.read_raw()?;
            match b {
                b'"' => break,
                b'\\' => {
                    let esc = self.read_raw()?;
                    match esc {
                        b'"' => out.push(b'"'),
                        b'\\' => out.push(b'\\'),
                        b'/' => out.push(b'/'),
                        b'b' => out.push(0x08),
                        b'f' => out.push(0x0c),
                        b'n' => out.push(b'\n'),
                        b'r' => out.push(b'\r'),
                        b't' => out.push(b'\t'),
                        b'u' => {
                            let c = self.read_unicode_escape()?;
                            let mut buf = [0u8; 4];
                            out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
                        }
                        other => {
                            return Err(ProtocolError::Truncated(format!(
                                "unknown escape `\\{}`",
                                other as char
                            )))
                        }
                    }
                }
                other => out.push(other),
            }
        }
        String::from_utf8(out).map_err(|_| ProtocolError::BadUtf8)
    }

    fn read_hex4(&mut self) -> ProtocolResult<u16> {
        let mut v: u16 = 0;
        for _ in 0..4 {
            let b = self.read_raw()?;
            let digit = (b as char)
                .to_digit(16)
                .ok_or_else(|| ProtocolError::Truncated("bad \\u escape".into()))?;
            v = (v << 4) | digit as u16;
        }
        Ok(v)
    }

    fn read_unicode_escape(&mut self) -> ProtocolResult<char> {
        let unit = self.read_hex4()?;
        if (0xd800..0xdc00).contains(&unit) {
            // High surrogate; a `\uXXXX` low surrogate must follow.
            if self.read_raw()? != b'\\' || self.read_raw()? != b'u' {
                return Err(ProtocolError::Truncated("lone high surrogate".into()));
            }
            let low = self.read_hex4()?;
            if !(0xdc00..0xe000).contains(&low) {
                return Err(ProtocolError::Truncated("bad low surrogate".into()));
            }
            let c = 0x10000 + (((unit - 0xd800) as u32) << 10) + (low - 0xdc00) as u32;
            char::from_u32(c).ok_or(ProtocolError::BadUtf8)
        } else if (0xdc00..0xe000).contains(&unit) {
            Err(ProtocolError::Truncated("lone low surrogate".into()))
        } else {
            char::from_u32(unit as u32).ok_or(ProtocolError::BadUtf8)
        }
    }

    /// Reads a number token, tolerating the quoted form used in object-key
    /// position (and for the double specials).
    fn read_json_number_text(&mut self) -> ProtocolResult<String> {
        self.read_separator()?;
        let first = self.peek_skip_ws()?;
        if first == b'"' {
            self.read_raw()?; // opening quote
            let mut out = String::new();
            loop {
                let b = self.read_raw()?;
                if b == b'"' {
                    return Ok(out);
                }
                out.push(b as char);
            }
        }
        let mut out = String::new();
        loop {
            let b = self.read_raw()?;
            if matches!(b, b'0'..=b'9' | b'+' | b'-' | b'.' | b'e' | b'E') {
                out.push(b as char);
            } else {
                self.unread(b);
                break;
            }
        }
        if out.is_empty() {
            return Err(ProtocolError::Truncated("expected a number".into()));
        }
        Ok(out)
    }

    fn read_json_i64(&mut self) -> ProtocolResult<i64> {
        let text = self.read_json_number_text()?;
        text.parse::<i64>()
            .map_err(|_| ProtocolError::Truncated(format!("bad integer `{}`", text)))
    }
}

impl<T: Transport> Protocol for JsonProtocol<T> {
    fn write_message_begin(&mut self, header: &MessageHeader) -> ProtocolResult<()> {
        self.write_array_start()?;
        self.write_json_i64(VERSION)?;
        self.write_json_string(&header.name)?;
        self.write_json_i64(header.kind as i64)?;
        self.write_json_i64(header.seqid as i64)
    }

    fn write_message_end(&mut self) -> ProtocolResult<()> {
        self.write_array_end()
    }

    fn write_struct_begin(&mut self, _name: &str) -> ProtocolResult<()> {
        self.write_object_start()
    }

    fn write_struct_end(&mut self) -> ProtocolResult<()> {
        self.write_object_end()
    }

    fn write_field_begin(&mut self, ty: WireType, id: i16) -> ProtocolResult<()> {
        self.write_json_i64(id as i64)?;
        self.write_object_start()?;
        self.write_json_string(tag(ty))
    }

    fn write_field_end(&mut self) -> ProtocolResult<()> {
        self.write_object_end()
    }

    fn write_field_stop(&mut self) -> ProtocolResult<()> {
        Ok(())
    }

    fn write_map_begin(
        &mut self,
        key: WireType,
        value: WireType,
        size: usize,
    ) -> ProtocolResult<()> {
        self.write_array_start()?;
        self.write_json_string(tag(key))?;
        self.write_json_string(tag(value))?;
        self.write_json_i64(size as i64)?;
        self.write_object_start()
    }

    fn write_map_end(&mut self) -> ProtocolResult<()> {
        self.write_object_end()?;
        self.write_array_end()
    }

    fn write_list_begin(&mut self, elem: WireType, size: usize) -> ProtocolResult<()> {
        self.write_array_start()?;
        self.write_json_string(tag(elem))?;
        self.write_json_i64(size as i64)
    }

    fn write_list_end(&mut self) -> ProtocolResult<()> {
        self.write_array_end()
    }

    fn write_set_begin(&mut self, elem: WireType, size: usize) -> ProtocolResult<()> {
        self.write_list_begin(elem, size)
    }

    fn write_set_end(&mut self) -> ProtocolResult<()> {
        self.write_array_end()
    }

    fn write_bool(&mut self, v: bool) -> ProtocolResult<()> {
        self.write_json_i64(if v { 1 } else { 0 })
    }

    fn write_byte(&mut self, v: i8) -> ProtocolResult<()> {
        self.write_json_i64(v as i64)
    }

    fn write_i16(&mut self, v: i16) -> ProtocolResult<()> {
        self.write_json_i64(v as i64)
    }

    fn write_i32(&mut self, v: i32) -> ProtocolResult<()> {
        self.write_json_i64(v as i64)
    }

    fn write_i64(&mut self, v: i64) -> ProtocolResult<()> {
        self.write_json_i64(v)
    }

    fn write_double(&mut self, v: f64) -> ProtocolResult<()> {
        if v.is_nan() {
            self.write_json_string("NaN")
        } else if v.is_infinite() {
            self.write_json_string(if v > 0.0 { "Infinity" } else { "-Infinity" })
        } else {
            self.write_json_number(&v.to_string())
        }
    }

    fn write_string(&mut self, v: &str) -> ProtocolResult<()> {
        self.write_json_string(v)
    }

    fn write_binary(&mut self, v: &[u8]) -> ProtocolResult<()> {
        self.write_json_string(&BASE64.encode(v))
    }

    fn read_message_begin(&mut self) -> ProtocolResult<MessageHeader> {
        self.read_array_start()?;
        let version = self.read_json_i64()?;
        if version != VERSION {
            return Err(ProtocolError::BadVersion(format!(
                "bad JSON protocol version {}",
                version
            )));
        }
        let name = self.read_json_string_value()?;
        let kind = MessageKind::from_u8(self.read_json_i64()? as u8)?;
        let seqid = self.read_json_i64()? as i32;
        Ok(MessageHeader { name, kind, seqid })
    }

    fn read_message_end(&mut self) -> ProtocolResult<()> {
        self.read_array_end()
    }

    fn read_struct_begin(&mut self) -> ProtocolResult<()> {
        self.read_object_start()
    }

    fn read_struct_end(&mut self) -> ProtocolResult<()> {
        self.read_object_end()
    }

    fn read_field_begin(&mut self) -> ProtocolResult<Option<FieldHeader>> {
        if self.peek_skip_ws()? == b'}' {
            // Stop: leave the brace for read_struct_end.
            return Ok(None);
        }
        let id = self.read_json_i64()?;
        let id = i16::try_from(id)
            .map_err(|_| ProtocolError::Truncated(format!("field id {} out of range", id)))?;
        self.read_object_start()?;
        let ty = from_tag(&self.read_json_string_value()?)?;
        Ok(Some(FieldHeader { ty, id }))
    }

    fn read_field_end(&mut self) -> ProtocolResult<()> {
        self.read_object_end()
    }

    fn read_map_begin(&mut self) -> ProtocolResult<(WireType, WireType, usize)> {
        self.read_array_start()?;
        let key = from_tag(&self.read_json_string_value()?)?;
        let value = from_tag(&self.read_json_string_value()?)?;
        let size = self.read_json_i64()?;
        if size < 0 || size as usize > self.config.container_length_limit {
            return Err(ProtocolError::SizeLimit {
                size,
                limit: self.config.container_length_limit,
            });
        }
        self.read_object_start()?;
        Ok((key, value, size as usize))
    }

    fn read_map_end(&mut self) -> ProtocolResult<()> {
        self.read_object_end()?;
        self.read_array_end()
    }

    fn read_list_begin(&mut self) -> ProtocolResult<(WireType, usize)> {
        self.read_array_start()?;
        let elem = from_tag(&self.read_json_string_value()?)?;
        let size = self.read_json_i64()?;
        if size < 0 || size as usize > self.config.container_length_limit {
            return Err(ProtocolError::SizeLimit {
                size,
                limit: self.config.container_length_limit,
            });
        }
        Ok((elem, size as usize))
    }

    fn read_list_end(&mut self) -> ProtocolResult<()> {
        self.read_array_end()
    }

    fn read_set_begin(&mut self) -> ProtocolResult<(WireType, usize)> {
        self.read_list_begin()
    }

    fn read_set_end(&mut self) -> ProtocolResult<()> {
        self.read_array_end()
    }

    fn read_bool(&mut self) -> ProtocolResult<bool> {
        Ok(self.read_json_i64()? != 0)
    }

    fn read_byte(&mut self) -> ProtocolResult<i8> {
        let v = self.read_json_i64()?;
        i8::try_from(v).map_err(|_| ProtocolError::Truncated("byte out of range".into()))
    }

    fn read_i16(&mut self) -> ProtocolResult<i16> {
        let v = self.read_json_i64()?;
        i16::try_from(v).map_err(|_| ProtocolError::Truncated("i16 out of range".into()))
    }

    fn read_i32(&mut self) -> ProtocolResult<i32> {
        let v = self.read_json_i64()?;
        i32::try_from(v).map_err(|_| ProtocolError::Truncated("i32 out of range".into()))
    }

    fn read_i64(&mut self) -> ProtocolResult<i64> {
        self.read_json_i64()
    }

    fn read_double(&mut self) -> ProtocolResult<f64> {
        let text = self.read_json_number_text()?;
        match text.as_str() {
            "NaN" => Ok(f64::NAN),
            "Infinity" => Ok(f64::INFINITY),
            "-Infinity" => Ok(f64::NEG_INFINITY),
            other => other
                .parse::<f64>()
                .map_err(|_| ProtocolError::Truncated(format!("bad double `{}`", other))),
        }
    }

    fn read_string(&mut self) -> ProtocolResult<String> {
        self.read_json_string_value()
    }

    fn read_binary(&mut self) -> ProtocolResult<Vec<u8>> {
        let text = self.read_json_string_value()?;
        // Fields of IDL type `string` share the "str" tag; a generic skip
        // lands here with arbitrary text, so fall back to the raw bytes.
        match BASE64.decode(text.as_bytes()) {
            Ok(bytes) => Ok(bytes),
            Err(_) => Ok(text.into_bytes()),
        }
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

    fn protocol() -> JsonProtocol<MemoryTransport> {
        JsonProtocol::new(MemoryTransport::new())
    }

    fn written(prot: &mut JsonProtocol<MemoryTransport>) -> String {
        String::from_utf8(prot.transport_mut().bytes().to_vec()).unwrap()
    }

    #[test]
    fn test_struct_layout() {
        let mut prot = protocol();
        prot.write_struct_begin("PhoneNumber").unwrap();
        prot.write_field_begin(WireType::I32, 1).unwrap();
        prot.write_i32(2).unwrap();
        prot.write_field_end().unwrap();
        prot.write_field_begin(WireType::String, 2).unwrap();
        prot.write_string("555").unwrap();
        prot.write_field_end().unwrap();
        prot.write_field_stop().unwrap();
        prot.write_struct_end().unwrap();
        assert_eq!(
            written(&mut prot),
            r#"{"1":{"i32":2},"2":{"str":"555"}}"#
        );
    }

    #[test]
    fn test_struct_read_back() {
        let mut prot = protocol();
        prot.transport_mut()
            .set_bytes(r#"{"1":{"i32":2},"2":{"str":"555"}}"#.as_bytes().to_vec());
        prot.read_struct_begin().unwrap();
        let f1 = prot.read_field_begin().unwrap().unwrap();
        assert_eq!((f1.ty, f1.id), (WireType::I32, 1));
        assert_eq!(prot.read_i32().unwrap(), 2);
        prot.read_field_end().unwrap();
        let f2 = prot.read_field_begin().unwrap().unwrap();
        assert_eq!((f2.ty, f2.id), (WireType::String, 2));
        assert_eq!(prot.read_string().unwrap(), "555");
        prot.read_field_end().unwrap();
        assert!(prot.read_field_begin().unwrap().is_none());
        prot.read_struct_end().unwrap();
    }

    #[test]
    fn test_message_envelope() {
        let mut prot = protocol();
        let header = MessageHeader {
            name: "ping".into(),
            kind: MessageKind::Call,
            seqid: 9,
        };
        prot.write_message_begin(&header).unwrap();
        prot.write_struct_begin("args").unwrap();
        prot.write_field_stop().unwrap();
        prot.write_struct_end().unwrap();
        prot.write_message_end().unwrap();
        assert_eq!(written(&mut prot), r#"[1,"ping",1,9,{}]"#);

        assert_eq!(prot.read_message_begin().unwrap(), header);
        prot.read_struct_begin().unwrap();
        assert!(prot.read_field_begin().unwrap().is_none());
        prot.read_struct_end().unwrap();
        prot.read_message_end().unwrap();
    }

    #[test]
    fn test_map_layout_and_read() {
        let mut prot = protocol();
        prot.write_map_begin(WireType::String, WireType::I32, 2).unwrap();
        prot.write_string("a").unwrap();
        prot.write_i32(1).unwrap();
        prot.write_string("b").unwrap();
        prot.write_i32(2).unwrap();
        prot.write_map_end().unwrap();
        assert_eq!(written(&mut prot), r#"["str","i32",2,{"a":1,"b":2}]"#);

        let (k, v, size) = prot.read_map_begin().unwrap();
        assert_eq!((k, v, size), (WireType::String, WireType::I32, 2));
        assert_eq!(prot.read_string().unwrap(), "a");
        assert_eq!(prot.read_i32().unwrap(), 1);
        assert_eq!(prot.read_string().unwrap(), "b");
        assert_eq!(prot.read_i32().unwrap(), 2);
        prot.read_map_end().unwrap();
    }

    #[test]
    fn test_integer_map_keys_are_quoted() {
        let mut prot = protocol();
        prot.write_map_begin(WireType::I32, WireType::Bool, 1).unwrap();
        prot.write_i32(5).unwrap();
        prot.write_bool(true).unwrap();
        prot.write_map_end().unwrap();
        assert_eq!(written(&mut prot), r#"["i32","tf",1,{"5":1}]"#);

        let (k, _, size) = prot.read_map_begin().unwrap();
        assert_eq!((k, size), (WireType::I32, 1));
        assert_eq!(prot.read_i32().unwrap(), 5);
        assert!(prot.read_bool().unwrap());
        prot.read_map_end().unwrap();
    }

    #[test]
    fn test_binary_base64() {
        let mut prot = protocol();
        prot.write_binary(&[1, 2, 3]).unwrap();
        assert_eq!(written(&mut prot), r#""AQID""#);
        assert_eq!(prot.read_binary().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_string_escapes() {
        let mut prot = protocol();
        prot.write_string("a\"b\\c\nd\u{1}").unwrap();
        assert_eq!(written(&mut prot), r#""a\"b\\c\nd""#);
        assert_eq!(prot.read_string().unwrap(), "a\"b\\c\nd\u{1}");
    }

    #[test]
    fn test_unicode_escape_with_surrogate_pair() {
        let mut prot = protocol();
        prot.transport_mut()
            .set_bytes(br#""\ud83d\ude00""#.to_vec());
        assert_eq!(prot.read_string().unwrap(), "\u{1f600}");

        // Raw UTF-8 passes through unescaped.
        prot.transport_mut()
            .set_bytes("\"é\"".as_bytes().to_vec());
        assert_eq!(prot.read_string().unwrap(), "é");
    }

    #[test]
    fn test_double_specials() {
        let mut prot = protocol();
        prot.write_double(f64::NAN).unwrap();
        assert_eq!(written(&mut prot), r#""NaN""#);
        assert!(prot.read_double().unwrap().is_nan());
    }

    #[test]
    fn test_list_layout() {
        let mut prot = protocol();
        prot.write_list_begin(WireType::I16, 3).unwrap();
        prot.write_i16(1).unwrap();
        prot.write_i16(2).unwrap();
        prot.write_i16(3).unwrap();
        prot.write_list_end().unwrap();
        // Elements are inline after the tag and size, per the TJSON form.
        assert_eq!(written(&mut prot), r#"["i16",3,1,2,3]"#);

        assert_eq!(prot.read_list_begin().unwrap(), (WireType::I16, 3));
        assert_eq!(prot.read_i16().unwrap(), 1);
        assert_eq!(prot.read_i16().unwrap(), 2);
        assert_eq!(prot.read_i16().unwrap(), 3);
        prot.read_list_end().unwrap();
    }

    #[test]
    fn test_bad_version_rejected() {
        let mut prot = protocol();
        prot.transport_mut()
            .set_bytes(br#"[2,"ping",1,0,{}]"#.to_vec());
        assert!(matches!(
            prot.read_message_begin(),
            Err(ProtocolError::BadVersion(_))
        ));
    }
}
