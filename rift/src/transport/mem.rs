//! Growable in-memory transport.

use super::{Transport, TransportError, TransportResult};

/// A byte tape: writes append, reads consume from the front.
///
/// After writing, reads begin at offset 0, so a single instance can carry a
/// message from an encoder to a decoder. The read cursor survives
/// interleaved writes.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    buffer: Vec<u8>,
    pos: usize,
    open: bool,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            pos: 0,
            open: true,
        }
    }

    /// Starts the tape pre-filled, ready to read.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            buffer: bytes.into(),
            pos: 0,
            open: true,
        }
    }

    /// Everything written so far, including bytes already read back.
    pub fn bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Drains the buffer and rewinds the cursor.
    pub fn take_bytes(&mut self) -> Vec<u8> {
        self.pos = 0;
        std::mem::take(&mut self.buffer)
    }

    /// Replaces the buffer contents and rewinds the cursor.
    pub fn set_bytes(&mut self, bytes: impl Into<Vec<u8>>) {
        self.buffer = bytes.into();
        self.pos = 0;
    }
}

impl Transport for MemoryTransport {
    fn read(&mut self, buf: &mut [u8]) -> TransportResult<usize> {
        if !self.open {
            return Err(TransportError::Closed);
        }
        let available = self.buffer.len().saturating_sub(self.pos);
        let n = available.min(buf.len());
        buf[..n].copy_from_slice(&self.buffer[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> TransportResult<()> {
        if !self.open {
            return Err(TransportError::Closed);
        }
        self.buffer.extend_from_slice(buf);
        Ok(())
    }

    fn flush(&mut self) -> TransportResult<()> {
        if !self.open {
            return Err(TransportError::Closed);
        }
        Ok(())
    }

    fn close(&mut self) -> TransportResult<()> {
        self.open = false;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tape_semantics() {
        let mut t = MemoryTransport::new();
        t.write(b"hello").unwrap();
        t.write(b" world").unwrap();
        let mut buf = [0u8; 5];
        t.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");
        let mut rest = [0u8; 6];
        t.read_exact(&mut rest).unwrap();
        assert_eq!(&rest, b" world");
    }

    #[test]
    fn test_eof_on_exhausted_tape() {
        let mut t = MemoryTransport::from_bytes(vec![1, 2]);
        let mut buf = [0u8; 3];
        assert!(matches!(
            t.read_exact(&mut buf),
            Err(TransportError::Eof)
        ));
    }

    #[test]
    fn test_closed_transport_errors() {
        let mut t = MemoryTransport::new();
        t.close().unwrap();
        assert!(!t.is_open());
        assert!(matches!(t.write(b"x"), Err(TransportError::Closed)));
        let mut buf = [0u8; 1];
        assert!(matches!(t.read(&mut buf), Err(TransportError::Closed)));
    }

    #[test]
    fn test_flush_is_idempotent() {
        let mut t = MemoryTransport::new();
        t.write(b"abc").unwrap();
        t.flush().unwrap();
        t.flush().unwrap();
        assert_eq!(t.bytes(), b"abc");
    }
}
