//! Length-prefixed framing over another transport.

use bytes::{BufMut, BytesMut};

use super::{Transport, TransportError, TransportResult};

pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024; // 16 MiB

/// Prefixes each flushed payload with a 4-byte big-endian length.
///
/// Writes accumulate until `flush` emits `[len][payload]` in one inner
/// write. Reads consume a whole frame before serving any bytes from it.
#[derive(Debug)]
pub struct FramedTransport<T> {
    inner: T,
    rframe: Vec<u8>,
    rpos: usize,
    wbuf: BytesMut,
    max_frame_size: usize,
}

impl<T: Transport> FramedTransport<T> {
    pub fn new(inner: T) -> Self {
        Self::with_max_frame_size(inner, DEFAULT_MAX_FRAME_SIZE)
    }

    pub fn with_max_frame_size(inner: T, max_frame_size: usize) -> Self {
        Self {
            inner,
            rframe: Vec::new(),
            rpos: 0,
            wbuf: BytesMut::new(),
            max_frame_size,
        }
    }

    pub fn into_inner(self) -> T {
        self.inner
    }

    fn remaining(&self) -> usize {
        self.rframe.len() - self.rpos
    }

    fn read_frame(&mut self) -> TransportResult<()> {
        let mut header = [0u8; 4];
        self.inner.read_exact(&mut header)?;
        let len = u32::from_be_bytes(header) as usize;
        if len > self.max_frame_size {
            return Err(TransportError::FrameTooLarge {
                size: len,
                limit: self.max_frame_size,
            });
        }
        let mut frame = vec![0u8; len];
        self.inner
            .read_exact(&mut frame)
            .map_err(|e| match e {
                TransportError::Eof => TransportError::FrameTruncated,
                other => other,
            })?;
        self.rframe = frame;
        self.rpos = 0;
        Ok(())
    }
}

impl<T: Transport> Transport for FramedTransport<T> {
    fn read(&mut self, buf: &mut [u8]) -> TransportResult<usize> {
        if self.remaining() == 0 {
            self.read_frame()?;
        }
        let n = self.remaining().min(buf.len());
        buf[..n].copy_from_slice(&self.rframe[self.rpos..self.rpos + n]);
        self.rpos += n;
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> TransportResult<()> {
        self.wbuf.put_slice(buf);
        Ok(())
    }

    fn flush(&mut self) -> TransportResult<()> {
        let payload = self.wbuf.split();
        if !payload.is_empty() {
            let mut out = BytesMut::with_capacity(4 + payload.len());
            out.put_u32(payload.len() as u32);
            out.put_slice(&payload);
            self.inner.write(&out)?;
        }
        self.inner.flush()
    }

    fn close(&mut self) -> TransportResult<()> {
        self.inner.close()
    }

    fn is_open(&self) -> bool {
        self.inner.is_open()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryTransport;

    #[test]
    fn test_frame_layout_on_flush() {
        let mut t = FramedTransport::new(MemoryTransport::new());
        t.write(b"abc").unwrap();
        t.flush().unwrap();
        assert_eq!(t.into_inner().bytes(), &[0, 0, 0, 3, b'a', b'b', b'c']);
    }

    #[test]
    fn test_round_trip() {
        let mut t = FramedTransport::new(MemoryTransport::new());
        t.write(b"hello").unwrap();
        t.flush().unwrap();
        let mut buf = [0u8; 5];
        t.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");
    }

    #[test]
    fn test_empty_flush_writes_nothing() {
        let mut t = FramedTransport::new(MemoryTransport::new());
        t.flush().unwrap();
        t.flush().unwrap();
        assert!(t.into_inner().bytes().is_empty());
    }

    #[test]
    fn test_frame_too_large() {
        let inner = MemoryTransport::from_bytes(vec![0x00, 0x10, 0x00, 0x00]);
        let mut t = FramedTransport::with_max_frame_size(inner, 1024);
        let mut buf = [0u8; 1];
        assert!(matches!(
            t.read(&mut buf),
            Err(TransportError::FrameTooLarge { size: 0x0010_0000, limit: 1024 })
        ));
    }

    #[test]
    fn test_truncated_frame() {
        // Header promises 10 bytes, only 3 arrive.
        let inner = MemoryTransport::from_bytes(vec![0, 0, 0, 10, 1, 2, 3]);
        let mut t = FramedTransport::new(inner);
        let mut buf = [0u8; 1];
        assert!(matches!(
            t.read(&mut buf),
            Err(TransportError::FrameTruncated)
        ));
    }
}
