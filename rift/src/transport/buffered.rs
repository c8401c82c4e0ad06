//! Read/write buffering over another transport.

use super::{Transport, TransportResult};

pub const DEFAULT_BUFFER_SIZE: usize = 4096;

/// Wraps a transport with a fixed-size read buffer and a write buffer that
/// accumulates until `flush`.
///
/// The two buffers are independent; neither ever holds partial-byte state.
/// The write buffer is detached before the inner write so a failing flush
/// does not replay stale bytes on retry.
#[derive(Debug)]
pub struct BufferedTransport<T> {
    inner: T,
    rbuf: Vec<u8>,
    rpos: usize,
    rbuf_size: usize,
    wbuf: Vec<u8>,
}

impl<T: Transport> BufferedTransport<T> {
    pub fn new(inner: T) -> Self {
        Self::with_capacity(inner, DEFAULT_BUFFER_SIZE)
    }

    pub fn with_capacity(inner: T, rbuf_size: usize) -> Self {
        Self {
            inner,
            rbuf: Vec::new(),
            rpos: 0,
            rbuf_size: rbuf_size.max(1),
            wbuf: Vec::new(),
        }
    }

    pub fn into_inner(self) -> T {
        self.inner
    }

    fn buffered(&self) -> usize {
        self.rbuf.len() - self.rpos
    }

    /// Refills the read buffer with a single inner read of at least `want`
    /// bytes worth of request; short reads are fine, zero means EOF.
    fn fill(&mut self, want: usize) -> TransportResult<usize> {
        let request = want.max(self.rbuf_size);
        self.rbuf.resize(request, 0);
        self.rpos = 0;
        let n = self.inner.read(&mut self.rbuf)?;
        self.rbuf.truncate(n);
        Ok(n)
    }
}

impl<T: Transport> Transport for BufferedTransport<T> {
    fn read(&mut self, buf: &mut [u8]) -> TransportResult<usize> {
        if self.buffered() == 0 && self.fill(buf.len())? == 0 {
            return Ok(0);
        }
        let n = self.buffered().min(buf.len());
        buf[..n].copy_from_slice(&self.rbuf[self.rpos..self.rpos + n]);
        self.rpos += n;
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> TransportResult<()> {
        self.wbuf.extend_from_slice(buf);
        Ok(())
    }

    fn flush(&mut self) -> TransportResult<()> {
        let out = std::mem::take(&mut self.wbuf);
        if !out.is_empty() {
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
    fn test_writes_buffer_until_flush() {
        let mut t = BufferedTransport::new(MemoryTransport::new());
        t.write(b"abc").unwrap();
        t.write(b"def").unwrap();
        assert!(t.into_inner().bytes().is_empty());

        let mut t = BufferedTransport::new(MemoryTransport::new());
        t.write(b"abc").unwrap();
        t.flush().unwrap();
        assert_eq!(t.into_inner().bytes(), b"abc");
    }

    #[test]
    fn test_reads_are_served_from_buffer() {
        let inner = MemoryTransport::from_bytes(b"hello world".to_vec());
        let mut t = BufferedTransport::with_capacity(inner, 4);
        let mut buf = [0u8; 5];
        t.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");
        let mut rest = [0u8; 6];
        t.read_exact(&mut rest).unwrap();
        assert_eq!(&rest, b" world");
    }

    #[test]
    fn test_double_flush_writes_once() {
        let mut t = BufferedTransport::new(MemoryTransport::new());
        t.write(b"xyz").unwrap();
        t.flush().unwrap();
        t.flush().unwrap();
        assert_eq!(t.into_inner().bytes(), b"xyz");
    }
}
