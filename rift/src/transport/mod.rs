//! Byte-stream abstraction underneath the protocols.
//!
//! Transports are synchronous and blocking; whatever concurrency the host
//! runs lives above the processor, not here. A protocol instance owns its
//! transport and neither is shared across workers.

pub mod buffered;
pub mod framed;
pub mod mem;
pub mod socket;

pub use buffered::BufferedTransport;
pub use framed::FramedTransport;
pub use mem::MemoryTransport;
pub use socket::TcpTransport;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("transport is closed")]
    Closed,

    #[error("end of file reading from transport")]
    Eof,

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("frame length {size} exceeds limit {limit}")]
    FrameTooLarge { size: usize, limit: usize },

    #[error("frame truncated")]
    FrameTruncated,
}

pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Blocking byte-stream contract.
///
/// `read` may return fewer bytes than requested; `read_exact` loops until the
/// buffer is full and fails with [`TransportError::Eof`] if the stream ends
/// first. `flush` must be idempotent.
pub trait Transport {
    /// Reads up to `buf.len()` bytes, returning how many were read.
    /// A return of 0 means end of stream.
    fn read(&mut self, buf: &mut [u8]) -> TransportResult<usize>;

    fn write(&mut self, buf: &[u8]) -> TransportResult<()>;

    fn flush(&mut self) -> TransportResult<()>;

    fn close(&mut self) -> TransportResult<()>;

    fn is_open(&self) -> bool;

    /// Blocks until exactly `buf.len()` bytes have been read.
    fn read_exact(&mut self, buf: &mut [u8]) -> TransportResult<()> {
        let mut have = 0;
        while have < buf.len() {
            let n = self.read(&mut buf[have..])?;
            if n == 0 {
                return Err(TransportError::Eof);
            }
            have += n;
        }
        Ok(())
    }
}

// Protocols hold `Box<dyn Transport>` behind generics in some hosts; make
// boxed transports usable directly.
impl<T: Transport + ?Sized> Transport for Box<T> {
    fn read(&mut self, buf: &mut [u8]) -> TransportResult<usize> {
        (**self).read(buf)
    }

    fn write(&mut self, buf: &[u8]) -> TransportResult<()> {
        (**self).write(buf)
    }

    fn flush(&mut self) -> TransportResult<()> {
        (**self).flush()
    }

    fn close(&mut self) -> TransportResult<()> {
        (**self).close()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }
}
