//! Blocking TCP socket transport.

use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

use super::{Transport, TransportError, TransportResult};

/// A `TcpStream` behind the [`Transport`] contract.
///
/// Timeouts are plain socket deadlines in milliseconds; on expiry the
/// operation fails with `TransportError::Io` carrying a `TimedOut` kind.
#[derive(Debug)]
pub struct TcpTransport {
    stream: Option<TcpStream>,
}

impl TcpTransport {
    /// Connects to `addr` with no timeouts set.
    pub fn connect(addr: impl ToSocketAddrs) -> TransportResult<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        Ok(Self {
            stream: Some(stream),
        })
    }

    /// Wraps an accepted stream (server side).
    pub fn from_stream(stream: TcpStream) -> TransportResult<Self> {
        stream.set_nodelay(true)?;
        Ok(Self {
            stream: Some(stream),
        })
    }

    /// A second handle onto the same socket, so reads and writes can go
    /// through independent protocol stacks.
    pub fn try_clone(&self) -> TransportResult<Self> {
        let stream = self
            .stream
            .as_ref()
            .ok_or(TransportError::Closed)?
            .try_clone()?;
        Ok(Self {
            stream: Some(stream),
        })
    }

    pub fn set_read_timeout_ms(&mut self, ms: Option<u64>) -> TransportResult<()> {
        let stream = self.stream_mut()?;
        stream.set_read_timeout(ms.map(Duration::from_millis))?;
        Ok(())
    }

    pub fn set_write_timeout_ms(&mut self, ms: Option<u64>) -> TransportResult<()> {
        let stream = self.stream_mut()?;
        stream.set_write_timeout(ms.map(Duration::from_millis))?;
        Ok(())
    }

    fn stream_mut(&mut self) -> TransportResult<&mut TcpStream> {
        self.stream.as_mut().ok_or(TransportError::Closed)
    }
}

impl Transport for TcpTransport {
    fn read(&mut self, buf: &mut [u8]) -> TransportResult<usize> {
        let n = self.stream_mut()?.read(buf)?;
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> TransportResult<()> {
        self.stream_mut()?.write_all(buf)?;
        Ok(())
    }

    fn flush(&mut self) -> TransportResult<()> {
        self.stream_mut()?.flush()?;
        Ok(())
    }

    fn close(&mut self) -> TransportResult<()> {
        if let Some(stream) = self.stream.take() {
            // Both directions; the peer sees EOF on its next read.
            let _ = stream.shutdown(Shutdown::Both);
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }
}
