//! Blocking thread-per-connection server.
//!
//! One OS thread per accepted connection; each session owns its transport
//! and protocol pair, and the shared [`Processor`] serves requests strictly
//! in order per connection. Hosts wanting a different execution model drive
//! [`Processor::process`] themselves.

use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;

use super::Processor;
use crate::config::RuntimeConfig;
use crate::protocol::{
    BinaryProtocol, CompactProtocol, JsonProtocol, Protocol, ProtocolError,
};
use crate::transport::{
    BufferedTransport, FramedTransport, TcpTransport, Transport, TransportError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolKind {
    Binary,
    Compact,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramingKind {
    /// Straight over the socket.
    Raw,
    Buffered,
    Framed,
}

/// Builds a protocol stack over a socket transport.
pub fn make_protocol(
    protocol: ProtocolKind,
    framing: FramingKind,
    trans: TcpTransport,
    config: Arc<RuntimeConfig>,
) -> Box<dyn Protocol + Send> {
    match framing {
        FramingKind::Raw => wrap(protocol, trans, config),
        FramingKind::Buffered => wrap(protocol, BufferedTransport::new(trans), config),
        FramingKind::Framed => {
            let limit = config.frame_size_limit;
            wrap(
                protocol,
                FramedTransport::with_max_frame_size(trans, limit),
                config,
            )
        }
    }
}

fn wrap<T: Transport + Send + 'static>(
    protocol: ProtocolKind,
    trans: T,
    config: Arc<RuntimeConfig>,
) -> Box<dyn Protocol + Send> {
    match protocol {
        ProtocolKind::Binary => Box::new(BinaryProtocol::with_config(trans, config)),
        ProtocolKind::Compact => Box::new(CompactProtocol::with_config(trans, config)),
        ProtocolKind::Json => Box::new(JsonProtocol::with_config(trans, config)),
    }
}

/// Accept loop plus per-connection session threads.
pub struct ThreadedServer {
    processor: Arc<Processor>,
    config: Arc<RuntimeConfig>,
    protocol: ProtocolKind,
    framing: FramingKind,
}

impl ThreadedServer {
    pub fn new(
        processor: Processor,
        config: RuntimeConfig,
        protocol: ProtocolKind,
        framing: FramingKind,
    ) -> Self {
        Self {
            processor: Arc::new(processor),
            config: Arc::new(config),
            protocol,
            framing,
        }
    }

    /// Serves connections from `listener` until the listener fails.
    pub fn serve(&self, listener: TcpListener) -> std::io::Result<()> {
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => self.spawn_session(stream),
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    fn spawn_session(&self, stream: TcpStream) {
        let peer = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "<unknown>".into());
        let processor = Arc::clone(&self.processor);
        let config = Arc::clone(&self.config);
        let protocol = self.protocol;
        let framing = self.framing;
        thread::spawn(move || {
            tracing::debug!(%peer, "session started");
            if let Err(e) = run_session(&processor, config, protocol, framing, stream) {
                tracing::error!(%peer, error = %e, "session ended with error");
            } else {
                tracing::debug!(%peer, "session closed");
            }
        });
    }
}

fn run_session(
    processor: &Processor,
    config: Arc<RuntimeConfig>,
    protocol: ProtocolKind,
    framing: FramingKind,
    stream: TcpStream,
) -> Result<(), ProtocolError> {
    // Reads and writes go through independent handles onto the same socket.
    let read_stream = stream.try_clone().map_err(TransportError::Io)?;
    let mut iprot = make_protocol(
        protocol,
        framing,
        TcpTransport::from_stream(read_stream)?,
        Arc::clone(&config),
    );
    let mut oprot = make_protocol(protocol, framing, TcpTransport::from_stream(stream)?, config);

    loop {
        match processor.process(&mut *iprot, &mut *oprot) {
            Ok(()) => {}
            // Peer went away between requests; a clean shutdown.
            Err(ProtocolError::Transport(TransportError::Eof))
            | Err(ProtocolError::Transport(TransportError::Closed)) => return Ok(()),
            Err(e) => return Err(e),
        }
    }
}
