//! Connection Handler
//!
//! Handles individual client connections. A connection does not own a
//! worker: each turn serves the requests that are already waiting and then
//! hands the connection back so the worker can serve someone else.

use std::io::{BufReader, BufWriter, ErrorKind};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{Result, SyncError};
use crate::gateway::StoreGateway;
use crate::protocol::{read_command, write_reply, Reply};

use super::dispatch;
use super::socket::{readiness, Readiness};

/// Upper bound on requests served per turn, so one busy client cannot
/// starve the others sharing a worker
const MAX_COMMANDS_PER_TURN: usize = 64;

/// How long a started frame may take to arrive when no read timeout is set
const DEFAULT_FRAME_TIMEOUT: Duration = Duration::from_secs(5);

/// Outcome of one turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Turn {
    /// Still open; served this many commands
    Open(usize),

    /// Client went away or idled out
    Closed,
}

/// Handles a single client connection
pub struct Connection {
    /// TCP stream reader (buffered for efficiency)
    reader: BufReader<TcpStream>,

    /// TCP stream writer (buffered for efficiency)
    writer: BufWriter<TcpStream>,

    /// Store the commands run against
    store: Arc<dyn StoreGateway>,

    /// Peer address for logging
    peer_addr: String,

    /// Close after this long without a request (None = never)
    idle_timeout: Option<Duration>,

    last_active: Instant,
}

impl Connection {
    /// Create a new connection handler
    ///
    /// Sets up buffered I/O; the stream is switched back to blocking mode
    /// since it may come from a non-blocking listener.
    pub fn new(stream: TcpStream, store: Arc<dyn StoreGateway>) -> Result<Self> {
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        stream.set_nonblocking(false)?;
        // Disable Nagle's algorithm for low latency
        stream.set_nodelay(true)?;
        stream.set_read_timeout(Some(DEFAULT_FRAME_TIMEOUT))?;

        let read_stream = stream.try_clone()?;
        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(stream),
            store,
            peer_addr,
            idle_timeout: None,
            last_active: Instant::now(),
        })
    }

    /// Configure connection timeouts (0 keeps the default)
    ///
    /// The read timeout doubles as the idle timeout: a connection that sends
    /// nothing for that long is closed. Without one it stays open until the
    /// client leaves.
    pub fn set_timeouts(&mut self, read_ms: u64, write_ms: u64) -> Result<()> {
        if read_ms > 0 {
            let timeout = Duration::from_millis(read_ms);
            self.reader.get_ref().set_read_timeout(Some(timeout))?;
            self.idle_timeout = Some(timeout);
        }
        if write_ms > 0 {
            self.writer
                .get_ref()
                .set_write_timeout(Some(Duration::from_millis(write_ms)))?;
        }
        Ok(())
    }

    /// Serve every request already waiting, without blocking for new ones
    pub fn turn(&mut self) -> Result<Turn> {
        let mut served = 0;
        while served < MAX_COMMANDS_PER_TURN {
            let state = if self.reader.buffer().is_empty() {
                readiness(self.reader.get_ref())?
            } else {
                Readiness::Ready
            };

            match state {
                Readiness::Idle => break,
                Readiness::Closed => {
                    tracing::debug!("Client {} disconnected", self.peer_addr);
                    return Ok(Turn::Closed);
                }
                Readiness::Ready => {
                    if !self.serve_one()? {
                        return Ok(Turn::Closed);
                    }
                    served += 1;
                    self.last_active = Instant::now();
                }
            }
        }

        if served == 0 && self.idle_timeout.is_some_and(|t| self.last_active.elapsed() >= t) {
            tracing::debug!("Closing idle connection from {}", self.peer_addr);
            return Ok(Turn::Closed);
        }
        Ok(Turn::Open(served))
    }

    /// Read one command and answer it; false once the client is gone
    fn serve_one(&mut self) -> Result<bool> {
        let command = match read_command(&mut self.reader) {
            Ok(command) => command,
            Err(SyncError::Io(ref e)) if is_disconnect(e.kind()) => {
                tracing::debug!("Client {} disconnected ({:?})", self.peer_addr, e.kind());
                return Ok(false);
            }
            Err(e) => {
                tracing::warn!("Error reading from {}: {}", self.peer_addr, e);
                let _ = self.send(&Reply::from_error(&e));
                return Err(e);
            }
        };

        tracing::trace!("Received command from {}: {:?}", self.peer_addr, command);

        let reply = dispatch(self.store.as_ref(), command);

        match self.send(&reply) {
            Ok(()) => Ok(true),
            Err(SyncError::Io(ref e)) if is_disconnect(e.kind()) || e.kind() == ErrorKind::BrokenPipe => {
                tracing::debug!(
                    "Client {} disconnected before reply could be sent: {}",
                    self.peer_addr,
                    e
                );
                Ok(false)
            }
            Err(e) => {
                tracing::warn!("Error writing to {}: {}", self.peer_addr, e);
                Err(e)
            }
        }
    }

    /// Send a reply to the client
    pub fn send(&mut self, reply: &Reply) -> Result<()> {
        write_reply(&mut self.writer, reply)
    }

    /// Get the peer address string
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }
}

/// Read-side conditions that simply end the session
fn is_disconnect(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::UnexpectedEof
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            // A started frame that never completed (Windows reports TimedOut)
            | ErrorKind::WouldBlock
            | ErrorKind::TimedOut
    )
}
