//! Socket readiness
//!
//! Non-blocking peek used to tell whether a blocking stream has a request
//! waiting, is idle, or was closed by the peer.

use std::io::{self, ErrorKind};
use std::net::TcpStream;

/// State of a stream's read side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Bytes are waiting to be read
    Ready,

    /// Open, nothing to read yet
    Idle,

    /// The peer closed or reset the connection
    Closed,
}

/// Peek at `stream` without blocking or consuming anything.
///
/// The stream is left in blocking mode afterwards.
pub fn readiness(stream: &TcpStream) -> io::Result<Readiness> {
    stream.set_nonblocking(true)?;
    let mut byte = [0u8; 1];
    let peeked = stream.peek(&mut byte);
    stream.set_nonblocking(false)?;

    match peeked {
        Ok(0) => Ok(Readiness::Closed),
        Ok(_) => Ok(Readiness::Ready),
        Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(Readiness::Idle),
        Err(e)
            if matches!(
                e.kind(),
                ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted | ErrorKind::BrokenPipe
            ) =>
        {
            Ok(Readiness::Closed)
        }
        Err(e) => Err(e),
    }
}
