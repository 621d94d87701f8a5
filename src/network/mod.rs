//! Network Module
//!
//! TCP server and client handling.
//!
//! ## Architecture
//! - Single acceptor thread (non-blocking accept, polls the shutdown flag)
//! - Connections parked on a bounded queue; workers take one, serve the
//!   requests it has waiting, and put it back
//! - Commands routed through `dispatch` to the store

mod connection;
mod dispatch;
mod server;
pub(crate) mod socket;

pub use connection::{Connection, Turn};
pub use dispatch::dispatch;
pub use server::Server;
