//! TCP Server
//!
//! Accepts connections and parks them on a shared queue. Workers take a
//! connection, serve whatever requests it has waiting, and put it back, so a
//! handful of workers can serve many mostly idle clients.

use std::io::ErrorKind;
use std::net::{TcpListener, TcpStream};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TrySendError};

use crate::config::Config;
use crate::error::Result;
use crate::gateway::{MemoryStore, StoreGateway};
use crate::protocol::{write_reply, Reply};

use super::connection::{Connection, Turn};

/// How long the acceptor sleeps when no connection is pending
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How long a worker waits on an empty queue before checking for shutdown
const WORKER_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Pause once a worker has cycled through the queue without serving anything
const IDLE_BACKOFF: Duration = Duration::from_millis(1);

/// Counts toward `active` until dropped
struct ActiveSlot(Arc<AtomicUsize>);

impl ActiveSlot {
    fn acquire(active: &Arc<AtomicUsize>) -> Self {
        active.fetch_add(1, Ordering::AcqRel);
        Self(Arc::clone(active))
    }
}

impl Drop for ActiveSlot {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// A client connection waiting for its next turn
struct Parked {
    connection: Connection,
    _slot: ActiveSlot,
}

/// TCP server exposing a `MemoryStore`
pub struct Server {
    config: Config,
    store: Arc<MemoryStore>,
    shutdown: Arc<AtomicBool>,
    active: Arc<AtomicUsize>,
}

impl Server {
    /// Create a new server with the given config and store
    pub fn new(config: Config, store: Arc<MemoryStore>) -> Self {
        Self {
            config,
            store,
            shutdown: Arc::new(AtomicBool::new(false)),
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Bind the configured listen address
    pub fn bind(&self) -> Result<TcpListener> {
        Ok(TcpListener::bind(&self.config.listen_addr)?)
    }

    /// Start the server on the configured address (blocking)
    pub fn run(&self) -> Result<()> {
        let listener = self.bind()?;
        self.serve(listener)
    }

    /// Serve connections from an already bound listener (blocking)
    ///
    /// Returns once `shutdown` has been signalled and every worker has
    /// stopped. Connections still open at that point are closed.
    pub fn serve(&self, listener: TcpListener) -> Result<()> {
        self.config.validate()?;
        listener.set_nonblocking(true)?;
        tracing::info!("Listening on {}", listener.local_addr()?);

        // Every parked connection holds a slot, so the queue never fills up
        let (sender, receiver) = channel::bounded::<Parked>(self.config.max_connections);
        let workers: Vec<JoinHandle<()>> = (0..self.config.worker_threads)
            .map(|id| self.spawn_worker(id, sender.clone(), receiver.clone()))
            .collect::<std::io::Result<_>>()?;
        drop(receiver);

        let mut last_purge = Instant::now();
        while !self.shutdown.load(Ordering::Relaxed) {
            match listener.accept() {
                Ok((stream, addr)) => {
                    if self.active.load(Ordering::Acquire) >= self.config.max_connections {
                        tracing::warn!("Rejecting {}: connection limit reached", addr);
                        reject(stream);
                        continue;
                    }
                    let slot = ActiveSlot::acquire(&self.active);
                    match self.open(stream) {
                        Ok(connection) => {
                            let parked = Parked {
                                connection,
                                _slot: slot,
                            };
                            if let Err(TrySendError::Disconnected(_)) = sender.try_send(parked) {
                                break;
                            }
                        }
                        Err(e) => tracing::debug!("Could not set up connection from {}: {}", addr, e),
                    }
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(e) => {
                    tracing::warn!("Accept failed: {}", e);
                }
            }

            if last_purge.elapsed() >= self.config.purge_interval() {
                let purged = self.store.purge_expired();
                if purged > 0 {
                    tracing::debug!("Purged {} expired keys", purged);
                }
                last_purge = Instant::now();
            }
        }

        tracing::info!("Shutting down, waiting for workers");
        drop(sender);
        for worker in workers {
            if worker.join().is_err() {
                tracing::error!("Worker thread panicked");
            }
        }
        Ok(())
    }

    fn open(&self, stream: TcpStream) -> Result<Connection> {
        let store: Arc<dyn StoreGateway> = self.store.clone();
        let mut connection = Connection::new(stream, store)?;
        connection.set_timeouts(self.config.read_timeout_ms, self.config.write_timeout_ms)?;
        tracing::debug!("Accepted connection from {}", connection.peer_addr());
        Ok(connection)
    }

    fn spawn_worker(
        &self,
        id: usize,
        sender: Sender<Parked>,
        receiver: Receiver<Parked>,
    ) -> std::io::Result<JoinHandle<()>> {
        let shutdown = Arc::clone(&self.shutdown);

        thread::Builder::new()
            .name(format!("hashsync-worker-{}", id))
            .spawn(move || {
                let mut idle_streak = 0usize;
                while !shutdown.load(Ordering::Relaxed) {
                    let mut parked = match receiver.recv_timeout(WORKER_POLL_INTERVAL) {
                        Ok(parked) => parked,
                        Err(RecvTimeoutError::Timeout) => continue,
                        Err(RecvTimeoutError::Disconnected) => break,
                    };

                    let turn = panic::catch_unwind(AssertUnwindSafe(|| parked.connection.turn()));
                    match turn {
                        Ok(Ok(Turn::Open(served))) => {
                            idle_streak = if served == 0 { idle_streak + 1 } else { 0 };
                            if sender.try_send(parked).is_err() {
                                break;
                            }
                            if idle_streak > receiver.len() {
                                thread::sleep(IDLE_BACKOFF);
                                idle_streak = 0;
                            }
                        }
                        Ok(Ok(Turn::Closed)) => {}
                        Ok(Err(e)) => {
                            tracing::debug!("Connection ended with error: {}", e);
                        }
                        Err(_) => {
                            tracing::error!(
                                "Handler panicked, closing connection from {}",
                                parked.connection.peer_addr()
                            );
                        }
                    }
                }
            })
    }

    /// Signal the server to shutdown gracefully
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    /// Flag that stops the accept loop when set
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Connections currently open
    pub fn active_connections(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }
}

/// Tell an over-limit client why it is being closed
fn reject(stream: TcpStream) {
    if stream.set_nonblocking(false).is_ok() {
        let mut stream = stream;
        let _ = write_reply(&mut stream, &Reply::busy("connection limit reached"));
    }
}
