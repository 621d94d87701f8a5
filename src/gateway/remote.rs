//! Remote gateway
//!
//! Talks to a `hashsync-server` over TCP through a small connection pool.
//!
//! ## Pooling
//! Idle connections sit in a lock-free `ArrayQueue`. Each call borrows one
//! (or dials a new one), performs a single request/reply exchange and hands
//! it back. A connection that fails with an I/O error, or that the server
//! turned away as busy, is dropped instead of being returned. Before reuse a
//! pooled connection is checked for a close from the server's side (idle
//! timeout, restart) and discarded if it has one. The gateway never retries
//! on its own.

use std::io::{BufReader, BufWriter};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use crossbeam::queue::ArrayQueue;

use crate::bound::{BoundedOutcome, BoundedStep};
use crate::config::Config;
use crate::error::{Result, SyncError};
use crate::mapper::FieldMap;
use crate::network::socket::{readiness, Readiness};
use crate::protocol::{read_reply, write_command, Command, ErrorCode, Reply};

use super::StoreGateway;

/// One open client connection
struct ClientConnection {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
}

impl ClientConnection {
    fn open(addr: SocketAddr, config: &Config) -> Result<Self> {
        let stream = TcpStream::connect_timeout(&addr, config.connect_timeout())?;
        stream.set_nodelay(true)?;
        if config.read_timeout_ms > 0 {
            stream.set_read_timeout(Some(Duration::from_millis(config.read_timeout_ms)))?;
        }
        if config.write_timeout_ms > 0 {
            stream.set_write_timeout(Some(Duration::from_millis(config.write_timeout_ms)))?;
        }

        let read_stream = stream.try_clone()?;
        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(stream),
        })
    }

    fn call(&mut self, command: &Command) -> Result<Reply> {
        write_command(&mut self.writer, command)?;
        read_reply(&mut self.reader)
    }

    /// Open, with nothing unread from the server
    ///
    /// Anything waiting before a request is sent is either a close or a
    /// stray reply, and both rule the connection out.
    fn is_reusable(&self) -> bool {
        self.reader.buffer().is_empty()
            && matches!(readiness(self.reader.get_ref()), Ok(Readiness::Idle))
    }
}

/// Pooled TCP gateway to a remote store
pub struct RemoteGateway {
    addr: SocketAddr,
    config: Config,
    idle: ArrayQueue<ClientConnection>,
}

impl RemoteGateway {
    /// Create a gateway for `config.store_addr`
    ///
    /// No connection is made until the first call.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let addr = config
            .store_addr
            .to_socket_addrs()
            .map_err(|e| SyncError::Config(format!("bad store address {}: {}", config.store_addr, e)))?
            .next()
            .ok_or_else(|| {
                SyncError::Config(format!("store address {} did not resolve", config.store_addr))
            })?;

        Ok(Self {
            addr,
            idle: ArrayQueue::new(config.pool_size),
            config,
        })
    }

    /// Connect to `addr` with otherwise default settings
    pub fn connect(addr: impl Into<String>) -> Result<Self> {
        Self::new(Config::builder().store_addr(addr).build())
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Number of idle pooled connections
    pub fn idle_connections(&self) -> usize {
        self.idle.len()
    }

    /// Round-trip a health check
    pub fn ping(&self) -> Result<()> {
        match self.call(Command::Ping)? {
            Reply::Ok => Ok(()),
            other => Err(unexpected("Ping", other)),
        }
    }

    /// Borrow a pooled connection for one action, returning it afterwards
    fn with_connection<T>(&self, action: impl FnOnce(&mut ClientConnection) -> Result<T>) -> Result<T> {
        let mut connection = loop {
            match self.idle.pop() {
                Some(connection) if connection.is_reusable() => break connection,
                Some(_) => tracing::debug!("Discarding closed pooled connection to {}", self.addr),
                None => {
                    break ClientConnection::open(self.addr, &self.config)
                        .map_err(|e| self.unavailable(e))?
                }
            }
        };

        match action(&mut connection) {
            // Mid-frame, or closed by the server; it cannot be reused
            Err(e @ (SyncError::Io(_) | SyncError::Protocol(_) | SyncError::StoreUnavailable(_))) => {
                tracing::warn!("Dropping connection to {}: {}", self.addr, e);
                Err(self.unavailable(e))
            }
            result => {
                // A full pool just closes the surplus connection
                let _ = self.idle.push(connection);
                result
            }
        }
    }

    fn unavailable(&self, error: SyncError) -> SyncError {
        match error {
            SyncError::Io(e) => SyncError::StoreUnavailable(format!("{}: {}", self.addr, e)),
            other => other,
        }
    }

    /// Send one command; error replies become errors
    fn call(&self, command: Command) -> Result<Reply> {
        let reply = self.with_connection(|connection| match connection.call(&command)? {
            // The server closes a connection it turned away
            Reply::Error {
                code: ErrorCode::Busy,
                args,
            } => Err(Reply::into_error(ErrorCode::Busy, args)),
            reply => Ok(reply),
        })?;
        match reply {
            Reply::Error { code, args } => Err(Reply::into_error(code, args)),
            reply => Ok(reply),
        }
    }
}

fn unexpected(command: &str, reply: Reply) -> SyncError {
    SyncError::Protocol(format!("{}: unexpected reply {:?}", command, reply))
}

fn expect_int(command: &str, reply: Reply) -> Result<i64> {
    match reply {
        Reply::Int(value) => Ok(value),
        other => Err(unexpected(command, other)),
    }
}

fn expect_text(command: &str, reply: Reply) -> Result<Option<String>> {
    match reply {
        Reply::Text(text) => Ok(Some(text)),
        Reply::Nil => Ok(None),
        other => Err(unexpected(command, other)),
    }
}

fn expect_ok(command: &str, reply: Reply) -> Result<()> {
    match reply {
        Reply::Ok => Ok(()),
        other => Err(unexpected(command, other)),
    }
}

impl StoreGateway for RemoteGateway {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let reply = self.call(Command::Get { key: key.to_string() })?;
        expect_text("Get", reply)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let reply = self.call(Command::Set {
            key: key.to_string(),
            value: value.to_string(),
        })?;
        expect_ok("Set", reply)
    }

    fn incr(&self, key: &str) -> Result<i64> {
        let reply = self.call(Command::Incr { key: key.to_string() })?;
        expect_int("Incr", reply)
    }

    fn exists(&self, key: &str) -> Result<bool> {
        let reply = self.call(Command::Exists { key: key.to_string() })?;
        Ok(expect_int("Exists", reply)? != 0)
    }

    fn expire(&self, key: &str, seconds: u64) -> Result<bool> {
        let reply = self.call(Command::Expire {
            key: key.to_string(),
            seconds,
        })?;
        Ok(expect_int("Expire", reply)? != 0)
    }

    fn ttl(&self, key: &str) -> Result<Option<u64>> {
        match self.call(Command::Ttl { key: key.to_string() })? {
            Reply::Nil => Ok(None),
            Reply::Int(seconds) => Ok(Some(seconds.max(0) as u64)),
            other => Err(unexpected("Ttl", other)),
        }
    }

    fn delete(&self, keys: &[&str]) -> Result<u64> {
        let reply = self.call(Command::Delete {
            keys: keys.iter().map(|k| k.to_string()).collect(),
        })?;
        Ok(expect_int("Delete", reply)?.max(0) as u64)
    }

    fn hash_set_all(&self, key: &str, fields: &FieldMap) -> Result<()> {
        let reply = self.call(Command::HashSetAll {
            key: key.to_string(),
            fields: fields.clone(),
        })?;
        expect_ok("HashSetAll", reply)
    }

    fn hash_set_field(&self, key: &str, field: &str, value: &str) -> Result<bool> {
        let reply = self.call(Command::HashSetField {
            key: key.to_string(),
            field: field.to_string(),
            value: value.to_string(),
        })?;
        Ok(expect_int("HashSetField", reply)? == 1)
    }

    fn hash_get_field(&self, key: &str, field: &str) -> Result<Option<String>> {
        let reply = self.call(Command::HashGetField {
            key: key.to_string(),
            field: field.to_string(),
        })?;
        expect_text("HashGetField", reply)
    }

    fn hash_get_all(&self, key: &str) -> Result<FieldMap> {
        match self.call(Command::HashGetAll { key: key.to_string() })? {
            Reply::Map(fields) => Ok(fields),
            other => Err(unexpected("HashGetAll", other)),
        }
    }

    fn hash_increment_field(&self, key: &str, field: &str, delta: i64) -> Result<i64> {
        let reply = self.call(Command::HashIncrement {
            key: key.to_string(),
            field: field.to_string(),
            delta,
        })?;
        expect_int("HashIncrement", reply)
    }

    fn hash_delete_fields(&self, key: &str, fields: &[&str]) -> Result<u64> {
        let reply = self.call(Command::HashDeleteFields {
            key: key.to_string(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
        })?;
        Ok(expect_int("HashDeleteFields", reply)?.max(0) as u64)
    }

    fn hash_exists_field(&self, key: &str, field: &str) -> Result<bool> {
        let reply = self.call(Command::HashExistsField {
            key: key.to_string(),
            field: field.to_string(),
        })?;
        Ok(expect_int("HashExistsField", reply)? != 0)
    }

    fn hash_values(&self, key: &str) -> Result<Vec<String>> {
        match self.call(Command::HashValues { key: key.to_string() })? {
            Reply::List(values) => Ok(values),
            other => Err(unexpected("HashValues", other)),
        }
    }

    fn hash_increment_bounded(
        &self,
        key: &str,
        field: &str,
        step: BoundedStep,
    ) -> Result<BoundedOutcome> {
        match self.call(Command::HashIncrementBounded {
            key: key.to_string(),
            field: field.to_string(),
            step,
        })? {
            Reply::Bounded(outcome) => Ok(outcome),
            other => Err(unexpected("HashIncrementBounded", other)),
        }
    }
}
