//! Protocol Module
//!
//! Defines the wire protocol between `RemoteGateway` and the server.
//!
//! ## Protocol Format (V1 - Simple Binary)
//!
//! ### Request Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │ Cmd (1)  │ Len (4)  │         Args                │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! ### Commands
//! - 0x01..0x08: PING, GET, SET, INCR, EXISTS, EXPIRE, TTL, DEL
//! - 0x10..0x17: HSETALL, HSET, HGET, HGETALL, HINCRBY, HDEL, HEXISTS, HVALS
//! - 0x18: HINCRBOUNDED - key, field, direction, delta, limit
//!
//! ### Response Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │Status(1) │ Len (4)  │         Payload             │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! ### Status Codes
//! - 0x00: OK        - 0x04: TEXT
//! - 0x01: NIL       - 0x05: MAP
//! - 0x02: ERROR     - 0x06: LIST
//! - 0x03: INT       - 0x07: BOUNDED

mod command;
mod response;
mod codec;

pub use command::{Command, CommandType};
pub use response::{ErrorCode, Reply, Status};
pub use codec::{
    decode_command, decode_reply, encode_command, encode_reply, read_command, read_reply,
    write_command, write_reply, HEADER_SIZE, MAX_PAYLOAD_SIZE,
};
