//! Protocol codec
//!
//! Encoding and decoding functions for the wire protocol.
//!
//! ## Wire Format
//!
//! ### Request (Command) Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │ Cmd (1)  │ Len (4)  │   Args: (len (4) + utf8)*   │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! ### Response (Reply) Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │Status(1) │ Len (4)  │         Payload             │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! ### Payload by Status
//! - OK, NIL: empty
//! - INT:     i64 (8 bytes, big endian)
//! - TEXT:    utf8 bytes
//! - MAP:     args, alternating field and value
//! - LIST:    args
//! - BOUNDED: tag (1: 0 applied, 1 clamped, 2 refused) + i64 (8)
//! - ERROR:   error code (1) + args

use std::io::{Read, Write};

use bytes::{Buf, BufMut, BytesMut};

use crate::bound::BoundedOutcome;
use crate::error::{Result, SyncError};
use crate::mapper::FieldMap;

use super::{Command, CommandType, ErrorCode, Reply, Status};

/// Header size: 1 byte command/status + 4 bytes length
pub const HEADER_SIZE: usize = 5;

/// Maximum payload size (16 MB)
pub const MAX_PAYLOAD_SIZE: u32 = 16 * 1024 * 1024;

const TAG_APPLIED: u8 = 0;
const TAG_CLAMPED: u8 = 1;
const TAG_REFUSED: u8 = 2;

// =============================================================================
// Command Encoding/Decoding
// =============================================================================

/// Encode a command to bytes
///
/// Format: cmd_type (1) + payload_len (4) + args
pub fn encode_command(command: &Command) -> Vec<u8> {
    let mut payload = BytesMut::new();
    put_args(&mut payload, &command.to_args());
    frame(command.command_type() as u8, &payload)
}

/// Decode a command from bytes
pub fn decode_command(bytes: &[u8]) -> Result<Command> {
    let (type_byte, mut payload) = split_frame(bytes)?;

    let command_type = CommandType::from_u8(type_byte).ok_or_else(|| {
        SyncError::Protocol(format!("Unknown command type: 0x{:02x}", type_byte))
    })?;

    let args = get_args(&mut payload)?;
    Command::from_args(command_type, args)
}

// =============================================================================
// Reply Encoding/Decoding
// =============================================================================

/// Encode a reply to bytes
///
/// Format: status (1) + payload_len (4) + payload
pub fn encode_reply(reply: &Reply) -> Vec<u8> {
    let mut payload = BytesMut::new();
    match reply {
        Reply::Ok | Reply::Nil => {}
        Reply::Int(value) => payload.put_i64(*value),
        Reply::Text(text) => payload.put_slice(text.as_bytes()),
        Reply::Map(fields) => {
            let flat: Vec<String> = fields
                .iter()
                .flat_map(|(f, v)| [f.clone(), v.clone()])
                .collect();
            put_args(&mut payload, &flat);
        }
        Reply::List(items) => put_args(&mut payload, items),
        Reply::Bounded(outcome) => {
            let (tag, value) = match outcome {
                BoundedOutcome::Applied(v) => (TAG_APPLIED, *v),
                BoundedOutcome::Clamped(v) => (TAG_CLAMPED, *v),
                BoundedOutcome::Refused => (TAG_REFUSED, 0),
            };
            payload.put_u8(tag);
            payload.put_i64(value);
        }
        Reply::Error { code, args } => {
            payload.put_u8(*code as u8);
            put_args(&mut payload, args);
        }
    }
    frame(reply.status() as u8, &payload)
}

/// Decode a reply from bytes
pub fn decode_reply(bytes: &[u8]) -> Result<Reply> {
    let (status_byte, mut payload) = split_frame(bytes)?;

    let status = Status::from_u8(status_byte).ok_or_else(|| {
        SyncError::Protocol(format!("Unknown reply status: 0x{:02x}", status_byte))
    })?;

    let reply = match status {
        Status::Ok => Reply::Ok,
        Status::Nil => Reply::Nil,
        Status::Int => {
            need(&payload, 8, "INT reply")?;
            Reply::Int(payload.get_i64())
        }
        Status::Text => Reply::Text(utf8(payload.to_vec())?),
        Status::Map => {
            let flat = get_args(&mut payload)?;
            if flat.len() % 2 != 0 {
                return Err(SyncError::Protocol(
                    "MAP reply: odd number of entries".to_string(),
                ));
            }
            let mut fields = FieldMap::new();
            let mut entries = flat.into_iter();
            while let (Some(field), Some(value)) = (entries.next(), entries.next()) {
                fields.insert(field, value);
            }
            Reply::Map(fields)
        }
        Status::List => Reply::List(get_args(&mut payload)?),
        Status::Bounded => {
            need(&payload, 9, "BOUNDED reply")?;
            let tag = payload.get_u8();
            let value = payload.get_i64();
            let outcome = match tag {
                TAG_APPLIED => BoundedOutcome::Applied(value),
                TAG_CLAMPED => BoundedOutcome::Clamped(value),
                TAG_REFUSED => BoundedOutcome::Refused,
                other => {
                    return Err(SyncError::Protocol(format!(
                        "BOUNDED reply: unknown tag {}",
                        other
                    )))
                }
            };
            Reply::Bounded(outcome)
        }
        Status::Error => {
            need(&payload, 1, "ERROR reply")?;
            let code = ErrorCode::from_u8(payload.get_u8());
            Reply::Error {
                code,
                args: get_args(&mut payload)?,
            }
        }
    };
    Ok(reply)
}

// =============================================================================
// Framing helpers
// =============================================================================

fn frame(type_byte: u8, payload: &[u8]) -> Vec<u8> {
    let mut message = BytesMut::with_capacity(HEADER_SIZE + payload.len());
    message.put_u8(type_byte);
    message.put_u32(payload.len() as u32);
    message.put_slice(payload);
    message.to_vec()
}

/// Validate the header and return (type byte, payload)
fn split_frame(bytes: &[u8]) -> Result<(u8, &[u8])> {
    if bytes.len() < HEADER_SIZE {
        return Err(SyncError::Protocol(format!(
            "Incomplete header: expected {} bytes, got {}",
            HEADER_SIZE,
            bytes.len()
        )));
    }

    let mut header = &bytes[..HEADER_SIZE];
    let type_byte = header.get_u8();
    let payload_len = header.get_u32();
    check_payload_len(payload_len)?;

    let total_len = HEADER_SIZE + payload_len as usize;
    if bytes.len() < total_len {
        return Err(SyncError::Protocol(format!(
            "Incomplete payload: expected {} bytes, got {}",
            total_len,
            bytes.len()
        )));
    }

    Ok((type_byte, &bytes[HEADER_SIZE..total_len]))
}

fn check_payload_len(payload_len: u32) -> Result<()> {
    if payload_len > MAX_PAYLOAD_SIZE {
        return Err(SyncError::Protocol(format!(
            "Payload too large: {} bytes (max {})",
            payload_len, MAX_PAYLOAD_SIZE
        )));
    }
    Ok(())
}

fn put_args(buf: &mut BytesMut, args: &[String]) {
    for arg in args {
        buf.put_u32(arg.len() as u32);
        buf.put_slice(arg.as_bytes());
    }
}

fn get_args(payload: &mut &[u8]) -> Result<Vec<String>> {
    let mut args = Vec::new();
    while payload.has_remaining() {
        need(payload, 4, "argument length")?;
        let len = payload.get_u32() as usize;
        need(payload, len, "argument")?;
        let arg = payload[..len].to_vec();
        payload.advance(len);
        args.push(utf8(arg)?);
    }
    Ok(args)
}

fn need(payload: &[u8], len: usize, what: &str) -> Result<()> {
    if payload.remaining() < len {
        return Err(SyncError::Protocol(format!(
            "Truncated {}: expected {} bytes, got {}",
            what,
            len,
            payload.remaining()
        )));
    }
    Ok(())
}

fn utf8(bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes).map_err(|e| SyncError::Protocol(format!("Invalid UTF-8: {}", e)))
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Read one complete frame (header + payload) from a stream
fn read_frame<R: Read>(reader: &mut R) -> Result<Vec<u8>> {
    let mut header = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header)?;

    let payload_len = u32::from_be_bytes([header[1], header[2], header[3], header[4]]);
    check_payload_len(payload_len)?;

    let mut message = vec![0u8; HEADER_SIZE + payload_len as usize];
    message[..HEADER_SIZE].copy_from_slice(&header);
    if payload_len > 0 {
        reader.read_exact(&mut message[HEADER_SIZE..])?;
    }
    Ok(message)
}

/// Read a complete command from a stream
///
/// Blocks until a complete command is received or an error occurs
pub fn read_command<R: Read>(reader: &mut R) -> Result<Command> {
    decode_command(&read_frame(reader)?)
}

/// Write a command to a stream
pub fn write_command<W: Write>(writer: &mut W, command: &Command) -> Result<()> {
    writer.write_all(&encode_command(command))?;
    writer.flush()?;
    Ok(())
}

/// Read a complete reply from a stream
pub fn read_reply<R: Read>(reader: &mut R) -> Result<Reply> {
    decode_reply(&read_frame(reader)?)
}

/// Write a reply to a stream
pub fn write_reply<W: Write>(writer: &mut W, reply: &Reply) -> Result<()> {
    writer.write_all(&encode_reply(reply))?;
    writer.flush()?;
    Ok(())
}
