//! Reply definitions
//!
//! Represents responses to clients, including typed errors.

use crate::bound::BoundedOutcome;
use crate::error::SyncError;
use crate::mapper::FieldMap;

/// Reply status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    Ok = 0x00,
    Nil = 0x01,
    Error = 0x02,
    Int = 0x03,
    Text = 0x04,
    Map = 0x05,
    List = 0x06,
    Bounded = 0x07,
}

impl Status {
    pub fn from_u8(byte: u8) -> Option<Self> {
        let status = match byte {
            0x00 => Status::Ok,
            0x01 => Status::Nil,
            0x02 => Status::Error,
            0x03 => Status::Int,
            0x04 => Status::Text,
            0x05 => Status::Map,
            0x06 => Status::List,
            0x07 => Status::Bounded,
            _ => return None,
        };
        Some(status)
    }
}

/// Error classes that survive the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ErrorCode {
    Other = 0x00,
    Parse = 0x01,
    WrongType = 0x02,
    Overflow = 0x03,
    Unsupported = 0x04,
    Protocol = 0x05,
    Busy = 0x06,
}

impl ErrorCode {
    pub fn from_u8(byte: u8) -> Self {
        match byte {
            0x01 => ErrorCode::Parse,
            0x02 => ErrorCode::WrongType,
            0x03 => ErrorCode::Overflow,
            0x04 => ErrorCode::Unsupported,
            0x05 => ErrorCode::Protocol,
            0x06 => ErrorCode::Busy,
            _ => ErrorCode::Other,
        }
    }
}

/// A reply to send to a client
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Ok,
    Nil,
    Int(i64),
    Text(String),
    Map(FieldMap),
    List(Vec<String>),
    Bounded(BoundedOutcome),
    Error { code: ErrorCode, args: Vec<String> },
}

impl Reply {
    pub fn status(&self) -> Status {
        match self {
            Reply::Ok => Status::Ok,
            Reply::Nil => Status::Nil,
            Reply::Int(_) => Status::Int,
            Reply::Text(_) => Status::Text,
            Reply::Map(_) => Status::Map,
            Reply::List(_) => Status::List,
            Reply::Bounded(_) => Status::Bounded,
            Reply::Error { .. } => Status::Error,
        }
    }

    pub fn from_bool(value: bool) -> Self {
        Reply::Int(value as i64)
    }

    /// Reply sent when the server turns a connection away
    pub fn busy(message: &str) -> Self {
        Reply::Error {
            code: ErrorCode::Busy,
            args: vec![message.to_string()],
        }
    }

    /// Encode an error so the client can rebuild the same variant
    pub fn from_error(error: &SyncError) -> Self {
        let (code, args) = match error {
            SyncError::Parse { target, value } => {
                (ErrorCode::Parse, vec![target.clone(), value.clone()])
            }
            SyncError::WrongType(key) => (ErrorCode::WrongType, vec![key.clone()]),
            SyncError::Overflow(target) => (ErrorCode::Overflow, vec![target.clone()]),
            SyncError::Unsupported(message) => (ErrorCode::Unsupported, vec![message.clone()]),
            SyncError::Protocol(message) => (ErrorCode::Protocol, vec![message.clone()]),
            other => (ErrorCode::Other, vec![other.to_string()]),
        };
        Reply::Error { code, args }
    }

    /// Rebuild the error carried by an error reply
    pub fn into_error(code: ErrorCode, mut args: Vec<String>) -> SyncError {
        let mut take = |i: usize| args.get_mut(i).map(std::mem::take).unwrap_or_default();
        match code {
            ErrorCode::Parse => SyncError::Parse {
                target: take(0),
                value: take(1),
            },
            ErrorCode::WrongType => SyncError::WrongType(take(0)),
            ErrorCode::Overflow => SyncError::Overflow(take(0)),
            ErrorCode::Unsupported => SyncError::Unsupported(take(0)),
            ErrorCode::Protocol => SyncError::Protocol(take(0)),
            ErrorCode::Busy => SyncError::StoreUnavailable(take(0)),
            ErrorCode::Other => SyncError::StoreUnavailable(format!("server error: {}", take(0))),
        }
    }
}
