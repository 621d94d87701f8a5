//! Command definitions
//!
//! Represents requests from clients. Each command travels as its type byte
//! plus a list of string arguments; `to_args` / `from_args` convert between
//! the two shapes.

use crate::bound::{BoundedStep, Direction};
use crate::error::{Result, SyncError};
use crate::mapper::FieldMap;

/// Command types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CommandType {
    Ping = 0x01,
    Get = 0x02,
    Set = 0x03,
    Incr = 0x04,
    Exists = 0x05,
    Expire = 0x06,
    Ttl = 0x07,
    Delete = 0x08,
    HashSetAll = 0x10,
    HashSetField = 0x11,
    HashGetField = 0x12,
    HashGetAll = 0x13,
    HashIncrement = 0x14,
    HashDeleteFields = 0x15,
    HashExistsField = 0x16,
    HashValues = 0x17,
    HashIncrementBounded = 0x18,
}

impl CommandType {
    pub fn from_u8(byte: u8) -> Option<Self> {
        let command_type = match byte {
            0x01 => CommandType::Ping,
            0x02 => CommandType::Get,
            0x03 => CommandType::Set,
            0x04 => CommandType::Incr,
            0x05 => CommandType::Exists,
            0x06 => CommandType::Expire,
            0x07 => CommandType::Ttl,
            0x08 => CommandType::Delete,
            0x10 => CommandType::HashSetAll,
            0x11 => CommandType::HashSetField,
            0x12 => CommandType::HashGetField,
            0x13 => CommandType::HashGetAll,
            0x14 => CommandType::HashIncrement,
            0x15 => CommandType::HashDeleteFields,
            0x16 => CommandType::HashExistsField,
            0x17 => CommandType::HashValues,
            0x18 => CommandType::HashIncrementBounded,
            _ => return None,
        };
        Some(command_type)
    }
}

/// A parsed command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Health check
    Ping,

    Get { key: String },
    Set { key: String, value: String },
    Incr { key: String },
    Exists { key: String },
    Expire { key: String, seconds: u64 },
    Ttl { key: String },
    Delete { keys: Vec<String> },

    /// Replace a whole hash
    HashSetAll { key: String, fields: FieldMap },
    HashSetField { key: String, field: String, value: String },
    HashGetField { key: String, field: String },
    HashGetAll { key: String },
    HashIncrement { key: String, field: String, delta: i64 },
    HashDeleteFields { key: String, fields: Vec<String> },
    HashExistsField { key: String, field: String },
    HashValues { key: String },

    /// Server-side atomic bounded increment
    HashIncrementBounded { key: String, field: String, step: BoundedStep },
}

impl Command {
    /// Get the command type
    pub fn command_type(&self) -> CommandType {
        match self {
            Command::Ping => CommandType::Ping,
            Command::Get { .. } => CommandType::Get,
            Command::Set { .. } => CommandType::Set,
            Command::Incr { .. } => CommandType::Incr,
            Command::Exists { .. } => CommandType::Exists,
            Command::Expire { .. } => CommandType::Expire,
            Command::Ttl { .. } => CommandType::Ttl,
            Command::Delete { .. } => CommandType::Delete,
            Command::HashSetAll { .. } => CommandType::HashSetAll,
            Command::HashSetField { .. } => CommandType::HashSetField,
            Command::HashGetField { .. } => CommandType::HashGetField,
            Command::HashGetAll { .. } => CommandType::HashGetAll,
            Command::HashIncrement { .. } => CommandType::HashIncrement,
            Command::HashDeleteFields { .. } => CommandType::HashDeleteFields,
            Command::HashExistsField { .. } => CommandType::HashExistsField,
            Command::HashValues { .. } => CommandType::HashValues,
            Command::HashIncrementBounded { .. } => CommandType::HashIncrementBounded,
        }
    }

    /// Flatten the command into its wire arguments
    pub fn to_args(&self) -> Vec<String> {
        match self {
            Command::Ping => Vec::new(),
            Command::Get { key }
            | Command::Incr { key }
            | Command::Exists { key }
            | Command::Ttl { key }
            | Command::HashGetAll { key }
            | Command::HashValues { key } => vec![key.clone()],
            Command::Set { key, value } => vec![key.clone(), value.clone()],
            Command::Expire { key, seconds } => vec![key.clone(), seconds.to_string()],
            Command::Delete { keys } => keys.clone(),
            Command::HashSetAll { key, fields } => {
                let mut args = Vec::with_capacity(1 + fields.len() * 2);
                args.push(key.clone());
                for (field, value) in fields {
                    args.push(field.clone());
                    args.push(value.clone());
                }
                args
            }
            Command::HashSetField { key, field, value } => {
                vec![key.clone(), field.clone(), value.clone()]
            }
            Command::HashGetField { key, field } | Command::HashExistsField { key, field } => {
                vec![key.clone(), field.clone()]
            }
            Command::HashIncrement { key, field, delta } => {
                vec![key.clone(), field.clone(), delta.to_string()]
            }
            Command::HashDeleteFields { key, fields } => {
                let mut args = Vec::with_capacity(1 + fields.len());
                args.push(key.clone());
                args.extend(fields.iter().cloned());
                args
            }
            Command::HashIncrementBounded { key, field, step } => vec![
                key.clone(),
                field.clone(),
                step.direction().as_str().to_string(),
                step.delta().to_string(),
                step.limit().to_string(),
            ],
        }
    }

    /// Rebuild a command from its type and wire arguments
    pub fn from_args(command_type: CommandType, args: Vec<String>) -> Result<Self> {
        let mut args = Args::new(command_type, args);
        let command = match command_type {
            CommandType::Ping => Command::Ping,
            CommandType::Get => Command::Get { key: args.next()? },
            CommandType::Set => Command::Set {
                key: args.next()?,
                value: args.next()?,
            },
            CommandType::Incr => Command::Incr { key: args.next()? },
            CommandType::Exists => Command::Exists { key: args.next()? },
            CommandType::Expire => Command::Expire {
                key: args.next()?,
                seconds: args.next_parsed()?,
            },
            CommandType::Ttl => Command::Ttl { key: args.next()? },
            CommandType::Delete => Command::Delete { keys: args.rest() },
            CommandType::HashSetAll => {
                let key = args.next()?;
                let rest = args.rest();
                if rest.len() % 2 != 0 {
                    return Err(SyncError::Protocol(
                        "HashSetAll: field list has a field without a value".to_string(),
                    ));
                }
                let mut pairs = rest.into_iter();
                let mut fields = FieldMap::new();
                while let (Some(field), Some(value)) = (pairs.next(), pairs.next()) {
                    fields.insert(field, value);
                }
                Command::HashSetAll { key, fields }
            }
            CommandType::HashSetField => Command::HashSetField {
                key: args.next()?,
                field: args.next()?,
                value: args.next()?,
            },
            CommandType::HashGetField => Command::HashGetField {
                key: args.next()?,
                field: args.next()?,
            },
            CommandType::HashGetAll => Command::HashGetAll { key: args.next()? },
            CommandType::HashIncrement => Command::HashIncrement {
                key: args.next()?,
                field: args.next()?,
                delta: args.next_parsed()?,
            },
            CommandType::HashDeleteFields => Command::HashDeleteFields {
                key: args.next()?,
                fields: args.rest(),
            },
            CommandType::HashExistsField => Command::HashExistsField {
                key: args.next()?,
                field: args.next()?,
            },
            CommandType::HashValues => Command::HashValues { key: args.next()? },
            CommandType::HashIncrementBounded => {
                let key = args.next()?;
                let field = args.next()?;
                let raw_direction = args.next()?;
                let direction = Direction::parse(&raw_direction).ok_or_else(|| {
                    SyncError::Protocol(format!("unknown direction {:?}", raw_direction))
                })?;
                let delta = args.next_parsed()?;
                let limit = args.next_parsed()?;
                let step = BoundedStep::new(direction, delta, limit)
                    .map_err(|e| SyncError::Protocol(e.to_string()))?;
                Command::HashIncrementBounded { key, field, step }
            }
        };
        args.finish()?;
        Ok(command)
    }
}

/// Cursor over wire arguments with arity checks
struct Args {
    command_type: CommandType,
    args: std::vec::IntoIter<String>,
}

impl Args {
    fn new(command_type: CommandType, args: Vec<String>) -> Self {
        Self {
            command_type,
            args: args.into_iter(),
        }
    }

    fn next(&mut self) -> Result<String> {
        self.args.next().ok_or_else(|| {
            SyncError::Protocol(format!("{:?}: missing argument", self.command_type))
        })
    }

    fn next_parsed<T: std::str::FromStr>(&mut self) -> Result<T> {
        let raw = self.next()?;
        raw.parse().map_err(|_| {
            SyncError::Protocol(format!(
                "{:?}: argument {:?} is not a number",
                self.command_type, raw
            ))
        })
    }

    fn rest(&mut self) -> Vec<String> {
        self.args.by_ref().collect()
    }

    fn finish(mut self) -> Result<()> {
        match self.args.next() {
            None => Ok(()),
            Some(_) => Err(SyncError::Protocol(format!(
                "{:?}: unexpected extra arguments",
                self.command_type
            ))),
        }
    }
}
