//! Command dispatch
//!
//! Routes a decoded command to the matching gateway primitive.

use crate::error::Result;
use crate::gateway::StoreGateway;
use crate::protocol::{Command, Reply};

/// Execute a command against a gateway
///
/// Gateway errors are turned into error replies; they never close the
/// connection.
pub fn dispatch(gateway: &dyn StoreGateway, command: Command) -> Reply {
    match execute(gateway, command) {
        Ok(reply) => reply,
        Err(e) => {
            tracing::debug!("Command failed: {}", e);
            Reply::from_error(&e)
        }
    }
}

fn execute(gateway: &dyn StoreGateway, command: Command) -> Result<Reply> {
    let reply = match command {
        Command::Ping => Reply::Ok,
        Command::Get { key } => text_or_nil(gateway.get(&key)?),
        Command::Set { key, value } => {
            gateway.set(&key, &value)?;
            Reply::Ok
        }
        Command::Incr { key } => Reply::Int(gateway.incr(&key)?),
        Command::Exists { key } => Reply::from_bool(gateway.exists(&key)?),
        Command::Expire { key, seconds } => Reply::from_bool(gateway.expire(&key, seconds)?),
        Command::Ttl { key } => match gateway.ttl(&key)? {
            Some(seconds) => Reply::Int(i64::try_from(seconds).unwrap_or(i64::MAX)),
            None => Reply::Nil,
        },
        Command::Delete { keys } => {
            let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
            Reply::Int(gateway.delete(&keys)? as i64)
        }
        Command::HashSetAll { key, fields } => {
            gateway.hash_set_all(&key, &fields)?;
            Reply::Ok
        }
        Command::HashSetField { key, field, value } => {
            Reply::from_bool(gateway.hash_set_field(&key, &field, &value)?)
        }
        Command::HashGetField { key, field } => text_or_nil(gateway.hash_get_field(&key, &field)?),
        Command::HashGetAll { key } => Reply::Map(gateway.hash_get_all(&key)?),
        Command::HashIncrement { key, field, delta } => {
            Reply::Int(gateway.hash_increment_field(&key, &field, delta)?)
        }
        Command::HashDeleteFields { key, fields } => {
            let fields: Vec<&str> = fields.iter().map(String::as_str).collect();
            Reply::Int(gateway.hash_delete_fields(&key, &fields)? as i64)
        }
        Command::HashExistsField { key, field } => {
            Reply::from_bool(gateway.hash_exists_field(&key, &field)?)
        }
        Command::HashValues { key } => Reply::List(gateway.hash_values(&key)?),
        Command::HashIncrementBounded { key, field, step } => {
            Reply::Bounded(gateway.hash_increment_bounded(&key, &field, step)?)
        }
    };
    Ok(reply)
}

fn text_or_nil(value: Option<String>) -> Reply {
    match value {
        Some(text) => Reply::Text(text),
        None => Reply::Nil,
    }
}
