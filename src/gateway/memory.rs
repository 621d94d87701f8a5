//! In-memory store
//!
//! HashMap-based keyspace behind a single RwLock. Each gateway call takes the
//! lock once, so every primitive is atomic per key. Expired keys are treated
//! as absent on access and dropped by `purge_expired`.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::bound::{BoundedOutcome, BoundedStep};
use crate::error::{Result, SyncError};
use crate::mapper::FieldMap;

use super::{parse_counter, StoreGateway};

/// Value held by a key
#[derive(Debug, Clone, PartialEq)]
enum Value {
    Text(String),
    Hash(FieldMap),
}

#[derive(Debug, Clone)]
struct Slot {
    value: Value,
    expires_at: Option<Instant>,
}

impl Slot {
    fn new(value: Value) -> Self {
        Self {
            value,
            expires_at: None,
        }
    }

    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// Thread-safe in-memory key-value store with hash values
#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: RwLock<HashMap<String, Slot>>,
}

impl MemoryStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.slots.read().values().filter(|s| s.is_live(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every expired key, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut slots = self.slots.write();
        let before = slots.len();
        slots.retain(|_, slot| slot.is_live(now));
        before - slots.len()
    }

    /// Drop all keys
    pub fn clear(&self) {
        self.slots.write().clear();
    }

    // =========================================================================
    // Slot helpers
    // =========================================================================

    fn live<'a>(slots: &'a HashMap<String, Slot>, key: &str) -> Option<&'a Slot> {
        slots.get(key).filter(|slot| slot.is_live(Instant::now()))
    }

    fn live_mut<'a>(slots: &'a mut HashMap<String, Slot>, key: &str) -> Option<&'a mut Slot> {
        if slots.get(key).is_some_and(|slot| !slot.is_live(Instant::now())) {
            slots.remove(key);
        }
        slots.get_mut(key)
    }

    fn read_hash<T>(&self, key: &str, read: impl FnOnce(Option<&FieldMap>) -> T) -> Result<T> {
        let slots = self.slots.read();
        match Self::live(&slots, key).map(|slot| &slot.value) {
            None => Ok(read(None)),
            Some(Value::Hash(fields)) => Ok(read(Some(fields))),
            Some(Value::Text(_)) => Err(SyncError::WrongType(key.to_string())),
        }
    }

    /// Run `write` against the hash at `key`, creating an empty one if needed.
    /// A hash left without fields is removed.
    fn write_hash<T>(&self, key: &str, write: impl FnOnce(&mut FieldMap) -> Result<T>) -> Result<T> {
        let now = Instant::now();
        let mut slots = self.slots.write();
        let slot = slots
            .entry(key.to_string())
            .or_insert_with(|| Slot::new(Value::Hash(FieldMap::new())));
        if !slot.is_live(now) {
            *slot = Slot::new(Value::Hash(FieldMap::new()));
        }

        let fields = match &mut slot.value {
            Value::Hash(fields) => fields,
            Value::Text(_) => return Err(SyncError::WrongType(key.to_string())),
        };

        let result = write(fields);
        let emptied = fields.is_empty();
        if emptied {
            slots.remove(key);
        }
        result
    }
}

impl StoreGateway for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let slots = self.slots.read();
        match Self::live(&slots, key).map(|slot| &slot.value) {
            None => Ok(None),
            Some(Value::Text(text)) => Ok(Some(text.clone())),
            Some(Value::Hash(_)) => Err(SyncError::WrongType(key.to_string())),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.slots
            .write()
            .insert(key.to_string(), Slot::new(Value::Text(value.to_string())));
        Ok(())
    }

    fn incr(&self, key: &str) -> Result<i64> {
        let mut slots = self.slots.write();
        match Self::live_mut(&mut slots, key) {
            None => {
                slots.insert(key.to_string(), Slot::new(Value::Text("1".to_string())));
                Ok(1)
            }
            Some(slot) => match &mut slot.value {
                Value::Text(text) => {
                    let next = parse_counter(key, None, text)?
                        .checked_add(1)
                        .ok_or_else(|| SyncError::overflow(key, None))?;
                    *text = next.to_string();
                    Ok(next)
                }
                Value::Hash(_) => Err(SyncError::WrongType(key.to_string())),
            },
        }
    }

    fn exists(&self, key: &str) -> Result<bool> {
        Ok(Self::live(&self.slots.read(), key).is_some())
    }

    fn expire(&self, key: &str, seconds: u64) -> Result<bool> {
        let mut slots = self.slots.write();
        let Some(slot) = Self::live_mut(&mut slots, key) else {
            return Ok(false);
        };
        if seconds == 0 {
            slots.remove(key);
        } else {
            // Beyond what Instant can represent the key never expires
            slot.expires_at = Instant::now().checked_add(Duration::from_secs(seconds));
        }
        Ok(true)
    }

    fn ttl(&self, key: &str) -> Result<Option<u64>> {
        let slots = self.slots.read();
        let now = Instant::now();
        Ok(Self::live(&slots, key)
            .and_then(|slot| slot.expires_at)
            .map(|at| {
                // Round to the nearest second
                let remaining = at.saturating_duration_since(now);
                remaining.as_secs() + u64::from(remaining.subsec_millis() >= 500)
            }))
    }

    fn delete(&self, keys: &[&str]) -> Result<u64> {
        let mut slots = self.slots.write();
        let now = Instant::now();
        let mut deleted = 0;
        for key in keys {
            if let Some(slot) = slots.remove(*key) {
                if slot.is_live(now) {
                    deleted += 1;
                }
            }
        }
        Ok(deleted)
    }

    fn hash_set_all(&self, key: &str, fields: &FieldMap) -> Result<()> {
        self.write_hash(key, |current| {
            *current = fields.clone();
            Ok(())
        })
    }

    fn hash_set_field(&self, key: &str, field: &str, value: &str) -> Result<bool> {
        self.write_hash(key, |fields| {
            Ok(fields.insert(field.to_string(), value.to_string()).is_none())
        })
    }

    fn hash_get_field(&self, key: &str, field: &str) -> Result<Option<String>> {
        self.read_hash(key, |fields| fields.and_then(|f| f.get(field).cloned()))
    }

    fn hash_get_all(&self, key: &str) -> Result<FieldMap> {
        self.read_hash(key, |fields| fields.cloned().unwrap_or_default())
    }

    fn hash_increment_field(&self, key: &str, field: &str, delta: i64) -> Result<i64> {
        self.write_hash(key, |fields| {
            let current = match fields.get(field) {
                Some(raw) => parse_counter(key, Some(field), raw)?,
                None => 0,
            };
            let next = current
                .checked_add(delta)
                .ok_or_else(|| SyncError::overflow(key, Some(field)))?;
            fields.insert(field.to_string(), next.to_string());
            Ok(next)
        })
    }

    fn hash_delete_fields(&self, key: &str, fields: &[&str]) -> Result<u64> {
        let mut slots = self.slots.write();
        let Some(slot) = Self::live_mut(&mut slots, key) else {
            return Ok(0);
        };
        let hash = match &mut slot.value {
            Value::Hash(hash) => hash,
            Value::Text(_) => return Err(SyncError::WrongType(key.to_string())),
        };

        let deleted = fields.iter().filter(|f| hash.remove(**f).is_some()).count() as u64;
        if hash.is_empty() {
            slots.remove(key);
        }
        Ok(deleted)
    }

    fn hash_exists_field(&self, key: &str, field: &str) -> Result<bool> {
        self.read_hash(key, |fields| fields.is_some_and(|f| f.contains_key(field)))
    }

    fn hash_values(&self, key: &str) -> Result<Vec<String>> {
        self.read_hash(key, |fields| {
            fields
                .map(|f| f.values().cloned().collect())
                .unwrap_or_default()
        })
    }

    fn hash_increment_bounded(
        &self,
        key: &str,
        field: &str,
        step: BoundedStep,
    ) -> Result<BoundedOutcome> {
        let mut slots = self.slots.write();
        let Some(slot) = Self::live_mut(&mut slots, key) else {
            return Ok(BoundedOutcome::Refused);
        };
        let fields = match &mut slot.value {
            Value::Hash(fields) => fields,
            Value::Text(_) => return Err(SyncError::WrongType(key.to_string())),
        };

        let current = match fields.get(field) {
            Some(raw) => Some(parse_counter(key, Some(field), raw)?),
            None => None,
        };

        let outcome = step.settle(current);
        if let Some(value) = outcome.value() {
            fields.insert(field.to_string(), value.to_string());
        }
        Ok(outcome)
    }
}
