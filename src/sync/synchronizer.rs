//! Bounded hash synchronizer

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::bound::{BoundedOutcome, BoundedStep, FieldBound};
use crate::config::{ClampStrategy, Config};
use crate::error::{Result, SyncError};
use crate::gateway::{parse_counter, StoreGateway};
use crate::mapper::{from_field_map, to_field_map, FieldMap, Schema};

/// Pushes records into hash entries and keeps counter fields inside bounds
///
/// Cheap to share: wrap it in an `Arc` and call from any thread.
pub struct HashSynchronizer {
    gateway: Arc<dyn StoreGateway>,
    strategy: ClampStrategy,
}

impl HashSynchronizer {
    /// Create a synchronizer using the corrective clamp strategy
    pub fn new(gateway: Arc<dyn StoreGateway>) -> Self {
        Self::with_strategy(gateway, ClampStrategy::Corrective)
    }

    pub fn with_strategy(gateway: Arc<dyn StoreGateway>, strategy: ClampStrategy) -> Self {
        Self { gateway, strategy }
    }

    /// Create a synchronizer using the strategy from `config`
    pub fn from_config(gateway: Arc<dyn StoreGateway>, config: &Config) -> Self {
        Self::with_strategy(gateway, config.clamp_strategy)
    }

    pub fn gateway(&self) -> &Arc<dyn StoreGateway> {
        &self.gateway
    }

    pub fn strategy(&self) -> ClampStrategy {
        self.strategy
    }

    // =========================================================================
    // Record <-> Hash
    // =========================================================================

    /// Overwrite the hash at `key` with the record's fields
    ///
    /// Fields stored at `key` but absent from the record are removed. An
    /// empty field map writes nothing. Returns the computed field map either
    /// way.
    pub fn full_sync<T: Serialize + ?Sized>(&self, record: &T, key: &str) -> Result<FieldMap> {
        check_key(key)?;
        let fields = to_field_map(record)?;
        if fields.is_empty() {
            tracing::debug!("Full sync of {}: no fields, skipping write", key);
            return Ok(fields);
        }

        self.gateway.hash_set_all(key, &fields)?;
        tracing::debug!("Full sync of {}: wrote {} fields", key, fields.len());
        Ok(fields)
    }

    /// Write the record's fields into the hash at `key` one at a time
    ///
    /// Fields absent from the record are left untouched. The writes are
    /// independent: a concurrent reader may see some fields updated and
    /// others not yet.
    pub fn incremental_sync<T: Serialize + ?Sized>(&self, record: &T, key: &str) -> Result<FieldMap> {
        check_key(key)?;
        let fields = to_field_map(record)?;
        for (field, value) in &fields {
            self.gateway.hash_set_field(key, field, value)?;
        }
        tracing::debug!("Incremental sync of {}: wrote {} fields", key, fields.len());
        Ok(fields)
    }

    /// Read the hash at `key` back into a record, `None` if it does not exist
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        check_key(key)?;
        let fields = self.gateway.hash_get_all(key)?;
        if fields.is_empty() {
            return Ok(None);
        }
        from_field_map(&fields).map(Some)
    }

    // =========================================================================
    // Bounded Counters
    // =========================================================================

    /// Add `delta` to `field` of the `T` stored at `key`, never exceeding `max`
    ///
    /// Refused (nothing written) when the field is unset or already at or
    /// above `max`.
    pub fn increment<T: DeserializeOwned + 'static>(
        &self,
        key: &str,
        field: &str,
        delta: i64,
        max: i64,
    ) -> Result<BoundedOutcome> {
        let schema = Schema::of::<T>()?;
        self.increment_in(&schema, key, field, delta, max)
    }

    /// Subtract `delta` from `field` of the `T` stored at `key`, never going below `min`
    pub fn decrement<T: DeserializeOwned + 'static>(
        &self,
        key: &str,
        field: &str,
        delta: i64,
        min: i64,
    ) -> Result<BoundedOutcome> {
        let schema = Schema::of::<T>()?;
        self.decrement_in(&schema, key, field, delta, min)
    }

    /// `increment` against an explicit schema
    pub fn increment_in(
        &self,
        schema: &Schema,
        key: &str,
        field: &str,
        delta: i64,
        max: i64,
    ) -> Result<BoundedOutcome> {
        self.step_in(schema, key, field, BoundedStep::up(delta, max)?)
    }

    /// `decrement` against an explicit schema
    pub fn decrement_in(
        &self,
        schema: &Schema,
        key: &str,
        field: &str,
        delta: i64,
        min: i64,
    ) -> Result<BoundedOutcome> {
        self.step_in(schema, key, field, BoundedStep::down(delta, min)?)
    }

    /// Move `field` by a signed `delta` inside `bound`
    ///
    /// Positive deltas increment towards `bound.max()`, negative ones
    /// decrement towards `bound.min()`.
    pub fn adjust_in(
        &self,
        schema: &Schema,
        key: &str,
        field: &str,
        delta: i64,
        bound: FieldBound,
    ) -> Result<BoundedOutcome> {
        self.step_in(schema, key, field, bound.step(delta)?)
    }

    /// Apply a bounded step to `field` after validating it against `schema`
    pub fn step_in(
        &self,
        schema: &Schema,
        key: &str,
        field: &str,
        step: BoundedStep,
    ) -> Result<BoundedOutcome> {
        check_key(key)?;
        schema.require(field)?;

        let outcome = match self.strategy {
            ClampStrategy::Corrective => self.step_corrective(key, field, step)?,
            ClampStrategy::Atomic => self.gateway.hash_increment_bounded(key, field, step)?,
        };

        match outcome {
            BoundedOutcome::Refused => {
                tracing::debug!("Bounded {} of {}/{} refused", step.direction().as_str(), key, field)
            }
            BoundedOutcome::Clamped(bound) => {
                tracing::debug!("Bounded {} of {}/{} clamped to {}", step.direction().as_str(), key, field, bound)
            }
            BoundedOutcome::Applied(value) => {
                tracing::trace!("Bounded {} of {}/{} -> {}", step.direction().as_str(), key, field, value)
            }
        }
        Ok(outcome)
    }

    /// Read, increment, then clamp with a plain set on overshoot.
    ///
    /// Between the increment and the clamp the field holds the overshooting
    /// value, and the clamp does not check whether an opposing step landed
    /// in between. The bound holds once concurrent callers have finished.
    fn step_corrective(&self, key: &str, field: &str, step: BoundedStep) -> Result<BoundedOutcome> {
        let current = match self.gateway.hash_get_field(key, field)? {
            Some(raw) => parse_counter(key, Some(field), &raw)?,
            None => return Ok(BoundedOutcome::Refused),
        };
        if step.refuses(current) {
            return Ok(BoundedOutcome::Refused);
        }

        let value = match self
            .gateway
            .hash_increment_field(key, field, step.signed_delta())
        {
            Ok(value) => value,
            // Past the i64 range is past the limit as well
            Err(SyncError::Overflow(_)) => return self.clamp(key, field, step, None),
            Err(e) => return Err(e),
        };
        if !step.overshoots(value) {
            return Ok(BoundedOutcome::Applied(value));
        }
        self.clamp(key, field, step, Some(value))
    }

    fn clamp(
        &self,
        key: &str,
        field: &str,
        step: BoundedStep,
        overshoot: Option<i64>,
    ) -> Result<BoundedOutcome> {
        let limit = step.limit();
        self.gateway
            .hash_set_field(key, field, &limit.to_string())?;
        match overshoot {
            Some(value) => tracing::debug!("Clamped {}/{} from {} to {}", key, field, value, limit),
            None => tracing::debug!("Clamped {}/{} to {} on overflow", key, field, limit),
        }
        Ok(BoundedOutcome::Clamped(limit))
    }
}

fn check_key(key: &str) -> Result<()> {
    if key.trim().is_empty() {
        return Err(SyncError::BlankKey);
    }
    Ok(())
}
