//! Bounded counter rules
//!
//! Pure decision logic shared by the synchronizer (corrective strategy) and by
//! stores that offer an atomic bounded increment.
//!
//! ## Field states
//! ```text
//!   Unset ──────────────► Refused        (never created from nothing)
//!   InRange ── step ────► InRange        (result stays inside the bound)
//!   InRange ── step ────► Saturated      (result forced to the exact bound)
//!   Saturated ── same ──► Refused        (until an opposing step moves it back)
//! ```

use crate::error::{Result, SyncError};

/// Direction of a bounded step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Increment towards a maximum
    Up,

    /// Decrement towards a minimum
    Down,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "up" => Some(Direction::Up),
            "down" => Some(Direction::Down),
            _ => None,
        }
    }
}

/// An inclusive `[min, max]` range for a counter field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldBound {
    min: i64,
    max: i64,
}

impl FieldBound {
    /// Create a bound, rejecting `min > max`
    pub fn new(min: i64, max: i64) -> Result<Self> {
        if min > max {
            return Err(SyncError::InvalidBound { min, max });
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> i64 {
        self.min
    }

    pub fn max(&self) -> i64 {
        self.max
    }

    pub fn contains(&self, value: i64) -> bool {
        self.min <= value && value <= self.max
    }

    /// Step a positive or negative `delta` towards the matching edge
    pub fn step(&self, delta: i64) -> Result<BoundedStep> {
        match delta {
            d if d > 0 => BoundedStep::up(d, self.max),
            d if d < 0 => d
                .checked_neg()
                .ok_or(SyncError::InvalidDelta(d))
                .and_then(|magnitude| BoundedStep::down(magnitude, self.min)),
            d => Err(SyncError::InvalidDelta(d)),
        }
    }
}

/// One bounded increment or decrement request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundedStep {
    direction: Direction,
    delta: i64,
    limit: i64,
}

impl BoundedStep {
    /// Increment by `delta` without exceeding `max`
    pub fn up(delta: i64, max: i64) -> Result<Self> {
        Self::new(Direction::Up, delta, max)
    }

    /// Decrement by `delta` without undershooting `min`
    pub fn down(delta: i64, min: i64) -> Result<Self> {
        Self::new(Direction::Down, delta, min)
    }

    /// `delta` is a magnitude; it must be strictly positive
    pub fn new(direction: Direction, delta: i64, limit: i64) -> Result<Self> {
        if delta <= 0 {
            return Err(SyncError::InvalidDelta(delta));
        }
        Ok(Self {
            direction,
            delta,
            limit,
        })
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn delta(&self) -> i64 {
        self.delta
    }

    pub fn limit(&self) -> i64 {
        self.limit
    }

    /// Delta as passed to the store's native increment
    pub fn signed_delta(&self) -> i64 {
        match self.direction {
            Direction::Up => self.delta,
            Direction::Down => -self.delta,
        }
    }

    /// Current value already sits at (or past) the limit
    pub fn refuses(&self, current: i64) -> bool {
        match self.direction {
            Direction::Up => current >= self.limit,
            Direction::Down => current <= self.limit,
        }
    }

    /// Value produced by the increment lies past the limit
    pub fn overshoots(&self, value: i64) -> bool {
        match self.direction {
            Direction::Up => value > self.limit,
            Direction::Down => value < self.limit,
        }
    }

    /// Settle a step against a known current value in one go.
    ///
    /// Used by stores that apply the whole step under a single lock.
    /// Leaving the i64 range counts as an overshoot.
    pub fn settle(&self, current: Option<i64>) -> BoundedOutcome {
        let current = match current {
            Some(value) if !self.refuses(value) => value,
            _ => return BoundedOutcome::Refused,
        };

        match current.checked_add(self.signed_delta()) {
            Some(next) if !self.overshoots(next) => BoundedOutcome::Applied(next),
            _ => BoundedOutcome::Clamped(self.limit),
        }
    }
}

/// Result of a bounded increment or decrement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundedOutcome {
    /// The step landed inside the bound
    Applied(i64),

    /// The step crossed the bound; the field now holds exactly the bound
    Clamped(i64),

    /// The field is unset or already saturated; nothing was written
    Refused,
}

impl BoundedOutcome {
    /// Stored value after the operation, if it wrote one
    pub fn value(&self) -> Option<i64> {
        match self {
            BoundedOutcome::Applied(v) | BoundedOutcome::Clamped(v) => Some(*v),
            BoundedOutcome::Refused => None,
        }
    }

    pub fn is_refused(&self) -> bool {
        matches!(self, BoundedOutcome::Refused)
    }

    /// Legacy integer form: the stored value, or `-1` when refused.
    ///
    /// Ambiguous for bounds that include `-1`; prefer matching on the enum.
    pub fn as_sentinel(&self) -> i64 {
        self.value().unwrap_or(-1)
    }
}
