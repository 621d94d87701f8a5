//! Synchronizer Module
//!
//! Keeps records and hash entries in step, and runs bounded counters on
//! individual hash fields.
//!
//! ## Operations
//! - `full_sync`: overwrite the hash with the record (one store call)
//! - `incremental_sync`: set each record field on its own (merge, not atomic)
//! - `increment` / `decrement`: bounded counter steps on one field
//! - `load`: read a hash back into a record
//!
//! ## Concurrency
//! The synchronizer holds no locks. Each store call is atomic on its own;
//! multi-call sequences only guarantee convergence, not intermediate
//! visibility.

mod synchronizer;

pub use synchronizer::HashSynchronizer;
