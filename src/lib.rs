//! # hashsync
//!
//! Keeps structured records synchronized with hash entries in a key-value
//! store, with bounded counter operations on individual hash fields:
//! - Full (overwrite) and incremental (merge) record sync
//! - Bounded increment/decrement that clamps to `[min, max]`
//! - Per-type field schemas captured from serde once and cached
//! - In-memory store, TCP server and pooled client gateway
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    HashSynchronizer                          │
//! │      full_sync / incremental_sync / increment / decrement    │
//! └──────────┬──────────────────────────────────┬───────────────┘
//!            │                                  │
//!            ▼                                  ▼
//!   ┌─────────────────┐               ┌──────────────────┐
//!   │  Field Mapper   │               │   StoreGateway   │
//!   │ (serde schema)  │               │  (atomic prims)  │
//!   └─────────────────┘               └────────┬─────────┘
//!                                 ┌────────────┴────────────┐
//!                                 ▼                         ▼
//!                         ┌──────────────┐          ┌──────────────┐
//!                         │ MemoryStore  │◄─ TCP ───│RemoteGateway │
//!                         │  (RwLock)    │  Server  │   (pooled)   │
//!                         └──────────────┘          └──────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod bound;
pub mod mapper;
pub mod gateway;
pub mod sync;
pub mod protocol;
pub mod network;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{Result, SyncError};
pub use config::{ClampStrategy, Config};
pub use bound::{BoundedOutcome, BoundedStep, Direction, FieldBound};
pub use mapper::{field_exists, from_field_map, to_field_map, FieldMap, Schema};
pub use gateway::{MemoryStore, RemoteGateway, StoreGateway};
pub use sync::HashSynchronizer;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of hashsync
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
