//! Field Mapper Module
//!
//! Converts records to and from the flat string maps stored in hash entries.
//!
//! ## Responsibilities
//! - Flatten a record into `field name -> string` (absent values omitted)
//! - Describe each record type's field names without reading a value
//! - Hydrate a record from a stored field map
//!
//! ## Serialization Boundary
//! ```text
//!   typed record ──to_field_map──► FieldMap ──gateway──► store
//!   typed record ◄─from_field_map── FieldMap ◄──gateway── store
//! ```
//! Records are plain serde types: `#[derive(Serialize, Deserialize)]` on a
//! struct whose fields are scalars or `Option`s of scalars.

mod finite;
mod flatten;
mod hydrate;
mod schema;

use std::collections::BTreeMap;

pub use flatten::to_field_map;
pub use hydrate::from_field_map;
pub use schema::{field_exists, Schema};

/// Field name to string-encoded value, ordered by field name
pub type FieldMap = BTreeMap<String, String>;
