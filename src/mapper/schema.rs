//! Record schemas
//!
//! A schema is the static list of field names a record type can store. For
//! serde structs it is captured once from the `Deserialize` impl (which hands
//! its field list to the deserializer) and cached per `TypeId`.

use std::any::{type_name, TypeId};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use serde::de::{self, DeserializeOwned, Visitor};
use serde::forward_to_deserialize_any;

use crate::error::{Result, SyncError};

/// Field names of one record type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    type_name: String,
    fields: BTreeSet<String>,
}

impl Schema {
    /// Build a schema by hand
    pub fn new<I, S>(type_name: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            type_name: type_name.into(),
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// Schema of `T`, introspected on first use and cached afterwards
    pub fn of<T: DeserializeOwned + 'static>() -> Result<Arc<Schema>> {
        let id = TypeId::of::<T>();
        if let Some(schema) = registry().read().get(&id) {
            return Ok(Arc::clone(schema));
        }

        let schema = Arc::new(introspect::<T>()?);
        let mut schemas = registry().write();
        let cached = schemas.entry(id).or_insert(schema);
        Ok(Arc::clone(cached))
    }

    /// Register (or replace) the schema used for `T`
    ///
    /// Needed for types serde cannot describe up front, e.g. structs using
    /// `#[serde(flatten)]`.
    pub fn register<T: 'static>(schema: Schema) {
        registry().write().insert(TypeId::of::<T>(), Arc::new(schema));
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains(field)
    }

    /// Fail with `InvalidField` unless `field` belongs to this schema
    pub fn require(&self, field: &str) -> Result<()> {
        if self.contains(field) {
            Ok(())
        } else {
            Err(SyncError::InvalidField {
                record: self.type_name.clone(),
                field: field.to_string(),
            })
        }
    }
}

/// True if records of type `T` have a field named `field`
///
/// Purely structural; types that cannot be introspected have no fields.
pub fn field_exists<T: DeserializeOwned + 'static>(field: &str) -> bool {
    Schema::of::<T>()
        .map(|schema| schema.contains(field))
        .unwrap_or(false)
}

fn registry() -> &'static RwLock<HashMap<TypeId, Arc<Schema>>> {
    static SCHEMAS: OnceLock<RwLock<HashMap<TypeId, Arc<Schema>>>> = OnceLock::new();
    SCHEMAS.get_or_init(|| RwLock::new(HashMap::new()))
}

fn introspect<T: DeserializeOwned>() -> Result<Schema> {
    let mut captured = None;
    // The probe always errors out; the field list is what we are after.
    let _ = T::deserialize(FieldProbe {
        captured: &mut captured,
    });

    match captured {
        Some((name, fields)) => Ok(Schema::new(name, fields.iter().copied())),
        None => Err(SyncError::Mapping(format!(
            "type `{}` does not deserialize as a struct with named fields",
            type_name::<T>()
        ))),
    }
}

// =============================================================================
// Field Probe Deserializer
// =============================================================================

type Captured = Option<(&'static str, &'static [&'static str])>;

struct FieldProbe<'a> {
    captured: &'a mut Captured,
}

#[derive(Debug)]
struct ProbeStop;

impl fmt::Display for ProbeStop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("schema probe stopped")
    }
}

impl std::error::Error for ProbeStop {}

impl de::Error for ProbeStop {
    fn custom<M: fmt::Display>(_msg: M) -> Self {
        ProbeStop
    }
}

impl<'de, 'a> de::Deserializer<'de> for FieldProbe<'a> {
    type Error = ProbeStop;

    fn deserialize_any<V: Visitor<'de>>(self, _visitor: V) -> std::result::Result<V::Value, ProbeStop> {
        Err(ProbeStop)
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        fields: &'static [&'static str],
        _visitor: V,
    ) -> std::result::Result<V::Value, ProbeStop> {
        *self.captured = Some((name, fields));
        Err(ProbeStop)
    }

    forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf option unit unit_struct newtype_struct seq tuple
        tuple_struct map enum identifier ignored_any
    }
}
