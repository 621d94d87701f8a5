//! Record hydration
//!
//! A small serde deserializer that reads a record back out of a field map,
//! parsing each string into whatever type the record's field asks for.

use std::fmt;

use serde::de::value::{MapDeserializer, StrDeserializer};
use serde::de::{self, DeserializeOwned, IntoDeserializer, Visitor};
use serde::forward_to_deserialize_any;

use crate::error::{Result, SyncError};
use super::FieldMap;

/// Build a record of type `T` from a field map
///
/// Fields missing from the map deserialize as `None` when optional and fail
/// otherwise. Values that do not parse as the field's type fail with
/// `Mapping`.
pub fn from_field_map<T: DeserializeOwned>(fields: &FieldMap) -> Result<T> {
    let entries = fields
        .iter()
        .map(|(name, value)| (name.as_str(), FieldValue(value.as_str())));

    let deserializer: MapDeserializer<'_, _, HydrateError> = MapDeserializer::new(entries);
    T::deserialize(deserializer)
        .map_err(|e| SyncError::Mapping(format!("cannot hydrate record: {}", e)))
}

#[derive(Debug)]
struct HydrateError(String);

impl fmt::Display for HydrateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for HydrateError {}

impl de::Error for HydrateError {
    fn custom<M: fmt::Display>(msg: M) -> Self {
        HydrateError(msg.to_string())
    }
}

/// One stored string, deserialized on demand
#[derive(Clone, Copy)]
struct FieldValue<'a>(&'a str);

impl<'a> FieldValue<'a> {
    fn invalid(&self, expected: &str) -> HydrateError {
        HydrateError(format!("{:?} is not a valid {}", self.0, expected))
    }
}

impl<'de, 'a> IntoDeserializer<'de, HydrateError> for FieldValue<'a> {
    type Deserializer = Self;

    fn into_deserializer(self) -> Self {
        self
    }
}

macro_rules! parse_as {
    ($($method:ident => $ty:ty, $visit:ident;)*) => {
        $(
            fn $method<V: Visitor<'de>>(self, visitor: V) -> std::result::Result<V::Value, HydrateError> {
                let parsed = self.0.parse::<$ty>().map_err(|_| self.invalid(stringify!($ty)))?;
                visitor.$visit(parsed)
            }
        )*
    };
}

impl<'de, 'a> de::Deserializer<'de> for FieldValue<'a> {
    type Error = HydrateError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> std::result::Result<V::Value, HydrateError> {
        visitor.visit_str(self.0)
    }

    parse_as! {
        deserialize_bool => bool, visit_bool;
        deserialize_i8 => i64, visit_i64;
        deserialize_i16 => i64, visit_i64;
        deserialize_i32 => i64, visit_i64;
        deserialize_i64 => i64, visit_i64;
        deserialize_u8 => u64, visit_u64;
        deserialize_u16 => u64, visit_u64;
        deserialize_u32 => u64, visit_u64;
        deserialize_u64 => u64, visit_u64;
        deserialize_f32 => f64, visit_f64;
        deserialize_f64 => f64, visit_f64;
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> std::result::Result<V::Value, HydrateError> {
        visitor.visit_some(self)
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> std::result::Result<V::Value, HydrateError> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> std::result::Result<V::Value, HydrateError> {
        let variant: StrDeserializer<'_, HydrateError> = self.0.into_deserializer();
        visitor.visit_enum(variant)
    }

    forward_to_deserialize_any! {
        i128 u128 char str string bytes byte_buf unit unit_struct seq tuple
        tuple_struct map struct identifier ignored_any
    }
}
