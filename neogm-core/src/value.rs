//! Conversions between node property values (`neo4rs::BoltType`) and Rust types.
//!
//! This module contains all [`FromPropertyValue`] and [`IntoPropertyValue`]
//! implementations plus the [`PropertyBytes`] wrapper.

use std::collections::HashMap;

use neo4rs::{BoltBoolean, BoltFloat, BoltInteger, BoltList, BoltMap, BoltNull, BoltString, BoltType};

use crate::error::GraphError;
use crate::traits::{FromPropertyValue, IntoPropertyValue};

/// Returns a human-readable name for a [`neo4rs::BoltType`] variant.
///
/// Used in error messages to describe the actual type received when a
/// conversion fails.
pub fn type_name(v: &BoltType) -> &'static str {
    match v {
        BoltType::Null(_) => "Null",
        BoltType::Boolean(_) => "Boolean",
        BoltType::Integer(_) => "Integer",
        BoltType::Float(_) => "Float",
        BoltType::String(_) => "String",
        BoltType::Bytes(_) => "Bytes",
        BoltType::List(_) => "List",
        BoltType::Map(_) => "Map",
        BoltType::Node(_) => "Node",
        BoltType::Relation(_) => "Relationship",
        BoltType::UnboundedRelation(_) => "UnboundedRelationship",
        BoltType::Path(_) => "Path",
        BoltType::Point2D(_) => "Point2D",
        BoltType::Point3D(_) => "Point3D",
        BoltType::Duration(_) => "Duration",
        BoltType::Date(_) => "Date",
        BoltType::Time(_) => "Time",
        BoltType::LocalTime(_) => "LocalTime",
        BoltType::LocalDateTime(_) => "LocalDateTime",
        BoltType::DateTime(_) => "DateTime",
        BoltType::DateTimeZoneId(_) => "DateTimeZoneId",
    }
}

/// The `Null` property value.
pub fn null() -> BoltType {
    BoltType::Null(BoltNull)
}

pub fn is_null(v: &BoltType) -> bool {
    matches!(v, BoltType::Null(_))
}

// ---------------------------------------------------------------------------
// Numeric macros
// ---------------------------------------------------------------------------

macro_rules! impl_int {
    ($($t:ty),*) => {$(
        impl FromPropertyValue for $t {
            fn from_value(value: BoltType) -> Result<Self, GraphError> {
                match value {
                    BoltType::Integer(v) => <$t>::try_from(v.value).map_err(|_| {
                        GraphError::Mapping(format!("{} out of range for {}", v.value, stringify!($t)))
                    }),
                    other => Err(GraphError::type_mismatch("Integer", type_name(&other), stringify!($t))),
                }
            }
        }

        impl IntoPropertyValue for $t {
            fn into_value(self) -> Result<BoltType, GraphError> {
                let v = i64::try_from(self).map_err(|_| {
                    GraphError::Mapping(format!("{} out of range for Integer property", self))
                })?;
                Ok(BoltType::Integer(BoltInteger::new(v)))
            }
        }
    )*};
}

macro_rules! impl_float {
    ($($t:ty),*) => {$(
        impl FromPropertyValue for $t {
            fn from_value(value: BoltType) -> Result<Self, GraphError> {
                match value {
                    BoltType::Float(v) => Ok(v.value as $t),
                    other => Err(GraphError::type_mismatch("Float", type_name(&other), stringify!($t))),
                }
            }
        }

        impl IntoPropertyValue for $t {
            fn into_value(self) -> Result<BoltType, GraphError> {
                Ok(BoltType::Float(BoltFloat::new(self as f64)))
            }
        }
    )*};
}

// ---------------------------------------------------------------------------
// Primitives
// ---------------------------------------------------------------------------

impl FromPropertyValue for String {
    fn from_value(value: BoltType) -> Result<Self, GraphError> {
        match value {
            BoltType::String(s) => Ok(s.value),
            other => Err(GraphError::type_mismatch("String", type_name(&other), "String")),
        }
    }
}

impl IntoPropertyValue for String {
    fn into_value(self) -> Result<BoltType, GraphError> {
        Ok(BoltType::String(BoltString { value: self }))
    }
}

impl IntoPropertyValue for &str {
    fn into_value(self) -> Result<BoltType, GraphError> {
        Ok(BoltType::String(BoltString { value: self.to_owned() }))
    }
}

impl FromPropertyValue for bool {
    fn from_value(value: BoltType) -> Result<Self, GraphError> {
        match value {
            BoltType::Boolean(b) => Ok(b.value),
            other => Err(GraphError::type_mismatch("Boolean", type_name(&other), "bool")),
        }
    }
}

impl IntoPropertyValue for bool {
    fn into_value(self) -> Result<BoltType, GraphError> {
        Ok(BoltType::Boolean(BoltBoolean { value: self }))
    }
}

impl_int!(i64, i32, i16, i8, u64, u32, u16, u8);
impl_float!(f64, f32);

// ---------------------------------------------------------------------------
// Collections
// ---------------------------------------------------------------------------

impl<T: FromPropertyValue> FromPropertyValue for Vec<T> {
    fn from_value(value: BoltType) -> Result<Self, GraphError> {
        match value {
            BoltType::List(xs) => xs.value.into_iter().map(T::from_value).collect(),
            other => Err(GraphError::type_mismatch("List", type_name(&other), "Vec<T>")),
        }
    }
}

impl<T: IntoPropertyValue> IntoPropertyValue for Vec<T> {
    fn into_value(self) -> Result<BoltType, GraphError> {
        Ok(BoltType::List(BoltList {
            value: self.into_iter().map(IntoPropertyValue::into_value).collect::<Result<_, _>>()?,
        }))
    }
}

/// `Option<T>` is the "may be absent" primitive.
/// - A missing property maps to `None`.
/// - Present but `null` maps to `None`.
/// - Otherwise maps to `Some(T)`.
impl<T: FromPropertyValue> FromPropertyValue for Option<T> {
    fn from_value(value: BoltType) -> Result<Self, GraphError> {
        match value {
            BoltType::Null(_) => Ok(None),
            other => Ok(Some(T::from_value(other)?)),
        }
    }

    fn from_missing(_property: &str, _label: &str) -> Result<Self, GraphError> {
        Ok(None)
    }
}

impl<T: IntoPropertyValue> IntoPropertyValue for Option<T> {
    fn into_value(self) -> Result<BoltType, GraphError> {
        match self {
            Some(v) => v.into_value(),
            None => Ok(null()),
        }
    }
}

/// Converts a property map value into `HashMap<String, V>`.
impl<V: FromPropertyValue> FromPropertyValue for HashMap<String, V> {
    fn from_value(value: BoltType) -> Result<Self, GraphError> {
        match value {
            BoltType::Map(m) => {
                let mut out = HashMap::with_capacity(m.value.len());
                for (k, v) in m.value {
                    out.insert(k.value, V::from_value(v)?);
                }
                Ok(out)
            }
            other => Err(GraphError::type_mismatch("Map", type_name(&other), "HashMap<String, V>")),
        }
    }
}

impl<V: IntoPropertyValue> IntoPropertyValue for HashMap<String, V> {
    fn into_value(self) -> Result<BoltType, GraphError> {
        let mut map = BoltMap::with_capacity(self.len());
        for (k, v) in self {
            map.put(BoltString { value: k }, v.into_value()?);
        }
        Ok(BoltType::Map(map))
    }
}

// ---------------------------------------------------------------------------
// Temporal types (chrono)
// ---------------------------------------------------------------------------

impl FromPropertyValue for chrono::NaiveDate {
    fn from_value(value: BoltType) -> Result<Self, GraphError> {
        match value {
            BoltType::Date(d) => {
                let date: chrono::NaiveDate = d.try_into().map_err(|e: neo4rs::Error| {
                    GraphError::Mapping(format!("BoltDate -> NaiveDate: {e}"))
                })?;
                Ok(date)
            }
            other => Err(GraphError::type_mismatch("Date", type_name(&other), "NaiveDate")),
        }
    }
}

impl IntoPropertyValue for chrono::NaiveDate {
    fn into_value(self) -> Result<BoltType, GraphError> {
        Ok(BoltType::from(self))
    }
}

impl FromPropertyValue for chrono::NaiveDateTime {
    fn from_value(value: BoltType) -> Result<Self, GraphError> {
        match value {
            BoltType::LocalDateTime(dt) => {
                let ndt: chrono::NaiveDateTime = dt.try_into().map_err(|e: neo4rs::Error| {
                    GraphError::Mapping(format!("BoltLocalDateTime -> NaiveDateTime: {e}"))
                })?;
                Ok(ndt)
            }
            other => Err(GraphError::type_mismatch("LocalDateTime", type_name(&other), "NaiveDateTime")),
        }
    }
}

impl IntoPropertyValue for chrono::NaiveDateTime {
    fn into_value(self) -> Result<BoltType, GraphError> {
        Ok(BoltType::from(self))
    }
}

/// Accepts both `DateTime` (fixed offset) and `DateTimeZoneId` (zone name) values.
impl FromPropertyValue for chrono::DateTime<chrono::FixedOffset> {
    fn from_value(value: BoltType) -> Result<Self, GraphError> {
        match value {
            BoltType::DateTime(dt) => {
                let cdt: chrono::DateTime<chrono::FixedOffset> = dt.try_into().map_err(|e: neo4rs::Error| {
                    GraphError::Mapping(format!("BoltDateTime -> DateTime<FixedOffset>: {e}"))
                })?;
                Ok(cdt)
            }
            BoltType::DateTimeZoneId(dt) => {
                let cdt: chrono::DateTime<chrono::FixedOffset> = (&dt).try_into().map_err(|e: neo4rs::Error| {
                    GraphError::Mapping(format!("BoltDateTimeZoneId -> DateTime<FixedOffset>: {e}"))
                })?;
                Ok(cdt)
            }
            other => Err(GraphError::type_mismatch("DateTime", type_name(&other), "DateTime<FixedOffset>")),
        }
    }
}

impl IntoPropertyValue for chrono::DateTime<chrono::FixedOffset> {
    fn into_value(self) -> Result<BoltType, GraphError> {
        Ok(BoltType::from(self))
    }
}

// ---------------------------------------------------------------------------
// Bytes
// ---------------------------------------------------------------------------

/// Newtype wrapper for raw byte properties.
///
/// A dedicated type is used instead of `Vec<u8>` because `Vec<T>` already
/// maps to a property list and Rust does not support specialization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyBytes(pub Vec<u8>);

impl FromPropertyValue for PropertyBytes {
    fn from_value(value: BoltType) -> Result<Self, GraphError> {
        match value {
            BoltType::Bytes(b) => Ok(PropertyBytes(b.value.to_vec())),
            other => Err(GraphError::type_mismatch("Bytes", type_name(&other), "PropertyBytes")),
        }
    }
}

impl IntoPropertyValue for PropertyBytes {
    fn into_value(self) -> Result<BoltType, GraphError> {
        Ok(BoltType::Bytes(neo4rs::BoltBytes::new(bytes::Bytes::from(self.0))))
    }
}
