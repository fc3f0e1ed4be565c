//! # Value Module
//!
//! [`Value`] is the driver-neutral representation of a bound parameter or a
//! scanned column. Record fields move in and out of it through [`ToValue`] and
//! [`FromValue`], which the derive macros call for every column-tagged field.
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use quill_orm::{values, Finder, Value};
//!
//! let mut finder = Finder::select("t_user");
//! finder.append("WHERE id IN (?) AND name = ?", values![vec![1, 2, 3], "alice"]);
//!
//! let age: i32 = quill_orm::FromValue::from_value(Value::Int(30))?;
//! ```

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use uuid::Uuid;

use crate::{Error, temporal};

// ============================================================================
// Value Enum
// ============================================================================

/// A single SQL value.
///
/// `List` only exists on the way in: the `Finder` expands it into one
/// placeholder per element before anything is bound.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// Raw bytes. Always bound as a single parameter, never expanded.
    Bytes(Vec<u8>),
    /// Timestamp without timezone.
    DateTime(NaiveDateTime),
    /// Timestamp with timezone, normalized to UTC.
    Timestamp(DateTime<Utc>),
    Date(NaiveDate),
    Time(NaiveTime),
    /// An ordered sequence of scalars for `IN (?)` parameters.
    List(Vec<Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Value::List(_))
    }

    /// Builds a `List` from any iterator of convertible items.
    pub fn list<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Value::List(items.into_iter().map(Into::into).collect())
    }

    /// Whether this value, held by a primary key field, means "not assigned
    /// yet": null, integer zero, the empty string or the nil UUID.
    pub fn is_unassigned_key(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Int(0) => true,
            Value::Text(s) => s.is_empty() || s.parse::<Uuid>().map(|u| u.is_nil()).unwrap_or(false),
            _ => false,
        }
    }

    /// Short name of the variant, used in conversion errors.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Bool(_) => "bool",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
            Value::DateTime(_) => "datetime",
            Value::Timestamp(_) => "timestamp",
            Value::Date(_) => "date",
            Value::Time(_) => "time",
            Value::List(_) => "list",
        }
    }
}

/// Builds a `Vec<Value>` parameter list from heterogeneous expressions.
///
/// ```rust,ignore
/// finder.append("WHERE id = ? AND status IN (?)", values![42, vec!["a", "b"]]);
/// ```
#[macro_export]
macro_rules! values {
    () => { ::std::vec::Vec::<$crate::Value>::new() };
    ($($value:expr),+ $(,)?) => {
        ::std::vec![$($crate::Value::from($value)),+]
    };
}

// ============================================================================
// ToValue / FromValue Traits
// ============================================================================

/// Reads a field into a [`Value`].
pub trait ToValue {
    fn to_value(&self) -> Value;
}

/// Writes a [`Value`] back into a field.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self, Error>;
}

fn mismatch<T>(expected: &str, value: &Value) -> Result<T, Error> {
    Err(Error::Conversion(format!("cannot convert {} value into {}", value.kind_name(), expected)))
}

// ----------------------------------------------------------------------------
// Integers
// ----------------------------------------------------------------------------

fn value_to_i64(value: Value) -> Result<i64, Error> {
    match value {
        Value::Int(i) => Ok(i),
        Value::Bool(b) => Ok(b as i64),
        Value::Float(f) if f.fract() == 0.0 => Ok(f as i64),
        Value::Text(s) => s.trim().parse::<i64>().map_err(|e| Error::Conversion(format!("Failed to parse integer: {}", e))),
        other => mismatch("integer", &other),
    }
}

macro_rules! impl_integer_value {
    ($($t:ty),*) => {
        $(
            impl ToValue for $t {
                /// Values above `i64::MAX` are clamped to it.
                fn to_value(&self) -> Value {
                    match i64::try_from(*self) {
                        Ok(v) => Value::Int(v),
                        Err(_) => {
                            log::warn!("{} {} exceeds the i64 range, clamping", stringify!($t), self);
                            Value::Int(i64::MAX)
                        }
                    }
                }
            }

            impl FromValue for $t {
                fn from_value(value: Value) -> Result<Self, Error> {
                    let wide = value_to_i64(value)?;
                    <$t>::try_from(wide).map_err(|_| {
                        Error::Conversion(format!("{} is out of range for {}", wide, stringify!($t)))
                    })
                }
            }

            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    v.to_value()
                }
            }
        )*
    };
}

impl_integer_value!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

// ----------------------------------------------------------------------------
// Floats / bool
// ----------------------------------------------------------------------------

impl ToValue for f64 {
    fn to_value(&self) -> Value {
        Value::Float(*self)
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self, Error> {
        match value {
            Value::Float(f) => Ok(f),
            Value::Int(i) => Ok(i as f64),
            Value::Text(s) => s.trim().parse::<f64>().map_err(|e| Error::Conversion(format!("Failed to parse f64: {}", e))),
            other => mismatch("f64", &other),
        }
    }
}

impl ToValue for f32 {
    fn to_value(&self) -> Value {
        Value::Float(*self as f64)
    }
}

impl FromValue for f32 {
    fn from_value(value: Value) -> Result<Self, Error> {
        f64::from_value(value).map(|f| f as f32)
    }
}

impl ToValue for bool {
    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self, Error> {
        match value {
            Value::Bool(b) => Ok(b),
            // SQLite and MySQL hand booleans back as integers
            Value::Int(i) => Ok(i != 0),
            Value::Text(s) => match s.trim() {
                "1" | "true" | "TRUE" | "t" => Ok(true),
                "0" | "false" | "FALSE" | "f" => Ok(false),
                other => Err(Error::Conversion(format!("Failed to parse bool: {}", other))),
            },
            other => mismatch("bool", &other),
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v as f64)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

// ----------------------------------------------------------------------------
// Text / bytes / uuid
// ----------------------------------------------------------------------------

impl ToValue for String {
    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self, Error> {
        match value {
            Value::Text(s) => Ok(s),
            Value::Int(i) => Ok(i.to_string()),
            Value::Float(f) => Ok(f.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            Value::Bytes(b) => String::from_utf8(b).map_err(|e| Error::Conversion(format!("bytes are not UTF-8: {}", e))),
            Value::DateTime(dt) => Ok(dt.to_string()),
            Value::Timestamp(ts) => Ok(ts.to_rfc3339()),
            Value::Date(d) => Ok(temporal::format_naive_date(&d)),
            Value::Time(t) => Ok(temporal::format_naive_time(&t)),
            other => mismatch("String", &other),
        }
    }
}

impl ToValue for Vec<u8> {
    fn to_value(&self) -> Value {
        Value::Bytes(self.clone())
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: Value) -> Result<Self, Error> {
        match value {
            Value::Bytes(b) => Ok(b),
            Value::Text(s) => Ok(s.into_bytes()),
            other => mismatch("Vec<u8>", &other),
        }
    }
}

impl ToValue for Uuid {
    fn to_value(&self) -> Value {
        Value::Text(self.hyphenated().to_string())
    }
}

impl FromValue for Uuid {
    fn from_value(value: Value) -> Result<Self, Error> {
        match value {
            Value::Text(s) => s.parse::<Uuid>().map_err(|e| Error::Conversion(format!("Failed to parse UUID: {}", e))),
            Value::Bytes(b) => Uuid::from_slice(&b).map_err(|e| Error::Conversion(format!("Failed to parse UUID: {}", e))),
            other => mismatch("Uuid", &other),
        }
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(v.to_vec())
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        v.to_value()
    }
}

// ----------------------------------------------------------------------------
// Temporal
// ----------------------------------------------------------------------------

impl ToValue for NaiveDateTime {
    fn to_value(&self) -> Value {
        Value::DateTime(*self)
    }
}

impl FromValue for NaiveDateTime {
    fn from_value(value: Value) -> Result<Self, Error> {
        match value {
            Value::DateTime(dt) => Ok(dt),
            Value::Timestamp(ts) => Ok(ts.naive_utc()),
            Value::Text(s) => temporal::parse_naive_datetime(&s),
            other => mismatch("NaiveDateTime", &other),
        }
    }
}

impl ToValue for DateTime<Utc> {
    fn to_value(&self) -> Value {
        Value::Timestamp(*self)
    }
}

impl FromValue for DateTime<Utc> {
    fn from_value(value: Value) -> Result<Self, Error> {
        match value {
            Value::Timestamp(ts) => Ok(ts),
            Value::DateTime(dt) => Ok(dt.and_utc()),
            Value::Text(s) => temporal::parse_datetime_utc(&s),
            other => mismatch("DateTime<Utc>", &other),
        }
    }
}

impl ToValue for NaiveDate {
    fn to_value(&self) -> Value {
        Value::Date(*self)
    }
}

impl FromValue for NaiveDate {
    fn from_value(value: Value) -> Result<Self, Error> {
        match value {
            Value::Date(d) => Ok(d),
            Value::DateTime(dt) => Ok(dt.date()),
            Value::Timestamp(ts) => Ok(ts.date_naive()),
            Value::Text(s) => temporal::parse_naive_date(&s),
            other => mismatch("NaiveDate", &other),
        }
    }
}

impl ToValue for NaiveTime {
    fn to_value(&self) -> Value {
        Value::Time(*self)
    }
}

impl FromValue for NaiveTime {
    fn from_value(value: Value) -> Result<Self, Error> {
        match value {
            Value::Time(t) => Ok(t),
            Value::DateTime(dt) => Ok(dt.time()),
            Value::Text(s) => temporal::parse_naive_time(&s),
            other => mismatch("NaiveTime", &other),
        }
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::DateTime(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<NaiveTime> for Value {
    fn from(v: NaiveTime) -> Self {
        Value::Time(v)
    }
}

// ----------------------------------------------------------------------------
// Option / lists
// ----------------------------------------------------------------------------

impl<T: ToValue> ToValue for Option<T> {
    fn to_value(&self) -> Value {
        match self {
            Some(v) => v.to_value(),
            None => Value::Null,
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self, Error> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(inner) => inner.into(),
            None => Value::Null,
        }
    }
}

macro_rules! impl_list_value {
    ($($t:ty),*) => {
        $(
            impl From<Vec<$t>> for Value {
                fn from(v: Vec<$t>) -> Self {
                    Value::list(v)
                }
            }

            impl From<&[$t]> for Value {
                fn from(v: &[$t]) -> Self {
                    Value::list(v.iter().cloned())
                }
            }
        )*
    };
}

impl_list_value!(i16, i32, i64, u32, u64, f64, String, Uuid);

impl From<Vec<&str>> for Value {
    fn from(v: Vec<&str>) -> Self {
        Value::list(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(v)
    }
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self, Error> {
        Ok(value)
    }
}

// ============================================================================
// Tests
// ============================================================================
