//! # Result Scanner Module
//!
//! Turns `AnyRow`s into records, scalars or ordered column maps.
//!
//! ## Column Decoding
//!
//! A column is decoded by the type name the driver reports for it (see
//! [`classify`]). Zero-length byte values are `NULL`. A converter registered
//! for the type name through `DatabaseBuilder::value_converter` runs last.
//!
//! Types that cannot be classified decode to `Value::Null` in the map path
//! ([`scan_map`]) and fail with `Error::Scan` in the typed path
//! ([`FromRecordRow`]).

use sqlx::any::AnyRow;
use sqlx::{Column, Row, TypeInfo, ValueRef};

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use uuid::Uuid;

use crate::hooks::Hooks;
use crate::metadata::MetadataCache;
use crate::model::Record;
use crate::{Error, FromValue, Value, temporal};

// ============================================================================
// Column Classification
// ============================================================================

/// How a column is decoded, from its reported type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnClass {
    Null,
    Bool,
    SmallInt,
    Integer,
    BigInt,
    Float,
    Double,
    Text,
    Bytes,
    DateTime,
    Timestamp,
    Date,
    Time,
    Unknown,
}

/// Classifies a driver type name. Case-insensitive; length and precision
/// suffixes (`VARCHAR(20)`, `NUMERIC(10,2)`) are ignored.
pub fn classify(type_name: &str) -> ColumnClass {
    let upper = type_name.to_uppercase();
    let base = upper.split('(').next().unwrap_or_default().trim();

    match base {
        "NULL" => ColumnClass::Null,
        "BOOLEAN" | "BOOL" => ColumnClass::Bool,
        "SMALLINT" | "INT2" | "TINYINT" => ColumnClass::SmallInt,
        "INTEGER" | "INT" | "INT4" | "MEDIUMINT" | "SERIAL" => ColumnClass::Integer,
        "BIGINT" | "INT8" | "BIGSERIAL" | "UNSIGNED BIGINT" => ColumnClass::BigInt,
        "REAL" | "FLOAT4" => ColumnClass::Float,
        "DOUBLE" | "DOUBLE PRECISION" | "FLOAT" | "FLOAT8" | "NUMERIC" | "DECIMAL" => ColumnClass::Double,
        "TEXT" | "VARCHAR" | "CHAR" | "NVARCHAR" | "NCHAR" | "VARCHAR2" | "NVARCHAR2" | "CLOB" | "STRING" | "UUID"
        | "JSON" | "JSONB" => ColumnClass::Text,
        "BLOB" | "BYTEA" | "BINARY" | "VARBINARY" | "RAW" => ColumnClass::Bytes,
        "DATETIME" | "TIMESTAMP" | "TIMESTAMP WITHOUT TIME ZONE" | "DATETIME2" => ColumnClass::DateTime,
        "TIMESTAMPTZ" | "TIMESTAMP WITH TIME ZONE" | "DATETIMEOFFSET" => ColumnClass::Timestamp,
        "DATE" => ColumnClass::Date,
        "TIME" => ColumnClass::Time,
        _ => ColumnClass::Unknown,
    }
}

// ============================================================================
// Scan Context
// ============================================================================

/// What the scanner needs from the owning `Database`.
#[derive(Clone, Copy)]
pub struct ScanContext<'a> {
    pub cache: &'a MetadataCache,
    pub hooks: &'a Hooks,
}

/// Decodes column `index` of `row`.
///
/// `strict` selects the typed-path behavior for unknown types.
pub fn decode_column(row: &AnyRow, index: usize, ctx: &ScanContext<'_>, strict: bool) -> Result<Value, Error> {
    let column = row.columns().get(index).ok_or_else(|| Error::Scan(format!("row has no column {}", index)))?;
    let type_name = column.type_info().name().to_string();

    let raw = row.try_get_raw(index)?;
    let value = if raw.is_null() {
        Value::Null
    } else {
        match classify(&type_name) {
            ColumnClass::Null => Value::Null,
            ColumnClass::Bool => Value::Bool(row.try_get::<bool, _>(index)?),
            ColumnClass::SmallInt => Value::Int(row.try_get::<i16, _>(index)? as i64),
            ColumnClass::Integer => Value::Int(row.try_get::<i32, _>(index)? as i64),
            ColumnClass::BigInt => Value::Int(row.try_get::<i64, _>(index)?),
            ColumnClass::Float => Value::Float(row.try_get::<f32, _>(index)? as f64),
            ColumnClass::Double => Value::Float(row.try_get::<f64, _>(index)?),
            ColumnClass::Text => Value::Text(row.try_get::<String, _>(index)?),
            ColumnClass::Bytes => {
                let bytes = row.try_get::<Vec<u8>, _>(index)?;
                if bytes.is_empty() { Value::Null } else { Value::Bytes(bytes) }
            }
            ColumnClass::DateTime => {
                Value::DateTime(temporal::parse_naive_datetime(&row.try_get::<String, _>(index)?)?)
            }
            ColumnClass::Timestamp => {
                Value::Timestamp(temporal::parse_datetime_utc(&row.try_get::<String, _>(index)?)?)
            }
            ColumnClass::Date => Value::Date(temporal::parse_naive_date(&row.try_get::<String, _>(index)?)?),
            ColumnClass::Time => Value::Time(temporal::parse_naive_time(&row.try_get::<String, _>(index)?)?),
            ColumnClass::Unknown if strict => {
                return Err(Error::Scan(format!(
                    "column {} has unsupported type {}",
                    column.name(),
                    type_name
                )));
            }
            ColumnClass::Unknown => {
                log::debug!("Column {} has unsupported type {}, reading as NULL", column.name(), type_name);
                Value::Null
            }
        }
    };

    match ctx.hooks.converter(&type_name) {
        Some(converter) => converter.convert(&type_name, value),
        None => Ok(value),
    }
}

// ============================================================================
// Typed Rows
// ============================================================================

/// A type that can be built from one result row.
///
/// Implemented by `#[derive(Record)]` / `#[derive(Entity)]` and, for the
/// first column, by scalar types.
pub trait FromRecordRow: Sized {
    fn from_record_row(row: &AnyRow, ctx: &ScanContext<'_>) -> Result<Self, Error>;
}

/// Scans a row into a record through the cached column map. Columns with no
/// mapped field are skipped.
pub fn scan_record<T: Record>(row: &AnyRow, ctx: &ScanContext<'_>) -> Result<T, Error> {
    let descriptor = ctx.cache.describe::<T>()?;
    let mut record = T::default();

    for (index, column) in row.columns().iter().enumerate() {
        let Some(field) = descriptor.by_column(column.name()) else {
            continue;
        };
        let value = decode_column(row, index, ctx, true)?;
        record.set_field_value(&field.path, value).map_err(|e| {
            Error::Scan(format!("column {} into {}: {}", column.name(), descriptor.type_name, e))
        })?;
    }

    Ok(record)
}

fn first_column<T: FromValue>(row: &AnyRow, ctx: &ScanContext<'_>) -> Result<T, Error> {
    if row.columns().is_empty() {
        return Err(Error::scan("row has no columns"));
    }
    T::from_value(decode_column(row, 0, ctx, true)?)
}

macro_rules! impl_scalar_row {
    ($($t:ty),*) => {
        $(
            impl FromRecordRow for $t {
                fn from_record_row(row: &AnyRow, ctx: &ScanContext<'_>) -> Result<Self, Error> {
                    first_column(row, ctx)
                }
            }
        )*
    };
}

impl_scalar_row!(
    i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64, bool, String, Vec<u8>, Uuid,
    NaiveDateTime, DateTime<Utc>, NaiveDate, NaiveTime, Value
);

impl<T: FromValue> FromRecordRow for Option<T> {
    fn from_record_row(row: &AnyRow, ctx: &ScanContext<'_>) -> Result<Self, Error> {
        first_column(row, ctx)
    }
}

// ============================================================================
// Map Rows
// ============================================================================

/// One row as ordered column/value pairs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowMap {
    entries: Vec<(String, Value)>,
}

impl RowMap {
    /// Value of `column`, matched case-insensitively.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.entries.iter().find(|(name, _)| name.eq_ignore_ascii_case(column)).map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn columns(&self) -> Vec<&str> {
        self.entries.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_inner(self) -> Vec<(String, Value)> {
        self.entries
    }
}

/// Scans a row into a `RowMap`. Unknown column types become `NULL`.
pub fn scan_map(row: &AnyRow, ctx: &ScanContext<'_>) -> Result<RowMap, Error> {
    let mut entries = Vec::with_capacity(row.columns().len());
    for (index, column) in row.columns().iter().enumerate() {
        entries.push((column.name().to_string(), decode_column(row, index, ctx, false)?));
    }
    Ok(RowMap { entries })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_any_driver_names() {
        assert_eq!(classify("BIGINT"), ColumnClass::BigInt);
        assert_eq!(classify("INTEGER"), ColumnClass::Integer);
        assert_eq!(classify("DOUBLE"), ColumnClass::Double);
        assert_eq!(classify("REAL"), ColumnClass::Float);
        assert_eq!(classify("TEXT"), ColumnClass::Text);
        assert_eq!(classify("BLOB"), ColumnClass::Bytes);
        assert_eq!(classify("NULL"), ColumnClass::Null);
    }

    #[test]
    fn test_classify_ignores_case_and_precision() {
        assert_eq!(classify("varchar(20)"), ColumnClass::Text);
        assert_eq!(classify("numeric(10,2)"), ColumnClass::Double);
        assert_eq!(classify("timestamptz"), ColumnClass::Timestamp);
        assert_eq!(classify("DATETIME"), ColumnClass::DateTime);
    }

    #[test]
    fn test_classify_unknown() {
        assert_eq!(classify("GEOMETRY"), ColumnClass::Unknown);
        assert_eq!(classify("INTERVAL"), ColumnClass::Unknown);
    }

    #[test]
    fn test_row_map_lookup() {
        let map = RowMap { entries: vec![("ID".to_string(), Value::Int(1)), ("name".to_string(), Value::Null)] };
        assert_eq!(map.get("id"), Some(&Value::Int(1)));
        assert_eq!(map.columns(), vec!["ID", "name"]);
        assert_eq!(map.len(), 2);
    }
}
