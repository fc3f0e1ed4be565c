//! # Model Module
//!
//! This module defines the `Record` and `Entity` traits and the field metadata
//! the derive macros generate for them.
//!
//! ## Overview
//!
//! A `Record` is any struct whose fields can be described, read and written by
//! name. The metadata cache walks [`Record::fields`] once per type; the mapper
//! and scanner then move values in and out through [`Record::field_value`] and
//! [`Record::set_field_value`] using the access path recorded in the cache.
//!
//! An `Entity` is a `Record` that maps to a table.
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use quill_orm::{Entity, Record};
//!
//! #[derive(Record, Default)]
//! pub struct Audit {
//!     #[orm(column)]
//!     pub created_by: String,
//!     #[orm(column = "created_at")]
//!     pub created: chrono::NaiveDateTime,
//! }
//!
//! #[derive(Entity, Default)]
//! #[orm(table = "t_user")]
//! pub struct User {
//!     #[orm(column, primary_key)]
//!     pub id: i64,
//!     #[orm(column)]
//!     pub name: String,
//!     #[orm(flatten)]
//!     pub audit: Audit,
//! }
//! ```
//!
//! ## Supported ORM Attributes
//!
//! - `#[orm(table = "name")]` - Table name (struct level, `Entity` only)
//! - `#[orm(column)]` / `#[orm(column = "name")]` - Maps the field to a column
//! - `#[orm(primary_key)]` - Marks the key field
//! - `#[orm(sequence = "expr")]` - Key comes from a sequence expression
//! - `#[orm(trigger)]` - Key is assigned by a database trigger
//! - `#[orm(flatten)]` - Embeds another `Record`'s fields

use crate::{Error, Value};

// ============================================================================
// Field Metadata
// ============================================================================

/// The shape of a scalar field, derived from its Rust type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    Integer,
    Text,
    Float,
    Bool,
    /// `NaiveDateTime`
    DateTime,
    /// `DateTime<Utc>`
    Timestamp,
    Date,
    Time,
    Bytes,
    Uuid,
    Other,
}

impl ScalarKind {
    /// Whether a primary key of this kind can hold a generated value.
    pub fn is_key_compatible(&self) -> bool {
        matches!(self, ScalarKind::Integer | ScalarKind::Text | ScalarKind::Uuid)
    }
}

/// Either a scalar column candidate or an embedded group of fields.
#[derive(Clone, Copy)]
pub enum FieldKind {
    Scalar(ScalarKind),
    /// The embedded type's `Record::fields`.
    Embedded(fn() -> Vec<FieldInfo>),
}

impl std::fmt::Debug for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldKind::Scalar(kind) => f.debug_tuple("Scalar").field(kind).finish(),
            FieldKind::Embedded(_) => f.write_str("Embedded"),
        }
    }
}

/// Metadata for one struct field, generated by `#[derive(Record)]`.
#[derive(Debug, Clone)]
pub struct FieldInfo {
    /// Struct field name, with any `r#` prefix stripped.
    pub name: &'static str,

    /// Column name when the field carries a column tag.
    pub column: Option<&'static str>,

    /// SQL type from the Rust type (e.g. "BIGINT", "TEXT", "TIMESTAMPTZ").
    pub sql_type: &'static str,

    /// `Option<T>` fields.
    pub nullable: bool,

    /// `pub` fields. Only exported tagged fields are mapped to columns.
    pub exported: bool,

    pub primary_key: bool,

    /// Sequence expression written literally into INSERT statements.
    pub sequence: Option<&'static str>,

    /// Key assigned by a database trigger.
    pub trigger: bool,

    pub kind: FieldKind,
}

impl FieldInfo {
    /// A tagged scalar field with default flags. Used by hand-written impls.
    pub fn column(name: &'static str, column: &'static str, sql_type: &'static str, kind: ScalarKind) -> Self {
        Self {
            name,
            column: Some(column),
            sql_type,
            nullable: false,
            exported: true,
            primary_key: false,
            sequence: None,
            trigger: false,
            kind: FieldKind::Scalar(kind),
        }
    }

    pub fn is_embedded(&self) -> bool {
        matches!(self.kind, FieldKind::Embedded(_))
    }
}

// ============================================================================
// Record / Entity Traits
// ============================================================================

/// A struct whose fields can be described and accessed by path.
///
/// Implemented by `#[derive(Record)]` and `#[derive(Entity)]`. A path is the
/// list of field names from this struct down through embedded groups.
pub trait Record: Default + Send + Sync + 'static {
    /// The declared fields, in order.
    fn fields() -> Vec<FieldInfo>;

    /// Reads the field at `path`, or `None` if the path does not exist.
    fn field_value(&self, path: &[&str]) -> Option<Value>;

    /// Writes the field at `path`.
    fn set_field_value(&mut self, path: &[&str], value: Value) -> Result<(), Error>;
}

/// A `Record` bound to a table.
pub trait Entity: Record {
    fn table_name() -> &'static str;
}

/// Error returned by generated setters for unknown paths.
pub fn unknown_field(type_name: &str, path: &[&str]) -> Error {
    Error::Mapping(format!("{} has no field at path {}", type_name, path.join(".")))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FromValue;

    #[derive(Default)]
    struct Point {
        x: i64,
        label: String,
    }

    impl Record for Point {
        fn fields() -> Vec<FieldInfo> {
            vec![
                FieldInfo::column("x", "x", "BIGINT", ScalarKind::Integer),
                FieldInfo::column("label", "label", "TEXT", ScalarKind::Text),
            ]
        }

        fn field_value(&self, path: &[&str]) -> Option<Value> {
            match path {
                ["x"] => Some(Value::from(self.x)),
                ["label"] => Some(Value::from(self.label.clone())),
                _ => None,
            }
        }

        fn set_field_value(&mut self, path: &[&str], value: Value) -> Result<(), Error> {
            match path {
                ["x"] => self.x = i64::from_value(value)?,
                ["label"] => self.label = String::from_value(value)?,
                _ => return Err(unknown_field("Point", path)),
            }
            Ok(())
        }
    }

    #[test]
    fn test_hand_written_record_roundtrip() {
        let mut point = Point::default();
        point.set_field_value(&["x"], Value::Int(4)).unwrap();
        point.set_field_value(&["label"], Value::Text("a".into())).unwrap();

        assert_eq!(point.field_value(&["x"]), Some(Value::Int(4)));
        assert_eq!(point.field_value(&["label"]), Some(Value::Text("a".into())));
        assert!(point.set_field_value(&["y"], Value::Null).is_err());
    }

    #[test]
    fn test_key_compatible_kinds() {
        assert!(ScalarKind::Integer.is_key_compatible());
        assert!(ScalarKind::Uuid.is_key_compatible());
        assert!(!ScalarKind::Float.is_key_compatible());
        assert!(!ScalarKind::Timestamp.is_key_compatible());
    }
}
