//! # Value Binding Module
//!
//! Binds [`Value`]s onto `sqlx` `AnyArguments` with driver-specific handling.
//!
//! ## Features
//!
//! - **Native Scalars**: integers, floats, booleans, text and bytes bind as
//!   their native `Any` types
//! - **Temporal Types**: chrono values are bound as text formatted for the
//!   driver via the temporal module (the `Any` driver has no date types)
//! - **NULL**: bound as a typed `NULL` text parameter

use sqlx::Arguments;
use sqlx::any::AnyArguments;

use crate::{Error, Value, dialect::Drivers, temporal};

// ============================================================================
// Value Binding Trait
// ============================================================================

/// Extension trait for binding values to AnyArguments with driver-specific handling.
pub trait ValueBinder {
    /// Binds a single value.
    ///
    /// `Value::List` must have been expanded by the `Finder` before this point
    /// and is rejected.
    fn bind_value(&mut self, value: &Value, driver: &Drivers) -> Result<(), Error>;

    /// Binds every value in order.
    fn bind_all(&mut self, values: &[Value], driver: &Drivers) -> Result<(), Error> {
        for value in values {
            self.bind_value(value, driver)?;
        }
        Ok(())
    }
}

impl ValueBinder for AnyArguments<'_> {
    fn bind_value(&mut self, value: &Value, driver: &Drivers) -> Result<(), Error> {
        let bound = match value {
            Value::Null => self.add(Option::<String>::None),
            Value::Bool(b) => self.add(*b),
            Value::Int(i) => self.add(*i),
            Value::Float(f) => self.add(*f),
            Value::Text(s) => self.add(s.clone()),
            Value::Bytes(b) => self.add(b.clone()),

            // ================================================================
            // Temporal Types
            // ================================================================
            Value::Timestamp(ts) => self.add(temporal::format_datetime_for_driver(ts, driver)),
            Value::DateTime(dt) => self.add(temporal::format_naive_datetime_for_driver(dt, driver)),
            Value::Date(d) => self.add(temporal::format_naive_date(d)),
            Value::Time(t) => self.add(temporal::format_naive_time(t)),

            Value::List(_) => {
                return Err(Error::Validation("list parameter reached binding without expansion".to_string()));
            }
        };
        bound.map_err(|e| Error::Conversion(format!("Failed to bind {} value: {}", value.kind_name(), e)))
    }
}

// ============================================================================
// Convenience Functions
// ============================================================================

/// Builds a fresh argument list from `values`.
///
/// # Example
///
/// ```rust,ignore
/// let args = build_arguments(&values![1, "a"], &Drivers::SQLite)?;
/// sqlx::query_with(sql, args).execute(&pool).await?;
/// ```
pub fn build_arguments<'q>(values: &[Value], driver: &Drivers) -> Result<AnyArguments<'q>, Error> {
    let mut args = AnyArguments::default();
    args.bind_all(values, driver)?;
    Ok(args)
}

// ============================================================================
// Tests
// ============================================================================
