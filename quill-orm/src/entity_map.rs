//! # Entity Map Module
//!
//! `EntityMap` is a record without a Rust type: a table name, an optional key
//! column and an ordered list of column values. It is written with
//! `Database::insert_map` / `Database::update_map`.
//!
//! ```rust,ignore
//! let mut row = EntityMap::new("t_audit").with_primary_key("id");
//! row.set("action", "login")?.set("user_id", 42)?;
//! db.insert_map(&mut scope, &mut row).await?;
//! ```

use crate::{Error, Value};

/// A dynamic row bound to one table.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityMap {
    table: String,
    pk_column: Option<String>,
    pk_sequence: Option<String>,
    entries: Vec<(String, Value)>,
}

impl EntityMap {
    pub fn new(table: impl Into<String>) -> Self {
        Self { table: table.into(), pk_column: None, pk_sequence: None, entries: Vec::new() }
    }

    /// Names the key column. Required by `update_map`.
    pub fn with_primary_key(mut self, column: impl Into<String>) -> Self {
        self.pk_column = Some(column.into());
        self
    }

    /// Sequence expression used for the key when it has no value.
    pub fn with_sequence(mut self, expression: impl Into<String>) -> Self {
        self.pk_sequence = Some(expression.into());
        self
    }

    /// Sets a column value, replacing an earlier one for the same column.
    ///
    /// List values are rejected.
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) -> Result<&mut Self, Error> {
        let column = column.into();
        let value = value.into();
        if value.is_list() {
            return Err(Error::Validation(format!("column {} cannot hold a list value", column)));
        }

        match self.entries.iter_mut().find(|(name, _)| name.eq_ignore_ascii_case(&column)) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((column, value)),
        }
        Ok(self)
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.entries.iter().find(|(name, _)| name.eq_ignore_ascii_case(column)).map(|(_, value)| value)
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn primary_key(&self) -> Option<&str> {
        self.pk_column.as_deref()
    }

    pub fn sequence(&self) -> Option<&str> {
        self.pk_sequence.as_deref()
    }

    pub fn entries(&self) -> &[(String, Value)] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
