//! # Finder Module
//!
//! `Finder` accumulates SQL text and its positional parameters. All text uses
//! the neutral `?` placeholder; the target dialect's form is applied at
//! execution time by [`Drivers::rebind`](crate::Drivers::rebind).
//!
//! ## Finalization
//!
//! [`Finder::get_sql`] / [`Finder::finalize`] run once per parameter set:
//!
//! 1. with `injection_check` on, a literal `'` in the text is rejected;
//! 2. every [`Value::List`] parameter is expanded in place into `?,?,...` and
//!    its elements are spliced into the value list.
//!
//! The result is cached. Any later `append` drops the cache so the next call
//! finalizes again.
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use quill_orm::{values, Finder};
//!
//! let mut finder = Finder::select("t_user");
//! finder
//!     .append("WHERE status IN (?)", values![vec!["active", "locked"]])
//!     .append("AND age > ?", values![18])
//!     .append_sql("ORDER BY id");
//!
//! assert_eq!(
//!     finder.get_sql()?,
//!     "SELECT * FROM t_user WHERE status IN (?,?) AND age > ? ORDER BY id"
//! );
//! ```

use crate::{Error, Value, dialect::PLACEHOLDER};

/// Separator placed between expanded list placeholders.
const LIST_SEPARATOR: char = ',';

// ============================================================================
// Finder Struct
// ============================================================================

/// Mutable accumulator of SQL text and bound parameter values.
#[derive(Debug, Clone)]
pub struct Finder {
    sql: String,
    values: Vec<Value>,
    /// Reject literal single quotes in the text. Default: `true`.
    pub injection_check: bool,
    /// Run a count query when the finder is used with a `Page`. Default: `true`.
    pub select_total_count: bool,
    count_finder: Option<Box<Finder>>,
    finalized: Option<(String, Vec<Value>)>,
}

impl Default for Finder {
    fn default() -> Self {
        Self::new()
    }
}

impl Finder {
    /// Creates an empty finder.
    pub fn new() -> Self {
        Self {
            sql: String::new(),
            values: Vec::new(),
            injection_check: true,
            select_total_count: true,
            count_finder: None,
            finalized: None,
        }
    }

    /// `SELECT * FROM {table}`
    pub fn select(table: &str) -> Self {
        Self::select_columns(table, "*")
    }

    /// `SELECT {columns} FROM {table}`
    pub fn select_columns(table: &str, columns: &str) -> Self {
        let mut finder = Self::new();
        finder.sql = format!("SELECT {} FROM {}", columns, table);
        finder
    }

    /// `UPDATE {table} SET`
    pub fn update(table: &str) -> Self {
        let mut finder = Self::new();
        finder.sql = format!("UPDATE {} SET", table);
        finder
    }

    /// `DELETE FROM {table}`
    pub fn delete(table: &str) -> Self {
        let mut finder = Self::new();
        finder.sql = format!("DELETE FROM {}", table);
        finder
    }

    // ========================================================================
    // Building
    // ========================================================================

    /// Appends a text fragment and the values of its placeholders, in order.
    ///
    /// A space is inserted between fragments when neither side has one.
    pub fn append(&mut self, text: &str, values: Vec<Value>) -> &mut Self {
        self.push_text(text);
        self.values.extend(values);
        self.finalized = None;
        self
    }

    /// Appends a text fragment without parameters.
    pub fn append_sql(&mut self, text: &str) -> &mut Self {
        self.append(text, Vec::new())
    }

    /// Splices another finder's finalized text and values onto this one.
    ///
    /// The other finder's list parameters are expanded (and its injection
    /// check applied) before splicing.
    pub fn append_finder(&mut self, other: &Finder) -> Result<&mut Self, Error> {
        let (sql, values) = match &other.finalized {
            Some(done) => done.clone(),
            None => other.compute()?,
        };
        Ok(self.append(&sql, values))
    }

    /// Uses `count` instead of a derived `COUNT(*)` statement when this
    /// finder is paginated.
    pub fn set_count_finder(&mut self, count: Finder) -> &mut Self {
        self.count_finder = Some(Box::new(count));
        self
    }

    pub fn count_finder_mut(&mut self) -> Option<&mut Finder> {
        self.count_finder.as_deref_mut()
    }

    fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let needs_space = !self.sql.is_empty()
            && !self.sql.ends_with(char::is_whitespace)
            && !text.starts_with(char::is_whitespace);
        if needs_space {
            self.sql.push(' ');
        }
        self.sql.push_str(text);
    }

    // ========================================================================
    // Finalization
    // ========================================================================

    /// Returns the finalized SQL text.
    pub fn get_sql(&mut self) -> Result<String, Error> {
        self.finalize().map(|(sql, _)| sql)
    }

    /// Returns the finalized SQL text and value list, computing them on the
    /// first call and reusing them until the finder is mutated.
    pub fn finalize(&mut self) -> Result<(String, Vec<Value>), Error> {
        if let Some(done) = &self.finalized {
            return Ok(done.clone());
        }
        let done = self.compute()?;
        self.finalized = Some(done.clone());
        Ok(done)
    }

    /// The raw, unexpanded parameter list.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    fn compute(&self) -> Result<(String, Vec<Value>), Error> {
        if self.injection_check && self.sql.contains('\'') {
            return Err(Error::Injection(self.sql.clone()));
        }
        expand_list_params(&self.sql, &self.values)
    }
}

// ============================================================================
// List Expansion
// ============================================================================

/// Expands every `Value::List` parameter into consecutive placeholders.
fn expand_list_params(sql: &str, values: &[Value]) -> Result<(String, Vec<Value>), Error> {
    if !values.iter().any(Value::is_list) {
        return Ok((sql.to_string(), values.to_vec()));
    }

    let mut out = String::with_capacity(sql.len() + values.len() * 2);
    let mut expanded = Vec::with_capacity(values.len());
    let mut position = 0usize;
    let mut quote: Option<char> = None;

    for ch in sql.chars() {
        if let Some(q) = quote {
            if ch == q {
                quote = None;
            }
            out.push(ch);
            continue;
        }
        match ch {
            '\'' | '"' | '`' => {
                quote = Some(ch);
                out.push(ch);
            }
            PLACEHOLDER => {
                match values.get(position) {
                    Some(Value::List(items)) => {
                        if items.is_empty() {
                            return Err(Error::EmptyInList { position: position + 1 });
                        }
                        for (i, item) in items.iter().enumerate() {
                            if item.is_list() {
                                return Err(Error::Validation(format!(
                                    "parameter {} contains a nested list",
                                    position + 1
                                )));
                            }
                            if i > 0 {
                                out.push(LIST_SEPARATOR);
                            }
                            out.push(PLACEHOLDER);
                            expanded.push(item.clone());
                        }
                    }
                    Some(value) => {
                        out.push(PLACEHOLDER);
                        expanded.push(value.clone());
                    }
                    None => out.push(PLACEHOLDER),
                }
                position += 1;
            }
            _ => out.push(ch),
        }
    }

    for (offset, value) in values.iter().enumerate().skip(position) {
        if value.is_list() {
            return Err(Error::Validation(format!("list parameter {} has no placeholder", offset + 1)));
        }
        expanded.push(value.clone());
    }

    Ok((out, expanded))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::values;

    #[test]
    fn test_select_and_append() {
        let mut finder = Finder::select("t_user");
        finder.append("WHERE id = ?", values![1]).append_sql("ORDER BY id");

        assert_eq!(finder.get_sql().unwrap(), "SELECT * FROM t_user WHERE id = ? ORDER BY id");
        assert_eq!(finder.values(), &[Value::Int(1)]);
    }

    #[test]
    fn test_get_sql_is_idempotent() {
        let mut finder = Finder::select("t");
        finder.append("WHERE a IN (?) AND b = ?", values![vec![1, 2, 3], "x"]);

        let first = finder.finalize().unwrap();
        let second = finder.finalize().unwrap();
        assert_eq!(first, second);
        assert_eq!(first.0, "SELECT * FROM t WHERE a IN (?,?,?) AND b = ?");
    }

    #[test]
    fn test_list_expansion_keeps_order_and_offsets() {
        let mut finder = Finder::new();
        finder.append("a = ? AND b IN (?) AND c = ?", values!["first", vec![10, 20], "last"]);

        let (sql, values) = finder.finalize().unwrap();
        assert_eq!(sql, "a = ? AND b IN (?,?) AND c = ?");
        assert_eq!(
            values,
            vec![Value::Text("first".into()), Value::Int(10), Value::Int(20), Value::Text("last".into())]
        );
    }

    #[test]
    fn test_placeholder_count_matches_list_length() {
        for n in 1..6_i64 {
            let mut finder = Finder::new();
            finder.append("x IN (?)", values![(0..n).collect::<Vec<i64>>()]);
            let (sql, values) = finder.finalize().unwrap();
            assert_eq!(sql.matches('?').count() as i64, n);
            assert_eq!(values.len() as i64, n);
        }
    }

    #[test]
    fn test_bytes_are_bound_as_one_value() {
        let mut finder = Finder::new();
        finder.append("payload = ?", values![vec![1_u8, 2, 3]]);

        let (sql, values) = finder.finalize().unwrap();
        assert_eq!(sql, "payload = ?");
        assert_eq!(values, vec![Value::Bytes(vec![1, 2, 3])]);
    }

    #[test]
    fn test_empty_list_names_position() {
        let mut finder = Finder::new();
        finder.append("a = ? AND b IN (?)", values![1, Vec::<i64>::new()]);

        match finder.get_sql() {
            Err(Error::EmptyInList { position }) => assert_eq!(position, 2),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_injection_check() {
        let mut finder = Finder::select("t");
        finder.append_sql("WHERE name = 'bob'");
        assert!(matches!(finder.get_sql(), Err(Error::Injection(_))));

        finder.injection_check = false;
        assert!(finder.get_sql().is_ok());
    }

    #[test]
    fn test_mutation_after_finalize_refinalizes() {
        let mut finder = Finder::select("t");
        finder.append("WHERE a IN (?)", values![vec![1, 2]]);
        assert_eq!(finder.get_sql().unwrap(), "SELECT * FROM t WHERE a IN (?,?)");

        finder.append("AND b IN (?)", values![vec![3, 4, 5]]);
        let (sql, values) = finder.finalize().unwrap();
        assert_eq!(sql, "SELECT * FROM t WHERE a IN (?,?) AND b IN (?,?,?)");
        assert_eq!(values.len(), 5);
    }

    #[test]
    fn test_append_finder_splices_finalized_text() {
        let mut inner = Finder::new();
        inner.append("id IN (?)", values![vec![7, 8]]);

        let mut outer = Finder::select("t");
        outer.append_sql("WHERE").append_finder(&inner).unwrap();

        let (sql, values) = outer.finalize().unwrap();
        assert_eq!(sql, "SELECT * FROM t WHERE id IN (?,?)");
        assert_eq!(values, vec![Value::Int(7), Value::Int(8)]);
    }

    #[test]
    fn test_update_and_delete_prefixes() {
        let mut finder = Finder::update("t");
        finder.append("name = ? WHERE id = ?", values!["n", 1]);
        assert_eq!(finder.get_sql().unwrap(), "UPDATE t SET name = ? WHERE id = ?");

        let mut finder = Finder::delete("t");
        finder.append("WHERE id = ?", values![1]);
        assert_eq!(finder.get_sql().unwrap(), "DELETE FROM t WHERE id = ?");
    }
}
