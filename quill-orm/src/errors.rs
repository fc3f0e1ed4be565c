//! # Error Handling Module
//!
//! This module defines the error type used throughout Quill ORM.
//! Every public operation returns `Result<_, Error>`; the variants are grouped
//! by how the caller is expected to react to them.
//!
//! ## Error Groups
//!
//! - **Validation**: malformed `Finder` usage, literal quotes in SQL text, empty
//!   IN-lists, unmapped records, unsupported key types. Never retried.
//! - **Propagation**: a write attempted outside a transaction, or a `Scope`
//!   reused with a different `Database`.
//! - **Execution**: the driver rejected a statement. Carries the SQL text.
//! - **Scan / Conversion**: row count or type mismatch while reading results.
//! - **Transaction**: the body of `Database::transaction` failed; the original
//!   error is kept as the source.
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use quill_orm::Error;
//!
//! match db.insert(&mut scope, &mut user).await {
//!     Ok(_) => {}
//!     Err(Error::Propagation(msg)) => eprintln!("open a transaction first: {}", msg),
//!     Err(Error::Execution { sql, source }) => eprintln!("{} failed: {}", sql, source),
//!     Err(e) => eprintln!("Other error: {}", e),
//! }
//! ```

// ============================================================================
// External Crate Imports
// ============================================================================

use thiserror::Error;

// ============================================================================
// Error Enum Definition
// ============================================================================

/// The main error type for Quill ORM operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed builder usage or a statement that cannot be built.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// // Mixed assigned and unassigned integer keys in one batch insert
    /// Err(Error::Validation("batch mixes assigned and generated keys".to_string()))
    /// ```
    #[error("Validation error: {0}")]
    Validation(String),

    /// The SQL text contains a literal single quote while injection checking
    /// is enabled. Values must be passed as parameters instead.
    #[error("Possible SQL injection, literal quote found in: {0}")]
    Injection(String),

    /// A list parameter had zero elements, which would render an empty
    /// `IN ()` clause.
    ///
    /// `position` is 1-based.
    #[error("Parameter {position} is an empty list, IN clauses need at least one value")]
    EmptyInList { position: usize },

    /// The statement could not be rewritten (e.g. no `FROM` while building a
    /// count query).
    #[error("Malformed statement: {0}")]
    MalformedStatement(String),

    /// The record type cannot be mapped to a table: no column-tagged fields,
    /// no primary key, or an unsupported key type.
    #[error("Mapping error: {0}")]
    Mapping(String),

    /// Transaction scope misuse.
    ///
    /// # When Raised
    ///
    /// - A write is attempted without an active transaction
    /// - A `Scope` bound to one `Database` is passed to another
    /// - The opener tries to commit a transaction that was already rolled back
    #[error("Transaction propagation error: {0}")]
    Propagation(String),

    /// The driver rejected a statement.
    #[error("Execution of `{sql}` failed: {source}")]
    Execution {
        sql: String,
        #[source]
        source: sqlx::Error,
    },

    /// The caller-supplied deadline elapsed during a blocking call.
    #[error("Deadline exceeded while executing `{0}`")]
    Timeout(String),

    /// Row count or column mismatch while scanning results.
    #[error("Scan error: {0}")]
    Scan(String),

    /// Type conversion error.
    ///
    /// Raised when a `Value` cannot be turned into the requested Rust type or
    /// when a textual temporal value does not parse.
    #[error("Type conversion error: {0}")]
    Conversion(String),

    /// The body of a transaction failed. The transaction has been rolled back.
    #[error("Transaction rolled back (opener: {opener}): {source}")]
    Transaction {
        opener: bool,
        #[source]
        source: Box<Error>,
    },

    /// The configured global transaction delegate reported a failure.
    #[error("Global transaction error: {0}")]
    GlobalTransaction(String),

    /// Database operation error.
    ///
    /// This variant wraps errors from the underlying sqlx library that are not
    /// tied to a specific statement (connecting, beginning a transaction,
    /// reading a column).
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    /// Invalid argument error.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// if page.page_size == 0 {
    ///     return Err(Error::invalid_argument("page_size must be greater than zero"));
    /// }
    /// ```
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

// ============================================================================
// Helper Functions and Traits
// ============================================================================

impl Error {
    /// Creates a `Validation` error from a string slice.
    pub fn validation(msg: &str) -> Self {
        Error::Validation(msg.to_string())
    }

    /// Creates a `Mapping` error from a string slice.
    pub fn mapping(msg: &str) -> Self {
        Error::Mapping(msg.to_string())
    }

    /// Creates a `Propagation` error from a string slice.
    pub fn propagation(msg: &str) -> Self {
        Error::Propagation(msg.to_string())
    }

    /// Creates a `Scan` error from a string slice.
    pub fn scan(msg: &str) -> Self {
        Error::Scan(msg.to_string())
    }

    /// Creates an `InvalidArgument` error from a string slice.
    pub fn invalid_argument(msg: &str) -> Self {
        Error::InvalidArgument(msg.to_string())
    }

    /// Creates a `Conversion` error from a string slice.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// fn parse_value(value: &str) -> Result<i32, Error> {
    ///     value.parse::<i32>()
    ///         .map_err(|_| Error::conversion("Invalid integer format"))
    /// }
    /// ```
    pub fn conversion(msg: &str) -> Self {
        Error::Conversion(msg.to_string())
    }

    /// Wraps a driver error with the SQL text that produced it.
    pub fn execution(sql: &str, source: sqlx::Error) -> Self {
        Error::Execution { sql: sql.to_string(), source }
    }

    /// Returns the innermost error, unwrapping nested `Transaction` layers.
    ///
    /// Nested `transaction` calls wrap the body error once per level; this is
    /// the error the body actually produced.
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::Transaction { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_in_list_names_position() {
        let err = Error::EmptyInList { position: 2 };
        assert!(err.to_string().contains("Parameter 2"));
    }

    #[test]
    fn test_root_cause_unwraps_nested_transactions() {
        let inner = Error::Transaction { opener: false, source: Box::new(Error::validation("boom")) };
        let outer = Error::Transaction { opener: true, source: Box::new(inner) };

        assert!(matches!(outer.root_cause(), Error::Validation(msg) if msg == "boom"));
    }
}
