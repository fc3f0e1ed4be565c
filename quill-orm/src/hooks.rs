//! # Hooks Module
//!
//! Extension points injected into a `Database` at construction time through
//! `DatabaseBuilder`. Nothing here is global: two `Database` handles may carry
//! different hooks.
//!
//! | Hook                        | Called                                          |
//! |-----------------------------|-------------------------------------------------|
//! | [`SqlLogger`]               | after every statement, with values and timing   |
//! | [`SqlRewriter`]             | just before a statement is sent to the driver   |
//! | [`ValueConverter`]          | per column, keyed by the driver's type name     |
//! | [`KeyGenerator`]            | for empty string keys on insert                 |
//! | [`GlobalTransactionManager`]| around the local transaction boundary           |

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::model::ScalarKind;
use crate::{Error, Value, dialect::Drivers};

// ============================================================================
// SQL Logging
// ============================================================================

/// Sink for executed statements.
pub trait SqlLogger: Send + Sync {
    /// `error` is set when the driver rejected the statement.
    fn log(&self, sql: &str, values: &[Value], elapsed: Duration, error: Option<&Error>);
}

/// Default sink writing through the `log` facade.
///
/// - `debug!` for every statement when `print_sql` is on
/// - `warn!` for statements slower than the threshold
/// - `error!` for failed statements
#[derive(Debug, Clone)]
pub struct LogSqlLogger {
    print_sql: bool,
    slow_threshold: Option<Duration>,
}

impl LogSqlLogger {
    pub fn new(print_sql: bool, slow_sql_millis: u64) -> Self {
        let slow_threshold = (slow_sql_millis > 0).then(|| Duration::from_millis(slow_sql_millis));
        Self { print_sql, slow_threshold }
    }

    pub fn is_slow(&self, elapsed: Duration) -> bool {
        self.slow_threshold.is_some_and(|threshold| elapsed > threshold)
    }
}

impl SqlLogger for LogSqlLogger {
    fn log(&self, sql: &str, values: &[Value], elapsed: Duration, error: Option<&Error>) {
        if let Some(err) = error {
            log::error!("SQL failed after {:?}: {} args={:?} error={}", elapsed, sql, values, err);
            return;
        }
        if self.is_slow(elapsed) {
            log::warn!("Slow SQL ({:?}): {} args={:?}", elapsed, sql, values);
        } else if self.print_sql {
            log::debug!("SQL ({:?}): {} args={:?}", elapsed, sql, values);
        }
    }
}

// ============================================================================
// Statement Rewriting / Value Conversion
// ============================================================================

/// Rewrites the final, dialect-specific SQL text (e.g. to add hints or route
/// to a shard table).
pub trait SqlRewriter: Send + Sync {
    fn rewrite(&self, sql: String, driver: Drivers) -> Result<String, Error>;
}

/// Converts a scanned column value for one driver type name.
pub trait ValueConverter: Send + Sync {
    fn convert(&self, type_name: &str, value: Value) -> Result<Value, Error>;
}

// ============================================================================
// Key Generation
// ============================================================================

/// Produces keys for string-like primary keys left empty on insert.
pub trait KeyGenerator: Send + Sync {
    /// `kind` is the key field's scalar kind (`Text` for dynamic maps).
    fn generate(&self, kind: ScalarKind) -> Value;
}

/// Time-ordered UUIDv7 keys: hyphenated for `Uuid` fields, 32 hex characters
/// for `String` fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidKeyGenerator;

impl KeyGenerator for UuidKeyGenerator {
    fn generate(&self, kind: ScalarKind) -> Value {
        let id = Uuid::now_v7();
        match kind {
            ScalarKind::Uuid => Value::Text(id.hyphenated().to_string()),
            _ => Value::Text(id.simple().to_string()),
        }
    }
}

// ============================================================================
// Global Transactions
// ============================================================================

/// Starts global (distributed) transactions. Only the delegate interface is
/// provided; coordination belongs to the implementation.
#[async_trait]
pub trait GlobalTransactionManager: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn GlobalTransaction>, Error>;
}

/// One running global transaction.
#[async_trait]
pub trait GlobalTransaction: Send + Sync {
    fn id(&self) -> String;
    async fn commit(&mut self) -> Result<(), Error>;
    async fn rollback(&mut self) -> Result<(), Error>;
}

// ============================================================================
// Hooks Container
// ============================================================================

/// The hooks held by one `Database`.
#[derive(Clone)]
pub struct Hooks {
    pub logger: Arc<dyn SqlLogger>,
    pub rewriter: Option<Arc<dyn SqlRewriter>>,
    /// Keyed by uppercase driver type name.
    pub converters: HashMap<String, Arc<dyn ValueConverter>>,
    pub key_generator: Arc<dyn KeyGenerator>,
    pub global_transactions: Option<Arc<dyn GlobalTransactionManager>>,
}

impl Hooks {
    pub fn new(logger: Arc<dyn SqlLogger>) -> Self {
        Self {
            logger,
            rewriter: None,
            converters: HashMap::new(),
            key_generator: Arc::new(UuidKeyGenerator),
            global_transactions: None,
        }
    }

    pub fn converter(&self, type_name: &str) -> Option<&Arc<dyn ValueConverter>> {
        if self.converters.is_empty() {
            return None;
        }
        self.converters.get(&type_name.to_uppercase())
    }
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks")
            .field("rewriter", &self.rewriter.is_some())
            .field("converters", &self.converters.keys().collect::<Vec<_>>())
            .field("global_transactions", &self.global_transactions.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slow_threshold() {
        let logger = LogSqlLogger::new(true, 100);
        assert!(logger.is_slow(Duration::from_millis(150)));
        assert!(!logger.is_slow(Duration::from_millis(50)));
        assert!(!LogSqlLogger::new(true, 0).is_slow(Duration::from_secs(10)));
    }

    #[test]
    fn test_uuid_key_generator_formats() {
        let generator = UuidKeyGenerator;
        let Value::Text(simple) = generator.generate(ScalarKind::Text) else { panic!("expected text") };
        assert_eq!(simple.len(), 32);

        let Value::Text(hyphenated) = generator.generate(ScalarKind::Uuid) else { panic!("expected text") };
        assert!(hyphenated.parse::<Uuid>().is_ok());
        assert_eq!(hyphenated.len(), 36);
    }

    #[test]
    fn test_converter_lookup_is_uppercase() {
        struct Upper;
        impl ValueConverter for Upper {
            fn convert(&self, _type_name: &str, value: Value) -> Result<Value, Error> {
                Ok(value)
            }
        }

        let mut hooks = Hooks::new(Arc::new(LogSqlLogger::new(false, 0)));
        hooks.converters.insert("NUMERIC".to_string(), Arc::new(Upper));
        assert!(hooks.converter("numeric").is_some());
        assert!(hooks.converter("TEXT").is_none());
    }
}
