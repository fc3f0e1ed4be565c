//! # Configuration Module
//!
//! `DatabaseConfig` holds the tunables of one `Database`. Every field has a
//! default, so a partially filled TOML/JSON/env source deserializes cleanly.
//!
//! ```rust,ignore
//! let config: DatabaseConfig = serde_json::from_str(r#"{ "slow_sql_millis": 200 }"#)?;
//! let db = Database::builder().config(config).connect(&url).await?;
//! ```

use serde::{Deserialize, Serialize};

use crate::dialect::Drivers;

/// Runtime configuration of a `Database`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Pool size. Default: 5.
    pub max_connections: u32,

    /// Overrides driver detection from the connection URL.
    pub driver: Option<Drivers>,

    /// Log every executed statement at `debug` level. Default: `true`.
    pub print_sql: bool,

    /// Statements slower than this are logged at `warn` level. `0` disables it.
    pub slow_sql_millis: u64,

    /// Run writes without a transaction and make `transaction` a pass-through.
    /// For databases that do not support transactions.
    pub disable_transaction: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { max_connections: 5, driver: None, print_sql: true, slow_sql_millis: 0, disable_transaction: false }
    }
}
