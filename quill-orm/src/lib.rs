//! # Quill ORM
//!
//! A relational data-access layer that maps typed records to SQL and back,
//! with transactional scope threaded explicitly through every call.
//!
//! - [`Finder`] builds parameterized SQL with the neutral `?` placeholder and
//!   expands list parameters for `IN (?)` clauses.
//! - [`Drivers`] rewrites placeholders, pagination and count queries per dialect.
//! - `#[derive(Entity)]` / `#[derive(Record)]` describe records; the metadata
//!   cache reflects each type once.
//! - [`Database::transaction`] opens, joins or closes a transaction on a
//!   [`Scope`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use quill_orm::{values, Database, Entity, Finder, Page, Scope};
//!
//! #[derive(Entity, Default, Debug)]
//! #[orm(table = "t_user")]
//! pub struct User {
//!     #[orm(column, primary_key)]
//!     pub id: i64,
//!     #[orm(column)]
//!     pub name: String,
//! }
//!
//! let db = Database::connect("sqlite::memory:").await?;
//! let mut scope = Scope::new();
//!
//! db.transaction(&mut scope, async |scope: &mut Scope| {
//!     let mut user = User { name: "alice".into(), ..Default::default() };
//!     db.insert(scope, &mut user).await?;
//!     Ok(())
//! })
//! .await?;
//!
//! let mut finder = Finder::select("t_user");
//! finder.append("WHERE name IN (?)", values![vec!["alice", "bob"]]);
//! let users: Vec<User> = db.query(&mut scope, &mut finder, Some(&mut Page::default())).await?;
//! ```

extern crate self as quill_orm;

pub use quill_orm_macro::{Entity, Record};

pub mod config;
pub mod crud;
pub mod database;
pub mod dialect;
pub mod entity_map;
pub mod errors;
pub mod executor;
pub mod finder;
pub mod hooks;
pub mod mapper;
pub mod metadata;
pub mod model;
pub mod pagination;
pub mod query;
pub mod scanner;
pub mod temporal;
pub mod transaction;
pub mod value;
pub mod value_binding;

pub use config::DatabaseConfig;
pub use database::{Database, DatabaseBuilder};
pub use dialect::Drivers;
pub use entity_map::EntityMap;
pub use errors::Error;
pub use finder::Finder;
pub use hooks::{GlobalTransaction, GlobalTransactionManager, KeyGenerator, SqlLogger, SqlRewriter, ValueConverter};
pub use mapper::{KeyStrategy, UpdateMode};
pub use metadata::{FieldDescriptor, MetadataCache, RecordDescriptor};
pub use model::{Entity, FieldInfo, FieldKind, Record, ScalarKind};
pub use pagination::Page;
pub use scanner::{FromRecordRow, RowMap};
pub use transaction::{Scope, TxState};
pub use value::{FromValue, ToValue, Value};

/// Items the derive macros refer to.
#[doc(hidden)]
pub mod __private {
    pub use crate::model::unknown_field;
    pub use crate::scanner::{ScanContext, scan_record};
    pub use sqlx::any::AnyRow;
}
