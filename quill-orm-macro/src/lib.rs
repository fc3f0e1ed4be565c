//! # Quill ORM Procedural Macros
//!
//! This crate provides the derive macros for Quill ORM. It is not meant to be
//! used directly; `quill-orm` re-exports both macros.
//!
//! ## Architecture
//!
//! - **`lib.rs`** (this file): Entry points
//! - **`derive_record.rs`**: `#[derive(Record)]`
//! - **`derive_entity.rs`**: `#[derive(Entity)]`, built on the Record expansion
//! - **`types.rs`**: Rust → SQL type mapping
//!
//! ## Supported Attributes
//!
//! ### Table Name (struct level, `Entity` only)
//! ```rust,ignore
//! #[derive(Entity, Default)]
//! #[orm(table = "t_user")]
//! pub struct User { /* ... */ }
//! ```
//! Without it the struct name in snake_case is used.
//!
//! ### Column
//! ```rust,ignore
//! #[orm(column)]
//! pub name: String,
//!
//! #[orm(column = "user_name")]
//! pub name: String,
//! ```
//! Only tagged `pub` fields are mapped to columns. Untagged and private fields
//! are described but never read from or written to the database.
//!
//! ### Primary Key
//! ```rust,ignore
//! #[orm(column, primary_key)]
//! pub id: i64,
//! ```
//! An unassigned integer key (`0`) is generated by the database; an empty
//! string key is generated on the client.
//!
//! ### Sequence / Trigger Keys
//! ```rust,ignore
//! #[orm(column, primary_key, sequence = "nextval('user_seq')")]
//! pub id: i64,
//!
//! #[orm(column, primary_key, trigger)]
//! pub id: i64,
//! ```
//! A sequence expression is written literally into the INSERT. A trigger key
//! is omitted from the INSERT and left to the database.
//!
//! ### Embedded Records
//! ```rust,ignore
//! #[orm(flatten)]
//! pub audit: Audit,
//! ```
//! The field type must derive `Record`. Its columns are mapped as if declared
//! on the outer struct; on a name clash the outer field wins.

#![warn(missing_docs)]

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod derive_entity;
mod derive_record;
mod types;

/// Derives `Record` and `FromRecordRow` for a struct.
///
/// Use it for embedded groups and for row shapes that are only ever read
/// (joins, projections). The struct must implement `Default`.
///
/// # Example
///
/// ```rust,ignore
/// use quill_orm::Record;
///
/// #[derive(Record, Default)]
/// pub struct UserSummary {
///     #[orm(column)]
///     pub name: String,
///     #[orm(column = "order_count")]
///     pub orders: i64,
/// }
///
/// let mut finder = Finder::new();
/// finder.append("SELECT u.name, COUNT(*) AS order_count FROM t_user u JOIN t_order o ON o.user_id = u.id GROUP BY u.name", values![]);
/// let rows: Vec<UserSummary> = db.query(&mut scope, &mut finder, None).await?;
/// ```
///
/// # Panics
///
/// At compile time if the input is not a struct with named fields or an
/// `#[orm(...)]` attribute is malformed.
#[proc_macro_derive(Record, attributes(orm))]
pub fn record_derive(input: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(input as DeriveInput);
    TokenStream::from(derive_record::expand(&ast))
}

/// Derives `Record`, `FromRecordRow` and `Entity` for a struct mapped to a
/// table.
///
/// # Example
///
/// ```rust,ignore
/// use quill_orm::Entity;
///
/// #[derive(Entity, Default, Debug)]
/// #[orm(table = "t_user")]
/// pub struct User {
///     #[orm(column, primary_key)]
///     pub id: i64,
///     #[orm(column)]
///     pub name: String,
///     #[orm(column)]
///     pub nickname: Option<String>,
/// }
/// ```
#[proc_macro_derive(Entity, attributes(orm))]
pub fn entity_derive(input: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(input as DeriveInput);
    TokenStream::from(derive_entity::expand(&ast))
}
