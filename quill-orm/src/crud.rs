//! # CRUD Module
//!
//! Record and entity-map writes. All of them need an active transaction on the
//! scope (see `Database::transaction`).
//!
//! ## Generated Keys
//!
//! After an insert flagged autoincrement, the generated key is read back and
//! written into the record: from `RETURNING` on PostgreSQL, from the driver's
//! last insert id elsewhere. When the driver cannot report it, a warning is
//! logged and the insert still succeeds.
//!
//! ```rust,ignore
//! db.transaction(&mut scope, async |scope: &mut Scope| {
//!     let mut user = User { name: "alice".into(), ..Default::default() };
//!     db.insert(scope, &mut user).await?;
//!     assert!(user.id > 0);
//!
//!     user.nickname = None;
//!     db.update_non_null(scope, &user).await?;
//!     Ok(())
//! })
//! .await?;
//! ```

use sqlx::any::AnyQueryResult;

use crate::entity_map::EntityMap;
use crate::mapper::{self, MappedStatement, UpdateMode};
use crate::model::{Entity, ScalarKind};
use crate::scanner::decode_column;
use crate::transaction::Scope;
use crate::{Database, Error, Value};

impl Database {
    // ========================================================================
    // Records
    // ========================================================================

    /// Inserts `record` and returns the affected row count.
    ///
    /// Client-generated and database-generated keys are written into `record`.
    pub async fn insert<T: Entity>(&self, scope: &mut Scope, record: &mut T) -> Result<u64, Error> {
        self.require_transaction(scope)?;
        let descriptor = self.cache.describe::<T>()?;
        let stmt = mapper::build_insert(record, &descriptor, &self.driver, self.hooks.key_generator.as_ref())?;

        let (affected, generated) = self.run_insert(scope, &stmt).await?;
        if let (Some(id), Some(key)) = (generated, stmt.primary_key.as_ref()) {
            if let Err(e) = record.set_field_value(&key.path, id) {
                log::warn!("Could not write generated key into {}: {}", descriptor.type_name, e);
            }
        }
        Ok(affected)
    }

    /// Inserts all `records` with one statement. Generated keys are not read
    /// back; client-generated keys are written into each record.
    pub async fn insert_batch<T: Entity>(&self, scope: &mut Scope, records: &mut [T]) -> Result<u64, Error> {
        self.require_transaction(scope)?;
        if records.is_empty() {
            return Ok(0);
        }
        let descriptor = self.cache.describe::<T>()?;
        let stmt = mapper::build_insert_batch(records, &descriptor, &self.driver, self.hooks.key_generator.as_ref())?;
        let result = self.execute_statement(scope, &stmt.sql, &stmt.values).await?;
        Ok(result.rows_affected())
    }

    /// Updates every non-key column of `record`.
    pub async fn update<T: Entity>(&self, scope: &mut Scope, record: &T) -> Result<u64, Error> {
        self.update_with_mode(scope, record, UpdateMode::Full).await
    }

    /// Updates the non-key columns of `record` whose value is not `None`.
    pub async fn update_non_null<T: Entity>(&self, scope: &mut Scope, record: &T) -> Result<u64, Error> {
        self.update_with_mode(scope, record, UpdateMode::NonNull).await
    }

    async fn update_with_mode<T: Entity>(&self, scope: &mut Scope, record: &T, mode: UpdateMode) -> Result<u64, Error> {
        self.require_transaction(scope)?;
        let descriptor = self.cache.describe::<T>()?;
        let stmt = mapper::build_update(record, &descriptor, &self.driver, mode)?;
        let result = self.execute_statement(scope, &stmt.sql, &stmt.values).await?;
        Ok(result.rows_affected())
    }

    /// Deletes the row with `record`'s key.
    pub async fn delete<T: Entity>(&self, scope: &mut Scope, record: &T) -> Result<u64, Error> {
        self.require_transaction(scope)?;
        let descriptor = self.cache.describe::<T>()?;
        let stmt = mapper::build_delete(record, &descriptor, &self.driver)?;
        let result = self.execute_statement(scope, &stmt.sql, &stmt.values).await?;
        Ok(result.rows_affected())
    }

    // ========================================================================
    // Entity Maps
    // ========================================================================

    /// Inserts a dynamic row. A generated key is stored back into `map`.
    pub async fn insert_map(&self, scope: &mut Scope, map: &mut EntityMap) -> Result<u64, Error> {
        self.require_transaction(scope)?;
        let stmt = mapper::build_insert_map(map, &self.driver, self.hooks.key_generator.as_ref())?;

        let (affected, generated) = self.run_insert(scope, &stmt).await?;
        if let (Some(id), Some(pk)) = (generated, map.primary_key().map(str::to_string)) {
            map.set(pk, id)?;
        }
        Ok(affected)
    }

    /// Updates a dynamic row by its key column.
    pub async fn update_map(&self, scope: &mut Scope, map: &EntityMap) -> Result<u64, Error> {
        self.require_transaction(scope)?;
        let stmt = mapper::build_update_map(map)?;
        let result = self.execute_statement(scope, &stmt.sql, &stmt.values).await?;
        Ok(result.rows_affected())
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    /// Runs an INSERT and reads the generated key when the statement is
    /// flagged autoincrement. Returns the affected rows and the key.
    async fn run_insert(&self, scope: &mut Scope, stmt: &MappedStatement) -> Result<(u64, Option<Value>), Error> {
        let integer_key = stmt.primary_key.as_ref().is_none_or(|key| key.kind == ScalarKind::Integer);

        if stmt.returning {
            let rows = self.fetch_rows(scope, &stmt.sql, &stmt.values).await?;
            let generated = match rows.first() {
                Some(row) => match decode_column(row, 0, &self.scan_context(), false) {
                    Ok(Value::Null) | Err(_) => None,
                    Ok(value) => Some(value),
                },
                None => None,
            };
            if generated.is_none() {
                log::warn!("INSERT into {} returned no generated key", stmt.table);
            }
            return Ok((rows.len() as u64, generated));
        }

        let result: AnyQueryResult = self.execute_statement(scope, &stmt.sql, &stmt.values).await?;
        if !stmt.autoincrement || !integer_key {
            return Ok((result.rows_affected(), None));
        }

        match result.last_insert_id() {
            Some(id) => Ok((result.rows_affected(), Some(Value::Int(id)))),
            None => {
                log::warn!("Driver {:?} did not report a generated key for {}", self.driver, stmt.table);
                Ok((result.rows_affected(), None))
            }
        }
    }
}
