//! # Executor Module
//!
//! The single path every statement takes to the driver:
//!
//! 1. neutral placeholders are rebound for the dialect;
//! 2. the `SqlRewriter` hook, if any, rewrites the final text;
//! 3. values are bound;
//! 4. the statement runs on the scope's transaction, or on the pool when the
//!    scope has none, under the scope's deadline;
//! 5. the `SqlLogger` hook receives text, values and timing.
//!
//! A failed statement inside a transaction rolls the transaction back before
//! the error is returned.

use std::future::Future;
use std::time::Instant;

use sqlx::Any;
use sqlx::any::{AnyQueryResult, AnyRow};

use crate::transaction::Scope;
use crate::value_binding::build_arguments;
use crate::{Database, Error, Value};

/// Awaits `fut` under an optional deadline and attaches the SQL to failures.
async fn run_with_deadline<T, F>(deadline: Option<tokio::time::Instant>, sql: &str, fut: F) -> Result<T, Error>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    let result = match deadline {
        Some(deadline) => match tokio::time::timeout_at(deadline, fut).await {
            Ok(result) => result,
            Err(_) => return Err(Error::Timeout(sql.to_string())),
        },
        None => fut.await,
    };
    result.map_err(|e| Error::execution(sql, e))
}

impl Database {
    /// Validates that `scope` may be used with this database.
    pub(crate) fn check_scope(&self, scope: &mut Scope) -> Result<(), Error> {
        scope.bind(self.id)?;
        if scope.is_aborted() {
            return Err(Error::propagation("transaction was rolled back by a failed statement"));
        }
        Ok(())
    }

    /// Writes need an active transaction unless transactions are disabled.
    pub(crate) fn require_transaction(&self, scope: &mut Scope) -> Result<(), Error> {
        self.check_scope(scope)?;
        if self.config.disable_transaction || scope.in_transaction() {
            return Ok(());
        }
        Err(Error::propagation("write operations must run inside Database::transaction"))
    }

    fn prepare_sql(&self, sql: &str) -> Result<String, Error> {
        let rebound = self.driver.rebind(sql);
        match &self.hooks.rewriter {
            Some(rewriter) => rewriter.rewrite(rebound, self.driver),
            None => Ok(rebound),
        }
    }

    /// Runs a query and returns all rows.
    pub(crate) async fn fetch_rows(&self, scope: &mut Scope, sql: &str, values: &[Value]) -> Result<Vec<AnyRow>, Error> {
        let sql = self.prepare_sql(sql)?;
        let args = build_arguments(values, &self.driver)?;
        let deadline = scope.deadline();
        let started = Instant::now();

        let result = match scope.tx.as_mut() {
            Some(tx) => {
                run_with_deadline(deadline, &sql, sqlx::query_with::<Any, _>(&sql, args).fetch_all(&mut **tx)).await
            }
            None => run_with_deadline(deadline, &sql, sqlx::query_with::<Any, _>(&sql, args).fetch_all(&self.pool)).await,
        };

        self.finish(scope, &sql, values, started, result).await
    }

    /// Runs a statement and returns the driver's result summary.
    pub(crate) async fn execute_statement(
        &self,
        scope: &mut Scope,
        sql: &str,
        values: &[Value],
    ) -> Result<AnyQueryResult, Error> {
        let sql = self.prepare_sql(sql)?;
        let args = build_arguments(values, &self.driver)?;
        let deadline = scope.deadline();
        let started = Instant::now();

        let result = match scope.tx.as_mut() {
            Some(tx) => run_with_deadline(deadline, &sql, sqlx::query_with::<Any, _>(&sql, args).execute(&mut **tx)).await,
            None => run_with_deadline(deadline, &sql, sqlx::query_with::<Any, _>(&sql, args).execute(&self.pool)).await,
        };

        self.finish(scope, &sql, values, started, result).await
    }

    async fn finish<T>(
        &self,
        scope: &mut Scope,
        sql: &str,
        values: &[Value],
        started: Instant,
        result: Result<T, Error>,
    ) -> Result<T, Error> {
        let elapsed = started.elapsed();
        match result {
            Ok(value) => {
                self.hooks.logger.log(sql, values, elapsed, None);
                Ok(value)
            }
            Err(e) => {
                self.hooks.logger.log(sql, values, elapsed, Some(&e));
                if scope.in_transaction() {
                    if let Err(rollback_err) = scope.rollback_local().await {
                        log::error!("Rollback after failed statement failed: {}", rollback_err);
                    }
                }
                Err(e)
            }
        }
    }
}
