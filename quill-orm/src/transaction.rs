//! # Transaction Module
//!
//! This module provides `Scope`, the explicit unit-of-work handle threaded
//! through every `Database` call, and `Database::transaction`, which decides
//! per call whether to open, join or close a transaction.
//!
//! ## Propagation
//!
//! - A `Scope` with no active transaction: `transaction` begins one and the
//!   call becomes the **opener**.
//! - A `Scope` with an active transaction: the call joins it.
//! - Body error: the transaction is rolled back whoever observes it, and the
//!   error is returned wrapped in `Error::Transaction`.
//! - Body panic: rolled back, logged, and the panic is resumed.
//! - Body cancelled (the future is dropped): the local transaction is dropped,
//!   which makes the driver roll it back, and the scope is reset.
//! - Body success: only the opener commits.
//!
//! Reads on a scope without a transaction use the pool directly. Writes need
//! an active transaction.
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use quill_orm::{Database, Scope};
//!
//! let mut scope = Scope::new().with_timeout(Duration::from_secs(5));
//!
//! db.transaction(&mut scope, async |scope: &mut Scope| {
//!     db.insert(scope, &mut user).await?;
//!     db.insert(scope, &mut post).await?;
//!     Ok(())
//! })
//! .await?;
//! ```

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use sqlx::{Any, Transaction};
use tokio::time::Instant;

use crate::hooks::GlobalTransaction;
use crate::{Database, Error};

// ============================================================================
// Scope
// ============================================================================

/// Where a scope is in the transaction lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    NoTransaction,
    Active,
    Committed,
    RolledBack,
}

/// The transaction scope of one logical unit of work.
///
/// A scope is bound to the first `Database` it is used with and must not be
/// shared between concurrent tasks (every call borrows it mutably).
pub struct Scope {
    source_id: Option<u64>,
    pub(crate) tx: Option<Transaction<'static, Any>>,
    pub(crate) global: Option<Box<dyn GlobalTransaction>>,
    state: TxState,
    /// Nesting depth of `Database::transaction` bodies currently running.
    depth: usize,
    deadline: Option<Instant>,
    global_enabled: bool,
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl Scope {
    pub fn new() -> Self {
        Self {
            source_id: None,
            tx: None,
            global: None,
            state: TxState::NoTransaction,
            depth: 0,
            deadline: None,
            global_enabled: false,
        }
    }

    /// Every statement run through this scope fails with `Error::Timeout` once
    /// `deadline` has passed.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Deadline `timeout` from now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Wraps transactions opened through this scope in a global transaction,
    /// when the `Database` has a `GlobalTransactionManager`.
    pub fn enable_global_transaction(mut self) -> Self {
        self.global_enabled = true;
        self
    }

    pub fn state(&self) -> TxState {
        self.state
    }

    pub fn in_transaction(&self) -> bool {
        self.tx.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Id of the running global transaction, if any.
    pub fn global_transaction_id(&self) -> Option<String> {
        self.global.as_ref().map(|global| global.id())
    }

    /// Inside a transaction body whose transaction was already rolled back.
    pub(crate) fn is_aborted(&self) -> bool {
        self.depth > 0 && self.state == TxState::RolledBack
    }

    /// Binds the scope to `source_id` on first use.
    pub(crate) fn bind(&mut self, source_id: u64) -> Result<(), Error> {
        match self.source_id {
            None => {
                self.source_id = Some(source_id);
                Ok(())
            }
            Some(bound) if bound == source_id => Ok(()),
            Some(_) => Err(Error::propagation("scope is bound to a different Database")),
        }
    }

    /// Rolls back the local transaction, if one is open.
    pub(crate) async fn rollback_local(&mut self) -> Result<(), Error> {
        let tx = self.tx.take();
        self.state = TxState::RolledBack;
        if let Some(tx) = tx {
            within_deadline(self.deadline, "ROLLBACK", tx.rollback()).await??;
        }
        Ok(())
    }

    /// Synchronous cleanup for a body whose future was dropped.
    fn abandon(&mut self) {
        if let Some(tx) = self.tx.take() {
            log::warn!("Transaction body was cancelled, rolling back");
            // sqlx queues the rollback on drop and flushes it before the
            // connection is reused
            drop(tx);
            self.state = TxState::RolledBack;
        }
        if self.depth == 0 {
            self.abandon_global();
        }
    }

    fn abandon_global(&mut self) {
        let Some(mut global) = self.global.take() else {
            return;
        };
        let id = global.id();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = global.rollback().await {
                        log::error!("Global transaction {} rollback failed: {}", id, e);
                    }
                });
            }
            Err(_) => log::error!("Global transaction {} abandoned without a runtime to roll it back", id),
        }
    }

    async fn rollback_global(&mut self) {
        if let Some(mut global) = self.global.take() {
            let id = global.id();
            if let Err(e) = global.rollback().await {
                log::error!("Global transaction {} rollback failed: {}", id, e);
            }
        }
    }

    async fn rollback_all(&mut self) {
        if let Err(e) = self.rollback_local().await {
            log::error!("Transaction rollback failed: {}", e);
        }
        self.rollback_global().await;
    }
}

/// Keeps `Scope::depth` balanced around a transaction body and cleans up
/// when the body future is dropped before completing.
struct BodyGuard<'a> {
    scope: &'a mut Scope,
    completed: bool,
}

impl<'a> BodyGuard<'a> {
    fn enter(scope: &'a mut Scope) -> Self {
        scope.depth += 1;
        Self { scope, completed: false }
    }
}

impl Drop for BodyGuard<'_> {
    fn drop(&mut self) {
        self.scope.depth -= 1;
        if !self.completed {
            self.scope.abandon();
        }
    }
}

/// Awaits a driver call under an optional deadline.
async fn within_deadline<T, F>(deadline: Option<Instant>, stage: &str, fut: F) -> Result<Result<T, sqlx::Error>, Error>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline, fut).await.map_err(|_| Error::Timeout(stage.to_string())),
        None => Ok(fut.await),
    }
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("source_id", &self.source_id)
            .field("state", &self.state)
            .field("in_transaction", &self.tx.is_some())
            .field("global", &self.global_transaction_id())
            .field("deadline", &self.deadline)
            .finish()
    }
}

// ============================================================================
// Transaction Propagation
// ============================================================================

impl Database {
    /// Runs `body` inside a transaction on `scope`.
    ///
    /// # Returns
    ///
    /// * `Ok(T)` - the body's value; the transaction was committed if this
    ///   call opened it
    /// * `Err(Error::Transaction { opener, source })` - the body failed and
    ///   the transaction was rolled back
    /// * `Err(Error::Propagation(_))` - a statement inside the body failed
    ///   (rolling the transaction back) but the body still returned `Ok`
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let id = db
    ///     .transaction(&mut scope, async |scope: &mut Scope| {
    ///         db.insert(scope, &mut user).await?;
    ///         Ok(user.id)
    ///     })
    ///     .await?;
    /// ```
    pub async fn transaction<T, F>(&self, scope: &mut Scope, body: F) -> Result<T, Error>
    where
        F: AsyncFnOnce(&mut Scope) -> Result<T, Error>,
    {
        scope.bind(self.id)?;

        if self.config.disable_transaction {
            return body(scope).await;
        }

        if scope.is_aborted() {
            return Err(Error::propagation("enclosing transaction was already rolled back"));
        }

        let opener = scope.tx.is_none();
        if opener {
            self.begin(scope).await?;
        }

        let mut guard = BodyGuard::enter(scope);
        let outcome = AssertUnwindSafe(body(&mut *guard.scope)).catch_unwind().await;
        guard.completed = true;
        drop(guard);

        match outcome {
            Err(panic) => {
                log::error!("Panic inside transaction body, rolling back (opener: {})", opener);
                scope.rollback_all().await;
                std::panic::resume_unwind(panic)
            }
            Ok(Err(e)) => {
                if opener {
                    scope.rollback_all().await;
                } else if let Err(rollback_err) = scope.rollback_local().await {
                    log::error!("Transaction rollback failed: {}", rollback_err);
                }
                Err(Error::Transaction { opener, source: Box::new(e) })
            }
            Ok(Ok(value)) => {
                if opener {
                    self.commit(scope).await?;
                }
                Ok(value)
            }
        }
    }

    async fn begin(&self, scope: &mut Scope) -> Result<(), Error> {
        // Left behind by a commit that was cancelled
        scope.abandon_global();

        if scope.global_enabled {
            if let Some(manager) = &self.hooks.global_transactions {
                let global = manager.begin().await?;
                log::debug!("Global transaction {} started", global.id());
                scope.global = Some(global);
            }
        }

        let tx = match within_deadline(scope.deadline, "BEGIN", self.pool.begin()).await {
            Ok(tx) => tx,
            Err(e) => {
                scope.rollback_global().await;
                return Err(e);
            }
        };

        match tx {
            Ok(tx) => {
                scope.tx = Some(tx);
                scope.state = TxState::Active;
                Ok(())
            }
            Err(e) => {
                scope.rollback_global().await;
                Err(Error::DatabaseError(e))
            }
        }
    }

    async fn commit(&self, scope: &mut Scope) -> Result<(), Error> {
        let Some(tx) = scope.tx.take() else {
            scope.rollback_global().await;
            return Err(Error::propagation("transaction was rolled back by a failed statement and cannot be committed"));
        };

        let committed = match within_deadline(scope.deadline, "COMMIT", tx.commit()).await {
            Ok(result) => result.map_err(Error::DatabaseError),
            Err(timeout) => Err(timeout),
        };
        if let Err(e) = committed {
            scope.state = TxState::RolledBack;
            scope.rollback_global().await;
            return Err(e);
        }
        scope.state = TxState::Committed;

        if let Some(mut global) = scope.global.take() {
            global.commit().await?;
            log::debug!("Global transaction {} committed", global.id());
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_scope_state() {
        let scope = Scope::new();
        assert_eq!(scope.state(), TxState::NoTransaction);
        assert!(!scope.in_transaction());
        assert!(scope.global_transaction_id().is_none());
    }

    #[test]
    fn test_scope_binds_to_first_source() {
        let mut scope = Scope::new();
        scope.bind(1).unwrap();
        scope.bind(1).unwrap();
        assert!(matches!(scope.bind(2), Err(Error::Propagation(_))));
    }

    #[tokio::test]
    async fn test_deadline_bounds_driver_calls() {
        let stalled = within_deadline(Some(Instant::now()), "COMMIT", std::future::pending::<Result<(), sqlx::Error>>());
        assert!(matches!(stalled.await, Err(Error::Timeout(stage)) if stage == "COMMIT"));

        let done = within_deadline(None, "ROLLBACK", async { Ok::<_, sqlx::Error>(7) }).await;
        assert!(matches!(done, Ok(Ok(7))));
    }

    #[test]
    fn test_dropped_body_guard_resets_scope() {
        let mut scope = Scope::new();
        scope.state = TxState::Active;
        {
            let guard = BodyGuard::enter(&mut scope);
            assert_eq!(guard.scope.depth, 1);
        }
        assert_eq!(scope.depth, 0);
        assert_eq!(scope.state(), TxState::Active);
        assert!(!scope.is_aborted());

        let mut guard = BodyGuard::enter(&mut scope);
        guard.completed = true;
        drop(guard);
        assert_eq!(scope.depth, 0);
    }

    #[tokio::test]
    async fn test_with_timeout_sets_deadline() {
        let scope = Scope::new().with_timeout(Duration::from_secs(1));
        assert!(scope.deadline().is_some_and(|d| d > Instant::now()));
    }
}
