//! # Query Module
//!
//! Read operations driven by a [`Finder`], plus `execute` for arbitrary
//! write statements.
//!
//! ## Receiving Shapes
//!
//! | Operation         | Result                               |
//! |-------------------|--------------------------------------|
//! | `query_one`       | `Option<T>`, more than one row fails |
//! | `query` / `query_into` | `Vec<T>`, optionally paginated  |
//! | `query_map`       | `Option<RowMap>`                     |
//! | `query_map_list`  | `Vec<RowMap>`, optionally paginated  |
//!
//! ## Pagination
//!
//! With a `Page`, the dialect's limit clause is appended and, unless
//! `Finder::select_total_count` is off, the total is counted: with the count
//! finder when one is set, otherwise with a `COUNT(*)` statement derived from
//! the query. On page 1, when fewer rows than `page_size` come back, the row
//! count is the total and no count statement runs.
//!
//! ```rust,ignore
//! let mut finder = Finder::select("t_user");
//! finder.append("WHERE age > ? ORDER BY id", values![18]);
//!
//! let mut page = Page::new(2, 20);
//! let users: Vec<User> = db.query(&mut scope, &mut finder, Some(&mut page)).await?;
//! ```

use sqlx::any::AnyRow;

use crate::scanner::{self, FromRecordRow, RowMap, ScanContext};
use crate::transaction::Scope;
use crate::{Database, Error, Finder, FromValue, Page, Value};

impl Database {
    pub(crate) fn scan_context(&self) -> ScanContext<'_> {
        ScanContext { cache: &self.cache, hooks: &self.hooks }
    }

    /// Queries at most one row.
    ///
    /// # Returns
    ///
    /// * `Ok(None)` - no row matched
    /// * `Ok(Some(T))` - exactly one row matched
    /// * `Err(Error::Scan(_))` - more than one row matched
    pub async fn query_one<T: FromRecordRow>(&self, scope: &mut Scope, finder: &mut Finder) -> Result<Option<T>, Error> {
        self.check_scope(scope)?;
        let (sql, values) = finder.finalize()?;
        let rows = self.fetch_rows(scope, &sql, &values).await?;

        match rows.as_slice() {
            [] => Ok(None),
            [row] => T::from_record_row(row, &self.scan_context()).map(Some),
            _ => Err(Error::Scan(format!("expected at most one row, query returned {}", rows.len()))),
        }
    }

    /// Appends every row to `out`.
    ///
    /// Rows scanned before a failing row stay in `out`.
    pub async fn query_into<T: FromRecordRow>(
        &self,
        scope: &mut Scope,
        finder: &mut Finder,
        out: &mut Vec<T>,
        page: Option<&mut Page>,
    ) -> Result<(), Error> {
        self.check_scope(scope)?;
        let rows = self.fetch_page(scope, finder, page).await?;
        let ctx = self.scan_context();

        out.reserve(rows.len());
        for row in &rows {
            out.push(T::from_record_row(row, &ctx)?);
        }
        Ok(())
    }

    /// Collects every row.
    pub async fn query<T: FromRecordRow>(
        &self,
        scope: &mut Scope,
        finder: &mut Finder,
        page: Option<&mut Page>,
    ) -> Result<Vec<T>, Error> {
        let mut out = Vec::new();
        self.query_into(scope, finder, &mut out, page).await?;
        Ok(out)
    }

    /// Queries at most one row as a column map.
    pub async fn query_map(&self, scope: &mut Scope, finder: &mut Finder) -> Result<Option<RowMap>, Error> {
        self.check_scope(scope)?;
        let (sql, values) = finder.finalize()?;
        let rows = self.fetch_rows(scope, &sql, &values).await?;

        match rows.as_slice() {
            [] => Ok(None),
            [row] => scanner::scan_map(row, &self.scan_context()).map(Some),
            _ => Err(Error::Scan(format!("expected at most one row, query returned {}", rows.len()))),
        }
    }

    /// Collects every row as a column map.
    pub async fn query_map_list(
        &self,
        scope: &mut Scope,
        finder: &mut Finder,
        page: Option<&mut Page>,
    ) -> Result<Vec<RowMap>, Error> {
        self.check_scope(scope)?;
        let rows = self.fetch_page(scope, finder, page).await?;
        let ctx = self.scan_context();
        rows.iter().map(|row| scanner::scan_map(row, &ctx)).collect()
    }

    /// Runs a write statement and returns the affected row count.
    ///
    /// Requires an active transaction.
    pub async fn execute(&self, scope: &mut Scope, finder: &mut Finder) -> Result<u64, Error> {
        self.require_transaction(scope)?;
        let (sql, values) = finder.finalize()?;
        let result = self.execute_statement(scope, &sql, &values).await?;
        Ok(result.rows_affected())
    }

    // ========================================================================
    // Pagination
    // ========================================================================

    async fn fetch_page(&self, scope: &mut Scope, finder: &mut Finder, page: Option<&mut Page>) -> Result<Vec<AnyRow>, Error> {
        let (sql, values) = finder.finalize()?;
        let Some(page) = page else {
            return self.fetch_rows(scope, &sql, &values).await;
        };

        let paged_sql = self.driver.paginate(&sql, page)?;
        let rows = self.fetch_rows(scope, &paged_sql, &values).await?;

        if finder.select_total_count {
            let returned = rows.len() as u64;
            let total = if page.page_no <= 1 && returned < page.page_size {
                returned
            } else {
                self.count_rows(scope, finder, &sql, &values).await?
            };
            page.set_total_count(total);
        }
        Ok(rows)
    }

    async fn count_rows(&self, scope: &mut Scope, finder: &mut Finder, sql: &str, values: &[Value]) -> Result<u64, Error> {
        let (count_sql, count_values) = match finder.count_finder_mut() {
            Some(count_finder) => count_finder.finalize()?,
            None => (self.driver.build_count_query(sql)?, values.to_vec()),
        };

        let rows = self.fetch_rows(scope, &count_sql, &count_values).await?;
        let Some(row) = rows.first() else {
            return Ok(0);
        };
        let count = scanner::decode_column(row, 0, &self.scan_context(), true)?;
        u64::from_value(count)
    }
}
