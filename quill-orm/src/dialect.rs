//! # Dialect Module
//!
//! Everything that depends on the target database's SQL variant lives here:
//! placeholder style, pagination clause, and count-query shape.
//!
//! Statements are built with the neutral `?` placeholder (see
//! [`Finder`](crate::Finder)); [`Drivers::rebind`] is the only place that
//! turns them into the driver's native form, so one `Finder` can target any
//! dialect.
//!
//! ## Keyword Detection
//!
//! `ORDER BY`, `FROM`, `DISTINCT`, `UNION` and `GROUP BY` are located with a
//! small case-insensitive lexical scan that skips quoted text and tracks
//! parenthesis depth. It does not parse SQL.

use serde::{Deserialize, Serialize};

use crate::{Error, pagination::Page};

/// The neutral placeholder emitted by every builder in this crate.
pub const PLACEHOLDER: char = '?';

/// Alias given to the wrapped statement in a subquery count.
const COUNT_ALIAS: &str = "quill_count_source";

// ============================================================================
// Drivers
// ============================================================================

/// Supported database dialects.
///
/// PostgreSQL, MySQL and SQLite are executed through `sqlx::Any`. MSSQL and
/// Oracle are supported by the translator for statement generation; executing
/// them requires a pool whose driver speaks those protocols.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Drivers {
    /// PostgreSQL driver. `$1, $2, ...`
    Postgres,
    /// SQLite driver. `?`
    SQLite,
    /// MySQL driver. `?`
    MySQL,
    /// Microsoft SQL Server. `@p1, @p2, ...`
    MSSQL,
    /// Oracle. `:1, :2, ...`
    Oracle,
}

impl Drivers {
    /// Identifies the dialect from a connection URL scheme.
    ///
    /// Unknown schemes fall back to SQLite.
    pub fn from_url(url: &str) -> Self {
        let (scheme, _) = url.split_once(':').unwrap_or(("sqlite", ""));
        match scheme {
            "postgresql" | "postgres" => Drivers::Postgres,
            "mysql" | "mariadb" => Drivers::MySQL,
            "mssql" | "sqlserver" => Drivers::MSSQL,
            "oracle" => Drivers::Oracle,
            _ => Drivers::SQLite,
        }
    }

    /// Whether `INSERT ... RETURNING` can be used to read back generated keys.
    pub fn supports_returning(&self) -> bool {
        matches!(self, Drivers::Postgres)
    }

    // ========================================================================
    // Placeholders
    // ========================================================================

    /// Rewrites every neutral `?` outside quoted text into the dialect's
    /// native placeholder.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// assert_eq!(Drivers::Postgres.rebind("a = ? AND b = ?"), "a = $1 AND b = $2");
    /// assert_eq!(Drivers::MySQL.rebind("a = ?"), "a = ?");
    /// ```
    pub fn rebind(&self, sql: &str) -> String {
        if matches!(self, Drivers::MySQL | Drivers::SQLite) {
            return sql.to_string();
        }

        let mut out = String::with_capacity(sql.len() + 16);
        let mut index = 0usize;
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
                    index += 1;
                    match self {
                        Drivers::Postgres => out.push_str(&format!("${}", index)),
                        Drivers::MSSQL => out.push_str(&format!("@p{}", index)),
                        Drivers::Oracle => out.push_str(&format!(":{}", index)),
                        Drivers::MySQL | Drivers::SQLite => out.push(PLACEHOLDER),
                    }
                }
                _ => out.push(ch),
            }
        }

        out
    }

    // ========================================================================
    // Pagination
    // ========================================================================

    /// Appends the dialect's limit/offset clause for `page`.
    ///
    /// # Clause Shapes
    ///
    /// - PostgreSQL / SQLite: `LIMIT {size} OFFSET {offset}`
    /// - MySQL: `LIMIT {offset},{size}`
    /// - MSSQL / Oracle: `OFFSET {offset} ROWS FETCH NEXT {size} ROWS ONLY`
    ///
    /// MSSQL only accepts `OFFSET ... FETCH` after an `ORDER BY`, so a
    /// statement without one is rejected.
    pub fn paginate(&self, sql: &str, page: &Page) -> Result<String, Error> {
        if page.page_size == 0 {
            return Err(Error::invalid_argument("page_size must be greater than zero"));
        }
        let size = page.page_size;
        let offset = page.offset();

        let clause = match self {
            Drivers::Postgres | Drivers::SQLite => format!(" LIMIT {} OFFSET {}", size, offset),
            Drivers::MySQL => format!(" LIMIT {},{}", offset, size),
            Drivers::MSSQL | Drivers::Oracle => {
                if *self == Drivers::MSSQL && find_order_by(sql).is_none() {
                    return Err(Error::MalformedStatement(
                        "SQL Server pagination requires an ORDER BY clause".to_string(),
                    ));
                }
                format!(" OFFSET {} ROWS FETCH NEXT {} ROWS ONLY", offset, size)
            }
        };

        let mut out = sql.trim_end().to_string();
        out.push_str(&clause);
        Ok(out)
    }

    // ========================================================================
    // Count Queries
    // ========================================================================

    /// Rewrites a SELECT into a statement returning its row count.
    ///
    /// A top-level `ORDER BY` is cut off first. Statements using `DISTINCT`,
    /// `UNION` or `GROUP BY` are wrapped as a subquery; anything else has its
    /// select list replaced by `COUNT(*)`.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let sql = Drivers::MySQL.build_count_query("SELECT a,b FROM t WHERE x=? ORDER BY a")?;
    /// assert_eq!(sql, "SELECT COUNT(*) FROM t WHERE x=?");
    /// ```
    pub fn build_count_query(&self, sql: &str) -> Result<String, Error> {
        let stripped = match find_order_by(sql) {
            Some(index) => &sql[..index],
            None => sql,
        }
        .trim();

        let tokens = scan_words(stripped);
        let needs_wrap = tokens.iter().enumerate().any(|(i, t)| {
            t.word == "DISTINCT"
                || t.word == "UNION"
                || (t.word == "GROUP" && tokens.get(i + 1).is_some_and(|n| n.word == "BY"))
        });

        if needs_wrap {
            return Ok(format!("SELECT COUNT(*) FROM ({}) {}", stripped, COUNT_ALIAS));
        }

        let from = tokens
            .iter()
            .find(|t| t.depth == 0 && t.word == "FROM")
            .ok_or_else(|| Error::MalformedStatement(format!("no FROM keyword in: {}", stripped)))?;

        Ok(format!("SELECT COUNT(*) {}", &stripped[from.start..]))
    }
}

// ============================================================================
// Lexical Scan
// ============================================================================

/// One identifier-like word of a SQL statement.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Word {
    /// Upper-cased text.
    pub word: String,
    /// Byte offset of the first character.
    pub start: usize,
    /// Parenthesis depth at the word.
    pub depth: usize,
}

/// Collects the words of `sql` that are outside quoted text.
pub(crate) fn scan_words(sql: &str) -> Vec<Word> {
    let mut words = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut current: Option<usize> = None;

    let flush = |words: &mut Vec<Word>, start: Option<usize>, end: usize, depth: usize| {
        if let Some(start) = start {
            words.push(Word { word: sql[start..end].to_ascii_uppercase(), start, depth });
        }
    };

    for (i, ch) in sql.char_indices() {
        if let Some(q) = quote {
            if ch == q {
                quote = None;
            }
            continue;
        }
        if ch.is_ascii_alphanumeric() || ch == '_' || ch == '$' {
            if current.is_none() {
                current = Some(i);
            }
            continue;
        }
        flush(&mut words, current.take(), i, depth);
        match ch {
            '\'' | '"' | '`' => quote = Some(ch),
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    flush(&mut words, current.take(), sql.len(), depth);

    words
}

/// Byte offset of the last top-level `ORDER BY`, if any.
pub(crate) fn find_order_by(sql: &str) -> Option<usize> {
    let words = scan_words(sql);
    words
        .windows(2)
        .filter(|pair| pair[0].depth == 0 && pair[0].word == "ORDER" && pair[1].word == "BY")
        .map(|pair| pair[0].start)
        .last()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_url() {
        assert_eq!(Drivers::from_url("postgres://u@h/db"), Drivers::Postgres);
        assert_eq!(Drivers::from_url("mysql://u@h/db"), Drivers::MySQL);
        assert_eq!(Drivers::from_url("sqlite::memory:"), Drivers::SQLite);
        assert_eq!(Drivers::from_url("sqlserver://h"), Drivers::MSSQL);
    }

    #[test]
    fn test_rebind_numbered_dialects() {
        let sql = "SELECT * FROM t WHERE a = ? AND b IN (?,?)";
        assert_eq!(Drivers::Postgres.rebind(sql), "SELECT * FROM t WHERE a = $1 AND b IN ($2,$3)");
        assert_eq!(Drivers::MSSQL.rebind(sql), "SELECT * FROM t WHERE a = @p1 AND b IN (@p2,@p3)");
        assert_eq!(Drivers::Oracle.rebind(sql), "SELECT * FROM t WHERE a = :1 AND b IN (:2,:3)");
        assert_eq!(Drivers::MySQL.rebind(sql), sql);
    }

    #[test]
    fn test_rebind_skips_quoted_text() {
        let sql = "SELECT '?' AS q, a FROM t WHERE b = ?";
        assert_eq!(Drivers::Postgres.rebind(sql), "SELECT '?' AS q, a FROM t WHERE b = $1");
    }

    #[test]
    fn test_count_query_strips_order_by() {
        let sql = Drivers::MySQL.build_count_query("SELECT a,b FROM t WHERE x=? ORDER BY a").unwrap();
        assert_eq!(sql, "SELECT COUNT(*) FROM t WHERE x=?");
        assert!(!sql.to_uppercase().contains("ORDER BY"));
    }

    #[test]
    fn test_count_query_is_case_insensitive() {
        let sql = Drivers::Postgres.build_count_query("select a from t where b = ? order by a desc").unwrap();
        assert_eq!(sql, "SELECT COUNT(*) from t where b = ?");
    }

    #[test]
    fn test_count_query_wraps_distinct_union_group_by() {
        for sql in [
            "SELECT DISTINCT a FROM t",
            "SELECT a FROM t UNION SELECT a FROM u",
            "SELECT a, COUNT(*) FROM t GROUP BY a ORDER BY a",
        ] {
            let count = Drivers::MySQL.build_count_query(sql).unwrap();
            assert!(count.starts_with("SELECT COUNT(*) FROM ("), "{}", count);
            assert!(count.ends_with(COUNT_ALIAS));
            assert!(!count.contains("ORDER BY"));
        }
    }

    #[test]
    fn test_count_query_ignores_nested_from_and_order_by() {
        let sql = "SELECT (SELECT max(x) FROM u ORDER BY x) AS m, a FROM t ORDER BY a";
        let count = Drivers::MySQL.build_count_query(sql).unwrap();
        assert_eq!(count, "SELECT COUNT(*) FROM t");
    }

    #[test]
    fn test_count_query_keyword_inside_identifier_is_not_a_keyword() {
        let count = Drivers::MySQL.build_count_query("SELECT from_date, group_by FROM t").unwrap();
        assert_eq!(count, "SELECT COUNT(*) FROM t");
    }

    #[test]
    fn test_count_query_without_from_fails() {
        let err = Drivers::MySQL.build_count_query("SELECT 1").unwrap_err();
        assert!(matches!(err, Error::MalformedStatement(_)));
    }

    #[test]
    fn test_paginate_offsets() {
        let page = Page { page_no: 3, page_size: 20, ..Page::default() };

        let sql = Drivers::Postgres.paginate("SELECT * FROM t", &page).unwrap();
        assert_eq!(sql, "SELECT * FROM t LIMIT 20 OFFSET 40");

        let sql = Drivers::MySQL.paginate("SELECT * FROM t", &page).unwrap();
        assert_eq!(sql, "SELECT * FROM t LIMIT 40,20");

        let sql = Drivers::Oracle.paginate("SELECT * FROM t ORDER BY id", &page).unwrap();
        assert_eq!(sql, "SELECT * FROM t ORDER BY id OFFSET 40 ROWS FETCH NEXT 20 ROWS ONLY");
    }

    #[test]
    fn test_paginate_mssql_requires_order_by() {
        let page = Page::default();
        assert!(Drivers::MSSQL.paginate("SELECT * FROM t", &page).is_err());
        assert!(Drivers::MSSQL.paginate("SELECT * FROM t ORDER BY id", &page).is_ok());
    }

    #[test]
    fn test_paginate_rejects_zero_page_size() {
        let page = Page { page_size: 0, ..Page::default() };
        assert!(matches!(Drivers::SQLite.paginate("SELECT 1", &page), Err(Error::InvalidArgument(_))));
    }
}
