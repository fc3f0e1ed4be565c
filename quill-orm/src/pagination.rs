//! # Pagination Module
//!
//! This module provides the `Page` object passed to list queries. It is
//! `serde`-compatible, so it can be extracted straight from HTTP query
//! parameters (e.g. `?page_no=2&page_size=50`) and serialized back into API
//! responses once the query has filled in the totals.
//!
//! ## Lifecycle
//!
//! 1. The caller creates a `Page` (defaults: page 1, 20 rows).
//! 2. `Database::query` / `query_map_list` append the dialect's limit/offset
//!    clause and, unless the `Finder` disables it, count the total rows.
//! 3. The totals and navigation flags are written once by
//!    [`Page::set_total_count`].
//!
//! ## Example
//!
//! ```rust,ignore
//! let mut page = Page::new(2, 10);
//! let users: Vec<User> = db.query(&mut scope, &mut finder, Some(&mut page)).await?;
//! println!("{} users over {} pages", page.total_count, page.page_count);
//! ```

use serde::{Deserialize, Serialize};

/// Pagination request and, after the query ran, result metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// The page number, 1-based. Values below 1 are read as 1.
    #[serde(default = "default_page_no")]
    pub page_no: u64,

    /// The number of rows per page. Default: 20.
    #[serde(default = "default_page_size")]
    pub page_size: u64,

    /// Total rows matching the query.
    #[serde(default)]
    pub total_count: u64,

    /// Total number of pages.
    #[serde(default)]
    pub page_count: u64,

    #[serde(default)]
    pub first_page: bool,
    #[serde(default)]
    pub has_prev: bool,
    #[serde(default)]
    pub has_next: bool,
    #[serde(default)]
    pub last_page: bool,
}

fn default_page_no() -> u64 {
    1
}

fn default_page_size() -> u64 {
    20
}

impl Default for Page {
    fn default() -> Self {
        Self::new(default_page_no(), default_page_size())
    }
}

impl Page {
    /// Creates a new page request.
    pub fn new(page_no: u64, page_size: u64) -> Self {
        Self {
            page_no,
            page_size,
            total_count: 0,
            page_count: 0,
            first_page: false,
            has_prev: false,
            has_next: false,
            last_page: false,
        }
    }

    /// The number of rows skipped before this page.
    pub fn offset(&self) -> u64 {
        (self.page_no.max(1) - 1) * self.page_size
    }

    /// Records the total row count and derives the page count and flags.
    pub fn set_total_count(&mut self, total: u64) {
        let page_no = self.page_no.max(1);

        self.total_count = total;
        self.page_count = if self.page_size == 0 { 0 } else { total.div_ceil(self.page_size) };
        self.first_page = page_no == 1;
        self.has_prev = page_no > 1;
        self.has_next = page_no < self.page_count;
        self.last_page = page_no >= self.page_count;
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let page = Page::default();
        assert_eq!(page.page_no, 1);
        assert_eq!(page.page_size, 20);
        assert_eq!(page.offset(), 0);
    }

    #[test]
    fn test_offset_is_one_based() {
        assert_eq!(Page::new(3, 20).offset(), 40);
        assert_eq!(Page::new(0, 20).offset(), 0);
    }

    #[test]
    fn test_set_total_count_middle_page() {
        let mut page = Page::new(2, 10);
        page.set_total_count(35);

        assert_eq!(page.page_count, 4);
        assert!(!page.first_page);
        assert!(page.has_prev);
        assert!(page.has_next);
        assert!(!page.last_page);
    }

    #[test]
    fn test_set_total_count_single_page() {
        let mut page = Page::new(1, 10);
        page.set_total_count(3);

        assert_eq!(page.page_count, 1);
        assert!(page.first_page);
        assert!(!page.has_prev);
        assert!(!page.has_next);
        assert!(page.last_page);
    }
}
