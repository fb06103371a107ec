//! Offset/limit page wrapper for list operations.

use serde::{Deserialize, Serialize};

/// Default number of items returned by list operations.
pub const DEFAULT_PAGE_LIMIT: i64 = 50;

/// A window of results from an offset/limit query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    /// The items in this window.
    pub items: Vec<T>,
    /// Total number of matching items.
    pub total: i64,
    /// Whether more items exist beyond this window.
    pub has_more: bool,
}

impl<T> Page<T> {
    /// Build a page from a fetched window and the total match count.
    pub fn new(items: Vec<T>, total: i64, offset: i64) -> Self {
        let has_more = offset + (items.len() as i64) < total;
        Self {
            items,
            total,
            has_more,
        }
    }

    /// An empty page.
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            total: 0,
            has_more: false,
        }
    }
}
