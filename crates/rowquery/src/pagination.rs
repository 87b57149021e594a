//! Paging windows and paged results.

use serde::{Deserialize, Serialize};

use crate::error::{QueryError, QueryResult};

/// Pagination configuration for LIMIT/OFFSET.
///
/// # Example
/// ```ignore
/// use rowquery::Pagination;
///
/// // Direct limit/offset
/// let pag = Pagination::new().limit(10).offset(20);
///
/// // Page-based (page 3 with 25 items per page)
/// let pag = Pagination::page(3, 25)?;
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pagination {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl Pagination {
    /// Create a new empty pagination (no limit/offset).
    pub fn new() -> Self {
        Self::default()
    }

    /// Create pagination from a 1-based page number and a page size.
    pub fn page(page: i64, per_page: i64) -> QueryResult<Self> {
        if page < 1 {
            return Err(QueryError::invalid_argument(format!(
                "page must be >= 1, got {page}"
            )));
        }
        if per_page < 1 {
            return Err(QueryError::invalid_argument(format!(
                "per_page must be >= 1, got {per_page}"
            )));
        }
        let offset = (page - 1).checked_mul(per_page).ok_or_else(|| {
            QueryError::invalid_argument(format!("page {page} x {per_page} overflows"))
        })?;
        Ok(Self {
            limit: Some(per_page),
            offset: Some(offset),
        })
    }

    pub fn limit(mut self, n: i64) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn offset(mut self, n: i64) -> Self {
        self.offset = Some(n);
        self
    }

    /// Check if pagination is set.
    pub fn is_empty(&self) -> bool {
        self.limit.is_none() && self.offset.is_none()
    }

    /// Reject negative windows.
    pub fn validate(&self) -> QueryResult<()> {
        if let Some(limit) = self.limit {
            if limit < 0 {
                return Err(QueryError::invalid_argument(format!(
                    "limit must be >= 0, got {limit}"
                )));
            }
        }
        if let Some(offset) = self.offset {
            if offset < 0 {
                return Err(QueryError::invalid_argument(format!(
                    "offset must be >= 0, got {offset}"
                )));
            }
        }
        Ok(())
    }

    /// Clamp the limit to `max`. Returns `true` if it was reduced.
    pub(crate) fn clamp(&mut self, max: i64) -> bool {
        match self.limit {
            Some(limit) if limit > max => {
                self.limit = Some(max);
                true
            }
            _ => false,
        }
    }
}

/// One page of results plus the total row count across all pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub limit: Option<i64>,
    pub offset: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, pagination: Pagination) -> Self {
        Self {
            items,
            total,
            limit: pagination.limit,
            offset: pagination.offset.unwrap_or(0),
        }
    }

    /// An empty page with total count 0.
    pub fn empty(pagination: Pagination) -> Self {
        Self::new(Vec::new(), 0, pagination)
    }

    /// Number of pages at the current page size (1 when unpaged).
    pub fn total_pages(&self) -> i64 {
        match self.limit {
            Some(limit) if limit > 0 => (self.total + limit - 1) / limit,
            _ => i64::from(self.total > 0),
        }
    }

    pub fn has_next(&self) -> bool {
        self.offset + (self.items.len() as i64) < self.total
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            limit: self.limit,
            offset: self.offset,
        }
    }
}
