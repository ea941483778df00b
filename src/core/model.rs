//! Defines application business models.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validify::Validate;

pub mod directory;
pub mod embedding;
pub mod provider;

/// The hard cap for page sizes. Requests asking for more are clamped, not rejected.
pub const MAX_PAGE_LIMIT: u32 = 100;

const DEFAULT_PAGE_LIMIT: u32 = 10;

/// Limit and page number used in list queries.
#[derive(Debug, Clone, Copy, Deserialize, Validate, ToSchema, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    /// Page number, starting from 1.
    pub page: Option<u32>,

    /// Page size, clamped to [1, 100].
    pub limit: Option<u32>,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: Some(1),
            limit: Some(DEFAULT_PAGE_LIMIT),
        }
    }
}

impl Pagination {
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: Some(page),
            limit: Some(limit),
        }
    }

    /// Returns the effective `(page, limit)` pair with the limit clamped
    /// to [1, [MAX_PAGE_LIMIT]] and the page floored at 1.
    pub fn to_page_limit(&self) -> (u32, u32) {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self
            .limit
            .unwrap_or(DEFAULT_PAGE_LIMIT)
            .clamp(1, MAX_PAGE_LIMIT);
        (page, limit)
    }

    /// Returns the `(limit, offset)` pair for SQL.
    pub fn to_limit_offset(&self) -> (u32, u32) {
        let (page, limit) = self.to_page_limit();
        (limit, (page - 1) * limit)
    }
}

/// A page of items alongside the pagination metadata clients need to
/// request the next one.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Paginated<T: Serialize> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u32,
    pub has_next: bool,
    pub has_prev: bool,
}

impl<T: Serialize> Paginated<T> {
    pub fn new(items: Vec<T>, total: usize, pagination: Pagination) -> Self {
        let (page, limit) = pagination.to_page_limit();
        let total_pages = (total as u32).div_ceil(limit);
        Self {
            items,
            total,
            page,
            limit,
            total_pages,
            has_next: page < total_pages,
            has_prev: page > 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_clamps_limit_and_page() {
        let p = Pagination::new(0, 400);
        assert_eq!((1, MAX_PAGE_LIMIT), p.to_page_limit());

        let p = Pagination::new(3, 0);
        assert_eq!((3, 1), p.to_page_limit());

        let p = Pagination {
            page: None,
            limit: None,
        };
        assert_eq!((1, DEFAULT_PAGE_LIMIT), p.to_page_limit());
    }

    #[test]
    fn pagination_offset() {
        let p = Pagination::new(3, 20);
        assert_eq!((20, 40), p.to_limit_offset());
    }

    #[test]
    fn paginated_metadata() {
        let page = Paginated::new(vec![1, 2, 3], 7, Pagination::new(2, 3));
        assert_eq!(3, page.total_pages);
        assert!(page.has_next);
        assert!(page.has_prev);

        let page = Paginated::<i32>::new(vec![], 0, Pagination::new(1, 10));
        assert_eq!(0, page.total_pages);
        assert!(!page.has_next);
        assert!(!page.has_prev);
    }
}
