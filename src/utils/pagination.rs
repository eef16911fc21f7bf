use serde::{Deserialize, Serialize};
use utoipa::IntoParams;

const DEFAULT_PER_PAGE: u32 = 10;
const MAX_PER_PAGE: u32 = 100;

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct PageQuery {
    /// Page number (starts at 1)
    pub page: Option<u32>,
    /// Items per page (max 100)
    pub per_page: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
}

impl Pagination {
    pub fn new(page: Option<u32>, per_page: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            per_page: per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE),
        }
    }

    pub fn limit(&self) -> i64 {
        self.per_page as i64
    }

    pub fn offset(&self) -> i64 {
        (self.page as i64 - 1) * self.per_page as i64
    }
}

impl From<&PageQuery> for Pagination {
    fn from(q: &PageQuery) -> Self {
        Pagination::new(q.page, q.per_page)
    }
}

/// List envelope shared by every paginated endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
    pub total_pages: i64,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, total: i64, p: Pagination) -> Self {
        let per_page = p.per_page as i64;
        Self {
            items,
            total,
            page: p.page,
            per_page: p.per_page,
            total_pages: (total + per_page - 1) / per_page,
        }
    }
}
