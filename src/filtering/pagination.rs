use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Pagination block of a list response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PaginationMetadata {
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
    pub total_items: u64,
}

impl PaginationMetadata {
    /// Derive the metadata from the requested page/limit and the count result.
    ///
    /// `limit` must be at least 1; the parser guarantees this. A zero limit is
    /// treated as one instead of dividing by zero.
    #[must_use]
    pub fn new(page: u64, limit: u64, total_items: u64) -> Self {
        Self {
            page,
            limit,
            total_pages: total_items.div_ceil(limit.max(1)),
            total_items,
        }
    }

    #[must_use]
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    #[must_use]
    pub fn has_prev(&self) -> bool {
        self.page > 1
    }
}

/// Row offset for a 1-based page
#[must_use]
pub fn page_offset(page: u64, limit: u64) -> u64 {
    page.saturating_sub(1).saturating_mul(limit)
}
