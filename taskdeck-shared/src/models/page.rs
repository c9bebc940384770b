/// Offset pagination helpers shared by task and user listings

use serde::{Deserialize, Serialize};

/// Largest page size a caller may request
pub const MAX_PAGE_SIZE: u32 = 100;

/// One page of results plus the total match count
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub limit: u32,
}

impl<T> Page<T> {
    /// Builds page metadata for the response envelope
    pub fn meta(&self) -> PageMeta {
        PageMeta::new(self.total, self.page, self.limit)
    }

    /// Converts the items, keeping the paging information
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            limit: self.limit,
        }
    }
}

/// Pagination block of a list response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub total: i64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: i64,
    pub has_next_page: bool,
    pub has_prev_page: bool,
}

impl PageMeta {
    pub fn new(total: i64, page: u32, limit: u32) -> Self {
        let limit_i64 = i64::from(limit.max(1));
        Self {
            total,
            page,
            limit,
            total_pages: (total + limit_i64 - 1) / limit_i64,
            has_next_page: i64::from(page) * limit_i64 < total,
            has_prev_page: page > 1,
        }
    }
}

/// Clamps a requested page and limit into range
///
/// Page is at least 1; limit is between 1 and [`MAX_PAGE_SIZE`].
pub fn clamp_paging(page: Option<u32>, limit: Option<u32>) -> (u32, u32) {
    let page = page.unwrap_or(1).max(1);
    let limit = limit.unwrap_or(10).clamp(1, MAX_PAGE_SIZE);
    (page, limit)
}

/// Row offset for a 1-based page
pub fn offset(page: u32, limit: u32) -> i64 {
    i64::from(page.saturating_sub(1)) * i64::from(limit)
}
