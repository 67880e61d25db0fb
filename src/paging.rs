//! Paging arithmetic for list endpoints. Pages are 1-based on the wire and
//! 0-based internally.

use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

/// Requested page from `?page=`. Missing, unparsable, or < 1 becomes 1.
pub fn page_from_query(query: &PageQuery) -> u32 {
    query
        .page
        .as_deref()
        .and_then(|raw| raw.trim().parse::<i64>().ok())
        .filter(|page| *page >= 1)
        .map(|page| page.min(u32::MAX as i64) as u32)
        .unwrap_or(1)
}

/// Converts a 1-based page into a 0-based one, never below zero.
pub fn adjust_page(page: u32) -> u32 {
    page.saturating_sub(1)
}

/// `page` is 0-based.
pub fn has_next_page(page: u32, page_size: u32, record_count: u64) -> bool {
    (page as u64 * page_size as u64) + (page_size as u64) < record_count
}

pub fn total_pages(page_size: u32, record_count: u64) -> u64 {
    if page_size == 0 {
        return 0;
    }
    record_count.div_ceil(page_size as u64)
}

/// Envelope returned by paged JSON endpoints.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Paged<T> {
    pub items:         Vec<T>,
    pub page:          u32,
    pub page_size:     u32,
    pub total_count:   u64,
    pub total_pages:   u64,
    pub has_next_page: bool,
}

impl<T> Paged<T> {
    /// `page` is the 1-based page the caller asked for.
    pub fn new(items: Vec<T>, page: u32, page_size: u32, total_count: u64) -> Self {
        Self {
            items,
            page,
            page_size,
            total_count,
            total_pages:   total_pages(page_size, total_count),
            has_next_page: has_next_page(adjust_page(page), page_size, total_count),
        }
    }
}
