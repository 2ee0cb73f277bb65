//! Pagination parameters and results.

use serde::Serialize;

/// A requested page of results. Both fields are always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub limit: u64,
}

impl PageRequest {
    pub const DEFAULT_PAGE: u64 = 1;
    pub const DEFAULT_LIMIT: u64 = 10;

    /// Build a page request, replacing zero values with the defaults.
    pub fn new(page: u64, limit: u64) -> Self {
        Self {
            page: if page == 0 { Self::DEFAULT_PAGE } else { page },
            limit: if limit == 0 { Self::DEFAULT_LIMIT } else { limit },
        }
    }

    /// Parse raw query values. Absent, non-numeric, zero or negative values
    /// fall back to the defaults; trailing garbage after leading digits is
    /// ignored (`"2abc"` is page 2).
    pub fn from_query(page: Option<&str>, limit: Option<&str>) -> Self {
        Self::new(
            page.and_then(parse_leading_int).unwrap_or(0),
            limit.and_then(parse_leading_int).unwrap_or(0),
        )
    }

    /// Number of items to skip.
    pub fn offset(&self) -> u64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PAGE, Self::DEFAULT_LIMIT)
    }
}

fn parse_leading_int(raw: &str) -> Option<u64> {
    let raw = raw.trim_start();
    let raw = raw.strip_prefix('+').unwrap_or(raw);
    let end = raw
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(raw.len());
    raw[..end].parse().ok()
}

/// One page of results plus the totals needed to render pagination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_items: u64,
    pub current_page: u64,
    pub total_pages: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total_items: u64, request: PageRequest) -> Self {
        Self {
            items,
            total_items,
            current_page: request.page,
            total_pages: total_items.div_ceil(request.limit),
        }
    }

    /// Convert every item, keeping the page totals. Stops at the first error.
    pub fn try_map<U, E>(self, f: impl FnMut(T) -> Result<U, E>) -> Result<Page<U>, E> {
        Ok(Page {
            items: self.items.into_iter().map(f).collect::<Result<_, _>>()?,
            total_items: self.total_items,
            current_page: self.current_page,
            total_pages: self.total_pages,
        })
    }
}
