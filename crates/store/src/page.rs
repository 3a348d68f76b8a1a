//! Pagination request and response envelope shared by every list surface.

use serde::{Deserialize, Serialize};

const DEFAULT_PAGE: u32 = 1;
const DEFAULT_PER_PAGE: u32 = 20;
const MAX_PER_PAGE: u32 = 100;

/// Pagination parameters for list queries (1-based pages).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub per_page: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl PageRequest {
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, MAX_PER_PAGE),
        }
    }

    /// Build from raw query values. Non-numeric or missing values coerce to
    /// the defaults (page 1, 20 per page) rather than failing the request.
    pub fn lenient(page: Option<&str>, per_page: Option<&str>) -> Self {
        let page = page.and_then(|s| s.parse::<u32>().ok()).unwrap_or(DEFAULT_PAGE);
        let per_page = per_page
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_PER_PAGE);
        Self::new(page, per_page)
    }

    /// Number of rows to skip for this page.
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.per_page)
    }
}

/// Pagination metadata returned with every list response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
    pub total_pages: u64,
}

impl PageMeta {
    pub fn new(total: u64, request: PageRequest) -> Self {
        Self {
            total,
            page: request.page,
            per_page: request.per_page,
            total_pages: total.div_ceil(u64::from(request.per_page)),
        }
    }
}

/// One page of results plus its metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub meta: PageMeta,
}

impl<T> Page<T> {
    /// Page an already-filtered, already-ordered in-memory collection.
    pub fn slice(rows: Vec<T>, request: PageRequest) -> Self {
        let total = rows.len() as u64;
        let data = rows
            .into_iter()
            .skip(request.offset() as usize)
            .take(request.per_page as usize)
            .collect();
        Self {
            data,
            meta: PageMeta::new(total, request),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lenient_coerces_garbage_to_defaults() {
        let req = PageRequest::lenient(Some("invalid"), Some("NaN"));
        assert_eq!(req, PageRequest::default());

        let req = PageRequest::lenient(None, None);
        assert_eq!(req, PageRequest::default());

        let req = PageRequest::lenient(Some("3"), Some("5"));
        assert_eq!(req, PageRequest::new(3, 5));
    }

    #[test]
    fn zero_page_clamps_to_one() {
        let req = PageRequest::lenient(Some("0"), Some("0"));
        assert_eq!(req.page, 1);
        assert_eq!(req.per_page, 1);
    }

    #[test]
    fn meta_rounds_total_pages_up() {
        let meta = PageMeta::new(5, PageRequest::new(1, 2));
        assert_eq!(meta.total, 5);
        assert_eq!(meta.total_pages, 3);

        let meta = PageMeta::new(0, PageRequest::default());
        assert_eq!(meta.total_pages, 0);
    }

    #[test]
    fn slice_returns_requested_window() {
        let page = Page::slice((1..=5).collect(), PageRequest::new(2, 2));
        assert_eq!(page.data, vec![3, 4]);
        assert_eq!(page.meta.total, 5);
        assert_eq!(page.meta.total_pages, 3);
    }

    #[test]
    fn meta_serializes_camel_case() {
        let json = serde_json::to_value(PageMeta::new(5, PageRequest::new(1, 2))).unwrap();
        assert_eq!(json["perPage"], 2);
        assert_eq!(json["totalPages"], 3);
    }
}
