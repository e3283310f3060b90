//! Page-number pagination: `?page=N&page_size=M` in, `count/next/previous/results` out.

use axum::http::Uri;
use serde::{Deserialize, Serialize};

use crate::config::PaginationConfig;
use crate::error::{AppError, AppResult};

const INVALID_PAGE: &str = "Invalid page.";

/// Raw pagination parameters. Kept as strings so bad input maps to our own errors.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct PageParams {
    pub page: Option<String>,
    pub page_size: Option<String>,
}

/// A validated 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    pub fn from_params(params: &PageParams, cfg: &PaginationConfig) -> AppResult<Self> {
        let page = match params.page.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
            None => 1,
            Some(raw) => match raw.parse::<u32>() {
                Ok(p) if p >= 1 => p,
                _ => return Err(AppError::NotFound(INVALID_PAGE.to_string())),
            },
        };
        let page_size = params
            .page_size
            .as_deref()
            .and_then(|s| s.trim().parse::<u32>().ok())
            .filter(|s| *s > 0)
            .map(|s| s.min(cfg.max_page_size))
            .unwrap_or(cfg.page_size);
        Ok(Self { page, page_size })
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.page_size)
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.page_size)
    }

    /// Rejects pages past the end. The first page is always valid, even when empty.
    pub fn ensure_in_range(&self, count: i64) -> AppResult<()> {
        if self.page > 1 && self.offset() >= count {
            return Err(AppError::NotFound(INVALID_PAGE.to_string()));
        }
        Ok(())
    }
}

/// One page of results plus the total row count, as returned by the store.
#[derive(Debug, Clone)]
pub struct Paged<T> {
    pub count: i64,
    pub items: Vec<T>,
}

impl<T> Paged<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paged<U> {
        Paged { count: self.count, items: self.items.into_iter().map(f).collect() }
    }
}

/// Wire representation of a paginated listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    /// Builds the response page; `next`/`previous` keep every other query parameter of `uri`.
    pub fn new(paged: Paged<T>, req: PageRequest, uri: &Uri) -> Self {
        let last_page_end = req.offset() + i64::from(req.page_size);
        let next = (last_page_end < paged.count).then(|| page_link(uri, Some(req.page + 1)));
        let previous = (req.page > 1).then(|| {
            let prev = req.page - 1;
            page_link(uri, (prev > 1).then_some(prev))
        });
        Self { count: paged.count, next, previous, results: paged.items }
    }
}

/// Rewrites the `page` parameter of `uri`; `None` drops it (first page).
fn page_link(uri: &Uri, page: Option<u32>) -> String {
    let mut pairs: Vec<String> = uri
        .query()
        .unwrap_or("")
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter(|pair| pair.split('=').next() != Some("page"))
        .map(str::to_string)
        .collect();
    if let Some(page) = page {
        pairs.push(format!("page={}", page));
    }
    if pairs.is_empty() {
        uri.path().to_string()
    } else {
        format!("{}?{}", uri.path(), pairs.join("&"))
    }
}
