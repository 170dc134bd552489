//! Pagination parameters and response envelopes
//!
//! `page` and `pageSize` arrive as untrusted strings. They are coerced the
//! way `parseInt(value, 10)` would and silently fall back to defaults, so a
//! bad value never turns into an error response.

use serde::{Deserialize, Serialize};

/// Defaults and bounds applied while coercing page parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    /// Page size used when none (or an invalid one) is requested
    pub default_page_size: u32,
    /// Largest page size a client may request
    pub max_page_size: u32,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default_page_size: 25,
            max_page_size: 100,
        }
    }
}

impl From<&crate::config::ApiConfig> for PageLimits {
    fn from(config: &crate::config::ApiConfig) -> Self {
        Self {
            default_page_size: config.default_page_size,
            max_page_size: config.max_page_size,
        }
    }
}

/// Parse the leading base-10 integer of a string, like `parseInt(value, 10)`.
///
/// Leading whitespace and one sign are accepted; parsing stops at the first
/// non-digit. Returns `None` when no digit is found or the value overflows.
pub fn parse_int(value: &str) -> Option<i64> {
    let trimmed = value.trim_start();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }

    let magnitude: i64 = digits[..end].parse().ok()?;
    Some(if negative { -magnitude } else { magnitude })
}

/// Coerce a raw value to a positive `u32`; values past `u32::MAX` saturate
fn positive_u32(raw: Option<&str>) -> Option<u32> {
    raw.and_then(parse_int)
        .filter(|n| *n > 0)
        .map(|n| u32::try_from(n).unwrap_or(u32::MAX))
}

/// Validated page request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListParams {
    /// Page number (1-indexed)
    pub page: u32,
    /// Number of items per page
    pub page_size: u32,
}

impl ListParams {
    /// Create pagination parameters from already valid values
    pub fn new(page: u32, page_size: u32) -> Self {
        Self {
            page: page.max(1),
            page_size: page_size.max(1),
        }
    }

    /// Coerce raw request values, falling back to defaults.
    ///
    /// The page is never clamped against the page count; asking past the end
    /// yields an empty page.
    pub fn from_raw(page: Option<&str>, page_size: Option<&str>, limits: &PageLimits) -> Self {
        let page = positive_u32(page).unwrap_or(1);
        let page_size = positive_u32(page_size)
            .unwrap_or(limits.default_page_size)
            .min(limits.max_page_size.max(1));
        Self::new(page, page_size)
    }

    /// Offset of the first record on this page
    pub fn start(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.page_size)
    }

    /// Maximum number of records on this page
    pub fn limit(&self) -> u64 {
        u64::from(self.page_size)
    }
}

impl Default for ListParams {
    fn default() -> Self {
        Self::new(1, PageLimits::default().default_page_size)
    }
}

/// Number of pages needed to show `total` records
pub fn page_count(total: u64, page_size: u32) -> u64 {
    if page_size == 0 {
        return 0;
    }
    total.div_ceil(u64::from(page_size))
}

/// Pagination metadata returned with every list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
    pub page_count: u64,
    pub total: u64,
}

impl Pagination {
    /// Build metadata for `params`; the page count is always derived from
    /// `total`, never taken from the caller.
    pub fn new(params: &ListParams, total: u64) -> Self {
        Self {
            page: params.page,
            page_size: params.page_size,
            page_count: page_count(total, params.page_size),
            total,
        }
    }
}

/// `meta` block of a list envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListMeta {
    pub pagination: Pagination,
}

/// `{ data, meta: { pagination } }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListResponse<T> {
    pub data: Vec<T>,
    pub meta: ListMeta,
}

impl<T> ListResponse<T> {
    pub fn new(data: Vec<T>, pagination: Pagination) -> Self {
        Self {
            data,
            meta: ListMeta { pagination },
        }
    }

    pub fn pagination(&self) -> &Pagination {
        &self.meta.pagination
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> ListResponse<U> {
        ListResponse {
            data: self.data.into_iter().map(f).collect(),
            meta: self.meta,
        }
    }
}

/// `{ data }` for single-record responses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleResponse<T> {
    pub data: T,
}

impl<T> SingleResponse<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}
