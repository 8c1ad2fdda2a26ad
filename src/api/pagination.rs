//! Page arithmetic for post listings.
//!
//! Page numbers are 1-based. A page below 1, or past the last page (except an
//! empty first page), is reported as `NotFound`.

use serde::{Deserialize, Serialize};

use super::error::AppError;

/// Listings always show this many posts per page.
pub const POSTS_PER_PAGE: u32 = 4;

// Page-link window: first/last page always shown, one page before the current
// one and one after it.
const LEFT_EDGE: i64 = 1;
const LEFT_CURRENT: i64 = 1;
const RIGHT_CURRENT: i64 = 2;
const RIGHT_EDGE: i64 = 1;

/// `?page=` query string. Anything that is not an integer means page 1.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    page: Option<String>,
}

impl PageQuery {
    #[must_use]
    pub fn requested(&self) -> i64 {
        self.page
            .as_deref()
            .and_then(|page| page.trim().parse::<i64>().ok())
            .unwrap_or(1)
    }
}

/// Number of pages needed for `total` items.
#[must_use]
pub fn page_count(total: u64, per_page: u32) -> u32 {
    if per_page == 0 {
        return 0;
    }
    let pages = total.div_ceil(u64::from(per_page));
    u32::try_from(pages).unwrap_or(u32::MAX)
}

/// Check a requested page number against the number of items available.
///
/// # Errors
/// Returns `AppError::NotFound` when the page does not exist.
pub fn resolve_page(requested: i64, total: u64, per_page: u32) -> Result<u32, AppError> {
    if requested < 1 {
        return Err(AppError::NotFound);
    }
    let page = u32::try_from(requested).map_err(|_| AppError::NotFound)?;
    if page > page_count(total, per_page) && page != 1 {
        return Err(AppError::NotFound);
    }
    Ok(page)
}

/// Row offset of the first item on `page`.
#[must_use]
pub fn offset(page: u32, per_page: u32) -> i64 {
    i64::from(page.saturating_sub(1)) * i64::from(per_page)
}

/// One page of a listing, shaped for the templates.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
    pub pages: u32,
    pub has_prev: bool,
    pub has_next: bool,
    pub prev_num: Option<u32>,
    pub next_num: Option<u32>,
    /// Page links to render; `None` marks a gap.
    pub iter_pages: Vec<Option<u32>>,
}

impl<T> Page<T> {
    #[must_use]
    pub fn new(items: Vec<T>, page: u32, per_page: u32, total: u64) -> Self {
        let pages = page_count(total, per_page);
        let has_prev = page > 1;
        let has_next = page < pages;
        Self {
            items,
            page,
            per_page,
            total,
            pages,
            has_prev,
            has_next,
            prev_num: has_prev.then(|| page - 1),
            next_num: has_next.then(|| page + 1),
            iter_pages: page_window(page, pages),
        }
    }
}

fn page_window(page: u32, pages: u32) -> Vec<Option<u32>> {
    let current = i64::from(page);
    let last_page = i64::from(pages);
    let mut window = Vec::new();
    let mut last = 0;

    for num in 1..=last_page {
        let near_current = num > current - LEFT_CURRENT - 1 && num < current + RIGHT_CURRENT;
        if num <= LEFT_EDGE || near_current || num > last_page - RIGHT_EDGE {
            if last + 1 != num {
                window.push(None);
            }
            window.push(u32::try_from(num).ok());
            last = num;
        }
    }

    window
}
