//! Page-numbered views over query results.
//!
//! [`PaginationParams`] selects a 1-indexed page of a filtered and sorted result set;
//! the resulting [`Page`] carries the items along with the total filtered count and
//! the neighbouring page numbers.

use serde::{Deserialize, Serialize};

/// A single page of results.
///
/// # Example
///
/// ```ignore
/// use docsync::page::PaginationParams;
///
/// let page = PaginationParams::new(2, 10).paginate((1..=25).collect::<Vec<i32>>());
///
/// assert_eq!(page.items, (11..=20).collect::<Vec<_>>());
/// assert_eq!(page.count, 25);
/// assert_eq!(page.next_page, Some(3));
/// assert_eq!(page.previous_page, Some(1));
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// The items on this page.
    pub items: Vec<T>,
    /// Total number of items across all pages.
    pub count: usize,
    /// The page number of this page (1-indexed).
    pub page: usize,
    /// The next page number, if more items follow.
    pub next_page: Option<usize>,
    /// The previous page number, if this is not the first page.
    pub previous_page: Option<usize>,
}

impl<T> Page<T> {
    /// Returns the number of pages needed to show `count` items.
    pub fn total_pages(&self, per_page: usize) -> usize {
        if per_page == 0 { 0 } else { self.count.div_ceil(per_page) }
    }

    /// Converts every item, keeping the page metadata.
    pub fn try_map<U, E>(self, f: impl FnMut(T) -> Result<U, E>) -> Result<Page<U>, E> {
        Ok(Page {
            items: self.items.into_iter().map(f).collect::<Result<Vec<_>, E>>()?,
            count: self.count,
            page: self.page,
            next_page: self.next_page,
            previous_page: self.previous_page,
        })
    }
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            count: 0,
            page: 1,
            next_page: None,
            previous_page: None,
        }
    }
}

/// Which page to retrieve and how large pages are.
///
/// Pages are 1-indexed; page `0` is treated as page `1`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationParams {
    /// The page number (1-indexed).
    pub page: usize,
    /// Number of items per page.
    pub per_page: usize,
}

impl PaginationParams {
    pub fn new(page: usize, per_page: usize) -> Self {
        Self { page, per_page }
    }

    /// Creates a new builder for constructing pagination parameters.
    pub fn builder() -> PaginationParamsBuilder {
        PaginationParamsBuilder::new()
    }

    /// Returns the effective page number.
    pub fn page(&self) -> usize {
        self.page.max(1)
    }

    /// Number of items preceding this page.
    pub fn offset(&self) -> usize {
        (self.page() - 1).saturating_mul(self.per_page)
    }

    /// Cuts this page out of the full, already ordered result set.
    pub fn paginate<T>(&self, items: Vec<T>) -> Page<T> {
        let count = items.len();
        let page = self.page();
        let offset = self.offset();
        let end = offset.saturating_add(self.per_page).min(count);

        let items = items
            .into_iter()
            .skip(offset)
            .take(self.per_page)
            .collect::<Vec<_>>();

        Page {
            items,
            count,
            page,
            next_page: (self.per_page > 0 && end < count).then_some(page + 1),
            previous_page: (page > 1).then(|| page - 1),
        }
    }
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self { page: 1, per_page: 10 }
    }
}

/// Builder for [`PaginationParams`]; unset values default to page 1 of 10.
#[derive(Debug, Default)]
pub struct PaginationParamsBuilder {
    page: Option<usize>,
    per_page: Option<usize>,
}

impl PaginationParamsBuilder {
    pub fn new() -> Self {
        Self { page: None, per_page: None }
    }

    pub fn with_page(mut self, page: usize) -> Self {
        self.page = Some(page);
        self
    }

    pub fn with_per_page(mut self, per_page: usize) -> Self {
        self.per_page = Some(per_page);
        self
    }

    pub fn build(self) -> PaginationParams {
        let defaults = PaginationParams::default();
        PaginationParams {
            page: self.page.unwrap_or(defaults.page),
            per_page: self.per_page.unwrap_or(defaults.per_page),
        }
    }
}
