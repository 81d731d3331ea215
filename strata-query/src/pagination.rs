//! Page-based views over datasets.
//!
//! [`Dataset::paginate`] applies `LIMIT`/`OFFSET` for one page and keeps the
//! numbers needed to navigate the others:
//!
//! ```rust
//! use strata_query::Dataset;
//!
//! let page = Dataset::table("items").order(["id"]).paginate(3, 25, 60).unwrap();
//! assert_eq!(page.page_count(), 3);
//! assert_eq!(page.current_page_record_range(), Some(51..=60));
//! assert!(page.is_last_page());
//! assert_eq!(page.prev_page(), Some(2));
//! assert_eq!(
//!     page.select_sql().unwrap(),
//!     "SELECT * FROM items ORDER BY id LIMIT 25 OFFSET 50"
//! );
//! ```

use std::ops::RangeInclusive;

use crate::dataset::Dataset;
use crate::error::{QueryError, QueryResult};
use crate::executor::{Executor, Row};

/// One page of a dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct PaginatedDataset {
    dataset: Dataset,
    current_page: u64,
    page_size: u64,
    total_rows: u64,
}

impl Dataset {
    /// Restrict the dataset to one page (1-indexed) of `page_size` rows.
    ///
    /// `total_rows` is the unpaginated row count. Fails if the dataset is
    /// already limited. An offset past `u64::MAX` saturates.
    pub fn paginate(
        &self,
        page: u64,
        page_size: u64,
        total_rows: u64,
    ) -> QueryResult<PaginatedDataset> {
        if self.limit_value().is_some() || self.offset_value().is_some() {
            return Err(QueryError::invalid_operation(
                "paginate",
                "the dataset is already limited",
            )
            .with_suggestion("Call unlimited() before paginate()"));
        }
        if page == 0 {
            return Err(QueryError::invalid_limit("Page numbers start at 1"));
        }

        let offset = (page - 1).saturating_mul(page_size);
        Ok(PaginatedDataset {
            dataset: self.limit(page_size)?.offset(offset),
            current_page: page,
            page_size,
            total_rows,
        })
    }

    /// Count the rows through an executor, then paginate.
    pub async fn paginate_counted<E: Executor + ?Sized>(
        &self,
        executor: &E,
        page: u64,
        page_size: u64,
    ) -> QueryResult<PaginatedDataset> {
        let total_rows = self.count(executor).await?;
        self.paginate(page, page_size, total_rows)
    }

    /// Every page of the dataset, in order.
    pub fn each_page(
        &self,
        page_size: u64,
        total_rows: u64,
    ) -> QueryResult<impl Iterator<Item = PaginatedDataset>> {
        let first = self.paginate(1, page_size, total_rows)?;
        let base = self.clone();
        Ok((1..=first.page_count()).filter_map(move |page| {
            base.paginate(page, page_size, total_rows).ok()
        }))
    }
}

impl PaginatedDataset {
    /// The limited dataset for this page.
    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// Compile this page's SELECT.
    pub fn select_sql(&self) -> QueryResult<String> {
        self.dataset.select_sql()
    }

    /// This page's number (1-indexed).
    pub fn current_page(&self) -> u64 {
        self.current_page
    }

    /// Rows per page.
    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    /// Unpaginated row count.
    pub fn total_rows(&self) -> u64 {
        self.total_rows
    }

    /// Number of pages. Zero rows means zero pages.
    pub fn page_count(&self) -> u64 {
        self.total_rows.div_ceil(self.page_size)
    }

    /// Check if this is the first page.
    pub fn is_first_page(&self) -> bool {
        self.current_page == 1
    }

    /// Check if this is the last page.
    pub fn is_last_page(&self) -> bool {
        self.current_page == self.page_count()
    }

    /// The next page number, if any.
    pub fn next_page(&self) -> Option<u64> {
        (self.current_page < self.page_count()).then_some(self.current_page + 1)
    }

    /// The previous page number, if any.
    pub fn prev_page(&self) -> Option<u64> {
        (self.current_page > 1).then_some(self.current_page - 1)
    }

    /// All page numbers.
    pub fn page_range(&self) -> RangeInclusive<u64> {
        1..=self.page_count()
    }

    /// 1-based row numbers on this page, clamped to `total_rows`. `None`
    /// past the last page.
    pub fn current_page_record_range(&self) -> Option<RangeInclusive<u64>> {
        if self.current_page > self.page_count() {
            return None;
        }
        let start = (self.current_page - 1)
            .saturating_mul(self.page_size)
            .saturating_add(1);
        let end = start
            .saturating_add(self.page_size.saturating_sub(1))
            .min(self.total_rows);
        Some(start..=end)
    }

    /// Number of rows on this page.
    pub fn current_page_record_count(&self) -> u64 {
        self.current_page_record_range()
            .map_or(0, |range| range.end() - range.start() + 1)
    }

    /// Fetch this page's rows.
    pub async fn fetch<E: Executor + ?Sized>(
        &self,
        executor: &E,
    ) -> QueryResult<PaginatedResult<Row>> {
        let rows = self.dataset.all(executor).await?;
        Ok(PaginatedResult::new(rows)
            .with_pagination(self.next_page().is_some(), self.prev_page().is_some())
            .with_total(self.total_rows))
    }
}

/// Rows of one page with navigation metadata.
#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    /// The rows.
    pub data: Vec<T>,
    /// Whether a later page exists.
    pub has_next: bool,
    /// Whether an earlier page exists.
    pub has_previous: bool,
    /// Unpaginated row count.
    pub total_count: Option<u64>,
}

impl<T> PaginatedResult<T> {
    /// Create a result without metadata.
    pub fn new(data: Vec<T>) -> Self {
        Self {
            data,
            has_next: false,
            has_previous: false,
            total_count: None,
        }
    }

    /// Set navigation metadata.
    pub fn with_pagination(mut self, has_next: bool, has_previous: bool) -> Self {
        self.has_next = has_next;
        self.has_previous = has_previous;
        self
    }

    /// Set the total count.
    pub fn with_total(mut self, total: u64) -> Self {
        self.total_count = Some(total);
        self
    }

    /// Number of rows in this page.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the page is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl<T> IntoIterator for PaginatedResult<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.data.into_iter()
    }
}
