//! Cursor/offset-driven batch iteration shared by all drivers.

use crate::driver::Driver;
use crate::envelope::Record;
use crate::error::DriverError;

/// Position within a paginated result set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageCursor {
    /// First page, before any vendor-specific position is known.
    Start,
    /// Numeric skip count.
    Offset(usize),
    /// Opaque continuation token (cursor id, keyset token, or next URL).
    Token(String),
    /// 1-based page number.
    PageNumber(u32),
}

/// One page fetch issued by `BatchReader`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub query: String,
    pub batch_size: usize,
    pub cursor: PageCursor,
}

/// One page of results plus the position of the next page, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub records: Vec<Record>,
    pub next: Option<PageCursor>,
}

impl Page {
    pub fn last(records: Vec<Record>) -> Self {
        Self {
            records,
            next: None,
        }
    }
}

/// Drives `Driver::fetch_page` until the result set is exhausted.
///
/// Iteration stops on an empty page, a short page (fewer records than
/// requested), or an absent next cursor.
pub struct BatchReader<'a> {
    driver: &'a dyn Driver,
    query: String,
    batch_size: usize,
    cursor: Option<PageCursor>,
}

impl<'a> BatchReader<'a> {
    pub fn new(
        driver: &'a dyn Driver,
        query: impl Into<String>,
        batch_size: usize,
    ) -> Result<Self, DriverError> {
        if batch_size < 1 {
            return Err(DriverError::validation(format!(
                "batch_size must be at least 1 (got: {batch_size})"
            ))
            .with_detail("provided", batch_size)
            .with_detail("parameter", "batch_size"));
        }

        if let Some(max) = driver.capabilities().max_page_size {
            if batch_size > max {
                return Err(DriverError::validation(format!(
                    "batch_size cannot exceed {max} (got: {batch_size})"
                ))
                .with_detail("provided", batch_size)
                .with_detail("maximum", max)
                .with_detail("parameter", "batch_size"));
            }
        }

        Ok(Self {
            driver,
            query: query.into(),
            batch_size,
            cursor: Some(PageCursor::Start),
        })
    }

    /// Fetches the next batch, or `None` once the result set is exhausted.
    pub async fn next_batch(&mut self) -> Result<Option<Vec<Record>>, DriverError> {
        let Some(cursor) = self.cursor.take() else {
            return Ok(None);
        };

        let request = PageRequest {
            query: self.query.clone(),
            batch_size: self.batch_size,
            cursor,
        };

        let page = self.driver.fetch_page(&request).await?;
        if page.records.is_empty() {
            return Ok(None);
        }

        self.cursor = if page.records.len() < self.batch_size {
            None
        } else {
            page.next
        };

        Ok(Some(page.records))
    }

    /// Drains every remaining batch into one vector.
    pub async fn collect_all(mut self) -> Result<Vec<Record>, DriverError> {
        let mut all = Vec::new();
        while let Some(batch) = self.next_batch().await? {
            all.extend(batch);
        }
        Ok(all)
    }
}
