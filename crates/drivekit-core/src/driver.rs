//! The common driver contract every vendor adapter implements.

use std::future::Future;
use std::pin::Pin;

use crate::capability::DriverCapabilities;
use crate::envelope::Record;
use crate::error::DriverError;
use crate::pagination::{Page, PageCursor, PageRequest};
use crate::schema::ObjectSchema;
use crate::throttle::RateLimitStatus;
use crate::vendor::VendorId;

/// Boxed future returned by driver operations, keeping the trait
/// object-safe.
pub type DriverFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, DriverError>> + Send + 'a>>;

/// Parameters for a single `read` call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReadRequest {
    /// Vendor query string; syntax depends on the driver's query language.
    pub query: String,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl ReadRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            limit: None,
            offset: None,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }
}

/// Vendor-agnostic API driver.
///
/// Discovery and read are mandatory. Write operations default to
/// `NotSupported` and are overridden by drivers whose capabilities
/// advertise them.
pub trait Driver: Send + Sync {
    fn vendor(&self) -> VendorId;

    fn capabilities(&self) -> DriverCapabilities;

    /// Lists the object types this driver can read.
    fn list_objects(&self) -> DriverFuture<'_, Vec<String>>;

    /// Returns the field schema for one object type.
    fn get_fields<'a>(&'a self, object: &'a str) -> DriverFuture<'a, ObjectSchema>;

    /// Executes a query and returns the matching records.
    fn read<'a>(&'a self, request: &'a ReadRequest) -> DriverFuture<'a, Vec<Record>>;

    fn create<'a>(&'a self, object: &'a str, data: &'a Record) -> DriverFuture<'a, Record> {
        let _ = data;
        Box::pin(async move {
            Err(operation_not_supported(self.vendor(), "create", object))
        })
    }

    fn update<'a>(
        &'a self,
        object: &'a str,
        id: &'a str,
        data: &'a Record,
    ) -> DriverFuture<'a, Record> {
        let _ = (id, data);
        Box::pin(async move {
            Err(operation_not_supported(self.vendor(), "update", object))
        })
    }

    fn delete<'a>(&'a self, object: &'a str, id: &'a str) -> DriverFuture<'a, bool> {
        let _ = id;
        Box::pin(async move {
            Err(operation_not_supported(self.vendor(), "delete", object))
        })
    }

    /// Fetches one page of a batched read. The default maps the cursor to
    /// an offset and delegates to `read`; cursor-first vendors override it.
    fn fetch_page<'a>(&'a self, request: &'a PageRequest) -> DriverFuture<'a, Page> {
        Box::pin(async move {
            let offset = match &request.cursor {
                PageCursor::Start => 0,
                PageCursor::Offset(offset) => *offset,
                other => {
                    return Err(DriverError::validation(format!(
                        "unsupported page cursor for offset pagination: {other:?}"
                    )));
                }
            };

            let read = ReadRequest::new(request.query.clone())
                .with_limit(request.batch_size)
                .with_offset(offset);

            let records = self.read(&read).await?;
            let next = if records.len() < request.batch_size {
                None
            } else {
                Some(PageCursor::Offset(offset + records.len()))
            };

            Ok(Page { records, next })
        })
    }

    /// Snapshot of the local rate budget.
    fn rate_limit_status(&self) -> RateLimitStatus {
        RateLimitStatus::default()
    }

    /// Releases any held resources. Drivers backed by a pooled HTTP client
    /// have nothing to do here.
    fn close(&self) {}
}

fn operation_not_supported(vendor: VendorId, operation: &str, object: &str) -> DriverError {
    DriverError::not_supported(format!(
        "{vendor} driver does not support {operation}"
    ))
    .with_detail("operation", operation)
    .with_detail("object", object)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::PaginationStyle;
    use serde_json::{Map, Value};

    struct FixtureDriver {
        total: usize,
    }

    impl Driver for FixtureDriver {
        fn vendor(&self) -> VendorId {
            VendorId::Amplitude
        }

        fn capabilities(&self) -> DriverCapabilities {
            DriverCapabilities::read_only(PaginationStyle::Offset, Some(100))
        }

        fn list_objects(&self) -> DriverFuture<'_, Vec<String>> {
            Box::pin(async { Ok(vec![String::from("events")]) })
        }

        fn get_fields<'a>(&'a self, _object: &'a str) -> DriverFuture<'a, ObjectSchema> {
            Box::pin(async { Ok(ObjectSchema::new()) })
        }

        fn read<'a>(&'a self, request: &'a ReadRequest) -> DriverFuture<'a, Vec<Record>> {
            Box::pin(async move {
                let offset = request.offset.unwrap_or(0);
                let limit = request.limit.unwrap_or(self.total);
                let end = (offset + limit).min(self.total);

                Ok((offset..end)
                    .map(|index| {
                        let mut record = Map::new();
                        record.insert(String::from("id"), Value::from(index as u64));
                        record
                    })
                    .collect())
            })
        }
    }

    #[tokio::test]
    async fn default_write_operations_are_not_supported() {
        let driver = FixtureDriver { total: 0 };
        let data = Map::new();

        let err = driver
            .create("events", &data)
            .await
            .expect_err("create must be rejected");

        assert_eq!(err.kind(), crate::ErrorKind::NotSupported);
        assert_eq!(err.detail("operation"), Some(&Value::from("create")));
    }

    #[tokio::test]
    async fn default_fetch_page_advances_offset() {
        let driver = FixtureDriver { total: 5 };

        let request = PageRequest {
            query: String::new(),
            batch_size: 2,
            cursor: PageCursor::Start,
        };
        let page = driver.fetch_page(&request).await.expect("first page");

        assert_eq!(page.records.len(), 2);
        assert_eq!(page.next, Some(PageCursor::Offset(2)));
    }

    #[tokio::test]
    async fn default_fetch_page_stops_on_short_page() {
        let driver = FixtureDriver { total: 3 };

        let request = PageRequest {
            query: String::new(),
            batch_size: 2,
            cursor: PageCursor::Offset(2),
        };
        let page = driver.fetch_page(&request).await.expect("last page");

        assert_eq!(page.records.len(), 1);
        assert_eq!(page.next, None);
    }

    #[tokio::test]
    async fn batch_reader_collects_every_page() {
        let driver = FixtureDriver { total: 5 };

        let reader =
            crate::pagination::BatchReader::new(&driver, "", 2).expect("valid batch size");
        let all = reader.collect_all().await.expect("collects");

        assert_eq!(all.len(), 5);
        assert_eq!(all[4].get("id"), Some(&Value::from(4)));
    }

    #[test]
    fn batch_reader_rejects_oversized_batch() {
        let driver = FixtureDriver { total: 0 };

        let err = crate::pagination::BatchReader::new(&driver, "", 500)
            .err()
            .expect("over the page cap");
        assert_eq!(err.kind(), crate::ErrorKind::Validation);
    }
}
