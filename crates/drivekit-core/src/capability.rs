use std::fmt::{Display, Formatter};

use serde::Serialize;

/// How a driver pages through large result sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PaginationStyle {
    /// No pagination support.
    None,
    /// LIMIT/OFFSET style skip counts.
    Offset,
    /// Opaque continuation token.
    Cursor,
    /// 1-based page numbers.
    PageNumber,
    /// Page numbers for plain reads, keyset tokens for batch reads.
    Hybrid,
}

impl PaginationStyle {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Offset => "offset",
            Self::Cursor => "cursor",
            Self::PageNumber => "page_number",
            Self::Hybrid => "hybrid",
        }
    }
}

impl Display for PaginationStyle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static description of what a driver supports. Constructed once per driver
/// instance and never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DriverCapabilities {
    pub read: bool,
    pub write: bool,
    pub update: bool,
    pub delete: bool,
    pub batch_operations: bool,
    pub streaming: bool,
    pub pagination: PaginationStyle,
    pub query_language: Option<&'static str>,
    pub max_page_size: Option<usize>,
    pub supports_transactions: bool,
    pub supports_relationships: bool,
}

impl DriverCapabilities {
    /// Read-only baseline; drivers opt in to everything else.
    pub const fn read_only(pagination: PaginationStyle, max_page_size: Option<usize>) -> Self {
        Self {
            read: true,
            write: false,
            update: false,
            delete: false,
            batch_operations: false,
            streaming: false,
            pagination,
            query_language: None,
            max_page_size,
            supports_transactions: false,
            supports_relationships: false,
        }
    }

    pub const fn with_write(mut self) -> Self {
        self.write = true;
        self
    }

    pub const fn with_update(mut self) -> Self {
        self.update = true;
        self
    }

    pub const fn with_delete(mut self) -> Self {
        self.delete = true;
        self
    }

    pub const fn with_batch_operations(mut self) -> Self {
        self.batch_operations = true;
        self
    }

    pub const fn with_streaming(mut self) -> Self {
        self.streaming = true;
        self
    }

    pub const fn with_query_language(mut self, language: &'static str) -> Self {
        self.query_language = Some(language);
        self
    }

    pub const fn with_relationships(mut self) -> Self {
        self.supports_relationships = true;
        self
    }

    pub fn supported_operations(self) -> Vec<&'static str> {
        let mut values = Vec::with_capacity(6);
        if self.read {
            values.push("read");
        }
        if self.write {
            values.push("write");
        }
        if self.update {
            values.push("update");
        }
        if self.delete {
            values.push("delete");
        }
        if self.batch_operations {
            values.push("batch_operations");
        }
        if self.streaming {
            values.push("streaming");
        }
        values
    }
}
