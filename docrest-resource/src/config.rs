use serde::{Deserialize, Serialize};

use docrest_core::document::MAX_FIND_ROWS;

/// Per-handler settings for reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceConfig {
    /// Rows per page when a request gives no `$display`.
    pub page_size: usize,
    /// Cap on rows a single read materializes, unless the model declares its own.
    pub max_rows: usize,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            page_size: 20,
            max_rows: MAX_FIND_ROWS,
        }
    }
}

impl ResourceConfig {
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = max_rows;
        self
    }
}
