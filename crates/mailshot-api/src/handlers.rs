//! API request handlers

pub mod admin;
pub mod attempts;
pub mod campaigns;
pub mod clients;
pub mod health;
pub mod messages;

use mailshot_common::{Error, Result};
use serde::Deserialize;

const MAX_PAGE_SIZE: i64 = 500;

/// Query parameters for paged listings
#[derive(Debug, Clone, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

impl Pagination {
    /// Checked `(limit, offset)`, with the limit capped at the largest page
    pub fn bounds(&self) -> Result<(i64, i64)> {
        if self.limit < 1 {
            return Err(Error::Validation("limit must be at least 1".to_string()));
        }
        if self.offset < 0 {
            return Err(Error::Validation("offset must not be negative".to_string()));
        }
        Ok((self.limit.min(MAX_PAGE_SIZE), self.offset))
    }
}
