//! Page/limit pagination with a total-pages envelope.
//!
//! ```rust,ignore
//! let page = PageArgs::new(2, 20).validate()?;
//! let items = ModeratedItem::find_page(&query, &page, pool).await?;
//! let total = ModeratedItem::count(&query, pool).await?;
//! let envelope = Paginated::new(items, total, &page);
//! ```

use serde::{Deserialize, Serialize};

use crate::common::error::{ModerationError, Result};

/// Default page size when the caller does not ask for one.
pub const DEFAULT_LIMIT: u32 = 20;

/// Upper bound on page size.
pub const MAX_LIMIT: u32 = 100;

/// Raw pagination input (1-based page).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PageArgs {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl PageArgs {
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: Some(page),
            limit: Some(limit),
        }
    }

    /// Validate and apply defaults. Page 0 is rejected; limits are clamped to 1..=100.
    pub fn validate(&self) -> Result<ValidatedPage> {
        self.validate_with(DEFAULT_LIMIT)
    }

    /// Like [`PageArgs::validate`], with a configured default page size.
    pub fn validate_with(&self, default_limit: u32) -> Result<ValidatedPage> {
        let page = self.page.unwrap_or(1);
        if page == 0 {
            return Err(ModerationError::Validation(
                "page numbers start at 1".to_string(),
            ));
        }
        let limit = self.limit.unwrap_or(default_limit).clamp(1, MAX_LIMIT);
        Ok(ValidatedPage { page, limit })
    }
}

/// Validated pagination arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatedPage {
    pub page: u32,
    pub limit: u32,
}

impl ValidatedPage {
    /// SQL `LIMIT`.
    pub fn limit(&self) -> i64 {
        i64::from(self.limit)
    }

    /// SQL `OFFSET`.
    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.limit)
    }
}

/// Response envelope for list operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub limit: u32,
    pub total: i64,
    pub total_pages: u32,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, total: i64, page: &ValidatedPage) -> Self {
        let total = total.max(0);
        let total_pages = ((total + i64::from(page.limit) - 1) / i64::from(page.limit)) as u32;
        Self {
            items,
            page: page.page,
            limit: page.limit,
            total,
            total_pages,
        }
    }

    pub fn empty(page: &ValidatedPage) -> Self {
        Self::new(Vec::new(), 0, page)
    }
}
