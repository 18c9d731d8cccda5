//! Bibliographic metadata lookup by ISBN (openBD, or any other provider).

pub mod openbd;

use std::future::Future;

use serde::Serialize;

use crate::error::LookupError;

pub trait MetadataProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Look up one ISBN. "No data" is a successful lookup with
    /// `found == false`, never an error.
    fn lookup_isbn(&self, isbn: &str) -> impl Future<Output = Result<BookSummary, LookupError>> + Send;
}

/// Title and cover of a book.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BookSummary {
    pub title: String,
    pub cover_url: String,
    pub found: bool,
}

impl BookSummary {
    pub fn not_found() -> Self {
        Self::default()
    }
}
