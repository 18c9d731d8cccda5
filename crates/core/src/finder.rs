//! One entry point for everything known about an ISBN.

use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::availability::{AvailabilityClient, NormalizedResult, SearchRequest};
use crate::config::AppConfig;
use crate::error::{BenibookError, LookupError, SearchError};
use crate::lookup::openbd::OpenBdProvider;
use crate::lookup::{BookSummary, MetadataProvider};
use crate::progress::PollObserver;

/// Bibliographic data and library holdings for one ISBN.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookLookup {
    pub book: BookSummary,
    pub availability: NormalizedResult,
}

/// Calls the metadata provider and the availability service independently.
pub struct BookFinder<P = OpenBdProvider> {
    metadata: P,
    availability: AvailabilityClient,
}

impl BookFinder<OpenBdProvider> {
    pub fn new() -> Self {
        Self::with_parts(OpenBdProvider::new(), AvailabilityClient::new())
    }

    /// Build from the hosts in `config`.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::with_parts(
            OpenBdProvider::with_host(&config.metadata.host),
            AvailabilityClient::with_host(&config.availability.host),
        )
    }
}

impl Default for BookFinder<OpenBdProvider> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: MetadataProvider> BookFinder<P> {
    pub fn with_parts(metadata: P, availability: AvailabilityClient) -> Self {
        Self { metadata, availability }
    }

    /// Report availability searches to `observer`.
    pub fn with_observer(mut self, observer: Arc<dyn PollObserver>) -> Self {
        self.availability = self.availability.with_observer(observer);
        self
    }

    pub async fn summary(&self, isbn: &str) -> Result<BookSummary, LookupError> {
        self.metadata.lookup_isbn(isbn).await
    }

    /// Title, or an empty string when the provider has no record.
    pub async fn title(&self, isbn: &str) -> Result<String, LookupError> {
        Ok(self.summary(isbn).await?.title)
    }

    /// Cover image URL, or an empty string when the provider has no record.
    pub async fn cover_url(&self, isbn: &str) -> Result<String, LookupError> {
        Ok(self.summary(isbn).await?.cover_url)
    }

    pub async fn library_collections(
        &self,
        request: &SearchRequest,
        cancel: &CancellationToken,
    ) -> Result<NormalizedResult, SearchError> {
        self.availability.search_until_cancelled(request, cancel).await
    }

    /// Summary and holdings for `request.isbn`. An invalid request fails
    /// before either service is contacted.
    pub async fn lookup(
        &self,
        request: &SearchRequest,
        cancel: &CancellationToken,
    ) -> Result<BookLookup, BenibookError> {
        request.validate()?;
        let book = self.summary(&request.isbn).await?;
        let availability = self.library_collections(request, cancel).await?;
        Ok(BookLookup { book, availability })
    }
}
