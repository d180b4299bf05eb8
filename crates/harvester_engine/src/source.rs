use harvester_core::{FetchError, ListRequest, Page, PageNumber, RateSnapshot};

/// Remote collection that can be listed one page at a time.
///
/// Implementations perform exactly one request per call and never retry;
/// retry policy lives in the harvester. Errors must be tagged with the
/// matching [`harvester_core::FailureKind`].
#[async_trait::async_trait]
pub trait PageSource: Send + Sync {
    type Item: Send + 'static;

    async fn list_page(
        &self,
        request: &ListRequest,
        page: PageNumber,
        per_page: u32,
    ) -> Result<Page<Self::Item>, FetchError>;

    async fn rate_limit(&self) -> Result<RateSnapshot, FetchError>;
}
