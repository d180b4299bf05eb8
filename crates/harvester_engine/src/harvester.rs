use std::collections::BTreeSet;
use std::sync::Arc;

use engine_logging::{engine_info, engine_warn};
use harvester_core::{
    estimate_workers, Aggregator, FailureKind, FetchError, FetchOptions, Harvest, ListRequest,
    Page, PageNumber, PageResult, Pagination, RateSnapshot, FIRST_PAGE, PER_PAGE,
};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::pool::run_pool;
use crate::retry::{fetch_page_with_retry, RunContext};
use crate::{HarvestEvent, NoopProgressSink, PageSource, ProgressSink, Sleeper, TokioSleeper};

#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("failed to fetch first page of {request}: {source}")]
    FirstPage { request: String, source: FetchError },
    #[error("harvest cancelled before the first page completed")]
    Cancelled,
}

/// Retrieves every page of a paginated collection.
///
/// Page 1 is fetched once without retry and decides the plan. Numbered
/// pagination fans pages 2..=N out to a worker pool sized from the rate
/// budget; next-link-only pagination is walked one page at a time. Later
/// page failures end up as warnings in the returned [`Harvest`], as does a
/// next link that page numbers cannot reach.
pub struct Harvester<S: PageSource> {
    source: Arc<S>,
    options: FetchOptions,
    sleeper: Arc<dyn Sleeper>,
    sink: Arc<dyn ProgressSink>,
    cancel: CancellationToken,
}

impl<S> Harvester<S>
where
    S: PageSource + 'static,
{
    pub fn new(source: S, options: FetchOptions) -> Self {
        Self::from_shared(Arc::new(source), options)
    }

    pub fn from_shared(source: Arc<S>, options: FetchOptions) -> Self {
        Self {
            source,
            options: options.normalized(),
            sleeper: Arc::new(TokioSleeper),
            sink: Arc::new(NoopProgressSink),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that stops the run between attempts when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn options(&self) -> &FetchOptions {
        &self.options
    }

    pub async fn fetch_all_closed(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<Harvest<S::Item>, HarvestError> {
        self.harvest(&ListRequest::closed(owner, repo)).await
    }

    pub async fn harvest(&self, request: &ListRequest) -> Result<Harvest<S::Item>, HarvestError> {
        if self.cancel.is_cancelled() {
            return Err(HarvestError::Cancelled);
        }

        let first = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(HarvestError::Cancelled),
            first = self.source.list_page(request, FIRST_PAGE, PER_PAGE) => first,
        };
        let Page { items, meta } = first.map_err(|source| match source.kind {
            FailureKind::Cancelled => HarvestError::Cancelled,
            _ => HarvestError::FirstPage {
                request: request.to_string(),
                source,
            },
        })?;

        let pagination = meta.pagination();
        engine_info!(
            "Fetched page 1 of {}: {} items, {:?}",
            request,
            items.len(),
            pagination
        );
        self.sink.emit(HarvestEvent::FirstPageFetched {
            items: items.len(),
            pagination,
        });

        let harvest = match pagination {
            Pagination::Single => Aggregator::new(items, std::iter::empty()).finish(0),
            Pagination::Cursor => {
                let mut aggregator = Aggregator::new(items, std::iter::empty());
                if let Some(link) = meta.next_cursor.as_deref() {
                    self.truncate(&mut aggregator, FIRST_PAGE, link);
                }
                aggregator.finish(0)
            }
            Pagination::Numbered { total_pages } => {
                self.harvest_parallel(request, items, total_pages, meta.rate)
                    .await
            }
            Pagination::Sequential { next_page } => {
                self.harvest_sequential(request, items, next_page).await
            }
        };

        self.report(request, &harvest);
        Ok(harvest)
    }

    async fn harvest_parallel(
        &self,
        request: &ListRequest,
        first_items: Vec<S::Item>,
        total_pages: PageNumber,
        header_rate: Option<RateSnapshot>,
    ) -> Harvest<S::Item> {
        let queried = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            queried = self.source.rate_limit() => Some(queried),
        };
        let snapshot = match queried {
            None => {
                engine_info!("Cancelled while querying rate limits");
                header_rate
            }
            Some(Ok(rate)) => {
                engine_info!(
                    "Rate limit: {}/{} remaining, resets at {}",
                    rate.remaining,
                    rate.limit,
                    rate.reset_at.to_rfc3339()
                );
                Some(rate)
            }
            Some(Err(err)) if header_rate.is_some() => {
                engine_warn!(
                    "Failed to get rate limits, using page 1 rate headers: {}",
                    err
                );
                header_rate
            }
            Some(Err(err)) => {
                engine_warn!("Failed to get rate limits, using configured workers: {}", err);
                None
            }
        };

        let workers = estimate_workers(self.options.max_workers, snapshot.as_ref());
        engine_info!(
            "Fetching pages 2..={} of {} with {} workers",
            total_pages,
            request,
            workers
        );
        self.sink.emit(HarvestEvent::WorkersPlanned {
            workers,
            total_pages,
            remaining: snapshot.map(|rate| rate.remaining),
        });

        let pages = (FIRST_PAGE + 1)..=total_pages;
        let mut aggregator = Aggregator::new(first_items, pages.clone());
        let mut results = run_pool(
            self.source.clone(),
            Arc::new(request.clone()),
            Arc::new(self.options.clone()),
            self.context(),
            pages,
            workers,
        );
        while let Some(result) = results.recv().await {
            self.absorb(&mut aggregator, result);
        }
        aggregator.finish(workers)
    }

    async fn harvest_sequential(
        &self,
        request: &ListRequest,
        first_items: Vec<S::Item>,
        next_page: PageNumber,
    ) -> Harvest<S::Item> {
        engine_info!(
            "{} reports no last page; walking pages from {} sequentially",
            request,
            next_page
        );
        let ctx = self.context();
        let mut aggregator = Aggregator::new(first_items, std::iter::empty());
        let mut visited = BTreeSet::from([FIRST_PAGE]);
        let mut next = Some(next_page);

        while let Some(page) = next.take() {
            if !visited.insert(page) {
                engine_warn!("Page {} was already fetched; stopping pagination", page);
                break;
            }
            aggregator.expect(page);
            match fetch_page_with_retry(self.source.as_ref(), request, page, &self.options, &ctx)
                .await
            {
                Ok(Page { items, meta }) => {
                    next = meta.next_page;
                    self.absorb(&mut aggregator, PageResult::success(page, items));
                    if let (None, Some(link)) = (next, meta.next_cursor.as_deref()) {
                        self.truncate(&mut aggregator, page, link);
                    }
                }
                Err(err) => self.absorb(&mut aggregator, PageResult::failure(page, err)),
            }
        }
        aggregator.finish(1)
    }

    fn absorb(&self, aggregator: &mut Aggregator<S::Item>, result: PageResult<S::Item>) {
        let page = result.page;
        let item_count = result.outcome.as_ref().map(Vec::len).ok();
        match aggregator.absorb(result) {
            None => self.sink.emit(HarvestEvent::PageCompleted {
                page,
                items: item_count.unwrap_or_default(),
            }),
            Some(warning) => self.sink.emit(HarvestEvent::PageFailed {
                page,
                message: warning.message.clone(),
            }),
        }
    }

    fn truncate(&self, aggregator: &mut Aggregator<S::Item>, last_page: PageNumber, link: &str) {
        let warning = aggregator.truncate_after(last_page, link);
        self.sink.emit(HarvestEvent::PageFailed {
            page: warning.page,
            message: warning.message.clone(),
        });
    }

    fn report(&self, request: &ListRequest, harvest: &Harvest<S::Item>) {
        if !harvest.warnings.is_empty() {
            engine_warn!("{} pages failed to fetch", harvest.warnings.len());
            for warning in &harvest.warnings {
                engine_warn!("  - {}", warning);
            }
        }
        engine_info!(
            "Harvested {} items across {} pages of {}",
            harvest.items.len(),
            harvest.total_pages,
            request
        );
    }

    fn context(&self) -> RunContext {
        RunContext {
            sleeper: self.sleeper.clone(),
            sink: self.sink.clone(),
            cancel: self.cancel.clone(),
        }
    }
}
