use std::sync::Arc;
use std::time::Duration;

use engine_logging::{engine_debug, engine_warn};
use harvester_core::{
    Backoff, FailureKind, FetchOptions, ListRequest, Page, PageError, PageNumber, PER_PAGE,
};
use tokio_util::sync::CancellationToken;

use crate::{HarvestEvent, PageSource, ProgressSink, Sleeper};

/// Collaborators shared by every page fetch of one run.
#[derive(Clone)]
pub struct RunContext {
    pub sleeper: Arc<dyn Sleeper>,
    pub sink: Arc<dyn ProgressSink>,
    pub cancel: CancellationToken,
}

impl RunContext {
    /// Sleep unless cancelled first. Returns `false` on cancellation.
    async fn pause(&self, duration: Duration) -> bool {
        if duration.is_zero() {
            return !self.cancel.is_cancelled();
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            _ = self.sleeper.sleep(duration) => true,
        }
    }
}

/// Fetch one page, retrying failures with exponential backoff.
///
/// Makes at most `retry_attempts + 1` calls to the source. A rate-limited
/// failure adds `rate_limit_cooldown` before the next attempt. With
/// `fail_fast_on_permanent` a 4xx other than rate limiting ends the page at
/// once; otherwise it is retried like any other failure.
pub async fn fetch_page_with_retry<S>(
    source: &S,
    request: &ListRequest,
    page: PageNumber,
    options: &FetchOptions,
    ctx: &RunContext,
) -> Result<Page<S::Item>, PageError>
where
    S: PageSource + ?Sized,
{
    let max_attempts = options.max_attempts();
    let mut backoff = Backoff::new(options.initial_backoff, options.max_backoff);
    let mut attempts = 0;

    loop {
        if ctx.cancel.is_cancelled() {
            return Err(PageError::Cancelled { page, attempts });
        }

        attempts += 1;
        let err = match source.list_page(request, page, PER_PAGE).await {
            Ok(fetched) => {
                if attempts > 1 {
                    engine_debug!("Page {} succeeded on attempt {}", page, attempts);
                }
                return Ok(fetched);
            }
            Err(err) => err,
        };

        if err.kind == FailureKind::Cancelled {
            return Err(PageError::Cancelled { page, attempts });
        }
        if options.fail_fast_on_permanent && err.kind.is_permanent() {
            return Err(PageError::Permanent {
                page,
                attempts,
                source: err,
            });
        }
        if attempts >= max_attempts {
            return Err(PageError::Exhausted {
                page,
                attempts,
                source: err,
            });
        }

        let cooldown = if err.kind.is_rate_limited() {
            options.rate_limit_cooldown
        } else {
            Duration::ZERO
        };
        let delay = backoff.next_delay();
        if cooldown.is_zero() {
            engine_debug!(
                "Page {} attempt {}/{} failed: {}; retrying in {:?}",
                page,
                attempts,
                max_attempts,
                err,
                delay
            );
        } else {
            engine_warn!(
                "Page {} hit the rate limit ({}); cooling down {:?} before retrying",
                page,
                err,
                cooldown + delay
            );
        }
        ctx.sink.emit(HarvestEvent::RetryScheduled {
            page,
            attempt: attempts,
            delay: cooldown + delay,
            kind: err.kind.clone(),
        });

        if !ctx.pause(cooldown).await || !ctx.pause(delay).await {
            return Err(PageError::Cancelled { page, attempts });
        }
    }
}
