use std::ops::RangeInclusive;
use std::sync::Arc;

use engine_logging::{engine_error, engine_trace};
use harvester_core::{FetchOptions, ListRequest, PageJob, PageNumber, PageResult};
use tokio::sync::mpsc;

use crate::retry::{fetch_page_with_retry, RunContext};
use crate::PageSource;

/// Fetch `pages` with exactly `workers` concurrent tasks.
///
/// Every page is queued before the first worker starts, and each worker
/// sends exactly one result per job it takes. The returned receiver yields
/// `None` once every worker has exited, since each worker owns a sender
/// clone and the original is dropped here.
pub fn run_pool<S>(
    source: Arc<S>,
    request: Arc<ListRequest>,
    options: Arc<FetchOptions>,
    ctx: RunContext,
    pages: RangeInclusive<PageNumber>,
    workers: usize,
) -> mpsc::Receiver<PageResult<S::Item>>
where
    S: PageSource + 'static,
{
    let job_count = pages.clone().count().max(1);
    let (job_tx, job_rx) = async_channel::bounded::<PageJob>(job_count);
    let (result_tx, result_rx) = mpsc::channel(job_count);

    for page in pages {
        // Capacity matches the job count, so this never finds the queue full.
        if let Err(err) = job_tx.try_send(PageJob { page }) {
            engine_error!("Could not queue page {}: {}", page, err);
        }
    }
    job_tx.close();

    for worker_id in 0..workers.max(1) {
        let source = source.clone();
        let request = request.clone();
        let options = options.clone();
        let ctx = ctx.clone();
        let jobs = job_rx.clone();
        let results = result_tx.clone();

        tokio::spawn(async move {
            while let Ok(job) = jobs.recv().await {
                engine_trace!("Worker {} took page {}", worker_id, job.page);
                let outcome =
                    fetch_page_with_retry(source.as_ref(), &request, job.page, &options, &ctx)
                        .await
                        .map(|page| page.items);
                let result = PageResult {
                    page: job.page,
                    outcome,
                };
                if results.send(result).await.is_err() {
                    break;
                }
            }
        });
    }

    result_rx
}
