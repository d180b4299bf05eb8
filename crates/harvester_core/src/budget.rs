use crate::types::RateSnapshot;

/// Requests each worker is assumed to need before the budget could run dry.
pub const COST_PER_WORKER: u32 = 5;

/// Choose how many workers the remaining rate budget can sustain.
///
/// Without a snapshot the configured maximum is used as-is. The result is
/// never below 1, so a tight budget degrades to serial fetching instead of
/// stalling.
pub fn estimate_workers(max_workers: usize, snapshot: Option<&RateSnapshot>) -> usize {
    let max_workers = max_workers.max(1);
    match snapshot {
        None => max_workers,
        Some(rate) => {
            let affordable = (rate.remaining / COST_PER_WORKER) as usize;
            affordable.min(max_workers).max(1)
        }
    }
}
