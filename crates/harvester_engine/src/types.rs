use std::time::Duration;

use harvester_core::{FailureKind, PageNumber, Pagination};

/// Progress notifications emitted while a harvest runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HarvestEvent {
    FirstPageFetched {
        items: usize,
        pagination: Pagination,
    },
    WorkersPlanned {
        workers: usize,
        total_pages: PageNumber,
        remaining: Option<u32>,
    },
    RetryScheduled {
        page: PageNumber,
        attempt: u32,
        delay: Duration,
        kind: FailureKind,
    },
    PageCompleted {
        page: PageNumber,
        items: usize,
    },
    PageFailed {
        page: PageNumber,
        message: String,
    },
}
