//! Harvester core: pure pagination planning, retry schedule and result aggregation.
mod aggregate;
mod backoff;
mod budget;
mod failure;
mod link;
mod options;
mod types;

pub use aggregate::{Aggregator, Harvest, PageWarning};
pub use backoff::Backoff;
pub use budget::{estimate_workers, COST_PER_WORKER};
pub use failure::{FailureKind, FetchError, PageError};
pub use link::{parse_link_header, LinkPages};
pub use options::{
    FetchOptions, DEFAULT_INITIAL_BACKOFF, DEFAULT_MAX_BACKOFF, DEFAULT_MAX_WORKERS,
    DEFAULT_RETRY_ATTEMPTS, PER_PAGE, RATE_LIMIT_COOLDOWN,
};
pub use types::{
    IssueState, ListRequest, Page, PageJob, PageMeta, PageNumber, PageResult, Pagination,
    RateSnapshot, FIRST_PAGE,
};
