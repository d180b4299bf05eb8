//! Harvester engine: page sources, retrying fetches and the concurrent harvest run.
mod github;
mod harvester;
mod issue;
mod persist;
mod pool;
mod progress;
mod retry;
mod sleep;
mod source;
mod types;

pub use github::{ClientSettings, GitHubClient};
pub use harvester::{HarvestError, Harvester};
pub use issue::{Issue, IssueLabel, IssueUser};
pub use persist::{ensure_output_dir, AtomicFileWriter, PersistError};
pub use pool::run_pool;
pub use progress::{ChannelProgressSink, NoopProgressSink, ProgressSink};
pub use retry::{fetch_page_with_retry, RunContext};
pub use sleep::{Sleeper, TokioSleeper};
pub use source::PageSource;
pub use types::HarvestEvent;
