use std::time::Duration;

/// Items requested per page. Large pages keep the number of round trips low.
pub const PER_PAGE: u32 = 200;

pub const DEFAULT_MAX_WORKERS: usize = 10;
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
pub const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_secs(1);
/// Ceiling for the doubling backoff between retries.
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(60);
/// Extra pause taken after a rate-limited response, on top of the regular backoff.
pub const RATE_LIMIT_COOLDOWN: Duration = Duration::from_secs(60);

/// Tuning knobs for one harvest run.
///
/// Zero values mean "unset" and are replaced by the defaults in
/// [`FetchOptions::normalized`]. The harvester normalizes once before the
/// first request and never changes the options afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOptions {
    pub max_workers: usize,
    pub retry_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub rate_limit_cooldown: Duration,
    /// Stop retrying a page on 4xx responses other than rate limiting.
    /// Off by default: every failure consumes the full retry budget.
    pub fail_fast_on_permanent: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
            rate_limit_cooldown: RATE_LIMIT_COOLDOWN,
            fail_fast_on_permanent: false,
        }
    }
}

impl FetchOptions {
    /// Replace every unset (zero) field with its default.
    ///
    /// The backoff ceiling is raised to the initial backoff when configured
    /// below it, so the first retry always waits the requested initial delay.
    pub fn normalized(self) -> Self {
        let defaults = Self::default();
        let initial_backoff = non_zero_or(self.initial_backoff, defaults.initial_backoff);
        let max_backoff = non_zero_or(self.max_backoff, defaults.max_backoff).max(initial_backoff);
        Self {
            max_workers: if self.max_workers == 0 {
                defaults.max_workers
            } else {
                self.max_workers
            },
            retry_attempts: if self.retry_attempts == 0 {
                defaults.retry_attempts
            } else {
                self.retry_attempts
            },
            initial_backoff,
            max_backoff,
            rate_limit_cooldown: non_zero_or(self.rate_limit_cooldown, defaults.rate_limit_cooldown),
            fail_fast_on_permanent: self.fail_fast_on_permanent,
        }
    }

    /// Upper bound on underlying fetch calls for a single page.
    pub fn max_attempts(&self) -> u32 {
        self.retry_attempts.saturating_add(1)
    }
}

fn non_zero_or(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}
