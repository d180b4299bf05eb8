use std::time::Duration;

use harvester_core::{Backoff, FetchOptions, RATE_LIMIT_COOLDOWN};
use pretty_assertions::assert_eq;

#[test]
fn zero_values_fall_back_to_defaults() {
    let options = FetchOptions {
        max_workers: 0,
        retry_attempts: 0,
        initial_backoff: Duration::ZERO,
        max_backoff: Duration::ZERO,
        rate_limit_cooldown: Duration::ZERO,
        fail_fast_on_permanent: false,
    }
    .normalized();

    assert_eq!(options, FetchOptions::default());
    assert_eq!(options.max_workers, 10);
    assert_eq!(options.retry_attempts, 3);
    assert_eq!(options.initial_backoff, Duration::from_secs(1));
    assert_eq!(options.rate_limit_cooldown, RATE_LIMIT_COOLDOWN);
}

#[test]
fn explicit_values_are_kept() {
    let options = FetchOptions {
        max_workers: 5,
        retry_attempts: 2,
        initial_backoff: Duration::from_millis(100),
        fail_fast_on_permanent: true,
        ..FetchOptions::default()
    }
    .normalized();

    assert_eq!(options.max_workers, 5);
    assert_eq!(options.retry_attempts, 2);
    assert_eq!(options.initial_backoff, Duration::from_millis(100));
    assert!(options.fail_fast_on_permanent);
    assert_eq!(options.max_attempts(), 3);
}

#[test]
fn backoff_ceiling_never_undercuts_initial_delay() {
    let options = FetchOptions {
        initial_backoff: Duration::from_secs(5),
        max_backoff: Duration::from_secs(2),
        ..FetchOptions::default()
    }
    .normalized();

    assert_eq!(options.max_backoff, Duration::from_secs(5));
}

#[test]
fn backoff_doubles_until_ceiling() {
    let delays: Vec<_> = Backoff::new(Duration::from_millis(100), Duration::from_millis(500))
        .take(5)
        .collect();
    assert_eq!(
        delays,
        vec![
            Duration::from_millis(100),
            Duration::from_millis(200),
            Duration::from_millis(400),
            Duration::from_millis(500),
            Duration::from_millis(500),
        ]
    );
}
