//! Integration tests for the one-shot and repeating timers.
//!
//! Uses `start_paused = true` so Tokio's clock only moves when every task
//! is idle; sleeps resolve instantly and deterministically.

use std::time::Duration;

use tether_timer::{OneShotTimer, RepeatingTimer};
use tokio::time::{self, Instant};

// =========================================================================
// OneShotTimer
// =========================================================================

#[test]
fn test_one_shot_starts_disarmed() {
    let t: OneShotTimer<u64> = OneShotTimer::new();
    assert!(!t.is_armed());
    assert_eq!(t.remaining(), None);
}

#[tokio::test(start_paused = true)]
async fn test_one_shot_fires_after_delay_with_token() {
    let mut t = OneShotTimer::new();
    let start = Instant::now();
    t.arm(Duration::from_millis(500), 7u64);
    assert!(t.is_armed());

    let token = t.fired().await;
    assert_eq!(token, 7);
    assert_eq!(start.elapsed(), Duration::from_millis(500));
    assert!(!t.is_armed(), "timer disarms itself after firing");
}

#[tokio::test(start_paused = true)]
async fn test_disarmed_one_shot_pends_forever() {
    let mut t: OneShotTimer<()> = OneShotTimer::new();
    let result = time::timeout(Duration::from_secs(60), t.fired()).await;
    assert!(result.is_err(), "disarmed timer should never fire");
}

#[tokio::test(start_paused = true)]
async fn test_cancel_prevents_firing_and_is_idempotent() {
    let mut t = OneShotTimer::new();
    t.arm(Duration::from_millis(100), "reconnect");

    assert!(t.cancel());
    assert!(!t.cancel());
    assert!(!t.is_armed());

    let result = time::timeout(Duration::from_secs(1), t.fired()).await;
    assert!(result.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_rearm_replaces_token_and_deadline() {
    let mut t = OneShotTimer::new();
    let start = Instant::now();
    t.arm(Duration::from_millis(100), 1u64);
    t.arm(Duration::from_millis(300), 2u64);

    assert_eq!(t.fired().await, 2);
    assert_eq!(start.elapsed(), Duration::from_millis(300));
}

#[tokio::test(start_paused = true)]
async fn test_dropped_wait_keeps_timer_armed() {
    let mut t = OneShotTimer::new();
    t.arm(Duration::from_millis(1000), 9u64);

    // Lose the race against a shorter sleep, as a select! branch would.
    let early = time::timeout(Duration::from_millis(400), t.fired()).await;
    assert!(early.is_err());
    assert!(t.is_armed());
    assert_eq!(t.remaining(), Some(Duration::from_millis(600)));

    assert_eq!(t.fired().await, 9);
}

// =========================================================================
// RepeatingTimer
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_repeating_fires_on_period() {
    let mut t = RepeatingTimer::new();
    let start = Instant::now();
    t.arm(Duration::from_millis(10_000));

    assert_eq!(t.tick().await, 1);
    assert_eq!(start.elapsed(), Duration::from_millis(10_000));
    assert_eq!(t.tick().await, 2);
    assert_eq!(start.elapsed(), Duration::from_millis(20_000));
    assert_eq!(t.fire_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_disarmed_repeating_pends_forever() {
    let mut t = RepeatingTimer::new();
    t.arm(Duration::from_millis(50));
    assert!(t.disarm());
    assert!(!t.disarm());
    assert_eq!(t.period(), None);

    let result = time::timeout(Duration::from_secs(5), t.tick()).await;
    assert!(result.is_err(), "disarmed timer should pend");
}

#[tokio::test(start_paused = true)]
async fn test_rearm_restarts_cadence() {
    let mut t = RepeatingTimer::new();
    t.arm(Duration::from_millis(100));
    t.tick().await;

    time::advance(Duration::from_millis(60)).await;
    let rearmed_at = Instant::now();
    t.arm(Duration::from_millis(100));
    assert_eq!(t.fire_count(), 0);

    assert_eq!(t.tick().await, 1);
    assert_eq!(rearmed_at.elapsed(), Duration::from_millis(100));
}

#[tokio::test(start_paused = true)]
async fn test_stall_skips_missed_firings() {
    let mut t = RepeatingTimer::new();
    t.arm(Duration::from_millis(100));

    // The owner was busy for 350ms; only one firing is delivered.
    time::advance(Duration::from_millis(350)).await;
    assert_eq!(t.tick().await, 1);

    let after = Instant::now();
    assert_eq!(t.tick().await, 2);
    assert_eq!(after.elapsed(), Duration::from_millis(100));
}

#[tokio::test(start_paused = true)]
async fn test_zero_period_is_clamped() {
    let mut t = RepeatingTimer::new();
    t.arm(Duration::ZERO);
    assert_eq!(t.period(), Some(Duration::from_millis(1)));
}
