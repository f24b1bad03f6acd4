//! Integration tests for the fixed-period scheduler.
//!
//! Runs with paused Tokio time so `sleep_until` resolves as soon as the
//! runtime auto-advances the clock.

use std::time::Duration;

use peerboard_tick::{TickConfig, TickPolicy, TickScheduler};

fn heartbeat_config() -> TickConfig {
    TickConfig::every(Duration::from_secs(10))
}

#[test]
fn test_default_config_never_ticks() {
    let cfg = TickConfig::default();
    assert_eq!(cfg.period, None);
    assert_eq!(cfg.policy, TickPolicy::Skip);
    assert!(TickScheduler::new(cfg).is_idle());
}

#[test]
fn test_zero_period_is_disabled() {
    let s = TickScheduler::new(TickConfig::every(Duration::ZERO));
    assert!(s.is_idle());
}

#[tokio::test(start_paused = true)]
async fn test_first_tick_after_one_period() {
    let start = tokio::time::Instant::now();
    let mut s = TickScheduler::new(heartbeat_config());

    let info = s.wait_for_tick().await;
    assert_eq!(info.tick, 1);
    assert_eq!(info.dt, Duration::from_secs(10));
    assert_eq!(start.elapsed(), Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn test_fire_immediately_skips_first_wait() {
    let start = tokio::time::Instant::now();
    let mut s = TickScheduler::new(TickConfig {
        fire_immediately: true,
        ..heartbeat_config()
    });

    s.wait_for_tick().await;
    assert_eq!(start.elapsed(), Duration::ZERO);
    s.wait_for_tick().await;
    assert_eq!(start.elapsed(), Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn test_ticks_increment_monotonically() {
    let mut s = TickScheduler::every(Duration::from_secs(1));
    for expected in 1..=5 {
        assert_eq!(s.wait_for_tick().await.tick, expected);
    }
    assert_eq!(s.tick_count(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_jitter_delays_first_tick_within_bound() {
    let start = tokio::time::Instant::now();
    let mut s = TickScheduler::new(TickConfig {
        initial_jitter: Duration::from_millis(500),
        ..heartbeat_config()
    });
    s.wait_for_tick().await;
    let waited = start.elapsed();
    assert!(waited >= Duration::from_secs(10));
    assert!(waited < Duration::from_millis(10_500));
}

#[tokio::test(start_paused = true)]
async fn test_idle_scheduler_pends_forever() {
    let mut s = TickScheduler::idle();
    let result = tokio::time::timeout(Duration::from_secs(60), s.wait_for_tick()).await;
    assert!(result.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_pause_prevents_ticks_and_resume_restarts() {
    let mut s = TickScheduler::every(Duration::from_secs(1));
    s.wait_for_tick().await;

    s.pause();
    s.pause();
    assert!(s.is_paused());
    let result = tokio::time::timeout(Duration::from_secs(5), s.wait_for_tick()).await;
    assert!(result.is_err());

    s.resume();
    assert!(!s.is_paused());
    assert_eq!(s.wait_for_tick().await.tick, 2);
}

#[tokio::test(start_paused = true)]
async fn test_skip_policy_reports_missed_periods() {
    let mut s = TickScheduler::every(Duration::from_secs(1));
    s.wait_for_tick().await;

    // Owner is busy for 3.5 periods before polling again.
    tokio::time::advance(Duration::from_millis(3_500)).await;
    let info = s.wait_for_tick().await;
    assert!(info.overrun);
    assert_eq!(info.ticks_skipped, 2);
    assert_eq!(info.elapsed(), Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn test_drop_policy_keeps_cadence() {
    let mut s = TickScheduler::new(TickConfig {
        policy: TickPolicy::Drop,
        ..TickConfig::every(Duration::from_secs(1))
    });
    s.wait_for_tick().await;
    tokio::time::advance(Duration::from_millis(2_500)).await;

    let late = s.wait_for_tick().await;
    assert_eq!(late.ticks_skipped, 0);
    // The following tick was due in the past, so it fires at once.
    let start = tokio::time::Instant::now();
    s.wait_for_tick().await;
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_select_loop_stops_on_command() {
    let mut s = TickScheduler::every(Duration::from_millis(50));
    let (tx, mut rx) = tokio::sync::mpsc::channel::<&str>(1);

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(160)).await;
        tx.send("leave").await.ok();
    });

    let mut fired = 0u64;
    loop {
        tokio::select! {
            Some(cmd) = rx.recv() => {
                assert_eq!(cmd, "leave");
                break;
            }
            info = s.wait_for_tick() => {
                fired += 1;
                assert_eq!(info.tick, fired);
            }
        }
    }
    assert_eq!(fired, 3);
}
