//! Fixed-period timer for Peerboard's cooperative loops.
//!
//! Heartbeats and match clocks are periodic tasks tied 1:1 to a session.
//! Each session actor owns one [`TickScheduler`] and polls it from its
//! `tokio::select!` loop, so dropping the actor cancels the timer with it:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = cmd_rx.recv() => { /* handle commands */ }
//!         info = heartbeat.wait_for_tick() => {
//!             broadcast_heartbeat();
//!         }
//!     }
//! }
//! ```
//!
//! A scheduler with no period (the default) never fires.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// What to do when the owner polls a tick late.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TickPolicy {
    /// Skip the missed ticks and schedule the next one from now. The
    /// skipped count is reported in [`TickInfo::ticks_skipped`].
    #[default]
    Skip,
    /// Keep the original cadence; the next tick fires at its planned time
    /// even if that is already in the past.
    Drop,
}

/// Configuration for one [`TickScheduler`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickConfig {
    /// Time between ticks. `None` means the scheduler never fires.
    pub period: Option<Duration>,
    /// Overrun handling policy.
    pub policy: TickPolicy,
    /// Random delay (0..max) added to the first tick so sessions started
    /// at the same instant do not fire in lockstep.
    pub initial_jitter: Duration,
    /// Fire the first tick right away instead of one period from now.
    pub fire_immediately: bool,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            period: None,
            policy: TickPolicy::default(),
            initial_jitter: Duration::ZERO,
            fire_immediately: false,
        }
    }
}

impl TickConfig {
    /// A config that ticks every `period` with default settings.
    pub fn every(period: Duration) -> Self {
        Self {
            period: Some(period),
            ..Default::default()
        }
    }

    /// Normalises out-of-range values. A zero period is treated as "never".
    pub fn validated(mut self) -> Self {
        if self.period == Some(Duration::ZERO) {
            warn!("tick period of zero would spin; disabling ticks");
            self.period = None;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Tick info
// ---------------------------------------------------------------------------

/// Information about a fired tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickInfo {
    /// Monotonically increasing tick number (starts at 1).
    pub tick: u64,
    /// The configured period.
    pub dt: Duration,
    /// `true` if this tick was polled noticeably late.
    pub overrun: bool,
    /// Whole periods that elapsed without a tick being reported.
    pub ticks_skipped: u64,
}

impl TickInfo {
    /// Time this tick accounts for, counting skipped periods.
    pub fn elapsed(&self) -> Duration {
        let n = u32::try_from(self.ticks_skipped.saturating_add(1)).unwrap_or(u32::MAX);
        self.dt.saturating_mul(n)
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Fixed-period tick scheduler. One per periodic concern per session.
#[derive(Debug)]
pub struct TickScheduler {
    config: TickConfig,
    tick_count: u64,
    next_tick: Option<Instant>,
    paused: bool,
}

impl TickScheduler {
    /// Creates a scheduler; the first tick is scheduled right away.
    pub fn new(config: TickConfig) -> Self {
        let config = config.validated();
        let next_tick = config.period.map(|period| {
            let jitter = if config.initial_jitter > Duration::ZERO {
                let max = config.initial_jitter.as_micros() as u64;
                Duration::from_micros(rand::rng().random_range(0..max))
            } else {
                Duration::ZERO
            };
            let first = if config.fire_immediately { Duration::ZERO } else { period };
            Instant::now() + first + jitter
        });

        match config.period {
            Some(period) => debug!(
                period_ms = period.as_millis() as u64,
                policy = ?config.policy,
                "tick scheduler created"
            ),
            None => debug!("tick scheduler created without a period"),
        }

        Self {
            config,
            tick_count: 0,
            next_tick,
            paused: false,
        }
    }

    /// A scheduler that ticks every `period`.
    pub fn every(period: Duration) -> Self {
        Self::new(TickConfig::every(period))
    }

    /// A scheduler that never fires.
    pub fn idle() -> Self {
        Self::new(TickConfig::default())
    }

    /// Waits until the next tick is due.
    ///
    /// Pends forever when there is no period or the scheduler is paused, so
    /// other `select!` branches keep running. Cancel-safe: dropping the
    /// future before it resolves leaves the schedule untouched.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        let (next, period) = match (self.next_tick, self.config.period) {
            (Some(next), Some(period)) if !self.paused => (next, period),
            _ => std::future::pending().await,
        };

        time::sleep_until(next).await;

        let now = Instant::now();
        self.tick_count += 1;

        let late_by = now.saturating_duration_since(next);
        let overrun = late_by > period / 10;
        let behind = (late_by.as_nanos() / period.as_nanos()) as u64;

        let (next_tick, ticks_skipped) = match self.config.policy {
            TickPolicy::Skip => {
                if behind > 0 {
                    warn!(
                        tick = self.tick_count,
                        skipped = behind,
                        "tick overrun, skipping ahead"
                    );
                }
                (now + period, behind)
            }
            TickPolicy::Drop => (next + period, 0),
        };
        self.next_tick = Some(next_tick);

        trace!(tick = self.tick_count, overrun, "tick fired");

        TickInfo {
            tick: self.tick_count,
            dt: period,
            overrun,
            ticks_skipped,
        }
    }

    /// Stops ticking until [`resume`](Self::resume). Idempotent.
    pub fn pause(&mut self) {
        if !self.paused {
            self.paused = true;
            debug!(tick = self.tick_count, "tick scheduler paused");
        }
    }

    /// Resumes after a pause. The next tick is one full period from now.
    pub fn resume(&mut self) {
        if self.paused {
            self.paused = false;
            if let Some(period) = self.config.period {
                self.next_tick = Some(Instant::now() + period);
            }
            debug!(tick = self.tick_count, "tick scheduler resumed");
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Whether this scheduler has no period and never fires.
    pub fn is_idle(&self) -> bool {
        self.config.period.is_none()
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn period(&self) -> Option<Duration> {
        self.config.period
    }
}
