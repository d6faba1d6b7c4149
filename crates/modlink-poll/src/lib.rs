//! Cooperative condition polling for modlink.
//!
//! Mods often need to wait for the host to reach some state (the player
//! logged in, a screen loaded) before doing anything. The host offers no
//! event for most of these, so we poll: check a predicate, sleep a short
//! interval, check again.
//!
//! Polling here never blocks a thread. Every wait is a `tokio::time::sleep`,
//! so other tasks on the same (possibly single-threaded) runtime keep
//! running between checks.
//!
//! # Integration
//!
//! ```ignore
//! let poller = Poller::default();
//! if poller.wait_for(|| host.in_chat_room(), || shutting_down()).await {
//!     messenger.send_packet("hello", None, None)?;
//! }
//! ```

use std::time::Duration;

use rand::Rng;
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Polling configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Delay between two checks of the condition. Default: 10 ms.
    pub interval: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Self::DEFAULT_INTERVAL,
        }
    }
}

impl PollConfig {
    /// Default delay between checks.
    pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(10);
    /// Shortest interval accepted.
    pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

    /// Creates a config with the given interval.
    pub fn with_interval(interval: Duration) -> Self {
        Self { interval }
    }

    /// Clamps out-of-range values.
    ///
    /// A zero interval would turn the poll loop into a busy spin that
    /// starves the runtime, so it is raised to [`Self::MIN_INTERVAL`].
    pub fn validated(mut self) -> Self {
        if self.interval < Self::MIN_INTERVAL {
            warn!(
                interval_us = self.interval.as_micros() as u64,
                "poll interval below minimum, clamping"
            );
            self.interval = Self::MIN_INTERVAL;
        }
        self
    }
}

/// Sleeps for `duration` without blocking the thread.
pub async fn sleep(duration: Duration) {
    tokio::time::sleep(duration).await;
}

// ---------------------------------------------------------------------------
// Poller
// ---------------------------------------------------------------------------

/// Waits for boolean conditions by polling them.
#[derive(Debug, Clone, Default)]
pub struct Poller {
    config: PollConfig,
}

impl Poller {
    /// Creates a poller. The config is validated first.
    pub fn new(config: PollConfig) -> Self {
        Self {
            config: config.validated(),
        }
    }

    /// The interval between checks.
    pub fn interval(&self) -> Duration {
        self.config.interval
    }

    /// Waits until `cond` holds or `cancel` does.
    ///
    /// `cond` is checked before `cancel`, and before the first sleep, so a
    /// condition that already holds returns immediately. Returns `true`
    /// when the condition was met and `false` when cancelled.
    pub async fn wait_for<C, X>(&self, mut cond: C, mut cancel: X) -> bool
    where
        C: FnMut() -> bool,
        X: FnMut() -> bool,
    {
        let mut checks: u64 = 0;
        loop {
            checks += 1;
            if cond() {
                trace!(checks, "poll condition met");
                return true;
            }
            if cancel() {
                debug!(checks, "poll cancelled");
                return false;
            }
            sleep(self.config.interval).await;
        }
    }

    /// Waits until `cond` holds, with no way to cancel.
    pub async fn wait_until<C>(&self, cond: C)
    where
        C: FnMut() -> bool,
    {
        self.wait_for(cond, || false).await;
    }
}

// ---------------------------------------------------------------------------
// Start delay
// ---------------------------------------------------------------------------

/// Random delay applied before a mod starts, so that many mods loading in
/// the same page do not all hit the host at the same instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartDelay {
    pub min: Duration,
    pub max: Duration,
}

impl Default for StartDelay {
    fn default() -> Self {
        Self {
            min: Duration::from_millis(3000),
            max: Duration::from_millis(6000),
        }
    }
}

impl StartDelay {
    /// A fixed delay (`min == max`).
    pub fn fixed(delay: Duration) -> Self {
        Self {
            min: delay,
            max: delay,
        }
    }

    /// Picks a delay in `[min, max]` at millisecond granularity.
    ///
    /// Swapped bounds are tolerated.
    pub fn sample(&self) -> Duration {
        let lo = self.min.min(self.max).as_millis() as u64;
        let hi = self.min.max(self.max).as_millis() as u64;
        Duration::from_millis(rand::rng().random_range(lo..=hi))
    }
}

/// Waits for `cond`, then a random [`StartDelay`], then runs `callback`.
pub async fn wait_for_start<C, F, T>(poller: &Poller, cond: C, delay: StartDelay, callback: F) -> T
where
    C: FnMut() -> bool,
    F: FnOnce() -> T,
{
    poller.wait_until(cond).await;
    let pause = delay.sample();
    debug!(delay_ms = pause.as_millis() as u64, "start condition met, delaying");
    sleep(pause).await;
    callback()
}
