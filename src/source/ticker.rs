//! Synthetic progress ticker for the fetch phase.
//!
//! The remote hierarchical query offers no intermediate progress, so while
//! it is outstanding a concurrent task advances a percentage counter from a
//! floor toward a ceiling on a schedule that decelerates as wall-clock time
//! grows. Once the ceiling is reached the ticker holds there and re-emits a
//! "please wait" message on a slower fixed cadence until the real call
//! returns.
//!
//! The ticker shares exactly two things with the fetch: an atomic percent
//! counter and a cancellation token. [`ProgressTicker::stop`] cancels the
//! task **and awaits it**, so no tick can be observed after the fetch phase
//! moves on and percent never regresses.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::export::progress::{ExportPhase, ProgressEvent, ProgressSender};

/// Schedule constants for the synthetic ticker.
///
/// The numbers are empirically tuned estimates, not an SLA; they exist as
/// fields so callers can tighten them in tests.
#[derive(Debug, Clone)]
pub struct TickerConfig {
    /// Percent the ticker starts above (the Executing baseline)
    pub floor: u8,

    /// Percent the ticker never exceeds
    pub ceiling: u8,

    /// Tick interval while percent is low
    pub initial_tick: Duration,

    /// Deceleration steps: once percent passes a threshold, the interval
    /// from that step applies
    pub backoff: [(u8, Duration); 3],

    /// Cadence of the hold message after the ceiling is reached
    pub hold_tick: Duration,

    /// Elapsed time after which messages switch to the large-data-set
    /// wording
    pub long_run_after: Duration,
}

impl Default for TickerConfig {
    fn default() -> Self {
        Self {
            floor: 10,
            ceiling: 48,
            initial_tick: Duration::from_millis(500),
            backoff: [
                (20, Duration::from_millis(700)),
                (30, Duration::from_millis(1000)),
                (40, Duration::from_millis(1500)),
            ],
            hold_tick: Duration::from_secs(2),
            long_run_after: Duration::from_secs(30),
        }
    }
}

/// Handle to a spawned ticker task.
pub struct ProgressTicker {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl ProgressTicker {
    /// Spawn the ticker for one outstanding fetch.
    ///
    /// # Arguments
    /// * `progress` - Run progress channel the ticks are emitted on
    /// * `percent` - Counter shared with the fetch; the ticker only ever
    ///   increments it
    /// * `started` - Fetch start time, used for elapsed-time messages
    /// * `config` - Schedule constants
    pub fn spawn(
        progress: ProgressSender,
        percent: Arc<AtomicU8>,
        started: Instant,
        config: TickerConfig,
    ) -> Self {
        let token = CancellationToken::new();
        let task_token = token.clone();
        let handle = tokio::spawn(async move {
            run_ticker(progress, percent, started, config, task_token).await;
        });

        Self { token, handle }
    }

    /// Cancel the ticker and wait for it to finish.
    ///
    /// Must be called before the run emits any post-fetch event; after this
    /// returns, no further tick is in flight.
    pub async fn stop(self) {
        self.token.cancel();
        if self.handle.await.is_err() {
            debug!("ticker task panicked before join");
        }
    }
}

async fn run_ticker(
    progress: ProgressSender,
    percent: Arc<AtomicU8>,
    started: Instant,
    config: TickerConfig,
    token: CancellationToken,
) {
    let mut tick = config.initial_tick;

    // Climb from the floor toward the ceiling, slowing down on the way up.
    loop {
        tokio::select! {
            _ = token.cancelled() => return,
            _ = tokio::time::sleep(tick) => {}
        }

        let current = percent.load(Ordering::Relaxed);
        if current >= config.ceiling {
            break;
        }

        for (threshold, slower) in config.backoff {
            if current > threshold {
                tick = slower;
            }
        }

        let next = current + 1;
        percent.store(next, Ordering::Relaxed);

        let elapsed = started.elapsed();
        let message = if elapsed > config.long_run_after {
            format!("Processing a large data set... ({}s)", elapsed.as_secs())
        } else {
            format!("Executing hierarchical query... ({}s)", elapsed.as_secs())
        };

        progress.emit(
            ProgressEvent::new(ExportPhase::Executing, message, next).with_elapsed(elapsed),
        );
    }

    // Hold at the ceiling with a slower heartbeat until cancelled.
    loop {
        tokio::select! {
            _ = token.cancelled() => return,
            _ = tokio::time::sleep(config.hold_tick) => {}
        }

        let elapsed = started.elapsed();
        progress.emit(
            ProgressEvent::new(
                ExportPhase::Executing,
                format!(
                    "Processing a large data set, please wait... ({}s)",
                    elapsed.as_secs()
                ),
                config.ceiling,
            )
            .with_elapsed(elapsed),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::progress::ProgressSender;

    fn fast_config() -> TickerConfig {
        TickerConfig {
            floor: 10,
            ceiling: 15,
            initial_tick: Duration::from_millis(5),
            backoff: [
                (11, Duration::from_millis(5)),
                (12, Duration::from_millis(5)),
                (13, Duration::from_millis(5)),
            ],
            hold_tick: Duration::from_millis(10),
            long_run_after: Duration::from_secs(30),
        }
    }

    #[tokio::test]
    async fn test_ticker_stays_within_bounds() {
        let (tx, mut rx) = ProgressSender::channel();
        let percent = Arc::new(AtomicU8::new(10));
        let ticker = ProgressTicker::spawn(tx, percent.clone(), Instant::now(), fast_config());

        tokio::time::sleep(Duration::from_millis(120)).await;
        ticker.stop().await;

        let mut seen = Vec::new();
        while let Ok(event) = rx.try_recv() {
            seen.push(event);
        }

        assert!(!seen.is_empty());
        for event in &seen {
            assert_eq!(event.phase, ExportPhase::Executing);
            assert!(event.percent > 10, "percent {} not above floor", event.percent);
            assert!(event.percent <= 15, "percent {} above ceiling", event.percent);
        }

        // Monotonically non-decreasing
        for pair in seen.windows(2) {
            assert!(pair[1].percent >= pair[0].percent);
        }
    }

    #[tokio::test]
    async fn test_ticker_holds_at_ceiling() {
        let (tx, mut rx) = ProgressSender::channel();
        let percent = Arc::new(AtomicU8::new(14));
        let ticker = ProgressTicker::spawn(tx, percent.clone(), Instant::now(), fast_config());

        tokio::time::sleep(Duration::from_millis(100)).await;
        ticker.stop().await;

        let mut ceiling_events = 0;
        while let Ok(event) = rx.try_recv() {
            if event.percent == 15 {
                ceiling_events += 1;
            }
        }

        // One climb tick to 15, then hold heartbeats at 15
        assert!(ceiling_events >= 2);
        assert_eq!(percent.load(Ordering::Relaxed), 15);
    }

    #[tokio::test]
    async fn test_stop_joins_and_silences_ticker() {
        let (tx, mut rx) = ProgressSender::channel();
        let percent = Arc::new(AtomicU8::new(10));
        let ticker = ProgressTicker::spawn(tx, percent, Instant::now(), fast_config());

        tokio::time::sleep(Duration::from_millis(30)).await;
        ticker.stop().await;

        // Drain everything emitted before the join completed
        while rx.try_recv().is_ok() {}

        // After stop() has returned, nothing new may arrive
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_immediate_stop_emits_nothing() {
        let (tx, mut rx) = ProgressSender::channel();
        let percent = Arc::new(AtomicU8::new(10));
        let mut config = fast_config();
        config.initial_tick = Duration::from_secs(60);

        let ticker = ProgressTicker::spawn(tx, percent, Instant::now(), config);
        ticker.stop().await;

        assert!(rx.try_recv().is_err());
    }
}
