//! Completion monitor: the single source of truth for the stop decision
//!
//! The monitor samples progress counters and queue depths on a fixed poll
//! interval and walks Running → Draining → Stopped. A run ends when both
//! queues are drained with no worker mid-flight, or through the stall
//! escape hatch when progress has flatlined. All thresholds are
//! configuration, not constants.

use crate::config::MonitorConfig;
use crate::crawler::workers::CrawlContext;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// Monitor state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    /// Pages and images are still flowing
    Running,
    /// Page side fully drained; images still pending
    Draining,
    /// Stop signal fired
    Stopped,
}

/// Why the monitor stopped the run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Both queues drained and every worker idle
    Drained,
    /// No progress for the stall threshold with enough images complete
    StallEscape,
    /// No progress for the hard-stall threshold
    HardStall,
}

/// Periodic completion/stall detector
pub struct CompletionMonitor {
    poll_interval: Duration,
    stall_threshold: Duration,
    hard_stall_threshold: Duration,
    min_image_fraction: f64,
}

impl CompletionMonitor {
    pub fn new(config: &MonitorConfig) -> Self {
        Self {
            poll_interval: Duration::from_secs(config.poll_interval_secs),
            stall_threshold: Duration::from_secs(config.stall_threshold_secs),
            hard_stall_threshold: Duration::from_secs(config.hard_stall_threshold_secs),
            min_image_fraction: config.min_image_fraction,
        }
    }

    /// Stop decision for one sample; pure so it is testable in isolation
    ///
    /// `no_progress_for` is how long both progress counters have been
    /// unchanged.
    pub fn assess(
        &self,
        pages_idle: bool,
        images_idle: bool,
        no_progress_for: Duration,
        images_done: u64,
        images_discovered: u64,
    ) -> Option<StopReason> {
        if pages_idle && images_idle {
            return Some(StopReason::Drained);
        }

        if no_progress_for >= self.hard_stall_threshold {
            return Some(StopReason::HardStall);
        }

        if no_progress_for >= self.stall_threshold {
            let fraction = if images_discovered == 0 {
                1.0
            } else {
                images_done as f64 / images_discovered as f64
            };
            if fraction >= self.min_image_fraction {
                return Some(StopReason::StallEscape);
            }
        }

        None
    }

    /// Poll loop; fires the shared stop signal on its own stop decision
    ///
    /// Returns None when something else (SIGINT) triggered the stop first.
    pub async fn run(&self, ctx: Arc<CrawlContext>) -> Option<StopReason> {
        let mut state = MonitorState::Running;
        let mut last_pages = 0u64;
        let mut last_images = 0u64;
        let mut last_progress = Instant::now();

        loop {
            tokio::select! {
                _ = sleep(self.poll_interval) => {}
                _ = ctx.stop.wait() => {
                    tracing::info!("Monitor observed external stop");
                    return None;
                }
            }

            let snap = ctx.counters.snapshot();
            let frontier = ctx.frontier.stats();

            if snap.pages_processed != last_pages || snap.images_done != last_images {
                last_pages = snap.pages_processed;
                last_images = snap.images_done;
                last_progress = Instant::now();
            }

            let pages_idle = ctx.frontier.is_idle();
            let images_idle = ctx.images.is_idle();

            if state == MonitorState::Running && pages_idle && !images_idle {
                state = MonitorState::Draining;
                tracing::info!(
                    "Page crawl drained; waiting on {} pending images",
                    ctx.images.pending()
                );
            }

            tracing::info!(
                "{:?}: {} pages ({} failed), {}/{} images, {} pending pages, {} pending images",
                state,
                snap.pages_processed,
                snap.pages_failed,
                snap.images_done,
                snap.images_discovered,
                frontier.pending,
                ctx.images.pending()
            );

            let decision = self.assess(
                pages_idle,
                images_idle,
                last_progress.elapsed(),
                snap.images_done,
                snap.images_discovered,
            );

            if let Some(reason) = decision {
                state = MonitorState::Stopped;
                tracing::debug!("Monitor entering {:?}", state);
                match reason {
                    StopReason::Drained => {
                        tracing::info!("Crawl complete: all queues drained, workers idle")
                    }
                    StopReason::StallEscape => tracing::warn!(
                        "Stall escape: no progress, {}/{} images done",
                        snap.images_done,
                        snap.images_discovered
                    ),
                    StopReason::HardStall => {
                        tracing::warn!("Hard stall: no progress past the hard threshold")
                    }
                }
                ctx.stop.trigger();
                return Some(reason);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor() -> CompletionMonitor {
        CompletionMonitor::new(&MonitorConfig {
            poll_interval_secs: 10,
            stall_threshold_secs: 300,
            min_image_fraction: 0.9,
            hard_stall_threshold_secs: 600,
        })
    }

    #[test]
    fn test_drained_stops_immediately() {
        let reason = monitor().assess(true, true, Duration::ZERO, 0, 0);
        assert_eq!(reason, Some(StopReason::Drained));
    }

    #[test]
    fn test_running_with_progress_continues() {
        let reason = monitor().assess(false, false, Duration::from_secs(5), 10, 100);
        assert_eq!(reason, None);
    }

    #[test]
    fn test_stall_escape_requires_image_fraction() {
        let m = monitor();

        // 91/100 images done, stalled past threshold: escape
        let reason = m.assess(true, false, Duration::from_secs(301), 91, 100);
        assert_eq!(reason, Some(StopReason::StallEscape));

        // 50/100 done: keep waiting
        let reason = m.assess(true, false, Duration::from_secs(301), 50, 100);
        assert_eq!(reason, None);
    }

    #[test]
    fn test_hard_stall_ignores_fraction() {
        let reason = monitor().assess(false, false, Duration::from_secs(601), 1, 100);
        assert_eq!(reason, Some(StopReason::HardStall));
    }

    #[test]
    fn test_no_images_counts_as_complete_fraction() {
        let reason = monitor().assess(true, false, Duration::from_secs(301), 0, 0);
        assert_eq!(reason, Some(StopReason::StallEscape));
    }

    #[test]
    fn test_stall_below_threshold_continues() {
        let reason = monitor().assess(true, false, Duration::from_secs(299), 95, 100);
        assert_eq!(reason, None);
    }
}
