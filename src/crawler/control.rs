//! Shared control plane: cooperative stop signal and progress counters
//!
//! Cancellation is cooperative. The monitor (or a SIGINT handler) triggers
//! the stop signal once; every worker loop checks it between items and exits
//! after finishing the item in hand. Nothing is killed mid-flight.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::Notify;

/// One-shot shared stop flag with async wakeup
pub struct StopSignal {
    stopped: AtomicBool,
    notify: Notify,
}

impl StopSignal {
    pub fn new() -> Self {
        Self {
            stopped: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    /// Fires the signal; idempotent
    pub fn trigger(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            tracing::info!("Stop signal triggered");
        }
        self.notify.notify_waiters();
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Resolves once the signal has fired
    pub async fn wait(&self) {
        loop {
            if self.is_stopped() {
                return;
            }
            let notified = self.notify.notified();
            if self.is_stopped() {
                return;
            }
            notified.await;
        }
    }
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Monotonic progress counters sampled by the completion monitor
#[derive(Default)]
pub struct Counters {
    pages_processed: AtomicU64,
    pages_failed: AtomicU64,
    pages_skipped: AtomicU64,
    images_discovered: AtomicU64,
    images_done: AtomicU64,
    images_failed: AtomicU64,
}

/// Point-in-time copy of all counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountersSnapshot {
    pub pages_processed: u64,
    pub pages_failed: u64,
    pub pages_skipped: u64,
    pub images_discovered: u64,
    pub images_done: u64,
    pub images_failed: u64,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page_processed(&self) {
        self.pages_processed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn page_failed(&self) {
        self.pages_failed.fetch_add(1, Ordering::SeqCst);
    }

    /// A claimed page that turned out not to be crawlable content
    pub fn page_skipped(&self) {
        self.pages_skipped.fetch_add(1, Ordering::SeqCst);
    }

    pub fn image_discovered(&self) {
        self.images_discovered.fetch_add(1, Ordering::SeqCst);
    }

    pub fn image_done(&self) {
        self.images_done.fetch_add(1, Ordering::SeqCst);
    }

    pub fn image_failed(&self) {
        self.images_failed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> CountersSnapshot {
        CountersSnapshot {
            pages_processed: self.pages_processed.load(Ordering::SeqCst),
            pages_failed: self.pages_failed.load(Ordering::SeqCst),
            pages_skipped: self.pages_skipped.load(Ordering::SeqCst),
            images_discovered: self.images_discovered.load(Ordering::SeqCst),
            images_done: self.images_done.load(Ordering::SeqCst),
            images_failed: self.images_failed.load(Ordering::SeqCst),
        }
    }
}
