//! URL frontier: the single deduplication gate of the crawl
//!
//! The frontier owns three disjoint URL sets (queued, visited, skipped) and
//! the FIFO pending queue. Workers never touch the sets directly; admission
//! goes through [`Frontier::try_admit`], consumption through
//! [`Frontier::claim`]. All three sets grow monotonically for the lifetime
//! of a run; a URL admitted once can never be admitted again.

use crate::url::normalize_url;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Notify;
use url::Url;

/// A unit of crawl work, consumed exactly once by exactly one worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    /// Normalized URL
    pub url: Url,
    /// Discovery depth (seeds are depth 0)
    pub depth: u32,
}

/// Snapshot of frontier counters for logging and the completion monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrontierStats {
    pub queued: usize,
    pub visited: usize,
    pub skipped: usize,
    pub pending: usize,
}

struct FrontierInner {
    /// Admitted, not yet claimed
    queued: HashSet<String>,
    /// Claimed or completed (success or failure)
    visited: HashSet<String>,
    /// Rejected by policy, with the reason
    skipped: HashMap<String, String>,
    /// FIFO pending work; breadth-first by enqueue order
    pending: VecDeque<WorkItem>,
    /// Items claimed but not yet completed
    in_flight: usize,
}

/// Thread-safe crawl frontier
///
/// All mutation happens under one internal lock, which is never held across
/// an await point. The [`Notify`] wakes one sleeping claimer per admission.
pub struct Frontier {
    inner: Mutex<FrontierInner>,
    notify: Notify,
}

impl Frontier {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(FrontierInner {
                queued: HashSet::new(),
                visited: HashSet::new(),
                skipped: HashMap::new(),
                pending: VecDeque::new(),
                in_flight: 0,
            }),
            notify: Notify::new(),
        }
    }

    /// Admits a URL if its normalized form has never been seen
    ///
    /// Returns true iff the URL entered the queue. This check-and-insert is
    /// atomic under the frontier lock and is the sole dedup gate: for any
    /// number of concurrent calls with the same normalized URL, exactly one
    /// returns true.
    ///
    /// A URL that fails to normalize is recorded as skipped and never
    /// surfaces as an error.
    pub fn try_admit(&self, url: &str, depth: u32) -> bool {
        let normalized = match normalize_url(url) {
            Ok(u) => u,
            Err(e) => {
                self.reject(url, &format!("malformed URL: {}", e));
                return false;
            }
        };
        let key = normalized.as_str().to_string();

        let mut inner = self.inner.lock().expect("frontier lock poisoned");
        if inner.queued.contains(&key)
            || inner.visited.contains(&key)
            || inner.skipped.contains_key(&key)
        {
            return false;
        }

        inner.queued.insert(key);
        inner.pending.push_back(WorkItem {
            url: normalized,
            depth,
        });
        drop(inner);

        self.notify.notify_one();
        true
    }

    /// Marks a URL as visited without queueing it (metadata resume path)
    ///
    /// Returns false if the URL is already known in any set.
    pub fn mark_visited(&self, url: &str) -> bool {
        let normalized = match normalize_url(url) {
            Ok(u) => u,
            Err(_) => return false,
        };
        let key = normalized.as_str().to_string();

        let mut inner = self.inner.lock().expect("frontier lock poisoned");
        if inner.queued.contains(&key)
            || inner.visited.contains(&key)
            || inner.skipped.contains_key(&key)
        {
            return false;
        }
        inner.visited.insert(key);
        true
    }

    /// Records a URL as skipped with a policy reason
    ///
    /// The URL never enters the queue. Duplicate rejections are no-ops, and
    /// a URL already queued or visited is left where it is.
    pub fn reject(&self, url: &str, reason: &str) {
        let key = match normalize_url(url) {
            Ok(u) => u.as_str().to_string(),
            // Unparseable input is still worth recording under its raw form
            Err(_) => url.to_string(),
        };

        let mut inner = self.inner.lock().expect("frontier lock poisoned");
        if inner.queued.contains(&key) || inner.visited.contains(&key) {
            return;
        }
        inner
            .skipped
            .entry(key)
            .or_insert_with(|| reason.to_string());
    }

    /// Pops the next work item, moving its URL from queued to visited
    ///
    /// Waits up to `wait` when the queue is empty, then returns None so the
    /// caller can re-check the stop signal instead of blocking forever.
    pub async fn claim(&self, wait: Duration) -> Option<WorkItem> {
        if let Some(item) = self.pop() {
            return Some(item);
        }

        let _ = tokio::time::timeout(wait, self.notify.notified()).await;
        self.pop()
    }

    fn pop(&self) -> Option<WorkItem> {
        let mut inner = self.inner.lock().expect("frontier lock poisoned");
        let item = inner.pending.pop_front()?;
        let key = item.url.as_str().to_string();
        inner.queued.remove(&key);
        inner.visited.insert(key);
        inner.in_flight += 1;
        Some(item)
    }

    /// Marks one claimed item as finished
    ///
    /// Must be called exactly once per successful [`Frontier::claim`], after
    /// any links discovered while processing it have been admitted.
    pub fn complete(&self) {
        let mut inner = self.inner.lock().expect("frontier lock poisoned");
        inner.in_flight = inner.in_flight.saturating_sub(1);
    }

    /// True iff the pending queue is empty
    ///
    /// Only one input to the completion decision; the queue can be
    /// transiently empty while workers are mid-flight.
    pub fn is_drained(&self) -> bool {
        self.inner
            .lock()
            .expect("frontier lock poisoned")
            .pending
            .is_empty()
    }

    /// True iff nothing is pending and no claimed item is still in flight
    ///
    /// Claim and in-flight accounting share one lock, so an item can never
    /// be invisible to this check between pop and processing.
    pub fn is_idle(&self) -> bool {
        let inner = self.inner.lock().expect("frontier lock poisoned");
        inner.pending.is_empty() && inner.in_flight == 0
    }

    pub fn stats(&self) -> FrontierStats {
        let inner = self.inner.lock().expect("frontier lock poisoned");
        FrontierStats {
            queued: inner.queued.len(),
            visited: inner.visited.len(),
            skipped: inner.skipped.len(),
            pending: inner.pending.len(),
        }
    }

    /// Skip reasons recorded so far (diagnostics)
    pub fn skipped_urls(&self) -> Vec<(String, String)> {
        let inner = self.inner.lock().expect("frontier lock poisoned");
        inner
            .skipped
            .iter()
            .map(|(url, reason)| (url.clone(), reason.clone()))
            .collect()
    }
}

impl Default for Frontier {
    fn default() -> Self {
        Self::new()
    }
}
