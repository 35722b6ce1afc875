//! Page and image worker pools
//!
//! Page workers drain the frontier: fetch, extract, persist, feed harvested
//! links back into the frontier and image references into the image queue.
//! Image workers drain the image queue and write files; they discover
//! nothing further. Any per-item failure becomes a metadata record, never a
//! dead worker.

use crate::crawler::control::{Counters, StopSignal};
use crate::crawler::fetcher::{FetchFailure, Fetcher, HttpTransport};
use crate::crawler::frontier::{Frontier, WorkItem};
use crate::metadata::{CrawlRecord, CrawlStatus, MetadataStore};
use crate::output::DiskWriter;
use crate::url::{evaluate, normalize_url, PolicyVerdict};
use crate::Config;
use chrono::Utc;
use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use url::Url;

/// A queued image download, consumed exactly once
#[derive(Debug, Clone)]
pub struct ImageWorkItem {
    pub source_url: Url,
    pub local_path: PathBuf,
}

struct ImageQueueInner {
    seen: HashSet<String>,
    pending: VecDeque<ImageWorkItem>,
    in_flight: usize,
}

/// Image download queue, deduplicated by source URL
pub struct ImageQueue {
    inner: Mutex<ImageQueueInner>,
    notify: Notify,
}

impl ImageQueue {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(ImageQueueInner {
                seen: HashSet::new(),
                pending: VecDeque::new(),
                in_flight: 0,
            }),
            notify: Notify::new(),
        }
    }

    /// Enqueues an image unless its source URL was already seen
    pub fn push(&self, item: ImageWorkItem) -> bool {
        let key = item.source_url.as_str().to_string();
        let mut inner = self.inner.lock().expect("image queue lock poisoned");
        if !inner.seen.insert(key) {
            return false;
        }
        inner.pending.push_back(item);
        drop(inner);

        self.notify.notify_one();
        true
    }

    /// Pops the next image, waiting up to `wait` when empty
    pub async fn claim(&self, wait: Duration) -> Option<ImageWorkItem> {
        if let Some(item) = self.pop() {
            return Some(item);
        }
        let _ = tokio::time::timeout(wait, self.notify.notified()).await;
        self.pop()
    }

    fn pop(&self) -> Option<ImageWorkItem> {
        let mut inner = self.inner.lock().expect("image queue lock poisoned");
        let item = inner.pending.pop_front()?;
        inner.in_flight += 1;
        Some(item)
    }

    /// Marks one claimed image as finished (downloaded or given up on)
    pub fn complete(&self) {
        let mut inner = self.inner.lock().expect("image queue lock poisoned");
        inner.in_flight = inner.in_flight.saturating_sub(1);
    }

    pub fn is_drained(&self) -> bool {
        self.inner
            .lock()
            .expect("image queue lock poisoned")
            .pending
            .is_empty()
    }

    /// True iff nothing is pending and no claimed image is mid-download
    pub fn is_idle(&self) -> bool {
        let inner = self.inner.lock().expect("image queue lock poisoned");
        inner.pending.is_empty() && inner.in_flight == 0
    }

    pub fn pending(&self) -> usize {
        self.inner
            .lock()
            .expect("image queue lock poisoned")
            .pending
            .len()
    }
}

impl Default for ImageQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything a worker needs, shared behind one Arc
pub struct CrawlContext {
    pub config: Arc<Config>,
    pub frontier: Frontier,
    pub images: ImageQueue,
    pub fetcher: Fetcher<HttpTransport>,
    pub writer: DiskWriter,
    pub metadata: MetadataStore,
    pub counters: Counters,
    pub stop: StopSignal,
    /// False when the run was started with image downloads disabled
    pub images_enabled: bool,
}

impl CrawlContext {
    fn claim_wait(&self) -> Duration {
        Duration::from_millis(self.config.crawler.claim_wait_ms)
    }
}

/// Page worker loop: runs until the stop signal fires
pub async fn page_worker(ctx: Arc<CrawlContext>, worker_id: usize) {
    tracing::debug!("Page worker {} started", worker_id);

    loop {
        if ctx.stop.is_stopped() {
            break;
        }

        let item = match ctx.frontier.claim(ctx.claim_wait()).await {
            Some(item) => item,
            // Empty queue: loop back and re-check the stop signal
            None => continue,
        };

        process_page(&ctx, &item).await;
        // Discovered links are admitted before this, so the frontier never
        // looks idle while follow-up work is still unannounced
        ctx.frontier.complete();
    }

    tracing::debug!("Page worker {} exiting", worker_id);
}

/// Processes one claimed page; every failure ends in a metadata record
async fn process_page(ctx: &CrawlContext, item: &WorkItem) {
    let url = item.url.as_str();
    tracing::debug!("Processing {} (depth {})", url, item.depth);

    let body = match ctx.fetcher.fetch(url).await {
        Ok(body) => body,
        Err(failure) => {
            record_page_failure(ctx, item, &failure.message());
            if matches!(failure, FetchFailure::Terminal { .. }) {
                tracing::info!("Terminal failure for {}: {}", url, failure.message());
            } else {
                tracing::warn!("Gave up on {}: {}", url, failure.message());
            }
            return;
        }
    };

    if let Some(content_type) = &body.content_type {
        if !content_type.contains("text/html") {
            // Not an error: the URL is fine, it just is not a page
            record_page_skip(ctx, item, &format!("unsupported content type {}", content_type));
            return;
        }
    }

    let html = String::from_utf8_lossy(&body.bytes);
    let extracted = crate::extract::extract(&html, &item.url);

    let content_path = match ctx
        .writer
        .write_page(&item.url, &body.bytes, &extracted.content_html)
    {
        Ok(path) => path,
        Err(e) => {
            record_page_failure(ctx, item, &format!("write failed: {}", e));
            return;
        }
    };

    harvest_links(ctx, item, &extracted.links);

    let image_refs = if ctx.images_enabled {
        harvest_images(ctx, &extracted.image_refs)
    } else {
        Vec::new()
    };

    ctx.metadata.record(CrawlRecord {
        url: url.to_string(),
        title: extracted.title.clone(),
        local_path: Some(content_path.to_string_lossy().to_string()),
        depth: item.depth,
        image_refs,
        fetched_at: Utc::now(),
        status: CrawlStatus::Success,
        reason: None,
    });
    ctx.counters.page_processed();

    tracing::info!(
        "Processed {} ({})",
        url,
        extracted.title.as_deref().unwrap_or("untitled")
    );
}

/// Applies the admission policy and depth horizon to discovered links
fn harvest_links(ctx: &CrawlContext, item: &WorkItem, links: &[String]) {
    let next_depth = item.depth + 1;

    for link in links {
        let normalized = match normalize_url(link) {
            Ok(u) => u,
            Err(_) => {
                ctx.frontier.reject(link, "malformed URL");
                continue;
            }
        };

        match evaluate(&normalized, &ctx.config.policy) {
            PolicyVerdict::Admit => {
                if next_depth <= ctx.config.crawler.max_depth {
                    ctx.frontier.try_admit(normalized.as_str(), next_depth);
                } else {
                    // Beyond the crawl horizon: silent drop, not a skip
                    tracing::trace!("Dropping {} beyond depth limit", normalized);
                }
            }
            verdict => {
                ctx.frontier.reject(normalized.as_str(), &verdict.reason());
            }
        }
    }
}

/// Pushes unseen image references onto the image queue
///
/// Returns the refs attributed to this page for its metadata record.
fn harvest_images(ctx: &CrawlContext, image_refs: &[String]) -> Vec<String> {
    let mut recorded = Vec::new();

    for image_ref in image_refs {
        let normalized = match normalize_url(image_ref) {
            Ok(u) => u,
            Err(_) => continue,
        };

        recorded.push(normalized.as_str().to_string());

        let item = ImageWorkItem {
            local_path: ctx.writer.image_path_for(&normalized),
            source_url: normalized,
        };
        if ctx.images.push(item) {
            ctx.counters.image_discovered();
        }
    }

    recorded
}

fn record_page_failure(ctx: &CrawlContext, item: &WorkItem, reason: &str) {
    ctx.metadata.record(CrawlRecord {
        url: item.url.as_str().to_string(),
        title: None,
        local_path: None,
        depth: item.depth,
        image_refs: Vec::new(),
        fetched_at: Utc::now(),
        status: CrawlStatus::Failed,
        reason: Some(reason.to_string()),
    });
    ctx.counters.page_failed();
}

fn record_page_skip(ctx: &CrawlContext, item: &WorkItem, reason: &str) {
    tracing::debug!("Skipping {}: {}", item.url, reason);
    ctx.metadata.record(CrawlRecord {
        url: item.url.as_str().to_string(),
        title: None,
        local_path: None,
        depth: item.depth,
        image_refs: Vec::new(),
        fetched_at: Utc::now(),
        status: CrawlStatus::Skipped,
        reason: Some(reason.to_string()),
    });
    ctx.counters.page_skipped();
}

/// Image worker loop: downloads queued images until the stop signal fires
pub async fn image_worker(ctx: Arc<CrawlContext>, worker_id: usize) {
    tracing::debug!("Image worker {} started", worker_id);

    loop {
        if ctx.stop.is_stopped() {
            break;
        }

        let item = match ctx.images.claim(ctx.claim_wait()).await {
            Some(item) => item,
            None => continue,
        };

        download_image(&ctx, &item).await;
        ctx.images.complete();
    }

    tracing::debug!("Image worker {} exiting", worker_id);
}

async fn download_image(ctx: &CrawlContext, item: &ImageWorkItem) {
    // Idempotent restart: an existing file short-circuits the network
    if item.local_path.exists() {
        tracing::debug!("Image already present: {}", item.local_path.display());
        ctx.counters.image_done();
        return;
    }

    match ctx.fetcher.fetch(item.source_url.as_str()).await {
        Ok(body) => match ctx.writer.write_image(&item.local_path, &body.bytes) {
            Ok(()) => {
                ctx.counters.image_done();
                tracing::debug!(
                    "Downloaded {} -> {}",
                    item.source_url,
                    item.local_path.display()
                );
            }
            Err(e) => {
                ctx.counters.image_failed();
                tracing::warn!("Failed to write image {}: {}", item.source_url, e);
            }
        },
        Err(failure) => {
            ctx.counters.image_failed();
            tracing::warn!(
                "Failed to download image {}: {}",
                item.source_url,
                failure.message()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image_item(url: &str) -> ImageWorkItem {
        ImageWorkItem {
            source_url: Url::parse(url).unwrap(),
            local_path: PathBuf::from("/tmp/unused.png"),
        }
    }

    #[test]
    fn test_image_queue_dedupes_by_source_url() {
        let queue = ImageQueue::new();
        assert!(queue.push(image_item("https://docs.example.com/a.png")));
        assert!(!queue.push(image_item("https://docs.example.com/a.png")));
        assert_eq!(queue.pending(), 1);
    }

    #[tokio::test]
    async fn test_image_queue_claim() {
        let queue = ImageQueue::new();
        queue.push(image_item("https://docs.example.com/a.png"));

        let item = queue.claim(Duration::from_millis(10)).await.unwrap();
        assert_eq!(item.source_url.as_str(), "https://docs.example.com/a.png");
        assert!(queue.is_drained());
    }

    #[tokio::test]
    async fn test_image_queue_claim_empty_times_out() {
        let queue = ImageQueue::new();
        assert!(queue.claim(Duration::from_millis(10)).await.is_none());
    }

    #[test]
    fn test_image_queue_drained_but_seen_urls_stay_deduped() {
        let queue = ImageQueue::new();
        queue.push(image_item("https://docs.example.com/a.png"));
        queue.pop();
        // A second page referencing the same image must not requeue it
        assert!(!queue.push(image_item("https://docs.example.com/a.png")));
    }
}
