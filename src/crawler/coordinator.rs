//! Crawl coordinator: wires the engine together and owns its lifecycle
//!
//! The coordinator seeds the frontier, spawns the worker pools, the
//! completion monitor and the SIGINT handler, then waits for everything to
//! wind down after the stop signal fires. Metadata is flushed on every exit
//! path.

use crate::config::Config;
use crate::crawler::control::{Counters, StopSignal};
use crate::crawler::fetcher::{FetchPolicy, Fetcher, HttpTransport};
use crate::crawler::frontier::Frontier;
use crate::crawler::monitor::{CompletionMonitor, StopReason};
use crate::crawler::rate_limit::RateLimiter;
use crate::crawler::workers::{image_worker, page_worker, CrawlContext, ImageQueue};
use crate::metadata::MetadataStore;
use crate::output::DiskWriter;
use crate::{MirrorError, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Run options that come from the command line rather than the config file
#[derive(Debug, Clone, Copy)]
pub struct CrawlOptions {
    /// Seed the visited set from a previous run's metadata
    pub resume: bool,
    /// Download referenced images
    pub images: bool,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            resume: false,
            images: true,
        }
    }
}

/// Final counts reported after a run
#[derive(Debug, Clone, Copy)]
pub struct CrawlSummary {
    pub pages_processed: u64,
    pub pages_failed: u64,
    pub pages_skipped: u64,
    pub images_discovered: u64,
    pub images_done: u64,
    pub images_failed: u64,
    /// None when the run was stopped externally (SIGINT)
    pub stop_reason: Option<StopReason>,
}

/// Builds the crawl engine from configuration and runs it to completion
pub struct Coordinator {
    config: Arc<Config>,
    config_hash: String,
    options: CrawlOptions,
}

impl Coordinator {
    pub fn new(config: Config, config_hash: String, options: CrawlOptions) -> Self {
        Self {
            config: Arc::new(config),
            config_hash,
            options,
        }
    }

    /// Metadata file location: relative paths live under the output directory
    fn metadata_path(config: &Config) -> PathBuf {
        let file = Path::new(&config.output.metadata_file);
        if file.is_absolute() {
            file.to_path_buf()
        } else {
            Path::new(&config.output.output_dir).join(file)
        }
    }

    /// Runs the crawl until the monitor or a SIGINT stops it
    pub async fn run(self) -> Result<CrawlSummary> {
        let metadata_path = Self::metadata_path(&self.config);
        let metadata = MetadataStore::new(&self.config_hash);

        let frontier = Frontier::new();

        if self.options.resume && metadata_path.exists() {
            let loaded = metadata.load(&metadata_path)?;
            let mut resumed = 0;
            for url in metadata.successful_urls() {
                if frontier.mark_visited(&url) {
                    resumed += 1;
                }
            }
            tracing::info!(
                "Resuming: {} records loaded, {} pages already mirrored",
                loaded,
                resumed
            );
        }

        let transport = HttpTransport::new(&self.config)?;
        let limiter = Arc::new(RateLimiter::new(&self.config.rate_limit));
        let fetcher = Fetcher::new(transport, limiter, FetchPolicy::from(&self.config.rate_limit));
        let writer = DiskWriter::new(Path::new(&self.config.output.output_dir))?;

        for seed in &self.config.seeds {
            if frontier.try_admit(seed, 0) {
                tracing::info!("Seeded {}", seed);
            } else {
                tracing::debug!("Seed {} already covered", seed);
            }
        }

        let ctx = Arc::new(CrawlContext {
            config: self.config.clone(),
            frontier,
            images: ImageQueue::new(),
            fetcher,
            writer,
            metadata,
            counters: Counters::new(),
            stop: StopSignal::new(),
            images_enabled: self.options.images,
        });

        let mut workers: Vec<JoinHandle<()>> = Vec::new();
        for id in 0..self.config.crawler.page_workers {
            workers.push(tokio::spawn(page_worker(ctx.clone(), id)));
        }
        if self.options.images {
            for id in 0..self.config.crawler.image_workers {
                workers.push(tokio::spawn(image_worker(ctx.clone(), id)));
            }
        }

        let monitor = CompletionMonitor::new(&self.config.monitor);
        let monitor_task = {
            let ctx = ctx.clone();
            tokio::spawn(async move { monitor.run(ctx).await })
        };

        let sigint_task = {
            let ctx = ctx.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("Interrupt received, shutting down");
                    ctx.stop.trigger();
                }
            })
        };

        for worker in workers {
            worker
                .await
                .map_err(|e| MirrorError::WorkerJoin(e.to_string()))?;
        }

        let stop_reason = monitor_task
            .await
            .map_err(|e| MirrorError::WorkerJoin(e.to_string()))?;
        sigint_task.abort();

        // Flush even after a failed run; losing records helps nobody
        if let Err(e) = ctx.metadata.flush(&metadata_path) {
            tracing::error!("Failed to write metadata: {}", e);
        }

        for (url, reason) in ctx.frontier.skipped_urls() {
            tracing::debug!("Skipped {}: {}", url, reason);
        }

        let snap = ctx.counters.snapshot();
        let summary = CrawlSummary {
            pages_processed: snap.pages_processed,
            pages_failed: snap.pages_failed,
            // Policy rejections plus claimed pages that held no crawlable
            // content
            pages_skipped: ctx.frontier.stats().skipped as u64 + snap.pages_skipped,
            images_discovered: snap.images_discovered,
            images_done: snap.images_done,
            images_failed: snap.images_failed,
            stop_reason,
        };

        tracing::info!(
            "Run finished: {} pages ({} failed, {} skipped), {}/{} images",
            summary.pages_processed,
            summary.pages_failed,
            summary.pages_skipped,
            summary.images_done,
            summary.images_discovered
        );

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        CrawlerConfig, MonitorConfig, OutputConfig, PolicyConfig, RateLimitConfig,
    };

    fn config(output_dir: &str, metadata_file: &str) -> Config {
        Config {
            crawler: CrawlerConfig {
                max_depth: 2,
                page_workers: 2,
                image_workers: 1,
                claim_wait_ms: 50,
            },
            rate_limit: RateLimitConfig {
                initial_delay_ms: 1,
                min_delay_ms: 1,
                max_delay_ms: 10,
                max_retries: 2,
                retry_base_delay_ms: 1,
                retry_delay_ceiling_ms: 10,
                request_timeout_secs: 5,
            },
            monitor: MonitorConfig {
                poll_interval_secs: 1,
                ..MonitorConfig::default()
            },
            policy: PolicyConfig {
                allowed_domains: vec!["docs.example.com".to_string()],
                excluded_extensions: vec![],
                excluded_patterns: vec![],
                allowed_path_prefixes: vec![],
            },
            output: OutputConfig {
                output_dir: output_dir.to_string(),
                metadata_file: metadata_file.to_string(),
            },
            seeds: vec!["https://docs.example.com/".to_string()],
            user_agents: vec![],
        }
    }

    #[test]
    fn test_metadata_path_relative_to_output_dir() {
        let config = config("/data/mirror", "page_metadata.json");
        assert_eq!(
            Coordinator::metadata_path(&config),
            PathBuf::from("/data/mirror/page_metadata.json")
        );
    }

    #[test]
    fn test_metadata_path_absolute_wins() {
        let config = config("/data/mirror", "/elsewhere/meta.json");
        assert_eq!(
            Coordinator::metadata_path(&config),
            PathBuf::from("/elsewhere/meta.json")
        );
    }
}
