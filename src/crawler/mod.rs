//! Crawl engine: frontier, fetcher, worker pools and lifecycle control
//!
//! The engine is built and run by the [`Coordinator`]; the other submodules
//! are its moving parts. See the crate docs for the overall data flow.

pub mod control;
pub mod coordinator;
pub mod fetcher;
pub mod frontier;
pub mod monitor;
pub mod rate_limit;
pub mod workers;

pub use control::{Counters, CountersSnapshot, StopSignal};
pub use coordinator::{Coordinator, CrawlOptions, CrawlSummary};
pub use fetcher::{FetchFailure, Fetcher, HttpTransport, Transport};
pub use frontier::{Frontier, FrontierStats, WorkItem};
pub use monitor::{CompletionMonitor, StopReason};
pub use rate_limit::{RateLimiter, RateSignal};
pub use workers::{CrawlContext, ImageQueue, ImageWorkItem};
