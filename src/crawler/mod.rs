//! Crawler module for page fetching and crawl orchestration
//!
//! This module contains the core crawling logic, including:
//! - HTTP and browser-rendered fetching behind a per-worker delay gate
//! - Retry of transient failures and rate limiting
//! - Paged walks over post lists and comment threads
//! - Overall crawl coordination with progress events

mod browser;
mod coordinator;
mod events;
mod fetcher;
mod pagination;
mod retry;

pub use browser::{BrowserError, BrowserLauncher, BrowserSession, SessionGuard};
#[cfg(feature = "browser")]
pub use browser::WebDriverLauncher;
pub use coordinator::{BlogOutcome, Coordinator, RunReport};
pub use events::{overall_percent, ChannelSink, EventSink, ProgressEvent, StopHandle, TracingSink};
pub use fetcher::{build_http_client, FetchError, FetchMode, Fetcher};
pub use pagination::{PaginationWalker, WalkState};
pub use retry::{fetch_with_retry, RetryPolicy};

use crate::config::Config;
use crate::storage::SqliteStorage;
use crate::url::BlogId;
use crate::HarvestError;
use std::sync::{Arc, Mutex};

/// Runs a complete crawl of the given blogs
///
/// This is the main entry point for a crawl with default collaborators:
/// the current markup, logged progress and no external stop signal.
///
/// # Arguments
///
/// * `config` - The harvester configuration
/// * `storage` - The shared store
/// * `blogs` - Blogs to crawl
///
/// # Returns
///
/// * `Ok(RunReport)` - Per-blog outcomes
/// * `Err(HarvestError)` - Crawl failed with a storage error
pub async fn crawl(
    config: Config,
    storage: Arc<Mutex<SqliteStorage>>,
    blogs: &[BlogId],
) -> Result<RunReport, HarvestError> {
    Coordinator::new(config, storage)?.run(blogs).await
}
