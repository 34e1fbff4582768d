//! Progress reporting and cooperative stop

use crate::state::{CrawlProgress, CrawlStage};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// A progress notification for one blog
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    pub blog_id: String,
    pub stage: CrawlStage,

    /// Overall completion of the blog, 0 to 100
    pub percent: u8,

    /// Set when the blog's crawl ended with an error
    pub error: Option<String>,
}

impl ProgressEvent {
    /// Builds an event for a position within a blog with `total_posts` posts
    pub fn at(blog_id: &str, progress: CrawlProgress, total_posts: u32) -> Self {
        Self {
            blog_id: blog_id.to_string(),
            stage: progress.stage(),
            percent: overall_percent(progress, total_posts),
            error: None,
        }
    }

    /// Builds an error event
    pub fn failed(blog_id: &str, progress: CrawlProgress, total_posts: u32, error: String) -> Self {
        Self {
            error: Some(error),
            ..Self::at(blog_id, progress, total_posts)
        }
    }
}

/// Maps a crawl position to an overall percentage
///
/// Stages are weighted by their typical share of requests: metadata 5%,
/// post list 15%, content 30%, reactions 15%, comments 35%.
pub fn overall_percent(progress: CrawlProgress, total_posts: u32) -> u8 {
    let fraction = |index: u32| {
        if total_posts == 0 {
            1.0
        } else {
            (index.min(total_posts) as f64) / (total_posts as f64)
        }
    };

    let percent = match progress {
        CrawlProgress::Metadata => 0.0,
        CrawlProgress::PostList { .. } => 5.0,
        CrawlProgress::PostContent { post_index } => 20.0 + 30.0 * fraction(post_index),
        CrawlProgress::Reactions { post_index } => 50.0 + 15.0 * fraction(post_index),
        CrawlProgress::Comments { post_index, .. } => 65.0 + 35.0 * fraction(post_index),
        CrawlProgress::Done => 100.0,
    };
    percent.round().clamp(0.0, 100.0) as u8
}

/// Receives progress events
pub trait EventSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);
}

/// Writes progress events to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: ProgressEvent) {
        match &event.error {
            Some(error) => tracing::warn!(
                "[{}] {} stopped at {}%: {}",
                event.blog_id,
                event.stage,
                event.percent,
                error
            ),
            None if event.stage == CrawlStage::Done => {
                tracing::info!("[{}] done", event.blog_id)
            }
            None => tracing::debug!("[{}] {} {}%", event.blog_id, event.stage, event.percent),
        }
    }
}

/// Forwards progress events to a channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelSink {
    /// Creates a sink and the receiver its events arrive on
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: ProgressEvent) {
        // A dropped receiver only means nobody is listening anymore
        let _ = self.sender.send(event);
    }
}

/// Cooperative stop signal shared by all workers
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    stopped: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests a stop at the next fetch boundary
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}
