//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `CrawlProgress`: The resumable per-blog position (stage plus cursor)
//! - `BlogStatus` / `PostStatus`: Persisted lifecycle states
//! - `DelayGate`: Per-worker request pacing with rate-limit penalties

mod delay_gate;
mod progress;
mod status;

// Re-export main types
pub use delay_gate::DelayGate;
pub use progress::{CrawlProgress, CrawlStage};
pub use status::{BlogStatus, PostStatus};
