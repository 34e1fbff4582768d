//! Storage module for persisting crawl data
//!
//! This module handles all database operations for the harvester, including:
//! - SQLite database initialization and schema management
//! - Blog, post, comment and reaction upserts keyed by natural identifiers
//! - Resumable crawl progress committed together with the data it guards
//! - Run tracking and statistics

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::extract::PostContent;
use crate::state::{BlogStatus, PostStatus};
use crate::HarvestError;

use std::path::Path;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(HarvestError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> Result<SqliteStorage, HarvestError> {
    SqliteStorage::new(path)
}

/// Represents a blog in the database
#[derive(Debug, Clone)]
pub struct BlogRecord {
    pub id: String,
    pub blog_name: String,
    pub author_name: String,
    pub url: String,
    pub post_count: u32,
    pub status: BlogStatus,
    pub created_at: String,
    pub updated_at: String,
}

/// A post discovered by the post-list walk, ready to be stored
#[derive(Debug, Clone)]
pub struct PostListing {
    pub post_no: String,
    pub title: Option<String>,
    pub post_url: String,
}

/// Represents a post in the database
#[derive(Debug, Clone)]
pub struct PostRecord {
    pub id: i64,
    pub blog_id: String,
    pub post_no: String,
    pub title: Option<String>,
    pub content: Option<String>,
    pub category: Option<String>,
    pub post_date: Option<String>,
    pub post_url: String,
    pub list_position: u32,
    pub crawl_status: PostStatus,
    pub comment_count: u32,
    pub reaction_total: u32,
    pub fetched_at: Option<String>,
}

/// Result of fetching one post page
#[derive(Debug, Clone)]
pub enum PostOutcome {
    Fetched(PostContent),
    Unavailable,
}

/// Represents a comment in the database
#[derive(Debug, Clone)]
pub struct CommentRecord {
    pub id: i64,
    pub post_id: i64,
    pub comment_no: Option<String>,
    pub parent_id: Option<i64>,
    pub author: String,
    pub content: String,
    pub written_at: String,
    pub like_count: u32,
    pub is_reply: bool,
    pub page: u32,
}

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Per-blog content statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlogStats {
    pub posts: u64,
    pub posts_completed: u64,
    pub posts_unavailable: u64,
    pub comments: u64,
    pub replies: u64,
    pub reactions: u64,
}

/// Row counts across the whole store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowCounts {
    pub blogs: u64,
    pub posts: u64,
    pub comments: u64,
    pub reactions: u64,
}
