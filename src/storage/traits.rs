//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::extract::{BlogMeta, Comment, Reaction, ReactionSet};
use crate::state::{BlogStatus, CrawlProgress};
use crate::storage::{
    BlogRecord, BlogStats, CommentRecord, PostListing, PostOutcome, PostRecord, RowCounts,
    RunRecord, RunStatus,
};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Blog not found: {0}")]
    BlogNotFound(String),

    #[error("Post not found: {blog_id}/{post_no}")]
    PostNotFound { blog_id: String, post_no: String },

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Progress of {blog_id} cannot move back from {current} to {attempted}")]
    ProgressRegression {
        blog_id: String,
        current: CrawlProgress,
        attempted: CrawlProgress,
    },

    #[error("Corrupt value in column {column}: {value}")]
    CorruptValue { column: &'static str, value: String },

    #[error("Storage lock poisoned by a panicked worker")]
    LockPoisoned,

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Every write is an upsert keyed by a natural identifier, so applying the
/// same crawl twice leaves the same rows. Operations named `commit_*` write
/// their data and the accompanying crawl progress in one transaction.
pub trait Storage {
    // ===== Run Management =====

    /// Creates a new crawl run
    ///
    /// # Arguments
    ///
    /// * `config_hash` - Hash of the configuration file
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Marks a run finished with the given status
    fn complete_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()>;

    // ===== Blogs =====

    /// Inserts a blog or refreshes its metadata
    fn upsert_blog(&mut self, blog_id: &str, meta: &BlogMeta, url: &str) -> StorageResult<()>;

    /// Gets a blog by its platform id
    fn get_blog(&self, blog_id: &str) -> StorageResult<Option<BlogRecord>>;

    /// Lists all stored blogs ordered by id
    fn list_blogs(&self) -> StorageResult<Vec<BlogRecord>>;

    /// Sets the lifecycle status of a stored blog
    fn update_blog_status(&mut self, blog_id: &str, status: BlogStatus) -> StorageResult<()>;

    /// Records the number of posts enumerated for a blog
    fn set_blog_post_count(&mut self, blog_id: &str, post_count: u32) -> StorageResult<()>;

    /// Removes a blog with its posts, comments, reactions and progress
    ///
    /// Returns false when nothing was stored for the blog.
    fn delete_blog(&mut self, blog_id: &str) -> StorageResult<bool>;

    // ===== Posts =====

    /// Upserts one page of the post list and advances progress to it
    ///
    /// New posts are appended in discovery order; known posts keep their
    /// position and content.
    fn commit_post_list_page(
        &mut self,
        blog_id: &str,
        page: u32,
        posts: &[PostListing],
    ) -> StorageResult<()>;

    /// Lists a blog's posts in discovery order
    fn list_posts(&self, blog_id: &str) -> StorageResult<Vec<PostRecord>>;

    /// Gets a single post
    fn get_post(&self, blog_id: &str, post_no: &str) -> StorageResult<Option<PostRecord>>;

    /// Stores a post's content (or marks it unavailable) with the given progress
    fn commit_post_content(
        &mut self,
        blog_id: &str,
        post_no: &str,
        outcome: &PostOutcome,
        progress: CrawlProgress,
    ) -> StorageResult<()>;

    // ===== Reactions =====

    /// Replaces a post's reaction breakdown with the given progress
    fn commit_reactions(
        &mut self,
        blog_id: &str,
        post_no: &str,
        reactions: &ReactionSet,
        progress: CrawlProgress,
    ) -> StorageResult<()>;

    /// Lists a post's reactions ordered by type
    fn list_reactions(&self, blog_id: &str, post_no: &str) -> StorageResult<Vec<Reaction>>;

    // ===== Comments =====

    /// Upserts one comment page of a post together with the given progress
    ///
    /// Parent references are resolved among the same post's comments; an
    /// unresolvable reference is dropped.
    fn commit_comment_page(
        &mut self,
        blog_id: &str,
        post_no: &str,
        page: u32,
        comments: &[Comment],
        progress: CrawlProgress,
    ) -> StorageResult<()>;

    /// Lists a post's comments ordered by page and insertion
    fn list_comments(&self, blog_id: &str, post_no: &str) -> StorageResult<Vec<CommentRecord>>;

    // ===== Crawl Progress =====

    /// Starts tracking a blog at `Metadata` unless it is already tracked
    fn track_blog(&mut self, blog_id: &str) -> StorageResult<()>;

    /// Reads a blog's crawl progress
    fn read_progress(&self, blog_id: &str) -> StorageResult<Option<CrawlProgress>>;

    /// Advances a blog's crawl progress
    ///
    /// Fails with `StorageError::ProgressRegression` when `progress` is
    /// earlier than the stored value.
    fn write_progress(&mut self, blog_id: &str, progress: CrawlProgress) -> StorageResult<()>;

    /// Moves a blog's progress back to `Metadata`
    fn reset_progress(&mut self, blog_id: &str) -> StorageResult<()>;

    /// Lists every tracked blog with its progress
    fn tracked_blogs(&self) -> StorageResult<Vec<(String, CrawlProgress)>>;

    // ===== Statistics =====

    /// Content statistics for one blog
    fn blog_stats(&self, blog_id: &str) -> StorageResult<BlogStats>;

    /// Row counts across the whole store
    fn count_rows(&self) -> StorageResult<RowCounts>;
}
