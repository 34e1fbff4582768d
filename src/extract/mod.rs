//! Markup extractors for blog pages
//!
//! Every operation here is pure: it takes a fetched body and returns typed
//! records or a [`ParseError`]. Selectors and payload shapes for one version
//! of the platform's markup live behind the [`PlatformMarkup`] trait, so a
//! markup change means a new implementation rather than edits scattered
//! through the crawler.

mod blog;
mod comment;
mod dom;
mod post;
mod reaction;

pub use reaction::reaction_label;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Errors raised when a body does not match the expected markup
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("no usable content in {0}")]
    Empty(&'static str),

    #[error("missing {0}")]
    Missing(&'static str),

    #[error("invalid JSON: {0}")]
    Json(String),
}

/// Blog-level metadata from the home page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlogMeta {
    pub blog_name: String,
    pub author_name: String,
}

/// One post as listed by the post-list API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostSummary {
    pub post_no: String,
    pub title: Option<String>,
}

/// One page of the post list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostListPage {
    pub posts: Vec<PostSummary>,

    /// Total number of posts the API claims to have, when present
    pub total_count: Option<u32>,
}

/// Full content of a single post
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostContent {
    pub title: Option<String>,
    pub content: Option<String>,
    pub category: Option<String>,
    pub post_date: Option<String>,
}

/// A comment or reply as it appears on one comment page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    /// Platform comment number, when the markup exposes one
    pub comment_no: Option<String>,
    pub author: String,
    pub content: String,
    pub written_at: String,
    pub like_count: u32,
    pub is_reply: bool,

    /// Natural key of the comment this one replies to
    pub parent_key: Option<String>,
}

impl Comment {
    /// Returns the key identifying this comment within its post
    ///
    /// The platform number is used when available; otherwise the key is
    /// derived from author, timestamp and a hash of the content.
    pub fn natural_key(&self) -> String {
        match &self.comment_no {
            Some(no) => format!("c:{}", no),
            None => {
                let digest = Sha256::digest(self.content.as_bytes());
                format!(
                    "a:{}|{}|{}",
                    self.author,
                    self.written_at,
                    &hex::encode(digest)[..16]
                )
            }
        }
    }
}

/// One page of a post's comment box
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentPage {
    pub comments: Vec<Comment>,

    /// Whether the page offers a link to the following page
    pub has_next: bool,
}

/// Count for a single reaction type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    pub reaction_type: String,
    pub count: u32,
}

/// Reaction breakdown of one post
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReactionSet {
    pub reactions: Vec<Reaction>,
}

impl ReactionSet {
    /// Sum of all reaction counts
    pub fn total(&self) -> u32 {
        self.reactions.iter().map(|r| r.count).sum()
    }
}

/// The extraction contract for one version of the platform's markup
pub trait PlatformMarkup: Send + Sync {
    /// Identifies the markup version this implementation understands
    fn version(&self) -> &'static str;

    /// Extracts blog name and author from the blog home page
    fn extract_blog(&self, blog_id: &str, html: &str) -> Result<BlogMeta, ParseError>;

    /// Reads the post count the post-list page declares, if any
    fn extract_declared_post_count(&self, html: &str) -> Option<u32>;

    /// Extracts one page of post summaries from the post-list API body
    fn extract_post_list(&self, body: &str) -> Result<PostListPage, ParseError>;

    /// Extracts the content of a post page
    fn extract_post(&self, html: &str) -> Result<PostContent, ParseError>;

    /// Extracts comments from comment page `page` (1-based)
    fn extract_comments(&self, html: &str, page: u32) -> Result<CommentPage, ParseError>;

    /// Extracts the reaction breakdown from the reaction API body
    fn extract_reactions(&self, json: &str) -> Result<ReactionSet, ParseError>;
}

/// Markup of the current Naver Blog pages and APIs
#[derive(Debug, Clone, Copy, Default)]
pub struct NaverMarkupV1;

impl PlatformMarkup for NaverMarkupV1 {
    fn version(&self) -> &'static str {
        "naver-v1"
    }

    fn extract_blog(&self, blog_id: &str, html: &str) -> Result<BlogMeta, ParseError> {
        blog::extract_blog(blog_id, html)
    }

    fn extract_declared_post_count(&self, html: &str) -> Option<u32> {
        blog::extract_declared_post_count(html)
    }

    fn extract_post_list(&self, body: &str) -> Result<PostListPage, ParseError> {
        post::extract_post_list(body)
    }

    fn extract_post(&self, html: &str) -> Result<PostContent, ParseError> {
        post::extract_post(html)
    }

    fn extract_comments(&self, html: &str, page: u32) -> Result<CommentPage, ParseError> {
        comment::extract_comments(html, page)
    }

    fn extract_reactions(&self, json: &str) -> Result<ReactionSet, ParseError> {
        reaction::extract_reactions(json)
    }
}
