//! Blog-Harvest: a polite single-platform blog archiver
//!
//! This crate crawls Naver Blog sites, collecting blog metadata, posts,
//! comments, and reaction counts into a local SQLite store, and exports the
//! stored records as JSON or CSV. Crawls are resumable per blog.

pub mod config;
pub mod crawler;
pub mod extract;
pub mod output;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Blog-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid blog URL: {0}")]
    InvalidUrl(#[from] UrlError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] crawler::FetchError),

    #[error("Parse error: {0}")]
    Parse(#[from] extract::ParseError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Export error: {0}")]
    Export(#[from] output::ExportError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Crawl stopped by request")]
    Stopped,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Blog URL errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Not a blog URL: {0}")]
    NotABlog(String),

    #[error("Malformed blog id: {0}")]
    MalformedId(String),
}

/// Result type alias for Blog-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use state::{CrawlProgress, CrawlStage};
pub use crate::url::{parse_blog_url, BlogId, Endpoints};
