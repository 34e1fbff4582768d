//! Output module for exporting harvested data and reporting statistics
//!
//! This module handles:
//! - Exporting one blog's stored records as JSON or CSV
//! - Exporting every completed blog at once
//! - Loading and printing store statistics

mod csv_output;
mod json_output;
pub mod stats;

pub use json_output::{BlogExport, ExportedBlog, ExportedComment, ExportedPost, ExportedReaction};
pub use stats::{load_statistics, print_statistics, BlogSummary, HarvestStatistics};

use crate::state::BlogStatus;
use crate::storage::{Storage, StorageError};
use chrono::{DateTime, TimeZone};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during export
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Nothing to export: {0}")]
    NoData(String),

    #[error("Cannot write to {path}: {source}")]
    NotWritable {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type for export operations
pub type ExportResult<T> = Result<T, ExportError>;

/// Supported export formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::Csv => write!(f, "csv"),
        }
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            other => Err(format!("unknown export format '{}'", other)),
        }
    }
}

/// Formats the timestamp embedded in export file names
pub fn export_stamp<Tz: TimeZone>(time: &DateTime<Tz>) -> String
where
    Tz::Offset: fmt::Display,
{
    time.format("%Y%m%d_%H%M%S").to_string()
}

/// Makes a blog name safe to use as a file name
///
/// Characters invalid on common file systems become `_`, surrounding dots
/// and spaces are trimmed, and the result is cut to 200 characters.
pub fn sanitize_filename(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| if "<>:\"/\\|?*".contains(c) { '_' } else { c })
        .collect();
    let trimmed: String = replaced
        .trim_matches(|c| c == '.' || c == ' ')
        .chars()
        .take(200)
        .collect();
    if trimmed.is_empty() {
        "unnamed".to_string()
    } else {
        trimmed
    }
}

/// Exports one blog's stored records
///
/// # Arguments
///
/// * `storage` - The store to read from
/// * `blog_id` - Platform id of the blog
/// * `format` - JSON writes one document; CSV writes a posts and a comments file
/// * `dir` - Target directory, created when missing
/// * `stamp` - Timestamp embedded in the file names
///
/// # Returns
///
/// * `Ok(Vec<PathBuf>)` - The files written
/// * `Err(ExportError)` - `NoData` for an unknown blog or one without posts
pub fn export_blog(
    storage: &dyn Storage,
    blog_id: &str,
    format: ExportFormat,
    dir: &Path,
    stamp: &str,
) -> ExportResult<Vec<PathBuf>> {
    let document = json_output::build_export(storage, blog_id)?;

    std::fs::create_dir_all(dir).map_err(|source| ExportError::NotWritable {
        path: dir.to_path_buf(),
        source,
    })?;

    let base = sanitize_filename(&document.blog.blog_name);
    let files = match format {
        ExportFormat::Json => {
            let path = dir.join(format!("{}_{}.json", base, stamp));
            json_output::write_json(&document, &path)?;
            vec![path]
        }
        ExportFormat::Csv => {
            let posts_path = dir.join(format!("{}_posts_{}.csv", base, stamp));
            let comments_path = dir.join(format!("{}_comments_{}.csv", base, stamp));
            csv_output::write_posts(&document, &posts_path)?;
            csv_output::write_comments(&document, &comments_path)?;
            vec![posts_path, comments_path]
        }
    };

    tracing::info!(
        "Exported {} ({} posts) as {} to {}",
        blog_id,
        document.posts.len(),
        format,
        dir.display()
    );
    Ok(files)
}

/// Exports every blog whose crawl completed
///
/// Blogs without posts are skipped.
pub fn export_all(
    storage: &dyn Storage,
    format: ExportFormat,
    dir: &Path,
    stamp: &str,
) -> ExportResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for blog in storage.list_blogs()? {
        if blog.status != BlogStatus::Completed {
            tracing::debug!("Skipping export of {} ({})", blog.id, blog.status);
            continue;
        }
        match export_blog(storage, &blog.id, format, dir, stamp) {
            Ok(written) => files.extend(written),
            Err(ExportError::NoData(reason)) => {
                tracing::warn!("Skipping export of {}: {}", blog.id, reason);
            }
            Err(e) => return Err(e),
        }
    }
    Ok(files)
}

pub(crate) fn create_file(path: &Path) -> ExportResult<std::fs::File> {
    std::fs::File::create(path).map_err(|source| ExportError::NotWritable {
        path: path.to_path_buf(),
        source,
    })
}
