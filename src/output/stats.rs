//! Statistics generation from the harvest database
//!
//! This module provides functionality for extracting and displaying
//! store statistics from the storage layer.

use crate::state::{BlogStatus, CrawlProgress};
use crate::storage::{BlogStats, RowCounts, RunRecord, Storage, StorageResult};
use std::collections::HashMap;

/// Statistics for one stored blog
#[derive(Debug, Clone)]
pub struct BlogSummary {
    pub id: String,
    pub blog_name: String,
    pub status: BlogStatus,
    pub progress: Option<CrawlProgress>,
    pub stats: BlogStats,
}

/// Store-wide statistics
#[derive(Debug, Clone)]
pub struct HarvestStatistics {
    /// Row counts per table
    pub rows: RowCounts,

    /// Count of blogs by status
    pub blogs_by_status: HashMap<BlogStatus, u64>,

    /// Per-blog breakdown ordered by id
    pub blogs: Vec<BlogSummary>,

    /// The most recent run, if any
    pub latest_run: Option<RunRecord>,
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(HarvestStatistics)` - Successfully loaded statistics
/// * `Err(StorageError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn Storage) -> StorageResult<HarvestStatistics> {
    let rows = storage.count_rows()?;
    let progress: HashMap<String, CrawlProgress> = storage.tracked_blogs()?.into_iter().collect();

    let mut blogs_by_status = HashMap::new();
    let mut blogs = Vec::new();
    for blog in storage.list_blogs()? {
        *blogs_by_status.entry(blog.status).or_insert(0) += 1;
        let stats = storage.blog_stats(&blog.id)?;
        blogs.push(BlogSummary {
            progress: progress.get(&blog.id).copied(),
            id: blog.id,
            blog_name: blog.blog_name,
            status: blog.status,
            stats,
        });
    }

    Ok(HarvestStatistics {
        rows,
        blogs_by_status,
        blogs,
        latest_run: storage.get_latest_run()?,
    })
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &HarvestStatistics) {
    println!("=== Harvest Statistics ===\n");

    println!("Overview:");
    println!("  Blogs: {}", stats.rows.blogs);
    println!("  Posts: {}", stats.rows.posts);
    println!("  Comments: {}", stats.rows.comments);
    println!("  Reaction types recorded: {}", stats.rows.reactions);
    println!();

    if !stats.blogs_by_status.is_empty() {
        println!("Blogs by Status:");
        let mut status_counts: Vec<_> = stats.blogs_by_status.iter().collect();
        status_counts.sort_by(|a, b| b.1.cmp(a.1));
        for (status, count) in status_counts {
            println!("  {}: {}", status, count);
        }
        println!();
    }

    for blog in &stats.blogs {
        let progress = blog
            .progress
            .map(|p| p.to_string())
            .unwrap_or_else(|| "untracked".to_string());
        println!("{} ({}) [{}, {}]", blog.blog_name, blog.id, blog.status, progress);
        println!(
            "  Posts: {} ({} completed, {} unavailable)",
            blog.stats.posts, blog.stats.posts_completed, blog.stats.posts_unavailable
        );
        println!(
            "  Comments: {} ({} replies), reactions: {}",
            blog.stats.comments, blog.stats.replies, blog.stats.reactions
        );
    }
    if !stats.blogs.is_empty() {
        println!();
    }

    if let Some(run) = &stats.latest_run {
        println!(
            "Latest run {}: {} (started {}, finished {})",
            run.id,
            run.status.to_db_string(),
            run.started_at,
            run.finished_at.as_deref().unwrap_or("-")
        );
    }
}
