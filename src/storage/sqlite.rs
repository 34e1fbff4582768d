//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::extract::{BlogMeta, Comment, Reaction, ReactionSet};
use crate::state::{BlogStatus, CrawlProgress, PostStatus};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{
    BlogRecord, BlogStats, CommentRecord, PostListing, PostOutcome, PostRecord, RowCounts,
    RunRecord, RunStatus,
};
use crate::HarvestError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const BLOG_COLUMNS: &str =
    "id, blog_name, author_name, url, post_count, status, created_at, updated_at";

const POST_COLUMNS: &str = "id, blog_id, post_no, title, content, category, post_date, post_url,
     list_position, crawl_status, comment_count, reaction_total, fetched_at";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(HarvestError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, HarvestError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, HarvestError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn blog_from_row(row: &Row<'_>) -> rusqlite::Result<BlogRecord> {
    Ok(BlogRecord {
        id: row.get(0)?,
        blog_name: row.get(1)?,
        author_name: row.get(2)?,
        url: row.get(3)?,
        post_count: row.get(4)?,
        status: BlogStatus::from_db_string(&row.get::<_, String>(5)?)
            .unwrap_or(BlogStatus::Pending),
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn post_from_row(row: &Row<'_>) -> rusqlite::Result<PostRecord> {
    Ok(PostRecord {
        id: row.get(0)?,
        blog_id: row.get(1)?,
        post_no: row.get(2)?,
        title: row.get(3)?,
        content: row.get(4)?,
        category: row.get(5)?,
        post_date: row.get(6)?,
        post_url: row.get(7)?,
        list_position: row.get(8)?,
        crawl_status: PostStatus::from_db_string(&row.get::<_, String>(9)?)
            .unwrap_or(PostStatus::Pending),
        comment_count: row.get(10)?,
        reaction_total: row.get(11)?,
        fetched_at: row.get(12)?,
    })
}

fn post_row_id(conn: &Connection, blog_id: &str, post_no: &str) -> StorageResult<i64> {
    conn.query_row(
        "SELECT id FROM posts WHERE blog_id = ?1 AND post_no = ?2",
        params![blog_id, post_no],
        |row| row.get(0),
    )
    .optional()?
    .ok_or_else(|| StorageError::PostNotFound {
        blog_id: blog_id.to_string(),
        post_no: post_no.to_string(),
    })
}

fn load_progress(conn: &Connection, blog_id: &str) -> StorageResult<Option<CrawlProgress>> {
    let row: Option<(String, u32, u32)> = conn
        .query_row(
            "SELECT stage, cursor_index, cursor_page FROM crawl_progress WHERE blog_id = ?1",
            params![blog_id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .optional()?;

    match row {
        None => Ok(None),
        Some((stage, index, page)) => match CrawlProgress::from_columns(&stage, index, page) {
            Some(progress) => Ok(Some(progress)),
            None => Err(StorageError::CorruptValue {
                column: "crawl_progress.stage",
                value: stage,
            }),
        },
    }
}

fn store_progress(conn: &Connection, blog_id: &str, progress: CrawlProgress) -> StorageResult<()> {
    let (stage, index, page) = progress.to_columns();
    conn.execute(
        "INSERT INTO crawl_progress (blog_id, stage, cursor_index, cursor_page, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(blog_id) DO UPDATE SET
             stage = excluded.stage,
             cursor_index = excluded.cursor_index,
             cursor_page = excluded.cursor_page,
             updated_at = excluded.updated_at",
        params![blog_id, stage, index, page, Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

/// Writes progress unless it would move backwards
fn advance_progress(conn: &Connection, blog_id: &str, progress: CrawlProgress) -> StorageResult<()> {
    if let Some(current) = load_progress(conn, blog_id)? {
        if progress < current {
            return Err(StorageError::ProgressRegression {
                blog_id: blog_id.to_string(),
                current,
                attempted: progress,
            });
        }
    }
    store_progress(conn, blog_id, progress)
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, started_at, finished_at, config_hash, status FROM runs ORDER BY id DESC LIMIT 1",
        )?;

        let run = stmt
            .query_row([], |row| {
                Ok(RunRecord {
                    id: row.get(0)?,
                    started_at: row.get(1)?,
                    finished_at: row.get(2)?,
                    config_hash: row.get(3)?,
                    status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
                        .unwrap_or(RunStatus::Running),
                })
            })
            .optional()?;

        Ok(run)
    }

    fn complete_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![status.to_db_string(), now, run_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    // ===== Blogs =====

    fn upsert_blog(&mut self, blog_id: &str, meta: &BlogMeta, url: &str) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO blogs (id, blog_name, author_name, url, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
             ON CONFLICT(id) DO UPDATE SET
                 blog_name = excluded.blog_name,
                 author_name = excluded.author_name,
                 url = excluded.url,
                 updated_at = excluded.updated_at",
            params![
                blog_id,
                meta.blog_name,
                meta.author_name,
                url,
                BlogStatus::Pending.to_db_string(),
                now
            ],
        )?;
        Ok(())
    }

    fn get_blog(&self, blog_id: &str) -> StorageResult<Option<BlogRecord>> {
        let blog = self
            .conn
            .query_row(
                &format!("SELECT {} FROM blogs WHERE id = ?1", BLOG_COLUMNS),
                params![blog_id],
                blog_from_row,
            )
            .optional()?;
        Ok(blog)
    }

    fn list_blogs(&self) -> StorageResult<Vec<BlogRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM blogs ORDER BY id", BLOG_COLUMNS))?;
        let blogs = stmt
            .query_map([], blog_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(blogs)
    }

    fn update_blog_status(&mut self, blog_id: &str, status: BlogStatus) -> StorageResult<()> {
        let updated = self.conn.execute(
            "UPDATE blogs SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status.to_db_string(), Utc::now().to_rfc3339(), blog_id],
        )?;
        if updated == 0 {
            return Err(StorageError::BlogNotFound(blog_id.to_string()));
        }
        Ok(())
    }

    fn set_blog_post_count(&mut self, blog_id: &str, post_count: u32) -> StorageResult<()> {
        let updated = self.conn.execute(
            "UPDATE blogs SET post_count = ?1, updated_at = ?2 WHERE id = ?3",
            params![post_count, Utc::now().to_rfc3339(), blog_id],
        )?;
        if updated == 0 {
            return Err(StorageError::BlogNotFound(blog_id.to_string()));
        }
        Ok(())
    }

    fn delete_blog(&mut self, blog_id: &str) -> StorageResult<bool> {
        let tx = self.conn.transaction()?;
        let blogs = tx.execute("DELETE FROM blogs WHERE id = ?1", params![blog_id])?;
        let tracked = tx.execute(
            "DELETE FROM crawl_progress WHERE blog_id = ?1",
            params![blog_id],
        )?;
        tx.commit()?;
        Ok(blogs + tracked > 0)
    }

    // ===== Posts =====

    fn commit_post_list_page(
        &mut self,
        blog_id: &str,
        page: u32,
        posts: &[PostListing],
    ) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        for post in posts {
            tx.execute(
                "INSERT INTO posts (blog_id, post_no, title, post_url, list_position, crawl_status)
                 VALUES (?1, ?2, ?3, ?4,
                         (SELECT COALESCE(MAX(list_position), -1) + 1 FROM posts WHERE blog_id = ?1),
                         ?5)
                 ON CONFLICT(blog_id, post_no) DO UPDATE SET
                     title = COALESCE(posts.title, excluded.title),
                     post_url = excluded.post_url",
                params![
                    blog_id,
                    post.post_no,
                    post.title,
                    post.post_url,
                    PostStatus::Pending.to_db_string()
                ],
            )?;
        }
        advance_progress(&tx, blog_id, CrawlProgress::PostList { page })?;
        tx.commit()?;
        Ok(())
    }

    fn list_posts(&self, blog_id: &str) -> StorageResult<Vec<PostRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM posts WHERE blog_id = ?1 ORDER BY list_position",
            POST_COLUMNS
        ))?;
        let posts = stmt
            .query_map(params![blog_id], post_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(posts)
    }

    fn get_post(&self, blog_id: &str, post_no: &str) -> StorageResult<Option<PostRecord>> {
        let post = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM posts WHERE blog_id = ?1 AND post_no = ?2",
                    POST_COLUMNS
                ),
                params![blog_id, post_no],
                post_from_row,
            )
            .optional()?;
        Ok(post)
    }

    fn commit_post_content(
        &mut self,
        blog_id: &str,
        post_no: &str,
        outcome: &PostOutcome,
        progress: CrawlProgress,
    ) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        let post_id = post_row_id(&tx, blog_id, post_no)?;
        let now = Utc::now().to_rfc3339();

        match outcome {
            PostOutcome::Fetched(content) => {
                tx.execute(
                    "UPDATE posts SET
                         title = COALESCE(?1, title),
                         content = ?2,
                         category = ?3,
                         post_date = ?4,
                         crawl_status = ?5,
                         fetched_at = ?6
                     WHERE id = ?7",
                    params![
                        content.title,
                        content.content,
                        content.category,
                        content.post_date,
                        PostStatus::Completed.to_db_string(),
                        now,
                        post_id
                    ],
                )?;
            }
            PostOutcome::Unavailable => {
                tx.execute(
                    "UPDATE posts SET crawl_status = ?1, fetched_at = ?2 WHERE id = ?3",
                    params![PostStatus::Unavailable.to_db_string(), now, post_id],
                )?;
            }
        }

        advance_progress(&tx, blog_id, progress)?;
        tx.commit()?;
        Ok(())
    }

    // ===== Reactions =====

    fn commit_reactions(
        &mut self,
        blog_id: &str,
        post_no: &str,
        reactions: &ReactionSet,
        progress: CrawlProgress,
    ) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        let post_id = post_row_id(&tx, blog_id, post_no)?;

        tx.execute("DELETE FROM reactions WHERE post_id = ?1", params![post_id])?;
        for reaction in &reactions.reactions {
            tx.execute(
                "INSERT INTO reactions (post_id, reaction_type, count) VALUES (?1, ?2, ?3)
                 ON CONFLICT(post_id, reaction_type) DO UPDATE SET count = reactions.count + excluded.count",
                params![post_id, reaction.reaction_type, reaction.count],
            )?;
        }
        tx.execute(
            "UPDATE posts SET reaction_total = ?1 WHERE id = ?2",
            params![reactions.total(), post_id],
        )?;

        advance_progress(&tx, blog_id, progress)?;
        tx.commit()?;
        Ok(())
    }

    fn list_reactions(&self, blog_id: &str, post_no: &str) -> StorageResult<Vec<Reaction>> {
        let post_id = post_row_id(&self.conn, blog_id, post_no)?;
        let mut stmt = self.conn.prepare(
            "SELECT reaction_type, count FROM reactions WHERE post_id = ?1 ORDER BY reaction_type",
        )?;
        let reactions = stmt
            .query_map(params![post_id], |row| {
                Ok(Reaction {
                    reaction_type: row.get(0)?,
                    count: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(reactions)
    }

    // ===== Comments =====

    fn commit_comment_page(
        &mut self,
        blog_id: &str,
        post_no: &str,
        page: u32,
        comments: &[Comment],
        progress: CrawlProgress,
    ) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        let post_id = post_row_id(&tx, blog_id, post_no)?;

        for comment in comments {
            let key = comment.natural_key();
            let parent_id = match &comment.parent_key {
                Some(parent_key) if *parent_key != key => {
                    let parent: Option<i64> = tx
                        .query_row(
                            "SELECT id FROM comments WHERE post_id = ?1 AND natural_key = ?2",
                            params![post_id, parent_key],
                            |row| row.get(0),
                        )
                        .optional()?;
                    if parent.is_none() {
                        tracing::warn!(
                            "Dropping unresolvable parent {} of comment {} on {}/{}",
                            parent_key,
                            key,
                            blog_id,
                            post_no
                        );
                    }
                    parent
                }
                _ => None,
            };

            tx.execute(
                "INSERT INTO comments (post_id, natural_key, comment_no, parent_id, author,
                                       content, written_at, like_count, is_reply, page)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                 ON CONFLICT(post_id, natural_key) DO UPDATE SET
                     comment_no = excluded.comment_no,
                     parent_id = COALESCE(excluded.parent_id, comments.parent_id),
                     author = excluded.author,
                     content = excluded.content,
                     written_at = excluded.written_at,
                     like_count = excluded.like_count,
                     is_reply = excluded.is_reply,
                     page = excluded.page",
                params![
                    post_id,
                    key,
                    comment.comment_no,
                    parent_id,
                    comment.author,
                    comment.content,
                    comment.written_at,
                    comment.like_count,
                    comment.is_reply,
                    page
                ],
            )?;
        }

        tx.execute(
            "UPDATE posts SET comment_count = (SELECT COUNT(*) FROM comments WHERE post_id = ?1)
             WHERE id = ?1",
            params![post_id],
        )?;

        advance_progress(&tx, blog_id, progress)?;
        tx.commit()?;
        Ok(())
    }

    fn list_comments(&self, blog_id: &str, post_no: &str) -> StorageResult<Vec<CommentRecord>> {
        let post_id = post_row_id(&self.conn, blog_id, post_no)?;
        let mut stmt = self.conn.prepare(
            "SELECT id, post_id, comment_no, parent_id, author, content, written_at,
                    like_count, is_reply, page
             FROM comments WHERE post_id = ?1 ORDER BY page, id",
        )?;
        let comments = stmt
            .query_map(params![post_id], |row| {
                Ok(CommentRecord {
                    id: row.get(0)?,
                    post_id: row.get(1)?,
                    comment_no: row.get(2)?,
                    parent_id: row.get(3)?,
                    author: row.get(4)?,
                    content: row.get(5)?,
                    written_at: row.get(6)?,
                    like_count: row.get(7)?,
                    is_reply: row.get(8)?,
                    page: row.get(9)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(comments)
    }

    // ===== Crawl Progress =====

    fn track_blog(&mut self, blog_id: &str) -> StorageResult<()> {
        if load_progress(&self.conn, blog_id)?.is_none() {
            store_progress(&self.conn, blog_id, CrawlProgress::Metadata)?;
        }
        Ok(())
    }

    fn read_progress(&self, blog_id: &str) -> StorageResult<Option<CrawlProgress>> {
        load_progress(&self.conn, blog_id)
    }

    fn write_progress(&mut self, blog_id: &str, progress: CrawlProgress) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        advance_progress(&tx, blog_id, progress)?;
        tx.commit()?;
        Ok(())
    }

    fn reset_progress(&mut self, blog_id: &str) -> StorageResult<()> {
        store_progress(&self.conn, blog_id, CrawlProgress::Metadata)
    }

    fn tracked_blogs(&self) -> StorageResult<Vec<(String, CrawlProgress)>> {
        let mut stmt = self.conn.prepare(
            "SELECT blog_id, stage, cursor_index, cursor_page FROM crawl_progress ORDER BY blog_id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, u32>(2)?,
                    row.get::<_, u32>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(blog_id, stage, index, page)| {
                match CrawlProgress::from_columns(&stage, index, page) {
                    Some(progress) => Ok((blog_id, progress)),
                    None => Err(StorageError::CorruptValue {
                        column: "crawl_progress.stage",
                        value: stage,
                    }),
                }
            })
            .collect()
    }

    // ===== Statistics =====

    fn blog_stats(&self, blog_id: &str) -> StorageResult<BlogStats> {
        let (posts, completed, unavailable, reactions): (i64, i64, i64, i64) =
            self.conn.query_row(
                "SELECT COUNT(*),
                        COALESCE(SUM(crawl_status = 'completed'), 0),
                        COALESCE(SUM(crawl_status = 'unavailable'), 0),
                        COALESCE(SUM(reaction_total), 0)
                 FROM posts WHERE blog_id = ?1",
                params![blog_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )?;

        let (comments, replies): (i64, i64) = self.conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(c.is_reply), 0)
             FROM comments c JOIN posts p ON c.post_id = p.id
             WHERE p.blog_id = ?1",
            params![blog_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok(BlogStats {
            posts: posts as u64,
            posts_completed: completed as u64,
            posts_unavailable: unavailable as u64,
            comments: comments as u64,
            replies: replies as u64,
            reactions: reactions as u64,
        })
    }

    fn count_rows(&self) -> StorageResult<RowCounts> {
        let count = |table: &str| -> StorageResult<u64> {
            let count: i64 = self.conn.query_row(
                &format!("SELECT COUNT(*) FROM {}", table),
                [],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        };

        Ok(RowCounts {
            blogs: count("blogs")?,
            posts: count("posts")?,
            comments: count("comments")?,
            reactions: count("reactions")?,
        })
    }
}
