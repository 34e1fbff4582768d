//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Blog-Harvest database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track harvest runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL
);

-- Blogs, keyed by platform blog id
CREATE TABLE IF NOT EXISTS blogs (
    id TEXT PRIMARY KEY,
    blog_name TEXT NOT NULL,
    author_name TEXT NOT NULL,
    url TEXT NOT NULL,
    post_count INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Posts, unique per (blog, platform post number)
CREATE TABLE IF NOT EXISTS posts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    blog_id TEXT NOT NULL REFERENCES blogs(id) ON DELETE CASCADE,
    post_no TEXT NOT NULL,
    title TEXT,
    content TEXT,
    category TEXT,
    post_date TEXT,
    post_url TEXT NOT NULL,
    list_position INTEGER NOT NULL,
    crawl_status TEXT NOT NULL,
    comment_count INTEGER NOT NULL DEFAULT 0,
    reaction_total INTEGER NOT NULL DEFAULT 0,
    fetched_at TEXT,
    UNIQUE(blog_id, post_no)
);

CREATE INDEX IF NOT EXISTS idx_posts_blog_position ON posts(blog_id, list_position);

-- Comments, unique per (post, natural key)
CREATE TABLE IF NOT EXISTS comments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    post_id INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
    natural_key TEXT NOT NULL,
    comment_no TEXT,
    parent_id INTEGER REFERENCES comments(id) ON DELETE SET NULL,
    author TEXT NOT NULL,
    content TEXT NOT NULL,
    written_at TEXT NOT NULL,
    like_count INTEGER NOT NULL DEFAULT 0,
    is_reply INTEGER NOT NULL DEFAULT 0,
    page INTEGER NOT NULL,
    UNIQUE(post_id, natural_key)
);

CREATE INDEX IF NOT EXISTS idx_comments_post_page ON comments(post_id, page);

-- Reaction breakdown, overwritten on every fetch
CREATE TABLE IF NOT EXISTS reactions (
    post_id INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
    reaction_type TEXT NOT NULL,
    count INTEGER NOT NULL,
    PRIMARY KEY (post_id, reaction_type)
);

-- Resumable position per tracked blog (the blog row exists only after metadata)
CREATE TABLE IF NOT EXISTS crawl_progress (
    blog_id TEXT PRIMARY KEY,
    stage TEXT NOT NULL,
    cursor_index INTEGER NOT NULL DEFAULT 0,
    cursor_page INTEGER NOT NULL DEFAULT 0,
    updated_at TEXT NOT NULL
);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
