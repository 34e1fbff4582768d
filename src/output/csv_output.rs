//! CSV export files
//!
//! Posts and comments go to separate files with fixed columns. Files start
//! with a UTF-8 byte order mark so spreadsheet tools detect the encoding.

use crate::output::json_output::{BlogExport, ExportedComment, ExportedPost};
use crate::output::{create_file, ExportError, ExportResult};
use serde::Serialize;
use std::io::Write;
use std::path::Path;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

const COMMENT_COLUMNS: [&str; 10] = [
    "post_no",
    "post_title",
    "comment_no",
    "parent_comment_no",
    "author",
    "content",
    "written_at",
    "like_count",
    "is_reply",
    "page",
];

#[derive(Debug, Serialize)]
struct PostRow<'a> {
    blog_id: &'a str,
    blog_name: &'a str,
    author_name: &'a str,
    post_no: &'a str,
    title: Option<&'a str>,
    category: Option<&'a str>,
    post_date: Option<&'a str>,
    post_url: &'a str,
    crawl_status: &'a str,
    comment_count: u32,
    reaction_total: u32,
    reactions: String,
    fetched_at: Option<&'a str>,
    content: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct CommentRow<'a> {
    post_no: &'a str,
    post_title: Option<&'a str>,
    comment_no: Option<&'a str>,
    parent_comment_no: Option<&'a str>,
    author: &'a str,
    content: &'a str,
    written_at: &'a str,
    like_count: u32,
    is_reply: bool,
    page: u32,
}

fn open_writer(path: &Path) -> ExportResult<csv::Writer<std::fs::File>> {
    let mut file = create_file(path)?;
    file.write_all(UTF8_BOM)
        .map_err(|source| ExportError::NotWritable {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(csv::Writer::from_writer(file))
}

fn finish(mut writer: csv::Writer<std::fs::File>, path: &Path) -> ExportResult<()> {
    writer.flush().map_err(|source| ExportError::NotWritable {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes one row per post
pub(crate) fn write_posts(document: &BlogExport, path: &Path) -> ExportResult<()> {
    let mut writer = open_writer(path)?;
    for post in &document.posts {
        writer.serialize(PostRow {
            blog_id: &document.blog.id,
            blog_name: &document.blog.blog_name,
            author_name: &document.blog.author_name,
            post_no: &post.post_no,
            title: post.title.as_deref(),
            category: post.category.as_deref(),
            post_date: post.post_date.as_deref(),
            post_url: &post.post_url,
            crawl_status: &post.crawl_status,
            comment_count: post.comment_count,
            reaction_total: post.reaction_total,
            reactions: reaction_summary(post),
            fetched_at: post.fetched_at.as_deref(),
            content: post.content.as_deref(),
        })?;
    }
    finish(writer, path)
}

/// Writes one row per comment, replies included
pub(crate) fn write_comments(document: &BlogExport, path: &Path) -> ExportResult<()> {
    let mut writer = open_writer(path)?;
    let mut rows = 0usize;
    for post in &document.posts {
        for comment in &post.comments {
            rows += 1 + comment.replies.len();
            writer.serialize(comment_row(&post.post_no, post.title.as_deref(), None, comment))?;
            for reply in &comment.replies {
                writer.serialize(comment_row(
                    &post.post_no,
                    post.title.as_deref(),
                    comment.comment_no.as_deref(),
                    reply,
                ))?;
            }
        }
    }
    if rows == 0 {
        writer.write_record(COMMENT_COLUMNS)?;
    }
    finish(writer, path)
}

/// Formats a post's reactions as `label count` pairs joined by `; `
fn reaction_summary(post: &ExportedPost) -> String {
    post.reactions
        .iter()
        .map(|reaction| format!("{} {}", reaction.label, reaction.count))
        .collect::<Vec<_>>()
        .join("; ")
}

fn comment_row<'a>(
    post_no: &'a str,
    post_title: Option<&'a str>,
    parent_comment_no: Option<&'a str>,
    comment: &'a ExportedComment,
) -> CommentRow<'a> {
    CommentRow {
        post_no,
        post_title,
        comment_no: comment.comment_no.as_deref(),
        parent_comment_no,
        author: &comment.author,
        content: &comment.content,
        written_at: &comment.written_at,
        like_count: comment.like_count,
        is_reply: comment.is_reply,
        page: comment.page,
    }
}
