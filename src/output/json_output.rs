//! JSON export document
//!
//! The document nests each post's reactions and comments, with replies
//! under the comment they answer. It deserializes back into the same types.

use crate::extract::{reaction_label, Reaction};
use crate::output::{create_file, ExportError, ExportResult};
use crate::storage::{CommentRecord, Storage};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{BufWriter, Write};
use std::path::Path;

/// A complete export of one blog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlogExport {
    pub blog: ExportedBlog,
    pub posts: Vec<ExportedPost>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedBlog {
    pub id: String,
    pub blog_name: String,
    pub author_name: String,
    pub url: String,
    pub post_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedPost {
    pub post_no: String,
    pub title: Option<String>,
    pub content: Option<String>,
    pub category: Option<String>,
    pub post_date: Option<String>,
    pub post_url: String,
    pub crawl_status: String,
    pub comment_count: u32,
    pub reaction_total: u32,
    pub fetched_at: Option<String>,
    pub reactions: Vec<ExportedReaction>,
    pub comments: Vec<ExportedComment>,
}

/// A reaction count with its display label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedReaction {
    pub reaction_type: String,
    pub label: String,
    pub count: u32,
}

impl From<Reaction> for ExportedReaction {
    fn from(reaction: Reaction) -> Self {
        Self {
            label: reaction_label(&reaction.reaction_type).to_string(),
            reaction_type: reaction.reaction_type,
            count: reaction.count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedComment {
    pub comment_no: Option<String>,
    pub author: String,
    pub content: String,
    pub written_at: String,
    pub like_count: u32,
    pub is_reply: bool,
    pub page: u32,
    #[serde(default)]
    pub replies: Vec<ExportedComment>,
}

impl From<&CommentRecord> for ExportedComment {
    fn from(record: &CommentRecord) -> Self {
        Self {
            comment_no: record.comment_no.clone(),
            author: record.author.clone(),
            content: record.content.clone(),
            written_at: record.written_at.clone(),
            like_count: record.like_count,
            is_reply: record.is_reply,
            page: record.page,
            replies: Vec::new(),
        }
    }
}

/// Nests replies under the top-level comment of their thread
///
/// A reply whose parent is unknown, or appears later, stays top-level.
pub(crate) fn nest_comments(records: &[CommentRecord]) -> Vec<ExportedComment> {
    let mut top: Vec<ExportedComment> = Vec::new();
    let mut thread_of: HashMap<i64, usize> = HashMap::new();

    for record in records {
        let thread = record
            .parent_id
            .and_then(|parent| thread_of.get(&parent).copied());
        match thread {
            Some(index) => {
                top[index].replies.push(ExportedComment::from(record));
                thread_of.insert(record.id, index);
            }
            None => {
                top.push(ExportedComment::from(record));
                thread_of.insert(record.id, top.len() - 1);
            }
        }
    }
    top
}

/// Reads everything stored for a blog into an export document
pub(crate) fn build_export(storage: &dyn Storage, blog_id: &str) -> ExportResult<BlogExport> {
    let blog = storage
        .get_blog(blog_id)?
        .ok_or_else(|| ExportError::NoData(format!("blog {} is not stored", blog_id)))?;
    let records = storage.list_posts(blog_id)?;
    if records.is_empty() {
        return Err(ExportError::NoData(format!("blog {} has no posts", blog_id)));
    }

    let mut posts = Vec::with_capacity(records.len());
    for post in records {
        let reactions = storage
            .list_reactions(blog_id, &post.post_no)?
            .into_iter()
            .map(ExportedReaction::from)
            .collect();
        let comments = nest_comments(&storage.list_comments(blog_id, &post.post_no)?);
        posts.push(ExportedPost {
            post_no: post.post_no,
            title: post.title,
            content: post.content,
            category: post.category,
            post_date: post.post_date,
            post_url: post.post_url,
            crawl_status: post.crawl_status.to_db_string().to_string(),
            comment_count: post.comment_count,
            reaction_total: post.reaction_total,
            fetched_at: post.fetched_at,
            reactions,
            comments,
        });
    }

    Ok(BlogExport {
        blog: ExportedBlog {
            id: blog.id,
            blog_name: blog.blog_name,
            author_name: blog.author_name,
            url: blog.url,
            post_count: blog.post_count,
        },
        posts,
    })
}

pub(crate) fn write_json(document: &BlogExport, path: &Path) -> ExportResult<()> {
    let mut writer = BufWriter::new(create_file(path)?);
    serde_json::to_writer_pretty(&mut writer, document)?;
    writer.flush().map_err(|source| ExportError::NotWritable {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}
