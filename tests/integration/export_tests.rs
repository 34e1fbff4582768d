//! Integration tests for JSON and CSV export

use blog_harvest::extract::{BlogMeta, Comment, PostContent, Reaction, ReactionSet};
use blog_harvest::output::{export_all, export_blog, BlogExport, ExportError, ExportFormat};
use blog_harvest::state::{BlogStatus, CrawlProgress};
use blog_harvest::storage::{PostListing, PostOutcome, SqliteStorage, Storage};
use std::path::Path;
use tempfile::TempDir;

fn comment(no: &str, author: &str, content: &str, reply_to: Option<&str>) -> Comment {
    Comment {
        comment_no: Some(no.to_string()),
        author: author.to_string(),
        content: content.to_string(),
        written_at: "2024.01.02. 10:00".to_string(),
        like_count: 1,
        is_reply: reply_to.is_some(),
        parent_key: reply_to.map(|parent| format!("c:{}", parent)),
    }
}

/// Stores blog `b1` with two posts and three comments, one of them a reply
fn seed_blog(db_path: &Path) -> SqliteStorage {
    let mut storage = SqliteStorage::new(db_path).unwrap();
    storage.track_blog("b1").unwrap();
    storage
        .upsert_blog(
            "b1",
            &BlogMeta {
                blog_name: "여행: 일기/2024".to_string(),
                author_name: "kim".to_string(),
            },
            "https://blog.naver.com/b1",
        )
        .unwrap();

    let listing = |no: &str| PostListing {
        post_no: no.to_string(),
        title: Some(format!("Post {}", no)),
        post_url: format!("https://blog.naver.com/b1/{}", no),
    };
    storage
        .commit_post_list_page("b1", 1, &[listing("100"), listing("200")])
        .unwrap();
    storage.set_blog_post_count("b1", 2).unwrap();

    for (index, no) in ["100", "200"].iter().enumerate() {
        let content = PostContent {
            title: Some(format!("Post {}", no)),
            content: Some("line one\nline, two".to_string()),
            category: Some("Travel".to_string()),
            post_date: Some("2024. 1. 1. 09:00".to_string()),
        };
        storage
            .commit_post_content(
                "b1",
                no,
                &PostOutcome::Fetched(content),
                CrawlProgress::PostContent {
                    post_index: index as u32 + 1,
                },
            )
            .unwrap();
    }

    storage
        .commit_reactions(
            "b1",
            "100",
            &ReactionSet {
                reactions: vec![Reaction {
                    reaction_type: "like".to_string(),
                    count: 4,
                }],
            },
            CrawlProgress::Reactions { post_index: 1 },
        )
        .unwrap();

    storage
        .commit_comment_page(
            "b1",
            "100",
            1,
            &[
                comment("1", "alice", "Great post", None),
                comment("2", "kim", "Thanks, \"alice\"", Some("1")),
            ],
            CrawlProgress::Comments {
                post_index: 0,
                page: 1,
            },
        )
        .unwrap();
    storage
        .commit_comment_page(
            "b1",
            "200",
            1,
            &[comment("3", "bob", "Nice", None)],
            CrawlProgress::Comments {
                post_index: 1,
                page: 1,
            },
        )
        .unwrap();

    storage.write_progress("b1", CrawlProgress::Done).unwrap();
    storage
        .update_blog_status("b1", BlogStatus::Completed)
        .unwrap();
    storage
}

fn count_csv_rows(path: &Path) -> usize {
    let mut reader = csv::Reader::from_path(path).unwrap();
    reader.records().map(|r| r.unwrap()).count()
}

#[test]
fn test_csv_export_row_counts() {
    let dir = TempDir::new().unwrap();
    let storage = seed_blog(&dir.path().join("harvest.db"));
    let out = dir.path().join("exports");

    let files = export_blog(&storage, "b1", ExportFormat::Csv, &out, "20240101_120000").unwrap();
    assert_eq!(files.len(), 2);
    assert_eq!(
        files[0].file_name().unwrap().to_str().unwrap(),
        "여행_ 일기_2024_posts_20240101_120000.csv"
    );
    assert_eq!(
        files[1].file_name().unwrap().to_str().unwrap(),
        "여행_ 일기_2024_comments_20240101_120000.csv"
    );

    assert_eq!(count_csv_rows(&files[0]), 2);
    assert_eq!(count_csv_rows(&files[1]), 3);

    let mut posts = csv::Reader::from_path(&files[0]).unwrap();
    let column = posts
        .headers()
        .unwrap()
        .iter()
        .position(|h| h == "reactions")
        .unwrap();
    let rows: Vec<csv::StringRecord> = posts.records().map(|r| r.unwrap()).collect();
    assert_eq!(&rows[0][column], "좋아요 4");
    assert_eq!(&rows[1][column], "");
}

#[test]
fn test_json_export_reads_back() {
    let dir = TempDir::new().unwrap();
    let storage = seed_blog(&dir.path().join("harvest.db"));
    let out = dir.path().join("exports");

    let files = export_blog(&storage, "b1", ExportFormat::Json, &out, "20240101_120000").unwrap();
    assert_eq!(files.len(), 1);

    let text = std::fs::read_to_string(&files[0]).unwrap();
    let document: BlogExport = serde_json::from_str(&text).unwrap();

    assert_eq!(document.blog.id, "b1");
    assert_eq!(document.blog.blog_name, "여행: 일기/2024");
    assert_eq!(document.blog.post_count, 2);
    assert_eq!(document.posts.len(), 2);

    let first = &document.posts[0];
    assert_eq!(first.post_no, "100");
    assert_eq!(first.content.as_deref(), Some("line one\nline, two"));
    assert_eq!(first.reaction_total, 4);
    assert_eq!(first.reactions[0].reaction_type, "like");
    assert_eq!(first.reactions[0].label, "좋아요");
    assert_eq!(first.comments.len(), 1);
    assert_eq!(first.comments[0].replies.len(), 1);
    assert_eq!(first.comments[0].replies[0].content, "Thanks, \"alice\"");

    assert_eq!(document.posts[1].comments.len(), 1);
    assert!(document.posts[1].reactions.is_empty());
}

#[test]
fn test_export_without_data() {
    let dir = TempDir::new().unwrap();
    let mut storage = seed_blog(&dir.path().join("harvest.db"));
    let out = dir.path().join("exports");

    let err = export_blog(&storage, "ghost", ExportFormat::Json, &out, "s").unwrap_err();
    assert!(matches!(err, ExportError::NoData(_)));

    storage
        .upsert_blog(
            "empty",
            &BlogMeta {
                blog_name: "Empty".to_string(),
                author_name: "nobody".to_string(),
            },
            "https://blog.naver.com/empty",
        )
        .unwrap();
    let err = export_blog(&storage, "empty", ExportFormat::Csv, &out, "s").unwrap_err();
    assert!(matches!(err, ExportError::NoData(_)));
    assert!(!out.exists());
}

#[test]
fn test_export_all_only_completed_blogs() {
    let dir = TempDir::new().unwrap();
    let mut storage = seed_blog(&dir.path().join("harvest.db"));
    storage
        .upsert_blog(
            "pending",
            &BlogMeta {
                blog_name: "Pending".to_string(),
                author_name: "lee".to_string(),
            },
            "https://blog.naver.com/pending",
        )
        .unwrap();
    let out = dir.path().join("exports");

    let files = export_all(&storage, ExportFormat::Json, &out, "20240101_120000").unwrap();
    assert_eq!(files.len(), 1);
    assert!(files[0]
        .to_str()
        .unwrap()
        .ends_with("여행_ 일기_2024_20240101_120000.json"));
}

#[test]
fn test_unwritable_export_dir() {
    let dir = TempDir::new().unwrap();
    let storage = seed_blog(&dir.path().join("harvest.db"));
    let blocker = dir.path().join("file");
    std::fs::write(&blocker, "x").unwrap();

    let err = export_blog(&storage, "b1", ExportFormat::Json, &blocker.join("sub"), "s").unwrap_err();
    assert!(matches!(err, ExportError::NotWritable { .. }));
}
