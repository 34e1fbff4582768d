//! Integration tests for the crawler
//!
//! These tests use wiremock to stand in for the blog, mobile and API hosts
//! and drive the full crawl cycle end-to-end.

use blog_harvest::config::{
    BrowserConfig, Config, CrawlerConfig, HttpConfig, OutputConfig, PlatformConfig,
};
use blog_harvest::crawler::{
    BlogOutcome, ChannelSink, Coordinator, EventSink, ProgressEvent, StopHandle,
};
use blog_harvest::extract::BlogMeta;
use blog_harvest::state::{BlogStatus, CrawlProgress, CrawlStage, PostStatus};
use blog_harvest::storage::{PostListing, RunStatus, SqliteStorage, Storage};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

const HOME: &str = r#"<html><head>
    <meta property="og:title" content="Blog One : 네이버 블로그">
    </head><body><span class="nick">kim</span></body></html>"#;

const POST_LIST_PAGE: &str =
    r#"<html><body><span class="category_title">전체보기 2개의 글</span></body></html>"#;

const POSTS: &str = r#"{"resultCode":"S","totalCount":"2","postList":[
    {"logNo":"100","title":"First+post"},
    {"logNo":"200","title":"Second+post"}]}"#;

const REACTIONS: &str = r#"{"contents":[{"reactions":[
    {"reactionType":"like","count":2},{"reactionType":"fun","count":0}]}]}"#;

const COMMENTS_100: &str = r#"<div class="u_cbox"><ul class="u_cbox_list">
    <li class="u_cbox_comment" data-info="commentNo:'1001',replyLevel:1">
      <span class="u_cbox_nick">alice</span>
      <span class="u_cbox_contents">Great post</span>
      <span class="u_cbox_date">2024.01.02. 10:00</span>
      <em class="u_cbox_cnt_recomm">3</em>
    </li>
    <li class="u_cbox_comment u_cbox_type_reply" data-info="commentNo:'1002',replyLevel:2">
      <span class="u_cbox_nick">kim</span>
      <span class="u_cbox_contents">Thanks!</span>
      <span class="u_cbox_date">2024.01.02. 11:00</span>
    </li></ul></div>"#;

const COMMENTS_200: &str = r#"<div class="u_cbox"><ul class="u_cbox_list">
    <li class="u_cbox_comment" data-info="commentNo:'2001',replyLevel:1">
      <span class="u_cbox_nick">bob</span>
      <span class="u_cbox_contents">Where is this?</span>
      <span class="u_cbox_date">2024.01.03. 09:00</span>
    </li></ul></div>"#;

const COMMENTS_100_PAGE_2: &str = r#"<div class="u_cbox"><ul class="u_cbox_list">
    <li class="u_cbox_comment" data-info="commentNo:'1003',replyLevel:1">
      <span class="u_cbox_nick">carol</span>
      <span class="u_cbox_contents">Saved for later</span>
      <span class="u_cbox_date">2024.01.04. 08:00</span>
    </li></ul></div>"#;

fn post_html(title: &str, body: &str) -> String {
    format!(
        r#"<html><body>
        <div class="se-title-text"><span>{}</span></div>
        <a class="blog_ctg">Travel</a>
        <span class="se_publishDate">2024. 1. 1. 09:00</span>
        <div class="se-main-container"><p class="se-text-paragraph">{}</p></div>
        </body></html>"#,
        title, body
    )
}

/// Creates a test configuration pointing every host at the mock server
fn create_test_config(server: &MockServer, db_path: &Path) -> Config {
    Config {
        crawler: CrawlerConfig {
            request_delay: 1,
            blog_request_delay: 1,
            comment_request_delay: 1,
            max_retries: 2,
            retry_backoff: 1,
            rate_limit_attempts: 3,
            max_rate_limit_delay: 8,
            max_concurrent_blogs: 2,
            post_page_size: 30,
            max_post_pages: 10,
            max_comment_pages: 10,
        },
        http: HttpConfig::default(),
        platform: PlatformConfig {
            blog_base: server.uri(),
            mobile_base: format!("{}/m", server.uri()),
            api_base: format!("{}/api", server.uri()),
        },
        browser: BrowserConfig::default(),
        output: OutputConfig {
            database_path: db_path.display().to_string(),
            export_dir: "exports".to_string(),
        },
    }
}

async fn mount_get(server: &MockServer, route: &str, query: &[(&str, &str)], status: u16, body: &str) {
    let mut mock = Mock::given(method("GET")).and(path(route));
    for (key, value) in query {
        mock = mock.and(query_param(*key, *value));
    }
    mock.respond_with(ResponseTemplate::new(status).set_body_string(body))
        .mount(server)
        .await;
}

/// Mounts a complete blog `b1` with two posts and three comments
async fn mount_blog(server: &MockServer) {
    mount_get(server, "/m/b1", &[], 200, HOME).await;
    mount_get(server, "/PostList.naver", &[("blogId", "b1")], 200, POST_LIST_PAGE).await;
    mount_get(
        server,
        "/PostTitleListAsync.naver",
        &[("blogId", "b1"), ("currentPage", "1")],
        200,
        POSTS,
    )
    .await;
    mount_get(server, "/m/b1/100", &[], 200, &post_html("First post", "Hello")).await;
    mount_get(server, "/m/b1/200", &[], 200, &post_html("Second post", "World")).await;
    mount_get(
        server,
        "/api/blogserver/like/v1/search/contents",
        &[],
        200,
        REACTIONS,
    )
    .await;
    mount_get(
        server,
        "/CommentList.naver",
        &[("logNo", "200"), ("currentPage", "1")],
        200,
        COMMENTS_200,
    )
    .await;
}

async fn mount_comments_100(server: &MockServer) {
    mount_get(
        server,
        "/CommentList.naver",
        &[("logNo", "100"), ("currentPage", "1")],
        200,
        COMMENTS_100,
    )
    .await;
}

fn open_shared(db_path: &Path) -> Arc<Mutex<SqliteStorage>> {
    Arc::new(Mutex::new(
        SqliteStorage::new(db_path).expect("Failed to open storage"),
    ))
}

#[tokio::test]
async fn test_full_crawl_single_blog() {
    let server = MockServer::start().await;
    mount_blog(&server).await;
    mount_comments_100(&server).await;

    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("harvest.db");
    let storage = open_shared(&db_path);

    let (sink, mut events) = ChannelSink::new();
    let coordinator = Coordinator::new(create_test_config(&server, &db_path), Arc::clone(&storage))
        .unwrap()
        .with_sink(Arc::new(sink))
        .with_config_hash("test-hash");
    let blog = coordinator
        .register_blog("https://blog.naver.com/b1")
        .unwrap();

    let report = coordinator.run(&[blog]).await.unwrap();
    assert_eq!(report.outcome("b1"), Some(&BlogOutcome::Completed));
    assert_eq!(report.completed(), 1);

    let storage = storage.lock().unwrap();
    let stored = storage.get_blog("b1").unwrap().unwrap();
    assert_eq!(stored.blog_name, "Blog One");
    assert_eq!(stored.author_name, "kim");
    assert_eq!(stored.post_count, 2);
    assert_eq!(stored.status, BlogStatus::Completed);
    assert_eq!(storage.read_progress("b1").unwrap(), Some(CrawlProgress::Done));

    let posts = storage.list_posts("b1").unwrap();
    let numbers: Vec<&str> = posts.iter().map(|p| p.post_no.as_str()).collect();
    assert_eq!(numbers, vec!["100", "200"]);
    assert_eq!(posts[0].title.as_deref(), Some("First post"));
    assert_eq!(posts[0].content.as_deref(), Some("Hello"));
    assert_eq!(posts[0].category.as_deref(), Some("Travel"));
    assert_eq!(posts[0].crawl_status, PostStatus::Completed);
    assert_eq!(posts[0].reaction_total, 2);
    assert_eq!(posts[0].comment_count, 2);
    assert_eq!(posts[1].comment_count, 1);

    let comments = storage.list_comments("b1", "100").unwrap();
    assert_eq!(comments.len(), 2);
    assert!(comments[1].is_reply);
    assert_eq!(comments[1].parent_id, Some(comments[0].id));

    let reactions = storage.list_reactions("b1", "100").unwrap();
    assert_eq!(reactions.len(), 1);
    assert_eq!(reactions[0].reaction_type, "like");

    let run = storage.get_latest_run().unwrap().unwrap();
    assert_eq!(run.config_hash, "test-hash");

    let mut last = None;
    while let Ok(event) = events.try_recv() {
        assert!(event.error.is_none());
        last = Some(event);
    }
    let last = last.unwrap();
    assert_eq!(last.stage, CrawlStage::Done);
    assert_eq!(last.percent, 100);
}

#[tokio::test]
async fn test_rerun_does_not_duplicate_rows() {
    let server = MockServer::start().await;
    mount_blog(&server).await;
    mount_comments_100(&server).await;

    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("harvest.db");
    let storage = open_shared(&db_path);
    let coordinator =
        Coordinator::new(create_test_config(&server, &db_path), Arc::clone(&storage)).unwrap();
    let blog = coordinator
        .register_blog("https://m.blog.naver.com/b1")
        .unwrap();

    coordinator.run(&[blog.clone()]).await.unwrap();
    let first = storage.lock().unwrap().count_rows().unwrap();

    let report = coordinator.run(&[blog.clone(), blog]).await.unwrap();
    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(report.outcome("b1"), Some(&BlogOutcome::Completed));

    let second = storage.lock().unwrap().count_rows().unwrap();
    assert_eq!(first, second);
    assert_eq!(second.blogs, 1);
    assert_eq!(second.posts, 2);
    assert_eq!(second.comments, 3);
    assert_eq!(second.reactions, 2);
}

#[tokio::test]
async fn test_repeated_rate_limit_keeps_comment_cursor() {
    let server = MockServer::start().await;
    mount_blog(&server).await;

    let page_one_with_next = comments_100_with_next();
    mount_get(
        &server,
        "/CommentList.naver",
        &[("logNo", "100"), ("currentPage", "1")],
        200,
        &page_one_with_next,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/CommentList.naver"))
        .and(query_param("logNo", "100"))
        .and(query_param("currentPage", "2"))
        .respond_with(ResponseTemplate::new(429))
        .expect(3)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("harvest.db");
    let storage = open_shared(&db_path);
    let coordinator =
        Coordinator::new(create_test_config(&server, &db_path), Arc::clone(&storage)).unwrap();
    let blog = coordinator
        .register_blog("https://blog.naver.com/b1")
        .unwrap();

    let report = coordinator.run(&[blog]).await.unwrap();
    assert!(matches!(report.outcome("b1"), Some(BlogOutcome::Suspended(_))));
    assert_eq!(report.failed(), 1);

    let storage = storage.lock().unwrap();
    assert_eq!(
        storage.read_progress("b1").unwrap(),
        Some(CrawlProgress::Comments {
            post_index: 0,
            page: 1
        })
    );
    assert_eq!(
        storage.get_blog("b1").unwrap().unwrap().status,
        BlogStatus::Suspended
    );
    assert_eq!(storage.list_comments("b1", "100").unwrap().len(), 2);
    assert!(storage.list_comments("b1", "200").unwrap().is_empty());
}

#[tokio::test]
async fn test_resume_from_post_list_skips_metadata() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/m/b2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(HOME))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/PostTitleListAsync.naver"))
        .and(query_param("currentPage", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(POSTS))
        .expect(0)
        .mount(&server)
        .await;
    mount_get(
        &server,
        "/PostTitleListAsync.naver",
        &[("blogId", "b2"), ("currentPage", "2")],
        200,
        r#"{"postList":[{"logNo":"300","title":"Third"}],"totalCount":"3"}"#,
    )
    .await;
    for no in ["100", "200", "300"] {
        mount_get(
            &server,
            &format!("/m/b2/{}", no),
            &[],
            200,
            &post_html(&format!("Post {}", no), "body"),
        )
        .await;
        mount_get(
            &server,
            "/CommentList.naver",
            &[("logNo", no), ("currentPage", "1")],
            200,
            r#"<ul class="u_cbox_list"></ul>"#,
        )
        .await;
    }
    mount_get(
        &server,
        "/api/blogserver/like/v1/search/contents",
        &[],
        200,
        r#"{"contents":[]}"#,
    )
    .await;

    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("harvest.db");

    // A previous run stored the metadata and the first post-list page
    {
        let mut storage = SqliteStorage::new(&db_path).unwrap();
        storage.track_blog("b2").unwrap();
        storage
            .upsert_blog(
                "b2",
                &BlogMeta {
                    blog_name: "Blog Two".to_string(),
                    author_name: "lee".to_string(),
                },
                "https://blog.naver.com/b2",
            )
            .unwrap();
        let listing = |no: &str| PostListing {
            post_no: no.to_string(),
            title: None,
            post_url: format!("https://blog.naver.com/b2/{}", no),
        };
        storage
            .commit_post_list_page("b2", 1, &[listing("100"), listing("200")])
            .unwrap();
    }

    let mut config = create_test_config(&server, &db_path);
    config.crawler.post_page_size = 2;
    let storage = open_shared(&db_path);
    let coordinator = Coordinator::new(config, Arc::clone(&storage)).unwrap();
    let pending = coordinator.pending_blogs().unwrap();
    assert_eq!(pending.len(), 1);

    let report = coordinator.run(&pending).await.unwrap();
    assert_eq!(report.outcome("b2"), Some(&BlogOutcome::Completed));

    let requests = server.received_requests().await.unwrap();
    assert!(requests.iter().all(|r| r.url.path() != "/m/b2"));

    let storage = storage.lock().unwrap();
    let blog = storage.get_blog("b2").unwrap().unwrap();
    assert_eq!(blog.blog_name, "Blog Two");
    assert_eq!(blog.post_count, 3);
    let numbers: Vec<String> = storage
        .list_posts("b2")
        .unwrap()
        .into_iter()
        .map(|p| p.post_no)
        .collect();
    assert_eq!(numbers, vec!["100", "200", "300"]);
    assert_eq!(storage.read_progress("b2").unwrap(), Some(CrawlProgress::Done));
}

#[tokio::test]
async fn test_failing_blog_does_not_abort_others() {
    let server = MockServer::start().await;
    mount_blog(&server).await;
    mount_comments_100(&server).await;
    mount_get(&server, "/m/gone", &[], 404, "").await;

    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("harvest.db");
    let storage = open_shared(&db_path);
    let coordinator =
        Coordinator::new(create_test_config(&server, &db_path), Arc::clone(&storage)).unwrap();
    let gone = coordinator
        .register_blog("https://blog.naver.com/gone")
        .unwrap();
    let b1 = coordinator
        .register_blog("https://blog.naver.com/b1")
        .unwrap();

    let report = coordinator.run(&[gone, b1]).await.unwrap();
    assert_eq!(report.outcomes[0].0, "gone");
    assert!(matches!(report.outcome("gone"), Some(BlogOutcome::Failed(_))));
    assert_eq!(report.outcome("b1"), Some(&BlogOutcome::Completed));

    let storage = storage.lock().unwrap();
    assert_eq!(
        storage.read_progress("gone").unwrap(),
        Some(CrawlProgress::Metadata)
    );
    assert!(storage.get_blog("gone").unwrap().is_none());
}

#[tokio::test]
async fn test_invalid_url_rejected_before_network() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("harvest.db");
    let coordinator =
        Coordinator::new(create_test_config(&server, &db_path), open_shared(&db_path)).unwrap();

    assert!(coordinator.register_blog("not a url").is_err());
    assert!(coordinator
        .register_blog("https://cafe.naver.com/b1")
        .is_err());
    assert!(server.received_requests().await.unwrap().is_empty());
}

/// First comment page of post 100, linking to a second page
fn comments_100_with_next() -> String {
    COMMENTS_100.replace(
        "</ul></div>",
        r#"</ul><div class="u_cbox_paginate">
            <strong class="u_cbox_page"><span class="u_cbox_num_page">1</span></strong>
            <a class="u_cbox_page"><span class="u_cbox_num_page">2</span></a>
        </div></div>"#,
    )
}

/// Requests a stop once the first comment page is committed
struct StopOnComments {
    stop: StopHandle,
}

impl EventSink for StopOnComments {
    fn emit(&self, event: ProgressEvent) {
        if event.stage == CrawlStage::Comments {
            self.stop.stop();
        }
    }
}

#[tokio::test]
async fn test_stop_mid_comment_walk_resumes_without_refetch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/m/b1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(HOME))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/CommentList.naver"))
        .and(query_param("logNo", "100"))
        .and(query_param("currentPage", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(comments_100_with_next()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/CommentList.naver"))
        .and(query_param("logNo", "100"))
        .and(query_param("currentPage", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(COMMENTS_100_PAGE_2))
        .expect(1)
        .mount(&server)
        .await;
    mount_blog(&server).await;

    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("harvest.db");
    let storage = open_shared(&db_path);

    let coordinator =
        Coordinator::new(create_test_config(&server, &db_path), Arc::clone(&storage)).unwrap();
    let stop = coordinator.stop_handle();
    let coordinator = coordinator.with_sink(Arc::new(StopOnComments { stop }));
    let blog = coordinator
        .register_blog("https://blog.naver.com/b1")
        .unwrap();

    let report = coordinator.run(&[blog.clone()]).await.unwrap();
    assert_eq!(report.outcome("b1"), Some(&BlogOutcome::Stopped));
    {
        let storage = storage.lock().unwrap();
        assert_eq!(
            storage.read_progress("b1").unwrap(),
            Some(CrawlProgress::Comments {
                post_index: 0,
                page: 1
            })
        );
        assert_eq!(storage.list_comments("b1", "100").unwrap().len(), 2);
        let run = storage.get_latest_run().unwrap().unwrap();
        assert_eq!(run.id, report.run_id);
        assert_eq!(run.status, RunStatus::Interrupted);
    }

    let coordinator =
        Coordinator::new(create_test_config(&server, &db_path), Arc::clone(&storage)).unwrap();
    let report = coordinator.run(&[blog]).await.unwrap();
    assert_eq!(report.outcome("b1"), Some(&BlogOutcome::Completed));

    let storage = storage.lock().unwrap();
    assert_eq!(storage.read_progress("b1").unwrap(), Some(CrawlProgress::Done));
    let comments = storage.list_comments("b1", "100").unwrap();
    assert_eq!(comments.len(), 3);
    assert_eq!(comments[2].author, "carol");
    assert_eq!(storage.list_comments("b1", "200").unwrap().len(), 1);
}

/// Serves empty blogs and records when each request arrived
#[derive(Clone, Default)]
struct TimedBlogs {
    arrivals: Arc<Mutex<Vec<(Instant, String)>>>,
}

impl Respond for TimedBlogs {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let route = request.url.path().to_string();
        self.arrivals
            .lock()
            .unwrap()
            .push((Instant::now(), route.clone()));

        match route.as_str() {
            "/PostList.naver" => ResponseTemplate::new(200).set_body_string("<html></html>"),
            "/PostTitleListAsync.naver" => ResponseTemplate::new(200)
                .set_body_string(r#"{"postList":[],"totalCount":"0"}"#),
            home if home.starts_with("/m/") => ResponseTemplate::new(200).set_body_string(HOME),
            _ => ResponseTemplate::new(404),
        }
    }
}

#[tokio::test]
async fn test_worker_paces_requests_across_blogs() {
    let server = MockServer::start().await;
    let responder = TimedBlogs::default();
    Mock::given(method("GET"))
        .respond_with(responder.clone())
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("harvest.db");
    let mut config = create_test_config(&server, &db_path);
    config.crawler.request_delay = 100;
    config.crawler.comment_request_delay = 100;
    config.crawler.blog_request_delay = 300;
    config.crawler.max_concurrent_blogs = 1;

    let coordinator = Coordinator::new(config, open_shared(&db_path)).unwrap();
    let first = coordinator
        .register_blog("https://blog.naver.com/p1")
        .unwrap();
    let second = coordinator
        .register_blog("https://blog.naver.com/p2")
        .unwrap();

    let report = coordinator.run(&[first, second]).await.unwrap();
    assert_eq!(report.completed(), 2);

    let arrivals = responder.arrivals.lock().unwrap().clone();
    assert_eq!(arrivals.len(), 6);
    assert_eq!(arrivals[0].1, "/m/p1");
    assert_eq!(arrivals[3].1, "/m/p2");

    for pair in arrivals.windows(2) {
        let gap = pair[1].0.duration_since(pair[0].0);
        assert!(
            gap >= Duration::from_millis(90),
            "{} followed {} after {:?}",
            pair[1].1,
            pair[0].1,
            gap
        );
    }
    let between_blogs = arrivals[3].0.duration_since(arrivals[2].0);
    assert!(between_blogs >= Duration::from_millis(290), "{:?}", between_blogs);
}

#[tokio::test]
async fn test_block_wording_in_post_body_is_not_a_block() {
    let server = MockServer::start().await;
    mount_get(
        &server,
        "/m/b1/100",
        &[],
        200,
        &post_html(
            "How to get past 자동입력 방지",
            "The captcha said 비정상적인 접근 until I logged in",
        ),
    )
    .await;
    mount_blog(&server).await;
    mount_comments_100(&server).await;

    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("harvest.db");
    let storage = open_shared(&db_path);
    let coordinator =
        Coordinator::new(create_test_config(&server, &db_path), Arc::clone(&storage)).unwrap();
    let blog = coordinator
        .register_blog("https://blog.naver.com/b1")
        .unwrap();

    let report = coordinator.run(&[blog]).await.unwrap();
    assert_eq!(report.outcome("b1"), Some(&BlogOutcome::Completed));

    let storage = storage.lock().unwrap();
    let posts = storage.list_posts("b1").unwrap();
    assert_eq!(posts[0].title.as_deref(), Some("How to get past 자동입력 방지"));
    assert_eq!(posts[0].crawl_status, PostStatus::Completed);
}
