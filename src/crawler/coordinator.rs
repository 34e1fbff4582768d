//! Crawler coordinator - main crawl orchestration logic
//!
//! This module drives every registered blog through its stages:
//! - Metadata from the blog home page
//! - The paged post list
//! - One pass over the posts each for content, reactions and comments
//!
//! Progress is committed together with the data it guards, so a blog
//! interrupted at any point resumes at the stage and cursor it reached.

use crate::config::Config;
use crate::crawler::browser::BrowserLauncher;
use crate::crawler::events::{EventSink, ProgressEvent, StopHandle, TracingSink};
use crate::crawler::fetcher::{build_http_client, FetchError, FetchMode, Fetcher};
use crate::crawler::pagination::PaginationWalker;
use crate::crawler::retry::{fetch_with_retry, RetryPolicy};
use crate::extract::{NaverMarkupV1, PlatformMarkup};
use crate::state::{BlogStatus, CrawlProgress, PostStatus};
use crate::storage::{
    PostListing, PostOutcome, PostRecord, RunStatus, SqliteStorage, Storage, StorageError,
    StorageResult,
};
use crate::url::{parse_blog_url, BlogId, Endpoints};
use crate::HarvestError;
use reqwest::Client;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinSet;

/// How one blog's crawl ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlogOutcome {
    /// Every stage finished
    Completed,

    /// A fetch or parse failure ended the crawl
    Failed(String),

    /// The platform kept rate limiting the crawler
    Suspended(String),

    /// A stop was requested
    Stopped,
}

impl BlogOutcome {
    /// Returns true for outcomes reported as failed
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_) | Self::Suspended(_))
    }
}

/// Per-blog outcomes of one run, in request order
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: i64,
    pub outcomes: Vec<(String, BlogOutcome)>,
}

impl RunReport {
    /// Looks up the outcome of one blog
    pub fn outcome(&self, blog_id: &str) -> Option<&BlogOutcome> {
        self.outcomes
            .iter()
            .find(|(id, _)| id == blog_id)
            .map(|(_, outcome)| outcome)
    }

    pub fn completed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| *o == BlogOutcome::Completed)
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_failure()).count()
    }

    pub fn stopped(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| *o == BlogOutcome::Stopped)
            .count()
    }
}

/// State shared by all blog workers of a run
struct Shared {
    config: Config,
    endpoints: Endpoints,
    storage: Arc<Mutex<SqliteStorage>>,
    markup: Arc<dyn PlatformMarkup>,
    sink: Arc<dyn EventSink>,
    policy: RetryPolicy,
    comment_mode: FetchMode,
}

impl Shared {
    /// Runs one synchronous storage operation under the lock
    fn with_storage<T>(
        &self,
        op: impl FnOnce(&mut SqliteStorage) -> StorageResult<T>,
    ) -> Result<T, HarvestError> {
        with_storage(&self.storage, op)
    }
}

fn with_storage<T>(
    storage: &Mutex<SqliteStorage>,
    op: impl FnOnce(&mut SqliteStorage) -> StorageResult<T>,
) -> Result<T, HarvestError> {
    let mut guard = storage.lock().map_err(|_| StorageError::LockPoisoned)?;
    Ok(op(&mut guard)?)
}

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Config,
    storage: Arc<Mutex<SqliteStorage>>,
    client: Client,
    markup: Arc<dyn PlatformMarkup>,
    sink: Arc<dyn EventSink>,
    launcher: Option<Arc<dyn BrowserLauncher>>,
    stop: StopHandle,
    config_hash: String,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// The coordinator starts with the current Naver markup, a logging event
    /// sink, and (with the `browser` feature and `browser.enabled`) a
    /// WebDriver launcher for comment pages.
    ///
    /// # Arguments
    ///
    /// * `config` - The harvester configuration
    /// * `storage` - The shared store
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Successfully created coordinator
    /// * `Err(HarvestError)` - The HTTP client could not be built
    pub fn new(config: Config, storage: Arc<Mutex<SqliteStorage>>) -> Result<Self, HarvestError> {
        let client = build_http_client(&config.http)?;
        let launcher = default_launcher(&config);

        Ok(Self {
            config,
            storage,
            client,
            markup: Arc::new(NaverMarkupV1),
            sink: Arc::new(TracingSink),
            launcher,
            stop: StopHandle::new(),
            config_hash: String::new(),
        })
    }

    /// Replaces the progress event sink
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Replaces the markup implementation used for extraction
    pub fn with_markup(mut self, markup: Arc<dyn PlatformMarkup>) -> Self {
        self.markup = markup;
        self
    }

    /// Replaces the browser launcher used for comment pages
    pub fn with_launcher(mut self, launcher: Option<Arc<dyn BrowserLauncher>>) -> Self {
        self.launcher = launcher;
        self
    }

    /// Records the hash of the configuration file with each run
    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = hash.into();
        self
    }

    /// Returns a handle that stops the crawl at the next fetch
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Validates a blog URL and starts tracking the blog
    ///
    /// Fails with `HarvestError::InvalidUrl` before any network access.
    pub fn register_blog(&self, url: &str) -> Result<BlogId, HarvestError> {
        let blog = parse_blog_url(url)?;
        with_storage(&self.storage, |s| s.track_blog(blog.as_str()))?;
        tracing::info!("Registered blog {}", blog);
        Ok(blog)
    }

    /// Lists tracked blogs whose crawl has not finished
    pub fn pending_blogs(&self) -> Result<Vec<BlogId>, HarvestError> {
        let tracked = with_storage(&self.storage, |s| s.tracked_blogs())?;
        let mut pending = Vec::new();
        for (blog_id, progress) in tracked {
            if !progress.is_done() {
                pending.push(BlogId::new(&blog_id)?);
            }
        }
        Ok(pending)
    }

    /// Crawls the given blogs
    ///
    /// Blogs run on a pool of `max-concurrent-blogs` workers; duplicate ids
    /// are crawled once. Each worker keeps one fetcher for all the blogs it
    /// takes, so its pacing carries over from one blog to the next. A blog
    /// whose crawl already finished is crawled again from its metadata. A
    /// failing blog never aborts the others.
    ///
    /// # Returns
    ///
    /// * `Ok(RunReport)` - Per-blog outcomes
    /// * `Err(HarvestError)` - A storage failure, after all workers ended
    pub async fn run(&self, blog_ids: &[BlogId]) -> Result<RunReport, HarvestError> {
        let mut unique = Vec::new();
        let mut seen = HashSet::new();
        for blog in blog_ids {
            if seen.insert(blog.as_str().to_string()) {
                unique.push(blog.clone());
            } else {
                tracing::debug!("Skipping duplicate blog {}", blog);
            }
        }

        let run_id = with_storage(&self.storage, |s| {
            let run_id = s.create_run(&self.config_hash)?;
            for blog in &unique {
                s.track_blog(blog.as_str())?;
                if s.read_progress(blog.as_str())? == Some(CrawlProgress::Done) {
                    s.reset_progress(blog.as_str())?;
                }
            }
            Ok(run_id)
        })?;
        tracing::info!("Starting crawl run {} for {} blogs", run_id, unique.len());

        let shared = Arc::new(Shared {
            config: self.config.clone(),
            endpoints: Endpoints::new(&self.config.platform),
            storage: Arc::clone(&self.storage),
            markup: Arc::clone(&self.markup),
            sink: Arc::clone(&self.sink),
            policy: RetryPolicy::from_config(&self.config.crawler),
            comment_mode: comment_fetch_mode(&self.config),
        });

        let workers =
            (self.config.crawler.max_concurrent_blogs.max(1) as usize).min(unique.len());
        let queue = Arc::new(Mutex::new(unique.iter().cloned().collect::<VecDeque<_>>()));
        let mut tasks = JoinSet::new();

        for worker in 0..workers {
            let shared = Arc::clone(&shared);
            let queue = Arc::clone(&queue);
            let mut fetcher = Fetcher::new(
                self.client.clone(),
                &self.config,
                self.launcher.clone(),
                self.stop.clone(),
            );

            tasks.spawn(async move {
                let mut results = Vec::new();
                while let Some(blog) = next_blog(&queue) {
                    tracing::debug!("Worker {} takes blog {}", worker, blog);
                    let blog_id = blog.as_str().to_string();
                    let result = BlogWorker::new(Arc::clone(&shared), &mut fetcher, blog)
                        .crawl()
                        .await;
                    results.push((blog_id, result));
                }
                results
            });
        }

        let mut outcomes: HashMap<String, BlogOutcome> = HashMap::new();
        let mut storage_error = None;
        while let Some(joined) = tasks.join_next().await {
            let results = match joined {
                Ok(results) => results,
                Err(e) => {
                    tracing::error!("Blog worker panicked: {}", e);
                    continue;
                }
            };
            for (blog_id, result) in results {
                match result {
                    Ok(outcome) => {
                        outcomes.insert(blog_id, outcome);
                    }
                    Err(e) => {
                        tracing::error!("Storage failure while crawling {}: {}", blog_id, e);
                        outcomes.insert(blog_id, BlogOutcome::Failed(e.to_string()));
                        storage_error.get_or_insert(e);
                    }
                }
            }
        }

        let report = RunReport {
            run_id,
            outcomes: unique
                .iter()
                .map(|blog| {
                    let outcome = outcomes
                        .remove(blog.as_str())
                        .unwrap_or_else(|| BlogOutcome::Failed("worker panicked".to_string()));
                    (blog.as_str().to_string(), outcome)
                })
                .collect(),
        };

        let status = if storage_error.is_some() {
            RunStatus::Failed
        } else if self.stop.is_stopped() {
            RunStatus::Interrupted
        } else {
            RunStatus::Completed
        };
        with_storage(&self.storage, |s| s.complete_run(run_id, status))?;

        if let Some(e) = storage_error {
            return Err(e);
        }

        tracing::info!(
            "Crawl run {} finished: {} completed, {} failed, {} stopped",
            run_id,
            report.completed(),
            report.failed(),
            report.stopped()
        );
        Ok(report)
    }
}

/// Takes the next blog off the run queue
fn next_blog(queue: &Mutex<VecDeque<BlogId>>) -> Option<BlogId> {
    match queue.lock() {
        Ok(mut queue) => queue.pop_front(),
        Err(_) => {
            tracing::error!("Blog queue lock poisoned");
            None
        }
    }
}

#[cfg(feature = "browser")]
fn default_launcher(config: &Config) -> Option<Arc<dyn BrowserLauncher>> {
    use crate::crawler::browser::WebDriverLauncher;

    if config.browser.enabled {
        Some(Arc::new(WebDriverLauncher::new(&config.browser)))
    } else {
        None
    }
}

#[cfg(not(feature = "browser"))]
fn default_launcher(config: &Config) -> Option<Arc<dyn BrowserLauncher>> {
    if config.browser.enabled {
        tracing::warn!("Browser rendering requested but the browser feature is not compiled in");
    }
    None
}

fn comment_fetch_mode(config: &Config) -> FetchMode {
    if config.browser.enabled {
        FetchMode::Browser {
            ready_selector: config.browser.ready_selector.clone(),
        }
    } else {
        FetchMode::Plain
    }
}

/// Crawls a single blog with its worker's fetcher
struct BlogWorker<'f> {
    shared: Arc<Shared>,
    fetcher: &'f mut Fetcher,
    blog: BlogId,
    total_posts: u32,
    declared_posts: Option<u32>,
}

impl<'f> BlogWorker<'f> {
    fn new(shared: Arc<Shared>, fetcher: &'f mut Fetcher, blog: BlogId) -> Self {
        Self {
            shared,
            fetcher,
            blog,
            total_posts: 0,
            declared_posts: None,
        }
    }

    fn blog_id(&self) -> &str {
        self.blog.as_str()
    }

    /// Runs the remaining stages and maps the result to an outcome
    ///
    /// Only storage failures are returned as errors.
    async fn crawl(mut self) -> Result<BlogOutcome, HarvestError> {
        let blog_id = self.blog_id().to_string();
        let mut progress = self
            .shared
            .with_storage(|s| s.read_progress(&blog_id))?
            .unwrap_or(CrawlProgress::Metadata);

        let known = self.shared.with_storage(|s| s.get_blog(&blog_id))?.is_some();
        if !known && progress != CrawlProgress::Metadata {
            tracing::warn!("No stored metadata for {}, restarting at metadata", blog_id);
            self.shared.with_storage(|s| s.reset_progress(&blog_id))?;
            progress = CrawlProgress::Metadata;
        }

        if progress != CrawlProgress::Metadata {
            tracing::info!("Resuming {} at {}", blog_id, progress);
            self.set_status(BlogStatus::InProgress)?;
        }

        let outcome = match self.run_stages(progress).await {
            Ok(()) => BlogOutcome::Completed,
            Err(e) => classify_failure(e)?,
        };

        let status = match &outcome {
            BlogOutcome::Completed => Some(BlogStatus::Completed),
            BlogOutcome::Failed(_) => Some(BlogStatus::Failed),
            BlogOutcome::Suspended(_) => Some(BlogStatus::Suspended),
            BlogOutcome::Stopped => None,
        };
        if let Some(status) = status {
            self.set_status(status)?;
        }

        let reached = self
            .shared
            .with_storage(|s| s.read_progress(&blog_id))?
            .unwrap_or(CrawlProgress::Metadata);
        let event = match &outcome {
            BlogOutcome::Completed => ProgressEvent::at(&blog_id, reached, self.total_posts),
            BlogOutcome::Failed(reason) | BlogOutcome::Suspended(reason) => {
                ProgressEvent::failed(&blog_id, reached, self.total_posts, reason.clone())
            }
            BlogOutcome::Stopped => ProgressEvent::failed(
                &blog_id,
                reached,
                self.total_posts,
                "stopped".to_string(),
            ),
        };
        self.shared.sink.emit(event);

        Ok(outcome)
    }

    /// Sets the blog's status when its row exists
    fn set_status(&self, status: BlogStatus) -> Result<(), HarvestError> {
        let blog_id = self.blog_id();
        match self
            .shared
            .with_storage(|s| s.update_blog_status(blog_id, status))
        {
            Err(HarvestError::Storage(StorageError::BlogNotFound(_))) => Ok(()),
            other => other,
        }
    }

    fn emit(&self, progress: CrawlProgress) {
        self.shared
            .sink
            .emit(ProgressEvent::at(self.blog_id(), progress, self.total_posts));
    }

    async fn run_stages(&mut self, mut progress: CrawlProgress) -> Result<(), HarvestError> {
        if progress == CrawlProgress::Metadata {
            self.crawl_metadata().await?;
            progress = CrawlProgress::PostList { page: 0 };
        }

        if let CrawlProgress::PostList { page } = progress {
            self.walk_post_list(page).await?;
            progress = CrawlProgress::PostContent { post_index: 0 };
        }

        let blog_id = self.blog_id().to_string();
        let posts = self.shared.with_storage(|s| s.list_posts(&blog_id))?;
        self.total_posts = posts.len() as u32;

        if let CrawlProgress::PostContent { post_index } = progress {
            self.fetch_contents(&posts, post_index as usize).await?;
            progress = CrawlProgress::Reactions { post_index: 0 };
        }

        let posts = self.shared.with_storage(|s| s.list_posts(&blog_id))?;

        if let CrawlProgress::Reactions { post_index } = progress {
            self.fetch_reactions(&posts, post_index as usize).await?;
            progress = CrawlProgress::Comments {
                post_index: 0,
                page: 0,
            };
        }

        if let CrawlProgress::Comments { post_index, page } = progress {
            self.fetch_comments(&posts, post_index as usize, page).await?;
        }

        self.shared
            .with_storage(|s| s.write_progress(&blog_id, CrawlProgress::Done))?;
        tracing::info!("Finished crawling {}", blog_id);
        Ok(())
    }

    async fn crawl_metadata(&mut self) -> Result<(), HarvestError> {
        let blog_id = self.blog_id().to_string();
        tracing::info!("Fetching metadata for {}", blog_id);
        self.emit(CrawlProgress::Metadata);
        // Measured from the worker's last request, which may belong to the previous blog
        self.fetcher.set_delay(Duration::from_millis(
            self.shared.config.crawler.blog_request_delay,
        ));

        let home_url = self.shared.endpoints.mobile_home(&self.blog);
        let body = fetch_with_retry(
            &mut *self.fetcher,
            &home_url,
            &FetchMode::Plain,
            &self.shared.policy,
        )
        .await?;
        let meta = self.shared.markup.extract_blog(&blog_id, &body)?;

        let list_url = self.shared.endpoints.post_list_page(&self.blog);
        self.declared_posts = match self.fetcher.fetch(&list_url, &FetchMode::Plain).await {
            Ok(list_html) => self.shared.markup.extract_declared_post_count(&list_html),
            Err(FetchError::Stopped(url)) => return Err(FetchError::Stopped(url).into()),
            Err(e) => {
                tracing::debug!("No declared post count for {}: {}", blog_id, e);
                None
            }
        };

        let blog_url = self.shared.endpoints.blog_url(&self.blog);
        self.shared.with_storage(|s| {
            s.upsert_blog(&blog_id, &meta, &blog_url)?;
            s.update_blog_status(&blog_id, BlogStatus::InProgress)?;
            s.write_progress(&blog_id, CrawlProgress::PostList { page: 0 })
        })?;
        tracing::info!("Blog {}: '{}' by {}", blog_id, meta.blog_name, meta.author_name);
        Ok(())
    }

    async fn walk_post_list(&mut self, cursor: u32) -> Result<(), HarvestError> {
        let blog_id = self.blog_id().to_string();
        let crawler = &self.shared.config.crawler;
        let page_size = crawler.post_page_size.max(1);
        self.fetcher
            .set_delay(Duration::from_millis(crawler.request_delay));

        let mut walker = PaginationWalker::resume_after(cursor, crawler.max_post_pages);
        let mut seen: HashSet<String> = HashSet::new();

        while let Some(page) = walker.next_page() {
            let url = self
                .shared
                .endpoints
                .post_list_api(&self.blog, page, page_size);
            let body = match fetch_with_retry(
                &mut *self.fetcher,
                &url,
                &FetchMode::Plain,
                &self.shared.policy,
            )
            .await
            {
                Ok(body) => body,
                Err(FetchError::NotFound(_)) => {
                    walker.complete(0, false);
                    break;
                }
                Err(e) => {
                    walker.fail();
                    return Err(e.into());
                }
            };

            let list = match self.shared.markup.extract_post_list(&body) {
                Ok(list) => list,
                Err(e) => {
                    if page == 1 {
                        tracing::warn!("Post list of {} is unreadable: {}", blog_id, e);
                    } else {
                        tracing::debug!("Post list of {} ends at page {}: {}", blog_id, page, e);
                    }
                    walker.complete(0, false);
                    break;
                }
            };

            let fresh: Vec<PostListing> = list
                .posts
                .iter()
                .filter(|post| seen.insert(post.post_no.clone()))
                .map(|post| PostListing {
                    post_no: post.post_no.clone(),
                    title: post.title.clone(),
                    post_url: self.shared.endpoints.post_url(&self.blog, &post.post_no),
                })
                .collect();

            if fresh.is_empty() {
                walker.complete(0, false);
                break;
            }

            self.shared
                .with_storage(|s| s.commit_post_list_page(&blog_id, page, &fresh))?;

            let enumerated = page.saturating_mul(page_size);
            let has_next = list.posts.len() as u32 >= page_size
                && list.total_count.map_or(true, |total| enumerated < total);
            walker.complete(fresh.len(), has_next);
            self.emit(CrawlProgress::PostList { page });
            tracing::debug!("Post list page {} of {}: {} posts", page, blog_id, fresh.len());
        }

        let enumerated = self
            .shared
            .with_storage(|s| s.list_posts(&blog_id))?
            .len() as u32;
        if let Some(declared) = self.declared_posts {
            if declared != enumerated {
                tracing::warn!(
                    "Blog {} declares {} posts but {} were enumerated",
                    blog_id,
                    declared,
                    enumerated
                );
            }
        }

        self.shared.with_storage(|s| {
            s.set_blog_post_count(&blog_id, enumerated)?;
            s.write_progress(&blog_id, CrawlProgress::PostContent { post_index: 0 })
        })?;
        tracing::info!("Enumerated {} posts for {}", enumerated, blog_id);
        Ok(())
    }

    async fn fetch_contents(&mut self, posts: &[PostRecord], start: usize) -> Result<(), HarvestError> {
        let blog_id = self.blog_id().to_string();
        self.fetcher.set_delay(Duration::from_millis(
            self.shared.config.crawler.request_delay,
        ));

        for (index, post) in posts.iter().enumerate().skip(start) {
            let url = self.shared.endpoints.mobile_post(&self.blog, &post.post_no);
            let outcome = match fetch_with_retry(
                &mut *self.fetcher,
                &url,
                &FetchMode::Plain,
                &self.shared.policy,
            )
            .await
            {
                Ok(body) => match self.shared.markup.extract_post(&body) {
                    Ok(content) => PostOutcome::Fetched(content),
                    Err(e) => {
                        tracing::warn!("Post {}/{} is unreadable: {}", blog_id, post.post_no, e);
                        PostOutcome::Unavailable
                    }
                },
                Err(FetchError::NotFound(_)) => {
                    tracing::warn!("Post {}/{} no longer exists", blog_id, post.post_no);
                    PostOutcome::Unavailable
                }
                Err(e) => return Err(e.into()),
            };

            let next = CrawlProgress::PostContent {
                post_index: index as u32 + 1,
            };
            self.shared.with_storage(|s| {
                s.commit_post_content(&blog_id, &post.post_no, &outcome, next)
            })?;
            self.emit(next);
        }

        self.shared.with_storage(|s| {
            s.write_progress(&blog_id, CrawlProgress::Reactions { post_index: 0 })
        })?;
        Ok(())
    }

    async fn fetch_reactions(&mut self, posts: &[PostRecord], start: usize) -> Result<(), HarvestError> {
        let blog_id = self.blog_id().to_string();
        self.fetcher.set_delay(Duration::from_millis(
            self.shared.config.crawler.request_delay,
        ));

        for (index, post) in posts.iter().enumerate().skip(start) {
            let next = CrawlProgress::Reactions {
                post_index: index as u32 + 1,
            };

            if post.crawl_status == PostStatus::Unavailable {
                self.shared
                    .with_storage(|s| s.write_progress(&blog_id, next))?;
                continue;
            }

            let url = self.shared.endpoints.reactions(&self.blog, &post.post_no);
            let reactions = match fetch_with_retry(
                &mut *self.fetcher,
                &url,
                &FetchMode::Plain,
                &self.shared.policy,
            )
            .await
            {
                Ok(body) => match self.shared.markup.extract_reactions(&body) {
                    Ok(reactions) => Some(reactions),
                    Err(e) => {
                        tracing::warn!("Reactions of {}/{} are unreadable: {}", blog_id, post.post_no, e);
                        None
                    }
                },
                Err(FetchError::NotFound(_)) => None,
                Err(e) => return Err(e.into()),
            };

            self.shared.with_storage(|s| match &reactions {
                Some(reactions) => s.commit_reactions(&blog_id, &post.post_no, reactions, next),
                None => s.write_progress(&blog_id, next),
            })?;
            self.emit(next);
        }

        self.shared.with_storage(|s| {
            s.write_progress(
                &blog_id,
                CrawlProgress::Comments {
                    post_index: 0,
                    page: 0,
                },
            )
        })?;
        Ok(())
    }

    async fn fetch_comments(
        &mut self,
        posts: &[PostRecord],
        start: usize,
        resume_page: u32,
    ) -> Result<(), HarvestError> {
        let blog_id = self.blog_id().to_string();
        let max_pages = self.shared.config.crawler.max_comment_pages;
        self.fetcher.set_delay(Duration::from_millis(
            self.shared.config.crawler.comment_request_delay,
        ));

        for (index, post) in posts.iter().enumerate().skip(start) {
            let post_index = index as u32;
            if post.crawl_status != PostStatus::Unavailable {
                let cursor = if index == start { resume_page } else { 0 };
                self.walk_comments(post_index, &post.post_no, cursor, max_pages)
                    .await?;
            }

            let next = CrawlProgress::Comments {
                post_index: post_index + 1,
                page: 0,
            };
            self.shared
                .with_storage(|s| s.write_progress(&blog_id, next))?;
            self.emit(next);
        }
        Ok(())
    }

    async fn walk_comments(
        &mut self,
        post_index: u32,
        post_no: &str,
        cursor: u32,
        max_pages: u32,
    ) -> Result<(), HarvestError> {
        let blog_id = self.blog_id().to_string();
        let mut walker = PaginationWalker::resume_after(cursor, max_pages);

        while let Some(page) = walker.next_page() {
            let url = self.shared.endpoints.comment_page(&self.blog, post_no, page);
            let body = match fetch_with_retry(
                &mut *self.fetcher,
                &url,
                &self.shared.comment_mode,
                &self.shared.policy,
            )
            .await
            {
                Ok(body) => body,
                Err(FetchError::NotFound(_)) => {
                    walker.complete(0, false);
                    break;
                }
                Err(e) => {
                    walker.fail();
                    return Err(e.into());
                }
            };

            let comment_page = match self.shared.markup.extract_comments(&body, page) {
                Ok(comment_page) => comment_page,
                Err(e) => {
                    tracing::warn!(
                        "Comment page {} of {}/{} is unreadable, ending its walk: {}",
                        page,
                        blog_id,
                        post_no,
                        e
                    );
                    walker.fail();
                    break;
                }
            };

            let progress = CrawlProgress::Comments { post_index, page };
            self.shared.with_storage(|s| {
                s.commit_comment_page(&blog_id, post_no, page, &comment_page.comments, progress)
            })?;
            walker.complete(comment_page.comments.len(), comment_page.has_next);
            self.emit(progress);
            tracing::debug!(
                "Comment page {} of {}/{}: {} comments",
                page,
                blog_id,
                post_no,
                comment_page.comments.len()
            );
        }
        Ok(())
    }
}

/// Maps a stage failure to a blog outcome; storage failures stay errors
fn classify_failure(error: HarvestError) -> Result<BlogOutcome, HarvestError> {
    match error {
        HarvestError::Stopped | HarvestError::Fetch(FetchError::Stopped(_)) => {
            Ok(BlogOutcome::Stopped)
        }
        HarvestError::Fetch(e) if e.is_rate_limited() => {
            tracing::warn!("Suspending blog after repeated rate limiting: {}", e);
            Ok(BlogOutcome::Suspended(e.to_string()))
        }
        HarvestError::Fetch(e) => {
            tracing::error!("Blog crawl failed: {}", e);
            Ok(BlogOutcome::Failed(e.to_string()))
        }
        HarvestError::Parse(e) => {
            tracing::error!("Blog crawl failed: {}", e);
            Ok(BlogOutcome::Failed(e.to_string()))
        }
        other => Err(other),
    }
}
