use serde::Deserialize;

/// Main configuration structure for Blog-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub platform: PlatformConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    pub output: OutputConfig,
}

/// Crawler pacing and retry configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CrawlerConfig {
    /// Minimum time between post and reaction requests (milliseconds)
    pub request_delay: u64,

    /// Minimum time between blog metadata requests (milliseconds)
    pub blog_request_delay: u64,

    /// Minimum time between comment page requests (milliseconds)
    pub comment_request_delay: u64,

    /// Attempts for a request failing with a network error
    pub max_retries: u32,

    /// Initial backoff between network retries (milliseconds)
    pub retry_backoff: u64,

    /// Consecutive rate-limit responses tolerated before a blog is suspended
    pub rate_limit_attempts: u32,

    /// Upper bound for the delay after rate-limit penalties (milliseconds)
    pub max_rate_limit_delay: u64,

    /// Number of blogs crawled at the same time
    pub max_concurrent_blogs: u32,

    /// Posts requested per post-list page
    pub post_page_size: u32,

    /// Safety limit on post-list pages per blog
    pub max_post_pages: u32,

    /// Safety limit on comment pages per post
    pub max_comment_pages: u32,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            request_delay: 1500,
            blog_request_delay: 2000,
            comment_request_delay: 1000,
            max_retries: 3,
            retry_backoff: 2000,
            rate_limit_attempts: 3,
            max_rate_limit_delay: 60_000,
            max_concurrent_blogs: 1,
            post_page_size: 30,
            max_post_pages: 1000,
            max_comment_pages: 50,
        }
    }
}

/// HTTP request configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct HttpConfig {
    /// User-Agent header sent with every request
    pub user_agent: String,

    /// Accept-Language header sent with every request
    pub accept_language: String,

    /// Whole-request timeout (seconds)
    pub timeout: u64,

    /// Substrings that identify a platform block page in a 200 response
    ///
    /// Only the text of elements matching `block_selector` is searched.
    pub block_markers: Vec<String>,

    /// CSS selector for the notice elements of a block page
    pub block_selector: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
            accept_language: "ko-KR,ko;q=0.9,en-US;q=0.8,en;q=0.7".to_string(),
            timeout: 15,
            block_markers: vec!["비정상적인 접근".to_string(), "자동입력 방지".to_string()],
            block_selector: "#captcha, .captcha_wrap, .error_content, .error_area, #error_content"
                .to_string(),
        }
    }
}

/// Base URLs of the platform hosts
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct PlatformConfig {
    /// Desktop blog host
    pub blog_base: String,

    /// Mobile blog host
    pub mobile_base: String,

    /// Reaction API host
    pub api_base: String,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            blog_base: "https://blog.naver.com".to_string(),
            mobile_base: "https://m.blog.naver.com".to_string(),
            api_base: "https://apis.naver.com".to_string(),
        }
    }
}

/// Browser automation configuration for script-rendered comment pages
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct BrowserConfig {
    /// Render comment pages through a WebDriver session
    pub enabled: bool,

    /// WebDriver endpoint to connect to
    pub webdriver_url: String,

    /// Driver binary to spawn before connecting (e.g. chromedriver)
    pub driver_path: Option<String>,

    /// Selector whose presence marks a rendered comment page
    pub ready_selector: String,

    /// Maximum wait for the ready selector (milliseconds)
    pub ready_timeout: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            webdriver_url: "http://localhost:9515".to_string(),
            driver_path: None,
            ready_selector: ".u_cbox_list".to_string(),
            ready_timeout: 10_000,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Path to the SQLite database file
    pub database_path: String,

    /// Directory receiving JSON/CSV exports
    #[serde(default = "default_export_dir")]
    pub export_dir: String,
}

fn default_export_dir() -> String {
    "exports".to_string()
}
