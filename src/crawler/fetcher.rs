//! HTTP fetcher implementation
//!
//! This module handles all page requests for the harvester, including:
//! - Building HTTP clients with the configured browser-like headers
//! - Plain GET requests and browser-rendered requests
//! - Request pacing through the worker's delay gate
//! - Error classification

use crate::config::{Config, HttpConfig};
use crate::crawler::browser::{BrowserError, BrowserLauncher, SessionGuard};
use crate::crawler::events::StopHandle;
use crate::state::DelayGate;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE};
use reqwest::{Client, StatusCode};
use scraper::{Html, Selector};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors returned by a single fetch
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error for {url}: {message}")]
    Network { url: String, message: String },

    #[error("rate limited at {url}: {reason}")]
    RateLimited { url: String, reason: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("HTTP {status} for {url}")]
    Http { url: String, status: u16 },

    #[error("browser session failed: {0}")]
    Browser(#[from] BrowserError),

    #[error("stopped before fetching {0}")]
    Stopped(String),
}

impl FetchError {
    /// Returns true for failures worth retrying with backoff
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::Browser(_))
    }

    /// Returns true when the platform signalled blocking
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

/// How a page must be retrieved
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchMode {
    /// A single HTTP GET
    Plain,

    /// A rendered page from a browser session, ready once `ready_selector` exists
    Browser { ready_selector: String },
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The HTTP configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use blog_harvest::config::HttpConfig;
/// use blog_harvest::crawler::build_http_client;
///
/// let client = build_http_client(&HttpConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &HttpConfig) -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    if let Ok(language) = HeaderValue::from_str(&config.accept_language) {
        headers.insert(ACCEPT_LANGUAGE, language);
    }

    Client::builder()
        .user_agent(config.user_agent.clone())
        .default_headers(headers)
        .timeout(Duration::from_secs(config.timeout))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches pages for one worker
///
/// Every call first waits on the worker's delay gate, so consecutive
/// requests are always separated by at least the current delay measured
/// from the end of the previous request.
pub struct Fetcher {
    client: Client,
    gate: DelayGate,
    block_markers: Vec<String>,
    block_selector: Option<Selector>,
    launcher: Option<Arc<dyn BrowserLauncher>>,
    ready_timeout: Duration,
    stop: StopHandle,
}

impl Fetcher {
    /// Creates a fetcher for one worker
    ///
    /// # Arguments
    ///
    /// * `client` - Shared HTTP client
    /// * `config` - Full configuration (pacing, block markers, browser timeout)
    /// * `launcher` - Browser launcher; browser mode falls back to plain HTTP without one
    /// * `stop` - Stop handle checked before every request
    pub fn new(
        client: Client,
        config: &Config,
        launcher: Option<Arc<dyn BrowserLauncher>>,
        stop: StopHandle,
    ) -> Self {
        let gate = DelayGate::new(
            Duration::from_millis(config.crawler.request_delay),
            Duration::from_millis(config.crawler.max_rate_limit_delay),
        );
        Self {
            client,
            gate,
            block_markers: config.http.block_markers.clone(),
            block_selector: Selector::parse(&config.http.block_selector).ok(),
            launcher,
            ready_timeout: Duration::from_millis(config.browser.ready_timeout),
            stop,
        }
    }

    /// Changes the base delay used for the following requests
    pub fn set_delay(&mut self, delay: Duration) {
        self.gate.set_base(delay);
    }

    /// Returns the delay the gate currently enforces
    pub fn current_delay(&self) -> Duration {
        self.gate.current_delay()
    }

    /// Fetches one page
    ///
    /// # Returns
    ///
    /// * `Ok(String)` - The page body (rendered source in browser mode)
    /// * `Err(FetchError)` - Classified failure; `Stopped` if a stop was requested
    pub async fn fetch(&mut self, url: &str, mode: &FetchMode) -> Result<String, FetchError> {
        if self.stop.is_stopped() {
            return Err(FetchError::Stopped(url.to_string()));
        }
        self.gate.wait().await;
        if self.stop.is_stopped() {
            return Err(FetchError::Stopped(url.to_string()));
        }

        let result = match mode {
            FetchMode::Plain => self.fetch_plain(url).await,
            FetchMode::Browser { ready_selector } => match self.launcher.clone() {
                Some(launcher) => self.fetch_rendered(launcher.as_ref(), url, ready_selector).await,
                None => {
                    tracing::debug!("No browser configured, fetching {} over plain HTTP", url);
                    self.fetch_plain(url).await
                }
            },
        };

        self.gate.record_request();
        match &result {
            Ok(_) => self.gate.reset(),
            Err(e) if e.is_rate_limited() => self.gate.penalize(),
            Err(_) => {}
        }

        result
    }

    async fn fetch_plain(&self, url: &str) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify_request_error(url, &e))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::FORBIDDEN {
            return Err(FetchError::RateLimited {
                url: url.to_string(),
                reason: format!("HTTP {}", status.as_u16()),
            });
        }
        if status == StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound(url.to_string()));
        }
        if status.is_server_error() {
            return Err(FetchError::Network {
                url: url.to_string(),
                message: format!("HTTP {}", status.as_u16()),
            });
        }
        if !status.is_success() {
            return Err(FetchError::Http {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| classify_request_error(url, &e))?;
        self.check_block_page(url, &body)?;
        Ok(body)
    }

    async fn fetch_rendered(
        &self,
        launcher: &dyn BrowserLauncher,
        url: &str,
        ready_selector: &str,
    ) -> Result<String, FetchError> {
        let mut guard = SessionGuard::acquire(launcher).await?;
        let rendered = guard.render(url, ready_selector, self.ready_timeout).await;
        guard.release().await;

        let body = rendered?;
        self.check_block_page(url, &body)?;
        Ok(body)
    }

    /// Rejects a block page served with a success status
    ///
    /// A marker only counts inside the block notice elements, so pages that
    /// merely mention a marker in their content pass.
    fn check_block_page(&self, url: &str, body: &str) -> Result<(), FetchError> {
        if !self.block_markers.iter().any(|marker| body.contains(marker.as_str())) {
            return Ok(());
        }
        let Some(selector) = &self.block_selector else {
            return Ok(());
        };

        let document = Html::parse_document(body);
        let notice: String = document
            .select(selector)
            .flat_map(|element| element.text())
            .collect();
        match self
            .block_markers
            .iter()
            .find(|marker| notice.contains(marker.as_str()))
        {
            Some(marker) => Err(FetchError::RateLimited {
                url: url.to_string(),
                reason: format!("block page marker '{}'", marker),
            }),
            None => Ok(()),
        }
    }
}

fn classify_request_error(url: &str, error: &reqwest::Error) -> FetchError {
    let message = if error.is_timeout() {
        "request timeout".to_string()
    } else if error.is_connect() {
        "connection failed".to_string()
    } else {
        error.to_string()
    };
    FetchError::Network {
        url: url.to_string(),
        message,
    }
}
