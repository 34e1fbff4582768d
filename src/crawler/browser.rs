//! Browser sessions for script-rendered pages
//!
//! Comment boxes are filled in by scripts, so their pages can be fetched
//! through a browser automation session instead of plain HTTP. Sessions are
//! scoped resources: a [`SessionGuard`] owns one for the duration of a fetch
//! and releases it on every path, including early returns and drops.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by browser automation
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("failed to start browser session: {0}")]
    Launch(String),

    #[error("browser command failed: {0}")]
    Command(String),
}

/// A live browser session
#[async_trait]
pub trait BrowserSession: Send {
    /// Navigates to `url`
    async fn goto(&mut self, url: &str) -> Result<(), BrowserError>;

    /// Waits until `selector` matches, returning false on timeout
    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<bool, BrowserError>;

    /// Returns the current rendered page source
    async fn page_source(&mut self) -> Result<String, BrowserError>;

    /// Ends the session
    async fn close(self: Box<Self>);
}

/// Opens browser sessions
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, BrowserError>;
}

/// Owns one browser session and guarantees its release
pub struct SessionGuard {
    session: Option<Box<dyn BrowserSession>>,
}

impl SessionGuard {
    /// Acquires a session from the launcher
    pub async fn acquire(launcher: &dyn BrowserLauncher) -> Result<Self, BrowserError> {
        let session = launcher.launch().await?;
        Ok(Self {
            session: Some(session),
        })
    }

    /// Opens `url`, waits for `ready_selector` and returns the rendered source
    ///
    /// A readiness timeout is not an error: the source is returned as is and
    /// the extractor decides whether it is usable.
    pub async fn render(
        &mut self,
        url: &str,
        ready_selector: &str,
        timeout: Duration,
    ) -> Result<String, BrowserError> {
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| BrowserError::Command("session already released".to_string()))?;

        session.goto(url).await?;
        if !session.wait_for(ready_selector, timeout).await? {
            tracing::debug!(
                "Selector {} not present after {:?} on {}",
                ready_selector,
                timeout,
                url
            );
        }
        session.page_source().await
    }

    /// Releases the session
    pub async fn release(mut self) {
        if let Some(session) = self.session.take() {
            session.close().await;
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(async move { session.close().await });
                }
                Err(_) => tracing::warn!("Browser session dropped outside a runtime, not closed"),
            }
        }
    }
}

#[cfg(feature = "browser")]
pub use webdriver::WebDriverLauncher;

#[cfg(feature = "browser")]
mod webdriver {
    use super::{BrowserError, BrowserLauncher, BrowserSession};
    use crate::config::BrowserConfig;
    use async_trait::async_trait;
    use fantoccini::{Client, ClientBuilder, Locator};
    use serde_json::{json, Map};
    use std::process::Stdio;
    use std::time::Duration;
    use tokio::process::{Child, Command};
    use tokio::sync::Mutex;

    /// Opens sessions on a WebDriver endpoint, spawning the driver if configured
    pub struct WebDriverLauncher {
        webdriver_url: String,
        driver_path: Option<String>,
        driver: Mutex<Option<Child>>,
    }

    impl WebDriverLauncher {
        pub fn new(config: &BrowserConfig) -> Self {
            Self {
                webdriver_url: config.webdriver_url.clone(),
                driver_path: config.driver_path.clone(),
                driver: Mutex::new(None),
            }
        }

        async fn ensure_driver(&self) -> Result<(), BrowserError> {
            let Some(path) = &self.driver_path else {
                return Ok(());
            };
            let mut driver = self.driver.lock().await;
            if driver.is_some() {
                return Ok(());
            }

            let port = url::Url::parse(&self.webdriver_url)
                .ok()
                .and_then(|u| u.port())
                .unwrap_or(9515);
            let child = Command::new(path)
                .arg(format!("--port={}", port))
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .kill_on_drop(true)
                .spawn()
                .map_err(|e| BrowserError::Launch(format!("{}: {}", path, e)))?;
            tracing::info!("Started WebDriver {} on port {}", path, port);
            *driver = Some(child);

            tokio::time::sleep(Duration::from_millis(500)).await;
            Ok(())
        }
    }

    #[async_trait]
    impl BrowserLauncher for WebDriverLauncher {
        async fn launch(&self) -> Result<Box<dyn BrowserSession>, BrowserError> {
            self.ensure_driver().await?;

            let mut capabilities = Map::new();
            capabilities.insert(
                "goog:chromeOptions".to_string(),
                json!({ "args": ["--headless=new", "--disable-gpu", "--no-sandbox"] }),
            );

            let client = ClientBuilder::native()
                .capabilities(capabilities)
                .connect(&self.webdriver_url)
                .await
                .map_err(|e| BrowserError::Launch(e.to_string()))?;
            Ok(Box::new(WebDriverSession { client }))
        }
    }

    struct WebDriverSession {
        client: Client,
    }

    #[async_trait]
    impl BrowserSession for WebDriverSession {
        async fn goto(&mut self, url: &str) -> Result<(), BrowserError> {
            self.client
                .goto(url)
                .await
                .map_err(|e| BrowserError::Command(e.to_string()))
        }

        async fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<bool, BrowserError> {
            let found = self
                .client
                .wait()
                .at_most(timeout)
                .for_element(Locator::Css(selector))
                .await;
            Ok(found.is_ok())
        }

        async fn page_source(&mut self) -> Result<String, BrowserError> {
            self.client
                .source()
                .await
                .map_err(|e| BrowserError::Command(e.to_string()))
        }

        async fn close(self: Box<Self>) {
            if let Err(e) = self.client.close().await {
                tracing::debug!("Closing browser session failed: {}", e);
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Launcher whose sessions serve fixed markup and count their lifecycle
    pub(crate) struct FixtureLauncher {
        pub body: String,
        pub fail_goto: bool,
        pub launched: Arc<AtomicUsize>,
        pub closed: Arc<AtomicUsize>,
    }

    impl FixtureLauncher {
        pub(crate) fn new(body: &str, fail_goto: bool) -> Self {
            Self {
                body: body.to_string(),
                fail_goto,
                launched: Arc::new(AtomicUsize::new(0)),
                closed: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    struct FixtureSession {
        body: String,
        fail_goto: bool,
        closed: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl BrowserLauncher for FixtureLauncher {
        async fn launch(&self) -> Result<Box<dyn BrowserSession>, BrowserError> {
            self.launched.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FixtureSession {
                body: self.body.clone(),
                fail_goto: self.fail_goto,
                closed: self.closed.clone(),
            }))
        }
    }

    #[async_trait]
    impl BrowserSession for FixtureSession {
        async fn goto(&mut self, _url: &str) -> Result<(), BrowserError> {
            if self.fail_goto {
                Err(BrowserError::Command("navigation failed".to_string()))
            } else {
                Ok(())
            }
        }

        async fn wait_for(&mut self, selector: &str, _timeout: Duration) -> Result<bool, BrowserError> {
            Ok(self.body.contains(selector.trim_start_matches('.')))
        }

        async fn page_source(&mut self) -> Result<String, BrowserError> {
            Ok(self.body.clone())
        }

        async fn close(self: Box<Self>) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_render_and_release() {
        let launcher = FixtureLauncher::new("<ul class='u_cbox_list'></ul>", false);
        let mut guard = SessionGuard::acquire(&launcher).await.unwrap();
        let source = guard
            .render("http://x", ".u_cbox_list", Duration::from_millis(10))
            .await
            .unwrap();
        guard.release().await;

        assert!(source.contains("u_cbox_list"));
        assert_eq!(launcher.launched.load(Ordering::SeqCst), 1);
        assert_eq!(launcher.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_release_after_failure() {
        let launcher = FixtureLauncher::new("", true);
        let mut guard = SessionGuard::acquire(&launcher).await.unwrap();
        let result = guard.render("http://x", ".u_cbox_list", Duration::from_millis(10)).await;
        guard.release().await;

        assert!(matches!(result, Err(BrowserError::Command(_))));
        assert_eq!(launcher.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_drop_releases_session() {
        let launcher = FixtureLauncher::new("", false);
        {
            let _guard = SessionGuard::acquire(&launcher).await.unwrap();
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(launcher.closed.load(Ordering::SeqCst), 1);
    }
}
