use crate::config::types::{BrowserConfig, Config, CrawlerConfig, HttpConfig, OutputConfig, PlatformConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_http_config(&config.http)?;
    validate_platform_config(&config.platform)?;
    validate_browser_config(&config.browser)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates pacing and retry limits
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    for (name, value) in [
        ("request_delay", config.request_delay),
        ("blog_request_delay", config.blog_request_delay),
        ("comment_request_delay", config.comment_request_delay),
    ] {
        if value < 100 {
            return Err(ConfigError::Validation(format!(
                "{} must be >= 100ms, got {}ms",
                name, value
            )));
        }
    }

    if config.max_rate_limit_delay < config.request_delay {
        return Err(ConfigError::Validation(format!(
            "max_rate_limit_delay ({}ms) must not be below request_delay ({}ms)",
            config.max_rate_limit_delay, config.request_delay
        )));
    }

    if config.max_retries < 1 {
        return Err(ConfigError::Validation(
            "max_retries must be >= 1".to_string(),
        ));
    }

    if config.rate_limit_attempts < 1 {
        return Err(ConfigError::Validation(
            "rate_limit_attempts must be >= 1".to_string(),
        ));
    }

    if config.max_concurrent_blogs < 1 || config.max_concurrent_blogs > 8 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_blogs must be between 1 and 8, got {}",
            config.max_concurrent_blogs
        )));
    }

    if config.post_page_size < 1 || config.post_page_size > 100 {
        return Err(ConfigError::Validation(format!(
            "post_page_size must be between 1 and 100, got {}",
            config.post_page_size
        )));
    }

    if config.max_post_pages < 1 || config.max_comment_pages < 1 {
        return Err(ConfigError::Validation(
            "page limits must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_http_config(config: &HttpConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    if scraper::Selector::parse(&config.block_selector).is_err() {
        return Err(ConfigError::Validation(format!(
            "block_selector is not a valid CSS selector: '{}'",
            config.block_selector
        )));
    }

    if config.timeout == 0 {
        return Err(ConfigError::Validation(
            "timeout must be >= 1 second".to_string(),
        ));
    }

    Ok(())
}

fn validate_platform_config(config: &PlatformConfig) -> Result<(), ConfigError> {
    for (name, base) in [
        ("blog_base", &config.blog_base),
        ("mobile_base", &config.mobile_base),
        ("api_base", &config.api_base),
    ] {
        validate_base_url(name, base)?;
    }
    Ok(())
}

fn validate_browser_config(config: &BrowserConfig) -> Result<(), ConfigError> {
    if !config.enabled {
        return Ok(());
    }

    validate_base_url("webdriver_url", &config.webdriver_url)?;

    if config.ready_selector.trim().is_empty() {
        return Err(ConfigError::Validation(
            "ready_selector cannot be empty when the browser is enabled".to_string(),
        ));
    }

    if let Some(path) = &config.driver_path {
        if path.trim().is_empty() {
            return Err(ConfigError::Validation(
                "driver_path cannot be empty".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    if config.export_dir.is_empty() {
        return Err(ConfigError::Validation(
            "export_dir cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates an http(s) base URL without a trailing path
fn validate_base_url(name: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", name, value, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} must use http or https, got '{}'",
            name, value
        )));
    }

    if url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(format!("{} has no host", name)));
    }

    Ok(())
}
