//! Blog URL handling for Blog-Harvest
//!
//! This module validates user-supplied blog URLs, extracts the platform blog
//! id from them, and derives every endpoint the crawler requests.

mod endpoints;

pub use endpoints::Endpoints;

use crate::{UrlError, UrlResult};
use std::fmt;
use url::Url;

/// Hosts that serve blog pages
const BLOG_HOSTS: &[&str] = &["blog.naver.com", "m.blog.naver.com"];

/// First path segments that are platform pages rather than blog ids
const RESERVED_SEGMENTS: &[&str] = &[
    "PostList.naver",
    "PostView.naver",
    "NBlogTop.naver",
    "SectionPostList.naver",
    "PostList",
    "PostView",
    "NBlogTop",
    "SectionPostList",
];

/// A validated platform blog identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlogId(String);

impl BlogId {
    /// Validates a raw blog id (ASCII letters, digits, `_` and `-`)
    pub fn new(raw: &str) -> UrlResult<Self> {
        let raw = raw.trim();
        if raw.is_empty()
            || raw.len() > 64
            || !raw
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(UrlError::MalformedId(raw.to_string()));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Extracts the blog id from a blog URL
///
/// Supported shapes:
///
/// - `https://blog.naver.com/<id>` (optionally followed by a post number)
/// - `https://m.blog.naver.com/<id>`
/// - `https://blog.naver.com/PostList.naver?blogId=<id>`
/// - `https://blog.naver.com/PostView.naver?blogId=<id>&logNo=<no>`
///
/// Fails before any network activity when the URL does not have one of
/// these shapes.
///
/// # Example
///
/// ```
/// use blog_harvest::url::parse_blog_url;
///
/// let id = parse_blog_url("https://blog.naver.com/travel_diary").unwrap();
/// assert_eq!(id.as_str(), "travel_diary");
/// ```
pub fn parse_blog_url(input: &str) -> UrlResult<BlogId> {
    let url = Url::parse(input.trim()).map_err(|e| UrlError::Parse(format!("{}: {}", input, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    let host = url
        .host_str()
        .map(|h| h.to_ascii_lowercase())
        .ok_or_else(|| UrlError::NotABlog(input.to_string()))?;
    if !BLOG_HOSTS.contains(&host.as_str()) {
        return Err(UrlError::NotABlog(input.to_string()));
    }

    let first_segment = url
        .path_segments()
        .and_then(|mut segments| segments.next())
        .unwrap_or("");

    if first_segment.starts_with("PostList") || first_segment.starts_with("PostView") {
        let blog_id = url
            .query_pairs()
            .find(|(key, _)| key == "blogId")
            .map(|(_, value)| value.into_owned())
            .ok_or_else(|| UrlError::NotABlog(input.to_string()))?;
        return BlogId::new(&blog_id);
    }

    if first_segment.is_empty() || RESERVED_SEGMENTS.contains(&first_segment) {
        return Err(UrlError::NotABlog(input.to_string()));
    }

    BlogId::new(first_segment)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_desktop_url() {
        let id = parse_blog_url("https://blog.naver.com/travel_diary").unwrap();
        assert_eq!(id.as_str(), "travel_diary");
    }

    #[test]
    fn test_mobile_url_with_post() {
        let id = parse_blog_url("https://m.blog.naver.com/cook-book/223344556677").unwrap();
        assert_eq!(id.as_str(), "cook-book");
    }

    #[test]
    fn test_post_list_query() {
        let id =
            parse_blog_url("https://blog.naver.com/PostList.naver?from=postList&blogId=abc123")
                .unwrap();
        assert_eq!(id.as_str(), "abc123");
    }

    #[test]
    fn test_post_view_query() {
        let id = parse_blog_url("https://blog.naver.com/PostView.naver?blogId=abc&logNo=42")
            .unwrap();
        assert_eq!(id.as_str(), "abc");
    }

    #[test]
    fn test_rejects_other_hosts() {
        assert!(matches!(
            parse_blog_url("https://example.com/abc"),
            Err(UrlError::NotABlog(_))
        ));
        assert!(matches!(
            parse_blog_url("https://cafe.naver.com/abc"),
            Err(UrlError::NotABlog(_))
        ));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(matches!(parse_blog_url("not a url"), Err(UrlError::Parse(_))));
        assert!(matches!(
            parse_blog_url("ftp://blog.naver.com/abc"),
            Err(UrlError::InvalidScheme(_))
        ));
    }

    #[test]
    fn test_rejects_platform_pages_without_id() {
        assert!(parse_blog_url("https://blog.naver.com/").is_err());
        assert!(parse_blog_url("https://blog.naver.com/NBlogTop.naver").is_err());
        assert!(parse_blog_url("https://blog.naver.com/PostList.naver?categoryNo=0").is_err());
    }

    #[test]
    fn test_blog_id_charset() {
        assert!(BlogId::new("ok_id-1").is_ok());
        assert!(matches!(BlogId::new("bad id"), Err(UrlError::MalformedId(_))));
        assert!(matches!(BlogId::new("한글"), Err(UrlError::MalformedId(_))));
        assert!(BlogId::new("").is_err());
    }
}
