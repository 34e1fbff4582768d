use super::dom::{
    cached_regex, first_number, first_text, meta_content, select_all, select_first, text_of,
};
use super::{BlogMeta, ParseError};
use regex::Regex;
use scraper::Html;
use std::sync::OnceLock;

fn platform_title_suffix() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    cached_regex(&PATTERN, r"\s*:\s*네이버\s*블로그\s*$")
}

/// Extracts blog name and author from a blog home page
///
/// The name is read from `og:title`, then `<title>`, then the nickname
/// area; the platform suffix is stripped from page titles. Missing values
/// fall back to the blog id.
///
/// # Returns
///
/// * `Ok(BlogMeta)` - Metadata, possibly with fallback values
/// * `Err(ParseError::Empty)` - The document has no head and no body content
pub(super) fn extract_blog(blog_id: &str, html: &str) -> Result<BlogMeta, ParseError> {
    let document = Html::parse_document(html);
    let root = document.root_element();

    let has_head = !select_all(root, "head > *").is_empty();
    let has_body = select_first(root, "body")
        .map(|body| !text_of(body).is_empty() || body.children().next().is_some())
        .unwrap_or(false);
    if !has_head && !has_body {
        return Err(ParseError::Empty("blog home page"));
    }

    let suffix = platform_title_suffix();
    let strip = |title: String| suffix.replace(&title, "").trim().to_string();

    let blog_name = meta_content(root, r#"meta[property="og:title"]"#)
        .map(strip)
        .filter(|name| !name.is_empty())
        .or_else(|| {
            first_text(root, &["title"])
                .map(strip)
                .filter(|name| !name.is_empty())
        })
        .or_else(|| first_text(root, &["span.nick"]));

    let author_name = first_text(root, &["span.nick", "strong.nick"])
        .or_else(|| meta_content(root, r#"meta[name="author"]"#));

    Ok(BlogMeta {
        blog_name: blog_name.unwrap_or_else(|| blog_id.to_string()),
        author_name: author_name.unwrap_or_else(|| blog_id.to_string()),
    })
}

/// Reads the post count declared on the post-list page
pub(super) fn extract_declared_post_count(html: &str) -> Option<u32> {
    let document = Html::parse_document(html);
    let root = document.root_element();

    ["span.category_title", "em.cnt"]
        .iter()
        .filter_map(|css| select_first(root, css))
        .find_map(|element| first_number(&text_of(element)))
}
