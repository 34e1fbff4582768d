use super::dom::{
    cached_regex, first_text, meta_content, select_all, select_first, text_lines, text_of,
};
use super::{ParseError, PostContent, PostListPage, PostSummary};
use percent_encoding::percent_decode_str;
use regex::Regex;
use scraper::Html;
use serde_json::Value;
use std::sync::OnceLock;

const TITLE_SELECTORS: &[&str] = &[
    "div.se-title-text",
    "h3.se_textarea",
    "div.tit_h3",
    "div.__se_title_area",
    "h3.tit_view",
    "div.se-module-text h3",
];

const CONTENT_CONTAINERS: &[&str] = &[
    "div.se-main-container",
    "div.__se_component_area",
    "div.post-view",
    "div#postViewArea",
    "div.se_component_wrap",
];

const CATEGORY_SELECTORS: &[&str] = &[
    "a.blog_ctg",
    "em.category",
    "a.pcol2",
    "span.cate",
    r#"a[class*="category"]"#,
];

const DATE_SELECTORS: &[&str] = &[
    ".blog_date",
    "span.se_publishDate",
    "span.date",
    "p.date",
    r#"span[class*="date"]"#,
];

/// Extracts one page of the post list
///
/// The API answers with JSON that may contain `\'` escapes; those are
/// sanitized before parsing. Titles arrive form-encoded and are decoded.
/// When the body is not JSON, post numbers are recovered with a pattern
/// match over the raw text.
///
/// # Returns
///
/// * `Ok(PostListPage)` - Posts of this page (empty past the last page)
/// * `Err(ParseError)` - Neither the JSON shape nor the fallback pattern matched
pub(super) fn extract_post_list(body: &str) -> Result<PostListPage, ParseError> {
    let sanitized = body.trim().replace("\\'", "'");

    match serde_json::from_str::<Value>(&sanitized) {
        Ok(json) => parse_post_list_json(&json),
        Err(_) => parse_post_list_fallback(&sanitized),
    }
}

fn parse_post_list_json(json: &Value) -> Result<PostListPage, ParseError> {
    let items = json
        .get("postList")
        .and_then(Value::as_array)
        .ok_or(ParseError::Missing("postList"))?;

    let posts = items
        .iter()
        .filter_map(|item| {
            let post_no = value_to_string(item.get("logNo")?)?;
            let title = item
                .get("title")
                .and_then(Value::as_str)
                .map(decode_title)
                .filter(|t| !t.is_empty());
            Some(PostSummary { post_no, title })
        })
        .collect();

    let total_count = json
        .get("totalCount")
        .and_then(value_to_string)
        .and_then(|count| count.parse().ok());

    Ok(PostListPage { posts, total_count })
}

fn parse_post_list_fallback(body: &str) -> Result<PostListPage, ParseError> {
    static LOG_NO: OnceLock<Regex> = OnceLock::new();
    static LOG_NO_PARAM: OnceLock<Regex> = OnceLock::new();
    static TITLE: OnceLock<Regex> = OnceLock::new();
    let log_no = cached_regex(&LOG_NO, r#""logNo"\s*:\s*"?(\d+)"?"#);
    let log_no_param = cached_regex(&LOG_NO_PARAM, r"logNo=(\d+)");
    let title = cached_regex(&TITLE, r#""title"\s*:\s*"([^"]*)""#);

    let mut numbers: Vec<String> = log_no
        .captures_iter(body)
        .map(|c| c[1].to_string())
        .collect();
    if numbers.is_empty() {
        numbers = log_no_param
            .captures_iter(body)
            .map(|c| c[1].to_string())
            .collect();
    }
    let mut seen = std::collections::HashSet::new();
    numbers.retain(|n| seen.insert(n.clone()));

    if numbers.is_empty() {
        return Err(ParseError::Missing("logNo"));
    }

    let titles: Vec<String> = title
        .captures_iter(body)
        .map(|c| decode_title(&c[1]))
        .collect();

    let posts = numbers
        .into_iter()
        .enumerate()
        .map(|(i, post_no)| PostSummary {
            post_no,
            title: titles.get(i).cloned().filter(|t| !t.is_empty()),
        })
        .collect();

    Ok(PostListPage {
        posts,
        total_count: None,
    })
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Decodes a form-encoded title (`+` is a space)
fn decode_title(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().trim().to_string()
}

/// Extracts title, content, category and date from a post page
///
/// # Returns
///
/// * `Ok(PostContent)` - At least a title or content was found
/// * `Err(ParseError::Empty)` - The page has neither
pub(super) fn extract_post(html: &str) -> Result<PostContent, ParseError> {
    let document = Html::parse_document(html);
    let root = document.root_element();

    let title = first_text(root, TITLE_SELECTORS)
        .or_else(|| meta_content(root, r#"meta[property="og:title"]"#));

    let content = CONTENT_CONTAINERS
        .iter()
        .filter_map(|css| select_first(root, css))
        .find_map(|container| {
            let paragraphs: Vec<String> = select_all(container, r#"p[class*="se-text"]"#)
                .into_iter()
                .map(text_of)
                .filter(|p| !p.is_empty())
                .collect();
            if !paragraphs.is_empty() {
                return Some(paragraphs.join("\n"));
            }

            let lines = text_lines(container);
            (!lines.is_empty()).then(|| lines.join("\n"))
        })
        .or_else(|| meta_content(root, r#"meta[property="og:description"]"#));

    if title.is_none() && content.is_none() {
        return Err(ParseError::Empty("post page"));
    }

    Ok(PostContent {
        title,
        content,
        category: first_text(root, CATEGORY_SELECTORS),
        post_date: first_text(root, DATE_SELECTORS),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_list_json() {
        let body = r#"{"resultCode":"S","totalCount":"42","postList":[
            {"logNo":"223001","title":"%EC%97%AC%ED%96%89+%EC%9D%BC%EA%B8%B0"},
            {"logNo":223002,"title":"Day+2"}]}"#;
        let page = extract_post_list(body).unwrap();
        assert_eq!(page.total_count, Some(42));
        assert_eq!(page.posts.len(), 2);
        assert_eq!(page.posts[0].post_no, "223001");
        assert_eq!(page.posts[0].title.as_deref(), Some("여행 일기"));
        assert_eq!(page.posts[1].post_no, "223002");
        assert_eq!(page.posts[1].title.as_deref(), Some("Day 2"));
    }

    #[test]
    fn test_post_list_sanitizes_single_quote_escape() {
        let body = r#"{"postList":[{"logNo":"1","title":"it\'s"}],"totalCount":1}"#;
        let page = extract_post_list(body).unwrap();
        assert_eq!(page.posts[0].title.as_deref(), Some("it's"));
        assert_eq!(page.total_count, Some(1));
    }

    #[test]
    fn test_post_list_empty_page() {
        let page = extract_post_list(r#"{"postList":[],"totalCount":"3"}"#).unwrap();
        assert!(page.posts.is_empty());
    }

    #[test]
    fn test_post_list_regex_fallback() {
        let body = r#"broken {"logNo":"11","title":"A"}, {"logNo":"12","title":"B"}, {"logNo":"11"#;
        let page = extract_post_list(body).unwrap();
        let numbers: Vec<_> = page.posts.iter().map(|p| p.post_no.as_str()).collect();
        assert_eq!(numbers, vec!["11", "12"]);
        assert_eq!(page.posts[1].title.as_deref(), Some("B"));
        assert_eq!(page.total_count, None);
    }

    #[test]
    fn test_post_list_without_anchor() {
        assert!(extract_post_list("<html>maintenance</html>").is_err());
        assert!(matches!(
            extract_post_list(r#"{"error":"x"}"#),
            Err(ParseError::Missing("postList"))
        ));
    }

    #[test]
    fn test_post_content_smart_editor() {
        let html = r#"<html><body>
            <div class="se-title-text"><span>First trip</span></div>
            <a class="blog_ctg">Travel</a>
            <span class="se_publishDate">2024. 3. 1. 14:05</span>
            <div class="se-main-container">
              <div class="se-module-text">
                <p class="se-text-paragraph">Hello</p>
                <p class="se-text-paragraph"> </p>
                <p class="se-text-paragraph">World</p>
              </div>
              <script>tracking()</script>
            </div></body></html>"#;
        let post = extract_post(html).unwrap();
        assert_eq!(post.title.as_deref(), Some("First trip"));
        assert_eq!(post.content.as_deref(), Some("Hello\nWorld"));
        assert_eq!(post.category.as_deref(), Some("Travel"));
        assert_eq!(post.post_date.as_deref(), Some("2024. 3. 1. 14:05"));
    }

    #[test]
    fn test_post_content_container_fallback() {
        let html = r#"<html><body><div id="postViewArea"><p>line one</p><p>line two</p>
            <style>.x{}</style></div></body></html>"#;
        let post = extract_post(html).unwrap();
        assert_eq!(post.title, None);
        assert_eq!(post.content.as_deref(), Some("line one\nline two"));
    }

    #[test]
    fn test_post_content_meta_fallback() {
        let html = r#"<html><head><meta property="og:title" content="T">
            <meta property="og:description" content="summary"></head><body></body></html>"#;
        let post = extract_post(html).unwrap();
        assert_eq!(post.title.as_deref(), Some("T"));
        assert_eq!(post.content.as_deref(), Some("summary"));
    }

    #[test]
    fn test_post_without_title_or_content() {
        assert!(matches!(
            extract_post("<html><body><nav>menu</nav></body></html>"),
            Err(ParseError::Empty(_))
        ));
    }
}
