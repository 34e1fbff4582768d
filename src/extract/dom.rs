//! Small helpers over `scraper` shared by the HTML extractors

use regex::Regex;
use scraper::{ElementRef, Selector};
use std::sync::OnceLock;

/// Compiles a constant pattern on first use and keeps it for the process
pub(crate) fn cached_regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("constant pattern compiles"))
}

/// Returns the element's text with whitespace runs collapsed
pub(crate) fn text_of(element: ElementRef<'_>) -> String {
    element.text().flat_map(str::split_whitespace).collect::<Vec<_>>().join(" ")
}

/// Returns the first element matching `css` inside `scope`
pub(crate) fn select_first<'a>(scope: ElementRef<'a>, css: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(css).ok()?;
    let found = scope.select(&selector).next();
    found
}

/// Returns every element matching `css` inside `scope`, in document order
pub(crate) fn select_all<'a>(scope: ElementRef<'a>, css: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(css) {
        Ok(selector) => scope.select(&selector).collect(),
        Err(_) => Vec::new(),
    }
}

/// Tries each selector in order and returns the first non-empty text
pub(crate) fn first_text(scope: ElementRef<'_>, selectors: &[&str]) -> Option<String> {
    selectors
        .iter()
        .filter_map(|css| select_first(scope, css))
        .map(text_of)
        .find(|text| !text.is_empty())
}

/// Returns the trimmed `content` attribute of the first matching element
pub(crate) fn meta_content(scope: ElementRef<'_>, css: &str) -> Option<String> {
    select_first(scope, css)
        .and_then(|element| element.value().attr("content"))
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
}

/// Collects the element's non-empty text lines, skipping script and style
pub(crate) fn text_lines(element: ElementRef<'_>) -> Vec<String> {
    element
        .descendants()
        .filter_map(|node| {
            let text = node.value().as_text()?;
            let parent = node.parent().and_then(|p| p.value().as_element().map(|e| e.name()));
            if matches!(parent, Some("script") | Some("style")) {
                return None;
            }
            let line = text.split_whitespace().collect::<Vec<_>>().join(" ");
            (!line.is_empty()).then_some(line)
        })
        .collect()
}

/// Parses the first run of digits (with optional thousands separators)
pub(crate) fn first_number(text: &str) -> Option<u32> {
    let digits: String = text
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit() || *c == ',')
        .filter(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    #[test]
    fn test_first_text_skips_empty_matches() {
        let doc = Html::parse_document(
            r#"<div class="a">   </div><div class="b"> hello
               <b>world</b></div>"#,
        );
        let text = first_text(doc.root_element(), &["div.a", "div.b"]);
        assert_eq!(text.as_deref(), Some("hello world"));
    }

    #[test]
    fn test_text_lines_skip_scripts() {
        let doc = Html::parse_document(
            "<div id='x'><p>one</p><script>var a = 1;</script><p> two </p></div>",
        );
        let root = select_first(doc.root_element(), "#x").unwrap();
        assert_eq!(text_lines(root), vec!["one", "two"]);
    }

    #[test]
    fn test_cached_regex_compiles_once() {
        static PATTERN: OnceLock<Regex> = OnceLock::new();
        let first = cached_regex(&PATTERN, r"(\d+)");
        let second = cached_regex(&PATTERN, r"(\d+)");
        assert!(std::ptr::eq(first, second));
        assert_eq!(&first.captures("no 42").unwrap()[1], "42");
    }

    #[test]
    fn test_first_number() {
        assert_eq!(first_number("전체보기 (1,234)"), Some(1234));
        assert_eq!(first_number("12개의 글"), Some(12));
        assert_eq!(first_number("none"), None);
    }

    #[test]
    fn test_meta_content() {
        let doc = Html::parse_document(
            r#"<html><head><meta property="og:title" content=" Blog "></head></html>"#,
        );
        assert_eq!(
            meta_content(doc.root_element(), r#"meta[property="og:title"]"#).as_deref(),
            Some("Blog")
        );
    }
}
