use super::dom::{cached_regex, first_number, first_text, select_all, select_first, text_of};
use super::{Comment, CommentPage, ParseError};
use regex::Regex;
use scraper::{ElementRef, Html};
use std::sync::OnceLock;

/// Extracts comments and the next-page signal from one comment page
///
/// Three markups are understood, tried in order: the `u_cbox` comment box,
/// the blog's own `naverComment_<blog>_<logNo>__comment_<no>` module, and
/// bare nickname/content pairs matched in the raw source. Replies are linked
/// to the nearest preceding top-level comment on the same page. The page has
/// a successor when an enabled "next" control is present or a numbered link
/// for `page + 1` exists.
///
/// # Arguments
///
/// * `html` - The rendered comment box markup
/// * `page` - The 1-based number of this page
///
/// # Returns
///
/// * `Ok(CommentPage)` - Comments in page order (possibly none)
/// * `Err(ParseError::Missing)` - No comment list container and no comments in any markup
pub(super) fn extract_comments(html: &str, page: u32) -> Result<CommentPage, ParseError> {
    let document = Html::parse_document(html);
    let root = document.root_element();

    let mut comments = parse_cbox_comments(root);
    if comments.is_empty() {
        comments = parse_module_comments(root);
    }
    if comments.is_empty() {
        comments = parse_comment_pairs(html);
    }
    if comments.is_empty() && select_first(root, ".u_cbox_list").is_none() {
        return Err(ParseError::Missing("comment list"));
    }

    link_replies(&mut comments);
    Ok(CommentPage {
        comments,
        has_next: has_next_page(root, page),
    })
}

fn data_info_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    cached_regex(&PATTERN, r"commentNo\s*:\s*'?(\d+)")
}

fn class_no_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    cached_regex(&PATTERN, r"comment[_-]?(\d+)")
}

fn reply_level_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    cached_regex(&PATTERN, r"replyLevel\s*:\s*'?(\d+)")
}

fn module_class_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    cached_regex(&PATTERN, r"^naverComment_\d+_\d+__comment_(\d+)$")
}

fn nick_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    cached_regex(&PATTERN, r"u_cbox_nick[^>]*>([^<]+)<")
}

fn contents_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    cached_regex(&PATTERN, r"u_cbox_contents[^>]*>([^<]+)<")
}

/// Parses `li.u_cbox_comment` items of the comment box
fn parse_cbox_comments(root: ElementRef<'_>) -> Vec<Comment> {
    let mut items = select_all(root, "li.u_cbox_comment");
    if items.is_empty() {
        items = select_all(root, ".u_cbox_comment_box");
    }

    items
        .into_iter()
        .filter_map(|item| {
            let author = first_text(item, &[".u_cbox_nick", ".u_cbox_name"]).unwrap_or_default();
            let content =
                first_text(item, &[".u_cbox_contents", ".u_cbox_text_wrap"]).unwrap_or_default();
            if author.is_empty() && content.is_empty() {
                return None;
            }
            Some(Comment {
                comment_no: cbox_comment_no(item),
                author,
                content,
                written_at: first_text(item, &[".u_cbox_date"]).unwrap_or_default(),
                like_count: first_text(item, &[".u_cbox_cnt_recomm"])
                    .and_then(|text| first_number(&text))
                    .unwrap_or(0),
                is_reply: cbox_is_reply(item),
                parent_key: None,
            })
        })
        .collect()
}

/// Parses the blog's own comment module, numbered through its class
fn parse_module_comments(root: ElementRef<'_>) -> Vec<Comment> {
    select_all(root, r#"[class*="naverComment_"]"#)
        .into_iter()
        .filter_map(|item| {
            let element = item.value();
            let comment_no = element.classes().find_map(|class| {
                module_class_pattern()
                    .captures(class)
                    .map(|c| c[1].to_string())
            })?;

            let text = text_of(item);
            if text.is_empty() {
                return None;
            }
            let content = first_text(
                item,
                &[r#"[class*="contents"]"#, r#"[class*="text_wrap"]"#],
            )
            .unwrap_or(text);

            Some(Comment {
                comment_no: Some(comment_no),
                author: first_text(item, &[r#"[class*="nick"]"#, r#"[class*="name"]"#])
                    .unwrap_or_default(),
                content,
                written_at: first_text(item, &[r#"[class*="date"]"#]).unwrap_or_default(),
                like_count: first_text(item, &[r#"[class*="recomm"]"#])
                    .and_then(|text| first_number(&text))
                    .unwrap_or(0),
                is_reply: element
                    .classes()
                    .any(|class| class.to_ascii_lowercase().contains("reply")),
                parent_key: None,
            })
        })
        .collect()
}

/// Pairs nicknames with contents found anywhere in the raw source
fn parse_comment_pairs(html: &str) -> Vec<Comment> {
    let nicks = nick_pattern().captures_iter(html).map(|c| c[1].trim().to_string());
    let contents = contents_pattern()
        .captures_iter(html)
        .map(|c| c[1].trim().to_string());

    nicks
        .zip(contents)
        .filter(|(author, content)| !author.is_empty() && !content.is_empty())
        .map(|(author, content)| Comment {
            comment_no: None,
            author,
            content,
            written_at: String::new(),
            like_count: 0,
            is_reply: false,
            parent_key: None,
        })
        .collect()
}

/// Points each reply at the nearest preceding top-level comment
fn link_replies(comments: &mut [Comment]) {
    let mut last_top_level: Option<String> = None;
    for comment in comments.iter_mut() {
        if comment.is_reply {
            comment.parent_key = last_top_level.clone();
        } else {
            last_top_level = Some(comment.natural_key());
        }
    }
}

fn cbox_comment_no(item: ElementRef<'_>) -> Option<String> {
    let element = item.value();
    element
        .attr("data-info")
        .and_then(|info| data_info_pattern().captures(info))
        .map(|c| c[1].to_string())
        .or_else(|| {
            ["data-comment-no", "data-comment-id"]
                .iter()
                .filter_map(|name| element.attr(name))
                .map(str::trim)
                .find(|value| !value.is_empty())
                .map(String::from)
        })
        .or_else(|| {
            let classes = element.classes().collect::<Vec<_>>().join(" ");
            class_no_pattern()
                .captures(&classes)
                .map(|c| c[1].to_string())
        })
}

fn cbox_is_reply(item: ElementRef<'_>) -> bool {
    let element = item.value();
    if element.classes().any(|class| class.contains("reply")) {
        return true;
    }
    element
        .attr("data-info")
        .and_then(|info| reply_level_pattern().captures(info))
        .and_then(|c| c[1].parse::<u32>().ok())
        .map_or(false, |level| level > 1)
}

fn has_next_page(root: ElementRef<'_>, page: u32) -> bool {
    let enabled_next = select_all(root, "a.u_cbox_next").into_iter().any(|link| {
        let element = link.value();
        let disabled_class = element
            .classes()
            .any(|class| class.contains("disabled") || class.contains("dimmed"));
        let aria_disabled = element.attr("aria-disabled") == Some("true");
        !disabled_class && !aria_disabled
    });
    if enabled_next {
        return true;
    }

    select_all(root, ".u_cbox_num_page")
        .into_iter()
        .any(|link| text_of(link).parse::<u32>().ok() == Some(page + 1))
}
