use super::{ParseError, Reaction, ReactionSet};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct ReactionResponse {
    #[serde(default)]
    contents: Vec<ReactionContent>,
}

#[derive(Debug, Deserialize)]
struct ReactionContent {
    #[serde(default)]
    reactions: Vec<ReactionEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReactionEntry {
    #[serde(default)]
    reaction_type: String,
    #[serde(default)]
    count: u32,
}

/// Extracts the reaction breakdown of a post from the reaction API
///
/// Only reaction types with a non-zero count are kept. A response with no
/// content entries means the post has no reactions.
pub(super) fn extract_reactions(json: &str) -> Result<ReactionSet, ParseError> {
    let response: ReactionResponse =
        serde_json::from_str(json.trim()).map_err(|e| ParseError::Json(e.to_string()))?;

    let reactions = response
        .contents
        .into_iter()
        .next()
        .map(|content| {
            content
                .reactions
                .into_iter()
                .filter(|entry| entry.count > 0 && !entry.reaction_type.is_empty())
                .map(|entry| Reaction {
                    reaction_type: entry.reaction_type,
                    count: entry.count,
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(ReactionSet { reactions })
}

/// Returns the display label of a reaction code, or the code itself
pub fn reaction_label(code: &str) -> &str {
    match code.to_ascii_lowercase().as_str() {
        "like" => "좋아요",
        "sympathy" => "공감",
        "cheer" => "응원해요",
        "congrats" => "축하해요",
        "love" => "사랑해요",
        "wow" => "놀라워요",
        "sad" => "슬퍼요",
        "angry" => "화나요",
        "fun" => "재미있어요",
        "useful" => "유용해요",
        "creative" => "창의적이에요",
        "touching" => "감동이에요",
        "impressive" => "칭찬해요",
        "interesting" => "흥미로워요",
        "thanks" => "고마워요",
        "haha" => "웃겨요",
        _ => code,
    }
}
