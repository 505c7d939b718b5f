use regex::Regex;
use std::sync::LazyLock;

use super::full_match;

/// `![[path|display|WxH]]`; both pipe segments are optional.
pub(crate) static WIKI_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"!?\[\[([^\]|]+)(\|[^\]|]*)?(\|\d+x\d+)?\]\]").expect("wiki link regex")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WikiLink {
    pub embed: bool,
    pub target: String,
    /// `Some("")` for a present-but-empty segment (`[[a.png|]]`).
    pub display: Option<String>,
    pub dimensions: Option<(u32, u32)>,
}

pub(super) fn parse(raw: &str) -> Option<WikiLink> {
    let captures = full_match(&WIKI_REGEX, raw)?;

    let target = captures.get(1)?.as_str().to_string();
    let display = captures
        .get(2)
        .map(|segment| segment.as_str()[1..].to_string());

    let dimensions = match captures.get(3) {
        Some(segment) => {
            let (width, height) = segment.as_str()[1..].split_once('x')?;
            Some((width.parse().ok()?, height.parse().ok()?))
        }
        None => None,
    };

    Some(WikiLink {
        embed: raw.starts_with('!'),
        target,
        display,
        dimensions,
    })
}

pub(super) fn build(link: &WikiLink, emit_as_embed: bool) -> String {
    let mut text = String::new();
    if emit_as_embed {
        text.push('!');
    }
    text.push_str("[[");
    text.push_str(&link.target);
    if let Some(display) = &link.display {
        text.push('|');
        text.push_str(display);
    }
    if let Some((width, height)) = link.dimensions {
        text.push_str(&format!("|{}x{}", width, height));
    }
    text.push_str("]]");
    text
}
