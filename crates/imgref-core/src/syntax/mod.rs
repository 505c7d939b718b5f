//! Link grammars.
//!
//! Each grammar lives in its own module and exposes a regex plus
//! parse/build over its own parts type. [`LinkParts`] ties them together as
//! a tagged union so every operation is an exhaustive match.

use std::ops::Range;

use crate::error::ParseMiss;
use crate::model::SyntaxKind;
use crate::utils;

mod html;
mod markdown;
mod wiki;

pub use html::HtmlImage;
pub use markdown::MarkdownImage;
pub use wiki::WikiLink;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkParts {
    Wiki(WikiLink),
    Markdown(MarkdownImage),
    Html(HtmlImage),
}

impl LinkParts {
    pub fn kind(&self) -> SyntaxKind {
        match self {
            LinkParts::Wiki(_) => SyntaxKind::Wiki,
            LinkParts::Markdown(_) => SyntaxKind::Markdown,
            LinkParts::Html(_) => SyntaxKind::Html,
        }
    }

    /// Target exactly as written between the delimiters.
    pub fn target(&self) -> &str {
        match self {
            LinkParts::Wiki(link) => &link.target,
            LinkParts::Markdown(image) => &image.target,
            LinkParts::Html(image) => &image.target,
        }
    }

    /// Target as a vault path (percent-decoded where the grammar encodes).
    pub fn link_path(&self) -> String {
        match self {
            LinkParts::Wiki(link) => link.target.clone(),
            LinkParts::Markdown(image) => utils::decode_link_target(&image.target),
            LinkParts::Html(image) => utils::decode_link_target(&image.target),
        }
    }

    /// Point the link at `path`, encoding it the way the grammar expects.
    pub fn set_target(&mut self, path: &str) {
        match self {
            LinkParts::Wiki(link) => link.target = path.to_string(),
            LinkParts::Markdown(image) => image.set_path(path),
            LinkParts::Html(image) => image.target = path.to_string(),
        }
    }

    pub fn display(&self) -> Option<&str> {
        match self {
            LinkParts::Wiki(link) => link.display.as_deref(),
            LinkParts::Markdown(image) => {
                if image.alt.is_empty() {
                    None
                } else {
                    Some(&image.alt)
                }
            }
            LinkParts::Html(image) => image.alt.as_deref(),
        }
    }

    /// `(width, height)` hints. Markdown cannot carry them.
    pub fn dimensions(&self) -> (Option<u32>, Option<u32>) {
        match self {
            LinkParts::Wiki(link) => match link.dimensions {
                Some((w, h)) => (Some(w), Some(h)),
                None => (None, None),
            },
            LinkParts::Markdown(_) => (None, None),
            LinkParts::Html(image) => (image.width, image.height),
        }
    }

    /// Whether the source carried the leading `!` embed marker.
    pub fn embed(&self) -> bool {
        match self {
            LinkParts::Wiki(link) => link.embed,
            LinkParts::Markdown(_) => true,
            LinkParts::Html(_) => false,
        }
    }

    /// Re-express the link in another grammar.
    ///
    /// Only used for explicit conversion requests. Converting to Markdown
    /// drops width/height since the grammar has nowhere to put them.
    pub fn into_syntax(self, kind: SyntaxKind) -> LinkParts {
        if self.kind() == kind {
            return self;
        }

        let path = self.link_path();
        let display = self.display().map(str::to_string);
        let (width, height) = self.dimensions();

        match kind {
            SyntaxKind::Wiki => LinkParts::Wiki(WikiLink {
                embed: true,
                target: path,
                display,
                dimensions: width.zip(height),
            }),
            SyntaxKind::Markdown => {
                let mut image = MarkdownImage::new(display.unwrap_or_default(), "");
                image.set_path(&path);
                LinkParts::Markdown(image)
            }
            SyntaxKind::Html => LinkParts::Html(HtmlImage::new(path, display, width, height)),
        }
    }
}

/// Parse `raw_text`, which must match the grammar of `kind` in full.
pub fn parse(raw_text: &str, kind: SyntaxKind) -> Result<LinkParts, ParseMiss> {
    let parts = match kind {
        SyntaxKind::Wiki => wiki::parse(raw_text).map(LinkParts::Wiki),
        SyntaxKind::Markdown => markdown::parse(raw_text).map(LinkParts::Markdown),
        SyntaxKind::Html => html::parse(raw_text).map(LinkParts::Html),
    };
    parts.ok_or(ParseMiss { kind })
}

/// Render parts back to text in their own grammar.
///
/// `emit_as_embed` controls the leading `!` of Wiki links; Markdown image
/// syntax always carries it and HTML has no such marker.
pub fn build(parts: &LinkParts, emit_as_embed: bool) -> String {
    match parts {
        LinkParts::Wiki(link) => wiki::build(link, emit_as_embed),
        LinkParts::Markdown(image) => markdown::build(image),
        LinkParts::Html(image) => html::build(image),
    }
}

/// A link found inside a line of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundLink {
    pub parts: LinkParts,
    /// Byte range within the scanned line.
    pub span: Range<usize>,
}

/// Find every link on one line, in any grammar, ordered by position.
///
/// Matches that fail to parse are dropped, as are matches overlapping an
/// earlier one (e.g. an `<img>` tag quoted inside a Markdown alt text).
pub fn find_links(line: &str) -> Vec<FoundLink> {
    let mut found: Vec<FoundLink> = Vec::new();

    for kind in SyntaxKind::ALL {
        let regex = match kind {
            SyntaxKind::Wiki => &*wiki::WIKI_REGEX,
            SyntaxKind::Markdown => &*markdown::MARKDOWN_REGEX,
            SyntaxKind::Html => &*html::HTML_REGEX,
        };

        for matched in regex.find_iter(line) {
            if let Ok(parts) = parse(matched.as_str(), kind) {
                found.push(FoundLink {
                    parts,
                    span: matched.range(),
                });
            }
        }
    }

    found.sort_by_key(|link| (link.span.start, std::cmp::Reverse(link.span.end)));

    let mut kept: Vec<FoundLink> = Vec::with_capacity(found.len());
    for link in found {
        if let Some(previous) = kept.last() {
            if link.span.start < previous.span.end {
                continue;
            }
        }
        kept.push(link);
    }
    kept
}

/// Match `regex` against the whole of `text`, or not at all.
pub(crate) fn full_match<'t>(
    regex: &regex::Regex,
    text: &'t str,
) -> Option<regex::Captures<'t>> {
    let captures = regex.captures(text)?;
    let whole = captures.get(0)?;
    if whole.start() == 0 && whole.end() == text.len() {
        Some(captures)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(raw: &str, kind: SyntaxKind) -> String {
        let parts = parse(raw, kind).expect("should parse");
        build(&parts, parts.embed())
    }

    #[test]
    fn test_round_trip_all_grammars() {
        let samples = [
            ("![[img.png]]", SyntaxKind::Wiki),
            ("[[img.png]]", SyntaxKind::Wiki),
            ("![[img.png|caption|200x100]]", SyntaxKind::Wiki),
            ("![[a/b/img.png||64x64]]", SyntaxKind::Wiki),
            ("![[img.png|]]", SyntaxKind::Wiki),
            ("![](img.png)", SyntaxKind::Markdown),
            ("![alt text](assets/my%20img.png)", SyntaxKind::Markdown),
            ("![t](img.png \"Title\")", SyntaxKind::Markdown),
            ("![t](<my img.png>)", SyntaxKind::Markdown),
            ("<img src=\"img.png\">", SyntaxKind::Html),
            (
                "<img class='x' src='a/img.png' alt=\"Cap\" width=\"10\" height=\"20\" />",
                SyntaxKind::Html,
            ),
        ];

        for (raw, kind) in samples {
            assert_eq!(round_trip(raw, kind), raw, "round trip of {}", raw);
        }
    }

    #[test]
    fn test_markdown_cannot_carry_dimensions() {
        let wiki = parse("![[img.png|Cap|100x200]]", SyntaxKind::Wiki).unwrap();
        let markdown = wiki.into_syntax(SyntaxKind::Markdown);

        assert_eq!(markdown.dimensions(), (None, None));
        assert_eq!(build(&markdown, true), "![Cap](img.png)");
    }

    #[test]
    fn test_into_syntax_keeps_display_and_dimensions_for_html() {
        let wiki = parse("![[a/img one.png|Cap|100x200]]", SyntaxKind::Wiki).unwrap();
        let html = wiki.into_syntax(SyntaxKind::Html);
        assert_eq!(
            build(&html, false),
            "<img src=\"a/img one.png\" alt=\"Cap\" width=\"100\" height=\"200\">"
        );

        let back = html.into_syntax(SyntaxKind::Wiki);
        assert_eq!(build(&back, true), "![[a/img one.png|Cap|100x200]]");
    }

    #[test]
    fn test_into_markdown_encodes_spaces() {
        let wiki = parse("![[a/img one.png]]", SyntaxKind::Wiki).unwrap();
        let markdown = wiki.into_syntax(SyntaxKind::Markdown);
        assert_eq!(build(&markdown, true), "![](a/img%20one.png)");
        assert_eq!(markdown.link_path(), "a/img one.png");
    }

    #[test]
    fn test_parse_requires_full_match() {
        assert!(parse("see ![[img.png]]", SyntaxKind::Wiki).is_err());
        assert!(parse("![[img.png]] trailing", SyntaxKind::Wiki).is_err());
        assert_eq!(
            parse("[text](x.png)", SyntaxKind::Markdown),
            Err(ParseMiss {
                kind: SyntaxKind::Markdown
            })
        );
    }

    #[test]
    fn test_find_links_mixed_line() {
        let line = "A ![[a.png]] then ![b](b.png) and <img src=\"c.png\"> end";
        let links = find_links(line);

        let kinds: Vec<_> = links.iter().map(|l| l.parts.kind()).collect();
        assert_eq!(
            kinds,
            vec![SyntaxKind::Wiki, SyntaxKind::Markdown, SyntaxKind::Html]
        );
        assert_eq!(&line[links[0].span.clone()], "![[a.png]]");
        assert_eq!(&line[links[1].span.clone()], "![b](b.png)");
        assert_eq!(&line[links[2].span.clone()], "<img src=\"c.png\">");
    }

    #[test]
    fn test_find_links_skips_overlaps() {
        let line = "![<img src=\"x.png\">](y.png)";
        let links = find_links(line);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].parts.kind(), SyntaxKind::Markdown);
    }

    #[test]
    fn test_find_links_skips_parse_misses() {
        // Dimension overflows u32: matches the grammar but is not a valid hint.
        let line = "![[img.png|cap|99999999999x1]] ok ![[b.png]]";
        let links = find_links(line);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].parts.target(), "b.png");
    }
}
