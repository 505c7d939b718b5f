use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;

use super::full_match;

/// `<img ... src="path" ...>`
pub(crate) static HTML_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<img\s+[^>]*src\s*=\s*["']([^"']+)["'][^>]*>"#).expect("html img regex")
});

/// One `name=value` attribute; consuming values keeps quoted text from
/// being mistaken for attributes.
static ATTRIBUTE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([A-Za-z_:][-A-Za-z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#)
        .expect("html attribute regex")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HtmlImage {
    pub target: String,
    pub alt: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// The parsed tag, when there is one. Rebuilding splices into it so
    /// attribute order, quoting and unknown attributes survive.
    tag: Option<HtmlTag>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct HtmlTag {
    raw: String,
    src: Range<usize>,
    alt: Option<AttrValue>,
    width: Option<AttrValue>,
    height: Option<AttrValue>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AttrValue {
    span: Range<usize>,
    value: String,
    quote: Option<char>,
}

impl HtmlImage {
    pub fn new(
        target: impl Into<String>,
        alt: Option<String>,
        width: Option<u32>,
        height: Option<u32>,
    ) -> Self {
        Self {
            target: target.into(),
            alt,
            width,
            height,
            tag: None,
        }
    }
}

pub(super) fn parse(raw: &str) -> Option<HtmlImage> {
    let captures = full_match(&HTML_REGEX, raw)?;
    let src = captures.get(1)?.range();

    let mut alt = None;
    let mut width = None;
    let mut height = None;

    for attribute in ATTRIBUTE_REGEX.captures_iter(raw) {
        let name = attribute.get(1)?.as_str().to_ascii_lowercase();
        let (value, quote) = if let Some(value) = attribute.get(2) {
            (value, Some('"'))
        } else if let Some(value) = attribute.get(3) {
            (value, Some('\''))
        } else {
            (attribute.get(4)?, None)
        };
        let parsed = AttrValue {
            span: value.range(),
            value: value.as_str().to_string(),
            quote,
        };

        let slot = match name.as_str() {
            "alt" => &mut alt,
            "width" => &mut width,
            "height" => &mut height,
            _ => continue,
        };
        if slot.is_none() {
            *slot = Some(parsed);
        }
    }

    let dimension = |attr: &Option<AttrValue>| {
        attr.as_ref()
            .and_then(|attr| attr.value.trim().parse::<u32>().ok())
    };

    Some(HtmlImage {
        target: raw[src.clone()].to_string(),
        alt: alt.as_ref().map(|attr| attr.value.clone()),
        width: dimension(&width),
        height: dimension(&height),
        tag: Some(HtmlTag {
            raw: raw.to_string(),
            src,
            alt,
            width,
            height,
        }),
    })
}

pub(super) fn build(image: &HtmlImage) -> String {
    let Some(tag) = &image.tag else {
        let mut text = format!("<img src=\"{}\"", escape(&image.target, Some('"')));
        text.push_str(&new_attributes(image, None));
        text.push('>');
        return text;
    };

    let mut splices: Vec<(Range<usize>, String)> = Vec::new();

    if tag.raw[tag.src.clone()] != image.target {
        let quote = tag.raw[..tag.src.start].chars().last();
        splices.push((tag.src.clone(), escape(&image.target, quote)));
    }

    let updates = [
        (&tag.alt, image.alt.clone()),
        (&tag.width, image.width.map(|w| w.to_string())),
        (&tag.height, image.height.map(|h| h.to_string())),
    ];
    for (existing, wanted) in updates {
        if let (Some(existing), Some(wanted)) = (existing, wanted) {
            if existing.value.trim() != wanted {
                splices.push((existing.span.clone(), quoted_value(&wanted, existing.quote)));
            }
        }
    }

    let inserted = new_attributes(image, Some(tag));
    if !inserted.is_empty() {
        let after_src = tag.src.end + 1;
        splices.push((after_src..after_src, inserted));
    }

    splices.sort_by_key(|(span, _)| std::cmp::Reverse(span.start));

    let mut text = tag.raw.clone();
    for (span, replacement) in splices {
        text.replace_range(span, &replacement);
    }
    text
}

/// Attributes set on the image but absent from the original tag.
fn new_attributes(image: &HtmlImage, tag: Option<&HtmlTag>) -> String {
    let mut text = String::new();
    let missing = |pick: fn(&HtmlTag) -> &Option<AttrValue>| match tag {
        Some(tag) => pick(tag).is_none(),
        None => true,
    };

    if let Some(alt) = &image.alt {
        if missing(|t| &t.alt) {
            text.push_str(&format!(" alt=\"{}\"", escape(alt, Some('"'))));
        }
    }
    if let Some(width) = image.width {
        if missing(|t| &t.width) {
            text.push_str(&format!(" width=\"{}\"", width));
        }
    }
    if let Some(height) = image.height {
        if missing(|t| &t.height) {
            text.push_str(&format!(" height=\"{}\"", height));
        }
    }
    text
}

fn quoted_value(value: &str, quote: Option<char>) -> String {
    match quote {
        Some(_) => escape(value, quote),
        None if value.chars().any(|c| c.is_whitespace()) => {
            format!("\"{}\"", escape(value, Some('"')))
        }
        None => value.to_string(),
    }
}

fn escape(value: &str, quote: Option<char>) -> String {
    match quote {
        Some('"') => value.replace('"', "&quot;"),
        Some('\'') => value.replace('\'', "&#39;"),
        _ => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_attributes() {
        let image =
            parse(r#"<img src="a/img.png" alt="My cap" width="100" height='50'>"#).unwrap();
        assert_eq!(image.target, "a/img.png");
        assert_eq!(image.alt.as_deref(), Some("My cap"));
        assert_eq!(image.width, Some(100));
        assert_eq!(image.height, Some(50));
    }

    #[test]
    fn test_non_integer_dimension_is_not_a_hint() {
        let raw = r#"<img src="x.png" width="50%">"#;
        let image = parse(raw).unwrap();
        assert_eq!(image.width, None);
        assert_eq!(build(&image), raw);
    }

    #[test]
    fn test_rebuild_splices_new_src_only() {
        let raw = r#"<img data-x="1" src='old.png' alt="c" />"#;
        let mut image = parse(raw).unwrap();
        image.target = "dir/new.png".to_string();
        assert_eq!(build(&image), r#"<img data-x="1" src='dir/new.png' alt="c" />"#);
    }

    #[test]
    fn test_rebuild_inserts_missing_attributes_after_src() {
        let raw = r#"<img src="x.png" />"#;
        let mut image = parse(raw).unwrap();
        image.alt = Some("cap".to_string());
        image.width = Some(10);
        assert_eq!(build(&image), r#"<img src="x.png" alt="cap" width="10" />"#);
    }

    #[test]
    fn test_quoted_text_is_not_an_attribute() {
        let image = parse(r#"<img title="x alt='no'" src="a.png">"#).unwrap();
        assert_eq!(image.alt, None);
    }

    #[test]
    fn test_fresh_build_escapes_quotes() {
        let image = HtmlImage::new("a.png", Some("say \"hi\"".to_string()), None, None);
        assert_eq!(build(&image), r#"<img src="a.png" alt="say &quot;hi&quot;">"#);
    }
}
