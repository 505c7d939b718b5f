use regex::Regex;
use std::sync::LazyLock;

use super::full_match;

/// `![alt](destination)`
pub(crate) static MARKDOWN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"!\[([^\]]*)\]\(([^)]+)\)").expect("markdown image regex")
});

/// Splits a destination into path and a trailing `"title"` / `'title'`.
static TITLE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(.*?)(\s+(?:"[^"]*"|'[^']*'))$"#).expect("markdown title regex")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkdownImage {
    pub alt: String,
    /// Destination as written, still percent-encoded.
    pub target: String,
    /// Verbatim text after the path, including its leading whitespace.
    pub title: Option<String>,
    /// Destination was wrapped in `<...>`.
    pub angle_brackets: bool,
}

impl MarkdownImage {
    pub fn new(alt: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            alt: alt.into(),
            target: target.into(),
            title: None,
            angle_brackets: false,
        }
    }

    /// Set a vault path as destination. Spaces are written as `%20` unless
    /// the destination is wrapped in angle brackets.
    pub fn set_path(&mut self, path: &str) {
        self.target = if self.angle_brackets {
            path.to_string()
        } else {
            path.replace(' ', "%20")
        };
    }
}

pub(super) fn parse(raw: &str) -> Option<MarkdownImage> {
    let captures = full_match(&MARKDOWN_REGEX, raw)?;
    let alt = captures.get(1)?.as_str().to_string();
    let destination = captures.get(2)?.as_str();

    if let Some(inner) = destination.strip_prefix('<') {
        let close = inner.find('>')?;
        let rest = &inner[close + 1..];
        return Some(MarkdownImage {
            alt,
            target: inner[..close].to_string(),
            title: (!rest.is_empty()).then(|| rest.to_string()),
            angle_brackets: true,
        });
    }

    let (target, title) = match TITLE_REGEX.captures(destination) {
        Some(parts) => (
            parts.get(1)?.as_str().to_string(),
            Some(parts.get(2)?.as_str().to_string()),
        ),
        None => (destination.to_string(), None),
    };

    if target.trim().is_empty() {
        return None;
    }

    Some(MarkdownImage {
        alt,
        target,
        title,
        angle_brackets: false,
    })
}

pub(super) fn build(image: &MarkdownImage) -> String {
    let mut text = format!("![{}](", image.alt);
    if image.angle_brackets {
        text.push('<');
        text.push_str(&image.target);
        text.push('>');
    } else {
        text.push_str(&image.target);
    }
    if let Some(title) = &image.title {
        text.push_str(title);
    }
    text.push(')');
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic_image() {
        let image = parse("![A cat](assets/cat.png)").unwrap();
        assert_eq!(image.alt, "A cat");
        assert_eq!(image.target, "assets/cat.png");
        assert_eq!(image.title, None);
    }

    #[test]
    fn test_parse_title_is_kept_verbatim() {
        let image = parse("![x](cat.png   'Cat')").unwrap();
        assert_eq!(image.target, "cat.png");
        assert_eq!(image.title.as_deref(), Some("   'Cat'"));
        assert_eq!(build(&image), "![x](cat.png   'Cat')");
    }

    #[test]
    fn test_parse_angle_brackets() {
        let image = parse("![](<my cat.png> \"t\")").unwrap();
        assert!(image.angle_brackets);
        assert_eq!(image.target, "my cat.png");
        assert_eq!(build(&image), "![](<my cat.png> \"t\")");
    }

    #[test]
    fn test_set_path_encodes_spaces() {
        let mut image = parse("![c](old.png)").unwrap();
        image.set_path("new dir/new cat.png");
        assert_eq!(build(&image), "![c](new%20dir/new%20cat.png)");
    }

    #[test]
    fn test_plain_link_is_not_an_image() {
        assert!(parse("[c](cat.png)").is_none());
        assert!(parse("![c]( \"only title\")").is_none());
    }
}
