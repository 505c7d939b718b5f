pub mod time;

/// Normalize a path to the vault-relative form used throughout the core.
///
/// - Converts backslashes to forward slashes (Windows compatibility)
/// - Drops empty and `.` segments, so leading `/` and `./` disappear
/// - Folds `..` into the preceding segment; a `..` with nothing left to fold
///   is kept, which leaves the path unresolvable rather than silently wrong
///
/// # Examples
///
/// ```
/// use imgref_core::normalize_vault_path;
///
/// assert_eq!(normalize_vault_path("./assets/img.png"), "assets/img.png");
/// assert_eq!(normalize_vault_path("/a/b/../c.png"), "a/c.png");
/// assert_eq!(normalize_vault_path("a\\b.png"), "a/b.png");
/// assert_eq!(normalize_vault_path("../x.png"), "../x.png");
/// ```
pub fn normalize_vault_path(path: &str) -> String {
    let unified = path.replace('\\', "/");
    let mut segments: Vec<&str> = Vec::new();

    for segment in unified.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if matches!(segments.last(), Some(last) if *last != "..") {
                    segments.pop();
                } else {
                    segments.push("..");
                }
            }
            other => segments.push(other),
        }
    }

    segments.join("/")
}

/// Last path segment (`a/b/img.png` -> `img.png`).
pub fn file_name(path: &str) -> &str {
    match path.rfind('/') {
        Some(pos) => &path[pos + 1..],
        None => path,
    }
}

/// Directory part of a path, empty for root-level entries.
pub fn parent_dir(path: &str) -> &str {
    match path.rfind('/') {
        Some(pos) => &path[..pos],
        None => "",
    }
}

/// Directory segments of a path. Root-level entries have none.
pub fn dir_segments(path: &str) -> Vec<&str> {
    parent_dir(path)
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect()
}

/// Lower-cased extension without the dot.
pub fn extension(path: &str) -> Option<String> {
    let name = file_name(path);
    let pos = name.rfind('.')?;
    if pos == 0 || pos + 1 == name.len() {
        return None;
    }
    Some(name[pos + 1..].to_ascii_lowercase())
}

/// Targets that point outside the vault and never resolve against it.
pub fn is_external_target(target: &str) -> bool {
    let lower = target.trim_start().to_ascii_lowercase();
    ["http://", "https://", "mailto:", "data:", "file://"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
}

/// Percent-decode a link destination (`my%20img.png` -> `my img.png`).
/// Undecodable input is returned unchanged.
pub fn decode_link_target(target: &str) -> String {
    if !target.contains('%') {
        return target.to_string();
    }
    urlencoding::decode(target)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| target.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_vault_path() {
        assert_eq!(normalize_vault_path("img.png"), "img.png");
        assert_eq!(normalize_vault_path("a//b/./c.png"), "a/b/c.png");
        assert_eq!(normalize_vault_path("a/b/../../c.png"), "c.png");
        assert_eq!(normalize_vault_path("../../c.png"), "../../c.png");
        assert_eq!(normalize_vault_path(""), "");
    }

    #[test]
    fn test_path_parts() {
        assert_eq!(file_name("a/b/img.png"), "img.png");
        assert_eq!(file_name("img.png"), "img.png");
        assert_eq!(parent_dir("a/b/img.png"), "a/b");
        assert_eq!(parent_dir("img.png"), "");
        assert_eq!(dir_segments("a/b/img.png"), vec!["a", "b"]);
        assert!(dir_segments("note.md").is_empty());
    }

    #[test]
    fn test_extension() {
        assert_eq!(extension("a/IMG.PNG"), Some("png".to_string()));
        assert_eq!(extension("a.b/noext"), None);
        assert_eq!(extension(".hidden"), None);
        assert_eq!(extension("trailing."), None);
    }

    #[test]
    fn test_external_and_decode() {
        assert!(is_external_target("https://example.com/a.png"));
        assert!(is_external_target("data:image/png;base64,AAAA"));
        assert!(!is_external_target("assets/a.png"));
        assert_eq!(decode_link_target("my%20img.png"), "my img.png");
        assert_eq!(decode_link_target("plain.png"), "plain.png");
    }
}
