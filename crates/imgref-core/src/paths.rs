//! Path naming policies.
//!
//! Given an image path and the document that links to it, compute the text
//! to write as the link target. Every function here is pure: the same
//! namespace and inputs always give the same string.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::namespace::Namespace;
use crate::utils;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NamingPolicy {
    /// Bare filename when unique across the namespace, else the full path.
    #[default]
    ShortestUnique,
    /// Path relative to the linking document's directory.
    Relative,
    /// Full path from the namespace root.
    Absolute,
}

impl NamingPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            NamingPolicy::ShortestUnique => "shortest-unique",
            NamingPolicy::Relative => "relative",
            NamingPolicy::Absolute => "absolute",
        }
    }
}

impl fmt::Display for NamingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NamingPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "shortest-unique" | "shortest" => Ok(NamingPolicy::ShortestUnique),
            "relative" => Ok(NamingPolicy::Relative),
            "absolute" => Ok(NamingPolicy::Absolute),
            other => Err(format!("unknown naming policy '{}'", other)),
        }
    }
}

/// Text to write for `target_path` inside `source_doc_path` under `policy`.
pub fn resolve(
    target_path: &str,
    source_doc_path: &str,
    policy: NamingPolicy,
    namespace: &dyn Namespace,
) -> String {
    let target = utils::normalize_vault_path(target_path);

    match policy {
        NamingPolicy::ShortestUnique => shortest_unique(&target, namespace),
        NamingPolicy::Relative => {
            relative_path(&target, &utils::normalize_vault_path(source_doc_path))
        }
        NamingPolicy::Absolute => target,
    }
}

fn shortest_unique(target: &str, namespace: &dyn Namespace) -> String {
    let name = utils::file_name(target);
    let holders = namespace
        .basenames_index()
        .get(name)
        .map(|paths| paths.len())
        .unwrap_or(0);

    // A target missing from the index is still written by its full path.
    if holders == 1 {
        name.to_string()
    } else {
        target.to_string()
    }
}

/// `a/b/note.md` + `a/c/img.png` -> `../c/img.png`
pub fn relative_path(target: &str, source_doc: &str) -> String {
    let source_dirs = utils::dir_segments(source_doc);
    let target_dirs = utils::dir_segments(target);

    let common = source_dirs
        .iter()
        .zip(target_dirs.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut segments: Vec<&str> = Vec::new();
    segments.extend(std::iter::repeat("..").take(source_dirs.len() - common));
    segments.extend(&target_dirs[common..]);
    segments.push(utils::file_name(target));

    segments.join("/")
}
