use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ParseMiss;
use crate::syntax::{self, LinkParts};
use crate::utils;

/// The three textual grammars for embedding an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyntaxKind {
    Wiki,     // ![[img.png|caption|200x100]]
    Markdown, // ![caption](img.png)
    Html,     // <img src="img.png" alt="caption">
}

impl SyntaxKind {
    pub const ALL: [SyntaxKind; 3] = [SyntaxKind::Wiki, SyntaxKind::Markdown, SyntaxKind::Html];

    pub fn as_str(&self) -> &'static str {
        match self {
            SyntaxKind::Wiki => "wiki",
            SyntaxKind::Markdown => "markdown",
            SyntaxKind::Html => "html",
        }
    }
}

impl fmt::Display for SyntaxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyntaxKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "wiki" | "wikilink" => Ok(SyntaxKind::Wiki),
            "markdown" | "md" => Ok(SyntaxKind::Markdown),
            "html" => Ok(SyntaxKind::Html),
            other => Err(format!("unknown link syntax '{}'", other)),
        }
    }
}

/// One textual reference found in a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkOccurrence {
    pub document_path: String,
    /// 1-based; stable only until the document is rewritten.
    pub line_number: usize,
    /// Byte offset of `raw_text` within its line.
    pub column: usize,
    pub raw_text: String,
    pub target_spec: String,
    pub display_text: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub syntax_kind: SyntaxKind,
    pub embed: bool,
}

impl LinkOccurrence {
    /// Re-parse `raw_text` with the grammar it was found with.
    pub fn parts(&self) -> Result<LinkParts, ParseMiss> {
        syntax::parse(&self.raw_text, self.syntax_kind)
    }

    /// The target as a vault path: percent-decoded for Markdown and HTML.
    pub fn link_path(&self) -> String {
        match self.syntax_kind {
            SyntaxKind::Wiki => self.target_spec.clone(),
            SyntaxKind::Markdown | SyntaxKind::Html => utils::decode_link_target(&self.target_spec),
        }
    }

    pub fn file_name(&self) -> String {
        utils::file_name(&self.link_path()).to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferenceStatus {
    Resolved,
    Broken,
}

/// A LinkOccurrence plus its resolution outcome. Derived on every scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedReference {
    #[serde(flatten)]
    pub occurrence: LinkOccurrence,
    pub target_path: Option<String>,
    pub status: ReferenceStatus,
}

impl ResolvedReference {
    pub fn new(occurrence: LinkOccurrence, target_path: Option<String>) -> Self {
        let status = if target_path.is_some() {
            ReferenceStatus::Resolved
        } else {
            ReferenceStatus::Broken
        };
        Self {
            occurrence,
            target_path,
            status,
        }
    }

    pub fn is_broken(&self) -> bool {
        self.status == ReferenceStatus::Broken
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    Rename,
    Move,
    Delete,
}

/// Append-only historical record written by the host's rename/move handlers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationLogEntry {
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
    pub kind: OperationKind,
    pub old_name: String,
    pub new_name: String,
    pub old_path: String,
    pub new_path: String,
}

impl OperationLogEntry {
    /// Build an entry from two paths, deriving names and the kind.
    pub fn between(timestamp: u64, old_path: &str, new_path: &str) -> Self {
        let old_path = utils::normalize_vault_path(old_path);
        let new_path = utils::normalize_vault_path(new_path);
        let kind = if utils::parent_dir(&old_path) == utils::parent_dir(&new_path) {
            OperationKind::Rename
        } else {
            OperationKind::Move
        };
        Self {
            timestamp,
            kind,
            old_name: utils::file_name(&old_path).to_string(),
            new_name: utils::file_name(&new_path).to_string(),
            old_path,
            new_path,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecoveryType {
    Rename,
    Move,
    RenameAndMove,
}

impl RecoveryType {
    /// Compare names and directories of a log entry in isolation.
    pub fn classify(entry: &OperationLogEntry) -> Self {
        let name_changed = entry.old_name != entry.new_name;
        let dir_changed = utils::parent_dir(&entry.old_path) != utils::parent_dir(&entry.new_path);

        match (name_changed, dir_changed) {
            (true, true) => RecoveryType::RenameAndMove,
            (true, false) => RecoveryType::Rename,
            (false, true) => RecoveryType::Move,
            (false, false) => match entry.kind {
                OperationKind::Move => RecoveryType::Move,
                _ => RecoveryType::Rename,
            },
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RecoveryType::Rename => "rename",
            RecoveryType::Move => "move",
            RecoveryType::RenameAndMove => "rename+move",
        }
    }
}

/// Which correlation rule matched a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchStrategy {
    ExactPath,
    BaseName,
    RelativeSuffix,
}

/// A broken reference paired with its best-guess explanation, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryCandidate {
    pub reference: ResolvedReference,
    pub matched_entry: Option<OperationLogEntry>,
    pub recovery_type: Option<RecoveryType>,
    pub strategy: Option<MatchStrategy>,
}

impl RecoveryCandidate {
    pub fn unrecoverable(reference: ResolvedReference) -> Self {
        Self {
            reference,
            matched_entry: None,
            recovery_type: None,
            strategy: None,
        }
    }

    pub fn is_recoverable(&self) -> bool {
        self.matched_entry.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(old_path: &str, new_path: &str) -> OperationLogEntry {
        OperationLogEntry::between(1, old_path, new_path)
    }

    #[test]
    fn test_between_derives_kind_and_names() {
        let rename = entry("a/old.png", "a/new.png");
        assert_eq!(rename.kind, OperationKind::Rename);
        assert_eq!(rename.old_name, "old.png");
        assert_eq!(rename.new_name, "new.png");

        let moved = entry("a/img.png", "b/img.png");
        assert_eq!(moved.kind, OperationKind::Move);
    }

    #[test]
    fn test_classify_recovery_type() {
        assert_eq!(
            RecoveryType::classify(&entry("a/old.png", "a/new.png")),
            RecoveryType::Rename
        );
        assert_eq!(
            RecoveryType::classify(&entry("a/img.png", "b/img.png")),
            RecoveryType::Move
        );
        assert_eq!(
            RecoveryType::classify(&entry("a/old.png", "b/new.png")),
            RecoveryType::RenameAndMove
        );
    }

    #[test]
    fn test_classify_unchanged_entry_falls_back_to_kind() {
        let mut logged = entry("a/img.png", "a/img.png");
        logged.kind = OperationKind::Move;
        assert_eq!(RecoveryType::classify(&logged), RecoveryType::Move);
    }

    #[test]
    fn test_syntax_kind_from_str() {
        assert_eq!("Wiki".parse::<SyntaxKind>(), Ok(SyntaxKind::Wiki));
        assert_eq!("md".parse::<SyntaxKind>(), Ok(SyntaxKind::Markdown));
        assert!("rst".parse::<SyntaxKind>().is_err());
    }

    #[test]
    fn test_link_path_decodes_markdown_only() {
        let occurrence = LinkOccurrence {
            document_path: "note.md".to_string(),
            line_number: 1,
            column: 0,
            raw_text: "![](my%20img.png)".to_string(),
            target_spec: "my%20img.png".to_string(),
            display_text: None,
            width: None,
            height: None,
            syntax_kind: SyntaxKind::Markdown,
            embed: true,
        };
        assert_eq!(occurrence.link_path(), "my img.png");
        assert_eq!(occurrence.file_name(), "my img.png");
    }
}
