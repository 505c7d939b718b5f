//! Reference scanning.
//!
//! Walks every document, extracts image references in all three grammars and
//! resolves each against the namespace. Results are recomputed from scratch
//! on every scan.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::ImgrefError;
use crate::line_map::LineMap;
use crate::model::{LinkOccurrence, ResolvedReference};
use crate::namespace::Namespace;
use crate::syntax;
use crate::utils;
use crate::vfs::DocumentStore;

pub const DEFAULT_IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp", "svg"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOptions {
    image_extensions: HashSet<String>,
}

impl ScanOptions {
    pub fn new<'a>(image_extensions: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            image_extensions: image_extensions
                .into_iter()
                .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }

    /// Whether `path` has one of the configured image extensions (case-insensitive).
    pub fn is_image(&self, path: &str) -> bool {
        utils::extension(path)
            .map(|ext| self.image_extensions.contains(&ext))
            .unwrap_or(false)
    }
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self::new(DEFAULT_IMAGE_EXTENSIONS.iter().copied())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    /// In document enumeration order, then line, then column.
    pub references: Vec<ResolvedReference>,
    pub documents_scanned: usize,
    /// Documents that could not be read; their references are missing.
    pub unreadable: Vec<String>,
    pub cancelled: bool,
}

impl ScanReport {
    pub fn broken(&self) -> impl Iterator<Item = &ResolvedReference> {
        self.references.iter().filter(|r| r.is_broken())
    }

    pub fn resolved(&self) -> impl Iterator<Item = &ResolvedReference> {
        self.references.iter().filter(|r| !r.is_broken())
    }

    /// Every reference that resolves to `path`.
    pub fn references_to<'a>(&'a self, path: &str) -> Vec<&'a ResolvedReference> {
        let path = utils::normalize_vault_path(path);
        self.resolved()
            .filter(|r| r.target_path.as_deref() == Some(path.as_str()))
            .collect()
    }

    /// Resolved target path -> number of references to it.
    pub fn usage_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for target in self.resolved().filter_map(|r| r.target_path.clone()) {
            *counts.entry(target).or_insert(0) += 1;
        }
        counts
    }

    /// Images in the namespace that no resolved reference points at.
    pub fn orphaned_images(&self, namespace: &dyn Namespace, options: &ScanOptions) -> Vec<String> {
        let used: HashSet<&str> = self
            .resolved()
            .filter_map(|r| r.target_path.as_deref())
            .collect();

        namespace
            .list_all_files()
            .into_iter()
            .filter(|path| options.is_image(path) && !used.contains(path.as_str()))
            .collect()
    }
}

/// Scan every document in `store`.
///
/// Enumeration failure aborts the scan. A document that cannot be read is
/// logged, listed in [`ScanReport::unreadable`] and skipped. Cancellation is
/// checked before each document.
pub async fn scan_all(
    store: &dyn DocumentStore,
    namespace: &dyn Namespace,
    options: &ScanOptions,
    cancel: &CancellationToken,
) -> Result<ScanReport, ImgrefError> {
    let documents = store.list_documents().await.map_err(|e| match e {
        ImgrefError::Enumeration(_) => e,
        other => ImgrefError::Enumeration(other.to_string()),
    })?;

    let mut report = ScanReport::default();

    for document in documents {
        if cancel.is_cancelled() {
            log::info!("Scan cancelled after {} documents", report.documents_scanned);
            report.cancelled = true;
            break;
        }

        match store.read_text(&document).await {
            Ok(text) => {
                report
                    .references
                    .extend(scan_document(&document, &text, namespace, options));
                report.documents_scanned += 1;
            }
            Err(e) => {
                log::warn!("Skipping unreadable document {}: {}", document, e);
                report.unreadable.push(document);
            }
        }
    }

    Ok(report)
}

pub fn scan_document(
    document_path: &str,
    text: &str,
    namespace: &dyn Namespace,
    options: &ScanOptions,
) -> Vec<ResolvedReference> {
    extract_occurrences(document_path, text, options)
        .into_iter()
        .map(|occurrence| resolve_occurrence(occurrence, namespace))
        .collect()
}

/// Image references in `text`, unresolved.
///
/// External targets and targets without an image extension are not
/// references. Text that looks like a link but does not parse is skipped.
pub fn extract_occurrences(
    document_path: &str,
    text: &str,
    options: &ScanOptions,
) -> Vec<LinkOccurrence> {
    let line_map = LineMap::new(text);
    let mut occurrences = Vec::new();

    for (line_number, line) in line_map.lines(text) {
        for found in syntax::find_links(line) {
            let parts = &found.parts;
            let path = parts.link_path();
            if utils::is_external_target(&path) || !options.is_image(&path) {
                continue;
            }

            let (width, height) = parts.dimensions();
            occurrences.push(LinkOccurrence {
                document_path: document_path.to_string(),
                line_number,
                column: found.span.start,
                raw_text: line[found.span.clone()].to_string(),
                target_spec: parts.target().to_string(),
                display_text: parts.display().map(str::to_string),
                width,
                height,
                syntax_kind: parts.kind(),
                embed: parts.embed(),
            });
        }
    }

    occurrences
}

pub fn resolve_occurrence(
    occurrence: LinkOccurrence,
    namespace: &dyn Namespace,
) -> ResolvedReference {
    let target = namespace.resolve_link(&occurrence.link_path(), &occurrence.document_path);
    ResolvedReference::new(occurrence, target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ReferenceStatus, SyntaxKind};
    use crate::namespace::FileIndex;
    use crate::vfs::MemoryFileSystem;

    fn index(files: &[&str]) -> FileIndex {
        FileIndex::new(files.iter().map(|f| f.to_string()))
    }

    #[test]
    fn test_extract_mixed_syntaxes() {
        let text =
            "# Title\n![[a.png|cap|10x20]] and ![alt](b.jpg)\r\n<img src=\"c.gif\" width=\"5\">\n";
        let found = extract_occurrences("n.md", text, &ScanOptions::default());

        assert_eq!(found.len(), 3);
        assert_eq!(found[0].line_number, 2);
        assert_eq!(found[0].syntax_kind, SyntaxKind::Wiki);
        assert_eq!(found[0].display_text.as_deref(), Some("cap"));
        assert_eq!((found[0].width, found[0].height), (Some(10), Some(20)));
        assert_eq!(found[1].raw_text, "![alt](b.jpg)");
        assert_eq!(found[1].column, 25);
        assert_eq!(found[2].line_number, 3);
        assert_eq!(found[2].width, Some(5));
        assert_eq!(found[2].height, None);
    }

    #[test]
    fn test_non_image_and_external_targets_are_ignored() {
        let text = "[[other note]] ![[doc.pdf]] ![x](https://example.com/a.png) ![[A.PNG]]";
        let found = extract_occurrences("n.md", text, &ScanOptions::default());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].target_spec, "A.PNG");
    }

    #[test]
    fn test_resolution_status() {
        let ns = index(&["notes/n.md", "assets/a.png"]);
        let refs = scan_document(
            "notes/n.md",
            "![[a.png]]\n![](../assets/a.png)\n![](missing.png)",
            &ns,
            &ScanOptions::default(),
        );

        assert_eq!(refs[0].target_path.as_deref(), Some("assets/a.png"));
        assert_eq!(refs[1].target_path.as_deref(), Some("assets/a.png"));
        assert_eq!(refs[2].status, ReferenceStatus::Broken);
    }

    #[test]
    fn test_encoded_markdown_target_resolves() {
        let ns = index(&["my img.png"]);
        let refs = scan_document("n.md", "![](my%20img.png)", &ns, &ScanOptions::default());
        assert_eq!(refs[0].target_path.as_deref(), Some("my img.png"));
        assert_eq!(refs[0].occurrence.target_spec, "my%20img.png");
    }

    #[tokio::test]
    async fn test_scan_all_skips_unreadable_documents() {
        let store = MemoryFileSystem::new()
            .with_document("a.md", "![[img.png]]")
            .with_document("b.md", "![[img.png]]")
            .with_document("c.md", "![[gone.png]]")
            .with_file("img.png")
            .with_file("unused.png")
            .with_denied_read("b.md");
        let ns = FileIndex::load(&store).await.unwrap();
        let options = ScanOptions::default();

        let report = scan_all(&store, &ns, &options, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.documents_scanned, 2);
        assert_eq!(report.unreadable, vec!["b.md"]);
        assert_eq!(report.broken().count(), 1);
        assert_eq!(report.references_to("img.png").len(), 1);
        assert_eq!(report.usage_counts().get("img.png"), Some(&1));
        assert_eq!(report.orphaned_images(&ns, &options), vec!["unused.png"]);
    }

    #[tokio::test]
    async fn test_scan_all_stops_when_cancelled() {
        let store = MemoryFileSystem::new().with_document("a.md", "![[img.png]]");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = scan_all(&store, &FileIndex::default(), &ScanOptions::default(), &cancel)
            .await
            .unwrap();
        assert!(report.cancelled);
        assert_eq!(report.documents_scanned, 0);
    }
}
