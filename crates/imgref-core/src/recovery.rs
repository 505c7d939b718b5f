//! Correlate broken references with the operation log.
//!
//! A reference usually breaks because its target was renamed or moved. The
//! log records those operations, so the most recent entry mentioning the
//! missing file is the best guess at where it went. Matching is heuristic:
//! two unrelated files sharing a basename can produce a false positive.

use std::cmp::Reverse;

use crate::error::ImgrefError;
use crate::model::{
    MatchStrategy, OperationKind, OperationLogEntry, RecoveryCandidate, RecoveryType,
    ResolvedReference,
};
use crate::namespace::Namespace;
use crate::oplog::{OperationFilter, OperationLog};
use crate::utils;

/// Kinds of log entries that can explain a broken reference.
pub const RECOVERABLE_KINDS: [OperationKind; 2] = [OperationKind::Rename, OperationKind::Move];

/// Pair each broken reference with the most recent log entry explaining it.
///
/// Resolved references in `references` are ignored. The result has one
/// candidate per broken reference, in input order; unexplained references
/// get a candidate without a matched entry.
pub fn correlate(
    references: &[ResolvedReference],
    entries: &[OperationLogEntry],
    namespace: &dyn Namespace,
) -> Vec<RecoveryCandidate> {
    let newest_first = newest_first(entries);

    references
        .iter()
        .filter(|reference| reference.is_broken())
        .map(|reference| correlate_one(reference, &newest_first, namespace))
        .collect()
}

/// [`correlate`] against entries queried from `log`.
pub async fn correlate_with_log(
    references: &[ResolvedReference],
    log: &dyn OperationLog,
    namespace: &dyn Namespace,
) -> Result<Vec<RecoveryCandidate>, ImgrefError> {
    let entries = log
        .query(&OperationFilter::kinds(&RECOVERABLE_KINDS))
        .await?;
    Ok(correlate(references, &entries, namespace))
}

/// Rename and move entries, most recent first. Among equal timestamps the
/// entry appended last comes first.
fn newest_first(entries: &[OperationLogEntry]) -> Vec<&OperationLogEntry> {
    let mut sorted: Vec<&OperationLogEntry> = entries
        .iter()
        .rev()
        .filter(|entry| RECOVERABLE_KINDS.contains(&entry.kind))
        .collect();
    sorted.sort_by_key(|entry| Reverse(entry.timestamp));
    sorted
}

fn correlate_one(
    reference: &ResolvedReference,
    entries: &[&OperationLogEntry],
    namespace: &dyn Namespace,
) -> RecoveryCandidate {
    let full_path = reference.occurrence.link_path();
    let file_name = utils::file_name(&full_path).to_string();

    for entry in entries {
        let Some(strategy) = match_entry(&full_path, &file_name, entry) else {
            continue;
        };

        if !namespace.exists(&entry.new_path) {
            log::debug!(
                "Log entry {} -> {} matches '{}' but its destination is gone",
                entry.old_path,
                entry.new_path,
                full_path
            );
            continue;
        }

        return RecoveryCandidate {
            reference: reference.clone(),
            matched_entry: Some((*entry).clone()),
            recovery_type: Some(RecoveryType::classify(entry)),
            strategy: Some(strategy),
        };
    }

    RecoveryCandidate::unrecoverable(reference.clone())
}

fn match_entry(
    full_path: &str,
    file_name: &str,
    entry: &OperationLogEntry,
) -> Option<MatchStrategy> {
    if full_path == entry.old_path || utils::normalize_vault_path(full_path) == entry.old_path {
        Some(MatchStrategy::ExactPath)
    } else if file_name == entry.old_name {
        Some(MatchStrategy::BaseName)
    } else if full_path.ends_with(&format!("/{}", entry.old_name))
        || full_path.ends_with(&format!("../{}", entry.old_name))
    {
        Some(MatchStrategy::RelativeSuffix)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LinkOccurrence, SyntaxKind};
    use crate::namespace::FileIndex;

    fn broken(target: &str) -> ResolvedReference {
        ResolvedReference::new(
            LinkOccurrence {
                document_path: "notes/n.md".to_string(),
                line_number: 1,
                column: 0,
                raw_text: format!("![[{}]]", target),
                target_spec: target.to_string(),
                display_text: None,
                width: None,
                height: None,
                syntax_kind: SyntaxKind::Wiki,
                embed: true,
            },
            None,
        )
    }

    fn index(files: &[&str]) -> FileIndex {
        FileIndex::new(files.iter().map(|f| f.to_string()))
    }

    #[test]
    fn test_rename_is_recovered() {
        let ns = index(&["a/new.png"]);
        let entries = vec![OperationLogEntry::between(1, "a/old.png", "a/new.png")];

        let candidates = correlate(&[broken("old.png")], &entries, &ns);

        assert_eq!(candidates.len(), 1);
        let candidate = &candidates[0];
        assert_eq!(
            candidate.matched_entry.as_ref().map(|e| e.new_path.as_str()),
            Some("a/new.png")
        );
        assert_eq!(candidate.recovery_type, Some(RecoveryType::Rename));
        assert_eq!(candidate.strategy, Some(MatchStrategy::BaseName));
    }

    #[test]
    fn test_exact_path_takes_priority_and_classifies_move() {
        let ns = index(&["b/img.png"]);
        let entries = vec![OperationLogEntry::between(1, "a/img.png", "b/img.png")];

        let candidates = correlate(&[broken("a/img.png")], &entries, &ns);
        assert_eq!(candidates[0].strategy, Some(MatchStrategy::ExactPath));
        assert_eq!(candidates[0].recovery_type, Some(RecoveryType::Move));
    }

    #[test]
    fn test_most_recent_entry_wins() {
        let ns = index(&["first/img.png", "second/img.png"]);
        let entries = vec![
            OperationLogEntry::between(10, "img.png", "first/img.png"),
            OperationLogEntry::between(20, "img.png", "second/img.png"),
        ];

        let candidates = correlate(&[broken("img.png")], &entries, &ns);
        assert_eq!(
            candidates[0].matched_entry.as_ref().map(|e| e.timestamp),
            Some(20)
        );
    }

    #[test]
    fn test_stale_destination_falls_through_to_older_entry() {
        let ns = index(&["kept/img.png"]);
        let entries = vec![
            OperationLogEntry::between(10, "img.png", "kept/img.png"),
            OperationLogEntry::between(20, "img.png", "deleted/img.png"),
        ];

        let candidates = correlate(&[broken("img.png")], &entries, &ns);
        assert_eq!(
            candidates[0].matched_entry.as_ref().map(|e| e.new_path.as_str()),
            Some("kept/img.png")
        );
    }

    #[test]
    fn test_unmatched_and_delete_entries() {
        let ns = index(&["x.png"]);
        let mut deleted = OperationLogEntry::between(5, "lost.png", "x.png");
        deleted.kind = OperationKind::Delete;

        let candidates = correlate(&[broken("lost.png")], &[deleted], &ns);
        assert!(!candidates[0].is_recoverable());
        assert_eq!(candidates[0].recovery_type, None);
    }

    #[test]
    fn test_rename_and_move() {
        let ns = index(&["b/new.png"]);
        let entries = vec![OperationLogEntry::between(1, "a/old.png", "b/new.png")];

        let candidates = correlate(&[broken("../a/old.png")], &entries, &ns);
        assert_eq!(candidates[0].recovery_type, Some(RecoveryType::RenameAndMove));
    }

    #[test]
    fn test_resolved_references_are_ignored() {
        let ns = index(&["img.png"]);
        let resolved =
            ResolvedReference::new(broken("img.png").occurrence, Some("img.png".to_string()));

        assert!(correlate(&[resolved], &[], &ns).is_empty());
    }
}
