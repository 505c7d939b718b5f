use std::collections::{BTreeMap, HashMap};

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::line_map::LineMap;
use crate::rewrite::model::{AuditRecord, BatchSummary, EditFailure, FailureReason, RewriteEdit};
use crate::utils::time;
use crate::vfs::DocumentStore;

/// Apply `edits`, one document at a time.
///
/// Each document is read once, its edits are verified and spliced in memory
/// (highest line first), and it is written back only if its text changed.
/// An edit whose line no longer contains its `old_text` fails on its own;
/// a read or write error fails the edits of that document only. Documents
/// already written stay written when the batch is cancelled.
pub async fn apply(
    store: &dyn DocumentStore,
    edits: &[RewriteEdit],
    cancel: &CancellationToken,
) -> BatchSummary {
    let batch_id = Uuid::new_v4();
    let timestamp = time::now();
    let mut summary = BatchSummary::default();

    let groups = group_by_document(edits);
    let mut remaining: usize = edits.len();

    for (document, document_edits) in groups {
        if cancel.is_cancelled() {
            log::info!(
                "Batch {} cancelled, {} edits not attempted",
                batch_id,
                remaining
            );
            summary.cancelled = true;
            summary.skipped_count = remaining;
            break;
        }
        remaining -= document_edits.len();

        let original = match store.read_text(document).await {
            Ok(text) => text,
            Err(e) => {
                log::warn!("Cannot read {}: {}", document, e);
                fail_all(&mut summary, &document_edits, FailureReason::Io(e.to_string()));
                continue;
            }
        };

        let (text, applied) = splice_document(&original, &document_edits, &mut summary);
        if applied.is_empty() {
            continue;
        }

        if text != original {
            if let Err(e) = store.write_text(document, &text).await {
                log::warn!("Cannot write {}: {}", document, e);
                fail_all(&mut summary, &applied, FailureReason::Io(e.to_string()));
                continue;
            }
            summary.documents_written.push(document.to_string());
        }

        summary.applied_count += applied.len();
        summary.audit_records.extend(
            applied
                .iter()
                .map(|(_, edit)| AuditRecord::for_edit(edit, batch_id, timestamp)),
        );
    }

    log::info!(
        "Batch {}: {} applied, {} failed, {} skipped, {} documents written",
        batch_id,
        summary.applied_count,
        summary.failed_count,
        summary.skipped_count,
        summary.documents_written.len()
    );

    summary
}

type Indexed<'a> = (usize, &'a RewriteEdit);

/// Documents in first-seen order, each with its edits in input order.
fn group_by_document(edits: &[RewriteEdit]) -> Vec<(&str, Vec<Indexed<'_>>)> {
    let mut groups: Vec<(&str, Vec<Indexed<'_>>)> = Vec::new();
    let mut positions: HashMap<&str, usize> = HashMap::new();

    for (index, edit) in edits.iter().enumerate() {
        let document = edit.document_path.as_str();
        let position = *positions.entry(document).or_insert_with(|| {
            groups.push((document, Vec::new()));
            groups.len() - 1
        });
        groups[position].1.push((index, edit));
    }

    groups
}

/// Splice a document's edits into its text. Returns the new text and the
/// edits that applied, in input order; failures go to `summary`.
fn splice_document<'a>(
    original: &str,
    edits: &[Indexed<'a>],
    summary: &mut BatchSummary,
) -> (String, Vec<Indexed<'a>>) {
    let line_map = LineMap::new(original);
    let mut by_line: BTreeMap<usize, Vec<Indexed<'a>>> = BTreeMap::new();
    for indexed in edits {
        by_line.entry(indexed.1.line_number).or_default().push(*indexed);
    }

    let mut text = original.to_string();
    let mut applied: Vec<Indexed<'a>> = Vec::new();

    // Bottom-up, so earlier line spans stay valid while splicing.
    for (line_number, line_edits) in by_line.into_iter().rev() {
        let Some(span) = line_map.line_span(original, line_number) else {
            fail_all(summary, &line_edits, FailureReason::LineOutOfRange);
            continue;
        };

        let mut line = original[span.clone()].to_string();
        let mut cursor = 0;
        for (index, edit) in line_edits {
            match line[cursor..].find(&edit.old_text) {
                Some(offset) => {
                    let start = cursor + offset;
                    line.replace_range(start..start + edit.old_text.len(), &edit.new_text);
                    cursor = start + edit.new_text.len();
                    applied.push((index, edit));
                }
                None => {
                    log::debug!(
                        "Stale edit in {} line {}: '{}' not found",
                        edit.document_path,
                        line_number,
                        edit.old_text
                    );
                    fail_all(summary, &[(index, edit)], FailureReason::StaleEdit);
                }
            }
        }

        text.replace_range(span, &line);
    }

    applied.sort_by_key(|(index, _)| *index);
    (text, applied)
}

fn fail_all(summary: &mut BatchSummary, edits: &[Indexed<'_>], reason: FailureReason) {
    summary.failed_count += edits.len();
    summary
        .failures
        .extend(edits.iter().map(|(_, edit)| EditFailure {
            edit: (*edit).clone(),
            reason: reason.clone(),
        }));
}
