use crate::model::{RecoveryCandidate, ResolvedReference, SyntaxKind};
use crate::namespace::Namespace;
use crate::paths::{self, NamingPolicy};
use crate::rewrite::model::{EditReason, RewriteEdit};
use crate::syntax::{self, LinkParts};
use crate::utils;

/// A request to rewrite every resolved reference under one naming policy,
/// and optionally into one syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatConversion {
    pub policy: NamingPolicy,
    pub syntax: Option<SyntaxKind>,
}

impl FormatConversion {
    pub fn policy(policy: NamingPolicy) -> Self {
        Self {
            policy,
            syntax: None,
        }
    }

    pub fn with_syntax(mut self, syntax: SyntaxKind) -> Self {
        self.syntax = Some(syntax);
        self
    }
}

/// Edits that bring resolved references in line with `conversion`.
///
/// Broken references are left alone. Display text, dimensions and the embed
/// marker survive; dimensions are dropped only when converting into Markdown.
/// Planning again after the edits are applied yields nothing.
pub fn plan_format_conversion(
    references: &[ResolvedReference],
    namespace: &dyn Namespace,
    conversion: FormatConversion,
) -> Vec<RewriteEdit> {
    let reason = EditReason::FormatConversion {
        policy: conversion.policy,
        syntax: conversion.syntax,
    };

    references
        .iter()
        .filter_map(|reference| {
            let target_path = reference.target_path.as_deref()?;
            let occurrence = &reference.occurrence;
            let parts = occurrence.parts().ok()?;

            let desired = unambiguous_target(
                target_path,
                &occurrence.document_path,
                conversion.policy,
                namespace,
            );
            let syntax = conversion.syntax.filter(|kind| *kind != parts.kind());

            let new_parts = retarget(parts, &desired, syntax)?;
            edit_for(reference, &new_parts, reason.clone())
        })
        .collect()
}

/// Point every recoverable candidate at its matched entry's new path.
pub fn plan_recovery(candidates: &[RecoveryCandidate]) -> Vec<RewriteEdit> {
    candidates
        .iter()
        .filter_map(|candidate| {
            let entry = candidate.matched_entry.as_ref()?;
            let recovery_type = candidate.recovery_type?;
            let parts = candidate.reference.occurrence.parts().ok()?;

            let new_parts = retarget(parts, &entry.new_path, None)?;
            edit_for(
                &candidate.reference,
                &new_parts,
                EditReason::Recovery { recovery_type },
            )
        })
        .collect()
}

/// Update references to `old_path` after the file moved to `new_path`.
///
/// `references` must come from a scan that still saw the file at
/// `old_path`; `namespace` must already contain `new_path`.
pub fn plan_target_rename(
    references: &[ResolvedReference],
    old_path: &str,
    new_path: &str,
    namespace: &dyn Namespace,
    policy: NamingPolicy,
) -> Vec<RewriteEdit> {
    let old_path = utils::normalize_vault_path(old_path);
    let new_path = utils::normalize_vault_path(new_path);

    references
        .iter()
        .filter(|reference| reference.target_path.as_deref() == Some(old_path.as_str()))
        .filter_map(|reference| {
            let occurrence = &reference.occurrence;
            let parts = occurrence.parts().ok()?;
            let desired =
                unambiguous_target(&new_path, &occurrence.document_path, policy, namespace);

            let new_parts = retarget(parts, &desired, None)?;
            edit_for(
                reference,
                &new_parts,
                EditReason::TargetRenamed {
                    from: old_path.clone(),
                },
            )
        })
        .collect()
}

/// The policy's spelling of `target_path`, unless that spelling resolves to
/// a different file from `document`. Then a `./` or `../` relative path,
/// which only resolves against the document's directory.
fn unambiguous_target(
    target_path: &str,
    document: &str,
    policy: NamingPolicy,
    namespace: &dyn Namespace,
) -> String {
    let desired = paths::resolve(target_path, document, policy, namespace);
    let target = utils::normalize_vault_path(target_path);
    if namespace.resolve_link(&desired, document).as_deref() == Some(target.as_str()) {
        return desired;
    }

    let relative = paths::relative_path(&target, &utils::normalize_vault_path(document));
    let anchored = if relative.starts_with("../") {
        relative
    } else {
        format!("./{}", relative)
    };
    log::debug!(
        "{} in {} would resolve elsewhere, writing {}",
        desired,
        document,
        anchored
    );
    anchored
}

/// Apply a new target and optional syntax. `None` when nothing changes.
fn retarget(mut parts: LinkParts, target: &str, syntax: Option<SyntaxKind>) -> Option<LinkParts> {
    let target_changed = parts.link_path() != target;
    if !target_changed && syntax.is_none() {
        return None;
    }

    if target_changed {
        parts.set_target(target);
    }
    Some(match syntax {
        Some(kind) => parts.into_syntax(kind),
        None => parts,
    })
}

fn edit_for(
    reference: &ResolvedReference,
    parts: &LinkParts,
    reason: EditReason,
) -> Option<RewriteEdit> {
    let occurrence = &reference.occurrence;
    let new_text = syntax::build(parts, parts.embed());
    if new_text == occurrence.raw_text {
        return None;
    }

    Some(RewriteEdit {
        document_path: occurrence.document_path.clone(),
        line_number: occurrence.line_number,
        old_text: occurrence.raw_text.clone(),
        new_text,
        reason,
    })
}
