use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{RecoveryType, SyntaxKind};
use crate::paths::NamingPolicy;

/// Why an edit was planned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EditReason {
    FormatConversion {
        policy: NamingPolicy,
        syntax: Option<SyntaxKind>,
    },
    Recovery {
        recovery_type: RecoveryType,
    },
    TargetRenamed {
        from: String,
    },
}

/// Replace `old_text` with `new_text` on one line of one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewriteEdit {
    pub document_path: String,
    pub line_number: usize,
    pub old_text: String,
    pub new_text: String,
    pub reason: EditReason,
}

/// One applied edit, as handed to the audit sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub document_path: String,
    pub line_number: usize,
    pub old_text: String,
    pub new_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovery_type: Option<RecoveryType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<NamingPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub syntax: Option<SyntaxKind>,
    pub batch_id: Uuid,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
}

impl AuditRecord {
    pub fn for_edit(edit: &RewriteEdit, batch_id: Uuid, timestamp: u64) -> Self {
        let (recovery_type, format, syntax) = match &edit.reason {
            EditReason::FormatConversion { policy, syntax } => (None, Some(*policy), *syntax),
            EditReason::Recovery { recovery_type } => (Some(*recovery_type), None, None),
            EditReason::TargetRenamed { .. } => (None, None, None),
        };

        Self {
            document_path: edit.document_path.clone(),
            line_number: edit.line_number,
            old_text: edit.old_text.clone(),
            new_text: edit.new_text.clone(),
            recovery_type,
            format,
            syntax,
            batch_id,
            timestamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureReason {
    /// The line no longer contains the expected text.
    StaleEdit,
    LineOutOfRange,
    Io(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditFailure {
    pub edit: RewriteEdit,
    pub reason: FailureReason,
}

/// Outcome of one executor run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub applied_count: usize,
    pub failed_count: usize,
    /// Edits never attempted because the batch was cancelled.
    pub skipped_count: usize,
    pub failures: Vec<EditFailure>,
    pub audit_records: Vec<AuditRecord>,
    pub documents_written: Vec<String>,
    pub cancelled: bool,
}

impl BatchSummary {
    pub fn is_clean(&self) -> bool {
        self.failed_count == 0 && self.skipped_count == 0 && !self.cancelled
    }

    pub fn stale_count(&self) -> usize {
        self.failures
            .iter()
            .filter(|failure| failure.reason == FailureReason::StaleEdit)
            .count()
    }
}
