use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::cache::{ReferenceCache, ScanSnapshot};
use crate::config::ImgrefConfig;
use crate::error::ImgrefError;
use crate::model::{OperationLogEntry, RecoveryCandidate, ResolvedReference};
use crate::namespace::FileIndex;
use crate::oplog::{AuditSink, OperationLog};
use crate::recovery;
use crate::rewrite::{self, BatchSummary, FormatConversion, RewriteEdit};
use crate::scanner::{self, ScanReport};
use crate::utils;
use crate::vfs::DocumentStore;


/// The ImgrefEngine is the high-level facade of the core.
///
/// # Plans vs Actions
///
/// *   **Plans** (`plan_*`, `correlate_broken`, queries): read documents and
///     return edits or reports. Nothing is written.
/// *   **Actions** (`apply`, `convert_links`, `recover_broken_links`): write
///     documents through the store, hand audit records to the sink and
///     invalidate the reference cache.
///
/// Hosts that move files themselves call `notify_external_change` (or
/// `record_operation`, which also logs the move) so the next query rescans.
pub struct ImgrefEngine {
    store: Arc<dyn DocumentStore>,
    log: Arc<dyn OperationLog>,
    audit: Option<Arc<dyn AuditSink>>,
    config: ImgrefConfig,
    cache: ReferenceCache,
    cancel: CancellationToken,
}

impl ImgrefEngine {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        log: Arc<dyn OperationLog>,
        config: ImgrefConfig,
    ) -> Self {
        Self {
            store,
            log,
            audit: None,
            config,
            cache: ReferenceCache::new(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(sink);
        self
    }

    /// Share a cancellation token owned by the host (e.g. tied to Ctrl-C).
    pub fn with_cancellation_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &ImgrefConfig {
        &self.config
    }

    /// Cancelling this token stops running scans and batches at the next
    /// document boundary.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// The current scan, from cache when nothing changed since the last one.
    pub async fn snapshot(&self) -> Result<Arc<ScanSnapshot>, ImgrefError> {
        if let Some(snapshot) = self.cache.get().await {
            return Ok(snapshot);
        }

        let started_at = self.cache.generation().await;
        let index = self.load_index().await?;
        let report = self.scan(&index).await?;

        if self.config.logging.show_scan_stats {
            log::info!(
                "Scanned {} documents: {} references, {} broken, {} unreadable",
                report.documents_scanned,
                report.references.len(),
                report.broken().count(),
                report.unreadable.len()
            );
        }

        Ok(self.cache.store(report, index, started_at).await)
    }

    pub async fn broken_references(&self) -> Result<Vec<ResolvedReference>, ImgrefError> {
        let snapshot = self.snapshot().await?;
        Ok(snapshot.report.broken().cloned().collect())
    }

    /// Images that no document references.
    pub async fn orphaned_images(&self) -> Result<Vec<String>, ImgrefError> {
        let snapshot = self.snapshot().await?;
        Ok(snapshot
            .report
            .orphaned_images(&snapshot.index, &self.config.scan_options()))
    }

    // ------------------------------------------------------------------------
    // Plans
    // ------------------------------------------------------------------------

    pub async fn plan_format_conversion(
        &self,
        conversion: FormatConversion,
    ) -> Result<Vec<RewriteEdit>, ImgrefError> {
        let snapshot = self.snapshot().await?;
        Ok(rewrite::plan_format_conversion(
            &snapshot.report.references,
            &snapshot.index,
            conversion,
        ))
    }

    pub async fn correlate_broken(&self) -> Result<Vec<RecoveryCandidate>, ImgrefError> {
        let snapshot = self.snapshot().await?;
        let broken: Vec<ResolvedReference> = snapshot.report.broken().cloned().collect();
        if broken.is_empty() {
            return Ok(Vec::new());
        }
        recovery::correlate_with_log(&broken, &*self.log, &snapshot.index).await
    }

    pub async fn plan_recovery(&self) -> Result<Vec<RewriteEdit>, ImgrefError> {
        let candidates = self.correlate_broken().await?;
        let unrecoverable = candidates.iter().filter(|c| !c.is_recoverable()).count();
        if unrecoverable > 0 {
            log::info!("{} broken references have no recovery", unrecoverable);
        }
        Ok(rewrite::plan_recovery(&candidates))
    }

    /// Edits for references to a file the host has just moved from
    /// `old_path` to `new_path`.
    ///
    /// Documents are rescanned as if the file were still at `old_path`, so
    /// this works whether or not the move already broke the references.
    pub async fn plan_target_rename(
        &self,
        old_path: &str,
        new_path: &str,
    ) -> Result<Vec<RewriteEdit>, ImgrefError> {
        self.notify_external_change().await;

        let after = self.load_index().await?;
        let before = after.with_renamed(new_path, old_path);
        let report = self.scan(&before).await?;

        Ok(rewrite::plan_target_rename(
            &report.references,
            old_path,
            new_path,
            &after,
            self.config.rewrite.naming_policy,
        ))
    }

    // ------------------------------------------------------------------------
    // Actions
    // ------------------------------------------------------------------------

    /// Apply edits and record them in the audit sink.
    ///
    /// Audit sink failures are logged; the documents are already written.
    pub async fn apply(&self, edits: &[RewriteEdit]) -> BatchSummary {
        let summary = rewrite::apply(&*self.store, edits, &self.cancel).await;

        if let Some(sink) = &self.audit {
            if let Err(e) = sink.record(&summary.audit_records).await {
                log::warn!(
                    "Failed to record {} audit records: {}",
                    summary.audit_records.len(),
                    e
                );
            }
        }

        if !summary.documents_written.is_empty() {
            self.cache.invalidate().await;
        }
        summary
    }

    pub async fn convert_links(
        &self,
        conversion: FormatConversion,
    ) -> Result<BatchSummary, ImgrefError> {
        let edits = self.plan_format_conversion(conversion).await?;
        Ok(self.apply(&edits).await)
    }

    pub async fn recover_broken_links(&self) -> Result<BatchSummary, ImgrefError> {
        let edits = self.plan_recovery().await?;
        Ok(self.apply(&edits).await)
    }

    // ------------------------------------------------------------------------
    // Changes coming from the host
    // ------------------------------------------------------------------------

    /// Drop cached scan state after files changed outside the engine.
    pub async fn notify_external_change(&self) {
        self.cache.invalidate().await;
    }

    /// Append a rename/move the host performed to the operation log.
    pub async fn record_operation(
        &self,
        old_path: &str,
        new_path: &str,
    ) -> Result<(), ImgrefError> {
        let entry = OperationLogEntry::between(utils::time::now(), old_path, new_path);
        log::debug!("Recording {:?} {} -> {}", entry.kind, entry.old_path, entry.new_path);
        self.log.append(entry).await?;
        self.notify_external_change().await;
        Ok(())
    }

    async fn load_index(&self) -> Result<FileIndex, ImgrefError> {
        FileIndex::load(&*self.store).await.map_err(|e| match e {
            ImgrefError::Enumeration(_) => e,
            other => ImgrefError::Enumeration(other.to_string()),
        })
    }

    async fn scan(&self, index: &FileIndex) -> Result<ScanReport, ImgrefError> {
        scanner::scan_all(
            &*self.store,
            index,
            &self.config.scan_options(),
            &self.cancel,
        )
        .await
    }
}
