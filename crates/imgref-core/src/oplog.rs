//! Operation log and audit sink.
//!
//! The host appends a record every time it renames or moves a file; the core
//! only ever queries it. Audit records flow the other way: the core emits
//! one per applied edit.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::ImgrefError;
use crate::model::{OperationKind, OperationLogEntry};
use crate::rewrite::model::AuditRecord;

/// Which entries a query returns. An empty `kinds` list matches everything.
#[derive(Debug, Clone, Default)]
pub struct OperationFilter {
    pub kinds: Vec<OperationKind>,
}

impl OperationFilter {
    pub fn kinds(kinds: &[OperationKind]) -> Self {
        Self {
            kinds: kinds.to_vec(),
        }
    }

    pub fn matches(&self, entry: &OperationLogEntry) -> bool {
        self.kinds.is_empty() || self.kinds.contains(&entry.kind)
    }
}

#[async_trait]
pub trait OperationLog: Send + Sync {
    /// Matching entries, ascending by timestamp.
    async fn query(&self, filter: &OperationFilter) -> Result<Vec<OperationLogEntry>, ImgrefError>;

    async fn append(&self, entry: OperationLogEntry) -> Result<(), ImgrefError>;
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, records: &[AuditRecord]) -> Result<(), ImgrefError>;
}

/// Operation log stored as one JSON object per line.
pub struct JsonlOperationLog {
    path: PathBuf,
}

impl JsonlOperationLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl OperationLog for JsonlOperationLog {
    async fn query(&self, filter: &OperationFilter) -> Result<Vec<OperationLogEntry>, ImgrefError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(ImgrefError::io(self.path.display().to_string(), e)),
        };

        let mut entries = Vec::new();
        for (index, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<OperationLogEntry>(line) {
                Ok(entry) if filter.matches(&entry) => entries.push(entry),
                Ok(_) => {}
                Err(e) => log::warn!(
                    "Skipping malformed operation log line {} in {}: {}",
                    index + 1,
                    self.path.display(),
                    e
                ),
            }
        }

        entries.sort_by_key(|entry| entry.timestamp);
        Ok(entries)
    }

    async fn append(&self, entry: OperationLogEntry) -> Result<(), ImgrefError> {
        let line = serde_json::to_string(&entry)?;
        append_line(&self.path, &line).await
    }
}

/// Audit records appended as JSON lines.
pub struct JsonlAuditLog {
    path: PathBuf,
}

impl JsonlAuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl AuditSink for JsonlAuditLog {
    async fn record(&self, records: &[AuditRecord]) -> Result<(), ImgrefError> {
        if records.is_empty() {
            return Ok(());
        }

        let mut block = String::new();
        for record in records {
            block.push_str(&serde_json::to_string(record)?);
            block.push('\n');
        }
        append_line(&self.path, block.trim_end_matches('\n')).await
    }
}

async fn append_line(path: &Path, line: &str) -> Result<(), ImgrefError> {
    let display = || path.display().to_string();

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ImgrefError::io(display(), e))?;
        }
    }

    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(|e| ImgrefError::io(display(), e))?;

    file.write_all(format!("{}\n", line).as_bytes())
        .await
        .map_err(|e| ImgrefError::io(display(), e))?;
    file.flush().await.map_err(|e| ImgrefError::io(display(), e))
}

/// Operation log held in memory.
#[derive(Default)]
pub struct MemoryOperationLog {
    entries: Mutex<Vec<OperationLogEntry>>,
}

impl MemoryOperationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: Vec<OperationLogEntry>) -> Self {
        Self {
            entries: Mutex::new(entries),
        }
    }
}

#[async_trait]
impl OperationLog for MemoryOperationLog {
    async fn query(&self, filter: &OperationFilter) -> Result<Vec<OperationLogEntry>, ImgrefError> {
        let mut entries: Vec<OperationLogEntry> = self
            .entries
            .lock()
            .await
            .iter()
            .filter(|entry| filter.matches(entry))
            .cloned()
            .collect();
        entries.sort_by_key(|entry| entry.timestamp);
        Ok(entries)
    }

    async fn append(&self, entry: OperationLogEntry) -> Result<(), ImgrefError> {
        self.entries.lock().await.push(entry);
        Ok(())
    }
}

/// Collects audit records in memory.
#[derive(Default)]
pub struct MemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().await.clone()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn record(&self, records: &[AuditRecord]) -> Result<(), ImgrefError> {
        self.records.lock().await.extend_from_slice(records);
        Ok(())
    }
}
