use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use walkdir::WalkDir;

use crate::error::ImgrefError;
use crate::utils;

/// Extensions treated as Markdown documents.
pub const DOCUMENT_EXTENSIONS: &[&str] = &["md", "markdown"];

pub fn is_document(path: &str) -> bool {
    utils::extension(path)
        .map(|ext| DOCUMENT_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// Abstract interface over the vault's documents and files.
///
/// All paths are vault-relative with `/` separators.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Every Markdown document, in a stable order.
    async fn list_documents(&self) -> Result<Vec<String>, ImgrefError>;

    /// Every file, documents included.
    async fn list_files(&self) -> Result<Vec<String>, ImgrefError>;

    async fn read_text(&self, path: &str) -> Result<String, ImgrefError>;

    async fn write_text(&self, path: &str, text: &str) -> Result<(), ImgrefError>;

    async fn exists(&self, path: &str) -> bool;
}

/// Documents on disk under a root directory.
pub struct PhysicalFileSystem {
    root: PathBuf,
    ignore: Vec<glob::Pattern>,
}

impl PhysicalFileSystem {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ignore: Vec::new(),
        }
    }

    /// Skip files whose vault path matches any of `patterns`.
    /// Invalid patterns are logged and dropped.
    pub fn with_ignore_patterns(mut self, patterns: &[String]) -> Self {
        for pattern in patterns {
            match glob::Pattern::new(pattern) {
                Ok(compiled) => self.ignore.push(compiled),
                Err(e) => log::warn!("Ignoring invalid glob pattern '{}': {}", pattern, e),
            }
        }
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn full_path(&self, path: &str) -> PathBuf {
        self.root.join(utils::normalize_vault_path(path))
    }

    fn is_ignored(&self, path: &str) -> bool {
        self.ignore.iter().any(|pattern| pattern.matches(path))
    }

    fn walk(&self) -> Result<Vec<String>, ImgrefError> {
        if !self.root.is_dir() {
            return Err(ImgrefError::Enumeration(format!(
                "'{}' is not a directory",
                self.root.display()
            )));
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&self.root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    log::debug!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let path = utils::normalize_vault_path(&relative.to_string_lossy());
            if !self.is_ignored(&path) {
                files.push(path);
            }
        }

        Ok(files)
    }
}

#[async_trait]
impl DocumentStore for PhysicalFileSystem {
    async fn list_documents(&self) -> Result<Vec<String>, ImgrefError> {
        let files = self.list_files().await?;
        Ok(files.into_iter().filter(|path| is_document(path)).collect())
    }

    async fn list_files(&self) -> Result<Vec<String>, ImgrefError> {
        self.walk()
    }

    async fn read_text(&self, path: &str) -> Result<String, ImgrefError> {
        tokio::fs::read_to_string(self.full_path(path))
            .await
            .map_err(|e| ImgrefError::io(path, e))
    }

    async fn write_text(&self, path: &str, text: &str) -> Result<(), ImgrefError> {
        tokio::fs::write(self.full_path(path), text)
            .await
            .map_err(|e| ImgrefError::io(path, e))
    }

    async fn exists(&self, path: &str) -> bool {
        tokio::fs::try_exists(self.full_path(path))
            .await
            .unwrap_or(false)
    }
}

/// In-memory store for hosts without a disk and for tests.
///
/// Non-document files carry no text. Individual paths can be made to fail
/// reads or writes to exercise partial-failure handling.
#[derive(Default)]
pub struct MemoryFileSystem {
    state: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    files: BTreeMap<String, Option<String>>,
    deny_reads: HashSet<String>,
    deny_writes: HashSet<String>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, path: &str, text: &str) -> Self {
        self.state
            .get_mut()
            .files
            .insert(utils::normalize_vault_path(path), Some(text.to_string()));
        self
    }

    pub fn with_file(mut self, path: &str) -> Self {
        self.state
            .get_mut()
            .files
            .insert(utils::normalize_vault_path(path), None);
        self
    }

    pub fn with_denied_read(mut self, path: &str) -> Self {
        self.state
            .get_mut()
            .deny_reads
            .insert(utils::normalize_vault_path(path));
        self
    }

    pub fn with_denied_write(mut self, path: &str) -> Self {
        self.state
            .get_mut()
            .deny_writes
            .insert(utils::normalize_vault_path(path));
        self
    }

    pub async fn add_file(&self, path: &str) {
        self.state
            .lock()
            .await
            .files
            .insert(utils::normalize_vault_path(path), None);
    }

    /// Move a file, keeping its content.
    pub async fn rename(&self, from: &str, to: &str) {
        let mut state = self.state.lock().await;
        if let Some(content) = state.files.remove(&utils::normalize_vault_path(from)) {
            state.files.insert(utils::normalize_vault_path(to), content);
        }
    }

    pub async fn document_text(&self, path: &str) -> Option<String> {
        self.state
            .lock()
            .await
            .files
            .get(&utils::normalize_vault_path(path))
            .cloned()
            .flatten()
    }
}

#[async_trait]
impl DocumentStore for MemoryFileSystem {
    async fn list_documents(&self) -> Result<Vec<String>, ImgrefError> {
        let state = self.state.lock().await;
        Ok(state
            .files
            .keys()
            .filter(|path| is_document(path))
            .cloned()
            .collect())
    }

    async fn list_files(&self) -> Result<Vec<String>, ImgrefError> {
        Ok(self.state.lock().await.files.keys().cloned().collect())
    }

    async fn read_text(&self, path: &str) -> Result<String, ImgrefError> {
        let path = utils::normalize_vault_path(path);
        let state = self.state.lock().await;

        if state.deny_reads.contains(&path) {
            return Err(ImgrefError::io(
                path,
                std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read denied"),
            ));
        }

        match state.files.get(&path) {
            Some(Some(text)) => Ok(text.clone()),
            Some(None) => Err(ImgrefError::io(
                path,
                std::io::Error::new(std::io::ErrorKind::InvalidData, "not a text document"),
            )),
            None => Err(ImgrefError::io(
                path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "no such document"),
            )),
        }
    }

    async fn write_text(&self, path: &str, text: &str) -> Result<(), ImgrefError> {
        let path = utils::normalize_vault_path(path);
        let mut state = self.state.lock().await;

        if state.deny_writes.contains(&path) {
            return Err(ImgrefError::io(
                path,
                std::io::Error::new(std::io::ErrorKind::PermissionDenied, "write denied"),
            ));
        }

        state.files.insert(path, Some(text.to_string()));
        Ok(())
    }

    async fn exists(&self, path: &str) -> bool {
        self.state
            .lock()
            .await
            .files
            .contains_key(&utils::normalize_vault_path(path))
    }
}
