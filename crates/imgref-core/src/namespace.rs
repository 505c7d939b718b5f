use std::cmp::Reverse;
use std::collections::{BTreeSet, HashMap};

use crate::error::ImgrefError;
use crate::utils;
use crate::vfs::DocumentStore;

/// Directory/namespace queries supplied by the host.
pub trait Namespace: Send + Sync {
    /// Resolve a link target as written in `source_path` to an existing file.
    fn resolve_link(&self, spec: &str, source_path: &str) -> Option<String>;

    /// Every file under management, documents included.
    fn list_all_files(&self) -> Vec<String>;

    /// Basename -> every path carrying it.
    fn basenames_index(&self) -> &HashMap<String, Vec<String>>;

    fn exists(&self, path: &str) -> bool;
}

/// Snapshot of the vault's files with Obsidian-style link resolution.
///
/// Resolution order for a target:
/// 1. `./` and `../` targets: relative to the source document only.
/// 2. Targets containing `/`: exact path from the root, then relative to the
///    source document's directory.
/// 3. Nearest match among files whose path ends with the target (for a bare
///    filename, every file with that basename): same directory as the source
///    first, then the longest shared directory prefix, then the shallowest
///    path, then lexicographic order.
#[derive(Debug, Clone, Default)]
pub struct FileIndex {
    files: BTreeSet<String>,
    by_basename: HashMap<String, Vec<String>>,
}

impl FileIndex {
    pub fn new(files: impl IntoIterator<Item = String>) -> Self {
        let files: BTreeSet<String> = files
            .into_iter()
            .map(|file| utils::normalize_vault_path(&file))
            .filter(|file| !file.is_empty())
            .collect();

        let mut by_basename: HashMap<String, Vec<String>> = HashMap::new();
        for file in &files {
            by_basename
                .entry(utils::file_name(file).to_string())
                .or_default()
                .push(file.clone());
        }

        Self { files, by_basename }
    }

    /// Build the index from the store's current file listing.
    pub async fn load(store: &dyn DocumentStore) -> Result<Self, ImgrefError> {
        Ok(Self::new(store.list_files().await?))
    }

    /// The same index with `from` replaced by `to`.
    pub fn with_renamed(&self, from: &str, to: &str) -> Self {
        let from = utils::normalize_vault_path(from);
        let to = utils::normalize_vault_path(to);
        Self::new(
            self.files
                .iter()
                .map(|file| if *file == from { to.clone() } else { file.clone() }),
        )
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.files.iter()
    }

    fn nearest<'a>(
        &self,
        candidates: impl Iterator<Item = &'a String>,
        source_dir: &str,
    ) -> Option<String> {
        let source_segments: Vec<&str> = source_dir.split('/').filter(|s| !s.is_empty()).collect();

        candidates
            .min_by_key(|&candidate| {
                let dir = utils::parent_dir(candidate);
                let dir_segments: Vec<&str> = dir.split('/').filter(|s| !s.is_empty()).collect();
                let shared = source_segments
                    .iter()
                    .zip(dir_segments.iter())
                    .take_while(|(a, b)| a == b)
                    .count();
                (
                    dir != source_dir,
                    Reverse(shared),
                    dir_segments.len(),
                    candidate.as_str(),
                )
            })
            .cloned()
    }
}

impl Namespace for FileIndex {
    fn resolve_link(&self, spec: &str, source_path: &str) -> Option<String> {
        let spec = spec.trim();
        if spec.is_empty() || utils::is_external_target(spec) {
            return None;
        }

        let source_dir = utils::parent_dir(source_path);
        let relative = utils::normalize_vault_path(&format!("{}/{}", source_dir, spec));

        if spec.starts_with("./") || spec.starts_with("../") {
            return self.files.get(&relative).cloned();
        }

        let normalized = utils::normalize_vault_path(spec);
        if normalized.is_empty() || normalized.starts_with("..") {
            return None;
        }

        if normalized.contains('/') {
            if let Some(found) = self.files.get(&normalized) {
                return Some(found.clone());
            }
            if let Some(found) = self.files.get(&relative) {
                return Some(found.clone());
            }
            let suffix = format!("/{}", normalized);
            return self.nearest(
                self.files.iter().filter(|file| file.ends_with(&suffix)),
                source_dir,
            );
        }

        self.nearest(self.by_basename.get(&normalized)?.iter(), source_dir)
    }

    fn list_all_files(&self) -> Vec<String> {
        self.files.iter().cloned().collect()
    }

    fn basenames_index(&self) -> &HashMap<String, Vec<String>> {
        &self.by_basename
    }

    fn exists(&self, path: &str) -> bool {
        self.files.contains(&utils::normalize_vault_path(path))
    }
}
