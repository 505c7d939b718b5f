use std::sync::Arc;

use tokio::sync::RwLock;

use crate::namespace::FileIndex;
use crate::scanner::ScanReport;

/// A completed scan together with the file index it was resolved against.
#[derive(Debug)]
pub struct ScanSnapshot {
    pub report: ScanReport,
    pub index: FileIndex,
    pub generation: u64,
}

/// Holds the last complete scan until something invalidates it.
///
/// [`ReferenceCache::invalidate`] is the only way cached state is dropped.
/// Cancelled scans, and scans that started before the latest invalidation,
/// are handed back to the caller but never cached.
#[derive(Default)]
pub struct ReferenceCache {
    inner: RwLock<CacheState>,
}

#[derive(Default)]
struct CacheState {
    snapshot: Option<Arc<ScanSnapshot>>,
    generation: u64,
}

impl ReferenceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self) -> Option<Arc<ScanSnapshot>> {
        self.inner.read().await.snapshot.clone()
    }

    /// Wrap a finished scan, caching it when it is still current.
    ///
    /// `started_at` is the [`generation`](Self::generation) read before the
    /// scan began.
    pub async fn store(
        &self,
        report: ScanReport,
        index: FileIndex,
        started_at: u64,
    ) -> Arc<ScanSnapshot> {
        let mut state = self.inner.write().await;
        let cacheable = !report.cancelled && state.generation == started_at;

        let snapshot = Arc::new(ScanSnapshot {
            report,
            index,
            generation: started_at,
        });

        if cacheable {
            state.snapshot = Some(snapshot.clone());
        } else {
            log::debug!("Not caching scan from generation {}", started_at);
        }
        snapshot
    }

    pub async fn invalidate(&self) {
        let mut state = self.inner.write().await;
        state.snapshot = None;
        state.generation += 1;
    }

    /// Bumped by every invalidation.
    pub async fn generation(&self) -> u64 {
        self.inner.read().await.generation
    }
}
