//! In-memory release cache
//!
//! Holds the most recent fully-assembled release batch together with the
//! fingerprint of the watch configuration that produced it. A batch is
//! served while it is younger than the configured window and the
//! fingerprint still matches; a configuration change invalidates it
//! immediately regardless of age.

use crate::types::{Fingerprint, ReleaseCandidate};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

/// Floor for the cache validity window. Shorter configured windows are
/// clamped up so a misconfigured interval cannot turn every poll into a
/// full upstream sweep.
pub const MIN_CACHE_HOURS: u64 = 24;

/// One cached batch: the assembled releases plus the fingerprint and
/// fetch time that scope its validity.
#[derive(Debug, Clone)]
struct CachedBatch {
    fingerprint: Fingerprint,
    releases: Vec<ReleaseCandidate>,
    fetched_at: DateTime<Utc>,
}

/// Point-in-time cache summary for the health endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct CacheSnapshot {
    pub fingerprint: Option<String>,
    pub age_seconds: Option<i64>,
    pub release_count: usize,
}

/// Single-slot release cache shared across poll cycles.
pub struct ReleaseCache {
    slot: RwLock<Option<CachedBatch>>,
}

impl ReleaseCache {
    pub fn new() -> Self {
        Self {
            slot: RwLock::new(None),
        }
    }

    /// True when a batch is present, its fingerprint matches, and it is
    /// younger than the validity window. The window is clamped to
    /// [`MIN_CACHE_HOURS`] before the age comparison; a batch exactly at
    /// the boundary counts as stale.
    pub async fn is_valid(&self, fingerprint: &Fingerprint, max_age_hours: u64) -> bool {
        let slot = self.slot.read().await;

        let Some(batch) = slot.as_ref() else {
            return false;
        };

        if batch.fingerprint != *fingerprint {
            return false;
        }

        let max_age = Duration::hours(max_age_hours.max(MIN_CACHE_HOURS) as i64);
        Utc::now() - batch.fetched_at < max_age
    }

    /// Clone of the cached releases, if any batch is present. Validity is
    /// the caller's concern; pair with [`is_valid`](Self::is_valid).
    pub async fn get(&self) -> Option<Vec<ReleaseCandidate>> {
        let slot = self.slot.read().await;
        slot.as_ref().map(|batch| batch.releases.clone())
    }

    /// Install a freshly assembled batch, stamped now.
    pub async fn replace(&self, fingerprint: Fingerprint, releases: Vec<ReleaseCandidate>) {
        self.replace_at(fingerprint, releases, Utc::now()).await;
    }

    async fn replace_at(
        &self,
        fingerprint: Fingerprint,
        releases: Vec<ReleaseCandidate>,
        fetched_at: DateTime<Utc>,
    ) {
        tracing::debug!(
            fingerprint = %fingerprint,
            release_count = releases.len(),
            "Caching release batch"
        );

        let mut slot = self.slot.write().await;
        *slot = Some(CachedBatch {
            fingerprint,
            releases,
            fetched_at,
        });
    }

    /// Drop the cached batch. The next poll cycle fetches from upstream.
    pub async fn clear(&self) {
        let mut slot = self.slot.write().await;
        if slot.take().is_some() {
            tracing::info!("Release cache cleared");
        }
    }

    pub async fn snapshot(&self) -> CacheSnapshot {
        let slot = self.slot.read().await;
        match slot.as_ref() {
            Some(batch) => CacheSnapshot {
                fingerprint: Some(batch.fingerprint.as_str().to_string()),
                age_seconds: Some((Utc::now() - batch.fetched_at).num_seconds()),
                release_count: batch.releases.len(),
            },
            None => CacheSnapshot {
                fingerprint: None,
                age_seconds: None,
                release_count: 0,
            },
        }
    }
}

impl Default for ReleaseCache {
    fn default() -> Self {
        Self::new()
    }
}
