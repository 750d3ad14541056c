//! Release accumulator
//!
//! Collects per-source partial results during a poll cycle. Sources
//! (individual artists, or search result pages) report in any order; once
//! every expected source has reported, the assembled batch is sorted and
//! handed to the cache in one step. A cycle that never completes leaves
//! the cache untouched.

use crate::services::release_cache::ReleaseCache;
use crate::types::{Fingerprint, ReleaseCandidate, SortMode};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Result of reporting one source's candidates.
#[derive(Debug)]
pub enum AddOutcome {
    /// Recorded; more sources outstanding.
    Pending { reported: usize, expected: usize },
    /// This report completed the cycle. The batch is sorted and cached.
    Complete(Vec<ReleaseCandidate>),
    /// Report discarded: no active cycle, unknown source, or duplicate.
    Ignored,
}

struct SessionState {
    fingerprint: Fingerprint,
    sort_mode: SortMode,
    expected: HashSet<String>,
    reported: HashSet<String>,
    releases: Vec<ReleaseCandidate>,
}

/// Accumulates partial results for the cycle in flight. At most one
/// cycle is active at a time; starting a new one discards a stale
/// predecessor.
pub struct ReleaseAccumulator {
    cache: Arc<ReleaseCache>,
    session: Mutex<Option<SessionState>>,
}

impl ReleaseAccumulator {
    pub fn new(cache: Arc<ReleaseCache>) -> Self {
        Self {
            cache,
            session: Mutex::new(None),
        }
    }

    /// Open a cycle expecting one report per key in `expected`.
    pub async fn begin_cycle(
        &self,
        fingerprint: Fingerprint,
        sort_mode: SortMode,
        expected: Vec<String>,
    ) {
        let mut session = self.session.lock().await;

        if let Some(stale) = session.take() {
            tracing::warn!(
                fingerprint = %stale.fingerprint,
                reported = stale.reported.len(),
                expected = stale.expected.len(),
                "Discarding incomplete accumulation session"
            );
        }

        if expected.is_empty() {
            tracing::warn!(fingerprint = %fingerprint, "Refusing cycle with no sources");
            return;
        }

        let expected: HashSet<String> = expected.into_iter().collect();
        tracing::debug!(
            fingerprint = %fingerprint,
            sources = expected.len(),
            "Accumulation session started"
        );

        *session = Some(SessionState {
            fingerprint,
            sort_mode,
            expected,
            reported: HashSet::new(),
            releases: Vec::new(),
        });
    }

    /// Record one source's candidates. Completing the final source sorts
    /// the batch and installs it in the cache before the session lock is
    /// released, so readers never observe a half-assembled cycle.
    pub async fn add(&self, key: &str, releases: Vec<ReleaseCandidate>) -> AddOutcome {
        let mut session = self.session.lock().await;

        let Some(state) = session.as_mut() else {
            tracing::warn!(key = %key, "Report with no accumulation session active");
            return AddOutcome::Ignored;
        };

        if !state.expected.contains(key) {
            tracing::warn!(key = %key, "Report from source outside the current cycle");
            return AddOutcome::Ignored;
        }

        if !state.reported.insert(key.to_string()) {
            tracing::debug!(key = %key, "Duplicate report for source");
            return AddOutcome::Ignored;
        }

        state.releases.extend(releases);

        if state.reported.len() < state.expected.len() {
            return AddOutcome::Pending {
                reported: state.reported.len(),
                expected: state.expected.len(),
            };
        }

        let Some(mut completed) = session.take() else {
            return AddOutcome::Ignored;
        };
        completed.sort_mode.sort(&mut completed.releases);
        // Two watched artists can report the same collaboration album;
        // identical candidates sort adjacent, so one pass suffices.
        completed.releases.dedup_by(|a, b| a.id == b.id);

        tracing::info!(
            fingerprint = %completed.fingerprint,
            release_count = completed.releases.len(),
            "Accumulation cycle complete"
        );

        self.cache
            .replace(completed.fingerprint, completed.releases.clone())
            .await;

        AddOutcome::Complete(completed.releases)
    }

    /// End the cycle early and return whatever accumulated, sorted. The
    /// cache is left untouched; partial batches are served once and
    /// never persisted.
    pub async fn take_partial(&self) -> Option<Vec<ReleaseCandidate>> {
        let mut session = self.session.lock().await;
        let mut state = session.take()?;

        tracing::warn!(
            fingerprint = %state.fingerprint,
            reported = state.reported.len(),
            expected = state.expected.len(),
            release_count = state.releases.len(),
            "Returning partial batch from incomplete cycle"
        );

        state.sort_mode.sort(&mut state.releases);
        state.releases.dedup_by(|a, b| a.id == b.id);
        Some(state.releases)
    }
}
