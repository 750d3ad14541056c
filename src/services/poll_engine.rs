//! Poll engine
//!
//! Runs one poll cycle end to end: plan, fetch, normalize, merge, cache.
//! The external scheduler drives cycles at its own cadence and only ever
//! sees a release list; every failure path inside a cycle degrades to
//! fewer (possibly zero) releases plus log output.

use crate::config::FreshetConfig;
use crate::services::accumulator::{AddOutcome, ReleaseAccumulator};
use crate::services::catalog_client::CatalogClient;
use crate::services::credentials::CredentialSource;
use crate::services::normalizer;
use crate::services::planner::{
    self, FetchPlan, FetchStrategy, PlannedFetch, ARTIST_PAGE_SIZE, SEARCH_PAGE_SIZE,
};
use crate::services::release_cache::ReleaseCache;
use crate::types::{ReleaseCandidate, SourceKind};
use chrono::{Datelike, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use uuid::Uuid;

/// Executes poll cycles against the catalog. Owns the client, cache and
/// accumulator; shared across request handlers.
pub struct PollEngine {
    config: Arc<FreshetConfig>,
    client: Arc<CatalogClient>,
    cache: Arc<ReleaseCache>,
    accumulator: ReleaseAccumulator,
    credentials: Arc<dyn CredentialSource>,
}

impl PollEngine {
    pub fn new(
        config: Arc<FreshetConfig>,
        client: Arc<CatalogClient>,
        cache: Arc<ReleaseCache>,
        credentials: Arc<dyn CredentialSource>,
    ) -> Self {
        let accumulator = ReleaseAccumulator::new(Arc::clone(&cache));
        Self {
            config,
            client,
            cache,
            accumulator,
            credentials,
        }
    }

    /// Run one poll cycle and return the resulting batch.
    ///
    /// Infallible by contract: upstream trouble shrinks the result, it
    /// never propagates.
    pub async fn run_cycle(&self) -> Vec<ReleaseCandidate> {
        let cycle_id = Uuid::new_v4();
        let plan = planner::plan_cycle(&self.config, &self.cache, self.credentials.as_ref()).await;

        tracing::info!(
            cycle_id = %cycle_id,
            strategy = plan.strategy.label(),
            fingerprint = %plan.fingerprint,
            requests = plan.requests.len(),
            "Poll cycle planned"
        );

        let releases = match plan.strategy {
            FetchStrategy::UseCache => self.serve_cached().await,
            FetchStrategy::Feed => self.run_feed(plan).await,
            FetchStrategy::Artists | FetchStrategy::SearchFallback => {
                self.run_accumulating(plan).await
            }
        };

        tracing::info!(
            cycle_id = %cycle_id,
            release_count = releases.len(),
            "Poll cycle finished"
        );
        releases
    }

    /// Cache-hit path: one minimal marker round trip, then the cached
    /// batch unchanged. The marker's outcome is irrelevant.
    async fn serve_cached(&self) -> Vec<ReleaseCandidate> {
        if let Err(e) = self.client.ping().await {
            tracing::debug!("Cache marker ping failed: {}", e);
        }
        self.cache.get().await.unwrap_or_default()
    }

    /// Single-shot feed path: fetch, normalize, cache directly. No
    /// accumulation since there is exactly one source.
    async fn run_feed(&self, plan: FetchPlan) -> Vec<ReleaseCandidate> {
        match self.client.home_feed().await {
            Ok(payload) => {
                let releases = normalizer::normalize_home_feed(&payload, Utc::now());
                self.cache.replace(plan.fingerprint, releases.clone()).await;
                releases
            }
            Err(e) => {
                tracing::warn!("Home feed fetch failed: {}", e);
                Vec::new()
            }
        }
    }

    /// Multi-source path shared by the artist and search strategies:
    /// fetches run concurrently and fold into the accumulator as they
    /// land. A source that fails leaves the cycle incomplete; whatever
    /// accumulated is served once without being cached.
    async fn run_accumulating(&self, plan: FetchPlan) -> Vec<ReleaseCandidate> {
        let keys: Vec<String> = plan
            .requests
            .iter()
            .filter_map(PlannedFetch::source_key)
            .collect();
        let sort_mode = match plan.strategy {
            FetchStrategy::SearchFallback => SourceKind::Search.sort_mode(),
            _ => SourceKind::ArtistAlbums.sort_mode(),
        };

        self.accumulator
            .begin_cycle(plan.fingerprint.clone(), sort_mode, keys)
            .await;

        let days_back = self.config.watch.days_back;
        let mut fetches = FuturesUnordered::new();

        for request in plan.requests {
            let Some(key) = request.source_key() else {
                continue;
            };
            let client = Arc::clone(&self.client);

            fetches.push(async move {
                let normalized = match request {
                    PlannedFetch::ArtistAlbums { artist_id } => {
                        match client.artist_albums(&artist_id, ARTIST_PAGE_SIZE, 0).await {
                            Ok(payload) => Some(normalizer::normalize_artist_albums(
                                &payload,
                                days_back,
                                Utc::now(),
                            )),
                            Err(e) => {
                                tracing::warn!(
                                    artist_id = %artist_id,
                                    "Artist listing fetch failed: {}",
                                    e
                                );
                                None
                            }
                        }
                    }
                    PlannedFetch::SearchPage { page } => {
                        let query = format!("new releases {}", Utc::now().year());
                        let offset = (page - 1) * SEARCH_PAGE_SIZE;
                        match client.search(&query, SEARCH_PAGE_SIZE, offset).await {
                            Ok(payload) => {
                                Some(normalizer::normalize_search(&payload, &client).await)
                            }
                            Err(e) => {
                                tracing::warn!(page, "Search page fetch failed: {}", e);
                                None
                            }
                        }
                    }
                    PlannedFetch::CacheMarker | PlannedFetch::HomeFeed => None,
                };
                (key, normalized)
            });
        }

        let mut completed_batch = None;
        while let Some((key, normalized)) = fetches.next().await {
            let Some(releases) = normalized else {
                continue;
            };
            if let AddOutcome::Complete(batch) = self.accumulator.add(&key, releases).await {
                completed_batch = Some(batch);
            }
        }

        if let Some(batch) = completed_batch {
            return batch;
        }
        self.accumulator.take_partial().await.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::credentials::{CredentialError, CredentialReadiness};
    use crate::types::{AudioQuality, Fingerprint, DOWNLOAD_PROTOCOL};
    use async_trait::async_trait;
    use chrono::DateTime;

    struct FixedReadiness(CredentialReadiness);

    #[async_trait]
    impl CredentialSource for FixedReadiness {
        async fn expires_at(&self) -> Option<DateTime<Utc>> {
            None
        }
        async fn force_refresh(&self) -> Result<(), CredentialError> {
            Ok(())
        }
        async fn ensure_logged_in(&self) -> Result<(), CredentialError> {
            Ok(())
        }
        async fn bearer_token(&self) -> Option<String> {
            Some("token".to_string())
        }
        async fn ensure_ready(&self) -> CredentialReadiness {
            self.0
        }
    }

    /// Engine wired to a closed loopback port: every upstream call fails
    /// fast with a connection error.
    fn unreachable_engine(
        artist_ids: &str,
        readiness: CredentialReadiness,
    ) -> (Arc<ReleaseCache>, PollEngine) {
        let mut config = FreshetConfig::default();
        config.watch.artist_ids = artist_ids.to_string();
        config.upstream.base_url = "http://127.0.0.1:1".to_string();

        let credentials: Arc<dyn CredentialSource> = Arc::new(FixedReadiness(readiness));
        let client =
            Arc::new(CatalogClient::new("http://127.0.0.1:1", Arc::clone(&credentials)).unwrap());
        let cache = Arc::new(ReleaseCache::new());

        let engine = PollEngine::new(
            Arc::new(config),
            client,
            Arc::clone(&cache),
            credentials,
        );
        (cache, engine)
    }

    fn release(id: &str) -> ReleaseCandidate {
        ReleaseCandidate {
            id: id.to_string(),
            title: "Gale Harbor - Night Signals".to_string(),
            artist: "Gale Harbor".to_string(),
            album: "Night Signals".to_string(),
            info_url: format!("album:{}", id),
            published: Utc::now(),
            size_bytes: 96_000_000,
            quality: AudioQuality::Lossless,
            explicit: false,
            protocol: DOWNLOAD_PROTOCOL.to_string(),
        }
    }

    #[tokio::test]
    async fn test_cached_batch_is_served_even_when_marker_ping_fails() {
        let (cache, engine) = unreachable_engine("7804", CredentialReadiness::Ready);
        cache
            .replace(
                Fingerprint::for_artists(&["7804".to_string()]),
                vec![release("9001-lossless")],
            )
            .await;

        let releases = engine.run_cycle().await;

        assert_eq!(releases.len(), 1);
        assert_eq!(releases[0].id, "9001-lossless");
    }

    #[tokio::test]
    async fn test_all_artist_fetches_failing_yields_empty_and_no_cache() {
        let (cache, engine) = unreachable_engine("7804, 55", CredentialReadiness::Ready);

        let releases = engine.run_cycle().await;

        assert!(releases.is_empty());
        assert!(cache.get().await.is_none());
    }

    #[tokio::test]
    async fn test_feed_fetch_failure_degrades_to_empty() {
        let (cache, engine) = unreachable_engine("", CredentialReadiness::Ready);

        let releases = engine.run_cycle().await;

        assert!(releases.is_empty());
        assert!(cache.get().await.is_none());
    }

    #[tokio::test]
    async fn test_search_fallback_failure_degrades_to_empty() {
        let (cache, engine) = unreachable_engine("7804", CredentialReadiness::Failed);

        let releases = engine.run_cycle().await;

        assert!(releases.is_empty());
        assert!(cache.get().await.is_none());
    }
}
