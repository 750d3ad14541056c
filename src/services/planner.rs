//! Poll-cycle planner
//!
//! Decides, at the start of each cycle, whether the cached batch still
//! serves and which upstream requests to issue when it does not. The
//! decision is driven by the watch configuration, the cache state, and
//! the credential precondition. Authenticated strategies are only
//! planned once credentials report ready; the public search surface is
//! the fallback when they do not.

use crate::config::FreshetConfig;
use crate::services::credentials::{CredentialReadiness, CredentialSource};
use crate::services::release_cache::ReleaseCache;
use crate::types::Fingerprint;

/// Page size for artist album listings.
pub const ARTIST_PAGE_SIZE: u32 = 100;
/// Page size for fallback keyword searches.
pub const SEARCH_PAGE_SIZE: u32 = 100;
/// Number of search pages swept in fallback mode.
pub const SEARCH_MAX_PAGES: u32 = 3;

/// One upstream request the engine should issue this cycle. Each variant
/// carries everything needed to build the request; the engine never
/// inspects anything else to decide how to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedFetch {
    /// Lightweight liveness round trip issued when serving from cache.
    CacheMarker,
    /// First page of one watched artist's album listing.
    ArtistAlbums { artist_id: String },
    /// The curated home feed.
    HomeFeed,
    /// One page of the fallback keyword search, 1-based.
    SearchPage { page: u32 },
}

impl PlannedFetch {
    /// Accumulator key for fetches that feed a multi-source cycle.
    pub fn source_key(&self) -> Option<String> {
        match self {
            PlannedFetch::ArtistAlbums { artist_id } => Some(artist_id.clone()),
            PlannedFetch::SearchPage { page } => Some(format!("page-{}", page)),
            PlannedFetch::CacheMarker | PlannedFetch::HomeFeed => None,
        }
    }
}

/// How the cycle obtains its batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStrategy {
    /// Cached batch still valid; serve it.
    UseCache,
    /// One listing fetch per watched artist, merged on completion.
    Artists,
    /// Single home-feed fetch.
    Feed,
    /// Unauthenticated keyword-search sweep.
    SearchFallback,
}

impl FetchStrategy {
    pub fn label(&self) -> &'static str {
        match self {
            FetchStrategy::UseCache => "cache",
            FetchStrategy::Artists => "artists",
            FetchStrategy::Feed => "feed",
            FetchStrategy::SearchFallback => "search-fallback",
        }
    }
}

/// Complete plan for one poll cycle.
#[derive(Debug, Clone)]
pub struct FetchPlan {
    pub fingerprint: Fingerprint,
    pub strategy: FetchStrategy,
    pub requests: Vec<PlannedFetch>,
}

/// Build the plan for one cycle.
///
/// Order of evaluation: a valid cached batch for the configured
/// fingerprint short-circuits everything; otherwise the credential
/// precondition runs, and only a failure downgrades the cycle to the
/// public search surface. A still-valid fallback batch is reused before
/// sweeping search again, so broken credentials do not hammer the
/// public endpoint every cycle.
pub async fn plan_cycle(
    config: &FreshetConfig,
    cache: &ReleaseCache,
    credentials: &dyn CredentialSource,
) -> FetchPlan {
    let artist_ids = config.artist_ids();
    let cache_hours = config.watch.cache_hours as u64;

    let use_artists = !artist_ids.is_empty() && !config.watch.prefer_home_feed;
    let fingerprint = if use_artists {
        Fingerprint::for_artists(&artist_ids)
    } else {
        Fingerprint::home_feed()
    };

    if cache.is_valid(&fingerprint, cache_hours).await {
        tracing::debug!(fingerprint = %fingerprint, "Cached batch still valid");
        return FetchPlan {
            fingerprint,
            strategy: FetchStrategy::UseCache,
            requests: vec![PlannedFetch::CacheMarker],
        };
    }

    match credentials.ensure_ready().await {
        CredentialReadiness::Ready | CredentialReadiness::Refreshed => {
            if use_artists {
                let requests = artist_ids
                    .into_iter()
                    .map(|artist_id| PlannedFetch::ArtistAlbums { artist_id })
                    .collect();
                FetchPlan {
                    fingerprint,
                    strategy: FetchStrategy::Artists,
                    requests,
                }
            } else {
                FetchPlan {
                    fingerprint,
                    strategy: FetchStrategy::Feed,
                    requests: vec![PlannedFetch::HomeFeed],
                }
            }
        }
        CredentialReadiness::Failed => {
            let fallback = Fingerprint::search_fallback();

            if cache.is_valid(&fallback, cache_hours).await {
                tracing::debug!("Serving previous fallback batch while credentials recover");
                return FetchPlan {
                    fingerprint: fallback,
                    strategy: FetchStrategy::UseCache,
                    requests: vec![PlannedFetch::CacheMarker],
                };
            }

            tracing::warn!("Credentials unavailable; planning public search sweep");
            let requests = (1..=SEARCH_MAX_PAGES)
                .map(|page| PlannedFetch::SearchPage { page })
                .collect();
            FetchPlan {
                fingerprint: fallback,
                strategy: FetchStrategy::SearchFallback,
                requests,
            }
        }
    }
}
