//! Streaming-catalog API client
//!
//! Thin HTTP client over the catalog's search, artist-album, home-feed and
//! album-lookup endpoints, with a minimum-interval rate limiter. The
//! upstream service is rate-sensitive, so every caller funnels through the
//! same limiter.

use crate::services::credentials::CredentialSource;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;

const USER_AGENT: &str = "freshet/0.1.0 (https://github.com/freshet/freshet)";
const RATE_LIMIT_MS: u64 = 250; // 4 requests per second

/// Catalog client errors
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Not authenticated: {0}")]
    Auth(String),

    #[error("Album not found: {0}")]
    AlbumNotFound(u64),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),
}

// ============================================================================
// Wire payloads
// ============================================================================

/// Artist reference as it appears inside album and track records.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogArtist {
    pub id: u64,
    pub name: String,
}

/// Media capability block carried by album records.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaMetadata {
    #[serde(default)]
    pub tags: Vec<String>,
}

/// One album record.
///
/// `id` and `title` are required; everything else tolerates absence so a
/// sparse record still normalizes.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogAlbum {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub artist: Option<CatalogArtist>,
    #[serde(default)]
    pub artists: Vec<CatalogArtist>,
    /// Total album duration in seconds.
    #[serde(default)]
    pub duration: Option<u64>,
    #[serde(default, rename = "numberOfTracks")]
    pub number_of_tracks: Option<u32>,
    #[serde(default)]
    pub explicit: bool,
    /// `YYYY-MM-DD`
    #[serde(default, rename = "releaseDate")]
    pub release_date: Option<String>,
    /// RFC 3339
    #[serde(default, rename = "streamStartDate")]
    pub stream_start_date: Option<String>,
    #[serde(default, rename = "mediaMetadata")]
    pub media_metadata: MediaMetadata,
    #[serde(default)]
    pub url: Option<String>,
}

/// Track record reduced to what release expansion needs: the parent album.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogTrack {
    pub id: u64,
    #[serde(default)]
    pub album: Option<AlbumRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlbumRef {
    pub id: u64,
}

/// A paged item list. Items stay raw so one malformed record never fails
/// the surrounding payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemPage {
    #[serde(default)]
    pub items: Vec<Value>,
}

/// Keyword-search payload: parallel album and track result lists.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchPayload {
    #[serde(default)]
    pub albums: ItemPage,
    #[serde(default)]
    pub tracks: ItemPage,
}

/// Paginated artist-album listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArtistAlbumsPayload {
    #[serde(default)]
    pub items: Vec<Value>,
    #[serde(default, rename = "totalNumberOfItems")]
    pub total_number_of_items: Option<u64>,
}

/// Curated home-page feed: rows of modules, some of which carry paged
/// album lists.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedPayload {
    #[serde(default)]
    pub rows: Vec<FeedRow>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedRow {
    #[serde(default)]
    pub modules: Vec<FeedModule>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedModule {
    #[serde(default, rename = "type")]
    pub module_type: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, rename = "pagedList")]
    pub paged_list: Option<ItemPage>,
}

// ============================================================================
// Rate limiter
// ============================================================================

/// Rate limiter enforcing a minimum interval between upstream calls.
struct RateLimiter {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    fn new(min_interval_ms: u64) -> Self {
        Self {
            last_request: Mutex::new(None),
            min_interval: Duration::from_millis(min_interval_ms),
        }
    }

    /// Wait if necessary to comply with the rate limit.
    async fn wait(&self) {
        let mut last = self.last_request.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                tracing::debug!("Catalog rate limiting: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }

        *last = Some(Instant::now());
    }
}

// ============================================================================
// Client
// ============================================================================

/// Catalog API client
pub struct CatalogClient {
    http_client: reqwest::Client,
    base_url: String,
    credentials: Arc<dyn CredentialSource>,
    rate_limiter: Arc<RateLimiter>,
}

impl CatalogClient {
    pub fn new(
        base_url: &str,
        credentials: Arc<dyn CredentialSource>,
    ) -> Result<Self, CatalogError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| CatalogError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            credentials,
            rate_limiter: Arc::new(RateLimiter::new(RATE_LIMIT_MS)),
        })
    }

    /// Keyword search over the catalog's public surface (no auth header).
    pub async fn search(
        &self,
        query: &str,
        limit: u32,
        offset: u32,
    ) -> Result<SearchPayload, CatalogError> {
        self.rate_limiter.wait().await;

        let url = format!("{}/v1/search", self.base_url);
        tracing::debug!(query = %query, limit, offset, "Querying catalog search");

        let response = self
            .http_client
            .get(&url)
            .query(&[
                ("query", query.to_string()),
                ("limit", limit.to_string()),
                ("offset", offset.to_string()),
            ])
            .send()
            .await
            .map_err(|e| CatalogError::Network(e.to_string()))?;

        let response = Self::check_status(response).await?;
        response
            .json()
            .await
            .map_err(|e| CatalogError::Parse(e.to_string()))
    }

    /// First pages of an artist's album listing.
    pub async fn artist_albums(
        &self,
        artist_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<ArtistAlbumsPayload, CatalogError> {
        self.rate_limiter.wait().await;

        let url = format!("{}/v1/artists/{}/albums", self.base_url, artist_id);
        tracing::debug!(artist_id = %artist_id, limit, offset, "Querying catalog artist albums");

        let request = self
            .authorized_get(&url)
            .await?
            .query(&[("limit", limit.to_string()), ("offset", offset.to_string())]);

        let response = request
            .send()
            .await
            .map_err(|e| CatalogError::Network(e.to_string()))?;

        let response = Self::check_status(response).await?;
        response
            .json()
            .await
            .map_err(|e| CatalogError::Parse(e.to_string()))
    }

    /// Curated home-page feed.
    pub async fn home_feed(&self) -> Result<FeedPayload, CatalogError> {
        self.rate_limiter.wait().await;

        let url = format!("{}/v1/pages/home", self.base_url);
        tracing::debug!("Querying catalog home feed");

        let response = self
            .authorized_get(&url)
            .await?
            .send()
            .await
            .map_err(|e| CatalogError::Network(e.to_string()))?;

        let response = Self::check_status(response).await?;
        response
            .json()
            .await
            .map_err(|e| CatalogError::Parse(e.to_string()))
    }

    /// Full album record by id, from the catalog's public surface like
    /// [`search`](Self::search). A 404 maps to `AlbumNotFound` so callers
    /// can treat a vanished album as a skip rather than a failure.
    pub async fn album(&self, album_id: u64) -> Result<CatalogAlbum, CatalogError> {
        self.rate_limiter.wait().await;

        let url = format!("{}/v1/albums/{}", self.base_url, album_id);
        tracing::debug!(album_id, "Querying catalog album");

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| CatalogError::Network(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(CatalogError::AlbumNotFound(album_id));
        }

        let response = Self::check_status(response).await?;
        response
            .json()
            .await
            .map_err(|e| CatalogError::Parse(e.to_string()))
    }

    /// Minimal unauthenticated liveness round trip used by the
    /// cache-marker path. The body is ignored.
    pub async fn ping(&self) -> Result<(), CatalogError> {
        self.rate_limiter.wait().await;

        let url = format!("{}/ping", self.base_url);
        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| CatalogError::Network(e.to_string()))?;

        Self::check_status(response).await.map(|_| ())
    }

    async fn authorized_get(&self, url: &str) -> Result<reqwest::RequestBuilder, CatalogError> {
        let token = self
            .credentials
            .bearer_token()
            .await
            .ok_or_else(|| CatalogError::Auth("no live catalog session".to_string()))?;
        Ok(self.http_client.get(url).bearer_auth(token))
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, CatalogError> {
        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(CatalogError::Auth(format!("upstream returned {}", status)));
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(CatalogError::Api(status.as_u16(), error_text));
        }

        Ok(response)
    }
}
