//! Loopback mock of the upstream catalog API
//!
//! Serves canned payloads on an ephemeral port and counts hits per
//! endpoint so tests can assert exactly how many upstream calls a poll
//! cycle issued. Authenticated endpoints reject requests that do not
//! carry the token minted by the mock's own token route.

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Bearer token the mock's token endpoint hands out.
pub const TEST_TOKEN: &str = "test-token";

/// Per-endpoint hit counters.
#[derive(Default)]
pub struct HitCounters {
    pub ping: AtomicUsize,
    pub search: AtomicUsize,
    pub artist_albums: AtomicUsize,
    pub home_feed: AtomicUsize,
    pub album: AtomicUsize,
    pub token: AtomicUsize,
}

impl HitCounters {
    pub fn ping(&self) -> usize {
        self.ping.load(Ordering::SeqCst)
    }
    pub fn search(&self) -> usize {
        self.search.load(Ordering::SeqCst)
    }
    pub fn artist_albums(&self) -> usize {
        self.artist_albums.load(Ordering::SeqCst)
    }
    pub fn home_feed(&self) -> usize {
        self.home_feed.load(Ordering::SeqCst)
    }
    pub fn album(&self) -> usize {
        self.album.load(Ordering::SeqCst)
    }
    pub fn token(&self) -> usize {
        self.token.load(Ordering::SeqCst)
    }
}

struct MockState {
    hits: Arc<HitCounters>,
    artist_albums: HashMap<String, Value>,
    failing_artists: HashSet<String>,
    home_feed: Value,
    search: Value,
    albums: HashMap<u64, Value>,
    reject_tokens: bool,
}

/// Canned album record in the catalog's wire shape.
pub fn album_json(id: u64, artist: &str, title: &str, release_date: &str, tags: &[&str]) -> Value {
    json!({
        "id": id,
        "title": title,
        "artist": {"id": 1, "name": artist},
        "duration": 2400,
        "numberOfTracks": 10,
        "explicit": false,
        "releaseDate": release_date,
        "mediaMetadata": {"tags": tags},
        "url": format!("https://listen.catalog.test/album/{}", id)
    })
}

/// Builder for a mock catalog with canned responses.
pub struct MockCatalogBuilder {
    artist_albums: HashMap<String, Value>,
    failing_artists: HashSet<String>,
    home_feed: Value,
    search: Value,
    albums: HashMap<u64, Value>,
    reject_tokens: bool,
}

impl MockCatalogBuilder {
    pub fn new() -> Self {
        Self {
            artist_albums: HashMap::new(),
            failing_artists: HashSet::new(),
            home_feed: json!({"rows": []}),
            search: json!({"albums": {"items": []}, "tracks": {"items": []}}),
            albums: HashMap::new(),
            reject_tokens: false,
        }
    }

    /// Canned album listing for one artist.
    pub fn artist_albums(mut self, artist_id: &str, items: Vec<Value>) -> Self {
        let total = items.len();
        self.artist_albums.insert(
            artist_id.to_string(),
            json!({"items": items, "totalNumberOfItems": total}),
        );
        self
    }

    /// Make one artist's listing fail with a 500.
    pub fn fail_artist(mut self, artist_id: &str) -> Self {
        self.failing_artists.insert(artist_id.to_string());
        self
    }

    /// Canned home feed payload (full `rows` structure).
    pub fn home_feed(mut self, payload: Value) -> Self {
        self.home_feed = payload;
        self
    }

    /// Canned search results, served identically for every page.
    pub fn search_results(mut self, albums: Vec<Value>, tracks: Vec<Value>) -> Self {
        self.search = json!({"albums": {"items": albums}, "tracks": {"items": tracks}});
        self
    }

    /// Canned full album record for the lookup endpoint.
    pub fn album(mut self, id: u64, record: Value) -> Self {
        self.albums.insert(id, record);
        self
    }

    /// Reject every token exchange, simulating dead credentials.
    pub fn reject_tokens(mut self) -> Self {
        self.reject_tokens = true;
        self
    }

    /// Bind to an ephemeral loopback port and start serving.
    pub async fn spawn(self) -> MockCatalog {
        let hits = Arc::new(HitCounters::default());
        let state = Arc::new(MockState {
            hits: Arc::clone(&hits),
            artist_albums: self.artist_albums,
            failing_artists: self.failing_artists,
            home_feed: self.home_feed,
            search: self.search,
            albums: self.albums,
            reject_tokens: self.reject_tokens,
        });

        let router = Router::new()
            .route("/ping", get(ping))
            .route("/v1/search", get(search))
            .route("/v1/artists/:artist_id/albums", get(artist_albums))
            .route("/v1/pages/home", get(home_feed))
            .route("/v1/albums/:album_id", get(album))
            .route("/token", post(token))
            .with_state(state);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        MockCatalog {
            base_url: format!("http://{}", addr),
            token_url: format!("http://{}/token", addr),
            hits,
            handle,
        }
    }
}

/// A running mock catalog server.
pub struct MockCatalog {
    pub base_url: String,
    pub token_url: String,
    pub hits: Arc<HitCounters>,
    handle: JoinHandle<()>,
}

impl Drop for MockCatalog {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v == format!("Bearer {}", TEST_TOKEN))
        .unwrap_or(false)
}

async fn ping(State(state): State<Arc<MockState>>) -> StatusCode {
    state.hits.ping.fetch_add(1, Ordering::SeqCst);
    StatusCode::NO_CONTENT
}

async fn search(State(state): State<Arc<MockState>>) -> Json<Value> {
    state.hits.search.fetch_add(1, Ordering::SeqCst);
    Json(state.search.clone())
}

async fn artist_albums(
    State(state): State<Arc<MockState>>,
    Path(artist_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Value>, StatusCode> {
    state.hits.artist_albums.fetch_add(1, Ordering::SeqCst);
    if !authorized(&headers) {
        return Err(StatusCode::UNAUTHORIZED);
    }
    if state.failing_artists.contains(&artist_id) {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }
    Ok(Json(state.artist_albums.get(&artist_id).cloned().unwrap_or_else(
        || json!({"items": [], "totalNumberOfItems": 0}),
    )))
}

async fn home_feed(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
) -> Result<Json<Value>, StatusCode> {
    state.hits.home_feed.fetch_add(1, Ordering::SeqCst);
    if !authorized(&headers) {
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(Json(state.home_feed.clone()))
}

async fn album(
    State(state): State<Arc<MockState>>,
    Path(album_id): Path<u64>,
) -> Result<Json<Value>, StatusCode> {
    state.hits.album.fetch_add(1, Ordering::SeqCst);
    state
        .albums
        .get(&album_id)
        .cloned()
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn token(State(state): State<Arc<MockState>>) -> Result<Json<Value>, StatusCode> {
    state.hits.token.fetch_add(1, Ordering::SeqCst);
    if state.reject_tokens {
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(Json(json!({"access_token": TEST_TOKEN, "expires_in": 3600})))
}
