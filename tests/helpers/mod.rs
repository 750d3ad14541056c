//! Shared test utilities

pub mod mock_catalog;

pub use mock_catalog::{album_json, MockCatalog, MockCatalogBuilder};

use freshet::config::FreshetConfig;
use freshet::services::catalog_client::CatalogClient;
use freshet::services::credentials::{CredentialSource, HttpCredentialManager};
use freshet::services::poll_engine::PollEngine;
use freshet::services::release_cache::ReleaseCache;
use std::sync::Arc;

/// Wire a real engine (real credential manager included) against a mock
/// catalog, with defaults for everything but the artist list.
pub fn engine_against(mock: &MockCatalog, artist_ids: &str) -> (Arc<ReleaseCache>, PollEngine) {
    let config = config_against(mock, artist_ids);
    let cache = Arc::new(ReleaseCache::new());
    let engine = engine_sharing_cache(config, Arc::clone(&cache));
    (cache, engine)
}

/// Build an engine over an existing cache, e.g. to model a restart with a
/// changed configuration.
pub fn engine_sharing_cache(config: FreshetConfig, cache: Arc<ReleaseCache>) -> PollEngine {
    let credentials: Arc<dyn CredentialSource> = Arc::new(
        HttpCredentialManager::new(
            config.upstream.token_url.clone(),
            config.auth.client_id.clone(),
            config.auth.refresh_token.clone(),
        )
        .unwrap(),
    );
    let client = Arc::new(
        CatalogClient::new(&config.upstream.base_url, Arc::clone(&credentials)).unwrap(),
    );
    PollEngine::new(Arc::new(config), client, cache, credentials)
}

/// Base config pointed at the mock.
pub fn config_against(mock: &MockCatalog, artist_ids: &str) -> FreshetConfig {
    let mut config = FreshetConfig::default();
    config.upstream.base_url = mock.base_url.clone();
    config.upstream.token_url = mock.token_url.clone();
    config.auth.client_id = "test-client".to_string();
    config.auth.refresh_token = "test-refresh".to_string();
    config.watch.artist_ids = artist_ids.to_string();
    config
}
