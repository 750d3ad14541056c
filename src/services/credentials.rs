//! Catalog credential management
//!
//! The catalog session is a capability consumed by the planner and the
//! catalog client: "is my credential still valid" and "refresh it".
//! Token acquisition flows beyond the refresh grant live outside freshet.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::time::Duration as StdDuration;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

const USER_AGENT: &str = "freshet/0.1.0 (https://github.com/freshet/freshet)";

/// Tokens are refreshed this long before their nominal expiry so a request
/// built at the boundary never carries a just-expired credential.
const EXPIRY_SKEW_SECS: i64 = 60;

/// Credential manager errors
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Token endpoint rejected the refresh: {0}")]
    Rejected(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Credential material not configured: {0}")]
    Missing(String),
}

/// Outcome of the credential precondition evaluated before any
/// authenticated request of a poll cycle is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialReadiness {
    /// A live session already existed.
    Ready,
    /// A refresh ran to completion and produced a live session.
    Refreshed,
    /// No live session could be obtained; authenticated fetches must not
    /// be planned this cycle.
    Failed,
}

/// A live catalog session.
#[derive(Debug, Clone)]
pub struct SessionToken {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

impl SessionToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Capability interface over the credential subsystem.
///
/// The planner decides between the full and the lighter-weight refresh
/// based on whether a session has ever been populated; both block until
/// the refresh completes or fails.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// Expiry of the current session, if one has ever been populated.
    async fn expires_at(&self) -> Option<DateTime<Utc>>;

    /// Full refresh, unconditionally exchanging the refresh grant.
    async fn force_refresh(&self) -> Result<(), CredentialError>;

    /// Lighter-weight refresh: a no-op while the session is live,
    /// otherwise a token exchange.
    async fn ensure_logged_in(&self) -> Result<(), CredentialError>;

    /// Bearer token for the Authorization header, if a session is live.
    async fn bearer_token(&self) -> Option<String>;

    /// Evaluate the precondition for authenticated fetches.
    ///
    /// Runs to completion (success or failure) before the caller builds
    /// any request. Failure is reported, never swallowed.
    async fn ensure_ready(&self) -> CredentialReadiness {
        let now = Utc::now();
        match self.expires_at().await {
            None => {
                debug!("No catalog session yet; forcing full refresh");
                match self.force_refresh().await {
                    Ok(()) => CredentialReadiness::Refreshed,
                    Err(e) => {
                        warn!("Catalog credential refresh failed: {}", e);
                        CredentialReadiness::Failed
                    }
                }
            }
            Some(expiry) if now >= expiry => {
                debug!(expired_at = %expiry, "Catalog session expired; re-ensuring login");
                match self.ensure_logged_in().await {
                    Ok(()) => CredentialReadiness::Refreshed,
                    Err(e) => {
                        warn!("Catalog session renewal failed: {}", e);
                        CredentialReadiness::Failed
                    }
                }
            }
            Some(_) => CredentialReadiness::Ready,
        }
    }
}

/// Wire shape of the token endpoint response.
#[derive(Debug, Clone, Deserialize)]
struct TokenResponse {
    access_token: String,
    /// Lifetime in seconds.
    expires_in: i64,
}

/// HTTP-backed credential manager exchanging a refresh grant at the
/// configured token endpoint.
pub struct HttpCredentialManager {
    http_client: reqwest::Client,
    token_url: String,
    client_id: String,
    refresh_token: String,
    session: RwLock<Option<SessionToken>>,
}

impl HttpCredentialManager {
    pub fn new(
        token_url: String,
        client_id: String,
        refresh_token: String,
    ) -> Result<Self, CredentialError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(StdDuration::from_secs(30))
            .build()
            .map_err(|e| CredentialError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            token_url,
            client_id,
            refresh_token,
            session: RwLock::new(None),
        })
    }

    /// Exchange the refresh grant for a fresh session token.
    async fn exchange(&self) -> Result<SessionToken, CredentialError> {
        if self.token_url.is_empty() {
            return Err(CredentialError::Missing("upstream.token_url".to_string()));
        }
        if self.client_id.is_empty() {
            return Err(CredentialError::Missing("auth.client_id".to_string()));
        }
        if self.refresh_token.is_empty() {
            return Err(CredentialError::Missing("auth.refresh_token".to_string()));
        }

        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", self.refresh_token.as_str()),
            ("client_id", self.client_id.as_str()),
        ];

        let response = self
            .http_client
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| CredentialError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CredentialError::Rejected(format!("{}: {}", status, body)));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| CredentialError::Parse(e.to_string()))?;

        let expires_at =
            Utc::now() + Duration::seconds((token.expires_in - EXPIRY_SKEW_SECS).max(0));
        Ok(SessionToken {
            access_token: token.access_token,
            expires_at,
        })
    }
}

#[async_trait]
impl CredentialSource for HttpCredentialManager {
    async fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.session.read().await.as_ref().map(|s| s.expires_at)
    }

    async fn force_refresh(&self) -> Result<(), CredentialError> {
        let token = self.exchange().await?;
        info!(expires_at = %token.expires_at, "Catalog session refreshed");
        *self.session.write().await = Some(token);
        Ok(())
    }

    async fn ensure_logged_in(&self) -> Result<(), CredentialError> {
        {
            let session = self.session.read().await;
            if let Some(token) = session.as_ref() {
                if !token.is_expired(Utc::now()) {
                    return Ok(());
                }
            }
        }
        self.force_refresh().await
    }

    async fn bearer_token(&self) -> Option<String> {
        let session = self.session.read().await;
        session.as_ref().and_then(|token| {
            if token.is_expired(Utc::now()) {
                None
            } else {
                Some(token.access_token.clone())
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted credential source for readiness-path tests.
    struct ScriptedCredentials {
        expires_at: Option<DateTime<Utc>>,
        refresh_ok: bool,
        force_calls: AtomicUsize,
        ensure_calls: AtomicUsize,
    }

    impl ScriptedCredentials {
        fn new(expires_at: Option<DateTime<Utc>>, refresh_ok: bool) -> Self {
            Self {
                expires_at,
                refresh_ok,
                force_calls: AtomicUsize::new(0),
                ensure_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl CredentialSource for ScriptedCredentials {
        async fn expires_at(&self) -> Option<DateTime<Utc>> {
            self.expires_at
        }

        async fn force_refresh(&self) -> Result<(), CredentialError> {
            self.force_calls.fetch_add(1, Ordering::SeqCst);
            if self.refresh_ok {
                Ok(())
            } else {
                Err(CredentialError::Rejected("scripted".to_string()))
            }
        }

        async fn ensure_logged_in(&self) -> Result<(), CredentialError> {
            self.ensure_calls.fetch_add(1, Ordering::SeqCst);
            if self.refresh_ok {
                Ok(())
            } else {
                Err(CredentialError::Rejected("scripted".to_string()))
            }
        }

        async fn bearer_token(&self) -> Option<String> {
            Some("scripted-token".to_string())
        }
    }

    #[tokio::test]
    async fn test_ready_when_session_live() {
        let creds = ScriptedCredentials::new(Some(Utc::now() + Duration::hours(1)), true);
        assert_eq!(creds.ensure_ready().await, CredentialReadiness::Ready);
        assert_eq!(creds.force_calls.load(Ordering::SeqCst), 0);
        assert_eq!(creds.ensure_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_forces_full_refresh_when_never_populated() {
        let creds = ScriptedCredentials::new(None, true);
        assert_eq!(creds.ensure_ready().await, CredentialReadiness::Refreshed);
        assert_eq!(creds.force_calls.load(Ordering::SeqCst), 1);
        assert_eq!(creds.ensure_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_light_refresh_when_expired() {
        let creds = ScriptedCredentials::new(Some(Utc::now() - Duration::hours(1)), true);
        assert_eq!(creds.ensure_ready().await, CredentialReadiness::Refreshed);
        assert_eq!(creds.force_calls.load(Ordering::SeqCst), 0);
        assert_eq!(creds.ensure_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_is_reported_not_swallowed() {
        let creds = ScriptedCredentials::new(None, false);
        assert_eq!(creds.ensure_ready().await, CredentialReadiness::Failed);
    }

    #[tokio::test]
    async fn test_http_manager_requires_configuration() {
        let manager =
            HttpCredentialManager::new(String::new(), String::new(), String::new()).unwrap();
        match manager.force_refresh().await {
            Err(CredentialError::Missing(key)) => assert_eq!(key, "upstream.token_url"),
            other => panic!("Expected Missing error, got {:?}", other.err()),
        }
        assert_eq!(manager.bearer_token().await, None);
    }

    #[test]
    fn test_session_token_expiry() {
        let now = Utc::now();
        let live = SessionToken {
            access_token: "t".to_string(),
            expires_at: now + Duration::minutes(5),
        };
        let dead = SessionToken {
            access_token: "t".to_string(),
            expires_at: now - Duration::minutes(5),
        };
        assert!(!live.is_expired(now));
        assert!(dead.is_expired(now));
    }
}
