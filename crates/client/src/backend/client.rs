//! HTTP client for the hosted backend.
//!
//! Provides sign-in, session refresh and role lookups, and publishes auth
//! events for every session change it makes.

use std::sync::Arc;

use async_trait::async_trait;
use clubhub_core::{AuthEvent, Email, UserId};
use reqwest::{Method, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::{Mutex, RwLock};
use tracing::{info, instrument, warn};
use url::Url;

use super::auth::{self, AuthToken};
use super::events::{AuthEventBus, AuthSubscription};
use super::profiles::{self, RoleLookup};
use super::{AuthBackend, BackendError, Session};
use crate::config::BackendConfig;

/// Base URL, public API key and HTTP client shared by every request.
pub(crate) struct Gateway {
    http: reqwest::Client,
    base_url: Url,
    api_key: SecretString,
}

impl Gateway {
    pub(crate) fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: config.url.clone(),
            api_key: config.anon_key.clone(),
        })
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, BackendError> {
        let url = self.base_url.join(path)?;
        Ok(self
            .http
            .request(method, url)
            .header("apikey", self.api_key.expose_secret()))
    }

    pub(crate) fn get(&self, path: &str) -> Result<RequestBuilder, BackendError> {
        self.request(Method::GET, path)
    }

    pub(crate) fn post(&self, path: &str) -> Result<RequestBuilder, BackendError> {
        self.request(Method::POST, path)
    }
}

/// Hosted backend client.
///
/// # Authentication
///
/// Tokens obtained from email/password sign-in are cached in memory and
/// refreshed automatically when they expire. Every change to the cached
/// session is published to [`AuthSubscription`]s.
#[derive(Clone)]
pub struct BackendClient {
    inner: Arc<BackendClientInner>,
}

struct BackendClientInner {
    gateway: Gateway,
    /// In-memory token cache
    token: RwLock<Option<AuthToken>>,
    /// Serialises refresh-token exchanges
    refresh_lock: Mutex<()>,
    events: AuthEventBus,
}

impl std::fmt::Debug for BackendClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendClient")
            .field("base_url", &self.inner.gateway.base_url.as_str())
            .field("api_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl BackendClient {
    /// Create a client without a session.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Http` if the HTTP client cannot be built.
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        Ok(Self {
            inner: Arc::new(BackendClientInner {
                gateway: Gateway::new(config)?,
                token: RwLock::new(None),
                refresh_lock: Mutex::new(()),
                events: AuthEventBus::new(),
            }),
        })
    }

    // =========================================================================
    // Session lifecycle
    // =========================================================================

    /// Announce the restored session (if any) to subscribers.
    ///
    /// Call once after subscribers are attached at startup.
    pub async fn initialize(&self) {
        let user_id = self
            .inner
            .token
            .read()
            .await
            .as_ref()
            .map(|t| t.user_id.clone());
        self.inner.events.publish(AuthEvent::initial_session(user_id));
    }

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::AuthenticationFailed` if credentials are invalid.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn sign_in_with_password(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<Session, BackendError> {
        let token = auth::sign_in_with_password(&self.inner.gateway, email, password).await?;
        let user_id = token.user_id.clone();

        *self.inner.token.write().await = Some(token);
        info!(user_id = %user_id, "Signed in");
        self.inner
            .events
            .publish(AuthEvent::signed_in(user_id.clone()));

        Ok(Session { user_id })
    }

    /// Force a refresh-token exchange.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::NoSession` if no token is cached, or
    /// `BackendError::InvalidRefreshToken` if the refresh token is rejected.
    #[instrument(skip(self))]
    pub async fn refresh_session(&self) -> Result<Session, BackendError> {
        let _guard = self.inner.refresh_lock.lock().await;
        let token = self
            .inner
            .token
            .read()
            .await
            .clone()
            .ok_or(BackendError::NoSession)?;
        let token = self.exchange_refresh_token(&token).await?;
        Ok(Session {
            user_id: token.user_id,
        })
    }

    /// Revoke the session on the backend, then clear it locally.
    ///
    /// Local state is cleared even if the revoke request fails.
    ///
    /// # Errors
    ///
    /// Returns the revoke failure after the local session was cleared.
    #[instrument(skip(self))]
    pub async fn sign_out(&self) -> Result<(), BackendError> {
        let token = self.inner.token.write().await.take();
        let result = match token {
            Some(token) => auth::logout(&self.inner.gateway, &token.access_token).await,
            None => Ok(()),
        };
        self.inner.events.publish(AuthEvent::signed_out());
        result
    }

    // =========================================================================
    // Tokens
    // =========================================================================

    /// Return a usable token, refreshing it first if it has expired.
    async fn valid_token(&self) -> Result<Option<AuthToken>, BackendError> {
        let Some(token) = self.inner.token.read().await.clone() else {
            return Ok(None);
        };
        if !token.is_expired() {
            return Ok(Some(token));
        }

        let _guard = self.inner.refresh_lock.lock().await;
        // Another task may have refreshed while we waited.
        let Some(token) = self.inner.token.read().await.clone() else {
            return Ok(None);
        };
        if !token.is_expired() {
            return Ok(Some(token));
        }

        self.exchange_refresh_token(&token).await.map(Some)
    }

    /// Caller must hold `refresh_lock`.
    async fn exchange_refresh_token(&self, token: &AuthToken) -> Result<AuthToken, BackendError> {
        match auth::refresh_access_token(&self.inner.gateway, &token.refresh_token).await {
            Ok(fresh) => {
                *self.inner.token.write().await = Some(fresh.clone());
                self.inner
                    .events
                    .publish(AuthEvent::token_refreshed(fresh.user_id.clone()));
                Ok(fresh)
            }
            Err(e) => {
                if e.is_invalid_refresh_token() {
                    warn!(user_id = %token.user_id, "Refresh token rejected");
                }
                Err(e)
            }
        }
    }
}

#[async_trait]
impl AuthBackend for BackendClient {
    async fn current_session(&self) -> Result<Option<Session>, BackendError> {
        Ok(self.valid_token().await?.map(|token| Session {
            user_id: token.user_id,
        }))
    }

    fn subscribe(&self) -> AuthSubscription {
        self.inner.events.subscribe()
    }

    async fn lookup_role(&self, user_id: &UserId) -> Result<RoleLookup, BackendError> {
        let token = self.valid_token().await?.ok_or(BackendError::NoSession)?;
        profiles::lookup_role(&self.inner.gateway, &token.access_token, user_id).await
    }

    async fn sign_out_local(&self) {
        *self.inner.token.write().await = None;
        self.inner.events.publish(AuthEvent::signed_out());
    }
}
