//! services/client/src/adapters/session.rs
//!
//! Session providers, the concrete implementations of the `SessionProvider` port.
//!
//! `SupabaseSession` wraps the auth project's GoTrue REST API: it signs in,
//! keeps the session cached, refreshes it shortly before expiry and publishes
//! session-change events. `StaticSession` serves a pre-issued token and never
//! refreshes. Neither ever fabricates a token: when the provider cannot be
//! reached, the answer is `Unauthenticated`.

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::Deserialize;
use serde_json::json;
use study_buddy_core::domain::{AccessToken, Session, SessionEvent, User};
use study_buddy_core::ports::{PortError, PortResult, SessionProvider};
use tokio::sync::{watch, RwLock};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::ClientError;

//=========================================================================================
// Provider Wire Types
//=========================================================================================

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: UserResponse,
}

#[derive(Deserialize)]
struct UserResponse {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Deserialize)]
struct ProviderError {
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl TokenResponse {
    fn into_session(self, now: DateTime<Utc>) -> Session {
        let expires_at = self
            .expires_at
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .unwrap_or_else(|| now + Duration::seconds(self.expires_in.unwrap_or(0)));
        Session {
            access_token: AccessToken::new(self.access_token),
            refresh_token: self.refresh_token,
            expires_at,
            user: User {
                id: self.user.id,
                email: self.user.email,
            },
        }
    }
}

/// True when the cached session is the one that issued `token`.
fn holds(cached: &Option<Session>, token: &AccessToken) -> bool {
    cached.as_ref().is_some_and(|s| &s.access_token == token)
}

//=========================================================================================
// Supabase (GoTrue) Session Provider
//=========================================================================================

pub struct SupabaseSession {
    http: reqwest::Client,
    auth_url: String,
    anon_key: String,
    leeway: Duration,
    cached: RwLock<Option<Session>>,
    events: watch::Sender<SessionEvent>,
}

impl SupabaseSession {
    pub fn new(config: &Config) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self::with_client(
            http,
            &config.supabase_url,
            &config.supabase_anon_key,
            config.session_leeway,
        ))
    }

    pub fn with_client(
        http: reqwest::Client,
        project_url: &str,
        anon_key: &str,
        leeway: Duration,
    ) -> Self {
        let (events, _) = watch::channel(SessionEvent::Initial);
        Self {
            http,
            auth_url: format!("{}/auth/v1", project_url.trim_end_matches('/')),
            anon_key: anon_key.to_string(),
            leeway,
            cached: RwLock::new(None),
            events,
        }
    }

    /// Signs in with email and password and caches the resulting session.
    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> PortResult<User> {
        let body = json!({ "email": email, "password": password });
        let session = self.request_token("password", &body).await?;
        let user = session.user.clone();
        *self.cached.write().await = Some(session);
        info!(user_id = %user.id, "Signed in");
        self.events.send_replace(SessionEvent::SignedIn(user.clone()));
        Ok(user)
    }

    /// Restores a session from a refresh token kept by the caller.
    pub async fn sign_in_with_refresh_token(&self, refresh_token: &str) -> PortResult<User> {
        let body = json!({ "refresh_token": refresh_token });
        let session = self.request_token("refresh_token", &body).await?;
        let user = session.user.clone();
        *self.cached.write().await = Some(session);
        self.events.send_replace(SessionEvent::SignedIn(user.clone()));
        Ok(user)
    }

    /// Ends the session. The local cache is cleared even when the provider
    /// cannot be told about it.
    pub async fn sign_out(&self) {
        let previous = self.cached.write().await.take();
        if let Some(session) = previous {
            let result = self
                .http
                .post(format!("{}/logout", self.auth_url))
                .header("apikey", &self.anon_key)
                .bearer_auth(session.access_token.as_str())
                .send()
                .await;
            if let Err(e) = result {
                warn!("Provider sign-out failed; cleared local session anyway: {}", e);
            }
        }
        self.events.send_replace(SessionEvent::SignedOut);
    }

    async fn request_token(&self, grant_type: &str, body: &serde_json::Value) -> PortResult<Session> {
        let response = self
            .http
            .post(format!("{}/token", self.auth_url))
            .query(&[("grant_type", grant_type)])
            .header("apikey", &self.anon_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                warn!("Auth provider unreachable: {}", e);
                PortError::ServiceUnavailable(format!("auth provider unreachable: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ProviderError>(&text)
                .ok()
                .and_then(|e| e.error_description.or(e.msg).or(e.error))
                .unwrap_or_else(|| status.to_string());
            debug!(status = status.as_u16(), "Auth provider rejected {} grant", grant_type);
            return Err(if status.is_server_error() {
                PortError::ServiceUnavailable(message)
            } else {
                PortError::InvalidRequest {
                    status: status.as_u16(),
                    message,
                }
            });
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            PortError::ServiceUnavailable(format!("malformed auth provider response: {}", e))
        })?;
        Ok(token.into_session(Utc::now()))
    }

    fn expire(&self, cached: &mut Option<Session>) {
        if cached.take().is_some() {
            self.events.send_replace(SessionEvent::Expired);
        }
    }
}

#[async_trait]
impl SessionProvider for SupabaseSession {
    async fn current_session(&self) -> PortResult<Session> {
        {
            let cached = self.cached.read().await;
            match cached.as_ref() {
                None => return Err(PortError::Unauthenticated),
                Some(s) if !s.is_expired(Utc::now(), self.leeway) => return Ok(s.clone()),
                Some(_) => {}
            }
        }

        // The write lock serializes refreshes: concurrent callers wait for one
        // refresh instead of each spending the single-use refresh token.
        let mut cached = self.cached.write().await;
        let refresh_token = match cached.as_ref() {
            None => return Err(PortError::Unauthenticated),
            Some(s) if !s.is_expired(Utc::now(), self.leeway) => return Ok(s.clone()),
            Some(s) => s.refresh_token.clone(),
        };
        let Some(refresh_token) = refresh_token else {
            self.expire(&mut cached);
            return Err(PortError::Unauthenticated);
        };

        let body = json!({ "refresh_token": refresh_token });
        match self.request_token("refresh_token", &body).await {
            Ok(session) => {
                debug!(user_id = %session.user.id, "Session refreshed");
                *cached = Some(session.clone());
                self.events
                    .send_replace(SessionEvent::TokenRefreshed(session.user.clone()));
                Ok(session)
            }
            Err(e) => {
                warn!("Session refresh failed, signing out: {}", e);
                self.expire(&mut cached);
                Err(PortError::Unauthenticated)
            }
        }
    }

    async fn invalidate(&self, rejected: &AccessToken) {
        let mut cached = self.cached.write().await;
        if holds(&cached, rejected) {
            self.expire(&mut cached);
        } else {
            debug!("Ignoring rejection of a token the session no longer uses");
        }
    }

    fn subscribe(&self) -> watch::Receiver<SessionEvent> {
        self.events.subscribe()
    }
}

//=========================================================================================
// Static Token Session Provider
//=========================================================================================

#[derive(Deserialize)]
struct Claims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
    exp: i64,
}

/// Serves one pre-issued access token until it expires or is rejected.
pub struct StaticSession {
    leeway: Duration,
    cached: RwLock<Option<Session>>,
    events: watch::Sender<SessionEvent>,
}

impl StaticSession {
    pub fn new(session: Session, leeway: Duration) -> Self {
        let (events, _) = watch::channel(SessionEvent::SignedIn(session.user.clone()));
        Self {
            leeway,
            cached: RwLock::new(Some(session)),
            events,
        }
    }

    /// Reads the user and expiry from the token's JWT claims.
    pub fn from_jwt(token: &str, leeway: Duration) -> PortResult<Self> {
        let claims = decode_claims(token).ok_or(PortError::Unauthenticated)?;
        let expires_at = Utc
            .timestamp_opt(claims.exp, 0)
            .single()
            .ok_or(PortError::Unauthenticated)?;
        Ok(Self::new(
            Session {
                access_token: AccessToken::new(token.trim()),
                refresh_token: None,
                expires_at,
                user: User {
                    id: claims.sub,
                    email: claims.email,
                },
            },
            leeway,
        ))
    }
}

fn decode_claims(token: &str) -> Option<Claims> {
    let payload = token.trim().split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    serde_json::from_slice(&bytes).ok()
}

#[async_trait]
impl SessionProvider for StaticSession {
    async fn current_session(&self) -> PortResult<Session> {
        let mut cached = self.cached.write().await;
        match cached.as_ref() {
            Some(s) if !s.is_expired(Utc::now(), self.leeway) => Ok(s.clone()),
            Some(_) => {
                cached.take();
                self.events.send_replace(SessionEvent::Expired);
                Err(PortError::Unauthenticated)
            }
            None => Err(PortError::Unauthenticated),
        }
    }

    async fn invalidate(&self, rejected: &AccessToken) {
        let mut cached = self.cached.write().await;
        if holds(&cached, rejected) {
            cached.take();
            self.events.send_replace(SessionEvent::Expired);
        }
    }

    fn subscribe(&self) -> watch::Receiver<SessionEvent> {
        self.events.subscribe()
    }
}
