use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::json;
use std::env;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

use crate::models::{ContentType, FavoriteRecord};

/// Store failures the caller may need to branch on. A duplicate insert is
/// the one rejection the UI treats differently from a transport error.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("favorite already exists for this user and content")]
    Duplicate,
    #[error("store request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("store rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
}

/// An authenticated session with the managed provider.
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: String,
    pub email: String,
    pub access_token: String,
}

/// Emitted on the auth feed whenever the session changes. The application
/// controller treats this feed as the single source of truth for session
/// state.
#[derive(Debug, Clone)]
pub enum AuthEvent {
    SignedIn(Session),
    SignedOut,
}

/// Row-level CRUD on the favorites table, scoped to the authenticated user.
#[async_trait]
pub trait FavoritesApi: Send + Sync {
    async fn list_favorites(&self, user_id: &str) -> Result<Vec<FavoriteRecord>, StoreError>;
    async fn add_favorite(
        &self,
        user_id: &str,
        content_id: i32,
        content_type: ContentType,
    ) -> Result<FavoriteRecord, StoreError>;
    async fn remove_favorite(&self, record_id: &str) -> Result<(), StoreError>;
}

/// Email/password auth against the managed provider. Successful calls also
/// emit on the auth feed handed out at construction.
#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str) -> Result<Session, StoreError>;
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, StoreError>;
    async fn sign_out(&self) -> Result<(), StoreError>;
}

pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
    // Bearer for row-level-security'd table access; the anon key until a
    // user signs in.
    access_token: RwLock<Option<String>>,
    events: mpsc::UnboundedSender<AuthEvent>,
}

impl SupabaseClient {
    pub fn new(
        base_url: String,
        anon_key: String,
    ) -> Result<(Self, mpsc::UnboundedReceiver<AuthEvent>)> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "apikey",
            HeaderValue::from_str(&anon_key).context("anon key is not a valid header value")?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .context("building HTTP client failed")?;
        let (tx, rx) = mpsc::unbounded_channel();
        let store = Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key,
            access_token: RwLock::new(None),
            events: tx,
        };
        Ok((store, rx))
    }

    pub fn from_env() -> Result<(Self, mpsc::UnboundedReceiver<AuthEvent>)> {
        let base_url = env::var("SUPABASE_URL").context("SUPABASE_URL not set")?;
        let anon_key = env::var("SUPABASE_ANON_KEY").context("SUPABASE_ANON_KEY not set")?;
        Self::new(base_url, anon_key)
    }

    fn bearer(&self) -> String {
        self.access_token
            .read()
            .clone()
            .unwrap_or_else(|| self.anon_key.clone())
    }

    fn emit(&self, event: AuthEvent) {
        if self.events.send(event).is_err() {
            debug!("auth event feed closed; dropping event");
        }
    }

    fn apply_session(&self, body: AuthSession) -> Session {
        let session = Session {
            user_id: body.user.id,
            email: body.user.email,
            access_token: body.access_token,
        };
        *self.access_token.write() = Some(session.access_token.clone());
        self.emit(AuthEvent::SignedIn(session.clone()));
        session
    }
}

#[async_trait]
impl FavoritesApi for SupabaseClient {
    async fn list_favorites(&self, user_id: &str) -> Result<Vec<FavoriteRecord>, StoreError> {
        let url = format!(
            "{}/rest/v1/favorites?select=*&user_id=eq.{}&order=created_at.desc",
            self.base_url,
            urlencoding::encode(user_id)
        );
        let res = self.client.get(&url).bearer_auth(self.bearer()).send().await?;
        if !res.status().is_success() {
            return Err(rejection(res).await);
        }
        Ok(res.json().await?)
    }

    async fn add_favorite(
        &self,
        user_id: &str,
        content_id: i32,
        content_type: ContentType,
    ) -> Result<FavoriteRecord, StoreError> {
        let url = format!("{}/rest/v1/favorites", self.base_url);
        let payload = json!({
            "user_id": user_id,
            "content_id": content_id,
            "content_type": content_type.as_path(),
        });
        let res = self
            .client
            .post(&url)
            .bearer_auth(self.bearer())
            .header("Prefer", "return=representation")
            .json(&payload)
            .send()
            .await?;
        let status = res.status();
        if !status.is_success() {
            return Err(rejection(res).await);
        }
        let mut rows: Vec<FavoriteRecord> = res.json().await?;
        rows.pop().ok_or_else(|| StoreError::Rejected {
            status: status.as_u16(),
            message: "insert returned no representation".to_string(),
        })
    }

    async fn remove_favorite(&self, record_id: &str) -> Result<(), StoreError> {
        let url = format!(
            "{}/rest/v1/favorites?id=eq.{}",
            self.base_url,
            urlencoding::encode(record_id)
        );
        let res = self
            .client
            .delete(&url)
            .bearer_auth(self.bearer())
            .send()
            .await?;
        if !res.status().is_success() {
            return Err(rejection(res).await);
        }
        Ok(())
    }
}

#[async_trait]
impl AuthApi for SupabaseClient {
    async fn sign_up(&self, email: &str, password: &str) -> Result<Session, StoreError> {
        let url = format!("{}/auth/v1/signup", self.base_url);
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.anon_key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;
        if !res.status().is_success() {
            return Err(rejection(res).await);
        }
        let body: AuthSession = res.json().await?;
        Ok(self.apply_session(body))
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, StoreError> {
        let url = format!("{}/auth/v1/token?grant_type=password", self.base_url);
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.anon_key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;
        if !res.status().is_success() {
            return Err(rejection(res).await);
        }
        let body: AuthSession = res.json().await?;
        Ok(self.apply_session(body))
    }

    async fn sign_out(&self) -> Result<(), StoreError> {
        let token = self.access_token.read().clone();
        if let Some(token) = token {
            let url = format!("{}/auth/v1/logout", self.base_url);
            let res = self.client.post(&url).bearer_auth(&token).send().await?;
            // An expired token still signs out locally.
            if !res.status().is_success() && res.status().as_u16() != 401 {
                return Err(rejection(res).await);
            }
        }
        *self.access_token.write() = None;
        self.emit(AuthEvent::SignedOut);
        Ok(())
    }
}

/// Map a non-2xx response to a store error. PostgREST reports a unique
/// constraint violation as 409 with Postgres code 23505 in the body.
async fn rejection(res: Response) -> StoreError {
    let status = res.status().as_u16();
    let message = res.text().await.unwrap_or_default();
    if status == 409 || message.contains("23505") {
        StoreError::Duplicate
    } else {
        StoreError::Rejected { status, message }
    }
}

#[derive(Debug, Deserialize)]
struct AuthSession {
    access_token: String,
    user: AuthUser,
}

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: String,
    #[serde(default)]
    email: String,
}
