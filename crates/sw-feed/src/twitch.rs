//! Twitch Helix-backed [`StreamSource`].
//!
//! Authenticates with an app access token (client-credentials grant), cached
//! until it expires or the API answers 401. Client credentials are passed in
//! by the caller and never logged.

use std::fmt;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{FeedError, RawStream, StreamSource};

/// Helix page size ceiling.
const PAGE_SIZE: &str = "100";
/// Hard stop for runaway pagination.
const MAX_PAGES: usize = 50;
const THUMBNAIL_SIZE: &str = "440x248";
/// Renew this long before the upstream expiry.
const TOKEN_SLACK: Duration = Duration::from_secs(60);

struct CachedToken {
    value: String,
    expires_at: Instant,
}

pub struct TwitchSource {
    client_id: String,
    client_secret: String,
    http: reqwest::Client,
    api_base: String,
    auth_base: String,
    game_ids: Vec<String>,
    token: Mutex<Option<CachedToken>>,
}

impl fmt::Debug for TwitchSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TwitchSource")
            .field("client_id", &"<redacted>")
            .field("client_secret", &"<redacted>")
            .field("api_base", &self.api_base)
            .field("auth_base", &self.auth_base)
            .field("game_ids", &self.game_ids)
            .finish()
    }
}

/// Lookup key for [`TwitchSource::games`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameQuery {
    Id(String),
    Name(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    pub id: String,
    pub name: String,
}

impl TwitchSource {
    pub fn new(client_id: String, client_secret: String, game_ids: Vec<String>) -> Self {
        Self::new_with_base_urls(
            client_id,
            client_secret,
            game_ids,
            "https://api.twitch.tv/helix".to_string(),
            "https://id.twitch.tv/oauth2".to_string(),
        )
    }

    pub fn new_with_base_urls(
        client_id: String,
        client_secret: String,
        game_ids: Vec<String>,
        api_base: String,
        auth_base: String,
    ) -> Self {
        Self {
            client_id,
            client_secret,
            http: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            auth_base: auth_base.trim_end_matches('/').to_string(),
            game_ids,
            token: Mutex::new(None),
        }
    }

    async fn access_token(&self) -> Result<String, FeedError> {
        let mut slot = self.token.lock().await;
        if let Some(t) = slot.as_ref() {
            if Instant::now() < t.expires_at {
                return Ok(t.value.clone());
            }
        }

        let resp = self
            .http
            .post(format!("{}/token", self.auth_base))
            .query(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await
            .map_err(|e| FeedError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FeedError::Auth(format!(
                "token request refused status={}",
                status.as_u16()
            )));
        }
        let body: TokenResponse = resp
            .json()
            .await
            .map_err(|e| FeedError::Decode(format!("token response: {e}")))?;

        let lifetime = Duration::from_secs(body.expires_in).saturating_sub(TOKEN_SLACK);
        info!(expires_in = body.expires_in, "twitch app token issued");
        *slot = Some(CachedToken {
            value: body.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });
        Ok(body.access_token)
    }

    async fn invalidate_token(&self) {
        *self.token.lock().await = None;
    }

    /// Authenticated GET. A 401 drops the cached token and retries once with
    /// a fresh one.
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, FeedError> {
        let url = format!("{}/{}", self.api_base, path);
        let mut retried = false;
        loop {
            let token = self.access_token().await?;
            let resp = self
                .http
                .get(&url)
                .header("Client-Id", &self.client_id)
                .bearer_auth(&token)
                .query(query)
                .send()
                .await
                .map_err(|e| FeedError::Transport(e.to_string()))?;

            let status = resp.status();
            if status == reqwest::StatusCode::UNAUTHORIZED {
                self.invalidate_token().await;
                if retried {
                    return Err(FeedError::Auth("token rejected twice".to_string()));
                }
                warn!("twitch token rejected; renewing");
                retried = true;
                continue;
            }
            if !status.is_success() {
                let message = resp
                    .json::<ErrorResponse>()
                    .await
                    .map(|e| e.message)
                    .unwrap_or_else(|_| {
                        status.canonical_reason().unwrap_or("unknown").to_string()
                    });
                return Err(FeedError::Api {
                    status: status.as_u16(),
                    message,
                });
            }
            return resp
                .json()
                .await
                .map_err(|e| FeedError::Decode(format!("{path} response: {e}")));
        }
    }

    /// Resolve category ids or names.
    pub async fn games(&self, query: &GameQuery) -> Result<Vec<Game>, FeedError> {
        let (key, value) = match query {
            GameQuery::Id(id) => ("id", id.as_str()),
            GameQuery::Name(name) => ("name", name.as_str()),
        };
        let page: Page<Game> = self.get_json("games", &[(key, value)]).await?;
        Ok(page.data)
    }
}

#[async_trait::async_trait]
impl StreamSource for TwitchSource {
    fn name(&self) -> &'static str {
        "twitch"
    }

    async fn fetch(&self) -> Result<Vec<RawStream>, FeedError> {
        let mut out = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_PAGES {
            let page: Page<WireStream> = {
                let mut query: Vec<(&str, &str)> =
                    self.game_ids.iter().map(|g| ("game_id", g.as_str())).collect();
                query.push(("first", PAGE_SIZE));
                if let Some(c) = cursor.as_deref() {
                    query.push(("after", c));
                }
                self.get_json("streams", &query).await?
            };
            let got = page.data.len();
            out.extend(page.data.into_iter().map(WireStream::into_raw));

            cursor = page.pagination.and_then(|p| p.cursor).filter(|c| !c.is_empty());
            if got == 0 || cursor.is_none() {
                debug!(streams = out.len(), "twitch fetch complete");
                return Ok(out);
            }
        }

        warn!(streams = out.len(), "twitch pagination cut short");
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Wire shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    message: String,
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    data: Vec<T>,
    #[serde(default)]
    pagination: Option<Pagination>,
}

#[derive(Debug, Deserialize)]
struct Pagination {
    #[serde(default)]
    cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireStream {
    user_name: String,
    #[serde(default)]
    user_login: String,
    #[serde(default)]
    game_id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    viewer_count: u64,
    started_at: DateTime<Utc>,
    #[serde(default)]
    thumbnail_url: String,
    #[serde(default)]
    tags: Option<Vec<String>>,
}

impl WireStream {
    fn into_raw(self) -> RawStream {
        let user_login = if self.user_login.is_empty() {
            login_from_thumbnail(&self.thumbnail_url).unwrap_or_default()
        } else {
            self.user_login
        };
        let thumbnail_url = Some(sized_thumbnail(&self.thumbnail_url)).filter(|t| !t.is_empty());
        RawStream {
            user_name: self.user_name,
            user_login,
            title: self.title,
            started_at: self.started_at,
            thumbnail_url,
            viewer_count: self.viewer_count,
            tags: self.tags.unwrap_or_default(),
            game_id: self.game_id,
        }
    }
}

fn sized_thumbnail(template: &str) -> String {
    template.replace("{width}x{height}", THUMBNAIL_SIZE)
}

/// `.../live_user_<login>-{width}x{height}.jpg` => `<login>`.
fn login_from_thumbnail(url: &str) -> Option<String> {
    let file = url.rsplit('/').next()?;
    let rest = file.strip_prefix("live_user_")?;
    let (login, _) = rest.rsplit_once('-')?;
    Some(login.to_string()).filter(|l| !l.is_empty())
}
