//! Discord REST-backed [`ItemStore`].
//!
//! Items are channel messages carrying at most one embed. The bot token is
//! passed in by the caller and never logged.

use std::fmt;

use serde::{Deserialize, Serialize};
use sw_schemas::{Card, OutgoingItem, Position, StoredItem};

use crate::{ItemStore, StoreError};

/// Discord refuses larger pages.
pub const MAX_PAGE: usize = 100;

#[derive(Clone)]
pub struct DiscordStore {
    token: String,
    http: reqwest::Client,
    base_url: String,
}

impl fmt::Debug for DiscordStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiscordStore")
            .field("token", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl DiscordStore {
    pub fn new(token: String) -> Self {
        Self::new_with_base_url(token, "https://discord.com/api/v10".to_string())
    }

    pub fn new_with_base_url(token: String, base_url: String) -> Self {
        Self {
            token,
            http: reqwest::Client::new(),
            base_url,
        }
    }

    fn messages_url(&self, channel: &str) -> String {
        format!(
            "{}/channels/{}/messages",
            self.base_url.trim_end_matches('/'),
            channel
        )
    }

    fn auth(&self) -> String {
        format!("Bot {}", self.token)
    }

    async fn check(
        resp: reqwest::Response,
        what: impl FnOnce() -> String,
    ) -> Result<reqwest::Response, StoreError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound { what: what() });
        }
        let message = resp
            .json::<WireError>()
            .await
            .map(|e| e.message)
            .unwrap_or_else(|_| status.canonical_reason().unwrap_or("unknown").to_string());
        Err(StoreError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

fn transport(e: reqwest::Error) -> StoreError {
    StoreError::Transport(e.to_string())
}

#[async_trait::async_trait]
impl ItemStore for DiscordStore {
    fn name(&self) -> &'static str {
        "discord"
    }

    async fn create(&self, channel: &str, item: &OutgoingItem) -> Result<Position, StoreError> {
        let resp = self
            .http
            .post(self.messages_url(channel))
            .header(reqwest::header::AUTHORIZATION, self.auth())
            .json(&WireMessageBody::from(item))
            .send()
            .await
            .map_err(transport)?;
        let resp = Self::check(resp, || format!("channel {channel}")).await?;
        let msg: WireMessage = resp
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        let position = msg.position()?;
        tracing::debug!(channel, %position, "discord message created");
        Ok(position)
    }

    async fn edit(
        &self,
        channel: &str,
        position: Position,
        item: &OutgoingItem,
    ) -> Result<(), StoreError> {
        let url = format!("{}/{}", self.messages_url(channel), position);
        let resp = self
            .http
            .patch(url)
            .header(reqwest::header::AUTHORIZATION, self.auth())
            .json(&WireMessageBody::from(item))
            .send()
            .await
            .map_err(transport)?;
        Self::check(resp, || format!("message {position} in channel {channel}")).await?;
        Ok(())
    }

    async fn list_recent(
        &self,
        channel: &str,
        limit: usize,
    ) -> Result<Vec<StoredItem>, StoreError> {
        let limit = limit.clamp(1, MAX_PAGE).to_string();
        let resp = self
            .http
            .get(self.messages_url(channel))
            .header(reqwest::header::AUTHORIZATION, self.auth())
            .query(&[("limit", limit.as_str())])
            .send()
            .await
            .map_err(transport)?;
        let resp = Self::check(resp, || format!("channel {channel}")).await?;
        let msgs: Vec<WireMessage> = resp
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        msgs.into_iter().map(WireMessage::into_stored).collect()
    }
}

// ---------------------------------------------------------------------------
// Wire shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct WireMessageBody {
    /// Empty content clears text left by an earlier call.
    content: String,
    embeds: Vec<WireEmbed>,
}

impl From<&OutgoingItem> for WireMessageBody {
    fn from(item: &OutgoingItem) -> Self {
        Self {
            content: item.text.clone().unwrap_or_default(),
            embeds: item.card.iter().map(WireEmbed::from).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    id: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    embeds: Vec<WireEmbed>,
}

impl WireMessage {
    fn position(&self) -> Result<Position, StoreError> {
        self.id
            .parse()
            .map_err(|e| StoreError::Decode(format!("message id {:?}: {e}", self.id)))
    }

    fn into_stored(self) -> Result<StoredItem, StoreError> {
        Ok(StoredItem {
            position: self.position()?,
            text: self.content,
            cards: self.embeds.into_iter().map(Card::from).collect(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct WireError {
    message: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct WireEmbed {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    author: Option<WireAuthor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    color: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    thumbnail: Option<WireUrl>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    footer: Option<WireFooter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timestamp: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct WireAuthor {
    #[serde(default)]
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    icon_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireUrl {
    url: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFooter {
    text: String,
}

impl From<&Card> for WireEmbed {
    fn from(card: &Card) -> Self {
        Self {
            author: Some(WireAuthor {
                name: card.author_name.clone(),
                url: Some(card.author_url.clone()),
                icon_url: Some(card.icon_url.clone()),
            }),
            description: Some(card.description.clone()),
            color: Some(card.colour),
            thumbnail: card.thumbnail.clone().map(|url| WireUrl { url }),
            footer: card.footer.clone().map(|text| WireFooter { text }),
            timestamp: Some(card.timestamp.clone()),
        }
    }
}

impl From<WireEmbed> for Card {
    /// Missing fields become empty; decoding the stream is the caller's job.
    fn from(e: WireEmbed) -> Self {
        let author = e.author.unwrap_or_default();
        Card {
            author_name: author.name,
            author_url: author.url.unwrap_or_default(),
            icon_url: author.icon_url.unwrap_or_default(),
            description: e.description.unwrap_or_default(),
            colour: e.color.unwrap_or(0),
            thumbnail: e.thumbnail.map(|t| t.url),
            footer: e.footer.map(|f| f.text),
            timestamp: e.timestamp.unwrap_or_default(),
        }
    }
}
