//! Discord REST adapter for [`Destination`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use url::form_urlencoded;

use super::destination::{
    ContainerHandle, ContainerKind, ContainerSpec, ConversationHandle, Destination,
    DestinationError,
};
use crate::constants::DISCORD_USER_AGENT;

const CHANNEL_TEXT: u8 = 0;
const CHANNEL_CATEGORY: u8 = 4;
const CHANNEL_FORUM: u8 = 15;

#[derive(Debug, Deserialize)]
struct Channel {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(rename = "type")]
    kind: u8,
}

#[derive(Debug, Deserialize)]
struct ThreadList {
    threads: Vec<ThreadChannel>,
    #[serde(default)]
    has_more: bool,
}

#[derive(Debug, Deserialize)]
struct ThreadChannel {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    parent_id: Option<String>,
    #[serde(default)]
    thread_metadata: Option<ThreadMetadata>,
}

#[derive(Debug, Deserialize)]
struct ThreadMetadata {
    #[serde(default)]
    archive_timestamp: Option<String>,
}

/// Thread titles to thread ids, per parent channel.
type ThreadIndex = HashMap<String, HashMap<String, String>>;

#[derive(Debug, Deserialize)]
struct Message {
    id: String,
}

#[derive(Debug, Deserialize)]
struct Guild {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
    #[serde(default)]
    retry_after: Option<f64>,
}

/// Bot client bound to one guild.
#[derive(Debug, Clone)]
pub struct DiscordClient {
    http: Client,
    api_url: String,
    token: String,
    guild_id: String,
    known_threads: Arc<Mutex<ThreadIndex>>,
}

impl DiscordClient {
    /// Create a client for a known guild.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(api_url: &str, token: &str, guild_id: &str) -> Result<Self> {
        let http = Client::builder()
            .user_agent(DISCORD_USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            guild_id: guild_id.to_string(),
            known_threads: Arc::default(),
        })
    }

    /// Create a client, picking the bot's first guild when none is given.
    ///
    /// # Errors
    ///
    /// Returns an error if the guild list cannot be read or is empty.
    pub async fn connect(api_url: &str, token: &str, guild_id: Option<&str>) -> Result<Self> {
        if let Some(guild_id) = guild_id {
            return Self::new(api_url, token, guild_id);
        }

        let mut client = Self::new(api_url, token, "")?;
        let guilds: Vec<Guild> = client
            .request(Method::GET, "/users/@me/guilds", None)
            .await
            .context("Failed to list bot guilds")?;
        let guild = guilds
            .into_iter()
            .next()
            .context("The bot is not a member of any guild")?;

        info!(guild = %guild.name, id = %guild.id, "Using first guild of the bot");
        client.guild_id = guild.id;
        Ok(client)
    }

    #[must_use]
    pub fn guild_id(&self) -> &str {
        &self.guild_id
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<T, DestinationError> {
        self.execute(method, path, body)
            .await?
            .json()
            .await
            .map_err(|e| DestinationError::Transient(format!("unreadable response: {e}")))
    }

    /// Send a request, waiting out one rate-limit response before giving up.
    async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Response, DestinationError> {
        let url = format!("{}{path}", self.api_url);
        let mut retried = false;

        loop {
            let mut request = self
                .http
                .request(method.clone(), &url)
                .header("Authorization", format!("Bot {}", self.token));
            if let Some(body) = body {
                request = request.json(body);
            }

            let response = request
                .send()
                .await
                .map_err(|e| DestinationError::Transient(e.to_string()))?;
            let status = response.status();
            if status.is_success() {
                return Ok(response);
            }

            let text = response.text().await.unwrap_or_default();
            match classify(status, &text) {
                DestinationError::RateLimited { retry_after } if !retried => {
                    warn!(%url, ?retry_after, "Rate limited by Discord, waiting");
                    tokio::time::sleep(retry_after).await;
                    retried = true;
                }
                err => return Err(err),
            }
        }
    }

    async fn guild_channels(&self) -> Result<Vec<Channel>, DestinationError> {
        self.request(Method::GET, &format!("/guilds/{}/channels", self.guild_id), None)
            .await
    }

    /// Every thread of `channel_id`, active ones first, then archived ones
    /// newest first.
    async fn channel_threads(
        &self,
        channel_id: &str,
    ) -> Result<HashMap<String, String>, DestinationError> {
        let mut titles = HashMap::new();
        let mut remember = |thread: ThreadChannel| {
            if let Some(name) = thread.name {
                titles.entry(name).or_insert(thread.id);
            }
        };

        let active: ThreadList = self
            .request(
                Method::GET,
                &format!("/guilds/{}/threads/active", self.guild_id),
                None,
            )
            .await?;
        active
            .threads
            .into_iter()
            .filter(|t| t.parent_id.as_deref() == Some(channel_id))
            .for_each(&mut remember);

        let mut before: Option<String> = None;
        loop {
            let mut path = format!("/channels/{channel_id}/threads/archived/public?limit=100");
            if let Some(timestamp) = &before {
                path.push_str("&before=");
                path.extend(form_urlencoded::byte_serialize(timestamp.as_bytes()));
            }
            let page: ThreadList = self.request(Method::GET, &path, None).await?;
            let oldest = page
                .threads
                .last()
                .and_then(|t| t.thread_metadata.as_ref())
                .and_then(|m| m.archive_timestamp.clone());
            page.threads.into_iter().for_each(&mut remember);

            match oldest {
                Some(timestamp) if page.has_more && before.as_ref() != Some(&timestamp) => {
                    before = Some(timestamp);
                }
                _ => break,
            }
        }

        debug!(channel = %channel_id, threads = titles.len(), "Listed existing threads");
        Ok(titles)
    }

    fn known_threads(&self) -> MutexGuard<'_, ThreadIndex> {
        self.known_threads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn classify(status: StatusCode, body: &str) -> DestinationError {
    let parsed: Option<ApiError> = serde_json::from_str(body).ok();
    let message = parsed
        .as_ref()
        .map_or_else(|| body.to_string(), |e| e.message.clone());

    match status {
        StatusCode::TOO_MANY_REQUESTS => DestinationError::RateLimited {
            retry_after: parsed
                .and_then(|e| e.retry_after)
                .filter(|secs| secs.is_finite() && *secs >= 0.0)
                .map_or(Duration::from_secs(1), Duration::from_secs_f64),
        },
        StatusCode::FORBIDDEN => DestinationError::Forbidden(message),
        s if s.is_server_error() => DestinationError::Transient(format!("{s}: {message}")),
        s => DestinationError::Rejected {
            status: s.as_u16(),
            message,
        },
    }
}

const fn channel_type(kind: ContainerKind) -> u8 {
    match kind {
        ContainerKind::Category => CHANNEL_CATEGORY,
        ContainerKind::Forum => CHANNEL_FORUM,
        ContainerKind::Text => CHANNEL_TEXT,
    }
}

const fn container_kind(channel_type: u8) -> Option<ContainerKind> {
    match channel_type {
        CHANNEL_CATEGORY => Some(ContainerKind::Category),
        CHANNEL_FORUM => Some(ContainerKind::Forum),
        CHANNEL_TEXT => Some(ContainerKind::Text),
        _ => None,
    }
}

#[async_trait]
impl Destination for DiscordClient {
    async fn find_container(
        &self,
        kind: ContainerKind,
        name: &str,
    ) -> Result<Option<ContainerHandle>, DestinationError> {
        let want_category = kind == ContainerKind::Category;
        let found = self.guild_channels().await?.into_iter().find_map(|channel| {
            let found_kind = container_kind(channel.kind)?;
            let matches = channel.name.as_deref() == Some(name)
                && (found_kind == ContainerKind::Category) == want_category;
            matches.then(|| ContainerHandle {
                id: channel.id,
                name: name.to_string(),
                kind: found_kind,
            })
        });
        Ok(found)
    }

    async fn create_container(
        &self,
        parent: Option<&ContainerHandle>,
        spec: &ContainerSpec,
    ) -> Result<ContainerHandle, DestinationError> {
        let mut body = json!({
            "name": spec.name,
            "type": channel_type(spec.kind),
        });
        if let Some(parent) = parent {
            body["parent_id"] = json!(parent.id);
        }
        if let Some(topic) = &spec.topic {
            body["topic"] = json!(topic);
        }

        let path = format!("/guilds/{}/channels", self.guild_id);
        let channel: Channel = match self.request(Method::POST, &path, Some(&body)).await {
            Err(DestinationError::Rejected { status: 400, message })
                if spec.kind == ContainerKind::Forum =>
            {
                return Err(DestinationError::Unsupported(message));
            }
            other => other?,
        };

        debug!(name = %spec.name, id = %channel.id, "Created channel");
        Ok(ContainerHandle {
            id: channel.id,
            name: spec.name.clone(),
            kind: spec.kind,
        })
    }

    /// Threads are listed once per channel; later lookups and creations go
    /// through the cached index.
    async fn find_conversation(
        &self,
        container: &ContainerHandle,
        title: &str,
    ) -> Result<Option<ConversationHandle>, DestinationError> {
        let cached = self
            .known_threads()
            .get(&container.id)
            .map(|titles| titles.get(title).cloned());
        let id = match cached {
            Some(id) => id,
            None => {
                let titles = self.channel_threads(&container.id).await?;
                let id = titles.get(title).cloned();
                self.known_threads()
                    .entry(container.id.clone())
                    .or_insert(titles);
                id
            }
        };
        Ok(id.map(|id| ConversationHandle { id }))
    }

    async fn create_conversation(
        &self,
        container: &ContainerHandle,
        title: &str,
        first_chunk: &str,
    ) -> Result<ConversationHandle, DestinationError> {
        let thread: Channel = match container.kind {
            ContainerKind::Forum => {
                let body = json!({ "name": title, "message": { "content": first_chunk } });
                self.request(
                    Method::POST,
                    &format!("/channels/{}/threads", container.id),
                    Some(&body),
                )
                .await?
            }
            ContainerKind::Text => {
                let message: Message = self
                    .request(
                        Method::POST,
                        &format!("/channels/{}/messages", container.id),
                        Some(&json!({ "content": first_chunk })),
                    )
                    .await?;
                self.request(
                    Method::POST,
                    &format!("/channels/{}/messages/{}/threads", container.id, message.id),
                    Some(&json!({ "name": title })),
                )
                .await?
            }
            ContainerKind::Category => {
                return Err(DestinationError::Unsupported(
                    "categories cannot hold conversations".to_string(),
                ))
            }
        };

        if let Some(titles) = self.known_threads().get_mut(&container.id) {
            titles.insert(title.to_string(), thread.id.clone());
        }
        Ok(ConversationHandle { id: thread.id })
    }

    async fn send(
        &self,
        conversation: &ConversationHandle,
        text: &str,
    ) -> Result<(), DestinationError> {
        self.execute(
            Method::POST,
            &format!("/channels/{}/messages", conversation.id),
            Some(&json!({ "content": text })),
        )
        .await?;
        Ok(())
    }

    async fn close(&self, conversation: &ConversationHandle) -> Result<(), DestinationError> {
        self.execute(
            Method::PATCH,
            &format!("/channels/{}", conversation.id),
            Some(&json!({ "archived": true, "locked": true })),
        )
        .await?;
        Ok(())
    }
}
