use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Kind of grouping object on the destination platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    /// Top-level grouping of channels.
    Category,
    /// Channel whose every post is its own conversation.
    Forum,
    /// Plain channel; conversations are threads started from a message.
    Text,
}

/// What to find or create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    pub name: String,
    pub kind: ContainerKind,
    pub topic: Option<String>,
}

impl ContainerSpec {
    #[must_use]
    pub fn category(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: ContainerKind::Category,
            topic: None,
        }
    }

    /// The same container as a plain text channel.
    #[must_use]
    pub fn as_text(&self) -> Self {
        Self {
            kind: ContainerKind::Text,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerHandle {
    pub id: String,
    pub name: String,
    pub kind: ContainerKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConversationHandle {
    pub id: String,
}

#[derive(Debug, Error)]
pub enum DestinationError {
    /// The platform does not support this kind of container here.
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },
    /// Network failure or server-side error; the same call may succeed later.
    #[error("transient failure: {0}")]
    Transient(String),
    #[error("request rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },
}

/// The messaging platform content is replayed into.
#[async_trait]
pub trait Destination: Send + Sync {
    /// Look up a container by exact name. Categories are searched when
    /// `kind` is [`ContainerKind::Category`], channels otherwise.
    async fn find_container(
        &self,
        kind: ContainerKind,
        name: &str,
    ) -> Result<Option<ContainerHandle>, DestinationError>;

    /// Create a container, nested under `parent` when given.
    async fn create_container(
        &self,
        parent: Option<&ContainerHandle>,
        spec: &ContainerSpec,
    ) -> Result<ContainerHandle, DestinationError>;

    /// Look up a conversation in `container` by exact title, open or closed.
    async fn find_conversation(
        &self,
        container: &ContainerHandle,
        title: &str,
    ) -> Result<Option<ConversationHandle>, DestinationError>;

    /// Open a conversation in `container` whose first message is `first_chunk`.
    async fn create_conversation(
        &self,
        container: &ContainerHandle,
        title: &str,
        first_chunk: &str,
    ) -> Result<ConversationHandle, DestinationError>;

    /// Append a message to a conversation.
    async fn send(&self, conversation: &ConversationHandle, text: &str)
        -> Result<(), DestinationError>;

    /// Close and lock a conversation.
    async fn close(&self, conversation: &ConversationHandle) -> Result<(), DestinationError>;
}
