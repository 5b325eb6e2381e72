//! Recording in-memory destination shared by the publish tests.

#![allow(dead_code)]

use std::sync::Mutex;

use async_trait::async_trait;
use forum_migrator::publish::{
    ContainerHandle, ContainerKind, ContainerSpec, ConversationHandle, Destination,
    DestinationError,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CreateContainer {
        parent: Option<String>,
        name: String,
        kind: ContainerKind,
    },
    CreateConversation {
        container: String,
        title: String,
        first_chunk: String,
    },
    Send {
        conversation: String,
        text: String,
    },
    Close {
        conversation: String,
    },
}

#[derive(Debug, Default)]
pub struct FakeDestination {
    pub containers: Mutex<Vec<ContainerHandle>>,
    pub calls: Mutex<Vec<Call>>,
    /// Reject forum-type channels as unsupported.
    pub no_forum_channels: bool,
    /// Fail any send whose text contains this needle.
    pub fail_send_containing: Option<String>,
    pub fail_close: bool,
    pub next_id: Mutex<u64>,
}

impl FakeDestination {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_container(self, name: &str, kind: ContainerKind) -> Self {
        let id = self.allocate_id();
        self.containers.lock().unwrap().push(ContainerHandle {
            id,
            name: name.to_string(),
            kind,
        });
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Titles of created conversations, in creation order.
    pub fn conversation_titles(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::CreateConversation { title, .. } => Some(title),
                _ => None,
            })
            .collect()
    }

    /// Every message in one conversation, the opening one first.
    pub fn messages_in(&self, conversation: &str) -> Vec<String> {
        let mut opened = 0;
        let mut messages = Vec::new();
        for call in self.calls() {
            match call {
                Call::CreateConversation { first_chunk, .. } => {
                    opened += 1;
                    if format!("conv-{opened}") == conversation {
                        messages.push(first_chunk);
                    }
                }
                Call::Send { conversation: c, text } if c == conversation => messages.push(text),
                _ => {}
            }
        }
        messages
    }

    fn allocate_id(&self) -> String {
        let mut next = self.next_id.lock().unwrap();
        *next += 1;
        format!("chan-{next}")
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Destination for FakeDestination {
    async fn find_container(
        &self,
        kind: ContainerKind,
        name: &str,
    ) -> Result<Option<ContainerHandle>, DestinationError> {
        let want_category = kind == ContainerKind::Category;
        Ok(self
            .containers
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.name == name && (c.kind == ContainerKind::Category) == want_category)
            .cloned())
    }

    async fn create_container(
        &self,
        parent: Option<&ContainerHandle>,
        spec: &ContainerSpec,
    ) -> Result<ContainerHandle, DestinationError> {
        if self.no_forum_channels && spec.kind == ContainerKind::Forum {
            return Err(DestinationError::Unsupported("guild has no community features".into()));
        }

        self.record(Call::CreateContainer {
            parent: parent.map(|p| p.id.clone()),
            name: spec.name.clone(),
            kind: spec.kind,
        });
        let handle = ContainerHandle {
            id: self.allocate_id(),
            name: spec.name.clone(),
            kind: spec.kind,
        };
        self.containers.lock().unwrap().push(handle.clone());
        Ok(handle)
    }

    async fn find_conversation(
        &self,
        container: &ContainerHandle,
        title: &str,
    ) -> Result<Option<ConversationHandle>, DestinationError> {
        let found = self
            .calls()
            .into_iter()
            .filter(|call| matches!(call, Call::CreateConversation { .. }))
            .enumerate()
            .find_map(|(i, call)| match call {
                Call::CreateConversation {
                    container: c,
                    title: t,
                    ..
                } if c == container.id && t == title => Some(ConversationHandle {
                    id: format!("conv-{}", i + 1),
                }),
                _ => None,
            });
        Ok(found)
    }

    async fn create_conversation(
        &self,
        container: &ContainerHandle,
        title: &str,
        first_chunk: &str,
    ) -> Result<ConversationHandle, DestinationError> {
        self.record(Call::CreateConversation {
            container: container.id.clone(),
            title: title.to_string(),
            first_chunk: first_chunk.to_string(),
        });
        let created = self
            .calls()
            .iter()
            .filter(|call| matches!(call, Call::CreateConversation { .. }))
            .count();
        Ok(ConversationHandle {
            id: format!("conv-{created}"),
        })
    }

    async fn send(
        &self,
        conversation: &ConversationHandle,
        text: &str,
    ) -> Result<(), DestinationError> {
        if let Some(needle) = &self.fail_send_containing {
            if text.contains(needle.as_str()) {
                return Err(DestinationError::Transient("connection reset".into()));
            }
        }
        self.record(Call::Send {
            conversation: conversation.id.clone(),
            text: text.to_string(),
        });
        Ok(())
    }

    async fn close(&self, conversation: &ConversationHandle) -> Result<(), DestinationError> {
        if self.fail_close {
            return Err(DestinationError::Forbidden("Missing Permissions".into()));
        }
        self.record(Call::Close {
            conversation: conversation.id.clone(),
        });
        Ok(())
    }
}
