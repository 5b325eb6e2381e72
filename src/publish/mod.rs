//! Replaying the store into a rate-limited messaging platform.

mod destination;
pub mod discord;
pub mod names;
mod publisher;

pub use destination::{
    ContainerHandle, ContainerKind, ContainerSpec, ConversationHandle, Destination,
    DestinationError,
};
pub use discord::DiscordClient;
pub use publisher::{PublishStats, Publisher};
