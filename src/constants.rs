//! Shared constants used across the application.

/// User agent string used when crawling the source forum.
pub const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// User agent Discord requires for bot traffic.
pub const DISCORD_USER_AGENT: &str = concat!(
    "DiscordBot (https://github.com/forum-migrator, ",
    env!("CARGO_PKG_VERSION"),
    ")"
);

/// Strings that only ever appear in advertisement rows.
pub const AD_MARKERS: &[&str] = &["google_ad_client", "Liens sponsorisés"];

/// Author recorded when a post carries no recognizable author element.
pub const UNKNOWN_AUTHOR: &str = "Unknown";

/// Maximum characters in one Discord message.
pub const DISCORD_MESSAGE_LIMIT: usize = 2000;

/// Maximum characters in a Discord channel or thread name.
pub const DISCORD_NAME_LIMIT: usize = 100;

/// Maximum characters in a Discord channel topic.
pub const DISCORD_TOPIC_LIMIT: usize = 1024;
