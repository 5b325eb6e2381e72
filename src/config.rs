use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::constants::DISCORD_MESSAGE_LIMIT;
use crate::segment::SAFETY_MARGIN;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
    #[error("failed to parse {name} as integer: {source}")]
    ParseInt {
        name: String,
        #[source]
        source: std::num::ParseIntError,
    },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Source forum
    pub forum_base_url: String,
    pub forum_username: Option<String>,
    pub forum_password: Option<String>,
    pub login_path: String,
    pub login_check_path: String,
    pub login_marker: String,

    // Database
    pub database_path: PathBuf,

    // Crawl caps
    pub max_forums: Option<usize>,
    pub max_threads: Option<usize>,
    pub max_pages: Option<u32>,

    // Discord
    pub discord_token: Option<String>,
    pub discord_guild_id: Option<String>,
    pub discord_api_url: String,
    pub category_name: String,

    // Publishing
    pub message_limit: usize,
    pub message_delay: Duration,
    pub thread_delay: Duration,
    pub forum_delay: Duration,
}

/// Credentials and endpoints for the source forum login handshake.
#[derive(Debug, Clone)]
pub struct SourceCredentials {
    pub base_url: String,
    pub username: String,
    pub password: String,
    pub login_path: String,
    pub login_check_path: String,
    pub success_marker: String,
}

/// Caps applied by the crawler. `None` means unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlOptions {
    pub max_forums: Option<usize>,
    pub max_threads: Option<usize>,
    pub max_pages: Option<u32>,
}

/// Delays inserted between destination writes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pacing {
    /// Before every message after the one that opened a conversation.
    pub message: Duration,
    /// After every thread.
    pub thread: Duration,
    /// After every forum.
    pub forum: Duration,
}

impl Pacing {
    /// No delays at all, for tests and dry runs.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            message: Duration::ZERO,
            thread: Duration::ZERO,
            forum: Duration::ZERO,
        }
    }
}

/// Options consumed by the publisher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOptions {
    pub category_name: String,
    pub message_limit: usize,
    pub pacing: Pacing,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            // Source forum
            forum_base_url: required_env("FORUM_BASE_URL")?,
            forum_username: optional_env("FORUM_USERNAME"),
            forum_password: optional_env("FORUM_PASSWORD"),
            login_path: env_or_default("FORUM_LOGIN_PATH", "/login"),
            login_check_path: env_or_default("FORUM_LOGIN_CHECK_PATH", "/login_check"),
            login_marker: env_or_default("FORUM_LOGIN_MARKER", "Mon profil"),

            // Database
            database_path: PathBuf::from(env_or_default("DATABASE_PATH", "./data/forum.sqlite")),

            // Crawl caps
            max_forums: parse_env_opt("CRAWL_MAX_FORUMS")?,
            max_threads: parse_env_opt("CRAWL_MAX_THREADS")?,
            max_pages: parse_env_opt("CRAWL_MAX_PAGES")?,

            // Discord
            discord_token: optional_env("DISCORD_TOKEN"),
            discord_guild_id: optional_env("DISCORD_GUILD_ID"),
            discord_api_url: env_or_default("DISCORD_API_URL", "https://discord.com/api/v10"),
            category_name: env_or_default("DISCORD_CATEGORY", "Forum Archive"),

            // Publishing
            message_limit: parse_env_or("MESSAGE_LIMIT", DISCORD_MESSAGE_LIMIT)?,
            message_delay: Duration::from_millis(parse_env_or("MESSAGE_DELAY_MS", 1000)?),
            thread_delay: Duration::from_millis(parse_env_or("THREAD_DELAY_MS", 2000)?),
            forum_delay: Duration::from_millis(parse_env_or("FORUM_DELAY_MS", 5000)?),
        })
    }

    /// Configuration pointing at placeholder endpoints with no pacing.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            forum_base_url: "http://forum.test".to_string(),
            forum_username: Some("tester".to_string()),
            forum_password: Some("secret".to_string()),
            login_path: "/login".to_string(),
            login_check_path: "/login_check".to_string(),
            login_marker: "Mon profil".to_string(),
            database_path: PathBuf::from(":memory:"),
            max_forums: None,
            max_threads: None,
            max_pages: None,
            discord_token: Some("test-token".to_string()),
            discord_guild_id: Some("1".to_string()),
            discord_api_url: "http://discord.test/api/v10".to_string(),
            category_name: "Forum Archive".to_string(),
            message_limit: DISCORD_MESSAGE_LIMIT,
            message_delay: Duration::ZERO,
            thread_delay: Duration::ZERO,
            forum_delay: Duration::ZERO,
        }
    }

    /// Validate the settings needed to crawl the source forum.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL or credentials are unusable.
    pub fn validate_for_crawl(&self) -> Result<(), ConfigError> {
        if url::Url::parse(&self.forum_base_url).is_err() {
            return Err(ConfigError::InvalidValue {
                name: "FORUM_BASE_URL".to_string(),
                message: format!("not an absolute URL: '{}'", self.forum_base_url),
            });
        }
        if self.forum_username.is_none() {
            return Err(ConfigError::MissingEnvVar("FORUM_USERNAME".to_string()));
        }
        if self.forum_password.is_none() {
            return Err(ConfigError::MissingEnvVar("FORUM_PASSWORD".to_string()));
        }
        if self.max_pages == Some(0) {
            return Err(ConfigError::InvalidValue {
                name: "CRAWL_MAX_PAGES".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Validate the settings needed to publish to Discord.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is missing or the message limit cannot
    /// hold any content once headers are accounted for.
    pub fn validate_for_publish(&self) -> Result<(), ConfigError> {
        if self.discord_token.is_none() {
            return Err(ConfigError::MissingEnvVar("DISCORD_TOKEN".to_string()));
        }
        if self.category_name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "DISCORD_CATEGORY".to_string(),
                message: "cannot be empty".to_string(),
            });
        }
        if self.message_limit <= SAFETY_MARGIN * 4 {
            return Err(ConfigError::InvalidValue {
                name: "MESSAGE_LIMIT".to_string(),
                message: format!("must be greater than {}", SAFETY_MARGIN * 4),
            });
        }
        Ok(())
    }

    /// Login parameters, if credentials are configured.
    #[must_use]
    pub fn source_credentials(&self) -> Option<SourceCredentials> {
        Some(SourceCredentials {
            base_url: self.forum_base_url.clone(),
            username: self.forum_username.clone()?,
            password: self.forum_password.clone()?,
            login_path: self.login_path.clone(),
            login_check_path: self.login_check_path.clone(),
            success_marker: self.login_marker.clone(),
        })
    }

    #[must_use]
    pub fn crawl_options(&self) -> CrawlOptions {
        CrawlOptions {
            max_forums: self.max_forums,
            max_threads: self.max_threads,
            max_pages: self.max_pages,
        }
    }

    #[must_use]
    pub fn publish_options(&self) -> PublishOptions {
        PublishOptions {
            category_name: self.category_name.clone(),
            message_limit: self.message_limit,
            pacing: Pacing {
                message: self.message_delay,
                thread: self.thread_delay,
                forum: self.forum_delay,
            },
        }
    }
}

fn required_env(name: &str) -> Result<String, ConfigError> {
    optional_env(name).ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_or_default(name: &str, default: &str) -> String {
    optional_env(name).unwrap_or_else(|| default.to_string())
}

fn parse_env_or<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr<Err = std::num::ParseIntError>,
{
    Ok(parse_env_opt(name)?.unwrap_or(default))
}

fn parse_env_opt<T>(name: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr<Err = std::num::ParseIntError>,
{
    optional_env(name)
        .map(|val| {
            val.trim().parse().map_err(|e| ConfigError::ParseInt {
                name: name.to_string(),
                source: e,
            })
        })
        .transpose()
}
