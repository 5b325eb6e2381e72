use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use url::Url;

use forum_migrator::config::Config;
use forum_migrator::crawl::Crawler;
use forum_migrator::db::Database;
use forum_migrator::publish::{DiscordClient, Publisher};
use forum_migrator::source::SourceSession;

/// Move a forum into Discord by way of a local SQLite store.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
enum Command {
    /// Crawl the source forum into the store
    Crawl,
    /// Replay the store into Discord
    Publish,
    /// Crawl, then publish
    Migrate,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let Cli { command } = Cli::parse();

    // Load .env file if present
    let _ = dotenvy::dotenv();

    init_tracing()?;

    let config = Config::from_env().context("Failed to load configuration")?;
    if matches!(command, Command::Crawl | Command::Migrate) {
        config.validate_for_crawl().context("Invalid crawl configuration")?;
    }
    if matches!(command, Command::Publish | Command::Migrate) {
        config.validate_for_publish().context("Invalid publish configuration")?;
    }

    if let Some(parent) = config.database_path.parent() {
        tokio::fs::create_dir_all(parent).await.with_context(|| {
            format!("Failed to create database directory: {}", parent.display())
        })?;
    }
    let db = Database::new(&config.database_path)
        .await
        .context("Failed to initialize database")?;
    info!(path = %config.database_path.display(), "Database initialized");

    if matches!(command, Command::Crawl | Command::Migrate) {
        crawl(&config, &db).await?;
    }
    if matches!(command, Command::Publish | Command::Migrate) {
        publish(&config, &db).await?;
    }

    Ok(())
}

async fn crawl(config: &Config, db: &Database) -> Result<()> {
    let credentials = config
        .source_credentials()
        .context("Forum credentials are not configured")?;
    let session = SourceSession::login(&credentials)
        .await
        .context("Failed to log in to the source forum")?;

    let base_url = Url::parse(&config.forum_base_url).context("Invalid FORUM_BASE_URL")?;
    let crawler = Crawler::new(&session, db, base_url, config.crawl_options());
    let stats = crawler.run().await?;
    info!(?stats, "Crawl finished");
    Ok(())
}

async fn publish(config: &Config, db: &Database) -> Result<()> {
    let token = config
        .discord_token
        .as_deref()
        .context("DISCORD_TOKEN is not configured")?;
    let discord = DiscordClient::connect(
        &config.discord_api_url,
        token,
        config.discord_guild_id.as_deref(),
    )
    .await?;
    info!(guild = %discord.guild_id(), "Connected to Discord");

    let publisher = Publisher::new(&discord, db, config.publish_options());
    let stats = publisher.publish_all().await?;
    info!(?stats, "Publish finished");
    Ok(())
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,forum_migrator=debug"));

    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| matches!(v.to_lowercase().as_str(), "json" | "structured"))
        .unwrap_or(false);

    if use_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    }

    Ok(())
}
