//! Authenticated session against the source forum.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use scraper::Html;
use tracing::{debug, info};
use url::Url;

use super::html::selector;
use super::PageFetcher;
use crate::config::SourceCredentials;
use crate::constants::BROWSER_USER_AGENT;

/// A logged-in HTTP session. Cookies set during login are replayed on every
/// fetch made through it.
#[derive(Debug, Clone)]
pub struct SourceSession {
    client: Client,
    base_url: Url,
}

impl SourceSession {
    /// Open a session without logging in, for public boards.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid or the client cannot be built.
    pub fn anonymous(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .with_context(|| format!("Invalid forum base URL: {base_url}"))?;
        let client = Client::builder()
            .cookie_store(true)
            .user_agent(BROWSER_USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { client, base_url })
    }

    /// Log in with a username and password.
    ///
    /// The login form carries an anti-forgery token which is read from the
    /// login page and posted back with the credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if either request fails, the token is missing, or the
    /// page returned after login does not contain the success marker.
    pub async fn login(credentials: &SourceCredentials) -> Result<Self> {
        let session = Self::anonymous(&credentials.base_url)?;
        let login_page = session.resolve(&credentials.login_path)?;
        let login_check = session.resolve(&credentials.login_check_path)?;

        let page = session.fetch(login_page.as_str()).await?;
        let token = csrf_token(&page).context("Login page has no _csrf_token field")?;
        debug!(url = %login_page, "Found login form token");

        let response = session
            .client
            .post(login_check.clone())
            .form(&[
                ("_username", credentials.username.as_str()),
                ("_password", credentials.password.as_str()),
                ("_remember_me", "on"),
                ("_csrf_token", token.as_str()),
                ("_submit", "Connexion"),
            ])
            .send()
            .await
            .context("Failed to submit login form")?;

        if !response.status().is_success() {
            anyhow::bail!("Login failed with status {}", response.status());
        }

        let body = response.text().await.context("Failed to read login response")?;
        if !body.contains(&credentials.success_marker) {
            anyhow::bail!("Login failed, check credentials");
        }

        info!(user = %credentials.username, "Logged in to source forum");
        Ok(session)
    }

    /// Site root every relative link is resolved against.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn resolve(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .with_context(|| format!("Cannot resolve {path} against {}", self.base_url))
    }
}

#[async_trait]
impl PageFetcher for SourceSession {
    async fn fetch(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {url}"))?;

        if !response.status().is_success() {
            anyhow::bail!("Fetching {url} failed with status {}", response.status());
        }

        response
            .text()
            .await
            .with_context(|| format!("Failed to read body of {url}"))
    }
}

fn csrf_token(page: &str) -> Option<String> {
    let document = Html::parse_document(page);
    let input = selector("input[name='_csrf_token']");
    document
        .select(&input)
        .next()
        .and_then(|el| el.value().attr("value"))
        .map(ToString::to_string)
}
