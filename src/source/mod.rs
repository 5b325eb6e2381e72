//! Everything that reads the source forum: session, pagination, extraction.

mod html;

pub mod extract;
pub mod pagination;
pub mod session;

pub use extract::{canonical_thread_url, extract_forums, extract_posts, extract_threads};
pub use pagination::{clamp_pages, page_url, total_pages, PagePattern, PaginationError};
pub use session::SourceSession;

use anyhow::Result;
use async_trait::async_trait;

/// Something that turns a URL into page HTML.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch one page.
    ///
    /// # Errors
    ///
    /// Returns an error on network failure or a non-success status.
    async fn fetch(&self, url: &str) -> Result<String>;
}
