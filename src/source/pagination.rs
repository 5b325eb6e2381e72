//! Page counting and page-URL derivation for paginated listings.
//!
//! Listing and thread URLs embed their page number between the numeric ids
//! and the descriptive slug:
//!
//! ```text
//! liste-<id>-<id>-<page>-<slug>.html        forum listing
//! sujet-<id>-<id>-<id>-<page>-<slug>.html   thread
//! ```

use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use thiserror::Error;

static LISTING_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(liste-\d+-\d+)-(\d+)-(.*)\.html$").expect("Invalid regex"));

static THREAD_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(sujet-\d+-\d+-\d+)-(\d+)-(.*)\.html$").expect("Invalid regex")
});

static PAGINATION_ITEMS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("ul.pagination li").expect("Invalid selector"));

/// Which URL shape a paginated entity uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagePattern {
    /// A forum's list of threads.
    ForumListing,
    /// A thread's list of posts.
    Thread,
}

impl PagePattern {
    fn regex(self) -> &'static Regex {
        match self {
            Self::ForumListing => &LISTING_PATTERN,
            Self::Thread => &THREAD_PATTERN,
        }
    }

    /// Rewrite the page slot of `url` to `page`, or `None` if `url` does not
    /// have this shape.
    #[must_use]
    pub fn with_page(self, url: &str, page: u32) -> Option<String> {
        let re = self.regex();
        if !re.is_match(url) {
            return None;
        }
        Some(re.replace(url, format!("${{1}}-{page}-${{3}}.html")).into_owned())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PaginationError {
    #[error("{url} does not match the {pattern:?} page pattern")]
    PatternMismatch { url: String, pattern: PagePattern },
}

/// Number of pages advertised by the pagination control of a first page.
///
/// Entries that are not plain numbers ("next", ellipses) are ignored. A page
/// without a pagination control has exactly one page.
#[must_use]
pub fn total_pages(document: &Html) -> u32 {
    document
        .select(&PAGINATION_ITEMS)
        .filter_map(|li| li.text().collect::<String>().trim().parse::<u32>().ok())
        .max()
        .unwrap_or(1)
        .max(1)
}

/// Apply a caller cap to a discovered page count. The cap only lowers.
#[must_use]
pub fn clamp_pages(total: u32, cap: Option<u32>) -> u32 {
    cap.map_or(total, |cap| total.min(cap.max(1)))
}

/// URL of page `page` of the entity whose first page is `base_url`.
///
/// Page 1 is `base_url` itself, whatever its shape.
///
/// # Errors
///
/// Returns [`PaginationError::PatternMismatch`] when `page > 1` and the URL
/// has no page slot to rewrite.
pub fn page_url(base_url: &str, page: u32, pattern: PagePattern) -> Result<String, PaginationError> {
    if page <= 1 {
        return Ok(base_url.to_string());
    }
    pattern
        .with_page(base_url, page)
        .ok_or_else(|| PaginationError::PatternMismatch {
            url: base_url.to_string(),
            pattern,
        })
}
