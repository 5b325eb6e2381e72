//! Walks forum → thread → post pages and writes what it finds to the store.
//!
//! Failures are contained to the smallest entity they affect: a page that
//! cannot be fetched ends that entity's pagination but keeps what was
//! already collected, and a forum or thread that cannot be stored is skipped
//! without touching its siblings.

use std::collections::HashSet;

use anyhow::{Context, Result};
use scraper::Html;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::config::CrawlOptions;
use crate::db::{insert_post_if_absent, upsert_forum, upsert_thread, Database, NewForum, NewThread};
use crate::source::{
    clamp_pages, extract_forums, extract_posts, extract_threads, page_url, total_pages,
    PageFetcher, PagePattern,
};

/// Counters reported at the end of a crawl.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlStats {
    pub forums: usize,
    pub threads: usize,
    pub posts_stored: usize,
    pub posts_existing: usize,
    pub failures: usize,
}

/// Records gathered across the pages of one entity.
#[derive(Debug)]
struct PageRun<T> {
    records: Vec<T>,
    pages: u32,
    complete: bool,
}

pub struct Crawler<'a, F: PageFetcher> {
    fetcher: &'a F,
    db: &'a Database,
    base_url: Url,
    options: CrawlOptions,
}

impl<'a, F: PageFetcher> Crawler<'a, F> {
    #[must_use]
    pub fn new(fetcher: &'a F, db: &'a Database, base_url: Url, options: CrawlOptions) -> Self {
        Self {
            fetcher,
            db,
            base_url,
            options,
        }
    }

    /// Crawl every forum listed on the site index.
    ///
    /// # Errors
    ///
    /// Returns an error only if the index page itself cannot be fetched.
    pub async fn run(&self) -> Result<CrawlStats> {
        let index = self
            .fetcher
            .fetch(self.base_url.as_str())
            .await
            .context("Failed to fetch forum index")?;

        let mut forums = extract_forums(&Html::parse_document(&index), &self.base_url);
        info!(count = forums.len(), "Found forums");
        if let Some(max) = self.options.max_forums {
            forums.truncate(max);
        }

        let mut stats = CrawlStats::default();
        for forum in &forums {
            self.crawl_forum(forum, &mut stats).await;
        }

        info!(
            forums = stats.forums,
            threads = stats.threads,
            posts_stored = stats.posts_stored,
            posts_existing = stats.posts_existing,
            failures = stats.failures,
            "Crawl complete"
        );
        Ok(stats)
    }

    /// Store one forum, then crawl each thread listed under it.
    pub async fn crawl_forum(&self, forum: &NewForum, stats: &mut CrawlStats) {
        info!(forum = %forum.title, url = %forum.url, "Processing forum");

        let forum_id = match upsert_forum(self.db.pool(), forum).await {
            Ok(id) => id,
            Err(e) => {
                error!(url = %forum.url, "Failed to store forum: {e:#}");
                stats.failures += 1;
                return;
            }
        };
        stats.forums += 1;

        let run = self
            .collect_pages(&forum.url, PagePattern::ForumListing, |doc| {
                extract_threads(doc, &self.base_url)
            })
            .await;
        if !run.complete {
            stats.failures += 1;
        }

        let mut threads = run.records;
        let mut seen = HashSet::new();
        threads.retain(|thread| seen.insert(thread.url.clone()));
        info!(forum = %forum.title, count = threads.len(), pages = run.pages, "Found threads");
        if let Some(max) = self.options.max_threads {
            threads.truncate(max);
        }

        for thread in &threads {
            self.crawl_thread(thread, forum_id, stats).await;
        }
    }

    /// Store one thread, then every post across its pages, numbered from 1
    /// in page-then-document order.
    pub async fn crawl_thread(&self, thread: &NewThread, forum_id: i64, stats: &mut CrawlStats) {
        debug!(thread = %thread.title, url = %thread.url, "Processing thread");

        let thread_id = match upsert_thread(self.db.pool(), thread, forum_id).await {
            Ok(id) => id,
            Err(e) => {
                error!(url = %thread.url, "Failed to store thread: {e:#}");
                stats.failures += 1;
                return;
            }
        };
        stats.threads += 1;

        let run = self
            .collect_pages(&thread.url, PagePattern::Thread, extract_posts)
            .await;
        if !run.complete {
            stats.failures += 1;
        }

        let mut post_number: i64 = 0;
        for post in &run.records {
            post_number += 1;
            match insert_post_if_absent(self.db.pool(), thread_id, post_number, post).await {
                Ok(true) => stats.posts_stored += 1,
                Ok(false) => stats.posts_existing += 1,
                Err(e) => {
                    error!(url = %thread.url, post_number, "Failed to store post: {e:#}");
                    stats.failures += 1;
                }
            }
        }

        debug!(
            thread = %thread.title,
            posts = run.records.len(),
            pages = run.pages,
            "Thread stored"
        );
    }

    /// Fetch the first page, read the page count from it, then walk the
    /// remaining pages applying `extract` to each.
    ///
    /// Stops early, keeping what was gathered, when a page cannot be fetched
    /// or the URL has no page slot to rewrite.
    async fn collect_pages<T>(
        &self,
        first_url: &str,
        pattern: PagePattern,
        extract: impl Fn(&Html) -> Vec<T>,
    ) -> PageRun<T> {
        let mut run = PageRun {
            records: Vec::new(),
            pages: 0,
            complete: false,
        };

        let body = match self.fetcher.fetch(first_url).await {
            Ok(body) => body,
            Err(e) => {
                warn!(url = %first_url, page = 1, "Failed to fetch page: {e:#}");
                return run;
            }
        };
        let (records, reported) = {
            let document = Html::parse_document(&body);
            (extract(&document), total_pages(&document))
        };
        let total = clamp_pages(reported, self.options.max_pages);
        run.records.extend(records);
        run.pages = 1;

        for page in 2..=total {
            let url = match page_url(first_url, page, pattern) {
                Ok(url) => url,
                Err(e) => {
                    warn!(url = %first_url, page, "Cannot paginate: {e}");
                    return run;
                }
            };

            let body = match self.fetcher.fetch(&url).await {
                Ok(body) => body,
                Err(e) => {
                    warn!(url = %url, page, "Failed to fetch page: {e:#}");
                    return run;
                }
            };

            let records = extract(&Html::parse_document(&body));
            if records.is_empty() {
                debug!(url = %url, page, "No records on page");
            }
            run.records.extend(records);
            run.pages = page;
        }

        run.complete = true;
        run
    }
}
