//! Forum migrator library.
//!
//! Crawls a paginated, login-protected forum into SQLite, then replays the
//! stored threads into Discord in their original order, splitting long posts
//! to fit the message size limit.

// Allow raw string hashes for safety - they're harmless and prevent issues if content changes
#![allow(clippy::needless_raw_string_hashes)]

pub mod config;
pub mod constants;
pub mod crawl;
pub mod db;
pub mod ensure;
pub mod publish;
pub mod segment;
pub mod source;
