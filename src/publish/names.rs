//! Names, titles, topics and headers as they appear on the destination.

use std::sync::LazyLock;

use regex::Regex;

use crate::constants::{DISCORD_NAME_LIMIT, DISCORD_TOPIC_LIMIT};
use crate::db::{Forum, Post, Thread};

static NON_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s-]").expect("Invalid regex"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("Invalid regex"));
static DASHES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"-+").expect("Invalid regex"));

/// Longest description quoted in a channel topic.
const TOPIC_DESCRIPTION_LIMIT: usize = 500;

/// Channel-safe form of a name: punctuation dropped, whitespace runs turned
/// into single dashes, lowercased and capped to the platform's name length.
#[must_use]
pub fn sanitize_channel_name(name: &str) -> String {
    let name = NON_WORD.replace_all(name, "");
    let name = WHITESPACE.replace_all(&name, "-");
    let name = DASHES.replace_all(&name, "-");
    truncate_chars(name.trim_matches('-'), DISCORD_NAME_LIMIT).to_lowercase()
}

/// Channel name for a forum, prefixed by its group when it has one.
#[must_use]
pub fn forum_channel_name(forum: &Forum) -> String {
    match forum.group_name.as_deref().map(str::trim) {
        Some(group) if !group.is_empty() => {
            sanitize_channel_name(&format!("{group}-{}", forum.title))
        }
        _ => sanitize_channel_name(&forum.title),
    }
}

/// Channel topic summarizing a forum.
#[must_use]
pub fn forum_topic(forum: &Forum) -> String {
    let mut topic = format!("Forum: {}", forum.title);
    if let Some(description) = forum.description.as_deref().filter(|d| !d.is_empty()) {
        topic.push_str(" - ");
        topic.push_str(truncate_chars(description, TOPIC_DESCRIPTION_LIMIT));
    }
    if let (Some(subjects), Some(replies)) = (forum.subjects, forum.replies) {
        topic.push_str(&format!(" | {subjects} subjects, {replies} replies"));
    }
    truncate_chars(&topic, DISCORD_TOPIC_LIMIT).to_string()
}

/// Conversation title for a thread.
#[must_use]
pub fn conversation_title(thread: &Thread) -> String {
    let title = thread.title.trim();
    if title.is_empty() {
        format!("Thread {}", thread.id)
    } else {
        truncate_chars(title, DISCORD_NAME_LIMIT).to_string()
    }
}

/// Header opening the first post of a thread.
#[must_use]
pub fn opening_header(post: &Post) -> String {
    format!(
        "**Original author:** {}\n**Date:** {}\n\n",
        post.author,
        post.post_date.as_deref().unwrap_or("unknown")
    )
}

/// Header opening every later post.
#[must_use]
pub fn reply_header(post: &Post) -> String {
    format!(
        "**{}** ({}):\n",
        post.author,
        post.post_date.as_deref().unwrap_or("unknown date")
    )
}

fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
