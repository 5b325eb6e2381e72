//! Splitting long post bodies into transport-sized messages.
//!
//! The first chunk carries the post header, later chunks a continuation
//! marker. Cuts prefer the nearest whitespace or sentence end within
//! [`LOOKBACK`] characters of the budget and fall back to a hard cut at the
//! budget. Lengths are counted in characters.
//!
//! The break character and any whitespace right after it stay at the end of
//! the chunk they close, so chunk bodies concatenate back to the original
//! text. The one exception is a whitespace run that does not fit before a
//! forced cut: it is dropped, never sent as the start of the next chunk.

use thiserror::Error;

/// Characters reserved below the limit on every chunk.
pub const SAFETY_MARGIN: usize = 50;

/// How far back from the budget a natural break is searched for.
pub const LOOKBACK: usize = 100;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SegmentError {
    #[error("prefix of {prefix} characters leaves no room under a {limit} character limit")]
    PrefixTooLong { prefix: usize, limit: usize },
}

/// Marker opening every chunk after the first; `ordinal` is 1-based, so the
/// second chunk is `continued 2`.
#[must_use]
pub fn continuation_marker(ordinal: usize) -> String {
    format!("*(continued {ordinal})*\n")
}

/// One chunk: the prefix it opens with and the slice of body it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub prefix: String,
    pub body: String,
}

impl Chunk {
    /// The text as sent.
    #[must_use]
    pub fn text(&self) -> String {
        format!("{}{}", self.prefix, self.body)
    }
}

/// Split `body` into messages of at most `limit` characters each, the first
/// opening with `header`.
///
/// # Errors
///
/// Returns [`SegmentError::PrefixTooLong`] when the header or a continuation
/// marker plus the safety margin does not fit under `limit`.
pub fn segment(header: &str, body: &str, limit: usize) -> Result<Vec<String>, SegmentError> {
    Ok(segment_chunks(header, body, limit)?
        .iter()
        .map(Chunk::text)
        .collect())
}

/// [`segment`], keeping each chunk's prefix and body apart.
///
/// # Errors
///
/// See [`segment`].
pub fn segment_chunks(header: &str, body: &str, limit: usize) -> Result<Vec<Chunk>, SegmentError> {
    let chars: Vec<char> = body.chars().collect();
    let mut chunks = Vec::new();
    let mut pos = 0;

    loop {
        let prefix = if chunks.is_empty() {
            header.to_string()
        } else {
            continuation_marker(chunks.len() + 1)
        };
        let budget = budget(&prefix, limit)?;
        let remaining = &chars[pos..];

        if remaining.len() <= budget {
            chunks.push(Chunk {
                prefix,
                body: remaining.iter().collect(),
            });
            return Ok(chunks);
        }

        let cut = cut_point(remaining, budget);
        chunks.push(Chunk {
            prefix,
            body: remaining[..cut].iter().collect(),
        });
        pos += cut;

        while chars.get(pos).is_some_and(|c| c.is_whitespace()) {
            pos += 1;
        }
        if pos == chars.len() {
            return Ok(chunks);
        }
    }
}

fn budget(prefix: &str, limit: usize) -> Result<usize, SegmentError> {
    let prefix_len = prefix.chars().count();
    limit
        .checked_sub(prefix_len + SAFETY_MARGIN)
        .filter(|budget| *budget > 0)
        .ok_or(SegmentError::PrefixTooLong {
            prefix: prefix_len,
            limit,
        })
}

fn is_break(c: char) -> bool {
    c.is_whitespace() || matches!(c, '.' | '!' | '?')
}

/// Length of the next chunk taken from `text`, which is longer than `budget`.
///
/// Scans back from the budget for the nearest break character no further
/// than `LOOKBACK` away and cuts just after it, extending over any whitespace
/// that follows. A break whose whitespace runs past the budget is passed over
/// for an earlier one. With no usable break in the window the cut lands
/// exactly on the budget.
fn cut_point(text: &[char], budget: usize) -> usize {
    let floor = budget.saturating_sub(LOOKBACK);
    let mut end = budget;

    while let Some(found) = (floor..end).rev().find(|&i| is_break(text[i])) {
        let mut cut = found + 1;
        while cut < budget && text[cut].is_whitespace() {
            cut += 1;
        }
        if !text[cut].is_whitespace() {
            return cut;
        }

        end = found;
        while end > floor && text[end - 1].is_whitespace() {
            end -= 1;
        }
    }

    budget
}
