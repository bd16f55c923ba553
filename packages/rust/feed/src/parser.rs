//! Feed document parsing and entry text assembly.
//!
//! Entries arrive as HTML-bearing Atom/RSS items. Each one is reduced to a
//! [`FeedItem`]: plain text (tags stripped, entities decoded, NFC-normalized)
//! plus the publish time and a content hash for the processed-entry ledger.

use chrono::{DateTime, Utc};
use feed_rs::model::Entry;
use scraper::Html;
use sha2::{Digest, Sha256};
use tracing::warn;
use unicode_normalization::UnicodeNormalization;

use skywatch_shared::{Result, SkywatchError};

/// A single feed entry reduced to the fields the pipeline consumes.
#[derive(Debug, Clone)]
pub struct FeedItem {
    /// Stable entry identifier from the feed.
    pub id: String,
    /// Publish time (falls back to the entry's updated time).
    pub published: DateTime<Utc>,
    /// Assembled plain text: title, summary, and content parts.
    pub text: String,
    /// SHA-256 of the assembled text.
    pub content_hash: String,
}

/// Parse a feed document into items, oldest first, keeping the newest `limit`.
///
/// The whole document failing to parse is an error. Entries without any
/// timestamp are skipped: the history is time-ordered and an undated event
/// cannot be placed in it.
pub fn parse_feed_items(body: &[u8], limit: usize) -> Result<Vec<FeedItem>> {
    let feed = feed_rs::parser::parse(body)
        .map_err(|e| SkywatchError::feed(format!("unparseable feed document: {e}")))?;

    let mut items: Vec<FeedItem> = Vec::with_capacity(feed.entries.len());

    for entry in feed.entries {
        let Some(published) = entry.published.or(entry.updated) else {
            warn!(entry_id = %entry.id, "entry has no publish or update time, skipping");
            continue;
        };

        let text = entry_text(&entry);
        let content_hash = compute_hash(&text);

        items.push(FeedItem {
            id: entry.id,
            published,
            text,
            content_hash,
        });
    }

    items.sort_by_key(|item| item.published);

    if items.len() > limit {
        let excess = items.len() - limit;
        items.drain(..excess);
    }

    Ok(items)
}

/// Assemble an entry's text from every field that may carry it.
///
/// Title, summary, and content are each optional and may duplicate one
/// another; all present parts are kept so classification sees the full
/// announcement regardless of which fields the bridge populated.
fn entry_text(entry: &Entry) -> String {
    let mut parts: Vec<String> = Vec::new();

    if let Some(title) = &entry.title {
        parts.push(strip_html(&title.content));
    }
    if let Some(summary) = &entry.summary {
        parts.push(strip_html(&summary.content));
    }
    if let Some(content) = &entry.content {
        if let Some(body) = &content.body {
            parts.push(strip_html(body));
        }
    }

    parts.retain(|p| !p.is_empty());
    normalize(&parts.join("\n"))
}

/// Strip HTML tags and decode entities, collapsing runs of whitespace.
fn strip_html(input: &str) -> String {
    let fragment = Html::parse_fragment(input);
    let text: Vec<&str> = fragment.root_element().text().collect();
    text.join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

/// NFC-normalize so pattern matching sees composed characters («ё», «й»).
fn normalize(input: &str) -> String {
    input.nfc().collect()
}

/// Compute SHA-256 hash of content.
fn compute_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}
