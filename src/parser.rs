use crate::types::{ContentItem, CorrespondentError, Result};
use chrono::{DateTime, Utc};
use feed_rs::parser;
use std::collections::HashSet;
use tracing::debug;

/// Normalizes fetched feed bytes into `ContentItem`s. This is the single
/// boundary behind which site-specific shapes are isolated; everything
/// downstream sees one uniform item structure.
pub struct FeedParser {
    seen_ids: HashSet<String>,
}

impl FeedParser {
    pub fn new() -> Self {
        Self {
            seen_ids: HashSet::new(),
        }
    }

    /// Parse a feed document fetched from `site_url`. A body that is not a
    /// recognizable feed is a permanent, non-retried failure for that site.
    pub fn parse_items(&mut self, site_url: &str, content: &str) -> Result<Vec<ContentItem>> {
        debug!("parsing feed from {} ({} bytes)", site_url, content.len());

        let feed = parser::parse(content.as_bytes())
            .map_err(|e| CorrespondentError::Parse(format!("{}: {}", site_url, e)))?;

        let fetched_at = Utc::now();
        let items: Vec<ContentItem> = feed
            .entries
            .into_iter()
            .filter_map(|entry| self.normalize_entry(site_url, entry, fetched_at))
            .collect();

        debug!("parsed {} items from {}", items.len(), site_url);
        Ok(items)
    }

    fn normalize_entry(
        &mut self,
        site_url: &str,
        entry: feed_rs::model::Entry,
        fetched_at: DateTime<Utc>,
    ) -> Option<ContentItem> {
        let title = entry
            .title
            .map(|t| t.content)
            .unwrap_or_else(|| "Untitled".to_string());

        let link = entry.links.first().map(|l| l.href.clone());

        // Stable identifier: GUID first, then canonical link. Entries carrying
        // neither fall back to a site-scoped title key.
        let id = if !entry.id.is_empty() {
            entry.id.clone()
        } else if let Some(link) = &link {
            link.clone()
        } else {
            format!("{}#{}", site_url, title)
        };

        if !self.seen_ids.insert(id.clone()) {
            debug!("skipping duplicate entry {}", id);
            return None;
        }

        let summary = entry.summary.map(|s| s.content);
        let content_body = entry.content.and_then(|c| c.body);
        let body = match (summary, content_body) {
            (Some(s), Some(c)) => format!("{}\n\n{}", s, c),
            (Some(s), None) => s,
            (None, Some(c)) => c,
            (None, None) => String::new(),
        };

        // Feeds without a published timestamp get the fetch time, keeping the
        // ordering rule total.
        let published = entry.published.or(entry.updated).unwrap_or(fetched_at);

        Some(ContentItem {
            source: site_url.to_string(),
            id,
            title,
            body,
            published,
        })
    }
}

impl Default for FeedParser {
    fn default() -> Self {
        Self::new()
    }
}
