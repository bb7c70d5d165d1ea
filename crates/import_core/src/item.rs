use chrono::{DateTime, Utc};

/// One entry from an upstream feed, as handed over by the feed transport.
///
/// The transport is responsible for XML parsing; by the time an item reaches
/// the pipeline it is plain strings. The item is read-only input and is never
/// persisted as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItem {
    /// Stable upstream identifier, preferably a URI. Falls back to the item
    /// link when the feed carries no explicit id.
    pub guid: String,
    pub title: String,
    pub link: String,
    pub publish_date: Option<DateTime<Utc>>,
    /// Raw HTML body as exported by the feed.
    pub raw_content: String,
    /// Category labels in feed order, already deduplicated by the transport.
    pub categories: Vec<String>,
}

impl FeedItem {
    /// The reference used in log entries: the link when present, the guid
    /// otherwise.
    pub fn source_ref(&self) -> &str {
        if self.link.is_empty() {
            &self.guid
        } else {
            &self.link
        }
    }
}
