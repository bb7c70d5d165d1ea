use chrono::{DateTime, Utc};

/// Identifier of a persisted document in the host store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(pub u64);

/// Identifier of a localized media asset in the host media store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AssetId(pub u64);

/// Identifier of a taxonomy term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TermId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DocumentStatus {
    #[default]
    Draft,
    Published,
}

/// The persisted artifact produced by a successful import.
///
/// `content_hash` is always the hash of the *sanitized* HTML, computed before
/// block conversion, so that cosmetic re-conversion never looks like an
/// upstream change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedDocument {
    pub id: DocumentId,
    pub guid: String,
    pub content_hash: String,
    pub title: String,
    pub source_link: String,
    /// Serialized block document (the converted body).
    pub block_content: String,
    pub status: DocumentStatus,
    pub publish_date: Option<DateTime<Utc>>,
    /// Set by the change detector when upstream content has drifted;
    /// cleared by a successful resync.
    pub out_of_sync: bool,
    pub category_terms: Vec<TermId>,
    /// First localized image of the body, promoted to cover.
    pub cover_asset: Option<AssetId>,
}

impl ImportedDocument {
    /// Stable reference for log entries: the source link when one exists,
    /// the guid otherwise.
    pub fn source_ref(&self) -> &str {
        if self.source_link.is_empty() {
            &self.guid
        } else {
            &self.source_link
        }
    }
}
