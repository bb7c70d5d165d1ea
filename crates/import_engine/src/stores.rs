use std::fmt;

use import_core::{AssetId, DocumentId, FeedItem, ImportedDocument, TermId};
use thiserror::Error;

/// Raw bytes of a downloaded media file.
pub type DownloadedBytes = Vec<u8>;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("feed unreachable: {0}")]
    Unreachable(String),
    #[error("feed parse failure: {0}")]
    Parse(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("download failed: {0}")]
    Download(String),
    #[error("persistence failed: {0}")]
    Persistence(String),
}

/// Fatal pre-flight and per-operation failures. Per-item trouble inside a
/// batch never surfaces here; it lands in the tri-count and the log sink.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("no feeds configured")]
    NoFeedsConfigured,
    #[error("document {0:?} not found")]
    DocumentNotFound(DocumentId),
    #[error("no matching feed item in the visible window for document {0:?}")]
    FeedItemNotFound(DocumentId),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The feed transport. XML parsing and HTTP policy (timeouts, retries) are
/// its concern; the engine only sees parsed items or an error per feed.
pub trait FeedTransport {
    fn fetch_items(
        &self,
        feed_url: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<FeedItem>, TransportError>;
}

/// The persisted document store.
pub trait DocumentStore {
    /// Duplicate suppression probe: true when any document carries this
    /// guid or this content hash.
    fn exists_by_guid_or_hash(&self, guid: &str, hash: &str) -> bool;
    /// Persist a new document; the `id` field of the argument is ignored
    /// and the assigned id returned.
    fn create(&self, doc: ImportedDocument) -> Result<DocumentId, StoreError>;
    fn update(&self, doc: &ImportedDocument) -> Result<(), StoreError>;
    /// Remove a document entirely. Deleting an unknown id is not an error.
    fn delete(&self, id: DocumentId) -> Result<(), StoreError>;
    fn get(&self, id: DocumentId) -> Option<ImportedDocument>;
    fn set_out_of_sync(&self, id: DocumentId, out_of_sync: bool) -> Result<(), StoreError>;
    /// Most recently imported document ids, newest first. Used by the
    /// scheduled drift scan.
    fn recent_imported_ids(&self, limit: usize) -> Vec<DocumentId>;
}

/// The host media store plus its download transport.
pub trait MediaStore {
    fn download(&self, url: &str) -> Result<DownloadedBytes, StoreError>;
    fn store(
        &self,
        bytes: &[u8],
        filename: &str,
        content_hash: &str,
        source_url: &str,
    ) -> Result<AssetId, StoreError>;
    fn resolve_url(&self, asset: AssetId) -> Option<String>;
    fn find_by_source_url(&self, url: &str) -> Option<AssetId>;
    fn find_by_content_hash(&self, hash: &str) -> Option<AssetId>;
    /// Fuzzy last resort: match on the filename portion of the URL.
    fn find_by_filename(&self, filename: &str) -> Option<AssetId>;
}

/// The taxonomy term store.
pub trait TaxonomyStore {
    fn find_term_by_name(&self, name: &str) -> Option<TermId>;
    fn create_term(&self, name: &str) -> Result<TermId, StoreError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStatus {
    Imported,
    Skipped,
    Resynced,
    Warning,
    Error,
    Info,
}

impl fmt::Display for LogStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogStatus::Imported => write!(f, "imported"),
            LogStatus::Skipped => write!(f, "skipped"),
            LogStatus::Resynced => write!(f, "resynced"),
            LogStatus::Warning => write!(f, "warning"),
            LogStatus::Error => write!(f, "error"),
            LogStatus::Info => write!(f, "info"),
        }
    }
}

/// Append-only import log. Recording never fails from the engine's point of
/// view; the sink owns its own durability.
pub trait LogSink {
    fn record(
        &self,
        source_ref: &str,
        title: &str,
        status: LogStatus,
        message: &str,
        document_id: Option<DocumentId>,
    );
}
