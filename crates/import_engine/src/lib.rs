//! Import engine: the feed-to-blocks transformation pipeline.
//!
//! Data flows through the stages in a fixed order: sanitize, localize media,
//! normalize captions, convert to blocks, validate. The change detector runs
//! separately and re-enters the same pipeline when drift is confirmed.
mod alt;
mod blocks;
mod caption;
mod categories;
mod fetch;
mod hash;
mod import;
mod media;
mod memory;
mod resync;
mod sanitize;
mod schedule;
mod srcset;
mod stores;
mod utm;
mod validate;

pub use alt::alt_text_from_url;
pub use blocks::{convert_to_blocks, SEPARATOR_CLASS};
pub use caption::{normalize_captioned_images, CAPTION_CONTAINER_CLASS};
pub use categories::{CategoryMappingRule, CategoryResolver, MatchType, RuleError};
pub use fetch::{FetchSettings, HttpDownloader};
pub use hash::content_hash;
pub use import::{Importer, ImporterDeps};
pub use media::{LocalizedHtml, MediaCache, MediaLocalizer};
pub use memory::{
    LogEntry, MemoryDocumentStore, MemoryMediaStore, MemoryTaxonomy, MemoryTransport, RecordingLog,
};
pub use resync::ChangeDetector;
pub use sanitize::sanitize;
pub use schedule::{run_tick, ScheduleState};
pub use stores::{
    DocumentStore, DownloadedBytes, FeedTransport, ImportError, LogSink, LogStatus, MediaStore,
    StoreError, TaxonomyStore, TransportError,
};
pub use utm::{apply_utm, UtmContext, UtmRule};
pub use validate::validate_blocks;
