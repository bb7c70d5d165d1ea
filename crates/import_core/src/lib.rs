//! Import core: data model, settings, and outcome types for the feed import pipeline.
mod document;
mod item;
mod outcome;
mod settings;

pub use document::{AssetId, DocumentId, DocumentStatus, ImportedDocument, TermId};
pub use item::FeedItem;
pub use outcome::{BatchOutcome, TickReport, UpdateCheck, UtmStats, ValidationReport};
pub use settings::{
    BlockStyle, ImportSettings, ScheduleSettings, UtmSettings, DEFAULT_FEED_WINDOW,
};
