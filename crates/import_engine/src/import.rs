use import_core::{
    AssetId, BatchOutcome, DocumentId, FeedItem, ImportSettings, ImportedDocument, TermId,
    UtmStats,
};
use import_logging::{import_info, import_warn};
use url::Url;

use crate::blocks::convert_to_blocks;
use crate::caption::normalize_captioned_images;
use crate::categories::{CategoryMappingRule, CategoryResolver};
use crate::hash::content_hash;
use crate::media::{remove_cover_image, MediaCache, MediaLocalizer};
use crate::sanitize::sanitize;
use crate::stores::{
    DocumentStore, FeedTransport, ImportError, LogSink, LogStatus, MediaStore, TaxonomyStore,
};
use crate::utm::{apply_utm, slugify, UtmContext, UtmRule};
use crate::validate::validate_blocks;

/// External collaborators the importer drives. All trait objects; tests and
/// the CLI host plug in the in-memory implementations.
pub struct ImporterDeps<'a> {
    pub transport: &'a dyn FeedTransport,
    pub documents: &'a dyn DocumentStore,
    pub media: &'a dyn MediaStore,
    pub taxonomy: &'a dyn TaxonomyStore,
    pub log: &'a dyn LogSink,
}

/// Top-level import orchestrator. Runs each feed item through the pipeline
/// stages in order and tallies the tri-count outcome; per-item trouble is
/// logged and counted, never propagated.
pub struct Importer<'a> {
    deps: ImporterDeps<'a>,
    settings: &'a ImportSettings,
    category_rules: &'a [CategoryMappingRule],
    utm_rules: &'a [UtmRule],
}

enum ItemResult {
    Imported,
    Skipped,
    Failed,
}

impl<'a> Importer<'a> {
    pub fn new(
        deps: ImporterDeps<'a>,
        settings: &'a ImportSettings,
        category_rules: &'a [CategoryMappingRule],
        utm_rules: &'a [UtmRule],
    ) -> Self {
        Self {
            deps,
            settings,
            category_rules,
            utm_rules,
        }
    }

    pub(crate) fn deps(&self) -> &ImporterDeps<'a> {
        &self.deps
    }

    pub(crate) fn settings(&self) -> &ImportSettings {
        self.settings
    }

    /// Fetch one window of items from every configured feed, in configured
    /// order. A feed whose fetch fails is logged and skipped; the others
    /// still contribute.
    pub fn fetch_window(&self, offset: usize) -> Result<Vec<FeedItem>, ImportError> {
        if self.settings.feed_urls.is_empty() {
            return Err(ImportError::NoFeedsConfigured);
        }
        let mut items = Vec::new();
        for feed_url in &self.settings.feed_urls {
            match self
                .deps
                .transport
                .fetch_items(feed_url, offset, self.settings.feed_window)
            {
                Ok(batch) => items.extend(batch),
                Err(err) => {
                    import_warn!("feed fetch failed for {feed_url}: {err}");
                    self.deps.log.record(
                        feed_url,
                        "",
                        LogStatus::Error,
                        &format!("feed fetch failed: {err}"),
                        None,
                    );
                }
            }
        }
        Ok(items)
    }

    /// Import a batch of feed items. One media cache spans the whole batch;
    /// it dies with this call.
    pub fn import_batch(&self, items: &[FeedItem]) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        let mut cache = MediaCache::new();
        for item in items {
            match self.import_item(item, &mut cache) {
                ItemResult::Imported => outcome.imported += 1,
                ItemResult::Skipped => outcome.skipped += 1,
                ItemResult::Failed => outcome.errors += 1,
            }
        }
        import_info!(
            "batch done: {} imported, {} skipped, {} errors",
            outcome.imported,
            outcome.skipped,
            outcome.errors
        );
        outcome
    }

    fn import_item(&self, item: &FeedItem, cache: &mut MediaCache) -> ItemResult {
        let sanitized = sanitize(&item.raw_content);
        let hash = content_hash(&sanitized);

        if self.deps.documents.exists_by_guid_or_hash(&item.guid, &hash) {
            self.deps.log.record(
                item.source_ref(),
                &item.title,
                LogStatus::Skipped,
                "duplicate guid or content hash",
                None,
            );
            return ItemResult::Skipped;
        }

        let terms = self.resolve_terms(&item.categories);
        let id = match self.deps.documents.create(ImportedDocument {
            id: DocumentId(0),
            guid: item.guid.clone(),
            content_hash: hash.clone(),
            title: item.title.clone(),
            source_link: item.link.clone(),
            block_content: String::new(),
            status: self.settings.default_status,
            publish_date: item.publish_date,
            out_of_sync: false,
            category_terms: terms.clone(),
            cover_asset: None,
        }) {
            Ok(id) => id,
            Err(err) => {
                self.deps.log.record(
                    item.source_ref(),
                    &item.title,
                    LogStatus::Error,
                    &format!("document create failed: {err}"),
                    None,
                );
                return ItemResult::Failed;
            }
        };

        let (block_content, cover, utm) = self.render_body(item, id, &sanitized, cache);
        let doc = ImportedDocument {
            id,
            guid: item.guid.clone(),
            content_hash: hash,
            title: item.title.clone(),
            source_link: item.link.clone(),
            block_content: block_content.clone(),
            status: self.settings.default_status,
            publish_date: item.publish_date,
            out_of_sync: false,
            category_terms: terms,
            cover_asset: cover,
        };
        if let Err(err) = self.deps.documents.update(&doc) {
            self.deps.log.record(
                item.source_ref(),
                &item.title,
                LogStatus::Error,
                &format!("document update failed: {err}"),
                Some(id),
            );
            // Drop the body-less shell so the guid does not block a retry on
            // the next run. If the delete fails too, the shell stays and the
            // item will be reported as a duplicate from here on.
            if let Err(err) = self.deps.documents.delete(id) {
                import_warn!("cleanup of partial document {id:?} failed: {err}");
            }
            return ItemResult::Failed;
        }

        self.report_validation(item, id, &block_content);

        let message = if utm.scanned > 0 {
            format!("imported; {} of {} links tagged", utm.tagged, utm.scanned)
        } else {
            "imported".to_string()
        };
        self.deps.log.record(
            item.source_ref(),
            &item.title,
            LogStatus::Imported,
            &message,
            Some(id),
        );
        ItemResult::Imported
    }

    /// The post-sanitize rendering stages, shared between first import and
    /// resync: localize media, pull out the cover, normalize captions, tag
    /// links, convert to blocks.
    pub(crate) fn render_body(
        &self,
        item: &FeedItem,
        doc_id: DocumentId,
        sanitized: &str,
        cache: &mut MediaCache,
    ) -> (String, Option<AssetId>, UtmStats) {
        let localizer = MediaLocalizer::new(self.deps.media);
        let localized = localizer.localize(sanitized, cache);

        let mut html = localized.html;
        if let Some(cover) = localized.cover {
            if let Some(cover_url) = self.deps.media.resolve_url(cover) {
                html = remove_cover_image(&html, &cover_url);
            }
        }
        let html = normalize_captioned_images(&html);

        let slug = slugify(&item.title);
        let source_host = Url::parse(&item.link)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
            .unwrap_or_default();
        let ctx = UtmContext {
            slug: &slug,
            doc_id,
            source_host: &source_host,
            publish_date: item.publish_date,
        };
        let (html, utm) = apply_utm(&html, &self.settings.utm, self.utm_rules, &ctx);

        let blocks = convert_to_blocks(&html, self.settings.block_style);
        (blocks, localized.cover, utm)
    }

    pub(crate) fn resolve_terms(&self, labels: &[String]) -> Vec<TermId> {
        CategoryResolver::new(
            self.category_rules,
            self.deps.taxonomy,
            self.settings.default_term,
        )
        .resolve(labels, &[])
    }

    fn report_validation(&self, item: &FeedItem, id: DocumentId, block_content: &str) {
        let report = validate_blocks(block_content);
        for warning in &report.warnings {
            self.deps.log.record(
                item.source_ref(),
                &item.title,
                LogStatus::Warning,
                warning,
                Some(id),
            );
        }
        for error in &report.errors {
            self.deps.log.record(
                item.source_ref(),
                &item.title,
                LogStatus::Error,
                error,
                Some(id),
            );
        }
    }
}
