use import_core::{DocumentId, DocumentStatus, FeedItem, ImportSettings, ScheduleSettings};
use import_engine::{
    run_tick, ChangeDetector, DocumentStore, ImportError, Importer, ImporterDeps,
    MemoryDocumentStore,
    MemoryMediaStore, MemoryTaxonomy, MemoryTransport, RecordingLog, ScheduleState,
};
use pretty_assertions::assert_eq;

const FEED: &str = "https://example.substack.com/feed";

struct Host {
    transport: MemoryTransport,
    documents: MemoryDocumentStore,
    media: MemoryMediaStore,
    taxonomy: MemoryTaxonomy,
    log: RecordingLog,
}

impl Host {
    fn new() -> Self {
        Self {
            transport: MemoryTransport::new(),
            documents: MemoryDocumentStore::new(),
            media: MemoryMediaStore::new(),
            taxonomy: MemoryTaxonomy::new(),
            log: RecordingLog::new(),
        }
    }

    fn importer<'a>(&'a self, settings: &'a ImportSettings) -> Importer<'a> {
        Importer::new(
            ImporterDeps {
                transport: &self.transport,
                documents: &self.documents,
                media: &self.media,
                taxonomy: &self.taxonomy,
                log: &self.log,
            },
            settings,
            &[],
            &[],
        )
    }
}

fn item(guid: &str, title: &str, content: &str) -> FeedItem {
    FeedItem {
        guid: guid.to_string(),
        title: title.to_string(),
        link: format!("https://example.substack.com/p/{guid}"),
        publish_date: None,
        raw_content: content.to_string(),
        categories: Vec::new(),
    }
}

fn feed_settings() -> ImportSettings {
    ImportSettings {
        feed_urls: vec![FEED.to_string()],
        ..ImportSettings::default()
    }
}

#[test]
fn unchanged_upstream_reports_found_but_not_changed() {
    let host = Host::new();
    host.transport
        .set_items(FEED, vec![item("g1", "Hello", "<p>v1</p>")]);
    let settings = feed_settings();
    let importer = host.importer(&settings);
    importer.import_batch(&importer.fetch_window(0).expect("fetch"));

    let detector = ChangeDetector::new(&importer);
    let id = host.documents.all()[0].id;
    let check = detector.check_for_update(id).expect("check");
    assert!(check.found);
    assert!(!check.changed);
    assert_eq!(check.new_hash, check.old_hash);
    assert!(!host.documents.get(id).expect("doc").out_of_sync);
}

#[test]
fn drift_sets_the_out_of_sync_flag_and_resync_clears_it() {
    let host = Host::new();
    host.transport
        .set_items(FEED, vec![item("g1", "Hello", "<p>v1</p>")]);
    let settings = ImportSettings {
        default_status: DocumentStatus::Published,
        ..feed_settings()
    };
    let importer = host.importer(&settings);
    importer.import_batch(&importer.fetch_window(0).expect("fetch"));
    let id = host.documents.all()[0].id;

    host.transport
        .set_items(FEED, vec![item("g1", "Hello v2", "<p>v2</p>")]);
    let detector = ChangeDetector::new(&importer);
    let check = detector.check_for_update(id).expect("check");
    assert!(check.found && check.changed);
    assert!(host.documents.get(id).expect("doc").out_of_sync);

    assert_eq!(detector.resync(id).expect("resync"), true);
    let doc = host.documents.get(id).expect("doc");
    assert!(!doc.out_of_sync);
    assert!(doc.block_content.contains("v2"));
    assert_eq!(doc.title, "Hello v2");
    // Resync preserves the document's publish state.
    assert_eq!(doc.status, DocumentStatus::Published);
}

#[test]
fn resync_is_a_no_op_when_hashes_match() {
    let host = Host::new();
    host.transport
        .set_items(FEED, vec![item("g1", "Hello", "<p>v1</p>")]);
    let settings = feed_settings();
    let importer = host.importer(&settings);
    importer.import_batch(&importer.fetch_window(0).expect("fetch"));
    let id = host.documents.all()[0].id;
    let before = host.documents.get(id).expect("doc");

    let detector = ChangeDetector::new(&importer);
    assert_eq!(detector.resync(id).expect("resync"), false);
    let after = host.documents.get(id).expect("doc");
    assert_eq!(after.block_content, before.block_content);
    assert_eq!(after.content_hash, before.content_hash);
}

#[test]
fn item_outside_the_visible_window_is_reported_not_found() {
    let host = Host::new();
    host.transport
        .set_items(FEED, vec![item("g1", "Hello", "<p>v1</p>")]);
    let settings = feed_settings();
    let importer = host.importer(&settings);
    importer.import_batch(&importer.fetch_window(0).expect("fetch"));
    let id = host.documents.all()[0].id;

    host.transport.set_items(FEED, Vec::new());
    let detector = ChangeDetector::new(&importer);
    let check = detector.check_for_update(id).expect("check");
    assert!(!check.found);
    assert!(!check.changed);
    assert!(matches!(
        detector.resync(id),
        Err(ImportError::FeedItemNotFound(_))
    ));
}

#[test]
fn check_all_fans_out_and_keeps_per_document_results() {
    let host = Host::new();
    host.transport
        .set_items(FEED, vec![item("g1", "Hello", "<p>v1</p>")]);
    let settings = feed_settings();
    let importer = host.importer(&settings);
    importer.import_batch(&importer.fetch_window(0).expect("fetch"));
    let id = host.documents.all()[0].id;

    let detector = ChangeDetector::new(&importer);
    let results = detector.check_all(&[id, DocumentId(999)]);
    assert!(results[&id].as_ref().expect("check").found);
    assert!(matches!(
        results[&DocumentId(999)],
        Err(ImportError::DocumentNotFound(_))
    ));
}

#[test]
fn tick_advances_the_offset_by_processed_items_only() {
    let host = Host::new();
    host.transport.set_items(
        FEED,
        vec![
            item("g1", "One", "<p>a</p>"),
            item("g2", "Two", "<p>b</p>"),
        ],
    );
    let settings = ImportSettings {
        schedule: ScheduleSettings {
            enabled: true,
            import_limit: 1,
            ..ScheduleSettings::default()
        },
        ..feed_settings()
    };
    let importer = host.importer(&settings);
    let mut state = ScheduleState::new();

    let first = run_tick(&importer, &mut state).expect("tick");
    assert_eq!(first.batch.imported, 1);
    assert_eq!((first.offset_before, first.offset_after), (0, 1));

    let second = run_tick(&importer, &mut state).expect("tick");
    assert_eq!(second.batch.imported, 1);
    assert_eq!((second.offset_before, second.offset_after), (1, 2));

    // Nothing left upstream: the offset stays put.
    let third = run_tick(&importer, &mut state).expect("tick");
    assert_eq!(third.batch.total_processed(), 0);
    assert_eq!((third.offset_before, third.offset_after), (2, 2));
    assert_eq!(host.documents.len(), 2);
}

#[test]
fn disabled_schedule_makes_the_tick_a_no_op() {
    let host = Host::new();
    host.transport
        .set_items(FEED, vec![item("g1", "One", "<p>a</p>")]);
    let settings = feed_settings();
    let importer = host.importer(&settings);
    let mut state = ScheduleState::new();

    let report = run_tick(&importer, &mut state).expect("tick");
    assert_eq!(report.batch.total_processed(), 0);
    assert_eq!(state.offset, 0);
    assert!(host.documents.is_empty());
}

#[test]
fn auto_resync_repairs_drift_found_during_a_tick() {
    let host = Host::new();
    host.transport
        .set_items(FEED, vec![item("g1", "Hello", "<p>v1</p>")]);
    let settings = ImportSettings {
        schedule: ScheduleSettings {
            enabled: true,
            import_limit: 5,
            check_updates: true,
            auto_resync: true,
        },
        ..feed_settings()
    };
    let importer = host.importer(&settings);
    let mut state = ScheduleState::new();

    let first = run_tick(&importer, &mut state).expect("tick");
    assert_eq!(first.batch.imported, 1);
    assert_eq!(first.drift_detected, 0);

    host.transport
        .set_items(FEED, vec![item("g1", "Hello", "<p>v2</p>")]);
    let second = run_tick(&importer, &mut state).expect("tick");
    assert_eq!(second.drift_detected, 1);
    assert_eq!(second.resynced, 1);

    let doc = &host.documents.all()[0];
    assert!(!doc.out_of_sync);
    assert!(doc.block_content.contains("v2"));
}

#[test]
fn check_without_auto_resync_only_flags_the_document() {
    let host = Host::new();
    host.transport
        .set_items(FEED, vec![item("g1", "Hello", "<p>v1</p>")]);
    let settings = ImportSettings {
        schedule: ScheduleSettings {
            enabled: true,
            import_limit: 5,
            check_updates: true,
            auto_resync: false,
        },
        ..feed_settings()
    };
    let importer = host.importer(&settings);
    let mut state = ScheduleState::new();
    run_tick(&importer, &mut state).expect("tick");

    host.transport
        .set_items(FEED, vec![item("g1", "Hello", "<p>v2</p>")]);
    let report = run_tick(&importer, &mut state).expect("tick");
    assert_eq!(report.drift_detected, 1);
    assert_eq!(report.resynced, 0);

    let doc = &host.documents.all()[0];
    assert!(doc.out_of_sync);
    assert!(doc.block_content.contains("v1"));
}
