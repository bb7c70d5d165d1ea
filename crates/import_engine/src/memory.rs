//! In-memory implementations of the collaborator traits, used by the test
//! suites and by the CLI host. Interior mutability keeps the trait methods
//! on `&self`, matching how a real host-backed store would look.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use import_core::{AssetId, DocumentId, FeedItem, ImportedDocument, TermId};
use import_logging::import_debug;

use crate::stores::{
    DocumentStore, DownloadedBytes, FeedTransport, LogSink, LogStatus, MediaStore, StoreError,
    TaxonomyStore, TransportError,
};

/// Feed transport over preloaded item lists, one per feed URL.
#[derive(Default)]
pub struct MemoryTransport {
    feeds: RefCell<HashMap<String, Vec<FeedItem>>>,
    failing: RefCell<Vec<String>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_items(&self, feed_url: &str, items: Vec<FeedItem>) {
        self.feeds.borrow_mut().insert(feed_url.to_string(), items);
    }

    /// Make every fetch of this feed fail with a transport error.
    pub fn fail_feed(&self, feed_url: &str) {
        self.failing.borrow_mut().push(feed_url.to_string());
    }
}

impl FeedTransport for MemoryTransport {
    fn fetch_items(
        &self,
        feed_url: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<FeedItem>, TransportError> {
        if self.failing.borrow().iter().any(|url| url == feed_url) {
            return Err(TransportError::Unreachable(feed_url.to_string()));
        }
        let feeds = self.feeds.borrow();
        let items = feeds.get(feed_url).cloned().unwrap_or_default();
        Ok(items.into_iter().skip(offset).take(limit).collect())
    }
}

/// Document store over a plain vector, insertion-ordered.
pub struct MemoryDocumentStore {
    docs: RefCell<Vec<ImportedDocument>>,
    next_id: Cell<u64>,
    fail_writes: Cell<bool>,
    fail_updates: Cell<bool>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self {
            docs: RefCell::new(Vec::new()),
            next_id: Cell::new(1),
            fail_writes: Cell::new(false),
            fail_updates: Cell::new(false),
        }
    }

    /// Make every create/update fail with a persistence error.
    pub fn fail_writes(&self) {
        self.fail_writes.set(true);
    }

    /// Make only updates fail; creates and deletes keep working.
    pub fn fail_updates(&self, fail: bool) {
        self.fail_updates.set(fail);
    }

    pub fn len(&self) -> usize {
        self.docs.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.borrow().is_empty()
    }

    pub fn all(&self) -> Vec<ImportedDocument> {
        self.docs.borrow().clone()
    }
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn exists_by_guid_or_hash(&self, guid: &str, hash: &str) -> bool {
        self.docs
            .borrow()
            .iter()
            .any(|doc| doc.guid == guid || doc.content_hash == hash)
    }

    fn create(&self, mut doc: ImportedDocument) -> Result<DocumentId, StoreError> {
        if self.fail_writes.get() {
            return Err(StoreError::Persistence("write disabled".to_string()));
        }
        let id = DocumentId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        doc.id = id;
        self.docs.borrow_mut().push(doc);
        Ok(id)
    }

    fn update(&self, doc: &ImportedDocument) -> Result<(), StoreError> {
        if self.fail_writes.get() || self.fail_updates.get() {
            return Err(StoreError::Persistence("write disabled".to_string()));
        }
        let mut docs = self.docs.borrow_mut();
        let stored = docs
            .iter_mut()
            .find(|stored| stored.id == doc.id)
            .ok_or_else(|| StoreError::Persistence(format!("no document {:?}", doc.id)))?;
        *stored = doc.clone();
        Ok(())
    }

    fn delete(&self, id: DocumentId) -> Result<(), StoreError> {
        if self.fail_writes.get() {
            return Err(StoreError::Persistence("write disabled".to_string()));
        }
        self.docs.borrow_mut().retain(|doc| doc.id != id);
        Ok(())
    }

    fn get(&self, id: DocumentId) -> Option<ImportedDocument> {
        self.docs.borrow().iter().find(|doc| doc.id == id).cloned()
    }

    fn set_out_of_sync(&self, id: DocumentId, out_of_sync: bool) -> Result<(), StoreError> {
        let mut docs = self.docs.borrow_mut();
        let stored = docs
            .iter_mut()
            .find(|stored| stored.id == id)
            .ok_or_else(|| StoreError::Persistence(format!("no document {id:?}")))?;
        stored.out_of_sync = out_of_sync;
        Ok(())
    }

    fn recent_imported_ids(&self, limit: usize) -> Vec<DocumentId> {
        self.docs
            .borrow()
            .iter()
            .rev()
            .take(limit)
            .map(|doc| doc.id)
            .collect()
    }
}

struct StoredAsset {
    id: AssetId,
    filename: String,
    content_hash: String,
    source_url: String,
}

/// Media store with canned download responses keyed by URL.
pub struct MemoryMediaStore {
    assets: RefCell<Vec<StoredAsset>>,
    responses: RefCell<HashMap<String, DownloadedBytes>>,
    failing: RefCell<Vec<String>>,
    next_id: Cell<u64>,
}

impl MemoryMediaStore {
    pub fn new() -> Self {
        Self {
            assets: RefCell::new(Vec::new()),
            responses: RefCell::new(HashMap::new()),
            failing: RefCell::new(Vec::new()),
            next_id: Cell::new(1),
        }
    }

    pub fn set_bytes(&self, url: &str, bytes: &[u8]) {
        self.responses
            .borrow_mut()
            .insert(url.to_string(), bytes.to_vec());
    }

    /// Make every download of this URL fail.
    pub fn fail_download(&self, url: &str) {
        self.failing.borrow_mut().push(url.to_string());
    }

    pub fn asset_count(&self) -> usize {
        self.assets.borrow().len()
    }
}

impl Default for MemoryMediaStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaStore for MemoryMediaStore {
    fn download(&self, url: &str) -> Result<DownloadedBytes, StoreError> {
        if self.failing.borrow().iter().any(|failing| failing == url) {
            return Err(StoreError::Download(format!("unreachable: {url}")));
        }
        self.responses
            .borrow()
            .get(url)
            .cloned()
            .ok_or_else(|| StoreError::Download(format!("no response for {url}")))
    }

    fn store(
        &self,
        _bytes: &[u8],
        filename: &str,
        content_hash: &str,
        source_url: &str,
    ) -> Result<AssetId, StoreError> {
        let id = AssetId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.assets.borrow_mut().push(StoredAsset {
            id,
            filename: filename.to_string(),
            content_hash: content_hash.to_string(),
            source_url: source_url.to_string(),
        });
        Ok(id)
    }

    fn resolve_url(&self, asset: AssetId) -> Option<String> {
        self.assets
            .borrow()
            .iter()
            .find(|stored| stored.id == asset)
            .map(|stored| format!("/media/{}/{}", stored.id.0, stored.filename))
    }

    fn find_by_source_url(&self, url: &str) -> Option<AssetId> {
        self.assets
            .borrow()
            .iter()
            .find(|stored| stored.source_url == url)
            .map(|stored| stored.id)
    }

    fn find_by_content_hash(&self, hash: &str) -> Option<AssetId> {
        self.assets
            .borrow()
            .iter()
            .find(|stored| stored.content_hash == hash)
            .map(|stored| stored.id)
    }

    fn find_by_filename(&self, filename: &str) -> Option<AssetId> {
        self.assets
            .borrow()
            .iter()
            .find(|stored| stored.filename == filename)
            .map(|stored| stored.id)
    }
}

/// Taxonomy store over a name/id list.
pub struct MemoryTaxonomy {
    terms: RefCell<Vec<(TermId, String)>>,
    next_id: Cell<u64>,
    fail_creates: Cell<bool>,
}

impl MemoryTaxonomy {
    pub fn new() -> Self {
        Self {
            terms: RefCell::new(Vec::new()),
            next_id: Cell::new(1),
            fail_creates: Cell::new(false),
        }
    }

    pub fn with_terms(names: &[&str]) -> Self {
        let store = Self::new();
        for name in names {
            let _ = store.create_term(name);
        }
        store
    }

    pub fn fail_creates(&self) {
        self.fail_creates.set(true);
    }

    pub fn term_names(&self) -> Vec<String> {
        self.terms
            .borrow()
            .iter()
            .map(|(_, name)| name.clone())
            .collect()
    }
}

impl Default for MemoryTaxonomy {
    fn default() -> Self {
        Self::new()
    }
}

impl TaxonomyStore for MemoryTaxonomy {
    fn find_term_by_name(&self, name: &str) -> Option<TermId> {
        self.terms
            .borrow()
            .iter()
            .find(|(_, stored)| stored == name)
            .map(|(id, _)| *id)
    }

    fn create_term(&self, name: &str) -> Result<TermId, StoreError> {
        if self.fail_creates.get() {
            return Err(StoreError::Persistence("term creation disabled".to_string()));
        }
        let id = TermId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.terms.borrow_mut().push((id, name.to_string()));
        Ok(id)
    }
}

/// One recorded log entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub source_ref: String,
    pub title: String,
    pub status: LogStatus,
    pub message: String,
    pub document_id: Option<DocumentId>,
}

/// Log sink that records every entry for later assertion.
#[derive(Default)]
pub struct RecordingLog {
    entries: RefCell<Vec<LogEntry>>,
}

impl RecordingLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.borrow().clone()
    }

    pub fn count_with_status(&self, status: LogStatus) -> usize {
        self.entries
            .borrow()
            .iter()
            .filter(|entry| entry.status == status)
            .count()
    }
}

impl LogSink for RecordingLog {
    fn record(
        &self,
        source_ref: &str,
        title: &str,
        status: LogStatus,
        message: &str,
        document_id: Option<DocumentId>,
    ) {
        import_debug!("import log [{status}] {source_ref}: {message}");
        self.entries.borrow_mut().push(LogEntry {
            source_ref: source_ref.to_string(),
            title: title.to_string(),
            status,
            message: message.to_string(),
            document_id,
        });
    }
}
