use std::cell::{Cell, RefCell};
use std::fs;
use std::io;
use std::path::PathBuf;

use import_core::AssetId;
use import_engine::{DownloadedBytes, HttpDownloader, MediaStore, StoreError};
use import_logging::import_warn;
use serde::{Deserialize, Serialize};

use crate::persist::{AtomicFileWriter, PersistError};

const INDEX_FILENAME: &str = ".media_index.ron";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct AssetRecord {
    id: u64,
    filename: String,
    content_hash: String,
    source_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct MediaIndex {
    assets: Vec<AssetRecord>,
}

/// Media store backed by a directory on disk. Downloads go through the
/// engine's HTTP downloader; the dedup indexes survive across runs in a
/// RON index file next to the media files.
pub struct DiskMediaStore {
    dir: PathBuf,
    downloader: HttpDownloader,
    assets: RefCell<Vec<AssetRecord>>,
    next_id: Cell<u64>,
    dirty: Cell<bool>,
}

impl DiskMediaStore {
    pub fn open(dir: PathBuf, downloader: HttpDownloader) -> Self {
        let assets = load_index(&dir);
        let next_id = assets.iter().map(|record| record.id).max().unwrap_or(0) + 1;
        Self {
            dir,
            downloader,
            assets: RefCell::new(assets),
            next_id: Cell::new(next_id),
            dirty: Cell::new(false),
        }
    }

    /// Write the index back to disk if anything changed this run.
    pub fn save_index(&self) -> Result<(), PersistError> {
        if !self.dirty.get() {
            return Ok(());
        }
        let index = MediaIndex {
            assets: self.assets.borrow().clone(),
        };
        let pretty = ron::ser::PrettyConfig::new();
        let content = ron::ser::to_string_pretty(&index, pretty)
            .map_err(|err| PersistError::Serialize(err.to_string()))?;
        AtomicFileWriter::new(self.dir.clone()).write(INDEX_FILENAME, content.as_bytes())?;
        self.dirty.set(false);
        Ok(())
    }

    fn stored_filename(id: u64, filename: &str) -> String {
        format!("{id}-{filename}")
    }
}

fn load_index(dir: &std::path::Path) -> Vec<AssetRecord> {
    let path = dir.join(INDEX_FILENAME);
    let content = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Vec::new(),
        Err(err) => {
            import_warn!("Failed to read media index from {:?}: {}", path, err);
            return Vec::new();
        }
    };
    match ron::from_str::<MediaIndex>(&content) {
        Ok(index) => index.assets,
        Err(err) => {
            import_warn!("Failed to parse media index from {:?}: {}", path, err);
            Vec::new()
        }
    }
}

impl MediaStore for DiskMediaStore {
    fn download(&self, url: &str) -> Result<DownloadedBytes, StoreError> {
        self.downloader.download(url)
    }

    fn store(
        &self,
        bytes: &[u8],
        filename: &str,
        content_hash: &str,
        source_url: &str,
    ) -> Result<AssetId, StoreError> {
        let id = self.next_id.get();
        let stored = Self::stored_filename(id, filename);
        AtomicFileWriter::new(self.dir.clone())
            .write(&stored, bytes)
            .map_err(|err| StoreError::Persistence(err.to_string()))?;

        self.next_id.set(id + 1);
        self.assets.borrow_mut().push(AssetRecord {
            id,
            filename: filename.to_string(),
            content_hash: content_hash.to_string(),
            source_url: source_url.to_string(),
        });
        self.dirty.set(true);
        Ok(AssetId(id))
    }

    fn resolve_url(&self, asset: AssetId) -> Option<String> {
        self.assets
            .borrow()
            .iter()
            .find(|record| record.id == asset.0)
            .map(|record| {
                self.dir
                    .join(Self::stored_filename(record.id, &record.filename))
                    .to_string_lossy()
                    .into_owned()
            })
    }

    fn find_by_source_url(&self, url: &str) -> Option<AssetId> {
        self.assets
            .borrow()
            .iter()
            .find(|record| record.source_url == url)
            .map(|record| AssetId(record.id))
    }

    fn find_by_content_hash(&self, hash: &str) -> Option<AssetId> {
        self.assets
            .borrow()
            .iter()
            .find(|record| record.content_hash == hash)
            .map(|record| AssetId(record.id))
    }

    fn find_by_filename(&self, filename: &str) -> Option<AssetId> {
        self.assets
            .borrow()
            .iter()
            .find(|record| record.filename == filename)
            .map(|record| AssetId(record.id))
    }
}
