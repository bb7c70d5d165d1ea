use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use import_engine::ScheduleState;
use import_logging::import_warn;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;

const STATE_FILENAME: &str = ".import_state.ron";

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("data directory missing or not writable: {0}")]
    DataDir(String),
    #[error("serialize failed: {0}")]
    Serialize(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Ensure the data directory exists; create if missing.
pub fn ensure_data_dir(dir: &Path) -> Result<(), PersistError> {
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| PersistError::DataDir(e.to_string()))?;
        if !meta.is_dir() {
            return Err(PersistError::DataDir("path is not a directory".into()));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| PersistError::DataDir(e.to_string()))?;
    }
    // Basic writability probe: try creating a temp file.
    NamedTempFile::new_in(dir).map_err(|e| PersistError::DataDir(e.to_string()))?;
    Ok(())
}

/// Atomically write content to `{dir}/{filename}` by writing a temp file
/// then renaming.
pub struct AtomicFileWriter {
    dir: PathBuf,
}

impl AtomicFileWriter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn write(&self, filename: &str, content: &[u8]) -> Result<PathBuf, PersistError> {
        ensure_data_dir(&self.dir)?;

        let target = self.dir.join(filename);
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(content)?;
        tmp.flush()?;
        tmp.as_file_mut().sync_all()?;

        // Replace existing file if present to keep determinism.
        if target.exists() {
            fs::remove_file(&target)?;
        }
        tmp.persist(&target).map_err(|e| PersistError::Io(e.error))?;
        Ok(target)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PersistedSchedule {
    offset: usize,
}

/// Load the persisted schedule position; a missing or unreadable state file
/// just restarts from the top of the feeds.
pub fn load_schedule_state(data_dir: &Path) -> ScheduleState {
    let path = data_dir.join(STATE_FILENAME);
    let content = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return ScheduleState::new(),
        Err(err) => {
            import_warn!("Failed to read schedule state from {:?}: {}", path, err);
            return ScheduleState::new();
        }
    };
    match ron::from_str::<PersistedSchedule>(&content) {
        Ok(state) => ScheduleState {
            offset: state.offset,
        },
        Err(err) => {
            import_warn!("Failed to parse schedule state from {:?}: {}", path, err);
            ScheduleState::new()
        }
    }
}

pub fn save_schedule_state(data_dir: &Path, state: &ScheduleState) -> Result<(), PersistError> {
    let persisted = PersistedSchedule {
        offset: state.offset,
    };
    let pretty = ron::ser::PrettyConfig::new();
    let content = ron::ser::to_string_pretty(&persisted, pretty)
        .map_err(|err| PersistError::Serialize(err.to_string()))?;
    AtomicFileWriter::new(data_dir.to_path_buf()).write(STATE_FILENAME, content.as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{load_schedule_state, save_schedule_state};
    use import_engine::ScheduleState;

    #[test]
    fn schedule_state_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = ScheduleState { offset: 42 };
        save_schedule_state(dir.path(), &state).expect("save");
        assert_eq!(load_schedule_state(dir.path()), state);
    }

    #[test]
    fn missing_state_file_starts_from_zero() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert_eq!(load_schedule_state(dir.path()).offset, 0);
    }
}
