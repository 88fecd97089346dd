//! Durable per-audio-file storage of record sets.
//!
//! `JsonFileStore` keeps one pretty-printed JSON file per audio file id.
//! Writes go to a sibling `.tmp` file which is synced and then renamed over
//! the target, so a reader sees either the old or the new set, never a mix.

use crate::prelude::{DetectError, DetectResult};
use crate::records::record::RecordSet;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub trait RecordStore: Send + Sync {
    /// Returns `None` if nothing has been written for `audio_file_id` yet.
    fn load(&self, audio_file_id: &str) -> DetectResult<Option<RecordSet>>;

    /// Durably replaces the stored set for `set.audio_file_id`.
    fn save(&self, set: &RecordSet) -> DetectResult<()>;
}

pub struct JsonFileStore {
    root: PathBuf,
}

/// A fully written but not yet visible record set.
#[must_use = "a staged write is invisible until committed"]
pub struct StagedWrite {
    tmp_path: PathBuf,
    target: PathBuf,
}

impl StagedWrite {
    /// Atomically swaps the staged file into place.
    pub fn commit(self) -> DetectResult<()> {
        fs::rename(&self.tmp_path, &self.target)?;
        if let Some(parent) = self.target.parent() {
            // directory sync is best effort on platforms that refuse it
            if let Ok(dir) = File::open(parent) {
                let _ = dir.sync_all();
            }
        }
        Ok(())
    }

    /// Removes the staged file without touching the committed one.
    pub fn abort(self) -> DetectResult<()> {
        if self.tmp_path.exists() {
            fs::remove_file(&self.tmp_path)?;
        }
        Ok(())
    }
}

impl JsonFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Distinct ids always map to distinct files: bytes outside
    /// `[A-Za-z0-9._-]` are percent-encoded, `%` included.
    pub fn path_for(&self, audio_file_id: &str) -> PathBuf {
        let mut safe = String::with_capacity(audio_file_id.len());
        for byte in audio_file_id.bytes() {
            if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.') {
                safe.push(byte as char);
            } else {
                safe.push_str(&format!("%{:02X}", byte));
            }
        }
        self.root.join(format!("{}.records.json", safe))
    }

    /// Writes `set` next to its target without making it visible.
    pub fn stage(&self, set: &RecordSet) -> DetectResult<StagedWrite> {
        fs::create_dir_all(&self.root)?;
        let target = self.path_for(&set.audio_file_id);
        let tmp_path = target.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(set)?;
        let mut file = File::create(&tmp_path)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        Ok(StagedWrite { tmp_path, target })
    }
}

impl RecordStore for JsonFileStore {
    fn load(&self, audio_file_id: &str) -> DetectResult<Option<RecordSet>> {
        let path = self.path_for(audio_file_id);
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&path)?;
        let set: RecordSet = serde_json::from_str(&contents).map_err(|e| {
            DetectError::PersistenceFailure(format!("reading {}: {}", path.display(), e))
        })?;
        if set.audio_file_id != audio_file_id {
            return Err(DetectError::PersistenceFailure(format!(
                "{} holds records for {:?}, not {:?}",
                path.display(),
                set.audio_file_id,
                audio_file_id
            )));
        }
        Ok(Some(set))
    }

    fn save(&self, set: &RecordSet) -> DetectResult<()> {
        self.stage(set)?.commit()
    }
}

/// In-memory store (for tests and dry runs).
#[derive(Default)]
pub struct InMemoryStore {
    data: Mutex<HashMap<String, RecordSet>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for InMemoryStore {
    fn load(&self, audio_file_id: &str) -> DetectResult<Option<RecordSet>> {
        let data = self
            .data
            .lock()
            .map_err(|_| DetectError::PersistenceFailure("store lock poisoned".into()))?;
        Ok(data.get(audio_file_id).cloned())
    }

    fn save(&self, set: &RecordSet) -> DetectResult<()> {
        let mut data = self
            .data
            .lock()
            .map_err(|_| DetectError::PersistenceFailure("store lock poisoned".into()))?;
        data.insert(set.audio_file_id.clone(), set.clone());
        Ok(())
    }
}
