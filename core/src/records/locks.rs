use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Exclusive access to one audio file's record set. Released on drop.
pub struct FileGuard {
    audio_file_id: String,
    _guard: OwnedMutexGuard<()>,
}

impl FileGuard {
    pub fn audio_file_id(&self) -> &str {
        &self.audio_file_id
    }
}

/// Single-writer-per-file registry: one lock per audio file id.
#[derive(Default, Clone)]
pub struct RecordLocks {
    locks: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl RecordLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, audio_file_id: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = match self.locks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        locks
            .entry(audio_file_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    pub async fn acquire(&self, audio_file_id: &str) -> FileGuard {
        let guard = self.slot(audio_file_id).lock_owned().await;
        FileGuard {
            audio_file_id: audio_file_id.to_string(),
            _guard: guard,
        }
    }

    /// Blocking variant for worker threads outside an async context.
    pub fn blocking_acquire(&self, audio_file_id: &str) -> FileGuard {
        let guard = self.slot(audio_file_id).blocking_lock_owned();
        FileGuard {
            audio_file_id: audio_file_id.to_string(),
            _guard: guard,
        }
    }

    pub fn try_acquire(&self, audio_file_id: &str) -> Option<FileGuard> {
        self.slot(audio_file_id)
            .try_lock_owned()
            .ok()
            .map(|guard| FileGuard {
                audio_file_id: audio_file_id.to_string(),
                _guard: guard,
            })
    }
}
