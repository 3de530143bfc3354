//! Durable checkpoint storage.
//!
//! Checkpoints are persisted at every terminal transition of a run so that
//! partial progress survives crashes, cancellation, and iteration
//! exhaustion. The file store writes one pretty-printed JSON file per task
//! id — simple, portable, human-inspectable.
//!
//! Storage location: `~/.irontask/checkpoints/<task_id>.json`

use crate::checkpoint::Checkpoint;
use async_trait::async_trait;
use irontask_core::error::CheckpointError;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::RwLock;
use tracing::debug;

/// A keyed durable store for checkpoints.
///
/// `load` must reconstruct a checkpoint equivalent to what was saved: same
/// step order, labels, flags, and payloads.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Persist a checkpoint under its task id, replacing any prior version.
    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError>;

    /// Load a checkpoint by task id. Missing is `None`, not an error.
    async fn load(&self, task_id: &str) -> Result<Option<Checkpoint>, CheckpointError>;

    /// List the task ids with a stored checkpoint.
    async fn list(&self) -> Result<Vec<String>, CheckpointError>;
}

/// File-backed store: one JSON file per task id under a base directory.
pub struct FileCheckpointStore {
    dir: PathBuf,
}

impl FileCheckpointStore {
    /// Create a store rooted at the given directory. The directory is
    /// created on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Default location: `~/.irontask/checkpoints`
    pub fn default_dir() -> PathBuf {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(".irontask").join("checkpoints")
    }

    fn path_for(&self, task_id: &str) -> PathBuf {
        self.dir.join(format!("{task_id}.json"))
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            CheckpointError::Storage(format!("Failed to create checkpoint directory: {e}"))
        })?;

        let json = serde_json::to_string_pretty(checkpoint)
            .map_err(|e| CheckpointError::Storage(format!("Failed to serialize checkpoint: {e}")))?;

        let path = self.path_for(&checkpoint.task_id);
        tokio::fs::write(&path, json)
            .await
            .map_err(|e| CheckpointError::Storage(format!("Failed to write checkpoint: {e}")))?;

        debug!(task_id = %checkpoint.task_id, path = %path.display(), "Checkpoint saved");
        Ok(())
    }

    async fn load(&self, task_id: &str) -> Result<Option<Checkpoint>, CheckpointError> {
        let path = self.path_for(task_id);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(CheckpointError::Storage(format!(
                    "Failed to read checkpoint: {e}"
                )))
            }
        };

        let checkpoint =
            serde_json::from_str(&content).map_err(|e| CheckpointError::Corrupted {
                task_id: task_id.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Some(checkpoint))
    }

    async fn list(&self) -> Result<Vec<String>, CheckpointError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(CheckpointError::Storage(format!(
                    "Failed to list checkpoints: {e}"
                )))
            }
        };

        let mut ids = Vec::new();
        loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => {
                    let name = entry.file_name();
                    if let Some(id) = name.to_string_lossy().strip_suffix(".json") {
                        ids.push(id.to_string());
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    return Err(CheckpointError::Storage(format!(
                        "Failed to read checkpoint directory: {e}"
                    )))
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}

/// In-memory store for tests and embedded use.
#[derive(Default)]
pub struct MemoryCheckpointStore {
    checkpoints: RwLock<HashMap<String, Checkpoint>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        self.checkpoints
            .write()
            .await
            .insert(checkpoint.task_id.clone(), checkpoint.clone());
        Ok(())
    }

    async fn load(&self, task_id: &str) -> Result<Option<Checkpoint>, CheckpointError> {
        Ok(self.checkpoints.read().await.get(task_id).cloned())
    }

    async fn list(&self) -> Result<Vec<String>, CheckpointError> {
        let mut ids: Vec<String> = self.checkpoints.read().await.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}
