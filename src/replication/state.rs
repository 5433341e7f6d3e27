// ABOUTME: Persisted replication state - one checkpoint per stream
// ABOUTME: The checkpoint is the id of the last emitted record; absent until one is emitted

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::api::compare_ids;

const STATE_VERSION: u32 = 1;

/// Sync state for a single stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamState {
    /// Field the checkpoint is taken from
    pub replication_key: String,
    /// Id of the last record emitted; `None` until the first one is. The
    /// start date is never stored here, it always comes from the current config.
    #[serde(default)]
    pub starting_replication_value: Option<String>,
    /// When the last sync of this stream finished
    pub last_sync_at: Option<DateTime<Utc>>,
    /// Records emitted by the last sync
    pub last_record_count: u64,
}

impl Default for StreamState {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamState {
    /// A stream that has never emitted a record.
    pub fn new() -> Self {
        Self {
            replication_key: "id".to_string(),
            starting_replication_value: None,
            last_sync_at: None,
            last_record_count: 0,
        }
    }

    pub fn checkpoint(&self) -> Option<&str> {
        self.starting_replication_value.as_deref()
    }

    /// Record the end of a sync.
    pub fn finish(&mut self, record_count: u64) {
        self.last_sync_at = Some(Utc::now());
        self.last_record_count = record_count;
    }
}

/// In-memory checkpoint owned by the driver for one sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Checkpoint {
    /// Nothing replicated yet; the search starts from the configured start date.
    StartDate,
    /// Id of the last emitted record.
    Cursor(String),
}

impl Checkpoint {
    pub fn from_state(state: &StreamState) -> Self {
        match state.checkpoint() {
            Some(id) => Checkpoint::Cursor(id.to_string()),
            None => Checkpoint::StartDate,
        }
    }

    pub fn cursor(&self) -> Option<&str> {
        match self {
            Checkpoint::StartDate => None,
            Checkpoint::Cursor(id) => Some(id),
        }
    }

    /// Move the checkpoint to `id`. Refuses (returns false) if that would not
    /// move it strictly forward.
    pub fn advance(&mut self, id: &str) -> bool {
        if let Checkpoint::Cursor(current) = self {
            if compare_ids(id, current) != Ordering::Greater {
                return false;
            }
        }
        *self = Checkpoint::Cursor(id.to_string());
        true
    }
}

/// All persisted state, keyed by stream name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicationState {
    /// Version of the state format for future migrations
    pub version: u32,
    pub streams: BTreeMap<String, StreamState>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for ReplicationState {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplicationState {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            version: STATE_VERSION,
            streams: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Get or create state for a stream.
    pub fn stream_mut(&mut self, stream: &str) -> &mut StreamState {
        self.updated_at = Utc::now();
        self.streams.entry(stream.to_string()).or_default()
    }

    pub fn stream(&self, stream: &str) -> Option<&StreamState> {
        self.streams.get(stream)
    }

    /// Load state from a JSON file
    pub async fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read replication state from {:?}", path))?;
        let state: ReplicationState = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse replication state from {:?}", path))?;
        Ok(state)
    }

    /// Load existing state, or start fresh if there is none.
    ///
    /// An unreadable file starts a fresh (cold) sync rather than failing; a
    /// file written by a newer version is refused.
    pub async fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            match Self::load(path).await {
                Ok(state) => {
                    if state.version > STATE_VERSION {
                        anyhow::bail!(
                            "Replication state {:?} was written by a newer fairing-replicator \
                             (format version {}). Upgrade or delete the file.",
                            path,
                            state.version
                        );
                    }
                    tracing::info!("Loaded existing replication state from {:?}", path);
                    return Ok(state);
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to load replication state from {:?}: {:#}. Creating new state.",
                        path,
                        e
                    );
                }
            }
        }

        tracing::info!("Creating new replication state");
        Ok(Self::new())
    }

    /// Save state to a JSON file
    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("Failed to create directory {:?}", parent))?;
            }
        }

        let contents =
            serde_json::to_string_pretty(self).context("Failed to serialize replication state")?;
        fs::write(path, contents)
            .await
            .with_context(|| format!("Failed to write replication state to {:?}", path))?;
        Ok(())
    }

    /// Get the default state file path for the current directory
    pub fn default_path() -> PathBuf {
        PathBuf::from(".fairing-replicator/state.json")
    }
}
