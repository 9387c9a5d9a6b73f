use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::models::CheckpointEntry;

/// Progress file: article url to its latest entry.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    path: PathBuf,
    entries: BTreeMap<String, CheckpointEntry>,
}

impl Checkpoint {
    /// A missing file is an empty checkpoint; an unreadable one is an error.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let entries = match tokio::fs::read_to_string(&path).await {
            Ok(content) if content.trim().is_empty() => BTreeMap::new(),
            Ok(content) => serde_json::from_str(&content).map_err(|e| {
                Error::Checkpoint(format!("{} is corrupt: {}", path.display(), e))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(Error::Checkpoint(format!(
                    "failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        tracing::debug!(path = %path.display(), entries = entries.len(), "Loaded checkpoint");
        Ok(Self { path, entries })
    }

    pub fn get(&self, key: &str) -> Option<&CheckpointEntry> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, entry: CheckpointEntry) {
        self.entries.insert(key.into(), entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Writes a sibling temp file then renames it over the checkpoint.
    pub async fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    Error::Checkpoint(format!("failed to create {}: {}", parent.display(), e))
                })?;
            }
        }

        let json = serde_json::to_string_pretty(&self.entries)?;
        let tmp = self.path.with_extension("json.tmp");

        tokio::fs::write(&tmp, json).await.map_err(|e| {
            Error::Checkpoint(format!("failed to write {}: {}", tmp.display(), e))
        })?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(|e| {
            Error::Checkpoint(format!("failed to replace {}: {}", self.path.display(), e))
        })?;

        Ok(())
    }
}
