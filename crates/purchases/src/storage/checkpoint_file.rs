//! JSON file checkpoint storage

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::CheckpointStore;
use crate::models::Checkpoint;

/// Default checkpoint filename in the Tally config directory
pub const CHECKPOINT_FILE: &str = "lastrun.json";

/// Stores the checkpoint as `{"time": "..."}` in a single file
///
/// Saves go through a sibling temp file that is fsynced and renamed over
/// the target, so a crash leaves either the old or the new checkpoint.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    path: PathBuf,
}

impl FileCheckpointStore {
    /// Create a store backed by the file at `path`
    ///
    /// The file does not need to exist yet.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Store in the Tally config directory (~/.config/tally/lastrun.json)
    pub fn in_config_dir() -> Result<Self> {
        let path = config::config_path(CHECKPOINT_FILE)
            .context("Could not determine config directory")?;
        Ok(Self::new(path))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `content` to the temp file and flush it to disk
    fn write_temp(&self, temp_path: &Path, content: &str) -> Result<()> {
        let mut file = File::create(temp_path)
            .with_context(|| format!("Failed to create {}", temp_path.display()))?;
        file.write_all(content.as_bytes())
            .with_context(|| format!("Failed to write {}", temp_path.display()))?;
        file.sync_all()
            .with_context(|| format!("Failed to sync {}", temp_path.display()))?;
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| CHECKPOINT_FILE.into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl CheckpointStore for FileCheckpointStore {
    fn load(&self) -> Result<Option<Checkpoint>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to read checkpoint file: {}", self.path.display())
                });
            }
        };

        let checkpoint: Checkpoint = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse checkpoint file: {}", self.path.display()))?;
        Ok(Some(checkpoint))
    }

    fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        let parent = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;

        let content = serde_json::to_string(checkpoint)?;

        // Write atomically (write to temp, sync, then rename)
        let temp_path = self.temp_path();
        if let Err(e) = self.write_temp(&temp_path, &content) {
            let _ = fs::remove_file(&temp_path);
            return Err(e);
        }

        if let Err(e) = fs::rename(&temp_path, &self.path) {
            let _ = fs::remove_file(&temp_path);
            return Err(e).with_context(|| {
                format!("Failed to replace checkpoint file: {}", self.path.display())
            });
        }

        sync_dir(parent)
    }
}

/// Flush the directory entry so the rename survives a crash
#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<()> {
    File::open(dir)
        .and_then(|d| d.sync_all())
        .with_context(|| format!("Failed to sync directory: {}", dir.display()))
}

/// Directories cannot be opened for syncing here; the rename is all we get
#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> Result<()> {
    Ok(())
}
