use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use charter_types::Checkpoint;

use crate::error::SdkResult;

/// File name of the checkpoint registry inside the data directory.
pub const CHECKPOINT_FILE: &str = "checkpoints.json";

/// Durable list of published checkpoints.
///
/// The whole list is rewritten through a synced temporary file and renamed
/// into place, so readers see either the old list or the new one.
#[derive(Clone, Debug)]
pub struct CheckpointFile {
    path: PathBuf,
}

impl CheckpointFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored checkpoints, or none if the file does not exist yet.
    pub fn load(&self) -> SdkResult<Vec<Checkpoint>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let bytes = fs::read(&self.path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Replace the stored list. The temporary file is synced before the
    /// rename and the directory after it, so a crash leaves one complete
    /// list on disk.
    pub fn save(&self, checkpoints: &[Checkpoint]) -> SdkResult<()> {
        let tmp = self.path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(checkpoints)?;
        {
            let mut file = File::create(&tmp)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        sync_parent(&self.path)?;
        tracing::debug!(path = %self.path.display(), count = checkpoints.len(), "checkpoints saved");
        Ok(())
    }
}

/// Persist the directory entry created by a rename.
#[cfg(unix)]
fn sync_parent(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => File::open(dir)?.sync_all(),
        _ => File::open(".")?.sync_all(),
    }
}

#[cfg(not(unix))]
fn sync_parent(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use charter_types::{AnchorType, EventHash};
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn missing_file_loads_empty_and_saves_back() {
        let dir = tempfile::tempdir().unwrap();
        let file = CheckpointFile::new(dir.path().join(CHECKPOINT_FILE));
        assert!(file.load().unwrap().is_empty());

        let checkpoint = Checkpoint {
            checkpoint_id: Uuid::now_v7(),
            event_sequence: 4,
            anchor_hash: EventHash::from_bytes([3; 32]),
            anchor_type: AnchorType::Pending,
            timestamp: Utc::now(),
            leaf_count: 4,
        };
        file.save(&[checkpoint.clone()]).unwrap();
        assert_eq!(file.load().unwrap(), vec![checkpoint]);
        assert!(!dir.path().join("checkpoints.json.tmp").exists());
    }

    fn checkpoint(sequence: u64) -> Checkpoint {
        Checkpoint {
            checkpoint_id: Uuid::now_v7(),
            event_sequence: sequence,
            anchor_hash: EventHash::from_bytes([sequence as u8; 32]),
            anchor_type: AnchorType::Pending,
            timestamp: Utc::now(),
            leaf_count: sequence,
        }
    }

    #[test]
    fn save_replaces_list_and_leftover_tmp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CHECKPOINT_FILE);
        let file = CheckpointFile::new(&path);
        file.save(&[checkpoint(2)]).unwrap();

        // A half-written temp file from an earlier crash is overwritten.
        fs::write(dir.path().join("checkpoints.json.tmp"), b"[{\"trunc").unwrap();
        let list = vec![checkpoint(2), checkpoint(5)];
        file.save(&list).unwrap();

        assert_eq!(file.load().unwrap(), list);
        assert!(!dir.path().join("checkpoints.json.tmp").exists());
    }

    #[test]
    fn save_into_missing_directory_fails_without_touching_anything() {
        let dir = tempfile::tempdir().unwrap();
        let file = CheckpointFile::new(dir.path().join("absent").join(CHECKPOINT_FILE));
        assert!(matches!(file.save(&[checkpoint(1)]), Err(crate::error::SdkError::Io(_))));
        assert!(!dir.path().join("absent").exists());
    }
}
