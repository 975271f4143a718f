use crate::constants::SNAPSHOT_FILE_NAME;
use crate::error::Result;
use crate::types::SurveyResponse;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One fetched copy of the survey data, as persisted between restarts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub fetched_at: DateTime<Utc>,
    pub responses: Vec<SurveyResponse>,
}

impl Snapshot {
    pub fn new(responses: Vec<SurveyResponse>) -> Self {
        Self {
            fetched_at: Utc::now(),
            responses,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }
}

/// File-backed snapshot store. Writes go to a tempfile in the same directory
/// and are renamed over the destination, so readers never see a torn file.
pub struct SnapshotCache {
    path: PathBuf,
}

impl SnapshotCache {
    pub fn new(dir: &Path) -> Self {
        Self {
            path: dir.join(SNAPSHOT_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn store(&self, snapshot: &Snapshot) -> Result<()> {
        let dir = self.path.parent().unwrap_or(Path::new("."));
        fs::create_dir_all(dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        serde_json::to_writer(&mut tmp, snapshot)?;
        tmp.flush()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        debug!("Stored snapshot with {} responses at {}", snapshot.responses.len(), self.path.display());
        Ok(())
    }

    pub fn load(&self) -> Result<Snapshot> {
        let content = fs::read(&self.path)?;
        let snapshot = serde_json::from_slice(&content)?;
        Ok(snapshot)
    }
}
