//! Local persistence of the last known signature for an item.
//!
//! One JSON file per item. Loading never fails: a missing or unreadable
//! file is logged and treated as "no signature yet".

use crate::error::SealResult;
use crate::record::SignatureRecord;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct SignatureStore {
    path: PathBuf,
}

impl SignatureStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Option<SignatureRecord> {
        load(&self.path)
    }

    pub fn save(&self, record: &SignatureRecord) -> SealResult<()> {
        save(&self.path, record)
    }
}

/// Read the record at `path`, or `None` if there is no usable file.
pub fn load(path: &Path) -> Option<SignatureRecord> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no signature file found");
            return None;
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "cannot read signature file");
            return None;
        }
    };

    match serde_json::from_str(&content) {
        Ok(record) => {
            info!(path = %path.display(), "signature loaded from file");
            Some(record)
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "invalid signature file");
            None
        }
    }
}

/// Write `record` to `path`, replacing any previous file atomically.
pub fn save(path: &Path, record: &SignatureRecord) -> SealResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(record)?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)?;

    info!(path = %path.display(), signed_by = %record.signed_by, "signature saved to file");
    Ok(())
}
