//! Persisted build records.
//!
//! A `build.json` next to each artifact records the hash it was built for.
//! It is written atomically (temp file, then rename) so a crash never leaves
//! a record pointing at a half-written build.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use xenoform_core::BuildError;

use crate::hash::BuildHash;

pub const RECORD_FILE: &str = "build.json";
pub const SOURCE_FILE: &str = "module.cpp";
pub const LOG_FILE: &str = "build.log";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRecord {
    pub hash: BuildHash,
    pub artifact: PathBuf,
    pub log: PathBuf,
    pub source: PathBuf,
}

impl BuildRecord {
    /// Whether this record was written for `hash`.
    pub fn is_valid_for(&self, hash: &BuildHash) -> bool {
        &self.hash == hash
    }

    /// Read the record in `module_dir`. Missing or unreadable records are
    /// `None`; either way the module has to be rebuilt.
    pub fn read(module_dir: &Path) -> Option<Self> {
        let text = fs::read_to_string(module_dir.join(RECORD_FILE)).ok()?;
        serde_json::from_str(&text).ok()
    }

    pub fn write(&self, module_dir: &Path) -> Result<(), BuildError> {
        let path = module_dir.join(RECORD_FILE);
        let json = serde_json::to_string_pretty(self).map_err(|e| BuildError::Io {
            path: path.clone(),
            message: format!("failed to serialize build record: {e}"),
        })?;
        atomic_write(&path, json.as_bytes()).map_err(|e| BuildError::io(&path, &e))
    }
}

/// Write via a temp file and rename so readers never observe partial data.
pub(crate) fn atomic_write(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let tmp_path = path.with_extension("tmp");
    let mut f = fs::File::create(&tmp_path)?;
    f.write_all(data)?;
    f.sync_all()?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}
