//! The user's followed bases, kept in a small JSON file next to the cache.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Error, Result};
use crate::remote::types::Base;

#[derive(Debug, Clone)]
pub struct Selection {
  path: PathBuf,
}

impl Selection {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Followed bases, or an empty list when nothing was saved yet.
  pub fn load(&self) -> Result<Vec<Base>> {
    let contents = match fs::read(&self.path) {
      Ok(contents) => contents,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
      Err(e) => return Err(e.into()),
    };
    serde_json::from_slice(&contents).map_err(|e| Error::deserialization("followed bases", e))
  }

  /// Replace the followed bases. The file is swapped in atomically.
  pub fn save(&self, bases: &[Base]) -> Result<()> {
    if let Some(parent) = self.path.parent() {
      fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_vec_pretty(bases)
      .map_err(|e| Error::deserialization("followed bases", e))?;

    let tmp = self.path.with_extension("json.tmp");
    fs::write(&tmp, json)?;
    fs::rename(&tmp, &self.path)?;
    debug!("Saved {} followed bases to {}", bases.len(), self.path.display());
    Ok(())
  }

  pub fn clear(&self) -> Result<()> {
    match fs::remove_file(&self.path) {
      Ok(()) => Ok(()),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
      Err(e) => Err(e.into()),
    }
  }

  pub fn is_empty(&self) -> Result<bool> {
    Ok(self.load()?.is_empty())
  }
}
