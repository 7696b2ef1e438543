use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::{ArtifactKey, ArtifactStore, Error};

/// Filesystem-based artifact store.
///
/// Each result is a JSON file at `{base_path}/{pipeline_id}/{node_id}@{iteration}.json`.
/// Parent directories are created automatically. Results outlive the process,
/// so a later run reusing a pipeline id finds them.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
  base_path: PathBuf,
}

impl FsArtifactStore {
  /// Create a new filesystem store with the given base path.
  pub fn new(base_path: impl Into<PathBuf>) -> Self {
    Self {
      base_path: base_path.into(),
    }
  }

  pub fn base_path(&self) -> &Path {
    &self.base_path
  }

  fn key_to_path(&self, key: &ArtifactKey) -> PathBuf {
    self
      .base_path
      .join(format!("{}.json", key.storage_key()))
  }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
  async fn save(&self, key: &ArtifactKey, value: &Value) -> Result<(), Error> {
    let path = self.key_to_path(key);

    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent).await?;
    }

    let bytes = serde_json::to_vec(value)?;
    let mut file = File::create(&path).await?;
    file.write_all(&bytes).await?;
    file.flush().await?;

    debug!(key = %key, path = %path.display(), "artifact_saved");
    Ok(())
  }

  async fn load(&self, key: &ArtifactKey) -> Result<Value, Error> {
    let path = self.key_to_path(key);
    let bytes = fs::read(&path).await.map_err(|e| {
      if e.kind() == std::io::ErrorKind::NotFound {
        Error::NotFound(key.clone())
      } else {
        Error::Io(e)
      }
    })?;
    Ok(serde_json::from_slice(&bytes)?)
  }
}
