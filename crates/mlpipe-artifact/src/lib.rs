//! mlpipe Artifact
//!
//! This crate provides the artifact storage trait and implementations for
//! mlpipe. An artifact is the JSON result of one node in one recurrence
//! iteration of one pipeline run.
//!
//! The [`ArtifactStore`] trait defines the backend layer. The engine saves
//! every resolved node value before releasing dependents and loads inputs
//! back through the same store, so a persistent backend lets a run with a
//! known pipeline id pick up results computed earlier.

mod fs;
mod memory;

pub use fs::FsArtifactStore;
pub use memory::InMemoryArtifactStore;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifies one stored node result.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ArtifactKey {
  pub pipeline_id: String,
  pub node_id: String,
  pub iteration: u32,
}

impl ArtifactKey {
  pub fn new(pipeline_id: impl Into<String>, node_id: impl Into<String>, iteration: u32) -> Self {
    Self {
      pipeline_id: pipeline_id.into(),
      node_id: node_id.into(),
      iteration,
    }
  }

  /// Relative storage key: `{pipeline_id}/{node_id}@{iteration}`.
  pub fn storage_key(&self) -> String {
    format!("{}/{}@{}", self.pipeline_id, self.node_id, self.iteration)
  }
}

impl fmt::Display for ArtifactKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.storage_key())
  }
}

/// Error type for artifact storage operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
  /// The requested artifact was not found.
  #[error("artifact not found: {0}")]
  NotFound(ArtifactKey),

  /// An I/O error occurred.
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  /// A stored artifact could not be encoded or decoded.
  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  pub fn is_not_found(&self) -> bool {
    matches!(self, Error::NotFound(_))
  }
}

/// Artifact storage trait.
///
/// `save` overwrites any previous value under the same key.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
  /// Store a node result.
  async fn save(&self, key: &ArtifactKey, value: &Value) -> Result<(), Error>;

  /// Retrieve a node result, or [`Error::NotFound`].
  async fn load(&self, key: &ArtifactKey) -> Result<Value, Error>;
}

/// Builds the store for one run from its pipeline id.
pub type ArtifactStoreFactory = Arc<dyn Fn(&str) -> Arc<dyn ArtifactStore> + Send + Sync>;

/// Factory handing every run a fresh in-memory store.
pub fn in_memory_factory() -> ArtifactStoreFactory {
  Arc::new(|_pipeline_id: &str| Arc::new(InMemoryArtifactStore::new()) as Arc<dyn ArtifactStore>)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_storage_key() {
    let key = ArtifactKey::new("run-1", "score", 2);
    assert_eq!(key.storage_key(), "run-1/score@2");
    assert_eq!(key.to_string(), "run-1/score@2");
  }

  #[test]
  fn test_not_found_display() {
    let err = Error::NotFound(ArtifactKey::new("p", "n", 0));
    assert!(err.is_not_found());
    assert_eq!(err.to_string(), "artifact not found: p/n@0");
  }
}
