use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::{ArtifactKey, ArtifactStore, Error};

/// Process-local artifact store, the default for a run.
#[derive(Debug, Default)]
pub struct InMemoryArtifactStore {
  data: RwLock<HashMap<ArtifactKey, Value>>,
}

impl InMemoryArtifactStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Number of stored results.
  pub async fn len(&self) -> usize {
    self.data.read().await.len()
  }

  pub async fn is_empty(&self) -> bool {
    self.data.read().await.is_empty()
  }
}

#[async_trait]
impl ArtifactStore for InMemoryArtifactStore {
  async fn save(&self, key: &ArtifactKey, value: &Value) -> Result<(), Error> {
    self.data.write().await.insert(key.clone(), value.clone());
    Ok(())
  }

  async fn load(&self, key: &ArtifactKey) -> Result<Value, Error> {
    self
      .data
      .read()
      .await
      .get(key)
      .cloned()
      .ok_or_else(|| Error::NotFound(key.clone()))
  }
}
