//! Disk-backed store for uploaded asset payloads.

use std::collections::HashMap;
use std::path::PathBuf;

use bytes::Bytes;
use gadget_tonic_core::{Error, Result};
use parking_lot::RwLock;
use uuid::Uuid;

/// Metadata for one stored asset. The association with its owning device is
/// immutable once created.
#[derive(Debug, Clone)]
pub struct AssetRecord {
    pub device_id: String,
    pub media_type: String,
    pub path: PathBuf,
}

/// Content-addressable asset store: every payload is persisted under a
/// freshly generated id, never a caller-supplied key, and content is not
/// deduplicated.
#[derive(Debug)]
pub struct AssetStore {
    dir: PathBuf,
    assets: RwLock<HashMap<String, AssetRecord>>,
}

impl AssetStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            assets: RwLock::new(HashMap::new()),
        }
    }

    /// Writes `data` to `<dir>/<new id>.<media_type>`, then records the
    /// metadata entry under the exclusive lock. Returns the generated id.
    pub async fn save(&self, device_id: &str, media_type: &str, data: Bytes) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let path = self.dir.join(format!("{id}.{media_type}"));

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| Error::Storage {
                context: format!("cannot create asset directory: {e}"),
            })?;

        tokio::fs::write(&path, &data)
            .await
            .map_err(|e| Error::Storage {
                context: format!("cannot write asset file: {e}"),
            })?;

        let record = AssetRecord {
            device_id: device_id.to_string(),
            media_type: media_type.to_string(),
            path,
        };

        self.assets.write().insert(id.clone(), record);
        Ok(id)
    }

    pub fn get(&self, id: &str) -> Option<AssetRecord> {
        self.assets.read().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.assets.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
