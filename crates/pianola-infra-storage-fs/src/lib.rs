use chrono::Utc;
use pianola_ports::storage::{
    animation_object_name, AnimationStorePort, AnimationUpload, StorageError,
};
use std::fs;
use std::path::{Path, PathBuf};

pub struct FsStorage {
    base_dir: PathBuf,
}

impl FsStorage {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), StorageError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| StorageError::Io(e.to_string()))?;
        }
        let data =
            serde_json::to_vec_pretty(value).map_err(|e| StorageError::Serde(e.to_string()))?;
        fs::write(path, data).map_err(|e| StorageError::Io(e.to_string()))
    }
}

impl AnimationStorePort for FsStorage {
    fn store_animation(&self, upload: &AnimationUpload<'_>) -> Result<String, StorageError> {
        let path = self
            .base_dir
            .join(animation_object_name(upload.job_id, Utc::now()));
        Self::write_json(&path, upload.payload)?;

        let path = fs::canonicalize(&path).unwrap_or(path);
        let locator = format!("file://{}", path.display());
        tracing::info!(job.id = upload.job_id, title = upload.title, %locator, "saved animation data locally");
        Ok(locator)
    }
}
