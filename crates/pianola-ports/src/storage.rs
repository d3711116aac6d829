use chrono::{DateTime, Utc};

#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(String),
    #[error("serialization error: {0}")]
    Serde(String),
    #[error("remote storage error: {0}")]
    Remote(String),
    #[error("storage not configured: {0}")]
    NotConfigured(String),
}

/// A finished animation payload ready to be persisted.
#[derive(Clone, Copy, Debug)]
pub struct AnimationUpload<'a> {
    pub job_id: &'a str,
    pub title: &'a str,
    pub user_id: Option<&'a str>,
    pub payload: &'a serde_json::Value,
}

pub trait AnimationStorePort: Send + Sync {
    /// Persists the payload and returns a locator (URL or `file://` path)
    /// from which it can be retrieved.
    fn store_animation(&self, upload: &AnimationUpload<'_>) -> Result<String, StorageError>;
}

/// Object name shared by every adapter: `20240131_120000_<job_id>.json`.
pub fn animation_object_name(job_id: &str, at: DateTime<Utc>) -> String {
    format!("{}_{}.json", at.format("%Y%m%d_%H%M%S"), job_id)
}
