//! Supabase Storage adapter.
//!
//! Objects go to `{url}/storage/v1/object/{bucket}/{name}` and are served back
//! from the bucket's public path. Calls are blocking; run them off the async
//! executor.

use chrono::Utc;
use pianola_ports::storage::{
    animation_object_name, AnimationStorePort, AnimationUpload, StorageError,
};
use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use std::time::Duration;

pub const DEFAULT_BUCKET: &str = "animation-data";

#[derive(Clone, Debug)]
pub struct SupabaseConfig {
    pub url: String,
    pub key: String,
    pub bucket: String,
    pub timeout: Duration,
}

impl SupabaseConfig {
    pub fn new(url: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            key: key.into(),
            bucket: DEFAULT_BUCKET.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

pub struct SupabaseStorage {
    config: SupabaseConfig,
    client: Client,
}

impl SupabaseStorage {
    pub fn new(mut config: SupabaseConfig) -> Result<Self, StorageError> {
        if config.url.trim().is_empty() || config.key.trim().is_empty() {
            return Err(StorageError::NotConfigured(
                "supabase url and key are required".to_string(),
            ));
        }
        config.url = config.url.trim_end_matches('/').to_string();
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| StorageError::Remote(e.to_string()))?;
        Ok(Self { config, client })
    }

    pub fn public_url(&self, object_name: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.config.url, self.config.bucket, object_name
        )
    }

    fn upload_url(&self, object_name: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{}",
            self.config.url, self.config.bucket, object_name
        )
    }

    /// Lists buckets to prove the credentials work.
    pub fn check_connection(&self) -> Result<(), StorageError> {
        let response = self
            .client
            .get(format!("{}/storage/v1/bucket", self.config.url))
            .header(AUTHORIZATION, format!("Bearer {}", self.config.key))
            .header("apikey", &self.config.key)
            .send()
            .map_err(|e| StorageError::Remote(e.to_string()))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(StorageError::Remote(format!(
                "bucket listing returned {}",
                response.status()
            )))
        }
    }
}

impl AnimationStorePort for SupabaseStorage {
    fn store_animation(&self, upload: &AnimationUpload<'_>) -> Result<String, StorageError> {
        let object_name = animation_object_name(upload.job_id, Utc::now());
        let body = serde_json::to_vec_pretty(upload.payload)
            .map_err(|e| StorageError::Serde(e.to_string()))?;

        let response = self
            .client
            .post(self.upload_url(&object_name))
            .header(AUTHORIZATION, format!("Bearer {}", self.config.key))
            .header("apikey", &self.config.key)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .map_err(|e| StorageError::Remote(e.to_string()))?;

        let status = response.status();
        if status.as_u16() != 200 && status.as_u16() != 201 {
            let text = response.text().unwrap_or_default();
            return Err(StorageError::Remote(format!("upload returned {status}: {text}")));
        }

        let url = self.public_url(&object_name);
        tracing::info!(job.id = upload.job_id, title = upload.title, %url, "uploaded animation data");
        Ok(url)
    }
}
