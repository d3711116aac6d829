use pianola_ports::storage::{AnimationStorePort, AnimationUpload, StorageError};

/// Tries the primary store and writes through the fallback whenever it fails,
/// so a finished animation is never lost to a remote outage.
pub struct FallbackStorage {
    primary: Box<dyn AnimationStorePort>,
    fallback: Box<dyn AnimationStorePort>,
}

impl FallbackStorage {
    pub fn new(primary: Box<dyn AnimationStorePort>, fallback: Box<dyn AnimationStorePort>) -> Self {
        Self { primary, fallback }
    }
}

impl AnimationStorePort for FallbackStorage {
    fn store_animation(&self, upload: &AnimationUpload<'_>) -> Result<String, StorageError> {
        match self.primary.store_animation(upload) {
            Ok(locator) => Ok(locator),
            Err(err) => {
                tracing::warn!(job.id = upload.job_id, %err, "primary storage failed, using fallback");
                self.fallback.store_animation(upload)
            }
        }
    }
}
