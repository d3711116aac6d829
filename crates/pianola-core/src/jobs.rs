use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum JobError {
    #[error("job not found: {0}")]
    NotFound(Uuid),
    #[error("job {0} already finished")]
    Finished(Uuid),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub filename: String,
    pub title: Option<String>,
    pub composer: Option<String>,
    pub user_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResult {
    pub animation_data_url: String,
    pub title: String,
    pub composer: Option<String>,
    pub processed_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub status: JobStatus,
    pub progress: u8,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub file_info: FileInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<JobResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStats {
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

/// Process-lifetime job table. Each job has a single writer (its pipeline
/// run); pollers read concurrently. Nothing survives a restart.
#[derive(Default)]
pub struct JobStore {
    jobs: DashMap<Uuid, Job>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, file_info: FileInfo) -> Uuid {
        let id = Uuid::new_v4();
        tracing::info!(job.id = %id, job.filename = %file_info.filename, "job created");
        self.jobs.insert(
            id,
            Job {
                id,
                status: JobStatus::Pending,
                progress: 0,
                message: "Job queued for processing".to_string(),
                created_at: Utc::now(),
                file_info,
                result: None,
                error: None,
            },
        );
        id
    }

    pub fn get(&self, id: &Uuid) -> Option<Job> {
        self.jobs.get(id).map(|job| job.clone())
    }

    pub fn update_progress(
        &self,
        id: &Uuid,
        progress: u8,
        message: impl Into<String>,
    ) -> Result<(), JobError> {
        let message = message.into();
        self.modify(id, |job| {
            job.status = JobStatus::Processing;
            job.progress = progress.min(100);
            job.message = message;
        })?;
        tracing::debug!(job.id = %id, progress, "job progress");
        Ok(())
    }

    pub fn complete(&self, id: &Uuid, result: JobResult) -> Result<(), JobError> {
        self.modify(id, |job| {
            job.status = JobStatus::Completed;
            job.progress = 100;
            job.message = "Processing completed successfully".to_string();
            job.result = Some(result);
        })?;
        tracing::info!(job.id = %id, "job completed");
        Ok(())
    }

    pub fn fail(&self, id: &Uuid, error: impl Into<String>) -> Result<(), JobError> {
        let error = error.into();
        self.modify(id, |job| {
            job.status = JobStatus::Failed;
            job.message = format!("Processing failed: {error}");
            job.error = Some(error.clone());
        })?;
        tracing::error!(job.id = %id, job.error = %error, "job failed");
        Ok(())
    }

    pub fn stats(&self) -> JobStats {
        let mut stats = JobStats::default();
        for entry in self.jobs.iter() {
            match entry.status {
                JobStatus::Pending => stats.pending += 1,
                JobStatus::Processing => stats.processing += 1,
                JobStatus::Completed => stats.completed += 1,
                JobStatus::Failed => stats.failed += 1,
            }
        }
        stats
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    fn modify(&self, id: &Uuid, apply: impl FnOnce(&mut Job)) -> Result<(), JobError> {
        let mut job = self.jobs.get_mut(id).ok_or(JobError::NotFound(*id))?;
        if job.status.is_terminal() {
            return Err(JobError::Finished(*id));
        }
        apply(&mut job);
        Ok(())
    }
}
