use crate::jobs::{JobError, JobResult, JobStore};
use chrono::Utc;
use pianola_domain_score::{convert_musicxml_path, ConvertError, ConvertOptions, ScoreHints};
use pianola_ports::omr::{OmrError, OmrOptions, OmrPort};
use pianola_ports::storage::{AnimationStorePort, AnimationUpload, StorageError};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

const INPUT_FILE: &str = "input.pdf";

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("failed to save upload: {0}")]
    Io(String),
    #[error(transparent)]
    Omr(#[from] OmrError),
    #[error(transparent)]
    Convert(#[from] ConvertError),
    #[error("serialization error: {0}")]
    Serialize(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Job(#[from] JobError),
}

#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Parent of the per-job scratch directories.
    pub work_dir: PathBuf,
    pub omr: OmrOptions,
    pub convert: ConvertOptions,
}

#[derive(Clone, Debug, Default)]
pub struct ProcessRequest {
    pub pdf_bytes: Vec<u8>,
    pub filename: String,
    pub title: Option<String>,
    pub composer: Option<String>,
    pub user_id: Option<String>,
}

impl ProcessRequest {
    /// Caller title when given, otherwise the uploaded file name.
    pub fn display_title(&self) -> &str {
        self.title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(&self.filename)
    }
}

/// OMR → conversion → upload for one job at a time. Blocking; callers run it
/// on a worker thread. Shared freely between jobs.
pub struct Pipeline {
    omr: Arc<dyn OmrPort>,
    storage: Arc<dyn AnimationStorePort>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        omr: Arc<dyn OmrPort>,
        storage: Arc<dyn AnimationStorePort>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            omr,
            storage,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Runs the job to completion and records the outcome in `jobs`. The
    /// job's scratch directory is removed whether or not it succeeded.
    pub fn run(
        &self,
        jobs: &JobStore,
        job_id: Uuid,
        request: ProcessRequest,
    ) -> Result<JobResult, PipelineError> {
        let work_dir = self.config.work_dir.join(job_id.to_string());
        let outcome = self.execute(jobs, job_id, &work_dir, &request);

        if let Err(err) = fs::remove_dir_all(&work_dir) {
            if err.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(job.id = %job_id, dir = %work_dir.display(), %err, "failed to clean work dir");
            }
        }

        match outcome {
            Ok(result) => {
                jobs.complete(&job_id, result.clone())?;
                Ok(result)
            }
            Err(err) => {
                if let Err(record_err) = jobs.fail(&job_id, err.to_string()) {
                    tracing::warn!(job.id = %job_id, %record_err, %err, "could not record job failure");
                }
                Err(err)
            }
        }
    }

    fn execute(
        &self,
        jobs: &JobStore,
        job_id: Uuid,
        work_dir: &Path,
        request: &ProcessRequest,
    ) -> Result<JobResult, PipelineError> {
        jobs.update_progress(&job_id, 10, "Saving uploaded file")?;
        fs::create_dir_all(work_dir).map_err(|e| PipelineError::Io(e.to_string()))?;
        let pdf_path = work_dir.join(INPUT_FILE);
        fs::write(&pdf_path, &request.pdf_bytes).map_err(|e| PipelineError::Io(e.to_string()))?;
        tracing::info!(job.id = %job_id, pdf = %pdf_path.display(), bytes = request.pdf_bytes.len(), "saved upload");

        jobs.update_progress(&job_id, 30, "Processing PDF with OMR")?;
        let omr = self
            .omr
            .recognize_pdf(&pdf_path, work_dir, &self.config.omr)?;
        tracing::info!(job.id = %job_id, musicxml = %omr.musicxml_path.display(), "generated MusicXML");

        jobs.update_progress(&job_id, 60, "Converting to animation format")?;
        let hints = ScoreHints::new(request.title.clone(), request.composer.clone());
        let animation = convert_musicxml_path(&omr.musicxml_path, &hints, &self.config.convert)?;
        tracing::info!(
            job.id = %job_id,
            notes = animation.notes.len(),
            duration = animation.duration,
            "converted score"
        );

        jobs.update_progress(&job_id, 80, "Uploading result to storage")?;
        let payload = animation
            .to_json_value()
            .map_err(|e| PipelineError::Serialize(e.to_string()))?;
        let job_key = job_id.to_string();
        let title = request.display_title();
        let locator = self.storage.store_animation(&AnimationUpload {
            job_id: &job_key,
            title,
            user_id: request.user_id.as_deref(),
            payload: &payload,
        })?;
        tracing::info!(job.id = %job_id, %locator, "stored animation data");

        Ok(JobResult {
            animation_data_url: locator,
            title: title.to_string(),
            composer: request.composer.clone(),
            processed_at: Utc::now(),
        })
    }
}
