//! HTTP surface: upload a PDF, poll the job, fetch health.

use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use pianola_core::{FileInfo, Job, JobStore, Pipeline, ProcessRequest};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

#[derive(Clone)]
pub struct AppState {
    pub jobs: Arc<JobStore>,
    pub pipeline: Arc<Pipeline>,
}

impl AppState {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            jobs: Arc::new(JobStore::new()),
            pipeline: Arc::new(pipeline),
        }
    }
}

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/process", post(process))
        .route("/status/{job_id}", get(status))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Error body shaped `{"detail": "..."}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    fn bad_request(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            detail: detail.into(),
        }
    }

    fn not_found(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            detail: detail.into(),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        Self {
            status: err.status(),
            detail: err.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(serde_json::json!({ "detail": self.detail }))).into_response()
    }
}

async fn root() -> impl IntoResponse {
    Json(serde_json::json!({
        "service": "pianola",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
    }))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": Utc::now(),
        "jobs": state.jobs.stats(),
    }))
}

/// Metadata may come as form fields or query parameters; form fields win.
#[derive(Debug, Default, Deserialize)]
pub struct ProcessParams {
    title: Option<String>,
    composer: Option<String>,
    user_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProcessResponse {
    pub job_id: Uuid,
    pub status: String,
    pub message: String,
}

async fn process(
    State(state): State<AppState>,
    Query(params): Query<ProcessParams>,
    mut multipart: Multipart,
) -> Result<Json<ProcessResponse>, ApiError> {
    let mut upload: Option<(String, Vec<u8>)> = None;
    let mut form = ProcessParams::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                if !filename.to_ascii_lowercase().ends_with(".pdf") {
                    return Err(ApiError::bad_request("Only PDF files are supported"));
                }
                let bytes = field.bytes().await?;
                upload = Some((filename, bytes.to_vec()));
            }
            "title" => form.title = Some(field.text().await?),
            "composer" => form.composer = Some(field.text().await?),
            "user_id" => form.user_id = Some(field.text().await?),
            _ => {}
        }
    }

    let (filename, pdf_bytes) = upload.ok_or_else(|| ApiError::bad_request("No file provided"))?;
    let title = non_blank(form.title).or_else(|| non_blank(params.title));
    let composer = non_blank(form.composer).or_else(|| non_blank(params.composer));
    let user_id = non_blank(form.user_id).or_else(|| non_blank(params.user_id));

    let job_id = state.jobs.create(FileInfo {
        filename: filename.clone(),
        title: title.clone(),
        composer: composer.clone(),
        user_id: user_id.clone(),
    });
    let request = ProcessRequest {
        pdf_bytes,
        filename,
        title,
        composer,
        user_id,
    };

    let jobs = Arc::clone(&state.jobs);
    let pipeline = Arc::clone(&state.pipeline);
    tokio::task::spawn_blocking(move || {
        // The outcome lands in the job store either way.
        let _ = pipeline.run(&jobs, job_id, request);
    });

    Ok(Json(ProcessResponse {
        job_id,
        status: "pending".to_string(),
        message: "PDF processing started".to_string(),
    }))
}

async fn status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<Job>, ApiError> {
    Uuid::parse_str(&job_id)
        .ok()
        .and_then(|id| state.jobs.get(&id))
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Job not found"))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
