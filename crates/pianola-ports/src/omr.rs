use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Clone, Debug, Default)]
pub struct OmrOptions {
    pub enable_diagnostics: bool,
    pub engine_path: Option<String>,
    /// Upper bound on a single recognition run. `None` waits forever.
    pub timeout: Option<Duration>,
}

#[derive(Clone, Debug)]
pub struct OmrResult {
    pub musicxml_path: PathBuf,
    pub diagnostics_path: Option<PathBuf>,
}

#[derive(thiserror::Error, Debug)]
pub enum OmrError {
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("omr engine not installed: {0}")]
    NotInstalled(String),
    #[error("recognition failed: {0}")]
    RecognitionFailed(String),
    #[error("no MusicXML output generated in {0}")]
    MissingOutput(PathBuf),
    #[error("recognition timed out after {0:?}")]
    Timeout(Duration),
    #[error("backend error: {0}")]
    Backend(String),
}

/// Turns a PDF on disk into a MusicXML file inside `output_dir`.
pub trait OmrPort: Send + Sync {
    fn recognize_pdf(
        &self,
        pdf_path: &Path,
        output_dir: &Path,
        options: &OmrOptions,
    ) -> Result<OmrResult, OmrError>;

    fn check_installation(&self) -> Result<(), OmrError>;
}
