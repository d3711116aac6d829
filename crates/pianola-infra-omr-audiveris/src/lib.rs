use pianola_ports::omr::{OmrError, OmrOptions, OmrPort, OmrResult};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

const LOG_FILE: &str = "audiveris.log";
const POLL_INTERVAL: Duration = Duration::from_millis(100);
/// Bytes of engine output quoted in a failure message.
const ERROR_TAIL_BYTES: usize = 2048;

#[derive(Clone, Debug, PartialEq, Eq)]
enum Engine {
    Binary(PathBuf),
    Jar(PathBuf),
}

pub struct AudiverisOmr {
    default_engine_path: Option<String>,
    java: String,
    max_heap_mb: u32,
}

impl AudiverisOmr {
    pub fn new(default_engine_path: Option<String>) -> Self {
        Self {
            default_engine_path,
            java: "java".to_string(),
            max_heap_mb: 400,
        }
    }

    /// Java launcher and heap cap used when the engine is a jar.
    pub fn with_java(mut self, java: impl Into<String>, max_heap_mb: u32) -> Self {
        self.java = java.into();
        self.max_heap_mb = max_heap_mb;
        self
    }

    fn engine(&self, options: &OmrOptions) -> Engine {
        let engine = options
            .engine_path
            .clone()
            .or_else(|| self.default_engine_path.clone())
            .unwrap_or_else(|| "audiveris".to_string());
        Self::resolve_engine(&engine)
    }

    fn resolve_engine(engine: &str) -> Engine {
        let path = Path::new(engine);
        let ext = path.extension().and_then(|ext| ext.to_str());

        if ext.is_some_and(|ext| ext.eq_ignore_ascii_case("jar")) {
            return Engine::Jar(path.to_path_buf());
        }

        if ext.is_some_and(|ext| ext.eq_ignore_ascii_case("app")) {
            let candidate = path.join("Contents").join("MacOS").join("Audiveris");
            if candidate.exists() {
                return Engine::Binary(candidate);
            }
        }

        // An installation home such as /opt/audiveris.
        if path.is_dir() {
            for candidate in [
                path.join("lib").join("audiveris.jar"),
                path.join("audiveris.jar"),
            ] {
                if candidate.exists() {
                    return Engine::Jar(candidate);
                }
            }
            let bin = path.join("bin").join("Audiveris");
            if bin.exists() {
                return Engine::Binary(bin);
            }
        }

        Engine::Binary(path.to_path_buf())
    }

    fn command(&self, engine: &Engine) -> Command {
        match engine {
            Engine::Binary(path) => Command::new(path),
            Engine::Jar(jar) => {
                let mut cmd = Command::new(&self.java);
                cmd.arg(format!("-Xmx{}m", self.max_heap_mb))
                    .arg("-jar")
                    .arg(jar);
                cmd
            }
        }
    }

    fn find_output_musicxml(output_dir: &Path, stem: &str) -> Option<PathBuf> {
        let mxl = output_dir.join(format!("{}.mxl", stem));
        if mxl.exists() {
            return Some(mxl);
        }
        let xml = output_dir.join(format!("{}.xml", stem));
        if xml.exists() {
            return Some(xml);
        }
        let entries = fs::read_dir(output_dir).ok()?;
        let mut found: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|ext| {
                        ext.eq_ignore_ascii_case("mxl") || ext.eq_ignore_ascii_case("xml")
                    })
            })
            .collect();
        found.sort();
        found.into_iter().next()
    }

    fn wait_with_timeout(
        child: &mut Child,
        timeout: Option<Duration>,
    ) -> Result<std::process::ExitStatus, OmrError> {
        let Some(timeout) = timeout else {
            return child.wait().map_err(|e| OmrError::Backend(e.to_string()));
        };
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(status) = child
                .try_wait()
                .map_err(|e| OmrError::Backend(e.to_string()))?
            {
                return Ok(status);
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                return Err(OmrError::Timeout(timeout));
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }
}

impl Default for AudiverisOmr {
    fn default() -> Self {
        Self::new(None)
    }
}

impl OmrPort for AudiverisOmr {
    fn recognize_pdf(
        &self,
        pdf_path: &Path,
        output_dir: &Path,
        options: &OmrOptions,
    ) -> Result<OmrResult, OmrError> {
        let stem = pdf_path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| OmrError::UnsupportedFormat("invalid pdf filename".to_string()))?;
        if !pdf_path.exists() {
            return Err(OmrError::UnsupportedFormat(format!(
                "{} does not exist",
                pdf_path.display()
            )));
        }

        fs::create_dir_all(output_dir).map_err(|e| OmrError::Backend(e.to_string()))?;
        let log_path = output_dir.join(LOG_FILE);
        let log = File::create(&log_path).map_err(|e| OmrError::Backend(e.to_string()))?;
        let log_err = log.try_clone().map_err(|e| OmrError::Backend(e.to_string()))?;

        let engine = self.engine(options);
        tracing::info!(?engine, pdf = %pdf_path.display(), "running audiveris");

        let mut child = self
            .command(&engine)
            .arg("-batch")
            .arg("-export")
            .arg("-output")
            .arg(output_dir)
            .arg(pdf_path)
            .current_dir(output_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err))
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => OmrError::NotInstalled(format!("{engine:?}")),
                _ => OmrError::Backend(e.to_string()),
            })?;

        let status = Self::wait_with_timeout(&mut child, options.timeout)?;

        if !status.success() {
            let output = fs::read(&log_path).unwrap_or_default();
            let start = output.len().saturating_sub(ERROR_TAIL_BYTES);
            let tail = String::from_utf8_lossy(&output[start..]).trim().to_string();
            return Err(OmrError::RecognitionFailed(format!("{status}: {tail}")));
        }

        let diagnostics_path = if options.enable_diagnostics {
            Some(log_path)
        } else {
            let _ = fs::remove_file(&log_path);
            None
        };

        let musicxml_path = Self::find_output_musicxml(output_dir, stem)
            .ok_or_else(|| OmrError::MissingOutput(output_dir.to_path_buf()))?;
        tracing::info!(musicxml = %musicxml_path.display(), "audiveris finished");

        Ok(OmrResult {
            musicxml_path,
            diagnostics_path,
        })
    }

    fn check_installation(&self) -> Result<(), OmrError> {
        match self.engine(&OmrOptions::default()) {
            Engine::Jar(jar) => {
                if !jar.exists() {
                    return Err(OmrError::NotInstalled(format!(
                        "Audiveris JAR not found at {}",
                        jar.display()
                    )));
                }
                if !is_executable_available(Path::new(&self.java)) {
                    return Err(OmrError::NotInstalled(format!(
                        "java launcher {} not found",
                        self.java
                    )));
                }
                Ok(())
            }
            Engine::Binary(path) => {
                if is_executable_available(&path) {
                    Ok(())
                } else {
                    Err(OmrError::NotInstalled(format!(
                        "audiveris executable {} not found",
                        path.display()
                    )))
                }
            }
        }
    }
}

/// Either an existing path, or a bare command name found on `PATH`.
fn is_executable_available(program: &Path) -> bool {
    if program.components().count() > 1 || program.is_absolute() {
        return program.is_file();
    }
    std::env::var_os("PATH")
        .map(|paths| {
            std::env::split_paths(&paths).any(|dir| {
                let candidate = dir.join(program);
                candidate.is_file() || candidate.with_extension("exe").is_file()
            })
        })
        .unwrap_or(false)
}
