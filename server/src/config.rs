//! Service configuration: compiled defaults, then TOML files, then the
//! environment. Later sources win.
//!
//! Files are loaded in order:
//! 1. `/etc/pianola/config.toml`
//! 2. `<user config dir>/pianola/config.toml`
//! 3. `./pianola.toml`, or the `--config` path when given
//!
//! ```toml
//! [bind]
//! port = 8000
//! max_upload_mb = 50
//!
//! [paths]
//! work_dir = "/data/processing"
//! results_dir = "~/pianola/results"
//!
//! [omr]
//! engine = "/opt/audiveris"
//! timeout_secs = 600
//!
//! [storage]
//! supabase_url = "https://example.supabase.co"
//! supabase_key = "..."
//! ```

use pianola_domain_score::ConvertOptions;
use pianola_infra_storage_supabase::SupabaseConfig;
use pianola_ports::omr::OmrOptions;
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BindConfig {
    pub host: String,
    pub port: u16,
    pub max_upload_mb: usize,
}

impl Default for BindConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            max_upload_mb: 50,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    pub work_dir: PathBuf,
    pub results_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("/data/processing"),
            results_dir: PathBuf::from("/tmp/results"),
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OmrConfig {
    /// Audiveris binary, jar, `.app` bundle or home directory.
    pub engine: Option<String>,
    pub java: String,
    pub max_heap_mb: u32,
    pub timeout_secs: u64,
    pub diagnostics: bool,
    pub demo: bool,
    pub demo_delay_ms: u64,
}

impl Default for OmrConfig {
    fn default() -> Self {
        Self {
            engine: None,
            java: "java".to_string(),
            max_heap_mb: 400,
            timeout_secs: 600,
            diagnostics: false,
            demo: false,
            demo_delay_ms: 0,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StorageConfig {
    pub supabase_url: Option<String>,
    pub supabase_key: Option<String>,
    pub bucket: String,
    pub timeout_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            supabase_url: None,
            supabase_key: None,
            bucket: pianola_infra_storage_supabase::DEFAULT_BUCKET.to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TelemetryConfig {
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServiceConfig {
    pub bind: BindConfig,
    pub paths: PathsConfig,
    pub omr: OmrConfig,
    pub storage: StorageConfig,
    pub convert: ConvertOptions,
    pub telemetry: TelemetryConfig,
}

/// Where the loaded values came from.
#[derive(Clone, Debug, Default)]
pub struct ConfigSources {
    pub files: Vec<PathBuf>,
    pub env_overrides: Vec<String>,
}

impl ServiceConfig {
    /// Loads every discovered file plus the process environment.
    pub fn load(cli_path: Option<&Path>) -> Result<(Self, ConfigSources), ConfigError> {
        let files = discover_config_files(cli_path);
        let mut merged = toml::Table::new();
        for path in &files {
            let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
                path: path.clone(),
                source,
            })?;
            let table = parse_table(&contents, path)?;
            merge_tables(&mut merged, table);
        }

        let mut config = Self::from_table(merged, files.last().map(PathBuf::as_path))?;
        let mut sources = ConfigSources {
            files,
            env_overrides: Vec::new(),
        };
        config.apply_env_overrides(|key| env::var(key).ok(), &mut sources);
        Ok((config, sources))
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let path = Path::new("<inline>");
        Self::from_table(parse_table(contents, path)?, Some(path))
    }

    fn from_table(table: toml::Table, path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config: ServiceConfig =
            toml::Value::Table(table)
                .try_into()
                .map_err(|e: toml::de::Error| ConfigError::Parse {
                    path: path.map(Path::to_path_buf).unwrap_or_default(),
                    message: e.to_string(),
                })?;
        config.paths.work_dir = expand_path(&config.paths.work_dir);
        config.paths.results_dir = expand_path(&config.paths.results_dir);
        Ok(config)
    }

    /// Overlays environment variables read through `lookup`.
    pub fn apply_env_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
        sources: &mut ConfigSources,
    ) {
        let mut take = |key: &str| {
            let value = lookup(key).filter(|v| !v.trim().is_empty());
            if value.is_some() {
                sources.env_overrides.push(key.to_string());
            }
            value
        };

        if let Some(port) = take("PORT").and_then(|v| v.trim().parse().ok()) {
            self.bind.port = port;
        }
        if let Some(v) = take("PIANOLA_HOST") {
            self.bind.host = v;
        }
        if let Some(v) = take("PIANOLA_WORK_DIR") {
            self.paths.work_dir = expand_path(Path::new(&v));
        }
        if let Some(v) = take("PIANOLA_RESULTS_DIR") {
            self.paths.results_dir = expand_path(Path::new(&v));
        }
        if let Some(v) = take("AUDIVERIS_HOME") {
            self.omr.engine = Some(v);
        }
        if let Some(v) = take("JAVA_HOME") {
            self.omr.java = Path::new(&v).join("bin").join("java").display().to_string();
        }
        if let Some(v) = take("PIANOLA_OMR_DEMO") {
            self.omr.demo = matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Some(v) = take("SUPABASE_URL") {
            self.storage.supabase_url = Some(v);
        }
        if let Some(v) = take("SUPABASE_ANON_KEY") {
            self.storage.supabase_key = Some(v);
        }
        if let Some(v) = take("PIANOLA_LOG") {
            self.telemetry.log_level = v;
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind.host, self.bind.port)
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.bind.max_upload_mb.saturating_mul(1024 * 1024)
    }

    pub fn omr_options(&self) -> OmrOptions {
        OmrOptions {
            enable_diagnostics: self.omr.diagnostics,
            engine_path: self.omr.engine.clone(),
            timeout: (self.omr.timeout_secs > 0).then(|| Duration::from_secs(self.omr.timeout_secs)),
        }
    }

    /// `None` unless both the project URL and the key are set.
    pub fn supabase(&self) -> Option<SupabaseConfig> {
        let url = self.storage.supabase_url.as_deref()?.trim();
        let key = self.storage.supabase_key.as_deref()?.trim();
        if url.is_empty() || key.is_empty() {
            return None;
        }
        let mut config = SupabaseConfig::new(url, key);
        config.bucket = self.storage.bucket.clone();
        config.timeout = Duration::from_secs(self.storage.timeout_secs);
        Some(config)
    }
}

/// Existing config files in load order. A `cli_path` replaces `./pianola.toml`.
pub fn discover_config_files(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/pianola/config.toml");
    if system.exists() {
        files.push(system);
    }

    if let Some(dirs) = directories::BaseDirs::new() {
        let user = dirs.config_dir().join("pianola/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    match cli_path {
        Some(path) => files.push(path.to_path_buf()),
        None => {
            let local = PathBuf::from("pianola.toml");
            if local.exists() {
                files.push(local);
            }
        }
    }

    files
}

fn parse_table(contents: &str, path: &Path) -> Result<toml::Table, ConfigError> {
    contents
        .parse()
        .map_err(|e: toml::de::Error| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}

/// Section-wise merge: keys in `overlay` replace those in `base`.
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

fn expand_path(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => directories::BaseDirs::new()
            .map(|d| d.home_dir().join(rest))
            .unwrap_or_else(|| path.to_path_buf()),
        Err(_) => path.to_path_buf(),
    }
}
