//! Runtime configuration.
//!
//! Every knob has an environment variable fallback so the binaries work with
//! zero flags against a stock Ollama install and a globally installed `mmdc`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::diagram::ImageFormat;
use crate::error::{ArchitectError, Result};

pub const DEFAULT_OLLAMA_HOST: &str = "http://127.0.0.1:11434";
pub const DEFAULT_MODEL: &str = "llama3";
pub const DEFAULT_COMPILER: &str = "mmdc";

/// Ollama connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    /// Server base URL, normalised (scheme present, no trailing slash)
    pub base_url: String,
    /// Model used when the catalog is empty and the user supplies nothing
    pub default_model: String,
    /// Sampling temperature for generation
    pub temperature: f32,
    /// Ceiling for `GET /api/tags`
    pub catalog_timeout_secs: u64,
    /// Ceiling for `POST /api/chat`
    pub generation_timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        OllamaConfig {
            base_url: normalize_host(
                &std::env::var("OLLAMA_HOST").unwrap_or_else(|_| DEFAULT_OLLAMA_HOST.to_string()),
            ),
            default_model: std::env::var("ARCHITECT_MODEL")
                .unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            temperature: env_parse("ARCHITECT_TEMPERATURE").unwrap_or(0.1),
            catalog_timeout_secs: env_parse("ARCHITECT_CATALOG_TIMEOUT").unwrap_or(5),
            generation_timeout_secs: env_parse("ARCHITECT_GENERATION_TIMEOUT").unwrap_or(60),
        }
    }
}

impl OllamaConfig {
    /// Create a config from environment variables
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Create config for a specific server
    pub fn new(host: &str) -> Self {
        OllamaConfig {
            base_url: normalize_host(host),
            ..Self::default()
        }
    }

    pub fn with_default_model(mut self, model: &str) -> Self {
        self.default_model = model.to_string();
        self
    }

    pub fn with_catalog_timeout(mut self, secs: u64) -> Self {
        self.catalog_timeout_secs = secs;
        self
    }

    pub fn with_generation_timeout(mut self, secs: u64) -> Self {
        self.generation_timeout_secs = secs;
        self
    }

    pub fn tags_url(&self) -> String {
        format!("{}/api/tags", self.base_url)
    }

    pub fn chat_url(&self) -> String {
        format!("{}/api/chat", self.base_url)
    }

    pub fn catalog_timeout(&self) -> Duration {
        Duration::from_secs(self.catalog_timeout_secs)
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }
}

/// Diagram compiler (Mermaid CLI) settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompilerConfig {
    /// Executable name or path
    pub binary: String,
    /// Ceiling for the `--version` probe
    pub probe_timeout_secs: u64,
    /// Ceiling for a single render
    pub render_timeout_secs: u64,
    /// Passed as `-b <background>` when set
    pub background: Option<String>,
    /// Keep transient source files instead of deleting them after each render
    pub keep_transient: bool,
    /// Where transient source files are written (output dir when unset)
    pub work_dir: Option<PathBuf>,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        CompilerConfig {
            binary: std::env::var("MMDC_BIN").unwrap_or_else(|_| DEFAULT_COMPILER.to_string()),
            probe_timeout_secs: 5,
            render_timeout_secs: env_parse("ARCHITECT_RENDER_TIMEOUT").unwrap_or(120),
            background: std::env::var("ARCHITECT_BACKGROUND").ok(),
            keep_transient: env_flag("ARCHITECT_KEEP_TRANSIENT"),
            work_dir: std::env::var_os("ARCHITECT_WORK_DIR").map(PathBuf::from),
        }
    }
}

impl CompilerConfig {
    pub fn from_env() -> Self {
        Self::default()
    }

    pub fn new(binary: &str) -> Self {
        CompilerConfig {
            binary: binary.to_string(),
            ..Self::default()
        }
    }

    pub fn with_background(mut self, background: &str) -> Self {
        self.background = Some(background.to_string());
        self
    }

    pub fn with_keep_transient(mut self, keep: bool) -> Self {
        self.keep_transient = keep;
        self
    }

    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(dir.into());
        self
    }

    pub fn with_render_timeout(mut self, secs: u64) -> Self {
        self.render_timeout_secs = secs;
        self
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn render_timeout(&self) -> Duration {
        Duration::from_secs(self.render_timeout_secs)
    }
}

/// Top-level configuration shared by both front-ends
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchitectConfig {
    pub ollama: OllamaConfig,
    pub compiler: CompilerConfig,
    /// Batch mode scans this directory for `.mmd` files
    pub input_dir: PathBuf,
    /// Rendered artifacts land here
    pub output_dir: PathBuf,
    pub format: ImageFormat,
}

impl Default for ArchitectConfig {
    fn default() -> Self {
        ArchitectConfig {
            ollama: OllamaConfig::default(),
            compiler: CompilerConfig::default(),
            input_dir: std::env::var_os("ARCHITECT_INPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./input")),
            output_dir: std::env::var_os("ARCHITECT_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./output")),
            format: std::env::var("ARCHITECT_FORMAT")
                .ok()
                .and_then(|f| f.parse().ok())
                .unwrap_or_default(),
        }
    }
}

impl ArchitectConfig {
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Directory for transient compiler inputs.
    pub fn work_dir(&self) -> &Path {
        self.compiler
            .work_dir
            .as_deref()
            .unwrap_or(self.output_dir.as_path())
    }

    /// Pretty JSON, as printed by `architect doctor`.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject settings that can only fail later.
    pub fn validate(&self) -> Result<()> {
        if self.compiler.binary.trim().is_empty() {
            return Err(ArchitectError::InvalidConfig(
                "compiler binary must not be empty".to_string(),
            ));
        }
        if self.ollama.default_model.trim().is_empty() {
            return Err(ArchitectError::InvalidConfig(
                "default model must not be empty".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.ollama.temperature) {
            return Err(ArchitectError::InvalidConfig(format!(
                "temperature {} outside 0.0..=2.0",
                self.ollama.temperature
            )));
        }
        if self.compiler.probe_timeout_secs == 0
            || self.compiler.render_timeout_secs == 0
            || self.ollama.catalog_timeout_secs == 0
            || self.ollama.generation_timeout_secs == 0
        {
            return Err(ArchitectError::InvalidConfig(
                "timeouts must be at least one second".to_string(),
            ));
        }
        Ok(())
    }
}

/// Add a scheme when missing and drop trailing slashes.
pub fn normalize_host(host: &str) -> String {
    let mut host = host.trim().to_string();
    if host.is_empty() {
        host = DEFAULT_OLLAMA_HOST.to_string();
    }
    if !host.starts_with("http://") && !host.starts_with("https://") {
        host = format!("http://{host}");
    }
    host.trim_end_matches('/').to_string()
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn env_flag(key: &str) -> bool {
    matches!(
        std::env::var(key)
            .map(|v| v.trim().to_ascii_lowercase())
            .as_deref(),
        Ok("1" | "true" | "yes" | "on")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_host() {
        assert_eq!(normalize_host("localhost:11434"), "http://localhost:11434");
        assert_eq!(
            normalize_host("http://127.0.0.1:11434/"),
            "http://127.0.0.1:11434"
        );
        assert_eq!(normalize_host("https://gpu.box///"), "https://gpu.box");
        assert_eq!(normalize_host("  "), DEFAULT_OLLAMA_HOST);
    }

    #[test]
    fn test_ollama_urls() {
        let config = OllamaConfig::new("localhost:11434");
        assert_eq!(config.tags_url(), "http://localhost:11434/api/tags");
        assert_eq!(config.chat_url(), "http://localhost:11434/api/chat");
    }

    #[test]
    fn test_ollama_builders() {
        let config = OllamaConfig::new("localhost")
            .with_default_model("mistral")
            .with_catalog_timeout(2)
            .with_generation_timeout(30);
        assert_eq!(config.default_model, "mistral");
        assert_eq!(config.catalog_timeout(), Duration::from_secs(2));
        assert_eq!(config.generation_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_compiler_builders() {
        let config = CompilerConfig::new("/opt/mmdc")
            .with_background("transparent")
            .with_keep_transient(true)
            .with_work_dir("/tmp/architect")
            .with_render_timeout(10);
        assert_eq!(config.binary, "/opt/mmdc");
        assert_eq!(config.background.as_deref(), Some("transparent"));
        assert!(config.keep_transient);
        assert_eq!(config.work_dir, Some(PathBuf::from("/tmp/architect")));
        assert_eq!(config.render_timeout(), Duration::from_secs(10));
        assert_eq!(config.probe_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_work_dir_falls_back_to_output_dir() {
        let mut config = ArchitectConfig::default();
        config.output_dir = PathBuf::from("/srv/out");
        config.compiler.work_dir = None;
        assert_eq!(config.work_dir(), Path::new("/srv/out"));

        config.compiler.work_dir = Some(PathBuf::from("/srv/tmp"));
        assert_eq!(config.work_dir(), Path::new("/srv/tmp"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = ArchitectConfig::default();
        config.compiler.binary = "mmdc".to_string();
        config.ollama.default_model = "llama3".to_string();
        config.ollama.temperature = 0.1;
        assert!(config.validate().is_ok());

        let mut bad = config.clone();
        bad.compiler.binary = " ".to_string();
        assert!(bad.validate().is_err());

        let mut bad = config.clone();
        bad.ollama.temperature = 5.0;
        assert!(bad.validate().is_err());

        let mut bad = config;
        bad.compiler.render_timeout_secs = 0;
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_config_serializes() {
        let config = ArchitectConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"ollama\""));
        assert!(json.contains("\"compiler\""));
    }
}
