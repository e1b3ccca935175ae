//! Error taxonomy for Mermaid Architect.

use std::path::PathBuf;

/// Remediation shown when the diagram compiler cannot be invoked.
pub const INSTALL_HINT: &str = "install it with: npm install -g @mermaid-js/mermaid-cli";

/// Coarse classification of an [`ArchitectError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Compiler missing or misconfigured. Halts the run.
    EnvironmentUnavailable,
    /// Inference server unreachable. Degrade to a manual model identifier.
    CatalogUnavailable,
    /// Bad status, transport error or malformed body from the chat endpoint.
    GenerationFailure,
    /// Compiler ran but did not produce an artifact.
    RenderFailure,
    /// Local I/O, configuration or input problems.
    Local,
}

/// Errors produced by the architect pipeline.
#[derive(Debug, thiserror::Error)]
pub enum ArchitectError {
    #[error("diagram compiler `{binary}` is not available; {hint}")]
    EnvironmentUnavailable { binary: String, hint: String },

    #[error("model catalog unavailable: {0}")]
    CatalogUnavailable(String),

    #[error("generation failed: {0}")]
    GenerationFailure(String),

    /// `diagnostics` is the compiler's standard error, byte for byte.
    #[error("diagram compiler exited with status {exit_code}:\n{diagnostics}")]
    RenderFailure {
        exit_code: i32,
        diagnostics: String,
        retained_source: Option<PathBuf>,
    },

    #[error("diagram compiler timed out after {timeout_secs}s")]
    RenderTimeout {
        timeout_secs: u64,
        retained_source: Option<PathBuf>,
    },

    #[error("diagram compiler reported success but no artifact exists at {}", path.display())]
    MissingArtifact {
        path: PathBuf,
        retained_source: Option<PathBuf>,
    },

    #[error("diagram source is empty")]
    EmptySource,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ArchitectError {
    pub fn environment_unavailable(binary: impl Into<String>) -> Self {
        ArchitectError::EnvironmentUnavailable {
            binary: binary.into(),
            hint: INSTALL_HINT.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ArchitectError::EnvironmentUnavailable { .. } => ErrorKind::EnvironmentUnavailable,
            ArchitectError::CatalogUnavailable(_) => ErrorKind::CatalogUnavailable,
            ArchitectError::GenerationFailure(_) => ErrorKind::GenerationFailure,
            ArchitectError::RenderFailure { .. }
            | ArchitectError::RenderTimeout { .. }
            | ArchitectError::MissingArtifact { .. } => ErrorKind::RenderFailure,
            ArchitectError::EmptySource
            | ArchitectError::InvalidConfig(_)
            | ArchitectError::Io(_)
            | ArchitectError::Serialization(_) => ErrorKind::Local,
        }
    }

    /// Whether the current run must stop.
    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::EnvironmentUnavailable
    }

    /// Transient source file kept on disk for inspection, if any.
    pub fn retained_source(&self) -> Option<&std::path::Path> {
        match self {
            ArchitectError::RenderFailure {
                retained_source, ..
            }
            | ArchitectError::RenderTimeout {
                retained_source, ..
            }
            | ArchitectError::MissingArtifact {
                retained_source, ..
            } => retained_source.as_deref(),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ArchitectError {
    fn from(err: reqwest::Error) -> Self {
        ArchitectError::GenerationFailure(err.to_string())
    }
}

/// Result type for architect operations.
pub type Result<T> = std::result::Result<T, ArchitectError>;
