//! Single-slot session holding the diagram currently being worked on.
//!
//! Front-ends pass a `Session` explicitly between "generate", "edit" and
//! "re-render" so the last diagram never lives in ambient state.

use std::path::{Path, PathBuf};

use crate::diagram::{append_extension, DiagramSource, RenderArtifact};
use crate::error::Result;
use crate::render::SOURCE_EXTENSION;

#[derive(Debug, Default, Clone)]
pub struct Session {
    source: Option<DiagramSource>,
    destination_base: Option<PathBuf>,
    artifact: Option<RenderArtifact>,
    model: Option<String>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn source(&self) -> Option<&DiagramSource> {
        self.source.as_ref()
    }

    pub fn artifact(&self) -> Option<&RenderArtifact> {
        self.artifact.as_ref()
    }

    pub fn destination_base(&self) -> Option<&Path> {
        self.destination_base.as_deref()
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn set_model(&mut self, model: impl Into<String>) {
        self.model = Some(model.into());
    }

    /// Start a new diagram. Drops the previous artifact.
    pub fn start(&mut self, source: DiagramSource, destination_base: PathBuf) {
        self.source = Some(source);
        self.destination_base = Some(destination_base);
        self.artifact = None;
    }

    /// Replace the source with hand-edited text.
    ///
    /// The text goes through the same sanitizer as model output. The previous
    /// artifact stays until a re-render succeeds.
    pub fn edit(&mut self, text: &str) -> Result<&DiagramSource> {
        let source = DiagramSource::from_text(text)?;
        Ok(self.source.insert(source))
    }

    pub fn set_artifact(&mut self, artifact: RenderArtifact) {
        self.artifact = Some(artifact);
    }

    /// Editable copy of the source, next to the artifact.
    pub fn source_file(&self) -> Option<PathBuf> {
        self.destination_base
            .as_ref()
            .map(|base| append_extension(base, SOURCE_EXTENSION))
    }
}
