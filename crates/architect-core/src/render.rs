//! Rendering diagram source to an image through the compiler.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::compiler::{Completion, DiagramCompiler};
use crate::diagram::{append_extension, DiagramSource, ImageFormat, RenderArtifact};
use crate::error::{ArchitectError, Result};
use crate::naming::NameSource;
use crate::obs::{emit_render_failed, emit_render_finished, emit_render_started};

/// Extension of transient compiler inputs.
pub const SOURCE_EXTENSION: &str = "mmd";

/// Scoped transient source file.
///
/// Removed on drop, whatever path the render took, unless retention is on.
#[derive(Debug)]
pub struct TransientSource {
    path: PathBuf,
    keep: bool,
}

impl TransientSource {
    /// Claim `path` and write `contents` to it verbatim.
    pub async fn create(path: PathBuf, contents: &str, keep: bool) -> Result<Self> {
        // Guard first so a half-written file is still cleaned up.
        let guard = TransientSource { path, keep };
        tokio::fs::write(&guard.path, contents.as_bytes()).await?;
        Ok(guard)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Absolute path of the file that will survive this render, if any.
    pub fn retained_path(&self) -> Option<PathBuf> {
        if self.keep {
            Some(std::fs::canonicalize(&self.path).unwrap_or_else(|_| self.path.clone()))
        } else {
            None
        }
    }
}

impl Drop for TransientSource {
    fn drop(&mut self) {
        if !self.keep {
            remove_quietly(&self.path, "transient source");
        }
    }
}

/// Compiler output written next to the destination.
///
/// Moved over the destination only when the render succeeds, so a failed
/// attempt never touches an artifact from an earlier run. Whatever is left
/// at the scratch path is removed on drop.
#[derive(Debug)]
struct ScratchArtifact {
    path: PathBuf,
}

impl ScratchArtifact {
    fn beside(destination: &Path, format: ImageFormat) -> Self {
        let name = destination
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            path: destination.with_file_name(format!(".{name}.partial.{}", format.extension())),
        }
    }

    async fn persist(&self, destination: &Path) -> Result<()> {
        tokio::fs::rename(&self.path, destination).await?;
        Ok(())
    }
}

impl Drop for ScratchArtifact {
    fn drop(&mut self) {
        remove_quietly(&self.path, "partial artifact");
    }
}

fn remove_quietly(path: &Path, what: &str) {
    if let Err(err) = std::fs::remove_file(path) {
        if err.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %err, "failed to remove {what}");
        }
    }
}

/// Writes sources to transient files and drives the compiler over them.
#[derive(Clone)]
pub struct Renderer {
    compiler: DiagramCompiler,
    names: Arc<dyn NameSource>,
    work_dir: PathBuf,
}

impl Renderer {
    pub fn new(compiler: DiagramCompiler, names: Arc<dyn NameSource>, work_dir: PathBuf) -> Self {
        Self {
            compiler,
            names,
            work_dir,
        }
    }

    pub fn compiler(&self) -> &DiagramCompiler {
        &self.compiler
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Render `source` to `destination_base` with `format`'s extension.
    ///
    /// Success means exit status zero *and* an artifact on disk. A non-zero
    /// exit yields `RenderFailure` whose `diagnostics` is the compiler's
    /// stderr exactly as captured. A failed attempt leaves any existing
    /// file at the destination as it was. No retries.
    pub async fn render(
        &self,
        source: &DiagramSource,
        destination_base: &Path,
        format: ImageFormat,
    ) -> Result<RenderArtifact> {
        let destination = format.destination_for(destination_base);
        if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::create_dir_all(&self.work_dir).await?;

        // Leftovers from an interrupted run must not count as output.
        let scratch = ScratchArtifact::beside(&destination, format);
        match tokio::fs::remove_file(&scratch.path).await {
            Ok(()) => debug!(path = %scratch.path.display(), "removed leftover partial artifact"),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }

        let keep = self.compiler.config().keep_transient;
        let transient_path = append_extension(
            &self.work_dir.join(self.names.next_name("source")),
            SOURCE_EXTENSION,
        );
        let transient = TransientSource::create(transient_path, source.as_str(), keep).await?;

        if keep {
            debug!(preview = %source.preview(100), "diagram source preview");
        }
        emit_render_started(transient.path(), &destination);

        let completion = match self.compiler.compile(transient.path(), &scratch.path).await {
            Ok(completion) => completion,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(ArchitectError::environment_unavailable(self.compiler.binary()));
            }
            Err(err) => return Err(err.into()),
        };

        let output = match completion {
            Completion::Finished(output) => output,
            Completion::TimedOut => {
                let retained = transient.retained_path();
                emit_render_failed(&destination, -1, retained.as_deref());
                return Err(ArchitectError::RenderTimeout {
                    timeout_secs: self.compiler.config().render_timeout_secs,
                    retained_source: retained,
                });
            }
        };

        if !output.passed() {
            let retained = transient.retained_path();
            emit_render_failed(&destination, output.exit_code, retained.as_deref());
            return Err(ArchitectError::RenderFailure {
                exit_code: output.exit_code,
                diagnostics: output.stderr,
                retained_source: retained,
            });
        }

        if !tokio::fs::try_exists(&scratch.path).await.unwrap_or(false) {
            let retained = transient.retained_path();
            emit_render_failed(&destination, output.exit_code, retained.as_deref());
            return Err(ArchitectError::MissingArtifact {
                path: destination,
                retained_source: retained,
            });
        }

        scratch.persist(&destination).await?;
        if let Some(path) = transient.retained_path() {
            debug!(path = %path.display(), "transient source kept");
        }
        emit_render_finished(&destination, output.duration_ms);
        Ok(RenderArtifact {
            path: destination,
            format,
        })
    }
}
