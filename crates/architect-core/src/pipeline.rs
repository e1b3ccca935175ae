//! Pipeline orchestration: probe → catalog → generate → sanitize → render.
//!
//! Every stage is awaited to completion before the next one starts; the
//! front-ends drive one run at a time.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::backend::ChatBackend;
use crate::batch::{discover_jobs, ensure_input_dir, BatchEntry, BatchJob, BatchReport};
use crate::catalog;
use crate::compiler::DiagramCompiler;
use crate::config::ArchitectConfig;
use crate::diagram::{append_extension, DiagramSource, GenerationRequest, RenderArtifact};
use crate::error::{ArchitectError, Result};
use crate::generator;
use crate::naming::{NameSource, TimestampNames};
use crate::obs::RunSpan;
use crate::ollama::OllamaClient;
use crate::render::{Renderer, SOURCE_EXTENSION};
use crate::session::Session;

/// Orchestrates a chat backend and the diagram compiler.
pub struct Architect<B> {
    config: ArchitectConfig,
    backend: B,
    renderer: Renderer,
    names: Arc<dyn NameSource>,
}

impl Architect<OllamaClient> {
    /// Production wiring: Ollama backend, timestamp names.
    pub fn from_config(config: ArchitectConfig) -> Result<Self> {
        Self::from_config_with_names(config, Arc::new(TimestampNames::new()))
    }

    /// Ollama backend with a caller-chosen naming scheme.
    pub fn from_config_with_names(
        config: ArchitectConfig,
        names: Arc<dyn NameSource>,
    ) -> Result<Self> {
        config.validate()?;
        let backend = OllamaClient::new(config.ollama.clone())?;
        Ok(Self::with_backend(config, backend, names))
    }
}

impl<B: ChatBackend> Architect<B> {
    pub fn with_backend(config: ArchitectConfig, backend: B, names: Arc<dyn NameSource>) -> Self {
        let renderer = Renderer::new(
            DiagramCompiler::new(config.compiler.clone()),
            names.clone(),
            config.work_dir().to_path_buf(),
        );
        Self {
            config,
            backend,
            renderer,
            names,
        }
    }

    pub fn config(&self) -> &ArchitectConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    /// Availability probe. Must pass before the first render.
    pub async fn ensure_renderer(&self) -> Result<()> {
        self.renderer.compiler().require_available().await
    }

    /// Sorted model identifiers; empty when the server is unreachable.
    pub async fn list_models(&self) -> Vec<String> {
        catalog::list_models(&self.backend).await
    }

    pub async fn generate(&self, request: &GenerationRequest) -> Result<DiagramSource> {
        generator::generate(&self.backend, request, self.config.ollama.temperature).await
    }

    /// Fresh output path (no extension) for a generated chart.
    pub fn next_chart_base(&self) -> PathBuf {
        self.config.output_dir.join(self.names.next_name("chart"))
    }

    /// Render with the configured format.
    pub async fn render(
        &self,
        source: &DiagramSource,
        destination_base: &Path,
    ) -> Result<RenderArtifact> {
        self.renderer
            .render(source, destination_base, self.config.format)
            .await
    }

    /// Generate a diagram for `request`, keep an editable copy of its source
    /// next to the artifact, and render it.
    ///
    /// The session holds the new source even when rendering fails, so the
    /// user can fix it and re-render.
    pub async fn describe(
        &self,
        session: &mut Session,
        request: &GenerationRequest,
    ) -> Result<RenderArtifact> {
        let base = self.next_chart_base();
        let run_id = base
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        RunSpan::new("describe", &run_id)
            .run(async {
                let source = self.generate(request).await?;
                session.set_model(request.model.as_str());
                session.start(source.clone(), base.clone());
                self.save_source(&source, &base).await?;

                let artifact = self.render(&source, &base).await?;
                session.set_artifact(artifact.clone());
                Ok(artifact)
            })
            .await
    }

    /// Re-render the session's diagram, optionally replacing its source
    /// with `edited` text first.
    pub async fn rerender(
        &self,
        session: &mut Session,
        edited: Option<&str>,
    ) -> Result<RenderArtifact> {
        if let Some(text) = edited {
            session.edit(text)?;
        }
        let source = session.source().cloned().ok_or(ArchitectError::EmptySource)?;
        let base = match session.destination_base() {
            Some(base) => base.to_path_buf(),
            None => {
                let base = self.next_chart_base();
                session.start(source.clone(), base.clone());
                base
            }
        };
        let run_id = base
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        RunSpan::new("rerender", &run_id)
            .run(async {
                self.save_source(&source, &base).await?;
                let artifact = self.render(&source, &base).await?;
                session.set_artifact(artifact.clone());
                Ok(artifact)
            })
            .await
    }

    /// Render a diagram file from disk.
    ///
    /// Without `destination_base` the artifact lands in the output directory
    /// under the input's file stem.
    pub async fn render_file(
        &self,
        input: &Path,
        destination_base: Option<&Path>,
    ) -> Result<RenderArtifact> {
        let base = match destination_base {
            Some(base) => base.to_path_buf(),
            None => {
                let stem = input.file_stem().ok_or_else(|| {
                    ArchitectError::InvalidConfig(format!(
                        "{} has no file name",
                        input.display()
                    ))
                })?;
                self.config.output_dir.join(stem)
            }
        };
        let text = tokio::fs::read_to_string(input).await?;
        let source = DiagramSource::from_text(&text)?;
        self.render(&source, &base).await
    }

    /// Jobs for the configured input directory.
    ///
    /// Returns `Ok(None)` when the directory did not exist and was created.
    pub fn batch_jobs(&self) -> Result<Option<Vec<BatchJob>>> {
        if ensure_input_dir(&self.config.input_dir)? {
            info!(dir = %self.config.input_dir.display(), "created input directory");
            return Ok(None);
        }
        discover_jobs(&self.config.input_dir, &self.config.output_dir).map(Some)
    }

    /// Read, sanitize and render one batch job.
    pub async fn render_job(&self, job: &BatchJob) -> Result<RenderArtifact> {
        RunSpan::new("batch", &job.input.to_string_lossy())
            .run(async {
                let text = tokio::fs::read_to_string(&job.input).await?;
                let source = DiagramSource::from_text(&text)?;
                self.render(&source, &job.destination_base).await
            })
            .await
    }

    /// Render every job in order. Per-file failures are recorded and the
    /// batch moves on; an unavailable compiler stops it.
    pub async fn run_batch(&self, jobs: &[BatchJob]) -> BatchReport {
        let mut report = BatchReport::default();
        for job in jobs {
            let outcome = self.render_job(job).await;
            let fatal = matches!(&outcome, Err(err) if err.is_fatal());
            if let Err(err) = &outcome {
                warn!(input = %job.input.display(), error = %err, "batch entry failed");
            }
            report.entries.push(BatchEntry {
                input: job.input.clone(),
                outcome,
            });
            if fatal {
                break;
            }
        }
        report
    }

    async fn save_source(&self, source: &DiagramSource, base: &Path) -> Result<()> {
        if let Some(parent) = base.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(append_extension(base, SOURCE_EXTENSION), source.as_str()).await?;
        Ok(())
    }
}
