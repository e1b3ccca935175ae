//! Structured observability hooks for pipeline lifecycle events.
//!
//! This module provides:
//! - Run-scoped tracing spans via `RunSpan`
//! - Emission functions for probe, catalog, generation and render events
//!
//! Events are emitted at `info!` level except failures (`warn!`) and
//! catalog misses (`debug!`, an offline server is routine).

use std::future::Future;
use std::path::Path;

use tracing::instrument::Instrumented;
use tracing::{debug, info, warn, Instrument};

/// Run-scoped span for one pipeline run.
///
/// The span is attached to the run's future rather than entered, so it
/// follows the run across awaits and the future stays `Send`.
///
/// ```ignore
/// RunSpan::new("describe", "chart_20261015093000123_0000")
///     .run(async { /* every event here is tagged with mode and run_id */ })
///     .await
/// ```
pub struct RunSpan {
    span: tracing::Span,
}

impl RunSpan {
    pub fn new(mode: &str, run_id: &str) -> Self {
        Self {
            span: tracing::info_span!("architect.run", mode = %mode, run_id = %run_id),
        }
    }

    pub fn run<F: Future>(self, fut: F) -> Instrumented<F> {
        fut.instrument(self.span)
    }
}

pub fn emit_probe_finished(binary: &str, available: bool) {
    if available {
        info!(event = "probe.finished", binary = %binary, available = true);
    } else {
        warn!(event = "probe.finished", binary = %binary, available = false);
    }
}

pub fn emit_catalog_listed(backend: &str, models: usize, reachable: bool) {
    if reachable {
        info!(event = "catalog.listed", backend = %backend, models = models);
    } else {
        debug!(event = "catalog.listed", backend = %backend, models = 0, reachable = false);
    }
}

pub fn emit_generation_started(model: &str, prompt_len: usize) {
    info!(event = "generation.started", model = %model, prompt_len = prompt_len);
}

pub fn emit_generation_finished(model: &str, duration_ms: u64, success: bool) {
    info!(
        event = "generation.finished",
        model = %model,
        duration_ms = duration_ms,
        success = success,
    );
}

pub fn emit_render_started(source: &Path, destination: &Path) {
    info!(
        event = "render.started",
        source = %source.display(),
        destination = %destination.display(),
    );
}

pub fn emit_render_finished(destination: &Path, duration_ms: u64) {
    info!(
        event = "render.finished",
        destination = %destination.display(),
        duration_ms = duration_ms,
    );
}

/// `retained` is the kept transient source, when diagnostics retention is on.
pub fn emit_render_failed(destination: &Path, exit_code: i32, retained: Option<&Path>) {
    match retained {
        Some(path) => warn!(
            event = "render.failed",
            destination = %destination.display(),
            exit_code = exit_code,
            retained_source = %path.display(),
        ),
        None => warn!(
            event = "render.failed",
            destination = %destination.display(),
            exit_code = exit_code,
        ),
    }
}
