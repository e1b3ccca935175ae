//! Mermaid Architect Core
//!
//! Turns a natural-language description into a rendered diagram:
//! - asks a local Ollama model for Mermaid markup
//! - sanitizes the answer into markup the Mermaid CLI accepts
//! - shells out to `mmdc` to produce PNG, SVG or PDF
//!
//! Both front-ends (`architect` and `architectd`) are thin wrappers over
//! [`Architect`].

pub mod backend;
pub mod batch;
pub mod catalog;
pub mod compiler;
pub mod config;
pub mod diagram;
pub mod error;
pub mod fakes;
pub mod generator;
pub mod naming;
pub mod obs;
pub mod ollama;
pub mod pipeline;
pub mod render;
pub mod sanitize;
pub mod session;
pub mod telemetry;

pub use backend::{ChatBackend, ChatMessage};
pub use batch::{discover_jobs, BatchEntry, BatchJob, BatchReport, SOURCE_EXTENSIONS};
pub use catalog::{choose_model, list_models};
pub use compiler::{CompilerOutput, Completion, DiagramCompiler};
pub use config::{ArchitectConfig, CompilerConfig, OllamaConfig};
pub use diagram::{DiagramSource, GenerationRequest, ImageFormat, RenderArtifact};
pub use error::{ArchitectError, ErrorKind, Result, INSTALL_HINT};
pub use generator::{extract_fenced_block, generate, SYSTEM_PROMPT};
pub use naming::{NameSource, SequentialNames, TimestampNames, UuidNames};
pub use ollama::OllamaClient;
pub use pipeline::Architect;
pub use render::{Renderer, TransientSource};
pub use sanitize::sanitize;
pub use session::Session;
pub use telemetry::init_tracing;

/// Mermaid Architect version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
