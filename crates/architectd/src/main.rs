//! architectd: serves the Mermaid Architect web form.
//!
//! The Mermaid CLI probe runs before the listener is bound; a missing
//! compiler stops the server with the install hint.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use architect_core::{Architect, ArchitectConfig, ImageFormat, OllamaClient, UuidNames};
use architectd::{router, AppState};
use clap::Parser;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "architectd")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Mermaid Architect web form", long_about = None)]
struct Cli {
    /// Address to listen on
    #[arg(long, env = "ARCHITECT_BIND", default_value = "127.0.0.1:8501")]
    bind: SocketAddr,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json: bool,

    /// Ollama server address
    #[arg(long, env = "OLLAMA_HOST")]
    ollama_host: Option<String>,

    /// Model preselected when the catalog is empty
    #[arg(long, env = "ARCHITECT_MODEL")]
    model: Option<String>,

    /// Mermaid CLI executable
    #[arg(long, env = "MMDC_BIN")]
    compiler: Option<String>,

    /// Directory receiving rendered diagrams
    #[arg(long, env = "ARCHITECT_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Output format: png, svg or pdf
    #[arg(long, env = "ARCHITECT_FORMAT", default_value = "svg")]
    format: ImageFormat,

    /// Background passed to the compiler
    #[arg(long, env = "ARCHITECT_BACKGROUND", default_value = "transparent")]
    background: String,

    /// Keep every compiler input file for inspection
    #[arg(long, env = "ARCHITECT_KEEP_TRANSIENT")]
    keep_transient: bool,
}

impl Cli {
    fn config(&self) -> ArchitectConfig {
        let mut config = ArchitectConfig::from_env();
        if let Some(host) = &self.ollama_host {
            config.ollama.base_url = architect_core::config::normalize_host(host);
        }
        if let Some(model) = &self.model {
            config.ollama.default_model = model.clone();
        }
        if let Some(compiler) = &self.compiler {
            config.compiler.binary = compiler.clone();
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        config.format = self.format;
        config.compiler.background = Some(self.background.clone());
        config.compiler.keep_transient |= self.keep_transient;
        config
    }

    /// The daemon may share its output directory with `architect` runs, so
    /// chart and transient names come from UUIDs rather than a per-process
    /// counter.
    fn architect(&self) -> Result<Architect<OllamaClient>> {
        Architect::from_config_with_names(self.config(), Arc::new(UuidNames))
            .context("Failed to set up Mermaid Architect")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    architect_core::init_tracing(cli.json, level);

    let architect = cli.architect()?;
    architect
        .ensure_renderer()
        .await
        .context("Mermaid CLI check failed")?;

    let state = Arc::new(AppState::new(architect));
    let listener = tokio::net::TcpListener::bind(cli.bind)
        .await
        .with_context(|| format!("Failed to bind {}", cli.bind))?;
    info!(addr = %listener.local_addr()?, "architectd listening");

    axum::serve(listener, router(state))
        .await
        .context("HTTP server error")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_web_defaults_are_transparent_svg() {
        let cli = Cli::try_parse_from(["architectd"]).unwrap();
        let config = cli.config();
        assert_eq!(config.compiler.background.as_deref(), Some("transparent"));
        if std::env::var_os("ARCHITECT_FORMAT").is_none() {
            assert_eq!(config.format, ImageFormat::Svg);
        }
    }

    #[test]
    fn test_chart_names_are_uuid_based() {
        let cli = Cli::try_parse_from(["architectd", "--output-dir", "/srv/charts"]).unwrap();
        let architect = cli.architect().unwrap();
        let first = architect.next_chart_base();
        let second = architect.next_chart_base();

        assert_ne!(first, second);
        assert_eq!(first.parent(), Some(std::path::Path::new("/srv/charts")));
        let name = first.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("chart_"));
        assert_eq!(name.len(), "chart_".len() + 32);
    }

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::try_parse_from([
            "architectd",
            "--bind",
            "0.0.0.0:9000",
            "--format",
            "png",
            "--background",
            "white",
            "--compiler",
            "/opt/mmdc",
        ])
        .unwrap();
        assert_eq!(cli.bind.port(), 9000);
        let config = cli.config();
        assert_eq!(config.format, ImageFormat::Png);
        assert_eq!(config.compiler.background.as_deref(), Some("white"));
        assert_eq!(config.compiler.binary, "/opt/mmdc");
    }
}
