//! Mermaid Architect CLI
//!
//! The `architect` command turns plain-language descriptions into rendered
//! Mermaid diagrams using a local Ollama model and the Mermaid CLI.
//!
//! ## Commands
//!
//! - `interactive` (default): menu loop to describe diagrams, batch-process
//!   the input directory and re-render the last diagram after editing
//! - `generate`: describe one diagram non-interactively
//! - `render`: render an existing `.mmd` file
//! - `batch`: render every diagram file under the input directory
//! - `models`: list models known to the Ollama server
//! - `doctor`: check the compiler and the Ollama server

mod interactive;

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use architect_core::{
    Architect, ArchitectConfig, ArchitectError, BatchReport, ChatBackend, ErrorKind,
    GenerationRequest, ImageFormat, Session, INSTALL_HINT,
};
use clap::{Args, Parser, Subcommand};
use tracing::{info, Level};

use crate::interactive::Console;

#[derive(Parser)]
#[command(name = "architect")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Describe a system in plain language, get a Mermaid diagram", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(flatten)]
    config: ConfigArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Overrides applied on top of the environment-derived configuration.
#[derive(Args, Debug, Default)]
struct ConfigArgs {
    /// Ollama server address
    #[arg(long, global = true, env = "OLLAMA_HOST")]
    ollama_host: Option<String>,

    /// Model used when the catalog is empty
    #[arg(long, global = true, env = "ARCHITECT_MODEL")]
    model: Option<String>,

    /// Mermaid CLI executable
    #[arg(long, global = true, env = "MMDC_BIN")]
    compiler: Option<String>,

    /// Directory scanned by batch mode
    #[arg(long, global = true, env = "ARCHITECT_INPUT_DIR")]
    input_dir: Option<PathBuf>,

    /// Directory receiving rendered diagrams
    #[arg(long, global = true, env = "ARCHITECT_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Directory for transient compiler inputs (default: output dir)
    #[arg(long, global = true, env = "ARCHITECT_WORK_DIR")]
    work_dir: Option<PathBuf>,

    /// Output format: png, svg or pdf
    #[arg(long, global = true, env = "ARCHITECT_FORMAT")]
    format: Option<ImageFormat>,

    /// Background passed to the compiler (e.g. transparent, white)
    #[arg(long, global = true, env = "ARCHITECT_BACKGROUND")]
    background: Option<String>,

    /// Keep every compiler input file and print its path on failure
    #[arg(long, global = true, env = "ARCHITECT_KEEP_TRANSIENT")]
    keep_transient: bool,

    /// Render timeout in seconds
    #[arg(long, global = true, env = "ARCHITECT_RENDER_TIMEOUT")]
    render_timeout: Option<u64>,

    /// Generation timeout in seconds
    #[arg(long, global = true, env = "ARCHITECT_GENERATION_TIMEOUT")]
    generation_timeout: Option<u64>,
}

impl ConfigArgs {
    fn apply(self, mut config: ArchitectConfig) -> ArchitectConfig {
        if let Some(host) = self.ollama_host {
            config.ollama.base_url = architect_core::config::normalize_host(&host);
        }
        if let Some(model) = self.model {
            config.ollama.default_model = model;
        }
        if let Some(compiler) = self.compiler {
            config.compiler.binary = compiler;
        }
        if let Some(dir) = self.input_dir {
            config.input_dir = dir;
        }
        if let Some(dir) = self.output_dir {
            config.output_dir = dir;
        }
        if let Some(dir) = self.work_dir {
            config.compiler.work_dir = Some(dir);
        }
        if let Some(format) = self.format {
            config.format = format;
        }
        if let Some(background) = self.background {
            config.compiler.background = Some(background);
        }
        if self.keep_transient {
            config.compiler.keep_transient = true;
        }
        if let Some(secs) = self.render_timeout {
            config.compiler.render_timeout_secs = secs;
        }
        if let Some(secs) = self.generation_timeout {
            config.ollama.generation_timeout_secs = secs;
        }
        config
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Menu-driven session (default)
    Interactive,

    /// Describe one diagram and render it
    Generate {
        /// Plain-language description
        #[arg(required = true, num_args = 1..)]
        prompt: Vec<String>,
    },

    /// Render an existing diagram file
    Render {
        /// Mermaid source file
        file: PathBuf,

        /// Output path without extension (default: <output-dir>/<file stem>)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Render every .mmd/.mermaid file under the input directory
    Batch,

    /// List models available on the Ollama server
    Models,

    /// Check the compiler, the Ollama server and the effective configuration
    Doctor,
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

    let config = cli.config.apply(ArchitectConfig::from_env());
    let architect =
        Architect::from_config(config).context("Failed to set up Mermaid Architect")?;

    match cli.command.unwrap_or(Commands::Interactive) {
        Commands::Interactive => {
            let stdin = io::stdin();
            let mut console = Console::new(stdin.lock(), io::stdout());
            interactive::run(&architect, &mut console).await
        }
        Commands::Generate { prompt } => cmd_generate(&architect, &prompt.join(" ")).await,
        Commands::Render { file, output } => {
            cmd_render(&architect, &file, output.as_deref()).await
        }
        Commands::Batch => cmd_batch(&architect, &mut io::stdout()).await,
        Commands::Models => cmd_models(&architect).await,
        Commands::Doctor => cmd_doctor(&architect).await,
    }
}

/// Fail fast with the install hint when the compiler is missing.
async fn require_compiler<B: ChatBackend>(architect: &Architect<B>) -> Result<()> {
    architect
        .ensure_renderer()
        .await
        .context("Mermaid CLI check failed")
}

async fn cmd_generate<B: ChatBackend>(architect: &Architect<B>, prompt: &str) -> Result<()> {
    require_compiler(architect).await?;

    let model = architect.config().ollama.default_model.clone();
    let request = GenerationRequest::new(prompt, model);
    let mut session = Session::new();

    match architect.describe(&mut session, &request).await {
        Ok(artifact) => {
            println!("Diagram saved to {}", artifact.path.display());
            if let Some(source) = session.source_file() {
                println!("Source saved to {}", source.display());
            }
            Ok(())
        }
        Err(err) => {
            if let Some(source) = session.source_file() {
                eprintln!("Source saved to {}", source.display());
            }
            Err(failure(err))
        }
    }
}

async fn cmd_render<B: ChatBackend>(
    architect: &Architect<B>,
    file: &Path,
    output: Option<&Path>,
) -> Result<()> {
    require_compiler(architect).await?;

    let artifact = architect
        .render_file(file, output)
        .await
        .map_err(failure)?;
    println!("Diagram saved to {}", artifact.path.display());
    Ok(())
}

async fn cmd_batch<B: ChatBackend, W: Write>(architect: &Architect<B>, out: &mut W) -> Result<()> {
    require_compiler(architect).await?;

    let input_dir = architect.config().input_dir.clone();
    let Some(jobs) = architect.batch_jobs()? else {
        writeln!(
            out,
            "Created {}; put .mmd files there and run again.",
            input_dir.display()
        )?;
        return Ok(());
    };
    if jobs.is_empty() {
        writeln!(out, "No diagram files found in {}", input_dir.display())?;
        return Ok(());
    }

    info!(files = jobs.len(), dir = %input_dir.display(), "processing batch");
    let report = architect.run_batch(&jobs).await;
    write_batch_report(out, &report)?;

    if let Some(fatal) = report
        .entries
        .iter()
        .filter_map(|e| e.outcome.as_ref().err())
        .find(|err| err.is_fatal())
    {
        bail!("{fatal}");
    }
    if report.failed() > 0 {
        bail!("{} of {} diagrams failed", report.failed(), report.entries.len());
    }
    Ok(())
}

/// One line per file, failure diagnostics underneath, then the totals.
fn write_batch_report<W: Write>(out: &mut W, report: &BatchReport) -> io::Result<()> {
    for entry in &report.entries {
        match &entry.outcome {
            Ok(artifact) => writeln!(
                out,
                "ok    {} -> {}",
                entry.input.display(),
                artifact.path.display()
            )?,
            Err(err) => {
                writeln!(out, "FAIL  {}", entry.input.display())?;
                write_error(out, err)?;
            }
        }
    }
    writeln!(
        out,
        "Rendered {}, failed {}",
        report.rendered(),
        report.failed()
    )
}

/// Print an error the way users need to see it. Compiler diagnostics are
/// passed through untouched.
fn write_error<W: Write>(out: &mut W, err: &ArchitectError) -> io::Result<()> {
    match err {
        ArchitectError::RenderFailure {
            exit_code,
            diagnostics,
            ..
        } => {
            writeln!(out, "Mermaid CLI failed (exit {exit_code}):")?;
            write!(out, "{diagnostics}")?;
            if !diagnostics.ends_with('\n') {
                writeln!(out)?;
            }
        }
        other => writeln!(out, "Error: {other}")?,
    }
    if let Some(path) = err.retained_source() {
        writeln!(out, "Diagram source kept at {}", path.display())?;
    }
    Ok(())
}

/// Print the error to stderr and hand back a short summary for the exit path.
fn failure(err: ArchitectError) -> anyhow::Error {
    let mut stderr = io::stderr();
    let _ = write_error(&mut stderr, &err);
    match err.kind() {
        ErrorKind::RenderFailure => anyhow::anyhow!("render failed"),
        _ => anyhow::Error::new(err),
    }
}

async fn cmd_models<B: ChatBackend>(architect: &Architect<B>) -> Result<()> {
    let models = architect.list_models().await;
    if models.is_empty() {
        println!(
            "No models found at {} (server unreachable or nothing pulled).",
            architect.config().ollama.base_url
        );
        println!("Default model: {}", architect.config().ollama.default_model);
        return Ok(());
    }
    for model in models {
        println!("{model}");
    }
    Ok(())
}

async fn cmd_doctor<B: ChatBackend>(architect: &Architect<B>) -> Result<()> {
    let mut out = io::stdout();
    write_doctor(architect, &mut out).await?;
    Ok(())
}

async fn write_doctor<B: ChatBackend, W: Write>(
    architect: &Architect<B>,
    out: &mut W,
) -> Result<()> {
    let config = architect.config();
    writeln!(out, "Mermaid Architect {}", architect_core::VERSION)?;
    writeln!(out, "======================")?;
    writeln!(out)?;

    let compiler = architect.renderer().compiler();
    match compiler.version().await {
        Some(version) => writeln!(out, "Mermaid CLI ({}): {version}", compiler.binary())?,
        None => writeln!(
            out,
            "Mermaid CLI ({}): not available; {INSTALL_HINT}",
            compiler.binary()
        )?,
    }

    let models = architect.list_models().await;
    if models.is_empty() {
        writeln!(
            out,
            "Ollama ({}): unreachable or no models pulled",
            config.ollama.base_url
        )?;
    } else {
        writeln!(
            out,
            "Ollama ({}): {} model(s): {}",
            config.ollama.base_url,
            models.len(),
            models.join(", ")
        )?;
    }

    writeln!(out)?;
    writeln!(out, "Configuration:")?;
    writeln!(out, "{}", config.to_json_pretty()?)?;
    Ok(())
}

/// Read one line from `input`; `None` at end of input.
pub(crate) fn read_line<R: BufRead>(input: &mut R) -> io::Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use architect_core::fakes::ScriptedBackend;
    use architect_core::{BatchEntry, RenderArtifact, SequentialNames};
    use std::sync::Arc;

    #[test]
    fn test_cli_defaults_to_interactive() {
        let cli = Cli::try_parse_from(["architect"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.verbose);
    }

    #[test]
    fn test_cli_parses_generate_prompt_words() {
        let cli = Cli::try_parse_from(["architect", "generate", "login", "flow", "--format", "svg"])
            .unwrap();
        match cli.command {
            Some(Commands::Generate { prompt }) => assert_eq!(prompt.join(" "), "login flow"),
            _ => panic!("expected generate"),
        }
        assert_eq!(cli.config.format, Some(ImageFormat::Svg));
    }

    #[test]
    fn test_cli_rejects_unknown_format() {
        assert!(Cli::try_parse_from(["architect", "--format", "gif", "batch"]).is_err());
    }

    #[test]
    fn test_config_args_override_defaults() {
        let args = ConfigArgs {
            ollama_host: Some("gpu-box:11434/".to_string()),
            model: Some("mistral".to_string()),
            compiler: Some("/opt/mmdc".to_string()),
            output_dir: Some(PathBuf::from("/tmp/out")),
            format: Some(ImageFormat::Pdf),
            background: Some("white".to_string()),
            keep_transient: true,
            render_timeout: Some(30),
            ..ConfigArgs::default()
        };
        let config = args.apply(ArchitectConfig::default());
        assert_eq!(config.ollama.base_url, "http://gpu-box:11434");
        assert_eq!(config.ollama.default_model, "mistral");
        assert_eq!(config.compiler.binary, "/opt/mmdc");
        assert_eq!(config.output_dir, PathBuf::from("/tmp/out"));
        assert_eq!(config.format, ImageFormat::Pdf);
        assert_eq!(config.compiler.background.as_deref(), Some("white"));
        assert!(config.compiler.keep_transient);
        assert_eq!(config.compiler.render_timeout_secs, 30);
    }

    #[test]
    fn test_write_error_passes_diagnostics_through() {
        let err = ArchitectError::RenderFailure {
            exit_code: 1,
            diagnostics: "Error: Parse error on line 2:\nBROKEN\n^".to_string(),
            retained_source: Some(PathBuf::from("/work/source_3.mmd")),
        };
        let mut out = Vec::new();
        write_error(&mut out, &err).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "Mermaid CLI failed (exit 1):\nError: Parse error on line 2:\nBROKEN\n^\nDiagram source kept at /work/source_3.mmd\n"
        );
    }

    #[test]
    fn test_batch_report_summary() {
        let report = BatchReport {
            entries: vec![
                BatchEntry {
                    input: PathBuf::from("input/a.mmd"),
                    outcome: Ok(RenderArtifact {
                        path: PathBuf::from("output/a.png"),
                        format: ImageFormat::Png,
                    }),
                },
                BatchEntry {
                    input: PathBuf::from("input/b.mmd"),
                    outcome: Err(ArchitectError::EmptySource),
                },
            ],
        };
        let mut out = Vec::new();
        write_batch_report(&mut out, &report).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("ok    input/a.mmd -> output/a.png"));
        assert!(text.contains("FAIL  input/b.mmd\nError: diagram source is empty"));
        assert!(text.ends_with("Rendered 1, failed 1\n"));
    }

    #[tokio::test]
    async fn test_doctor_reports_missing_compiler_and_offline_server() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ArchitectConfig::default();
        config.compiler.binary = "definitely-not-a-real-mmdc".to_string();
        config.output_dir = dir.path().to_path_buf();
        let architect = Architect::with_backend(
            config,
            ScriptedBackend::new(),
            Arc::new(SequentialNames::new()),
        );

        let mut out = Vec::new();
        write_doctor(&architect, &mut out).await.unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("not available; install it with: npm install -g @mermaid-js/mermaid-cli"));
        assert!(text.contains("unreachable or no models pulled"));
        assert!(text.contains("\"compiler\""));
    }

    #[tokio::test]
    async fn test_batch_requires_compiler() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ArchitectConfig::default();
        config.compiler.binary = "definitely-not-a-real-mmdc".to_string();
        config.input_dir = dir.path().join("input");
        config.output_dir = dir.path().join("output");
        let architect = Architect::with_backend(
            config,
            ScriptedBackend::new(),
            Arc::new(SequentialNames::new()),
        );

        let mut out = Vec::new();
        let err = cmd_batch(&architect, &mut out).await.unwrap_err();
        assert!(format!("{err:#}").contains("npm install -g @mermaid-js/mermaid-cli"));
        assert!(!dir.path().join("input").exists());
    }
}
