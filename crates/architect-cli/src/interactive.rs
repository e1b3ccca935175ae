//! Menu-driven terminal session.
//!
//! One diagram at a time: the loop owns a [`Session`] and passes it to the
//! pipeline for describe and re-render.

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use architect_core::{
    choose_model, Architect, ArchitectError, ChatBackend, ErrorKind, GenerationRequest, Session,
};
use tracing::debug;

use crate::{read_line, write_batch_report, write_error};

/// Line-oriented terminal I/O.
pub struct Console<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Console<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn say(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.output, "{text}")
    }

    /// Print `label` and read the answer. `None` at end of input.
    fn ask(&mut self, label: &str) -> io::Result<Option<String>> {
        write!(self.output, "{label}")?;
        self.output.flush()?;
        read_line(&mut self.input)
    }

    /// Wait for Enter so diagnostics stay on screen.
    fn pause(&mut self) -> io::Result<()> {
        self.ask("Press Enter to continue...")?;
        Ok(())
    }

    fn report(&mut self, err: &ArchitectError) -> io::Result<()> {
        write_error(&mut self.output, err)
    }

    #[cfg(test)]
    fn into_output(self) -> W {
        self.output
    }
}

enum Choice {
    Describe,
    Batch,
    Edit,
    Model,
    Quit,
    Unknown(String),
}

fn parse_choice(input: &str) -> Choice {
    match input.trim().to_ascii_lowercase().as_str() {
        "1" | "d" | "describe" => Choice::Describe,
        "2" | "b" | "batch" => Choice::Batch,
        "e" | "edit" => Choice::Edit,
        "m" | "model" => Choice::Model,
        "q" | "quit" | "exit" => Choice::Quit,
        other => Choice::Unknown(other.to_string()),
    }
}

/// Run the menu until the user quits or input ends.
///
/// The compiler probe runs first; a missing compiler ends the session with
/// an error before any menu is shown. The model is then picked once from the
/// catalog and kept for every describe until the user changes it.
pub async fn run<B, R, W>(architect: &Architect<B>, console: &mut Console<R, W>) -> Result<()>
where
    B: ChatBackend,
    R: BufRead,
    W: Write,
{
    architect
        .ensure_renderer()
        .await
        .context("Mermaid CLI check failed")?;

    let mut session = Session::new();
    let Some(model) = select_model(architect, console, &session).await? else {
        return Ok(());
    };
    session.set_model(model);

    loop {
        console.say("")?;
        console.say("Mermaid Architect")?;
        console.say("  1) Describe a diagram")?;
        console.say(&format!(
            "  2) Process files in {}",
            architect.config().input_dir.display()
        ))?;
        console.say("  e) Edit and re-render the last diagram")?;
        console.say(&format!(
            "  m) Change model (current: {})",
            session.model().unwrap_or_default()
        ))?;
        console.say("  q) Quit")?;

        let Some(answer) = console.ask("> ")? else {
            break;
        };
        let outcome = match parse_choice(&answer) {
            Choice::Describe => describe(architect, console, &mut session).await?,
            Choice::Batch => batch(architect, console).await?,
            Choice::Edit => edit(architect, console, &mut session).await?,
            Choice::Model => {
                if let Some(model) = select_model(architect, console, &session).await? {
                    session.set_model(model);
                }
                Ok(())
            }
            Choice::Quit => break,
            Choice::Unknown(other) => {
                console.say(&format!("Unknown choice: {other}"))?;
                Ok(())
            }
        };
        if let Err(err) = outcome {
            if err.is_fatal() {
                return Err(err).context("Mermaid CLI became unavailable");
            }
        }
    }
    Ok(())
}

/// Numbered model picker. `None` at end of input.
async fn select_model<B, R, W>(
    architect: &Architect<B>,
    console: &mut Console<R, W>,
    session: &Session,
) -> io::Result<Option<String>>
where
    B: ChatBackend,
    R: BufRead,
    W: Write,
{
    let models = architect.list_models().await;
    let default = session
        .model()
        .unwrap_or(architect.config().ollama.default_model.as_str())
        .to_string();

    if models.is_empty() {
        console.say(&format!(
            "No models listed by {}.",
            architect.config().ollama.base_url
        ))?;
        let Some(answer) = console.ask(&format!("Model name [{default}]: "))? else {
            return Ok(None);
        };
        return Ok(choose_model(&models, &answer, &default));
    }

    console.say("Available models:")?;
    for (i, model) in models.iter().enumerate() {
        console.say(&format!("  {}) {model}", i + 1))?;
    }
    loop {
        let Some(answer) = console.ask("Model (number or name): ")? else {
            return Ok(None);
        };
        if let Some(model) = choose_model(&models, &answer, &default) {
            return Ok(Some(model));
        }
    }
}

type Step = std::result::Result<(), ArchitectError>;

async fn describe<B, R, W>(
    architect: &Architect<B>,
    console: &mut Console<R, W>,
    session: &mut Session,
) -> Result<Step>
where
    B: ChatBackend,
    R: BufRead,
    W: Write,
{
    let model = session
        .model()
        .unwrap_or(architect.config().ollama.default_model.as_str())
        .to_string();
    let Some(prompt) = console.ask("Describe the diagram: ")? else {
        return Ok(Ok(()));
    };
    if prompt.trim().is_empty() {
        console.say("Nothing to describe.")?;
        return Ok(Ok(()));
    }

    console.say(&format!("Asking {model}..."))?;
    let request = GenerationRequest::new(prompt.trim(), model);
    match architect.describe(session, &request).await {
        Ok(artifact) => {
            console.say(&format!("Diagram saved to {}", artifact.path.display()))?;
            if let Some(source) = session.source_file() {
                console.say(&format!(
                    "Edit {} and choose 'e' to re-render.",
                    source.display()
                ))?;
            }
            Ok(Ok(()))
        }
        Err(err) => {
            console.report(&err)?;
            // Only a render failure leaves this request's source in the session.
            if err.kind() == ErrorKind::RenderFailure {
                if let Some(source) = session.source_file() {
                    console.say(&format!(
                        "Fix {} and choose 'e' to re-render.",
                        source.display()
                    ))?;
                }
            }
            console.pause()?;
            Ok(Err(err))
        }
    }
}

async fn batch<B, R, W>(architect: &Architect<B>, console: &mut Console<R, W>) -> Result<Step>
where
    B: ChatBackend,
    R: BufRead,
    W: Write,
{
    let input_dir = architect.config().input_dir.clone();
    let jobs = match architect.batch_jobs() {
        Ok(Some(jobs)) => jobs,
        Ok(None) => {
            console.say(&format!(
                "Created {}; put .mmd files there and try again.",
                input_dir.display()
            ))?;
            return Ok(Ok(()));
        }
        Err(err) => {
            console.report(&err)?;
            return Ok(Err(err));
        }
    };
    if jobs.is_empty() {
        console.say(&format!("No diagram files found in {}", input_dir.display()))?;
        return Ok(Ok(()));
    }

    console.say(&format!("Rendering {} file(s)...", jobs.len()))?;
    let mut report = architect.run_batch(&jobs).await;
    write_batch_report(&mut console.output, &report)?;

    if report.failed() > 0 {
        console.pause()?;
    }
    let fatal = report
        .entries
        .iter()
        .position(|e| matches!(&e.outcome, Err(err) if err.is_fatal()));
    match fatal {
        Some(index) => {
            let entry = report.entries.swap_remove(index);
            Ok(entry.outcome.map(|_| ()))
        }
        None => Ok(Ok(())),
    }
}

async fn edit<B, R, W>(
    architect: &Architect<B>,
    console: &mut Console<R, W>,
    session: &mut Session,
) -> Result<Step>
where
    B: ChatBackend,
    R: BufRead,
    W: Write,
{
    let Some(source_file) = session.source_file() else {
        console.say("Nothing to re-render yet; describe a diagram first.")?;
        return Ok(Ok(()));
    };

    let edited = match tokio::fs::read_to_string(&source_file).await {
        Ok(text) => Some(text),
        Err(err) => {
            debug!(path = %source_file.display(), error = %err, "source file unreadable");
            console.say(&format!(
                "Could not read {} ({err}); re-rendering the last source.",
                source_file.display()
            ))?;
            None
        }
    };

    match architect.rerender(session, edited.as_deref()).await {
        Ok(artifact) => {
            console.say(&format!("Diagram saved to {}", artifact.path.display()))?;
            Ok(Ok(()))
        }
        Err(err) => {
            console.report(&err)?;
            console.pause()?;
            Ok(Err(err))
        }
    }
}
