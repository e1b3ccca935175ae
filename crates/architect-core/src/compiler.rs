//! Mermaid CLI invocation.

use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::process::Command;
use tracing::debug;

use crate::config::CompilerConfig;
use crate::error::{ArchitectError, Result};
use crate::obs::emit_probe_finished;

/// Captured result of one compiler process.
#[derive(Debug, Clone)]
pub struct CompilerOutput {
    /// Exit code (-1 when killed by a signal).
    pub exit_code: i32,

    pub stdout: String,

    /// Captured stderr, untouched.
    pub stderr: String,

    pub duration_ms: u64,

    pub success: bool,
}

impl CompilerOutput {
    pub fn passed(&self) -> bool {
        self.success && self.exit_code == 0
    }
}

/// How a compiler process ended.
#[derive(Debug)]
pub enum Completion {
    Finished(CompilerOutput),
    TimedOut,
}

/// Handle on the external diagram compiler.
#[derive(Debug, Clone)]
pub struct DiagramCompiler {
    config: CompilerConfig,
}

impl DiagramCompiler {
    pub fn new(config: CompilerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    pub fn binary(&self) -> &str {
        &self.config.binary
    }

    /// `true` only when `<compiler> --version` exits cleanly within the
    /// probe timeout. Missing binary, timeout and non-zero exit all read as
    /// unavailable.
    pub async fn probe(&self) -> bool {
        let available = matches!(
            self.run(&["--version".into()], self.config.probe_timeout()).await,
            Ok(Completion::Finished(ref out)) if out.passed()
        );
        emit_probe_finished(&self.config.binary, available);
        available
    }

    /// Version string reported by the compiler, if it answers.
    pub async fn version(&self) -> Option<String> {
        match self
            .run(&["--version".into()], self.config.probe_timeout())
            .await
        {
            Ok(Completion::Finished(out)) if out.passed() => Some(out.stdout.trim().to_string()),
            _ => None,
        }
    }

    /// Probe and turn a negative answer into `EnvironmentUnavailable`.
    pub async fn require_available(&self) -> Result<()> {
        if self.probe().await {
            Ok(())
        } else {
            Err(ArchitectError::environment_unavailable(&self.config.binary))
        }
    }

    /// `<compiler> -i <input> -o <output> [-b <background>]`
    pub fn render_args(&self, input: &Path, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-i".into(),
            input.as_os_str().to_owned(),
            "-o".into(),
            output.as_os_str().to_owned(),
        ];
        if let Some(background) = &self.config.background {
            args.push("-b".into());
            args.push(background.into());
        }
        args
    }

    /// Compile `input` into `output` under the render timeout.
    pub async fn compile(&self, input: &Path, output: &Path) -> std::io::Result<Completion> {
        self.run(&self.render_args(input, output), self.config.render_timeout())
            .await
    }

    async fn run(&self, args: &[OsString], timeout: Duration) -> std::io::Result<Completion> {
        let start = Instant::now();
        debug!(binary = %self.config.binary, ?args, "spawning diagram compiler");

        let child = Command::new(&self.config.binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(output) => output?,
            Err(_) => return Ok(Completion::TimedOut),
        };

        Ok(Completion::Finished(CompilerOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            duration_ms: start.elapsed().as_millis() as u64,
            success: output.status.success(),
        }))
    }
}
