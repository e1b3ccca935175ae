//! Batch mode: render every diagram file under an input directory.

use std::path::{Path, PathBuf};

use crate::diagram::RenderArtifact;
use crate::error::{ArchitectError, Result};

/// File extensions picked up by a batch scan.
pub const SOURCE_EXTENSIONS: &[&str] = &["mmd", "mermaid"];

/// One file to render and where its artifact goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchJob {
    pub input: PathBuf,
    /// Output path without extension, mirroring `input` under the output dir.
    pub destination_base: PathBuf,
}

/// Create `dir` when missing. Returns `true` if it had to be created.
pub fn ensure_input_dir(dir: &Path) -> Result<bool> {
    if dir.is_dir() {
        return Ok(false);
    }
    std::fs::create_dir_all(dir)?;
    Ok(true)
}

/// Recursively collect diagram files below `input_dir`, sorted by path.
pub fn discover_jobs(input_dir: &Path, output_dir: &Path) -> Result<Vec<BatchJob>> {
    let mut files = Vec::new();
    collect_sources(input_dir, &mut files)?;
    files.sort();

    files
        .into_iter()
        .map(|input| {
            let relative = input.strip_prefix(input_dir).map_err(|_| {
                ArchitectError::InvalidConfig(format!(
                    "{} is not under {}",
                    input.display(),
                    input_dir.display()
                ))
            })?;
            Ok(BatchJob {
                destination_base: output_dir.join(relative).with_extension(""),
                input,
            })
        })
        .collect()
}

fn collect_sources(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    if !dir.is_dir() {
        return Ok(());
    }

    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let hidden = path
            .file_name()
            .map(|n| n.to_string_lossy().starts_with('.'))
            .unwrap_or(false);
        if hidden {
            continue;
        }

        if path.is_dir() {
            collect_sources(&path, files)?;
        } else if is_diagram_source(&path) {
            files.push(path);
        }
    }

    Ok(())
}

pub fn is_diagram_source(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            SOURCE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

/// Outcome for one batch job.
#[derive(Debug)]
pub struct BatchEntry {
    pub input: PathBuf,
    pub outcome: Result<RenderArtifact>,
}

/// Outcomes of a batch run, in job order.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub entries: Vec<BatchEntry>,
}

impl BatchReport {
    pub fn rendered(&self) -> usize {
        self.entries.iter().filter(|e| e.outcome.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.entries.len() - self.rendered()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
