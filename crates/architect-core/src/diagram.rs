//! Values that flow through a single pipeline run.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ArchitectError, Result};
use crate::sanitize::sanitize;

/// A user's request for one diagram.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub model: String,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: model.into(),
        }
    }
}

/// Sanitized, non-empty diagram markup ready for the compiler.
///
/// The inner text is private: every constructor runs the sanitizer, so a
/// `DiagramSource` never contains fence markers or blank lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagramSource(String);

impl DiagramSource {
    /// Sanitize arbitrary text into diagram source.
    ///
    /// Used for fresh model output, files read in batch mode and text the
    /// user edited by hand alike; sanitizing is idempotent so already clean
    /// text passes through unchanged.
    pub fn from_text(text: &str) -> Result<Self> {
        let cleaned = sanitize(text);
        if cleaned.is_empty() {
            return Err(ArchitectError::EmptySource);
        }
        Ok(DiagramSource(cleaned))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First `max_chars` characters, for log previews.
    pub fn preview(&self, max_chars: usize) -> &str {
        match self.0.char_indices().nth(max_chars) {
            Some((idx, _)) => &self.0[..idx],
            None => &self.0,
        }
    }
}

impl fmt::Display for DiagramSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Output formats understood by the Mermaid CLI.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    Png,
    Svg,
    Pdf,
}

impl ImageFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Svg => "svg",
            ImageFormat::Pdf => "pdf",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Svg => "image/svg+xml",
            ImageFormat::Pdf => "application/pdf",
        }
    }

    /// `base` with this format's extension appended.
    ///
    /// Dots already in the file name are kept, so `flow.v1` becomes
    /// `flow.v1.png`. A base that already carries this extension is
    /// returned as is.
    pub fn destination_for(&self, base: &Path) -> PathBuf {
        let has_extension = base
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case(self.extension()))
            .unwrap_or(false);
        if has_extension {
            base.to_path_buf()
        } else {
            append_extension(base, self.extension())
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ImageFormat {
    type Err = ArchitectError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(ImageFormat::Png),
            "svg" => Ok(ImageFormat::Svg),
            "pdf" => Ok(ImageFormat::Pdf),
            other => Err(ArchitectError::InvalidConfig(format!(
                "unsupported image format: {other}"
            ))),
        }
    }
}

/// `path` with `.{extension}` added after the full file name.
///
/// Unlike [`Path::with_extension`] this never replaces a dotted segment
/// that belongs to the name.
pub fn append_extension(path: &Path, extension: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(extension);
    PathBuf::from(name)
}

/// A rendered image on disk. Outlives the render call that created it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderArtifact {
    pub path: PathBuf,
    pub format: ImageFormat,
}
