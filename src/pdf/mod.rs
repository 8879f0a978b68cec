//! Size-targeted PDF reduction.
//!
//! A [`Recompressor`] rewrites a PDF with its images encoded at one JPEG
//! quality. [`compress_to_target`] bisects that quality until the output is
//! as large as possible while still fitting the requested size (within a
//! tolerance), or falls back to the smallest output it produced.

use std::fs;
use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use log::{debug, info};
use regex::Regex;
use thiserror::Error;

use crate::constants::{
    PDF_DEFAULT_MAX_ITERATIONS, PDF_DEFAULT_MAX_QUALITY, PDF_DEFAULT_MIN_QUALITY,
    PDF_DEFAULT_TOLERANCE,
};

pub mod lopdf_backend;

pub use lopdf_backend::LopdfRecompressor;

lazy_static! {
    static ref SIZE_PATTERN: Regex = Regex::new(r"(?i)^(\d+(?:\.\d+)?)([KMG]?B)?$").unwrap();
}

#[derive(Debug, Error)]
pub enum ReduceError {
    #[error("unable to parse size value: {0:?}")]
    InvalidSize(String),

    #[error("{0}")]
    InvalidArgument(String),

    #[error("input PDF not found: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("failed to process PDF: {0}")]
    Recompress(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl ReduceError {
    /// Whether the error stems from bad command-line input
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            ReduceError::InvalidSize(_) | ReduceError::InvalidArgument(_) | ReduceError::InputNotFound(_)
        )
    }

    fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        ReduceError::Io {
            context: context.into(),
            source,
        }
    }
}

/// Convert a human readable size (`500KB`, `0.5MB`, `100`) to bytes.
///
/// Units are binary multiples and case-insensitive; a bare number is bytes.
pub fn parse_size(value: &str) -> Result<u64, ReduceError> {
    let trimmed = value.trim();
    let captures = SIZE_PATTERN
        .captures(trimmed)
        .ok_or_else(|| ReduceError::InvalidSize(value.to_string()))?;

    let number: f64 = captures[1]
        .parse()
        .map_err(|_| ReduceError::InvalidSize(value.to_string()))?;

    let unit = captures
        .get(2)
        .map(|m| m.as_str().to_ascii_uppercase())
        .unwrap_or_else(|| "B".to_string());
    let multiplier: u64 = match unit.as_str() {
        "KB" => 1024,
        "MB" => 1024 * 1024,
        "GB" => 1024 * 1024 * 1024,
        _ => 1,
    };

    let bytes = (number * multiplier as f64) as u64;
    if bytes == 0 {
        return Err(ReduceError::InvalidArgument(
            "target size must be positive".to_string(),
        ));
    }
    Ok(bytes)
}

/// Format a byte count with two decimals in the largest fitting unit.
pub fn human_readable_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 B".to_string();
    }

    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", value, UNITS[unit])
}

/// Output path for `input`: inside `output` when it is a directory.
pub fn resolve_output_path(input: &Path, output: &Path) -> PathBuf {
    match input.file_name() {
        Some(name) if output.is_dir() => output.join(name),
        _ => output.to_path_buf(),
    }
}

/// Rewrites a PDF with images at a given quality.
pub trait Recompressor {
    fn recompress(&self, input: &Path, output: &Path, quality: u8) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompressionSettings {
    pub target_size: u64,
    /// Relative slack above the target accepted for a candidate
    pub tolerance: f64,
    pub min_quality: u8,
    pub max_quality: u8,
    pub max_iterations: u32,
}

impl CompressionSettings {
    pub fn new(target_size: u64) -> Self {
        Self {
            target_size,
            tolerance: PDF_DEFAULT_TOLERANCE,
            min_quality: PDF_DEFAULT_MIN_QUALITY,
            max_quality: PDF_DEFAULT_MAX_QUALITY,
            max_iterations: PDF_DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn validate(&self) -> Result<(), ReduceError> {
        if self.target_size == 0 {
            return Err(ReduceError::InvalidArgument("target size must be positive".to_string()));
        }
        if !(self.tolerance > 0.0 && self.tolerance < 1.0) {
            return Err(ReduceError::InvalidArgument(
                "tolerance must be between 0 and 1 (exclusive)".to_string(),
            ));
        }
        if self.min_quality < 1 || self.max_quality > 100 || self.min_quality >= self.max_quality {
            return Err(ReduceError::InvalidArgument(format!(
                "invalid quality range {}..{}",
                self.min_quality, self.max_quality
            )));
        }
        if self.max_iterations == 0 {
            return Err(ReduceError::InvalidArgument(
                "max iterations must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    fn within_tolerance(&self, size: u64) -> bool {
        size as f64 <= self.target_size as f64 * (1.0 + self.tolerance)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompressionOutcome {
    pub output: PathBuf,
    pub size_bytes: u64,
    pub reached_target: bool,
    /// Recompression passes performed; zero when the input was copied as-is
    pub iterations: u32,
    /// Quality of the chosen candidate
    pub quality: Option<u8>,
}

#[derive(Debug, Clone)]
struct Candidate {
    path: PathBuf,
    size: u64,
    quality: u8,
}

/// Shrink `input` into `output` by bisecting the image quality.
///
/// Candidates live in a temporary directory next to `output` and are
/// removed when the function returns; the chosen one is moved into place.
pub fn compress_to_target(
    input: &Path,
    output: &Path,
    settings: &CompressionSettings,
    recompressor: &dyn Recompressor,
) -> Result<CompressionOutcome, ReduceError> {
    settings.validate()?;

    if !input.is_file() {
        return Err(ReduceError::InputNotFound(input.to_path_buf()));
    }

    let input_size = fs::metadata(input)
        .map_err(|e| ReduceError::io(format!("failed to read {}", input.display()), e))?
        .len();

    if input_size <= settings.target_size {
        info!(
            "{} is already {} (target {}); copying unchanged",
            input.display(),
            human_readable_size(input_size),
            human_readable_size(settings.target_size)
        );
        fs::copy(input, output)
            .map_err(|e| ReduceError::io(format!("failed to copy to {}", output.display()), e))?;
        return Ok(CompressionOutcome {
            output: output.to_path_buf(),
            size_bytes: input_size,
            reached_target: true,
            iterations: 0,
            quality: None,
        });
    }

    let work_parent = output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let work_dir = tempfile::Builder::new()
        .prefix(".reduce-pdf-")
        .tempdir_in(work_parent)
        .map_err(|e| ReduceError::io("failed to create working directory", e))?;

    let mut best: Option<Candidate> = None;
    let mut fallback: Option<Candidate> = None;
    let mut low = u32::from(settings.min_quality);
    let mut high = u32::from(settings.max_quality);
    let mut iterations = 0;

    while low <= high && iterations < settings.max_iterations {
        iterations += 1;
        let quality = ((low + high) / 2) as u8;
        let path = work_dir.path().join(format!("candidate-q{}.pdf", quality));

        recompressor
            .recompress(input, &path, quality)
            .map_err(|e| ReduceError::Recompress(format!("{:#}", e)))?;
        let size = fs::metadata(&path)
            .map_err(|e| ReduceError::io(format!("failed to read {}", path.display()), e))?
            .len();
        debug!("Quality {} produced {}", quality, human_readable_size(size));

        let candidate = Candidate { path, size, quality };

        if settings.within_tolerance(size) {
            if best.as_ref().map_or(true, |b| size > b.size) {
                best = Some(candidate);
            }
            low = u32::from(quality) + 1;
        } else {
            if best.is_none() && fallback.as_ref().map_or(true, |f| size < f.size) {
                fallback = Some(candidate);
            }
            high = u32::from(quality).saturating_sub(1);
        }
    }

    let chosen = best
        .or(fallback)
        .ok_or_else(|| ReduceError::Recompress("no candidate was produced".to_string()))?;

    if fs::rename(&chosen.path, output).is_err() {
        fs::copy(&chosen.path, output)
            .map_err(|e| ReduceError::io(format!("failed to write {}", output.display()), e))?;
    }

    Ok(CompressionOutcome {
        output: output.to_path_buf(),
        size_bytes: chosen.size,
        reached_target: chosen.size <= settings.target_size,
        iterations,
        quality: Some(chosen.quality),
    })
}
