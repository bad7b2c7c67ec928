//! Named error kinds for the extraction pipeline.
//!
//! Every per-document failure is represented as one of these, so the
//! orchestrator can record a stable, matchable error instead of stringly
//! typed `anyhow::Error`s. Global/fatal errors still flow through
//! `anyhow::Error` at the command boundary (see `main.rs`), with these
//! variants wrapped in via `From`.

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced while turning one input file into a [`crate::types::DocResult`].
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The input file's extension (or sniffed MIME type) isn't one we handle.
    #[error("unsupported file type: {0:?}")]
    UnsupportedFileType(PathBuf),

    /// The PDF rasterizer produced no pages, or the subprocess failed.
    #[error("failed to rasterize {path:?}: {reason}")]
    RasterizationError { path: PathBuf, reason: String },

    /// An image could not be read, or decoded to an empty image.
    #[error("failed to read image {path:?}: {reason}")]
    ImageReadError { path: PathBuf, reason: String },

    /// Every page of a document produced empty OCR text.
    #[error("OCR produced no text for {path:?}")]
    OCRError { path: PathBuf },

    /// The remote extractor returned an HTTP error status after retries
    /// were exhausted.
    #[error("remote extractor returned HTTP {status} after retries: {body}")]
    RemoteError { status: u16, body: String },

    /// A transport-level failure (connection refused, DNS, TLS, etc.)
    /// talking to the remote extractor.
    #[error("transport error calling remote extractor: {0}")]
    TransportError(String),

    /// The remote extractor's response could not be parsed as JSON, even
    /// after brace-recovery, or failed schema validation.
    #[error("failed to parse remote extractor response: {0}")]
    ParseError(String),

    /// Failure writing an output sink (combined JSON, JSONL, per-file JSON).
    #[error("I/O error writing output: {0}")]
    IOError(String),

    /// A fatal configuration problem (bad CLI args, unwritable output path,
    /// cache directory that cannot be created).
    #[error("configuration error: {0}")]
    ConfigError(String),
}

impl PipelineError {
    /// A short machine-stable tag for this error's kind, independent of its
    /// formatted message. Not currently surfaced on the CLI, but useful for
    /// tests that want to assert on *which* error occurred.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::UnsupportedFileType(_) => "unsupported_file_type",
            PipelineError::RasterizationError { .. } => "rasterization_error",
            PipelineError::ImageReadError { .. } => "image_read_error",
            PipelineError::OCRError { .. } => "ocr_error",
            PipelineError::RemoteError { .. } => "remote_error",
            PipelineError::TransportError(_) => "transport_error",
            PipelineError::ParseError(_) => "parse_error",
            PipelineError::IOError(_) => "io_error",
            PipelineError::ConfigError(_) => "config_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_context() {
        let err = PipelineError::RasterizationError {
            path: PathBuf::from("foo.pdf"),
            reason: "pdftocairo exited with status 1".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("foo.pdf"));
        assert!(msg.contains("pdftocairo"));
        assert_eq!(err.kind(), "rasterization_error");
    }
}
