//! Command-line options.

use clap::Parser;

use crate::prelude::*;

/// Minimum HTTP timeout enforced at parse time.
const MIN_TIMEOUT_SECS: u64 = 30;
/// Default HTTP timeout.
const DEFAULT_TIMEOUT_SECS: u64 = 120;
/// Minimum `--max-lines`.
const MIN_MAX_LINES: usize = 6;
/// Default `--max-lines`.
const DEFAULT_MAX_LINES: usize = 40;
/// Minimum `--max-chars`.
const MIN_MAX_CHARS: usize = 500;
/// Default `--max-chars`.
const DEFAULT_MAX_CHARS: usize = 4000;

/// Turn scanned legal intake PDFs and images into schema-conformant
/// structured records.
#[derive(Debug, Parser)]
#[clap(
    version,
    author,
    after_help = r#"
Environment Variables:
  - OPENAI_API_BASE (optional): Override the remote extractor's server URL.
"#
)]
pub struct Opts {
    /// A single file, or a directory of files (scanned non-recursively).
    pub input_path: PathBuf,

    /// The OpenAI API key used to authenticate remote extraction calls.
    pub openai_api_key: String,

    /// Where to write the combined JSON result.
    pub output_json: PathBuf,

    /// Number of worker threads. Defaults to `min(num_cpus, input count)`.
    #[clap(long)]
    pub threads: Option<usize>,

    /// Tesseract language code.
    #[clap(long, default_value = "eng")]
    pub lang: String,

    /// The remote model name.
    #[clap(long, default_value = "gpt-4o-mini")]
    pub model: String,

    /// Also write `<stem>.extracted.json` next to each input.
    #[clap(long)]
    pub per_file: bool,

    /// Append one JSON object per processed document to this JSONL file.
    #[clap(long)]
    pub jsonl: Option<PathBuf>,

    /// Directory for the content-addressed remote-extraction cache.
    #[clap(long)]
    pub cache: Option<PathBuf>,

    /// Mask SSNs, phone numbers, and email addresses in every output string.
    #[clap(long)]
    pub redact: bool,

    /// Include a `raw_ocr_preview` (first 4000 chars of OCR text) in every
    /// merged record.
    #[clap(long)]
    pub audit: bool,

    /// Per-request HTTP timeout, in seconds. Enforced minimum 30s.
    #[clap(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout: u64,

    /// Maximum snippet lines. Enforced minimum 6.
    #[clap(long, default_value_t = DEFAULT_MAX_LINES)]
    pub max_lines: usize,

    /// Maximum snippet bytes. Enforced minimum 500.
    #[clap(long, default_value_t = DEFAULT_MAX_CHARS)]
    pub max_chars: usize,
}

impl Opts {
    /// Parse `std::env::args`, validating the minimums pinned to specific
    /// flags. Violations are fatal [`PipelineError::ConfigError`]s, exactly
    /// like an unreadable output path or an uncreatable cache directory
    /// (see `main.rs`).
    pub fn parse_validated() -> Result<Self> {
        let opts = Self::parse();
        opts.validate()?;
        Ok(opts)
    }

    fn validate(&self) -> Result<()> {
        if self.timeout < MIN_TIMEOUT_SECS {
            return Err(PipelineError::ConfigError(format!(
                "--timeout must be at least {MIN_TIMEOUT_SECS}s, got {}",
                self.timeout
            ))
            .into());
        }
        if self.max_lines < MIN_MAX_LINES {
            return Err(PipelineError::ConfigError(format!(
                "--max-lines must be at least {MIN_MAX_LINES}, got {}",
                self.max_lines
            ))
            .into());
        }
        if self.max_chars < MIN_MAX_CHARS {
            return Err(PipelineError::ConfigError(format!(
                "--max-chars must be at least {MIN_MAX_CHARS}, got {}",
                self.max_chars
            ))
            .into());
        }
        Ok(())
    }

    /// The worker-pool size: `min(configured_threads, input_count)`,
    /// defaulting `configured_threads` to the detected CPU count.
    pub fn worker_count(&self, input_count: usize) -> usize {
        let configured = self.threads.unwrap_or_else(num_cpus::get).max(1);
        configured.min(input_count.max(1))
    }
}
