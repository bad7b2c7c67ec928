use std::str::FromStr;

use tracing_subscriber::{EnvFilter, filter::Directive};

use intake_extractor::{
    cli::Opts,
    orchestrator::{self, Sinks},
    pipeline::PipelineConfig,
    prelude::*,
};

/// Our entry point, which can return an error. [`anyhow::Result`] will
/// automatically print a nice error message with optional backtrace.
fn main() -> Result<()> {
    init_tracing();
    real_main()
}

/// Initialize `tracing`, writing structured spans to stderr so stdout stays
/// reserved for the `[i/N] file -> OK|ERR` progress-line output.
fn init_tracing() {
    let directive = Directive::from_str("info").expect("built-in directive should be valid");
    let env_filter = EnvFilter::builder()
        .with_default_directive(directive)
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

#[instrument(level = "debug", name = "main", skip_all)]
fn real_main() -> Result<()> {
    let opts = Opts::parse_validated()?;
    debug!("Parsed options: {:?}", opts);

    let inputs = orchestrator::collect_inputs(&opts.input_path)?;
    if inputs.is_empty() {
        warn!("no supported inputs found under {:?}", opts.input_path);
    }

    let (remote, cache) = orchestrator::build_collaborators(
        opts.openai_api_key.clone(),
        opts.model.clone(),
        opts.timeout,
        opts.max_chars,
        opts.cache.as_deref(),
    )?;

    let pipeline_config = PipelineConfig {
        lang: opts.lang.clone(),
        max_snippet_lines: opts.max_lines,
        max_chars_per_snippet: opts.max_chars,
        redact: opts.redact,
        audit: opts.audit,
        cache: cache.as_ref(),
        remote: &remote,
    };

    let worker_count = opts.worker_count(inputs.len());
    let sinks = Sinks {
        per_file: opts.per_file,
        jsonl_path: opts.jsonl.clone(),
    };

    let results = orchestrator::run(inputs, worker_count, sinks, pipeline_config)?;

    let generated_at = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    orchestrator::write_combined_output(&opts.output_json, &opts.model, generated_at, &results)?;

    let failed = results.iter().filter(|r| !r.ok).count();
    if failed > 0 {
        warn!("{failed} of {} documents failed; see errors in combined output", results.len());
    }

    Ok(())
}
