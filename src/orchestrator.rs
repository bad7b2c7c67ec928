//! Fan-out over many inputs: a fixed thread pool pulling from a shared
//! atomic cursor, per-file and combined/streaming sinks, error capture.
//!
//! This uses literal OS threads over a shared `AtomicUsize` index rather
//! than an async task queue: each document's inner loop is CPU-bound (OCR,
//! image preprocessing) rather than I/O-bound throughout, so there's no
//! benefit to cooperative scheduling here, and a plain thread pool keeps the
//! ordering and cleanup guarantees straightforward to reason about. See
//! DESIGN.md.

use std::{
    fs::File,
    io::Write as _,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    thread,
};

use crate::{
    cache::Cache,
    pipeline::{PipelineConfig, classify_media_kind, process_document},
    prelude::*,
    remote::RemoteExtractor,
    types::{DocResult, InputRef},
};

/// Collect every supported input under `input_path`: the path itself if
/// it's a single file, or every directly-contained supported file if it's a
/// directory (non-recursive), sorted lexicographically by path.
pub fn collect_inputs(input_path: &Path) -> Result<Vec<InputRef>> {
    let metadata = std::fs::metadata(input_path)
        .with_context(|| format!("failed to stat input path {:?}", input_path))?;

    let mut paths: Vec<PathBuf> = if metadata.is_dir() {
        std::fs::read_dir(input_path)
            .with_context(|| format!("failed to read directory {:?}", input_path))?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .collect()
    } else {
        vec![input_path.to_owned()]
    };
    paths.sort();

    let mut inputs = Vec::with_capacity(paths.len());
    for path in paths {
        match classify_media_kind(&path) {
            Ok(kind) => inputs.push(InputRef { path, kind }),
            // Non-matching files in a directory scan are silently skipped
            // (only an explicit single-file input of an unsupported type is
            // a hard `UnsupportedFileType` error; see `run`).
            Err(_) if metadata.is_dir() => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(inputs)
}

/// Sinks configured for a run: optional per-file JSON, optional JSONL
/// append, always the combined JSON at the end.
pub struct Sinks {
    pub per_file: bool,
    pub jsonl_path: Option<PathBuf>,
}

/// Everything a worker thread needs, shared across the pool.
struct SharedState<'a> {
    inputs: Vec<InputRef>,
    next_index: AtomicUsize,
    results: Vec<Mutex<Option<DocResult>>>,
    progress: Mutex<ProgressState>,
    sinks: Sinks,
    pipeline_config: PipelineConfig<'a>,
}

/// State serialized behind the single progress/output mutex: stdout
/// progress lines, the JSONL sink, and the completed-count used in
/// `[i/N] ...` lines.
struct ProgressState {
    completed: usize,
    jsonl_file: Option<File>,
}

/// Run the full pipeline over every input, using `worker_count` threads.
/// Returns every [`DocResult`], indexed by the input's position in the
/// sorted input list regardless of completion order, so callers get stable
/// ordering even though documents finish out of order.
pub fn run(
    inputs: Vec<InputRef>,
    worker_count: usize,
    sinks: Sinks,
    pipeline_config: PipelineConfig<'_>,
) -> Result<Vec<DocResult>> {
    let jsonl_file = match &sinks.jsonl_path {
        Some(path) => Some(
            File::create(path)
                .map_err(|err| PipelineError::IOError(format!("failed to create {path:?}: {err}")))?,
        ),
        None => None,
    };

    let total = inputs.len();
    let results: Vec<Mutex<Option<DocResult>>> = (0..total).map(|_| Mutex::new(None)).collect();

    let shared = SharedState {
        inputs,
        next_index: AtomicUsize::new(0),
        results,
        progress: Mutex::new(ProgressState {
            completed: 0,
            jsonl_file,
        }),
        sinks,
        pipeline_config,
    };
    let shared = Arc::new(shared);

    thread::scope(|scope| {
        for _ in 0..worker_count.max(1) {
            let shared = Arc::clone(&shared);
            scope.spawn(move || worker_loop(&shared, total));
        }
    });

    let shared = Arc::try_unwrap(shared)
        .unwrap_or_else(|_| unreachable!("all worker threads have joined"));
    Ok(shared
        .results
        .into_iter()
        .map(|slot| slot.into_inner().expect("result mutex never poisoned").expect("every slot filled exactly once"))
        .collect())
}

fn worker_loop(shared: &SharedState<'_>, total: usize) {
    loop {
        let index = shared.next_index.fetch_add(1, Ordering::SeqCst);
        if index >= total {
            return;
        }

        let input = &shared.inputs[index];
        let result = process_document(input, &shared.pipeline_config);
        record_result(shared, index, result, total);
    }
}

fn record_result(shared: &SharedState<'_>, index: usize, result: DocResult, total: usize) {
    if shared.sinks.per_file {
        if let Some(merged) = &result.merged {
            if let Err(err) = write_per_file_json(&result.input_path, merged) {
                warn!("failed to write per-file output for {:?}: {err}", result.input_path);
            }
        }
    }

    // Everything from here on touches shared stdout/file state, so it's
    // serialized under the progress mutex.
    let mut progress = shared.progress.lock().expect("progress mutex poisoned");
    progress.completed += 1;

    println!(
        "[{}/{}] {} -> {}",
        progress.completed,
        total,
        result.input_path.display(),
        if result.ok { "OK" } else { "ERR" }
    );

    if let Some(file) = progress.jsonl_file.as_mut() {
        if let Err(err) = write_jsonl_line(file, &result) {
            warn!("failed to append JSONL line: {err}");
        }
    }
    drop(progress);

    *shared.results[index]
        .lock()
        .expect("result slot mutex poisoned") = Some(result);
}

fn write_per_file_json(input_path: &Path, merged: &Value) -> Result<()> {
    let stem = input_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let parent = input_path.parent().unwrap_or_else(|| Path::new("."));
    let out_path = parent.join(format!("{stem}.extracted.json"));
    let bytes = serde_json::to_vec_pretty(merged).context("failed to serialize per-file output")?;
    std::fs::write(&out_path, bytes)
        .map_err(|err| PipelineError::IOError(format!("failed to write {out_path:?}: {err}")).into())
}

fn write_jsonl_line(file: &mut File, result: &DocResult) -> Result<()> {
    let line = json!({
        "ok": result.ok,
        "source": result.input_path.file_name().map(|n| n.to_string_lossy().into_owned()),
        "doc_type": result.doc_type.tag(),
        "page_count": result.pages,
        "data": result.merged,
        "error": result.error,
    });
    writeln!(file, "{line}").map_err(|err| PipelineError::IOError(err.to_string()))?;
    file.flush().map_err(|err| PipelineError::IOError(err.to_string()))?;
    Ok(())
}

/// Build the [`RemoteExtractor`] and [`Cache`] collaborators shared by every
/// worker for one run.
pub fn build_collaborators(
    api_key: String,
    model: String,
    timeout_secs: u64,
    max_chars_per_snippet: usize,
    cache_dir: Option<&Path>,
) -> Result<(RemoteExtractor, Option<Cache>)> {
    let remote = RemoteExtractor::new(crate::remote::RemoteConfig {
        api_key,
        model,
        qps: crate::rate_limit::DEFAULT_QPS,
        timeout_secs,
        max_chars_per_snippet,
        api_base: std::env::var("OPENAI_API_BASE").ok(),
    })?;
    let cache = match cache_dir {
        Some(dir) => Some(Cache::open(dir)?),
        None => None,
    };
    Ok((remote, cache))
}

/// The combined JSON sink written once after every worker has joined.
pub fn write_combined_output(
    output_path: &Path,
    model: &str,
    generated_at: u64,
    results: &[DocResult],
) -> Result<()> {
    let mut documents = Vec::new();
    let mut errors = Vec::new();
    let mut ok_count = 0usize;
    let mut snippet_chars_total = 0usize;

    for result in results {
        if result.ok {
            ok_count += 1;
            snippet_chars_total += result.snippet_chars;
            if let Some(merged) = &result.merged {
                documents.push(Value::Object(merged.clone()));
            }
        } else {
            errors.push(json!({
                "source": result.input_path.file_name().map(|n| n.to_string_lossy().into_owned()),
                "error": result.error,
            }));
        }
    }

    let avg_snippet_chars = if ok_count > 0 {
        snippet_chars_total as f64 / ok_count as f64
    } else {
        0.0
    };

    let combined = json!({
        "generated_at": generated_at,
        "model": model,
        "documents": documents,
        "errors": errors,
        "stats": {
            "processed": results.len(),
            "ok": ok_count,
            "errors": results.len() - ok_count,
            "avg_snippet_chars": avg_snippet_chars,
        },
    });

    let bytes = serde_json::to_vec_pretty(&combined).context("failed to serialize combined output")?;
    std::fs::write(output_path, bytes)
        .map_err(|err| PipelineError::IOError(format!("failed to write {output_path:?}: {err}")).into())
}
