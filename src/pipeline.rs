//! Ties every stage together into `process_document`, the per-input flow
//! at the core of this system: rasterize (or passthrough) → preprocess →
//! OCR → classify + snippet-select + locally-extract →
//! cache-or-remote-extract → merge → redact.

use tempfile::TempDir;

use crate::{
    cache::{Cache, cache_key},
    classifier,
    local_extract::extract_local_candidates,
    merge::{merge, redact},
    ocr::ocr,
    prelude::*,
    preprocess::{preprocess, read_grayscale},
    rasterizer::{PageImage, rasterize},
    remote::RemoteExtractor,
    types::{DocResult, DocType, InputRef, MediaKind},
};

/// File extensions accepted as inputs. Anything else is an
/// [`PipelineError::UnsupportedFileType`].
const PDF_EXTENSIONS: &[&str] = &["pdf"];
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "tif", "tiff", "bmp", "webp"];

/// Classify `path` as a [`MediaKind`] from its extension, or fail with
/// [`PipelineError::UnsupportedFileType`] if it isn't in the accepted list.
/// Classification is extension-based rather than content-sniffed: the
/// accepted-input contract is defined purely in terms of file extensions,
/// so sniffing magic bytes would let a same-named file with forged content
/// silently pass or fail against a contract stated in extension terms (see
/// DESIGN.md).
pub fn classify_media_kind(path: &Path) -> Result<MediaKind> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    if PDF_EXTENSIONS.contains(&extension.as_str()) {
        Ok(MediaKind::Pdf)
    } else if IMAGE_EXTENSIONS.contains(&extension.as_str()) {
        Ok(MediaKind::Image)
    } else {
        Err(PipelineError::UnsupportedFileType(path.to_owned()).into())
    }
}

/// Options that stay fixed across every document in a run.
pub struct PipelineConfig<'a> {
    pub lang: String,
    pub max_snippet_lines: usize,
    pub max_chars_per_snippet: usize,
    pub redact: bool,
    pub audit: bool,
    pub cache: Option<&'a Cache>,
    pub remote: &'a RemoteExtractor,
}

/// Process one input end-to-end, producing exactly one [`DocResult`].
/// Never returns `Err`: every failure is captured and converted into
/// `DocResult{ ok: false, .. }` so the orchestrator's worker loop never
/// unwinds across a document boundary.
#[instrument(level = "info", skip(config), fields(path = %input.path.display()))]
pub fn process_document(input: &InputRef, config: &PipelineConfig<'_>) -> DocResult {
    let mut classified = DocType::Unknown;
    match process_document_inner(input, config, &mut classified) {
        Ok(result) => result,
        Err(err) => DocResult::failure(input.path.clone(), classified, err),
    }
}

fn process_document_inner(
    input: &InputRef,
    config: &PipelineConfig<'_>,
    classified: &mut DocType,
) -> Result<DocResult> {
    // Per-document scratch directory: owns every rasterized page image and
    // is deleted (via `Drop`) on every exit path from this function,
    // success or early `?`-propagated error alike.
    let workspace = TempDir::new().context("failed to create per-document workspace")?;

    let pages: Vec<PageImage> = match input.kind {
        MediaKind::Pdf => rasterize(&input.path, &workspace)?,
        MediaKind::Image => vec![PageImage {
            path: input.path.clone(),
            index: 0,
        }],
    };

    let mut page_texts: Vec<String> = Vec::with_capacity(pages.len());
    for page in &pages {
        let gray = read_grayscale(&page.path)?;
        let preprocessed = preprocess(gray);
        page_texts.push(ocr(&preprocessed, &config.lang));
    }

    let full_text = page_texts.join("\n");
    if page_texts.iter().all(|text| text.trim().is_empty()) {
        return Err(PipelineError::OCRError {
            path: input.path.clone(),
        }
        .into());
    }

    let doc_type = classifier::classify(&full_text);
    *classified = doc_type;
    let local = extract_local_candidates(
        &full_text,
        doc_type,
        config.max_snippet_lines,
        config.max_chars_per_snippet,
    );

    let key = cache_key(doc_type, &local.dump());
    let model_output = match config.cache.and_then(|cache| cache.get(key)) {
        Some(cached) => cached,
        None => {
            let fresh = config.remote.extract(doc_type, &local)?;
            if let Some(cache) = config.cache {
                // Best-effort: a cache write failure shouldn't fail a
                // document that already has a perfectly good result.
                if let Err(err) = cache.put(key, &fresh) {
                    warn!("failed to write cache entry: {err}");
                }
            }
            fresh
        }
    };

    let model_object = model_output
        .as_object()
        .cloned()
        .ok_or_else(|| PipelineError::ParseError("model output is not a JSON object".to_string()))?;

    let source_filename = input
        .path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut merged = merge(
        model_object,
        &local,
        doc_type,
        &source_filename,
        pages.len(),
        config.audit,
        &full_text,
    );

    if config.redact {
        let mut value = Value::Object(merged.clone());
        redact(&mut value);
        merged = value
            .as_object()
            .expect("redact preserves object shape")
            .clone();
    }

    Ok(DocResult::success(
        input.path.clone(),
        doc_type,
        merged,
        pages.len(),
        full_text.chars().count(),
        local.important_snippets.chars().count(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_known_extensions() {
        assert_eq!(
            classify_media_kind(Path::new("a.pdf")).unwrap(),
            MediaKind::Pdf
        );
        assert_eq!(
            classify_media_kind(Path::new("a.PNG")).unwrap(),
            MediaKind::Image
        );
        assert_eq!(
            classify_media_kind(Path::new("a.jpeg")).unwrap(),
            MediaKind::Image
        );
    }

    #[test]
    fn rejects_unknown_extensions() {
        assert!(classify_media_kind(Path::new("a.docx")).is_err());
        assert!(classify_media_kind(Path::new("a")).is_err());
    }
}
