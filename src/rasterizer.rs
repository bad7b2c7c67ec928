//! Rasterizes PDFs into an ordered sequence of page images.
//!
//! Adapted from the `pdftocairo`-shelling approach in this codebase's OCR
//! ancestry: run the external tool into a scratch directory, then read the
//! directory back in lexical order (which `pdftocairo` pads to match page
//! order).

use std::process::Command;

use tempfile::TempDir;

use crate::prelude::*;

/// The DPI used when rasterizing PDF pages to PNG. Not exposed on the CLI.
const RASTERIZE_DPI: u32 = 300;

/// One rasterized page, in page order.
#[derive(Debug, Clone)]
pub struct PageImage {
    pub path: PathBuf,
    pub index: usize,
}

/// Rasterize `pdf_path` into `workspace`, returning pages in order.
///
/// Fails with [`PipelineError::RasterizationError`] if the external tool
/// signals a nonzero exit status, or if it exits successfully but produces
/// zero pages.
#[instrument(level = "debug", skip(workspace))]
pub fn rasterize(pdf_path: &Path, workspace: &TempDir) -> Result<Vec<PageImage>> {
    let filename = pdf_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "page".to_string());
    let out_prefix = workspace.path().join(&filename);

    let output = Command::new("pdftocairo")
        .arg("-png")
        .arg("-r")
        .arg(RASTERIZE_DPI.to_string())
        .arg(pdf_path)
        .arg(&out_prefix)
        .output()
        .map_err(|err| PipelineError::RasterizationError {
            path: pdf_path.to_owned(),
            reason: format!("failed to run pdftocairo: {err}"),
        })?;

    if !output.status.success() {
        return Err(PipelineError::RasterizationError {
            path: pdf_path.to_owned(),
            reason: format!(
                "pdftocairo exited with status {:?}: {}",
                output.status.code(),
                String::from_utf8_lossy(&output.stderr)
            ),
        }
        .into());
    }

    let mut paths: Vec<PathBuf> = std::fs::read_dir(workspace.path())
        .map_err(|err| PipelineError::RasterizationError {
            path: pdf_path.to_owned(),
            reason: format!("failed to read scratch directory: {err}"),
        })?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().and_then(|e| e.to_str()) == Some("png"))
        .collect();
    paths.sort();

    if paths.is_empty() {
        return Err(PipelineError::RasterizationError {
            path: pdf_path.to_owned(),
            reason: "pdftocairo produced zero pages".to_string(),
        }
        .into());
    }

    Ok(paths
        .into_iter()
        .enumerate()
        .map(|(index, path)| PageImage { path, index })
        .collect())
}
