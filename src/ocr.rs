//! Invokes Tesseract (via `leptess`) on a preprocessed image.

use image::GrayImage;
use leptess::{LepTess, Variable};

use crate::prelude::*;

/// OCR engine mode: LSTM only (no legacy engine).
const LSTM_ONLY_ENGINE_MODE: &str = "1";

/// Run OCR on `image` using Tesseract's `lang` language data.
///
/// Returns an empty string (logged at `warn`, not fatal here) if the engine
/// fails to initialize or fails to read the image; the caller is
/// responsible for treating "every page OCR'd to empty" as an
/// [`PipelineError::OCRError`].
#[instrument(level = "debug", skip(image))]
pub fn ocr(image: &GrayImage, lang: &str) -> String {
    let mut lt = match LepTess::new(None, lang) {
        Ok(lt) => lt,
        Err(err) => {
            warn!(%lang, "failed to initialize Tesseract: {}", err);
            return String::new();
        }
    };

    if let Err(err) = lt.set_variable(Variable::TesseditOcrEngineMode, LSTM_ONLY_ENGINE_MODE) {
        warn!("failed to set LSTM-only engine mode: {}", err);
    }
    if let Err(err) = lt.set_variable(Variable::PreserveInterwordSpaces, "1") {
        warn!("failed to set preserve_interword_spaces: {}", err);
    }

    let mut png_bytes: Vec<u8> = Vec::new();
    if let Err(err) = image.write_to(
        &mut std::io::Cursor::new(&mut png_bytes),
        image::ImageFormat::Png,
    ) {
        warn!("failed to encode preprocessed image for OCR: {}", err);
        return String::new();
    }

    if let Err(err) = lt.set_image_from_mem(&png_bytes) {
        warn!("failed to hand image to Tesseract: {}", err);
        return String::new();
    }

    match lt.get_utf8_text() {
        Ok(text) => text,
        Err(err) => {
            warn!("Tesseract failed to produce text: {}", err);
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_image_does_not_panic() {
        // We can't assume Tesseract is installed in every test environment,
        // so this only asserts that a degenerate 1x1 image never panics; the
        // function is allowed to return an empty string either way.
        let image = GrayImage::from_pixel(1, 1, image::Luma([255]));
        let _ = ocr(&image, "eng");
    }
}
