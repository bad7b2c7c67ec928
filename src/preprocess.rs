//! Grayscale, deskew, denoise, and binarize a page image before OCR.
//!
//! Implemented on top of `image` and `imageproc`, the two crates this
//! problem domain's Rust peers reach for when doing this kind of
//! classical (non-ML) image cleanup.

use image::{GrayImage, ImageReader, Luma};
use imageproc::{
    filter::gaussian_blur_f32,
    geometric_transformations::{Interpolation, rotate_about_center},
    hough::{LineDetectionOptions, PolarLine, detect_lines},
};

use crate::prelude::*;

/// Non-local-means "strength", translated into a Gaussian blur sigma. True
/// non-local-means denoising isn't available in the `image`/`imageproc`
/// ecosystem; a Gaussian blur at a comparable sigma is used as an
/// approximation (see DESIGN.md).
const DENOISE_STRENGTH: f32 = 30.0;

/// Adaptive Gaussian threshold parameters.
const ADAPTIVE_BLOCK_SIZE: u32 = 31;
const ADAPTIVE_CONSTANT: i32 = 15;

/// Minimum Hough accumulator votes before a line is considered.
const HOUGH_VOTE_THRESHOLD: u32 = 60;
/// Minimum angular/radial separation between accepted Hough lines.
const HOUGH_SUPPRESSION_RADIUS: u32 = 8;

/// Read `path` as grayscale. Fails with [`PipelineError::ImageReadError`] if
/// the image is empty (zero width or height) or cannot be decoded.
#[instrument(level = "debug")]
pub fn read_grayscale(path: &Path) -> Result<GrayImage> {
    let reader = ImageReader::open(path)
        .map_err(|err| PipelineError::ImageReadError {
            path: path.to_owned(),
            reason: err.to_string(),
        })?
        .with_guessed_format()
        .map_err(|err| PipelineError::ImageReadError {
            path: path.to_owned(),
            reason: err.to_string(),
        })?;
    let image = reader.decode().map_err(|err| PipelineError::ImageReadError {
        path: path.to_owned(),
        reason: err.to_string(),
    })?;
    let gray = image.to_luma8();
    if gray.width() == 0 || gray.height() == 0 {
        return Err(PipelineError::ImageReadError {
            path: path.to_owned(),
            reason: "decoded image is empty".to_string(),
        }
        .into());
    }
    Ok(gray)
}

/// Run the full preprocessing pipeline: deskew, denoise, binarize.
#[instrument(level = "debug", skip(image))]
pub fn preprocess(image: GrayImage) -> GrayImage {
    let deskewed = deskew(&image);
    let denoised = gaussian_blur_f32(&deskewed, DENOISE_STRENGTH / 10.0);
    adaptive_gaussian_threshold(&denoised, ADAPTIVE_BLOCK_SIZE, ADAPTIVE_CONSTANT)
}

/// Estimate and correct skew using a Hough-line angle estimate.
///
/// Only lines whose angle (degrees from the x-axis) falls in `(0, 45)` or
/// `(135, 180)` are accumulated; near-horizontal lines (`80..100`) are
/// already excluded by that band and are never mistaken for the text
/// baseline. Angles in `(135, 180)` are folded to `angle - 180` before
/// averaging, so a page skewed a few degrees clockwise and one skewed a few
/// degrees counter-clockwise both correct toward zero instead of being
/// rotated by two different large angles (see DESIGN.md's Open Question
/// resolution). The image is rotated by the negative of the average
/// accepted angle, using bilinear interpolation; out-of-frame pixels are
/// filled with white rather than a true replicated border, which
/// `imageproc::geometric_transformations::rotate_about_center` does not
/// support directly.
fn deskew(image: &GrayImage) -> GrayImage {
    let inverse = threshold_inverse(image);
    let lines = detect_lines(
        &inverse,
        LineDetectionOptions {
            vote_threshold: HOUGH_VOTE_THRESHOLD,
            suppression_radius: HOUGH_SUPPRESSION_RADIUS,
        },
    );

    let accepted: Vec<f32> = lines
        .iter()
        .filter_map(|line: &PolarLine| {
            let angle = line.angle_in_degrees as f32;
            if angle > 0.0 && angle < 45.0 {
                Some(angle)
            } else if angle > 135.0 && angle < 180.0 {
                Some(angle - 180.0)
            } else {
                None
            }
        })
        .collect();

    let average_angle = if accepted.is_empty() {
        0.0
    } else {
        accepted.iter().sum::<f32>() / accepted.len() as f32
    };

    if average_angle == 0.0 {
        return image.clone();
    }

    rotate_about_center(
        image,
        -average_angle.to_radians(),
        Interpolation::Bilinear,
        Luma([255u8]),
    )
}

/// An adaptively-thresholded inverse image, used only to feed the Hough
/// line detector (text becomes a bright foreground on a dark background,
/// which is what `detect_lines` expects to accumulate votes against).
fn threshold_inverse(image: &GrayImage) -> GrayImage {
    let binarized = adaptive_gaussian_threshold(image, ADAPTIVE_BLOCK_SIZE, ADAPTIVE_CONSTANT);
    let mut inverse = binarized;
    for pixel in inverse.pixels_mut() {
        pixel.0[0] = 255 - pixel.0[0];
    }
    inverse
}

/// Adaptive Gaussian threshold: `pixel < gaussian_blur(pixel) - constant`
/// becomes foreground (black), matching OpenCV's
/// `ADAPTIVE_THRESH_GAUSSIAN_C` semantics.
fn adaptive_gaussian_threshold(image: &GrayImage, block_size: u32, constant: i32) -> GrayImage {
    // A commonly used rule of thumb for converting an odd block size into a
    // comparable Gaussian sigma.
    let sigma = block_size as f32 / 6.0;
    let blurred = gaussian_blur_f32(image, sigma);

    let (width, height) = image.dimensions();
    let mut out = GrayImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let value = image.get_pixel(x, y).0[0] as i32;
            let local_mean = blurred.get_pixel(x, y).0[0] as i32;
            let is_foreground = value < local_mean - constant;
            out.put_pixel(x, y, Luma([if is_foreground { 0 } else { 255 }]));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_image_has_no_accepted_skew_lines() {
        // A blank image has no text lines at all, so deskew must be a no-op.
        let image = GrayImage::from_pixel(64, 64, image::Luma([255]));
        let result = deskew(&image);
        assert_eq!(result.dimensions(), image.dimensions());
    }

    #[test]
    fn adaptive_threshold_keeps_dimensions() {
        let image = GrayImage::from_fn(40, 40, |x, y| {
            if (x + y) % 7 == 0 {
                image::Luma([20])
            } else {
                image::Luma([230])
            }
        });
        let out = adaptive_gaussian_threshold(&image, ADAPTIVE_BLOCK_SIZE, ADAPTIVE_CONSTANT);
        assert_eq!(out.dimensions(), (40, 40));
        // Every output pixel must be pure black or pure white.
        assert!(out.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
    }
}
