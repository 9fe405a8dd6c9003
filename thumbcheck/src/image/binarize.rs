//! Grayscale + fixed threshold binarization ahead of text recognition

use imageproc::image::Rgba;

use super::{EncodedImage, PixelBuffer};
use crate::error::AnalysisError;

/// Gray levels strictly above this become white, everything else black.
pub const GRAY_THRESHOLD: u32 = 128;

// Luma weights in hundredths: 0.30 R + 0.59 G + 0.11 B.
// Integer arithmetic keeps the comparison exact at the threshold.
const R_WEIGHT: u32 = 30;
const G_WEIGHT: u32 = 59;
const B_WEIGHT: u32 = 11;

#[inline(always)]
fn gray_x100(r: u8, g: u8, b: u8) -> u32 {
    R_WEIGHT * r as u32 + G_WEIGHT * g as u32 + B_WEIGHT * b as u32
}

/// Force R, G and B to 0 or 255, leaving alpha untouched.
#[inline(always)]
pub fn binarize_pixel(Rgba([r, g, b, a]): Rgba<u8>) -> Rgba<u8> {
    let bin = if gray_x100(r, g, b) > GRAY_THRESHOLD * 100 {
        255
    } else {
        0
    };
    Rgba([bin, bin, bin, a])
}

/// Binarize a copy of `pixels`; the input is left as is.
pub fn binarize(pixels: &PixelBuffer) -> PixelBuffer {
    let mut img = pixels.as_image().clone();
    imageproc::map::map_colors_mut(&mut img, binarize_pixel);
    PixelBuffer::from(img)
}

/// Binarize and re-encode as PNG, the form handed to the text recognizer.
pub fn binarize_to_png(pixels: &PixelBuffer) -> Result<EncodedImage, AnalysisError> {
    let binarized = binarize(pixels);
    let png = super::encode::encode(&binarized, true).map_err(AnalysisError::Encode)?;
    log::debug!(
        "Binarized {}x{} image ({} PNG bytes)",
        binarized.width(),
        binarized.height(),
        png.len()
    );
    Ok(png)
}
