//! PNG encoding for the text recognizer

use imageproc::image::codecs::png::{CompressionType, FilterType, PngEncoder};
use imageproc::image::{ExtendedColorType, ImageEncoder, ImageResult};

use super::{EncodedImage, PixelBuffer};

/// Compress pixels to PNG
///
/// Fast compression is enough: the output only lives long enough to be read by the OCR engine.
/// Bilevel images compress well without filtering.
pub fn compress_to_png<W>(pixels: &PixelBuffer, writer: &mut W, bilevel: bool) -> ImageResult<()>
where
    W: std::io::Write,
{
    let encoder = PngEncoder::new_with_quality(
        writer,
        CompressionType::Fast,
        if bilevel {
            FilterType::NoFilter
        } else {
            FilterType::Adaptive
        },
    );

    let (width, height) = pixels.dimensions();
    encoder.write_image(
        pixels.as_image().as_raw(),
        width,
        height,
        ExtendedColorType::Rgba8,
    )
}

pub fn encode_png(pixels: &PixelBuffer) -> ImageResult<EncodedImage> {
    encode(pixels, false)
}

pub(super) fn encode(pixels: &PixelBuffer, bilevel: bool) -> ImageResult<EncodedImage> {
    let mut buffer = Vec::with_capacity(pixels.len());
    compress_to_png(pixels, &mut buffer, bilevel)?;
    log::trace!("Encoded {}x{} PNG, {} bytes", pixels.width(), pixels.height(), buffer.len());
    Ok(EncodedImage::new(buffer))
}
