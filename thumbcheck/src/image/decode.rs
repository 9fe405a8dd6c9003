//! Image decoding

use imageproc::image::load_from_memory;

use super::PixelBuffer;
use crate::error::DecodeError;

/// Decode an encoded image into an RGBA pixel buffer
///
/// The format is sniffed from the bytes, so PNG, JPEG and the other formats
/// enabled in the image crate are all accepted.
pub fn decode(data: &[u8]) -> Result<PixelBuffer, DecodeError> {
    let img = load_from_memory(data)?;
    log::trace!("Decoded {}x{} {:?} image", img.width(), img.height(), img.color());
    Ok(PixelBuffer::from(img.into_rgba8()))
}
