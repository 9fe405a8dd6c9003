//! Pixel buffers: decoding, binarization and PNG encoding

mod binarize;
mod decode;
mod encode;

// Re-export public API
pub use binarize::{binarize, binarize_pixel, binarize_to_png, GRAY_THRESHOLD};
pub use decode::decode;
pub use encode::{compress_to_png, encode_png};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use imageproc::image::{Rgba, RgbaImage};

use crate::error::DecodeError;

/// An encoded raster image (PNG, JPEG, ...) exactly as the caller supplied it.
///
/// Immutable once constructed; every analysis run decodes its own copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    data: Vec<u8>,
}

impl EncodedImage {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// Parse a `data:[<mediatype>];base64,<payload>` URL.
    pub fn from_data_url(url: &str) -> Result<Self, DecodeError> {
        let rest = url
            .trim()
            .strip_prefix("data:")
            .ok_or_else(|| DecodeError::DataUrl("missing `data:` scheme".to_string()))?;

        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| DecodeError::DataUrl("missing `,` separator".to_string()))?;

        if !header.split(';').any(|param| param == "base64") {
            return Err(DecodeError::DataUrl(format!(
                "only base64 payloads are supported, got `{header}`"
            )));
        }

        Ok(Self::new(STANDARD.decode(payload)?))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl From<Vec<u8>> for EncodedImage {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

/// Decoded `width x height` RGBA pixels, 8 bits per channel.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelBuffer(RgbaImage);

impl PixelBuffer {
    /// Wrap raw RGBA bytes; fails unless `data.len() == width * height * 4`.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<Self, DecodeError> {
        let len = data.len();
        let expected = u64::from(width) * u64::from(height) * 4;
        if len as u64 != expected {
            return Err(DecodeError::BufferSize { width, height, len });
        }

        RgbaImage::from_raw(width, height, data)
            .map(Self)
            .ok_or(DecodeError::BufferSize { width, height, len })
    }

    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        Self(RgbaImage::from_pixel(width, height, Rgba(rgba)))
    }

    pub fn width(&self) -> u32 {
        self.0.width()
    }

    pub fn height(&self) -> u32 {
        self.0.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.0.dimensions()
    }

    /// Number of pixels.
    pub fn len(&self) -> usize {
        self.0.as_raw().len() / 4
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn pixels(&self) -> impl Iterator<Item = [u8; 4]> + '_ {
        self.0.pixels().map(|p| p.0)
    }

    pub fn as_image(&self) -> &RgbaImage {
        &self.0
    }
}

impl From<RgbaImage> for PixelBuffer {
    fn from(img: RgbaImage) -> Self {
        Self(img)
    }
}
