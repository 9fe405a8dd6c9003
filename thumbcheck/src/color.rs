//! Dominant color extraction by median-cut quantization
//!
//! Pixels are bucketed into a 5-bit-per-channel histogram. The box enclosing all
//! occupied buckets is split at the population median along its longest side,
//! most populated box first, until `max_colors` boxes exist or nothing can be split.
//! The dominant color is the mean of the real pixel values inside the most populated box.

use serde::{Deserialize, Serialize};

use crate::error::ExtractionError;
use crate::image::PixelBuffer;

const SIGBITS: u32 = 5;
const SHIFT: u32 = 8 - SIGBITS;
const SIDE: usize = 1 << SIGBITS;
const HIST_SIZE: usize = SIDE * SIDE * SIDE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DominantColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl DominantColor {
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Mean of the three channels.
    pub fn brightness(&self) -> f64 {
        self.channel_sum() as f64 / 3.0
    }

    pub(crate) fn channel_sum(&self) -> u16 {
        self.r as u16 + self.g as u16 + self.b as u16
    }

    pub fn rgb(&self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }
}

impl std::fmt::Display for DominantColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "rgb({}, {}, {})", self.r, self.g, self.b)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorConfig {
    /// Only every Nth pixel is sampled. 1 samples every pixel.
    pub sample_step: u32,
    /// Number of boxes the color space is cut into.
    pub max_colors: u8,
    /// Pixels less opaque than this are ignored, unless every pixel is.
    pub min_alpha: u8,
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            sample_step: 10,
            max_colors: 5,
            min_alpha: 125,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Bucket {
    count: u64,
    sum: [u64; 3],
}

struct Histogram(Vec<Bucket>);

impl Histogram {
    fn build(pixels: &PixelBuffer, step: usize, min_alpha: u8) -> Self {
        let mut buckets = vec![Bucket::default(); HIST_SIZE];
        for [r, g, b, a] in pixels.pixels().step_by(step) {
            if a < min_alpha {
                continue;
            }
            let bucket = &mut buckets[index(quantize(r), quantize(g), quantize(b))];
            bucket.count += 1;
            bucket.sum[0] += r as u64;
            bucket.sum[1] += g as u64;
            bucket.sum[2] += b as u64;
        }
        Self(buckets)
    }

    fn bucket(&self, q: [usize; 3]) -> &Bucket {
        &self.0[index(q[0], q[1], q[2])]
    }

    fn is_empty(&self) -> bool {
        self.0.iter().all(|b| b.count == 0)
    }
}

#[inline(always)]
fn quantize(channel: u8) -> usize {
    (channel >> SHIFT) as usize
}

#[inline(always)]
fn index(r: usize, g: usize, b: usize) -> usize {
    (r << (2 * SIGBITS)) | (g << SIGBITS) | b
}

/// Inclusive bounds in quantized space, shrunk to the occupied buckets.
#[derive(Debug, Clone, Copy)]
struct ColorBox {
    lo: [usize; 3],
    hi: [usize; 3],
    count: u64,
}

impl ColorBox {
    fn buckets(&self) -> impl Iterator<Item = [usize; 3]> {
        let (lo, hi) = (self.lo, self.hi);
        (lo[0]..=hi[0]).flat_map(move |r| {
            (lo[1]..=hi[1]).flat_map(move |g| (lo[2]..=hi[2]).map(move |b| [r, g, b]))
        })
    }

    /// Shrink `lo..=hi` to the occupied buckets. `None` if nothing is inside.
    fn fit(hist: &Histogram, lo: [usize; 3], hi: [usize; 3]) -> Option<Self> {
        let mut fitted = ColorBox {
            lo: [SIDE; 3],
            hi: [0; 3],
            count: 0,
        };
        let candidate = ColorBox { lo, hi, count: 0 };
        for q in candidate.buckets() {
            let bucket = hist.bucket(q);
            if bucket.count == 0 {
                continue;
            }
            fitted.count += bucket.count;
            for axis in 0..3 {
                fitted.lo[axis] = fitted.lo[axis].min(q[axis]);
                fitted.hi[axis] = fitted.hi[axis].max(q[axis]);
            }
        }
        (fitted.count > 0).then_some(fitted)
    }

    fn longest_axis(&self) -> usize {
        (0..3)
            .max_by_key(|&axis| (self.hi[axis] - self.lo[axis], std::cmp::Reverse(axis)))
            .unwrap_or(0)
    }

    fn is_splittable(&self) -> bool {
        (0..3).any(|axis| self.hi[axis] > self.lo[axis])
    }

    /// Cut at the population median along the longest axis.
    /// Both halves stay non-empty because a fitted box has occupied buckets on its faces.
    fn split(&self, hist: &Histogram) -> Option<(ColorBox, ColorBox)> {
        let axis = self.longest_axis();
        if self.hi[axis] == self.lo[axis] {
            return None;
        }

        let mut acc = 0u64;
        let mut cut = self.hi[axis] - 1;
        for plane in self.lo[axis]..self.hi[axis] {
            acc += self
                .buckets()
                .filter(|q| q[axis] == plane)
                .map(|q| hist.bucket(q).count)
                .sum::<u64>();
            if acc * 2 >= self.count {
                cut = plane;
                break;
            }
        }

        let mut lower_hi = self.hi;
        lower_hi[axis] = cut;
        let mut upper_lo = self.lo;
        upper_lo[axis] = cut + 1;

        Some((
            ColorBox::fit(hist, self.lo, lower_hi)?,
            ColorBox::fit(hist, upper_lo, self.hi)?,
        ))
    }

    fn centroid(&self, hist: &Histogram) -> DominantColor {
        let mut sum = [0u64; 3];
        for q in self.buckets() {
            let bucket = hist.bucket(q);
            for c in 0..3 {
                sum[c] += bucket.sum[c];
            }
        }
        // rounded mean, always within 0..=255
        let mean = |s: u64| ((s + self.count / 2) / self.count).min(255) as u8;
        DominantColor::new(mean(sum[0]), mean(sum[1]), mean(sum[2]))
    }
}

/// The single most representative color of `pixels`.
///
/// A uniformly colored image yields exactly that color.
pub fn dominant_color(
    pixels: &PixelBuffer,
    config: &ColorConfig,
) -> Result<DominantColor, ExtractionError> {
    if pixels.is_empty() {
        let (width, height) = pixels.dimensions();
        return Err(ExtractionError::Empty { width, height });
    }

    let step = config.sample_step.max(1) as usize;
    let mut hist = Histogram::build(pixels, step, config.min_alpha);
    if hist.is_empty() {
        log::debug!("No pixel reaches alpha {}, sampling all of them", config.min_alpha);
        hist = Histogram::build(pixels, step, 0);
    }

    let whole = ColorBox::fit(&hist, [0; 3], [SIDE - 1; 3]).ok_or_else(|| {
        let (width, height) = pixels.dimensions();
        ExtractionError::Empty { width, height }
    })?;

    let mut boxes = vec![whole];
    while boxes.len() < config.max_colors.max(1) as usize {
        let Some(pos) = boxes
            .iter()
            .enumerate()
            .filter(|(_, b)| b.is_splittable())
            .max_by_key(|(i, b)| (b.count, std::cmp::Reverse(*i)))
            .map(|(i, _)| i)
        else {
            break;
        };

        match boxes[pos].split(&hist) {
            Some((lower, upper)) => {
                boxes[pos] = lower;
                boxes.push(upper);
            }
            None => break,
        }
    }

    let dominant = boxes
        .iter()
        .enumerate()
        .max_by_key(|(i, b)| (b.count, std::cmp::Reverse(*i)))
        .map(|(_, b)| b.centroid(&hist))
        .ok_or_else(|| {
            let (width, height) = pixels.dimensions();
            ExtractionError::Empty { width, height }
        })?;

    log::debug!("Dominant color {dominant} from {} boxes", boxes.len());
    Ok(dominant)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn every_pixel() -> ColorConfig {
        ColorConfig {
            sample_step: 1,
            ..ColorConfig::default()
        }
    }

    fn stripes(rows: &[([u8; 4], u32)], width: u32) -> PixelBuffer {
        let mut data = Vec::new();
        let mut height = 0;
        for &(rgba, count) in rows {
            for _ in 0..count * width {
                data.extend_from_slice(&rgba);
            }
            height += count;
        }
        PixelBuffer::from_raw(width, height, data).unwrap()
    }

    #[test]
    fn uniform_image_returns_its_color() {
        for rgba in [
            [10, 10, 10, 255],
            [240, 240, 240, 255],
            [0, 0, 0, 255],
            [255, 255, 255, 255],
            [37, 201, 99, 255],
        ] {
            let pixels = PixelBuffer::filled(64, 48, rgba);
            let color = dominant_color(&pixels, &ColorConfig::default()).unwrap();
            assert_eq!(color.rgb(), [rgba[0], rgba[1], rgba[2]]);
        }
    }

    #[test]
    fn single_pixel_image() {
        let pixels = PixelBuffer::filled(1, 1, [120, 130, 140, 255]);
        let color = dominant_color(&pixels, &ColorConfig::default()).unwrap();
        assert_eq!(color, DominantColor::new(120, 130, 140));
    }

    #[test]
    fn empty_image_is_an_error() {
        let pixels = PixelBuffer::filled(0, 0, [0; 4]);
        assert_eq!(
            dominant_color(&pixels, &ColorConfig::default()),
            Err(ExtractionError::Empty {
                width: 0,
                height: 0
            })
        );
    }

    #[test]
    fn majority_color_wins() {
        let pixels = stripes(&[([200, 20, 20, 255], 30), ([20, 20, 200, 255], 10)], 8);
        let color = dominant_color(&pixels, &every_pixel()).unwrap();
        assert_eq!(color, DominantColor::new(200, 20, 20));
    }

    #[test]
    fn close_shades_are_averaged() {
        let pixels = stripes(&[([100, 100, 100, 255], 1), ([102, 102, 102, 255], 1)], 4);
        let color = dominant_color(&pixels, &every_pixel()).unwrap();
        assert_eq!(color, DominantColor::new(101, 101, 101));
    }

    #[test]
    fn transparent_pixels_are_ignored() {
        let pixels = stripes(&[([0, 255, 0, 0], 50), ([250, 10, 10, 255], 2)], 4);
        let color = dominant_color(&pixels, &every_pixel()).unwrap();
        assert_eq!(color, DominantColor::new(250, 10, 10));
    }

    #[test]
    fn fully_transparent_image_still_has_a_color() {
        let pixels = PixelBuffer::filled(5, 5, [9, 8, 7, 0]);
        let color = dominant_color(&pixels, &ColorConfig::default()).unwrap();
        assert_eq!(color, DominantColor::new(9, 8, 7));
    }

    #[test]
    fn many_colors_are_cut_into_boxes() {
        // a gradient with no clear winner still produces an in-gamut answer
        let mut data = Vec::new();
        for i in 0..=255u8 {
            data.extend_from_slice(&[i, 255 - i, i / 2, 255]);
        }
        let pixels = PixelBuffer::from_raw(256, 1, data).unwrap();
        let color = dominant_color(
            &pixels,
            &ColorConfig {
                sample_step: 1,
                max_colors: 8,
                min_alpha: 0,
            },
        )
        .unwrap();
        assert!(color.g as u16 + color.r as u16 >= 250);
    }

    #[test]
    fn formats_as_css_rgb() {
        assert_eq!(DominantColor::new(10, 20, 30).to_string(), "rgb(10, 20, 30)");
    }
}
