//! Recover bar colors from an image.
//!
//! Lossy re-encoding smears colors across bar edges and 8x8 block
//! boundaries, so each bar is read as the channel-wise mean of its interior,
//! skipping a quarter of the bar on every side.

use image::RgbImage;

use crate::color::{ColorSequence, Rgb};
use crate::config::BarcodeConfig;
use crate::error::Result;
use crate::geometry::BarGeometry;

/// Sample the bar block of `image`, re-deriving its geometry from the image size.
///
/// # Errors
///
/// Returns [`crate::Error::DegenerateGeometry`] if the image is too small to
/// hold a bar block.
pub fn sample(image: &RgbImage, config: &BarcodeConfig) -> Result<ColorSequence> {
    let geometry = BarGeometry::compute(image.width(), image.height(), config)?;
    ColorSequence::new(sample_with_geometry(image, &geometry), config.bars)
}

/// Sample every bar described by `geometry`.
///
/// Parts of a bar outside the image are ignored; a bar with no pixels left
/// reads as black.
#[must_use]
pub fn sample_with_geometry(image: &RgbImage, geometry: &BarGeometry) -> Vec<Rgb> {
    let margin_x = geometry.bar_width / 4;
    let margin_y = geometry.bar_height / 4;
    (0..geometry.bars)
        .map(|i| {
            let (x0, y0) = geometry.bar_origin(i);
            region_mean(
                image,
                x0 + margin_x,
                y0 + margin_y,
                geometry.bar_width - 2 * margin_x,
                geometry.bar_height - 2 * margin_y,
            )
        })
        .collect()
}

/// Channel-wise floor mean of a `w x h` region, clipped to the image.
#[allow(clippy::cast_possible_truncation)]
fn region_mean(image: &RgbImage, x: u32, y: u32, w: u32, h: u32) -> Rgb {
    let x2 = x.saturating_add(w).min(image.width());
    let y2 = y.saturating_add(h).min(image.height());

    let mut sums = [0u64; 3];
    let mut count = 0u64;
    for py in y..y2 {
        for px in x..x2 {
            let pixel = image.get_pixel(px, py);
            for (sum, &channel) in sums.iter_mut().zip(pixel.0.iter()) {
                *sum += u64::from(channel);
            }
            count += 1;
        }
    }

    if count == 0 {
        return [0, 0, 0];
    }
    // A mean of u8 samples always fits in u8.
    sums.map(|s| (s / count) as u8)
}
