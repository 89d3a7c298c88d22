//! Barcode rasterization.
//!
//! Each bar is a solid `bar_width x bar_height` rectangle. The block is pasted
//! over the bottom-right corner of the image, replacing those pixels outright.

use image::{Rgb, RgbImage};

use crate::color::ColorSequence;
use crate::config::BarcodeConfig;
use crate::error::{Error, Result};
use crate::geometry::BarGeometry;

/// Rasterize `sequence` into a standalone block of `total_width x bar_height`.
///
/// Only the first `geometry.bars` colors are drawn, and bars are clipped to
/// the block.
#[must_use]
pub fn render_block(sequence: &ColorSequence, geometry: &BarGeometry) -> RgbImage {
    let mut block = RgbImage::new(geometry.total_width, geometry.bar_height);
    for (i, &color) in sequence.iter().take(geometry.bars).enumerate() {
        let x0 = u32::try_from(i)
            .map_or(u32::MAX, |i| geometry.bar_width.saturating_mul(i))
            .min(block.width());
        let x1 = x0.saturating_add(geometry.bar_width).min(block.width());
        for y in 0..block.height() {
            for x in x0..x1 {
                block.put_pixel(x, y, Rgb(color));
            }
        }
    }
    block
}

/// Paste `block` into `image` at the geometry's offset.
///
/// Pixels falling outside the image are dropped.
pub fn composite(image: &mut RgbImage, block: &RgbImage, geometry: &BarGeometry) {
    let x2 = (geometry.offset_x + block.width()).min(image.width());
    let y2 = (geometry.offset_y + block.height()).min(image.height());
    if geometry.offset_x >= x2 || geometry.offset_y >= y2 {
        return;
    }

    for dy in 0..(y2 - geometry.offset_y) {
        for dx in 0..(x2 - geometry.offset_x) {
            let px = *block.get_pixel(dx, dy);
            image.put_pixel(geometry.offset_x + dx, geometry.offset_y + dy, px);
        }
    }
}

/// Render `sequence` onto `image` in place and return where it was placed.
///
/// # Errors
///
/// Returns [`Error::UnsupportedSequenceLength`] if the sequence does not have
/// `config.bars` entries, or [`Error::DegenerateGeometry`] if the image is too
/// small for the block. The image is untouched on error.
pub fn render(
    image: &mut RgbImage,
    sequence: &ColorSequence,
    config: &BarcodeConfig,
) -> Result<BarGeometry> {
    if sequence.len() != config.bars {
        return Err(Error::UnsupportedSequenceLength {
            expected: config.bars,
            actual: sequence.len(),
        });
    }
    let geometry = BarGeometry::compute(image.width(), image.height(), config)?;
    let block = render_block(sequence, &geometry);
    composite(image, &block, &geometry);
    Ok(geometry)
}
