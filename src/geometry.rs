//! Bar placement shared by the renderer and the sampler.

use serde::Serialize;

use crate::config::BarcodeConfig;
use crate::error::{Error, Result};

/// Size and bottom-right anchored position of the bar block.
///
/// Derived only from the image dimensions and the config, so rendering and
/// sampling always agree on where the bars are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BarGeometry {
    /// Width of one bar in pixels.
    pub bar_width: u32,
    /// Height of every bar in pixels.
    pub bar_height: u32,
    /// Width of the whole block.
    pub total_width: u32,
    /// X coordinate of the block's top-left corner.
    pub offset_x: u32,
    /// Y coordinate of the block's top-left corner.
    pub offset_y: u32,
    /// Number of bars.
    pub bars: usize,
}

impl BarGeometry {
    /// Compute the geometry for an image of `width x height`.
    ///
    /// ```text
    /// bar_width   = max(min_bar_width, min(width, height) * bar_size_percent / 100)
    /// bar_height  = bar_width * bar_height_multiplier
    /// total_width = bar_width * bars
    /// offset      = (width - total_width, height - bar_height)
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`Error::DegenerateGeometry`] when the block does not fit inside
    /// the image. Blocks are never clamped or clipped.
    pub fn compute(width: u32, height: u32, config: &BarcodeConfig) -> Result<Self> {
        let short_side = u64::from(width.min(height));
        let scaled = short_side * u64::from(config.bar_size_percent) / 100;
        let bar_width = scaled.max(u64::from(config.min_bar_width));
        let bar_height = bar_width * u64::from(config.bar_height_multiplier);
        let total_width = bar_width.saturating_mul(config.bars as u64);

        if total_width > u64::from(width) || bar_height > u64::from(height) {
            return Err(Error::DegenerateGeometry {
                width,
                height,
                block_width: u32::try_from(total_width).unwrap_or(u32::MAX),
                block_height: u32::try_from(bar_height).unwrap_or(u32::MAX),
            });
        }

        // Both fit inside u32 dimensions after the check above.
        #[allow(clippy::cast_possible_truncation)]
        let geometry = Self {
            bar_width: bar_width as u32,
            bar_height: bar_height as u32,
            total_width: total_width as u32,
            offset_x: width - total_width as u32,
            offset_y: height - bar_height as u32,
            bars: config.bars,
        };
        Ok(geometry)
    }

    /// Top-left corner of bar `index`.
    #[must_use]
    pub fn bar_origin(&self, index: usize) -> (u32, u32) {
        let step = u32::try_from(index).map_or(u32::MAX, |i| self.bar_width.saturating_mul(i));
        (self.offset_x.saturating_add(step), self.offset_y)
    }
}
