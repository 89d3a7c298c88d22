//! Barcode configuration.
//!
//! Every value here is part of the wire format: an identifier issued under one
//! configuration only round-trips, renders and verifies under the same one.

use serde::Serialize;

use crate::error::{Error, Result};
use crate::fingerprint::HASH_SIZE_RANGE;

/// Default side length of the hash grids.
pub const DEFAULT_HASH_SIZE: u32 = 8;
/// Default number of bars (N).
pub const DEFAULT_BARS: usize = 12;
/// Default palette size (P) for [`ColorStrategy::Palette`].
pub const DEFAULT_PALETTE_SIZE: usize = 24;
/// Bar width as a percentage of the smaller image dimension.
pub const DEFAULT_BAR_SIZE_PERCENT: u32 = 1;
/// Lower bound on bar width in pixels.
pub const DEFAULT_MIN_BAR_WIDTH: u32 = 5;
/// Bar height as a multiple of bar width.
pub const DEFAULT_BAR_HEIGHT_MULTIPLIER: u32 = 2;
/// Maximum per-channel difference for a bar to count as matching.
pub const DEFAULT_COLOR_TOLERANCE: u8 = 15;
/// Percentage of bars that must match for an image to verify.
pub const DEFAULT_REQUIRED_MATCH_PERCENT: u32 = 75;

/// How a fingerprint is turned into bar colors, and how those colors are packed
/// into an identifier.
///
/// Exactly one strategy is active per [`BarcodeConfig`]; the generator, the
/// renderer and the identifier codec all read it from there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorStrategy {
    /// Colors drawn from a fixed hue-wheel palette, packed as palette indices.
    Palette {
        /// Number of palette entries (P).
        size: usize,
    },
    /// Arbitrary RGB triples from a fingerprint-seeded generator, packed as raw bytes.
    FreeForm,
}

impl Default for ColorStrategy {
    fn default() -> Self {
        Self::Palette {
            size: DEFAULT_PALETTE_SIZE,
        }
    }
}

/// Fixed parameters shared by every stage of the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BarcodeConfig {
    /// Side length of the difference/perceptual hash grids.
    pub hash_size: u32,
    /// Number of bars (N).
    pub bars: usize,
    /// Active color strategy.
    pub strategy: ColorStrategy,
    /// Bar width as a percentage of `min(width, height)`.
    pub bar_size_percent: u32,
    /// Minimum bar width in pixels.
    pub min_bar_width: u32,
    /// Bar height as a multiple of bar width.
    pub bar_height_multiplier: u32,
    /// Per-channel tolerance used by verification.
    pub color_tolerance: u8,
    /// Share of bars (0-100) that must match.
    pub required_match_percent: u32,
}

impl Default for BarcodeConfig {
    fn default() -> Self {
        Self {
            hash_size: DEFAULT_HASH_SIZE,
            bars: DEFAULT_BARS,
            strategy: ColorStrategy::default(),
            bar_size_percent: DEFAULT_BAR_SIZE_PERCENT,
            min_bar_width: DEFAULT_MIN_BAR_WIDTH,
            bar_height_multiplier: DEFAULT_BAR_HEIGHT_MULTIPLIER,
            color_tolerance: DEFAULT_COLOR_TOLERANCE,
            required_match_percent: DEFAULT_REQUIRED_MATCH_PERCENT,
        }
    }
}

impl BarcodeConfig {
    /// Check that the configuration can produce a usable barcode.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if !HASH_SIZE_RANGE.contains(&self.hash_size) {
            return Err(Error::InvalidConfig(format!(
                "hash_size must be in {}..={}, got {}",
                HASH_SIZE_RANGE.start(),
                HASH_SIZE_RANGE.end(),
                self.hash_size
            )));
        }
        if self.bars == 0 {
            return Err(Error::InvalidConfig("bars must be at least 1".to_string()));
        }
        if let ColorStrategy::Palette { size } = self.strategy {
            if !(2..=256).contains(&size) {
                return Err(Error::InvalidConfig(format!(
                    "palette size must be in 2..=256, got {size}"
                )));
            }
        }
        if self.min_bar_width == 0 {
            return Err(Error::InvalidConfig(
                "min_bar_width must be at least 1".to_string(),
            ));
        }
        if self.bar_height_multiplier == 0 {
            return Err(Error::InvalidConfig(
                "bar_height_multiplier must be at least 1".to_string(),
            ));
        }
        if self.required_match_percent > 100 {
            return Err(Error::InvalidConfig(format!(
                "required_match_percent must be at most 100, got {}",
                self.required_match_percent
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = BarcodeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.bars, 12);
        assert_eq!(config.strategy, ColorStrategy::Palette { size: 24 });
    }

    #[test]
    fn validate_rejects_out_of_range_fields() {
        let cases = [
            BarcodeConfig {
                hash_size: 1,
                ..BarcodeConfig::default()
            },
            BarcodeConfig {
                hash_size: 9,
                ..BarcodeConfig::default()
            },
            BarcodeConfig {
                bars: 0,
                ..BarcodeConfig::default()
            },
            BarcodeConfig {
                strategy: ColorStrategy::Palette { size: 1 },
                ..BarcodeConfig::default()
            },
            BarcodeConfig {
                strategy: ColorStrategy::Palette { size: 257 },
                ..BarcodeConfig::default()
            },
            BarcodeConfig {
                min_bar_width: 0,
                ..BarcodeConfig::default()
            },
            BarcodeConfig {
                bar_height_multiplier: 0,
                ..BarcodeConfig::default()
            },
            BarcodeConfig {
                required_match_percent: 101,
                ..BarcodeConfig::default()
            },
        ];
        for config in cases {
            assert!(
                matches!(config.validate(), Err(Error::InvalidConfig(_))),
                "{config:?} should be rejected"
            );
        }
    }

    #[test]
    fn free_form_strategy_ignores_palette_bounds() {
        let config = BarcodeConfig {
            strategy: ColorStrategy::FreeForm,
            ..BarcodeConfig::default()
        };
        assert!(config.validate().is_ok());
    }
}
