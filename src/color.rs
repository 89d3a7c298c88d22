//! Deterministic bar colors derived from a fingerprint.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

use crate::config::{BarcodeConfig, ColorStrategy};
use crate::error::{Error, Result};
use crate::fingerprint::Fingerprint;

/// One RGB triple, channels in `0..=255`.
pub type Rgb = [u8; 3];

/// Ordered bar colors, left to right.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ColorSequence(Vec<Rgb>);

impl ColorSequence {
    /// Wrap `colors`, checking it holds exactly `bars` entries.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedSequenceLength`] on a length mismatch.
    pub fn new(colors: Vec<Rgb>, bars: usize) -> Result<Self> {
        if colors.len() != bars {
            return Err(Error::UnsupportedSequenceLength {
                expected: bars,
                actual: colors.len(),
            });
        }
        Ok(Self(colors))
    }

    /// Number of bars.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the sequence has no bars.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The colors as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[Rgb] {
        &self.0
    }

    /// Iterate over the colors.
    pub fn iter(&self) -> std::slice::Iter<'_, Rgb> {
        self.0.iter()
    }
}

impl<'a> IntoIterator for &'a ColorSequence {
    type Item = &'a Rgb;
    type IntoIter = std::slice::Iter<'a, Rgb>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Fully saturated colors evenly spaced around the hue wheel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    colors: Vec<Rgb>,
}

impl Palette {
    /// Build a palette of `size` colors, hue `i / size` for entry `i`.
    #[must_use]
    pub fn new(size: usize) -> Self {
        #[allow(clippy::cast_precision_loss)]
        let colors = (0..size)
            .map(|i| hue_to_rgb(i as f64 / size as f64))
            .collect();
        Self { colors }
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.colors.len()
    }

    /// Whether the palette is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Entry at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<Rgb> {
        self.colors.get(index).copied()
    }

    /// Index of an exact palette color.
    #[must_use]
    pub fn index_of(&self, color: Rgb) -> Option<usize> {
        self.colors.iter().position(|&c| c == color)
    }

    /// Width of one packed index: `ceil(log2(len))`.
    #[must_use]
    pub fn bits_per_index(&self) -> u32 {
        bits_for(self.colors.len())
    }
}

/// `ceil(log2(n))` for `n >= 1`.
pub(crate) fn bits_for(n: usize) -> u32 {
    usize::BITS - n.saturating_sub(1).leading_zeros()
}

/// HSV to RGB with saturation and value fixed at 1.
fn hue_to_rgb(hue: f64) -> Rgb {
    let h6 = hue * 6.0;
    let sector = h6.floor();
    let f = h6 - sector;
    #[allow(clippy::cast_possible_truncation)]
    let (r, g, b) = match sector as i64 % 6 {
        0 => (1.0, f, 0.0),
        1 => (1.0 - f, 1.0, 0.0),
        2 => (0.0, 1.0, f),
        3 => (0.0, 1.0 - f, 1.0),
        4 => (f, 0.0, 1.0),
        _ => (1.0, 0.0, 1.0 - f),
    };
    [to_channel(r), to_channel(g), to_channel(b)]
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_channel(c: f64) -> u8 {
    (c * 255.0).round().clamp(0.0, 255.0) as u8
}

/// Derive the bar colors for `fingerprint` under the configured strategy.
///
/// Pure function of the fingerprint and the config.
///
/// # Errors
///
/// Returns [`Error::InvalidConfig`] if `config` fails [`BarcodeConfig::validate`].
pub fn generate(fingerprint: Fingerprint, config: &BarcodeConfig) -> Result<ColorSequence> {
    config.validate()?;
    let value = fingerprint.as_u64();
    let colors = match config.strategy {
        ColorStrategy::Palette { size } => {
            let palette = Palette::new(size);
            let bits = palette.bits_per_index();
            (0..config.bars)
                .map(|i| {
                    let index = palette_index(value, i, bits, size);
                    palette.get(index).unwrap_or_default()
                })
                .collect()
        }
        ColorStrategy::FreeForm => {
            let mut rng = ChaCha8Rng::seed_from_u64(value);
            (0..config.bars)
                .map(|_| [rng.gen::<u8>(), rng.gen::<u8>(), rng.gen::<u8>()])
                .collect()
        }
    };
    Ok(ColorSequence(colors))
}

/// Fold two `bits`-wide windows of the fingerprint, half a word apart, into a
/// palette index for bar `bar`.
fn palette_index(value: u64, bar: usize, bits: u32, size: usize) -> usize {
    let mask = (1u64 << bits) - 1;
    let window = |offset: usize| {
        #[allow(clippy::cast_possible_truncation)]
        let rotation = (offset % 64) as u32;
        value.rotate_right(rotation) & mask
    };
    let offset = bar * bits as usize;
    #[allow(clippy::cast_possible_truncation)]
    let folded = (window(offset) ^ window(offset + 32)) as usize;
    folded % size
}
