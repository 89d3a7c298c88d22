//! Compact, reversible identifiers for color sequences.
//!
//! The packing follows the active [`ColorStrategy`]:
//!
//! - **Palette**: each bar becomes its palette index, written as a
//!   `ceil(log2 P)`-bit field, most significant bit first, bars left to right.
//!   Unused bits in the last byte are zero.
//! - **Free-form**: the three raw channel bytes of each bar, R then G then B.
//!
//! The byte buffer is base64url-encoded with padding stripped. Decoding
//! restores the padding first. The strategy is never sniffed from the
//! identifier; it always comes from the caller's [`BarcodeConfig`].

use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine as _;

use crate::color::{ColorSequence, Palette, Rgb};
use crate::config::{BarcodeConfig, ColorStrategy};
use crate::error::{Error, Result};

/// Encode `sequence` into an identifier.
///
/// # Errors
///
/// Returns [`Error::UnsupportedSequenceLength`] if the sequence does not have
/// `config.bars` entries, or [`Error::ColorNotInPalette`] if a bar is not a
/// palette color under the palette strategy.
pub fn encode(sequence: &ColorSequence, config: &BarcodeConfig) -> Result<String> {
    if sequence.len() != config.bars {
        return Err(Error::UnsupportedSequenceLength {
            expected: config.bars,
            actual: sequence.len(),
        });
    }

    let bytes = match config.strategy {
        ColorStrategy::Palette { size } => pack_indices(sequence, &Palette::new(size))?,
        ColorStrategy::FreeForm => sequence.iter().flatten().copied().collect(),
    };
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// Decode an identifier back into its color sequence.
///
/// Trailing `=` characters are accepted but not required.
///
/// # Errors
///
/// Returns [`Error::InvalidIdentifierEncoding`] for malformed base64, a byte
/// count that does not match `config.bars`, out-of-range palette indices or
/// non-zero spare bits.
pub fn decode(identifier: &str, config: &BarcodeConfig) -> Result<ColorSequence> {
    let trimmed = identifier.trim_end_matches('=');
    let mut padded = String::with_capacity(trimmed.len() + 3);
    padded.push_str(trimmed);
    while padded.len() % 4 != 0 {
        padded.push('=');
    }

    let bytes = URL_SAFE
        .decode(padded.as_bytes())
        .map_err(|e| Error::InvalidIdentifierEncoding(format!("{identifier:?}: {e}")))?;

    let expected = encoded_len(config);
    if bytes.len() != expected {
        return Err(Error::InvalidIdentifierEncoding(format!(
            "decoded {} bytes, expected {expected} for {} bars",
            bytes.len(),
            config.bars
        )));
    }

    let colors = match config.strategy {
        ColorStrategy::Palette { size } => {
            unpack_indices(&bytes, config.bars, &Palette::new(size))?
        }
        ColorStrategy::FreeForm => bytes
            .chunks_exact(3)
            .map(|c| [c[0], c[1], c[2]])
            .collect(),
    };
    ColorSequence::new(colors, config.bars)
}

/// Number of packed bytes an identifier carries under `config`.
#[must_use]
pub fn encoded_len(config: &BarcodeConfig) -> usize {
    match config.strategy {
        ColorStrategy::Palette { size } => {
            let bits = Palette::new(size).bits_per_index() as usize;
            (config.bars * bits).div_ceil(8)
        }
        ColorStrategy::FreeForm => config.bars * 3,
    }
}

fn pack_indices(sequence: &ColorSequence, palette: &Palette) -> Result<Vec<u8>> {
    let bits = palette.bits_per_index();
    let mut writer = BitWriter::default();
    for (index, &color) in sequence.iter().enumerate() {
        let slot = palette
            .index_of(color)
            .ok_or(Error::ColorNotInPalette { index, color })?;
        writer.write(slot as u64, bits);
    }
    Ok(writer.finish())
}

fn unpack_indices(bytes: &[u8], bars: usize, palette: &Palette) -> Result<Vec<Rgb>> {
    let bits = palette.bits_per_index();
    let mut reader = BitReader::new(bytes);
    let mut colors = Vec::with_capacity(bars);
    for bar in 0..bars {
        #[allow(clippy::cast_possible_truncation)]
        let slot = reader.read(bits) as usize;
        let color = palette.get(slot).ok_or_else(|| {
            Error::InvalidIdentifierEncoding(format!(
                "bar {bar} has palette index {slot}, palette has {} colors",
                palette.len()
            ))
        })?;
        colors.push(color);
    }
    if reader.remaining_bits_set() {
        return Err(Error::InvalidIdentifierEncoding(
            "non-zero padding bits".to_string(),
        ));
    }
    Ok(colors)
}

/// MSB-first bit packer.
#[derive(Default)]
struct BitWriter {
    bytes: Vec<u8>,
    used: u32,
}

impl BitWriter {
    fn write(&mut self, value: u64, width: u32) {
        for shift in (0..width).rev() {
            if self.used % 8 == 0 {
                self.bytes.push(0);
            }
            let bit = u8::from((value >> shift) & 1 == 1);
            if let Some(last) = self.bytes.last_mut() {
                *last |= bit << (7 - self.used % 8);
            }
            self.used += 1;
        }
    }

    fn finish(self) -> Vec<u8> {
        self.bytes
    }
}

/// MSB-first bit reader; reads past the end yield zeros.
struct BitReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> BitReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn bit(&self, pos: usize) -> u64 {
        self.bytes
            .get(pos / 8)
            .map_or(0, |b| u64::from((b >> (7 - pos % 8)) & 1))
    }

    fn read(&mut self, width: u32) -> u64 {
        let mut value = 0;
        for _ in 0..width {
            value = (value << 1) | self.bit(self.pos);
            self.pos += 1;
        }
        value
    }

    fn remaining_bits_set(&self) -> bool {
        (self.pos..self.bytes.len() * 8).any(|p| self.bit(p) == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;
    use crate::color;
    use crate::fingerprint::Fingerprint;
    use proptest::prelude::*;

    fn free_form() -> BarcodeConfig {
        BarcodeConfig {
            strategy: ColorStrategy::FreeForm,
            ..BarcodeConfig::default()
        }
    }

    fn raw_sequence() -> ColorSequence {
        let colors = (0u8..12).map(|i| [i * 20, 255 - i, i.wrapping_mul(37)]).collect();
        ColorSequence::new(colors, 12).unwrap()
    }

    #[test]
    fn raw_identifier_is_48_chars_and_round_trips() {
        let config = free_form();
        let seq = raw_sequence();
        let id = encode(&seq, &config).unwrap();
        assert_eq!(id.len(), 48);
        assert!(!id.contains('='));
        assert_eq!(decode(&id, &config).unwrap(), seq);
    }

    #[test]
    fn palette_identifier_packs_five_bits_per_bar() {
        let config = BarcodeConfig::default();
        assert_eq!(encoded_len(&config), 8);
        let seq =
            color::generate(Fingerprint::from_u64(0x1234_5678_9abc_def0), &config).unwrap();
        let id = encode(&seq, &config).unwrap();
        // 8 bytes -> 12 base64 chars with one '=' stripped.
        assert_eq!(id.len(), 11);
        assert_eq!(decode(&id, &config).unwrap(), seq);
    }

    #[test]
    fn palette_packing_is_msb_first() {
        let config = BarcodeConfig {
            bars: 2,
            strategy: ColorStrategy::Palette { size: 16 },
            ..BarcodeConfig::default()
        };
        let palette = Palette::new(16);
        let seq = ColorSequence::new(
            vec![palette.get(1).unwrap(), palette.get(15).unwrap()],
            2,
        )
        .unwrap();
        let id = encode(&seq, &config).unwrap();
        assert_eq!(URL_SAFE_NO_PAD.decode(&id).unwrap(), vec![0x1f]);
    }

    #[test]
    fn decode_accepts_existing_padding() {
        let config = BarcodeConfig::default();
        let seq = color::generate(Fingerprint::from_u64(42), &config).unwrap();
        let id = encode(&seq, &config).unwrap();
        assert_eq!(decode(&format!("{id}="), &config).unwrap(), seq);
    }

    #[test]
    fn encode_rejects_foreign_colors_under_palette() {
        let config = BarcodeConfig::default();
        let seq = raw_sequence();
        assert!(matches!(
            encode(&seq, &config),
            Err(Error::ColorNotInPalette { index: 0, .. })
        ));
    }

    #[test]
    fn encode_rejects_wrong_length() {
        let config = BarcodeConfig {
            bars: 11,
            ..free_form()
        };
        assert!(matches!(
            encode(&raw_sequence(), &config),
            Err(Error::UnsupportedSequenceLength {
                expected: 11,
                actual: 12
            })
        ));
    }

    #[test]
    fn decode_rejects_malformed_input() {
        let config = free_form();
        let short = "A".repeat(47);
        for bad in ["!!!!", "a", "AAAA", short.as_str()] {
            assert!(
                matches!(decode(bad, &config), Err(Error::InvalidIdentifierEncoding(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn decode_rejects_out_of_range_palette_index() {
        let config = BarcodeConfig::default();
        // Index 31 in the first slot, palette only has 24 entries.
        let id = URL_SAFE_NO_PAD.encode([0xf8, 0, 0, 0, 0, 0, 0, 0]);
        assert!(matches!(
            decode(&id, &config),
            Err(Error::InvalidIdentifierEncoding(_))
        ));
    }

    #[test]
    fn decode_rejects_non_zero_spare_bits() {
        let config = BarcodeConfig::default();
        // 12 * 5 = 60 bits used, the last 4 bits must be clear.
        let id = URL_SAFE_NO_PAD.encode([0, 0, 0, 0, 0, 0, 0, 0x01]);
        assert!(matches!(
            decode(&id, &config),
            Err(Error::InvalidIdentifierEncoding(_))
        ));
    }

    proptest! {
        #[test]
        fn raw_round_trip(bytes in proptest::collection::vec(any::<u8>(), 36)) {
            let config = free_form();
            let colors = bytes.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect();
            let seq = ColorSequence::new(colors, 12).unwrap();
            let id = encode(&seq, &config).unwrap();
            prop_assert_eq!(decode(&id, &config).unwrap(), seq);
        }

        #[test]
        fn palette_round_trip(indices in proptest::collection::vec(0usize..24, 12)) {
            let config = BarcodeConfig::default();
            let palette = Palette::new(24);
            let colors = indices.iter().map(|&i| palette.get(i).unwrap()).collect();
            let seq = ColorSequence::new(colors, 12).unwrap();
            let id = encode(&seq, &config).unwrap();
            prop_assert_eq!(decode(&id, &config).unwrap(), seq);
        }
    }
}
