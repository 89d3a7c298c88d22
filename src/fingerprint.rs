//! Perceptual fingerprint of image content.
//!
//! The fingerprint combines two classic hashes computed on a downscaled
//! grayscale copy of the image:
//!
//! 1. **Difference hash**: `image_hasher`'s gradient hash over an `(h+1) x h`
//!    grid, one bit per horizontal neighbour pair, read most significant bit
//!    first.
//! 2. **Perceptual hash**: `h x h` grid, 2D DCT-II, one bit per non-DC
//!    coefficient, set when the coefficient is at or above the mean of the
//!    non-DC coefficients.
//!
//! Wire format: difference-hash bits come first (most significant), perceptual
//! bits follow, both in row-major order. The `2h² - 1` bit string is read as an
//! unsigned integer; if it is wider than 64 bits the upper word is XOR-folded
//! into the lower one. Grayscale conversion and [`RESAMPLE_FILTER`] are part of
//! that format: changing either invalidates every identifier already issued.

use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use image::imageops::{self, FilterType};
use image::{GrayImage, RgbImage};
use image_hasher::{BitOrder, HashAlg, HasherConfig};
use serde::{Serialize, Serializer};

use crate::error::{Error, Result};

/// Resampling filter used for both hash grids.
pub const RESAMPLE_FILTER: FilterType = FilterType::Lanczos3;

/// Supported side lengths of the hash grids. Two `h x h` grids must fit the
/// 128-bit accumulator before folding.
pub const HASH_SIZE_RANGE: RangeInclusive<u32> = 2..=8;

/// Length of the canonical hex form.
pub const FINGERPRINT_HEX_LEN: usize = 16;

/// A 64-bit image fingerprint.
///
/// Displays as 16 lowercase, zero-padded hex digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(u64);

impl Fingerprint {
    /// Wrap a raw 64-bit value.
    #[must_use]
    pub const fn from_u64(value: u64) -> Self {
        Self(value)
    }

    /// The raw 64-bit value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Parse the canonical 16-digit hex form.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFingerprintFormat`] if `s` is not exactly 16 hex digits.
    pub fn from_hex(s: &str) -> Result<Self> {
        if s.len() != FINGERPRINT_HEX_LEN {
            return Err(Error::InvalidFingerprintFormat(format!(
                "expected {FINGERPRINT_HEX_LEN} hex digits, got {} characters",
                s.len()
            )));
        }
        let mut bytes = [0u8; 8];
        hex::decode_to_slice(s, &mut bytes)
            .map_err(|e| Error::InvalidFingerprintFormat(format!("{s:?}: {e}")))?;
        Ok(Self(u64::from_be_bytes(bytes)))
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl FromStr for Fingerprint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Compute the fingerprint of an image.
///
/// `hash_size` is the side length of the hash grids (8 in the default
/// configuration). Empty images hash as all-black.
///
/// # Errors
///
/// Returns [`Error::InvalidConfig`] if `hash_size` is outside [`HASH_SIZE_RANGE`].
pub fn extract(image: &RgbImage, hash_size: u32) -> Result<Fingerprint> {
    if !HASH_SIZE_RANGE.contains(&hash_size) {
        return Err(Error::InvalidConfig(format!(
            "hash_size must be in {}..={}, got {hash_size}",
            HASH_SIZE_RANGE.start(),
            HASH_SIZE_RANGE.end()
        )));
    }
    let gray = imageops::grayscale(image);

    let mut bits: u128 = 0;
    let mut push = |bit: bool| bits = (bits << 1) | u128::from(bit);

    for bit in difference_bits(image, hash_size) {
        push(bit);
    }
    for bit in perceptual_bits(&gray, hash_size) {
        push(bit);
    }

    #[allow(clippy::cast_possible_truncation)]
    let folded = ((bits >> 64) as u64) ^ (bits as u64);
    Ok(Fingerprint(folded))
}

/// Downscale to `width x height` with the wire-format filter.
fn downscale(gray: &GrayImage, width: u32, height: u32) -> GrayImage {
    if gray.width() == 0 || gray.height() == 0 {
        return GrayImage::new(width, height);
    }
    imageops::resize(gray, width, height, RESAMPLE_FILTER)
}

/// Difference-hash bits, `hash_size²` of them, row-major.
fn difference_bits(image: &RgbImage, hash_size: u32) -> Vec<bool> {
    let len = (hash_size * hash_size) as usize;
    if image.width() == 0 || image.height() == 0 {
        return vec![false; len];
    }

    let hasher = HasherConfig::new()
        .hash_alg(HashAlg::Gradient)
        .hash_size(hash_size, hash_size)
        .resize_filter(RESAMPLE_FILTER)
        .bit_order(BitOrder::MsbFirst)
        .to_hasher();
    let hash = hasher.hash_image(image);
    let bytes = hash.as_bytes();
    (0..len)
        .map(|i| bytes.get(i / 8).is_some_and(|b| (b >> (7 - i % 8)) & 1 == 1))
        .collect()
}

/// Perceptual-hash bits, `hash_size² - 1` of them (DC term skipped), row-major.
fn perceptual_bits(gray: &GrayImage, hash_size: u32) -> Vec<bool> {
    let small = downscale(gray, hash_size, hash_size);
    let n = hash_size as usize;
    let samples: Vec<f64> = small.pixels().map(|p| f64::from(p[0])).collect();
    let coeffs = dct_2d(&samples, n);

    let ac = &coeffs[1..];
    #[allow(clippy::cast_precision_loss)]
    let mean = ac.iter().sum::<f64>() / ac.len() as f64;
    ac.iter().map(|&c| c >= mean).collect()
}

/// Unnormalized 1D DCT-II.
fn dct_1d(input: &[f64], output: &mut [f64]) {
    #[allow(clippy::cast_precision_loss)]
    let n = input.len() as f64;
    for (k, out) in output.iter_mut().enumerate() {
        #[allow(clippy::cast_precision_loss)]
        let k = k as f64;
        *out = input
            .iter()
            .enumerate()
            .map(|(i, &x)| {
                #[allow(clippy::cast_precision_loss)]
                let i = i as f64;
                x * (std::f64::consts::PI * k * (2.0 * i + 1.0) / (2.0 * n)).cos()
            })
            .sum::<f64>()
            * 2.0;
    }
}

/// Separable 2D DCT-II over a row-major `n x n` block: rows first, then columns.
fn dct_2d(data: &[f64], n: usize) -> Vec<f64> {
    debug_assert_eq!(data.len(), n * n);
    let mut rows = vec![0.0_f64; n * n];
    for (src, dst) in data.chunks_exact(n).zip(rows.chunks_exact_mut(n)) {
        dct_1d(src, dst);
    }

    let mut result = vec![0.0_f64; n * n];
    let mut column = vec![0.0_f64; n];
    let mut transformed = vec![0.0_f64; n];
    for x in 0..n {
        for y in 0..n {
            column[y] = rows[y * n + x];
        }
        dct_1d(&column, &mut transformed);
        for y in 0..n {
            result[y * n + x] = transformed[y];
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use proptest::prelude::*;

    fn gradient_image(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            #[allow(clippy::cast_possible_truncation)]
            let v = ((x * 255) / width.max(1)) as u8;
            #[allow(clippy::cast_possible_truncation)]
            let w = ((y * 255) / height.max(1)) as u8;
            Rgb([v, w, v ^ w])
        })
    }

    #[test]
    fn display_is_sixteen_lowercase_hex_digits() {
        assert_eq!(Fingerprint::from_u64(0xAB).to_string(), "00000000000000ab");
        assert_eq!(
            Fingerprint::from_u64(u64::MAX).to_string(),
            "ffffffffffffffff"
        );
    }

    #[test]
    fn from_hex_inverts_display() {
        let fp = Fingerprint::from_u64(0x0123_4567_89ab_cdef);
        assert_eq!(Fingerprint::from_hex(&fp.to_string()).unwrap(), fp);
        assert_eq!("0123456789ABCDEF".parse::<Fingerprint>().unwrap(), fp);
    }

    #[test]
    fn from_hex_rejects_bad_input() {
        for bad in ["", "abc", "0123456789abcdef0", "0123456789abcdeg", "zzzzzzzzzzzzzzzz"] {
            assert!(
                matches!(
                    Fingerprint::from_hex(bad),
                    Err(Error::InvalidFingerprintFormat(_))
                ),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn extract_is_deterministic() {
        let img = gradient_image(120, 80);
        assert_eq!(extract(&img, 8).unwrap(), extract(&img, 8).unwrap());
    }

    #[test]
    fn extract_distinguishes_different_content() {
        let a = gradient_image(120, 80);
        let mut b = a.clone();
        imageops::flip_horizontal_in_place(&mut b);
        assert_ne!(extract(&a, 8).unwrap(), extract(&b, 8).unwrap());
    }

    #[test]
    fn extract_handles_empty_image() {
        // No difference bits; every perceptual coefficient is zero, so at or above the mean.
        let img = RgbImage::new(0, 0);
        assert_eq!(
            extract(&img, 8).unwrap(),
            Fingerprint::from_u64(0x7fff_ffff_ffff_ffff)
        );
    }

    #[test]
    fn extract_rejects_unsupported_hash_sizes() {
        let img = gradient_image(32, 32);
        for hash_size in [0, 1, 9, u32::MAX] {
            assert!(
                matches!(extract(&img, hash_size), Err(Error::InvalidConfig(_))),
                "hash_size {hash_size} should be rejected"
            );
        }
    }

    #[test]
    fn small_hash_sizes_fit_without_folding() {
        // 2*5*5 - 1 = 49 bits: the top 15 bits stay clear.
        let fp = extract(&gradient_image(64, 64), 5).unwrap();
        assert_eq!(fp.as_u64() >> 49, 0);
    }

    #[allow(clippy::cast_possible_truncation)]
    fn ramp(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, _| {
            let v = 255 - (x * 2) as u8;
            Rgb([v, v, v])
        })
    }

    #[test]
    fn difference_bits_follow_horizontal_brightness() {
        let falling = difference_bits(&ramp(90, 80), 8);
        assert_eq!(falling.len(), 64);
        assert!(falling.iter().all(|&b| b == falling[0]));

        let mut rising = ramp(90, 80);
        imageops::flip_horizontal_in_place(&mut rising);
        let rising = difference_bits(&rising, 8);
        assert!(falling.iter().zip(&rising).all(|(a, b)| a != b));
    }

    #[test]
    fn difference_bits_cover_odd_grid_sizes() {
        // 5x5 = 25 bits spill into a fourth byte.
        assert_eq!(difference_bits(&ramp(90, 80), 5).len(), 25);
        assert_eq!(difference_bits(&RgbImage::new(0, 3), 5), vec![false; 25]);
    }

    #[test]
    fn perceptual_bits_skip_dc_term() {
        let gray = GrayImage::from_pixel(32, 32, image::Luma([128]));
        assert_eq!(perceptual_bits(&gray, 8).len(), 63);
    }

    #[test]
    fn dct_of_constant_block_is_pure_dc() {
        let data = vec![1.0_f64; 16];
        let coeffs = dct_2d(&data, 4);
        assert!((coeffs[0] - 64.0).abs() < 1e-9, "DC was {}", coeffs[0]);
        for &c in &coeffs[1..] {
            assert!(c.abs() < 1e-9, "AC coefficient {c} should vanish");
        }
    }

    fn small_image() -> impl Strategy<Value = RgbImage> {
        (1u32..24, 1u32..24).prop_flat_map(|(w, h)| {
            proptest::collection::vec(any::<u8>(), (w * h * 3) as usize)
                .prop_map(move |raw| RgbImage::from_raw(w, h, raw).unwrap())
        })
    }

    proptest! {
        #[test]
        fn extract_is_a_pure_function_of_the_pixels(img in small_image()) {
            prop_assert_eq!(extract(&img, 8).unwrap(), extract(&img, 8).unwrap());
        }
    }
}
