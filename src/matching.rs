//! Fuzzy comparison of expected and sampled bar colors.
//!
//! A bar matches when all three channels are within the tolerance. The image
//! verifies when at least `floor(bars * required_percent / 100)` bars match,
//! which leaves room for a few bars ruined by re-compression.

use serde::Serialize;

use crate::color::{ColorSequence, Rgb};

/// Comparison detail for a single bar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BarMatch {
    /// Bar position, left to right.
    pub index: usize,
    /// Color the bar should have.
    pub expected: Rgb,
    /// Color read from the image.
    pub sampled: Rgb,
    /// Absolute per-channel difference.
    pub diffs: [u8; 3],
    /// Whether every channel is within tolerance.
    pub matched: bool,
}

/// Outcome of comparing two sequences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchResult {
    /// Per-bar detail.
    pub bars: Vec<BarMatch>,
    /// Number of matching bars.
    pub match_count: usize,
    /// Matches needed to verify.
    pub required_matches: usize,
    /// `match_count >= required_matches`.
    pub verified: bool,
}

impl MatchResult {
    /// Per-bar match flags.
    #[must_use]
    pub fn flags(&self) -> Vec<bool> {
        self.bars.iter().map(|b| b.matched).collect()
    }

    /// Number of bars compared.
    #[must_use]
    pub fn total(&self) -> usize {
        self.bars.len()
    }
}

/// Compare `expected` against `sampled`.
///
/// Never fails: an all-mismatched pair still yields a result, with
/// `verified == false` unless the requirement is zero. Only the common prefix
/// of the two sequences is compared; the requirement is always computed from
/// the expected length.
#[must_use]
pub fn compare(
    expected: &ColorSequence,
    sampled: &ColorSequence,
    tolerance: u8,
    required_percent: u32,
) -> MatchResult {
    let bars: Vec<BarMatch> = expected
        .iter()
        .zip(sampled.iter())
        .enumerate()
        .map(|(index, (&expected, &sampled))| {
            let diffs = [
                expected[0].abs_diff(sampled[0]),
                expected[1].abs_diff(sampled[1]),
                expected[2].abs_diff(sampled[2]),
            ];
            BarMatch {
                index,
                expected,
                sampled,
                diffs,
                matched: diffs.iter().all(|&d| d <= tolerance),
            }
        })
        .collect();

    let match_count = bars.iter().filter(|b| b.matched).count();
    let required_matches = required_matches(expected.len(), required_percent);

    MatchResult {
        bars,
        match_count,
        required_matches,
        verified: match_count >= required_matches,
    }
}

/// `floor(bars * percent / 100)`.
#[must_use]
pub fn required_matches(bars: usize, percent: u32) -> usize {
    bars * percent as usize / 100
}
