//! Fingerprint images and stamp them with a verifiable color barcode.
//!
//! A perceptual fingerprint of the image picks a deterministic row of colored
//! bars, which is painted over the bottom-right corner. Anyone holding the
//! stamped image (even after lossy re-compression) can re-fingerprint it,
//! re-derive the expected colors, read the bars back and check them within a
//! per-channel tolerance.
//!
//! # Quick Start
//!
//! ```no_run
//! use chromabar::BarcodeEngine;
//!
//! let engine = BarcodeEngine::default();
//! let mut img = image::open("photo.jpg").unwrap().to_rgb8();
//! let stamp = engine.embed(&mut img).expect("image too small");
//! println!("identifier: {}", stamp.identifier);
//! img.save("stamped.png").unwrap();
//! ```
//!
//! # Verification
//!
//! ```no_run
//! use chromabar::BarcodeEngine;
//!
//! let engine = BarcodeEngine::default();
//! let img = image::open("stamped.png").unwrap().to_rgb8();
//! let check = engine.verify(&img).expect("image too small");
//! println!(
//!     "verified: {} ({}/{} bars)",
//!     check.verified(),
//!     check.result.match_count,
//!     check.result.total()
//! );
//! ```
//!
//! The lower-level stages are available as free functions in
//! [`fingerprint`], [`color`], [`identifier`], [`render`], [`sampling`] and
//! [`matching`]; all of them take the same [`BarcodeConfig`].

#![deny(missing_docs)]

pub mod color;
pub mod config;
mod engine;
pub mod error;
pub mod fingerprint;
pub mod geometry;
pub mod identifier;
pub mod matching;
pub mod render;
pub mod sampling;

pub use color::{ColorSequence, Palette, Rgb};
pub use config::{BarcodeConfig, ColorStrategy};
pub use engine::{
    default_output_path, is_supported_image, save_image, BarcodeEngine, Embedding,
    ProcessOptions, ProcessResult, Verification, DEFAULT_JPEG_QUALITY,
};
pub use error::{Error, Result};
pub use fingerprint::Fingerprint;
pub use geometry::BarGeometry;
pub use matching::{BarMatch, MatchResult};
