//! Error types for the chromabar crate.

/// Errors that can occur while fingerprinting, encoding, rendering or verifying.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A fingerprint string is not 16 lowercase/uppercase hex digits.
    #[error("invalid fingerprint format: {0}")]
    InvalidFingerprintFormat(String),

    /// An identifier is not valid base64url, or decodes to the wrong number of bytes.
    #[error("invalid identifier encoding: {0}")]
    InvalidIdentifierEncoding(String),

    /// A color sequence does not have the configured number of bars.
    #[error("unsupported sequence length: expected {expected} bars, got {actual}")]
    UnsupportedSequenceLength {
        /// Configured bar count.
        expected: usize,
        /// Length actually supplied.
        actual: usize,
    },

    /// The image is too small to hold the bar block.
    #[error(
        "image too small ({width}x{height}) for {block_width}x{block_height} barcode block"
    )]
    DegenerateGeometry {
        /// Image width in pixels.
        width: u32,
        /// Image height in pixels.
        height: u32,
        /// Width of the complete bar block.
        block_width: u32,
        /// Height of the complete bar block.
        block_height: u32,
    },

    /// A color handed to the palette codec is not a palette entry.
    #[error("bar {index} color {color:?} is not in the palette")]
    ColorNotInPalette {
        /// Bar position.
        index: usize,
        /// The offending RGB triple.
        color: [u8; 3],
    },

    /// The configuration cannot produce a usable barcode.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The image format is not supported.
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// An error occurred during image processing (load, save, encode).
    #[error("image processing error: {0}")]
    Image(#[from] image::ImageError),
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
