//! Barcode engine: the fingerprint → colors → render → sample → compare pipeline.

use std::path::{Path, PathBuf};

use image::{imageops, ImageFormat, RgbImage};
use serde::Serialize;

use crate::color::{self, ColorSequence};
use crate::config::BarcodeConfig;
use crate::error::{Error, Result};
use crate::fingerprint::{self, Fingerprint};
use crate::geometry::BarGeometry;
use crate::identifier;
use crate::matching::{self, MatchResult};
use crate::render;
use crate::sampling;

/// Default JPEG quality for stamped output.
pub const DEFAULT_JPEG_QUALITY: u8 = 85;

/// Options controlling file processing behavior.
#[derive(Debug, Clone)]
pub struct ProcessOptions {
    /// Quality (1-100) used when the output is a JPEG.
    pub jpeg_quality: u8,
    /// Enable verbose logging.
    pub verbose: bool,
    /// Suppress non-error output.
    pub quiet: bool,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            verbose: false,
            quiet: false,
        }
    }
}

/// Everything produced when stamping an image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Embedding {
    /// Fingerprint of the image before stamping.
    pub fingerprint: Fingerprint,
    /// Colors that were rendered.
    pub sequence: ColorSequence,
    /// Identifier for the external store.
    pub identifier: String,
    /// Where the bars were placed.
    pub geometry: BarGeometry,
}

/// Everything produced when checking an image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verification {
    /// Fingerprint recomputed from the image, when the expected colors came from it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<Fingerprint>,
    /// Identifier of the expected colors.
    pub identifier: String,
    /// Colors read from the image.
    pub sampled: ColorSequence,
    /// Bar-by-bar comparison.
    pub result: MatchResult,
}

impl Verification {
    /// Whether enough bars matched.
    #[must_use]
    pub fn verified(&self) -> bool {
        self.result.verified
    }
}

/// Result of processing a single image file.
#[derive(Debug, Serialize)]
pub struct ProcessResult {
    /// Path of the processed file.
    pub path: PathBuf,
    /// Whether processing succeeded (for verification: whether the image verified).
    pub success: bool,
    /// Whether the file was skipped (image too small for a barcode).
    pub skipped: bool,
    /// Fingerprint, when one was computed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<Fingerprint>,
    /// Identifier written or checked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    /// Comparison detail for verification runs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification: Option<MatchResult>,
    /// Human-readable status message.
    pub message: String,
}

impl ProcessResult {
    fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            success: false,
            skipped: false,
            fingerprint: None,
            identifier: None,
            verification: None,
            message: String::new(),
        }
    }
}

/// The barcode engine holding a validated configuration.
///
/// Create once and reuse for any number of images; every method is a pure
/// function of its inputs, so the engine can be shared across threads.
#[derive(Debug, Clone, Default)]
pub struct BarcodeEngine {
    config: BarcodeConfig,
}

impl BarcodeEngine {
    /// Create an engine for `config`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the configuration is unusable.
    pub fn new(config: BarcodeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &BarcodeConfig {
        &self.config
    }

    /// Bar placement for an image of `width x height`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DegenerateGeometry`] if the block does not fit.
    pub fn geometry(&self, width: u32, height: u32) -> Result<BarGeometry> {
        BarGeometry::compute(width, height, &self.config)
    }

    /// Fingerprint the part of `image` that stamping leaves untouched.
    ///
    /// That is every row above the bar strip, or the whole image when it is too
    /// small to carry a barcode.
    ///
    /// # Errors
    ///
    /// See [`fingerprint::extract`].
    pub fn fingerprint(&self, image: &RgbImage) -> Result<Fingerprint> {
        let fp = match self.geometry(image.width(), image.height()) {
            Ok(geometry) => {
                let content = imageops::crop_imm(image, 0, 0, image.width(), geometry.offset_y);
                fingerprint::extract(&content.to_image(), self.config.hash_size)?
            }
            Err(_) => fingerprint::extract(image, self.config.hash_size)?,
        };
        tracing::debug!(fingerprint = %fp, "computed fingerprint");
        Ok(fp)
    }

    /// Colors expected for `fingerprint`.
    ///
    /// # Errors
    ///
    /// See [`color::generate`].
    pub fn expected_sequence(&self, fingerprint: Fingerprint) -> Result<ColorSequence> {
        color::generate(fingerprint, &self.config)
    }

    /// Identifier for `sequence`.
    ///
    /// # Errors
    ///
    /// See [`identifier::encode`].
    pub fn encode_identifier(&self, sequence: &ColorSequence) -> Result<String> {
        identifier::encode(sequence, &self.config)
    }

    /// Colors behind `identifier`.
    ///
    /// # Errors
    ///
    /// See [`identifier::decode`].
    pub fn decode_identifier(&self, id: &str) -> Result<ColorSequence> {
        identifier::decode(id, &self.config)
    }

    /// Fingerprint `image`, derive its colors and stamp them in place.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DegenerateGeometry`] if the image is too small; the
    /// image is untouched in that case.
    pub fn embed(&self, image: &mut RgbImage) -> Result<Embedding> {
        let geometry = self.geometry(image.width(), image.height())?;
        let fingerprint = self.fingerprint(image)?;
        let sequence = self.expected_sequence(fingerprint)?;
        let identifier = self.encode_identifier(&sequence)?;
        render::render(image, &sequence, &self.config)?;

        tracing::debug!(
            %fingerprint,
            %identifier,
            offset_x = geometry.offset_x,
            offset_y = geometry.offset_y,
            bar_width = geometry.bar_width,
            "stamped barcode"
        );

        Ok(Embedding {
            fingerprint,
            sequence,
            identifier,
            geometry,
        })
    }

    /// Re-fingerprint `image` and check that it carries the matching barcode.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DegenerateGeometry`] if the image is too small to hold
    /// a barcode.
    pub fn verify(&self, image: &RgbImage) -> Result<Verification> {
        let fingerprint = self.fingerprint(image)?;
        let expected = self.expected_sequence(fingerprint)?;
        let identifier = self.encode_identifier(&expected)?;
        let mut verification = self.check(image, &expected, identifier)?;
        verification.fingerprint = Some(fingerprint);
        Ok(verification)
    }

    /// Check `image` against the colors stored under `identifier`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidIdentifierEncoding`] for a malformed identifier
    /// or [`Error::DegenerateGeometry`] for an undersized image.
    pub fn verify_identifier(&self, image: &RgbImage, identifier: &str) -> Result<Verification> {
        let expected = self.decode_identifier(identifier)?;
        self.check(image, &expected, identifier.trim_end_matches('=').to_string())
    }

    fn check(
        &self,
        image: &RgbImage,
        expected: &ColorSequence,
        identifier: String,
    ) -> Result<Verification> {
        let sampled = sampling::sample(image, &self.config)?;
        let result = matching::compare(
            expected,
            &sampled,
            self.config.color_tolerance,
            self.config.required_match_percent,
        );

        if result.verified {
            tracing::debug!(
                %identifier,
                matches = result.match_count,
                required = result.required_matches,
                "barcode verified"
            );
        } else {
            tracing::warn!(
                %identifier,
                matches = result.match_count,
                required = result.required_matches,
                "barcode mismatch"
            );
        }

        Ok(Verification {
            fingerprint: None,
            identifier,
            sampled,
            result,
        })
    }

    /// Stamp a single image file: load, fingerprint, render, save.
    ///
    /// Returns a [`ProcessResult`] indicating success, skip, or failure.
    #[must_use]
    pub fn embed_file(&self, input: &Path, output: &Path, opts: &ProcessOptions) -> ProcessResult {
        let mut result = ProcessResult::new(input);

        let mut rgb_img = match image::open(input) {
            Ok(img) => img.to_rgb8(),
            Err(e) => {
                result.message = format!("Failed to load: {e}");
                return result;
            }
        };

        let embedding = match self.embed(&mut rgb_img) {
            Ok(embedding) => embedding,
            Err(e @ Error::DegenerateGeometry { .. }) => {
                result.skipped = true;
                result.success = true;
                result.message = e.to_string();
                return result;
            }
            Err(e) => {
                result.message = format!("Failed to stamp: {e}");
                return result;
            }
        };
        result.fingerprint = Some(embedding.fingerprint);
        result.identifier = Some(embedding.identifier);

        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    result.message = format!("Failed to create output directory: {e}");
                    return result;
                }
            }
        }

        match save_image(&rgb_img, output, opts.jpeg_quality) {
            Ok(()) => {
                result.success = true;
                result.message = format!("Barcode written to {}", output.display());
            }
            Err(e) => {
                result.message = format!("Failed to save: {e}");
            }
        }

        result
    }

    /// Verify a single image file.
    ///
    /// With `identifier` the expected colors come from it; otherwise they are
    /// re-derived from the image's own fingerprint.
    #[must_use]
    pub fn verify_file(&self, input: &Path, identifier: Option<&str>) -> ProcessResult {
        let mut result = ProcessResult::new(input);

        let rgb_img = match image::open(input) {
            Ok(img) => img.to_rgb8(),
            Err(e) => {
                result.message = format!("Failed to load: {e}");
                return result;
            }
        };

        let verification = match identifier {
            Some(id) => self.verify_identifier(&rgb_img, id),
            None => self.verify(&rgb_img),
        };

        match verification {
            Ok(v) => {
                result.success = v.verified();
                result.message = format!(
                    "{} ({}/{} bars matched, {} required)",
                    if v.verified() { "Verified" } else { "Mismatch" },
                    v.result.match_count,
                    v.result.total(),
                    v.result.required_matches,
                );
                result.fingerprint = v.fingerprint;
                result.identifier = Some(v.identifier);
                result.verification = Some(v.result);
            }
            Err(e @ Error::DegenerateGeometry { .. }) => {
                result.skipped = true;
                result.message = e.to_string();
            }
            Err(e) => {
                result.message = format!("Failed to verify: {e}");
            }
        }

        result
    }

    /// Stamp a list of image files.
    ///
    /// Each output goes to `output_dir` under the input's file name, or next to
    /// the input via [`default_output_path`] when no directory is given. Uses
    /// parallel iteration when the `cli` feature is enabled (via rayon).
    #[must_use]
    pub fn embed_files(
        &self,
        inputs: &[PathBuf],
        output_dir: Option<&Path>,
        opts: &ProcessOptions,
    ) -> Vec<ProcessResult> {
        let job = |input: &PathBuf| {
            let output = match (output_dir, input.file_name()) {
                (Some(dir), Some(name)) => dir.join(name),
                _ => default_output_path(input),
            };
            self.embed_file(input, &output, opts)
        };

        #[cfg(feature = "cli")]
        {
            use rayon::prelude::*;
            inputs.par_iter().map(job).collect()
        }

        #[cfg(not(feature = "cli"))]
        {
            inputs.iter().map(job).collect()
        }
    }

    /// Verify a list of image files against their own fingerprints.
    ///
    /// Uses parallel iteration when the `cli` feature is enabled (via rayon).
    #[must_use]
    pub fn verify_files(&self, inputs: &[PathBuf]) -> Vec<ProcessResult> {
        #[cfg(feature = "cli")]
        {
            use rayon::prelude::*;
            inputs
                .par_iter()
                .map(|input| self.verify_file(input, None))
                .collect()
        }

        #[cfg(not(feature = "cli"))]
        {
            inputs
                .iter()
                .map(|input| self.verify_file(input, None))
                .collect()
        }
    }
}

/// Check if a file has a supported image extension.
#[must_use]
pub fn is_supported_image(path: &Path) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => matches!(
            ext.to_lowercase().as_str(),
            "jpg" | "jpeg" | "png" | "webp" | "bmp"
        ),
        None => false,
    }
}

/// Save an RGB image, using `jpeg_quality` when the path names a JPEG.
///
/// # Errors
///
/// Returns an error if the format is unsupported or writing fails.
pub fn save_image(img: &RgbImage, path: &Path, jpeg_quality: u8) -> Result<()> {
    let format =
        ImageFormat::from_path(path).map_err(|e| Error::UnsupportedFormat(e.to_string()))?;

    match format {
        ImageFormat::Jpeg => {
            let file = std::io::BufWriter::new(std::fs::File::create(path)?);
            let mut encoder =
                image::codecs::jpeg::JpegEncoder::new_with_quality(file, jpeg_quality.clamp(1, 100));
            encoder.encode_image(img)?;
        }
        ImageFormat::Png | ImageFormat::WebP | ImageFormat::Bmp => {
            img.save_with_format(path, format)?;
        }
        _ => {
            return Err(Error::UnsupportedFormat(format!("{format:?}")));
        }
    }

    Ok(())
}

/// Generate a default output path from an input path.
///
/// Example: `"photo.jpg"` becomes `"photo_barcode.jpg"`.
#[must_use]
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
    let ext = input.extension().unwrap_or_default().to_string_lossy();
    let parent = input.parent().unwrap_or(Path::new("."));
    parent.join(format!("{stem}_barcode.{ext}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ColorStrategy;
    use image::Rgb;

    #[allow(clippy::cast_possible_truncation)]
    fn photo(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, ((x * y) % 251) as u8])
        })
    }

    #[test]
    fn new_rejects_invalid_config() {
        let config = BarcodeConfig {
            bars: 0,
            ..BarcodeConfig::default()
        };
        assert!(matches!(
            BarcodeEngine::new(config),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn fingerprint_ignores_the_bar_strip() {
        let engine = BarcodeEngine::default();
        let img = photo(200, 150);
        let mut scribbled = img.clone();
        for x in 0..200 {
            for y in 140..150 {
                scribbled.put_pixel(x, y, Rgb([255, 0, 255]));
            }
        }
        assert_eq!(
            engine.fingerprint(&img).unwrap(),
            engine.fingerprint(&scribbled).unwrap()
        );
    }

    #[test]
    fn embed_then_verify_matches_every_bar() {
        for strategy in [ColorStrategy::default(), ColorStrategy::FreeForm] {
            let engine = BarcodeEngine::new(BarcodeConfig {
                strategy,
                ..BarcodeConfig::default()
            })
            .unwrap();
            let mut img = photo(320, 240);
            let embedding = engine.embed(&mut img).unwrap();

            let verification = engine.verify(&img).unwrap();
            assert_eq!(verification.fingerprint, Some(embedding.fingerprint));
            assert_eq!(verification.identifier, embedding.identifier);
            assert_eq!(verification.sampled, embedding.sequence);
            assert_eq!(verification.result.match_count, 12);
            assert!(verification.verified());
        }
    }

    #[test]
    fn verify_identifier_uses_stored_colors() {
        let engine = BarcodeEngine::default();
        let mut img = photo(320, 240);
        let embedding = engine.embed(&mut img).unwrap();

        let ok = engine.verify_identifier(&img, &embedding.identifier).unwrap();
        assert!(ok.verified());
        assert_eq!(ok.fingerprint, None);

        let unstamped = photo(320, 240);
        let other = engine.verify_identifier(&unstamped, &embedding.identifier).unwrap();
        assert!(!other.verified());
    }

    #[test]
    fn embed_rejects_tiny_image_untouched() {
        let engine = BarcodeEngine::default();
        let mut img = photo(30, 30);
        let original = img.clone();
        assert!(matches!(
            engine.embed(&mut img),
            Err(Error::DegenerateGeometry { .. })
        ));
        assert_eq!(img, original);
    }

    #[test]
    fn default_output_path_appends_barcode_suffix() {
        let p = default_output_path(Path::new("/tmp/photo.jpg"));
        assert_eq!(p, PathBuf::from("/tmp/photo_barcode.jpg"));

        let p = default_output_path(Path::new("image.png"));
        assert_eq!(
            p.file_name().unwrap().to_str().unwrap(),
            "image_barcode.png"
        );
    }

    #[test]
    fn is_supported_image_accepts_common_formats() {
        assert!(is_supported_image(Path::new("photo.jpg")));
        assert!(is_supported_image(Path::new("photo.JPEG")));
        assert!(is_supported_image(Path::new("photo.png")));
        assert!(is_supported_image(Path::new("photo.webp")));
        assert!(is_supported_image(Path::new("photo.bmp")));
    }

    #[test]
    fn is_supported_image_rejects_unsupported_formats() {
        assert!(!is_supported_image(Path::new("photo.gif")));
        assert!(!is_supported_image(Path::new("photo.txt")));
        assert!(!is_supported_image(Path::new("photo")));
    }
}
