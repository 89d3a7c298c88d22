use std::path::PathBuf;
use std::process;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;

use chromabar::{
    default_output_path, is_supported_image, BarcodeConfig, BarcodeEngine, ColorStrategy,
    Fingerprint, ProcessOptions, ProcessResult, DEFAULT_JPEG_QUALITY,
};

#[derive(Parser)]
#[command(
    name = "chromabar",
    about = "Fingerprint images and stamp them with a verifiable color barcode",
    version,
    after_help = "Simple usage: chromabar embed <image>  (writes {name}_barcode.{ext})\n\n\
                  NOTE: The barcode is visible and overwrites the bottom-right corner.\n\
                  It is not tamper-evident."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    barcode: BarcodeArgs,

    /// Print results as JSON on stdout
    #[arg(long, global = true)]
    json: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all non-error output
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Stamp images with their barcode
    Embed {
        /// Input image files
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output file (single input) or directory (several inputs)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// JPEG quality for .jpg/.jpeg outputs (1-100)
        #[arg(long, default_value_t = DEFAULT_JPEG_QUALITY)]
        jpeg_quality: u8,
    },
    /// Check that images carry the barcode matching their content
    Verify {
        /// Input image files
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Check against a stored identifier instead of re-deriving the colors
        #[arg(short, long)]
        identifier: Option<String>,
    },
    /// Print the fingerprint, colors and identifier of an image without stamping it
    Fingerprint {
        /// Input image file
        input: PathBuf,
    },
    /// Print the colors stored under an identifier
    Decode {
        /// Identifier to decode
        identifier: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum StrategyArg {
    /// Hue-wheel palette, packed as indices
    Palette,
    /// Arbitrary RGB, packed as raw bytes
    FreeForm,
}

#[derive(Args)]
struct BarcodeArgs {
    /// Color strategy (must match the one identifiers were issued with)
    #[arg(long, value_enum, default_value = "palette", global = true)]
    strategy: StrategyArg,

    /// Palette size for the palette strategy
    #[arg(long, default_value_t = chromabar::config::DEFAULT_PALETTE_SIZE, global = true)]
    palette_size: usize,

    /// Number of bars
    #[arg(long, default_value_t = chromabar::config::DEFAULT_BARS, global = true)]
    bars: usize,

    /// Per-channel color tolerance
    #[arg(long, default_value_t = chromabar::config::DEFAULT_COLOR_TOLERANCE, global = true)]
    tolerance: u8,

    /// Percentage of bars that must match (0-100)
    #[arg(long, default_value_t = chromabar::config::DEFAULT_REQUIRED_MATCH_PERCENT, global = true)]
    required_percent: u32,

    /// Side length of the fingerprint hash grids (2-8)
    #[arg(long, default_value_t = chromabar::config::DEFAULT_HASH_SIZE, global = true)]
    hash_size: u32,

    /// Bar width as a percentage of the shorter image side
    #[arg(long, default_value_t = chromabar::config::DEFAULT_BAR_SIZE_PERCENT, global = true)]
    bar_size_percent: u32,

    /// Minimum bar width in pixels
    #[arg(long, default_value_t = chromabar::config::DEFAULT_MIN_BAR_WIDTH, global = true)]
    min_bar_width: u32,

    /// Bar height as a multiple of bar width
    #[arg(long, default_value_t = chromabar::config::DEFAULT_BAR_HEIGHT_MULTIPLIER, global = true)]
    bar_height_multiplier: u32,
}

impl BarcodeArgs {
    fn config(&self) -> BarcodeConfig {
        let strategy = match self.strategy {
            StrategyArg::Palette => ColorStrategy::Palette {
                size: self.palette_size,
            },
            StrategyArg::FreeForm => ColorStrategy::FreeForm,
        };
        BarcodeConfig {
            hash_size: self.hash_size,
            bars: self.bars,
            strategy,
            bar_size_percent: self.bar_size_percent,
            min_bar_width: self.min_bar_width,
            bar_height_multiplier: self.bar_height_multiplier,
            color_tolerance: self.tolerance,
            required_match_percent: self.required_percent,
        }
    }
}

#[derive(Serialize)]
struct FingerprintReport {
    fingerprint: Fingerprint,
    sequence: chromabar::ColorSequence,
    identifier: String,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let engine = match BarcodeEngine::new(cli.barcode.config()) {
        Ok(e) => e,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    let opts = ProcessOptions {
        jpeg_quality: DEFAULT_JPEG_QUALITY,
        verbose: cli.verbose,
        quiet: cli.quiet,
    };

    match cli.command {
        Command::Embed {
            inputs,
            output,
            jpeg_quality,
        } => {
            if !(1..=100).contains(&jpeg_quality) {
                eprintln!("Error: JPEG quality must be between 1 and 100");
                process::exit(1);
            }
            let opts = ProcessOptions {
                jpeg_quality,
                ..opts
            };
            check_inputs_exist(&inputs);

            let results = if inputs.len() == 1 {
                let input = &inputs[0];
                let out = output.unwrap_or_else(|| default_output_path(input));
                vec![engine.embed_file(input, &out, &opts)]
            } else {
                engine.embed_files(&inputs, output.as_deref(), &opts)
            };
            finish(&results, &opts, cli.json);
        }
        Command::Verify { inputs, identifier } => {
            check_inputs_exist(&inputs);
            let results: Vec<ProcessResult> = match identifier.as_deref() {
                Some(id) => inputs
                    .iter()
                    .map(|input| engine.verify_file(input, Some(id)))
                    .collect(),
                None => engine.verify_files(&inputs),
            };
            finish(&results, &opts, cli.json);
        }
        Command::Fingerprint { input } => {
            let img = match image::open(&input) {
                Ok(img) => img.to_rgb8(),
                Err(e) => {
                    eprintln!("Error: Failed to load {}: {e}", input.display());
                    process::exit(1);
                }
            };
            let report = match fingerprint_report(&engine, &img) {
                Ok(report) => report,
                Err(e) => {
                    eprintln!("Error: {e}");
                    process::exit(1);
                }
            };
            if cli.json {
                print_json(&report);
            } else {
                println!("fingerprint: {}", report.fingerprint);
                println!("identifier:  {}", report.identifier);
                print_colors(&report.sequence);
            }
        }
        Command::Decode { identifier } => match engine.decode_identifier(&identifier) {
            Ok(sequence) => {
                if cli.json {
                    print_json(&sequence);
                } else {
                    print_colors(&sequence);
                }
            }
            Err(e) => {
                eprintln!("Error: {e}");
                process::exit(1);
            }
        },
    }
}

fn fingerprint_report(
    engine: &BarcodeEngine,
    img: &image::RgbImage,
) -> chromabar::Result<FingerprintReport> {
    let fingerprint = engine.fingerprint(img)?;
    let sequence = engine.expected_sequence(fingerprint)?;
    let identifier = engine.encode_identifier(&sequence)?;
    Ok(FingerprintReport {
        fingerprint,
        sequence,
        identifier,
    })
}

fn init_tracing(verbose: bool, quiet: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else if quiet {
        tracing::Level::ERROR
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn check_inputs_exist(inputs: &[PathBuf]) {
    for input in inputs {
        if !input.is_file() {
            eprintln!("Error: Input file does not exist: {}", input.display());
            process::exit(1);
        }
        if !is_supported_image(input) {
            eprintln!("Error: Unsupported image format: {}", input.display());
            process::exit(1);
        }
    }
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("Error: Failed to serialize output: {e}");
            process::exit(1);
        }
    }
}

fn print_colors(sequence: &chromabar::ColorSequence) {
    for (i, [r, g, b]) in sequence.iter().enumerate() {
        println!("  bar {i:>2}: #{r:02x}{g:02x}{b:02x}  ({r}, {g}, {b})");
    }
}

fn finish(results: &[ProcessResult], opts: &ProcessOptions, json: bool) {
    let mut success_count = 0u32;
    let mut skip_count = 0u32;
    let mut fail_count = 0u32;

    for r in results {
        print_result(r, opts);
        if r.skipped {
            skip_count += 1;
        } else if r.success {
            success_count += 1;
        } else {
            fail_count += 1;
        }
    }

    if json {
        print_json(&results);
    }

    if results.len() > 1 && !opts.quiet {
        eprintln!();
        eprint!("[Summary] Succeeded: {success_count}");
        if skip_count > 0 {
            eprint!(", Skipped: {skip_count}");
        }
        if fail_count > 0 {
            eprint!(", Failed: {fail_count}");
        }
        eprintln!(" (Total: {})", results.len());
    }

    if fail_count > 0 {
        process::exit(1);
    }
}

fn print_result(result: &ProcessResult, opts: &ProcessOptions) {
    if opts.quiet && result.success {
        return;
    }

    let filename = result.path.file_name().map_or_else(
        || result.path.display().to_string(),
        |f| f.to_string_lossy().to_string(),
    );

    if result.skipped {
        if !opts.quiet {
            eprintln!("[SKIP] {filename}: {}", result.message);
        }
    } else if result.success {
        if !opts.quiet {
            match &result.identifier {
                Some(id) => eprintln!("[OK] {filename} ({id})"),
                None => eprintln!("[OK] {filename}"),
            }
        }
    } else {
        eprintln!("[FAIL] {filename}: {}", result.message);
    }

    if opts.verbose && !result.message.is_empty() {
        eprintln!("  -> {}", result.message);
        if let Some(detail) = &result.verification {
            for bar in &detail.bars {
                eprintln!(
                    "     bar {:>2}: expected {:?}, sampled {:?}, diff {:?} {}",
                    bar.index,
                    bar.expected,
                    bar.sampled,
                    bar.diffs,
                    if bar.matched { "OK" } else { "FAIL" }
                );
            }
        }
    }
}
