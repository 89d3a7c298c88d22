//! Stamp a barcode onto a single image, then read it back.
//!
//! Usage:
//! ```sh
//! cargo run --example stamp_and_verify -- input.jpg output.jpg
//! ```

use std::env;
use std::process;

use chromabar::{BarcodeEngine, ProcessOptions};

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        eprintln!("Usage: {} <input> <output>", args[0]);
        process::exit(1);
    }

    let input = &args[1];
    let output = &args[2];

    let engine = BarcodeEngine::default();
    let opts = ProcessOptions::default();
    let stamped = engine.embed_file(input.as_ref(), output.as_ref(), &opts);

    if stamped.skipped {
        println!("Skipped: {}", stamped.message);
        return;
    } else if !stamped.success {
        eprintln!("Error: {}", stamped.message);
        process::exit(1);
    }
    println!(
        "Stamped: {}",
        stamped.identifier.as_deref().unwrap_or_default()
    );

    let checked = engine.verify_file(output.as_ref(), stamped.identifier.as_deref());
    println!("Read back: {}", checked.message);
}
