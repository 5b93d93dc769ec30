//! Text Detection Example
//!
//! This example runs the text detector on one or more document images and
//! prints the detected regions, their confidences and the page skew.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example text_detection -- [OPTIONS] <IMAGES>...
//! ```
//!
//! # Arguments
//!
//! * `-c, --config` - JSON file with detector parameters
//! * `--parcel-out` - Write the effective parameters in wire format to this file
//! * `--no-skew` - Disable skew estimation and correction
//! * `--debug` - Log the parameter dump and write debug images
//! * `-o, --out-dir` - Directory for debug images
//! * `-t, --threads` - Size of the worker pool
//! * `--sequential` - Disable tile parallelism
//! * `--json` - Print results as JSON
//! * `<IMAGES>...` - Paths to input images to process
//!
//! # Example
//!
//! ```bash
//! RUST_LOG=info cargo run --example text_detection -- --debug -o out/ page1.png page2.png
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;
use textblock_detect::core::runtime;
use textblock_detect::prelude::*;
use tracing::{error, info, warn};

/// Command-line arguments for the text detection example
#[derive(Parser)]
#[command(name = "text_detection")]
#[command(about = "Text Detection Example - finds text regions in document images")]
struct Args {
    /// Paths to input images to process
    #[arg(required = true)]
    images: Vec<PathBuf>,

    /// JSON file with detector parameters; missing fields take their defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the effective parameters in wire format to this file
    #[arg(long)]
    parcel_out: Option<PathBuf>,

    /// Disable skew estimation and correction
    #[arg(long)]
    no_skew: bool,

    /// Log the parameter dump and write debug images
    #[arg(long)]
    debug: bool,

    /// Directory for debug images
    #[arg(short, long, env = "TEXTDETECT_OUT_DIR")]
    out_dir: Option<PathBuf>,

    /// Size of the worker pool (default: one thread per core)
    #[arg(short, long)]
    threads: Option<usize>,

    /// Disable tile parallelism
    #[arg(long)]
    sequential: bool,

    /// Print results as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing for logging
    textblock_detect::utils::init_tracing();

    let args = Args::parse();

    info!("Text Detection Example");

    let mut params = match &args.config {
        Some(path) => DetectorParameters::from_json_file(path)?,
        None => DetectorParameters::default(),
    };
    if args.no_skew {
        params.skew_enabled = false;
    }
    if args.debug {
        params.debug = true;
    }
    if let Some(dir) = &args.out_dir {
        params.out_dir = dir.to_string_lossy().into_owned();
    }

    if let Some(path) = &args.parcel_out {
        std::fs::write(path, params.to_parcel_bytes())?;
        info!("Wrote parameters to {}", path.display());
    }

    let policy = if args.sequential {
        ParallelPolicy::sequential()
    } else {
        ParallelPolicy::new().with_max_threads(args.threads)
    };
    let runtime = runtime::initialize(&policy)?;
    info!("Worker threads: {}", runtime.worker_threads);

    // Filter out non-existent image files and log errors for missing files
    let existing_images: Vec<PathBuf> = args
        .images
        .iter()
        .filter(|path| {
            let exists = path.exists();
            if !exists {
                error!("Image file not found: {}", path.display());
            }
            exists
        })
        .cloned()
        .collect();

    if existing_images.is_empty() {
        error!("No valid image files found");
        return Err("No valid image files found".into());
    }

    info!("Loading {} images...", existing_images.len());
    let images = load_images_batch(&existing_images)?;

    // The global pool is already sized; the engine only needs the switches.
    let mut detector = TextDetector::with_policy(params, policy.with_max_threads(None))?;
    let mut results = Vec::with_capacity(images.len());

    for (path, image) in existing_images.iter().zip(&images) {
        detector.set_source_image(image);
        let start = Instant::now();
        let result = detector.detect()?;
        let duration = start.elapsed();

        info!("\n=== {} ===", path.display());
        info!(
            "Detection completed in {:.2}ms ({}x{})",
            duration.as_secs_f64() * 1000.0,
            image.width(),
            image.height()
        );
        info!("Skew angle: {:.2} deg", result.skew_angle);
        info!("Total text regions detected: {}", result.len());

        if result.is_empty() {
            warn!("No text regions found in this image");
        }
        for (i, region) in result.regions.iter().enumerate() {
            let b = region.bbox;
            info!(
                "  Region #{}: ({}, {}) {}x{}, {} blobs, confidence {:.2}%",
                i + 1,
                b.x,
                b.y,
                b.width,
                b.height,
                region.blob_count,
                region.confidence * 100.0
            );
        }
        if args.debug {
            info!("{}", result.diagnostics);
        }

        if let Some(result) = detector.take_result() {
            results.push((path.display().to_string(), result));
        }
        detector.clear();
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    }

    Ok(())
}
