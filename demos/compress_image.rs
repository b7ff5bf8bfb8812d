// Compress an image at a fixed rank.
//
// Usage: compress_image <input> <output> <rank>
//
// The output may be a raster file or a `.npz` container holding the full
// factorization.

use std::env;
use std::error::Error;
use std::path::Path;

use svd_image_compression::ImageEngine;

fn main() {
    env_logger::init();

    if let Err(err) = run() {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}

fn usage() -> String {
    "Usage: compress_image <input> <output> <rank>".to_string()
}

fn run() -> Result<(), Box<dyn Error>> {
    let mut args = env::args().skip(1);
    let input = args.next().ok_or_else(usage)?;
    let output = args.next().ok_or_else(usage)?;
    let rank: i64 = args.next().ok_or_else(usage)?.parse()?;

    let mut engine = ImageEngine::new();
    let max_rank = engine.load(Path::new(&input))?;
    println!("Loaded {} with {} singular values per plane.", input, max_rank);

    engine.reconstruct(rank)?;

    let plane = &engine.planes()[0];
    println!(
        "Rank {} keeps {} of {} scalars per plane.",
        rank,
        plane.storage_len(rank as usize),
        plane.nrows() * plane.ncols()
    );

    match engine.save(Path::new(&output))? {
        Some(ratio) => println!("Saved {} (compression ratio {:.3}).", output, ratio),
        None => println!("Saved {}.", output),
    }

    Ok(())
}
