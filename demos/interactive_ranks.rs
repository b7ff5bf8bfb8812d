// Simulate a rank slider being dragged over a synthetic image.
//
// Usage: interactive_ranks [output.png]
//
// Requests are issued faster than they can be served. Only the last one
// becomes visible.

use std::env;
use std::error::Error;
use std::io::Cursor;
use std::path::PathBuf;
use std::time::Duration;

use image::ImageFormat;
use rand::rngs::StdRng;
use rand::SeedableRng;
use svd_image_compression::{
    random_image, CoordinatorConfig, ImageEngine, PixelBuffer, RasterFormat,
    RecomputeCoordinator,
};

fn main() {
    env_logger::init();

    if let Err(err) = run() {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let output = env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("interactive_ranks.png"));

    let mut rng = StdRng::seed_from_u64(7);
    let pixels = PixelBuffer::new(random_image((300, 400, 3), 40.0, &mut rng))?;
    let mut bytes = Vec::new();
    pixels
        .to_dynamic_image()?
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;

    let mut engine = ImageEngine::new();
    let format = RasterFormat::from_extension("png").ok_or("png is not supported")?;
    let max_rank = engine.load_from_raster(&bytes, format)?;

    let coordinator = RecomputeCoordinator::new(engine, &CoordinatorConfig::default())?;
    println!(
        "Dragging over {} ranks with {} workers.",
        max_rank,
        coordinator.worker_count()
    );

    let mut last = 0;
    for rank in (5..max_rank as i64).rev().step_by(7) {
        last = coordinator.request(rank)?;
    }

    loop {
        let completion = coordinator
            .completions()
            .recv_timeout(Duration::from_secs(60))?;
        println!(
            "Generation {} at rank {} completed.",
            completion.generation, completion.rank
        );
        completion.outcome?;
        if completion.generation == last {
            break;
        }
    }

    coordinator.save(&output)?;
    println!("Saved {}.", output.display());

    Ok(())
}
