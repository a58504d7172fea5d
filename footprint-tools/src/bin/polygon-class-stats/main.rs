use rayon::prelude::*;

use clap::*;

use anyhow::Context;
use footprint::prelude::*;
use footprint::Result;
use footprint_tools::{cli::args::parse_opt, cli::init_logging, cli::unwrap_or_exit, utils::*, *};
use tracing::info;

mod outputs;
use outputs::StatsOutput;

// Main function
footprint_tools::sync_main!(run());

fn run() -> Result<()> {
    // Parse command line
    let args = parse_cmd_line();
    init_logging();
    if let Some(threads) = args.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("configuring worker threads")?;
    }

    // Read inputs
    let ds = read_dataset(&args.input)?;
    let raster = GeometryOnly(read_geometry(&ds).context("input")?);
    let mask = match &args.mask {
        Some(path) => Some(read_mask(&read_dataset(path)?, 1)?),
        None => None,
    };
    let layer = read_vector_layer(&read_dataset(&args.vector)?, args.layer.as_deref())?;

    // Configure engine
    let mut builder = FootprintBuilder::new()
        .with_raster(&raster)
        .with_layer(&layer)
        .with_class_field(args.class_field.as_str());
    if let Some(mask) = &mask {
        builder = builder.with_mask(mask);
    }
    if let Some(seed) = args.seed {
        builder = builder.with_seed(seed);
    }
    let mut engine = builder.build()?;
    let seed = engine.seed();

    // Calculate tiles
    let mut tiles_cfg = TileConfig::for_dataset(&ds, Some([1]))?;
    if let Some(width) = args.tile_width {
        tiles_cfg = tiles_cfg.with_tile_width(width);
    }
    let tiles = tiles_cfg.with_min_tile_size(args.chunk_size).tiles();

    // Process tiles, round-robin over the workers
    let workers = rayon::current_num_threads();
    engine.reset(workers)?;
    {
        let tracker = Tracker::new(tiles.len());
        let (join, partials) = engine.workers()?;
        partials.par_iter_mut().enumerate().for_each(|(w, stats)| {
            for tile in tiles.iter().skip(w).step_by(workers) {
                let skipped = stats.skipped().count();
                join.process_tile(tile, stats);
                tracker.add_skipped(stats.skipped().count() - skipped);
                tracker.increment();
            }
        });
    }

    let stats = engine.synthetize()?;
    info!(
        pixels = stats.global_count(),
        skipped = stats.skipped_features().len(),
        "statistics synthetized"
    );

    let output = StatsOutput {
        input: &args.input,
        vector: &args.vector,
        class_field: &args.class_field,
        seed,
        tiles: tiles.len(),
        statistics: stats,
    };
    match &args.output {
        Some(path) => write_json(path, &output),
        None => print_json(&output),
    }
}

use std::path::PathBuf;
/// Program arguments
pub struct Args {
    /// Input raster
    input: PathBuf,
    /// Polygons (vector dataset)
    vector: PathBuf,
    /// Layer of the vector dataset
    layer: Option<String>,
    /// Validity mask (raster dataset)
    mask: Option<PathBuf>,
    /// Field holding the class code
    class_field: String,
    /// Minimum number of pixels per tile
    chunk_size: usize,
    /// Tile width (default: raster width)
    tile_width: Option<usize>,
    /// Number of worker threads
    threads: Option<usize>,
    /// Sampling seed
    seed: Option<u64>,
    /// Output path; stdout if absent
    output: Option<PathBuf>,
}

fn parse_cmd_line() -> Args {
    let matches = args_parser!("polygon-class-stats")
        .about("Count raster pixels per class and per polygon of a vector layer.")
        .arg(
            arg!("input")
                .required(true)
                .help("Input path (raster dataset)"),
        )
        .arg(
            arg!("vector")
                .required(true)
                .help("Polygons path (vector dataset)"),
        )
        .arg(opt!("layer").help("Layer name (default: first layer)"))
        .arg(
            opt!("mask")
                .short("m")
                .help("Mask path (raster dataset); non-zero pixels are counted"),
        )
        .arg(
            opt!("class field")
                .short("f")
                .help("Field holding the class code (default: class)"),
        )
        .arg(
            opt!("chunk size")
                .short("c")
                .help("Tile size (default: 64k pixels)"),
        )
        .arg(opt!("tile width").help("Tile width (default: raster width)"))
        .arg(
            opt!("threads")
                .short("j")
                .help("Number of worker threads (default: number of cpus)"),
        )
        .arg(opt!("seed").help("Sampling seed (default: random)"))
        .arg(
            opt!("output")
                .short("o")
                .help("Output path (json); prints to stdout if absent"),
        )
        .get_matches();

    let input = value_t!(matches, "input", PathBuf).unwrap_or_else(|e| e.exit());
    let vector = value_t!(matches, "vector", PathBuf).unwrap_or_else(|e| e.exit());
    let class_field = matches.value_of("class field").unwrap_or("class").to_owned();

    Args {
        input,
        vector,
        layer: matches.value_of("layer").map(str::to_owned),
        mask: matches.value_of("mask").map(PathBuf::from),
        class_field,
        chunk_size: unwrap_or_exit(parse_opt(&matches, "chunk size")).unwrap_or(0x10000),
        tile_width: unwrap_or_exit(parse_opt(&matches, "tile width")),
        threads: unwrap_or_exit(parse_opt(&matches, "threads")),
        seed: unwrap_or_exit(parse_opt(&matches, "seed")),
        output: matches.value_of("output").map(PathBuf::from),
    }
}
