//! Tile preloader: warms an imagery cache from a directory of image files
//! and reports cache and retrieval statistics.
//!
//! Usage: cargo run --release --bin preload_tiles -- --dir <DIR> [OPTIONS]
//!
//! Options:
//!   --dir <DIR>          Directory of tile images (required)
//!   --config <FILE>      Engine config JSON (default: built-in defaults)
//!   --capacity-mb <MB>   Override the cache budget
//!   --passes <N>         Retrieval passes over the tile set (default: 2)
//!   --timeout <SECS>     Give up on a pass after this long (default: 30)
//!   --write-config <F>   Write the effective config to F and exit

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use image::RgbaImage;

use tessera::core::{logging, EngineConfig};
use tessera::retrieval::{ImageFileFetcher, RedrawFlag, ResourceSource, RetrievalCoordinator};

fn main() {
    logging::try_init_timestamped();

    let args: Vec<String> = std::env::args().collect();
    let Some(dir) = parse_str_arg(&args, "--dir").map(PathBuf::from) else {
        eprintln!("usage: preload_tiles --dir <DIR> [--config <FILE>] [--capacity-mb <MB>] [--passes <N>]");
        std::process::exit(2);
    };
    let passes = parse_usize_arg(&args, "--passes").unwrap_or(2).max(1);
    let timeout = Duration::from_secs(parse_usize_arg(&args, "--timeout").unwrap_or(30) as u64);

    let mut config = match parse_str_arg(&args, "--config") {
        Some(path) => match EngineConfig::load_sync(Path::new(&path)) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load config {}: {}", path, e);
                std::process::exit(1);
            }
        },
        None => EngineConfig::default(),
    };
    if let Some(mb) = parse_usize_arg(&args, "--capacity-mb") {
        config.cache.capacity_bytes = mb * 1024 * 1024;
    }

    if let Some(path) = parse_str_arg(&args, "--write-config") {
        if let Err(e) = config.save_sync(Path::new(&path)) {
            eprintln!("Failed to write config {}: {}", path, e);
            std::process::exit(1);
        }
        println!("Config written to {}", path);
        return;
    }

    let tiles = match list_tiles(&dir) {
        Ok(tiles) => tiles,
        Err(e) => {
            eprintln!("Failed to read {}: {}", dir.display(), e);
            std::process::exit(1);
        }
    };

    println!("=== Tessera Tile Preloader ===");
    println!("Directory: {}", dir.display());
    println!("Tiles:     {}", tiles.len());
    println!("Budget:    {}MB", config.cache.capacity_bytes / 1024 / 1024);
    println!("In flight: {} local, {} remote", config.retrieval.max_local_in_flight, config.retrieval.max_remote_in_flight);
    println!();

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to start runtime: {}", e);
            std::process::exit(1);
        }
    };

    let redraw = Arc::new(RedrawFlag::new());
    log::info!("Preloading {} tiles over {} passes", tiles.len(), passes);
    let mut coordinator: RetrievalCoordinator<String, Arc<RgbaImage>> = RetrievalCoordinator::from_config(
        "imagery",
        &config,
        Arc::new(ImageFileFetcher::with_root(&dir)),
        redraw.clone(),
        runtime.handle().clone(),
    );

    let start = Instant::now();
    for pass in 1..=passes {
        let pass_start = Instant::now();
        let mut pending = tiles.clone();

        // Keep asking until every tile is either resident or marked absent,
        // the way a renderer would across frames
        while !pending.is_empty() {
            pending.retain(|name| {
                let source = ResourceSource::from_location(name);
                coordinator.retrieve(name, source).is_none() && !coordinator.is_absent(name)
            });
            coordinator.advance_frame();
            if pending.is_empty() {
                break;
            }
            // Tiles larger than the whole budget never become resident
            if pass_start.elapsed() > timeout {
                log::warn!("Pass {} timed out with {} tiles unresolved", pass, pending.len());
                break;
            }
            std::thread::sleep(Duration::from_millis(2));
        }

        let released = coordinator.cache().release_queue().release_all();
        println!(
            "Pass {}: {} tiles in {:.1}ms, {} released",
            pass,
            tiles.len(),
            pass_start.elapsed().as_secs_f64() * 1000.0,
            released.released
        );
    }

    let cache_stats = coordinator.cache().stats();
    let stats = coordinator.stats();
    println!();
    println!("=== Summary ===");
    println!("Elapsed:   {:.2}s", start.elapsed().as_secs_f64());
    println!("Resident:  {} tiles, {:.1}MB", coordinator.cache().len(), coordinator.cache().used() as f64 / 1024.0 / 1024.0);
    println!("Hit rate:  {:.1}% ({} hits, {} misses)", cache_stats.hit_rate() * 100.0, cache_stats.hits, cache_stats.misses);
    println!("Evictions: {} ({} rejected as oversized)", cache_stats.evictions, cache_stats.rejected);
    println!("Fetches:   {} started, {} ok, {} failed, {} deferred", stats.started, stats.succeeded, stats.failed, stats.deferred);
    println!("Absent:    {}", coordinator.absence().len());
    println!("Redraws:   {}", redraw.request_count());
}

/// Image files directly under `dir`, as names relative to it, sorted
fn list_tiles(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut tiles = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_image = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| matches!(e.to_ascii_lowercase().as_str(), "png" | "jpg" | "jpeg"));
        if !is_image {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            tiles.push(name.to_string());
        }
    }
    tiles.sort();
    Ok(tiles)
}

fn parse_str_arg(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn parse_usize_arg(args: &[String], flag: &str) -> Option<usize> {
    parse_str_arg(args, flag).and_then(|s| s.parse().ok())
}
