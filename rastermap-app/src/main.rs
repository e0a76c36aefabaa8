use anyhow::{bail, Context};
use rastermap::{MapOptions, RasterMap};
use std::time::Duration;

const USAGE: &str = "usage: rastermap-app <config.json> <output.png> [max-frames]";
const FRAME_INTERVAL: Duration = Duration::from_millis(50);
const DEFAULT_MAX_FRAMES: u32 = 400;

/// Draw frames until every cell shows its exact tile, then save the canvas
fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (config, output) = match args.as_slice() {
        [config, output, ..] => (config, output),
        _ => bail!(USAGE),
    };
    let max_frames = match args.get(2) {
        Some(frames) => frames
            .parse::<u32>()
            .with_context(|| format!("invalid frame count {frames:?}"))?,
        None => DEFAULT_MAX_FRAMES,
    };

    let options = MapOptions::from_path(config)
        .with_context(|| format!("failed to read map options from {config}"))?;
    let mut map = RasterMap::new(options).context("failed to build map")?;

    let mut frames = 0;
    while map.loaded() < 1.0 && frames < max_frames {
        if map.draw_tiles() {
            log::debug!("frame {}: {:.0}% loaded", frames, map.loaded() * 100.0);
        }
        frames += 1;
        std::thread::sleep(FRAME_INTERVAL);
    }

    let stats = map.cache_stats();
    if map.loaded() < 1.0 {
        log::warn!(
            "stopped after {} frames at {:.0}% ({} failed, {} pending)",
            frames,
            map.loaded() * 100.0,
            stats.failed,
            stats.requested
        );
    } else {
        log::info!("map complete after {} frames, {} tiles cached", frames, stats.total());
    }

    map.save_png(output)
        .with_context(|| format!("failed to write {output}"))?;
    println!("{output}");
    Ok(())
}
