use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::info;
use term_rendr::{
    Charset, PruneStats, RenderConfig, SourceImage, TaskSystem, derive_char_height, render_high,
    render_image, resample_to_planes,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Convert an image to ANSI-colored Unicode block art")]
struct Cli {
    /// Input image path
    input: PathBuf,

    /// Output width in character cells
    #[arg(short, long, default_value_t = 80)]
    width: usize,

    /// Output height in character cells (0 = derive from the image aspect)
    #[arg(long, default_value_t = 0)]
    height: usize,

    /// Rendering mode
    #[arg(short = 's', long, value_enum, default_value = "low")]
    charset: CharsetArg,

    /// Tile height (rows) used for tile-based resampling
    #[arg(short = 'T', long, default_value_t = 64)]
    tile_height: usize,

    /// Prune threshold for the glyph search (sum of per-channel mean
    /// color differences)
    #[arg(short = 'p', long, default_value_t = 24)]
    prune: u32,

    /// Worker threads (0 = hardware parallelism - 1)
    #[arg(long, default_value_t = 0)]
    threads: usize,

    /// Output file (stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Collect and print glyph-search pruning statistics
    #[arg(long, default_value_t = false)]
    stats: bool,

    /// Run the high-fidelity search without assembling output, for
    /// measuring search cost in isolation
    #[arg(long, default_value_t = false)]
    measure_only: bool,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum CharsetArg {
    Low,
    High,
}

impl From<CharsetArg> for Charset {
    fn from(value: CharsetArg) -> Self {
        match value {
            CharsetArg::Low => Charset::Low,
            CharsetArg::High => Charset::High,
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    info!("Program started. Input: {}", cli.input.display());

    let img = SourceImage::load(&cli.input)
        .with_context(|| format!("failed to load {}", cli.input.display()))?;

    let out_w = cli.width.max(1);
    let out_h = if cli.height == 0 {
        derive_char_height(&img, out_w)
    } else {
        cli.height
    };

    let config = RenderConfig {
        out_w,
        out_h,
        charset: cli.charset.into(),
        tile_h: cli.tile_height,
        prune_threshold: cli.prune,
    };
    config.validate().map_err(anyhow::Error::msg)?;

    // Spawn the pool before any heavy work so thread creation overlaps
    // nothing latency-sensitive
    let pool = TaskSystem::new(cli.threads);
    pool.preheat();

    let rendered = if cli.stats || cli.measure_only {
        render_with_stats(&img, &config, &pool, cli.measure_only)
    } else {
        render_image(&img, &config, &pool)
    };

    match &cli.output {
        None => {
            io::stdout()
                .write_all(rendered.as_bytes())
                .context("failed to write to stdout")?;
        }
        Some(path) => {
            let mut file = File::create(path)
                .with_context(|| format!("failed to open output file {}", path.display()))?;
            file.write_all(rendered.as_bytes())
                .with_context(|| format!("failed to write {}", path.display()))?;
        }
    }

    Ok(())
}

/// Variant of the pipeline that forces the high renderer and reports its
/// pruning counters
fn render_with_stats(
    img: &SourceImage,
    config: &RenderConfig,
    pool: &TaskSystem,
    measure_only: bool,
) -> String {
    use term_rendr::glyph::{CELL_H, CELL_W};

    let planes = resample_to_planes(
        img,
        config.out_w * CELL_W,
        config.out_h * CELL_H,
        pool,
        config.tile_h,
    );
    let stats = Arc::new(PruneStats::new());
    let rendered = render_high(
        &planes,
        config.out_w,
        config.out_h,
        pool,
        config.prune_threshold,
        Some(Arc::clone(&stats)),
        measure_only,
    );

    let considered = stats.candidates_considered.load(Ordering::Relaxed);
    let skipped = stats.candidates_skipped.load(Ordering::Relaxed);
    eprintln!(
        "cells={} considered={} skipped={} ({:.1}%) evaluations={} prune_check={}us eval={}us",
        stats.total_cells.load(Ordering::Relaxed),
        considered,
        skipped,
        if considered > 0 { 100.0 * skipped as f64 / considered as f64 } else { 0.0 },
        stats.evaluations.load(Ordering::Relaxed),
        stats.prune_check_us.load(Ordering::Relaxed),
        stats.eval_us.load(Ordering::Relaxed),
    );
    rendered
}
