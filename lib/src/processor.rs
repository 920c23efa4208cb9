use crate::config::{Charset, RenderConfig};
use crate::glyph::{CELL_H, CELL_W};
use crate::loader::SourceImage;
use crate::render::{render_high, render_low};
use crate::resample::resample_to_planes;
use crate::task::TaskSystem;
use log::info;
use std::time::Instant;

/// Converts a decoded image into an ANSI-colored text buffer
///
/// This runs the full pipeline:
/// 1. Box-filter the image down to an 8× sub-pixel grid
///    (`out_w*8` × `out_h*8`)
/// 2. Render the grid with the configured charset: flat background colors
///    (`Low`) or the block-glyph search (`High`)
///
/// The task pool is a shared service; create it once (ideally preheated)
/// and reuse it across calls.
///
/// # Arguments
/// * `img` - The decoded source image
/// * `config` - Conversion parameters (validated on entry)
/// * `pool` - Worker pool used by the resampler and the high renderer
///
/// # Returns
/// The rendered text, one `\n`-terminated line per character row
pub fn render_image(img: &SourceImage, config: &RenderConfig, pool: &TaskSystem) -> String {
    // Validate config
    config.validate().expect("Invalid configuration");

    let sw = Instant::now();
    let planes = resample_to_planes(
        img,
        config.out_w * CELL_W,
        config.out_h * CELL_H,
        pool,
        config.tile_h,
    );
    info!("Resample completed in {}us", sw.elapsed().as_micros());

    let sw = Instant::now();
    let rendered = match config.charset {
        Charset::Low => render_low(&planes, config.out_w, config.out_h),
        Charset::High => render_high(
            &planes,
            config.out_w,
            config.out_h,
            pool,
            config.prune_threshold,
            None,
            false,
        ),
    };
    info!(
        "render_{:?} completed in {}us",
        config.charset,
        sw.elapsed().as_micros()
    );
    rendered
}

/// Derives the output character height from the image aspect ratio
///
/// Assumes a character cell roughly twice as tall as it is wide (aspect
/// 0.5), which holds for most terminal fonts.
pub fn derive_char_height(img: &SourceImage, out_w: usize) -> usize {
    if img.width == 0 {
        return 1;
    }
    let aspect = 0.5;
    let derived = (img.height as f64 * out_w as f64 * aspect / img.width as f64).round();
    (derived as usize).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker_image(w: usize, h: usize) -> SourceImage {
        let mut pixels = Vec::with_capacity(w * h * 3);
        for y in 0..h {
            for x in 0..w {
                let on = (x / 8 + y / 8) % 2 == 0;
                let v = if on { 230 } else { 20 };
                pixels.extend_from_slice(&[v, v, v]);
            }
        }
        SourceImage::from_rgb(w, h, pixels)
    }

    #[test]
    fn test_low_pipeline_line_count() {
        let pool = TaskSystem::new(2);
        let img = checker_image(96, 64);
        let config = RenderConfig { out_w: 12, out_h: 8, ..Default::default() };
        let out = render_image(&img, &config, &pool);
        assert_eq!(out.lines().count(), 8);
        assert!(out.contains("\x1b[48;2;"));
    }

    #[test]
    fn test_high_pipeline_line_count() {
        let pool = TaskSystem::new(2);
        let img = checker_image(96, 64);
        let config = RenderConfig {
            out_w: 12,
            out_h: 8,
            charset: Charset::High,
            ..Default::default()
        };
        let out = render_image(&img, &config, &pool);
        assert_eq!(out.lines().count(), 8);
        assert!(out.contains("\x1b[38;2;"));
    }

    #[test]
    fn test_pipeline_is_deterministic() {
        let img = checker_image(120, 90);
        let config = RenderConfig {
            out_w: 16,
            out_h: 9,
            charset: Charset::High,
            ..Default::default()
        };
        let pool1 = TaskSystem::new(1);
        let pool3 = TaskSystem::new(3);
        let a = render_image(&img, &config, &pool1);
        let b = render_image(&img, &config, &pool3);
        assert_eq!(a, b);
    }

    #[test]
    #[should_panic(expected = "Invalid configuration")]
    fn test_invalid_config_panics() {
        let pool = TaskSystem::new(1);
        let img = checker_image(16, 16);
        let config = RenderConfig::default(); // out_h still 0
        render_image(&img, &config, &pool);
    }

    #[test]
    fn test_derive_char_height() {
        let img = checker_image(200, 100);
        // 100 * 80 * 0.5 / 200 = 20
        assert_eq!(derive_char_height(&img, 80), 20);
        let tall = checker_image(50, 400);
        assert!(derive_char_height(&tall, 10) >= 1);
    }
}
