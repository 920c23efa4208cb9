//! term-rendr - CPU-based image to ANSI terminal art converter
//!
//! Converts a raster image into a terminal-renderable glyph grid: a
//! parallel box filter reduces the image to an 8× sub-pixel grid per
//! character cell, then a glyph search picks, per cell, the Unicode block
//! element and foreground/background color pair minimizing squared error
//! against that cell's sub-pixels.
//!
//! # Example
//! ```no_run
//! use term_rendr::{render_image, Charset, RenderConfig, SourceImage, TaskSystem};
//!
//! let img = SourceImage::load("photo.jpg").unwrap();
//! let pool = TaskSystem::new(0);
//! pool.preheat();
//! let config = RenderConfig {
//!     out_w: 80,
//!     out_h: 24,
//!     charset: Charset::High,
//!     ..Default::default()
//! };
//! print!("{}", render_image(&img, &config, &pool));
//! ```

pub mod config;
pub mod glyph;
pub mod loader;
pub mod processor;
pub mod render;
pub mod resample;
pub mod task;

// Re-export main types for convenience
pub use config::{Charset, RenderConfig};
pub use loader::{LoadError, SourceImage};
pub use processor::{derive_char_height, render_image};
pub use render::{PruneStats, render_high, render_low};
pub use resample::{BlockPlanes, resample_to_planes};
pub use task::{TaskHandle, TaskSystem};
