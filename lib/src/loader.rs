//! Source image acquisition
//!
//! Decoding is delegated to the `image` crate; everything downstream works
//! on a plain row-major interleaved RGB byte buffer with channels forced
//! to 3.

use std::path::Path;
use std::sync::Arc;

/// Error produced while acquiring the source image
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to load image: {0}")]
    Image(#[from] image::ImageError),
}

/// A decoded image, immutable once loaded
///
/// The pixel buffer is row-major RGBRGB... and reference-counted so it can
/// be shared into pool tasks without copying.
#[derive(Clone, Debug)]
pub struct SourceImage {
    pub width: usize,
    pub height: usize,
    pub channels: usize,
    pub pixels: Arc<[u8]>,
}

impl SourceImage {
    /// Decodes the image at `path`, converting to 3-channel RGB
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
        let rgb = image::open(path)?.to_rgb8();
        let (width, height) = rgb.dimensions();
        Ok(Self {
            width: width as usize,
            height: height as usize,
            channels: 3,
            pixels: rgb.into_raw().into(),
        })
    }

    /// Wraps an in-memory interleaved RGB buffer
    ///
    /// The buffer length must be `width * height * 3`.
    pub fn from_rgb(width: usize, height: usize, pixels: Vec<u8>) -> Self {
        assert_eq!(pixels.len(), width * height * 3, "buffer size mismatch");
        Self {
            width,
            height,
            channels: 3,
            pixels: pixels.into(),
        }
    }
}
