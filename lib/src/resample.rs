//! Parallel box-filter resampler
//!
//! Reduces an arbitrary-resolution RGB image to a structure-of-arrays grid
//! of averaged colors in three passes: channel planarize, horizontal box
//! sum, vertical box sum. Each pass is split into row tiles distributed
//! across the task pool; tiles write disjoint regions and are concatenated
//! in submission order, so the result is deterministic for any pool size.

use crate::loader::SourceImage;
use crate::task::TaskSystem;
use log::info;
use std::sync::Arc;
use std::time::Instant;

/// Resampled sub-pixel grid in structure-of-arrays layout
///
/// `width`/`height` are grid dimensions, conventionally `out_chars_w*8` ×
/// `out_chars_h*8` for sub-pixel sampling. All three planes have length
/// `width * height`; index `y*width + x` addresses cell `(x, y)`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BlockPlanes {
    pub width: usize,
    pub height: usize,
    pub r: Vec<u8>,
    pub g: Vec<u8>,
    pub b: Vec<u8>,
}

impl BlockPlanes {
    fn empty() -> Self {
        Self::default()
    }
}

/// Maximal span of output columns sharing the same source-span length
///
/// Used to batch near-identical box sums in the horizontal pass.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct Run {
    start: usize,
    end: usize, // exclusive
    len: usize, // source pixels per column
}

/// Source range `[x0, x1)` for every output position along one axis
///
/// Linear scaling with floor/ceil, clamped to the source bounds.
fn axis_ranges(src: usize, out: usize) -> (Vec<usize>, Vec<usize>) {
    let mut lo = Vec::with_capacity(out);
    let mut hi = Vec::with_capacity(out);
    for b in 0..out {
        let x0 = ((b as f64) * src as f64 / out as f64).floor() as usize;
        let x1 = (((b + 1) as f64) * src as f64 / out as f64).ceil() as usize;
        lo.push(x0.min(src));
        hi.push(x1.min(src));
    }
    (lo, hi)
}

/// Groups adjacent equal-length output columns into runs
fn build_runs(lo: &[usize], hi: &[usize]) -> Vec<Run> {
    let mut runs = Vec::new();
    if lo.is_empty() {
        return runs;
    }
    let mut run_start = 0;
    let mut cur_len = hi[0] - lo[0];
    for b in 1..=lo.len() {
        let len = if b == lo.len() { usize::MAX } else { hi[b] - lo[b] };
        if len != cur_len {
            runs.push(Run { start: run_start, end: b, len: cur_len });
            run_start = b;
            cur_len = len;
        }
    }
    runs
}

fn sum_span(row: &[u8], start: usize, len: usize) -> u32 {
    row[start..start + len].iter().map(|&v| v as u32).sum()
}

/// Sums two equal-length spans of the same row in one pass
fn sum_span_pair(row: &[u8], off0: usize, off1: usize, len: usize) -> (u32, u32) {
    let a = &row[off0..off0 + len];
    let b = &row[off1..off1 + len];
    let mut s0 = 0u32;
    let mut s1 = 0u32;
    for i in 0..len {
        s0 += a[i] as u32;
        s1 += b[i] as u32;
    }
    (s0, s1)
}

/// Per-channel planar buffers for the source image
struct Planes {
    r: Arc<[u8]>,
    g: Arc<[u8]>,
    b: Arc<[u8]>,
}

/// Splits interleaved RGB into three planar buffers, one row tile per task
fn planarize(img: &SourceImage, pool: &TaskSystem, tile_h: usize) -> Planes {
    let (w, h, channels) = (img.width, img.height, img.channels);
    let chunks = h.div_ceil(tile_h);
    let mut handles = Vec::with_capacity(chunks);
    for c in 0..chunks {
        let y0 = c * tile_h;
        let y1 = h.min(y0 + tile_h);
        let pixels = Arc::clone(&img.pixels);
        handles.push(pool.submit_with_result(move || {
            let rows = y1 - y0;
            let mut r = Vec::with_capacity(rows * w);
            let mut g = Vec::with_capacity(rows * w);
            let mut b = Vec::with_capacity(rows * w);
            for y in y0..y1 {
                let src = &pixels[y * w * channels..(y + 1) * w * channels];
                for x in 0..w {
                    r.push(src[x * channels]);
                    g.push(src[x * channels + 1]);
                    b.push(src[x * channels + 2]);
                }
            }
            (r, g, b)
        }));
    }

    let mut r = Vec::with_capacity(w * h);
    let mut g = Vec::with_capacity(w * h);
    let mut b = Vec::with_capacity(w * h);
    for handle in handles {
        let (cr, cg, cb) = handle.wait();
        r.extend_from_slice(&cr);
        g.extend_from_slice(&cg);
        b.extend_from_slice(&cb);
    }
    Planes { r: r.into(), g: g.into(), b: b.into() }
}

/// Per-row horizontal box sums at output-column resolution
struct HorizSums {
    r: Arc<[u32]>,
    g: Arc<[u32]>,
    b: Arc<[u32]>,
}

/// Sums each row's channel values over every output column's source range
///
/// Runs are processed two columns at a time with a scalar single-column
/// remainder, halving loop overhead for equal-length spans.
fn horizontal_box_sum(
    planes: &Planes,
    w: usize,
    h: usize,
    out_w: usize,
    x0s: &Arc<[usize]>,
    runs: &Arc<[Run]>,
    pool: &TaskSystem,
    tile_rows: usize,
) -> HorizSums {
    let chunks = h.div_ceil(tile_rows);
    let mut handles = Vec::with_capacity(chunks);
    for c in 0..chunks {
        let y0 = c * tile_rows;
        let y1 = h.min(y0 + tile_rows);
        let pr = Arc::clone(&planes.r);
        let pg = Arc::clone(&planes.g);
        let pb = Arc::clone(&planes.b);
        let x0s = Arc::clone(x0s);
        let runs = Arc::clone(runs);
        handles.push(pool.submit_with_result(move || {
            let rows = y1 - y0;
            let mut hr = vec![0u32; rows * out_w];
            let mut hg = vec![0u32; rows * out_w];
            let mut hb = vec![0u32; rows * out_w];
            for y in y0..y1 {
                let row_r = &pr[y * w..(y + 1) * w];
                let row_g = &pg[y * w..(y + 1) * w];
                let row_b = &pb[y * w..(y + 1) * w];
                let base = (y - y0) * out_w;
                for run in runs.iter() {
                    let len = run.len;
                    let mut bx = run.start;
                    while bx + 1 < run.end {
                        let (r0, r1) = sum_span_pair(row_r, x0s[bx], x0s[bx + 1], len);
                        let (g0, g1) = sum_span_pair(row_g, x0s[bx], x0s[bx + 1], len);
                        let (b0, b1) = sum_span_pair(row_b, x0s[bx], x0s[bx + 1], len);
                        hr[base + bx] = r0;
                        hr[base + bx + 1] = r1;
                        hg[base + bx] = g0;
                        hg[base + bx + 1] = g1;
                        hb[base + bx] = b0;
                        hb[base + bx + 1] = b1;
                        bx += 2;
                    }
                    if bx < run.end {
                        hr[base + bx] = sum_span(row_r, x0s[bx], len);
                        hg[base + bx] = sum_span(row_g, x0s[bx], len);
                        hb[base + bx] = sum_span(row_b, x0s[bx], len);
                    }
                }
            }
            (hr, hg, hb)
        }));
    }

    let mut r = Vec::with_capacity(h * out_w);
    let mut g = Vec::with_capacity(h * out_w);
    let mut b = Vec::with_capacity(h * out_w);
    for handle in handles {
        let (cr, cg, cb) = handle.wait();
        r.extend_from_slice(&cr);
        g.extend_from_slice(&cg);
        b.extend_from_slice(&cb);
    }
    HorizSums { r: r.into(), g: g.into(), b: b.into() }
}

/// Resamples the image to an `out_w` × `out_h` grid of averaged colors
///
/// Averaging is an unweighted box filter with truncating integer division.
/// A degenerate source (zero width or height) yields the empty grid.
pub fn resample_to_planes(
    img: &SourceImage,
    out_w: usize,
    out_h: usize,
    pool: &TaskSystem,
    tile_h: usize,
) -> BlockPlanes {
    if img.width == 0 || img.height == 0 {
        return BlockPlanes::empty();
    }

    let total = Instant::now();
    let tile_h = if tile_h == 0 { 64 } else { tile_h }.min(img.height).max(1);

    // Precompute per-axis source ranges once, instead of a floor/ceil pair
    // per cell
    let (x0s, x1s) = axis_ranges(img.width, out_w);
    let runs = build_runs(&x0s, &x1s);
    let (y0s, y1s) = axis_ranges(img.height, out_h);
    let x0s: Arc<[usize]> = x0s.into();
    let x1s: Arc<[usize]> = x1s.into();
    let y0s: Arc<[usize]> = y0s.into();
    let y1s: Arc<[usize]> = y1s.into();
    let runs: Arc<[Run]> = runs.into();

    let sw = Instant::now();
    let planes = planarize(img, pool, tile_h);
    info!(
        "Flatten to planes completed in {}us (tile_h={tile_h})",
        sw.elapsed().as_micros()
    );

    // The horizontal pass does more work per row, so give it taller tiles
    let tile_h_horiz = (tile_h * 4).min(img.height);
    let sw = Instant::now();
    let sums = horizontal_box_sum(
        &planes, img.width, img.height, out_w, &x0s, &runs, pool, tile_h_horiz,
    );
    info!(
        "Horizontal pass completed in {}us (tile_h_horiz={tile_h_horiz})",
        sw.elapsed().as_micros()
    );

    let sw = Instant::now();
    let tile_rows = tile_h.min(out_h).max(1);
    let chunks = out_h.div_ceil(tile_rows);
    let mut handles = Vec::with_capacity(chunks);
    for c in 0..chunks {
        let by0 = c * tile_rows;
        let by1 = out_h.min(by0 + tile_rows);
        let hr = Arc::clone(&sums.r);
        let hg = Arc::clone(&sums.g);
        let hb = Arc::clone(&sums.b);
        let x0s = Arc::clone(&x0s);
        let x1s = Arc::clone(&x1s);
        let y0s = Arc::clone(&y0s);
        let y1s = Arc::clone(&y1s);
        handles.push(pool.submit_with_result(move || {
            let rows = by1 - by0;
            let mut r = Vec::with_capacity(rows * out_w);
            let mut g = Vec::with_capacity(rows * out_w);
            let mut b = Vec::with_capacity(rows * out_w);
            for by in by0..by1 {
                let y0 = y0s[by];
                let y1 = y1s[by];
                for bx in 0..out_w {
                    let count = (((x1s[bx] - x0s[bx]) * (y1 - y0)) as u64).max(1);
                    let mut rsum = 0u64;
                    let mut gsum = 0u64;
                    let mut bsum = 0u64;
                    for sy in y0..y1 {
                        let idx = sy * out_w + bx;
                        rsum += hr[idx] as u64;
                        gsum += hg[idx] as u64;
                        bsum += hb[idx] as u64;
                    }
                    r.push((rsum / count) as u8);
                    g.push((gsum / count) as u8);
                    b.push((bsum / count) as u8);
                }
            }
            (r, g, b)
        }));
    }

    let mut out = BlockPlanes {
        width: out_w,
        height: out_h,
        r: Vec::with_capacity(out_w * out_h),
        g: Vec::with_capacity(out_w * out_h),
        b: Vec::with_capacity(out_w * out_h),
    };
    for handle in handles {
        let (cr, cg, cb) = handle.wait();
        out.r.extend_from_slice(&cr);
        out.g.extend_from_slice(&cg);
        out.b.extend_from_slice(&cb);
    }
    info!(
        "Sampling (vertical box) completed in {}us (tile_rows={tile_rows})",
        sw.elapsed().as_micros()
    );
    info!("Resample total time: {}us", total.elapsed().as_micros());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_image(w: usize, h: usize, rgb: [u8; 3]) -> SourceImage {
        let mut pixels = Vec::with_capacity(w * h * 3);
        for _ in 0..w * h {
            pixels.extend_from_slice(&rgb);
        }
        SourceImage::from_rgb(w, h, pixels)
    }

    fn gradient_image(w: usize, h: usize) -> SourceImage {
        let mut pixels = Vec::with_capacity(w * h * 3);
        for y in 0..h {
            for x in 0..w {
                pixels.push((x * 7 % 256) as u8);
                pixels.push((y * 11 % 256) as u8);
                pixels.push(((x + y) * 3 % 256) as u8);
            }
        }
        SourceImage::from_rgb(w, h, pixels)
    }

    /// Straightforward single-threaded box average for cross-checking
    fn naive_resample(img: &SourceImage, out_w: usize, out_h: usize) -> BlockPlanes {
        let (x0s, x1s) = axis_ranges(img.width, out_w);
        let (y0s, y1s) = axis_ranges(img.height, out_h);
        let mut out = BlockPlanes {
            width: out_w,
            height: out_h,
            r: Vec::new(),
            g: Vec::new(),
            b: Vec::new(),
        };
        for by in 0..out_h {
            for bx in 0..out_w {
                let mut sums = [0u64; 3];
                let mut count = 0u64;
                for y in y0s[by]..y1s[by] {
                    for x in x0s[bx]..x1s[bx] {
                        let idx = (y * img.width + x) * 3;
                        sums[0] += img.pixels[idx] as u64;
                        sums[1] += img.pixels[idx + 1] as u64;
                        sums[2] += img.pixels[idx + 2] as u64;
                        count += 1;
                    }
                }
                let count = count.max(1);
                out.r.push((sums[0] / count) as u8);
                out.g.push((sums[1] / count) as u8);
                out.b.push((sums[2] / count) as u8);
            }
        }
        out
    }

    #[test]
    fn test_axis_ranges_cover_source() {
        let (lo, hi) = axis_ranges(100, 7);
        assert_eq!(lo[0], 0);
        assert_eq!(hi[6], 100);
        for b in 0..7 {
            assert!(lo[b] < hi[b]);
        }
        // Adjacent ranges overlap by at most the ceil spill
        for b in 1..7 {
            assert!(lo[b] <= hi[b - 1]);
        }
    }

    #[test]
    fn test_build_runs_groups_equal_lengths() {
        // src=5 over out=3 gives span lengths [2, 3, 2]
        let (lo, hi) = axis_ranges(5, 3);
        let runs = build_runs(&lo, &hi);
        assert_eq!(
            runs,
            vec![
                Run { start: 0, end: 1, len: 2 },
                Run { start: 1, end: 2, len: 3 },
                Run { start: 2, end: 3, len: 2 },
            ]
        );
        // A clean divisor collapses into a single run
        let (lo, hi) = axis_ranges(40, 8);
        assert_eq!(build_runs(&lo, &hi), vec![Run { start: 0, end: 8, len: 5 }]);
    }

    #[test]
    fn test_uniform_image_resamples_exactly() {
        let pool = TaskSystem::new(2);
        let img = solid_image(37, 23, [10, 200, 30]);
        let planes = resample_to_planes(&img, 16, 16, &pool, 64);
        assert_eq!(planes.width, 16);
        assert_eq!(planes.height, 16);
        assert_eq!(planes.r.len(), 256);
        assert!(planes.r.iter().all(|&v| v == 10));
        assert!(planes.g.iter().all(|&v| v == 200));
        assert!(planes.b.iter().all(|&v| v == 30));
    }

    #[test]
    fn test_subpixel_grid_dimensions() {
        let pool = TaskSystem::new(2);
        let img = solid_image(120, 90, [50, 60, 70]);
        let planes = resample_to_planes(&img, 10 * 8, 6 * 8, &pool, 64);
        assert_eq!(planes.width, 80);
        assert_eq!(planes.height, 48);
        assert_eq!(planes.r.len(), 80 * 48);
        assert_eq!(planes.g.len(), 80 * 48);
        assert_eq!(planes.b.len(), 80 * 48);
    }

    #[test]
    fn test_matches_naive_reference() {
        let pool = TaskSystem::new(3);
        let img = gradient_image(61, 47);
        let fast = resample_to_planes(&img, 24, 16, &pool, 8);
        let naive = naive_resample(&img, 24, 16);
        assert_eq!(fast, naive);
    }

    #[test]
    fn test_deterministic_across_tiles_and_pools() {
        let img = gradient_image(53, 31);
        let pool1 = TaskSystem::new(1);
        let reference = resample_to_planes(&img, 20, 12, &pool1, 64);
        for pool_size in [1, 3] {
            let pool = TaskSystem::new(pool_size);
            for tile_h in [1, 7, 64] {
                let planes = resample_to_planes(&img, 20, 12, &pool, tile_h);
                assert_eq!(planes, reference, "tile_h={tile_h} pool={pool_size}");
            }
        }
    }

    #[test]
    fn test_degenerate_source_yields_empty_grid() {
        let pool = TaskSystem::new(1);
        let img = SourceImage::from_rgb(0, 0, Vec::new());
        let planes = resample_to_planes(&img, 10, 10, &pool, 64);
        assert_eq!(planes.width, 0);
        assert_eq!(planes.height, 0);
        assert!(planes.r.is_empty());
    }

    #[test]
    fn test_upscale_replicates_pixels() {
        // Fewer source pixels than output cells: each cell still averages
        // at least one pixel
        let pool = TaskSystem::new(2);
        let img = solid_image(2, 2, [9, 8, 7]);
        let planes = resample_to_planes(&img, 16, 16, &pool, 64);
        assert!(planes.r.iter().all(|&v| v == 9));
        assert!(planes.g.iter().all(|&v| v == 8));
        assert!(planes.b.iter().all(|&v| v == 7));
    }
}
