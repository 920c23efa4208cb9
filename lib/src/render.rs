//! ANSI text renderers over the sub-pixel grid
//!
//! Two modes share the same escape-code conventions: `render_low` flattens
//! each character cell to a background color, `render_high` searches the
//! block-glyph table for the coverage split that minimizes squared error
//! against the cell's 8×8 sub-pixel block, using integral images for O(1)
//! rectangle sums and a mean-color-difference heuristic to prune the
//! search.

use crate::glyph::{CELL_H, CELL_W, GLYPH_TABLE, Glyph};
use crate::resample::BlockPlanes;
use crate::task::TaskSystem;
use log::info;
use std::fmt::Write as _;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

const RESET: &str = "\x1b[0m";

fn push_bg(buf: &mut String, r: u8, g: u8, b: u8) {
    let _ = write!(buf, "\x1b[48;2;{r};{g};{b}m");
}

fn push_fg(buf: &mut String, r: u8, g: u8, b: u8) {
    let _ = write!(buf, "\x1b[38;2;{r};{g};{b}m");
}

/// Diagnostic counters for the glyph search, shared across render threads
///
/// Independent monotonically-increasing atomics with no cross-counter
/// consistency requirement; used only for tuning.
#[derive(Debug, Default)]
pub struct PruneStats {
    pub total_cells: AtomicU64,
    pub candidates_considered: AtomicU64,
    pub candidates_skipped: AtomicU64,
    pub evaluations: AtomicU64,
    /// Cumulative time spent in pruning checks (microseconds)
    pub prune_check_us: AtomicU64,
    /// Cumulative time spent in error evaluations (microseconds)
    pub eval_us: AtomicU64,
}

impl PruneStats {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Low-fidelity renderer: one background color per character cell
///
/// The grid should be sampled at `out_w*8` × `out_h*8`. Escape codes are
/// run-length compressed: a background escape is emitted only when the
/// cell color changes within the row.
pub fn render_low(highres: &BlockPlanes, out_w: usize, out_h: usize) -> String {
    let high_w = highres.width;
    let mut out = String::new();
    for by in 0..out_h {
        let mut prev: Option<(u8, u8, u8)> = None;
        for bx in 0..out_w {
            let mut rsum = 0u64;
            let mut gsum = 0u64;
            let mut bsum = 0u64;
            for dy in 0..CELL_H {
                let sy = by * CELL_H + dy;
                let base = sy * high_w + bx * CELL_W;
                for idx in base..base + CELL_W {
                    rsum += highres.r[idx] as u64;
                    gsum += highres.g[idx] as u64;
                    bsum += highres.b[idx] as u64;
                }
            }
            let count = (CELL_W * CELL_H) as u64;
            let cell = (
                (rsum / count) as u8,
                (gsum / count) as u8,
                (bsum / count) as u8,
            );
            if prev != Some(cell) {
                push_bg(&mut out, cell.0, cell.1, cell.2);
                prev = Some(cell);
            }
            out.push(' ');
        }
        out.push_str(RESET);
        out.push('\n');
    }
    out
}

/// Per-channel prefix-sum tables over the full sub-pixel grid
///
/// Size `(width+1) * (height+1)` each, standard inclusive 2D prefix sums;
/// built once, read-only during the parallel render phase.
struct Integrals {
    stride: usize, // width + 1
    sum_r: Vec<u64>,
    sum_g: Vec<u64>,
    sum_b: Vec<u64>,
    sq_r: Vec<u64>,
    sq_g: Vec<u64>,
    sq_b: Vec<u64>,
}

impl Integrals {
    fn build(planes: &BlockPlanes) -> Self {
        let w = planes.width;
        let h = planes.height;
        let stride = w + 1;
        let size = stride * (h + 1);
        let mut ii = Integrals {
            stride,
            sum_r: vec![0; size],
            sum_g: vec![0; size],
            sum_b: vec![0; size],
            sq_r: vec![0; size],
            sq_g: vec![0; size],
            sq_b: vec![0; size],
        };
        for y in 0..h {
            let mut row = [0u64; 3];
            let mut row_sq = [0u64; 3];
            for x in 0..w {
                let idx = y * w + x;
                let r = planes.r[idx] as u64;
                let g = planes.g[idx] as u64;
                let b = planes.b[idx] as u64;
                row[0] += r;
                row[1] += g;
                row[2] += b;
                row_sq[0] += r * r;
                row_sq[1] += g * g;
                row_sq[2] += b * b;
                let here = (y + 1) * stride + (x + 1);
                let above = y * stride + (x + 1);
                ii.sum_r[here] = ii.sum_r[above] + row[0];
                ii.sum_g[here] = ii.sum_g[above] + row[1];
                ii.sum_b[here] = ii.sum_b[above] + row[2];
                ii.sq_r[here] = ii.sq_r[above] + row_sq[0];
                ii.sq_g[here] = ii.sq_g[above] + row_sq[1];
                ii.sq_b[here] = ii.sq_b[above] + row_sq[2];
            }
        }
        ii
    }

    /// Four-corner inclusion-exclusion over one table
    fn rect(table: &[u64], stride: usize, x0: usize, y0: usize, x1: usize, y1: usize) -> u64 {
        table[y1 * stride + x1] + table[y0 * stride + x0]
            - table[y0 * stride + x1]
            - table[y1 * stride + x0]
    }

    fn rect_sums(&self, x0: usize, y0: usize, x1: usize, y1: usize) -> [u64; 3] {
        [
            Self::rect(&self.sum_r, self.stride, x0, y0, x1, y1),
            Self::rect(&self.sum_g, self.stride, x0, y0, x1, y1),
            Self::rect(&self.sum_b, self.stride, x0, y0, x1, y1),
        ]
    }

    fn rect_squares(&self, x0: usize, y0: usize, x1: usize, y1: usize) -> [u64; 3] {
        [
            Self::rect(&self.sq_r, self.stride, x0, y0, x1, y1),
            Self::rect(&self.sq_g, self.stride, x0, y0, x1, y1),
            Self::rect(&self.sq_b, self.stride, x0, y0, x1, y1),
        ]
    }
}

/// Sum-of-squared-error of a foreground/background split, summed over the
/// three channels
///
/// `SSE = Σx² − (Σx_fg)²/n_fg − (Σx_bg)²/n_bg`, with a zero-count region
/// omitting its term.
fn split_error_scalar(
    total: [u64; 3],
    total_sq: [u64; 3],
    fg: [u64; 3],
    fg_count: u64,
    bg_count: u64,
) -> f64 {
    let mut err = 0.0;
    for c in 0..3 {
        let mut e = total_sq[c] as f64;
        if fg_count > 0 {
            let s = fg[c] as f64;
            e -= s * s / fg_count as f64;
        }
        if bg_count > 0 {
            let s = (total[c] - fg[c]) as f64;
            e -= s * s / bg_count as f64;
        }
        err += e;
    }
    err
}

#[cfg(all(feature = "simd", target_arch = "x86_64"))]
mod simd {
    use std::arch::x86_64::*;

    /// Packed-double evaluation of the split error for the common case
    /// where both regions are non-empty; the three channel lanes are
    /// reduced simultaneously. Must match the scalar formula exactly.
    #[target_feature(enable = "avx")]
    pub unsafe fn split_error_avx(
        total: [u64; 3],
        total_sq: [u64; 3],
        fg: [u64; 3],
        fg_count: u64,
        bg_count: u64,
    ) -> f64 {
        unsafe {
            let v_fg = _mm256_setr_pd(fg[0] as f64, fg[1] as f64, fg[2] as f64, 0.0);
            let v_bg = _mm256_setr_pd(
                (total[0] - fg[0]) as f64,
                (total[1] - fg[1]) as f64,
                (total[2] - fg[2]) as f64,
                0.0,
            );
            let v_fg_term =
                _mm256_div_pd(_mm256_mul_pd(v_fg, v_fg), _mm256_set1_pd(fg_count as f64));
            let v_bg_term =
                _mm256_div_pd(_mm256_mul_pd(v_bg, v_bg), _mm256_set1_pd(bg_count as f64));
            let v_total_sq =
                _mm256_setr_pd(total_sq[0] as f64, total_sq[1] as f64, total_sq[2] as f64, 0.0);
            let v_err = _mm256_sub_pd(_mm256_sub_pd(v_total_sq, v_fg_term), v_bg_term);
            let mut lanes = [0.0f64; 4];
            _mm256_storeu_pd(lanes.as_mut_ptr(), v_err);
            lanes[0] + lanes[1] + lanes[2]
        }
    }
}

fn split_error(
    total: [u64; 3],
    total_sq: [u64; 3],
    fg: [u64; 3],
    fg_count: u64,
    bg_count: u64,
) -> f64 {
    #[cfg(all(feature = "simd", target_arch = "x86_64"))]
    {
        if fg_count > 0 && bg_count > 0 && is_x86_feature_detected!("avx") {
            return unsafe { simd::split_error_avx(total, total_sq, fg, fg_count, bg_count) };
        }
    }
    split_error_scalar(total, total_sq, fg, fg_count, bg_count)
}

/// High-fidelity renderer: per-cell glyph search with fg/bg color split
///
/// Output rows are partitioned into contiguous bands, one per pool worker;
/// each band renders into a private buffer and the buffers are joined in
/// row order. With `prune_threshold` 0 the full glyph table is evaluated
/// for every cell. `measure_only` runs the search but skips all string
/// assembly except the row newlines, isolating search cost from
/// formatting cost.
pub fn render_high(
    highres: &BlockPlanes,
    out_w: usize,
    out_h: usize,
    pool: &TaskSystem,
    prune_threshold: u32,
    stats: Option<Arc<PruneStats>>,
    measure_only: bool,
) -> String {
    let sw = Instant::now();
    let integrals = Arc::new(Integrals::build(highres));
    info!("Integral+sq build completed in {}us", sw.elapsed().as_micros());

    let threads = pool.worker_count().max(1);
    let mut bands = Vec::with_capacity(threads);
    for tid in 0..threads {
        let row0 = out_h * tid / threads;
        let row1 = out_h * (tid + 1) / threads;
        let integrals = Arc::clone(&integrals);
        let stats = stats.clone();
        bands.push(pool.submit_with_result(move || {
            render_band(
                &integrals,
                out_w,
                row0,
                row1,
                prune_threshold,
                stats.as_deref(),
                measure_only,
            )
        }));
    }

    let mut out = String::new();
    for band in bands {
        out.push_str(&band.wait());
    }
    out
}

/// Renders rows `row0..row1` into a private buffer
fn render_band(
    integrals: &Integrals,
    out_w: usize,
    row0: usize,
    row1: usize,
    prune_threshold: u32,
    stats: Option<&PruneStats>,
    measure_only: bool,
) -> String {
    let cell_total = (CELL_W * CELL_H) as u64;
    let mut local = String::new();
    // Rough reserve to cut down reallocations
    local.reserve((row1 - row0) * out_w * 12);

    for by in row0..row1 {
        if let Some(stats) = stats {
            stats.total_cells.fetch_add(out_w as u64, Ordering::Relaxed);
        }
        let mut prev_bg: Option<(u8, u8, u8)> = None;
        let mut prev_fg: Option<(u8, u8, u8)> = None;
        for bx in 0..out_w {
            let x0 = bx * CELL_W;
            let y0 = by * CELL_H;
            let x1 = x0 + CELL_W;
            let y1 = y0 + CELL_H;
            let total = integrals.rect_sums(x0, y0, x1, y1);
            let total_sq = integrals.rect_squares(x0, y0, x1, y1);

            let mut best_err = f64::INFINITY;
            let mut best_glyph = Glyph::Space;
            let mut best_fg = (0u8, 0u8, 0u8);
            let mut best_bg = (0u8, 0u8, 0u8);

            for glyph in GLYPH_TABLE {
                if let Some(stats) = stats {
                    stats.candidates_considered.fetch_add(1, Ordering::Relaxed);
                }
                // Only the regional sums feed the SSE identity; the
                // sum-of-squares table is queried per whole cell once
                let (fg, fg_count) = match glyph.fg_rect(x0, y0) {
                    Some(rect) if rect.area() as u64 == cell_total => (total, cell_total),
                    Some(rect) => (
                        integrals.rect_sums(rect.x0, rect.y0, rect.x1, rect.y1),
                        rect.area() as u64,
                    ),
                    None => ([0; 3], 0),
                };
                let bg_count = cell_total - fg_count;

                // Mean colors of the two regions, truncating division
                let prune_timer = stats.map(|_| Instant::now());
                let fg_mean = region_mean(fg, fg_count);
                let bg_mean = region_mean(
                    [total[0] - fg[0], total[1] - fg[1], total[2] - fg[2]],
                    bg_count,
                );
                let color_diff = fg_mean.0.abs_diff(bg_mean.0) as u32
                    + fg_mean.1.abs_diff(bg_mean.1) as u32
                    + fg_mean.2.abs_diff(bg_mean.2) as u32;
                if let (Some(stats), Some(timer)) = (stats, prune_timer) {
                    stats
                        .prune_check_us
                        .fetch_add(timer.elapsed().as_micros() as u64, Ordering::Relaxed);
                }
                // Heuristic prune: a near-identical fg/bg split reads as a
                // flat fill and cannot beat a simpler candidate of
                // comparable error
                if color_diff < prune_threshold {
                    if let Some(stats) = stats {
                        stats.candidates_skipped.fetch_add(1, Ordering::Relaxed);
                    }
                    continue;
                }

                if let Some(stats) = stats {
                    stats.evaluations.fetch_add(1, Ordering::Relaxed);
                }
                let eval_timer = stats.map(|_| Instant::now());
                let err = split_error(total, total_sq, fg, fg_count, bg_count);
                if let (Some(stats), Some(timer)) = (stats, eval_timer) {
                    stats
                        .eval_us
                        .fetch_add(timer.elapsed().as_micros() as u64, Ordering::Relaxed);
                }

                // Strict comparison: the first candidate in table order
                // wins ties
                if err < best_err {
                    best_err = err;
                    best_glyph = glyph;
                    if fg_count > 0 {
                        best_fg = fg_mean;
                    }
                    if bg_count > 0 {
                        best_bg = bg_mean;
                    }
                }
            }

            if measure_only {
                continue;
            }
            if prev_bg != Some(best_bg) {
                push_bg(&mut local, best_bg.0, best_bg.1, best_bg.2);
                prev_bg = Some(best_bg);
            }
            if prev_fg != Some(best_fg) {
                push_fg(&mut local, best_fg.0, best_fg.1, best_fg.2);
                prev_fg = Some(best_fg);
            }
            local.push(best_glyph.codepoint());
        }
        if !measure_only {
            local.push_str(RESET);
        }
        local.push('\n');
    }
    local
}

fn region_mean(sums: [u64; 3], count: u64) -> (u8, u8, u8) {
    if count == 0 {
        return (0, 0, 0);
    }
    (
        (sums[0] / count) as u8,
        (sums[1] / count) as u8,
        (sums[2] / count) as u8,
    )
}
