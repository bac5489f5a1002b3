//! Zero-mean normalized cross-correlation template search.
//!
//! The correlation variant of the marker tracker keeps the appearance of a
//! marker as a fixed template sampled from the first frame, and relocates it
//! on each new frame by scanning a square window of candidate positions.

use crate::tracker::frame::Frame;
use crate::tracker::rect::Rect;

/// Variance floor below which a patch is considered structureless.
const FLAT_EPS: f32 = 1e-6;

/// Search parameters for template matching.
#[derive(Debug, Clone)]
pub struct NccParams {
    /// Maximum displacement (pixels) scanned around the expected position,
    /// per axis.
    pub search_radius: i32,
    /// Minimum correlation score in [0, 1] to accept a match; below this the
    /// tracker reports loss for the frame.
    pub min_score: f32,
}

impl Default for NccParams {
    fn default() -> Self {
        Self {
            search_radius: 24,
            min_score: 0.5,
        }
    }
}

/// Appearance template of one marker: a zero-mean pixel patch.
#[derive(Debug, Clone)]
pub struct Template {
    width: usize,
    height: usize,
    /// Patch values with the patch mean subtracted.
    values: Vec<f32>,
    /// L2 norm of `values`.
    norm: f32,
}

impl Template {
    /// Sample a template from `region` of `frame`.
    ///
    /// Returns None when the region is degenerate or structureless (uniform
    /// patches have no gradient to correlate against and would match
    /// anywhere).
    pub fn from_region(frame: &Frame, region: Rect) -> Option<Self> {
        if region.is_degenerate() {
            return None;
        }
        let x0 = region.x.round() as i32;
        let y0 = region.y.round() as i32;
        let width = region.width.round() as usize;
        let height = region.height.round() as usize;
        if width == 0 || height == 0 {
            return None;
        }

        let mut values = Vec::with_capacity(width * height);
        for dy in 0..height as i32 {
            for dx in 0..width as i32 {
                values.push(frame.value(x0 + dx, y0 + dy));
            }
        }

        let mean = values.iter().sum::<f32>() / values.len() as f32;
        for v in values.iter_mut() {
            *v -= mean;
        }
        let norm = values.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm < FLAT_EPS {
            return None;
        }

        Some(Self {
            width,
            height,
            values,
            norm,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Correlation score of the patch whose top-left corner is (x0, y0).
    ///
    /// Returns 0 for structureless patches.
    fn score_at(&self, frame: &Frame, x0: i32, y0: i32) -> f32 {
        let n = (self.width * self.height) as f32;
        let mut sum = 0.0f32;
        let mut sum_sq = 0.0f32;
        let mut cross = 0.0f32;

        let mut idx = 0;
        for dy in 0..self.height as i32 {
            for dx in 0..self.width as i32 {
                let p = frame.value(x0 + dx, y0 + dy);
                sum += p;
                sum_sq += p * p;
                // values are zero-mean, so the patch mean cancels in the
                // cross term
                cross += self.values[idx] * p;
                idx += 1;
            }
        }

        let patch_var = sum_sq - sum * sum / n;
        if patch_var < FLAT_EPS {
            return 0.0;
        }
        cross / (self.norm * patch_var.sqrt())
    }
}

/// Find the best placement of `template` near `around` (a top-left corner).
///
/// Scans integer offsets within `params.search_radius`, clamped to the frame.
/// Returns the best top-left corner and its score, or None when no candidate
/// reaches `params.min_score`.
pub fn best_match(
    frame: &Frame,
    template: &Template,
    around: (f32, f32),
    params: &NccParams,
) -> Option<(f32, f32, f32)> {
    let tw = template.width() as i32;
    let th = template.height() as i32;
    if frame.width < template.width() || frame.height < template.height() {
        return None;
    }

    let ax = around.0.round() as i32;
    let ay = around.1.round() as i32;
    let r = params.search_radius;

    let x_lo = (ax - r).max(0);
    let x_hi = (ax + r).min(frame.width as i32 - tw);
    let y_lo = (ay - r).max(0);
    let y_hi = (ay + r).min(frame.height as i32 - th);
    if x_lo > x_hi || y_lo > y_hi {
        return None;
    }

    let mut best: Option<(i32, i32, f32)> = None;
    for y in y_lo..=y_hi {
        for x in x_lo..=x_hi {
            let score = template.score_at(frame, x, y);
            if best.is_none_or(|(_, _, s)| score > s) {
                best = Some((x, y, score));
            }
        }
    }

    match best {
        Some((x, y, score)) if score >= params.min_score => Some((x as f32, y as f32, score)),
        _ => None,
    }
}
