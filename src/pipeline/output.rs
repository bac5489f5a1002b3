//! Result artifacts: binary persistence, elevation plots, and tracking
//! overlays.
//!
//! Everything here is best-effort from the pipeline's point of view: a
//! failed write never invalidates a computed result.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};
use ndarray::Array3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tracker::{Frame, Observation};

/// Calibrated waveform measurements, in meters.
///
/// Shape is (total_frames, num_markers, 2); coordinate 1 is the vertical
/// displacement. NaN cells mark frames where the marker position is
/// unknown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaveformResult {
    pub positions: Array3<f64>,
}

impl WaveformResult {
    pub fn new(positions: Array3<f64>) -> Self {
        Self { positions }
    }

    pub fn num_frames(&self) -> usize {
        self.positions.shape()[0]
    }

    pub fn num_markers(&self) -> usize {
        self.positions.shape()[1]
    }

    pub fn is_missing(&self, frame: usize, marker: usize) -> bool {
        self.positions[[frame, marker, 0]].is_nan()
    }

    /// Vertical displacement series for one marker, NaN where missing.
    pub fn elevation(&self, marker: usize) -> Vec<f64> {
        (0..self.num_frames())
            .map(|f| self.positions[[f, marker, 1]])
            .collect()
    }
}

/// Error type for artifact writing failures.
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode measurements: {0}")]
    Encode(#[from] bincode::Error),
    #[error("failed to write image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> OutputError + '_ {
    move |source| OutputError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Persist measurements in a compact binary form.
pub fn save_measurements(result: &WaveformResult, path: &Path) -> Result<(), OutputError> {
    let file = File::create(path).map_err(io_err(path))?;
    bincode::serialize_into(BufWriter::new(file), result)?;
    Ok(())
}

/// Load measurements written by [`save_measurements`].
pub fn load_measurements(path: &Path) -> Result<WaveformResult, OutputError> {
    let file = File::open(path).map_err(io_err(path))?;
    Ok(bincode::deserialize_from(BufReader::new(file))?)
}

const PLOT_WIDTH: u32 = 960;
const PLOT_HEIGHT: u32 = 540;
const PLOT_MARGIN: u32 = 40;

const MARKER_COLORS: [[u8; 3]; 8] = [
    [214, 69, 65],
    [31, 119, 180],
    [44, 160, 44],
    [255, 127, 14],
    [148, 103, 189],
    [23, 190, 207],
    [227, 119, 194],
    [127, 127, 127],
];

fn marker_color(marker: usize) -> Rgb<u8> {
    Rgb(MARKER_COLORS[marker % MARKER_COLORS.len()])
}

fn draw_segment(img: &mut RgbImage, a: (f32, f32), b: (f32, f32), color: Rgb<u8>) {
    let steps = (b.0 - a.0).abs().max((b.1 - a.1).abs()).ceil().max(1.0) as u32;
    for s in 0..=steps {
        let t = s as f32 / steps as f32;
        let x = a.0 + t * (b.0 - a.0);
        let y = a.1 + t * (b.1 - a.1);
        if x >= 0.0 && y >= 0.0 && (x as u32) < img.width() && (y as u32) < img.height() {
            img.put_pixel(x as u32, y as u32, color);
        }
    }
}

/// Render one elevation polyline per marker (x = frame index, y = vertical
/// displacement in meters) and save it as a PNG.
///
/// Missing frames break the polyline rather than being interpolated over.
pub fn plot_elevations(result: &WaveformResult, path: &Path) -> Result<(), OutputError> {
    let mut img = RgbImage::from_pixel(PLOT_WIDTH, PLOT_HEIGHT, Rgb([255, 255, 255]));

    let axis = Rgb([170, 170, 170]);
    let left = PLOT_MARGIN as f32;
    let right = (PLOT_WIDTH - PLOT_MARGIN) as f32;
    let top = PLOT_MARGIN as f32;
    let bottom = (PLOT_HEIGHT - PLOT_MARGIN) as f32;
    draw_segment(&mut img, (left, top), (left, bottom), axis);
    draw_segment(&mut img, (left, bottom), (right, bottom), axis);

    let finite: Vec<f64> = (0..result.num_markers())
        .flat_map(|m| result.elevation(m))
        .filter(|v| v.is_finite())
        .collect();

    if !finite.is_empty() {
        let mut lo = finite.iter().cloned().fold(f64::INFINITY, f64::min);
        let mut hi = finite.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        if hi - lo < 1e-12 {
            lo -= 0.5;
            hi += 0.5;
        }

        let frames = result.num_frames().max(2);
        let x_of = |f: usize| left + (f as f32 / (frames - 1) as f32) * (right - left);
        let y_of =
            |v: f64| bottom - (((v - lo) / (hi - lo)) as f32) * (bottom - top);

        for marker in 0..result.num_markers() {
            let color = marker_color(marker);
            let series = result.elevation(marker);
            let mut prev: Option<(f32, f32)> = None;
            for (f, v) in series.iter().enumerate() {
                if !v.is_finite() {
                    prev = None;
                    continue;
                }
                let point = (x_of(f), y_of(*v));
                if let Some(p) = prev {
                    draw_segment(&mut img, p, point, color);
                } else {
                    // single isolated samples still get a visible dot
                    draw_segment(&mut img, point, point, color);
                }
                prev = Some(point);
            }
        }
    }

    img.save(path).map_err(|source| OutputError::Image {
        path: path.to_path_buf(),
        source,
    })
}

/// Render a frame with the current marker regions outlined, for preview
/// dumps. Lost markers are not drawn.
pub fn draw_overlay(frame: &Frame, observations: &[Observation]) -> RgbImage {
    let mut img = RgbImage::new(frame.width as u32, frame.height as u32);
    for y in 0..frame.height {
        for x in 0..frame.width {
            let v = frame.value(x as i32, y as i32).clamp(0.0, 255.0) as u8;
            img.put_pixel(x as u32, y as u32, Rgb([v, v, v]));
        }
    }

    for obs in observations {
        if !obs.status.is_active() {
            continue;
        }
        let color = marker_color(obs.marker_id);
        let x0 = obs.bbox.x;
        let y0 = obs.bbox.y;
        let x1 = obs.bbox.x + obs.bbox.width;
        let y1 = obs.bbox.y + obs.bbox.height;
        draw_segment(&mut img, (x0, y0), (x1, y0), color);
        draw_segment(&mut img, (x1, y0), (x1, y1), color);
        draw_segment(&mut img, (x1, y1), (x0, y1), color);
        draw_segment(&mut img, (x0, y1), (x0, y0), color);
    }
    img
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::{Rect, TrackStatus};

    fn sample_result() -> WaveformResult {
        let mut positions = Array3::from_elem((4, 2, 2), f64::NAN);
        for f in 0..4 {
            positions[[f, 0, 0]] = 0.3;
            positions[[f, 0, 1]] = 1.0 + 0.1 * f as f64;
        }
        // marker 1 lost on frame 2
        for f in [0usize, 1, 3] {
            positions[[f, 1, 0]] = 0.6;
            positions[[f, 1, 1]] = 2.0 - 0.2 * f as f64;
        }
        WaveformResult::new(positions)
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("measurements.bin");

        let result = sample_result();
        save_measurements(&result, &path).unwrap();
        let loaded = load_measurements(&path).unwrap();

        assert_eq!(loaded.num_frames(), 4);
        assert_eq!(loaded.num_markers(), 2);
        assert_eq!(loaded.positions[[1, 0, 1]], result.positions[[1, 0, 1]]);
        assert!(loaded.is_missing(2, 1));
    }

    #[test]
    fn test_plot_writes_decodable_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plot.png");
        plot_elevations(&sample_result(), &path).unwrap();

        let img = image::open(&path).unwrap();
        assert_eq!(img.width(), PLOT_WIDTH);
        assert_eq!(img.height(), PLOT_HEIGHT);
    }

    #[test]
    fn test_plot_handles_all_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.png");
        let result = WaveformResult::new(Array3::from_elem((5, 1, 2), f64::NAN));
        plot_elevations(&result, &path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_overlay_draws_active_markers_only() {
        let frame = Frame::from_fn(0, 32, 32, |_, _| 10.0);
        let observations = [
            Observation {
                marker_id: 0,
                status: TrackStatus::Active,
                bbox: Rect::new(4.0, 4.0, 8.0, 8.0),
            },
            Observation {
                marker_id: 1,
                status: TrackStatus::Lost,
                bbox: Rect::new(20.0, 20.0, 8.0, 8.0),
            },
        ];
        let img = draw_overlay(&frame, &observations);
        assert_eq!(img.get_pixel(4, 4), &marker_color(0));
        // lost marker's corner stays plain grayscale
        assert_eq!(img.get_pixel(20, 20), &Rgb([10, 10, 10]));
    }

    #[test]
    fn test_elevation_series() {
        let result = sample_result();
        let series = result.elevation(1);
        assert_eq!(series.len(), 4);
        assert!(series[2].is_nan());
        assert!((series[3] - 1.4).abs() < 1e-12);
    }
}
