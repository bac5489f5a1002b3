//! Pixel-to-metric calibration.

use ndarray::{Array3, s};
use thiserror::Error;

use crate::pipeline::init::PointPair;

/// Smallest accepted pixels-per-meter scale. Dividing by anything at or
/// below this would blow trajectories up into garbage, so it fails fast
/// instead.
pub const MIN_SCALE: f64 = 1e-9;

/// Pixels-per-meter conversion factor.
#[derive(Debug, Clone, PartialEq)]
pub enum Scale {
    /// One scalar applied to every marker.
    Global(f64),
    /// One scalar per marker, aligned with the trajectory's marker axis.
    PerMarker(Vec<f64>),
}

/// Error type for calibration failures.
#[derive(Debug, Error, PartialEq)]
pub enum CalibrationError {
    #[error("pixels-per-meter scale must be positive and finite, got {0}")]
    NonPositiveScale(f64),
    #[error("scale for marker {marker} must be positive and finite, got {value}")]
    NonPositiveMarkerScale { marker: usize, value: f64 },
    #[error("scale vector has {got} entries but trajectory has {expected} markers")]
    MarkerCountMismatch { expected: usize, got: usize },
}

fn check_scale(value: f64, marker: Option<usize>) -> Result<(), CalibrationError> {
    if value.is_finite() && value > MIN_SCALE {
        return Ok(());
    }
    Err(match marker {
        Some(marker) => CalibrationError::NonPositiveMarkerScale { marker, value },
        None => CalibrationError::NonPositiveScale(value),
    })
}

/// Derive one pixels-per-meter scale per marker from reference point pairs.
///
/// Each scale is the Euclidean pixel distance between the pair, so the pair
/// is expected to span one meter on the physical marker. Degenerate pairs
/// produce a zero scale, which [`calibrate`] rejects.
pub fn derive_scale(pairs: &[PointPair]) -> Vec<f64> {
    pairs
        .iter()
        .map(|((ax, ay), (bx, by))| (ax - bx).hypot(ay - by))
        .collect()
}

/// Convert a pixel trajectory of shape (frames, markers, 2) into meters.
///
/// Global scale divides every element; per-marker scale divides marker i's
/// (x, y) plane by `scale[i]`. Missing (NaN) cells pass through unchanged.
pub fn calibrate(trajectory: &Array3<f64>, scale: &Scale) -> Result<Array3<f64>, CalibrationError> {
    match scale {
        Scale::Global(ppm) => {
            check_scale(*ppm, None)?;
            Ok(trajectory / *ppm)
        }
        Scale::PerMarker(scales) => {
            let num_markers = trajectory.shape()[1];
            if scales.len() != num_markers {
                return Err(CalibrationError::MarkerCountMismatch {
                    expected: num_markers,
                    got: scales.len(),
                });
            }
            for (marker, &value) in scales.iter().enumerate() {
                check_scale(value, Some(marker))?;
            }

            let mut meters = trajectory.to_owned();
            for (marker, &value) in scales.iter().enumerate() {
                meters
                    .slice_mut(s![.., marker, ..])
                    .mapv_inplace(|p| p / value);
            }
            Ok(meters)
        }
    }
}
