//! Per-marker state and the visual tracker capability.
//!
//! The tracking algorithm is deliberately opaque to the rest of the crate:
//! a tracker is seeded with a frame and a region, and on each later frame
//! either relocates its marker or reports loss. Concrete algorithms are
//! variants of [`MarkerTracker`]; adding one does not touch the bank or the
//! pipeline.

use ndarray::{Array1, Array2};

use crate::tracker::frame::Frame;
use crate::tracker::kalman_filter::KalmanFilter;
use crate::tracker::ncc::{NccParams, Template, best_match};
use crate::tracker::rect::Rect;
use crate::tracker::status::TrackStatus;

/// State of one tracked marker.
#[derive(Debug, Clone)]
pub struct MarkerState {
    /// Index of the marker, stable across the run.
    pub marker_id: usize,
    /// Last known bounding region.
    pub bbox: Rect,
    /// Status on the most recent frame.
    pub status: TrackStatus,
}

impl MarkerState {
    pub fn center(&self) -> (f32, f32) {
        self.bbox.center()
    }
}

/// Which tracking algorithm the bank should instantiate per marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackerKind {
    /// Template correlation only; reported boxes snap to the best match.
    #[default]
    Correlation,
    /// Template correlation guided and smoothed by a constant-velocity
    /// Kalman filter.
    Filtered,
}

/// A single marker's visual tracker.
#[derive(Debug, Clone)]
pub enum MarkerTracker {
    Correlation(CorrelationTracker),
    Filtered(FilteredTracker),
}

impl MarkerTracker {
    /// Seed a tracker of the requested kind on `frame` at `bbox`.
    ///
    /// Returns None when the region cannot seed a tracker (degenerate or
    /// structureless appearance).
    pub fn create(kind: TrackerKind, frame: &Frame, bbox: Rect, params: &NccParams) -> Option<Self> {
        let template = Template::from_region(frame, bbox)?;
        match kind {
            TrackerKind::Correlation => Some(Self::Correlation(CorrelationTracker {
                template,
                bbox,
                params: params.clone(),
            })),
            TrackerKind::Filtered => {
                let kf = KalmanFilter::new();
                let (cx, cy) = bbox.center();
                let (mean, covariance) = kf.initiate([cx as f64, cy as f64], bbox.height as f64);
                Some(Self::Filtered(FilteredTracker {
                    template,
                    bbox,
                    params: params.clone(),
                    kf,
                    mean,
                    covariance,
                }))
            }
        }
    }

    /// Advance the tracker by one frame.
    ///
    /// Returns the relocated region, or None when the marker was not found
    /// on this frame. Internal state is retained either way, so tracking
    /// keeps being attempted on later frames.
    pub fn update(&mut self, frame: &Frame) -> Option<Rect> {
        match self {
            Self::Correlation(t) => t.update(frame),
            Self::Filtered(t) => t.update(frame),
        }
    }
}

/// Pure template-correlation tracker.
#[derive(Debug, Clone)]
pub struct CorrelationTracker {
    template: Template,
    bbox: Rect,
    params: NccParams,
}

impl CorrelationTracker {
    fn update(&mut self, frame: &Frame) -> Option<Rect> {
        let (x, y, _score) = best_match(frame, &self.template, (self.bbox.x, self.bbox.y), &self.params)?;
        self.bbox = self.bbox.at(x, y);
        Some(self.bbox)
    }
}

/// Correlation tracker with a constant-velocity motion model.
///
/// The filter's prediction centers the search window, so this variant
/// follows fast steady motion with a smaller search radius, and the
/// posterior smooths measurement jitter.
#[derive(Debug, Clone)]
pub struct FilteredTracker {
    template: Template,
    bbox: Rect,
    params: NccParams,
    kf: KalmanFilter,
    mean: Array1<f64>,
    covariance: Array2<f64>,
}

impl FilteredTracker {
    fn update(&mut self, frame: &Frame) -> Option<Rect> {
        let h = self.bbox.height as f64;
        let (mean, covariance) = self.kf.predict(&self.mean, &self.covariance, h);
        self.mean = mean;
        self.covariance = covariance;

        let predicted = Rect::from_center(
            self.mean[0] as f32,
            self.mean[1] as f32,
            self.bbox.width,
            self.bbox.height,
        );
        let matched = best_match(frame, &self.template, (predicted.x, predicted.y), &self.params);

        // On a miss the predicted state is kept, so the search keeps moving
        // with the marker's last known velocity.
        let (x, y, _score) = matched?;
        let measured = self.bbox.at(x, y).center();
        let (mean, covariance) = self.kf.update(
            &self.mean,
            &self.covariance,
            [measured.0 as f64, measured.1 as f64],
            h,
        );
        self.mean = mean;
        self.covariance = covariance;

        self.bbox = Rect::from_center(
            self.mean[0] as f32,
            self.mean[1] as f32,
            self.bbox.width,
            self.bbox.height,
        );
        Some(self.bbox)
    }
}
