//! Marker initialization capabilities.
//!
//! How initial regions are obtained is injected: an interactive selector, a
//! detection stage, or preset coordinates all fit behind
//! [`MarkerInitializer`], so the pipeline itself stays headless.

use thiserror::Error;

use crate::tracker::{Frame, Rect};

/// A pair of reference pixel points with known physical separation,
/// used to derive a per-marker pixels-per-meter scale.
pub type PointPair = ((f64, f64), (f64, f64));

/// Initial regions for all markers, plus optional calibration references.
#[derive(Debug, Clone)]
pub struct MarkerSetup {
    /// One initial bounding region per marker.
    pub regions: Vec<Rect>,
    /// One reference point pair per marker, when per-marker calibration is
    /// wanted.
    pub reference_points: Option<Vec<PointPair>>,
}

/// Error type for marker initialization failures.
#[derive(Debug, Error)]
pub enum InitializationError {
    #[error("expected {expected} initial regions, got {got}")]
    RegionCountMismatch { expected: usize, got: usize },
    #[error("expected {expected} reference point pairs, got {got}")]
    ReferenceCountMismatch { expected: usize, got: usize },
}

/// Builder assembling a validated [`MarkerSetup`].
#[derive(Debug, Clone, Default)]
pub struct MarkerSetupBuilder {
    regions: Vec<Rect>,
    reference_points: Vec<PointPair>,
}

impl MarkerSetupBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the initial region for the next marker.
    pub fn region(mut self, region: Rect) -> Self {
        self.regions.push(region);
        self
    }

    /// Add the reference point pair for the next marker.
    pub fn reference_pair(mut self, a: (f64, f64), b: (f64, f64)) -> Self {
        self.reference_points.push((a, b));
        self
    }

    /// Validate against the expected marker count and build the setup.
    ///
    /// Reference pairs are optional as a whole, but when any are supplied
    /// there must be exactly one per marker.
    pub fn build(self, expected_markers: usize) -> Result<MarkerSetup, InitializationError> {
        if self.regions.len() != expected_markers {
            return Err(InitializationError::RegionCountMismatch {
                expected: expected_markers,
                got: self.regions.len(),
            });
        }
        let reference_points = if self.reference_points.is_empty() {
            None
        } else if self.reference_points.len() != expected_markers {
            return Err(InitializationError::ReferenceCountMismatch {
                expected: expected_markers,
                got: self.reference_points.len(),
            });
        } else {
            Some(self.reference_points)
        };
        Ok(MarkerSetup {
            regions: self.regions,
            reference_points,
        })
    }
}

/// Trait for obtaining initial marker regions from the first frame.
pub trait MarkerInitializer {
    fn select(&mut self, frame: &Frame) -> Result<MarkerSetup, InitializationError>;
}

/// Closures work directly as initializers, which keeps interactive
/// selectors out of the crate: inject `|frame| { ... }`.
impl<F> MarkerInitializer for F
where
    F: FnMut(&Frame) -> Result<MarkerSetup, InitializationError>,
{
    fn select(&mut self, frame: &Frame) -> Result<MarkerSetup, InitializationError> {
        self(frame)
    }
}

/// Initializer returning a prebuilt setup, ignoring the frame.
#[derive(Debug, Clone)]
pub struct PresetRegions {
    setup: MarkerSetup,
}

impl PresetRegions {
    pub fn new(setup: MarkerSetup) -> Self {
        Self { setup }
    }
}

impl MarkerInitializer for PresetRegions {
    fn select(&mut self, _frame: &Frame) -> Result<MarkerSetup, InitializationError> {
        Ok(self.setup.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_validates_region_count() {
        let result = MarkerSetupBuilder::new()
            .region(Rect::new(0.0, 0.0, 4.0, 4.0))
            .build(2);
        match result {
            Err(InitializationError::RegionCountMismatch { expected: 2, got: 1 }) => {}
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_builder_validates_reference_count() {
        let result = MarkerSetupBuilder::new()
            .region(Rect::new(0.0, 0.0, 4.0, 4.0))
            .region(Rect::new(8.0, 0.0, 4.0, 4.0))
            .reference_pair((0.0, 0.0), (0.0, 10.0))
            .build(2);
        assert!(matches!(
            result,
            Err(InitializationError::ReferenceCountMismatch { expected: 2, got: 1 })
        ));
    }

    #[test]
    fn test_builder_without_references() {
        let setup = MarkerSetupBuilder::new()
            .region(Rect::new(0.0, 0.0, 4.0, 4.0))
            .build(1)
            .unwrap();
        assert_eq!(setup.regions.len(), 1);
        assert!(setup.reference_points.is_none());
    }

    #[test]
    fn test_closure_as_initializer() {
        let mut init = |_frame: &Frame| {
            MarkerSetupBuilder::new()
                .region(Rect::new(1.0, 2.0, 3.0, 4.0))
                .build(1)
        };
        let frame = Frame::from_fn(0, 4, 4, |_, _| 0.0);
        let setup = init.select(&frame).unwrap();
        assert_eq!(setup.regions[0], Rect::new(1.0, 2.0, 3.0, 4.0));
    }
}
