//! Trajectory accumulation buffer.

use ndarray::Array3;

use crate::tracker::TrackStatus;

/// Fixed-size accumulator of per-frame marker centers.
///
/// Shape is (total_frames, num_markers, 2). Cells start at
/// [`TrajectoryBuffer::MISSING`] and stay there for frames where a marker
/// was lost or that were never reached, so a genuine (0, 0) position is
/// always distinguishable from absent data. Each cell is written at most
/// once.
pub struct TrajectoryBuffer {
    positions: Array3<f64>,
}

impl TrajectoryBuffer {
    /// Sentinel for cells with no recorded position.
    pub const MISSING: f64 = f64::NAN;

    pub fn new(total_frames: usize, num_markers: usize) -> Self {
        Self {
            positions: Array3::from_elem((total_frames, num_markers, 2), Self::MISSING),
        }
    }

    pub fn num_frames(&self) -> usize {
        self.positions.shape()[0]
    }

    pub fn num_markers(&self) -> usize {
        self.positions.shape()[1]
    }

    /// Record one marker's observation for one frame.
    ///
    /// Lost observations leave the cell missing. Indices outside the buffer
    /// are a caller bug and panic.
    pub fn record(
        &mut self,
        frame_index: usize,
        marker_index: usize,
        status: TrackStatus,
        center: (f32, f32),
    ) {
        assert!(
            frame_index < self.num_frames(),
            "frame index {} out of range ({} frames)",
            frame_index,
            self.num_frames()
        );
        assert!(
            marker_index < self.num_markers(),
            "marker index {} out of range ({} markers)",
            marker_index,
            self.num_markers()
        );
        if status != TrackStatus::Active {
            return;
        }
        debug_assert!(
            self.positions[[frame_index, marker_index, 0]].is_nan(),
            "cell ({}, {}) written twice",
            frame_index,
            marker_index
        );
        self.positions[[frame_index, marker_index, 0]] = center.0 as f64;
        self.positions[[frame_index, marker_index, 1]] = center.1 as f64;
    }

    pub fn is_missing(&self, frame_index: usize, marker_index: usize) -> bool {
        self.positions[[frame_index, marker_index, 0]].is_nan()
    }

    /// Consume the buffer, yielding the raw pixel trajectory.
    pub fn into_positions(self) -> Array3<f64> {
        self.positions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_missing() {
        let buffer = TrajectoryBuffer::new(3, 2);
        for f in 0..3 {
            for m in 0..2 {
                assert!(buffer.is_missing(f, m));
            }
        }
    }

    #[test]
    fn test_record_active() {
        let mut buffer = TrajectoryBuffer::new(3, 2);
        buffer.record(1, 0, TrackStatus::Active, (4.5, 9.0));
        assert!(!buffer.is_missing(1, 0));
        assert!(buffer.is_missing(1, 1));

        let positions = buffer.into_positions();
        assert_eq!(positions[[1, 0, 0]], 4.5);
        assert_eq!(positions[[1, 0, 1]], 9.0);
    }

    #[test]
    fn test_lost_leaves_cell_missing() {
        let mut buffer = TrajectoryBuffer::new(2, 1);
        buffer.record(0, 0, TrackStatus::Lost, (4.5, 9.0));
        assert!(buffer.is_missing(0, 0));
    }

    #[test]
    fn test_zero_position_is_not_missing() {
        let mut buffer = TrajectoryBuffer::new(1, 1);
        buffer.record(0, 0, TrackStatus::Active, (0.0, 0.0));
        assert!(!buffer.is_missing(0, 0));
    }

    #[test]
    #[should_panic(expected = "frame index")]
    fn test_out_of_range_frame_panics() {
        let mut buffer = TrajectoryBuffer::new(2, 1);
        buffer.record(2, 0, TrackStatus::Active, (1.0, 1.0));
    }

    #[test]
    #[should_panic(expected = "marker index")]
    fn test_out_of_range_marker_panics() {
        let mut buffer = TrajectoryBuffer::new(2, 1);
        buffer.record(0, 1, TrackStatus::Active, (1.0, 1.0));
    }
}
