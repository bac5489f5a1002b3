//! Perspective rectification of frames.
//!
//! Rectification makes pixel distances proportional to physical distances
//! before tracking. Estimating the transform is a separate concern; this
//! module only applies a supplied mapping.

use nalgebra::{Matrix3, Vector3};

use crate::tracker::Frame;

/// A 3x3 projective transform between pixel coordinate systems.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Homography {
    h: Matrix3<f64>,
}

impl Homography {
    pub fn new(h: Matrix3<f64>) -> Self {
        Self { h }
    }

    pub fn from_array(rows: [[f64; 3]; 3]) -> Self {
        Self::new(Matrix3::from_row_slice(&[
            rows[0][0], rows[0][1], rows[0][2], rows[1][0], rows[1][1], rows[1][2], rows[2][0],
            rows[2][1], rows[2][2],
        ]))
    }

    pub fn identity() -> Self {
        Self::new(Matrix3::identity())
    }

    #[inline]
    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        let v = self.h * Vector3::new(x, y, 1.0);
        (v[0] / v[2], v[1] / v[2])
    }

    pub fn inverse(&self) -> Option<Self> {
        self.h.try_inverse().map(Self::new)
    }
}

/// Trait for per-frame geometric rectification.
pub trait Rectifier {
    /// Pixel size of rectified frames.
    fn output_size(&self) -> (usize, usize);

    /// Produce the rectified version of `frame`, keeping its index.
    fn rectify(&self, frame: &Frame) -> Frame;
}

/// Rectifier backed by a homography mapping rectified pixels to source
/// pixels, sampled bilinearly.
#[derive(Debug, Clone)]
pub struct HomographyRectifier {
    img_from_rect: Homography,
    width: usize,
    height: usize,
}

impl HomographyRectifier {
    /// `img_from_rect` maps rectified coordinates into the source frame.
    pub fn new(img_from_rect: Homography, width: usize, height: usize) -> Self {
        Self {
            img_from_rect,
            width,
            height,
        }
    }
}

impl Rectifier for HomographyRectifier {
    fn output_size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    fn rectify(&self, frame: &Frame) -> Frame {
        let mut data = Vec::with_capacity(self.width * self.height);
        for y in 0..self.height {
            for x in 0..self.width {
                let (sx, sy) = self.img_from_rect.apply(x as f64, y as f64);
                data.push(frame.sample_bilinear(sx, sy));
            }
        }
        Frame::new(frame.index, self.width, self.height, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_homography_is_noop() {
        let frame = Frame::from_fn(2, 8, 8, |x, y| (x * 10 + y) as f32);
        let rect = HomographyRectifier::new(Homography::identity(), 8, 8);
        let out = rect.rectify(&frame);
        assert_eq!(out.index, 2);
        for y in 0..8 {
            for x in 0..8 {
                assert!((out.value(x, y) - frame.value(x, y)).abs() < 1e-4);
            }
        }
    }

    #[test]
    fn test_translation_shifts_samples() {
        let frame = Frame::from_fn(0, 8, 8, |x, y| (y * 8 + x) as f32);
        // rectified (x, y) samples source (x + 2, y + 1)
        let h = Homography::from_array([[1.0, 0.0, 2.0], [0.0, 1.0, 1.0], [0.0, 0.0, 1.0]]);
        let rect = HomographyRectifier::new(h, 4, 4);
        assert_eq!(rect.output_size(), (4, 4));
        let out = rect.rectify(&frame);
        assert_eq!(out.width, 4);
        assert!((out.value(0, 0) - frame.value(2, 1)).abs() < 1e-4);
        assert!((out.value(1, 2) - frame.value(3, 3)).abs() < 1e-4);
    }

    #[test]
    fn test_homography_apply_normalizes() {
        let h = Homography::from_array([[2.0, 0.0, 0.0], [0.0, 2.0, 0.0], [0.0, 0.0, 2.0]]);
        let (x, y) = h.apply(3.0, 4.0);
        assert!((x - 3.0).abs() < 1e-12);
        assert!((y - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_inverse_round_trips() {
        let h = Homography::from_array([[1.5, 0.1, 3.0], [0.0, 0.9, -2.0], [0.0, 0.0, 1.0]]);
        let inv = h.inverse().unwrap();
        let (x, y) = h.apply(5.0, 7.0);
        let (bx, by) = inv.apply(x, y);
        assert!((bx - 5.0).abs() < 1e-9);
        assert!((by - 7.0).abs() < 1e-9);
    }
}
