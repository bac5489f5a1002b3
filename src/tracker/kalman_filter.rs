//! Constant-velocity Kalman filter for marker centers, using ndarray and a
//! nalgebra-based inverse.
//!
//! State is (cx, cy, vx, vy); measurements are box centers (cx, cy).
//! Noise scales with the marker box height, so larger markers tolerate
//! larger pixel motion.

use ndarray::{Array1, Array2};

#[derive(Debug, Clone)]
pub struct KalmanFilter {
    motion_mat: Array2<f64>,
    update_mat: Array2<f64>,
    std_weight_position: f64,
    std_weight_velocity: f64,
}

impl Default for KalmanFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl KalmanFilter {
    pub fn new() -> Self {
        let ndim = 2;
        let mut motion_mat = Array2::eye(2 * ndim);
        for i in 0..ndim {
            motion_mat[[i, ndim + i]] = 1.0;
        }

        let mut update_mat = Array2::zeros((ndim, 2 * ndim));
        for i in 0..ndim {
            update_mat[[i, i]] = 1.0;
        }

        Self {
            motion_mat,
            update_mat,
            std_weight_position: 1.0 / 20.0,
            std_weight_velocity: 1.0 / 160.0,
        }
    }

    /// Start a new track from a measured center; `h` is the marker box height.
    pub fn initiate(&self, measurement: [f64; 2], h: f64) -> (Array1<f64>, Array2<f64>) {
        let mut mean = Array1::zeros(4);
        mean[0] = measurement[0];
        mean[1] = measurement[1];

        let std = [
            2.0 * self.std_weight_position * h,
            2.0 * self.std_weight_position * h,
            10.0 * self.std_weight_velocity * h,
            10.0 * self.std_weight_velocity * h,
        ];

        let mut cov = Array2::zeros((4, 4));
        for i in 0..4 {
            cov[[i, i]] = std[i] * std[i];
        }

        (mean, cov)
    }

    pub fn predict(
        &self,
        mean: &Array1<f64>,
        covariance: &Array2<f64>,
        h: f64,
    ) -> (Array1<f64>, Array2<f64>) {
        let std = [
            self.std_weight_position * h,
            self.std_weight_position * h,
            self.std_weight_velocity * h,
            self.std_weight_velocity * h,
        ];

        let mut motion_cov = Array2::zeros((4, 4));
        for i in 0..4 {
            motion_cov[[i, i]] = std[i] * std[i];
        }

        let new_mean = self.motion_mat.dot(mean);
        let new_covariance = self.motion_mat.dot(covariance).dot(&self.motion_mat.t()) + motion_cov;

        (new_mean, new_covariance)
    }

    pub fn project(
        &self,
        mean: &Array1<f64>,
        covariance: &Array2<f64>,
        h: f64,
    ) -> (Array1<f64>, Array2<f64>) {
        let std = [self.std_weight_position * h, self.std_weight_position * h];

        let mut innovation_cov = Array2::zeros((2, 2));
        for i in 0..2 {
            innovation_cov[[i, i]] = std[i] * std[i];
        }

        let mean_proj = self.update_mat.dot(mean);
        let covariance_proj =
            self.update_mat.dot(covariance).dot(&self.update_mat.t()) + innovation_cov;

        (mean_proj, covariance_proj)
    }

    pub fn update(
        &self,
        mean: &Array1<f64>,
        covariance: &Array2<f64>,
        measurement: [f64; 2],
        h: f64,
    ) -> (Array1<f64>, Array2<f64>) {
        let (projected_mean, projected_cov) = self.project(mean, covariance, h);

        let measurement_arr = Array1::from_vec(measurement.to_vec());
        let innovation = measurement_arr - projected_mean;

        // K = P * H^T * S^-1
        // Since H is [I 0], P * H^T is the first 2 columns of P (4x2).
        // S is projected_cov (2x2).

        // We use nalgebra internally for 2x2 inversion to avoid BLAS/LAPACK.
        let s_inv = self.invert_2x2(&projected_cov);

        let pht = covariance.dot(&self.update_mat.t()); // 4x2
        let kalman_gain = pht.dot(&s_inv); // 4x2

        let new_mean = mean + kalman_gain.dot(&innovation);
        let new_covariance = covariance - kalman_gain.dot(&projected_cov).dot(&kalman_gain.t());

        (new_mean, new_covariance)
    }

    /// Helper to invert a 2x2 matrix using nalgebra (pure Rust).
    fn invert_2x2(&self, m: &Array2<f64>) -> Array2<f64> {
        let nm = nalgebra::Matrix2::new(m[[0, 0]], m[[0, 1]], m[[1, 0]], m[[1, 1]]);
        let inv = nm.try_inverse().expect("2x2 matrix inversion failed");
        let mut res = Array2::zeros((2, 2));
        for i in 0..2 {
            for j in 0..2 {
                res[[i, j]] = inv[(i, j)];
            }
        }
        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initiate() {
        let kf = KalmanFilter::new();
        let (mean, _) = kf.initiate([100.0, 200.0], 16.0);
        assert_eq!(mean[0], 100.0);
        assert_eq!(mean[1], 200.0);
        assert_eq!(mean[2], 0.0);
    }

    #[test]
    fn test_predict_carries_velocity() {
        let kf = KalmanFilter::new();
        let (mut mean, cov) = kf.initiate([10.0, 20.0], 16.0);
        mean[2] = 3.0;
        mean[3] = -1.0;
        let (next, _) = kf.predict(&mean, &cov, 16.0);
        assert!((next[0] - 13.0).abs() < 1e-9);
        assert!((next[1] - 19.0).abs() < 1e-9);
    }

    #[test]
    fn test_update_moves_toward_measurement() {
        let kf = KalmanFilter::new();
        let (mean, cov) = kf.initiate([0.0, 0.0], 16.0);
        let (mean, cov) = kf.predict(&mean, &cov, 16.0);
        let (mean, _) = kf.update(&mean, &cov, [10.0, 10.0], 16.0);
        assert!(mean[0] > 0.0 && mean[0] < 10.0);
        assert!(mean[1] > 0.0 && mean[1] < 10.0);
    }
}
