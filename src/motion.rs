use nalgebra::{SMatrix, SVector, Vector2};

/// Constant-velocity filter over one track's centroid.
///
/// State is `[x, y, vx, vy]`. Each missed frame runs `predict` without a
/// matching `update`, which accumulates process noise in the covariance:
/// a reappearing track is therefore fused with a larger gain than one seen
/// every frame. Velocity components are clamped so a long miss streak
/// cannot extrapolate a track across the frame.
pub struct CentroidFilter {
    x: SVector<f64, 4>,
    p: SMatrix<f64, 4, 4>,
    f: SMatrix<f64, 4, 4>,
    q: SMatrix<f64, 4, 4>,
    h: SMatrix<f64, 2, 4>,
    r: SMatrix<f64, 2, 2>,
    velocity_clamp: f64,
}

impl CentroidFilter {
    pub fn new(centroid: Vector2<f64>, velocity_clamp: f64) -> Self {
        let mut f = SMatrix::<f64, 4, 4>::identity();
        f[(0, 2)] = 1.0;
        f[(1, 3)] = 1.0;

        let q_diag = SVector::<f64, 4>::new(1.0, 1.0, 0.1, 0.1);
        let q = SMatrix::<f64, 4, 4>::from_diagonal(&q_diag);

        // Position is observed directly, velocity starts unobserved with a
        // wide prior.
        let p_diag = SVector::<f64, 4>::new(10.0, 10.0, 1000.0, 1000.0);
        let p = SMatrix::<f64, 4, 4>::from_diagonal(&p_diag);

        let mut h = SMatrix::<f64, 2, 4>::zeros();
        h[(0, 0)] = 1.0;
        h[(1, 1)] = 1.0;

        let r_diag = SVector::<f64, 2>::new(4.0, 4.0);
        let r = SMatrix::<f64, 2, 2>::from_diagonal(&r_diag);

        let x = SVector::<f64, 4>::new(centroid.x, centroid.y, 0.0, 0.0);

        Self {
            x,
            p,
            f,
            q,
            h,
            r,
            velocity_clamp,
        }
    }

    /// Advances the state one frame and returns the predicted centroid.
    pub fn predict(&mut self) -> Vector2<f64> {
        self.x = self.f * self.x;
        self.p = self.f * self.p * self.f.transpose() + self.q;
        self.clamp_velocity();

        self.position()
    }

    /// Fuses an observed centroid into the state and returns the corrected
    /// centroid.
    pub fn update(&mut self, observed: Vector2<f64>) -> Vector2<f64> {
        let innovation = observed - self.h * self.x;
        let s = self.h * self.p * self.h.transpose() + self.r;

        // S is positive definite for any valid R; skip the fusion on the
        // degenerate numerical case instead of diverging.
        if let Some(s_inv) = s.try_inverse() {
            let gain = self.p * self.h.transpose() * s_inv;
            self.x += gain * innovation;
            self.p = (SMatrix::<f64, 4, 4>::identity() - gain * self.h) * self.p;
            self.clamp_velocity();
        }

        self.position()
    }

    pub fn position(&self) -> Vector2<f64> {
        Vector2::new(self.x[0], self.x[1])
    }

    pub fn velocity(&self) -> Vector2<f64> {
        Vector2::new(self.x[2], self.x[3])
    }

    /// Summed position variance, grows every predict-only frame.
    pub fn position_uncertainty(&self) -> f64 {
        self.p[(0, 0)] + self.p[(1, 1)]
    }

    fn clamp_velocity(&mut self) {
        self.x[2] = self.x[2].clamp(-self.velocity_clamp, self.velocity_clamp);
        self.x[3] = self.x[3].clamp(-self.velocity_clamp, self.velocity_clamp);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_static_observations_converge_on_position() {
        let mut filter = CentroidFilter::new(Vector2::new(10.0, 10.0), 25.0);

        for _ in 0..5 {
            filter.predict();
            filter.update(Vector2::new(10.0, 10.0));
        }

        let position = filter.position();
        assert_relative_eq!(position.x, 10.0, epsilon = 0.1);
        assert_relative_eq!(position.y, 10.0, epsilon = 0.1);
        assert_relative_eq!(filter.velocity().norm(), 0.0, epsilon = 0.1);
    }

    #[test]
    fn test_constant_motion_is_learned() {
        let mut filter = CentroidFilter::new(Vector2::new(0.0, 50.0), 25.0);

        for step in 1..=10 {
            filter.predict();
            filter.update(Vector2::new(step as f64 * 5.0, 50.0));
        }

        let predicted = filter.predict();
        assert_relative_eq!(predicted.x, 55.0, epsilon = 2.0);
        assert_relative_eq!(predicted.y, 50.0, epsilon = 1.0);
        assert_relative_eq!(filter.velocity().x, 5.0, epsilon = 1.0);
    }

    #[test]
    fn test_uncertainty_grows_across_missed_frames() {
        let mut filter = CentroidFilter::new(Vector2::new(0.0, 0.0), 25.0);
        filter.predict();
        filter.update(Vector2::new(0.0, 0.0));

        let settled = filter.position_uncertainty();
        filter.predict();
        let after_one_miss = filter.position_uncertainty();
        filter.predict();
        let after_two_misses = filter.position_uncertainty();

        assert!(after_one_miss > settled);
        assert!(after_two_misses > after_one_miss);
    }

    #[test]
    fn test_velocity_is_clamped() {
        let mut filter = CentroidFilter::new(Vector2::new(0.0, 0.0), 3.0);

        for step in 1..=10 {
            filter.predict();
            filter.update(Vector2::new(step as f64 * 100.0, 0.0));
        }

        assert!(filter.velocity().x.abs() <= 3.0);
        assert!(filter.velocity().y.abs() <= 3.0);
    }
}
