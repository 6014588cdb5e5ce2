use nalgebra::{Matrix3, Vector3};

/// Vehicle attitude as Euler angles in radians.
///
/// The body-to-world rotation is built in the intrinsic order
/// R = Rz(yaw) * Ry(pitch) * Rx(roll).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Attitude {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

impl Attitude {
    pub fn new(roll: f64, pitch: f64, yaw: f64) -> Self {
        Self { roll, pitch, yaw }
    }

    /// Builds an attitude from a `[roll, pitch, yaw]` vector.
    pub fn from_vector(v: Vector3<f64>) -> Self {
        Self::new(v[0], v[1], v[2])
    }

    pub fn to_vector(&self) -> Vector3<f64> {
        Vector3::new(self.roll, self.pitch, self.yaw)
    }

    /// Body-to-world rotation matrix for this attitude.
    ///
    /// Recomputed on every call; the attitude changes every tick so nothing is cached.
    pub fn rotation_matrix(&self) -> Matrix3<f64> {
        rotation_matrix(self)
    }
}

/// Computes R = Rz(ψ) * (Ry(θ) * Rx(φ)) from the elementary right-handed rotations.
pub fn rotation_matrix(attitude: &Attitude) -> Matrix3<f64> {
    let (sin_phi, cos_phi) = attitude.roll.sin_cos();
    let (sin_theta, cos_theta) = attitude.pitch.sin_cos();
    let (sin_psi, cos_psi) = attitude.yaw.sin_cos();

    #[rustfmt::skip]
    let rx = Matrix3::new(
        1.0, 0.0, 0.0,
        0.0, cos_phi, -sin_phi,
        0.0, sin_phi, cos_phi,
    );
    #[rustfmt::skip]
    let ry = Matrix3::new(
        cos_theta, 0.0, sin_theta,
        0.0, 1.0, 0.0,
        -sin_theta, 0.0, cos_theta,
    );
    #[rustfmt::skip]
    let rz = Matrix3::new(
        cos_psi, -sin_psi, 0.0,
        sin_psi, cos_psi, 0.0,
        0.0, 0.0, 1.0,
    );

    rz * (ry * rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use nalgebra::Rotation3;
    use std::f64::consts::{FRAC_PI_2, PI};

    fn sample_attitudes() -> Vec<Attitude> {
        let angles = [-PI, -2.0, -FRAC_PI_2, -0.3, 0.0, 0.1, 0.7, FRAC_PI_2, 2.5, PI];
        let mut out = Vec::new();
        for &roll in &angles {
            for &pitch in &angles {
                for &yaw in &angles {
                    out.push(Attitude::new(roll, pitch, yaw));
                }
            }
        }
        out
    }

    #[test]
    fn test_zero_attitude_is_identity() {
        let r = Attitude::default().rotation_matrix();
        assert_eq!(r, Matrix3::identity());
    }

    #[test]
    fn test_rotation_is_orthonormal() {
        for attitude in sample_attitudes() {
            let r = attitude.rotation_matrix();
            assert_abs_diff_eq!(r * r.transpose(), Matrix3::identity(), epsilon = 1e-12);
            assert_abs_diff_eq!(r.determinant(), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_matches_nalgebra_euler_convention() {
        for attitude in sample_attitudes() {
            let expected = Rotation3::from_euler_angles(attitude.roll, attitude.pitch, attitude.yaw);
            assert_abs_diff_eq!(
                attitude.rotation_matrix(),
                *expected.matrix(),
                epsilon = 1e-12
            );
        }
    }

    #[test]
    fn test_pure_yaw_rotates_north_to_east() {
        let r = Attitude::new(0.0, 0.0, FRAC_PI_2).rotation_matrix();
        let east = r * Vector3::new(1.0, 0.0, 0.0);
        assert_abs_diff_eq!(east, Vector3::new(0.0, 1.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_r33_is_product_of_tilt_cosines() {
        let attitude = Attitude::new(0.3, -0.4, 1.2);
        let r = attitude.rotation_matrix();
        assert_relative_eq!(r[(2, 2)], 0.3_f64.cos() * (-0.4_f64).cos(), epsilon = 1e-12);
    }
}
