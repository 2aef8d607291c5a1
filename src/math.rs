//! Numeric helpers shared by the fusion strategies

use nalgebra::Vector3;

/// Degrees to radians
pub const DEG_TO_RAD: f32 = core::f32::consts::PI / 180.0;
/// Radians to degrees
pub const RAD_TO_DEG: f32 = 180.0 / core::f32::consts::PI;

/// Fast inverse square root
///
/// Bit-level initial guess refined by two Newton-Raphson steps. Returns 0 for
/// non-positive input so that normalizing a zero vector yields a zero vector.
pub fn fast_inverse_sqrt(x: f32) -> f32 {
    if x <= 0.0 {
        return 0.0;
    }

    let half_x = 0.5 * x;
    let mut i = x.to_bits();
    i = 0x5f3759df - (i >> 1);
    let mut y = f32::from_bits(i);

    y = y * (1.5 - (half_x * y * y));
    y = y * (1.5 - (half_x * y * y));

    y
}

/// Sensor vector helpers
pub trait Vector3Ext {
    /// Scale to unit length with [`fast_inverse_sqrt`]; zero stays zero
    fn fast_normalize(&self) -> Vector3<f32>;

    /// True when every component is exactly zero
    fn is_zero(&self) -> bool;

    /// Convert degrees to radians
    fn deg_to_rad(&self) -> Vector3<f32>;

    /// Convert radians to degrees
    fn rad_to_deg(&self) -> Vector3<f32>;
}

impl Vector3Ext for Vector3<f32> {
    fn fast_normalize(&self) -> Vector3<f32> {
        *self * fast_inverse_sqrt(self.norm_squared())
    }

    fn is_zero(&self) -> bool {
        self.x == 0.0 && self.y == 0.0 && self.z == 0.0
    }

    fn deg_to_rad(&self) -> Vector3<f32> {
        *self * DEG_TO_RAD
    }

    fn rad_to_deg(&self) -> Vector3<f32> {
        *self * RAD_TO_DEG
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fast_inverse_sqrt() {
        for x in [0.25f32, 1.0, 4.0, 96.2361, 1.0e4] {
            let expected = 1.0 / x.sqrt();
            let result = fast_inverse_sqrt(x);
            assert!(
                (result - expected).abs() / expected < 1e-5,
                "x = {x}: {result} vs {expected}"
            );
        }
    }

    #[test]
    fn test_fast_inverse_sqrt_non_positive() {
        assert_eq!(fast_inverse_sqrt(0.0), 0.0);
        assert_eq!(fast_inverse_sqrt(-1.0), 0.0);
    }

    #[test]
    fn test_fast_normalize() {
        let v = Vector3::new(0.0f32, 0.0, 9.81).fast_normalize();
        assert!((v.z - 1.0).abs() < 1e-5);
        assert_eq!(v.x, 0.0);

        let zero = Vector3::<f32>::zeros().fast_normalize();
        assert!(zero.is_zero());
    }

    #[test]
    fn test_angle_conversions() {
        let v = Vector3::new(180.0f32, 90.0, -45.0).deg_to_rad();
        assert!((v.x - core::f32::consts::PI).abs() < 1e-6);
        let back = v.rad_to_deg();
        assert!((back.z + 45.0).abs() < 1e-4);
    }
}
