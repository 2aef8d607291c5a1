//! Pitch and roll from a single accelerometer reading
//!
//! Useful as a sanity check against the fused estimate or to seed a
//! strategy on a stationary device. Both angles are in radians.

#[allow(unused_imports)]
use nalgebra::{ComplexField, RealField};
use nalgebra::Vector3;

/// Pitch angle `atan2(y, sqrt(x² + z²))`
///
/// # Example
/// ```
/// use nalgebra::Vector3;
/// use kalman_ahrs::tilt::accelerometer_pitch;
///
/// let pitch = accelerometer_pitch(Vector3::new(0.0, 0.0, 9.81));
/// assert!(pitch.abs() < 1e-6);
/// ```
pub fn accelerometer_pitch(accelerometer: Vector3<f32>) -> f32 {
    let a = accelerometer;
    a.y.atan2((a.x * a.x + a.z * a.z).sqrt())
}

/// Roll angle `-atan2(x, sqrt(y² + z²))`
pub fn accelerometer_roll(accelerometer: Vector3<f32>) -> f32 {
    let a = accelerometer;
    -a.x.atan2((a.y * a.y + a.z * a.z).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::f32::consts::FRAC_PI_4;

    const EPSILON: f32 = 1e-5;

    #[test]
    fn test_level_device() {
        for a in [Vector3::new(0.0, 0.0, 9.81), Vector3::new(0.0, 0.0, -9.81)] {
            assert!(accelerometer_pitch(a).abs() < EPSILON);
            assert!(accelerometer_roll(a).abs() < EPSILON);
        }
    }

    #[test]
    fn test_tilted_45_degrees() {
        let g = 9.81 / 2.0f32.sqrt();

        let pitch = accelerometer_pitch(Vector3::new(0.0, g, g));
        assert!((pitch - FRAC_PI_4).abs() < EPSILON);

        let roll = accelerometer_roll(Vector3::new(g, 0.0, g));
        assert!((roll + FRAC_PI_4).abs() < EPSILON);
    }

    #[test]
    fn test_vertical_axis_sign_does_not_matter() {
        let up = accelerometer_pitch(Vector3::new(0.1, 2.0, 9.5));
        let down = accelerometer_pitch(Vector3::new(0.1, 2.0, -9.5));
        assert!((up - down).abs() < EPSILON);
    }
}
