//! Sensor correction applied to every sample before fusion

use nalgebra::{Matrix3, Vector3};

/// Adds a constant bias to a gyroscope or accelerometer reading
///
/// # Example
/// ```
/// use nalgebra::Vector3;
/// use kalman_ahrs::calibration::apply_bias;
///
/// let gyro = apply_bias(Vector3::new(0.02, -0.01, 0.0), Vector3::new(-0.02, 0.01, 0.0));
/// assert_eq!(gyro, Vector3::zeros());
/// ```
pub fn apply_bias(raw: Vector3<f32>, bias: Vector3<f32>) -> Vector3<f32> {
    raw + bias
}

/// Removes hard-iron and soft-iron distortion from a magnetometer reading
///
/// Computes `soft_iron * (raw - hard_iron)`, where `soft_iron` is the inverse
/// of the distortion matrix.
///
/// # Arguments
/// * `raw` - Uncorrected magnetometer reading
/// * `hard_iron` - Additive field offset
/// * `soft_iron` - Inverse soft-iron correction matrix
///
/// # Example
/// ```
/// use nalgebra::{Matrix3, Vector3};
/// use kalman_ahrs::calibration::correct_magnetometer;
///
/// let raw = Vector3::new(30.0, -5.0, 42.0);
/// let hard_iron = Vector3::new(10.0, -5.0, 2.0);
///
/// let corrected = correct_magnetometer(raw, hard_iron, Matrix3::identity());
/// assert_eq!(corrected, Vector3::new(20.0, 0.0, 40.0));
/// ```
pub fn correct_magnetometer(raw: Vector3<f32>, hard_iron: Vector3<f32>, soft_iron: Matrix3<f32>) -> Vector3<f32> {
    soft_iron * (raw - hard_iron)
}
