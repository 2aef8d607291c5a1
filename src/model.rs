//! Process and measurement models of the quaternion Kalman filter
//!
//! The filter state is the orientation quaternion `[q0, q1, q2, q3]`. The
//! gyroscope drives a first-order transition, and the complementary error
//! quaternion is the measurement. Its noise is the accelerometer and
//! magnetometer noise `N` (6x6) mapped through a Jacobian `J` (4x6) of the
//! measurement with respect to the normalized sensor readings: `R = J·N·Jᵗ`.

use nalgebra::Vector3;

use crate::error::MatrixError;
use crate::matrix::Matrix;
use crate::quaternion::Quaternion;

/// Kalman state length (a quaternion)
pub const STATE_SIZE: usize = 4;
/// Accelerometer and magnetometer axes feeding the measurement noise
pub const SENSOR_NOISE_SIZE: usize = 6;

/// Initial estimate covariance diagonal
pub const INITIAL_COVARIANCE: f32 = 500.0;
/// Initial process noise diagonal
pub const INITIAL_PROCESS_NOISE: f32 = 1.0e-6;
/// Initial measurement noise diagonal
pub const INITIAL_MEASUREMENT_NOISE: f32 = 1.5e-5;

/// First-order quaternion transition for one gyroscope step
///
/// With `T = ω·dt/2` this is `I + Ω(T)`, the linearized form of
/// `q ← q ⊗ exp(−T)` in the conjugate convention the engine integrates in.
pub fn transition(gyroscope: &Vector3<f32>, delta_time: f32) -> Result<Matrix, MatrixError> {
    let half_t = 0.5 * delta_time;
    let tx = half_t * gyroscope.x;
    let ty = half_t * gyroscope.y;
    let tz = half_t * gyroscope.z;

    #[rustfmt::skip]
    let f = [
        1.0,  tx,   ty,   tz,
        -tx,  1.0,  tz,   -ty,
        -ty,  -tz,  1.0,  tx,
        -tz,  ty,   -tx,  1.0,
    ];
    Matrix::from_row_slice(STATE_SIZE, STATE_SIZE, &f)
}

/// Process noise of the transition for the given gyroscope variance
pub fn process_noise(variance: &Vector3<f32>, q: &Quaternion, delta_time: f32) -> Result<Matrix, MatrixError> {
    let (gx, gy, gz) = (variance.x, variance.y, variance.z);
    let (q0, q1, q2, q3) = (q.w, q.x, q.y, q.z);
    let d = 0.25 * delta_time * delta_time;

    let q01 = -d * (q3 * (gy - gz) * q2 + q1 * gx * q0);
    let q02 = (q3 * (gx - gz) * q1 - q2 * gy * q0) * d;
    let q03 = -d * (q2 * (gx - gy) * q1 + q3 * gz * q0);
    let q12 = -d * (q3 * (gx - gy) * q0 + q2 * gz * q1);
    let q13 = d * (q2 * (gx - gz) * q0 - q3 * gy * q1);
    let q23 = -d * (q1 * (gy - gz) * q0 + q3 * gx * q2);

    #[rustfmt::skip]
    let noise = [
        (q1 * q1 * gx + q2 * q2 * gy + q3 * q3 * gz) * d, q01, q02, q03,
        q01, (q0 * q0 * gx + q3 * q3 * gy + q2 * q2 * gz) * d, q12, q13,
        q02, q12, (q3 * q3 * gx + q0 * q0 * gy + q1 * q1 * gz) * d, q23,
        q03, q13, q23, (q2 * q2 * gx + q1 * q1 * gy + q0 * q0 * gz) * d,
    ];
    Matrix::from_row_slice(STATE_SIZE, STATE_SIZE, &noise)
}

/// Sensor noise `N = diag(accelerometer variance, magnetometer variance)`
pub fn sensor_noise(accelerometer: &Vector3<f32>, magnetometer: &Vector3<f32>) -> Result<Matrix, MatrixError> {
    Matrix::from_diagonal(&[
        accelerometer.x,
        accelerometer.y,
        accelerometer.z,
        magnetometer.x,
        magnetometer.y,
        magnetometer.z,
    ])
}

/// Measurement Jacobian of the accelerometer-only error quaternion
///
/// The magnetometer columns are zero.
pub fn accelerometer_jacobian(q: &Quaternion) -> Result<Matrix, MatrixError> {
    let (q0, q1, q2, q3) = (q.w, q.x, q.y, q.z);

    #[rustfmt::skip]
    let j = [
        -q2, q1,  -q0, 0.0, 0.0, 0.0,
        -q3, q0,  q1,  0.0, 0.0, 0.0,
        -q0, -q3, q2,  0.0, 0.0, 0.0,
        -q1, -q2, -q3, 0.0, 0.0, 0.0,
    ];
    Matrix::from_row_slice(STATE_SIZE, SENSOR_NOISE_SIZE, &j)
}

/// Measurement Jacobian of the NED accelerometer and magnetometer error quaternion
///
/// `magnetometer` and `accelerometer` are normalized sensor-frame readings,
/// `reference` is the horizontal/down field `[mn, 0, md]` found by the
/// magnetometer error step. The linearization switches form on the sign of
/// the vertical acceleration to stay clear of its singularity.
pub fn magnetic_jacobian(
    magnetometer: &Vector3<f32>,
    reference: &Vector3<f32>,
    accelerometer: &Vector3<f32>,
    q: &Quaternion,
) -> Result<Matrix, MatrixError> {
    let (mx, my, mz) = (magnetometer.x, magnetometer.y, magnetometer.z);
    let (mn, md) = (reference.x, reference.z);
    let (ax, ay, az) = (accelerometer.x, accelerometer.y, accelerometer.z);
    let (q0, q1, q2, q3) = (q.w, q.x, q.y, q.z);

    let c = md * mz * q0 + mn * mx * q0 + mn * my * q3 + q0;
    let e = mz * q3 * md - mx * q3 * mn + mn * my * q0 + q3;
    let norm3 = q0 * q0 + q1 * q1 + q2 * q2 - 1.0;

    let j = if az > 0.0 {
        let a = -(ax * q1 * q3 - ay * q0 * q1 - az * q1 * q1 - az * q2 * q2 + q1 * q1 + q2 * q2 + az - 1.0);
        let b = -ay * q0 + (-az - 1.0) * q1 + ax * q3;
        let h = norm3 * ax + ((az + 1.0) * q1 + ay * q0) * q3;
        let tilt = -2.0 * q0 * q0 - q1 * q1 - q2 * q2 + 1.0;

        [
            e * q1,
            q1 * c,
            mz * tilt * md + mx * (q1 * q1 + q2 * q2 - 1.0) * mn + tilt,
            a * mn,
            (ax * q0 + ay * q3) * mn * q1,
            (tilt * az + q1 * q1 + (ax * q3 + ay * q0) * q1 + 2.0 * q0 * q0 + q2 * q2 - 1.0) * md,
            (norm3 * my - mx * q0 * q3) * mn - (mz * md + 1.0) * q3 * q0,
            q0 * c,
            q1 * c,
            -b * mn * q0,
            mn * h,
            -b * md * q0,
            (norm3 * mx + q3 * my * q0) * mn - norm3 * (mz * md + 1.0),
            -e * q0,
            -e * q1,
            mn * h,
            b * mn * q0,
            -md * h,
            -q1 * c,
            e * q1,
            my * mn * (q1 * q1 + q2 * q2 - 1.0) - 2.0 * (mz * md + 1.0) * q3 * q0,
            -(ax * q0 + ay * q3) * mn * q1,
            a * mn,
            -md * (((2.0 * az - 2.0) * q3 + ax * q1) * q0 - ay * q1 * q3),
        ]
    } else {
        let f = (az - 1.0) * q0 + ax * q2 - ay * q1;
        let p = ay * q0 * q0 + (ax * q3 + (az + 1.0) * q1) * q0 - q2 * (az + 1.0) * q3;
        let r = ax * q0 * q0 + (-ay * q3 - (az + 1.0) * q2) * q0 - q1 * q3 * (az + 1.0);

        [
            (-(q2 as f64) * c as f64) as f32,
            (q1 as f64 * c as f64) as f32,
            -q0 * c,
            -f * mn * q0,
            -f * mn * q3,
            -f * md * q0,
            -e * q0,
            q0 * c,
            ((mx * q1 + my * q2) * q0 - q3 * (mx * q2 - my * q1)) * mn + (q0 * q1 + q2 * q3) * (mz * md + 1.0),
            mn * p,
            -mn * r,
            -(-ay * q0 * q0 + (ax * q3 - (az + 1.0) * q1) * q0 - q2 * (az + 1.0) * q3) * md,
            -q0 * c,
            -e * q0,
            ((mx * q2 - my * q1) * q0 + q3 * (mx * q1 + my * q2)) * mn + (q0 * q2 - q1 * q3) * (mz * md + 1.0),
            -mn * r,
            -mn * p,
            -md * (ax * q0 * q0 + (ay * q3 - (az + 1.0) * q2) * q0 + q1 * q3 * (az + 1.0)),
            -e * q2,
            e * q1,
            -e * q0,
            f * mn * q3,
            -f * mn * q0,
            -md * q3 * f,
        ]
    };
    Matrix::from_row_slice(STATE_SIZE, SENSOR_NOISE_SIZE, &j)
}

/// Gravity in the sensor frame for the estimate `q`
///
/// `constant` carries the frame sign: negative components for NED.
pub fn gravity(q: &Quaternion, constant: &Vector3<f32>) -> Vector3<f32> {
    let (q0, q1, q2, q3) = (q.w, q.x, q.y, q.z);
    Vector3::new(
        2.0 * (q0 * q2 + q1 * q3) * constant.x,
        2.0 * (q2 * q3 - q0 * q1) * constant.y,
        (q0 * q0 - q1 * q1 - q2 * q2 + q3 * q3) * constant.z,
    )
}
