//! NED and ENU measurement models
//!
//! Every piece of fusion math that depends on the earth frame lives here as a
//! method on [`Frame`]: the complementary error-quaternion steps, the
//! Madgwick objective gradients and the Mahony field references. ENU models
//! are the NED ones after a fixed change of reference axes.

#[allow(unused_imports)]
use nalgebra::ComplexField;
use nalgebra::Vector3;

use crate::error::MatrixError;
use crate::matrix::Matrix;
use crate::model;
use crate::quaternion::Quaternion;
use crate::types::{Frame, Strategy};

/// Keeps the complementary accelerometer error quaternion off `w = 0`
const ERROR_OFFSET: f32 = 1.0e-5;

impl Frame {
    /// Sign applied to the configured gravity magnitude
    pub fn gravity_sign(self) -> f32 {
        match self {
            Frame::Ned => -1.0,
            Frame::Enu => 1.0,
        }
    }

    /// True when this frame has a measurement model for `strategy`
    pub fn supports(self, strategy: Strategy) -> bool {
        !matches!((self, strategy), (Frame::Enu, Strategy::KalmanComplementaryMagnetic))
    }

    /// One step of the complementary accelerometer error quaternion
    ///
    /// `previous` is the last error quaternion and `gravity` the normalized
    /// accelerometer reading expressed in the current estimate's frame. The
    /// step is a contraction towards the rotation that aligns `gravity` with
    /// the frame's down axis, so repeated calls converge.
    pub fn accelerometer_error_step(self, previous: &Quaternion, gravity: &Vector3<f32>) -> Quaternion {
        let g = match self {
            Frame::Ned => *gravity,
            Frame::Enu => -*gravity,
        };
        let (gx, gy, gz) = (g.x as f64, g.y as f64, g.z as f64);
        let (w, x, y, z) = (previous.w as f64, previous.x as f64, previous.y as f64, previous.z as f64);

        let w = (((-gz + 1.0) * w + gy * x - gx * y) * 0.5) as f32;
        let x_next = ((gy * w as f64 + (gz + 1.0) * x - gx * z) * 0.5) as f32;
        let y_next = ((-gx * w as f64 + (gz + 1.0) * y - gy * z) * 0.5) as f32;

        let w = if w > 0.0 { w + ERROR_OFFSET } else { w - ERROR_OFFSET };
        Quaternion::new(w, x_next, y_next, 0.0)
    }

    /// One step of the complementary magnetometer error quaternion
    ///
    /// Returns the next error quaternion (a pure heading rotation) and the
    /// field reference `[mn, 0, md]` observed in the tilt-corrected frame.
    pub fn magnetometer_error_step(self, previous: &Quaternion, field: &Vector3<f32>) -> (Quaternion, Vector3<f32>) {
        // ENU north lies on +y
        let m = match self {
            Frame::Ned => *field,
            Frame::Enu => Vector3::new(field.y, -field.x, field.z),
        };
        let mn = (m.x * m.x + m.y * m.y).sqrt();
        let md = m.z;

        let (mx, my, mz) = (m.x as f64, m.y as f64, m.z as f64);
        let (mn64, md64) = (mn as f64, md as f64);
        let (w, z) = (previous.w as f64, previous.z as f64);

        let w = (((md64 * mz + mn64 * mx + 1.0) * w + mn64 * my * z) * 0.5) as f32;
        let z = ((mn64 * my * w as f64 + (md64 * mz - mn64 * mx + 1.0) * z) * 0.5) as f32;

        (Quaternion::new(w, 0.0, 0.0, z), Vector3::new(mn, 0.0, md))
    }

    /// Gradient of the Madgwick gravity objective at `q`
    ///
    /// `accelerometer` must be normalized. The result is not normalized.
    pub fn madgwick_gradient(self, q: &Quaternion, accelerometer: &Vector3<f32>) -> Quaternion {
        let (q0, q1, q2, q3) = (q.w, q.x, q.y, q.z);
        let (ax2, ay2, az2) = (2.0 * accelerometer.x, 2.0 * accelerometer.y, 2.0 * accelerometer.z);
        let s = 4.0 * q.norm_squared();

        match self {
            Frame::Ned => Quaternion::new(
                (az2 + s) * q0 + ay2 * q1 - ax2 * q2,
                (-az2 + s) * q1 + ay2 * q0 + ax2 * q3,
                (-az2 + s) * q2 - ax2 * q0 + ay2 * q3,
                (az2 + s) * q3 + ax2 * q1 + ay2 * q2,
            ),
            Frame::Enu => Quaternion::new(
                (-az2 + s) * q0 - ay2 * q1 + ax2 * q2,
                (az2 + s) * q1 - ay2 * q0 - ax2 * q3,
                (az2 + s) * q2 + ax2 * q0 - ay2 * q3,
                (-az2 + s) * q3 - ax2 * q1 - ay2 * q2,
            ),
        }
    }

    /// Gradient of the combined gravity and magnetic Madgwick objective at `q`
    ///
    /// `accelerometer` and `magnetometer` must be normalized; `rotated` is the
    /// magnetometer reading rotated by `q`.
    pub fn madgwick_magnetic_gradient(
        self,
        q: &Quaternion,
        accelerometer: &Vector3<f32>,
        magnetometer: &Vector3<f32>,
        rotated: &Vector3<f32>,
    ) -> Quaternion {
        let (q0, q1, q2, q3) = (q.w, q.x, q.y, q.z);
        let (ax2, ay2, az2) = (2.0 * accelerometer.x, 2.0 * accelerometer.y, 2.0 * accelerometer.z);
        let (mx2, my2, mz2) = (2.0 * magnetometer.x, 2.0 * magnetometer.y, 2.0 * magnetometer.z);
        let s = 4.0 * q.norm_squared();

        let mn = (rotated.x * rotated.x + rotated.y * rotated.y).sqrt();
        match self {
            Frame::Ned => {
                let md = rotated.z;
                let k = md * md * s + mn * mn * s;
                Quaternion::new(
                    (k - mx2 * mn - mz2 * md + az2 + s) * q0 + (mx2 * q2 - my2 * q1) * md + (my2 * q3 - mz2 * q2) * mn
                        + q1 * ay2
                        - q2 * ax2,
                    (k - mx2 * mn + mz2 * md - az2 + s) * q1 + (-mx2 * q3 - my2 * q0) * md + (-my2 * q2 - mz2 * q3) * mn
                        + q0 * ay2
                        + q3 * ax2,
                    (k + mx2 * mn + mz2 * md - az2 + s) * q2 + (mx2 * q0 - my2 * q3) * md + (-my2 * q1 - mz2 * q0) * mn
                        - q0 * ax2
                        + q3 * ay2,
                    (k + mx2 * mn - mz2 * md + az2 + s) * q3 + (-mx2 * q1 - my2 * q2) * md + (my2 * q0 - mz2 * q1) * mn
                        + q1 * ax2
                        + q2 * ay2,
                )
            }
            Frame::Enu => {
                // down component, z points up
                let md = -rotated.z;
                let k = md * md * s + mn * mn * s;
                Quaternion::new(
                    (k - my2 * mn + mz2 * md - az2 + s) * q0 + (-mx2 * q2 + my2 * q1) * md + (-mx2 * q3 + mz2 * q1) * mn
                        - q1 * ay2
                        + q2 * ax2,
                    (k + my2 * mn - mz2 * md + az2 + s) * q1 + (mx2 * q3 + my2 * q0) * md + (-mx2 * q2 + mz2 * q0) * mn
                        - q0 * ay2
                        - q3 * ax2,
                    (k - my2 * mn - mz2 * md + az2 + s) * q2 + (-mx2 * q0 + my2 * q3) * md + (-mx2 * q1 - mz2 * q3) * mn
                        + q0 * ax2
                        - q3 * ay2,
                    (k + my2 * mn + mz2 * md - az2 + s) * q3 + (mx2 * q1 + my2 * q2) * md + (-mx2 * q0 - mz2 * q2) * mn
                        - q1 * ax2
                        - q2 * ay2,
                )
            }
        }
    }

    /// Accelerometer direction fed to the Mahony error, from a normalized reading
    pub fn mahony_gravity(self, accelerometer: &Vector3<f32>) -> Vector3<f32> {
        match self {
            Frame::Ned => -*accelerometer,
            Frame::Enu => *accelerometer,
        }
    }

    /// Half of the expected magnetic field direction in the sensor frame
    ///
    /// `horizontal` and `vertical` are the earth-frame field components
    /// `bh = |(hx, hy)|` and `bz` of the rotated measurement.
    pub fn mahony_field(self, q: &Quaternion, horizontal: f32, vertical: f32) -> Vector3<f32> {
        let (q0, q1, q2, q3) = (q.w, q.x, q.y, q.z);
        let (bh, bz) = (horizontal, vertical);

        let q0q1 = q0 * q1;
        let q0q2 = q0 * q2;
        let q0q3 = q0 * q3;
        let q1q1 = q1 * q1;
        let q1q2 = q1 * q2;
        let q1q3 = q1 * q3;
        let q2q2 = q2 * q2;
        let q2q3 = q2 * q3;
        let q3q3 = q3 * q3;

        let vertical_axis = Vector3::new(q1q3 - q0q2, q0q1 + q2q3, 0.5 - q1q1 - q2q2);
        let north_axis = match self {
            Frame::Ned => Vector3::new(0.5 - q2q2 - q3q3, q1q2 - q0q3, q0q2 + q1q3),
            Frame::Enu => Vector3::new(q1q2 + q0q3, 0.5 - q1q1 - q3q3, q2q3 - q0q1),
        };
        north_axis * bh + vertical_axis * bz
    }

    /// Measurement Jacobian of the Kalman complementary strategies
    ///
    /// Without a magnetometer the linearization is frame independent. The
    /// magnetic form exists for NED only.
    pub fn kalman_jacobian(
        self,
        z: &Quaternion,
        magnetic: Option<(&Vector3<f32>, &Vector3<f32>, &Vector3<f32>)>,
    ) -> Result<Option<Matrix>, MatrixError> {
        match (self, magnetic) {
            (_, None) => model::accelerometer_jacobian(z).map(Some),
            (Frame::Ned, Some((magnetometer, reference, accelerometer))) => {
                model::magnetic_jacobian(magnetometer, reference, accelerometer, z).map(Some)
            }
            (Frame::Enu, Some(_)) => Ok(None),
        }
    }
}
