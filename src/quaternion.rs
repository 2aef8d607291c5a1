//! Quaternion algebra used by every fusion strategy
//!
//! Components are stored as `(w, x, y, z)`. Operations that end in a
//! normalization keep the quaternion on the unit sphere; plain sums and scalar
//! multiples do not, which the startup averaging relies on.

use core::ops::{Add, AddAssign, Mul, Neg, Sub};

#[allow(unused_imports)]
use nalgebra::{ComplexField, RealField};
use nalgebra::{UnitQuaternion, Vector3};

use crate::math::fast_inverse_sqrt;

/// Component-wise tolerance used by [`Quaternion::approx_eq`] callers
pub const QUATERNION_EPSILON: f32 = 1e-4;

/// Reciprocal-sine limit above which [`Quaternion::slerp`] falls back to averaging
const SLERP_INVERSE_SINE_LIMIT: f32 = 1.0e3;

/// Rotation quaternion `w + xi + yj + zk`
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Quaternion {
    pub w: f32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Quaternion {
    pub const fn new(w: f32, x: f32, y: f32, z: f32) -> Self {
        Self { w, x, y, z }
    }

    /// The no-rotation quaternion `(1, 0, 0, 0)`
    pub const fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 0.0)
    }

    /// All-zero quaternion, the neutral element of addition
    pub const fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0, 0.0)
    }

    /// Build from a scalar part and a vector part
    pub fn from_parts(w: f32, vector: Vector3<f32>) -> Self {
        Self::new(w, vector.x, vector.y, vector.z)
    }

    /// Pure quaternion `(0, v)`
    pub fn pure(vector: Vector3<f32>) -> Self {
        Self::from_parts(0.0, vector)
    }

    pub fn from_array(values: [f32; 4]) -> Self {
        Self::new(values[0], values[1], values[2], values[3])
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.w, self.x, self.y, self.z]
    }

    /// Vector part `(x, y, z)`
    pub fn vector(&self) -> Vector3<f32> {
        Vector3::new(self.x, self.y, self.z)
    }

    /// Rotation of `angle` radians about a unit `axis`
    ///
    /// # Example
    /// ```
    /// use nalgebra::Vector3;
    /// use kalman_ahrs::Quaternion;
    ///
    /// let q = Quaternion::from_axis_angle(Vector3::z(), core::f32::consts::FRAC_PI_2);
    /// let v = q.rotate(Vector3::x());
    /// assert!((v.y - 1.0).abs() < 1e-6);
    /// ```
    pub fn from_axis_angle(axis: Vector3<f32>, angle: f32) -> Self {
        let half = 0.5 * angle;
        Self::from_parts(half.cos(), axis * half.sin())
    }

    /// Rotation about the x axis
    pub fn from_x_rotation(angle: f32) -> Self {
        Self::from_axis_angle(Vector3::x(), angle)
    }

    /// Rotation about the y axis
    pub fn from_y_rotation(angle: f32) -> Self {
        Self::from_axis_angle(Vector3::y(), angle)
    }

    /// Rotation about the z axis
    pub fn from_z_rotation(angle: f32) -> Self {
        Self::from_axis_angle(Vector3::z(), angle)
    }

    /// Unit axis and angle in radians of a unit quaternion
    ///
    /// A zero rotation has no defined axis; `x` is returned in that case.
    pub fn to_axis_angle(&self) -> (Vector3<f32>, f32) {
        let angle = 2.0 * self.w.clamp(-1.0, 1.0).acos();
        if self.w < 1.0 {
            let multiplier = 1.0 / (1.0 - self.w * self.w).sqrt();
            (self.vector() * multiplier, angle)
        } else {
            (Vector3::x(), angle)
        }
    }

    /// Build from `[roll, pitch, yaw]` in radians, applied in Z-Y-X order
    pub fn from_euler_zyx(euler: Vector3<f32>) -> Self {
        let (sr, cr) = (0.5 * euler.x).sin_cos();
        let (sp, cp) = (0.5 * euler.y).sin_cos();
        let (sy, cy) = (0.5 * euler.z).sin_cos();

        Self::new(
            cy * cr * cp + sy * sr * sp,
            cy * sr * cp - sy * cr * sp,
            cy * cr * sp + sy * sr * cp,
            sy * cr * cp - cy * sr * sp,
        )
    }

    /// `[roll, pitch, yaw]` in radians
    ///
    /// Pitch saturates at ±π/2 when `|sin(pitch)| >= 1` (gimbal lock).
    pub fn to_euler_zyx(&self) -> Vector3<f32> {
        let sinr_cosp = 2.0 * (self.w * self.x + self.y * self.z);
        let cosr_cosp = 1.0 - 2.0 * (self.x * self.x + self.y * self.y);
        let roll = sinr_cosp.atan2(cosr_cosp);

        let sinp = 2.0 * (self.w * self.y - self.z * self.x);
        let pitch = if sinp.abs() >= 1.0 {
            core::f32::consts::FRAC_PI_2.copysign(sinp)
        } else {
            sinp.asin()
        };

        let siny_cosp = 2.0 * (self.w * self.z + self.x * self.y);
        let cosy_cosp = 1.0 - 2.0 * (self.y * self.y + self.z * self.z);
        let yaw = siny_cosp.atan2(cosy_cosp);

        Vector3::new(roll, pitch, yaw)
    }

    pub fn conjugate(&self) -> Self {
        Self::new(self.w, -self.x, -self.y, -self.z)
    }

    pub fn dot(&self, other: &Self) -> f32 {
        self.w * other.w + self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn norm_squared(&self) -> f32 {
        self.dot(self)
    }

    pub fn norm(&self) -> f32 {
        self.norm_squared().sqrt()
    }

    /// Divide by the norm
    ///
    /// The norm must be non-zero; a zero quaternion yields non-finite
    /// components rather than a silent identity.
    pub fn normalize(&self) -> Self {
        *self * (1.0 / self.norm())
    }

    /// Normalize with the approximate inverse square root
    ///
    /// Used on the per-sample path. A zero quaternion stays zero.
    pub fn fast_normalize(&self) -> Self {
        *self * fast_inverse_sqrt(self.norm_squared())
    }

    /// Angle `acos(q1 · q2)` between two unit quaternions
    pub fn angle_between(&self, other: &Self) -> f32 {
        self.dot(other).clamp(-1.0, 1.0).acos()
    }

    /// Component-wise comparison within `epsilon`
    pub fn approx_eq(&self, other: &Self, epsilon: f32) -> bool {
        (self.w - other.w).abs() <= epsilon
            && (self.x - other.x).abs() <= epsilon
            && (self.y - other.y).abs() <= epsilon
            && (self.z - other.z).abs() <= epsilon
    }

    /// Rotate a vector using the expanded sandwich-product formula
    pub fn rotate(&self, v: Vector3<f32>) -> Vector3<f32> {
        let (w, x, y, z) = (self.w, self.x, self.y, self.z);

        let ww = w * w;
        let xx = x * x;
        let yy = y * y;
        let zz = z * z;
        let wx = w * x;
        let wy = w * y;
        let wz = w * z;
        let xy = x * y;
        let xz = x * z;
        let yz = y * z;

        Vector3::new(
            ww * v.x + 2.0 * wy * v.z - 2.0 * wz * v.y + xx * v.x + 2.0 * xy * v.y
                + 2.0 * xz * v.z
                - zz * v.x
                - yy * v.x,
            2.0 * xy * v.x + yy * v.y + 2.0 * yz * v.z + 2.0 * wz * v.x - zz * v.y + ww * v.y
                - 2.0 * wx * v.z
                - xx * v.y,
            2.0 * xz * v.x + 2.0 * yz * v.y + zz * v.z - 2.0 * wy * v.x - yy * v.z
                + 2.0 * wx * v.y
                - xx * v.z
                + ww * v.z,
        )
    }

    /// Spherical linear interpolation from `self` (`t = 0`) to `other` (`t = 1`)
    ///
    /// Coincident inputs return `self`. When the half-angle sine is too small
    /// to divide by, the plain average `0.5 * (self + other)` is returned
    /// without renormalization.
    pub fn slerp(&self, other: &Self, t: f32) -> Self {
        let cos_half_theta = self.dot(other);
        if cos_half_theta.abs() >= 1.0 {
            return *self;
        }

        let half_theta = cos_half_theta.acos();
        let inverse_sin_half_theta = 1.0 / (1.0 - cos_half_theta * cos_half_theta).sqrt();
        if inverse_sin_half_theta.abs() > SLERP_INVERSE_SINE_LIMIT {
            return *self * 0.5 + *other * 0.5;
        }

        let ratio_a = ((1.0 - t) * half_theta).sin() * inverse_sin_half_theta;
        let ratio_b = (t * half_theta).sin() * inverse_sin_half_theta;
        *self * ratio_a + *other * ratio_b
    }

    /// Linear blend followed by renormalization
    pub fn lerp(&self, other: &Self, t: f32) -> Self {
        (*self * (1.0 - t) + *other * t).normalize()
    }

    /// Convert to a nalgebra unit quaternion, normalizing on the way
    pub fn to_unit(self) -> UnitQuaternion<f32> {
        UnitQuaternion::new_normalize(self.into())
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::identity()
    }
}

/// Hamilton product; `a * b` applies `b` first, then `a`
impl Mul for Quaternion {
    type Output = Quaternion;

    fn mul(self, rhs: Quaternion) -> Quaternion {
        Quaternion::new(
            self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
            self.x * rhs.w + self.w * rhs.x + self.y * rhs.z - self.z * rhs.y,
            self.w * rhs.y - self.x * rhs.z + self.y * rhs.w + self.z * rhs.x,
            self.w * rhs.z + self.x * rhs.y - self.y * rhs.x + self.z * rhs.w,
        )
    }
}

impl Mul<f32> for Quaternion {
    type Output = Quaternion;

    fn mul(self, scalar: f32) -> Quaternion {
        Quaternion::new(self.w * scalar, self.x * scalar, self.y * scalar, self.z * scalar)
    }
}

impl Add for Quaternion {
    type Output = Quaternion;

    fn add(self, rhs: Quaternion) -> Quaternion {
        Quaternion::new(self.w + rhs.w, self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl AddAssign for Quaternion {
    fn add_assign(&mut self, rhs: Quaternion) {
        *self = *self + rhs;
    }
}

impl Sub for Quaternion {
    type Output = Quaternion;

    fn sub(self, rhs: Quaternion) -> Quaternion {
        Quaternion::new(self.w - rhs.w, self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Neg for Quaternion {
    type Output = Quaternion;

    fn neg(self) -> Quaternion {
        Quaternion::new(-self.w, -self.x, -self.y, -self.z)
    }
}

impl From<Quaternion> for nalgebra::Quaternion<f32> {
    fn from(q: Quaternion) -> Self {
        nalgebra::Quaternion::new(q.w, q.x, q.y, q.z)
    }
}

impl From<nalgebra::Quaternion<f32>> for Quaternion {
    fn from(q: nalgebra::Quaternion<f32>) -> Self {
        Quaternion::new(q.w, q.i, q.j, q.k)
    }
}

impl From<UnitQuaternion<f32>> for Quaternion {
    fn from(q: UnitQuaternion<f32>) -> Self {
        q.into_inner().into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::f32::consts::{FRAC_PI_2, FRAC_PI_4, PI};

    const EPSILON: f32 = 1e-5;

    fn sample() -> Quaternion {
        Quaternion::new(0.5, -0.3, 0.7, 0.2).normalize()
    }

    #[test]
    fn test_hamilton_product_basis() {
        let i = Quaternion::new(0.0, 1.0, 0.0, 0.0);
        let j = Quaternion::new(0.0, 0.0, 1.0, 0.0);
        let k = Quaternion::new(0.0, 0.0, 0.0, 1.0);

        assert_eq!(i * j, k);
        assert_eq!(j * i, -k);
        assert_eq!(i * i, Quaternion::new(-1.0, 0.0, 0.0, 0.0));
    }

    #[test]
    fn test_product_matches_nalgebra() {
        let a = sample();
        let b = Quaternion::from_euler_zyx(Vector3::new(0.2, -0.4, 1.1));
        let ours = a * b;
        let theirs: Quaternion = (nalgebra::Quaternion::from(a) * nalgebra::Quaternion::from(b)).into();
        assert!(ours.approx_eq(&theirs, EPSILON));
    }

    #[test]
    fn test_rotate_matches_nalgebra() {
        let q = sample();
        let v = Vector3::new(1.5, -2.0, 0.25);
        let ours = q.rotate(v);
        let theirs = q.to_unit() * v;
        assert!((ours - theirs).norm() < 1e-5, "{ours:?} vs {theirs:?}");
    }

    #[test]
    fn test_normalize() {
        let q = Quaternion::new(2.0, 0.0, 0.0, 0.0).normalize();
        assert_eq!(q, Quaternion::identity());

        let q = Quaternion::new(1.0, 2.0, 3.0, 4.0).fast_normalize();
        assert!((q.norm() - 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_fast_normalize_zero() {
        assert_eq!(Quaternion::zero().fast_normalize(), Quaternion::zero());
    }

    #[test]
    fn test_axis_angle_round_trip() {
        let axis = Vector3::new(1.0, 2.0, -2.0) / 3.0;
        let q = Quaternion::from_axis_angle(axis, 1.2);
        let (back_axis, angle) = q.to_axis_angle();
        assert!((angle - 1.2).abs() < EPSILON);
        assert!((back_axis - axis).norm() < 1e-4);
    }

    #[test]
    fn test_axis_angle_identity() {
        let (axis, angle) = Quaternion::identity().to_axis_angle();
        assert_eq!(axis, Vector3::x());
        assert_eq!(angle, 0.0);
    }

    #[test]
    fn test_single_axis_rotations() {
        let v = Quaternion::from_x_rotation(FRAC_PI_2).rotate(Vector3::y());
        assert!((v - Vector3::z()).norm() < EPSILON);

        let v = Quaternion::from_y_rotation(FRAC_PI_2).rotate(Vector3::z());
        assert!((v - Vector3::x()).norm() < EPSILON);

        let v = Quaternion::from_z_rotation(FRAC_PI_2).rotate(Vector3::x());
        assert!((v - Vector3::y()).norm() < EPSILON);
    }

    #[test]
    fn test_euler_round_trip() {
        let euler = Vector3::new(0.3, -0.6, 2.4);
        let back = Quaternion::from_euler_zyx(euler).to_euler_zyx();
        assert!((back - euler).norm() < 1e-4, "{back:?}");
    }

    #[test]
    fn test_euler_gimbal_lock() {
        let q = Quaternion::from_y_rotation(FRAC_PI_2);
        let euler = q.to_euler_zyx();
        assert!((euler.y - FRAC_PI_2).abs() < 1e-3);

        let q = Quaternion::from_y_rotation(-FRAC_PI_2);
        assert!((q.to_euler_zyx().y + FRAC_PI_2).abs() < 1e-3);
    }

    #[test]
    fn test_angle_between() {
        let a = Quaternion::identity();
        let b = Quaternion::from_z_rotation(FRAC_PI_2);
        assert!((a.angle_between(&b) - FRAC_PI_4).abs() < EPSILON);
        assert_eq!(a.angle_between(&a), 0.0);
    }

    #[test]
    fn test_slerp_endpoints() {
        let a = Quaternion::identity();
        let b = Quaternion::from_z_rotation(1.0);
        assert!(a.slerp(&b, 0.0).approx_eq(&a, EPSILON));
        assert!(a.slerp(&b, 1.0).approx_eq(&b, EPSILON));

        let mid = a.slerp(&b, 0.5);
        assert!(mid.approx_eq(&Quaternion::from_z_rotation(0.5), EPSILON));
    }

    #[test]
    fn test_slerp_degenerate_falls_back_to_average() {
        // largest f32 below 1, so the half-angle sine is about 3.5e-4
        let a = Quaternion::identity();
        let b = Quaternion::new(0.99999994, 3.45e-4, 0.0, 0.0);
        let result = a.slerp(&b, 0.3);
        assert_eq!(result, a * 0.5 + b * 0.5);
        assert!(result.w.is_finite());
    }

    #[test]
    fn test_lerp_is_normalized() {
        let a = Quaternion::identity();
        let b = Quaternion::from_x_rotation(0.4);
        let q = a.lerp(&b, 0.25);
        assert!((q.norm() - 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_conjugate_inverts_rotation() {
        let q = sample();
        let v = Vector3::new(0.1, 0.2, 0.3);
        let back = q.conjugate().rotate(q.rotate(v));
        assert!((back - v).norm() < EPSILON);
    }

    #[test]
    fn test_nalgebra_conversion() {
        let q = Quaternion::from_euler_zyx(Vector3::new(0.1, 0.2, PI / 3.0));
        let unit = q.to_unit();
        let back: Quaternion = unit.into();
        assert!(back.approx_eq(&q, EPSILON));
    }
}
