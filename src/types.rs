//! Configuration, strategy selection and per-sample types

use nalgebra::{Matrix3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Earth reference frame of the orientation estimate
///
/// # Conventions
/// - **NED**: North-East-Down (X=North, Y=East, Z=Down), gravity `[0, 0, -1]` in
///   the sensor frame at rest
/// - **ENU**: East-North-Up (X=East, Y=North, Z=Up), gravity `[0, 0, 1]`
///
/// # Example
/// ```
/// use kalman_ahrs::{AhrsConfig, Frame};
///
/// let config = AhrsConfig {
///     frame: Frame::Enu,
///     ..Default::default()
/// };
/// assert_eq!(config.frame, Frame::Enu);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Frame {
    /// North-East-Down
    #[default]
    Ned,
    /// East-North-Up
    Enu,
}

/// Whether the engine allocates the Kalman matrices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum UpdateType {
    /// Kalman matrices are created; every strategy is available
    #[default]
    Kalman,
    /// No Kalman matrices; Kalman-hybrid strategies are rejected
    Direct,
}

/// Fusion strategy run on every sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Strategy {
    /// Gyroscope integration only
    GyroscopeOnly,
    /// Orientation from the accelerometer error quaternion alone
    AccelerometerOnly,
    /// Heading from the magnetometer error quaternion alone
    MagnetometerOnly,
    /// Gyroscope integration blended with the accelerometer error quaternion
    Complementary,
    /// [`Strategy::Complementary`] followed by a magnetometer heading correction
    ComplementaryMagnetic,
    /// Gradient-descent correction from the accelerometer
    Madgwick,
    /// Gradient-descent correction from accelerometer and magnetometer
    MadgwickMagnetic,
    /// Proportional-integral correction from the accelerometer
    Mahony,
    /// Proportional-integral correction from accelerometer and magnetometer
    MahonyMagnetic,
    /// Kalman filter measuring the complementary accelerometer estimate
    KalmanComplementary,
    /// Kalman filter measuring the complementary accelerometer and magnetometer estimate
    KalmanComplementaryMagnetic,
    /// Kalman filter measuring the Madgwick estimate
    KalmanMadgwick,
}

impl Strategy {
    pub const ALL: [Strategy; 12] = [
        Strategy::GyroscopeOnly,
        Strategy::AccelerometerOnly,
        Strategy::MagnetometerOnly,
        Strategy::Complementary,
        Strategy::ComplementaryMagnetic,
        Strategy::Madgwick,
        Strategy::MadgwickMagnetic,
        Strategy::Mahony,
        Strategy::MahonyMagnetic,
        Strategy::KalmanComplementary,
        Strategy::KalmanComplementaryMagnetic,
        Strategy::KalmanMadgwick,
    ];

    /// True for strategies that drive the Kalman filter
    pub fn requires_kalman(self) -> bool {
        matches!(
            self,
            Strategy::KalmanComplementary | Strategy::KalmanComplementaryMagnetic | Strategy::KalmanMadgwick
        )
    }

    /// True for strategies that read the magnetometer
    pub fn uses_magnetometer(self) -> bool {
        matches!(
            self,
            Strategy::MagnetometerOnly
                | Strategy::ComplementaryMagnetic
                | Strategy::MadgwickMagnetic
                | Strategy::MahonyMagnetic
                | Strategy::KalmanComplementaryMagnetic
        )
    }

    /// True for strategies that read the accelerometer
    pub fn uses_accelerometer(self) -> bool {
        !matches!(self, Strategy::GyroscopeOnly | Strategy::MagnetometerOnly)
    }
}

/// AHRS engine configuration
///
/// Consumed by value at construction. The engine keeps its own copy, so the
/// gravity sign adjustment for NED never reaches the caller's record.
///
/// # Example
/// ```
/// use kalman_ahrs::{AhrsConfig, Frame, UpdateType};
/// use nalgebra::Vector3;
///
/// let config = AhrsConfig {
///     frame: Frame::Enu,
///     update_type: UpdateType::Direct,
///     accelerometer_gain: 0.5,
///     gyroscope_bias: Vector3::new(-0.01, 0.002, 0.0),
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AhrsConfig {
    /// Accelerometer influence in `[0, 1]`
    ///
    /// Interpolation factor of the complementary strategies, gradient step
    /// gain of Madgwick and proportional gain of Mahony.
    pub accelerometer_gain: f32,
    /// Magnetometer influence
    ///
    /// Interpolation factor of the magnetic complementary strategies and
    /// integral gain of Mahony (zero or below disables the integral term).
    pub magnetometer_gain: f32,
    /// Gravity per axis in m/s², positive; negated internally for NED
    pub gravity: Vector3<f32>,
    /// Added to every gyroscope sample (rad/s)
    pub gyroscope_bias: Vector3<f32>,
    /// Added to every accelerometer sample (m/s²)
    pub accelerometer_bias: Vector3<f32>,
    /// Subtracted from every magnetometer sample (µT)
    pub hard_iron_offset: Vector3<f32>,
    /// Applied to the magnetometer after the hard-iron offset
    pub soft_iron_matrix: Matrix3<f32>,
    /// Gyroscope noise variance per axis, drives the Kalman process noise
    pub gyroscope_variance: Vector3<f32>,
    /// Accelerometer noise variance per axis
    pub accelerometer_variance: Vector3<f32>,
    /// Magnetometer noise variance per axis
    pub magnetometer_variance: Vector3<f32>,
    pub frame: Frame,
    pub update_type: UpdateType,
}

impl Default for AhrsConfig {
    fn default() -> Self {
        Self {
            accelerometer_gain: 0.9,
            magnetometer_gain: 1.0,
            gravity: Vector3::repeat(9.81),
            gyroscope_bias: Vector3::zeros(),
            accelerometer_bias: Vector3::zeros(),
            hard_iron_offset: Vector3::zeros(),
            soft_iron_matrix: Matrix3::identity(),
            gyroscope_variance: Vector3::repeat(0.1),
            accelerometer_variance: Vector3::repeat(0.015),
            magnetometer_variance: Vector3::repeat(0.0015),
            frame: Frame::default(),
            update_type: UpdateType::default(),
        }
    }
}

/// One set of raw sensor readings
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SensorSample {
    /// Angular rate in rad/s
    pub gyroscope: Vector3<f32>,
    /// Specific force in m/s²
    pub accelerometer: Vector3<f32>,
    /// Magnetic field in µT
    pub magnetometer: Vector3<f32>,
    /// Seconds since the previous sample, finite and positive
    pub delta_time: f32,
}

impl SensorSample {
    pub fn new(gyroscope: Vector3<f32>, accelerometer: Vector3<f32>, magnetometer: Vector3<f32>, delta_time: f32) -> Self {
        Self {
            gyroscope,
            accelerometer,
            magnetometer,
            delta_time,
        }
    }
}

/// Sample counts of the startup calibration
///
/// The first `discard` samples let the filter settle; the next `mean`
/// estimates are averaged into the reference orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CalibrationPlan {
    pub discard: u32,
    pub mean: u32,
}

impl Default for CalibrationPlan {
    fn default() -> Self {
        Self { discard: 200, mean: 100 }
    }
}

/// Progress reported by [`Ahrs::calibrate`](crate::Ahrs::calibrate)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationStatus {
    /// More samples are needed
    InProgress,
    /// Reference orientation installed and configured gains restored
    Done,
}
