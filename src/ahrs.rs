//! AHRS engine: strategy dispatch, working quaternions and outputs

use log::debug;
#[allow(unused_imports)]
use nalgebra::ComplexField;
use nalgebra::Vector3;

use crate::calibration::{apply_bias, correct_magnetometer};
use crate::error::{AhrsError, MatrixError};
use crate::kalman::{KalmanDimensions, KalmanFilter};
use crate::math::Vector3Ext;
use crate::matrix::{Matrix, multiply, transpose};
use crate::model;
use crate::quaternion::Quaternion;
use crate::startup::StartupCalibration;
use crate::types::{AhrsConfig, Frame, SensorSample, Strategy, UpdateType};

/// Error quaternions with `w` above this are close enough to identity to lerp
const BLEND_THRESHOLD: f32 = 0.9;

/// Filter influence applied on the next fusion step
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Gains {
    pub accelerometer: f32,
    pub magnetometer: f32,
}

impl Gains {
    pub(crate) const FULL: Gains = Gains {
        accelerometer: 1.0,
        magnetometer: 1.0,
    };

    fn from_config(config: &AhrsConfig) -> Self {
        Self {
            accelerometer: config.accelerometer_gain,
            magnetometer: config.magnetometer_gain,
        }
    }
}

/// Kalman filter plus the sensor noise its measurement covariance is built from
#[derive(Debug, Clone)]
pub(crate) struct KalmanCore {
    pub filter: KalmanFilter,
    sensor_noise: Matrix,
}

impl KalmanCore {
    fn new(config: &AhrsConfig) -> Result<Self, AhrsError> {
        let mut core = Self {
            filter: KalmanFilter::new(KalmanDimensions::identity(model::STATE_SIZE))?,
            sensor_noise: model::sensor_noise(&config.accelerometer_variance, &config.magnetometer_variance)?,
        };
        core.seed()?;
        Ok(core)
    }

    /// `F = I`, `X = [1, 0, 0, 0]`, `P = 500 I`, `Q = 1e-6 I`, `R = 1.5e-5 I`
    fn seed(&mut self) -> Result<(), AhrsError> {
        let n = model::STATE_SIZE;
        self.filter.set_transition(&Matrix::identity(n)?)?;
        write_column(self.filter.state_mut(), &Quaternion::identity());
        self.reset_covariance()?;

        let q = self.filter.process_noise_mut();
        q.set_identity()?;
        q.scale_mut(model::INITIAL_PROCESS_NOISE);

        let r = self.filter.measurement_noise_mut();
        r.set_identity()?;
        r.scale_mut(model::INITIAL_MEASUREMENT_NOISE);
        Ok(())
    }

    pub(crate) fn reset_covariance(&mut self) -> Result<(), MatrixError> {
        let p = self.filter.covariance_mut();
        p.set_identity()?;
        p.scale_mut(model::INITIAL_COVARIANCE);
        Ok(())
    }
}

/// Quaternions and accumulators carried from one sample to the next
#[derive(Debug, Clone, Copy, PartialEq)]
struct WorkingState {
    /// Current orientation estimate
    estimate: Quaternion,
    accelerometer_error: Quaternion,
    magnetometer_error: Quaternion,
    /// Madgwick integration state, the conjugate of its estimate
    gradient_state: Quaternion,
    /// `[mn, 0, md]` from the last magnetometer error step
    magnetic_reference: Vector3<f32>,
    /// Mahony integral feedback
    integral_error: Vector3<f32>,
}

impl Default for WorkingState {
    fn default() -> Self {
        Self {
            estimate: Quaternion::identity(),
            accelerometer_error: Quaternion::identity(),
            magnetometer_error: Quaternion::identity(),
            gradient_state: Quaternion::identity(),
            magnetic_reference: Vector3::zeros(),
            integral_error: Vector3::zeros(),
        }
    }
}

/// Attitude and heading reference system
///
/// Fuses gyroscope, accelerometer and magnetometer samples into an
/// orientation quaternion with one of the [`Strategy`] algorithms. Each
/// instance owns all of its state, so several engines can run side by side.
///
/// # Example
/// ```
/// use kalman_ahrs::{Ahrs, AhrsConfig, Frame, SensorSample, Strategy};
/// use nalgebra::Vector3;
///
/// let config = AhrsConfig { frame: Frame::Enu, ..Default::default() };
/// let mut ahrs = Ahrs::new(config, Strategy::Complementary).unwrap();
///
/// let sample = SensorSample::new(
///     Vector3::zeros(),
///     Vector3::new(0.0, 0.0, 9.81),
///     Vector3::new(0.0, 20.0, -40.0),
///     0.01,
/// );
/// for _ in 0..100 {
///     ahrs.update(&sample).unwrap();
/// }
///
/// let gravity = ahrs.gravity();
/// assert!((gravity.z - 9.81).abs() < 1e-3);
/// ```
#[derive(Debug, Clone)]
pub struct Ahrs {
    config: AhrsConfig,
    strategy: Strategy,
    pub(crate) gains: Gains,
    pub(crate) kalman: Option<KalmanCore>,
    working: WorkingState,
    /// Startup reference correction, fixed between calibrations
    pub(crate) diff: Quaternion,
    output: Quaternion,
    gravity: Vector3<f32>,
    /// Last bias-corrected accelerometer sample
    accelerometer: Vector3<f32>,
    pub(crate) startup: StartupCalibration,
}

impl Ahrs {
    /// Create an engine running `strategy`
    ///
    /// Fails when `strategy` needs Kalman matrices the configuration does not
    /// allocate, or when the configured frame has no measurement model for it.
    pub fn new(config: AhrsConfig, strategy: Strategy) -> Result<Self, AhrsError> {
        let mut config = config;
        config.gravity *= config.frame.gravity_sign();
        validate(&config, strategy)?;

        let kalman = match config.update_type {
            UpdateType::Kalman => Some(KalmanCore::new(&config)?),
            UpdateType::Direct => None,
        };

        debug!(
            "AHRS created: frame {:?}, strategy {:?}, update type {:?}",
            config.frame, strategy, config.update_type
        );

        Ok(Self {
            gains: Gains::from_config(&config),
            config,
            strategy,
            kalman,
            working: WorkingState::default(),
            diff: Quaternion::identity(),
            output: Quaternion::identity(),
            gravity: Vector3::zeros(),
            accelerometer: Vector3::zeros(),
            startup: StartupCalibration::default(),
        })
    }

    /// Fuse one sample with the active strategy
    ///
    /// Biases and magnetometer distortion from the configuration are removed
    /// first. On error the previous estimate, output quaternion and gravity
    /// are kept.
    pub fn update(&mut self, sample: &SensorSample) -> Result<(), AhrsError> {
        validate_time_step(sample.delta_time)?;
        let reading = self.correct(sample);
        self.fuse(&reading)
    }

    fn correct(&self, sample: &SensorSample) -> SensorSample {
        SensorSample {
            gyroscope: apply_bias(sample.gyroscope, self.config.gyroscope_bias),
            accelerometer: apply_bias(sample.accelerometer, self.config.accelerometer_bias),
            magnetometer: correct_magnetometer(
                sample.magnetometer,
                self.config.hard_iron_offset,
                self.config.soft_iron_matrix,
            ),
            delta_time: sample.delta_time,
        }
    }

    fn fuse(&mut self, reading: &SensorSample) -> Result<(), AhrsError> {
        let frame = self.config.frame;
        let gains = self.gains;
        let variance = self.config.gyroscope_variance;
        let strategy = self.strategy;
        let mut next = self.working;

        match strategy {
            Strategy::GyroscopeOnly => next.gyroscope_only(reading),
            Strategy::AccelerometerOnly => next.accelerometer_only(frame, reading),
            Strategy::MagnetometerOnly => next.magnetometer_only(frame, reading),
            Strategy::Complementary => next.complementary(frame, gains, reading, false),
            Strategy::ComplementaryMagnetic => next.complementary(frame, gains, reading, true),
            Strategy::Madgwick => next.madgwick(frame, gains, reading, false),
            Strategy::MadgwickMagnetic => next.madgwick(frame, gains, reading, true),
            Strategy::Mahony => next.mahony(frame, gains, reading, false),
            Strategy::MahonyMagnetic => next.mahony(frame, gains, reading, true),
            Strategy::KalmanComplementary => {
                let core = kalman_core(&mut self.kalman, strategy)?;
                next.kalman_complementary(core, frame, gains, &variance, reading, false)?
            }
            Strategy::KalmanComplementaryMagnetic => {
                let core = kalman_core(&mut self.kalman, strategy)?;
                next.kalman_complementary(core, frame, gains, &variance, reading, true)?
            }
            Strategy::KalmanMadgwick => {
                let core = kalman_core(&mut self.kalman, strategy)?;
                next.kalman_madgwick(&mut core.filter, frame, gains, reading)?
            }
        }

        self.working = next;
        self.output = next.estimate * self.diff;
        self.gravity = model::gravity(&next.estimate, &self.config.gravity);
        self.accelerometer = reading.accelerometer;
        Ok(())
    }

    /// Switch the fusion strategy, keeping the current estimate
    ///
    /// The Madgwick integration state and the Kalman state are re-seeded from
    /// the current estimate so the new strategy continues from it.
    pub fn set_strategy(&mut self, strategy: Strategy) -> Result<(), AhrsError> {
        validate(&self.config, strategy)?;

        let estimate = self.working.estimate;
        self.working.gradient_state = estimate.conjugate();
        if let Some(core) = self.kalman.as_mut() {
            write_column(core.filter.state_mut(), &estimate);
        }

        debug!("AHRS strategy {:?} -> {:?}", self.strategy, strategy);
        self.strategy = strategy;
        Ok(())
    }

    /// Return to the construction-time state
    ///
    /// Clears every working quaternion and the startup reference, re-seeds the
    /// Kalman matrices, cancels a calibration in progress and restores the
    /// configured gains.
    pub fn reset(&mut self) -> Result<(), AhrsError> {
        if let Some(core) = self.kalman.as_mut() {
            core.seed()?;
        }
        self.working = WorkingState::default();
        self.diff = Quaternion::identity();
        self.output = Quaternion::identity();
        self.gravity = Vector3::zeros();
        self.accelerometer = Vector3::zeros();
        self.gains = Gains::from_config(&self.config);
        self.startup = StartupCalibration::default();

        debug!("AHRS reset");
        Ok(())
    }

    /// Orientation corrected by the startup reference, `estimate ⊗ diff`
    pub fn quaternion(&self) -> Quaternion {
        self.output
    }

    /// Orientation estimate before the startup reference correction
    pub fn estimate(&self) -> Quaternion {
        self.working.estimate
    }

    /// Roll, pitch and yaw of [`Ahrs::quaternion`] in radians
    pub fn euler_angles(&self) -> Vector3<f32> {
        self.output.to_euler_zyx()
    }

    /// Gravity in the sensor frame for the current estimate
    pub fn gravity(&self) -> Vector3<f32> {
        self.gravity
    }

    /// Last bias-corrected accelerometer sample minus [`Ahrs::gravity`]
    pub fn linear_acceleration(&self) -> Vector3<f32> {
        self.accelerometer - self.gravity
    }

    /// Startup reference correction
    pub fn diff(&self) -> Quaternion {
        self.diff
    }

    /// Horizontal and down magnetic field components `[mn, 0, md]` seen by
    /// the last complementary magnetometer step
    pub fn magnetic_reference(&self) -> Vector3<f32> {
        self.working.magnetic_reference
    }

    /// Kalman matrices for diagnostics, absent with [`UpdateType::Direct`]
    pub fn kalman(&self) -> Option<&KalmanFilter> {
        self.kalman.as_ref().map(|core| &core.filter)
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn frame(&self) -> Frame {
        self.config.frame
    }

    /// Configuration in use, gravity already sign-adjusted for the frame
    pub fn config(&self) -> &AhrsConfig {
        &self.config
    }

    pub(crate) fn configured_gains(&self) -> Gains {
        Gains::from_config(&self.config)
    }
}

impl WorkingState {
    fn gyroscope_only(&mut self, reading: &SensorSample) {
        self.estimate = integrate_gyroscope(&self.estimate, &reading.gyroscope, reading.delta_time);
    }

    fn accelerometer_only(&mut self, frame: Frame, reading: &SensorSample) {
        let accelerometer = reading.accelerometer.fast_normalize();
        self.accelerometer_error = frame.accelerometer_error_step(&self.accelerometer_error, &accelerometer);
        self.estimate = self.accelerometer_error.normalize();
    }

    fn magnetometer_only(&mut self, frame: Frame, reading: &SensorSample) {
        let magnetometer = reading.magnetometer.fast_normalize();
        let (error, reference) = frame.magnetometer_error_step(&self.magnetometer_error, &magnetometer);
        self.magnetometer_error = error;
        self.magnetic_reference = reference;
        self.estimate = error.normalize();
    }

    /// Blend the accelerometer error into `q`
    fn correct_with_accelerometer(
        &mut self,
        frame: Frame,
        gain: f32,
        q: Quaternion,
        accelerometer: &Vector3<f32>,
    ) -> Quaternion {
        let rotated = q.conjugate().rotate(*accelerometer);
        let step = frame.accelerometer_error_step(&self.accelerometer_error, &rotated);
        self.accelerometer_error = blend(&step, gain);
        q * self.accelerometer_error
    }

    /// Blend the magnetometer heading error into `q`
    fn correct_with_magnetometer(
        &mut self,
        frame: Frame,
        gain: f32,
        q: Quaternion,
        magnetometer: &Vector3<f32>,
    ) -> Quaternion {
        let rotated = q.conjugate().rotate(*magnetometer);
        let (step, reference) = frame.magnetometer_error_step(&self.magnetometer_error, &rotated);
        self.magnetometer_error = blend(&step, gain);
        self.magnetic_reference = reference;
        q * self.magnetometer_error
    }

    fn complementary(&mut self, frame: Frame, gains: Gains, reading: &SensorSample, magnetic: bool) {
        let q = integrate_gyroscope(&self.estimate, &reading.gyroscope, reading.delta_time);
        let accelerometer = reading.accelerometer.fast_normalize();
        let mut q = self.correct_with_accelerometer(frame, gains.accelerometer, q, &accelerometer);
        if magnetic {
            let magnetometer = reading.magnetometer.fast_normalize();
            q = self.correct_with_magnetometer(frame, gains.magnetometer, q, &magnetometer);
        }
        self.estimate = q;
    }

    fn madgwick(&mut self, frame: Frame, gains: Gains, reading: &SensorSample, magnetic: bool) {
        let q = self.gradient_state;
        let mut q_dot = (q * Quaternion::pure(reading.gyroscope)) * 0.5;

        // a zero reading carries no direction, integrate the gyroscope alone
        if !reading.accelerometer.is_zero() {
            let accelerometer = reading.accelerometer.fast_normalize();
            let gradient = if magnetic {
                let magnetometer = reading.magnetometer.fast_normalize();
                let rotated = q.rotate(magnetometer);
                frame.madgwick_magnetic_gradient(&q, &accelerometer, &magnetometer, &rotated)
            } else {
                frame.madgwick_gradient(&q, &accelerometer)
            };
            q_dot = q_dot - gradient.normalize() * gains.accelerometer;
        }

        self.gradient_state = (q + q_dot * reading.delta_time).normalize();
        self.estimate = self.gradient_state.conjugate();
    }

    fn mahony(&mut self, frame: Frame, gains: Gains, reading: &SensorSample, magnetic: bool) {
        let q = self.estimate.conjugate();
        let dt = reading.delta_time;
        let mut rate = reading.gyroscope;

        if !reading.accelerometer.is_zero() {
            let accelerometer = frame.mahony_gravity(&reading.accelerometer.fast_normalize());
            let (q0, q1, q2, q3) = (q.w, q.x, q.y, q.z);
            let half_gravity = Vector3::new(q1 * q3 - q0 * q2, q0 * q1 + q2 * q3, q0 * q0 - 0.5 + q3 * q3);
            let mut half_error = accelerometer.cross(&half_gravity);

            if magnetic {
                let m = reading.magnetometer.fast_normalize();
                let h = q.rotate(m);
                let horizontal = (h.x * h.x + h.y * h.y).sqrt();
                let half_field = frame.mahony_field(&q, horizontal, h.z);
                half_error += m.cross(&half_field);
            }

            if gains.magnetometer > 0.0 {
                self.integral_error += half_error * (gains.magnetometer * dt);
                rate += self.integral_error;
            } else {
                self.integral_error = Vector3::zeros();
            }
            rate += half_error * gains.accelerometer;
        }

        let q = q + q * Quaternion::pure(rate * (0.5 * dt));
        self.estimate = q.fast_normalize().conjugate();
    }

    fn kalman_complementary(
        &mut self,
        core: &mut KalmanCore,
        frame: Frame,
        gains: Gains,
        gyroscope_variance: &Vector3<f32>,
        reading: &SensorSample,
        magnetic: bool,
    ) -> Result<(), AhrsError> {
        let filter = &mut core.filter;
        let predicted = predict_orientation(filter, reading)?;
        *filter.process_noise_mut() = model::process_noise(gyroscope_variance, &predicted, reading.delta_time)?;

        let accelerometer = reading.accelerometer.fast_normalize();
        let mut measurement = self.correct_with_accelerometer(frame, gains.accelerometer, predicted, &accelerometer);

        let jacobian = if magnetic {
            let magnetometer = reading.magnetometer.fast_normalize();
            measurement = self.correct_with_magnetometer(frame, gains.magnetometer, measurement, &magnetometer);
            frame.kalman_jacobian(
                &measurement,
                Some((&magnetometer, &self.magnetic_reference, &accelerometer)),
            )?
        } else {
            frame.kalman_jacobian(&measurement, None)?
        };
        let jacobian = jacobian.ok_or(AhrsError::UnsupportedFrame {
            frame,
            strategy: Strategy::KalmanComplementaryMagnetic,
        })?;

        *filter.measurement_noise_mut() = propagate_noise(&jacobian, &core.sensor_noise)?;
        self.estimate = correct_orientation(filter, &measurement)?;
        Ok(())
    }

    fn kalman_madgwick(
        &mut self,
        filter: &mut KalmanFilter,
        frame: Frame,
        gains: Gains,
        reading: &SensorSample,
    ) -> Result<(), AhrsError> {
        predict_orientation(filter, reading)?;
        self.madgwick(frame, gains, reading, false);
        let measurement = self.estimate;
        self.estimate = correct_orientation(filter, &measurement)?;
        Ok(())
    }
}

fn validate(config: &AhrsConfig, strategy: Strategy) -> Result<(), AhrsError> {
    if strategy.requires_kalman() && config.update_type != UpdateType::Kalman {
        return Err(AhrsError::KalmanNotConfigured { strategy });
    }
    if !config.frame.supports(strategy) {
        return Err(AhrsError::UnsupportedFrame {
            frame: config.frame,
            strategy,
        });
    }
    Ok(())
}

pub(crate) fn validate_time_step(delta_time: f32) -> Result<(), AhrsError> {
    if delta_time.is_finite() && delta_time > 0.0 {
        Ok(())
    } else {
        Err(AhrsError::InvalidTimeStep(delta_time))
    }
}

fn kalman_core(kalman: &mut Option<KalmanCore>, strategy: Strategy) -> Result<&mut KalmanCore, AhrsError> {
    kalman.as_mut().ok_or(AhrsError::KalmanNotConfigured { strategy })
}

/// `q ← normalize(q − dt/2 · (0, ω) ⊗ q)`
fn integrate_gyroscope(q: &Quaternion, gyroscope: &Vector3<f32>, delta_time: f32) -> Quaternion {
    (*q + (Quaternion::pure(*gyroscope) * *q) * (-0.5 * delta_time)).normalize()
}

/// Move from identity towards `error` by `gain`
fn blend(error: &Quaternion, gain: f32) -> Quaternion {
    let identity = Quaternion::identity();
    let blended = if error.w > BLEND_THRESHOLD {
        identity.lerp(error, gain)
    } else {
        identity.slerp(error, gain)
    };
    blended.normalize()
}

/// Kalman predict with the gyroscope transition; returns the normalized prediction
fn predict_orientation(filter: &mut KalmanFilter, reading: &SensorSample) -> Result<Quaternion, AhrsError> {
    filter.set_transition(&model::transition(&reading.gyroscope, reading.delta_time)?)?;
    filter.predict()?;

    let predicted = read_column(filter.predicted_state()).normalize();
    write_column(filter.predicted_state_mut(), &predicted);
    Ok(predicted)
}

/// Kalman update against `measurement`; returns the normalized estimate
fn correct_orientation(filter: &mut KalmanFilter, measurement: &Quaternion) -> Result<Quaternion, AhrsError> {
    write_column(filter.measurement_mut(), measurement);
    filter.update_identity()?;

    let estimate = read_column(filter.state()).normalize();
    write_column(filter.state_mut(), &estimate);
    Ok(estimate)
}

/// `R = J·N·Jᵗ`
fn propagate_noise(jacobian: &Matrix, sensor_noise: &Matrix) -> Result<Matrix, MatrixError> {
    let mut jacobian_t = Matrix::for_transpose(jacobian)?;
    transpose(jacobian, &mut jacobian_t)?;
    let mut noise_jt = Matrix::for_product(sensor_noise, &jacobian_t)?;
    multiply(sensor_noise, &jacobian_t, &mut noise_jt)?;
    let mut r = Matrix::for_product(jacobian, &noise_jt)?;
    multiply(jacobian, &noise_jt, &mut r)?;
    Ok(r)
}

fn read_column(column: &Matrix) -> Quaternion {
    let values = column.as_slice();
    Quaternion::new(values[0], values[1], values[2], values[3])
}

pub(crate) fn write_column(column: &mut Matrix, q: &Quaternion) {
    column.as_mut_slice().copy_from_slice(&q.to_array());
}
