//! Startup calibration: average the first stationary estimates into a reference

use log::debug;

use crate::ahrs::{Ahrs, Gains, validate_time_step, write_column};
use crate::error::AhrsError;
use crate::quaternion::Quaternion;
use crate::types::{CalibrationPlan, CalibrationStatus, SensorSample};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Phase {
    #[default]
    Idle,
    Accumulating,
    /// Reference captured, one more fusion with the configured gains to go
    Finishing,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct StartupCalibration {
    phase: Phase,
    samples: u32,
    sum: Quaternion,
}

impl Default for StartupCalibration {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            samples: 0,
            sum: Quaternion::zero(),
        }
    }
}

impl Ahrs {
    /// Feed one sample to the startup calibration
    ///
    /// The first call starts a calibration: gains are forced to 1 and the
    /// reference correction is cleared. Every call fuses `sample`. Estimates
    /// after the first `plan.discard` samples are summed, and once `plan.mean`
    /// of them are in, their normalized mean becomes the reference: its
    /// conjugate is stored as [`Ahrs::diff`] and, with Kalman matrices, as
    /// the Kalman state. The following call fuses with the configured gains
    /// restored and returns [`CalibrationStatus::Done`].
    ///
    /// The device should be stationary for the whole calibration.
    ///
    /// # Example
    /// ```
    /// use kalman_ahrs::{Ahrs, AhrsConfig, CalibrationPlan, CalibrationStatus, SensorSample, Strategy};
    /// use nalgebra::Vector3;
    ///
    /// let mut ahrs = Ahrs::new(AhrsConfig::default(), Strategy::KalmanComplementary).unwrap();
    /// let plan = CalibrationPlan { discard: 10, mean: 5 };
    /// let sample = SensorSample::new(
    ///     Vector3::zeros(),
    ///     Vector3::new(0.0, 0.0, -9.81),
    ///     Vector3::new(20.0, 0.0, 40.0),
    ///     0.01,
    /// );
    ///
    /// while ahrs.calibrate(&sample, plan).unwrap() == CalibrationStatus::InProgress {}
    /// assert!(!ahrs.calibration_in_progress());
    /// ```
    pub fn calibrate(&mut self, sample: &SensorSample, plan: CalibrationPlan) -> Result<CalibrationStatus, AhrsError> {
        if plan.mean == 0 {
            return Err(AhrsError::InvalidCalibrationPlan {
                discard: plan.discard,
                mean: plan.mean,
            });
        }
        validate_time_step(sample.delta_time)?;

        match self.startup.phase {
            Phase::Idle => {
                self.begin_calibration(plan);
                self.accumulate(sample, plan)
            }
            Phase::Accumulating => self.accumulate(sample, plan),
            Phase::Finishing => {
                self.gains = self.configured_gains();
                self.update(sample)?;
                self.startup = StartupCalibration::default();
                debug!("startup calibration done");
                Ok(CalibrationStatus::Done)
            }
        }
    }

    /// Whether a calibration has started and not yet returned `Done`
    pub fn calibration_in_progress(&self) -> bool {
        self.startup.phase != Phase::Idle
    }

    fn begin_calibration(&mut self, plan: CalibrationPlan) {
        debug!(
            "startup calibration: discarding {} samples, averaging {}",
            plan.discard, plan.mean
        );
        self.gains = Gains::FULL;
        self.diff = Quaternion::identity();
        self.startup = StartupCalibration {
            phase: Phase::Accumulating,
            ..Default::default()
        };
    }

    fn accumulate(&mut self, sample: &SensorSample, plan: CalibrationPlan) -> Result<CalibrationStatus, AhrsError> {
        let covariance = self.kalman.as_ref().map(|core| *core.filter.covariance());
        if let Some(core) = self.kalman.as_mut() {
            core.reset_covariance()?;
        }
        if let Err(error) = self.update(sample) {
            if let (Some(core), Some(covariance)) = (self.kalman.as_mut(), covariance) {
                *core.filter.covariance_mut() = covariance;
            }
            return Err(error);
        }

        let estimate = self.estimate();
        let startup = &mut self.startup;
        startup.samples += 1;
        if startup.samples > plan.discard {
            startup.sum += estimate;
        }

        if startup.samples >= plan.discard.saturating_add(plan.mean) {
            let reference = (startup.sum * (1.0 / plan.mean as f32)).normalize();
            startup.phase = Phase::Finishing;

            if let Some(core) = self.kalman.as_mut() {
                write_column(core.filter.state_mut(), &reference);
            }
            self.diff = reference.conjugate();
            debug!("startup reference captured: {reference:?}");
        }

        Ok(CalibrationStatus::InProgress)
    }
}
