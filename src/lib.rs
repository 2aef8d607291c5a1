#![no_std]

//! Kalman AHRS - quaternion attitude and heading reference engine
//!
//! Fuses gyroscope, accelerometer and magnetometer samples into an
//! orientation quaternion. One engine runs one of several interchangeable
//! strategies, from plain gyroscope integration through complementary,
//! Madgwick and Mahony filters to Kalman hybrids that feed a complementary or
//! Madgwick estimate to a four-state Kalman filter as its measurement.
//!
//! # Features
//!
//! - Complementary, Madgwick and Mahony filters, with or without magnetometer
//! - Kalman-complementary and Kalman-Madgwick hybrids
//! - NED and ENU measurement models
//! - Startup calibration that averages a stationary reference orientation
//! - Bounded-size matrix engine with closed-form inverses up to 4×4
//! - `#![no_std]` with no allocation
//!
//! # Quick Start
//!
//! ```rust
//! use nalgebra::Vector3;
//! use kalman_ahrs::{Ahrs, AhrsConfig, CalibrationPlan, CalibrationStatus, SensorSample, Strategy};
//!
//! let mut ahrs = Ahrs::new(AhrsConfig::default(), Strategy::KalmanComplementaryMagnetic).unwrap();
//!
//! let sample = SensorSample::new(
//!     Vector3::new(0.001, -0.002, 0.0),  // rad/s
//!     Vector3::new(0.0, 0.0, -9.81),     // m/s²
//!     Vector3::new(20.0, 0.0, 40.0),     // µT
//!     0.01,                              // s
//! );
//!
//! // Capture the resting orientation as the reference
//! let plan = CalibrationPlan { discard: 20, mean: 10 };
//! while ahrs.calibrate(&sample, plan).unwrap() == CalibrationStatus::InProgress {}
//!
//! ahrs.update(&sample).unwrap();
//! let [roll, pitch, yaw]: [f32; 3] = ahrs.euler_angles().into();
//! let gravity = ahrs.gravity();
//! ```

mod ahrs;
pub mod calibration;
mod error;
mod frame;
pub mod inversion;
pub mod kalman;
mod math;
pub mod matrix;
pub mod model;
mod quaternion;
mod startup;
pub mod tilt;
mod types;

// Re-export all public types and functions
pub use ahrs::Ahrs;
pub use error::{AhrsError, KalmanError, MatrixError};
pub use inversion::Inversion;
pub use kalman::{KalmanDimensions, KalmanFilter};
pub use math::{DEG_TO_RAD, RAD_TO_DEG, Vector3Ext, fast_inverse_sqrt};
pub use matrix::{MAX_DIM, Matrix};
pub use quaternion::{QUATERNION_EPSILON, Quaternion};
pub use types::*;
