//! Error types for the matrix engine, the Kalman core and the AHRS engine

use thiserror::Error;

use crate::types::{Frame, Strategy};

/// Matrix engine failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MatrixError {
    /// Operand or destination shapes do not fit the operation
    #[error("{operation}: expected shape {expected:?}, found {found:?}")]
    DimensionMismatch {
        operation: &'static str,
        expected: (usize, usize),
        found: (usize, usize),
    },
    /// Requested shape is larger than the fixed storage
    #[error("{rows}x{cols} exceeds the {max}x{max} matrix capacity", max = crate::matrix::MAX_DIM)]
    ExceedsCapacity { rows: usize, cols: usize },
    /// Zero rows or zero columns
    #[error("matrix dimensions must be non-zero")]
    Empty,
    /// Operation requires a square matrix
    #[error("expected a square matrix, found {rows}x{cols}")]
    NotSquare { rows: usize, cols: usize },
    /// Determinant is exactly zero
    #[error("matrix is singular")]
    Singular,
}

/// Kalman filter failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum KalmanError {
    #[error(transparent)]
    Matrix(#[from] MatrixError),
    /// State or measurement dimension is zero or above capacity
    #[error("invalid filter dimensions: state {state}, measurement {measurement}, drive {drive}")]
    InvalidDimensions {
        state: usize,
        measurement: usize,
        drive: usize,
    },
    /// Drive-input prediction on a filter built without drive matrices
    #[error("filter was created without drive input matrices")]
    MissingDrive,
    /// General update on a filter that elides the measurement matrix
    #[error("filter was created with an identity measurement matrix, use update_identity")]
    MissingMeasurementMatrix,
    /// Identity update on a filter that owns an explicit measurement matrix
    #[error("filter owns an explicit measurement matrix, use update")]
    IdentityMeasurementExpected,
}

/// AHRS engine failures
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum AhrsError {
    #[error(transparent)]
    Kalman(#[from] KalmanError),
    /// Kalman-based strategy on an engine built without Kalman matrices
    #[error("{strategy:?} needs an engine configured with UpdateType::Kalman")]
    KalmanNotConfigured { strategy: Strategy },
    /// No measurement model for this frame and strategy
    #[error("{strategy:?} has no {frame:?} measurement model")]
    UnsupportedFrame { frame: Frame, strategy: Strategy },
    /// Sample period must be finite and positive
    #[error("invalid time step {0} s")]
    InvalidTimeStep(f32),
    /// Startup calibration needs at least one averaged sample
    #[error("calibration plan must average at least one sample (discard {discard}, mean {mean})")]
    InvalidCalibrationPlan { discard: u32, mean: u32 },
}

impl From<MatrixError> for AhrsError {
    fn from(error: MatrixError) -> Self {
        AhrsError::Kalman(KalmanError::Matrix(error))
    }
}
