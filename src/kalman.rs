//! Discrete linear Kalman filter over fixed-capacity matrices
//!
//! The filter owns every matrix of the predict/update cycle, sized once from
//! [`KalmanDimensions`]. Scratch products are preallocated as well, so a
//! cycle never allocates. When the state and measurement dimensions match the
//! caller can drop the measurement matrix entirely and run
//! [`KalmanFilter::update_identity`], which elides the `H` products.

use log::{debug, warn};

use crate::error::{KalmanError, MatrixError};
use crate::inversion::Inversion;
use crate::matrix::{MAX_DIM, Matrix, multiply, transpose};

/// Sizes fixed for the lifetime of a filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KalmanDimensions {
    /// State vector length `x`
    pub state: usize,
    /// Measurement vector length `z`
    pub measurement: usize,
    /// Drive input length `u`; zero disables the drive term
    pub drive: usize,
    /// Elide `H` (requires `state == measurement`)
    pub identity_measurement: bool,
}

impl KalmanDimensions {
    /// Square filter with the identity measurement path and no drive input
    pub fn identity(state: usize) -> Self {
        Self {
            state,
            measurement: state,
            drive: 0,
            identity_measurement: true,
        }
    }

    fn validate(&self) -> Result<(), KalmanError> {
        let in_range = |n: usize| (1..=MAX_DIM).contains(&n);
        let valid = in_range(self.state)
            && in_range(self.measurement)
            && self.drive <= MAX_DIM
            && (!self.identity_measurement || self.state == self.measurement);
        if valid {
            Ok(())
        } else {
            Err(KalmanError::InvalidDimensions {
                state: self.state,
                measurement: self.measurement,
                drive: self.drive,
            })
        }
    }
}

#[derive(Debug, Clone)]
struct MeasurementModel {
    h: Matrix,
    h_t: Matrix,
    // H * P_pred
    h_p: Matrix,
    // H * X_pred
    predicted_measurement: Matrix,
}

#[derive(Debug, Clone)]
struct Drive {
    g: Matrix,
    u: Matrix,
    // G * U
    g_u: Matrix,
}

/// Kalman filter with state `x`, measurement `z` and optional drive `u`
#[derive(Debug, Clone)]
pub struct KalmanFilter {
    dimensions: KalmanDimensions,
    inversion: Inversion,

    x_est: Matrix,
    x_pred: Matrix,
    p_est: Matrix,
    p_pred: Matrix,

    f: Matrix,
    f_t: Matrix,
    q: Matrix,
    r: Matrix,
    z: Matrix,

    measurement_model: Option<MeasurementModel>,
    drive: Option<Drive>,

    k: Matrix,
    // P_pred * Hᵗ
    p_h_t: Matrix,
    s: Matrix,
    s_inv: Matrix,
    identity: Matrix,

    innovation: Matrix,
    correction: Matrix,
    scratch: Matrix,
}

impl KalmanFilter {
    /// Allocate every matrix for the given dimensions
    ///
    /// `F`, `P_est`, `H` and the identity start as identities; everything else
    /// starts at zero.
    pub fn new(dimensions: KalmanDimensions) -> Result<Self, KalmanError> {
        dimensions.validate()?;
        let KalmanDimensions { state: n, measurement: m, drive: u, identity_measurement } = dimensions;

        if n == m && !identity_measurement {
            warn!("square {n}x{n} Kalman filter keeps an explicit measurement matrix, consider the identity path");
        }

        let measurement_model = if identity_measurement {
            None
        } else {
            let mut h = Matrix::zeros(m, n)?;
            for i in 0..m.min(n) {
                h[(i, i)] = 1.0;
            }
            let mut h_t = Matrix::for_transpose(&h)?;
            transpose(&h, &mut h_t)?;
            Some(MeasurementModel {
                h,
                h_t,
                h_p: Matrix::zeros(m, n)?,
                predicted_measurement: Matrix::zeros(m, 1)?,
            })
        };

        let drive = if u > 0 {
            Some(Drive {
                g: Matrix::zeros(n, u)?,
                u: Matrix::zeros(u, 1)?,
                g_u: Matrix::zeros(n, 1)?,
            })
        } else {
            None
        };

        debug!("Kalman filter created: state {n}, measurement {m}, drive {u}, identity H {identity_measurement}");

        Ok(Self {
            dimensions,
            inversion: Inversion::for_size(m)?,
            x_est: Matrix::zeros(n, 1)?,
            x_pred: Matrix::zeros(n, 1)?,
            p_est: Matrix::identity(n)?,
            p_pred: Matrix::zeros(n, n)?,
            f: Matrix::identity(n)?,
            f_t: Matrix::identity(n)?,
            q: Matrix::zeros(n, n)?,
            r: Matrix::zeros(m, m)?,
            z: Matrix::zeros(m, 1)?,
            measurement_model,
            drive,
            k: Matrix::zeros(n, m)?,
            p_h_t: Matrix::zeros(n, m)?,
            s: Matrix::zeros(m, m)?,
            s_inv: Matrix::zeros(m, m)?,
            identity: Matrix::identity(n)?,
            innovation: Matrix::zeros(m, 1)?,
            correction: Matrix::zeros(n, 1)?,
            scratch: Matrix::zeros(n, n)?,
        })
    }

    pub fn dimensions(&self) -> KalmanDimensions {
        self.dimensions
    }

    /// True when the filter elides the measurement matrix
    pub fn has_identity_measurement(&self) -> bool {
        self.measurement_model.is_none()
    }

    /// `X_pred = F·X_est`, `P_pred = F·P_est·Fᵗ + Q`
    pub fn predict(&mut self) -> Result<(), KalmanError> {
        multiply(&self.f, &self.x_est, &mut self.x_pred)?;
        self.predict_covariance()
    }

    /// Prediction with the drive term `X_pred = F·X_est + G·U`
    pub fn predict_with_drive(&mut self) -> Result<(), KalmanError> {
        let drive = self.drive.as_mut().ok_or(KalmanError::MissingDrive)?;
        multiply(&drive.g, &drive.u, &mut drive.g_u)?;
        multiply(&self.f, &self.x_est, &mut self.x_pred)?;
        self.x_pred.add_assign(&drive.g_u)?;
        self.predict_covariance()
    }

    fn predict_covariance(&mut self) -> Result<(), KalmanError> {
        multiply(&self.f, &self.p_est, &mut self.scratch)?;
        multiply(&self.scratch, &self.f_t, &mut self.p_pred)?;
        self.p_pred.add_assign(&self.q)?;
        Ok(())
    }

    /// Correct the prediction with the measurement `Z` through `H`
    ///
    /// On a singular innovation covariance the estimate is left untouched and
    /// the prediction stays available.
    pub fn update(&mut self) -> Result<(), KalmanError> {
        let model = self
            .measurement_model
            .as_mut()
            .ok_or(KalmanError::MissingMeasurementMatrix)?;

        // S = H·P_pred·Hᵗ + R
        multiply(&model.h, &self.p_pred, &mut model.h_p)?;
        multiply(&model.h_p, &model.h_t, &mut self.s)?;
        self.s.add_assign(&self.r)?;
        invert_innovation(self.inversion, &self.s, &mut self.s_inv)?;

        // K = P_pred·Hᵗ·S⁻¹
        multiply(&self.p_pred, &model.h_t, &mut self.p_h_t)?;
        multiply(&self.p_h_t, &self.s_inv, &mut self.k)?;

        // X_est = X_pred + K·(Z − H·X_pred)
        multiply(&model.h, &self.x_pred, &mut model.predicted_measurement)?;
        self.innovation.copy_from(&model.predicted_measurement)?;
        self.innovation.subtract_from(&self.z)?;
        multiply(&self.k, &self.innovation, &mut self.correction)?;

        // P_est = (I − K·H)·P_pred
        multiply(&self.k, &model.h, &mut self.scratch)?;
        self.scratch.subtract_from(&self.identity)?;

        self.commit()
    }

    /// Correct the prediction with `H = I`
    pub fn update_identity(&mut self) -> Result<(), KalmanError> {
        if self.measurement_model.is_some() {
            return Err(KalmanError::IdentityMeasurementExpected);
        }

        // S = P_pred + R
        self.s.copy_from(&self.p_pred)?;
        self.s.add_assign(&self.r)?;
        invert_innovation(self.inversion, &self.s, &mut self.s_inv)?;

        // K = P_pred·S⁻¹
        multiply(&self.p_pred, &self.s_inv, &mut self.k)?;

        // X_est = X_pred + K·(Z − X_pred)
        self.innovation.copy_from(&self.x_pred)?;
        self.innovation.subtract_from(&self.z)?;
        multiply(&self.k, &self.innovation, &mut self.correction)?;

        // P_est = (I − K)·P_pred
        self.scratch.copy_from(&self.k)?;
        self.scratch.subtract_from(&self.identity)?;

        self.commit()
    }

    // Writes X_est and P_est from `correction` and `scratch = I − K·H`
    fn commit(&mut self) -> Result<(), KalmanError> {
        let mut p_est = self.p_est;
        multiply(&self.scratch, &self.p_pred, &mut p_est)?;
        self.x_est.copy_from(&self.x_pred)?;
        self.x_est.add_assign(&self.correction)?;
        self.p_est = p_est;
        Ok(())
    }

    /// Estimated state `X_est`
    pub fn state(&self) -> &Matrix {
        &self.x_est
    }

    pub fn state_mut(&mut self) -> &mut Matrix {
        &mut self.x_est
    }

    /// Estimated covariance `P_est`
    pub fn covariance(&self) -> &Matrix {
        &self.p_est
    }

    pub fn covariance_mut(&mut self) -> &mut Matrix {
        &mut self.p_est
    }

    pub fn predicted_state(&self) -> &Matrix {
        &self.x_pred
    }

    pub fn predicted_state_mut(&mut self) -> &mut Matrix {
        &mut self.x_pred
    }

    pub fn predicted_covariance(&self) -> &Matrix {
        &self.p_pred
    }

    pub fn transition(&self) -> &Matrix {
        &self.f
    }

    /// Replace `F` and refresh its cached transpose
    pub fn set_transition(&mut self, f: &Matrix) -> Result<(), KalmanError> {
        let mut f_t = self.f_t;
        transpose(f, &mut f_t)?;
        self.f.copy_from(f)?;
        self.f_t = f_t;
        Ok(())
    }

    pub fn process_noise(&self) -> &Matrix {
        &self.q
    }

    pub fn process_noise_mut(&mut self) -> &mut Matrix {
        &mut self.q
    }

    pub fn measurement_noise(&self) -> &Matrix {
        &self.r
    }

    pub fn measurement_noise_mut(&mut self) -> &mut Matrix {
        &mut self.r
    }

    /// Measurement vector `Z` consumed by the next update
    pub fn measurement(&self) -> &Matrix {
        &self.z
    }

    pub fn measurement_mut(&mut self) -> &mut Matrix {
        &mut self.z
    }

    /// Measurement matrix `H`, absent on the identity path
    pub fn measurement_matrix(&self) -> Option<&Matrix> {
        self.measurement_model.as_ref().map(|model| &model.h)
    }

    /// Replace `H` and refresh its cached transpose
    pub fn set_measurement_matrix(&mut self, h: &Matrix) -> Result<(), KalmanError> {
        let model = self
            .measurement_model
            .as_mut()
            .ok_or(KalmanError::MissingMeasurementMatrix)?;
        let mut h_t = model.h_t;
        transpose(h, &mut h_t)?;
        model.h.copy_from(h)?;
        model.h_t = h_t;
        Ok(())
    }

    /// Drive influence matrix `G`
    pub fn drive_matrix_mut(&mut self) -> Result<&mut Matrix, KalmanError> {
        self.drive
            .as_mut()
            .map(|drive| &mut drive.g)
            .ok_or(KalmanError::MissingDrive)
    }

    /// Drive input vector `U`
    pub fn drive_mut(&mut self) -> Result<&mut Matrix, KalmanError> {
        self.drive
            .as_mut()
            .map(|drive| &mut drive.u)
            .ok_or(KalmanError::MissingDrive)
    }

    /// Kalman gain of the last update
    pub fn gain(&self) -> &Matrix {
        &self.k
    }

    /// Innovation covariance `S` of the last update
    pub fn innovation_covariance(&self) -> &Matrix {
        &self.s
    }
}

fn invert_innovation(inversion: Inversion, s: &Matrix, s_inv: &mut Matrix) -> Result<(), KalmanError> {
    inversion.invert(s, s_inv).map_err(|error| {
        if error == MatrixError::Singular {
            warn!("singular innovation covariance, Kalman update skipped");
        }
        KalmanError::from(error)
    })
}
