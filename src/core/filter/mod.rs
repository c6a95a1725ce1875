// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Error-state Kalman filter fusing IMU windows with relative visual poses.
//!
//! Each window between two visual measurements goes through three stages:
//!
//! 1. `predict`: integrate the IMU samples and propagate the covariance,
//! 2. `update`: correct with the relative pose measured by the visual front-end,
//! 3. `compose`: re-anchor the local frame at the new estimate and extend the pose chain.
//!
//! `Filter` holds the immutable configuration and exposes the three stages.
//! `Tracker` threads the (pose, state, covariance) triple across windows.

pub mod compose;
pub mod predict;
pub mod update;

use log::{debug, warn};

use crate::core::imu::{ImuNoise, ImuSample};
use crate::core::measurement::VisualMeasurement;
use crate::core::state::{Covariance, NominalState};
use crate::error::FilterError;
use crate::math::so3;
use crate::misc::type_aliases::{Float, Mat12, Mat3, Mat4, Vec3};

/// Tolerance on `R^T R - I` for a calibration rotation.
const ORTHONORMAL_TOLERANCE: Float = 1e-6;

/// Fixed extrinsic transform between the IMU (body) frame and the camera frame.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Calibration {
    rotation: Mat3,
    translation: Vec3,
}

impl Calibration {
    /// Camera and IMU frames coincide.
    pub fn identity() -> Self {
        Self {
            rotation: Mat3::identity(),
            translation: Vec3::zeros(),
        }
    }

    /// Calibration from a rotation matrix and a translation.
    /// The rotation must be orthonormal with a positive determinant.
    pub fn new(rotation: Mat3, translation: Vec3) -> Result<Self, FilterError> {
        let orthonormal = (rotation.transpose() * rotation - Mat3::identity()).amax()
            < ORTHONORMAL_TOLERANCE;
        let finite = rotation.iter().chain(translation.iter()).all(|x| x.is_finite());
        if finite && orthonormal && rotation.determinant() > 0.0 {
            Ok(Self {
                rotation,
                translation,
            })
        } else {
            Err(FilterError::InvalidCalibration)
        }
    }

    /// Rotation of the camera frame into the body frame.
    pub fn rotation(&self) -> &Mat3 {
        &self.rotation
    }

    /// Position of the camera in the body frame.
    pub fn translation(&self) -> &Vec3 {
        &self.translation
    }

    /// Measurement the visual front-end should report for a body motion
    /// of `rotation` and `position` over a window, as `(rotation, translation)`.
    pub fn expected_measurement(&self, rotation: &Mat3, position: &Vec3) -> (Vec3, Vec3) {
        let cal_t = self.rotation.transpose();
        let camera_rotation = cal_t * rotation * self.rotation;
        let camera_translation =
            cal_t * rotation * self.translation + cal_t * (position - self.translation);
        (so3::log(camera_rotation.transpose()), camera_translation)
    }
}

impl Default for Calibration {
    fn default() -> Self {
        Self::identity()
    }
}

/// Configuration of the filter.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Config {
    /// Extrinsic calibration between camera and IMU.
    pub calibration: Calibration,
    /// IMU noise densities.
    pub imu_noise: ImuNoise,
}

impl Config {
    /// Initialize a tracker at the identity pose.
    ///
    /// The state is expressed in the frame of that pose, so its rotation
    /// must be the identity and its position zero.
    /// An initial orientation goes into gravity and velocity instead.
    pub fn init(self, state: NominalState, covariance: Covariance) -> Tracker {
        Tracker {
            filter: Filter::new(&self),
            window: 0,
            pose: Mat4::identity(),
            state,
            covariance,
        }
    }
}

/// The filter itself. It holds no trajectory data
/// and can be shared between independent trajectories.
#[derive(Clone, Debug, PartialEq)]
pub struct Filter {
    calibration: Calibration,
    imu_noise: Mat12,
}

impl Filter {
    /// Filter with the given configuration.
    pub fn new(config: &Config) -> Self {
        Self {
            calibration: config.calibration,
            imu_noise: config.imu_noise.covariance(),
        }
    }

    /// Camera to IMU calibration.
    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    /// Process one window: predict, update, then compose.
    pub fn step(
        &self,
        imu: &[ImuSample],
        prev_pose: &Mat4,
        prev_state: &NominalState,
        prev_covar: &Covariance,
        vis: &VisualMeasurement,
    ) -> Result<(Mat4, NominalState, Covariance), FilterError> {
        let (pred_state, pred_covar) = self.predict(imu, prev_state, prev_covar)?;
        let (est_state, est_covar) = self.update(&pred_state, &pred_covar, vis)?;
        Ok(self.compose(prev_pose, &est_state, &est_covar))
    }
}

/// Recursive filtering over a whole trajectory.
/// Can only be constructed by initialization from a `Config`.
#[derive(Clone, Debug)]
pub struct Tracker {
    filter: Filter,
    window: usize,
    pose: Mat4,
    state: NominalState,
    covariance: Covariance,
}

impl Tracker {
    /// Process the next window.
    ///
    /// On failure the tracker keeps its last good pose, state and covariance,
    /// and the error carries the window index and time span.
    pub fn track(&mut self, imu: &[ImuSample], vis: &VisualMeasurement) -> Result<(), FilterError> {
        let result = self
            .filter
            .step(imu, &self.pose, &self.state, &self.covariance, vis);
        match result {
            Ok((pose, state, covariance)) => {
                debug!(
                    "window {}: trace(P) = {:.3e}, |v| = {:.3}",
                    self.window,
                    covariance.trace(),
                    state.velocity.norm()
                );
                self.pose = pose;
                self.state = state;
                self.covariance = covariance;
                self.window += 1;
                Ok(())
            }
            Err(source) => {
                let err = FilterError::Window {
                    window: self.window,
                    start: imu.first().map_or(Float::NAN, |s| s.time),
                    end: imu.last().map_or(Float::NAN, |s| s.time),
                    source: Box::new(source),
                };
                warn!("{}", err);
                Err(err)
            }
        }
    }

    /// Restart filtering from the current pose with a fresh state.
    /// The window counter is kept.
    /// As in `Config::init`, the state rotation must be the identity
    /// and its position zero.
    pub fn reset(&mut self, state: NominalState, covariance: Covariance) {
        self.state = state;
        self.covariance = covariance;
    }

    /// Index of the next window and current pose.
    pub fn current_frame(&self) -> (usize, Mat4) {
        (self.window, self.pose)
    }

    /// Current nominal state, in the local frame of the current pose.
    pub fn state(&self) -> &NominalState {
        &self.state
    }

    /// Current error-state covariance.
    pub fn covariance(&self) -> &Covariance {
        &self.covariance
    }

    /// The underlying filter.
    pub fn filter(&self) -> &Filter {
        &self.filter
    }
}

// TESTS #############################################################
