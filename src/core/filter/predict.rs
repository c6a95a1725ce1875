// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Propagation of the state and its covariance through a window of IMU samples.
//!
//! Integration happens in the local frame of the window start.
//! The prior rotation and position are thus expected to be the identity and zero,
//! which is what `compose` leaves behind.
//! Gravity and biases are constant over a window, their random walks
//! only show up in the covariance.

use itertools::Itertools;
use log::debug;

use super::Filter;
use crate::core::imu::ImuSample;
use crate::core::state::{Covariance, NominalState};
use crate::error::{ensure_finite, FilterError};
use crate::math::so3;
use crate::misc::blocks::{set_block, ErrorBlock, NoiseBlock};
use crate::misc::type_aliases::{Float, Mat12, Mat18, Mat18x12, Mat3, Vec3};

/// Quantities accumulated while folding over the IMU samples of a window.
#[derive(Copy, Clone, Debug)]
struct Accumulator {
    /// Rotation of the current body frame into the window frame.
    rotation: Mat3,
    /// Integral of the rotated specific force.
    velocity: Vec3,
    /// Double integral of the rotated specific force.
    position: Vec3,
    /// Time elapsed since the window start.
    elapsed: Float,
    covariance: Covariance,
}

impl Filter {
    /// Integrate a window of IMU samples.
    ///
    /// Each consecutive pair of samples is one integration step,
    /// using the measurements of the first sample of the pair.
    /// The prior rotation and position are ignored and must be
    /// the identity and zero.
    pub fn predict(
        &self,
        imu: &[ImuSample],
        prev_state: &NominalState,
        prev_covar: &Covariance,
    ) -> Result<(NominalState, Covariance), FilterError> {
        if imu.len() < 2 {
            return Err(FilterError::NotEnoughImuSamples { count: imu.len() });
        }
        if !imu.iter().all(ImuSample::is_finite) {
            return Err(FilterError::NonFinite { stage: "IMU samples" });
        }
        if !prev_state.is_finite() {
            return Err(FilterError::NonFinite { stage: "prior state" });
        }
        ensure_finite(prev_covar.iter(), "prior covariance")?;
        debug_assert!(
            is_window_origin(prev_state),
            "prior state is not at the origin of its local frame"
        );

        let acc = imu.iter().tuple_windows().enumerate().try_fold(
            Accumulator::new(prev_covar),
            |acc, (index, (sample, next))| {
                let dt = next.time - sample.time;
                if dt > 0.0 {
                    Ok(acc.integrate(prev_state, sample, dt, &self.imu_noise))
                } else {
                    Err(FilterError::NonPositiveTimeStep {
                        index,
                        previous: sample.time,
                        next: next.time,
                    })
                }
            },
        )?;

        let t = acc.elapsed;
        let g = prev_state.gravity;
        let v = prev_state.velocity;
        let pred_state = NominalState {
            gravity: g,
            rotation: acc.rotation,
            position: v * t - 0.5 * g * t * t + acc.position,
            velocity: acc.rotation.transpose() * (v - g * t + acc.velocity),
            gyro_bias: prev_state.gyro_bias,
            accel_bias: prev_state.accel_bias,
        };
        ensure_finite(acc.covariance.iter(), "predicted covariance")?;
        debug!(
            "predict: {} samples over {:.3}s, trace(P) {:.3e} -> {:.3e}",
            imu.len(),
            t,
            prev_covar.trace(),
            acc.covariance.trace()
        );
        Ok((pred_state, acc.covariance))
    }
}

impl Accumulator {
    fn new(covariance: &Covariance) -> Self {
        Self {
            rotation: Mat3::identity(),
            velocity: Vec3::zeros(),
            position: Vec3::zeros(),
            elapsed: 0.0,
            covariance: *covariance,
        }
    }

    /// One integration step of duration `dt`.
    fn integrate(self, prior: &NominalState, sample: &ImuSample, dt: Float, noise: &Mat12) -> Self {
        let w = sample.gyro - prior.gyro_bias;
        let a = sample.accel - prior.accel_bias;
        let c = self.rotation;
        // Body frame velocity at the start of the step.
        let v = c.transpose() * (prior.velocity - prior.gravity * self.elapsed + self.velocity);

        let phi = transition(&error_dynamics(&c, &w, &v, &prior.gravity), &w, dt);
        let g = noise_input(&v);
        let q = phi * g * noise * g.transpose() * phi.transpose() * dt;
        let covariance = phi * self.covariance * phi.transpose() + q;

        let rotated_accel = c * a;
        Self {
            rotation: c * so3::exp(dt * w),
            velocity: self.velocity + rotated_accel * dt,
            position: self.position + self.velocity * dt + 0.5 * rotated_accel * dt * dt,
            elapsed: self.elapsed + dt,
            covariance,
        }
    }
}

/// Tolerance of `is_window_origin`.
const ORIGIN_TOLERANCE: Float = 1e-9;

/// True if the state sits at the origin of its local frame,
/// which is where every window starts.
pub fn is_window_origin(state: &NominalState) -> bool {
    (state.rotation - Mat3::identity()).amax() < ORIGIN_TOLERANCE
        && state.position.amax() < ORIGIN_TOLERANCE
}

/// Continuous-time error dynamics `F`, linearized at the current step.
///
/// `rotation` is the accumulated rotation, `w` and `v` the bias-corrected
/// angular rate and body frame velocity.
/// Gravity and bias rows stay zero.
pub fn error_dynamics(rotation: &Mat3, w: &Vec3, v: &Vec3, gravity: &Vec3) -> Mat18 {
    use ErrorBlock::*;
    let id = Mat3::identity();
    let w_hat = so3::hat(*w);
    let v_hat = so3::hat(*v);
    let rot_t = rotation.transpose();
    let mut f = Mat18::zeros();
    set_block(&mut f, Rotation, Rotation, &-w_hat);
    set_block(&mut f, Rotation, GyroBias, &-id);
    set_block(&mut f, Position, Rotation, &(-rotation * v_hat));
    set_block(&mut f, Position, Velocity, rotation);
    set_block(&mut f, Velocity, Gravity, &-rot_t);
    set_block(&mut f, Velocity, Rotation, &-so3::hat(rot_t * gravity));
    set_block(&mut f, Velocity, Velocity, &-w_hat);
    set_block(&mut f, Velocity, GyroBias, &-v_hat);
    set_block(&mut f, Velocity, AccelBias, &-id);
    f
}

/// Mapping `G` of the 12-dimensional IMU noise onto the error state.
pub fn noise_input(v: &Vec3) -> Mat18x12 {
    let id = Mat3::identity();
    let mut g = Mat18x12::zeros();
    set_block(&mut g, ErrorBlock::Rotation, NoiseBlock::Gyro, &-id);
    set_block(&mut g, ErrorBlock::Velocity, NoiseBlock::Gyro, &-so3::hat(*v));
    set_block(&mut g, ErrorBlock::Velocity, NoiseBlock::Accel, &-id);
    set_block(&mut g, ErrorBlock::GyroBias, NoiseBlock::GyroBiasWalk, &id);
    set_block(&mut g, ErrorBlock::AccelBias, NoiseBlock::AccelBiasWalk, &id);
    g
}

/// Second order discretization `I + F dt + F^2 dt^2 / 2` of the error dynamics.
///
/// The `-[w]` diagonal blocks (rotation and velocity) are replaced by
/// their exact transition `exp(-w dt)`.
pub fn transition(f: &Mat18, w: &Vec3, dt: Float) -> Mat18 {
    let mut phi = Mat18::identity() + f * dt + 0.5 * f * f * (dt * dt);
    let exact = so3::exp(-dt * w);
    set_block(&mut phi, ErrorBlock::Rotation, ErrorBlock::Rotation, &exact);
    set_block(&mut phi, ErrorBlock::Velocity, ErrorBlock::Velocity, &exact);
    phi
}

// TESTS #############################################################
