// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Re-anchoring of the local frame at the latest estimate.

use log::trace;

use super::Filter;
use crate::core::state::{Covariance, NominalState};
use crate::math::{se3, so3};
use crate::misc::blocks::{set_block, ErrorBlock};
use crate::misc::type_aliases::{Mat18, Mat3, Mat4, Vec3};

impl Filter {
    /// Move the local frame to the estimated pose.
    ///
    /// The returned pose is the previous one followed by the inverse of the
    /// estimated motion. Rotation and position are reset to the origin
    /// of the new frame, gravity is re-expressed in it,
    /// velocity and biases are kept.
    pub fn compose(
        &self,
        prev_pose: &Mat4,
        est_state: &NominalState,
        est_covar: &Covariance,
    ) -> (Mat4, NominalState, Covariance) {
        let c_t = est_state.rotation.transpose();
        let new_pose = se3::from_parts(
            &(c_t * se3::rotation(prev_pose)),
            &(c_t * (se3::translation(prev_pose) - est_state.position)),
        );
        let new_gravity = c_t * est_state.gravity;
        let new_state = NominalState {
            gravity: new_gravity,
            rotation: Mat3::identity(),
            position: Vec3::zeros(),
            ..*est_state
        };
        let u = reanchoring_jacobian(&est_state.rotation, &new_gravity);
        let new_covar = u * est_covar * u.transpose();
        trace!("compose: |g| = {:.4}", new_gravity.norm());
        (new_pose, new_state, new_covar)
    }
}

/// Linearized re-parameterization of the error state into the new frame.
///
/// Rotation and position errors are absorbed into the pose,
/// so their rows are zero.
pub fn reanchoring_jacobian(rotation: &Mat3, new_gravity: &Vec3) -> Mat18 {
    let mut u = Mat18::zeros();
    set_block(
        &mut u,
        ErrorBlock::Gravity,
        ErrorBlock::Gravity,
        &rotation.transpose(),
    );
    set_block(
        &mut u,
        ErrorBlock::Gravity,
        ErrorBlock::Rotation,
        &so3::hat(*new_gravity),
    );
    for &group in &[
        ErrorBlock::Velocity,
        ErrorBlock::GyroBias,
        ErrorBlock::AccelBias,
    ] {
        set_block(&mut u, group, group, &Mat3::identity());
    }
    u
}

// TESTS #############################################################
