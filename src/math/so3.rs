// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Lie algebra/group functions for 3D rotations.
//!
//! Rotations are kept as full 3x3 matrices, perturbations as rotation vectors.
//! Every function has an explicit small-angle branch so that no division
//! by a near-zero norm ever happens.
//!
//! Interesting reads:
//! - Ethan Eade course on Lie Groups for 2D and 3D transformations:
//!     - details: <http://ethaneade.com/lie.pdf>
//! - Timothy Barfoot, "State Estimation for Robotics", chapter 7.

use crate::misc::type_aliases::{Float, Mat3, Vec3};

/// Below this norm, the exponential map uses its Taylor expansion.
pub const EPSILON_EXP: Float = 1e-8;
/// Below this sine of the angle, the logarithm map uses its first order approximation.
pub const EPSILON_LOG: Float = 1e-6;
/// Below this norm, the left Jacobians use their first order approximation.
pub const EPSILON_JACOBIAN: Float = 1e-6;

/// Hat operator.
/// Goes from so3 parameterization to so3 element (skew-symmetric matrix).
#[rustfmt::skip]
pub fn hat(w: Vec3) -> Mat3 {
    Mat3::new(
         0.0,  -w.z,   w.y,
         w.z,   0.0,  -w.x,
        -w.y,   w.x,   0.0,
    )
}

/// Squared hat operator (`hat_2(w) == hat(w) * hat(w)`).
/// Result is a symmetric matrix.
#[rustfmt::skip]
pub fn hat_2(w: Vec3) -> Mat3 {
    let w11 = w.x * w.x;
    let w12 = w.x * w.y;
    let w13 = w.x * w.z;
    let w22 = w.y * w.y;
    let w23 = w.y * w.z;
    let w33 = w.z * w.z;
    Mat3::new(
        -w22 - w33,     w12,           w13,
         w12,          -w11 - w33,     w23,
         w13,           w23,          -w11 - w22,
    )
}

/// Vee operator. Inverse of hat operator.
/// Warning! does not check that the given matrix is skew-symmetric.
pub fn vee(mat: Mat3) -> Vec3 {
    Vec3::new(mat.m32, mat.m13, mat.m21)
}

/// Compute the exponential map from Lie algebra so3 to Lie group SO3.
/// Goes from so3 parameterization to SO3 element (rotation matrix).
///
/// Uses Rodrigues' formula, or its second order expansion
/// `I + [w] + 0.5 [w]^2` for tiny rotations.
pub fn exp(w: Vec3) -> Mat3 {
    let theta = w.norm();
    if theta > EPSILON_EXP {
        let axis = w / theta;
        Mat3::identity() + theta.sin() * hat(axis) + (1.0 - theta.cos()) * hat_2(axis)
    } else {
        Mat3::identity() + hat(w) + 0.5 * hat_2(w)
    }
}

/// Compute the logarithm map from the Lie group SO3 to the Lie algebra so3.
/// Inverse of the exponential map for rotation angles below pi.
///
/// The cosine of the angle is clamped into [-1, 1] since rounding errors
/// on a nearly orthonormal matrix can push the trace slightly outside.
pub fn log(rotation: Mat3) -> Vec3 {
    let cos_theta = ((rotation.trace() - 1.0) / 2.0).max(-1.0).min(1.0);
    let theta = cos_theta.acos();
    let sin_theta = theta.sin();
    let antisym = vee(rotation - rotation.transpose());
    if sin_theta > EPSILON_LOG {
        (theta / (2.0 * sin_theta)) * antisym
    } else {
        0.5 * antisym
    }
}

/// Left Jacobian of SO3.
///
/// `exp(w + dw) ~ exp(left_jacobian(w) * dw) * exp(w)`.
pub fn left_jacobian(w: Vec3) -> Mat3 {
    let theta = w.norm();
    if theta > EPSILON_JACOBIAN {
        let axis = w / theta;
        let sin_by_theta = theta.sin() / theta;
        sin_by_theta * Mat3::identity()
            + (1.0 - sin_by_theta) * axis * axis.transpose()
            + ((1.0 - theta.cos()) / theta) * hat(axis)
    } else {
        Mat3::identity() + 0.5 * hat(w)
    }
}

/// Inverse of the left Jacobian of SO3.
pub fn left_jacobian_inv(w: Vec3) -> Mat3 {
    let theta = w.norm();
    if theta > EPSILON_JACOBIAN {
        let axis = w / theta;
        let half_theta = 0.5 * theta;
        let half_theta_cot = half_theta / half_theta.tan();
        half_theta_cot * Mat3::identity()
            + (1.0 - half_theta_cot) * axis * axis.transpose()
            - half_theta * hat(axis)
    } else {
        Mat3::identity() - 0.5 * hat(w)
    }
}

// TESTS #############################################################
