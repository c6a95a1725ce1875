// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Type aliases for common types used all over the code base.

use nalgebra as na;

/// The filter works in double precision.
/// Small-angle thresholds such as 1e-8 are meaningless in f32.
pub type Float = f64;

/// A vector with three Float coordinates.
pub type Vec3 = na::Vector3<Float>;
/// A vector with six Float coordinates.
pub type Vec6 = na::Vector6<Float>;
/// An error-state vector.
pub type Vec18 = na::SVector<Float, 18>;
/// A nominal-state vector.
pub type Vec24 = na::SVector<Float, 24>;

/// A 3x3 matrix of Floats.
pub type Mat3 = na::Matrix3<Float>;
/// A 4x4 matrix of Floats.
pub type Mat4 = na::Matrix4<Float>;
/// A 6x6 matrix of Floats.
pub type Mat6 = na::Matrix6<Float>;
/// A 12x12 matrix of Floats (IMU noise).
pub type Mat12 = na::SMatrix<Float, 12, 12>;
/// An 18x18 matrix of Floats (error-state covariance and transitions).
pub type Mat18 = na::SMatrix<Float, 18, 18>;
/// An 18x12 matrix of Floats (IMU noise to error state).
pub type Mat18x12 = na::SMatrix<Float, 18, 12>;
/// A 6x18 matrix of Floats (observation Jacobian).
pub type Mat6x18 = na::SMatrix<Float, 6, 18>;
/// An 18x6 matrix of Floats (Kalman gain).
pub type Mat18x6 = na::SMatrix<Float, 18, 6>;

/// A direct 3D isometry, also known as rigid body motion.
pub type Iso3 = na::Isometry3<Float>;
