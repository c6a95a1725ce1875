// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Rigid body motions as 4x4 homogeneous matrices.
//!
//! The pose chain of the filter is kept as plain homogeneous matrices
//! since this is what trajectory accumulation code consumes.
//! Conversion to a nalgebra isometry is provided for everything else.

use nalgebra::{Rotation3, Translation3, UnitQuaternion};

use crate::math::so3;
use crate::misc::type_aliases::{Float, Iso3, Mat3, Mat4, Vec3};

/// Build a homogeneous transform from its rotation and translation blocks.
pub fn from_parts(rotation: &Mat3, translation: &Vec3) -> Mat4 {
    let mut mat = Mat4::identity();
    mat.fixed_view_mut::<3, 3>(0, 0).copy_from(rotation);
    mat.fixed_view_mut::<3, 1>(0, 3).copy_from(translation);
    mat
}

/// Rotation block of a homogeneous transform.
pub fn rotation(pose: &Mat4) -> Mat3 {
    pose.fixed_view::<3, 3>(0, 0).into_owned()
}

/// Translation block of a homogeneous transform.
pub fn translation(pose: &Mat4) -> Vec3 {
    pose.fixed_view::<3, 1>(0, 3).into_owned()
}

/// Inverse of a rigid body motion, without a general matrix inversion.
pub fn inverse(pose: &Mat4) -> Mat4 {
    let rot_t = rotation(pose).transpose();
    from_parts(&rot_t, &(-rot_t * translation(pose)))
}

/// Convert a homogeneous transform into an isometry.
/// Warning! assumes the rotation block is orthonormal.
pub fn to_iso3(pose: &Mat4) -> Iso3 {
    let rot = Rotation3::from_matrix_unchecked(rotation(pose));
    Iso3::from_parts(
        Translation3::from(translation(pose)),
        UnitQuaternion::from_rotation_matrix(&rot),
    )
}

/// Angle (radians) and distance between two poses.
pub fn distance(a: &Mat4, b: &Mat4) -> (Float, Float) {
    let delta = inverse(a) * b;
    (so3::log(rotation(&delta)).norm(), translation(&delta).norm())
}

// TESTS #############################################################
