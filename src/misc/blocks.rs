// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Named 3x3 blocks of the structured matrices used by the filter.
//!
//! Every Jacobian, transition and noise matrix of the filter is made of
//! 3x3 blocks. Instead of writing raw index ranges, blocks are addressed
//! by what they represent, so that the layout lives in a single place.

use nalgebra::SMatrix;

use crate::misc::type_aliases::{Float, Mat3, Vec3};

/// Something addressing a group of 3 rows or columns.
pub trait Block: Copy {
    /// Index of the first row or column of the block.
    fn offset(self) -> usize;
}

/// Groups of the 18-dimensional error state.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorBlock {
    /// Gravity error.
    Gravity,
    /// Rotation error (tangent vector).
    Rotation,
    /// Position error.
    Position,
    /// Velocity error.
    Velocity,
    /// Gyroscope bias error.
    GyroBias,
    /// Accelerometer bias error.
    AccelBias,
}

impl ErrorBlock {
    /// All the error blocks in state order.
    pub const ALL: [ErrorBlock; 6] = [
        ErrorBlock::Gravity,
        ErrorBlock::Rotation,
        ErrorBlock::Position,
        ErrorBlock::Velocity,
        ErrorBlock::GyroBias,
        ErrorBlock::AccelBias,
    ];
}

impl Block for ErrorBlock {
    fn offset(self) -> usize {
        match self {
            ErrorBlock::Gravity => 0,
            ErrorBlock::Rotation => 3,
            ErrorBlock::Position => 6,
            ErrorBlock::Velocity => 9,
            ErrorBlock::GyroBias => 12,
            ErrorBlock::AccelBias => 15,
        }
    }
}

/// Groups of the 24-dimensional nominal state.
///
/// The rotation is stored as a full row-major matrix,
/// so it spans 9 values instead of 3.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NominalBlock {
    /// Gravity vector.
    Gravity,
    /// Rotation matrix, row-major.
    Rotation,
    /// Position.
    Position,
    /// Velocity.
    Velocity,
    /// Gyroscope bias.
    GyroBias,
    /// Accelerometer bias.
    AccelBias,
}

impl Block for NominalBlock {
    fn offset(self) -> usize {
        match self {
            NominalBlock::Gravity => 0,
            NominalBlock::Rotation => 3,
            NominalBlock::Position => 12,
            NominalBlock::Velocity => 15,
            NominalBlock::GyroBias => 18,
            NominalBlock::AccelBias => 21,
        }
    }
}

/// Groups of the 12-dimensional IMU noise vector.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NoiseBlock {
    /// Gyroscope white noise.
    Gyro,
    /// Gyroscope bias random walk.
    GyroBiasWalk,
    /// Accelerometer white noise.
    Accel,
    /// Accelerometer bias random walk.
    AccelBiasWalk,
}

impl Block for NoiseBlock {
    fn offset(self) -> usize {
        match self {
            NoiseBlock::Gyro => 0,
            NoiseBlock::GyroBiasWalk => 3,
            NoiseBlock::Accel => 6,
            NoiseBlock::AccelBiasWalk => 9,
        }
    }
}

/// Groups of the 6-dimensional visual residual.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MeasurementBlock {
    /// Relative rotation residual.
    Rotation,
    /// Relative translation residual.
    Translation,
}

impl Block for MeasurementBlock {
    fn offset(self) -> usize {
        match self {
            MeasurementBlock::Rotation => 0,
            MeasurementBlock::Translation => 3,
        }
    }
}

/// Copy of the 3x3 block at (`row`, `col`).
pub fn block<const R: usize, const C: usize>(
    mat: &SMatrix<Float, R, C>,
    row: impl Block,
    col: impl Block,
) -> Mat3 {
    mat.fixed_view::<3, 3>(row.offset(), col.offset()).into_owned()
}

/// Overwrite the 3x3 block at (`row`, `col`).
pub fn set_block<const R: usize, const C: usize>(
    mat: &mut SMatrix<Float, R, C>,
    row: impl Block,
    col: impl Block,
    value: &Mat3,
) {
    mat.fixed_view_mut::<3, 3>(row.offset(), col.offset())
        .copy_from(value);
}

/// Copy of the 3-dimensional segment of a vector.
pub fn segment<const N: usize>(vec: &SMatrix<Float, N, 1>, at: impl Block) -> Vec3 {
    vec.fixed_rows::<3>(at.offset()).into_owned()
}

/// Overwrite the 3-dimensional segment of a vector.
pub fn set_segment<const N: usize>(vec: &mut SMatrix<Float, N, 1>, at: impl Block, value: &Vec3) {
    vec.fixed_rows_mut::<3>(at.offset()).copy_from(value);
}

// TESTS #############################################################
