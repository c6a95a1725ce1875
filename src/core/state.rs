// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Nominal and error states of the filter, and their flat encodings.
//!
//! Flat layouts, shared with every collaborator:
//!
//! ```text
//! nominal (24): [ g(3) | C(9, row-major) | r(3) | v(3) | bw(3) | ba(3) ]
//! error   (18): [ dg(3) | dphi(3)        | dr(3) | dv(3) | dbw(3) | dba(3) ]
//! ```

use crate::error::FilterError;
use crate::math::so3;
use crate::misc::blocks::{segment, set_segment, Block, ErrorBlock, NominalBlock};
use crate::misc::type_aliases::{Float, Mat18, Mat3, Vec18, Vec24, Vec3};

/// Dimension of the flat nominal state.
pub const NOMINAL_DIM: usize = 24;
/// Dimension of the error state.
pub const ERROR_DIM: usize = 18;

/// Covariance of the error state.
pub type Covariance = Mat18;

/// Navigation state, expressed in the local frame anchored at the last pose.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct NominalState {
    /// Gravity vector, as seen by a resting accelerometer.
    pub gravity: Vec3,
    /// Rotation of the body frame into the local frame.
    pub rotation: Mat3,
    /// Position of the body in the local frame.
    pub position: Vec3,
    /// Velocity of the body, expressed in the body frame.
    pub velocity: Vec3,
    /// Gyroscope bias.
    pub gyro_bias: Vec3,
    /// Accelerometer bias.
    pub accel_bias: Vec3,
}

/// Tangent-space perturbation around a nominal state.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ErrorState {
    /// Gravity error.
    pub gravity: Vec3,
    /// Rotation error, as a rotation vector.
    pub rotation: Vec3,
    /// Position error.
    pub position: Vec3,
    /// Velocity error.
    pub velocity: Vec3,
    /// Gyroscope bias error.
    pub gyro_bias: Vec3,
    /// Accelerometer bias error.
    pub accel_bias: Vec3,
}

impl NominalState {
    /// Sensor at rest at the origin of the local frame, without biases.
    pub fn at_rest(gravity: Vec3) -> Self {
        Self {
            gravity,
            rotation: Mat3::identity(),
            position: Vec3::zeros(),
            velocity: Vec3::zeros(),
            gyro_bias: Vec3::zeros(),
            accel_bias: Vec3::zeros(),
        }
    }

    /// Flat 24-dimensional encoding.
    pub fn encode(&self) -> Vec24 {
        let mut flat = Vec24::zeros();
        set_segment(&mut flat, NominalBlock::Gravity, &self.gravity);
        let at = NominalBlock::Rotation.offset();
        for (i, row) in self.rotation.row_iter().enumerate() {
            flat.fixed_rows_mut::<3>(at + 3 * i)
                .copy_from(&row.transpose());
        }
        set_segment(&mut flat, NominalBlock::Position, &self.position);
        set_segment(&mut flat, NominalBlock::Velocity, &self.velocity);
        set_segment(&mut flat, NominalBlock::GyroBias, &self.gyro_bias);
        set_segment(&mut flat, NominalBlock::AccelBias, &self.accel_bias);
        flat
    }

    /// Inverse of `encode`.
    pub fn decode(flat: &Vec24) -> Self {
        let at = NominalBlock::Rotation.offset();
        Self {
            gravity: segment(flat, NominalBlock::Gravity),
            rotation: Mat3::from_row_slice(&flat.as_slice()[at..at + 9]),
            position: segment(flat, NominalBlock::Position),
            velocity: segment(flat, NominalBlock::Velocity),
            gyro_bias: segment(flat, NominalBlock::GyroBias),
            accel_bias: segment(flat, NominalBlock::AccelBias),
        }
    }

    /// Decode a raw buffer, checking its length.
    pub fn from_slice(values: &[Float]) -> Result<Self, FilterError> {
        if values.len() != NOMINAL_DIM {
            return Err(FilterError::InvalidLength {
                what: "nominal state",
                expected: NOMINAL_DIM,
                actual: values.len(),
            });
        }
        Ok(Self::decode(&Vec24::from_column_slice(values)))
    }

    /// Inject an error state: additive on every group except the rotation,
    /// which is perturbed on the right, `C exp(dphi)`.
    pub fn inject(&self, err: &ErrorState) -> Self {
        Self {
            gravity: self.gravity + err.gravity,
            rotation: self.rotation * so3::exp(err.rotation),
            position: self.position + err.position,
            velocity: self.velocity + err.velocity,
            gyro_bias: self.gyro_bias + err.gyro_bias,
            accel_bias: self.accel_bias + err.accel_bias,
        }
    }

    /// True if no value is NaN or infinite.
    pub fn is_finite(&self) -> bool {
        self.encode().iter().all(|x| x.is_finite())
    }
}

impl ErrorState {
    /// Flat 18-dimensional encoding.
    pub fn encode(&self) -> Vec18 {
        let mut flat = Vec18::zeros();
        set_segment(&mut flat, ErrorBlock::Gravity, &self.gravity);
        set_segment(&mut flat, ErrorBlock::Rotation, &self.rotation);
        set_segment(&mut flat, ErrorBlock::Position, &self.position);
        set_segment(&mut flat, ErrorBlock::Velocity, &self.velocity);
        set_segment(&mut flat, ErrorBlock::GyroBias, &self.gyro_bias);
        set_segment(&mut flat, ErrorBlock::AccelBias, &self.accel_bias);
        flat
    }

    /// Inverse of `encode`.
    pub fn decode(flat: &Vec18) -> Self {
        Self {
            gravity: segment(flat, ErrorBlock::Gravity),
            rotation: segment(flat, ErrorBlock::Rotation),
            position: segment(flat, ErrorBlock::Position),
            velocity: segment(flat, ErrorBlock::Velocity),
            gyro_bias: segment(flat, ErrorBlock::GyroBias),
            accel_bias: segment(flat, ErrorBlock::AccelBias),
        }
    }

    /// Decode a raw buffer, checking its length.
    pub fn from_slice(values: &[Float]) -> Result<Self, FilterError> {
        if values.len() != ERROR_DIM {
            return Err(FilterError::InvalidLength {
                what: "error state",
                expected: ERROR_DIM,
                actual: values.len(),
            });
        }
        Ok(Self::decode(&Vec18::from_column_slice(values)))
    }
}

/// Decode a raw row-major 18x18 covariance buffer, checking its length.
pub fn covariance_from_slice(values: &[Float]) -> Result<Covariance, FilterError> {
    if values.len() != ERROR_DIM * ERROR_DIM {
        return Err(FilterError::InvalidLength {
            what: "covariance",
            expected: ERROR_DIM * ERROR_DIM,
            actual: values.len(),
        });
    }
    Ok(Covariance::from_row_slice(values))
}

/// Block-diagonal covariance built from one standard deviation per error group.
pub fn diagonal_covariance(std_devs: &[(ErrorBlock, Float)]) -> Covariance {
    let mut covar = Covariance::zeros();
    for &(group, std_dev) in std_devs {
        let at = group.offset();
        for i in at..at + 3 {
            covar[(i, i)] = std_dev * std_dev;
        }
    }
    covar
}

// TESTS #############################################################

#[cfg(test)]
mod tests {

    use super::*;

    fn gen_state() -> NominalState {
        NominalState {
            gravity: Vec3::new(0.1, -0.2, 9.8),
            rotation: so3::exp(Vec3::new(0.3, 0.2, -0.5)),
            position: Vec3::new(1.0, 2.0, 3.0),
            velocity: Vec3::new(4.0, 5.0, 6.0),
            gyro_bias: Vec3::new(0.01, 0.02, 0.03),
            accel_bias: Vec3::new(0.04, 0.05, 0.06),
        }
    }

    #[test]
    fn nominal_round_trip() {
        let state = gen_state();
        assert_eq!(state, NominalState::decode(&state.encode()));
    }

    #[test]
    fn rotation_is_row_major() {
        let mut state = gen_state();
        state.rotation = Mat3::new(1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0);
        let flat = state.encode();
        let rot: Vec<Float> = flat.as_slice()[3..12].to_vec();
        assert_eq!(rot, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]);
        assert_eq!(flat[12], 1.0);
        assert_eq!(flat[23], 0.06);
    }

    #[test]
    fn error_round_trip() {
        let flat = Vec18::from_fn(|i, _| i as Float);
        let err = ErrorState::decode(&flat);
        assert_eq!(err.rotation, Vec3::new(3.0, 4.0, 5.0));
        assert_eq!(err.accel_bias, Vec3::new(15.0, 16.0, 17.0));
        assert_eq!(flat, err.encode());
    }

    #[test]
    fn malformed_buffers_are_rejected() {
        assert_eq!(
            NominalState::from_slice(&[0.0; 23]),
            Err(FilterError::InvalidLength {
                what: "nominal state",
                expected: 24,
                actual: 23
            })
        );
        assert!(ErrorState::from_slice(&[0.0; 24]).is_err());
        assert!(covariance_from_slice(&[0.0; 18]).is_err());
        let flat = gen_state().encode();
        assert_eq!(Ok(gen_state()), NominalState::from_slice(flat.as_slice()));
    }

    #[test]
    fn zero_injection_is_identity() {
        let state = gen_state();
        let zero = ErrorState::decode(&Vec18::zeros());
        assert_eq!(state, state.inject(&zero));
    }

    #[test]
    fn diagonal_covariance_layout() {
        let covar = diagonal_covariance(&[(ErrorBlock::Velocity, 2.0)]);
        assert_eq!(covar[(9, 9)], 4.0);
        assert_eq!(covar[(11, 11)], 4.0);
        assert_eq!(covar.trace(), 12.0);
    }
}
