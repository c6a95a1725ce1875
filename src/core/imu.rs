// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! IMU samples and noise model.

use crate::error::FilterError;
use crate::misc::blocks::{set_block, NoiseBlock};
use crate::misc::type_aliases::{Float, Mat12, Mat3, Vec3};

/// Number of values in a raw IMU sample: `[t, wx, wy, wz, ax, ay, az]`.
pub const IMU_SAMPLE_LEN: usize = 7;

/// One reading of the inertial measurement unit.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ImuSample {
    /// Timestamp (seconds).
    pub time: Float,
    /// Angular rate (rad/s), in the body frame.
    pub gyro: Vec3,
    /// Specific force (m/s^2), in the body frame.
    pub accel: Vec3,
}

impl ImuSample {
    /// New sample from its parts.
    pub fn new(time: Float, gyro: Vec3, accel: Vec3) -> Self {
        Self { time, gyro, accel }
    }

    /// Decode a raw `[t, wx, wy, wz, ax, ay, az]` buffer.
    pub fn from_slice(values: &[Float]) -> Result<Self, FilterError> {
        match values {
            [t, wx, wy, wz, ax, ay, az] => Ok(Self {
                time: *t,
                gyro: Vec3::new(*wx, *wy, *wz),
                accel: Vec3::new(*ax, *ay, *az),
            }),
            _ => Err(FilterError::InvalidLength {
                what: "IMU sample",
                expected: IMU_SAMPLE_LEN,
                actual: values.len(),
            }),
        }
    }

    /// True if no value is NaN or infinite.
    pub fn is_finite(&self) -> bool {
        self.time.is_finite()
            && self.gyro.iter().all(|x| x.is_finite())
            && self.accel.iter().all(|x| x.is_finite())
    }
}

/// Continuous-time noise densities of the IMU.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ImuNoise {
    /// Gyroscope white noise density (rad/s/sqrt(Hz)).
    pub gyro: Float,
    /// Gyroscope bias random walk (rad/s^2/sqrt(Hz)).
    pub gyro_bias_walk: Float,
    /// Accelerometer white noise density (m/s^2/sqrt(Hz)).
    pub accel: Float,
    /// Accelerometer bias random walk (m/s^3/sqrt(Hz)).
    pub accel_bias_walk: Float,
}

impl ImuNoise {
    /// Noise-free IMU.
    pub fn zero() -> Self {
        Self {
            gyro: 0.0,
            gyro_bias_walk: 0.0,
            accel: 0.0,
            accel_bias_walk: 0.0,
        }
    }

    /// Typical MEMS IMU, of the kind found on driving datasets.
    pub fn consumer_grade() -> Self {
        Self {
            gyro: 1.7e-4,
            gyro_bias_walk: 2.0e-5,
            accel: 2.0e-3,
            accel_bias_walk: 3.0e-3,
        }
    }

    /// 12x12 block-diagonal covariance, ordered as `NoiseBlock`.
    pub fn covariance(&self) -> Mat12 {
        let mut sigma = Mat12::zeros();
        let diag = |std: Float| Mat3::identity() * (std * std);
        set_block(&mut sigma, NoiseBlock::Gyro, NoiseBlock::Gyro, &diag(self.gyro));
        set_block(
            &mut sigma,
            NoiseBlock::GyroBiasWalk,
            NoiseBlock::GyroBiasWalk,
            &diag(self.gyro_bias_walk),
        );
        set_block(&mut sigma, NoiseBlock::Accel, NoiseBlock::Accel, &diag(self.accel));
        set_block(
            &mut sigma,
            NoiseBlock::AccelBiasWalk,
            NoiseBlock::AccelBiasWalk,
            &diag(self.accel_bias_walk),
        );
        sigma
    }
}

impl Default for ImuNoise {
    fn default() -> Self {
        Self::consumer_grade()
    }
}
