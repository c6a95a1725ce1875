// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Synthetic IMU and visual measurement stream.
//!
//! The body spins at a constant angular rate around a fixed axis while its
//! position follows a constant world acceleration:
//!
//! ```text
//! R(t) = exp(w t)
//! p(t) = v0 t + a t^2 / 2
//! ```
//!
//! Under this motion the rotated specific force is constant in the window
//! frame, so the predictor integrates ideal samples exactly.
//! Visual measurements follow the same model as the corrector.

use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::StandardNormal;

use crate::core::filter::Calibration;
use crate::core::imu::{ImuNoise, ImuSample};
use crate::core::measurement::VisualMeasurement;
use crate::core::state::NominalState;
use crate::math::{se3, so3};
use crate::misc::type_aliases::{Float, Mat3, Mat4, Mat6, Vec3, Vec6};

/// Parameters of the synthetic trajectory and sensors.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Config {
    /// Constant angular rate of the body (rad/s).
    pub angular_rate: Vec3,
    /// Constant acceleration in the world frame (m/s^2).
    pub acceleration: Vec3,
    /// Velocity at time 0, in the world frame (m/s).
    pub initial_velocity: Vec3,
    /// Specific force of a resting accelerometer, in the world frame.
    pub gravity: Vec3,
    /// Constant gyroscope bias added to the readings.
    pub gyro_bias: Vec3,
    /// Constant accelerometer bias added to the readings.
    pub accel_bias: Vec3,
    /// IMU sampling rate (Hz).
    pub imu_rate: Float,
    /// Number of IMU steps between two visual measurements.
    pub samples_per_window: usize,
    /// White noise densities added to the IMU readings.
    pub imu_noise: ImuNoise,
    /// Standard deviation of the visual rotation (rad).
    pub rotation_std: Float,
    /// Standard deviation of the visual translation (m).
    pub translation_std: Float,
    /// Perturb visual measurements with their standard deviations.
    pub noisy_measurements: bool,
    /// Camera to IMU calibration used to generate measurements.
    pub calibration: Calibration,
    /// Seed of the random number generator.
    pub seed: u64,
}

impl Default for Config {
    /// Ideal sensors on a gently turning and accelerating trajectory.
    fn default() -> Self {
        Self {
            angular_rate: Vec3::new(0.0, 0.0, 0.2),
            acceleration: Vec3::new(0.2, 0.1, 0.0),
            initial_velocity: Vec3::new(2.0, 0.0, 0.0),
            gravity: Vec3::new(0.0, 0.0, 9.81),
            gyro_bias: Vec3::zeros(),
            accel_bias: Vec3::zeros(),
            imu_rate: 100.0,
            samples_per_window: 10,
            imu_noise: ImuNoise::zero(),
            rotation_std: 1e-3,
            translation_std: 1e-2,
            noisy_measurements: false,
            calibration: Calibration::identity(),
            seed: 0,
        }
    }
}

impl Config {
    /// Same trajectory with noisy sensors.
    pub fn noisy(self) -> Self {
        Self {
            imu_noise: ImuNoise::consumer_grade(),
            noisy_measurements: true,
            ..self
        }
    }

    /// True state at time 0, in the body frame.
    pub fn initial_state(&self) -> NominalState {
        self.true_state(0.0)
    }

    fn rotation(&self, t: Float) -> Mat3 {
        so3::exp(self.angular_rate * t)
    }

    fn position(&self, t: Float) -> Vec3 {
        self.initial_velocity * t + 0.5 * self.acceleration * t * t
    }

    fn velocity(&self, t: Float) -> Vec3 {
        self.initial_velocity + self.acceleration * t
    }

    /// World to body transform at time `t`.
    fn pose(&self, t: Float) -> Mat4 {
        se3::inverse(&se3::from_parts(&self.rotation(t), &self.position(t)))
    }

    /// State at time `t`, expressed in the body frame at that time.
    fn true_state(&self, t: Float) -> NominalState {
        let rot_t = self.rotation(t).transpose();
        NominalState {
            gravity: rot_t * self.gravity,
            velocity: rot_t * self.velocity(t),
            gyro_bias: self.gyro_bias,
            accel_bias: self.accel_bias,
            ..NominalState::at_rest(Vec3::zeros())
        }
    }

    fn time(&self, index: usize) -> Float {
        index as Float / self.imu_rate
    }
}

/// Everything the filter consumes for one window, plus the ground truth.
#[derive(Clone, Debug, PartialEq)]
pub struct Window {
    /// IMU samples, the first and last ones are shared with the neighbour windows.
    pub imu: Vec<ImuSample>,
    /// Relative pose measured by the camera over the window.
    pub measurement: VisualMeasurement,
    /// World to body transform at the end of the window.
    pub true_pose: Mat4,
    /// State at the end of the window, in the body frame at that time.
    pub true_state: NominalState,
}

/// Endless stream of windows.
#[derive(Clone, Debug)]
pub struct Synthetic {
    config: Config,
    rng: StdRng,
    window: usize,
}

impl Synthetic {
    /// Start a stream at time 0.
    pub fn new(config: Config) -> Self {
        Self {
            rng: StdRng::seed_from_u64(config.seed),
            config,
            window: 0,
        }
    }

    fn gaussian(&mut self, std: Float) -> Vec3 {
        let rng = &mut self.rng;
        Vec3::from_fn(|_, _| std * rng.sample::<Float, _>(StandardNormal))
    }

    fn imu_sample(&mut self, index: usize) -> ImuSample {
        let config = self.config;
        let t = config.time(index);
        let dt = 1.0 / config.imu_rate;
        let gyro = config.angular_rate + config.gyro_bias;
        let accel = config.rotation(t).transpose() * (config.acceleration + config.gravity)
            + config.accel_bias;
        let gyro_noise = self.gaussian(config.imu_noise.gyro / dt.sqrt());
        let accel_noise = self.gaussian(config.imu_noise.accel / dt.sqrt());
        ImuSample::new(t, gyro + gyro_noise, accel + accel_noise)
    }

    fn measurement(&mut self, start: Float, end: Float) -> VisualMeasurement {
        let config = self.config;
        let start_rot_t = config.rotation(start).transpose();
        let rotation = start_rot_t * config.rotation(end);
        let position = start_rot_t * (config.position(end) - config.position(start));
        let (mut vis_rot, mut vis_trans) =
            config.calibration.expected_measurement(&rotation, &position);
        if config.noisy_measurements {
            vis_rot += self.gaussian(config.rotation_std);
            vis_trans += self.gaussian(config.translation_std);
        }
        let rot_var = config.rotation_std * config.rotation_std;
        let trans_var = config.translation_std * config.translation_std;
        VisualMeasurement {
            rotation: vis_rot,
            translation: vis_trans,
            covariance: Mat6::from_diagonal(&Vec6::new(
                rot_var, rot_var, rot_var, trans_var, trans_var, trans_var,
            )),
        }
    }
}

impl Iterator for Synthetic {
    type Item = Window;

    fn next(&mut self) -> Option<Window> {
        let n = self.config.samples_per_window;
        let first = self.window * n;
        let imu = (first..=first + n).map(|i| self.imu_sample(i)).collect();
        let start = self.config.time(first);
        let end = self.config.time(first + n);
        let measurement = self.measurement(start, end);
        self.window += 1;
        Some(Window {
            imu,
            measurement,
            true_pose: self.config.pose(end),
            true_state: self.config.true_state(end),
        })
    }
}

// TESTS #############################################################
