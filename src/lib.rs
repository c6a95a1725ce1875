// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Visual-inertial odometry with an error-state Kalman filter.
//!
//! IMU samples are integrated between two visual measurements,
//! the relative pose estimated by the visual front-end then corrects
//! the prediction, and the local frame is finally re-anchored
//! at the new estimate.
//!
//! ```ignore
//! let config = Config::default();
//! let mut tracker = config.init(initial_state, initial_covariance);
//! for (imu, vis) in windows {
//!     tracker.track(&imu, &vis)?;
//! }
//! let (nb_windows, pose) = tracker.current_frame();
//! ```

pub mod core;
pub mod dataset;
pub mod error;
pub mod math;
pub mod misc;
