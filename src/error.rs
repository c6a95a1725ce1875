// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Failures of the filter.
//!
//! All of them are fatal for the window being processed.
//! Deciding to skip the window, restart from the last good pose
//! or abort the trajectory is up to the caller.

use thiserror::Error;

use crate::misc::type_aliases::Float;

/// Everything that can go wrong while filtering.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FilterError {
    /// A window needs two samples to define at least one integration step.
    #[error("need at least 2 IMU samples in a window, got {count}")]
    NotEnoughImuSamples {
        /// Number of samples received.
        count: usize,
    },

    /// IMU timestamps must be strictly increasing.
    #[error("non positive time step between IMU samples {index} and {} ({previous} -> {next})", .index + 1)]
    NonPositiveTimeStep {
        /// Index of the first sample of the faulty pair.
        index: usize,
        /// Timestamp of the first sample.
        previous: Float,
        /// Timestamp of the second sample.
        next: Float,
    },

    /// The innovation covariance `S = H P H^T + R` cannot be inverted.
    #[error("innovation covariance is singular")]
    SingularInnovation,

    /// A NaN or infinite value showed up.
    #[error("non finite value in {stage}")]
    NonFinite {
        /// Where it was detected.
        stage: &'static str,
    },

    /// A raw buffer does not have the expected number of values.
    #[error("{what}: expected {expected} values, got {actual}")]
    InvalidLength {
        /// What the buffer was supposed to hold.
        what: &'static str,
        /// Expected number of values.
        expected: usize,
        /// Actual number of values.
        actual: usize,
    },

    /// The calibration rotation is not a rotation matrix.
    #[error("calibration rotation is not in SO(3)")]
    InvalidCalibration,

    /// Context added by the tracker around any of the other errors.
    #[error("window {window} [{start}, {end}]: {source}")]
    Window {
        /// Index of the window, starting at 0.
        window: usize,
        /// Timestamp of the first IMU sample of the window.
        start: Float,
        /// Timestamp of the last IMU sample of the window.
        end: Float,
        /// The underlying failure.
        #[source]
        source: Box<FilterError>,
    },
}

impl FilterError {
    /// The failure without the window context, if any.
    pub fn root(&self) -> &FilterError {
        match self {
            FilterError::Window { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Check that every value of an iterator is finite.
pub fn ensure_finite<'a, I>(values: I, stage: &'static str) -> Result<(), FilterError>
where
    I: IntoIterator<Item = &'a Float>,
{
    if values.into_iter().all(|x| x.is_finite()) {
        Ok(())
    } else {
        Err(FilterError::NonFinite { stage })
    }
}
