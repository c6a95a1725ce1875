// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Relative pose measurements produced by the visual front-end.

use crate::error::FilterError;
use crate::misc::type_aliases::{Float, Mat6, Vec3, Vec6};

/// Relative pose between the two camera frames bounding a window.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct VisualMeasurement {
    /// Relative rotation, as a rotation vector.
    /// It maps the end frame back onto the start frame.
    pub rotation: Vec3,
    /// Relative translation, position of the end frame in the start frame.
    pub translation: Vec3,
    /// Covariance, ordered `[rotation, translation]`.
    pub covariance: Mat6,
}

impl VisualMeasurement {
    /// Decode the network output.
    ///
    /// The network emits `[translation, rotation]` and a row-major 6x6
    /// covariance in that same order. The covariance is permuted into
    /// the `[rotation, translation]` order of the residuals.
    pub fn from_network_output(meas: &[Float], covar: &[Float]) -> Result<Self, FilterError> {
        if meas.len() != 6 {
            return Err(FilterError::InvalidLength {
                what: "visual measurement",
                expected: 6,
                actual: meas.len(),
            });
        }
        if covar.len() != 36 {
            return Err(FilterError::InvalidLength {
                what: "visual measurement covariance",
                expected: 36,
                actual: covar.len(),
            });
        }
        let raw = Mat6::from_row_slice(covar);
        // [t, r] -> [r, t]
        let swap = |i: usize| (i + 3) % 6;
        let covariance = Mat6::from_fn(|i, j| raw[(swap(i), swap(j))]);
        Ok(Self {
            rotation: Vec3::new(meas[3], meas[4], meas[5]),
            translation: Vec3::new(meas[0], meas[1], meas[2]),
            covariance,
        })
    }

    /// Flat `[rotation, translation]` vector.
    pub fn as_vector(&self) -> Vec6 {
        Vec6::new(
            self.rotation.x,
            self.rotation.y,
            self.rotation.z,
            self.translation.x,
            self.translation.y,
            self.translation.z,
        )
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn network_layout_is_reordered() {
        let meas = [1.0, 2.0, 3.0, 0.1, 0.2, 0.3];
        let mut covar = [0.0; 36];
        // variance of tx, and covariance (tx, rz)
        covar[0] = 10.0;
        covar[5] = 7.0;
        covar[30] = 7.0;
        covar[35] = 20.0;
        let vis = VisualMeasurement::from_network_output(&meas, &covar).unwrap();
        assert_eq!(vis.translation, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(vis.rotation, Vec3::new(0.1, 0.2, 0.3));
        assert_eq!(vis.covariance[(3, 3)], 10.0);
        assert_eq!(vis.covariance[(2, 2)], 20.0);
        assert_eq!(vis.covariance[(2, 3)], 7.0);
        assert_eq!(vis.covariance[(3, 2)], 7.0);
        assert_eq!(vis.as_vector()[0], 0.1);
    }

    #[test]
    fn malformed_output_is_rejected() {
        assert!(VisualMeasurement::from_network_output(&[0.0; 5], &[0.0; 36]).is_err());
        assert!(VisualMeasurement::from_network_output(&[0.0; 6], &[0.0; 35]).is_err());
    }
}
