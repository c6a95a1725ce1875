// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Correction of the predicted state with a relative visual pose.

use log::debug;

use super::Filter;
use crate::core::measurement::VisualMeasurement;
use crate::core::state::{Covariance, ErrorState, NominalState};
use crate::error::{ensure_finite, FilterError};
use crate::math::so3;
use crate::misc::blocks::{set_block, ErrorBlock, MeasurementBlock};
use crate::misc::type_aliases::{Mat18, Mat18x6, Mat6, Mat6x18, Vec3, Vec6};

impl Filter {
    /// Fuse a visual measurement into the predicted state.
    pub fn update(
        &self,
        pred_state: &NominalState,
        pred_covar: &Covariance,
        vis: &VisualMeasurement,
    ) -> Result<(NominalState, Covariance), FilterError> {
        ensure_finite(
            vis.as_vector().iter().chain(vis.covariance.iter()),
            "visual measurement",
        )?;
        let residual = self.residual(pred_state, vis);
        let rot_residual = residual.fixed_rows::<3>(0).into_owned();
        let h = self.observation_jacobian(pred_state, &rot_residual);
        let (gain, est_covar) = joseph_update(pred_covar, &h, &vis.covariance)?;
        let est_error = ErrorState::decode(&(gain * residual));
        let est_state = pred_state.inject(&est_error);

        if !est_state.is_finite() {
            return Err(FilterError::NonFinite { stage: "updated state" });
        }
        ensure_finite(est_covar.iter(), "updated covariance")?;
        debug!(
            "update: |residual| = {:.3e}, trace(P) {:.3e} -> {:.3e}",
            residual.norm(),
            pred_covar.trace(),
            est_covar.trace()
        );
        Ok((est_state, est_covar))
    }

    /// Innovation `[rotation; translation]` between the measured
    /// and predicted relative camera motions.
    pub fn residual(&self, state: &NominalState, vis: &VisualMeasurement) -> Vec6 {
        let cal_rot = self.calibration.rotation();
        let cal_trans = self.calibration.translation();
        let cal_rot_t = cal_rot.transpose();
        let rot = so3::log(so3::exp(vis.rotation) * cal_rot_t * state.rotation * cal_rot);
        let trans = vis.translation
            - cal_rot_t * state.rotation * cal_trans
            - cal_rot_t * (state.position - cal_trans);
        Vec6::new(rot.x, rot.y, rot.z, trans.x, trans.y, trans.z)
    }

    /// Jacobian `H` of the predicted measurement with respect to the error state,
    /// such that `residual ~ H dx`.
    ///
    /// The rotation part goes through the inverse left Jacobian of the negated
    /// rotation residual, which is the inverse right Jacobian of the residual.
    pub fn observation_jacobian(&self, state: &NominalState, rot_residual: &Vec3) -> Mat6x18 {
        let cal_rot_t = self.calibration.rotation().transpose();
        let cal_trans = self.calibration.translation();
        let mut h = Mat6x18::zeros();
        set_block(
            &mut h,
            MeasurementBlock::Rotation,
            ErrorBlock::Rotation,
            &(-so3::left_jacobian_inv(-rot_residual) * cal_rot_t),
        );
        set_block(
            &mut h,
            MeasurementBlock::Translation,
            ErrorBlock::Rotation,
            &(-cal_rot_t * state.rotation * so3::hat(*cal_trans)),
        );
        set_block(
            &mut h,
            MeasurementBlock::Translation,
            ErrorBlock::Position,
            &cal_rot_t,
        );
        h
    }
}

/// Kalman gain and Joseph form posterior covariance
/// `(I - K H) P (I - K H)^T + K R K^T`.
///
/// The innovation covariance `S = H P H^T + R` must be positive definite.
pub fn joseph_update(
    p: &Covariance,
    h: &Mat6x18,
    r: &Mat6,
) -> Result<(Mat18x6, Covariance), FilterError> {
    let s = h * p * h.transpose() + r;
    let s_inv = s
        .cholesky()
        .ok_or(FilterError::SingularInnovation)?
        .inverse();
    if !s_inv.iter().all(|x| x.is_finite()) {
        return Err(FilterError::SingularInnovation);
    }
    let gain = p * h.transpose() * s_inv;
    let i_kh = Mat18::identity() - gain * h;
    let posterior = i_kh * p * i_kh.transpose() + gain * r * gain.transpose();
    Ok((gain, posterior))
}

// TESTS #############################################################

#[cfg(test)]
mod tests {

    use super::*;
    use crate::core::filter::{Calibration, Config};
    use crate::core::state::diagonal_covariance;
    use crate::misc::type_aliases::{Float, Vec18};
    use approx;
    use quickcheck_macros;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn gen_state() -> NominalState {
        NominalState {
            gravity: Vec3::new(0.0, 0.1, 9.8),
            rotation: so3::exp(Vec3::new(0.02, -0.01, 0.05)),
            position: Vec3::new(0.9, 0.05, -0.02),
            velocity: Vec3::new(9.0, 0.2, 0.0),
            gyro_bias: Vec3::zeros(),
            accel_bias: Vec3::zeros(),
        }
    }

    fn gen_covariance() -> Covariance {
        diagonal_covariance(&[
            (ErrorBlock::Gravity, 0.05),
            (ErrorBlock::Rotation, 0.02),
            (ErrorBlock::Position, 0.1),
            (ErrorBlock::Velocity, 0.1),
            (ErrorBlock::GyroBias, 1e-3),
            (ErrorBlock::AccelBias, 1e-2),
        ])
    }

    fn gen_calibration() -> Calibration {
        Calibration::new(
            so3::exp(Vec3::new(-1.2, 0.1, -1.5)),
            Vec3::new(0.3, -0.1, 0.8),
        )
        .unwrap()
    }

    fn filter_with(calibration: Calibration) -> Filter {
        Filter::new(&Config {
            calibration,
            ..Config::default()
        })
    }

    fn exact_measurement(filter: &Filter, state: &NominalState, std: Float) -> VisualMeasurement {
        let (rotation, translation) = filter
            .calibration()
            .expected_measurement(&state.rotation, &state.position);
        VisualMeasurement {
            rotation,
            translation,
            covariance: Mat6::identity() * (std * std),
        }
    }

    #[test]
    fn consistent_measurement_has_zero_residual() {
        for calibration in &[Calibration::identity(), gen_calibration()] {
            let filter = filter_with(*calibration);
            let state = gen_state();
            let vis = exact_measurement(&filter, &state, 0.01);
            approx::assert_abs_diff_eq!(filter.residual(&state, &vis), Vec6::zeros(), epsilon = 1e-12);
        }
    }

    #[test]
    fn zero_residual_keeps_state_and_shrinks_covariance() {
        let filter = filter_with(Calibration::identity());
        let state = gen_state();
        let covar = gen_covariance();
        let vis = exact_measurement(&filter, &state, 0.01);
        let (est_state, est_covar) = filter.update(&state, &covar, &vis).unwrap();
        approx::assert_abs_diff_eq!(est_state.rotation, state.rotation, epsilon = 1e-12);
        approx::assert_abs_diff_eq!(est_state.position, state.position, epsilon = 1e-12);
        approx::assert_abs_diff_eq!(est_state.velocity, state.velocity, epsilon = 1e-12);
        approx::assert_abs_diff_eq!(est_state.gravity, state.gravity, epsilon = 1e-12);
        assert!(est_covar.trace() < covar.trace());
        // Only the observed blocks gain information.
        assert!(est_covar[(6, 6)] < covar[(6, 6)]);
        assert!(est_covar[(3, 3)] < covar[(3, 3)]);
        assert_eq!(est_covar[(12, 12)], covar[(12, 12)]);
    }

    #[test]
    fn pulls_position_towards_measurement() {
        let filter = filter_with(Calibration::identity());
        let state = NominalState::at_rest(Vec3::new(0.0, 0.0, 9.81));
        let covar = gen_covariance();
        let mut vis = exact_measurement(&filter, &state, 0.1);
        vis.translation = Vec3::new(1.0, 0.0, 0.0);
        let (est_state, _) = filter.update(&state, &covar, &vis).unwrap();
        // Equal prior and measurement variances: halfway.
        approx::assert_abs_diff_eq!(est_state.position, Vec3::new(0.5, 0.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn pulls_rotation_towards_measurement() {
        let filter = filter_with(Calibration::identity());
        let state = NominalState::at_rest(Vec3::new(0.0, 0.0, 9.81));
        let covar = diagonal_covariance(&[(ErrorBlock::Rotation, 10.0), (ErrorBlock::Position, 1.0)]);
        let turn = so3::exp(Vec3::new(0.0, 0.0, 0.05));
        let mut vis = exact_measurement(&filter, &state, 1e-6);
        vis.rotation = so3::log(turn.transpose());
        let (est_state, _) = filter.update(&state, &covar, &vis).unwrap();
        approx::assert_abs_diff_eq!(est_state.rotation, turn, epsilon = 1e-9);
    }

    #[test]
    fn ignores_useless_measurement() {
        let filter = filter_with(gen_calibration());
        let state = gen_state();
        let covar = gen_covariance();
        let mut vis = exact_measurement(&filter, &state, 1e8);
        vis.translation += Vec3::new(0.5, -0.3, 0.2);
        vis.rotation += Vec3::new(0.01, 0.02, -0.01);
        let (est_state, est_covar) = filter.update(&state, &covar, &vis).unwrap();
        approx::assert_abs_diff_eq!(est_state.position, state.position, epsilon = 1e-9);
        approx::assert_abs_diff_eq!(est_state.rotation, state.rotation, epsilon = 1e-9);
        approx::assert_abs_diff_eq!(est_covar, covar, epsilon = 1e-9);
    }

    #[test]
    fn jacobian_matches_finite_differences() {
        let filter = filter_with(gen_calibration());
        let state = gen_state();
        let mut vis = exact_measurement(&filter, &state, 0.01);
        vis.rotation += Vec3::new(0.01, -0.02, 0.015);
        vis.translation += Vec3::new(0.1, 0.0, -0.05);
        let residual = filter.residual(&state, &vis);
        let h = filter.observation_jacobian(&state, &residual.fixed_rows::<3>(0).into_owned());
        let eps = 1e-6;
        for i in 0..18 {
            let mut dx = Vec18::zeros();
            dx[i] = eps;
            let perturbed = state.inject(&ErrorState::decode(&dx));
            // The true state explains the residual: r(x + dx) ~ r(x) - H dx.
            let numeric = (residual - filter.residual(&perturbed, &vis)) / eps;
            approx::assert_abs_diff_eq!(numeric, h.column(i).into_owned(), epsilon = 1e-5);
        }
    }

    #[test]
    fn singular_innovation_is_fatal() {
        let filter = filter_with(Calibration::identity());
        let state = gen_state();
        let vis = VisualMeasurement {
            rotation: Vec3::zeros(),
            translation: Vec3::zeros(),
            covariance: Mat6::zeros(),
        };
        assert_eq!(
            filter.update(&state, &Covariance::zeros(), &vis),
            Err(FilterError::SingularInnovation)
        );
    }

    #[test]
    fn non_finite_measurement_is_fatal() {
        let filter = filter_with(Calibration::identity());
        let state = gen_state();
        let mut vis = exact_measurement(&filter, &state, 0.1);
        vis.translation.y = Float::INFINITY;
        assert!(matches!(
            filter.update(&state, &gen_covariance(), &vis),
            Err(FilterError::NonFinite { .. })
        ));
    }

    // PROPERTY TESTS ################################################

    #[quickcheck_macros::quickcheck]
    fn joseph_posterior_is_symmetric_psd(seed: u64) -> bool {
        let mut rng = StdRng::seed_from_u64(seed);
        let p = gen_spd::<18>(&mut rng);
        let r = gen_spd::<6>(&mut rng);
        let h = Mat6x18::from_fn(|_, _| rng.gen_range(-2.0..2.0));
        let (_, post) = joseph_update(&p, &h, &r).unwrap();
        let scale = p.amax();
        let symmetric = (post - post.transpose()).amax() <= 1e-10 * scale;
        let sym_part = 0.5 * (post + post.transpose());
        let min_eigen = sym_part.symmetric_eigenvalues().min();
        symmetric && min_eigen >= -1e-10 * scale && post.trace() <= p.trace() * (1.0 + 1e-10)
    }

    // GENERATORS ####################################################

    /// Random symmetric positive definite matrix `A A^T + 0.1 I`.
    fn gen_spd<const N: usize>(rng: &mut StdRng) -> nalgebra::SMatrix<Float, N, N> {
        let a = nalgebra::SMatrix::<Float, N, N>::from_fn(|_, _| rng.gen_range(-1.0..1.0));
        a * a.transpose() + nalgebra::SMatrix::<Float, N, N>::identity() * 0.1
    }

    #[test]
    fn spd_generator() {
        let mut rng = StdRng::seed_from_u64(42);
        let m = gen_spd::<6>(&mut rng);
        assert!(m.cholesky().is_some());
        assert_eq!(m, m.transpose());
    }
}
