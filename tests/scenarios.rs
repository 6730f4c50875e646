//! End-to-end scenarios exercising the filter through its public surface
//! only, each one a single state-space model run start to finish.

use approx::assert_relative_eq;
use nalgebra::{DMatrix, DVector};

use kalman_engine::{Complex, Conserve, FilterOptions, InversionMethod, KalmanFilter, StateSpace, TimeSeries};

fn local_level(y_vals: &[f64]) -> StateSpace<f64> {
    let nobs = y_vals.len();
    let obs = DMatrix::from_row_slice(1, nobs, y_vals);
    let mut ss = StateSpace::new(
        obs,
        TimeSeries::Invariant(DMatrix::identity(1, 1)),
        TimeSeries::Invariant(DVector::zeros(1)),
        TimeSeries::Invariant(DMatrix::identity(1, 1)),
        TimeSeries::Invariant(DMatrix::identity(1, 1)),
        TimeSeries::Invariant(DVector::zeros(1)),
        TimeSeries::Invariant(DMatrix::identity(1, 1)),
        TimeSeries::Invariant(DMatrix::identity(1, 1)),
    )
    .unwrap();
    ss.initialize_known(DVector::zeros(1), DMatrix::from_row_slice(1, 1, &[1e6]))
        .unwrap();
    ss
}

#[test]
fn local_level_filtered_state_and_covariance_move_monotonically() {
    let y = [1.0, 2.0, 3.0, 4.0, 5.0];
    let ss = local_level(&y);
    let mut kf = KalmanFilter::new(&ss, FilterOptions::new()).unwrap();

    let mut prev_cov = f64::INFINITY;
    let mut prev_state = f64::NEG_INFINITY;
    for t in 0..y.len() {
        kf.step().unwrap();
        let filtered = kf.filtered(t);
        let cov = filtered.covariance()[(0, 0)];
        let state = filtered.state()[0];
        assert!(cov < prev_cov, "P_{{t|t}} should shrink every period");
        assert!(state > prev_state, "a_{{t|t}} should climb toward the running mean");
        prev_cov = cov;
        prev_state = state;
    }
}

#[test]
fn local_level_covariance_converges_to_the_golden_ratio_fixed_point() {
    let y: Vec<f64> = (1..=20).map(|i| i as f64).collect();
    let ss = local_level(&y);
    let mut kf = KalmanFilter::new(&ss, FilterOptions::new()).unwrap();
    kf.run().unwrap();

    let p_limit = (1.0 + 5.0_f64.sqrt()) / 2.0;
    let predicted = kf.predicted(20);
    assert_relative_eq!(predicted.covariance()[(0, 0)], p_limit, epsilon = 1e-6);
    assert!(kf.is_converged());
}

#[test]
fn ar1_with_known_stationary_initialization_matches_the_closed_form_first_step() {
    let y = [0.5, 0.25, 1.125, 0.5625, -0.21875];
    let obs = DMatrix::from_row_slice(1, y.len(), &y);
    let mut ss = StateSpace::new(
        obs,
        TimeSeries::Invariant(DMatrix::identity(1, 1)),
        TimeSeries::Invariant(DVector::zeros(1)),
        TimeSeries::Invariant(DMatrix::from_row_slice(1, 1, &[0.0])),
        TimeSeries::Invariant(DMatrix::from_row_slice(1, 1, &[0.5])),
        TimeSeries::Invariant(DVector::zeros(1)),
        TimeSeries::Invariant(DMatrix::identity(1, 1)),
        TimeSeries::Invariant(DMatrix::from_row_slice(1, 1, &[1.0])),
    )
    .unwrap();
    let p1 = 1.0 / (1.0 - 0.5 * 0.5); // Q / (1 - T^2) = 1.333...
    ss.initialize_known(DVector::zeros(1), DMatrix::from_row_slice(1, 1, &[p1]))
        .unwrap();

    let mut kf = KalmanFilter::new(&ss, FilterOptions::new()).unwrap();
    kf.step().unwrap();

    assert_relative_eq!(kf.forecast_error(0)[0], 0.5, epsilon = 1e-10);
    assert_relative_eq!(kf.forecast_error_cov(0)[(0, 0)], p1, epsilon = 1e-10);
    let expected_ll = -0.5 * ((2.0 * std::f64::consts::PI).ln() + p1.ln() + 0.25 / p1);
    assert_relative_eq!(kf.loglikelihood_at(0).copied().unwrap(), expected_ll, epsilon = 1e-8);
}

#[test]
fn partial_missingness_reselects_the_effective_observation_count_each_period() {
    let nan = f64::NAN;
    let obs = DMatrix::from_row_slice(2, 3, &[1.0, nan, 0.5, 1.1, 0.9, nan]);
    let ss = StateSpace::new(
        obs,
        TimeSeries::Invariant(DMatrix::from_row_slice(2, 1, &[1.0, 1.0])),
        TimeSeries::Invariant(DVector::zeros(2)),
        TimeSeries::Invariant(DMatrix::identity(2, 2) * 0.1),
        TimeSeries::Invariant(DMatrix::from_row_slice(1, 1, &[0.9])),
        TimeSeries::Invariant(DVector::zeros(1)),
        TimeSeries::Invariant(DMatrix::identity(1, 1)),
        TimeSeries::Invariant(DMatrix::from_row_slice(1, 1, &[0.2])),
    )
    .unwrap();
    let p_eff: Vec<usize> = (0..3).map(|t| ss.p() - ss.nmissing(t)).collect();
    assert_eq!(p_eff, vec![2, 1, 1]);

    let mut ss = ss;
    ss.initialize_known(DVector::from_row_slice(&[0.5]), DMatrix::from_row_slice(1, 1, &[0.3]))
        .unwrap();
    let mut kf = KalmanFilter::new(&ss, FilterOptions::new()).unwrap();
    kf.step().unwrap();

    // At t=1 only row 1 (`y=0.9`) is present, so the reselected update is
    // exactly the one-observation system `Z_eff=[1], H_eff=[0.1]` applied to
    // the prior the full-`p=2` filter just predicted into period 1. Solve
    // that reduced system independently and check it reproduces the full
    // filter's period-1 posterior exactly, not merely its dimension.
    let prior_state = kf.predicted(1).state().clone();
    let prior_cov = kf.predicted(1).covariance().clone();
    let reduced = StateSpace::new(
        DMatrix::from_row_slice(1, 1, &[0.9]),
        TimeSeries::Invariant(DMatrix::from_row_slice(1, 1, &[1.0])),
        TimeSeries::Invariant(DVector::zeros(1)),
        TimeSeries::Invariant(DMatrix::from_row_slice(1, 1, &[0.1])),
        TimeSeries::Invariant(DMatrix::from_row_slice(1, 1, &[0.9])),
        TimeSeries::Invariant(DVector::zeros(1)),
        TimeSeries::Invariant(DMatrix::identity(1, 1)),
        TimeSeries::Invariant(DMatrix::from_row_slice(1, 1, &[0.2])),
    )
    .unwrap();
    let mut reduced = reduced;
    reduced.initialize_known(prior_state, prior_cov).unwrap();
    let mut kf_reduced = KalmanFilter::new(&reduced, FilterOptions::new()).unwrap();
    kf_reduced.step().unwrap();

    kf.step().unwrap();
    assert_relative_eq!(
        kf.filtered(1).state()[0],
        kf_reduced.filtered(0).state()[0],
        epsilon = 1e-10
    );
    assert_relative_eq!(
        kf.filtered(1).covariance()[(0, 0)],
        kf_reduced.filtered(0).covariance()[(0, 0)],
        epsilon = 1e-10
    );

    kf.step().unwrap();
    assert!(kf.is_done());
}

#[test]
fn an_all_missing_tail_leaves_the_posterior_unchanged_and_only_the_prior_evolves() {
    let mut y: Vec<f64> = vec![1.0, 2.0, 3.0, 4.0, 5.0];
    y.extend([f64::NAN, f64::NAN, f64::NAN]);
    let ss = local_level(&y);
    let mut kf = KalmanFilter::new(&ss, FilterOptions::new()).unwrap();
    for _ in 0..5 {
        kf.step().unwrap();
    }

    for t in 5..8 {
        let prior = kf.predicted(t);
        kf.step().unwrap();
        assert_eq!(kf.forecast_error(t)[0], 0.0);
        assert_eq!(kf.loglikelihood_at(t).copied().unwrap(), 0.0);

        let filtered = kf.filtered(t);
        assert_eq!(filtered.state(), prior.state());
        assert_eq!(filtered.covariance(), prior.covariance());

        let next = kf.predicted(t + 1);
        let expected_state = prior.state()[0]; // T = 1, c = 0
        let expected_cov = prior.covariance()[(0, 0)] + 1.0; // T P T' + Q*, T = Q* = 1
        assert_relative_eq!(next.state()[0], expected_state, epsilon = 1e-10);
        assert_relative_eq!(next.covariance()[(0, 0)], expected_cov, epsilon = 1e-10);
    }
}

#[test]
fn convergence_short_circuits_identically_under_two_inversion_policies() {
    let y: Vec<f64> = (1..=100).map(|i| i as f64).collect();

    let ss_a = local_level(&y);
    let mut opts_a = FilterOptions::<f64>::new();
    opts_a.inversion_method = InversionMethod::SOLVE_CHOLESKY;
    let mut kf_a = KalmanFilter::new(&ss_a, opts_a).unwrap();
    kf_a.run().unwrap();

    let ss_b = local_level(&y);
    let mut opts_b = FilterOptions::<f64>::new();
    opts_b.inversion_method = InversionMethod::SOLVE_LU;
    let mut kf_b = KalmanFilter::new(&ss_b, opts_b).unwrap();
    kf_b.run().unwrap();

    let t_star_a = kf_a.converged_at().expect("policy A should converge before t=100");
    let t_star_b = kf_b.converged_at().expect("policy B should converge before t=100");
    assert!(t_star_a < 100);
    assert!(t_star_b < 100);

    let f_at_star = kf_a.forecast_error_cov(t_star_a).clone();
    let p_at_star = kf_a.predicted(t_star_a + 1).covariance().clone();
    for t in t_star_a..100 {
        assert_eq!(kf_a.forecast_error_cov(t), &f_at_star);
        assert_eq!(kf_a.predicted(t + 1).covariance(), &p_at_star);
    }

    assert_relative_eq!(kf_a.loglikelihood(), kf_b.loglikelihood(), epsilon = 1e-10);
}

#[test]
fn conserved_forecast_and_filtered_state_are_readable_right_after_the_step_that_wrote_them() {
    let y = [1.0, 2.0, 3.0, 4.0, 5.0];

    let ss_full = local_level(&y);
    let mut full = KalmanFilter::new(&ss_full, FilterOptions::new()).unwrap();

    let ss_conserved = local_level(&y);
    let mut opts = FilterOptions::<f64>::new();
    opts.conserve_memory =
        Conserve::NO_FORECAST | Conserve::NO_FILTERED | Conserve::NO_PREDICTED;
    let mut conserved = KalmanFilter::new(&ss_conserved, opts).unwrap();

    for t in 0..y.len() {
        full.step().unwrap();
        conserved.step().unwrap();
        // The family just written for period `t` must still be resident
        // right after `step()` returns: the rotating window keeps the
        // current and previous period, not zero periods.
        assert_relative_eq!(conserved.forecast(t)[0], full.forecast(t)[0], epsilon = 1e-10);
        assert_relative_eq!(
            conserved.filtered(t).state()[0],
            full.filtered(t).state()[0],
            epsilon = 1e-10
        );
        assert_relative_eq!(
            conserved.filtered(t).covariance()[(0, 0)],
            full.filtered(t).covariance()[(0, 0)],
            epsilon = 1e-10
        );
    }
}

#[test]
fn memory_conservation_reproduces_the_full_storage_total_loglikelihood() {
    let y: Vec<f64> = (1..=20).map(|i| i as f64).collect();

    let ss_full = local_level(&y);
    let mut full = KalmanFilter::new(&ss_full, FilterOptions::new()).unwrap();
    full.run().unwrap();

    let ss_conserved = local_level(&y);
    let mut opts = FilterOptions::<f64>::new();
    opts.conserve_memory =
        Conserve::NO_FORECAST | Conserve::NO_FILTERED | Conserve::NO_PREDICTED | Conserve::NO_LIKELIHOOD;
    let mut conserved = KalmanFilter::new(&ss_conserved, opts).unwrap();
    conserved.run().unwrap();

    assert_relative_eq!(full.loglikelihood(), conserved.loglikelihood(), epsilon = 1e-10);
}

#[test]
fn complex_field_local_level_matches_the_real_field_run() {
    // The spec requires the engine to be instantiable over complex64/
    // complex128 as well as float32/float64; exercise that by running the
    // same local-level model with a real-valued `Complex<f64>` field and
    // checking it reproduces the real-field filter bit-for-bit (imaginary
    // parts stay exactly zero throughout since every input is real).
    let y_re = [1.0, 2.0, 3.0, 4.0, 5.0];
    let y: Vec<Complex<f64>> = y_re.iter().map(|&v| Complex::new(v, 0.0)).collect();
    let obs = DMatrix::from_row_slice(1, y.len(), &y);
    let mut ss = StateSpace::new(
        obs,
        TimeSeries::Invariant(DMatrix::identity(1, 1)),
        TimeSeries::Invariant(DVector::zeros(1)),
        TimeSeries::Invariant(DMatrix::identity(1, 1)),
        TimeSeries::Invariant(DMatrix::identity(1, 1)),
        TimeSeries::Invariant(DVector::zeros(1)),
        TimeSeries::Invariant(DMatrix::identity(1, 1)),
        TimeSeries::Invariant(DMatrix::identity(1, 1)),
    )
    .unwrap();
    ss.initialize_known(
        DVector::from_element(1, Complex::new(0.0, 0.0)),
        DMatrix::from_element(1, 1, Complex::new(1e6, 0.0)),
    )
    .unwrap();
    let mut kf = KalmanFilter::new(&ss, FilterOptions::new()).unwrap();
    kf.run().unwrap();
    assert!(kf.is_done());

    let ss_real = local_level(&y_re);
    let mut kf_real = KalmanFilter::new(&ss_real, FilterOptions::new()).unwrap();
    kf_real.run().unwrap();

    let complex_state = kf.filtered(4).state()[0];
    assert_relative_eq!(complex_state.im, 0.0, epsilon = 1e-10);
    assert_relative_eq!(complex_state.re, kf_real.filtered(4).state()[0], epsilon = 1e-8);
    assert_relative_eq!(
        kf.loglikelihood().re,
        kf_real.loglikelihood(),
        epsilon = 1e-8
    );
}
