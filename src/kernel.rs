//! C4: the five-phase per-step recursion kernel — forecast, inversion,
//! update, likelihood, predict — plus the numerical-stability
//! symmetrization, dispatched over the effective (possibly reselected)
//! observation subspace from [`crate::missing`] and short-circuited by
//! [`crate::convergence`] once steady state is reached.

use nalgebra::{self as na, ComplexField, DMatrix, DVector};

use crate::config::{FilterOptions, StabilityMethod};
use crate::convergence::ConvergenceState;
use crate::error::Error;
use crate::linalg;
use crate::missing::{self, Missingness};
use crate::state_space::StateSpace;

/// Everything one call to [`step`] produces, already scattered back to the
/// full `p`/`m`-sized shapes regardless of how many observations were
/// effectively used this period.
pub(crate) struct StepOutput<R: ComplexField> {
    pub forecast: DVector<R>,
    pub forecast_error: DVector<R>,
    pub forecast_error_cov: DMatrix<R>,
    pub filtered_state: DVector<R>,
    pub filtered_state_cov: DMatrix<R>,
    pub predicted_state: DVector<R>,
    pub predicted_state_cov: DMatrix<R>,
    pub det: R,
    pub loglikelihood: R,
    pub p_eff: usize,
}

/// Runs one period of the recursion: forecast → inversion → update →
/// likelihood → predict → symmetrize.
///
/// `prior_state`/`prior_cov` are `a_t, P_t` — either the initial state (at
/// `t = 0`) or the previous call's `predicted_state`/`predicted_state_cov`.
pub(crate) fn step<R: ComplexField>(
    t: usize,
    prior_state: &DVector<R>,
    prior_cov: &DMatrix<R>,
    ss: &StateSpace<R>,
    convergence: &ConvergenceState<R>,
    opts: &FilterOptions<R>,
) -> Result<StepOutput<R>, Error> {
    let p = ss.p();
    let mask = ss.missing_mask(t);
    let nmissing = ss.nmissing(t);
    let y = ss.obs_at(t);
    let design = ss.design_at(t);
    let obs_intercept = ss.obs_intercept_at(t);
    let obs_cov = ss.obs_cov_at(t);
    let transition = ss.transition_at(t);
    let state_intercept = ss.state_intercept_at(t);
    let selected_state_cov = ss.selected_state_cov_at(t);

    let sel = missing::select(mask, nmissing, &y, design, obs_intercept, obs_cov);

    if sel.missingness == Missingness::All {
        return all_missing_step(prior_state, prior_cov, transition, state_intercept, &selected_state_cov, opts, p);
    }

    let effective_converged = convergence.effective_for_step(nmissing);
    let p_eff = sel.p_eff;

    // Phase F: forecast.
    let forecast_eff = &sel.z * prior_state + &sel.d;
    let v_eff = &sel.y - &forecast_eff;
    let tmp1 = prior_cov * sel.z.transpose(); // m x p_eff

    // Phase I: inversion/decomposition of F_t, or the cached fast path.
    let (f_eff, det, tmp2, tmp3) = if effective_converged {
        let f_cached = convergence.cached_forecast_error_cov().clone();
        let inv = convergence.cached_forecast_error_cov_inv();
        let tmp2 = inv * &v_eff;
        let tmp3 = inv * &sel.z;
        (f_cached, convergence.cached_det(), tmp2, tmp3)
    } else {
        let f_computed = &sel.z * &tmp1 + &sel.h;
        let method = linalg::select_inversion_method(opts.inversion_method, p_eff)?;
        let inv = linalg::invert(method, t, &f_computed, &v_eff, &sel.z)?;
        (f_computed, inv.det, inv.tmp2, inv.tmp3)
    };

    // Phase U: update.
    let filtered_state_eff = prior_state + &tmp1 * &tmp2;
    let filtered_state_cov = if effective_converged {
        convergence.cached_filtered_state_cov().clone()
    } else {
        let tmp0 = &tmp1 * &tmp3;
        prior_cov - &tmp0 * prior_cov
    };

    // Phase L: likelihood (always recomputed; v_t changes every period).
    let loglikelihood = loglikelihood_conventional(p_eff, &det, &v_eff, &tmp2);

    // Phase P: predict.
    let predicted_state = transition * &filtered_state_eff + state_intercept;
    let mut predicted_state_cov = if effective_converged {
        // The fixed point: P_t fed into this step is already P_{t+1}.
        prior_cov.clone()
    } else {
        let tmp0 = transition * &filtered_state_cov;
        &tmp0 * transition.transpose() + &selected_state_cov
    };

    // Phase N: numerical stability.
    if opts.stability_method.contains(StabilityMethod::FORCE_SYMMETRY) {
        predicted_state_cov = symmetrize(&predicted_state_cov);
    }

    let (forecast, forecast_error, forecast_error_cov) = match sel.missingness {
        Missingness::None => (forecast_eff, v_eff, f_eff),
        _ => (
            missing::scatter_vec(p, &sel.rows, &forecast_eff),
            missing::scatter_vec(p, &sel.rows, &v_eff),
            missing::scatter_mat(p, &sel.rows, &f_eff),
        ),
    };

    Ok(StepOutput {
        forecast,
        forecast_error,
        forecast_error_cov,
        filtered_state: filtered_state_eff,
        filtered_state_cov,
        predicted_state,
        predicted_state_cov,
        det,
        loglikelihood,
        p_eff,
    })
}

/// C5's degenerate all-missing kernel: forecast/forecast-error/
/// forecast-error-cov are zero, the posterior equals the prior, the
/// likelihood contributes nothing, but the state still evolves.
fn all_missing_step<R: ComplexField>(
    prior_state: &DVector<R>,
    prior_cov: &DMatrix<R>,
    transition: &DMatrix<R>,
    state_intercept: &DVector<R>,
    selected_state_cov: &DMatrix<R>,
    opts: &FilterOptions<R>,
    p: usize,
) -> Result<StepOutput<R>, Error> {
    let filtered_state = prior_state.clone();
    let filtered_state_cov = prior_cov.clone();

    let predicted_state = transition * &filtered_state + state_intercept;
    let mut predicted_state_cov = {
        let tmp0 = transition * &filtered_state_cov;
        &tmp0 * transition.transpose() + selected_state_cov
    };
    if opts.stability_method.contains(StabilityMethod::FORCE_SYMMETRY) {
        predicted_state_cov = symmetrize(&predicted_state_cov);
    }

    Ok(StepOutput {
        forecast: DVector::zeros(p),
        forecast_error: DVector::zeros(p),
        forecast_error_cov: DMatrix::zeros(p, p),
        filtered_state,
        filtered_state_cov,
        predicted_state,
        predicted_state_cov,
        det: R::zero(),
        loglikelihood: R::zero(),
        p_eff: 0,
    })
}

fn symmetrize<R: ComplexField>(m: &DMatrix<R>) -> DMatrix<R> {
    let half: R = R::from_real(na::convert(0.5));
    (m + m.transpose()) * half
}

/// `ℓ_t = -1/2 (p_eff log(2π) + log det_t + v_t' tmp2)`. `log det_t` is the
/// principal complex logarithm for complex fields, the ordinary real
/// logarithm otherwise; both come from the same `ComplexField::ln`.
fn loglikelihood_conventional<R: ComplexField>(
    p_eff: usize,
    det: &R,
    v: &DVector<R>,
    tmp2: &DVector<R>,
) -> R {
    if p_eff == 0 {
        return R::zero();
    }
    let p_log_2pi: R::RealField = na::convert((2.0 * core::f64::consts::PI).ln() * p_eff as f64);
    let log_det = det.clone().ln();
    let quad = v
        .iter()
        .zip(tmp2.iter())
        .fold(R::zero(), |acc, (a, b)| acc + a.clone() * b.clone());
    let neg_half: R::RealField = na::convert(-0.5);
    (R::from_real(p_log_2pi) + log_det + quad) * R::from_real(neg_half)
}
