//! C2: the state-space container. Stores and validates the system matrices,
//! derives the missing-observation mask, and offers the three
//! initialization strategies.

use nalgebra::{ComplexField, DMatrix, DVector};

use crate::error::Error;
use crate::lyapunov::LyapunovSolver;

/// A system matrix whose trailing time dimension is either `1`
/// (time-invariant) or `T` (one slice per period).
///
/// This is the crate's substitute for a raw `(rows, cols, 1-or-T)` tensor:
/// an explicit two-variant owned container plus an index, per the
/// redesign notes on raw 3-D buffers with a stride trick.
#[derive(Debug, Clone)]
pub enum TimeSeries<T> {
    Invariant(T),
    Varying(Vec<T>),
}

impl<T> TimeSeries<T> {
    /// The slice in effect at period `t`.
    pub fn at(&self, t: usize) -> &T {
        match self {
            TimeSeries::Invariant(v) => v,
            TimeSeries::Varying(vs) => &vs[t],
        }
    }

    pub fn is_time_varying(&self) -> bool {
        matches!(self, TimeSeries::Varying(_))
    }

    /// `1` for an invariant series, the period count for a varying one.
    pub fn len_or_one(&self) -> usize {
        match self {
            TimeSeries::Invariant(_) => 1,
            TimeSeries::Varying(v) => v.len(),
        }
    }
}

/// NaN detection that works uniformly for real and complex scalar types:
/// IEEE-754 NaN is the only value unequal to itself, and `num_complex`
/// derives component-wise `PartialEq`, so a NaN in either part makes the
/// whole value compare unequal to itself too.
fn is_missing<R: ComplexField>(x: &R) -> bool {
    x != x
}

fn check_shape(
    name: &'static str,
    got: (usize, usize),
    expected: (usize, usize),
) -> Result<(), Error> {
    if got != expected {
        return Err(Error::invalid_shape(name, expected, got));
    }
    Ok(())
}

fn check_trailing_dim(name: &'static str, len_or_one: usize, nobs: usize) -> Result<(), Error> {
    if len_or_one != 1 && len_or_one != nobs {
        return Err(Error::invalid_shape(name, (nobs, 0), (len_or_one, 0)));
    }
    Ok(())
}

fn check_series_mat<R: ComplexField>(
    name: &'static str,
    series: &TimeSeries<DMatrix<R>>,
    nobs: usize,
    expected: (usize, usize),
) -> Result<(), Error> {
    check_trailing_dim(name, series.len_or_one(), nobs)?;
    match series {
        TimeSeries::Invariant(m) => check_shape(name, m.shape(), expected),
        TimeSeries::Varying(ms) => {
            for m in ms {
                check_shape(name, m.shape(), expected)?;
            }
            Ok(())
        }
    }
}

fn check_series_vec<R: ComplexField>(
    name: &'static str,
    series: &TimeSeries<DVector<R>>,
    nobs: usize,
    expected_len: usize,
) -> Result<(), Error> {
    check_trailing_dim(name, series.len_or_one(), nobs)?;
    match series {
        TimeSeries::Invariant(v) => check_shape(name, (v.len(), 1), (expected_len, 1)),
        TimeSeries::Varying(vs) => {
            for v in vs {
                check_shape(name, (v.len(), 1), (expected_len, 1))?;
            }
            Ok(())
        }
    }
}

/// The state-space container (C2): system matrices, the derived missing
/// mask, and the initial state/covariance once set.
pub struct StateSpace<R: ComplexField> {
    p: usize,
    m: usize,
    r: usize,
    nobs: usize,
    obs: DMatrix<R>,
    design: TimeSeries<DMatrix<R>>,
    obs_intercept: TimeSeries<DVector<R>>,
    obs_cov: TimeSeries<DMatrix<R>>,
    transition: TimeSeries<DMatrix<R>>,
    state_intercept: TimeSeries<DVector<R>>,
    selection: TimeSeries<DMatrix<R>>,
    state_cov: TimeSeries<DMatrix<R>>,
    selected_state_cov_invariant: Option<DMatrix<R>>,
    missing: Vec<Vec<bool>>,
    nmissing: Vec<usize>,
    time_invariant: bool,
    initial_state: Option<DVector<R>>,
    initial_state_cov: Option<DMatrix<R>>,
}

impl<R: ComplexField> StateSpace<R> {
    /// Validates shapes, derives `p, m, r, T` and the missing mask.
    ///
    /// `p = obs.rows`, `m = selection.rows`, `r = selection.cols`,
    /// `T = obs.cols`. Every other matrix's trailing dimension must be `1`
    /// or `T`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        obs: DMatrix<R>,
        design: TimeSeries<DMatrix<R>>,
        obs_intercept: TimeSeries<DVector<R>>,
        obs_cov: TimeSeries<DMatrix<R>>,
        transition: TimeSeries<DMatrix<R>>,
        state_intercept: TimeSeries<DVector<R>>,
        selection: TimeSeries<DMatrix<R>>,
        state_cov: TimeSeries<DMatrix<R>>,
    ) -> Result<Self, Error> {
        let p = obs.nrows();
        let nobs = obs.ncols();
        let m = selection.at(0).nrows();
        let r = selection.at(0).ncols();

        check_series_mat("design", &design, nobs, (p, m))?;
        check_series_vec("obs_intercept", &obs_intercept, nobs, p)?;
        check_series_mat("obs_cov", &obs_cov, nobs, (p, p))?;
        check_series_mat("transition", &transition, nobs, (m, m))?;
        check_series_vec("state_intercept", &state_intercept, nobs, m)?;
        check_series_mat("selection", &selection, nobs, (m, r))?;
        check_series_mat("state_cov", &state_cov, nobs, (r, r))?;

        let time_invariant = !design.is_time_varying()
            && !obs_intercept.is_time_varying()
            && !obs_cov.is_time_varying()
            && !transition.is_time_varying()
            && !state_intercept.is_time_varying()
            && !selection.is_time_varying()
            && !state_cov.is_time_varying();

        let selected_state_cov_invariant = if !selection.is_time_varying() && !state_cov.is_time_varying() {
            let r0 = selection.at(0);
            let q0 = state_cov.at(0);
            Some(r0 * q0 * r0.transpose())
        } else {
            None
        };

        let mut missing = Vec::with_capacity(nobs);
        let mut nmissing = Vec::with_capacity(nobs);
        for t in 0..nobs {
            let col = obs.column(t);
            let mask: Vec<bool> = col.iter().map(is_missing).collect();
            nmissing.push(mask.iter().filter(|&&b| b).count());
            missing.push(mask);
        }

        Ok(Self {
            p,
            m,
            r,
            nobs,
            obs,
            design,
            obs_intercept,
            obs_cov,
            transition,
            state_intercept,
            selection,
            state_cov,
            selected_state_cov_invariant,
            missing,
            nmissing,
            time_invariant,
            initial_state: None,
            initial_state_cov: None,
        })
    }

    pub fn p(&self) -> usize {
        self.p
    }
    pub fn m(&self) -> usize {
        self.m
    }
    pub fn r(&self) -> usize {
        self.r
    }
    pub fn nobs(&self) -> usize {
        self.nobs
    }
    pub fn time_invariant(&self) -> bool {
        self.time_invariant
    }
    pub fn is_initialized(&self) -> bool {
        self.initial_state.is_some() && self.initial_state_cov.is_some()
    }
    pub fn nmissing(&self, t: usize) -> usize {
        self.nmissing[t]
    }
    pub fn missing_mask(&self, t: usize) -> &[bool] {
        &self.missing[t]
    }
    pub fn obs_at(&self, t: usize) -> DVector<R> {
        self.obs.column(t).into_owned()
    }
    pub fn design_at(&self, t: usize) -> &DMatrix<R> {
        self.design.at(t)
    }
    pub fn obs_intercept_at(&self, t: usize) -> &DVector<R> {
        self.obs_intercept.at(t)
    }
    pub fn obs_cov_at(&self, t: usize) -> &DMatrix<R> {
        self.obs_cov.at(t)
    }
    pub fn transition_at(&self, t: usize) -> &DMatrix<R> {
        self.transition.at(t)
    }
    pub fn state_intercept_at(&self, t: usize) -> &DVector<R> {
        self.state_intercept.at(t)
    }

    /// `Q*_t = R_t Q_t R_t'`. Computed once at construction when neither
    /// `R` nor `Q` is time-varying, otherwise recomputed from the current
    /// slices on every call.
    pub fn selected_state_cov_at(&self, t: usize) -> DMatrix<R> {
        if let Some(q_star) = &self.selected_state_cov_invariant {
            return q_star.clone();
        }
        let r_t = self.selection.at(t);
        let q_t = self.state_cov.at(t);
        r_t * q_t * r_t.transpose()
    }

    pub fn initial_state(&self) -> Option<&DVector<R>> {
        self.initial_state.as_ref()
    }
    pub fn initial_state_cov(&self) -> Option<&DMatrix<R>> {
        self.initial_state_cov.as_ref()
    }

    /// Stores a caller-supplied `a_1, P_1` after shape-checking.
    pub fn initialize_known(&mut self, a1: DVector<R>, p1: DMatrix<R>) -> Result<(), Error> {
        check_shape("initial_state", (a1.len(), 1), (self.m, 1))?;
        check_shape("initial_state_cov", p1.shape(), (self.m, self.m))?;
        self.initial_state = Some(a1);
        self.initial_state_cov = Some(p1);
        Ok(())
    }

    /// `a_1 = 0`, `P_1 = variance * I_m`. Exploratory-use only: combined
    /// with the conventional filter this carries a known loss of precision
    /// relative to an exact-diffuse treatment.
    pub fn initialize_approximate_diffuse(&mut self, variance: R) {
        self.initial_state = Some(DVector::zeros(self.m));
        self.initial_state_cov = Some(DMatrix::identity(self.m, self.m) * variance);
    }

    /// Solves the discrete Lyapunov equation `P_1 - T_0 P_1 T_0' = Q*_0` via
    /// `solver`, using index-0 slices of `T` and `Q*` regardless of whether
    /// the model is time-varying (the spec's adopted convention). Sets
    /// `a_1 = 0`.
    pub fn initialize_stationary(
        &mut self,
        solver: &impl LyapunovSolver<R>,
    ) -> Result<(), Error> {
        let q_star_0 = self.selected_state_cov_at(0);
        let t_0 = self.transition.at(0);
        let p1 = solver.solve(t_0, &q_star_0)?;
        self.initial_state = Some(DVector::zeros(self.m));
        self.initial_state_cov = Some(p1);
        Ok(())
    }
}
