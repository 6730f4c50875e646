//! C7: the iteration driver. Advances `t` one period at a time, applies
//! the memory-conservation rotation after each step, and exposes
//! `seek`/`step`/`run` over the state machine from §4.6:
//! `Fresh (not initialized) → Ready (initialized) → Stepping → Done`.

use nalgebra::{ComplexField, DMatrix, DVector};

use crate::config::FilterOptions;
use crate::convergence::ConvergenceState;
use crate::error::Error;
use crate::kernel;
use crate::state_and_covariance::StateAndCovariance;
use crate::state_space::StateSpace;
use crate::trace;
use crate::workspace::Workspace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Fresh,
    Ready,
    Stepping,
    Done,
}

/// A Kalman filter instance bound to one [`StateSpace`].
///
/// Cheap to create: it borrows the container and owns only its own
/// workspace and convergence state. Constructing a new filter over the
/// same container (after the caller mutates the system matrices between
/// parameter evaluations) is the intended way to re-run the recursion —
/// there is no in-place "re-bind" operation.
pub struct KalmanFilter<'a, R: ComplexField> {
    ss: &'a StateSpace<R>,
    opts: FilterOptions<R>,
    workspace: Workspace<R>,
    convergence: ConvergenceState<R>,
    phase: Phase,
    t: usize,
}

impl<'a, R: ComplexField> KalmanFilter<'a, R> {
    /// Validates `opts`, and positions the filter at `Fresh` or `Ready`
    /// depending on whether `ss` already carries an initial state.
    pub fn new(ss: &'a StateSpace<R>, opts: FilterOptions<R>) -> Result<Self, Error> {
        opts.validate()?;
        let workspace = Workspace::new(ss.p(), ss.m(), ss.nobs(), opts.conserve_memory, opts.loglikelihood_burn);
        let convergence = ConvergenceState::new(opts.tolerance.clone());
        let phase = if ss.is_initialized() {
            Phase::Ready
        } else {
            Phase::Fresh
        };
        Ok(Self {
            ss,
            opts,
            workspace,
            convergence,
            phase,
            t: 0,
        })
    }

    /// The period the next call to [`Self::step`] will advance past.
    pub fn current_period(&self) -> usize {
        self.t
    }

    pub fn is_done(&self) -> bool {
        self.phase == Phase::Done
    }

    pub fn is_converged(&self) -> bool {
        self.convergence.is_achieved()
    }

    /// The period at which steady state was first detected, if any.
    pub fn converged_at(&self) -> Option<usize> {
        self.convergence.achieved_at()
    }

    /// Repositions the driver at period `t`. `t = 0` performs a full reset:
    /// a fresh workspace and (if `reset_convergence`) a fresh convergence
    /// detector, then re-seeds the predicted state at period 0 from the
    /// container's `a_1, P_1`. Seeking to a later period requires that
    /// period's predicted state still be resident, which only full
    /// (non-conserved) predicted-state storage guarantees in general.
    pub fn seek(&mut self, t: usize, reset_convergence: bool) -> Result<(), Error> {
        if !self.ss.is_initialized() {
            return Err(Error::not_initialized());
        }
        if t > self.ss.nobs() {
            return Err(Error::end_of_sequence());
        }

        if t == 0 {
            self.workspace = Workspace::new(
                self.ss.p(),
                self.ss.m(),
                self.ss.nobs(),
                self.opts.conserve_memory,
                self.opts.loglikelihood_burn,
            );
            if reset_convergence {
                self.convergence = ConvergenceState::new(self.opts.tolerance.clone());
            }
            self.workspace
                .predicted_state
                .set(0, self.ss.initial_state().unwrap().clone());
            self.workspace
                .predicted_state_cov
                .set(0, self.ss.initial_state_cov().unwrap().clone());
            self.t = 0;
            self.phase = Phase::Stepping;
            return Ok(());
        }

        if !self.workspace.predicted_state.is_full() {
            return Err(Error::invalid_method());
        }
        self.t = t;
        self.phase = if t == self.ss.nobs() {
            Phase::Done
        } else {
            Phase::Stepping
        };
        Ok(())
    }

    /// Advances one period. Raises [`Error::is_end_of_sequence`] past the
    /// last observation.
    pub fn step(&mut self) -> Result<(), Error> {
        match self.phase {
            Phase::Fresh => return Err(Error::not_initialized()),
            Phase::Done => return Err(Error::end_of_sequence()),
            Phase::Ready => {
                self.workspace
                    .predicted_state
                    .set(0, self.ss.initial_state().unwrap().clone());
                self.workspace
                    .predicted_state_cov
                    .set(0, self.ss.initial_state_cov().unwrap().clone());
                self.phase = Phase::Stepping;
            }
            Phase::Stepping => {}
        }

        let t = self.t;
        if t >= self.ss.nobs() {
            self.phase = Phase::Done;
            return Err(Error::end_of_sequence());
        }

        let prior_state = self.workspace.predicted_state.get(t).clone();
        let prior_cov = self.workspace.predicted_state_cov.get(t).clone();

        let out = kernel::step(t, &prior_state, &prior_cov, self.ss, &self.convergence, &self.opts)?;

        trace!(
            "step t={} p_eff={} converged={}",
            t,
            out.p_eff,
            self.convergence.effective_for_step(self.ss.nmissing(t))
        );

        self.workspace.forecast.set(t, out.forecast);
        self.workspace.forecast_error.set(t, out.forecast_error);
        self.workspace
            .forecast_error_cov
            .set(t, out.forecast_error_cov.clone());
        self.workspace.filtered_state.set(t, out.filtered_state.clone());
        self.workspace
            .filtered_state_cov
            .set(t, out.filtered_state_cov.clone());
        self.workspace.predicted_state.set(t + 1, out.predicted_state.clone());
        self.workspace
            .predicted_state_cov
            .set(t + 1, out.predicted_state_cov.clone());
        self.workspace.loglikelihood.record(t, out.loglikelihood);

        self.convergence.observe(
            t,
            self.ss.time_invariant(),
            self.ss.nmissing(t),
            &prior_cov,
            &out.predicted_state_cov,
            &out.forecast_error_cov,
            &out.filtered_state_cov,
            out.det,
        );

        self.t = t + 1;
        if self.t == self.ss.nobs() {
            self.phase = Phase::Done;
        }
        Ok(())
    }

    /// Seeks to `0` and steps until the sequence is exhausted.
    pub fn run(&mut self) -> Result<(), Error> {
        self.seek(0, true)?;
        loop {
            match self.step() {
                Ok(()) => {}
                Err(e) if e.is_end_of_sequence() => break,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    pub fn forecast(&self, t: usize) -> &DVector<R> {
        self.workspace.forecast.get(t)
    }

    pub fn forecast_error(&self, t: usize) -> &DVector<R> {
        self.workspace.forecast_error.get(t)
    }

    pub fn forecast_error_cov(&self, t: usize) -> &DMatrix<R> {
        self.workspace.forecast_error_cov.get(t)
    }

    pub fn filtered(&self, t: usize) -> StateAndCovariance<R> {
        StateAndCovariance::new(
            self.workspace.filtered_state.get(t).clone(),
            self.workspace.filtered_state_cov.get(t).clone(),
        )
    }

    pub fn predicted(&self, t: usize) -> StateAndCovariance<R> {
        StateAndCovariance::new(
            self.workspace.predicted_state.get(t).clone(),
            self.workspace.predicted_state_cov.get(t).clone(),
        )
    }

    /// Per-period log-likelihood, when available (only under full
    /// log-likelihood storage).
    pub fn loglikelihood_at(&self, t: usize) -> Option<&R> {
        self.workspace.loglikelihood.at(t)
    }

    /// The accumulated log-likelihood from `loglikelihood_burn` onward.
    pub fn loglikelihood(&self) -> R {
        self.workspace.loglikelihood.total()
    }
}
