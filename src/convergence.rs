//! C6: steady-state detection, snapshotting, and the post-convergence fast
//! path.
//!
//! Once the covariance recursion reaches its fixed point in a
//! time-invariant, no-missing run, every subsequent period's
//! `F_t, P_{t|t}` are bit-identical to the snapshot taken at detection, and
//! `P_{t+1}` is identical to the `P_t` that fed it — so the kernel can skip
//! the covariance branch of every phase and only keep advancing the mean
//! recursions, which still depend on the incoming observations.

use nalgebra::{ComplexField, DMatrix};

use crate::linalg;
use crate::trace;

#[derive(Debug, Clone)]
struct Snapshot<R: ComplexField> {
    forecast_error_cov: DMatrix<R>,
    forecast_error_cov_inv: DMatrix<R>,
    det: R,
    filtered_state_cov: DMatrix<R>,
}

/// Steady-state detector and snapshot cache, owned by one filter instance.
///
/// `achieved` persists for the remainder of the run once set. The kernel
/// dispatches on [`Self::effective_for_step`], not on `achieved` directly:
/// a period with any missing observation temporarily behaves as
/// unconverged (the observation equation is degenerate that period) even
/// though the snapshot remains valid and `achieved` stays `true`.
#[derive(Debug, Clone)]
pub(crate) struct ConvergenceState<R: ComplexField> {
    achieved: bool,
    achieved_at: Option<usize>,
    tolerance: R::RealField,
    snapshot: Option<Snapshot<R>>,
    /// Set while a missing observation has temporarily flipped
    /// `effective_for_step` to `false` after `achieved` went `true`, so the
    /// next clean period can log that the fast path resumed.
    pending_restore: bool,
}

impl<R: ComplexField> ConvergenceState<R> {
    pub fn new(tolerance: R::RealField) -> Self {
        Self {
            achieved: false,
            achieved_at: None,
            tolerance,
            snapshot: None,
            pending_restore: false,
        }
    }

    pub fn is_achieved(&self) -> bool {
        self.achieved
    }

    pub fn achieved_at(&self) -> Option<usize> {
        self.achieved_at
    }

    /// The flag the kernel actually dispatches on this step.
    pub fn effective_for_step(&self, nmissing: usize) -> bool {
        self.achieved && nmissing == 0
    }

    pub(crate) fn cached_forecast_error_cov(&self) -> &DMatrix<R> {
        &self
            .snapshot
            .as_ref()
            .expect("effective_for_step(0) implies a snapshot exists")
            .forecast_error_cov
    }

    pub(crate) fn cached_forecast_error_cov_inv(&self) -> &DMatrix<R> {
        &self
            .snapshot
            .as_ref()
            .expect("effective_for_step(0) implies a snapshot exists")
            .forecast_error_cov_inv
    }

    pub(crate) fn cached_det(&self) -> R {
        self.snapshot
            .as_ref()
            .expect("effective_for_step(0) implies a snapshot exists")
            .det
            .clone()
    }

    pub(crate) fn cached_filtered_state_cov(&self) -> &DMatrix<R> {
        &self
            .snapshot
            .as_ref()
            .expect("effective_for_step(0) implies a snapshot exists")
            .filtered_state_cov
    }

    /// Tests the steady-state invariant after Phase P and snapshots on
    /// first detection. A no-op once already achieved, for a time-varying
    /// model, or for a period with any missing observation.
    ///
    /// The magnitude test flattens `D = P_t - P_{t+1}` and compares
    /// `|sum D_i * D_i|` against `tolerance`. That inner product is
    /// deliberately unconjugated (`D_i * D_i`, not `D_i * conj(D_i)`) for
    /// every field including complex, matching the source contract this
    /// engine is built to: real-field paths would use a plain `dot`
    /// directly and arrive at the same value, but for complex-valued
    /// parameterizations this can behave unusually near the origin rather
    /// than measuring `‖D‖²` as the name suggests. A conjugated variant
    /// would be the numerically sound choice; this one matches what the
    /// engine is specified to do.
    #[allow(clippy::too_many_arguments)]
    pub fn observe(
        &mut self,
        t: usize,
        time_invariant: bool,
        nmissing: usize,
        prior_cov: &DMatrix<R>,
        next_cov: &DMatrix<R>,
        forecast_error_cov: &DMatrix<R>,
        filtered_state_cov: &DMatrix<R>,
        det: R,
    ) {
        if self.achieved {
            // The snapshot is still valid; only the "restored on the next
            // clean step" transition is worth a log line here.
            if nmissing == 0 {
                if self.pending_restore {
                    trace!("convergence fast path restored at period {t} after a missing observation");
                    self.pending_restore = false;
                }
            } else {
                self.pending_restore = true;
            }
            return;
        }

        if !time_invariant || nmissing != 0 {
            return;
        }

        let diff = prior_cov - next_cov;
        let inner = diff
            .iter()
            .fold(R::zero(), |acc, x| acc + x.clone() * x.clone());
        if inner.modulus() >= self.tolerance {
            return;
        }

        let Some(inv) = linalg::explicit_inverse(forecast_error_cov) else {
            return;
        };

        self.achieved = true;
        self.achieved_at = Some(t);
        trace!("convergence achieved at period {t}");
        self.snapshot = Some(Snapshot {
            forecast_error_cov: forecast_error_cov.clone(),
            forecast_error_cov_inv: inv,
            det,
            filtered_state_cov: filtered_state_cov.clone(),
        });
    }
}
