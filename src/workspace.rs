//! C3: the filter workspace — every per-period output buffer, plus the
//! memory-conservation rotation policy from [`crate::config::Conserve`].
//!
//! Scratch matrices used inside one step (`tmp0..tmp3` and friends in the
//! design document) are not reused across calls here: `nalgebra` arithmetic
//! in this codebase, like every example this crate is built from, allocates
//! fresh owned matrices per operation rather than writing into raw scratch
//! buffers. This module owns only the *output* sequence buffers C3 is
//! responsible for.

use nalgebra::{ComplexField, DMatrix, DVector};

use crate::config::Conserve;

/// One output family's storage: every period under full storage, or a
/// small rotating window under the corresponding `NO_*` conservation bit.
#[derive(Debug, Clone)]
pub(crate) enum Series<T> {
    Full(Vec<T>),
    /// `base` is the logical period held in `buf[0]`.
    Rotating { buf: Vec<T>, base: usize },
}

impl<T: Clone> Series<T> {
    fn full(n: usize, fill: T) -> Self {
        Series::Full(vec![fill; n])
    }

    fn rotating(window: usize, fill: T) -> Self {
        Series::Rotating {
            buf: vec![fill; window],
            base: 0,
        }
    }

    pub fn get(&self, t: usize) -> &T {
        match self {
            Series::Full(v) => &v[t],
            Series::Rotating { buf, base } => &buf[t - base],
        }
    }

    /// Writes `value` for period `t`. Under `Rotating` storage, slides the
    /// window forward first if `t` would otherwise fall past its last
    /// column — column 1 into column 0 (and, for a 3-wide window, column 2
    /// into column 1) — per §4.6's `migrate_storage`. The slide is sized to
    /// land `t` in the last column, so the value just written, and the one
    /// before it, both stay reachable via [`Self::get`] until the window
    /// has to slide again; a no-op under full storage.
    pub fn set(&mut self, t: usize, value: T) {
        match self {
            Series::Full(v) => v[t] = value,
            Series::Rotating { buf, base } => {
                let w = buf.len();
                if t >= *base + w {
                    let shift = t - *base - w + 1;
                    for i in 0..w {
                        if i + shift < w {
                            buf[i] = buf[i + shift].clone();
                        }
                    }
                    *base += shift;
                }
                buf[t - *base] = value;
            }
        }
    }

    pub fn is_full(&self) -> bool {
        matches!(self, Series::Full(_))
    }
}

/// Log-likelihood storage: one scalar per period under full storage, or a
/// single running accumulator (started at `loglikelihood_burn`) under
/// `NO_LIKELIHOOD`.
#[derive(Debug, Clone)]
pub(crate) enum LogLikelihoodStorage<R> {
    PerStep { values: Vec<R>, burn: usize },
    Accumulated { total: R, burn: usize },
}

impl<R: ComplexField> LogLikelihoodStorage<R> {
    pub fn new(conserve: bool, n: usize, burn: usize) -> Self {
        if conserve {
            LogLikelihoodStorage::Accumulated {
                total: R::zero(),
                burn,
            }
        } else {
            LogLikelihoodStorage::PerStep {
                values: vec![R::zero(); n],
                burn,
            }
        }
    }

    pub fn record(&mut self, t: usize, value: R) {
        match self {
            LogLikelihoodStorage::PerStep { values, .. } => values[t] = value,
            LogLikelihoodStorage::Accumulated { total, burn } => {
                if t >= *burn {
                    *total = total.clone() + value;
                }
            }
        }
    }

    /// Per-step value, when available (only under full storage).
    pub fn at(&self, t: usize) -> Option<&R> {
        match self {
            LogLikelihoodStorage::PerStep { values, .. } => Some(&values[t]),
            LogLikelihoodStorage::Accumulated { .. } => None,
        }
    }

    /// The accumulated log-likelihood from `burn` onward, identically
    /// defined whether storage is full or conserved.
    pub fn total(&self) -> R {
        match self {
            LogLikelihoodStorage::PerStep { values, burn } => values
                .iter()
                .skip(*burn)
                .fold(R::zero(), |acc, x| acc + x.clone()),
            LogLikelihoodStorage::Accumulated { total, .. } => total.clone(),
        }
    }
}

fn vec_series<R: ComplexField>(window: Option<usize>, n: usize, dim: usize) -> Series<DVector<R>> {
    match window {
        Some(w) => Series::rotating(w, DVector::zeros(dim)),
        None => Series::full(n, DVector::zeros(dim)),
    }
}

fn mat_series<R: ComplexField>(window: Option<usize>, n: usize, dim: usize) -> Series<DMatrix<R>> {
    match window {
        Some(w) => Series::rotating(w, DMatrix::zeros(dim, dim)),
        None => Series::full(n, DMatrix::zeros(dim, dim)),
    }
}

/// Owns every output buffer for one filter run: forecasts, forecast
/// errors and their covariance, filtered and predicted means/covariances,
/// and the log-likelihood.
pub(crate) struct Workspace<R: ComplexField> {
    pub forecast: Series<DVector<R>>,
    pub forecast_error: Series<DVector<R>>,
    pub forecast_error_cov: Series<DMatrix<R>>,
    pub filtered_state: Series<DVector<R>>,
    pub filtered_state_cov: Series<DMatrix<R>>,
    pub predicted_state: Series<DVector<R>>,
    pub predicted_state_cov: Series<DMatrix<R>>,
    pub loglikelihood: LogLikelihoodStorage<R>,
}

impl<R: ComplexField> Workspace<R> {
    pub fn new(p: usize, m: usize, nobs: usize, conserve: Conserve, burn: usize) -> Self {
        let forecast_window = conserve.contains(Conserve::NO_FORECAST).then_some(2);
        let filtered_window = conserve.contains(Conserve::NO_FILTERED).then_some(2);
        let predicted_window = conserve.contains(Conserve::NO_PREDICTED).then_some(3);

        Self {
            forecast: vec_series(forecast_window, nobs, p),
            forecast_error: vec_series(forecast_window, nobs, p),
            forecast_error_cov: mat_series(forecast_window, nobs, p),
            filtered_state: vec_series(filtered_window, nobs, m),
            filtered_state_cov: mat_series(filtered_window, nobs, m),
            predicted_state: vec_series(predicted_window, nobs + 1, m),
            predicted_state_cov: mat_series(predicted_window, nobs + 1, m),
            loglikelihood: LogLikelihoodStorage::new(
                conserve.contains(Conserve::NO_LIKELIHOOD),
                nobs,
                burn,
            ),
        }
    }
}
