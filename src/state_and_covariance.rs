//! A state/covariance pair, returned by [`crate::filter::KalmanFilter`] for
//! both the filtered and predicted results.

use nalgebra as na;
use na::{ComplexField, DMatrix, DVector};

/// State and covariance pair for a given estimate.
#[derive(Debug, Clone)]
pub struct StateAndCovariance<R>
where
    R: ComplexField,
{
    state: DVector<R>,
    covariance: DMatrix<R>,
}

impl<R> StateAndCovariance<R>
where
    R: ComplexField,
{
    /// Creates a new `StateAndCovariance`.
    ///
    /// Assumes the covariance matrix is symmetric and positive
    /// semi-definite; this is not checked here (the recursion kernel's
    /// `SOLVE_CHOLESKY`/`INVERT_CHOLESKY` paths surface a
    /// `LinAlgError` if the forecast-error covariance they actually factor
    /// turns out not to be, which is the point at which that assumption
    /// matters).
    pub fn new(state: DVector<R>, covariance: DMatrix<R>) -> Self {
        Self { state, covariance }
    }

    /// Get a reference to the state vector.
    #[inline]
    pub fn state(&self) -> &DVector<R> {
        &self.state
    }
    /// Get a mut reference to the state vector.
    #[inline]
    pub fn state_mut(&mut self) -> &mut DVector<R> {
        &mut self.state
    }
    /// Get a reference to the covariance matrix.
    #[inline]
    pub fn covariance(&self) -> &DMatrix<R> {
        &self.covariance
    }
    /// Get a mutable reference to the covariance matrix.
    #[inline]
    pub fn covariance_mut(&mut self) -> &mut DMatrix<R> {
        &mut self.covariance
    }
    /// Get the state vector and covariance matrix.
    #[inline]
    pub fn inner(self) -> (DVector<R>, DMatrix<R>) {
        (self.state, self.covariance)
    }
}
