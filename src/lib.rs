//! A Kalman filter engine for linear Gaussian state-space models.
//!
//! Given a (possibly time-varying) linear dynamical system and an
//! observation sequence, this crate computes the recursive one-step-ahead
//! forecasts, the filtered (posterior) and predicted (prior) state
//! estimates, and the incremental log-likelihood of the observations. It
//! is built to be called inside a likelihood-maximization loop: the
//! [`state_space::StateSpace`] container is constructed once and its
//! matrices may be mutated by the caller between filter runs, so repeated
//! parameter evaluations never re-validate or re-allocate more than they
//! have to.
//!
//! Characteristics:
//! - Uses the [nalgebra](https://nalgebra.org) crate for dense linear
//!   algebra, dispatching to its `Cholesky`/`LU` decompositions as the
//!   `potrf`/`getrf` equivalents ([`linalg`]).
//! - Generic over the scalar field: `f32`, `f64`, and `num_complex::Complex`
//!   variants of both all satisfy `nalgebra::ComplexField`.
//! - Supports `no_std` to facilitate running on embedded microcontrollers.
//! - Handles missing observations (full, partial, or none per period)
//!   without the caller having to reshape anything ([`missing`]).
//! - Detects steady state in time-invariant, no-missing runs and switches
//!   to a fast path that skips redundant covariance work ([`convergence`]).
//!
//! Out of scope: higher-level model construction (ARIMA / structural /
//! state-space wrapper types), parameter optimization, smoothing and
//! simulation smoothing, and any result-presentation or binding layer —
//! all treated as external collaborators. Multi-threaded filtering of a
//! single series is not attempted: the recursion is strictly sequential in
//! time, with any available parallelism left inside the dense linear
//! algebra calls themselves.

#![cfg_attr(not(feature = "std"), no_std)]
#![allow(non_snake_case)]

#[cfg(feature = "std")]
pub(crate) use log::trace;

#[cfg(not(feature = "std"))]
macro_rules! trace {
    ($($arg:tt)*) => {};
}
#[cfg(not(feature = "std"))]
pub(crate) use trace;

mod config;
mod convergence;
mod error;
mod kernel;
mod linalg;
mod lyapunov;
mod missing;
mod state_and_covariance;
mod state_space;
mod workspace;

pub mod filter;

pub use config::{Conserve, FilterMethod, FilterOptions, InversionMethod, StabilityMethod};
pub use error::{Error, ErrorKind, LinAlgErrorKind};
pub use filter::KalmanFilter;
pub use lyapunov::{DoublingLyapunovSolver, LyapunovSolver};
pub use num_complex::Complex;
pub use state_and_covariance::StateAndCovariance;
pub use state_space::{StateSpace, TimeSeries};
