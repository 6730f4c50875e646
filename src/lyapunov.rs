//! C11: the pluggable discrete Lyapunov solver hook used by
//! [`crate::state_space::StateSpace::initialize_stationary`].
//!
//! The engine itself never implements a Lyapunov solve; [`LyapunovSolver`]
//! is the seam a caller plugs a solver into. [`DoublingLyapunovSolver`] is
//! one concrete, generically-implemented solver shipped for convenience and
//! for this crate's own tests — it is a fixed-point doubling (Smith-type)
//! iteration suitable for the small, well-conditioned state dimensions
//! typical of a single series' state-space model, not a general-purpose
//! ill-conditioned-safe solver. It lives outside the engine's core types so
//! swapping it never touches C2-C7.

use nalgebra::{self as na, ComplexField, DMatrix, RealField};
use num_traits::Zero;

use crate::error::{Error, ErrorKind};

/// Solves the discrete Lyapunov equation `P - A P A' = Q` for `P`, given `A`
/// and `Q`.
pub trait LyapunovSolver<R: ComplexField> {
    fn solve(&self, a: &DMatrix<R>, q: &DMatrix<R>) -> Result<DMatrix<R>, Error>;
}

/// Smith's accelerated doubling iteration:
///
/// `A_0 = A`, `P_0 = Q`; `A_{k+1} = A_k^2`, `P_{k+1} = P_k + A_k P_k A_k'`.
///
/// Converges quadratically to `P = sum_i A^i Q (A^i)'` provided the
/// spectral radius of `A` is below 1, which holds for any stationary
/// (covariance-finite) linear state-space model.
#[derive(Debug, Clone)]
pub struct DoublingLyapunovSolver {
    pub max_iterations: usize,
    pub tolerance: f64,
}

impl Default for DoublingLyapunovSolver {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            tolerance: 1e-13,
        }
    }
}

impl<R: ComplexField> LyapunovSolver<R> for DoublingLyapunovSolver {
    fn solve(&self, a: &DMatrix<R>, q: &DMatrix<R>) -> Result<DMatrix<R>, Error> {
        if a.nrows() != a.ncols() || q.nrows() != q.ncols() || a.nrows() != q.nrows() {
            return Err(ErrorKind::InvalidShape {
                name: "lyapunov_input",
                expected: (a.nrows(), a.nrows()),
                got: (q.nrows(), q.ncols()),
            }
            .into());
        }

        let tol: R::RealField = na::convert(self.tolerance);
        let mut a_k = a.clone();
        let mut p_k = q.clone();

        for _ in 0..self.max_iterations {
            let a_k2 = &a_k * &a_k;
            let p_next = &p_k + &a_k * &p_k * a_k.transpose();

            let diff = &p_next - &p_k;
            let norm_sq = diff
                .iter()
                .fold(R::RealField::zero(), |acc, x| acc + x.clone().modulus_squared());
            if norm_sq.sqrt() < tol {
                return Ok(p_next);
            }

            a_k = a_k2;
            p_k = p_next;
        }
        Ok(p_k)
    }
}
