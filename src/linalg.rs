//! C1: a thin, field-generic surface over the dense linear algebra the
//! recursion kernel needs, built on `nalgebra`'s own decomposition types.
//!
//! `nalgebra::linalg::Cholesky` and `nalgebra::linalg::LU` play the role of
//! `potrf`/`potrs`/`potri` and `getrf`/`getrs`/`getri` respectively; this
//! module's job is to pick one strategy per step and present the kernel with
//! a single narrow result type, not to re-expose the decomposition APIs.

use nalgebra::{linalg::Cholesky, linalg::LU, ComplexField, DMatrix, DVector};
use num_traits::Zero;

use crate::config::{InversionMethod, INVERSION_PRECEDENCE};
use crate::error::{Error, LinAlgErrorKind};
use crate::trace;

/// Builds the `LinAlgError` for a failed factorization/solve, tracing it
/// immediately before it is handed back to the caller so a diagnostic log
/// is never missing for a step that aborted.
fn lin_alg_error(period: usize, kind: LinAlgErrorKind) -> Error {
    trace!("linalg failure at period {period}: {kind}");
    Error::lin_alg(period, kind)
}

/// The result of factoring/inverting `F_t` and applying it to `v_t` and
/// `Z_t` for one step.
pub(crate) struct Inversion<R: ComplexField> {
    pub det: R,
    /// `F_t^{-1} v_t`
    pub tmp2: DVector<R>,
    /// `F_t^{-1} Z_t`
    pub tmp3: DMatrix<R>,
}

/// Applies the precedence order from §6: `INVERT_UNIVARIATE` when
/// `p_eff == 1` and requested, else the first of
/// `SOLVE_CHOLESKY, SOLVE_LU, INVERT_CHOLESKY, INVERT_LU` that is requested.
pub(crate) fn select_inversion_method(
    requested: InversionMethod,
    p_eff: usize,
) -> Result<InversionMethod, Error> {
    if p_eff == 1 && requested.contains(InversionMethod::INVERT_UNIVARIATE) {
        trace!("inversion path: INVERT_UNIVARIATE (p_eff={p_eff})");
        return Ok(InversionMethod::INVERT_UNIVARIATE);
    }
    for method in INVERSION_PRECEDENCE {
        if requested.contains(method) {
            trace!("inversion path: {method:?} (p_eff={p_eff})");
            return Ok(method);
        }
    }
    Err(Error::invalid_method())
}

/// Factors/inverts `f` (the `p_eff x p_eff` forecast-error covariance) using
/// `method`, and immediately applies the result to `v` and `z`.
pub(crate) fn invert<R: ComplexField>(
    method: InversionMethod,
    period: usize,
    f: &DMatrix<R>,
    v: &DVector<R>,
    z: &DMatrix<R>,
) -> Result<Inversion<R>, Error> {
    if method == InversionMethod::INVERT_UNIVARIATE {
        univariate(period, f, v, z)
    } else if method == InversionMethod::SOLVE_CHOLESKY {
        solve_cholesky(period, f, v, z)
    } else if method == InversionMethod::INVERT_CHOLESKY {
        invert_cholesky(period, f, v, z)
    } else if method == InversionMethod::SOLVE_LU {
        solve_lu(period, f, v, z)
    } else if method == InversionMethod::INVERT_LU {
        invert_lu(period, f, v, z)
    } else {
        Err(Error::invalid_method())
    }
}

fn univariate<R: ComplexField>(
    period: usize,
    f: &DMatrix<R>,
    v: &DVector<R>,
    z: &DMatrix<R>,
) -> Result<Inversion<R>, Error> {
    let det = f[(0, 0)].clone();
    if det.is_zero() {
        return Err(lin_alg_error(period, LinAlgErrorKind::Singular));
    }
    let recip = R::one() / det.clone();
    Ok(Inversion {
        det,
        tmp2: v.scale(recip.clone()),
        tmp3: z.scale(recip),
    })
}

fn solve_cholesky<R: ComplexField>(
    period: usize,
    f: &DMatrix<R>,
    v: &DVector<R>,
    z: &DMatrix<R>,
) -> Result<Inversion<R>, Error> {
    let chol = Cholesky::new(f.clone())
        .ok_or_else(|| lin_alg_error(period, LinAlgErrorKind::NotPositiveDefinite))?;
    Ok(Inversion {
        det: chol.determinant(),
        tmp2: chol.solve(v),
        tmp3: chol.solve(z),
    })
}

fn invert_cholesky<R: ComplexField>(
    period: usize,
    f: &DMatrix<R>,
    v: &DVector<R>,
    z: &DMatrix<R>,
) -> Result<Inversion<R>, Error> {
    let chol = Cholesky::new(f.clone())
        .ok_or_else(|| lin_alg_error(period, LinAlgErrorKind::NotPositiveDefinite))?;
    let det = chol.determinant();
    let inv = chol.inverse();
    Ok(Inversion {
        det,
        tmp2: &inv * v,
        tmp3: &inv * z,
    })
}

fn solve_lu<R: ComplexField>(
    period: usize,
    f: &DMatrix<R>,
    v: &DVector<R>,
    z: &DMatrix<R>,
) -> Result<Inversion<R>, Error> {
    let lu = LU::new(f.clone());
    let det = lu.determinant();
    let tmp2 = lu
        .solve(v)
        .ok_or_else(|| lin_alg_error(period, LinAlgErrorKind::Singular))?;
    let tmp3 = lu
        .solve(z)
        .ok_or_else(|| lin_alg_error(period, LinAlgErrorKind::Singular))?;
    Ok(Inversion { det, tmp2, tmp3 })
}

fn invert_lu<R: ComplexField>(
    period: usize,
    f: &DMatrix<R>,
    v: &DVector<R>,
    z: &DMatrix<R>,
) -> Result<Inversion<R>, Error> {
    let lu = LU::new(f.clone());
    let det = lu.determinant();
    let inv = lu
        .try_inverse()
        .ok_or_else(|| lin_alg_error(period, LinAlgErrorKind::Singular))?;
    Ok(Inversion {
        det,
        tmp2: &inv * v,
        tmp3: &inv * z,
    })
}

/// Computes an explicit inverse of `f`, used only by the convergence
/// controller ([`crate::convergence`]) to cache `F_t^{-1}` once at the
/// period steady-state is first detected. Tries Cholesky first, since a
/// valid forecast-error covariance is positive definite; falls back to LU
/// for the degenerate inputs a caller might still hand the solver.
pub(crate) fn explicit_inverse<R: ComplexField>(f: &DMatrix<R>) -> Option<DMatrix<R>> {
    if let Some(chol) = Cholesky::new(f.clone()) {
        return Some(chol.inverse());
    }
    LU::new(f.clone()).try_inverse()
}
