//! C5: per-step re-selection of the effective observation subspace.
//!
//! At each period the dispatcher inspects `nmissing[t]` and produces the
//! `y_t, Z_t, d_t, H_t` the kernel actually operates on that step: the full
//! system unchanged (none missing), a zero-sized subspace (all missing,
//! handled by the kernel's degenerate branch), or the rows surviving the
//! mask compacted into dense `p_eff`-sized arrays (partial).

use nalgebra::{ComplexField, DMatrix, DVector};

/// Which of the three missing-observation cases a period falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Missingness {
    None,
    Partial,
    All,
}

/// The effective, possibly-reselected observation-equation inputs for one
/// period.
pub(crate) struct EffectiveObservation<R: ComplexField> {
    pub p_eff: usize,
    pub missingness: Missingness,
    pub y: DVector<R>,
    pub z: DMatrix<R>,
    pub d: DVector<R>,
    pub h: DMatrix<R>,
    /// Indices of the unmasked rows, in order; used to scatter `p_eff`
    /// sized results back into the full `p`-sized output buffers.
    pub rows: Vec<usize>,
}

pub(crate) fn select<R: ComplexField>(
    mask: &[bool],
    nmissing: usize,
    y: &DVector<R>,
    z: &DMatrix<R>,
    d: &DVector<R>,
    h: &DMatrix<R>,
) -> EffectiveObservation<R> {
    let p = mask.len();

    if nmissing == 0 {
        return EffectiveObservation {
            p_eff: p,
            missingness: Missingness::None,
            y: y.clone(),
            z: z.clone(),
            d: d.clone(),
            h: h.clone(),
            rows: (0..p).collect(),
        };
    }

    if nmissing == p {
        return EffectiveObservation {
            p_eff: 0,
            missingness: Missingness::All,
            y: DVector::zeros(0),
            z: DMatrix::zeros(0, z.ncols()),
            d: DVector::zeros(0),
            h: DMatrix::zeros(0, 0),
            rows: Vec::new(),
        };
    }

    let rows: Vec<usize> = (0..p).filter(|&i| !mask[i]).collect();
    let p_eff = rows.len();
    let m = z.ncols();
    EffectiveObservation {
        p_eff,
        missingness: Missingness::Partial,
        y: DVector::from_iterator(p_eff, rows.iter().map(|&i| y[i].clone())),
        z: DMatrix::from_fn(p_eff, m, |r, c| z[(rows[r], c)].clone()),
        d: DVector::from_iterator(p_eff, rows.iter().map(|&i| d[i].clone())),
        h: DMatrix::from_fn(p_eff, p_eff, |r, c| h[(rows[r], rows[c])].clone()),
        rows,
    }
}

/// Scatters a `p_eff`-sized vector back into a zero-filled `p`-sized one.
pub(crate) fn scatter_vec<R: ComplexField>(p: usize, rows: &[usize], eff: &DVector<R>) -> DVector<R> {
    let mut full = DVector::zeros(p);
    for (k, &i) in rows.iter().enumerate() {
        full[i] = eff[k].clone();
    }
    full
}

/// Scatters a `p_eff x p_eff` matrix back into its zero-filled principal
/// submatrix of a `p x p` one.
pub(crate) fn scatter_mat<R: ComplexField>(p: usize, rows: &[usize], eff: &DMatrix<R>) -> DMatrix<R> {
    let mut full = DMatrix::zeros(p, p);
    for (r, &ri) in rows.iter().enumerate() {
        for (c, &ci) in rows.iter().enumerate() {
            full[(ri, ci)] = eff[(r, c)].clone();
        }
    }
    full
}
