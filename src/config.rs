//! Runtime configuration: the bitmask options from the external interface,
//! bundled into one small, validated value per filter instance.

use nalgebra::{self as na, ComplexField};

use crate::error::{Error, ErrorKind};

macro_rules! bitmask {
    ($(#[$meta:meta])* $name:ident { $($(#[$vmeta:meta])* $variant:ident = $val:expr),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub struct $name(pub u32);

        impl $name {
            /// The empty mask.
            pub const NONE: $name = $name(0);
            $($(#[$vmeta])* pub const $variant: $name = $name($val);)+

            /// True iff every bit of `other` is set in `self`.
            pub fn contains(self, other: Self) -> bool {
                self.0 & other.0 == other.0
            }

            /// True iff `self` and `other` share at least one bit.
            pub fn intersects(self, other: Self) -> bool {
                self.0 & other.0 != 0
            }
        }

        impl core::ops::BitOr for $name {
            type Output = Self;
            fn bitor(self, rhs: Self) -> Self {
                Self(self.0 | rhs.0)
            }
        }

        impl core::ops::BitOrAssign for $name {
            fn bitor_assign(&mut self, rhs: Self) {
                self.0 |= rhs.0;
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::NONE
            }
        }
    };
}

bitmask!(
    /// Which overall filter recursion to run. Only `CONVENTIONAL` is
    /// implemented; the remaining bits are reserved hooks for variants this
    /// engine does not (yet) carry.
    FilterMethod {
        CONVENTIONAL = 0x01,
        EXACT_INITIAL = 0x02,
        AUGMENTED = 0x04,
        SQUARE_ROOT = 0x08,
        UNIVARIATE = 0x10,
        COLLAPSED = 0x20,
        EXTENDED = 0x40,
        UNSCENTED = 0x80,
    }
);

bitmask!(
    /// How the forecast-error covariance is factored/inverted each step.
    /// A caller may set more than one bit as a fallback chain; the
    /// dispatcher in [`crate::linalg::select_inversion_method`] applies a
    /// fixed precedence order.
    InversionMethod {
        /// Scalar reciprocal, used only when `p_eff == 1`.
        INVERT_UNIVARIATE = 0x01,
        SOLVE_LU = 0x02,
        INVERT_LU = 0x04,
        SOLVE_CHOLESKY = 0x08,
        INVERT_CHOLESKY = 0x10,
    }
);

bitmask!(
    /// Numerical-stability post-processing.
    StabilityMethod {
        /// Symmetrize `P_{t+1}` by averaging with its transpose in place.
        FORCE_SYMMETRY = 0x01,
    }
);

bitmask!(
    /// Which output families collapse to rotating buffers instead of full,
    /// per-period storage.
    Conserve {
        NO_FORECAST = 0x01,
        NO_PREDICTED = 0x02,
        NO_FILTERED = 0x04,
        NO_LIKELIHOOD = 0x08,
    }
);

/// The recommended inversion precedence: first bit set in this order wins,
/// with `INVERT_UNIVARIATE` handled separately since it also depends on
/// `p_eff == 1`.
pub(crate) const INVERSION_PRECEDENCE: [InversionMethod; 4] = [
    InversionMethod::SOLVE_CHOLESKY,
    InversionMethod::SOLVE_LU,
    InversionMethod::INVERT_CHOLESKY,
    InversionMethod::INVERT_LU,
];

/// Bundles every tunable from the external interface (§6) into one value
/// owned by a [`crate::filter::KalmanFilter`].
#[derive(Debug, Clone)]
pub struct FilterOptions<R: ComplexField> {
    pub filter_method: FilterMethod,
    pub inversion_method: InversionMethod,
    pub stability_method: StabilityMethod,
    pub conserve_memory: Conserve,
    /// Convergence threshold compared against `|D^T D|` for the flattened
    /// covariance difference. Defaults to `1e-19`.
    pub tolerance: R::RealField,
    /// First period whose log-likelihood contributes to the accumulator
    /// under `NO_LIKELIHOOD` conservation.
    pub loglikelihood_burn: usize,
}

impl<R: ComplexField> FilterOptions<R> {
    /// Conventional filter, full Cholesky-then-LU inversion fallback chain,
    /// forced symmetry, full storage, standard tolerance.
    pub fn new() -> Self {
        Self {
            filter_method: FilterMethod::CONVENTIONAL,
            inversion_method: InversionMethod::INVERT_UNIVARIATE
                | InversionMethod::SOLVE_CHOLESKY
                | InversionMethod::SOLVE_LU
                | InversionMethod::INVERT_CHOLESKY
                | InversionMethod::INVERT_LU,
            stability_method: StabilityMethod::FORCE_SYMMETRY,
            conserve_memory: Conserve::NONE,
            tolerance: na::convert(1e-19),
            loglikelihood_burn: 0,
        }
    }

    /// Eagerly rejects any `filter_method` other than `CONVENTIONAL`; this is
    /// the one configuration error cheap and useful to catch before the
    /// first step.
    pub fn validate(&self) -> Result<(), Error> {
        if self.filter_method != FilterMethod::CONVENTIONAL {
            return Err(ErrorKind::InvalidMethod.into());
        }
        Ok(())
    }
}

impl<R: ComplexField> Default for FilterOptions<R> {
    fn default() -> Self {
        Self::new()
    }
}
