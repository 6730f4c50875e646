//! Error taxonomy for the filter engine.

use core::fmt;

/// The kind of numerical failure that aborted a factorization or solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinAlgErrorKind {
    /// `potrf`-equivalent: the forecast-error covariance was not positive
    /// definite.
    NotPositiveDefinite,
    /// `getrf`-equivalent: the forecast-error covariance was singular.
    Singular,
}

impl fmt::Display for LinAlgErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinAlgErrorKind::NotPositiveDefinite => write!(f, "not positive definite"),
            LinAlgErrorKind::Singular => write!(f, "singular"),
        }
    }
}

/// The distinguishing detail of an [`Error`].
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorKind {
    /// A factorization or solve failed at the given period.
    LinAlg {
        /// The zero-based period at which the failure occurred.
        period: usize,
        /// What kind of numerical failure it was.
        kind: LinAlgErrorKind,
    },
    /// A system matrix did not have the shape its role in the model requires.
    InvalidShape {
        /// Name of the offending matrix (e.g. `"design"`, `"state_cov"`).
        name: &'static str,
        /// `(rows, cols)` the matrix was required to have.
        expected: (usize, usize),
        /// `(rows, cols)` it actually had.
        got: (usize, usize),
    },
    /// The filter was stepped before an initialization strategy was applied.
    NotInitialized,
    /// `filter_method` did not resolve to a supported method, or
    /// `inversion_method` had no bit the dispatcher could apply.
    InvalidMethod,
    /// `step()` was called at or past the end of the observation sequence.
    EndOfSequence,
}

/// An error produced by the filter engine.
///
/// This mirrors the taxonomy in the design document exactly: shape errors
/// and `NotInitialized` are fatal at construction time, `LinAlg` errors abort
/// the current step with no local recovery, and `EndOfSequence` is a benign
/// termination signal rather than a true failure.
#[derive(Debug, Clone, PartialEq)]
pub struct Error {
    kind: ErrorKind,
}

impl Error {
    /// The underlying [`ErrorKind`].
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// True for the benign "ran off the end of the series" signal.
    pub fn is_end_of_sequence(&self) -> bool {
        matches!(self.kind, ErrorKind::EndOfSequence)
    }

    pub(crate) fn lin_alg(period: usize, kind: LinAlgErrorKind) -> Self {
        ErrorKind::LinAlg { period, kind }.into()
    }

    pub(crate) fn invalid_shape(
        name: &'static str,
        expected: (usize, usize),
        got: (usize, usize),
    ) -> Self {
        ErrorKind::InvalidShape { name, expected, got }.into()
    }

    pub(crate) fn not_initialized() -> Self {
        ErrorKind::NotInitialized.into()
    }

    pub(crate) fn invalid_method() -> Self {
        ErrorKind::InvalidMethod.into()
    }

    pub(crate) fn end_of_sequence() -> Self {
        ErrorKind::EndOfSequence.into()
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self { kind }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ErrorKind::LinAlg { period, kind } => {
                write!(f, "linear algebra failure at period {period}: {kind}")
            }
            ErrorKind::InvalidShape { name, expected, got } => write!(
                f,
                "{name} has shape {got:?}, expected {expected:?}"
            ),
            ErrorKind::NotInitialized => write!(f, "filter stepped before initialization"),
            ErrorKind::InvalidMethod => write!(f, "unsupported or unresolvable method bitmask"),
            ErrorKind::EndOfSequence => write!(f, "end of observation sequence"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}
