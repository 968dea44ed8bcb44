//! Error type shared by the builder, passes, and downstream emitters.

use std::fmt;

/// Errors produced by the builder layer.
///
/// Errors are explicit return values, never panics. The builder additionally
/// records the first emission error as its sticky *last error*: once set,
/// every subsequent emission short-circuits with the same error until
/// [`crate::Builder::clear_last_error`] or a reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Arena or downstream allocation failure.
    OutOfMemory,
    /// A label id that is not registered in the code container.
    InvalidLabel,
    /// Invalid argument passed to a builder API.
    InvalidArgument,
    /// Operation not permitted in the current builder state.
    InvalidState,
    /// The strict validator vetoed an instruction.
    ValidationFailed,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::OutOfMemory => write!(f, "out of memory"),
            Error::InvalidLabel => write!(f, "invalid label id"),
            Error::InvalidArgument => write!(f, "invalid argument"),
            Error::InvalidState => write!(f, "invalid state"),
            Error::ValidationFailed => write!(f, "instruction validation failed"),
        }
    }
}

impl std::error::Error for Error {}
