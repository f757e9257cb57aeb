//! Error types shared by the raster pipeline crates.
//!
//! A single [`Error`] enum covers every failure mode of the core: operation
//! registry misses, unsupported color models or data types, missing color
//! profiles, builder state violations, and encoder failures. The worker
//! surfaces operation errors unchanged, so all crates in the workspace share
//! this type.
//!
//! # Usage
//!
//! ```rust
//! use raster_core::{Error, Result};
//!
//! fn pick_band(band: usize, num_bands: usize) -> Result<usize> {
//!     if band >= num_bands {
//!         return Err(Error::illegal_argument("band", band.to_string()));
//!     }
//!     Ok(band)
//! }
//! ```

use thiserror::Error;

/// Result type alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or evaluating a raster pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// The operation name was not found in the registry.
    #[error("no such operation: {0}")]
    NoSuchOperation(String),

    /// The current color model cannot be used for this operation.
    #[error("unsupported color model: {0}")]
    UnsupportedColorModel(String),

    /// No conversion path exists for the given sample data type.
    #[error("unsupported data type: {0}")]
    UnsupportedDataType(String),

    /// Color profile data for the requested color space is not available.
    #[error("color profile unavailable for color space: {0}")]
    ProfileUnavailable(String),

    /// A builder precondition failed (null image, unbalanced tile-cache
    /// counter, and similar). The worker must not be used further.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// An argument was out of range or otherwise malformed.
    #[error("illegal argument {name}: {value}")]
    IllegalArgument {
        /// Name of the offending argument.
        name: String,
        /// Stringified value that was rejected.
        value: String,
    },

    /// The affine transform has no inverse (zero determinant).
    #[error("transform is not invertible (determinant {det})")]
    NonInvertibleTransform {
        /// Determinant of the rejected transform.
        det: f64,
    },

    /// Operand sample types are incompatible after promotion.
    #[error("type mismatch: {left} vs {right}")]
    TypeMismatch {
        /// Left operand data type.
        left: String,
        /// Right operand data type.
        right: String,
    },

    /// Operand bounds differ and no broadcast rule applies.
    #[error("shape mismatch: {left} vs {right}")]
    ShapeMismatch {
        /// Left operand bounds.
        left: String,
        /// Right operand bounds.
        right: String,
    },

    /// The operation is specified but deliberately not provided.
    #[error("not implemented: {0}")]
    NotImplemented(String),

    /// The encoder rejected the image after preconditioning was attempted.
    #[error("codec failure: {0}")]
    CodecFailure(String),

    /// I/O error on the output stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Creates an [`Error::IllegalArgument`] error.
    #[inline]
    pub fn illegal_argument(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::IllegalArgument {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Creates an [`Error::InvalidState`] error.
    #[inline]
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    /// Creates an [`Error::ShapeMismatch`] from two bounds descriptions.
    #[inline]
    pub fn shape_mismatch(left: impl ToString, right: impl ToString) -> Self {
        Self::ShapeMismatch {
            left: left.to_string(),
            right: right.to_string(),
        }
    }

    /// Creates an [`Error::TypeMismatch`] from two data type names.
    #[inline]
    pub fn type_mismatch(left: impl ToString, right: impl ToString) -> Self {
        Self::TypeMismatch {
            left: left.to_string(),
            right: right.to_string(),
        }
    }

    /// Returns `true` if this is a state error that leaves the worker
    /// undetermined.
    #[inline]
    pub fn is_state_error(&self) -> bool {
        matches!(self, Self::InvalidState(_))
    }

    /// Returns `true` if this error came from the encoder or the stream.
    #[inline]
    pub fn is_write_error(&self) -> bool {
        matches!(self, Self::CodecFailure(_) | Self::Io(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_illegal_argument_message() {
        let err = Error::illegal_argument("palette", "65537 entries");
        let msg = err.to_string();
        assert!(msg.contains("palette"));
        assert!(msg.contains("65537"));
    }

    #[test]
    fn test_invalid_state_predicate() {
        let err = Error::invalid_state("image not set");
        assert!(err.is_state_error());
        assert!(!err.is_write_error());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        let err: Error = io_err.into();
        assert!(err.is_write_error());
    }
}
