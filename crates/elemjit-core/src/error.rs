//! Error types for elemjit core operations.

use thiserror::Error;

use crate::registry::ElementKind;

/// Result type alias using [`CoreError`].
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised by type lookup, signature resolution, bundle validation
/// and partition planning.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Type name is not in the registry.
    #[error("Unknown type: {0}")]
    UnknownType(String),

    /// Kernel signature declares no parameters.
    #[error("Kernel signature has no parameters")]
    EmptySignature,

    /// Generation mode flag is not recognized.
    #[error("Unsupported generation mode: {0}")]
    UnsupportedGenerationMode(i64),

    /// Partition mode flag is not recognized.
    #[error("Unknown partition mode: {0}")]
    UnknownPartitionMode(i64),

    /// Thread count must be at least one.
    #[error("Invalid thread count: {0}")]
    InvalidThreadCount(i64),

    /// Iteration range does not fit the bundle's domain.
    #[error("Invalid range [{start}, {end}) for domain of length {len}")]
    InvalidRange {
        /// Range start.
        start: i32,
        /// Range end (exclusive).
        end: i32,
        /// Domain length shared by every buffer.
        len: usize,
    },

    /// Argument bundle is malformed.
    #[error("Invalid argument bundle: {0}")]
    Bundle(String),

    /// Buffer element kind differs from the declared type.
    #[error("Element kind mismatch: expected {expected}, found {found}")]
    KindMismatch {
        /// Kind required by the kernel or accessor.
        expected: ElementKind,
        /// Kind of the buffer.
        found: ElementKind,
    },

    /// Kernel arity differs from the number of bundle inputs.
    #[error("Arity mismatch: kernel takes {expected} inputs, bundle has {found}")]
    ArityMismatch {
        /// Number of kernel parameters.
        expected: usize,
        /// Number of bundle inputs.
        found: usize,
    },

    /// Element index past the end of a buffer.
    #[error("Index {index} out of bounds for length {len}")]
    IndexOutOfBounds {
        /// Requested index.
        index: usize,
        /// Buffer length.
        len: usize,
    },
}
