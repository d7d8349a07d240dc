//! Error types for the elemjit CLI.

use thiserror::Error;

/// CLI result type alias.
pub type CliResult<T> = Result<T, CliError>;

/// CLI error type.
#[derive(Error, Debug)]
pub enum CliError {
    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Kernel description could not be parsed.
    #[error("Invalid kernel description: {0}")]
    Config(#[from] toml::de::Error),

    /// Build, invoke or dispatch failure.
    #[error(transparent)]
    Kernel(#[from] elemjit::Error),

    /// The kernel cannot be driven with generated inputs.
    #[error("Unsupported kernel: {0}")]
    Unsupported(String),

    /// A parallel run disagreed with the sequential run.
    #[error("Result mismatch: {0}")]
    Mismatch(String),
}

macro_rules! kernel_error {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for CliError {
                fn from(e: $ty) -> Self {
                    CliError::Kernel(e.into())
                }
            }
        )*
    };
}

kernel_error!(
    elemjit::CoreError,
    elemjit::BuildError,
    elemjit::DispatchError,
    elemjit::codegen::CodegenError
);
