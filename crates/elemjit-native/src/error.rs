//! Error types for building, invoking and dispatching kernels.

use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;

use elemjit_codegen::CodegenError;
use elemjit_core::{ArgumentBundle, CoreError};
use thiserror::Error;

/// Failure at one stage of the build pipeline.
#[derive(Error, Debug)]
pub enum BuildError {
    /// Signature resolution or source generation failed.
    #[error("Code generation failed: {0}")]
    Codegen(#[from] CodegenError),

    /// Per-build directory could not be created.
    #[error("Failed to create build directory under {path}: {source}")]
    TempFile {
        /// Parent directory.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// Generated source could not be written.
    #[error("Failed to write kernel source {path}: {source}")]
    Write {
        /// Source file path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// Compiler process could not be started.
    #[error("Failed to run compiler '{compiler}': {source}")]
    CompilerUnavailable {
        /// Compiler binary.
        compiler: String,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// Compiler exited unsuccessfully.
    #[error("Compilation failed ({status}): {stderr}")]
    Compile {
        /// Compiler exit status.
        status: ExitStatus,
        /// Captured compiler diagnostics.
        stderr: String,
    },

    /// Shared library could not be loaded.
    #[error("Failed to load {path}: {source}")]
    Load {
        /// Library path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: libloading::Error,
    },

    /// Stepper symbol is missing from the library.
    #[error("Symbol '{symbol}' not found in {path}: {source}")]
    Symbol {
        /// Symbol name.
        symbol: String,
        /// Library path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: libloading::Error,
    },

    /// Library was already released.
    #[error("Kernel library already closed")]
    AlreadyClosed,

    /// Unloading the library failed.
    #[error("Failed to close kernel library: {0}")]
    Close(#[source] libloading::Error),
}

impl From<CoreError> for BuildError {
    fn from(e: CoreError) -> Self {
        BuildError::Codegen(CodegenError::Type(e))
    }
}

/// Failure of a synchronous invocation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvokeError {
    /// Kernel library has been closed.
    #[error("Kernel library has been closed")]
    Closed,

    /// Bundle or range does not fit the kernel.
    #[error("Invalid invocation: {0}")]
    Validation(#[from] CoreError),
}

/// Failure of a parallel dispatch or join.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// Kernel library has been closed.
    #[error("Kernel library has been closed")]
    Closed,

    /// Bundle, range, thread count or mode rejected.
    #[error("Invalid dispatch: {0}")]
    Validation(#[from] CoreError),

    /// Dispatcher thread could not be started.
    #[error("Failed to start dispatcher thread: {0}")]
    Spawn(#[source] io::Error),

    /// Token is the failure sentinel, unknown, or already joined.
    #[error("Invalid completion token: {0}")]
    InvalidToken(i64),

    /// Dispatcher thread panicked.
    #[error("Dispatcher thread panicked")]
    Panicked,

    /// Bundle was still referenced when the dispatch finished.
    #[error("Argument bundle still referenced after join")]
    StillShared,
}

/// A dispatch that never started. Carries the bundle back to the caller.
#[derive(Error, Debug)]
#[error("{source}")]
pub struct DispatchStartError {
    #[source]
    source: DispatchError,
    bundle: Option<ArgumentBundle>,
}

impl DispatchStartError {
    pub(crate) fn new(source: DispatchError, bundle: ArgumentBundle) -> Self {
        Self {
            source,
            bundle: Some(bundle),
        }
    }

    pub(crate) fn without_bundle(source: DispatchError) -> Self {
        Self {
            source,
            bundle: None,
        }
    }

    /// The underlying error.
    pub fn error(&self) -> &DispatchError {
        &self.source
    }

    /// Recover the bundle, if it could be returned.
    pub fn into_bundle(self) -> Option<ArgumentBundle> {
        self.bundle
    }

    /// Split into error and bundle.
    pub fn into_parts(self) -> (DispatchError, Option<ArgumentBundle>) {
        (self.source, self.bundle)
    }
}
