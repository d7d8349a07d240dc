//! # elemjit
//!
//! JIT-compiled elementwise kernels over strided host arrays.
//!
//! A kernel is a scalar C function body plus typed parameter names. elemjit
//! wraps it in a stepper that walks an index range, compiles the result
//! with the system C compiler, loads it and runs it either on the calling
//! thread or split across worker threads.
//!
//! ## Quick Start
//!
//! ```ignore
//! use elemjit::prelude::*;
//!
//! fn main() -> elemjit::Result<()> {
//!     let jit = ElemJit::from_env();
//!
//!     let mut kernel = jit.make_function(&KernelRequest::new(
//!         "return a+b;",
//!         [("double", "a"), ("double", "b")],
//!         "double",
//!     ))?;
//!
//!     let bundle = ArgumentBundle::builder()
//!         .input(StridedBuffer::from_slice(&[1.0f64, 2.0, 3.0, 4.0]))
//!         .input(StridedBuffer::from_slice(&[10.0f64, 20.0, 30.0, 40.0]))
//!         .result(StridedBuffer::zeroed(ElementKind::Double, 4))
//!         .build()?;
//!
//!     // Synchronous
//!     let bundle = jit.call(&kernel, bundle, 0, 4)?;
//!
//!     // Parallel, two threads, chunked
//!     let token = jit.dispatch(&kernel, bundle, 0, 4, 2, PartitionMode::MODE_CHUNK);
//!     let bundle = jit.join(token)?;
//!
//!     println!("{:?}", bundle.result().to_vec::<f64>()?);
//!     kernel.close()?;
//!     Ok(())
//! }
//! ```
//!
//! ## Crates
//!
//! - [`elemjit_core`] - host layout, type registry, signatures, partitioning
//! - [`elemjit_codegen`] - C source generation
//! - [`elemjit_native`] - compile, load, invoke and dispatch

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(hidden_glob_reexports)]

pub use elemjit_core::*;

pub use elemjit_native::{
    is_compiler_available, BuildConfig, BuildError, BuildPipeline, CompiledKernel,
    CompletionToken, DispatchConfig, DispatchError, DispatchHandle, DispatchStartError,
    Dispatcher, InvokeError,
};

pub use elemjit_codegen as codegen;
pub use elemjit_native as native;

use elemjit_codegen::CodegenError;
use thiserror::Error;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::{ElemJit, Error, Result};
    pub use elemjit_core::prelude::*;
    pub use elemjit_native::{
        BuildConfig, CompiledKernel, CompletionToken, DispatchConfig, DispatchHandle,
    };
}

/// Any elemjit failure.
#[derive(Error, Debug)]
pub enum Error {
    /// Type, signature, bundle or partition error.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Source generation failed.
    #[error(transparent)]
    Codegen(#[from] CodegenError),

    /// Building the native kernel failed.
    #[error(transparent)]
    Build(#[from] BuildError),

    /// Synchronous invocation was rejected.
    #[error(transparent)]
    Invoke(#[from] InvokeError),

    /// Parallel dispatch or join failed.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl From<DispatchStartError> for Error {
    fn from(e: DispatchStartError) -> Self {
        Error::Dispatch(e.into_parts().0)
    }
}

/// Result type for elemjit operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Entry point combining a build pipeline and a token dispatcher.
#[derive(Debug, Default)]
pub struct ElemJit {
    pipeline: BuildPipeline,
    dispatcher: Dispatcher,
}

impl ElemJit {
    /// Default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build configuration from `ELEMJIT_*` environment variables.
    pub fn from_env() -> Self {
        Self::with_config(BuildConfig::from_env(), DispatchConfig::default())
    }

    /// Explicit configuration.
    pub fn with_config(build: BuildConfig, dispatch: DispatchConfig) -> Self {
        Self {
            pipeline: BuildPipeline::new(build),
            dispatcher: Dispatcher::new(dispatch),
        }
    }

    /// The build pipeline.
    pub fn pipeline(&self) -> &BuildPipeline {
        &self.pipeline
    }

    /// The token dispatcher.
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Generate, compile and load a kernel.
    pub fn make_function(&self, request: &KernelRequest) -> Result<CompiledKernel> {
        Ok(self.pipeline.build_request(request)?)
    }

    /// Run `kernel` over `[start, end)` on the calling thread and hand the
    /// bundle back.
    pub fn call(
        &self,
        kernel: &CompiledKernel,
        mut bundle: ArgumentBundle,
        start: i32,
        end: i32,
    ) -> Result<ArgumentBundle> {
        kernel.invoke(&mut bundle, start, end)?;
        Ok(bundle)
    }

    /// Start a parallel run from raw thread count and mode flags.
    ///
    /// Returns [`CompletionToken::FAILED`] if the dispatch is rejected.
    pub fn dispatch(
        &self,
        kernel: &CompiledKernel,
        bundle: ArgumentBundle,
        start: i32,
        end: i32,
        thread_count: i64,
        mode: i64,
    ) -> CompletionToken {
        self.dispatcher
            .dispatch(kernel, bundle, start, end, thread_count, mode)
    }

    /// Wait for a dispatch and take its bundle back.
    pub fn join(&self, token: CompletionToken) -> Result<ArgumentBundle> {
        Ok(self.dispatcher.join(token)?)
    }
}
