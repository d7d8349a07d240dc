//! Native build, loading and dispatch for elemjit kernels.
//!
//! The [`BuildPipeline`] writes generated C to a fresh build directory, runs
//! the system compiler, loads the resulting shared library and resolves the
//! stepper. A [`CompiledKernel`] can then be invoked on the calling thread or
//! dispatched across worker threads.
//!
//! # Example
//!
//! ```ignore
//! use elemjit_core::{ArgumentBundle, ElementKind, KernelRequest, StridedBuffer};
//! use elemjit_native::{BuildPipeline, Dispatcher};
//!
//! let pipeline = BuildPipeline::from_env();
//! let mut kernel = pipeline.build_request(&KernelRequest::new(
//!     "return a+b;",
//!     [("double", "a"), ("double", "b")],
//!     "double",
//! ))?;
//!
//! let bundle = ArgumentBundle::builder()
//!     .input(StridedBuffer::from_slice(&[1.0f64, 2.0, 3.0, 4.0]))
//!     .input(StridedBuffer::from_slice(&[10.0f64, 20.0, 30.0, 40.0]))
//!     .result(StridedBuffer::zeroed(ElementKind::Double, 4))
//!     .build()?;
//!
//! let dispatcher = Dispatcher::default();
//! let token = dispatcher.dispatch(&kernel, bundle, 0, 4, 2, 2);
//! let bundle = dispatcher.join(token)?;
//! kernel.close()?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod config;
pub mod dispatch;
pub mod error;
pub mod kernel;
pub mod pipeline;
pub mod token;

pub use config::{BuildConfig, DispatchConfig};
pub use dispatch::{dispatch, DispatchHandle};
pub use error::{BuildError, DispatchError, DispatchStartError, InvokeError};
pub use kernel::CompiledKernel;
pub use pipeline::{is_compiler_available, source_hash, BuildPipeline};
pub use token::{CompletionToken, Dispatcher};
