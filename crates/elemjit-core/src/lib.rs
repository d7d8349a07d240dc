//! # elemjit Core
//!
//! Core types shared by the elemjit kernel compiler and dispatcher.
//!
//! This crate holds everything that does not touch a native toolchain:
//!
//! - [`host`] - the `#[repr(C)]` host object layout that generated steppers
//!   read at fixed offsets, plus owned strided buffers and argument bundles
//! - [`registry`] - the closed table of supported scalar types
//! - [`signature`] - kernel signatures and build requests
//! - [`partition`] - splitting a flat index range across worker threads
//!
//! ## Example
//!
//! ```ignore
//! use elemjit_core::prelude::*;
//!
//! let sig = KernelSignature::new(
//!     [("double", "a"), ("double", "b")],
//!     "double",
//!     "return a+b;",
//! )?;
//!
//! let plan = PartitionPlan::new(0, 1000, 4, PartitionMode::Chunked)?;
//! assert_eq!(plan.len(), 4);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod error;
pub mod host;
pub mod partition;
pub mod registry;
pub mod signature;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{CoreError, Result};
    pub use crate::host::{ArgumentBundle, BundleBuilder, Element, StridedBuffer};
    pub use crate::partition::{Partition, PartitionMode, PartitionPlan};
    pub use crate::registry::{ElementKind, TypeDescriptor, TypeRegistry};
    pub use crate::signature::{
        GenerationMode, KernelParam, KernelRequest, KernelShape, KernelSignature,
    };
}

pub use error::{CoreError, Result};
pub use host::{ArgumentBundle, BundleBuilder, Element, StridedBuffer};
pub use partition::{Partition, PartitionMode, PartitionPlan};
pub use registry::{ElementKind, TypeDescriptor, TypeRegistry};
pub use signature::{GenerationMode, KernelParam, KernelRequest, KernelShape, KernelSignature};
