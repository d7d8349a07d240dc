//! Compiled kernel handles.

use std::ffi::c_void;
use std::fmt;
use std::os::raw::c_int;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use elemjit_core::{ArgumentBundle, KernelShape};
use libloading::Library;
use tempfile::TempDir;

use crate::error::{BuildError, InvokeError};

/// C signature of a generated stepper: `void* g(void* t,int a,int b,int k)`.
pub(crate) type StepperFn = unsafe extern "C" fn(*mut c_void, c_int, c_int, c_int) -> *mut c_void;

/// Build directory backing a loaded library.
#[derive(Debug)]
pub(crate) enum Workspace {
    /// Removed when dropped.
    Scoped(TempDir),
    /// Left on disk.
    Kept(PathBuf),
}

impl Workspace {
    fn path(&self) -> &Path {
        match self {
            Workspace::Scoped(dir) => dir.path(),
            Workspace::Kept(path) => path,
        }
    }
}

/// A loaded library and its stepper.
///
/// Fields drop in order: the library is unloaded before its build
/// directory is removed.
pub(crate) struct LoadedLibrary {
    stepper: StepperFn,
    library: Library,
    workspace: Workspace,
}

impl LoadedLibrary {
    pub(crate) fn new(library: Library, stepper: StepperFn, workspace: Workspace) -> Self {
        Self {
            stepper,
            library,
            workspace,
        }
    }

    pub(crate) fn stepper(&self) -> StepperFn {
        self.stepper
    }

    fn build_dir(&self) -> &Path {
        self.workspace.path()
    }

    fn close(self) -> Result<(), libloading::Error> {
        let Self {
            library, workspace, ..
        } = self;
        let result = library.close();
        drop(workspace);
        result
    }
}

/// A native kernel loaded into the process.
///
/// Closing releases the library. Dispatches already in flight keep it
/// loaded until they finish.
pub struct CompiledKernel {
    id: u64,
    shape: KernelShape,
    artifact: PathBuf,
    library: Option<Arc<LoadedLibrary>>,
}

impl CompiledKernel {
    pub(crate) fn new(id: u64, shape: KernelShape, artifact: PathBuf, library: LoadedLibrary) -> Self {
        Self {
            id,
            shape,
            artifact,
            library: Some(Arc::new(library)),
        }
    }

    /// Process-unique build id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Element kinds the kernel expects.
    pub fn shape(&self) -> &KernelShape {
        &self.shape
    }

    /// Path of the shared library this kernel was loaded from.
    pub fn artifact_path(&self) -> &Path {
        &self.artifact
    }

    /// Directory holding the generated source and library, while loaded.
    pub fn build_dir(&self) -> Option<&Path> {
        self.library.as_deref().map(LoadedLibrary::build_dir)
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.library.is_none()
    }

    /// Run the stepper over `[start, end)` with step 1 on the calling thread.
    ///
    /// The bundle is checked against the kernel shape and the range against
    /// the bundle length before any native code runs. An empty range is a
    /// no-op.
    pub fn invoke(&self, bundle: &mut ArgumentBundle, start: i32, end: i32) -> Result<(), InvokeError> {
        let library = self.library.as_ref().ok_or(InvokeError::Closed)?;
        bundle.validate(&self.shape, start, end)?;

        tracing::trace!(kernel_id = self.id, start, end, "Invoking kernel");

        // SAFETY: the bundle matches the shape the stepper was generated for
        // and every index in [start, end) is within each buffer.
        unsafe {
            (library.stepper())(bundle.as_raw(), start, end, 1);
        }
        Ok(())
    }

    /// Release the native library.
    ///
    /// A second call returns [`BuildError::AlreadyClosed`].
    pub fn close(&mut self) -> Result<(), BuildError> {
        let library = self.library.take().ok_or(BuildError::AlreadyClosed)?;

        match Arc::try_unwrap(library) {
            Ok(library) => {
                library.close().map_err(BuildError::Close)?;
                tracing::debug!(kernel_id = self.id, "Kernel library closed");
            }
            Err(shared) => {
                tracing::debug!(
                    kernel_id = self.id,
                    in_flight = Arc::strong_count(&shared) - 1,
                    "Kernel closed, unload deferred until dispatches finish"
                );
            }
        }
        Ok(())
    }

    pub(crate) fn library(&self) -> Option<&Arc<LoadedLibrary>> {
        self.library.as_ref()
    }
}

impl fmt::Debug for CompiledKernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledKernel")
            .field("id", &self.id)
            .field("shape", &self.shape)
            .field("artifact", &self.artifact)
            .field("closed", &self.is_closed())
            .finish()
    }
}
