//! Generate, compile and load.
//!
//! Each build gets its own directory under the configured work dir, so
//! concurrent builds never share a source or library path. Sources are
//! named `kernel-<id>-<hash>.c`, where `<hash>` is a SHA-256 prefix of the
//! generated code.

use std::fs;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};

use elemjit_codegen::{generate_source, CodegenError, STEPPER_SYMBOL};
use elemjit_core::{GenerationMode, KernelRequest, KernelShape, KernelSignature};
use libloading::Library;
use sha2::{Digest, Sha256};

use crate::config::{BuildConfig, COMPILER_FLAGS};
use crate::error::BuildError;
use crate::kernel::{CompiledKernel, LoadedLibrary, StepperFn, Workspace};

static BUILD_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Turns kernel requests into loaded native kernels.
#[derive(Debug, Clone, Default)]
pub struct BuildPipeline {
    config: BuildConfig,
}

impl BuildPipeline {
    /// Create a pipeline with the given configuration.
    pub fn new(config: BuildConfig) -> Self {
        Self { config }
    }

    /// Pipeline configured from the environment.
    pub fn from_env() -> Self {
        Self::new(BuildConfig::from_env())
    }

    /// Active configuration.
    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Build a raw request.
    ///
    /// Mode and type names are resolved before anything touches the
    /// filesystem or spawns the compiler.
    pub fn build_request(&self, request: &KernelRequest) -> Result<CompiledKernel, BuildError> {
        let mode = request.generation_mode().map_err(CodegenError::from)?;
        let signature = request.signature().map_err(CodegenError::from)?;
        self.build_signature(&signature, mode)
    }

    /// Build a resolved signature.
    pub fn build_signature(
        &self,
        signature: &KernelSignature,
        mode: GenerationMode,
    ) -> Result<CompiledKernel, BuildError> {
        let source = generate_source(signature, mode)?;
        self.build_source(&source, signature.shape())
    }

    /// Compile and load an already generated translation unit.
    ///
    /// `shape` must describe the stepper in `source`; it is what bundles are
    /// validated against.
    pub fn build_source(&self, source: &str, shape: KernelShape) -> Result<CompiledKernel, BuildError> {
        let id = BUILD_COUNTER.fetch_add(1, Ordering::Relaxed);
        let hash = source_hash(source);
        let stem = format!("kernel-{:06}-{}", id, &hash[..12]);

        let parent = self.config.resolved_work_dir();
        let dir = tempfile::Builder::new()
            .prefix("elemjit-")
            .tempdir_in(&parent)
            .map_err(|source| BuildError::TempFile {
                path: parent.clone(),
                source,
            })?;

        let src_path = dir.path().join(format!("{stem}.c"));
        let lib_path = dir
            .path()
            .join(format!("{stem}.{}", std::env::consts::DLL_EXTENSION));

        fs::write(&src_path, source).map_err(|source| BuildError::Write {
            path: src_path.clone(),
            source,
        })?;

        tracing::debug!(
            kernel_id = id,
            source = %src_path.display(),
            bytes = source.len(),
            "Wrote kernel source"
        );

        self.compile(&src_path, &lib_path)?;

        // SAFETY: the library was just produced from generated code with no
        // initialisers.
        let library = unsafe { Library::new(&lib_path) }.map_err(|source| BuildError::Load {
            path: lib_path.clone(),
            source,
        })?;

        // SAFETY: the generated stepper has exactly the `StepperFn` signature.
        let stepper: StepperFn = match unsafe { library.get::<StepperFn>(STEPPER_SYMBOL.as_bytes()) } {
            Ok(symbol) => *symbol,
            Err(source) => {
                return Err(BuildError::Symbol {
                    symbol: STEPPER_SYMBOL.to_string(),
                    path: lib_path,
                    source,
                })
            }
        };

        let workspace = if self.config.keep_artifacts {
            #[allow(deprecated)]
            let kept = dir.into_path();
            Workspace::Kept(kept)
        } else {
            Workspace::Scoped(dir)
        };

        tracing::info!(
            kernel_id = id,
            artifact = %lib_path.display(),
            params = shape.params.len(),
            result = %shape.result,
            "Kernel built"
        );

        Ok(CompiledKernel::new(
            id,
            shape,
            lib_path,
            LoadedLibrary::new(library, stepper, workspace),
        ))
    }

    fn compile(&self, src: &Path, out: &Path) -> Result<(), BuildError> {
        let compiler = self.config.compiler();

        let output = Command::new(compiler)
            .args(COMPILER_FLAGS)
            .arg(src)
            .arg("-o")
            .arg(out)
            .output()
            .map_err(|source| BuildError::CompilerUnavailable {
                compiler: compiler.display().to_string(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            tracing::warn!(
                compiler = %compiler.display(),
                status = %output.status,
                "Kernel compilation failed"
            );
            return Err(BuildError::Compile {
                status: output.status,
                stderr,
            });
        }

        Ok(())
    }
}

/// Hex SHA-256 of a generated translation unit.
pub fn source_hash(source: &str) -> String {
    let digest = Sha256::digest(source.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Whether `compiler --version` runs successfully.
pub fn is_compiler_available(compiler: impl AsRef<Path>) -> bool {
    Command::new(compiler.as_ref())
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}
