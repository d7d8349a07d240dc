//! Build and dispatch configuration.
//!
//! Compiler flags are fixed. Only the compiler binary, where build
//! directories are created and whether they are kept can be changed, either
//! through the builder methods or the environment:
//!
//! - `ELEMJIT_CC` - compiler binary (default `cc`)
//! - `ELEMJIT_WORK_DIR` - parent of per-build directories (default: system temp dir)
//! - `ELEMJIT_KEEP_ARTIFACTS` - `1`/`true` keeps generated sources and libraries

use std::path::{Path, PathBuf};

/// Default compiler binary.
pub const DEFAULT_COMPILER: &str = "cc";

/// Flags passed to every compiler invocation, before the source path.
pub const COMPILER_FLAGS: &[&str] = &[
    "-g",
    "-O3",
    "-ffast-math",
    "-march=native",
    "-fPIC",
    "-shared",
];

/// Environment variable overriding the compiler.
pub const ENV_COMPILER: &str = "ELEMJIT_CC";

/// Environment variable overriding the build directory parent.
pub const ENV_WORK_DIR: &str = "ELEMJIT_WORK_DIR";

/// Environment variable enabling artifact retention.
pub const ENV_KEEP_ARTIFACTS: &str = "ELEMJIT_KEEP_ARTIFACTS";

/// Configuration for [`crate::BuildPipeline`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfig {
    /// Compiler binary.
    pub compiler: PathBuf,
    /// Parent directory for per-build directories; system temp dir when unset.
    pub work_dir: Option<PathBuf>,
    /// Keep build directories after the kernel is dropped.
    pub keep_artifacts: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            compiler: PathBuf::from(DEFAULT_COMPILER),
            work_dir: None,
            keep_artifacts: false,
        }
    }
}

impl BuildConfig {
    /// Create a default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `ELEMJIT_*` environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(cc) = std::env::var_os(ENV_COMPILER).filter(|v| !v.is_empty()) {
            config.compiler = PathBuf::from(cc);
        }
        if let Some(dir) = std::env::var_os(ENV_WORK_DIR).filter(|v| !v.is_empty()) {
            config.work_dir = Some(PathBuf::from(dir));
        }
        if let Ok(keep) = std::env::var(ENV_KEEP_ARTIFACTS) {
            config.keep_artifacts = matches!(keep.to_lowercase().as_str(), "1" | "true" | "yes");
        }

        config
    }

    /// Set the compiler binary.
    pub fn with_compiler(mut self, compiler: impl Into<PathBuf>) -> Self {
        self.compiler = compiler.into();
        self
    }

    /// Set the build directory parent.
    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(dir.into());
        self
    }

    /// Keep or discard build directories.
    pub fn with_keep_artifacts(mut self, keep: bool) -> Self {
        self.keep_artifacts = keep;
        self
    }

    /// Resolved build directory parent.
    pub fn resolved_work_dir(&self) -> PathBuf {
        self.work_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    /// Compiler binary as a path.
    pub fn compiler(&self) -> &Path {
        &self.compiler
    }
}

/// Configuration for parallel dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Run the last partition on the dispatcher thread instead of a worker.
    pub inline_last_partition: bool,
    /// Prefix for dispatcher and worker thread names.
    pub thread_name_prefix: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            inline_last_partition: true,
            thread_name_prefix: "elemjit".to_string(),
        }
    }
}

impl DispatchConfig {
    /// Create a default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Choose whether the dispatcher thread runs the last partition itself.
    pub fn with_inline_last_partition(mut self, inline: bool) -> Self {
        self.inline_last_partition = inline;
        self
    }

    /// Set the thread name prefix.
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_config_defaults() {
        let config = BuildConfig::default();
        assert_eq!(config.compiler(), Path::new("cc"));
        assert!(!config.keep_artifacts);
        assert_eq!(config.resolved_work_dir(), std::env::temp_dir());
    }

    #[test]
    fn test_build_config_builder() {
        let config = BuildConfig::new()
            .with_compiler("clang")
            .with_work_dir("/tmp/elemjit-test")
            .with_keep_artifacts(true);

        assert_eq!(config.compiler(), Path::new("clang"));
        assert_eq!(config.resolved_work_dir(), PathBuf::from("/tmp/elemjit-test"));
        assert!(config.keep_artifacts);
    }

    #[test]
    fn test_compiler_flags_fixed() {
        assert!(COMPILER_FLAGS.contains(&"-O3"));
        assert!(COMPILER_FLAGS.contains(&"-march=native"));
        assert!(COMPILER_FLAGS.contains(&"-ffast-math"));
        assert!(COMPILER_FLAGS.contains(&"-fPIC"));
        assert!(COMPILER_FLAGS.contains(&"-shared"));
    }

    #[test]
    fn test_dispatch_config() {
        let config = DispatchConfig::default();
        assert!(config.inline_last_partition);

        let config = config
            .with_inline_last_partition(false)
            .with_thread_name_prefix("poly");
        assert!(!config.inline_last_partition);
        assert_eq!(config.thread_name_prefix, "poly");
    }
}
