//! CLI command implementations.

pub mod codegen;
pub mod run;
pub mod types;

use std::fs;
use std::path::Path;

use elemjit::KernelRequest;
use serde::Deserialize;

use crate::error::CliResult;

/// A kernel description file: a build request plus input generation.
#[derive(Debug, Clone, Deserialize)]
pub struct KernelFile {
    /// The build request.
    #[serde(flatten)]
    pub request: KernelRequest,

    /// Values fed to every input by `run`.
    #[serde(default)]
    pub ramp: Ramp,
}

/// Linear input values: `start + i * step`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Ramp {
    /// Value at index 0.
    #[serde(default)]
    pub start: f64,
    /// Increment per index.
    #[serde(default = "default_step")]
    pub step: f64,
}

impl Default for Ramp {
    fn default() -> Self {
        Self {
            start: 0.0,
            step: default_step(),
        }
    }
}

fn default_step() -> f64 {
    1.0
}

impl Ramp {
    /// Value at index `i`.
    pub fn at(&self, i: usize) -> f64 {
        self.start + i as f64 * self.step
    }
}

/// Parse a kernel description.
pub fn parse_kernel_file(content: &str) -> CliResult<KernelFile> {
    Ok(toml::from_str(content)?)
}

/// Read and parse a kernel description.
pub fn load_kernel_file(path: &Path) -> CliResult<KernelFile> {
    let content = fs::read_to_string(path)?;
    parse_kernel_file(&content)
}
