//! Kernel signatures and build requests.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::registry::{ElementKind, TypeDescriptor, TypeRegistry};

/// How the stepper maps buffers to kernel arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GenerationMode {
    /// Elementwise map over a bundle of N input arrays into one result array.
    #[default]
    TupleOfArrays,
}

impl GenerationMode {
    /// Raw flag of [`GenerationMode::TupleOfArrays`].
    pub const TUPLE_OF_ARRAYS: i64 = 1;

    /// Parse a raw mode flag.
    pub fn from_raw(raw: i64) -> Result<Self> {
        match raw {
            Self::TUPLE_OF_ARRAYS => Ok(GenerationMode::TupleOfArrays),
            other => Err(CoreError::UnsupportedGenerationMode(other)),
        }
    }

    /// Raw mode flag.
    pub fn as_raw(&self) -> i64 {
        match self {
            GenerationMode::TupleOfArrays => Self::TUPLE_OF_ARRAYS,
        }
    }
}

/// One kernel parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelParam {
    /// Resolved parameter type.
    pub ty: &'static TypeDescriptor,
    /// Parameter name as used in the body.
    pub name: String,
}

/// Element kinds a compiled kernel expects, used to validate bundles.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KernelShape {
    /// Input kinds in slot order.
    pub params: Vec<ElementKind>,
    /// Result kind.
    pub result: ElementKind,
}

/// A resolved scalar kernel: typed parameters, result type and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelSignature {
    params: Vec<KernelParam>,
    result: &'static TypeDescriptor,
    body: String,
}

impl KernelSignature {
    /// Resolve `(type, name)` pairs and the result type against the registry.
    ///
    /// The body is kept verbatim; it is trusted C source.
    pub fn new<I, T, N>(args: I, result: &str, body: impl Into<String>) -> Result<Self>
    where
        I: IntoIterator<Item = (T, N)>,
        T: AsRef<str>,
        N: Into<String>,
    {
        let params = args
            .into_iter()
            .map(|(ty, name)| {
                Ok(KernelParam {
                    ty: TypeRegistry::lookup(ty.as_ref())?,
                    name: name.into(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        if params.is_empty() {
            return Err(CoreError::EmptySignature);
        }

        Ok(Self {
            params,
            result: TypeRegistry::lookup(result)?,
            body: body.into(),
        })
    }

    /// Parameters in declaration order.
    pub fn params(&self) -> &[KernelParam] {
        &self.params
    }

    /// Result type.
    pub fn result(&self) -> &'static TypeDescriptor {
        self.result
    }

    /// Kernel body.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Number of inputs.
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Element kinds for bundle validation.
    pub fn shape(&self) -> KernelShape {
        KernelShape {
            params: self.params.iter().map(|p| p.ty.kind).collect(),
            result: self.result.kind,
        }
    }
}

fn default_mode() -> i64 {
    GenerationMode::TUPLE_OF_ARRAYS
}

/// Unresolved build request, as received from a host or read from a file.
///
/// ```toml
/// mode = 1
/// body = "return a+b;"
/// args = [["double", "a"], ["double", "b"]]
/// result = "double"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelRequest {
    /// Raw generation mode flag.
    #[serde(default = "default_mode")]
    pub mode: i64,
    /// Kernel body.
    pub body: String,
    /// `(type, name)` pairs.
    pub args: Vec<(String, String)>,
    /// Result type name.
    pub result: String,
}

impl KernelRequest {
    /// Request in the default generation mode.
    pub fn new<I, T, N>(body: impl Into<String>, args: I, result: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = (T, N)>,
        T: Into<String>,
        N: Into<String>,
    {
        Self {
            mode: default_mode(),
            body: body.into(),
            args: args
                .into_iter()
                .map(|(t, n)| (t.into(), n.into()))
                .collect(),
            result: result.into(),
        }
    }

    /// Parsed generation mode.
    pub fn generation_mode(&self) -> Result<GenerationMode> {
        GenerationMode::from_raw(self.mode)
    }

    /// Resolve into a signature.
    pub fn signature(&self) -> Result<KernelSignature> {
        KernelSignature::new(
            self.args.iter().map(|(t, n)| (t.as_str(), n.clone())),
            &self.result,
            self.body.clone(),
        )
    }
}
