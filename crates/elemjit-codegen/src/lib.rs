//! C code generation for elemjit kernels.
//!
//! A generated translation unit has two functions:
//!
//! - `f` - the caller's scalar kernel, body pasted verbatim
//! - `g` - the stepper, which walks `[a, b)` in steps of `k` and applies `f`
//!   to one element of every input array, storing into the result array
//!
//! # Example
//!
//! ```ignore
//! use elemjit_codegen::generate_source;
//! use elemjit_core::{GenerationMode, KernelSignature};
//!
//! let sig = KernelSignature::new(
//!     [("double", "a"), ("double", "b")],
//!     "double",
//!     "return a+b;",
//! )?;
//!
//! let c_code = generate_source(&sig, GenerationMode::TupleOfArrays)?;
//! assert!(c_code.contains("void* g(void* t,int a,int b,int k)"));
//! ```
//!
//! The stepper reads the argument bundle at fixed byte offsets taken from
//! [`elemjit_core::host::layout`].

mod scalar;
mod stepper;

pub use scalar::generate_scalar_kernel;
pub use stepper::StepperGenerator;

use elemjit_core::{CoreError, GenerationMode, KernelRequest, KernelSignature};
use thiserror::Error;

/// Name of the generated stepper symbol.
pub const STEPPER_SYMBOL: &str = "g";

/// Name of the generated scalar kernel.
pub const SCALAR_SYMBOL: &str = "f";

/// Errors that can occur during code generation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodegenError {
    /// Type lookup or signature resolution failed.
    #[error("Type error: {0}")]
    Type(#[from] CoreError),

    /// Output could not be assembled.
    #[error("Generation error: {0}")]
    Generation(String),
}

impl From<std::fmt::Error> for CodegenError {
    fn from(e: std::fmt::Error) -> Self {
        CodegenError::Generation(e.to_string())
    }
}

/// Result type for code generation.
pub type Result<T> = std::result::Result<T, CodegenError>;

/// Generate the full translation unit for a resolved signature.
pub fn generate_source(signature: &KernelSignature, mode: GenerationMode) -> Result<String> {
    let mut out = String::from("#include <stdint.h>\n");
    out.push_str(&generate_scalar_kernel(signature)?);
    out.push('\n');

    match mode {
        GenerationMode::TupleOfArrays => {
            out.push_str(&StepperGenerator::new(signature).generate()?);
        }
    }

    Ok(out)
}

/// Resolve a raw request and generate its translation unit.
pub fn generate_from_request(request: &KernelRequest) -> Result<String> {
    let mode = request.generation_mode()?;
    let signature = request.signature()?;
    generate_source(&signature, mode)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_kernel_source() {
        let sig = KernelSignature::new(
            [("double", "a"), ("double", "b")],
            "double",
            "return a+b;",
        )
        .unwrap();

        let code = generate_source(&sig, GenerationMode::TupleOfArrays).unwrap();

        assert!(code.starts_with("#include <stdint.h>\n"));
        assert!(code.contains("static double f(double a,double b){return a+b;}"));
        assert!(code.contains("void* g(void* t,int a,int b,int k){"));
        assert!(code.contains("for(p=a;p<b;p+=k){"));
        assert!(code.contains("double m=f(*(double*)(d0+p*s0),*(double*)(d1+p*s1));"));
        assert!(code.contains("*(double*)(d+p*s)=m;"));
        assert!(code.trim_end().ends_with('}'));
    }

    #[test]
    fn test_request_with_unknown_type() {
        let req = KernelRequest::new("return x;", [("float", "x")], "double");
        assert_eq!(
            generate_from_request(&req),
            Err(CodegenError::Type(CoreError::UnknownType("float".to_string())))
        );
    }

    #[test]
    fn test_request_with_unknown_mode() {
        let mut req = KernelRequest::new("return x;", [("double", "x")], "double");
        req.mode = 7;
        assert_eq!(
            generate_from_request(&req),
            Err(CodegenError::Type(CoreError::UnsupportedGenerationMode(7)))
        );
    }

    #[test]
    fn test_mixed_types() {
        let req = KernelRequest::new(
            "return real > im ? 1 : 0;",
            [("double", "real"), ("double", "im")],
            "int",
        );
        let code = generate_from_request(&req).unwrap();

        assert!(code.contains("static int f(double real,double im)"));
        assert!(code.contains("int m=f("));
        assert!(code.contains("*(int*)(d+p*s)=m;"));
    }
}
