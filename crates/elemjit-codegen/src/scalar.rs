//! Scalar kernel emission.

use std::fmt::Write;

use elemjit_core::KernelSignature;

use crate::{Result, SCALAR_SYMBOL};

/// Emit `static R f(T0 p0,...){BODY}`.
///
/// The body is pasted as-is. It is trusted C source and is neither parsed
/// nor escaped.
pub fn generate_scalar_kernel(signature: &KernelSignature) -> Result<String> {
    let mut out = String::new();
    write!(out, "static {} {}(", signature.result().name, SCALAR_SYMBOL)?;

    for (i, param) in signature.params().iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        write!(out, "{} {}", param.ty.name, param.name)?;
    }

    write!(out, "){{{}}}", signature.body())?;
    Ok(out)
}
