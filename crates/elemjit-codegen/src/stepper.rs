//! Stepper emission for the tuple-of-arrays mode.
//!
//! The stepper has the fixed C signature `void* g(void* t,int a,int b,int k)`:
//! `t` is the bundle slot table, `[a, b)` the index range and `k` the index
//! increment. Inputs live in slots `0..n`, the result in slot `n`.

use std::fmt::Write;

use elemjit_core::host::layout::{bundle_slot_offset, ARRAY_DATA_OFFSET, ARRAY_STRIDES_OFFSET};
use elemjit_core::KernelSignature;

use crate::{Result, SCALAR_SYMBOL, STEPPER_SYMBOL};

/// Generates the stepper for one signature.
#[derive(Debug, Clone, Copy)]
pub struct StepperGenerator<'a> {
    signature: &'a KernelSignature,
}

impl<'a> StepperGenerator<'a> {
    /// Create a generator for `signature`.
    pub fn new(signature: &'a KernelSignature) -> Self {
        Self { signature }
    }

    /// Emit the stepper function.
    pub fn generate(&self) -> Result<String> {
        let n = self.signature.arity();
        let mut out = String::new();

        writeln!(out, "void* {}(void* t,int a,int b,int k){{", STEPPER_SYMBOL)?;

        // Array object pointers from the bundle table.
        writeln!(out, "char* o=*(char**)((char*)t+{});", bundle_slot_offset(n))?;
        for i in 0..n {
            writeln!(out, "char* o{i}=*(char**)((char*)t+{});", bundle_slot_offset(i))?;
        }

        // Data pointers.
        writeln!(out, "char* d=*(char**)(o+{});", ARRAY_DATA_OFFSET)?;
        for i in 0..n {
            writeln!(out, "char* d{i}=*(char**)(o{i}+{});", ARRAY_DATA_OFFSET)?;
        }

        // First-axis byte strides.
        writeln!(out, "intptr_t s=**(intptr_t**)(o+{});", ARRAY_STRIDES_OFFSET)?;
        for i in 0..n {
            writeln!(out, "intptr_t s{i}=**(intptr_t**)(o{i}+{});", ARRAY_STRIDES_OFFSET)?;
        }

        out.push_str("int p;\nfor(p=a;p<b;p+=k){\n");

        let result = self.signature.result().name;
        write!(out, "{} m={}(", result, SCALAR_SYMBOL)?;
        for (i, param) in self.signature.params().iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            write!(out, "*({}*)(d{i}+p*s{i})", param.ty.name)?;
        }
        out.push_str(");\n");
        writeln!(out, "*({}*)(d+p*s)=m;", result)?;

        out.push_str("}\nreturn t;\n}\n");
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(code: &str) -> Vec<&str> {
        code.lines().collect()
    }

    #[test]
    fn test_offsets_come_from_layout() {
        let sig = KernelSignature::new(
            [("double", "real"), ("double", "im")],
            "int",
            "return 0;",
        )
        .unwrap();
        let code = StepperGenerator::new(&sig).generate().unwrap();
        let l = lines(&code);

        assert_eq!(l[0], "void* g(void* t,int a,int b,int k){");
        assert_eq!(
            l[1],
            format!("char* o=*(char**)((char*)t+{});", bundle_slot_offset(2))
        );
        assert_eq!(l[2], "char* o0=*(char**)((char*)t+0);");
        assert_eq!(
            l[3],
            format!("char* o1=*(char**)((char*)t+{});", bundle_slot_offset(1))
        );
        assert_eq!(
            l[4],
            format!("char* d=*(char**)(o+{});", ARRAY_DATA_OFFSET)
        );
        assert_eq!(
            l[7],
            format!("intptr_t s=**(intptr_t**)(o+{});", ARRAY_STRIDES_OFFSET)
        );
    }

    #[test]
    fn test_loop_body() {
        let sig = KernelSignature::new(
            [("double", "real"), ("double", "im")],
            "int",
            "return 0;",
        )
        .unwrap();
        let code = StepperGenerator::new(&sig).generate().unwrap();

        assert!(code.contains("int p;\nfor(p=a;p<b;p+=k){\n"));
        assert!(code.contains("int m=f(*(double*)(d0+p*s0),*(double*)(d1+p*s1));\n"));
        assert!(code.contains("*(int*)(d+p*s)=m;\n"));
        assert!(code.ends_with("}\nreturn t;\n}\n"));
    }

    #[test]
    fn test_many_inputs() {
        let args: Vec<(&str, String)> = (0..12).map(|i| ("int", format!("x{i}"))).collect();
        let sig = KernelSignature::new(args, "int", "return x0;").unwrap();
        let code = StepperGenerator::new(&sig).generate().unwrap();

        assert!(code.contains("char* o11="));
        assert!(code.contains("*(int*)(d11+p*s11)"));
        assert!(code.contains(&format!(
            "char* o=*(char**)((char*)t+{});",
            bundle_slot_offset(12)
        )));
    }
}
