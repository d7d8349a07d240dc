//! `elemjit codegen` command - Print the generated C source for a kernel.

use std::fs;
use std::path::Path;

use colored::Colorize;
use elemjit::codegen::generate_from_request;

use crate::error::CliResult;

use super::load_kernel_file;

/// Execute the `codegen` command.
pub fn execute(file: &Path, output: Option<&Path>) -> CliResult<()> {
    let kernel = load_kernel_file(file)?;
    let source = generate_from_request(&kernel.request)?;

    match output {
        Some(path) => {
            fs::write(path, &source)?;
            eprintln!(
                "{} Wrote {} ({} bytes)",
                "✓".bright_green(),
                path.display().to_string().bright_white(),
                source.len()
            );
        }
        None => print!("{}", source),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codegen_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let kernel = dir.path().join("add.toml");
        let out = dir.path().join("add.c");
        fs::write(
            &kernel,
            "body = \"return a+b;\"\nargs = [[\"int\", \"a\"], [\"int\", \"b\"]]\nresult = \"int\"\n",
        )
        .unwrap();

        execute(&kernel, Some(&out)).unwrap();

        let source = fs::read_to_string(&out).unwrap();
        assert!(source.contains("static int f(int a,int b){return a+b;}"));
        assert!(source.contains("void* g(void* t,int a,int b,int k){"));
    }

    #[test]
    fn test_codegen_unknown_type() {
        let dir = tempfile::tempdir().unwrap();
        let kernel = dir.path().join("bad.toml");
        fs::write(
            &kernel,
            "body = \"return x;\"\nargs = [[\"float\", \"x\"]]\nresult = \"int\"\n",
        )
        .unwrap();

        let err = execute(&kernel, None).unwrap_err();
        assert!(err.to_string().contains("float"));
    }
}
