//! `elemjit run` command - Build a kernel and time sequential and parallel runs.
//!
//! Every input is filled from the kernel file's ramp. The sequential result
//! is the reference; each parallel run must agree with it (exactly for
//! `int`, within a small tolerance for `double`).

use std::num::NonZeroUsize;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use colored::Colorize;
use elemjit::{ArgumentBundle, ElemJit, ElementKind, PartitionMode, StridedBuffer};

use crate::error::{CliError, CliResult};

use super::{load_kernel_file, Ramp};

/// Execute the `run` command.
pub fn execute(
    file: &Path,
    len: usize,
    threads: Option<usize>,
    mode: Option<PartitionMode>,
    in_place: bool,
) -> CliResult<()> {
    let end = i32::try_from(len)
        .map_err(|_| CliError::Unsupported(format!("length {} does not fit a C int", len)))?;
    let threads = threads.unwrap_or_else(|| {
        thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1)
    });

    let kernel_file = load_kernel_file(file)?;
    let jit = ElemJit::from_env();
    tracing::debug!(
        compiler = %jit.pipeline().config().compiler().display(),
        len,
        threads,
        "Preparing timed runs"
    );

    let started = Instant::now();
    let mut kernel = jit.make_function(&kernel_file.request)?;
    let creation = started.elapsed();

    let shape = kernel.shape().clone();
    if in_place && shape.params.first() != Some(&shape.result) {
        return Err(CliError::Unsupported(
            "in-place evaluation needs the first input to have the result type".to_string(),
        ));
    }

    let make_bundle = || -> CliResult<ArgumentBundle> {
        let mut builder = ArgumentBundle::builder();
        for &kind in &shape.params {
            builder = builder.input(fill(kind, len, kernel_file.ramp)?);
        }
        builder = if in_place {
            builder.result_in_place(0)
        } else {
            builder.result(StridedBuffer::zeroed(shape.result, len))
        };
        Ok(builder.build()?)
    };

    println!(
        "{} {}: {} input(s) -> {}, {} elements",
        "→".bright_cyan(),
        file.display().to_string().bright_white(),
        shape.params.len(),
        shape.result.to_string().bright_yellow(),
        len
    );
    report("creation", creation);

    let bundle = make_bundle()?;
    let started = Instant::now();
    let bundle = jit.call(&kernel, bundle, 0, end)?;
    report("single-thread", started.elapsed());
    let reference = Values::read(bundle.result())?;

    let mut runs = vec![(1, PartitionMode::Interleaved)];
    match mode {
        Some(mode) => runs.push((threads, mode)),
        None => {
            runs.push((threads, PartitionMode::Interleaved));
            runs.push((threads, PartitionMode::Chunked));
        }
    }

    for (threads, mode) in runs {
        let bundle = make_bundle()?;
        let started = Instant::now();
        let token = jit.dispatch(&kernel, bundle, 0, end, threads as i64, mode.as_raw());
        let bundle = jit.join(token)?;
        let elapsed = started.elapsed();

        let label = format!(
            "{} thread{} ({})",
            threads,
            if threads == 1 { "" } else { "s" },
            mode
        );
        report(&label, elapsed);

        let values = Values::read(bundle.result())?;
        if let Some(i) = values.first_difference(&reference) {
            return Err(CliError::Mismatch(format!(
                "{} differs from the single-thread run at index {}",
                label, i
            )));
        }
    }

    kernel.close()?;
    println!("{} All runs agree", "✓".bright_green());
    Ok(())
}

fn report(label: &str, elapsed: Duration) {
    println!(
        "  {} {:<24} {}",
        "•".dimmed(),
        label,
        format!("{:.3} ms", elapsed.as_secs_f64() * 1e3).bright_white()
    );
}

/// Buffer of `len` elements following `ramp`.
fn fill(kind: ElementKind, len: usize, ramp: Ramp) -> CliResult<StridedBuffer> {
    match kind {
        ElementKind::Int => {
            let values: Vec<i32> = (0..len).map(|i| ramp.at(i) as i32).collect();
            Ok(StridedBuffer::from_slice(&values))
        }
        ElementKind::Double => {
            let values: Vec<f64> = (0..len).map(|i| ramp.at(i)).collect();
            Ok(StridedBuffer::from_slice(&values))
        }
        ElementKind::CString => Err(CliError::Unsupported(
            "char* inputs cannot be generated from a ramp".to_string(),
        )),
    }
}

/// Result values read back for comparison.
#[derive(Debug, Clone, PartialEq)]
enum Values {
    Int(Vec<i32>),
    Double(Vec<f64>),
}

impl Values {
    fn read(buffer: &StridedBuffer) -> CliResult<Self> {
        match buffer.kind() {
            ElementKind::Int => Ok(Values::Int(buffer.to_vec()?)),
            ElementKind::Double => Ok(Values::Double(buffer.to_vec()?)),
            ElementKind::CString => Err(CliError::Unsupported(
                "char* results cannot be compared".to_string(),
            )),
        }
    }

    /// First index where `self` and `other` disagree.
    fn first_difference(&self, other: &Values) -> Option<usize> {
        match (self, other) {
            (Values::Int(a), Values::Int(b)) => {
                if a.len() != b.len() {
                    return Some(a.len().min(b.len()));
                }
                a.iter().zip(b).position(|(x, y)| x != y)
            }
            (Values::Double(a), Values::Double(b)) => {
                if a.len() != b.len() {
                    return Some(a.len().min(b.len()));
                }
                a.iter().zip(b).position(|(x, y)| !close(*x, *y))
            }
            _ => Some(0),
        }
    }
}

fn close(a: f64, b: f64) -> bool {
    if a.is_nan() || b.is_nan() {
        return a.is_nan() && b.is_nan();
    }
    a == b || (a - b).abs() <= 1e-8 + 1e-5 * b.abs()
}
