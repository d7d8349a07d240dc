//! Parallel dispatch and join tests.
//!
//! Skipped at runtime via skip_without_cc! when no C compiler is available.

use elemjit::native::dispatch;
use elemjit::prelude::*;
use elemjit::{is_compiler_available, DispatchError};
use tempfile::TempDir;

fn cc_is_available() -> bool {
    is_compiler_available(BuildConfig::from_env().compiler())
}

macro_rules! skip_without_cc {
    () => {
        if !cc_is_available() {
            eprintln!("Skipping test: C compiler not available");
            return;
        }
    };
}

fn jit_in(dir: &TempDir) -> ElemJit {
    ElemJit::with_config(
        BuildConfig::from_env().with_work_dir(dir.path()),
        DispatchConfig::default(),
    )
}

/// `index * 3 + 1` for every element, so any missed or repeated index shows.
fn affine_kernel(jit: &ElemJit) -> CompiledKernel {
    jit.make_function(&KernelRequest::new("return x*3+1;", [("int", "x")], "int"))
        .unwrap()
}

fn ramp_bundle(len: usize) -> ArgumentBundle {
    let xs: Vec<i32> = (0..len as i32).collect();
    ArgumentBundle::builder()
        .input(StridedBuffer::from_slice(&xs))
        .result(StridedBuffer::zeroed(ElementKind::Int, len))
        .build()
        .unwrap()
}

fn expected(len: usize) -> Vec<i32> {
    (0..len as i32).map(|x| x * 3 + 1).collect()
}

#[test]
fn test_dispatch_add_two_threads_chunked() {
    skip_without_cc!();
    let dir = TempDir::new().unwrap();
    let jit = jit_in(&dir);

    let kernel = jit
        .make_function(&KernelRequest::new(
            "return a+b;",
            [("double", "a"), ("double", "b")],
            "double",
        ))
        .unwrap();

    let bundle = ArgumentBundle::builder()
        .input(StridedBuffer::from_slice(&[1.0f64, 2.0, 3.0, 4.0]))
        .input(StridedBuffer::from_slice(&[10.0f64, 20.0, 30.0, 40.0]))
        .result(StridedBuffer::zeroed(ElementKind::Double, 4))
        .build()
        .unwrap();

    let token = jit.dispatch(&kernel, bundle, 0, 4, 2, PartitionMode::MODE_CHUNK);
    assert!(!token.is_failed());

    let bundle = jit.join(token).unwrap();
    assert_eq!(
        bundle.result().to_vec::<f64>().unwrap(),
        vec![11.0, 22.0, 33.0, 44.0]
    );
}

#[test]
fn test_modes_agree_for_every_thread_count() {
    skip_without_cc!();
    let dir = TempDir::new().unwrap();
    let jit = jit_in(&dir);
    let kernel = affine_kernel(&jit);

    let len = 37;
    for threads in 1..=len as i64 {
        for mode in [PartitionMode::MODE_STRIDE, PartitionMode::MODE_CHUNK] {
            let token = jit.dispatch(&kernel, ramp_bundle(len), 0, len as i32, threads, mode);
            let bundle = jit.join(token).unwrap();
            assert_eq!(
                bundle.result().to_vec::<i32>().unwrap(),
                expected(len),
                "threads={threads} mode={mode}"
            );
        }
    }
}

#[test]
fn test_more_threads_than_elements() {
    skip_without_cc!();
    let dir = TempDir::new().unwrap();
    let jit = jit_in(&dir);
    let kernel = affine_kernel(&jit);

    for mode in [PartitionMode::MODE_STRIDE, PartitionMode::MODE_CHUNK] {
        let token = jit.dispatch(&kernel, ramp_bundle(3), 0, 3, 8, mode);
        let bundle = jit.join(token).unwrap();
        assert_eq!(bundle.result().to_vec::<i32>().unwrap(), expected(3));
    }
}

#[test]
fn test_sub_range_dispatch() {
    skip_without_cc!();
    let dir = TempDir::new().unwrap();
    let jit = jit_in(&dir);
    let kernel = affine_kernel(&jit);

    let token = jit.dispatch(&kernel, ramp_bundle(10), 3, 8, 3, PartitionMode::MODE_STRIDE);
    let out = jit.join(token).unwrap().result().to_vec::<i32>().unwrap();

    for (i, v) in out.iter().enumerate() {
        if (3..8).contains(&i) {
            assert_eq!(*v, i as i32 * 3 + 1);
        } else {
            assert_eq!(*v, 0);
        }
    }
}

#[test]
fn test_parallel_matches_sequential_in_place() {
    skip_without_cc!();
    let dir = TempDir::new().unwrap();
    let jit = jit_in(&dir);

    let kernel = jit
        .make_function(&KernelRequest::new(
            "return 10*x*x*x*x*x+4*x*x*x*x+x*x*x-20*x*x+3;",
            [("double", "x")],
            "double",
        ))
        .unwrap();

    let xs: Vec<f64> = (0..10_000).map(|i| i as f64 * 1e-3).collect();
    let in_place = || {
        ArgumentBundle::builder()
            .input(StridedBuffer::from_slice(&xs))
            .result_in_place(0)
            .build()
            .unwrap()
    };

    let sequential = jit
        .call(&kernel, in_place(), 0, xs.len() as i32)
        .unwrap()
        .into_result()
        .to_vec::<f64>()
        .unwrap();

    for (threads, mode) in [(1, 1), (2, 1), (2, 2), (4, 2)] {
        let token = jit.dispatch(&kernel, in_place(), 0, xs.len() as i32, threads, mode);
        let parallel = jit.join(token).unwrap().into_result().to_vec::<f64>().unwrap();
        assert_eq!(parallel, sequential, "threads={threads} mode={mode}");
    }
}

#[test]
fn test_outstanding_dispatches_join_in_any_order() {
    skip_without_cc!();
    let dir = TempDir::new().unwrap();
    let jit = jit_in(&dir);
    let kernel = affine_kernel(&jit);

    let tokens: Vec<_> = (0..4)
        .map(|i| jit.dispatch(&kernel, ramp_bundle(100 + i), 0, 100 + i as i32, 2, 1))
        .collect();
    assert_eq!(jit.dispatcher().pending(), 4);

    for (i, token) in tokens.into_iter().enumerate().rev() {
        let bundle = jit.join(token).unwrap();
        assert_eq!(bundle.result().to_vec::<i32>().unwrap(), expected(100 + i));
    }
    assert_eq!(jit.dispatcher().pending(), 0);
}

#[test]
fn test_double_join_is_rejected() {
    skip_without_cc!();
    let dir = TempDir::new().unwrap();
    let jit = jit_in(&dir);
    let kernel = affine_kernel(&jit);

    let token = jit.dispatch(&kernel, ramp_bundle(8), 0, 8, 2, 1);
    jit.join(token).unwrap();

    let err = jit.join(token).unwrap_err();
    assert!(matches!(
        err,
        Error::Dispatch(DispatchError::InvalidToken(t)) if t == token.as_raw()
    ));
}

#[test]
fn test_rejected_dispatch_returns_failed_token() {
    skip_without_cc!();
    let dir = TempDir::new().unwrap();
    let jit = jit_in(&dir);
    let kernel = affine_kernel(&jit);

    // Unknown mode, zero threads, negative threads, range past the end.
    let cases: [(i32, i32, i64, i64); 4] = [(0, 8, 2, 3), (0, 8, 0, 1), (0, 8, -2, 1), (0, 9, 2, 1)];
    for (start, end, threads, mode) in cases {
        let token = jit.dispatch(&kernel, ramp_bundle(8), start, end, threads, mode);
        assert_eq!(token, CompletionToken::FAILED);
        assert!(matches!(
            jit.join(token),
            Err(Error::Dispatch(DispatchError::InvalidToken(-1)))
        ));
    }
    assert_eq!(jit.dispatcher().pending(), 0);
}

#[test]
fn test_start_error_hands_bundle_back() {
    skip_without_cc!();
    let dir = TempDir::new().unwrap();
    let jit = jit_in(&dir);
    let kernel = affine_kernel(&jit);

    let err = dispatch(
        &kernel,
        ramp_bundle(4),
        0,
        4,
        0,
        PartitionMode::Chunked,
        &DispatchConfig::default(),
    )
    .unwrap_err();

    assert!(matches!(
        err.error(),
        DispatchError::Validation(CoreError::InvalidThreadCount(0))
    ));
    let bundle = err.into_bundle().unwrap();
    assert_eq!(bundle.input(0).unwrap().to_vec::<i32>().unwrap(), vec![0, 1, 2, 3]);
}

#[test]
fn test_dispatch_without_inline_partition() {
    skip_without_cc!();
    let dir = TempDir::new().unwrap();
    let jit = ElemJit::with_config(
        BuildConfig::from_env().with_work_dir(dir.path()),
        DispatchConfig::default()
            .with_inline_last_partition(false)
            .with_thread_name_prefix("affine"),
    );
    let kernel = affine_kernel(&jit);

    let handle = dispatch(
        &kernel,
        ramp_bundle(64),
        0,
        64,
        4,
        PartitionMode::Interleaved,
        jit.dispatcher().config(),
    )
    .unwrap();
    assert_eq!(handle.threads(), 4);
    assert_eq!(handle.kernel_id(), kernel.id());

    let bundle = handle.join().unwrap();
    assert_eq!(bundle.result().to_vec::<i32>().unwrap(), expected(64));
}
