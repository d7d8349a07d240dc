//! Kernel lifetime: closing, concurrent builds, build directories.

use std::sync::Arc;
use std::thread;

use elemjit::prelude::*;
use elemjit::{is_compiler_available, BuildError, BuildPipeline, DispatchError, InvokeError};
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

fn negate_request() -> KernelRequest {
    KernelRequest::new("return -x;", [("int", "x")], "int")
}

fn bundle(values: &[i32]) -> ArgumentBundle {
    ArgumentBundle::builder()
        .input(StridedBuffer::from_slice(values))
        .result(StridedBuffer::zeroed(ElementKind::Int, values.len()))
        .build()
        .unwrap()
}

#[test]
fn test_close_twice() {
    skip_without_cc!();
    let dir = TempDir::new().unwrap();
    let jit = ElemJit::with_config(
        BuildConfig::from_env().with_work_dir(dir.path()),
        DispatchConfig::default(),
    );

    let mut kernel = jit.make_function(&negate_request()).unwrap();
    assert!(!kernel.is_closed());

    kernel.close().unwrap();
    assert!(kernel.is_closed());
    assert!(matches!(kernel.close(), Err(BuildError::AlreadyClosed)));
}

#[test]
fn test_closed_kernel_rejects_work() {
    skip_without_cc!();
    let dir = TempDir::new().unwrap();
    let jit = ElemJit::with_config(
        BuildConfig::from_env().with_work_dir(dir.path()),
        DispatchConfig::default(),
    );

    let mut kernel = jit.make_function(&negate_request()).unwrap();
    kernel.close().unwrap();

    let mut b = bundle(&[1, 2]);
    assert_eq!(kernel.invoke(&mut b, 0, 2), Err(InvokeError::Closed));

    let token = jit.dispatch(&kernel, b, 0, 2, 2, 1);
    assert!(token.is_failed());
}

#[test]
fn test_close_during_dispatch_defers_unload() {
    skip_without_cc!();
    let dir = TempDir::new().unwrap();
    let jit = ElemJit::with_config(
        BuildConfig::from_env().with_work_dir(dir.path()),
        DispatchConfig::default(),
    );

    let mut kernel = jit.make_function(&negate_request()).unwrap();
    let values: Vec<i32> = (0..200_000).collect();

    let token = jit.dispatch(&kernel, bundle(&values), 0, values.len() as i32, 4, 2);
    kernel.close().unwrap();

    let out = jit.join(token).unwrap().into_result().to_vec::<i32>().unwrap();
    assert!(out.iter().zip(&values).all(|(o, v)| *o == -v));
}

#[test]
fn test_build_directory_removed_on_close() {
    skip_without_cc!();
    let dir = TempDir::new().unwrap();
    let jit = ElemJit::with_config(
        BuildConfig::from_env().with_work_dir(dir.path()),
        DispatchConfig::default(),
    );

    let mut kernel = jit.make_function(&negate_request()).unwrap();
    let build_dir = kernel.build_dir().unwrap().to_path_buf();
    assert!(build_dir.starts_with(dir.path()));
    assert!(kernel.artifact_path().exists());

    kernel.close().unwrap();
    assert!(kernel.build_dir().is_none());
    assert!(!build_dir.exists());
}

#[test]
fn test_keep_artifacts() {
    skip_without_cc!();
    let dir = TempDir::new().unwrap();
    let jit = ElemJit::with_config(
        BuildConfig::from_env()
            .with_work_dir(dir.path())
            .with_keep_artifacts(true),
        DispatchConfig::default(),
    );

    let mut kernel = jit.make_function(&negate_request()).unwrap();
    let artifact = kernel.artifact_path().to_path_buf();
    kernel.close().unwrap();

    assert!(artifact.exists());
    assert!(artifact.with_extension("c").exists());
}

#[test]
fn test_concurrent_builds() {
    skip_without_cc!();
    let dir = TempDir::new().unwrap();
    let jit = Arc::new(ElemJit::with_config(
        BuildConfig::from_env().with_work_dir(dir.path()),
        DispatchConfig::default(),
    ));

    let handles: Vec<_> = (0..8)
        .map(|k| {
            let jit = Arc::clone(&jit);
            thread::spawn(move || {
                let body = format!("return x+{k};");
                let kernel = jit
                    .make_function(&KernelRequest::new(body, [("int", "x")], "int"))
                    .unwrap();
                let b = jit.call(&kernel, bundle(&[1, 2, 3]), 0, 3).unwrap();
                (kernel.id(), b.result().to_vec::<i32>().unwrap())
            })
        })
        .collect();

    let mut ids = Vec::new();
    for (k, handle) in handles.into_iter().enumerate() {
        let (id, out) = handle.join().unwrap();
        let k = k as i32;
        assert_eq!(out, vec![1 + k, 2 + k, 3 + k]);
        ids.push(id);
    }

    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 8);
}

#[test]
fn test_dispatch_error_on_closed_kernel() {
    skip_without_cc!();
    let dir = TempDir::new().unwrap();
    let pipeline = BuildPipeline::new(BuildConfig::from_env().with_work_dir(dir.path()));

    let mut kernel = pipeline.build_request(&negate_request()).unwrap();
    kernel.close().unwrap();

    let err = elemjit::native::dispatch(
        &kernel,
        bundle(&[5]),
        0,
        1,
        1,
        PartitionMode::Interleaved,
        &DispatchConfig::default(),
    )
    .unwrap_err();

    assert!(matches!(err.error(), DispatchError::Closed));
    assert!(err.into_bundle().is_some());
}
