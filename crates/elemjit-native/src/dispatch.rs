//! Threaded dispatch of a compiled kernel.
//!
//! A dispatch takes ownership of the argument bundle and starts a named
//! dispatcher thread. The dispatcher splits the range with a
//! [`PartitionPlan`], starts one scoped worker per partition except the
//! last, runs the last partition itself and waits for the workers. The
//! bundle comes back from [`DispatchHandle::join`].
//!
//! ```ignore
//! let handle = dispatch(&kernel, bundle, 0, len, 4, PartitionMode::Chunked, &config)?;
//! // ... other work ...
//! let bundle = handle.join()?;
//! ```

use std::ffi::c_void;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use elemjit_core::{ArgumentBundle, Partition, PartitionMode, PartitionPlan};

use crate::config::DispatchConfig;
use crate::error::{DispatchError, DispatchStartError};
use crate::kernel::{CompiledKernel, LoadedLibrary, StepperFn};

/// Slot table pointer shared by the workers of one dispatch.
#[derive(Clone, Copy)]
struct RawBundle(*mut c_void);

// SAFETY: workers only touch disjoint result indices, and the bundle
// outlives the scope they run in.
unsafe impl Send for RawBundle {}

struct DispatchState {
    library: Arc<LoadedLibrary>,
    bundle: Arc<ArgumentBundle>,
    plan: PartitionPlan,
}

/// An in-flight dispatch.
#[derive(Debug)]
pub struct DispatchHandle {
    thread: JoinHandle<DispatchState>,
    kernel_id: u64,
    threads: usize,
    mode: PartitionMode,
}

impl DispatchHandle {
    /// Id of the kernel being run.
    pub fn kernel_id(&self) -> u64 {
        self.kernel_id
    }

    /// Number of partitions.
    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Partition mode.
    pub fn mode(&self) -> PartitionMode {
        self.mode
    }

    /// Whether every partition has completed.
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Block until every partition has completed and take the bundle back.
    pub fn join(self) -> Result<ArgumentBundle, DispatchError> {
        let state = self.thread.join().map_err(|_| DispatchError::Panicked)?;
        let DispatchState {
            library, bundle, ..
        } = state;
        drop(library);
        Arc::try_unwrap(bundle).map_err(|_| DispatchError::StillShared)
    }
}

/// Start a parallel run of `kernel` over `[start, end)`.
///
/// The bundle, range, thread count and mode are all checked before any
/// thread starts. On failure the bundle is handed back inside the error.
pub fn dispatch(
    kernel: &CompiledKernel,
    bundle: ArgumentBundle,
    start: i32,
    end: i32,
    thread_count: usize,
    mode: PartitionMode,
    config: &DispatchConfig,
) -> Result<DispatchHandle, DispatchStartError> {
    let Some(library) = kernel.library().cloned() else {
        return Err(DispatchStartError::new(DispatchError::Closed, bundle));
    };

    if let Err(e) = bundle.validate(kernel.shape(), start, end) {
        return Err(DispatchStartError::new(e.into(), bundle));
    }

    let plan = match PartitionPlan::new(start, end, thread_count, mode) {
        Ok(plan) => plan,
        Err(e) => return Err(DispatchStartError::new(e.into(), bundle)),
    };

    let bundle = Arc::new(bundle);
    let retained = Arc::clone(&bundle);
    let state = DispatchState {
        library,
        bundle,
        plan,
    };

    let worker_config = config.clone();
    let spawned = thread::Builder::new()
        .name(format!(
            "{}-dispatch-{}",
            config.thread_name_prefix,
            kernel.id()
        ))
        .spawn(move || run_dispatch(state, &worker_config));

    match spawned {
        Ok(thread) => {
            drop(retained);
            tracing::debug!(
                kernel_id = kernel.id(),
                start,
                end,
                threads = thread_count,
                mode = %mode,
                "Dispatch started"
            );
            Ok(DispatchHandle {
                thread,
                kernel_id: kernel.id(),
                threads: thread_count,
                mode,
            })
        }
        Err(e) => {
            tracing::warn!(kernel_id = kernel.id(), error = %e, "Failed to start dispatcher thread");
            // The rejected closure has been dropped with its state.
            match Arc::try_unwrap(retained) {
                Ok(bundle) => Err(DispatchStartError::new(DispatchError::Spawn(e), bundle)),
                Err(_) => Err(DispatchStartError::without_bundle(DispatchError::Spawn(e))),
            }
        }
    }
}

fn run_dispatch(state: DispatchState, config: &DispatchConfig) -> DispatchState {
    let stepper = state.library.stepper();
    let raw = RawBundle(state.bundle.as_raw());
    let started = Instant::now();

    let (inline, spawned): (Option<&Partition>, &[Partition]) = if config.inline_last_partition {
        match state.plan.split_last() {
            Some((last, rest)) => (Some(last), rest),
            None => (None, &[]),
        }
    } else {
        (None, state.plan.partitions())
    };

    thread::scope(|scope| {
        let mut fallback = Vec::new();

        for (i, &part) in spawned.iter().enumerate() {
            let worker = thread::Builder::new().name(format!("{}-worker-{}", config.thread_name_prefix, i));
            if let Err(e) = worker.spawn_scoped(scope, move || run_partition(stepper, raw, part)) {
                tracing::warn!(worker = i, error = %e, "Worker spawn failed, running partition inline");
                fallback.push(part);
            }
        }

        if let Some(&part) = inline {
            run_partition(stepper, raw, part);
        }
        for part in fallback {
            run_partition(stepper, raw, part);
        }
    });

    tracing::trace!(
        partitions = state.plan.len(),
        elapsed_us = started.elapsed().as_micros() as u64,
        "Dispatch finished"
    );

    state
}

fn run_partition(stepper: StepperFn, raw: RawBundle, part: Partition) {
    if part.start >= part.end {
        return;
    }
    // SAFETY: the bundle was validated against the kernel shape and range,
    // and partitions of one plan never share an index.
    unsafe {
        stepper(raw.0, part.start, part.end, part.step);
    }
}
