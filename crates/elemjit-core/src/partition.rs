//! Partition planning for parallel dispatch.
//!
//! A dispatch covers one flat range `[start, end)`. The planner splits it into
//! one [`Partition`] per worker so that every index is visited by exactly one
//! worker:
//!
//! ```text
//! Interleaved, t = 3          Chunked, t = 3
//! idx: 0 1 2 3 4 5 6 7        idx: 0 1 2 3 4 5 6 7
//!      0 1 2 0 1 2 0 1             0 0 1 1 1 2 2 2
//! ```

use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, Result};

/// Rule for splitting a range between workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PartitionMode {
    /// Worker `i` visits `start + i, start + i + t, ...`.
    #[default]
    Interleaved,
    /// Worker `i` visits one contiguous chunk of near-equal size.
    Chunked,
}

impl PartitionMode {
    /// Raw flag for [`PartitionMode::Interleaved`].
    pub const MODE_STRIDE: i64 = 1;
    /// Raw flag for [`PartitionMode::Chunked`].
    pub const MODE_CHUNK: i64 = 2;

    /// Parse a raw mode flag.
    pub fn from_raw(raw: i64) -> Result<Self> {
        match raw {
            Self::MODE_STRIDE => Ok(PartitionMode::Interleaved),
            Self::MODE_CHUNK => Ok(PartitionMode::Chunked),
            other => Err(CoreError::UnknownPartitionMode(other)),
        }
    }

    /// Raw mode flag.
    pub fn as_raw(&self) -> i64 {
        match self {
            PartitionMode::Interleaved => Self::MODE_STRIDE,
            PartitionMode::Chunked => Self::MODE_CHUNK,
        }
    }
}

impl FromStr for PartitionMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "stride" | "interleaved" | "1" => Ok(PartitionMode::Interleaved),
            "chunk" | "chunked" | "2" => Ok(PartitionMode::Chunked),
            other => Err(format!("unknown partition mode '{}'", other)),
        }
    }
}

impl fmt::Display for PartitionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartitionMode::Interleaved => f.write_str("stride"),
            PartitionMode::Chunked => f.write_str("chunk"),
        }
    }
}

/// Index range assigned to one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Partition {
    /// First index.
    pub start: i32,
    /// Exclusive end.
    pub end: i32,
    /// Increment between visited indices.
    pub step: i32,
}

impl Partition {
    /// Indices this partition visits, in order.
    pub fn indices(&self) -> impl Iterator<Item = i32> {
        (self.start..self.end).step_by(self.step.max(1) as usize)
    }

    /// Number of indices visited.
    pub fn count(&self) -> usize {
        if self.end <= self.start {
            return 0;
        }
        let span = (self.end as i64 - self.start as i64) as usize;
        span.div_ceil(self.step.max(1) as usize)
    }
}

/// Per-worker partitions for one dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionPlan {
    mode: PartitionMode,
    partitions: Vec<Partition>,
}

impl PartitionPlan {
    /// Split `[start, end)` across `thread_count` workers.
    pub fn new(start: i32, end: i32, thread_count: usize, mode: PartitionMode) -> Result<Self> {
        if thread_count == 0 || thread_count > i32::MAX as usize {
            return Err(CoreError::InvalidThreadCount(thread_count as i64));
        }

        let partitions = match mode {
            PartitionMode::Interleaved => interleaved(start, end, thread_count),
            PartitionMode::Chunked => chunked(start, end, thread_count),
        };

        Ok(Self { mode, partitions })
    }

    /// Plan from raw flags, as received through the integer interface.
    pub fn from_raw(start: i32, end: i32, thread_count: i64, mode: i64) -> Result<Self> {
        let mode = PartitionMode::from_raw(mode)?;
        let threads = usize::try_from(thread_count)
            .map_err(|_| CoreError::InvalidThreadCount(thread_count))?;
        Self::new(start, end, threads, mode)
    }

    /// Partition mode.
    pub fn mode(&self) -> PartitionMode {
        self.mode
    }

    /// Number of partitions (equals the thread count).
    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    /// Always false for a successfully built plan.
    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    /// All partitions, worker order.
    pub fn partitions(&self) -> &[Partition] {
        &self.partitions
    }

    /// The last partition and the rest.
    pub fn split_last(&self) -> Option<(&Partition, &[Partition])> {
        self.partitions.split_last()
    }
}

fn interleaved(start: i32, end: i32, t: usize) -> Vec<Partition> {
    (0..t)
        .map(|i| Partition {
            start: start.saturating_add(i as i32),
            end,
            step: t as i32,
        })
        .collect()
}

fn chunked(start: i32, end: i32, t: usize) -> Vec<Partition> {
    let (a, b, t) = (start as i128, end as i128, t as i128);
    // Bounds come straight from i and i + 1, so neighbours always meet.
    let bound = |i: i128| (a + (b - a) * i / t) as i32;
    (0..t)
        .map(|i| Partition {
            start: bound(i),
            end: bound(i + 1),
            step: 1,
        })
        .collect()
}
