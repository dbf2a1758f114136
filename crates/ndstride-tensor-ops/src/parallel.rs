use rayon::prelude::*;

use crate::error::TensorOpsError;

/// Element count from which [`ExecutionStrategy::Auto`] goes parallel.
pub const PARALLEL_THRESHOLD: usize = 1 << 16;

/// Controls how a kernel distributes its inner loops.
///
/// Work is always split along the outer offsets of a loop descriptor, so
/// every task owns whole inner runs and never shares an output cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionStrategy {
    /// Parallel on the global Rayon pool above [`PARALLEL_THRESHOLD`]
    /// elements, serial below.
    #[default]
    Auto,

    /// Run sequentially on the current thread.
    Serial,

    /// Use the global Rayon thread pool regardless of size.
    Parallel,

    /// Run on a local thread pool with `n` threads.
    ///
    /// # Warning
    /// Creates a new thread pool on every call, which has significant overhead.
    /// Use this primarily for benchmarking or specific isolation needs.
    Fixed(usize),
}

impl ExecutionStrategy {
    /// True when a kernel over `total` elements split into `runs` tasks
    /// should go parallel.
    pub fn is_parallel(self, runs: usize, total: usize) -> bool {
        match self {
            ExecutionStrategy::Serial => false,
            _ if runs < 2 => false,
            ExecutionStrategy::Auto => total >= PARALLEL_THRESHOLD,
            ExecutionStrategy::Parallel | ExecutionStrategy::Fixed(_) => true,
        }
    }
}

/// Maps `f` over `runs`, keeping their order in the output.
///
/// `total` is the element count the runs cover and only feeds the
/// [`ExecutionStrategy::Auto`] decision.
pub fn map_runs<I, R, F>(
    strategy: ExecutionStrategy,
    runs: &[I],
    total: usize,
    f: F,
) -> Result<Vec<R>, TensorOpsError>
where
    I: Sync,
    R: Send,
    F: Fn(&I) -> R + Sync + Send,
{
    if !strategy.is_parallel(runs.len(), total) {
        return Ok(runs.iter().map(f).collect());
    }
    log::debug!("{strategy:?}: {} runs over {total} elements in parallel", runs.len());
    match strategy {
        ExecutionStrategy::Fixed(n) => {
            if n == 0 {
                return Err(TensorOpsError::Parallel(format!(
                    "thread count must be > 0, got {n}"
                )));
            }
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(n)
                .build()
                .map_err(|e| TensorOpsError::Parallel(e.to_string()))?;
            Ok(pool.install(|| runs.par_iter().map(&f).collect()))
        }
        _ => Ok(runs.par_iter().map(f).collect()),
    }
}

/// Runs `f` on every run, possibly in parallel.
pub fn for_each_run<I, F>(
    strategy: ExecutionStrategy,
    runs: &[I],
    total: usize,
    f: F,
) -> Result<(), TensorOpsError>
where
    I: Sync,
    F: Fn(&I) -> Result<(), TensorOpsError> + Sync + Send,
{
    map_runs(strategy, runs, total, f)?.into_iter().collect()
}
