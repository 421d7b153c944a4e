//! Work-group execution strategy for the host device
//!
//! A launch is split into independent work-groups. The executor decides
//! whether they run one after another on the calling thread or concurrently
//! on a rayon pool. Either way the launch is complete when `map_groups`
//! returns.

/// Execution strategy for the work-groups of one launch
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutionStrategy {
    /// Run groups in order on the calling thread
    Sequential,
    /// Run groups concurrently
    Parallel,
}

/// Runs the work-groups of a launch
#[derive(Clone, Debug, Default)]
pub enum GroupExecutor {
    #[default]
    Sequential,
    /// Rayon global pool, or a dedicated pool when one is given
    #[cfg(feature = "parallel")]
    Parallel(Option<std::sync::Arc<rayon::ThreadPool>>),
}

impl GroupExecutor {
    /// Parallel executor on rayon's global pool
    #[cfg(feature = "parallel")]
    pub fn parallel() -> Self {
        Self::Parallel(None)
    }

    /// Parallel executor on a dedicated pool with `num_threads` workers
    #[cfg(feature = "parallel")]
    pub fn with_num_threads(num_threads: usize) -> accel_core::Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()
            .map_err(|e| {
                accel_core::Error::InvalidConfiguration(format!(
                    "Failed to create thread pool: {e}"
                ))
            })?;
        Ok(Self::Parallel(Some(std::sync::Arc::new(pool))))
    }

    /// Evaluate `f` for every group index, returning results in group order
    pub fn map_groups<F, R>(&self, count: usize, f: F) -> Vec<R>
    where
        F: Fn(usize) -> R + Sync + Send,
        R: Send,
    {
        match self {
            Self::Sequential => (0..count).map(f).collect(),
            #[cfg(feature = "parallel")]
            Self::Parallel(pool) => {
                use rayon::prelude::*;

                if let Some(pool) = pool {
                    pool.install(|| (0..count).into_par_iter().map(f).collect())
                } else {
                    (0..count).into_par_iter().map(f).collect()
                }
            }
        }
    }

    pub fn strategy(&self) -> ExecutionStrategy {
        match self {
            Self::Sequential => ExecutionStrategy::Sequential,
            #[cfg(feature = "parallel")]
            Self::Parallel(_) => ExecutionStrategy::Parallel,
        }
    }

    /// Number of threads groups may run on
    pub fn num_threads(&self) -> usize {
        match self {
            Self::Sequential => 1,
            #[cfg(feature = "parallel")]
            Self::Parallel(Some(pool)) => pool.current_num_threads(),
            #[cfg(feature = "parallel")]
            Self::Parallel(None) => rayon::current_num_threads(),
        }
    }
}
