//! Engine configuration

use serde::{Deserialize, Serialize};

use crate::{Error, Numeric, Result};

/// Work-group size used when none is given
pub const DEFAULT_GROUP_SIZE: usize = 1024;

/// Sort passes attempted before giving up
pub const DEFAULT_MAX_SORT_PASSES: usize = 1 << 16;

/// Launch and policy settings for one engine instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig<T> {
    /// Work-group (local) size
    pub group_size: usize,
    /// Value appended when padding the series
    pub neutral_value: T,
    /// Replace the group size with the kernel's preferred size before launching
    pub auto_tune: bool,
    /// Report queue options before the next launch
    pub verbose: bool,
    /// Time every launch and drain the queue after it
    pub profile: bool,
    /// Use the `*_WG_REDUCE_*` kernels for min, max and sum
    pub group_recursion: bool,
    /// Upper bound on sort convergence passes
    pub max_sort_passes: usize,
}

impl<T: Numeric> Default for EngineConfig<T> {
    fn default() -> Self {
        Self {
            group_size: DEFAULT_GROUP_SIZE,
            neutral_value: T::zero(),
            auto_tune: false,
            verbose: false,
            profile: false,
            group_recursion: false,
            max_sort_passes: DEFAULT_MAX_SORT_PASSES,
        }
    }
}

impl<T: Numeric> EngineConfig<T> {
    pub fn new(group_size: usize, neutral_value: T) -> Self {
        Self {
            group_size,
            neutral_value,
            ..Self::default()
        }
    }

    pub fn with_group_size(mut self, group_size: usize) -> Self {
        self.group_size = group_size;
        self
    }

    pub fn with_neutral_value(mut self, neutral_value: T) -> Self {
        self.neutral_value = neutral_value;
        self
    }

    pub fn with_auto_tune(mut self, auto_tune: bool) -> Self {
        self.auto_tune = auto_tune;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_profiling(mut self, profile: bool) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_group_recursion(mut self, group_recursion: bool) -> Self {
        self.group_recursion = group_recursion;
        self
    }

    pub fn with_max_sort_passes(mut self, max_sort_passes: usize) -> Self {
        self.max_sort_passes = max_sort_passes;
        self
    }

    /// Check the settings that do not depend on the device
    pub fn validate(&self) -> Result<()> {
        if self.group_size == 0 {
            return Err(Error::zero_group_size());
        }
        if self.max_sort_passes == 0 {
            return Err(Error::InvalidParameter(
                "max_sort_passes must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
