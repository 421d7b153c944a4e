//! Kernel naming and argument binding
//!
//! Kernel names follow `{statistic}_{WG_REDUCE_|}{TYPE}`. The `WG_REDUCE_`
//! infix only appears for `min`, `max` and `sum` when work-group recursion
//! is on. Every kernel the engine may launch is created up front by
//! [`KernelTable::build`], so a program missing one fails when the engine is
//! configured rather than halfway through a run.

use std::collections::BTreeMap;
use std::fmt;

use accel_core::{ElementKind, Error, Result};
use accel_device::{BufferId, ComputeDevice, KernelArg, KernelHandle, ScalarArg};
use tracing::debug;

use crate::buffers::BufferRole;

/// Statistic computed by one kernel family
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Statistic {
    Min,
    Max,
    Sum,
    StdDev,
    Sort,
}

impl Statistic {
    pub const ALL: [Statistic; 5] = [Self::Min, Self::Max, Self::Sum, Self::StdDev, Self::Sort];

    /// Kernel name prefix
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Min => "min",
            Self::Max => "max",
            Self::Sum => "sum",
            Self::StdDev => "std",
            Self::Sort => "sort",
        }
    }

    /// Whether a `WG_REDUCE` kernel exists for this statistic
    pub fn supports_group_recursion(self) -> bool {
        matches!(self, Self::Min | Self::Max | Self::Sum)
    }

    /// Buffer the kernel writes its result to
    pub fn output(self) -> BufferRole {
        match self {
            Self::Min => BufferRole::Min,
            Self::Max => BufferRole::Max,
            Self::Sum => BufferRole::Sum,
            Self::StdDev => BufferRole::StdDev,
            Self::Sort => BufferRole::Sort,
        }
    }
}

impl fmt::Display for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Fully resolved kernel identity
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct KernelId {
    pub statistic: Statistic,
    pub kind: ElementKind,
    pub recursive: bool,
}

impl KernelId {
    /// Kernel for `statistic`, taking the recursive form only where one exists
    pub fn resolve(statistic: Statistic, kind: ElementKind, group_recursion: bool) -> Self {
        Self {
            statistic,
            kind,
            recursive: group_recursion && statistic.supports_group_recursion(),
        }
    }

    /// Entry point name in the kernel program
    pub fn name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for KernelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let infix = if self.recursive { "WG_REDUCE_" } else { "" };
        write!(f, "{}_{}{}", self.statistic.prefix(), infix, self.kind.tag())
    }
}

/// Created kernels, one per statistic
#[derive(Debug, Clone, Default)]
pub struct KernelTable {
    entries: BTreeMap<Statistic, (KernelId, KernelHandle)>,
}

impl KernelTable {
    /// Create every kernel the engine can launch for this type and recursion setting
    pub fn build<D: ComputeDevice>(device: &mut D, kind: ElementKind, group_recursion: bool) -> Result<Self> {
        let mut entries = BTreeMap::new();
        for statistic in Statistic::ALL {
            let id = KernelId::resolve(statistic, kind, group_recursion);
            match device.create_kernel(&id.name()) {
                Ok(handle) => {
                    entries.insert(statistic, (id, handle));
                }
                Err(e) => {
                    // Kernels created before the failure are not handed out
                    let _ = Self { entries }.release(device);
                    return Err(e);
                }
            }
        }
        debug!(
            "Kernel table ready: {}",
            entries
                .values()
                .map(|(id, _)| id.name())
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(Self { entries })
    }

    /// Table holding no kernels
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self, statistic: Statistic) -> Result<(KernelId, KernelHandle)> {
        self.entries.get(&statistic).copied().ok_or_else(|| {
            Error::InvalidConfiguration(format!("no kernel registered for {statistic}"))
        })
    }

    /// Names of every kernel in the table
    pub fn names(&self) -> Vec<String> {
        self.entries.values().map(|(id, _)| id.name()).collect()
    }

    /// Release every kernel object, reporting the first failure
    pub fn release<D: ComputeDevice>(self, device: &mut D) -> Result<()> {
        let mut first_err = None;
        for (id, handle) in self.entries.into_values() {
            if let Err(e) = device.release_kernel(handle) {
                debug!("Releasing kernel {id} failed: {e}");
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

const ARG_INPUT: usize = 0;
const ARG_OUTPUT: usize = 1;
const ARG_REDUCE_LOCAL: usize = 2;
const ARG_REDUCE_VALID: usize = 3;
const ARG_STD_MEAN: usize = 2;
const ARG_STD_LOCAL: usize = 3;
const ARG_STD_RAW: usize = 4;
const ARG_SORT_LOCAL: usize = 2;
const ARG_SORT_FLAG: usize = 3;

fn count_arg(count: usize) -> Result<KernelArg> {
    let count = u32::try_from(count).map_err(|_| {
        Error::InvalidConfiguration(format!("{count} elements do not fit a 32-bit kernel argument"))
    })?;
    Ok(KernelArg::Scalar(ScalarArg::U32(count)))
}

/// Bind input, output and local scratch of a reduction kernel
pub fn bind_reduction<D: ComputeDevice>(
    device: &mut D,
    kernel: KernelHandle,
    input: BufferId,
    output: BufferId,
    local_bytes: usize,
) -> Result<()> {
    device.set_arg(kernel, ARG_INPUT, KernelArg::Buffer(input))?;
    device.set_arg(kernel, ARG_OUTPUT, KernelArg::Buffer(output))?;
    device.set_arg(kernel, ARG_REDUCE_LOCAL, KernelArg::Local(local_bytes))
}

/// Bind the number of valid input elements of a recursive reduction
pub fn bind_valid_count<D: ComputeDevice>(device: &mut D, kernel: KernelHandle, count: usize) -> Result<()> {
    device.set_arg(kernel, ARG_REDUCE_VALID, count_arg(count)?)
}

/// Rebind the input argument, leaving the others in place
pub fn bind_input<D: ComputeDevice>(device: &mut D, kernel: KernelHandle, input: BufferId) -> Result<()> {
    device.set_arg(kernel, ARG_INPUT, KernelArg::Buffer(input))
}

/// Bind every argument of a standard deviation kernel
pub fn bind_std_dev<D: ComputeDevice>(
    device: &mut D,
    kernel: KernelHandle,
    input: BufferId,
    output: BufferId,
    mean: f32,
    local_bytes: usize,
    raw_len: usize,
) -> Result<()> {
    device.set_arg(kernel, ARG_INPUT, KernelArg::Buffer(input))?;
    device.set_arg(kernel, ARG_OUTPUT, KernelArg::Buffer(output))?;
    device.set_arg(kernel, ARG_STD_MEAN, KernelArg::Scalar(ScalarArg::F32(mean)))?;
    device.set_arg(kernel, ARG_STD_LOCAL, KernelArg::Local(local_bytes))?;
    device.set_arg(kernel, ARG_STD_RAW, count_arg(raw_len)?)
}

/// Bind every argument of a sort kernel
pub fn bind_sort<D: ComputeDevice>(
    device: &mut D,
    kernel: KernelHandle,
    input: BufferId,
    output: BufferId,
    local_bytes: usize,
    merge_flag: u32,
) -> Result<()> {
    device.set_arg(kernel, ARG_INPUT, KernelArg::Buffer(input))?;
    device.set_arg(kernel, ARG_OUTPUT, KernelArg::Buffer(output))?;
    device.set_arg(kernel, ARG_SORT_LOCAL, KernelArg::Local(local_bytes))?;
    bind_merge_flag(device, kernel, merge_flag)
}

/// Set the merge-phase flag of a sort kernel
pub fn bind_merge_flag<D: ComputeDevice>(device: &mut D, kernel: KernelHandle, merge_flag: u32) -> Result<()> {
    device.set_arg(kernel, ARG_SORT_FLAG, KernelArg::Scalar(ScalarArg::U32(merge_flag)))
}
