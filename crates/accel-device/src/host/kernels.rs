//! Reference kernels for the host device
//!
//! Each kernel sees a [`HostLaunch`]: a snapshot of every buffer argument
//! taken when the launch was enqueued, plus the bound scalars and local
//! scratch sizes. Kernels stage their output through [`HostLaunch::write`];
//! the device commits staged writes after the kernel returns. Reading a
//! snapshot and writing the same buffer is therefore safe, which is what the
//! engine relies on when it rebinds a reduction's input to its own output.

use std::cmp::Ordering;
use std::marker::PhantomData;

use accel_core::{Numeric, Result};
use bytemuck::Pod;

use super::exec::GroupExecutor;
use crate::codes::{
    device_error, CL_INVALID_ARG_INDEX, CL_INVALID_ARG_SIZE, CL_INVALID_ARG_VALUE,
    CL_INVALID_GLOBAL_WORK_SIZE, CL_INVALID_KERNEL_ARGS,
};
use crate::device::{BufferId, KernelArg, NdRange, ScalarArg};

/// An argument as the kernel sees it during one launch
#[derive(Clone, Debug)]
pub enum LaunchArg {
    Buffer { id: BufferId, data: Vec<u8> },
    Local(usize),
    Scalar(ScalarArg),
}

impl LaunchArg {
    /// Resolve a bound argument, snapshotting buffer contents
    pub fn resolve(arg: KernelArg, snapshot: impl FnOnce(BufferId) -> Result<Vec<u8>>) -> Result<Self> {
        Ok(match arg {
            KernelArg::Buffer(id) => Self::Buffer {
                id,
                data: snapshot(id)?,
            },
            KernelArg::Local(bytes) => Self::Local(bytes),
            KernelArg::Scalar(value) => Self::Scalar(value),
        })
    }
}

/// One in-flight launch
#[derive(Debug)]
pub struct HostLaunch {
    args: Vec<LaunchArg>,
    range: NdRange,
    writes: Vec<(BufferId, Vec<u8>)>,
}

impl HostLaunch {
    pub fn new(args: Vec<LaunchArg>, range: NdRange) -> Self {
        Self {
            args,
            range,
            writes: Vec::new(),
        }
    }

    pub fn range(&self) -> NdRange {
        self.range
    }

    /// Number of work-groups in the launch
    pub fn groups(&self) -> usize {
        self.range.groups().unwrap_or(0)
    }

    fn arg(&self, index: usize) -> Result<&LaunchArg> {
        self.args.get(index).ok_or_else(|| {
            device_error(
                CL_INVALID_ARG_INDEX,
                format!("argument {index} is not bound"),
            )
        })
    }

    fn buffer(&self, index: usize) -> Result<(BufferId, &[u8])> {
        match self.arg(index)? {
            LaunchArg::Buffer { id, data } => Ok((*id, data)),
            other => Err(device_error(
                CL_INVALID_KERNEL_ARGS,
                format!("argument {index} must be a buffer, found {other:?}"),
            )),
        }
    }

    /// Contents of a buffer argument as elements
    pub fn read<T: Pod>(&self, index: usize) -> Result<Vec<T>> {
        let (_, data) = self.buffer(index)?;
        let whole = data.len() - data.len() % std::mem::size_of::<T>();
        Ok(bytemuck::pod_collect_to_vec(&data[..whole]))
    }

    /// Capacity of a buffer argument in elements
    pub fn buffer_len<T: Pod>(&self, index: usize) -> Result<usize> {
        let (_, data) = self.buffer(index)?;
        Ok(data.len() / std::mem::size_of::<T>())
    }

    /// Check a local scratch argument can hold one element per work-item
    pub fn require_local<T: Pod>(&self, index: usize) -> Result<()> {
        match self.arg(index)? {
            LaunchArg::Local(bytes) => {
                let needed = self.range.local * std::mem::size_of::<T>();
                if *bytes < needed {
                    return Err(device_error(
                        CL_INVALID_ARG_SIZE,
                        format!(
                            "local scratch at argument {index} holds {bytes} bytes, work-group needs {needed}"
                        ),
                    ));
                }
                Ok(())
            }
            other => Err(device_error(
                CL_INVALID_KERNEL_ARGS,
                format!("argument {index} must be local memory, found {other:?}"),
            )),
        }
    }

    pub fn u32(&self, index: usize) -> Result<u32> {
        match self.arg(index)? {
            LaunchArg::Scalar(ScalarArg::U32(v)) => Ok(*v),
            other => Err(device_error(
                CL_INVALID_ARG_VALUE,
                format!("argument {index} must be a u32 scalar, found {other:?}"),
            )),
        }
    }

    pub fn f32(&self, index: usize) -> Result<f32> {
        match self.arg(index)? {
            LaunchArg::Scalar(ScalarArg::F32(v)) => Ok(*v),
            other => Err(device_error(
                CL_INVALID_ARG_VALUE,
                format!("argument {index} must be an f32 scalar, found {other:?}"),
            )),
        }
    }

    /// Stage `values` to be written at the start of a buffer argument
    pub fn write<T: Pod>(&mut self, index: usize, values: &[T]) -> Result<()> {
        let (id, data) = self.buffer(index)?;
        let bytes = bytemuck::cast_slice::<T, u8>(values);
        if bytes.len() > data.len() {
            return Err(device_error(
                CL_INVALID_KERNEL_ARGS,
                format!(
                    "kernel wrote {} bytes into a {} byte buffer at argument {index}",
                    bytes.len(),
                    data.len()
                ),
            ));
        }
        self.writes.push((id, bytes.to_vec()));
        Ok(())
    }

    /// Staged writes, in the order the kernel produced them
    pub fn into_writes(self) -> Vec<(BufferId, Vec<u8>)> {
        self.writes
    }
}

/// A kernel the host device can execute
pub trait HostKernel: Send + Sync + std::fmt::Debug {
    /// Number of argument slots that must be bound before a launch
    fn arity(&self) -> usize;

    /// Execute every work-group of the launch
    fn run(&self, launch: &mut HostLaunch, exec: &GroupExecutor) -> Result<()>;
}

/// Associative operation of a reduction kernel
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReduceOp {
    Min,
    Max,
    Sum,
}

impl ReduceOp {
    /// Value that leaves every other value unchanged
    pub fn identity<T: Numeric>(self) -> T {
        match self {
            Self::Min => T::highest(),
            Self::Max => T::lowest(),
            Self::Sum => T::zero(),
        }
    }

    pub fn combine<T: Numeric>(self, acc: T, value: T) -> T {
        match self {
            Self::Min => {
                if value < acc {
                    value
                } else {
                    acc
                }
            }
            Self::Max => {
                if value > acc {
                    value
                } else {
                    acc
                }
            }
            Self::Sum => acc.accumulate(value),
        }
    }
}

/// Work-group reduction of `min`, `max` or `sum`
///
/// Group `g` reduces lanes `[g*L, (g+1)*L)` into `out[g]`. The flat form
/// reads every lane of its range; the work-group recursive form takes the
/// number of valid lanes as argument 3 and feeds the identity to the rest.
#[derive(Debug)]
pub struct ReduceKernel<T> {
    op: ReduceOp,
    recursive: bool,
    _element: PhantomData<T>,
}

impl<T: Numeric> ReduceKernel<T> {
    pub fn flat(op: ReduceOp) -> Self {
        Self {
            op,
            recursive: false,
            _element: PhantomData,
        }
    }

    pub fn recursive(op: ReduceOp) -> Self {
        Self {
            op,
            recursive: true,
            _element: PhantomData,
        }
    }
}

impl<T: Numeric> HostKernel for ReduceKernel<T> {
    fn arity(&self) -> usize {
        if self.recursive {
            4
        } else {
            3
        }
    }

    fn run(&self, launch: &mut HostLaunch, exec: &GroupExecutor) -> Result<()> {
        let range = launch.range();
        let input = launch.read::<T>(0)?;
        let out_len = launch.buffer_len::<T>(1)?;
        launch.require_local::<T>(2)?;

        let valid = if self.recursive {
            let count = launch.u32(3)? as usize;
            if count > input.len() {
                return Err(device_error(
                    CL_INVALID_ARG_VALUE,
                    format!(
                        "valid count {count} exceeds the {} element input",
                        input.len()
                    ),
                ));
            }
            count
        } else {
            if range.global > input.len() {
                return Err(device_error(
                    CL_INVALID_GLOBAL_WORK_SIZE,
                    format!(
                        "global size {} reads past the {} element input",
                        range.global,
                        input.len()
                    ),
                ));
            }
            range.global
        };

        let op = self.op;
        let local = range.local;
        let groups = launch.groups().min(out_len);
        let partials = exec.map_groups(groups, |g| {
            let start = g * local;
            (start..start + local).fold(op.identity::<T>(), |acc, i| {
                if i < valid {
                    op.combine(acc, input[i])
                } else {
                    acc
                }
            })
        });

        launch.write(1, &partials)
    }
}

/// Sum of squared deviations from a bound mean
///
/// Only the first `raw` lanes (argument 4) contribute, so the padded tail is
/// ignored whatever its value. Integer kernels store the sum of squares and
/// leave the division and square root to the host; float kernels finish the
/// standard deviation on the device.
#[derive(Debug)]
pub struct StdDevKernel<T> {
    finish_on_device: bool,
    _element: PhantomData<T>,
}

impl<T: Numeric> StdDevKernel<T> {
    /// Kernel that returns the sum of squared deviations
    pub fn sum_of_squares() -> Self {
        Self {
            finish_on_device: false,
            _element: PhantomData,
        }
    }

    /// Kernel that returns the population standard deviation
    pub fn finished() -> Self {
        Self {
            finish_on_device: true,
            _element: PhantomData,
        }
    }
}

impl<T: Numeric> HostKernel for StdDevKernel<T> {
    fn arity(&self) -> usize {
        5
    }

    fn run(&self, launch: &mut HostLaunch, exec: &GroupExecutor) -> Result<()> {
        let range = launch.range();
        let input = launch.read::<T>(0)?;
        let out_len = launch.buffer_len::<T>(1)?;
        let mean = launch.f32(2)? as f64;
        launch.require_local::<T>(3)?;
        let raw = launch.u32(4)? as usize;

        if range.global > input.len() {
            return Err(device_error(
                CL_INVALID_GLOBAL_WORK_SIZE,
                format!(
                    "global size {} reads past the {} element input",
                    range.global,
                    input.len()
                ),
            ));
        }

        let local = range.local;
        let valid = raw.min(range.global);
        let finish = self.finish_on_device;
        let groups = launch.groups().min(out_len);
        let partials = exec.map_groups(groups, |g| {
            let start = g * local;
            let squares: f64 = (start..(start + local).min(valid))
                .map(|i| {
                    let d = input[i].to_f64() - mean;
                    d * d
                })
                .sum();
            if finish {
                if raw == 0 {
                    T::zero()
                } else {
                    T::from_f64((squares / raw as f64).sqrt())
                }
            } else {
                T::from_f64(squares)
            }
        });

        launch.write(1, &partials)
    }
}

/// One merge-split pass of a block odd-even sort
///
/// The output starts as a copy of the input. With flag 0 every aligned
/// window `[g*L, (g+1)*L)` is sorted; with flag 1 the windows are shifted by
/// `L/2` and a window that would run past the end is left alone. Alternating
/// the flag moves values across window boundaries until the whole sequence
/// is ordered. With `L == 1` the windows are single elements and nothing
/// ever moves.
#[derive(Debug)]
pub struct SortKernel<T> {
    _element: PhantomData<T>,
}

impl<T: Numeric> SortKernel<T> {
    pub fn new() -> Self {
        Self {
            _element: PhantomData,
        }
    }
}

impl<T: Numeric> Default for SortKernel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Numeric> HostKernel for SortKernel<T> {
    fn arity(&self) -> usize {
        4
    }

    fn run(&self, launch: &mut HostLaunch, exec: &GroupExecutor) -> Result<()> {
        let range = launch.range();
        let input = launch.read::<T>(0)?;
        let out_len = launch.buffer_len::<T>(1)?;
        launch.require_local::<T>(2)?;
        let flag = launch.u32(3)?;

        let n = input.len().min(out_len).min(range.global);
        let local = range.local;
        let shift = if flag == 0 { 0 } else { local / 2 };

        let windows = exec.map_groups(launch.groups(), |g| {
            let start = g * local + shift;
            let end = start + local;
            if end > n {
                return None;
            }
            let mut window = input[start..end].to_vec();
            window.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
            Some((start, window))
        });

        let mut output = input[..input.len().min(out_len)].to_vec();
        for (start, window) in windows.into_iter().flatten() {
            output[start..start + window.len()].copy_from_slice(&window);
        }

        launch.write(1, &output)
    }
}
