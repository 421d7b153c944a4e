//! The compute device seam
//!
//! A device owns a context, one in-order command queue, buffers addressed by
//! [`BufferId`] and kernels addressed by [`KernelHandle`]. Kernel arguments
//! persist on a kernel between launches, as they do in OpenCL.
//!
//! Transfers through this trait are blocking. Launches are enqueued and may
//! still be running when [`ComputeDevice::enqueue_nd_range`] returns; only
//! [`ComputeDevice::finish`] and the blocking transfers wait for them.

use std::time::Duration;

use accel_core::Result;

/// Handle to a device buffer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub u64);

/// Handle to a kernel created from the built program
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KernelHandle(pub u64);

/// Host access intent for a buffer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemAccess {
    ReadOnly,
    ReadWrite,
}

/// Scalar passed by value to a kernel
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ScalarArg {
    I32(i32),
    U32(u32),
    F32(f32),
}

/// One kernel argument slot
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum KernelArg {
    /// Global memory buffer
    Buffer(BufferId),
    /// Local (work-group shared) scratch of the given size in bytes
    Local(usize),
    /// Value argument
    Scalar(ScalarArg),
}

/// One-dimensional launch geometry
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NdRange {
    pub global: usize,
    pub local: usize,
}

impl NdRange {
    pub fn new(global: usize, local: usize) -> Self {
        Self { global, local }
    }

    /// Number of work-groups, `None` when the local size does not divide the global size
    pub fn groups(&self) -> Option<usize> {
        if self.local == 0 || self.global % self.local != 0 {
            None
        } else {
            Some(self.global / self.local)
        }
    }
}

/// Token for an enqueued launch, used to query its profiling counters
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LaunchEvent(pub u64);

/// Device-side timestamps of one launch, in nanoseconds on the device clock
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProfilingInfo {
    pub queued: u64,
    pub submitted: u64,
    pub start: u64,
    pub end: u64,
}

impl ProfilingInfo {
    /// Time spent executing
    pub fn execution(&self) -> Duration {
        Duration::from_nanos(self.end.saturating_sub(self.start))
    }

    /// Time from enqueue to completion
    pub fn total(&self) -> Duration {
        Duration::from_nanos(self.end.saturating_sub(self.queued))
    }
}

/// Per-kernel work-group limits reported by the device
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkGroupInfo {
    /// Preferred work-group size multiple for this kernel
    pub preferred_multiple: usize,
    /// Largest work-group this kernel can be launched with
    pub max_size: usize,
}

/// Launch events a device keeps timestamps for; older ones are dropped
pub const MAX_RETAINED_EVENTS: usize = 256;

/// A compute accelerator with a single command queue
pub trait ComputeDevice {
    /// Human readable device name
    fn device_name(&self) -> &str;

    /// Name of the platform the device belongs to
    fn platform_name(&self) -> &str;

    /// Largest work-group the device supports for any kernel
    fn max_work_group_size(&self) -> usize;

    /// Allocate a buffer of `size` bytes
    fn create_buffer(&mut self, access: MemAccess, size: usize) -> Result<BufferId>;

    /// Release a buffer; its id becomes invalid
    fn release_buffer(&mut self, buffer: BufferId) -> Result<()>;

    /// Size of a buffer in bytes
    fn buffer_size(&self, buffer: BufferId) -> Result<usize>;

    /// Blocking copy from host memory into a buffer
    fn write_buffer(&mut self, buffer: BufferId, offset: usize, data: &[u8]) -> Result<()>;

    /// Fill `size` bytes starting at `offset` with a repeated pattern
    fn fill_buffer(
        &mut self,
        buffer: BufferId,
        pattern: &[u8],
        offset: usize,
        size: usize,
    ) -> Result<()>;

    /// Blocking copy from a buffer into host memory
    fn read_buffer(&mut self, buffer: BufferId, offset: usize, out: &mut [u8]) -> Result<()>;

    /// Create a kernel object for a named entry point of the built program
    fn create_kernel(&mut self, name: &str) -> Result<KernelHandle>;

    /// Release a kernel object; its handle becomes invalid
    fn release_kernel(&mut self, kernel: KernelHandle) -> Result<()>;

    /// Bind one argument slot of a kernel
    fn set_arg(&mut self, kernel: KernelHandle, index: usize, arg: KernelArg) -> Result<()>;

    /// Work-group limits for a kernel on this device
    fn work_group_info(&self, kernel: KernelHandle) -> Result<WorkGroupInfo>;

    /// Enqueue a launch of `kernel` over `range`
    fn enqueue_nd_range(&mut self, kernel: KernelHandle, range: NdRange) -> Result<LaunchEvent>;

    /// Block until every enqueued command has completed
    fn finish(&mut self) -> Result<()>;

    /// Timestamps of a completed launch
    ///
    /// Only the last [`MAX_RETAINED_EVENTS`] launches can be queried.
    fn profiling_info(&self, event: LaunchEvent) -> Result<ProfilingInfo>;
}

impl<D: ComputeDevice + ?Sized> ComputeDevice for &mut D {
    fn device_name(&self) -> &str {
        (**self).device_name()
    }

    fn platform_name(&self) -> &str {
        (**self).platform_name()
    }

    fn max_work_group_size(&self) -> usize {
        (**self).max_work_group_size()
    }

    fn create_buffer(&mut self, access: MemAccess, size: usize) -> Result<BufferId> {
        (**self).create_buffer(access, size)
    }

    fn release_buffer(&mut self, buffer: BufferId) -> Result<()> {
        (**self).release_buffer(buffer)
    }

    fn buffer_size(&self, buffer: BufferId) -> Result<usize> {
        (**self).buffer_size(buffer)
    }

    fn write_buffer(&mut self, buffer: BufferId, offset: usize, data: &[u8]) -> Result<()> {
        (**self).write_buffer(buffer, offset, data)
    }

    fn fill_buffer(
        &mut self,
        buffer: BufferId,
        pattern: &[u8],
        offset: usize,
        size: usize,
    ) -> Result<()> {
        (**self).fill_buffer(buffer, pattern, offset, size)
    }

    fn read_buffer(&mut self, buffer: BufferId, offset: usize, out: &mut [u8]) -> Result<()> {
        (**self).read_buffer(buffer, offset, out)
    }

    fn create_kernel(&mut self, name: &str) -> Result<KernelHandle> {
        (**self).create_kernel(name)
    }

    fn release_kernel(&mut self, kernel: KernelHandle) -> Result<()> {
        (**self).release_kernel(kernel)
    }

    fn set_arg(&mut self, kernel: KernelHandle, index: usize, arg: KernelArg) -> Result<()> {
        (**self).set_arg(kernel, index, arg)
    }

    fn work_group_info(&self, kernel: KernelHandle) -> Result<WorkGroupInfo> {
        (**self).work_group_info(kernel)
    }

    fn enqueue_nd_range(&mut self, kernel: KernelHandle, range: NdRange) -> Result<LaunchEvent> {
        (**self).enqueue_nd_range(kernel, range)
    }

    fn finish(&mut self) -> Result<()> {
        (**self).finish()
    }

    fn profiling_info(&self, event: LaunchEvent) -> Result<ProfilingInfo> {
        (**self).profiling_info(event)
    }
}
