//! In-process reference accelerator
//!
//! [`HostDevice`] implements [`ComputeDevice`] on host memory. It keeps the
//! parts of the OpenCL execution model the statistics engine depends on:
//! byte buffers with access flags, persistent kernel argument slots,
//! work-group geometry checks, local-memory limits, per-kernel preferred
//! work-group multiples and profiling timestamps. Errors carry OpenCL status
//! codes.
//!
//! Launches execute when they are enqueued; the queue is in order, so
//! `finish` only has to account for the drain.

mod exec;
mod kernels;
mod program;

pub use exec::{ExecutionStrategy, GroupExecutor};
pub use kernels::{
    HostKernel, HostLaunch, LaunchArg, ReduceKernel, ReduceOp, SortKernel, StdDevKernel,
};
pub use program::{BuiltProgram, HostProgram};

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use accel_core::Result;
use tracing::{debug, trace};

use crate::codes::{
    device_error, CL_INVALID_ARG_INDEX, CL_INVALID_ARG_SIZE, CL_INVALID_BUFFER_SIZE,
    CL_INVALID_EVENT, CL_INVALID_GLOBAL_WORK_SIZE, CL_INVALID_KERNEL, CL_INVALID_KERNEL_ARGS,
    CL_INVALID_KERNEL_NAME, CL_INVALID_MEM_OBJECT, CL_INVALID_VALUE, CL_INVALID_WORK_GROUP_SIZE,
    CL_MEM_OBJECT_ALLOCATION_FAILURE, CL_OUT_OF_RESOURCES, CL_PROFILING_INFO_NOT_AVAILABLE,
};
use crate::device::{
    BufferId, ComputeDevice, KernelArg, KernelHandle, LaunchEvent, MemAccess, NdRange,
    ProfilingInfo, WorkGroupInfo, MAX_RETAINED_EVENTS,
};

pub const HOST_PLATFORM_NAME: &str = "Host Reference Platform";
pub const HOST_DEVICE_NAME: &str = "Host Reference Device";

/// Limits and behaviour of a host device
#[derive(Clone, Debug)]
pub struct HostDeviceConfig {
    pub name: String,
    pub platform: String,
    /// Largest work-group any kernel accepts
    pub max_work_group_size: usize,
    /// Preferred work-group multiple reported for kernels without an override
    pub preferred_multiple: usize,
    /// Per-kernel preferred multiples, by kernel name
    pub preferred_overrides: BTreeMap<String, usize>,
    /// Local memory available to one work-group, in bytes
    pub local_mem_size: usize,
    /// Total bytes of buffers that may be alive at once
    pub global_mem_size: usize,
    /// Whether launches record profiling timestamps
    pub profiling: bool,
    pub executor: GroupExecutor,
}

impl Default for HostDeviceConfig {
    fn default() -> Self {
        Self {
            name: HOST_DEVICE_NAME.to_string(),
            platform: HOST_PLATFORM_NAME.to_string(),
            max_work_group_size: 1024,
            preferred_multiple: 32,
            preferred_overrides: BTreeMap::new(),
            local_mem_size: 64 * 1024,
            global_mem_size: 1 << 30,
            profiling: true,
            executor: GroupExecutor::default(),
        }
    }
}

impl HostDeviceConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_max_work_group_size(mut self, size: usize) -> Self {
        self.max_work_group_size = size;
        self
    }

    pub fn with_preferred_multiple(mut self, multiple: usize) -> Self {
        self.preferred_multiple = multiple;
        self
    }

    /// Report `multiple` as the preferred work-group size of one kernel
    pub fn with_kernel_preference(mut self, kernel: impl Into<String>, multiple: usize) -> Self {
        self.preferred_overrides.insert(kernel.into(), multiple);
        self
    }

    pub fn with_local_mem_size(mut self, bytes: usize) -> Self {
        self.local_mem_size = bytes;
        self
    }

    pub fn with_global_mem_size(mut self, bytes: usize) -> Self {
        self.global_mem_size = bytes;
        self
    }

    pub fn with_profiling(mut self, profiling: bool) -> Self {
        self.profiling = profiling;
        self
    }

    pub fn with_executor(mut self, executor: GroupExecutor) -> Self {
        self.executor = executor;
        self
    }
}

/// Number of commands the device has accepted, by kind
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CommandCounts {
    pub buffers_created: usize,
    pub buffers_released: usize,
    pub writes: usize,
    pub fills: usize,
    pub reads: usize,
    pub kernels_created: usize,
    pub kernels_released: usize,
    pub launches: usize,
    pub finishes: usize,
}

impl CommandCounts {
    /// Every command, of any kind
    pub fn total(&self) -> usize {
        self.buffers_created
            + self.buffers_released
            + self.writes
            + self.fills
            + self.reads
            + self.kernels_created
            + self.kernels_released
            + self.launches
            + self.finishes
    }
}

#[derive(Debug)]
struct HostBuffer {
    access: MemAccess,
    data: Vec<u8>,
}

#[derive(Debug)]
struct KernelObject {
    name: String,
    kernel: Arc<dyn HostKernel>,
    args: Vec<Option<KernelArg>>,
}

/// Reference accelerator running kernels on the host
#[derive(Debug)]
pub struct HostDevice {
    config: HostDeviceConfig,
    program: BuiltProgram,
    buffers: BTreeMap<u64, HostBuffer>,
    kernels: BTreeMap<u64, KernelObject>,
    events: BTreeMap<u64, ProfilingInfo>,
    allocated: usize,
    next_id: u64,
    epoch: Instant,
    counts: CommandCounts,
}

impl HostDevice {
    /// Create a device and build `program` for it
    pub fn new(config: HostDeviceConfig, program: &HostProgram) -> Result<Self> {
        let program = program.build()?;
        debug!(
            "Created {} on {} ({} kernels, {:?} groups)",
            config.name,
            config.platform,
            program.len(),
            config.executor.strategy()
        );
        Ok(Self {
            config,
            program,
            buffers: BTreeMap::new(),
            kernels: BTreeMap::new(),
            events: BTreeMap::new(),
            allocated: 0,
            next_id: 1,
            epoch: Instant::now(),
            counts: CommandCounts::default(),
        })
    }

    /// Default device with every statistics kernel built
    pub fn reference() -> Result<Self> {
        Self::new(HostDeviceConfig::default(), &HostProgram::reference())
    }

    pub fn config(&self) -> &HostDeviceConfig {
        &self.config
    }

    pub fn local_mem_size(&self) -> usize {
        self.config.local_mem_size
    }

    /// Commands accepted so far
    pub fn commands(&self) -> CommandCounts {
        self.counts
    }

    /// Buffers currently allocated
    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn live_kernels(&self) -> usize {
        self.kernels.len()
    }

    /// Launch events whose timestamps can still be queried
    pub fn retained_events(&self) -> usize {
        self.events.len()
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn clock(&self) -> u64 {
        self.epoch.elapsed().as_nanos() as u64
    }

    fn buffer(&self, id: BufferId) -> Result<&HostBuffer> {
        self.buffers.get(&id.0).ok_or_else(|| {
            device_error(CL_INVALID_MEM_OBJECT, format!("buffer {} does not exist", id.0))
        })
    }

    fn buffer_mut(&mut self, id: BufferId) -> Result<&mut HostBuffer> {
        self.buffers.get_mut(&id.0).ok_or_else(|| {
            device_error(CL_INVALID_MEM_OBJECT, format!("buffer {} does not exist", id.0))
        })
    }

    fn kernel(&self, handle: KernelHandle) -> Result<&KernelObject> {
        self.kernels.get(&handle.0).ok_or_else(|| {
            device_error(CL_INVALID_KERNEL, format!("kernel {} does not exist", handle.0))
        })
    }

    fn check_region(buffer: &HostBuffer, offset: usize, len: usize) -> Result<()> {
        match offset.checked_add(len) {
            Some(end) if end <= buffer.data.len() => Ok(()),
            _ => Err(device_error(
                CL_INVALID_VALUE,
                format!(
                    "region {offset}..{} is outside a {} byte buffer",
                    offset.saturating_add(len),
                    buffer.data.len()
                ),
            )),
        }
    }

    fn check_range(&self, object: &KernelObject, range: NdRange) -> Result<()> {
        if range.global == 0 {
            return Err(device_error(
                CL_INVALID_GLOBAL_WORK_SIZE,
                format!("{}: global size is zero", object.name),
            ));
        }
        if range.local == 0 || range.local > self.config.max_work_group_size {
            return Err(device_error(
                CL_INVALID_WORK_GROUP_SIZE,
                format!(
                    "{}: local size {} is outside 1..={}",
                    object.name, range.local, self.config.max_work_group_size
                ),
            ));
        }
        if range.groups().is_none() {
            return Err(device_error(
                CL_INVALID_WORK_GROUP_SIZE,
                format!(
                    "{}: global size {} is not a multiple of local size {}",
                    object.name, range.global, range.local
                ),
            ));
        }

        let local_bytes: usize = object
            .args
            .iter()
            .filter_map(|arg| match arg {
                Some(KernelArg::Local(bytes)) => Some(*bytes),
                _ => None,
            })
            .sum();
        if local_bytes > self.config.local_mem_size {
            return Err(device_error(
                CL_OUT_OF_RESOURCES,
                format!(
                    "{}: {local_bytes} bytes of local memory requested, {} available",
                    object.name, self.config.local_mem_size
                ),
            ));
        }
        Ok(())
    }
}

impl ComputeDevice for HostDevice {
    fn device_name(&self) -> &str {
        &self.config.name
    }

    fn platform_name(&self) -> &str {
        &self.config.platform
    }

    fn max_work_group_size(&self) -> usize {
        self.config.max_work_group_size
    }

    fn create_buffer(&mut self, access: MemAccess, size: usize) -> Result<BufferId> {
        if size == 0 {
            return Err(device_error(
                CL_INVALID_BUFFER_SIZE,
                "buffer size must be non-zero",
            ));
        }
        if self.allocated + size > self.config.global_mem_size {
            return Err(device_error(
                CL_MEM_OBJECT_ALLOCATION_FAILURE,
                format!(
                    "{size} bytes requested with {} of {} in use",
                    self.allocated, self.config.global_mem_size
                ),
            ));
        }

        let id = self.next_id();
        self.buffers.insert(
            id,
            HostBuffer {
                access,
                data: vec![0; size],
            },
        );
        self.allocated += size;
        self.counts.buffers_created += 1;
        trace!("Created buffer {id} ({size} bytes, {access:?})");
        Ok(BufferId(id))
    }

    fn release_buffer(&mut self, buffer: BufferId) -> Result<()> {
        let released = self.buffers.remove(&buffer.0).ok_or_else(|| {
            device_error(
                CL_INVALID_MEM_OBJECT,
                format!("buffer {} does not exist", buffer.0),
            )
        })?;
        self.allocated -= released.data.len();
        self.counts.buffers_released += 1;
        Ok(())
    }

    fn buffer_size(&self, buffer: BufferId) -> Result<usize> {
        Ok(self.buffer(buffer)?.data.len())
    }

    fn write_buffer(&mut self, buffer: BufferId, offset: usize, data: &[u8]) -> Result<()> {
        let target = self.buffer_mut(buffer)?;
        Self::check_region(target, offset, data.len())?;
        target.data[offset..offset + data.len()].copy_from_slice(data);
        self.counts.writes += 1;
        Ok(())
    }

    fn fill_buffer(
        &mut self,
        buffer: BufferId,
        pattern: &[u8],
        offset: usize,
        size: usize,
    ) -> Result<()> {
        if pattern.is_empty() || offset % pattern.len() != 0 || size % pattern.len() != 0 {
            return Err(device_error(
                CL_INVALID_VALUE,
                format!(
                    "fill of {size} bytes at {offset} is not aligned to a {} byte pattern",
                    pattern.len()
                ),
            ));
        }
        let target = self.buffer_mut(buffer)?;
        Self::check_region(target, offset, size)?;
        for chunk in target.data[offset..offset + size].chunks_exact_mut(pattern.len()) {
            chunk.copy_from_slice(pattern);
        }
        self.counts.fills += 1;
        Ok(())
    }

    fn read_buffer(&mut self, buffer: BufferId, offset: usize, out: &mut [u8]) -> Result<()> {
        let source = self.buffer(buffer)?;
        Self::check_region(source, offset, out.len())?;
        out.copy_from_slice(&source.data[offset..offset + out.len()]);
        self.counts.reads += 1;
        Ok(())
    }

    fn create_kernel(&mut self, name: &str) -> Result<KernelHandle> {
        let kernel = self.program.kernel(name).ok_or_else(|| {
            device_error(
                CL_INVALID_KERNEL_NAME,
                format!("program has no kernel named '{name}'"),
            )
        })?;

        let id = self.next_id();
        let arity = kernel.arity();
        self.kernels.insert(
            id,
            KernelObject {
                name: name.to_string(),
                kernel,
                args: vec![None; arity],
            },
        );
        self.counts.kernels_created += 1;
        debug!("Created kernel {name} with {arity} arguments");
        Ok(KernelHandle(id))
    }

    fn release_kernel(&mut self, kernel: KernelHandle) -> Result<()> {
        let released = self.kernels.remove(&kernel.0).ok_or_else(|| {
            device_error(CL_INVALID_KERNEL, format!("kernel {} does not exist", kernel.0))
        })?;
        self.counts.kernels_released += 1;
        trace!("Released kernel {}", released.name);
        Ok(())
    }

    fn set_arg(&mut self, kernel: KernelHandle, index: usize, arg: KernelArg) -> Result<()> {
        match arg {
            KernelArg::Buffer(id) => {
                self.buffer(id)?;
            }
            KernelArg::Local(0) => {
                return Err(device_error(
                    CL_INVALID_ARG_SIZE,
                    format!("local argument {index} has zero size"),
                ));
            }
            _ => {}
        }

        let object = self.kernels.get_mut(&kernel.0).ok_or_else(|| {
            device_error(CL_INVALID_KERNEL, format!("kernel {} does not exist", kernel.0))
        })?;
        let arity = object.args.len();
        let slot = object.args.get_mut(index).ok_or_else(|| {
            device_error(
                CL_INVALID_ARG_INDEX,
                format!("{} takes {arity} arguments, index {index} given", object.name),
            )
        })?;
        *slot = Some(arg);
        Ok(())
    }

    fn work_group_info(&self, kernel: KernelHandle) -> Result<WorkGroupInfo> {
        let object = self.kernel(kernel)?;
        let preferred = self
            .config
            .preferred_overrides
            .get(&object.name)
            .copied()
            .unwrap_or(self.config.preferred_multiple);
        Ok(WorkGroupInfo {
            preferred_multiple: preferred,
            max_size: self.config.max_work_group_size,
        })
    }

    fn enqueue_nd_range(&mut self, kernel: KernelHandle, range: NdRange) -> Result<LaunchEvent> {
        let queued = self.clock();
        let object = self.kernel(kernel)?;
        self.check_range(object, range)?;

        let mut args = Vec::with_capacity(object.args.len());
        for (index, bound) in object.args.iter().enumerate() {
            let bound = bound.ok_or_else(|| {
                device_error(
                    CL_INVALID_KERNEL_ARGS,
                    format!("{}: argument {index} is not set", object.name),
                )
            })?;
            args.push(LaunchArg::resolve(bound, |id| {
                Ok(self.buffer(id)?.data.clone())
            })?);
        }
        let name = object.name.clone();
        let program = Arc::clone(&object.kernel);

        let submitted = self.clock();
        let mut launch = HostLaunch::new(args, range);
        let start = self.clock();
        program.run(&mut launch, &self.config.executor)?;
        let end = self.clock();

        for (id, bytes) in launch.into_writes() {
            let target = self.buffer_mut(id)?;
            if target.access == MemAccess::ReadOnly {
                return Err(device_error(
                    CL_INVALID_MEM_OBJECT,
                    format!("{name} wrote to read-only buffer {}", id.0),
                ));
            }
            target.data[..bytes.len()].copy_from_slice(&bytes);
        }

        let event = self.next_id();
        if self.config.profiling {
            self.events.insert(
                event,
                ProfilingInfo {
                    queued,
                    submitted,
                    start,
                    end,
                },
            );
            while self.events.len() > MAX_RETAINED_EVENTS {
                self.events.pop_first();
            }
        }
        self.counts.launches += 1;
        trace!(
            "Launched {name} global={} local={}",
            range.global,
            range.local
        );
        Ok(LaunchEvent(event))
    }

    fn finish(&mut self) -> Result<()> {
        self.counts.finishes += 1;
        Ok(())
    }

    fn profiling_info(&self, event: LaunchEvent) -> Result<ProfilingInfo> {
        if !self.config.profiling {
            return Err(device_error(
                CL_PROFILING_INFO_NOT_AVAILABLE,
                "queue was created without profiling",
            ));
        }
        self.events.get(&event.0).copied().ok_or_else(|| {
            device_error(CL_INVALID_EVENT, format!("event {} does not exist", event.0))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(device: &mut HostDevice, buffer: BufferId, len: usize) -> Vec<i32> {
        let mut out = vec![0u8; len * 4];
        device.read_buffer(buffer, 0, &mut out).unwrap();
        bytemuck::pod_collect_to_vec(&out[..])
    }

    #[test]
    fn test_buffer_round_trip_and_fill() {
        let mut device = HostDevice::reference().unwrap();
        let buffer = device.create_buffer(MemAccess::ReadWrite, 16).unwrap();
        assert_eq!(device.buffer_size(buffer).unwrap(), 16);

        device
            .write_buffer(buffer, 0, bytemuck::cast_slice(&[1i32, 2, 3, 4]))
            .unwrap();
        device
            .fill_buffer(buffer, bytemuck::bytes_of(&9i32), 8, 8)
            .unwrap();
        assert_eq!(ints(&mut device, buffer, 4), vec![1, 2, 9, 9]);

        let err = device.write_buffer(buffer, 12, &[0; 8]).unwrap_err();
        assert!(err.to_string().contains("CL_INVALID_VALUE"));

        device.release_buffer(buffer).unwrap();
        assert!(device.buffer_size(buffer).is_err());
        assert_eq!(device.live_buffers(), 0);
    }

    #[test]
    fn test_zero_sized_buffer_is_rejected() {
        let mut device = HostDevice::reference().unwrap();
        let err = device.create_buffer(MemAccess::ReadOnly, 0).unwrap_err();
        assert!(err.to_string().contains("CL_INVALID_BUFFER_SIZE"));
    }

    #[test]
    fn test_allocation_limit() {
        let config = HostDeviceConfig::default().with_global_mem_size(64);
        let mut device = HostDevice::new(config, &HostProgram::reference()).unwrap();
        let first = device.create_buffer(MemAccess::ReadWrite, 48).unwrap();
        let err = device.create_buffer(MemAccess::ReadWrite, 32).unwrap_err();
        assert!(err.to_string().contains("CL_MEM_OBJECT_ALLOCATION_FAILURE"));

        device.release_buffer(first).unwrap();
        device.create_buffer(MemAccess::ReadWrite, 32).unwrap();
    }

    #[test]
    fn test_unknown_kernel_name() {
        let mut device = HostDevice::reference().unwrap();
        let err = device.create_kernel("min_WG_REDUCE_INT").unwrap_err();
        assert!(err.to_string().contains("CL_INVALID_KERNEL_NAME"));
    }

    #[test]
    fn test_launch_flat_min() {
        let mut device = HostDevice::reference().unwrap();
        let input = device.create_buffer(MemAccess::ReadOnly, 16).unwrap();
        let output = device.create_buffer(MemAccess::ReadWrite, 4).unwrap();
        device
            .write_buffer(input, 0, bytemuck::cast_slice(&[5i32, -2, 8, 0]))
            .unwrap();

        let kernel = device.create_kernel("min_INT").unwrap();
        device.set_arg(kernel, 0, KernelArg::Buffer(input)).unwrap();
        device.set_arg(kernel, 1, KernelArg::Buffer(output)).unwrap();
        device.set_arg(kernel, 2, KernelArg::Local(16)).unwrap();

        let event = device.enqueue_nd_range(kernel, NdRange::new(4, 4)).unwrap();
        device.finish().unwrap();
        assert_eq!(ints(&mut device, output, 1), vec![-2]);

        let info = device.profiling_info(event).unwrap();
        assert!(info.queued <= info.start && info.start <= info.end);
        assert_eq!(device.commands().launches, 1);
    }

    #[test]
    fn test_release_kernel() {
        let mut device = HostDevice::reference().unwrap();
        let first = device.create_kernel("sum_INT").unwrap();
        let second = device.create_kernel("sum_INT").unwrap();
        assert_eq!(device.live_kernels(), 2);

        device.release_kernel(first).unwrap();
        assert_eq!(device.live_kernels(), 1);
        let err = device.release_kernel(first).unwrap_err();
        assert!(err.to_string().contains("CL_INVALID_KERNEL"));
        let err = device.set_arg(first, 0, KernelArg::Local(4)).unwrap_err();
        assert!(err.to_string().contains("CL_INVALID_KERNEL"));

        device.set_arg(second, 2, KernelArg::Local(4)).unwrap();
        assert_eq!(device.commands().kernels_released, 1);
    }

    #[test]
    fn test_only_recent_events_are_retained() {
        let mut device = HostDevice::reference().unwrap();
        let input = device.create_buffer(MemAccess::ReadOnly, 16).unwrap();
        let output = device.create_buffer(MemAccess::ReadWrite, 4).unwrap();
        let kernel = device.create_kernel("max_INT").unwrap();
        device.set_arg(kernel, 0, KernelArg::Buffer(input)).unwrap();
        device.set_arg(kernel, 1, KernelArg::Buffer(output)).unwrap();
        device.set_arg(kernel, 2, KernelArg::Local(16)).unwrap();

        let first = device.enqueue_nd_range(kernel, NdRange::new(4, 4)).unwrap();
        let mut last = first;
        for _ in 0..MAX_RETAINED_EVENTS + 10 {
            last = device.enqueue_nd_range(kernel, NdRange::new(4, 4)).unwrap();
        }
        assert_eq!(device.retained_events(), MAX_RETAINED_EVENTS);
        assert!(device.profiling_info(last).is_ok());
        let err = device.profiling_info(first).unwrap_err();
        assert!(err.to_string().contains("CL_INVALID_EVENT"));
    }

    #[test]
    fn test_launch_geometry_errors() {
        let mut device = HostDevice::new(
            HostDeviceConfig::default().with_max_work_group_size(8),
            &HostProgram::reference(),
        )
        .unwrap();
        let input = device.create_buffer(MemAccess::ReadOnly, 64).unwrap();
        let output = device.create_buffer(MemAccess::ReadWrite, 64).unwrap();
        let kernel = device.create_kernel("sum_INT").unwrap();

        // Argument 2 still unbound
        device.set_arg(kernel, 0, KernelArg::Buffer(input)).unwrap();
        device.set_arg(kernel, 1, KernelArg::Buffer(output)).unwrap();
        let err = device.enqueue_nd_range(kernel, NdRange::new(8, 8)).unwrap_err();
        assert!(err.to_string().contains("CL_INVALID_KERNEL_ARGS"));

        device.set_arg(kernel, 2, KernelArg::Local(64)).unwrap();
        let err = device.enqueue_nd_range(kernel, NdRange::new(16, 16)).unwrap_err();
        assert!(err.to_string().contains("CL_INVALID_WORK_GROUP_SIZE"));
        let err = device.enqueue_nd_range(kernel, NdRange::new(12, 8)).unwrap_err();
        assert!(err.to_string().contains("CL_INVALID_WORK_GROUP_SIZE"));
        let err = device.enqueue_nd_range(kernel, NdRange::new(0, 8)).unwrap_err();
        assert!(err.to_string().contains("CL_INVALID_GLOBAL_WORK_SIZE"));

        let err = device.set_arg(kernel, 3, KernelArg::Local(4)).unwrap_err();
        assert!(err.to_string().contains("CL_INVALID_ARG_INDEX"));
    }

    #[test]
    fn test_local_memory_limit() {
        let mut device = HostDevice::new(
            HostDeviceConfig::default().with_local_mem_size(8),
            &HostProgram::reference(),
        )
        .unwrap();
        let input = device.create_buffer(MemAccess::ReadOnly, 16).unwrap();
        let output = device.create_buffer(MemAccess::ReadWrite, 4).unwrap();
        let kernel = device.create_kernel("max_INT").unwrap();
        device.set_arg(kernel, 0, KernelArg::Buffer(input)).unwrap();
        device.set_arg(kernel, 1, KernelArg::Buffer(output)).unwrap();
        device.set_arg(kernel, 2, KernelArg::Local(16)).unwrap();

        let err = device.enqueue_nd_range(kernel, NdRange::new(4, 4)).unwrap_err();
        assert!(err.to_string().contains("CL_OUT_OF_RESOURCES"));
    }

    #[test]
    fn test_kernel_cannot_write_read_only_buffer() {
        let mut device = HostDevice::reference().unwrap();
        let input = device.create_buffer(MemAccess::ReadOnly, 8).unwrap();
        let kernel = device.create_kernel("sort_INT").unwrap();
        device.set_arg(kernel, 0, KernelArg::Buffer(input)).unwrap();
        device.set_arg(kernel, 1, KernelArg::Buffer(input)).unwrap();
        device.set_arg(kernel, 2, KernelArg::Local(8)).unwrap();
        device
            .set_arg(kernel, 3, KernelArg::Scalar(crate::ScalarArg::U32(0)))
            .unwrap();

        let err = device.enqueue_nd_range(kernel, NdRange::new(2, 2)).unwrap_err();
        assert!(err.to_string().contains("read-only"));
    }

    #[test]
    fn test_preferred_multiple_per_kernel() {
        let config = HostDeviceConfig::default()
            .with_preferred_multiple(16)
            .with_kernel_preference("sum_FLOAT", 4);
        let mut device = HostDevice::new(config, &HostProgram::reference()).unwrap();

        let sum = device.create_kernel("sum_FLOAT").unwrap();
        let min = device.create_kernel("min_FLOAT").unwrap();
        assert_eq!(device.work_group_info(sum).unwrap().preferred_multiple, 4);
        assert_eq!(device.work_group_info(min).unwrap().preferred_multiple, 16);
        assert_eq!(device.work_group_info(min).unwrap().max_size, 1024);
    }

    #[test]
    fn test_profiling_disabled() {
        let mut device = HostDevice::new(
            HostDeviceConfig::default().with_profiling(false),
            &HostProgram::reference(),
        )
        .unwrap();
        let err = device.profiling_info(LaunchEvent(1)).unwrap_err();
        assert!(err.to_string().contains("CL_PROFILING_INFO_NOT_AVAILABLE"));
        assert_eq!(device.commands().total(), 0);
    }
}
