//! OpenCL accelerator backend
//!
//! [`OpenClDevice`] drives a real OpenCL device through `opencl3`: one
//! context, one in-order profiling queue and a program built from
//! [`KernelSource`]. Buffers are untyped byte buffers; kernels keep their
//! arguments between launches exactly as the OpenCL runtime does.
//!
//! Host discovery never fails: a machine without an OpenCL runtime simply
//! reports no OpenCL platforms.

use std::collections::BTreeMap;
use std::fmt;
use std::ptr;

use accel_core::{Error, Result};
use opencl3::command_queue::{CommandQueue, CL_QUEUE_PROFILING_ENABLE};
use opencl3::context::Context;
use opencl3::device::{Device, CL_DEVICE_TYPE_ACCELERATOR, CL_DEVICE_TYPE_ALL, CL_DEVICE_TYPE_GPU};
use opencl3::error_codes::ClError;
use opencl3::event::Event;
use opencl3::kernel::Kernel;
use opencl3::memory::{Buffer, ClMem, CL_MEM_READ_ONLY, CL_MEM_READ_WRITE};
use opencl3::platform::{get_platforms, Platform};
use opencl3::program::Program;
use opencl3::types::{cl_device_id, cl_device_type, CL_BLOCKING};
use tracing::{debug, trace, warn};

use crate::codes::{
    device_error, CL_DEVICE_NOT_FOUND, CL_INVALID_EVENT, CL_INVALID_KERNEL, CL_INVALID_MEM_OBJECT,
    CL_INVALID_PLATFORM,
};
use crate::device::{
    BufferId, ComputeDevice, KernelArg, KernelHandle, LaunchEvent, MemAccess, NdRange,
    ProfilingInfo, ScalarArg, WorkGroupInfo, MAX_RETAINED_EVENTS,
};
use crate::platform::{DeviceInfo, DeviceKind, PlatformInfo};
use crate::source::KernelSource;

fn cl_error(context: &str) -> impl Fn(ClError) -> Error + '_ {
    move |e| device_error(e.0, context.to_string())
}

fn device_kind(dev_type: cl_device_type) -> DeviceKind {
    if dev_type & CL_DEVICE_TYPE_GPU != 0 {
        DeviceKind::Gpu
    } else if dev_type & CL_DEVICE_TYPE_ACCELERATOR != 0 {
        DeviceKind::Accelerator
    } else {
        DeviceKind::Cpu
    }
}

fn describe_device(id: cl_device_id) -> DeviceInfo {
    let device = Device::new(id);
    DeviceInfo {
        name: device.name().unwrap_or_default().trim().to_string(),
        kind: device_kind(device.dev_type().unwrap_or(0)),
        compute_units: device.max_compute_units().unwrap_or(1) as usize,
        max_work_group_size: device.max_work_group_size().unwrap_or(1),
        local_mem_size: device.local_mem_size().unwrap_or(0) as usize,
    }
}

fn platform_devices(platform: &Platform) -> Vec<cl_device_id> {
    platform.get_devices(CL_DEVICE_TYPE_ALL).unwrap_or_default()
}

fn installed_platforms() -> Vec<Platform> {
    match get_platforms() {
        Ok(platforms) => platforms,
        Err(e) => {
            debug!("No OpenCL runtime: {}", e);
            Vec::new()
        }
    }
}

/// OpenCL platforms installed on this machine, with their devices
pub fn list_opencl_platforms() -> Vec<PlatformInfo> {
    installed_platforms()
        .iter()
        .map(|platform| PlatformInfo {
            name: platform.name().unwrap_or_default().trim().to_string(),
            vendor: platform.vendor().unwrap_or_default().trim().to_string(),
            version: platform.version().unwrap_or_default().trim().to_string(),
            devices: platform_devices(platform)
                .into_iter()
                .map(describe_device)
                .collect(),
        })
        .collect()
}

struct ClBuffer {
    mem: Buffer<u8>,
    size: usize,
}

struct ClKernel {
    name: String,
    kernel: Kernel,
}

/// A real OpenCL device with the statistics program built on it
pub struct OpenClDevice {
    // Declared before the context so they are released first
    buffers: BTreeMap<u64, ClBuffer>,
    kernels: BTreeMap<u64, ClKernel>,
    events: BTreeMap<u64, Event>,
    program: Program,
    queue: CommandQueue,
    context: Context,
    device: Device,
    device_name: String,
    platform_name: String,
    max_work_group_size: usize,
    next_id: u64,
}

impl OpenClDevice {
    /// Open device `device` of OpenCL platform `platform` and build `source` with `options`
    pub fn open(platform: usize, device: usize, source: &KernelSource, options: &str) -> Result<Self> {
        let platforms = installed_platforms();
        let Some(cl_platform) = platforms.get(platform) else {
            return Err(device_error(
                CL_INVALID_PLATFORM,
                format!("OpenCL platform {platform} requested, {} available", platforms.len()),
            ));
        };
        let ids = platform_devices(cl_platform);
        let Some(&id) = ids.get(device) else {
            return Err(device_error(
                CL_DEVICE_NOT_FOUND,
                format!("device {device} requested, {} available", ids.len()),
            ));
        };
        let platform_name = cl_platform.name().unwrap_or_default().trim().to_string();
        Self::new(Device::new(id), platform_name, source, options)
    }

    fn new(device: Device, platform_name: String, source: &KernelSource, options: &str) -> Result<Self> {
        let device_name = device.name().unwrap_or_default().trim().to_string();
        let max_work_group_size = device.max_work_group_size().map_err(cl_error("CL_DEVICE_MAX_WORK_GROUP_SIZE"))?;

        let context = Context::from_device(&device).map_err(cl_error("clCreateContext"))?;
        // OpenCL 1.2 entry point, still the only one some runtimes ship
        #[allow(deprecated)]
        let queue = CommandQueue::create_default(&context, CL_QUEUE_PROFILING_ENABLE)
            .map_err(cl_error("clCreateCommandQueue"))?;

        let program = build_program(&context, &device, source, options)?;
        debug!(
            "Created OpenCL device {} on {} (max work-group {})",
            device_name, platform_name, max_work_group_size
        );

        Ok(Self {
            buffers: BTreeMap::new(),
            kernels: BTreeMap::new(),
            events: BTreeMap::new(),
            program,
            queue,
            context,
            device,
            device_name,
            platform_name,
            max_work_group_size,
            next_id: 1,
        })
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn buffer(&self, id: BufferId) -> Result<&ClBuffer> {
        self.buffers.get(&id.0).ok_or_else(|| {
            device_error(CL_INVALID_MEM_OBJECT, format!("buffer {} does not exist", id.0))
        })
    }

    fn kernel(&self, handle: KernelHandle) -> Result<&ClKernel> {
        self.kernels.get(&handle.0).ok_or_else(|| {
            device_error(CL_INVALID_KERNEL, format!("kernel {} does not exist", handle.0))
        })
    }
}

/// Compile `source`, turning a failed build into [`Error::Build`] with the device's log
fn build_program(context: &Context, device: &Device, source: &KernelSource, options: &str) -> Result<Program> {
    let mut program = Program::create_from_source(context, source.text())
        .map_err(cl_error("clCreateProgramWithSource"))?;

    if let Err(e) = program.build(context.devices(), options) {
        let status = program.get_build_status(device.id()).unwrap_or(e.0);
        let log = program.get_build_log(device.id()).unwrap_or_default();
        warn!("Building {} failed with {}", source.origin(), e);
        return Err(Error::Build {
            status,
            options: options.to_string(),
            log,
        });
    }
    trace!("Built {} with options '{}'", source.origin(), options);
    Ok(program)
}

impl fmt::Debug for OpenClDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenClDevice")
            .field("device", &self.device_name)
            .field("platform", &self.platform_name)
            .field("buffers", &self.buffers.len())
            .field("kernels", &self.kernels.len())
            .finish()
    }
}

impl ComputeDevice for OpenClDevice {
    fn device_name(&self) -> &str {
        &self.device_name
    }

    fn platform_name(&self) -> &str {
        &self.platform_name
    }

    fn max_work_group_size(&self) -> usize {
        self.max_work_group_size
    }

    fn create_buffer(&mut self, access: MemAccess, size: usize) -> Result<BufferId> {
        let flags = match access {
            MemAccess::ReadOnly => CL_MEM_READ_ONLY,
            MemAccess::ReadWrite => CL_MEM_READ_WRITE,
        };
        let mem = unsafe {
            Buffer::<u8>::create(&self.context, flags, size, ptr::null_mut())
                .map_err(cl_error("clCreateBuffer"))?
        };
        let id = self.next_id();
        self.buffers.insert(id, ClBuffer { mem, size });
        trace!("Created {:?} buffer {} of {} bytes", access, id, size);
        Ok(BufferId(id))
    }

    fn release_buffer(&mut self, buffer: BufferId) -> Result<()> {
        self.buffers.remove(&buffer.0).map(drop).ok_or_else(|| {
            device_error(CL_INVALID_MEM_OBJECT, format!("buffer {} does not exist", buffer.0))
        })
    }

    fn buffer_size(&self, buffer: BufferId) -> Result<usize> {
        Ok(self.buffer(buffer)?.size)
    }

    fn write_buffer(&mut self, buffer: BufferId, offset: usize, data: &[u8]) -> Result<()> {
        let queue = &self.queue;
        let target = self.buffers.get_mut(&buffer.0).ok_or_else(|| {
            device_error(CL_INVALID_MEM_OBJECT, format!("buffer {} does not exist", buffer.0))
        })?;
        unsafe {
            queue
                .enqueue_write_buffer(&mut target.mem, CL_BLOCKING, offset, data, &[])
                .map_err(cl_error("clEnqueueWriteBuffer"))?;
        }
        Ok(())
    }

    fn fill_buffer(
        &mut self,
        buffer: BufferId,
        pattern: &[u8],
        offset: usize,
        size: usize,
    ) -> Result<()> {
        // Fills are asynchronous; wait so the call reads as blocking like the other transfers
        let event = {
            let queue = &self.queue;
            let target = self.buffers.get_mut(&buffer.0).ok_or_else(|| {
                device_error(CL_INVALID_MEM_OBJECT, format!("buffer {} does not exist", buffer.0))
            })?;
            unsafe {
                queue
                    .enqueue_fill_buffer(&mut target.mem, pattern, offset, size, &[])
                    .map_err(cl_error("clEnqueueFillBuffer"))?
            }
        };
        event.wait().map_err(cl_error("clWaitForEvents"))
    }

    fn read_buffer(&mut self, buffer: BufferId, offset: usize, out: &mut [u8]) -> Result<()> {
        let source = self.buffer(buffer)?;
        unsafe {
            self.queue
                .enqueue_read_buffer(&source.mem, CL_BLOCKING, offset, out, &[])
                .map_err(cl_error("clEnqueueReadBuffer"))?;
        }
        Ok(())
    }

    fn create_kernel(&mut self, name: &str) -> Result<KernelHandle> {
        let kernel = Kernel::create(&self.program, name).map_err(|e| {
            device_error(e.0, format!("clCreateKernel({name})"))
        })?;
        let id = self.next_id();
        self.kernels.insert(
            id,
            ClKernel {
                name: name.to_string(),
                kernel,
            },
        );
        trace!("Created kernel {} as {}", name, id);
        Ok(KernelHandle(id))
    }

    fn release_kernel(&mut self, kernel: KernelHandle) -> Result<()> {
        let released = self.kernels.remove(&kernel.0).ok_or_else(|| {
            device_error(CL_INVALID_KERNEL, format!("kernel {} does not exist", kernel.0))
        })?;
        trace!("Released kernel {}", released.name);
        Ok(())
    }

    fn set_arg(&mut self, kernel: KernelHandle, index: usize, arg: KernelArg) -> Result<()> {
        let object = self.kernel(kernel)?;
        let slot = index as u32;
        let result = unsafe {
            match arg {
                KernelArg::Buffer(id) => {
                    let mem = self.buffer(id)?.mem.get();
                    object.kernel.set_arg(slot, &mem)
                }
                KernelArg::Local(bytes) => object.kernel.set_arg_local_buffer(slot, bytes),
                KernelArg::Scalar(ScalarArg::I32(v)) => object.kernel.set_arg(slot, &v),
                KernelArg::Scalar(ScalarArg::U32(v)) => object.kernel.set_arg(slot, &v),
                KernelArg::Scalar(ScalarArg::F32(v)) => object.kernel.set_arg(slot, &v),
            }
        };
        result.map_err(|e| device_error(e.0, format!("clSetKernelArg({}, {index})", object.name)))
    }

    fn work_group_info(&self, kernel: KernelHandle) -> Result<WorkGroupInfo> {
        let object = self.kernel(kernel)?;
        let device = self.device.id();
        Ok(WorkGroupInfo {
            preferred_multiple: object
                .kernel
                .get_work_group_size_multiple(device)
                .map_err(cl_error("CL_KERNEL_PREFERRED_WORK_GROUP_SIZE_MULTIPLE"))?,
            max_size: object
                .kernel
                .get_work_group_size(device)
                .map_err(cl_error("CL_KERNEL_WORK_GROUP_SIZE"))?,
        })
    }

    fn enqueue_nd_range(&mut self, kernel: KernelHandle, range: NdRange) -> Result<LaunchEvent> {
        let object = self.kernel(kernel)?;
        let global = [range.global];
        let local = [range.local];
        let event = unsafe {
            self.queue
                .enqueue_nd_range_kernel(
                    object.kernel.get(),
                    1,
                    ptr::null(),
                    global.as_ptr(),
                    local.as_ptr(),
                    &[],
                )
                .map_err(|e| {
                    device_error(e.0, format!("clEnqueueNDRangeKernel({}, {:?})", object.name, range))
                })?
        };

        let id = self.next_id();
        self.events.insert(id, event);
        while self.events.len() > MAX_RETAINED_EVENTS {
            self.events.pop_first();
        }
        Ok(LaunchEvent(id))
    }

    fn finish(&mut self) -> Result<()> {
        self.queue.finish().map_err(cl_error("clFinish"))
    }

    fn profiling_info(&self, event: LaunchEvent) -> Result<ProfilingInfo> {
        let event = self.events.get(&event.0).ok_or_else(|| {
            device_error(CL_INVALID_EVENT, format!("event {} does not exist", event.0))
        })?;
        let counter = cl_error("clGetEventProfilingInfo");
        Ok(ProfilingInfo {
            queued: event.profiling_command_queued().map_err(&counter)?,
            submitted: event.profiling_command_submit().map_err(&counter)?,
            start: event.profiling_command_start().map_err(&counter)?,
            end: event.profiling_command_end().map_err(&counter)?,
        })
    }
}
