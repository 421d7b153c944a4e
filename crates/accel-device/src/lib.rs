//! Compute device abstraction for accelerator-dispatched statistics
//!
//! [`ComputeDevice`] is the seam between the dispatch engine and an
//! accelerator: buffers, kernels with persistent argument slots, ND-range
//! launches and profiling. [`host::HostDevice`] is the in-process reference
//! implementation with kernels for every statistic. With the `opencl`
//! feature, `opencl::OpenClDevice` runs the same kernels from
//! [`source::KernelSource`] on real hardware.
//!
//! # Example
//!
//! ```rust
//! use accel_device::{ComputeDevice, HostDevice, KernelArg, MemAccess, NdRange};
//!
//! let mut device = HostDevice::reference().unwrap();
//! let input = device.create_buffer(MemAccess::ReadOnly, 16).unwrap();
//! let output = device.create_buffer(MemAccess::ReadWrite, 4).unwrap();
//! device.write_buffer(input, 0, bytemuck::cast_slice(&[3i32, 1, 4, 1])).unwrap();
//!
//! let kernel = device.create_kernel("max_INT").unwrap();
//! device.set_arg(kernel, 0, KernelArg::Buffer(input)).unwrap();
//! device.set_arg(kernel, 1, KernelArg::Buffer(output)).unwrap();
//! device.set_arg(kernel, 2, KernelArg::Local(16)).unwrap();
//! device.enqueue_nd_range(kernel, NdRange::new(4, 4)).unwrap();
//!
//! let mut slot = [0u8; 4];
//! device.read_buffer(output, 0, &mut slot).unwrap();
//! assert_eq!(i32::from_ne_bytes(slot), 4);
//! ```

pub mod codes;
pub mod device;
pub mod host;
#[cfg(feature = "opencl")]
pub mod opencl;
pub mod platform;
pub mod source;

pub use codes::{device_error, error_string};
pub use device::{
    BufferId, ComputeDevice, KernelArg, KernelHandle, LaunchEvent, MemAccess, NdRange,
    ProfilingInfo, ScalarArg, WorkGroupInfo, MAX_RETAINED_EVENTS,
};
pub use host::{GroupExecutor, HostDevice, HostDeviceConfig, HostProgram};
#[cfg(feature = "opencl")]
pub use opencl::OpenClDevice;
pub use platform::{
    format_platforms, list_platforms, select_device, DeviceInfo, DeviceKind, PlatformInfo,
    SelectedDevice,
};
pub use source::{KernelSource, REFERENCE_SOURCE};
