//! Platform and device discovery
//!
//! Platforms and devices are addressed by index, the way the command line
//! selects them. Platform 0 is always the in-process host reference
//! platform; with the `opencl` feature every installed OpenCL platform
//! follows it, in the order the runtime reports them.

use std::fmt::Write;

use accel_core::Result;
use tracing::info;

use crate::codes::{device_error, CL_DEVICE_NOT_FOUND, CL_INVALID_PLATFORM};
use crate::device::{
    BufferId, ComputeDevice, KernelArg, KernelHandle, LaunchEvent, MemAccess, NdRange,
    ProfilingInfo, WorkGroupInfo,
};
#[cfg(feature = "parallel")]
use crate::host::GroupExecutor;
use crate::host::{HostDevice, HostDeviceConfig, HostProgram, HOST_DEVICE_NAME, HOST_PLATFORM_NAME};
#[cfg(feature = "opencl")]
use crate::opencl::{list_opencl_platforms, OpenClDevice};
use crate::source::KernelSource;

/// Kind of compute device
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceKind {
    Cpu,
    Gpu,
    Accelerator,
}

/// Description of one device on a platform
#[derive(Clone, Debug, PartialEq)]
pub struct DeviceInfo {
    pub name: String,
    pub kind: DeviceKind,
    pub compute_units: usize,
    pub max_work_group_size: usize,
    pub local_mem_size: usize,
}

/// Description of one platform and its devices
#[derive(Clone, Debug, PartialEq)]
pub struct PlatformInfo {
    pub name: String,
    pub vendor: String,
    pub version: String,
    pub devices: Vec<DeviceInfo>,
}

fn host_configs() -> Vec<HostDeviceConfig> {
    let sequential = HostDeviceConfig::default().with_name(format!("{HOST_DEVICE_NAME} (sequential)"));
    #[cfg(feature = "parallel")]
    {
        let parallel = HostDeviceConfig::default()
            .with_name(format!("{HOST_DEVICE_NAME} (parallel)"))
            .with_executor(GroupExecutor::parallel());
        vec![sequential, parallel]
    }
    #[cfg(not(feature = "parallel"))]
    {
        vec![sequential]
    }
}

fn host_platform() -> PlatformInfo {
    let devices = host_configs()
        .into_iter()
        .map(|config| DeviceInfo {
            compute_units: config.executor.num_threads(),
            name: config.name,
            kind: DeviceKind::Cpu,
            max_work_group_size: config.max_work_group_size,
            local_mem_size: config.local_mem_size,
        })
        .collect();

    PlatformInfo {
        name: HOST_PLATFORM_NAME.to_string(),
        vendor: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        devices,
    }
}

/// Every platform with its devices
pub fn list_platforms() -> Vec<PlatformInfo> {
    #[allow(unused_mut)]
    let mut platforms = vec![host_platform()];
    #[cfg(feature = "opencl")]
    platforms.extend(list_opencl_platforms());
    platforms
}

/// Device opened by [`select_device`]
#[derive(Debug)]
pub enum SelectedDevice {
    Host(HostDevice),
    #[cfg(feature = "opencl")]
    OpenCl(OpenClDevice),
}

/// Open device `device` of platform `platform` with `source` built on it
pub fn select_device(
    platform: usize,
    device: usize,
    source: &KernelSource,
    options: &str,
) -> Result<SelectedDevice> {
    let platforms = list_platforms();
    let Some(info) = platforms.get(platform) else {
        return Err(device_error(
            CL_INVALID_PLATFORM,
            format!(
                "platform {platform} requested, {} available",
                platforms.len()
            ),
        ));
    };
    if device >= info.devices.len() {
        return Err(device_error(
            CL_DEVICE_NOT_FOUND,
            format!(
                "device {device} requested on {}, {} available",
                info.name,
                info.devices.len()
            ),
        ));
    }
    info!("Using platform: {}", info.name);
    info!("Using device: {}", info.devices[device].name);
    info!("Building kernels from {}", source.origin());

    if platform == 0 {
        let config = host_configs().swap_remove(device);
        let program = HostProgram::from_source(source).with_options(options);
        return HostDevice::new(config, &program).map(SelectedDevice::Host);
    }

    #[cfg(feature = "opencl")]
    {
        OpenClDevice::open(platform - 1, device, source, options).map(SelectedDevice::OpenCl)
    }
    #[cfg(not(feature = "opencl"))]
    {
        opencl_disabled(platform)
    }
}

#[cfg(not(feature = "opencl"))]
fn opencl_disabled(platform: usize) -> Result<SelectedDevice> {
    Err(device_error(
        CL_INVALID_PLATFORM,
        format!("platform {platform} needs the opencl feature"),
    ))
}

macro_rules! delegate {
    ($self:ident, $device:ident => $call:expr) => {
        match $self {
            SelectedDevice::Host($device) => $call,
            #[cfg(feature = "opencl")]
            SelectedDevice::OpenCl($device) => $call,
        }
    };
}

impl ComputeDevice for SelectedDevice {
    fn device_name(&self) -> &str {
        delegate!(self, d => d.device_name())
    }

    fn platform_name(&self) -> &str {
        delegate!(self, d => d.platform_name())
    }

    fn max_work_group_size(&self) -> usize {
        delegate!(self, d => d.max_work_group_size())
    }

    fn create_buffer(&mut self, access: MemAccess, size: usize) -> Result<BufferId> {
        delegate!(self, d => d.create_buffer(access, size))
    }

    fn release_buffer(&mut self, buffer: BufferId) -> Result<()> {
        delegate!(self, d => d.release_buffer(buffer))
    }

    fn buffer_size(&self, buffer: BufferId) -> Result<usize> {
        delegate!(self, d => d.buffer_size(buffer))
    }

    fn write_buffer(&mut self, buffer: BufferId, offset: usize, data: &[u8]) -> Result<()> {
        delegate!(self, d => d.write_buffer(buffer, offset, data))
    }

    fn fill_buffer(
        &mut self,
        buffer: BufferId,
        pattern: &[u8],
        offset: usize,
        size: usize,
    ) -> Result<()> {
        delegate!(self, d => d.fill_buffer(buffer, pattern, offset, size))
    }

    fn read_buffer(&mut self, buffer: BufferId, offset: usize, out: &mut [u8]) -> Result<()> {
        delegate!(self, d => d.read_buffer(buffer, offset, out))
    }

    fn create_kernel(&mut self, name: &str) -> Result<KernelHandle> {
        delegate!(self, d => d.create_kernel(name))
    }

    fn release_kernel(&mut self, kernel: KernelHandle) -> Result<()> {
        delegate!(self, d => d.release_kernel(kernel))
    }

    fn set_arg(&mut self, kernel: KernelHandle, index: usize, arg: KernelArg) -> Result<()> {
        delegate!(self, d => d.set_arg(kernel, index, arg))
    }

    fn work_group_info(&self, kernel: KernelHandle) -> Result<WorkGroupInfo> {
        delegate!(self, d => d.work_group_info(kernel))
    }

    fn enqueue_nd_range(&mut self, kernel: KernelHandle, range: NdRange) -> Result<LaunchEvent> {
        delegate!(self, d => d.enqueue_nd_range(kernel, range))
    }

    fn finish(&mut self) -> Result<()> {
        delegate!(self, d => d.finish())
    }

    fn profiling_info(&self, event: LaunchEvent) -> Result<ProfilingInfo> {
        delegate!(self, d => d.profiling_info(event))
    }
}

/// Render the platform list as the console listing
pub fn format_platforms(platforms: &[PlatformInfo]) -> String {
    let mut out = String::new();
    for (p, platform) in platforms.iter().enumerate() {
        let _ = writeln!(
            out,
            "Platform {p}: {} ({}, {})",
            platform.name, platform.vendor, platform.version
        );
        for (d, device) in platform.devices.iter().enumerate() {
            let _ = writeln!(
                out,
                "\tDevice {d}: {} [{:?}] compute units: {}, max work-group: {}, local memory: {} KiB",
                device.name,
                device.kind,
                device.compute_units,
                device.max_work_group_size,
                device.local_mem_size / 1024
            );
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use accel_core::Error;

    fn open(platform: usize, device: usize) -> Result<SelectedDevice> {
        select_device(platform, device, &KernelSource::reference(), "")
    }

    #[test]
    fn test_host_platform_is_listed_first() {
        let platforms = list_platforms();
        assert_eq!(platforms[0].name, HOST_PLATFORM_NAME);
        assert!(!platforms[0].devices.is_empty());
        assert_eq!(platforms[0].devices[0].max_work_group_size, 1024);
    }

    #[test]
    fn test_select_default_device() {
        let device = open(0, 0).unwrap();
        assert!(matches!(device, SelectedDevice::Host(_)));
        assert_eq!(device.platform_name(), HOST_PLATFORM_NAME);
        assert!(device.device_name().starts_with(HOST_DEVICE_NAME));
    }

    #[test]
    fn test_unknown_indices() {
        let past_end = list_platforms().len();
        let err = open(past_end, 0).unwrap_err();
        assert!(matches!(err, Error::Device { code: CL_INVALID_PLATFORM, .. }));

        let err = open(0, 99).unwrap_err();
        assert!(matches!(err, Error::Device { code: CL_DEVICE_NOT_FOUND, .. }));
    }

    #[test]
    fn test_loaded_source_limits_kernels() {
        let source = KernelSource::new(
            "partial.cl",
            "__kernel void max_INT(__global const int *in, __global int *out, __local int *s) {}",
        );
        let mut device = select_device(0, 0, &source, "-cl-fast-relaxed-math").unwrap();
        device.create_kernel("max_INT").unwrap();
        let err = device.create_kernel("min_INT").unwrap_err();
        assert!(err.to_string().contains("CL_INVALID_KERNEL_NAME"));
    }

    #[test]
    fn test_build_failure_carries_options_and_log() {
        let source = KernelSource::new("custom.cl", "__kernel void median_INT(__global int *a) {}");
        match select_device(0, 0, &source, "-Dfast -bogus") {
            Err(Error::Build { options, log, .. }) => {
                assert_eq!(options, "-Dfast -bogus");
                assert!(log.contains("unknown build option '-bogus'"));
                assert!(log.contains("custom.cl: error: no host implementation for kernel 'median_INT'"));
            }
            other => panic!("expected a build failure, got {other:?}"),
        }
    }

    #[test]
    fn test_listing_format() {
        let listing = format_platforms(&list_platforms());
        assert!(listing.starts_with("Platform 0: Host Reference Platform"));
        assert!(listing.contains("\tDevice 0: Host Reference Device (sequential)"));
    }
}
