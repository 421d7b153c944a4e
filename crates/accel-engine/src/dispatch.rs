//! The dispatch engine
//!
//! [`StatsEngine`] owns a device, the host series, the device buffers and
//! the kernel table. Each statistic resolves its kernel, optionally
//! auto-tunes the work-group size, makes sure the device holds the current
//! padded series, binds arguments, launches (recursively across work-groups
//! when enabled) and reads slot 0 back.

use std::fmt;
use std::mem::size_of;
use std::time::{Duration, Instant};

use accel_core::{
    baseline, ElementKind, EngineConfig, Error, Numeric, Result, Series, StatResults,
};
use accel_device::{ComputeDevice, KernelHandle, NdRange, ProfilingInfo};
use tracing::{debug, info, instrument, warn};

use crate::buffers::{BufferRole, DeviceBuffers};
use crate::kernels::{
    bind_reduction, bind_std_dev, bind_valid_count, KernelId, KernelTable, Statistic,
};

/// Timing of one profiled launch
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchRecord {
    pub kernel: String,
    pub global: usize,
    pub local: usize,
    /// Wall-clock time around the enqueue call
    pub host_elapsed: Duration,
    /// Device timestamps read after the queue drained
    pub profile: ProfilingInfo,
}

impl fmt::Display for LaunchRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (global {}, local {}): host {:.3}ms, device queued {} submitted {} start {} end {} ({:.3}ms)",
            self.kernel,
            self.global,
            self.local,
            self.host_elapsed.as_secs_f64() * 1000.0,
            self.profile.queued,
            self.profile.submitted,
            self.profile.start,
            self.profile.end,
            self.profile.execution().as_secs_f64() * 1000.0
        )
    }
}

/// Statistics engine for element type `T` on device `D`
#[derive(Debug)]
pub struct StatsEngine<T: Numeric, D: ComputeDevice> {
    pub(crate) device: D,
    pub(crate) kind: ElementKind,
    pub(crate) config: EngineConfig<T>,
    pub(crate) series: Series<T>,
    pub(crate) buffers: DeviceBuffers<T>,
    pub(crate) kernels: KernelTable,
    /// Device buffers no longer match the series or the group size
    pub(crate) layout_stale: bool,
    pub(crate) results: StatResults<T>,
    pub(crate) sorted: Option<Vec<T>>,
    pub(crate) launch_log: Vec<LaunchRecord>,
}

impl<T: Numeric, D: ComputeDevice> StatsEngine<T, D> {
    /// Create an engine over `values`
    ///
    /// Fails with [`Error::UnsupportedElementType`] for any element type other
    /// than `i32` or `f32`, before the device is used.
    pub fn new(mut device: D, values: Vec<T>, config: EngineConfig<T>) -> Result<Self> {
        let kind = ElementKind::check::<T>()?;
        config.validate()?;
        let config = Self::gate_recursion(kind, config);

        let kernels = KernelTable::build(&mut device, kind, config.group_recursion)?;
        info!(
            "Engine ready on {} / {}: {} values, {kind} kernels, group size {}",
            device.platform_name(),
            device.device_name(),
            values.len(),
            config.group_size
        );

        Ok(Self {
            device,
            kind,
            config,
            series: Series::new(values),
            buffers: DeviceBuffers::new(),
            kernels,
            layout_stale: true,
            results: StatResults::new(),
            sorted: None,
            launch_log: Vec::new(),
        })
    }

    fn gate_recursion(kind: ElementKind, mut config: EngineConfig<T>) -> EngineConfig<T> {
        if config.group_recursion && !kind.supports_group_recursion() {
            warn!("Work-group recursion is not available for {kind} data; ignoring");
            config.group_recursion = false;
        }
        config
    }

    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    pub fn config(&self) -> &EngineConfig<T> {
        &self.config
    }

    pub fn series(&self) -> &Series<T> {
        &self.series
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn group_size(&self) -> usize {
        self.config.group_size
    }

    /// Statistics computed so far
    pub fn results(&self) -> &StatResults<T> {
        &self.results
    }

    /// Padded sequence from the last converged sort
    pub fn sorted(&self) -> Option<&[T]> {
        self.sorted.as_deref()
    }

    /// Profiled launches, oldest first
    pub fn launch_log(&self) -> &[LaunchRecord] {
        &self.launch_log
    }

    /// Kernel name the engine will launch for `statistic`
    pub fn kernel_name(&self, statistic: Statistic) -> Result<String> {
        Ok(self.kernels.get(statistic)?.0.name())
    }

    /// Host-only statistics over the raw series
    pub fn baseline(&self) -> Result<StatResults<T>> {
        baseline(self.series.raw())
    }

    /// Replace the whole configuration
    ///
    /// A new group size or neutral value re-pads the series and re-sizes the
    /// device buffers before the next dispatch, and forgets every recorded
    /// result; a new recursion setting rebuilds the kernel table.
    pub fn configure(&mut self, config: EngineConfig<T>) -> Result<()> {
        config.validate()?;
        let config = Self::gate_recursion(self.kind, config);

        if config.group_recursion != self.config.group_recursion {
            let kernels = KernelTable::build(&mut self.device, self.kind, config.group_recursion)?;
            std::mem::replace(&mut self.kernels, kernels).release(&mut self.device)?;
        }
        if config.group_size != self.config.group_size
            || config.neutral_value != self.config.neutral_value
        {
            // Recorded values were taken over the old padding
            self.layout_stale = true;
            self.results = StatResults::new();
            self.sorted = None;
        }
        self.config = config;
        Ok(())
    }

    pub fn set_group_size(&mut self, group_size: usize) -> Result<()> {
        let config = self.config.clone().with_group_size(group_size);
        self.configure(config)
    }

    pub fn set_neutral_value(&mut self, neutral_value: T) -> Result<()> {
        let config = self.config.clone().with_neutral_value(neutral_value);
        self.configure(config)
    }

    pub fn set_auto_tune(&mut self, auto_tune: bool) {
        self.config.auto_tune = auto_tune;
    }

    pub fn set_verbose(&mut self, verbose: bool) {
        self.config.verbose = verbose;
    }

    pub fn set_profiling(&mut self, profile: bool) {
        self.config.profile = profile;
    }

    pub fn set_group_recursion(&mut self, group_recursion: bool) -> Result<()> {
        let config = self.config.clone().with_group_recursion(group_recursion);
        self.configure(config)
    }

    pub fn set_max_sort_passes(&mut self, max_sort_passes: usize) -> Result<()> {
        let config = self.config.clone().with_max_sort_passes(max_sort_passes);
        self.configure(config)
    }

    /// Pad the series to the current group size with the neutral value
    pub fn pad_data(&mut self) -> Result<usize> {
        self.pad_series(true)
    }

    fn pad_series(&mut self, announce: bool) -> Result<usize> {
        let neutral = self.config.neutral_value;
        let added = self.series.pad(self.config.group_size, neutral)?;
        if added > 0 {
            debug!(
                "Padded {} values to {} with {added} copies of {neutral}",
                self.series.raw_len(),
                self.series.padded_len()
            );
            if announce && neutral != T::zero() {
                warn!(
                    "Device sums include {added} padded copies of {neutral}; subtract {} to recover the raw sum",
                    self.series.pad_contribution()
                );
            }
        }
        Ok(added)
    }

    /// Pad the series, upload it and size the output buffers
    pub fn write_data_to_device(&mut self) -> Result<()> {
        self.sync_device(true)
    }

    fn sync_device(&mut self, announce: bool) -> Result<()> {
        if self.series.is_empty() {
            return Err(Error::empty_input());
        }
        self.pad_series(announce)?;
        self.buffers.upload(&mut self.device, self.series.as_slice())?;
        self.buffers.allocate_outputs(
            &mut self.device,
            self.series.group_count(self.config.group_size),
            self.series.padded_len(),
        )?;
        self.layout_stale = false;
        Ok(())
    }

    fn local_bytes(&self) -> usize {
        self.config.group_size * size_of::<T>()
    }

    /// Resolve the kernel and bring the device up to date for one statistic
    pub(crate) fn prepare(&mut self, statistic: Statistic) -> Result<(KernelId, KernelHandle)> {
        if self.series.is_empty() {
            return Err(Error::empty_input());
        }
        let (id, handle) = self.kernels.get(statistic)?;

        if self.config.auto_tune {
            let preferred = self.device.work_group_info(handle)?.preferred_multiple;
            if preferred > 0 && preferred != self.config.group_size {
                debug!(
                    "Auto-tuning {id}: work-group size {} -> {preferred}",
                    self.config.group_size
                );
                self.config.group_size = preferred;
                self.layout_stale = true;
            }
        }

        if self.layout_stale {
            self.sync_device(false)?;
        }
        self.buffers.reset(&mut self.device, statistic.output())?;
        Ok((id, handle))
    }

    /// One launch, with the verbose report and profiling the configuration asks for
    pub(crate) fn launch(&mut self, id: &KernelId, handle: KernelHandle, range: NdRange) -> Result<()> {
        if self.config.verbose {
            let info = self.device.work_group_info(handle)?;
            info!(
                "{id}: preferred work-group multiple {}, max work-group size {}, global size {}, local size {}",
                info.preferred_multiple, info.max_size, range.global, range.local
            );
            self.config.verbose = false;
        }

        if !self.config.profile {
            self.device.enqueue_nd_range(handle, range)?;
            return Ok(());
        }

        let started = Instant::now();
        let event = self.device.enqueue_nd_range(handle, range)?;
        let host_elapsed = started.elapsed();
        self.device.finish()?;
        let profile = self.device.profiling_info(event)?;

        let record = LaunchRecord {
            kernel: id.name(),
            global: range.global,
            local: range.local,
            host_elapsed,
            profile,
        };
        info!("{record}");
        self.launch_log.push(record);
        Ok(())
    }

    /// Flat launches produce a final answer only from a single work-group
    fn require_single_group(&self, id: &KernelId) -> Result<()> {
        let padded = self.series.padded_len();
        let group_size = self.config.group_size;
        if padded != group_size {
            return Err(Error::InvalidConfiguration(format!(
                "{id} reduces each work-group separately, but {padded} padded values with group size {group_size} form {} work-groups; use a group size of {padded} or enable work-group recursion",
                self.series.group_count(group_size)
            )));
        }
        Ok(())
    }

    fn reduce(&mut self, statistic: Statistic) -> Result<T> {
        let (id, handle) = self.prepare(statistic)?;
        if !id.recursive {
            self.require_single_group(&id)?;
        }

        let local_bytes = self.local_bytes();
        let group_size = self.config.group_size;
        let mut source = BufferRole::Data;
        let mut target = statistic.output();

        if id.recursive {
            let mut pending = self.series.padded_len();
            if pending > group_size && group_size < 2 {
                return Err(Error::InvalidConfiguration(format!(
                    "work-group recursion over {pending} values needs a group size of at least 2"
                )));
            }
            // Each level reads the previous level's partials from a different buffer
            while pending > group_size {
                self.bind_level(handle, source, target, local_bytes)?;
                bind_valid_count(&mut self.device, handle, pending)?;
                let global = pending.div_ceil(group_size) * group_size;
                self.launch(&id, handle, NdRange::new(global, group_size))?;

                source = target;
                target = if target == BufferRole::Partials {
                    statistic.output()
                } else {
                    BufferRole::Partials
                };
                pending = pending.div_ceil(group_size);
            }
            bind_valid_count(&mut self.device, handle, pending)?;
        }
        self.bind_level(handle, source, target, local_bytes)?;
        self.launch(&id, handle, NdRange::new(group_size, group_size))?;

        self.buffers.read_slot0(&mut self.device, target)
    }

    fn bind_level(
        &mut self,
        handle: KernelHandle,
        source: BufferRole,
        target: BufferRole,
        local_bytes: usize,
    ) -> Result<()> {
        let input = self.buffers.id(source)?;
        let output = self.buffers.id(target)?;
        bind_reduction(&mut self.device, handle, input, output, local_bytes)
    }

    #[instrument(skip(self), level = "debug")]
    pub fn min(&mut self) -> Result<T> {
        let value = self.reduce(Statistic::Min)?;
        self.results.minimum = Some(value);
        Ok(value)
    }

    #[instrument(skip(self), level = "debug")]
    pub fn max(&mut self) -> Result<T> {
        let value = self.reduce(Statistic::Max)?;
        self.results.maximum = Some(value);
        Ok(value)
    }

    /// Sum over the padded series; also records the mean over the raw length
    #[instrument(skip(self), level = "debug")]
    pub fn sum(&mut self) -> Result<T> {
        let value = self.reduce(Statistic::Sum)?;
        self.results.sum = Some(value);
        self.results.mean = Some(value.to_f64() / self.series.raw_len() as f64);
        Ok(value)
    }

    /// Mean from the recorded sum, computing the sum first if needed
    #[instrument(skip(self), level = "debug")]
    pub fn average(&mut self) -> Result<f64> {
        let sum = match self.results.sum {
            Some(sum) => sum,
            None => self.sum()?,
        };
        let mean = sum.to_f64() / self.series.raw_len() as f64;
        self.results.mean = Some(mean);
        Ok(mean)
    }

    /// Population standard deviation about the recorded mean
    #[instrument(skip(self), level = "debug")]
    pub fn std_deviation(&mut self) -> Result<f64> {
        let mean = self.results.mean.ok_or_else(|| {
            Error::MissingPrerequisite(
                "standard deviation needs the mean; compute the sum or average first".to_string(),
            )
        })?;

        let (id, handle) = self.prepare(Statistic::StdDev)?;
        self.require_single_group(&id)?;

        let input = self.buffers.id(BufferRole::Data)?;
        let output = self.buffers.id(BufferRole::StdDev)?;
        let local_bytes = self.local_bytes();
        let raw_len = self.series.raw_len();
        bind_std_dev(
            &mut self.device,
            handle,
            input,
            output,
            mean as f32,
            local_bytes,
            raw_len,
        )?;
        let group_size = self.config.group_size;
        self.launch(&id, handle, NdRange::new(group_size, group_size))?;

        let slot = self.buffers.read_slot0(&mut self.device, BufferRole::StdDev)?;
        let std_dev = self
            .kind
            .std_dev_policy()
            .finalize(slot.to_f64(), self.series.raw_len());
        self.results.std_deviation = Some(std_dev);
        Ok(std_dev)
    }

    /// Every reduction in dependency order, then the sort when `with_sort` is set
    pub fn run_all(&mut self, with_sort: bool) -> Result<&StatResults<T>> {
        self.min()?;
        self.max()?;
        self.sum()?;
        self.average()?;
        self.std_deviation()?;
        if with_sort {
            self.sort()?;
        }
        Ok(&self.results)
    }
}

impl<T: Numeric, D: ComputeDevice> Drop for StatsEngine<T, D> {
    fn drop(&mut self) {
        if let Err(e) = self.buffers.release_all(&mut self.device) {
            debug!("Releasing device buffers failed: {e}");
        }
        let kernels = std::mem::replace(&mut self.kernels, KernelTable::empty());
        if let Err(e) = kernels.release(&mut self.device) {
            debug!("Releasing kernels failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use accel_device::{HostDevice, HostDeviceConfig, HostProgram};
    use approx::assert_relative_eq;

    fn engine<T: Numeric>(values: Vec<T>, config: EngineConfig<T>) -> StatsEngine<T, HostDevice> {
        StatsEngine::new(HostDevice::reference().unwrap(), values, config).unwrap()
    }

    #[test]
    fn test_flat_reductions_single_group() {
        let mut engine = engine(vec![4, -2, 9, 7, 1, 3], EngineConfig::new(8, 0));
        assert_eq!(engine.min().unwrap(), -2);
        assert_eq!(engine.max().unwrap(), 9);
        assert_eq!(engine.sum().unwrap(), 22);
        assert_relative_eq!(engine.average().unwrap(), 22.0 / 6.0);
        assert_eq!(engine.series().padded_len(), 8);
    }

    #[test]
    fn test_average_runs_sum_when_missing() {
        let mut engine = engine(vec![1.0f32, 2.0, 3.0, 6.0], EngineConfig::new(4, 0.0));
        assert!(engine.results().sum.is_none());
        assert_relative_eq!(engine.average().unwrap(), 3.0);
        assert_eq!(engine.results().sum, Some(12.0));
    }

    #[test]
    fn test_std_dev_requires_mean() {
        let mut engine = engine(vec![1, 2, 3, 4], EngineConfig::new(4, 0));
        let err = engine.std_deviation().unwrap_err();
        assert!(matches!(err, Error::MissingPrerequisite(_)));
    }

    #[test]
    fn test_std_dev_excludes_padding_for_both_types() {
        // Eight padded zeros would pull the deviation up if they were counted
        let mut ints = engine(vec![2, 4, 4, 4, 5, 5, 7, 9], EngineConfig::new(16, 0));
        ints.average().unwrap();
        assert_relative_eq!(ints.std_deviation().unwrap(), 2.0);

        let mut floats = engine(
            vec![2.0f32, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0],
            EngineConfig::new(16, 0.0),
        );
        floats.average().unwrap();
        assert_relative_eq!(floats.std_deviation().unwrap(), 2.0, epsilon = 1e-6);
    }

    #[test]
    fn test_flat_reduction_rejects_multiple_groups() {
        let mut engine = engine(vec![1.0f32; 10], EngineConfig::new(4, 0.0));
        let err = engine.sum().unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));
        assert!(err.to_string().contains("3 work-groups"));
    }

    #[test]
    fn test_recursive_sum_over_many_groups() {
        let values: Vec<f32> = (1..=100).map(|v| v as f32).collect();
        let mut engine = engine(
            values,
            EngineConfig::new(4, 0.0).with_group_recursion(true),
        );
        assert_eq!(engine.kernel_name(Statistic::Sum).unwrap(), "sum_WG_REDUCE_FLOAT");
        assert_eq!(engine.sum().unwrap(), 5050.0);
        assert_eq!(engine.min().unwrap(), 1.0);
        assert_eq!(engine.max().unwrap(), 100.0);
    }

    /// Host device that notes every launch binding one buffer as both input and output
    struct AliasWatch {
        inner: HostDevice,
        names: std::collections::BTreeMap<u64, String>,
        bound: std::collections::BTreeMap<(u64, usize), u64>,
        aliased: Vec<String>,
    }

    impl AliasWatch {
        fn new() -> Self {
            Self {
                inner: HostDevice::reference().unwrap(),
                names: Default::default(),
                bound: Default::default(),
                aliased: Vec::new(),
            }
        }
    }

    impl ComputeDevice for AliasWatch {
        fn device_name(&self) -> &str {
            self.inner.device_name()
        }
        fn platform_name(&self) -> &str {
            self.inner.platform_name()
        }
        fn max_work_group_size(&self) -> usize {
            self.inner.max_work_group_size()
        }
        fn create_buffer(&mut self, access: accel_device::MemAccess, size: usize) -> Result<accel_device::BufferId> {
            self.inner.create_buffer(access, size)
        }
        fn release_buffer(&mut self, buffer: accel_device::BufferId) -> Result<()> {
            self.inner.release_buffer(buffer)
        }
        fn buffer_size(&self, buffer: accel_device::BufferId) -> Result<usize> {
            self.inner.buffer_size(buffer)
        }
        fn write_buffer(&mut self, buffer: accel_device::BufferId, offset: usize, data: &[u8]) -> Result<()> {
            self.inner.write_buffer(buffer, offset, data)
        }
        fn fill_buffer(&mut self, buffer: accel_device::BufferId, pattern: &[u8], offset: usize, size: usize) -> Result<()> {
            self.inner.fill_buffer(buffer, pattern, offset, size)
        }
        fn read_buffer(&mut self, buffer: accel_device::BufferId, offset: usize, out: &mut [u8]) -> Result<()> {
            self.inner.read_buffer(buffer, offset, out)
        }
        fn create_kernel(&mut self, name: &str) -> Result<KernelHandle> {
            let handle = self.inner.create_kernel(name)?;
            self.names.insert(handle.0, name.to_string());
            Ok(handle)
        }
        fn release_kernel(&mut self, kernel: KernelHandle) -> Result<()> {
            self.inner.release_kernel(kernel)
        }
        fn set_arg(&mut self, kernel: KernelHandle, index: usize, arg: accel_device::KernelArg) -> Result<()> {
            if let accel_device::KernelArg::Buffer(id) = arg {
                self.bound.insert((kernel.0, index), id.0);
            }
            self.inner.set_arg(kernel, index, arg)
        }
        fn work_group_info(&self, kernel: KernelHandle) -> Result<accel_device::WorkGroupInfo> {
            self.inner.work_group_info(kernel)
        }
        fn enqueue_nd_range(&mut self, kernel: KernelHandle, range: NdRange) -> Result<accel_device::LaunchEvent> {
            if self.bound.get(&(kernel.0, 0)) == self.bound.get(&(kernel.0, 1)) {
                self.aliased.push(self.names[&kernel.0].clone());
            }
            self.inner.enqueue_nd_range(kernel, range)
        }
        fn finish(&mut self) -> Result<()> {
            self.inner.finish()
        }
        fn profiling_info(&self, event: accel_device::LaunchEvent) -> Result<ProfilingInfo> {
            self.inner.profiling_info(event)
        }
    }

    #[test]
    fn test_recursive_levels_never_reduce_in_place() {
        let mut device = AliasWatch::new();
        {
            let config = EngineConfig::new(4, 0.0).with_group_recursion(true);
            let mut engine =
                StatsEngine::new(&mut device, (1..=100).map(|v| v as f32).collect(), config).unwrap();
            // 100 -> 25 -> 7 -> 2 -> final
            assert_relative_eq!(engine.sum().unwrap(), 5050.0);
            assert_relative_eq!(engine.max().unwrap(), 100.0);
            assert_relative_eq!(engine.min().unwrap(), 1.0);
        }
        assert!(device.aliased.is_empty(), "in-place launches: {:?}", device.aliased);
        assert_eq!(device.inner.live_kernels(), 0);
    }

    #[test]
    fn test_recursion_needs_group_size_two() {
        let mut engine = engine(
            vec![1.0f32, 2.0, 3.0],
            EngineConfig::new(1, 0.0).with_group_recursion(true),
        );
        let err = engine.max().unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));
    }

    #[test]
    fn test_integer_recursion_is_ignored() {
        let mut engine = engine(vec![1, 2, 3], EngineConfig::new(4, 0).with_group_recursion(true));
        assert!(!engine.config().group_recursion);
        assert_eq!(engine.kernel_name(Statistic::Min).unwrap(), "min_INT");

        engine.set_group_recursion(true).unwrap();
        assert!(!engine.config().group_recursion);
    }

    #[test]
    fn test_group_size_change_repads() {
        let mut engine = engine(vec![3, 1, 2], EngineConfig::new(4, 0));
        assert_eq!(engine.min().unwrap(), 0);
        assert_eq!(engine.series().padded_len(), 4);

        engine.set_group_size(3).unwrap();
        assert_eq!(engine.min().unwrap(), 1);
        assert_eq!(engine.series().padded_len(), 3);
    }

    #[test]
    fn test_sum_includes_padding() {
        let mut engine = engine(vec![1, 2, 3], EngineConfig::new(4, 10));
        assert_eq!(engine.sum().unwrap(), 16);
        assert_eq!(
            engine.results().sum.unwrap() as f64 - engine.series().pad_contribution(),
            6.0
        );
        // The mean is still taken over the raw length
        assert_relative_eq!(engine.results().mean.unwrap(), 16.0 / 3.0);
    }

    #[test]
    fn test_auto_tune_uses_kernel_preference() {
        let device = HostDevice::new(
            HostDeviceConfig::default().with_kernel_preference("max_INT", 8),
            &HostProgram::reference(),
        )
        .unwrap();
        let config = EngineConfig::new(4, 0).with_auto_tune(true);
        let mut engine = StatsEngine::new(device, vec![5, 1, 8, 2, 9, 3], config).unwrap();

        assert_eq!(engine.max().unwrap(), 9);
        assert_eq!(engine.group_size(), 8);
        assert_eq!(engine.series().padded_len(), 8);
    }

    #[test]
    fn test_profiling_records_launches() {
        let mut engine = engine(
            (0..64).map(|v| v as f32).collect(),
            EngineConfig::new(4, 0.0)
                .with_group_recursion(true)
                .with_profiling(true),
        );
        engine.sum().unwrap();

        // 64 -> 16 -> 4 -> final
        let log = engine.launch_log();
        assert_eq!(log.len(), 3);
        assert_eq!(log[0].global, 64);
        assert_eq!(log[1].global, 16);
        assert_eq!(log[2].global, 4);
        assert!(log.iter().all(|r| r.kernel == "sum_WG_REDUCE_FLOAT"));
        assert_eq!(engine.device().commands().finishes, 3);
    }

    #[test]
    fn test_verbose_reports_once() {
        let mut engine = engine(vec![1, 2, 3, 4], EngineConfig::new(4, 0).with_verbose(true));
        engine.min().unwrap();
        assert!(!engine.config().verbose);
    }

    #[test]
    fn test_empty_series_is_rejected() {
        let mut engine = engine(Vec::<f32>::new(), EngineConfig::default());
        assert!(matches!(
            engine.min(),
            Err(Error::InsufficientData { actual: 0, .. })
        ));
        assert!(matches!(
            engine.write_data_to_device(),
            Err(Error::InsufficientData { .. })
        ));
    }

    #[test]
    fn test_device_objects_released_on_drop() {
        let mut device = HostDevice::reference().unwrap();
        {
            let mut engine =
                StatsEngine::new(&mut device, vec![1, 2, 3, 4], EngineConfig::new(4, 0)).unwrap();
            engine.sum().unwrap();
        }
        assert_eq!(device.live_buffers(), 0);
        assert_eq!(device.live_kernels(), 0);
    }

    #[test]
    fn test_toggling_recursion_does_not_leak_kernels() {
        let mut device = HostDevice::reference().unwrap();
        let mut engine = StatsEngine::new(
            &mut device,
            (1..=32).map(|v| v as f32).collect(),
            EngineConfig::new(4, 0.0),
        )
        .unwrap();
        for round in 0..10 {
            engine.set_group_recursion(round % 2 == 0).unwrap();
            assert_relative_eq!(engine.sum().unwrap(), 528.0);
        }
        assert_eq!(engine.device().live_kernels(), 5);
    }

    #[test]
    fn test_padding_change_forgets_results() {
        let mut engine = engine(vec![1, 2, 3], EngineConfig::new(4, 10));
        assert_eq!(engine.sum().unwrap(), 16);
        engine.min().unwrap();

        engine.set_neutral_value(0).unwrap();
        assert!(engine.results().sum.is_none());
        assert!(engine.results().minimum.is_none());
        assert!(engine.results().mean.is_none());

        // Recomputed over the new padding rather than reusing the stale sum
        assert_relative_eq!(engine.average().unwrap(), 2.0);
        assert_eq!(engine.results().sum, Some(6));

        engine.set_group_size(2).unwrap();
        assert!(engine.results().sum.is_none());
    }
}
