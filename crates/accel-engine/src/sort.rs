//! Sort convergence loop
//!
//! The sort kernel has no way to tell the host it is done. The engine primes
//! it once from the data buffer into the sort buffer, then keeps relaunching
//! it on the sort buffer with the merge-phase flag flipped, reading the whole
//! buffer back after every pass until it comes back non-decreasing. The pass
//! count is bounded by `max_sort_passes`.

use accel_core::{Error, Numeric, OrderStatistics, Result};
use accel_device::{ComputeDevice, NdRange};
use tracing::{debug, instrument, warn};

use crate::buffers::BufferRole;
use crate::dispatch::StatsEngine;
use crate::kernels::{bind_input, bind_merge_flag, bind_sort, Statistic};

/// Whether `values` is in non-decreasing order
pub fn is_non_decreasing<T: PartialOrd>(values: &[T]) -> bool {
    values.windows(2).all(|pair| pair[0] <= pair[1])
}

impl<T: Numeric, D: ComputeDevice> StatsEngine<T, D> {
    /// Sort the padded series on the device and take its order statistics
    ///
    /// Quartiles are read from the padded sequence, so neutral values outside
    /// the data range shift them. Fails with [`Error::NotConverged`] once
    /// `max_sort_passes` passes have run without an ordered read-back.
    #[instrument(skip(self), level = "debug")]
    pub fn sort(&mut self) -> Result<OrderStatistics<T>> {
        let (id, handle) = self.prepare(Statistic::Sort)?;
        let data = self.buffers.id(BufferRole::Data)?;
        let target = self.buffers.id(BufferRole::Sort)?;
        let group_size = self.config.group_size;
        let range = NdRange::new(self.series.padded_len(), group_size);
        let local_bytes = group_size * std::mem::size_of::<T>();

        // Priming pass reads the data buffer; every later pass works in place
        let mut merge_flag = 0u32;
        bind_sort(&mut self.device, handle, data, target, local_bytes, merge_flag)?;
        self.launch(&id, handle, range)?;
        bind_input(&mut self.device, handle, target)?;

        let max_passes = self.config.max_sort_passes;
        for pass in 1..=max_passes {
            merge_flag ^= 1;
            bind_merge_flag(&mut self.device, handle, merge_flag)?;
            self.launch(&id, handle, range)?;
            self.device.finish()?;

            let values = self.buffers.read_all(&mut self.device, BufferRole::Sort)?;
            if is_non_decreasing(&values) {
                debug!("{id} converged after {pass} passes");
                let order = OrderStatistics::from_sorted(&values).ok_or_else(Error::empty_input)?;
                self.results.order = Some(order);
                self.sorted = Some(values);
                return Ok(order);
            }
        }

        warn!("{id} still unordered after {max_passes} passes");
        Err(Error::NotConverged { passes: max_passes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_decreasing() {
        assert!(is_non_decreasing::<i32>(&[]));
        assert!(is_non_decreasing(&[1]));
        assert!(is_non_decreasing(&[1, 1, 2, 5]));
        assert!(!is_non_decreasing(&[1, 3, 2]));
        assert!(is_non_decreasing(&[-1.5f32, 0.0, 0.0, 2.25]));
    }
}
