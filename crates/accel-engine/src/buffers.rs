//! Device buffer manager
//!
//! One buffer per role. The data buffer holds the padded series; each
//! reduction statistic has an output buffer with one slot per work-group,
//! and recursive reductions alternate between that buffer and the shared
//! partials buffer; the sort buffer holds a full padded copy. The manager owns every buffer
//! it creates and releases a buffer before replacing it with one of a
//! different size.

use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::mem::size_of;

use accel_core::{Error, Numeric, Result};
use accel_device::{BufferId, ComputeDevice, MemAccess};
use tracing::{debug, trace};

/// What a device buffer is used for
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BufferRole {
    /// Padded input series
    Data,
    Min,
    Max,
    Sum,
    StdDev,
    /// Working copy the sort kernel orders in place
    Sort,
    /// Second target for the levels of a recursive reduction
    Partials,
}

impl BufferRole {
    /// Roles sized to the work-group count
    pub const REDUCTIONS: [BufferRole; 4] = [Self::Min, Self::Max, Self::Sum, Self::StdDev];

    fn access(self) -> MemAccess {
        match self {
            Self::Data => MemAccess::ReadOnly,
            _ => MemAccess::ReadWrite,
        }
    }
}

impl fmt::Display for BufferRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Data => "data",
            Self::Min => "min",
            Self::Max => "max",
            Self::Sum => "sum",
            Self::StdDev => "std",
            Self::Sort => "sort",
            Self::Partials => "partials",
        };
        f.write_str(label)
    }
}

#[derive(Clone, Copy, Debug)]
struct Allocation {
    id: BufferId,
    len: usize,
}

/// Buffers of one element type, keyed by role
#[derive(Debug)]
pub struct DeviceBuffers<T> {
    allocations: BTreeMap<BufferRole, Allocation>,
    _element: PhantomData<T>,
}

impl<T: Numeric> Default for DeviceBuffers<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Numeric> DeviceBuffers<T> {
    pub fn new() -> Self {
        Self {
            allocations: BTreeMap::new(),
            _element: PhantomData,
        }
    }

    /// Make sure `role` has a buffer of exactly `len` elements
    fn ensure<D: ComputeDevice>(&mut self, device: &mut D, role: BufferRole, len: usize) -> Result<BufferId> {
        if len == 0 {
            return Err(Error::empty_input());
        }
        if let Some(existing) = self.allocations.get(&role) {
            if existing.len == len {
                return Ok(existing.id);
            }
            device.release_buffer(existing.id)?;
            trace!("Released {role} buffer ({} elements)", existing.len);
            self.allocations.remove(&role);
        }

        let id = device.create_buffer(role.access(), len * size_of::<T>())?;
        self.allocations.insert(role, Allocation { id, len });
        debug!("Allocated {role} buffer for {len} elements");
        Ok(id)
    }

    /// Copy the padded series into the data buffer
    pub fn upload<D: ComputeDevice>(&mut self, device: &mut D, values: &[T]) -> Result<()> {
        let id = self.ensure(device, BufferRole::Data, values.len())?;
        device.write_buffer(id, 0, bytemuck::cast_slice(values))
    }

    /// Size the output buffers for `group_count` work-groups and zero them
    pub fn allocate_outputs<D: ComputeDevice>(
        &mut self,
        device: &mut D,
        group_count: usize,
        padded_len: usize,
    ) -> Result<()> {
        for role in BufferRole::REDUCTIONS {
            self.ensure(device, role, group_count)?;
            self.reset(device, role)?;
        }
        self.ensure(device, BufferRole::Partials, group_count)?;
        self.ensure(device, BufferRole::Sort, padded_len)?;
        self.reset(device, BufferRole::Sort)
    }

    /// Zero-fill one buffer
    pub fn reset<D: ComputeDevice>(&mut self, device: &mut D, role: BufferRole) -> Result<()> {
        let allocation = self.allocation(role)?;
        let zero = T::zero();
        device.fill_buffer(
            allocation.id,
            bytemuck::bytes_of(&zero),
            0,
            allocation.len * size_of::<T>(),
        )
    }

    fn allocation(&self, role: BufferRole) -> Result<Allocation> {
        self.allocations.get(&role).copied().ok_or_else(|| {
            Error::MissingPrerequisite(format!(
                "no {role} buffer on the device; write the data to the device first"
            ))
        })
    }

    pub fn id(&self, role: BufferRole) -> Result<BufferId> {
        Ok(self.allocation(role)?.id)
    }

    /// Elements held by a buffer, if it exists
    pub fn len(&self, role: BufferRole) -> Option<usize> {
        self.allocations.get(&role).map(|a| a.len)
    }

    pub fn is_empty(&self) -> bool {
        self.allocations.is_empty()
    }

    /// Blocking read of the first element
    pub fn read_slot0<D: ComputeDevice>(&self, device: &mut D, role: BufferRole) -> Result<T> {
        let allocation = self.allocation(role)?;
        let mut slot = T::zero();
        device.read_buffer(allocation.id, 0, bytemuck::bytes_of_mut(&mut slot))?;
        Ok(slot)
    }

    /// Blocking read of the whole buffer
    pub fn read_all<D: ComputeDevice>(&self, device: &mut D, role: BufferRole) -> Result<Vec<T>> {
        let allocation = self.allocation(role)?;
        let mut values = vec![T::zero(); allocation.len];
        device.read_buffer(allocation.id, 0, bytemuck::cast_slice_mut(&mut values))?;
        Ok(values)
    }

    /// Release every buffer
    pub fn release_all<D: ComputeDevice>(&mut self, device: &mut D) -> Result<()> {
        while let Some((role, allocation)) = self.allocations.pop_first() {
            device.release_buffer(allocation.id)?;
            trace!("Released {role} buffer");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use accel_device::HostDevice;

    #[test]
    fn test_upload_and_read_back() {
        let mut device = HostDevice::reference().unwrap();
        let mut buffers = DeviceBuffers::<f32>::new();

        buffers.upload(&mut device, &[1.5, 2.5, 3.5, 0.0]).unwrap();
        assert_eq!(buffers.len(BufferRole::Data), Some(4));
        assert_eq!(
            buffers.read_all(&mut device, BufferRole::Data).unwrap(),
            vec![1.5, 2.5, 3.5, 0.0]
        );
        assert_eq!(buffers.read_slot0(&mut device, BufferRole::Data).unwrap(), 1.5);
    }

    #[test]
    fn test_outputs_sized_by_role() {
        let mut device = HostDevice::reference().unwrap();
        let mut buffers = DeviceBuffers::<i32>::new();

        buffers.allocate_outputs(&mut device, 3, 12).unwrap();
        for role in BufferRole::REDUCTIONS {
            assert_eq!(buffers.len(role), Some(3));
            assert_eq!(buffers.read_all(&mut device, role).unwrap(), vec![0; 3]);
        }
        assert_eq!(buffers.len(BufferRole::Sort), Some(12));
        assert_eq!(buffers.len(BufferRole::Partials), Some(3));
        assert_eq!(device.live_buffers(), 6);
    }

    #[test]
    fn test_resize_replaces_buffer() {
        let mut device = HostDevice::reference().unwrap();
        let mut buffers = DeviceBuffers::<i32>::new();

        buffers.upload(&mut device, &[1, 2, 3, 4]).unwrap();
        let first = buffers.id(BufferRole::Data).unwrap();

        // Same size keeps the buffer, a new size replaces it
        buffers.upload(&mut device, &[5, 6, 7, 8]).unwrap();
        assert_eq!(buffers.id(BufferRole::Data).unwrap(), first);

        buffers.upload(&mut device, &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        assert_ne!(buffers.id(BufferRole::Data).unwrap(), first);
        assert_eq!(device.live_buffers(), 1);
        assert!(device.buffer_size(first).is_err());
    }

    #[test]
    fn test_reset_zeroes() {
        let mut device = HostDevice::reference().unwrap();
        let mut buffers = DeviceBuffers::<i32>::new();
        buffers.allocate_outputs(&mut device, 2, 4).unwrap();

        let id = buffers.id(BufferRole::Sum).unwrap();
        device.write_buffer(id, 0, bytemuck::cast_slice(&[7i32, 9])).unwrap();
        buffers.reset(&mut device, BufferRole::Sum).unwrap();
        assert_eq!(buffers.read_all(&mut device, BufferRole::Sum).unwrap(), vec![0, 0]);
    }

    #[test]
    fn test_missing_buffer_and_release() {
        let mut device = HostDevice::reference().unwrap();
        let mut buffers = DeviceBuffers::<f32>::new();
        assert!(matches!(
            buffers.id(BufferRole::Min),
            Err(Error::MissingPrerequisite(_))
        ));

        buffers.allocate_outputs(&mut device, 1, 4).unwrap();
        buffers.release_all(&mut device).unwrap();
        assert!(buffers.is_empty());
        assert_eq!(device.live_buffers(), 0);
    }
}
