//! Dispatch engine for accelerator-dispatched statistics
//!
//! [`StatsEngine`] drives the reduction and sort kernels of a
//! [`ComputeDevice`](accel_device::ComputeDevice):
//!
//! - flat reduction, one launch over a single work-group
//! - work-group recursive reduction, relaunching over partials (floats only)
//! - standard deviation about the recorded mean
//! - a sort convergence loop with a bounded pass count
//!
//! # Example
//!
//! ```rust
//! use accel_core::EngineConfig;
//! use accel_device::HostDevice;
//! use accel_engine::StatsEngine;
//!
//! let device = HostDevice::reference().unwrap();
//! let config = EngineConfig::new(4, 0.0f32).with_group_recursion(true);
//! let mut engine = StatsEngine::new(device, vec![3.0, 1.0, 4.0, 1.0, 5.0, 9.0], config).unwrap();
//!
//! assert_eq!(engine.max().unwrap(), 9.0);
//! assert_eq!(engine.sum().unwrap(), 23.0);
//! ```

pub mod buffers;
pub mod dispatch;
pub mod kernels;
pub mod sort;

pub use buffers::{BufferRole, DeviceBuffers};
pub use dispatch::{LaunchRecord, StatsEngine};
pub use kernels::{KernelId, KernelTable, Statistic};
pub use sort::is_non_decreasing;
