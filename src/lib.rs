//! accel-stats: aggregate statistics over large numeric series, dispatched
//! to a compute accelerator
//!
//! This crate re-exports the workspace crates:
//!
//! - [`accel_core`]: element types, series padding, configuration, results
//! - [`accel_device`]: the compute device interface and the host reference device
//! - [`accel_engine`]: the dispatch engine and sort convergence loop
//!
//! # Example
//!
//! ```rust
//! use accel_stats::prelude::*;
//!
//! let device = HostDevice::reference().unwrap();
//! let config = EngineConfig::new(8, 0);
//! let mut engine = StatsEngine::new(device, vec![9, 3, 7, 1, 5, 3], config).unwrap();
//!
//! assert_eq!(engine.max().unwrap(), 9);
//! assert_eq!(engine.sum().unwrap(), 28);
//! ```

pub use accel_core;
pub use accel_device;
pub use accel_engine;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    pub use accel_core::{
        baseline, read_series, ElementKind, EngineConfig, Error, Numeric, OrderStatistics, Result,
        Series, StatResults,
    };
    pub use accel_device::{
        list_platforms, select_device, ComputeDevice, HostDevice, HostDeviceConfig, HostProgram,
        KernelSource, SelectedDevice,
    };
    pub use accel_engine::{LaunchRecord, Statistic, StatsEngine};
}
