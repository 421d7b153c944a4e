//! Shared utilities for engine integration tests

#![allow(dead_code)]

use accel_core::{EngineConfig, Numeric};
use accel_device::{HostDevice, HostDeviceConfig, HostProgram};
use accel_engine::StatsEngine;
use tracing_subscriber::EnvFilter;

pub use approx::assert_relative_eq;

pub const EPSILON: f64 = 1e-4;

/// Route engine logs through the test harness; `RUST_LOG` picks the level
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Host device with every statistics kernel
pub fn device() -> HostDevice {
    init_tracing();
    HostDevice::reference().expect("reference device")
}

/// Host device with a custom configuration
pub fn device_with(config: HostDeviceConfig) -> HostDevice {
    init_tracing();
    HostDevice::new(config, &HostProgram::reference()).expect("configured device")
}

/// Engine on a fresh reference device
pub fn engine<T: Numeric>(values: Vec<T>, config: EngineConfig<T>) -> StatsEngine<T, HostDevice> {
    StatsEngine::new(device(), values, config).expect("engine")
}

/// Deterministic pseudo-random series
pub fn generate_floats(n: usize) -> Vec<f32> {
    (0..n)
        .map(|i| ((i as f32 * 0.37).sin() * 100.0).round() / 4.0)
        .collect()
}

pub fn generate_ints(n: usize) -> Vec<i32> {
    (0..n).map(|i| ((i * 7919 + 13) % 2001) as i32 - 1000).collect()
}

/// Series lengths that straddle work-group boundaries for a given group size
pub fn boundary_lengths(group_size: usize) -> Vec<usize> {
    vec![
        1,
        group_size - 1,
        group_size,
        group_size + 1,
        group_size * group_size - 1,
        group_size * group_size,
        group_size * group_size + 1,
        group_size * group_size * group_size + 3,
    ]
    .into_iter()
    .filter(|&n| n > 0)
    .collect()
}
