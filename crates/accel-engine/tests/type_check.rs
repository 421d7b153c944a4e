//! Element types without kernels are rejected before the device is touched

mod common;

use accel_core::{EngineConfig, Error};
use accel_engine::StatsEngine;
use common::device;

#[test]
fn test_f64_rejected_without_device_commands() {
    let mut device = device();
    let err = StatsEngine::new(&mut device, vec![1.0f64, 2.0], EngineConfig::default()).unwrap_err();

    assert!(matches!(err, Error::UnsupportedElementType(name) if name.contains("f64")));
    assert_eq!(device.commands().total(), 0);
    assert_eq!(device.live_buffers(), 0);
}

#[test]
fn test_other_types_rejected() {
    let mut device = device();
    assert!(StatsEngine::new(&mut device, vec![1u32], EngineConfig::default()).is_err());
    assert!(StatsEngine::new(&mut device, vec![1i64], EngineConfig::default()).is_err());
    assert_eq!(device.commands().total(), 0);
}

#[test]
fn test_supported_types_create_kernels() {
    let mut device = device();
    {
        let engine = StatsEngine::new(&mut device, vec![1i32, 2, 3], EngineConfig::default()).unwrap();
        assert_eq!(engine.kind().tag(), "INT");
    }
    assert_eq!(device.commands().kernels_created, 5);

    let engine = StatsEngine::new(&mut device, vec![1.0f32], EngineConfig::default()).unwrap();
    assert_eq!(engine.kind().tag(), "FLOAT");
}
