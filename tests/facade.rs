//! The facade prelude is enough to run a full pipeline

use accel_stats::prelude::*;
use approx::assert_relative_eq;

#[test]
fn test_prelude_pipeline() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let device = select_device(0, 0, &KernelSource::reference(), "")?;
    let values: Vec<f32> = (1..=12).map(|v| v as f32).collect();
    let config = EngineConfig::new(4, 0.0).with_group_recursion(true);
    let mut engine = StatsEngine::new(device, values.clone(), config)?;

    assert_eq!(engine.sum()?, 78.0);
    assert_eq!(engine.min()?, 1.0);
    assert_eq!(engine.max()?, 12.0);

    let reference = baseline(&values)?;
    assert_relative_eq!(engine.average()?, reference.mean.unwrap());
    Ok(())
}

#[test]
fn test_version_is_set() {
    assert!(!accel_stats::VERSION.is_empty());
    assert!(!accel_stats::accel_core::VERSION.is_empty());
}
