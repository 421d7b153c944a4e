//! accel-stats: aggregate statistics of a numeric series on a compute device
//!
//! Reads the trailing column of a text file, uploads it to the selected
//! device and prints min, max, sum, average, standard deviation and
//! (optionally) the median and quartiles.

use std::path::{Path, PathBuf};

use accel_core::{
    read_series, EngineConfig, Numeric, StatResults, DEFAULT_GROUP_SIZE, DEFAULT_MAX_SORT_PASSES,
};
use accel_device::{format_platforms, list_platforms, select_device, ComputeDevice, KernelSource};
use accel_engine::StatsEngine;
use anyhow::{anyhow, Context, Result};
use clap::{Parser, ValueEnum};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

/// Element type the series is parsed into
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ElementType {
    Int,
    Float,
}

#[derive(Parser, Debug)]
#[command(
    name = "accel-stats",
    version = env!("CARGO_PKG_VERSION"),
    about = "Aggregate statistics over a numeric series, computed on a compute device"
)]
struct Cli {
    /// Platform index
    #[arg(short = 'p', long, default_value_t = 0)]
    platform: usize,

    /// Device index on the selected platform
    #[arg(short = 'd', long, default_value_t = 0)]
    device: usize,

    /// List platforms and devices, then exit
    #[arg(short = 'l', long)]
    list: bool,

    /// Input file; the last token of every line is one value
    #[arg(required_unless_present = "list")]
    input: Option<PathBuf>,

    /// Element type of the series
    #[arg(short = 't', long = "type", value_enum, default_value_t = ElementType::Float)]
    element_type: ElementType,

    /// Work-group size
    #[arg(short = 'g', long, default_value_t = DEFAULT_GROUP_SIZE)]
    group_size: usize,

    /// Value used to pad the series to a multiple of the work-group size
    #[arg(short = 'n', long, default_value = "0", allow_hyphen_values = true)]
    neutral: String,

    /// Use each kernel's preferred work-group size
    #[arg(long)]
    auto_tune: bool,

    /// Report queue options before the first launch
    #[arg(long)]
    verbose: bool,

    /// Time every launch
    #[arg(long)]
    profile: bool,

    /// Reduce recursively across work-groups (float only)
    #[arg(short = 'r', long)]
    recursive: bool,

    /// Sort on the device and report median and quartiles
    #[arg(short = 's', long)]
    sort: bool,

    /// Also print statistics computed on the host
    #[arg(short = 'b', long)]
    baseline: bool,

    /// Give up sorting after this many passes
    #[arg(long, default_value_t = DEFAULT_MAX_SORT_PASSES)]
    max_sort_passes: usize,

    /// Options passed to the kernel program build
    #[arg(long, default_value = "", allow_hyphen_values = true)]
    build_options: String,

    /// OpenCL C kernel source; the bundled kernels when omitted
    #[arg(short = 'k', long, value_name = "PATH")]
    kernels: Option<PathBuf>,
}

impl Cli {
    fn kernel_source(&self) -> Result<KernelSource> {
        match &self.kernels {
            Some(path) => KernelSource::load(path)
                .with_context(|| format!("loading kernels from {}", path.display())),
            None => Ok(KernelSource::reference()),
        }
    }

    fn engine_config<T: Numeric>(&self) -> Result<EngineConfig<T>> {
        let neutral = self
            .neutral
            .parse::<T>()
            .map_err(|_| {
                anyhow!(
                    "invalid neutral value {:?} for {:?} data",
                    self.neutral,
                    self.element_type
                )
            })?;

        Ok(EngineConfig::new(self.group_size, neutral)
            .with_auto_tune(self.auto_tune)
            .with_verbose(self.verbose)
            .with_profiling(self.profile)
            .with_group_recursion(self.recursive)
            .with_max_sort_passes(self.max_sort_passes))
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// Run every statistic for one element type, returning the device results
fn run<T: Numeric, D: ComputeDevice>(cli: &Cli, device: D, input: &Path) -> Result<StatResults<T>> {
    let values: Vec<T> = read_series(input)
        .with_context(|| format!("reading {}", input.display()))?;
    let config = cli.engine_config::<T>()?;
    debug!("Engine configuration: {config:?}");

    let mut engine = StatsEngine::new(device, values, config)?;
    engine.write_data_to_device()?;

    if cli.baseline {
        println!("Baseline results:\n{}", engine.baseline()?);
    }

    match engine.run_all(cli.sort) {
        Ok(_) => {}
        Err(e) if e.is_recoverable() => warn!("{e}"),
        Err(e) => return Err(e.into()),
    }

    let results = engine.results().clone();
    println!("Device results:\n{results}");
    Ok(results)
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    if cli.list {
        print!("{}", format_platforms(&list_platforms()));
        return Ok(());
    }

    let input = cli
        .input
        .clone()
        .ok_or_else(|| anyhow!("an input file is required"))?;
    let source = cli.kernel_source()?;
    let device = select_device(cli.platform, cli.device, &source, &cli.build_options)?;

    match cli.element_type {
        ElementType::Int => run::<i32, _>(&cli, device, &input).map(|_| ()),
        ElementType::Float => run::<f32, _>(&cli, device, &input).map(|_| ()),
    }
}
