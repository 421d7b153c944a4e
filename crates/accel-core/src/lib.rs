//! Core types for accelerator-dispatched statistics
//!
//! This crate holds everything the dispatch engine shares with its
//! collaborators but which never touches a device:
//!
//! - [`Numeric`] and [`ElementKind`]: the element types and their per-type policies
//! - [`Series`]: the host series and its neutral-value padding
//! - [`EngineConfig`]: group size, neutral value and policy flags
//! - [`StatResults`]: the result model, plus a host-only [`baseline`]
//! - [`ingest`]: reading a series out of a delimited text file
//!
//! # Example
//!
//! ```rust
//! use accel_core::{Series, baseline};
//!
//! let mut series = Series::new(vec![9, 3, 7, 1, 5, 3]);
//! let added = series.pad(4, 0).unwrap();
//! assert_eq!(added, 2);
//! assert_eq!(series.padded_len() % 4, 0);
//!
//! let reference = baseline(series.raw()).unwrap();
//! assert_eq!(reference.minimum, Some(1));
//! ```

pub mod baseline;
pub mod config;
pub mod error;
pub mod ingest;
pub mod numeric;
pub mod results;
pub mod series;

pub use baseline::baseline;
pub use config::{EngineConfig, DEFAULT_GROUP_SIZE, DEFAULT_MAX_SORT_PASSES};
pub use error::{Error, Result};
pub use ingest::{parse_series, read_series};
pub use numeric::{ElementKind, Numeric, StdDevPolicy};
pub use results::{quantile_index, OrderStatistics, StatResults};
pub use series::Series;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
