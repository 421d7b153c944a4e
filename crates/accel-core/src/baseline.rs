//! Host-only reference statistics
//!
//! Computed directly over the raw values, without padding or a device, for
//! cross-checking what the device kernels return.

use crate::{Error, Numeric, OrderStatistics, Result, StatResults};

/// Compute every statistic on the host
///
/// The standard deviation is the population form (divide by `n`), matching
/// the device kernels.
pub fn baseline<T: Numeric>(values: &[T]) -> Result<StatResults<T>> {
    let first = *values.first().ok_or_else(Error::empty_input)?;

    let (minimum, maximum, sum) = values.iter().skip(1).fold(
        (first, first, first),
        |(lo, hi, total), &v| {
            (
                if v < lo { v } else { lo },
                if v > hi { v } else { hi },
                total.accumulate(v),
            )
        },
    );

    let n = values.len() as f64;
    let mean = sum.to_f64() / n;
    let squared: f64 = values
        .iter()
        .map(|v| {
            let d = v.to_f64() - mean;
            d * d
        })
        .sum();

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    Ok(StatResults {
        minimum: Some(minimum),
        maximum: Some(maximum),
        sum: Some(sum),
        mean: Some(mean),
        std_deviation: Some((squared / n).sqrt()),
        order: OrderStatistics::from_sorted(&sorted),
    })
}
