//! Aggregated statistic results

use std::fmt;

use crate::Numeric;

/// Median and quartiles taken from a sorted sequence
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderStatistics<T> {
    pub median: T,
    pub first_quartile: T,
    pub third_quartile: T,
}

/// Index selected for probability `p` in a sorted sequence of length `n`
///
/// Nearest-rounded (`round(n * p)`, halves away from zero) and clamped to the
/// last element.
pub fn quantile_index(n: usize, p: f64) -> usize {
    let index = (n as f64 * p).round() as usize;
    index.min(n.saturating_sub(1))
}

impl<T: Numeric> OrderStatistics<T> {
    /// Read the order statistics out of an already sorted sequence
    pub fn from_sorted(sorted: &[T]) -> Option<Self> {
        if sorted.is_empty() {
            return None;
        }
        let n = sorted.len();
        Some(Self {
            median: sorted[quantile_index(n, 0.5)],
            first_quartile: sorted[quantile_index(n, 0.25)],
            third_quartile: sorted[quantile_index(n, 0.75)],
        })
    }
}

/// Every statistic the engine can produce, set as each one is computed
#[derive(Debug, Clone, PartialEq)]
pub struct StatResults<T> {
    pub minimum: Option<T>,
    pub maximum: Option<T>,
    pub sum: Option<T>,
    pub mean: Option<f64>,
    pub std_deviation: Option<f64>,
    pub order: Option<OrderStatistics<T>>,
}

impl<T> Default for StatResults<T> {
    fn default() -> Self {
        Self {
            minimum: None,
            maximum: None,
            sum: None,
            mean: None,
            std_deviation: None,
            order: None,
        }
    }
}

impl<T: Numeric> StatResults<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when nothing has been computed yet
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl<T: Numeric> fmt::Display for StatResults<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(v) = self.minimum {
            writeln!(f, "\tMin: {:.5}", v)?;
        }
        if let Some(v) = self.maximum {
            writeln!(f, "\tMax: {:.5}", v)?;
        }
        if let Some(v) = self.sum {
            writeln!(f, "\tSum: {:.5}", v)?;
        }
        if let Some(v) = self.mean {
            writeln!(f, "\tAverage: {:.5}", v)?;
        }
        if let Some(v) = self.std_deviation {
            writeln!(f, "\tStd Deviation: {:.5}", v)?;
        }
        if let Some(order) = &self.order {
            writeln!(f, "\tMedian: {:.5}", order.median)?;
            writeln!(f, "\tFirst Quartile: {:.5}", order.first_quartile)?;
            writeln!(f, "\tThird Quartile: {:.5}", order.third_quartile)?;
        }
        Ok(())
    }
}
