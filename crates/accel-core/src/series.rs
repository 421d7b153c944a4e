//! Host-side numeric series and its padding metadata

use crate::{Error, Numeric, Result};

/// An ordered series of one element type, optionally padded to a group multiple
///
/// Padding is always a tail of copies of the neutral value. Re-padding starts
/// again from the raw values, so padding never compounds across group sizes.
#[derive(Debug, Clone, PartialEq)]
pub struct Series<T: Numeric> {
    values: Vec<T>,
    raw_len: usize,
    neutral: T,
}

impl<T: Numeric> Series<T> {
    /// Wrap raw values; the series starts unpadded with a zero neutral value
    pub fn new(values: Vec<T>) -> Self {
        let raw_len = values.len();
        Self {
            values,
            raw_len,
            neutral: T::zero(),
        }
    }

    /// Pad the tail to the next multiple of `group_size`, returning the pad count
    pub fn pad(&mut self, group_size: usize, neutral: T) -> Result<usize> {
        if group_size == 0 {
            return Err(Error::zero_group_size());
        }

        self.values.truncate(self.raw_len);
        self.neutral = neutral;

        let padded_len = self.raw_len.div_ceil(group_size) * group_size;
        self.values.resize(padded_len, neutral);
        Ok(padded_len - self.raw_len)
    }

    /// Number of real (unpadded) elements
    pub fn raw_len(&self) -> usize {
        self.raw_len
    }

    /// Number of elements including padding
    pub fn padded_len(&self) -> usize {
        self.values.len()
    }

    /// Number of neutral values appended
    pub fn pad_count(&self) -> usize {
        self.values.len() - self.raw_len
    }

    /// Value used for the padded tail
    pub fn neutral(&self) -> T {
        self.neutral
    }

    pub fn is_empty(&self) -> bool {
        self.raw_len == 0
    }

    /// Real values only
    pub fn raw(&self) -> &[T] {
        &self.values[..self.raw_len]
    }

    /// Real values followed by the padding
    pub fn as_slice(&self) -> &[T] {
        &self.values
    }

    /// Work-groups covering the padded series
    pub fn group_count(&self, group_size: usize) -> usize {
        if group_size == 0 {
            return 0;
        }
        self.values.len().div_ceil(group_size)
    }

    /// What the padded tail adds to a sum over the padded series
    pub fn pad_contribution(&self) -> f64 {
        self.pad_count() as f64 * self.neutral.to_f64()
    }
}

impl<T: Numeric> From<Vec<T>> for Series<T> {
    fn from(values: Vec<T>) -> Self {
        Self::new(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pad_appends_neutral_tail() {
        let mut series = Series::new(vec![9, 3, 7, 1, 5, 3]);
        let added = series.pad(4, -1).unwrap();

        assert_eq!(added, 2);
        assert_eq!(series.raw_len(), 6);
        assert_eq!(series.padded_len(), 8);
        assert_eq!(series.pad_count(), 2);
        assert_eq!(series.as_slice(), &[9, 3, 7, 1, 5, 3, -1, -1]);
        assert_eq!(series.raw(), &[9, 3, 7, 1, 5, 3]);
        assert_eq!(series.group_count(4), 2);
    }

    #[test]
    fn test_pad_is_noop_when_aligned() {
        let mut series = Series::new(vec![1.0f32, 2.0, 3.0]);
        assert_eq!(series.pad(3, 0.0).unwrap(), 0);
        assert_eq!(series.padded_len(), 3);
        assert_eq!(series.pad(1, 0.0).unwrap(), 0);
    }

    #[test]
    fn test_repad_does_not_compound() {
        let mut series = Series::new((0..10).collect::<Vec<i32>>());
        assert_eq!(series.pad(4, 0).unwrap(), 2);
        assert_eq!(series.padded_len(), 12);

        // Going to a larger group re-derives from the raw length
        assert_eq!(series.pad(8, 0).unwrap(), 6);
        assert_eq!(series.padded_len(), 16);

        // And back down again trims the old tail
        assert_eq!(series.pad(5, 0).unwrap(), 0);
        assert_eq!(series.padded_len(), 10);
        assert_eq!(series.pad_count(), 0);
    }

    #[test]
    fn test_pad_rejects_zero_group_size() {
        let mut series = Series::new(vec![1, 2, 3]);
        assert!(matches!(series.pad(0, 0), Err(Error::InvalidParameter(_))));
        assert_eq!(series.padded_len(), 3);
    }

    #[test]
    fn test_empty_series() {
        let mut series = Series::<f32>::new(Vec::new());
        assert!(series.is_empty());
        assert_eq!(series.pad(16, 0.0).unwrap(), 0);
        assert_eq!(series.padded_len(), 0);
        assert_eq!(series.group_count(16), 0);
    }

    #[test]
    fn test_pad_contribution() {
        let mut series = Series::new(vec![1.5f32, 2.5, 3.5]);
        series.pad(4, 10.0).unwrap();
        assert_eq!(series.pad_contribution(), 10.0);
        assert_eq!(series.neutral(), 10.0);
    }
}
