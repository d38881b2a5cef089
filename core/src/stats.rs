use crate::model::Elapsed;
use serde::{Deserialize, Serialize};

/// Immutable pair of values, compared field by field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Pair<A, B> {
    pub a: A,
    pub b: B,
}

impl<A, B> Pair<A, B> {
    pub fn new(a: A, b: B) -> Self {
        Self { a, b }
    }
}

impl<A, B> From<(A, B)> for Pair<A, B> {
    fn from((a, b): (A, B)) -> Self {
        Self { a, b }
    }
}

/// Running statistics over observed durations.
///
/// Min, max and the mean are maintained incrementally; the raw observations
/// are kept so the median can be computed on request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DurationStats {
    min: Option<Elapsed>,
    max: Option<Elapsed>,
    average: f64,
    samples: Vec<Elapsed>,
}

impl DurationStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, duration: Elapsed) {
        self.min = Some(self.min.map_or(duration, |min| min.min(duration)));
        self.max = Some(self.max.map_or(duration, |max| max.max(duration)));

        let count = self.samples.len() as f64;
        self.average = self.average * count / (count + 1.0) + duration as f64 / (count + 1.0);
        self.samples.push(duration);
    }

    pub fn count(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn min(&self) -> Option<Elapsed> {
        self.min
    }

    pub fn max(&self) -> Option<Elapsed> {
        self.max
    }

    pub fn average(&self) -> Option<f64> {
        (!self.samples.is_empty()).then_some(self.average)
    }

    /// Lower-middle element of the sorted observations.
    pub fn median(&self) -> Option<Elapsed> {
        if self.samples.is_empty() {
            return None;
        }
        let mut sorted = self.samples.clone();
        sorted.sort_unstable();
        Some(sorted[(sorted.len() - 1) / 2])
    }

    /// Observations in the order they were recorded.
    pub fn samples(&self) -> &[Elapsed] {
        &self.samples
    }

    pub fn summary(&self) -> Option<Summary> {
        Some(Summary {
            count: self.count(),
            min: self.min?,
            max: self.max?,
            average: self.average()?,
            median: self.median()?,
        })
    }
}

impl FromIterator<Elapsed> for DurationStats {
    fn from_iter<I: IntoIterator<Item = Elapsed>>(iter: I) -> Self {
        let mut stats = DurationStats::new();
        for duration in iter {
            stats.record(duration);
        }
        stats
    }
}

/// Snapshot of a non-empty [`DurationStats`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub count: usize,
    pub min: Elapsed,
    pub max: Elapsed,
    pub average: f64,
    pub median: Elapsed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_stats_have_no_summary() {
        let stats = DurationStats::new();
        assert!(stats.is_empty());
        assert_eq!(stats.min(), None);
        assert_eq!(stats.average(), None);
        assert_eq!(stats.median(), None);
        assert!(stats.summary().is_none());
    }

    #[test]
    fn running_average_matches_arithmetic_mean() {
        let stats: DurationStats = [4, 8, 15, 16, 23, 42].into_iter().collect();
        let average = stats.average().unwrap();
        assert!((average - 18.0).abs() < 1e-9);
        assert_eq!(stats.min(), Some(4));
        assert_eq!(stats.max(), Some(42));
    }

    #[test]
    fn median_takes_lower_middle_for_even_counts() {
        let stats: DurationStats = [30, 10, 40, 20].into_iter().collect();
        assert_eq!(stats.median(), Some(20));

        let stats: DurationStats = [9, 1, 5].into_iter().collect();
        assert_eq!(stats.median(), Some(5));
    }

    #[test]
    fn median_does_not_reorder_samples() {
        let stats: DurationStats = [3, 1, 2].into_iter().collect();
        let _ = stats.median();
        assert_eq!(stats.samples(), &[3, 1, 2]);
    }

    #[test]
    fn summary_is_ordered() {
        let summary = [7, 3, 11, 5]
            .into_iter()
            .collect::<DurationStats>()
            .summary()
            .unwrap();
        assert_eq!(summary.count, 4);
        assert!(summary.min as f64 <= summary.average);
        assert!(summary.average <= summary.max as f64);
        assert_eq!(summary.median, 5);
    }

    #[test]
    fn pairs_compare_structurally() {
        assert_eq!(Pair::new(100_i64, 30_i64), Pair::from((100, 30)));
        assert_ne!(Pair::new(1, 2), Pair::new(2, 1));
    }
}
