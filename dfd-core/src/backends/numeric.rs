//! Engine-independent numeric and frequency helpers.

use std::collections::HashMap;

use crate::analyzers::types::ValueFrequency;

/// Descriptive summary of a set of numeric values.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NumericSummary {
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub lower_quartile: Option<f64>,
    pub median: Option<f64>,
    pub upper_quartile: Option<f64>,
}

impl NumericSummary {
    /// Summarises the given values. NaN values are skipped.
    pub fn from_values(mut values: Vec<f64>) -> Self {
        values.retain(|v| !v.is_nan());
        if values.is_empty() {
            return Self::default();
        }
        // Summed in row order so the mean matches a sequential SQL AVG.
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        values.sort_by(f64::total_cmp);

        Self {
            mean: Some(mean),
            std: Some(variance.sqrt()),
            min: values.first().copied(),
            max: values.last().copied(),
            lower_quartile: quantile_sorted(&values, 0.25),
            median: quantile_sorted(&values, 0.5),
            upper_quartile: quantile_sorted(&values, 0.75),
        }
    }
}

/// Rank and interpolation weight of quantile `q` among `n` sorted values.
///
/// The quantile lies between the values at `rank` and `rank + 1`, at
/// `fraction` of the way.
pub fn quantile_position(n: usize, q: f64) -> Option<(usize, f64)> {
    if n == 0 {
        return None;
    }
    let position = q.clamp(0.0, 1.0) * (n - 1) as f64;
    let rank = position.floor();
    Some((rank as usize, position - rank))
}

/// Linear interpolation between two neighbouring ranks.
pub fn interpolate(lower: f64, upper: f64, fraction: f64) -> f64 {
    if fraction == 0.0 {
        lower
    } else {
        lower + (upper - lower) * fraction
    }
}

fn quantile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    let (rank, fraction) = quantile_position(sorted.len(), q)?;
    let lower = sorted[rank];
    let upper = sorted.get(rank + 1).copied().unwrap_or(lower);
    Some(interpolate(lower, upper, fraction))
}

/// Counts value occurrences while remembering first-seen order.
#[derive(Debug, Default)]
pub struct FrequencyCounter {
    entries: HashMap<String, (u64, usize)>,
    seen: usize,
}

impl FrequencyCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, value: &str) {
        let order = self.seen;
        self.seen += 1;
        if let Some(entry) = self.entries.get_mut(value) {
            entry.0 += 1;
        } else {
            self.entries.insert(value.to_string(), (1, order));
        }
    }

    pub fn distinct(&self) -> u64 {
        self.entries.len() as u64
    }

    /// The `k` most frequent values; ties keep first-seen order.
    pub fn top(self, k: usize) -> Vec<ValueFrequency> {
        let mut ranked: Vec<(String, u64, usize)> = self
            .entries
            .into_iter()
            .map(|(value, (frequency, order))| (value, frequency, order))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
        ranked
            .into_iter()
            .take(k)
            .map(|(value, frequency, _)| ValueFrequency::new(value, frequency))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_of_two_values() {
        let summary = NumericSummary::from_values(vec![30.0, 25.0]);
        assert_eq!(summary.mean, Some(27.5));
        assert_eq!(summary.std, Some(2.5));
        assert_eq!(summary.min, Some(25.0));
        assert_eq!(summary.max, Some(30.0));
        assert_eq!(summary.median, Some(27.5));
        assert_eq!(summary.lower_quartile, Some(26.25));
        assert_eq!(summary.upper_quartile, Some(28.75));
    }

    #[test]
    fn test_summary_of_nothing() {
        let summary = NumericSummary::from_values(vec![f64::NAN]);
        assert_eq!(summary, NumericSummary::default());
    }

    #[test]
    fn test_quantile_position() {
        assert_eq!(quantile_position(0, 0.5), None);
        assert_eq!(quantile_position(1, 0.75), Some((0, 0.0)));
        assert_eq!(quantile_position(5, 0.5), Some((2, 0.0)));
        assert_eq!(quantile_position(4, 0.25), Some((0, 0.75)));
    }

    #[test]
    fn test_top_values_break_ties_by_first_seen() {
        let mut counter = FrequencyCounter::new();
        for value in ["b", "a", "c", "a", "b", "d"] {
            counter.add(value);
        }
        assert_eq!(counter.distinct(), 4);
        let top = counter.top(3);
        assert_eq!(
            top,
            vec![
                ValueFrequency::new("b", 2),
                ValueFrequency::new("a", 2),
                ValueFrequency::new("c", 1),
            ]
        );
    }
}
