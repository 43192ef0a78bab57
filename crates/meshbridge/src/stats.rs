//! Statistical summaries.
//!
//! Used for neighbor-distance reports, round-trip validation and field
//! randomization. NaN samples are skipped, so a summary describes the
//! resolved part of a field only.

use serde::{Deserialize, Serialize};

/// Statistics for a single scalar series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScalarStats {
    /// Arithmetic mean
    pub mean: f64,
    /// Population variance (σ²)
    pub variance: f64,
    /// Minimum value
    pub min: f64,
    /// Maximum value
    pub max: f64,
    /// Number of samples contributing to these stats
    pub sample_count: u64,
}

impl Default for ScalarStats {
    fn default() -> Self {
        Self::empty()
    }
}

impl ScalarStats {
    /// Create stats from a single value.
    #[must_use]
    pub fn from_value(value: f64) -> Self {
        Self {
            mean: value,
            variance: 0.0,
            min: value,
            max: value,
            sample_count: 1,
        }
    }

    /// Create empty stats.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            mean: 0.0,
            variance: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            sample_count: 0,
        }
    }

    /// Summarize a series, skipping NaN samples.
    #[must_use]
    pub fn from_samples<I>(samples: I) -> Self
    where
        I: IntoIterator<Item = f64>,
    {
        samples
            .into_iter()
            .filter(|v| !v.is_nan())
            .fold(Self::empty(), |acc, v| Self::merge(&acc, &Self::from_value(v)))
    }

    /// Merge two stats using weighted combination.
    ///
    /// Uses Welford's online algorithm for combining variances.
    #[must_use]
    pub fn merge(a: &Self, b: &Self) -> Self {
        if a.sample_count == 0 {
            return *b;
        }
        if b.sample_count == 0 {
            return *a;
        }

        #[allow(clippy::cast_precision_loss)]
        let (n_a, n_b) = (a.sample_count as f64, b.sample_count as f64);
        let n_total = n_a + n_b;

        let delta = b.mean - a.mean;
        let mean = a.mean + delta * (n_b / n_total);

        // Combined variance using parallel algorithm
        let variance =
            (a.variance * n_a + b.variance * n_b + delta * delta * n_a * n_b / n_total) / n_total;

        Self {
            mean,
            variance,
            min: a.min.min(b.min),
            max: a.max.max(b.max),
            sample_count: a.sample_count + b.sample_count,
        }
    }

    /// Merge multiple stats.
    #[must_use]
    pub fn merge_many(stats: &[Self]) -> Self {
        stats
            .iter()
            .fold(Self::empty(), |acc, s| Self::merge(&acc, s))
    }

    /// Standard deviation.
    #[must_use]
    pub fn std_dev(&self) -> f64 {
        self.variance.sqrt()
    }

    /// Sample standard deviation (n - 1 denominator), NaN below two samples.
    #[must_use]
    pub fn sample_std_dev(&self) -> f64 {
        if self.sample_count < 2 {
            return f64::NAN;
        }
        #[allow(clippy::cast_precision_loss)]
        let n = self.sample_count as f64;
        (self.variance * n / (n - 1.0)).sqrt()
    }

    /// Check if no samples contributed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sample_count == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_stats_merge() {
        let a = ScalarStats::from_value(10.0);
        let b = ScalarStats::from_value(20.0);
        let merged = ScalarStats::merge(&a, &b);

        assert_eq!(merged.mean, 15.0);
        assert_eq!(merged.min, 10.0);
        assert_eq!(merged.max, 20.0);
        assert_eq!(merged.sample_count, 2);
        // Variance should be 25.0 ((10-15)² + (20-15)²) / 2
        assert!((merged.variance - 25.0).abs() < 1e-12);
    }

    #[test]
    fn test_scalar_stats_merge_empty() {
        let a = ScalarStats::empty();
        let b = ScalarStats::from_value(10.0);
        let merged = ScalarStats::merge(&a, &b);

        assert_eq!(merged.mean, 10.0);
        assert_eq!(merged.sample_count, 1);
    }

    #[test]
    fn test_from_samples_skips_nan() {
        let stats = ScalarStats::from_samples([2.0, f64::NAN, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert_eq!(stats.sample_count, 8);
        assert!((stats.mean - 5.0).abs() < 1e-12);
        assert!((stats.std_dev() - 2.0).abs() < 1e-12);
        assert_eq!(stats.min, 2.0);
        assert_eq!(stats.max, 9.0);
    }

    #[test]
    fn test_sample_std_dev_needs_two_samples() {
        assert!(ScalarStats::from_value(1.0).sample_std_dev().is_nan());
        let stats = ScalarStats::from_samples([1.0, 3.0]);
        assert!((stats.sample_std_dev() - 2.0_f64.sqrt()).abs() < 1e-12);
    }
}
