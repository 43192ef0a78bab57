//! Gaussian perturbation of field values.
//!
//! Used to produce noisy input fields for round-trip experiments. Every
//! randomizer owns a seeded `ChaCha8Rng`, so the same seed gives the same
//! perturbation on every platform.

use std::collections::BTreeMap;
use std::f64::consts::PI;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::error::RandomizeError;
use crate::node::NodeId;
use crate::stats::ScalarStats;

/// Offset added to sigma so a zero-mean range still spreads.
const SIGMA_FLOOR: f64 = 0.01;

/// Seeded source of clamped Gaussian numbers.
#[derive(Debug, Clone)]
pub struct FieldRandomizer {
    seed: u64,
    rng: ChaCha8Rng,
}

impl FieldRandomizer {
    /// Create a randomizer from a seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// The seed this randomizer was created with.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Restart the sequence from the seed.
    pub fn reset(&mut self) {
        self.rng = ChaCha8Rng::seed_from_u64(self.seed);
    }

    /// Standard normal sample (Box-Muller).
    fn normal(&mut self) -> f64 {
        let u1: f64 = self.rng.gen();
        let u2: f64 = self.rng.gen();
        let u1 = if u1 == 0.0 { f64::MIN_POSITIVE } else { u1 };
        (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
    }

    /// Gaussian number around the midpoint of `[min, max]`, clamped to it.
    ///
    /// Sigma is `mean * sigma_fraction + 0.01`.
    pub fn random_in_range(&mut self, min: f64, max: f64, sigma_fraction: f64) -> f64 {
        let mean = (min + max) / 2.0;
        let sigma = mean * sigma_fraction + SIGMA_FLOOR;
        let sample = mean + sigma * self.normal();
        sample.max(min).min(max)
    }

    /// Multiply every value by a random factor in `[1, 1 + maximum]`.
    ///
    /// A negative `maximum` gives factors in `[1 + maximum, 1]`. The spread
    /// of the factors follows the coefficient of variation of the input.
    pub fn randomize(
        &mut self,
        values: &BTreeMap<NodeId, f64>,
        maximum: f64,
    ) -> Result<BTreeMap<NodeId, f64>, RandomizeError> {
        let input = ScalarStats::from_samples(values.values().copied());
        let usable = usize::try_from(input.sample_count).unwrap_or(usize::MAX);
        if usable < 2 {
            return Err(RandomizeError::TooFewValues(usable));
        }
        let variation = input.sample_std_dev() / input.mean;
        if !variation.is_finite() {
            return Err(RandomizeError::ZeroMean);
        }
        debug!(
            min = input.min,
            max = input.max,
            mean = input.mean,
            std_dev = input.sample_std_dev(),
            variation,
            "randomizer input"
        );

        let (low, high) = if maximum < 0.0 {
            (1.0 + maximum, 1.0)
        } else {
            (1.0, 1.0 + maximum)
        };

        let output: BTreeMap<NodeId, f64> = values
            .iter()
            .map(|(node, value)| (*node, value * self.random_in_range(low, high, variation)))
            .collect();

        let stats = ScalarStats::from_samples(output.values().copied());
        debug!(
            min = stats.min,
            max = stats.max,
            mean = stats.mean,
            std_dev = stats.sample_std_dev(),
            "randomizer output"
        );
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset() -> BTreeMap<NodeId, f64> {
        (1..=20).map(|i| (NodeId(i), 100.0 + i as f64)).collect()
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = FieldRandomizer::new(7);
        let mut b = FieldRandomizer::new(7);
        for _ in 0..10 {
            assert_eq!(
                a.random_in_range(0.0, 1.0, 0.2).to_bits(),
                b.random_in_range(0.0, 1.0, 0.2).to_bits()
            );
        }
    }

    #[test]
    fn test_reset_restarts_sequence() {
        let mut randomizer = FieldRandomizer::new(3);
        let first = randomizer.random_in_range(0.0, 10.0, 0.5);
        randomizer.random_in_range(0.0, 10.0, 0.5);
        randomizer.reset();
        assert_eq!(first, randomizer.random_in_range(0.0, 10.0, 0.5));
    }

    #[test]
    fn test_random_in_range_is_clamped() {
        let mut randomizer = FieldRandomizer::new(11);
        for _ in 0..1000 {
            let v = randomizer.random_in_range(2.0, 3.0, 5.0);
            assert!((2.0..=3.0).contains(&v));
        }
    }

    #[test]
    fn test_randomize_factors_within_maximum() {
        let input = dataset();
        let mut randomizer = FieldRandomizer::new(42);
        let output = randomizer.randomize(&input, 0.1).unwrap();

        assert_eq!(output.len(), input.len());
        for (node, value) in &output {
            let factor = value / input[node];
            assert!((1.0..=1.1 + 1e-12).contains(&factor), "factor {factor}");
        }
    }

    #[test]
    fn test_randomize_negative_maximum_shrinks() {
        let input = dataset();
        let mut randomizer = FieldRandomizer::new(42);
        let output = randomizer.randomize(&input, -0.2).unwrap();

        for (node, value) in &output {
            assert!(*value <= input[node] + 1e-12);
            assert!(*value >= input[node] * 0.8 - 1e-12);
        }
    }

    #[test]
    fn test_randomize_rejects_degenerate_input() {
        let mut randomizer = FieldRandomizer::new(1);

        let single = BTreeMap::from([(NodeId(1), 5.0)]);
        assert_eq!(
            randomizer.randomize(&single, 0.1).unwrap_err(),
            RandomizeError::TooFewValues(1)
        );

        let zeros = BTreeMap::from([(NodeId(1), 0.0), (NodeId(2), 0.0)]);
        assert_eq!(
            randomizer.randomize(&zeros, 0.1).unwrap_err(),
            RandomizeError::ZeroMean
        );
    }

    #[test]
    fn test_randomize_counts_only_real_values() {
        let mut randomizer = FieldRandomizer::new(1);

        let filled = BTreeMap::from([
            (NodeId(1), 5.0),
            (NodeId(2), f64::NAN),
            (NodeId(3), f64::NAN),
        ]);
        assert_eq!(
            randomizer.randomize(&filled, 0.1).unwrap_err(),
            RandomizeError::TooFewValues(1)
        );

        let mut partial = dataset();
        partial.insert(NodeId(99), f64::NAN);
        let output = randomizer.randomize(&partial, 0.1).unwrap();
        assert!(output[&NodeId(99)].is_nan());
        assert!(output[&NodeId(1)].is_finite());
    }
}
