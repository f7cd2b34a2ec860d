//! Sampling distributions usable by a [`crate::time_model::TimeModel::Function`].
//! Distributions must enforce a sampling of only non-negative real numbers,
//! as this describes a time delta moving forward.

use rand::Rng;
use rand_distr::{Exp as ExpDistribution, LogNormal as LogNormalDistribution, Normal as NormalDistribution};

use crate::rng::SimRng;

/// The `Distribution` trait allows for the creation of custom distributions
/// to be used in the `TimeModel::Function` variant.
pub trait Distribution: std::fmt::Debug {
    /// Sample the distribution for a time delta value. Implementations clamp
    /// negative samples to zero so a process never travels backwards in time.
    fn sample(&self, rng: &mut SimRng) -> f64;

    /// The distribution's analytic mean. Used by the SPT policies (spec
    /// §4.4, §4.5) to rank requests without consuming the RNG — policy
    /// ordering must stay a pure function of configuration, not a draw.
    fn expected_value(&self) -> f64;
}

/// A fixed delay. The only distribution that never consults the RNG.
#[derive(Debug, Clone, Copy)]
pub struct Constant {
    pub value: f64,
}

impl Constant {
    pub fn new(value: f64) -> Self {
        Constant { value }
    }
}

impl Distribution for Constant {
    fn sample(&self, _rng: &mut SimRng) -> f64 {
        self.value.max(0.0)
    }

    fn expected_value(&self) -> f64 {
        self.value.max(0.0)
    }
}

/// Exponential distribution, parameterized by rate `lambda`.
#[derive(Debug)]
pub struct Exponential {
    lambda: f64,
    distribution: ExpDistribution<f64>,
}

impl Exponential {
    pub fn new(lambda: f64) -> Self {
        Exponential {
            lambda,
            distribution: ExpDistribution::new(lambda).expect("exponential rate must be > 0"),
        }
    }
}

impl Distribution for Exponential {
    fn sample(&self, rng: &mut SimRng) -> f64 {
        rng.inner().sample(self.distribution).max(0.0)
    }

    fn expected_value(&self) -> f64 {
        1.0 / self.lambda
    }
}

/// Normal (Gaussian) distribution. Samples below zero are clamped, which
/// biases the mean slightly for large coefficients of variation.
#[derive(Debug)]
pub struct Normal {
    mean: f64,
    distribution: NormalDistribution<f64>,
}

impl Normal {
    pub fn new(mean: f64, std_dev: f64) -> Self {
        Normal {
            mean,
            distribution: NormalDistribution::new(mean, std_dev).expect("invalid normal parameters"),
        }
    }
}

impl Distribution for Normal {
    fn sample(&self, rng: &mut SimRng) -> f64 {
        rng.inner().sample(self.distribution).max(0.0)
    }

    fn expected_value(&self) -> f64 {
        self.mean.max(0.0)
    }
}

/// Log-normal distribution over the underlying normal's (mu, sigma).
#[derive(Debug)]
pub struct LogNormal {
    mu: f64,
    sigma: f64,
    distribution: LogNormalDistribution<f64>,
}

impl LogNormal {
    pub fn new(mu: f64, sigma: f64) -> Self {
        LogNormal {
            mu,
            sigma,
            distribution: LogNormalDistribution::new(mu, sigma).expect("invalid lognormal parameters"),
        }
    }
}

impl Distribution for LogNormal {
    fn sample(&self, rng: &mut SimRng) -> f64 {
        rng.inner().sample(self.distribution).max(0.0)
    }

    fn expected_value(&self) -> f64 {
        (self.mu + self.sigma * self.sigma / 2.0).exp()
    }
}

/// Tag used by the config data model (§6) to pick a distribution
/// constructor without exposing trait objects at the config boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionKind {
    Constant,
    Exponential,
    Normal,
    Lognormal,
}

impl DistributionKind {
    /// How many positional `parameters` this distribution's config needs.
    /// Checked by the config loader before [`DistributionKind::build`] ever
    /// indexes into the slice.
    pub fn arity(self) -> usize {
        match self {
            DistributionKind::Constant | DistributionKind::Exponential => 1,
            DistributionKind::Normal | DistributionKind::Lognormal => 2,
        }
    }

    /// Build the boxed distribution described by this tag and its
    /// positional parameters, following the config schema in spec §6:
    /// `constant: [value]`, `exponential: [lambda]`, `normal: [mean, std]`,
    /// `lognormal: [mu, sigma]`. Panics if `parameters` is shorter than
    /// [`DistributionKind::arity`] — callers must check arity first.
    pub fn build(self, parameters: &[f64]) -> Box<dyn Distribution + Send + Sync> {
        match self {
            DistributionKind::Constant => Box::new(Constant::new(parameters[0])),
            DistributionKind::Exponential => Box::new(Exponential::new(parameters[0])),
            DistributionKind::Normal => Box::new(Normal::new(parameters[0], parameters[1])),
            DistributionKind::Lognormal => Box::new(LogNormal::new(parameters[0], parameters[1])),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_is_deterministic() {
        let mut rng = SimRng::new(1);
        let d = Constant::new(5.0);
        assert_eq!(d.sample(&mut rng), 5.0);
        assert_eq!(d.sample(&mut rng), 5.0);
    }

    #[test]
    fn exponential_is_non_negative() {
        let mut rng = SimRng::new(7);
        let d = Exponential::new(0.5);
        for _ in 0..100 {
            assert!(d.sample(&mut rng) >= 0.0);
        }
    }
}
