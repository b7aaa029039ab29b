use rand::{rngs::StdRng, Rng};
use serde::{Deserialize, Serialize};

/// How the fractional part of an integer quotient is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundingMode {
    /// Round up with probability equal to the fractional remainder. Unbiased in expectation.
    Stochastic,
    /// `sign(n) * ceil(|n| / d)`, the deterministic leak rule of the neuron compartment.
    AwayFromZero,
    TowardZero,
}

impl Default for RoundingMode {
    fn default() -> Self {
        RoundingMode::Stochastic
    }
}

pub trait RoundingStrategy {
    /// Rounds `numerator / denominator` to an integer. `denominator` must be positive.
    fn round_quotient(&self, numerator: i64, denominator: i64, rng: &mut StdRng) -> i64;
}

pub fn create(mode: &RoundingMode) -> Box<dyn RoundingStrategy + Send + Sync> {
    match *mode {
        RoundingMode::Stochastic => Box::new(Stochastic),
        RoundingMode::AwayFromZero => Box::new(AwayFromZero),
        RoundingMode::TowardZero => Box::new(TowardZero),
    }
}

struct Stochastic;

struct AwayFromZero;

struct TowardZero;

impl RoundingStrategy for Stochastic {
    fn round_quotient(&self, numerator: i64, denominator: i64, rng: &mut StdRng) -> i64 {
        let quotient = numerator.div_euclid(denominator);
        let remainder = numerator.rem_euclid(denominator);

        if remainder > 0 && rng.gen_range(0..denominator) < remainder {
            quotient + 1
        } else {
            quotient
        }
    }
}

impl RoundingStrategy for AwayFromZero {
    fn round_quotient(&self, numerator: i64, denominator: i64, _rng: &mut StdRng) -> i64 {
        let magnitude = numerator
            .unsigned_abs()
            .div_ceil(denominator.unsigned_abs());

        if numerator < 0 {
            0i64.saturating_sub_unsigned(magnitude)
        } else {
            i64::try_from(magnitude).unwrap_or(i64::MAX)
        }
    }
}

impl RoundingStrategy for TowardZero {
    fn round_quotient(&self, numerator: i64, denominator: i64, _rng: &mut StdRng) -> i64 {
        numerator / denominator
    }
}
