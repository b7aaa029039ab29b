//! Integer decay, scaling and saturation primitives shared by every state update.

use rand::rngs::StdRng;

use crate::rounding::{self, RoundingMode, RoundingStrategy};

/// Decay constants are expressed in units of 1/4096 per step.
pub const DECAY_SCALE: i64 = 1 << 12;

/// Mantissa shift applied to thresholds and weights.
pub const MANT_SHIFT: u32 = 6;

pub const VOLTAGE_MAX: i32 = (1 << 23) - 1;
pub const VOLTAGE_MIN: i32 = -(1 << 23);

pub const CURRENT_MAX: i32 = (1 << 23) - 1;
pub const CURRENT_MIN: i32 = -(1 << 23);

pub struct FixedPointUnit {
    rounding: Box<dyn RoundingStrategy + Send + Sync>,
}

impl FixedPointUnit {
    pub fn new(mode: &RoundingMode) -> Self {
        Self {
            rounding: rounding::create(mode),
        }
    }

    /// `value - round(value * decay_const / 4096)`
    pub fn decay(&self, value: i32, decay_const: u16, rng: &mut StdRng) -> i32 {
        self.decay_by_ratio(value, decay_const as i64, DECAY_SCALE, rng)
    }

    /// `value - round(value * numerator / denominator)`. A zero denominator holds the value.
    pub fn decay_by_ratio(
        &self,
        value: i32,
        numerator: i64,
        denominator: i64,
        rng: &mut StdRng,
    ) -> i32 {
        if denominator == 0 || numerator == 0 || value == 0 {
            return value;
        }

        let decrement = self
            .rounding
            .round_quotient(value as i64 * numerator, denominator, rng);

        saturate(value as i64 - decrement, i32::MIN, i32::MAX)
    }

    /// Rounds `value` onto the grid of integer multiples of `multiple`.
    pub fn round_to_multiple(&self, value: i64, multiple: i64, rng: &mut StdRng) -> i64 {
        if multiple <= 1 {
            return value;
        }

        self.rounding
            .round_quotient(value, multiple, rng)
            .saturating_mul(multiple)
    }
}

pub fn saturate(value: i64, min: i32, max: i32) -> i32 {
    value.clamp(min as i64, max as i64) as i32
}

/// Multiplies by `2^exponent`; negative exponents floor toward negative infinity.
pub fn scale_pow2(value: i64, exponent: i32) -> i64 {
    if exponent >= 0 {
        value.saturating_mul(1i64 << exponent)
    } else {
        value >> (-exponent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;
    use rand::SeedableRng;
    use statrs::statistics::Statistics;

    fn stochastic() -> FixedPointUnit {
        FixedPointUnit::new(&RoundingMode::Stochastic)
    }

    #[test]
    fn full_and_zero_decay() {
        let sut = stochastic();
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(sut.decay(12345, 4096, &mut rng), 0);
        assert_eq!(sut.decay(-12345, 4096, &mut rng), 0);
        assert_eq!(sut.decay(12345, 0, &mut rng), 12345);
    }

    #[test]
    fn exact_decay_needs_no_rounding() {
        let sut = stochastic();
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(sut.decay(7936, 1024, &mut rng), 5952);
        assert_eq!(sut.decay(-7936, 1024, &mut rng), -5952);
    }

    #[test]
    fn decay_converges_without_sign_change() {
        let sut = stochastic();
        let mut rng = StdRng::seed_from_u64(3);

        for decay_const in [1u16, 17, 512, 1024, 4000, 4096] {
            for start in [1i32, 99, 4097, 1_000_000, VOLTAGE_MAX] {
                let mut value = start;
                let mut negative = -start;

                for _ in 0..200_000 {
                    let next = sut.decay(value, decay_const, &mut rng);
                    assert!(next >= 0 && next <= value);
                    value = next;

                    let next_negative = sut.decay(negative, decay_const, &mut rng);
                    assert!(next_negative <= 0 && next_negative >= negative);
                    negative = next_negative;

                    if value == 0 && negative == 0 {
                        break;
                    }
                }

                if decay_const >= 512 {
                    assert_eq!(value, 0);
                    assert_eq!(negative, 0);
                }
            }
        }
    }

    #[test]
    fn stochastic_decay_is_unbiased() {
        let sut = stochastic();
        let mut rng = StdRng::seed_from_u64(11);
        let num_samples = 100_000;

        // 1000 * 1000 / 4096 = 244.140625
        let samples: Vec<f64> = (0..num_samples)
            .map(|_| sut.decay(1000, 1000, &mut rng) as f64)
            .collect();

        let expected = 1000.0 - 1000.0 * 1000.0 / 4096.0;
        assert_approx_eq!(f64, samples.iter().mean(), expected, epsilon = 0.01);
    }

    #[test]
    fn away_from_zero_decay_matches_ceil_leak() {
        let sut = FixedPointUnit::new(&RoundingMode::AwayFromZero);
        let mut rng = StdRng::seed_from_u64(0);
        // ceil(100 * 1000 / 4096) = 25
        assert_eq!(sut.decay(100, 1000, &mut rng), 75);
        assert_eq!(sut.decay(-100, 1000, &mut rng), -75);
        assert_eq!(sut.decay(1, 1, &mut rng), 0);
    }

    #[test]
    fn ratio_decay_with_zero_denominator_holds() {
        let sut = stochastic();
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(sut.decay_by_ratio(100, 1, 0, &mut rng), 100);
        assert_eq!(sut.decay_by_ratio(100, 1, 1, &mut rng), 0);
        assert_eq!(sut.decay_by_ratio(100, 1, 4, &mut rng), 75);
    }

    #[test]
    fn round_to_multiple_is_unbiased() {
        let sut = stochastic();
        let mut rng = StdRng::seed_from_u64(5);

        let samples: Vec<f64> = (0..50_000)
            .map(|_| {
                let rounded = sut.round_to_multiple(5, 4, &mut rng);
                assert!(rounded == 4 || rounded == 8);
                rounded as f64
            })
            .collect();

        assert_approx_eq!(f64, samples.iter().mean(), 5.0, epsilon = 0.05);
        assert_eq!(sut.round_to_multiple(-7, 1, &mut rng), -7);
    }

    #[test]
    fn saturation_and_scaling() {
        assert_eq!(saturate(i64::MAX, VOLTAGE_MIN, VOLTAGE_MAX), VOLTAGE_MAX);
        assert_eq!(saturate(i64::MIN, CURRENT_MIN, CURRENT_MAX), CURRENT_MIN);
        assert_eq!(saturate(-5, CURRENT_MIN, CURRENT_MAX), -5);

        assert_eq!(scale_pow2(3, 6), 192);
        assert_eq!(scale_pow2(7, -1), 3);
        assert_eq!(scale_pow2(-7, -1), -4);
    }
}
