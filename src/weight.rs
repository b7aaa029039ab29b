use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::fixed_point::{saturate, scale_pow2, MANT_SHIFT};

/// Weight mantissas are stored in 8 bits plus sign.
pub const WEIGHT_MANTISSA_BITS: u8 = 8;

/// 21 bits with the last 6 bits zero.
pub const ACTUAL_WEIGHT_LIMIT: i32 = (1 << 21) - (1 << MANT_SHIFT);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignMode {
    Mixed,
    Excitatory,
    Inhibitory,
}

impl Default for SignMode {
    fn default() -> Self {
        SignMode::Excitatory
    }
}

impl SignMode {
    pub fn mantissa_range(self) -> RangeInclusive<i32> {
        match self {
            SignMode::Mixed => -256..=254,
            SignMode::Excitatory => 0..=255,
            SignMode::Inhibitory => -256..=0,
        }
    }
}

/// A committed synaptic weight: the stored mantissa and the scaled value delivered to the
/// target's current.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightRegister {
    mantissa: i32,
    actual: i32,
}

impl WeightRegister {
    pub(crate) fn new(mantissa: i32, actual: i32) -> Self {
        Self { mantissa, actual }
    }

    pub fn mantissa(&self) -> i32 {
        self.mantissa
    }

    pub fn actual(&self) -> i32 {
        self.actual
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeightQuantizer {
    sign_mode: SignMode,
    num_weight_bits: u8,
    w_exp: i8,
}

impl WeightQuantizer {
    pub fn new(sign_mode: SignMode, num_weight_bits: u8, w_exp: i8) -> Self {
        Self {
            sign_mode,
            num_weight_bits: num_weight_bits.min(WEIGHT_MANTISSA_BITS),
            w_exp,
        }
    }

    pub fn sign_mode(&self) -> SignMode {
        self.sign_mode
    }

    /// Distance between two representable mantissas. The sign bit of mixed synapses
    /// is taken out of `num_weight_bits`.
    pub fn precision(&self) -> i32 {
        let is_mixed = (self.sign_mode == SignMode::Mixed) as i32;
        let num_lsb_bits = WEIGHT_MANTISSA_BITS as i32 - (self.num_weight_bits as i32 - is_mixed);
        1 << num_lsb_bits
    }

    pub fn quantize(&self, logical_weight: i64) -> WeightRegister {
        let range = self.sign_mode.mantissa_range();
        let clamped = saturate(logical_weight, *range.start(), *range.end());

        let precision = self.precision();
        let mantissa = (clamped / precision) * precision;

        WeightRegister {
            mantissa,
            actual: self.actual_weight(mantissa),
        }
    }

    pub fn actual_weight(&self, mantissa: i32) -> i32 {
        let scaled = scale_pow2(mantissa as i64, self.w_exp as i32);
        saturate(
            scaled << MANT_SHIFT,
            -ACTUAL_WEIGHT_LIMIT,
            ACTUAL_WEIGHT_LIMIT,
        )
    }
}
