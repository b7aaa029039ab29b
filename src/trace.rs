use std::fmt;
use std::str::FromStr;

use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use simple_error::SimpleError;

use crate::fixed_point::FixedPointUnit;

/// Traces are 7-bit registers.
pub const TRACE_MAX: i32 = 127;

pub const IMPULSE_MAX: u8 = 127;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TraceKind {
    X1,
    X2,
    Y1,
    Y2,
    Y3,
}

impl TraceKind {
    pub const ALL: [TraceKind; 5] = [
        TraceKind::X1,
        TraceKind::X2,
        TraceKind::Y1,
        TraceKind::Y2,
        TraceKind::Y3,
    ];

    pub fn is_pre(self) -> bool {
        matches!(self, TraceKind::X1 | TraceKind::X2)
    }

    pub fn name(self) -> &'static str {
        match self {
            TraceKind::X1 => "x1",
            TraceKind::X2 => "x2",
            TraceKind::Y1 => "y1",
            TraceKind::Y2 => "y2",
            TraceKind::Y3 => "y3",
        }
    }

    fn slot(self) -> usize {
        self as usize
    }
}

impl fmt::Display for TraceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TraceKind {
    type Err = SimpleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TraceKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| SimpleError::new(format!("unknown trace: {}", s)))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct TraceParams {
    pub impulse: u8,
    /// Decay time constant in steps. Zero holds the trace value indefinitely.
    pub tau: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct TraceChannelParams {
    pub x1: TraceParams,
    pub x2: TraceParams,
    pub y1: TraceParams,
    pub y2: TraceParams,
    pub y3: TraceParams,
}

impl TraceChannelParams {
    pub fn get(&self, kind: TraceKind) -> &TraceParams {
        match kind {
            TraceKind::X1 => &self.x1,
            TraceKind::X2 => &self.x2,
            TraceKind::Y1 => &self.y1,
            TraceKind::Y2 => &self.y2,
            TraceKind::Y3 => &self.y3,
        }
    }

    pub fn get_mut(&mut self, kind: TraceKind) -> &mut TraceParams {
        match kind {
            TraceKind::X1 => &mut self.x1,
            TraceKind::X2 => &mut self.x2,
            TraceKind::Y1 => &mut self.y1,
            TraceKind::Y2 => &mut self.y2,
            TraceKind::Y3 => &mut self.y3,
        }
    }
}

/// The five trace channels of one synapse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceState {
    values: [i32; 5],
}

impl TraceState {
    pub fn get(&self, kind: TraceKind) -> i32 {
        self.values[kind.slot()]
    }

    pub fn set(&mut self, kind: TraceKind, value: i32) {
        self.values[kind.slot()] = value.clamp(0, TRACE_MAX);
    }

    pub fn decay(&mut self, params: &TraceChannelParams, fpu: &FixedPointUnit, rng: &mut StdRng) {
        for kind in TraceKind::ALL {
            let tau = params.get(kind).tau;
            let value = &mut self.values[kind.slot()];
            *value = fpu.decay_by_ratio(*value, 1, tau as i64, rng);
        }
    }

    pub fn on_pre_syn_spike(&mut self, params: &TraceChannelParams) {
        self.add_impulses(params, true);
    }

    pub fn on_post_syn_spike(&mut self, params: &TraceChannelParams) {
        self.add_impulses(params, false);
    }

    fn add_impulses(&mut self, params: &TraceChannelParams, pre: bool) {
        for kind in TraceKind::ALL.into_iter().filter(|kind| kind.is_pre() == pre) {
            let value = &mut self.values[kind.slot()];
            *value = (*value + params.get(kind).impulse as i32).min(TRACE_MAX);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rounding::RoundingMode;
    use rand::SeedableRng;

    fn x1_only(impulse: u8, tau: u32) -> TraceChannelParams {
        let mut params = TraceChannelParams::default();
        params.x1 = TraceParams { impulse, tau };
        params
    }

    #[test]
    fn impulse_then_decay_below_impulse() {
        let fpu = FixedPointUnit::new(&RoundingMode::Stochastic);
        let mut rng = StdRng::seed_from_u64(0);

        for tau in [1u32, 2, 5, 20] {
            let params = x1_only(100, tau);
            let mut sut = TraceState::default();
            sut.on_pre_syn_spike(&params);
            assert_eq!(sut.get(TraceKind::X1), 100);

            for _ in 0..tau {
                sut.decay(&params, &fpu, &mut rng);
            }

            assert!(sut.get(TraceKind::X1) < 100);
            assert!(sut.get(TraceKind::X1) >= 0);
        }
    }

    #[test]
    fn zero_tau_holds() {
        let fpu = FixedPointUnit::new(&RoundingMode::Stochastic);
        let mut rng = StdRng::seed_from_u64(0);
        let params = x1_only(42, 0);
        let mut sut = TraceState::default();
        sut.on_pre_syn_spike(&params);

        for _ in 0..1000 {
            sut.decay(&params, &fpu, &mut rng);
        }

        assert_eq!(sut.get(TraceKind::X1), 42);
    }

    #[test]
    fn impulses_accumulate_and_saturate() {
        let params = x1_only(50, 10);
        let mut sut = TraceState::default();

        sut.on_pre_syn_spike(&params);
        sut.on_pre_syn_spike(&params);
        assert_eq!(sut.get(TraceKind::X1), 100);

        sut.on_pre_syn_spike(&params);
        assert_eq!(sut.get(TraceKind::X1), TRACE_MAX);
    }

    #[test]
    fn pre_and_post_channels_are_independent() {
        let mut params = TraceChannelParams::default();
        params.x2 = TraceParams { impulse: 3, tau: 0 };
        params.y1 = TraceParams { impulse: 5, tau: 0 };
        params.y3 = TraceParams { impulse: 7, tau: 0 };

        let mut sut = TraceState::default();
        sut.on_post_syn_spike(&params);

        assert_eq!(sut.get(TraceKind::X1), 0);
        assert_eq!(sut.get(TraceKind::X2), 0);
        assert_eq!(sut.get(TraceKind::Y1), 5);
        assert_eq!(sut.get(TraceKind::Y2), 0);
        assert_eq!(sut.get(TraceKind::Y3), 7);

        sut.on_pre_syn_spike(&params);
        assert_eq!(sut.get(TraceKind::X2), 3);
        assert_eq!(sut.get(TraceKind::Y1), 5);
    }

    #[test]
    fn trace_kind_names() {
        for kind in TraceKind::ALL {
            assert_eq!(kind.name().parse::<TraceKind>().unwrap(), kind);
        }
        assert!("x0".parse::<TraceKind>().is_err());
    }
}
