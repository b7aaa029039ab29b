use std::fmt::{self, Display};

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use simple_error::SimpleError;

use crate::error::ConfigurationError;
use crate::rounding::RoundingMode;
use crate::trace::{TraceChannelParams, TraceKind, IMPULSE_MAX};
use crate::weight::SignMode;

pub const REFRACTORY_PERIOD_MIN: u8 = 1;
pub const REFRACTORY_PERIOD_MAX: u8 = 64;
pub const THRESHOLD_V_MANT_MAX: u32 = 131071;
pub const DECAY_MAX: u16 = 4096;
pub const DELAY_MAX: u8 = 62;
pub const W_EXP_MIN: i8 = -8;
pub const W_EXP_MAX: i8 = 7;
pub const NUM_WEIGHT_BITS_MAX: u8 = 8;

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct NetworkParams {
    pub neuron_groups: Vec<NeuronGroupParams>,
    pub spike_sources: Vec<SpikeSourceParams>,
    pub synapse_groups: Vec<SynapseGroupParams>,
    pub technical_params: TechnicalParams,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NeuronGroupParams {
    pub num_neurons: usize,
    #[serde(default)]
    pub neuron_params: NeuronParams,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct NeuronParams {
    pub refractory_period: u8,
    pub threshold_v_mant: u32,
    pub decay_v: u16,
    pub decay_i: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpikeSourceParams {
    pub num_neurons: usize,
    pub indices: Vec<usize>,
    pub times: Vec<usize>,
    /// Zero fires once, otherwise the pattern repeats every `period` steps.
    #[serde(default)]
    pub period: usize,
    /// Trust the caller that events are ordered by time, then index.
    #[serde(default)]
    pub sorted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceRef {
    NeuronGroup(usize),
    SpikeSource(usize),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SynapseGroupParams {
    pub source: SourceRef,
    pub target_group: usize,
    pub connections: Vec<ConnectionParams>,
    #[serde(default)]
    pub synapse_params: SynapseParams,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionParams {
    pub pre: usize,
    pub post: usize,
    /// Initial weight mantissa.
    #[serde(default)]
    pub weight: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SynapseParams {
    pub delay: u8,
    /// Empty disables learning.
    pub learning_rule: String,
    pub w_exp: i8,
    pub sign_mode: SignMode,
    pub num_weight_bits: u8,
    pub traces: TraceChannelParams,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct TechnicalParams {
    pub seed: u64,
    pub rounding_mode: RoundingMode,
    pub num_threads: usize,
}

impl Default for NeuronParams {
    fn default() -> Self {
        Self {
            refractory_period: 1,
            threshold_v_mant: 100,
            decay_v: 0,
            decay_i: 4096,
        }
    }
}

impl Default for SynapseParams {
    fn default() -> Self {
        Self {
            delay: 0,
            learning_rule: String::new(),
            w_exp: 0,
            sign_mode: SignMode::Excitatory,
            num_weight_bits: 8,
            traces: TraceChannelParams::default(),
        }
    }
}

impl Default for TechnicalParams {
    fn default() -> Self {
        Self {
            seed: 0,
            rounding_mode: RoundingMode::Stochastic,
            num_threads: 1,
        }
    }
}

impl NeuronGroupParams {
    pub fn new(num_neurons: usize, neuron_params: NeuronParams) -> Self {
        Self {
            num_neurons,
            neuron_params,
        }
    }
}

impl SpikeSourceParams {
    pub fn new(num_neurons: usize, indices: Vec<usize>, times: Vec<usize>) -> Self {
        Self {
            num_neurons,
            indices,
            times,
            period: 0,
            sorted: false,
        }
    }
}

impl NeuronParams {
    pub fn threshold(&self) -> i32 {
        (self.threshold_v_mant as i32) << crate::fixed_point::MANT_SHIFT
    }
}

impl Display for NeuronParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Parameters of the neuron group:")?;
        writeln!(f)?;
        write_param(f, "decay_v", self.decay_v)?;
        write_param(f, "decay_I", self.decay_i)?;
        write_param(f, "tau_v", 4096.0 / self.decay_v as f64)?;
        write_param(f, "tau_I", 4096.0 / self.decay_i as f64)?;
        write_param(f, "refractory", self.refractory_period)?;
        write_param(f, "threshold_v_mant", self.threshold_v_mant)?;
        write_param(f, "v_th", self.threshold())?;
        write_param(f, "reset_v", 0)
    }
}

impl Display for SynapseParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Parameters of the synapses:")?;
        writeln!(f)?;
        write_param(f, "delay", self.delay)?;
        write_param(f, "dw", &self.learning_rule)?;
        write_param(f, "w_exp", self.w_exp)?;
        write_param(f, "sign_mode", format!("{:?}", self.sign_mode))?;
        write_param(f, "num_weight_bits", self.num_weight_bits)?;
        for kind in TraceKind::ALL {
            let trace = self.traces.get(kind);
            write_param(f, &format!("imp_{}", kind), trace.impulse)?;
            write_param(f, &format!("tau_{}", kind), trace.tau)?;
        }
        Ok(())
    }
}

fn write_param(f: &mut fmt::Formatter<'_>, name: &str, value: impl Display) -> fmt::Result {
    writeln!(f, "{:18} {}", name, value)
}

fn field(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}

fn check_range<T: PartialOrd + Display>(
    errors: &mut Vec<SimpleError>,
    field: &str,
    value: T,
    low: T,
    high: T,
) {
    if value < low || value > high {
        errors.push(SimpleError::new(format!(
            "{} has to be between {} and {}, got {}",
            field, low, high, value
        )));
    }
}

pub fn validate_network_params(params: &NetworkParams) -> Result<(), ConfigurationError> {
    let mut errors = Vec::new();

    for (group_id, group) in params.neuron_groups.iter().enumerate() {
        collect_neuron_param_errors(
            &format!("neuron_groups[{}].neuron_params", group_id),
            &group.neuron_params,
            &mut errors,
        );
    }

    for (source_id, source) in params.spike_sources.iter().enumerate() {
        collect_spike_source_errors(
            &format!("spike_sources[{}]", source_id),
            source,
            &mut errors,
        );
    }

    for (group_id, group) in params.synapse_groups.iter().enumerate() {
        collect_synapse_group_errors(
            &format!("synapse_groups[{}]", group_id),
            group,
            params,
            &mut errors,
        );
    }

    collect_technical_param_errors(&params.technical_params, &mut errors);

    ConfigurationError::check(errors)
}

pub fn validate_neuron_params(params: &NeuronParams) -> Result<(), ConfigurationError> {
    let mut errors = Vec::new();
    collect_neuron_param_errors("", params, &mut errors);
    ConfigurationError::check(errors)
}

pub fn validate_synapse_params(params: &SynapseParams) -> Result<(), ConfigurationError> {
    let mut errors = Vec::new();
    collect_synapse_param_errors("", params, &mut errors);
    ConfigurationError::check(errors)
}

pub fn validate_spike_source_params(params: &SpikeSourceParams) -> Result<(), ConfigurationError> {
    let mut errors = Vec::new();
    collect_spike_source_errors("", params, &mut errors);
    ConfigurationError::check(errors)
}

/// Checks initial or restored weight mantissas against the sign-mode range.
pub fn validate_weights<'a>(
    prefix: &str,
    sign_mode: SignMode,
    weights: impl IntoIterator<Item = &'a i32>,
) -> Result<(), ConfigurationError> {
    let mut errors = Vec::new();
    collect_weight_errors(prefix, sign_mode, weights, &mut errors);
    ConfigurationError::check(errors)
}

fn collect_neuron_param_errors(prefix: &str, params: &NeuronParams, errors: &mut Vec<SimpleError>) {
    check_range(
        errors,
        &field(prefix, "refractory_period"),
        params.refractory_period,
        REFRACTORY_PERIOD_MIN,
        REFRACTORY_PERIOD_MAX,
    );
    check_range(
        errors,
        &field(prefix, "threshold_v_mant"),
        params.threshold_v_mant,
        0,
        THRESHOLD_V_MANT_MAX,
    );
    check_range(errors, &field(prefix, "decay_v"), params.decay_v, 0, DECAY_MAX);
    check_range(errors, &field(prefix, "decay_i"), params.decay_i, 0, DECAY_MAX);
}

fn collect_spike_source_errors(
    prefix: &str,
    params: &SpikeSourceParams,
    errors: &mut Vec<SimpleError>,
) {
    for (pos, index) in params.indices.iter().enumerate() {
        if *index >= params.num_neurons {
            errors.push(SimpleError::new(format!(
                "{} has to be less than num_neurons ({}), got {}",
                field(prefix, &format!("indices[{}]", pos)),
                params.num_neurons,
                index
            )));
        }
    }

    if params.period > 0 {
        for (pos, time) in params.times.iter().enumerate() {
            if *time >= params.period {
                errors.push(SimpleError::new(format!(
                    "{} has to be less than period ({}), got {}",
                    field(prefix, &format!("times[{}]", pos)),
                    params.period,
                    time
                )));
            }
        }
    }

    let events = params.times.iter().zip(params.indices.iter());
    let ordered: Vec<_> = if params.sorted {
        events.collect()
    } else {
        events.sorted().collect()
    };

    for ((time, index), _) in ordered
        .into_iter()
        .tuple_windows()
        .filter(|(a, b)| a == b)
    {
        errors.push(SimpleError::new(format!(
            "{} contains index {} more than once at time {}",
            field(prefix, "indices"),
            index,
            time
        )));
    }
}

fn collect_synapse_group_errors(
    prefix: &str,
    group: &SynapseGroupParams,
    params: &NetworkParams,
    errors: &mut Vec<SimpleError>,
) {
    let source_size = match group.source {
        SourceRef::NeuronGroup(id) => params.neuron_groups.get(id).map(|g| g.num_neurons),
        SourceRef::SpikeSource(id) => params.spike_sources.get(id).map(|s| s.num_neurons),
    };

    if source_size.is_none() {
        errors.push(SimpleError::new(format!(
            "{} refers to unknown {:?}",
            field(prefix, "source"),
            group.source
        )));
    }

    let target_size = params
        .neuron_groups
        .get(group.target_group)
        .map(|g| g.num_neurons);

    if target_size.is_none() {
        errors.push(SimpleError::new(format!(
            "{} refers to unknown neuron group {}",
            field(prefix, "target_group"),
            group.target_group
        )));
    }

    for (pos, connection) in group.connections.iter().enumerate() {
        let connection_prefix = field(prefix, &format!("connections[{}]", pos));

        if let Some(source_size) = source_size {
            if connection.pre >= source_size {
                errors.push(SimpleError::new(format!(
                    "{} has to be less than the source size ({}), got {}",
                    field(&connection_prefix, "pre"),
                    source_size,
                    connection.pre
                )));
            }
        }

        if let Some(target_size) = target_size {
            if connection.post >= target_size {
                errors.push(SimpleError::new(format!(
                    "{} has to be less than the target size ({}), got {}",
                    field(&connection_prefix, "post"),
                    target_size,
                    connection.post
                )));
            }
        }
    }

    collect_weight_errors(
        &field(prefix, "connections"),
        group.synapse_params.sign_mode,
        group.connections.iter().map(|connection| &connection.weight),
        errors,
    );

    collect_synapse_param_errors(&field(prefix, "synapse_params"), &group.synapse_params, errors);
}

fn collect_synapse_param_errors(
    prefix: &str,
    params: &SynapseParams,
    errors: &mut Vec<SimpleError>,
) {
    check_range(errors, &field(prefix, "delay"), params.delay, 0, DELAY_MAX);
    check_range(errors, &field(prefix, "w_exp"), params.w_exp, W_EXP_MIN, W_EXP_MAX);
    check_range(
        errors,
        &field(prefix, "num_weight_bits"),
        params.num_weight_bits,
        0,
        NUM_WEIGHT_BITS_MAX,
    );

    for kind in TraceKind::ALL {
        check_range(
            errors,
            &field(prefix, &format!("traces.{}.impulse", kind)),
            params.traces.get(kind).impulse,
            0,
            IMPULSE_MAX,
        );
    }
}

fn collect_weight_errors<'a>(
    prefix: &str,
    sign_mode: SignMode,
    weights: impl IntoIterator<Item = &'a i32>,
    errors: &mut Vec<SimpleError>,
) {
    let range = sign_mode.mantissa_range();

    for (pos, weight) in weights.into_iter().enumerate() {
        check_range(
            errors,
            &format!("{}[{}].weight ({:?})", prefix, pos, sign_mode),
            *weight,
            *range.start(),
            *range.end(),
        );
    }
}

fn collect_technical_param_errors(params: &TechnicalParams, errors: &mut Vec<SimpleError>) {
    if params.num_threads == 0 {
        errors.push(SimpleError::new(
            "technical_params.num_threads must be strictly positive",
        ));
    } else if params.num_threads > num_cpus::get() {
        errors.push(SimpleError::new(
            "technical_params.num_threads must not be greater than number of available CPUs",
        ));
    }
}
