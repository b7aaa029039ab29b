use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};
use simple_error::{SimpleError, SimpleResult};

use crate::{
    error::{EmulatorError, ShapeError},
    fixed_point::FixedPointUnit,
    neuron::NeuronGroup,
    params::{self, NetworkParams, SourceRef},
    spike_source::SpikeEventSource,
    state_snapshot::StateSnapshot,
    synapse::Synapses,
    trace::TraceKind,
    util::{for_each_partitioned, object_rng},
};

/// The stages of one simulation step, in execution order. Each stage sees all writes of the
/// previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    SpikeDelivery,
    NeuronUpdate,
    TraceUpdate,
    LearningUpdate,
    WeightCommit,
}

impl Phase {
    pub const PIPELINE: [Phase; 5] = [
        Phase::SpikeDelivery,
        Phase::NeuronUpdate,
        Phase::TraceUpdate,
        Phase::LearningUpdate,
        Phase::WeightCommit,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectId {
    NeuronGroup(usize),
    SpikeSource(usize),
    Synapses(usize),
}

impl From<SourceRef> for ObjectId {
    fn from(source: SourceRef) -> Self {
        match source {
            SourceRef::NeuronGroup(id) => ObjectId::NeuronGroup(id),
            SourceRef::SpikeSource(id) => ObjectId::SpikeSource(id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateVariable {
    Voltage,
    Current,
    RefractoryCounter,
    Trace(TraceKind),
    WeightMantissa,
    ActualWeight,
}

impl StateVariable {
    pub fn name(&self) -> &'static str {
        match self {
            StateVariable::Voltage => "v",
            StateVariable::Current => "I",
            StateVariable::RefractoryCounter => "refractory",
            StateVariable::Trace(kind) => kind.name(),
            StateVariable::WeightMantissa => "w",
            StateVariable::ActualWeight => "w_act",
        }
    }
}

impl fmt::Display for StateVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StateVariable {
    type Err = SimpleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "v" => Ok(StateVariable::Voltage),
            "I" => Ok(StateVariable::Current),
            "refractory" => Ok(StateVariable::RefractoryCounter),
            "w" => Ok(StateVariable::WeightMantissa),
            "w_act" => Ok(StateVariable::ActualWeight),
            _ => s
                .parse::<TraceKind>()
                .map(StateVariable::Trace)
                .map_err(|_| SimpleError::new(format!("unknown state variable: {}", s))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexSelector {
    All,
    Indices(Vec<usize>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpikeGroup {
    pub source: ObjectId,
    pub indices: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepResult {
    pub t: usize,
    /// One entry per spike source, then one per neuron group, in declaration order.
    pub spikes: Vec<SpikeGroup>,
    pub synaptic_transmission_count: usize,
    pub weight_update_count: usize,
}

impl StepResult {
    pub fn indices_for(&self, source: ObjectId) -> Option<&[usize]> {
        self.spikes
            .iter()
            .find(|group| group.source == source)
            .map(|group| group.indices.as_slice())
    }

    pub fn num_spikes(&self) -> usize {
        self.spikes.iter().map(|group| group.indices.len()).sum()
    }
}

pub struct Network {
    neuron_groups: Vec<NeuronGroup>,
    spike_sources: Vec<SpikeEventSource>,
    synapse_groups: Vec<Synapses>,
    fpu: FixedPointUnit,
    num_threads: usize,
    next_t: usize,
}

impl Network {
    /// Validates `params` and builds every simulation object. Fails with the first error kind
    /// encountered: shape, then configuration, then rule syntax.
    pub fn configure(params: NetworkParams) -> Result<Network, EmulatorError> {
        for (source_id, source) in params.spike_sources.iter().enumerate() {
            ShapeError::check(
                &format!("spike_sources[{}] indices and times", source_id),
                source.indices.len(),
                source.times.len(),
            )?;
        }

        params::validate_network_params(&params)?;

        let technical_params = &params.technical_params;
        let seed = technical_params.seed;

        let neuron_groups = params
            .neuron_groups
            .iter()
            .enumerate()
            .map(|(group_id, group)| {
                NeuronGroup::new(
                    group.num_neurons,
                    group.neuron_params.clone(),
                    object_rng(seed, "neuron_group", group_id),
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        let spike_sources = params
            .spike_sources
            .iter()
            .map(SpikeEventSource::new)
            .collect::<Result<Vec<_>, _>>()?;

        let synapse_groups = params
            .synapse_groups
            .iter()
            .enumerate()
            .map(|(group_id, group)| {
                Synapses::new(group, object_rng(seed, "synapse_group", group_id))
            })
            .collect::<Result<Vec<_>, _>>()?;

        log::debug!(
            "configured network: {} neurons in {} groups, {} spike sources, {} synapses in {} groups, {:?} rounding, {} threads",
            neuron_groups.iter().map(NeuronGroup::len).sum::<usize>(),
            neuron_groups.len(),
            spike_sources.len(),
            synapse_groups.iter().map(Synapses::len).sum::<usize>(),
            synapse_groups.len(),
            technical_params.rounding_mode,
            technical_params.num_threads,
        );

        for (group_id, group) in neuron_groups.iter().enumerate() {
            log::debug!("neuron group {}\n{}", group_id, group.params());
        }

        for (group_id, group) in synapse_groups.iter().enumerate() {
            log::debug!("synapse group {}\n{}", group_id, group.params());
        }

        Ok(Network {
            neuron_groups,
            spike_sources,
            synapse_groups,
            fpu: FixedPointUnit::new(&technical_params.rounding_mode),
            num_threads: technical_params.num_threads,
            next_t: 0,
        })
    }

    pub fn neuron_groups(&self) -> &[NeuronGroup] {
        &self.neuron_groups
    }

    pub fn spike_sources(&self) -> &[SpikeEventSource] {
        &self.spike_sources
    }

    pub fn synapse_groups(&self) -> &[Synapses] {
        &self.synapse_groups
    }

    pub fn synapse_group_mut(&mut self, group_id: usize) -> Option<&mut Synapses> {
        self.synapse_groups.get_mut(group_id)
    }

    /// The time the next call to `run` starts at.
    pub fn next_t(&self) -> usize {
        self.next_t
    }

    pub fn step(&mut self, global_time: usize) -> StepResult {
        if global_time != self.next_t {
            log::warn!(
                "stepping at t = {}, expected t = {}",
                global_time,
                self.next_t
            );
        }

        let mut result = StepResult {
            t: global_time,
            spikes: Vec::new(),
            synaptic_transmission_count: 0,
            weight_update_count: 0,
        };

        for phase in Phase::PIPELINE {
            self.run_phase(phase, &mut result);
        }

        self.next_t = global_time + 1;

        log::trace!(
            "t = {}: {} spikes, {} transmissions, {} weight updates",
            global_time,
            result.num_spikes(),
            result.synaptic_transmission_count,
            result.weight_update_count
        );

        result
    }

    /// Steps `num_steps` consecutive times starting at `next_t`.
    pub fn run(&mut self, num_steps: usize) -> Vec<StepResult> {
        (0..num_steps).map(|_| self.step(self.next_t)).collect()
    }

    fn run_phase(&mut self, phase: Phase, result: &mut StepResult) {
        let num_threads = self.num_threads;

        match phase {
            Phase::SpikeDelivery => {
                self.deliver_spikes(result);
            }
            Phase::NeuronUpdate => {
                let fpu = &self.fpu;
                for_each_partitioned(&mut self.neuron_groups, num_threads, |group| {
                    group.update(fpu)
                });

                result
                    .spikes
                    .extend(self.neuron_groups.iter().enumerate().map(|(group_id, group)| {
                        SpikeGroup {
                            source: ObjectId::NeuronGroup(group_id),
                            indices: group.last_spikes().to_vec(),
                        }
                    }));
            }
            Phase::TraceUpdate => {
                let fpu = &self.fpu;
                let neuron_groups = &self.neuron_groups;

                for_each_partitioned(&mut self.synapse_groups, num_threads, |synapses| {
                    let post_spikes = neuron_groups[synapses.target_group()].last_spikes();
                    synapses.update_traces(post_spikes, fpu);
                });
            }
            Phase::LearningUpdate => {
                for_each_partitioned(&mut self.synapse_groups, num_threads, |synapses| {
                    synapses.evaluate_learning_rule()
                });
            }
            Phase::WeightCommit => {
                let fpu = &self.fpu;
                let weight_update_count = AtomicUsize::new(0);

                for_each_partitioned(&mut self.synapse_groups, num_threads, |synapses| {
                    let count = synapses.commit_weights(fpu);
                    weight_update_count.fetch_add(count, Ordering::Relaxed);
                });

                result.weight_update_count = weight_update_count.into_inner();
            }
        }
    }

    fn deliver_spikes(&mut self, result: &mut StepResult) {
        for (source_id, source) in self.spike_sources.iter_mut().enumerate() {
            let indices = source.emit(result.t).to_vec();
            result.spikes.push(SpikeGroup {
                source: ObjectId::SpikeSource(source_id),
                indices,
            });
        }

        // neuron groups have not been updated yet, so these are the previous step's spikes
        let neuron_spikes: Vec<Vec<usize>> = self
            .neuron_groups
            .iter()
            .map(|group| group.last_spikes().to_vec())
            .collect();

        for synapses in self.synapse_groups.iter_mut() {
            let pre_spikes = match synapses.source() {
                SourceRef::NeuronGroup(id) => neuron_spikes[id].as_slice(),
                SourceRef::SpikeSource(id) => self.spike_sources[id].last_spikes(),
            };

            let target_input = self.neuron_groups[synapses.target_group()].input_mut();
            result.synaptic_transmission_count += synapses.transmit(pre_spikes, target_input);
        }
    }

    /// Reads the current value of `variable` for the selected elements of `object`.
    pub fn record_request(
        &self,
        object: ObjectId,
        variable: StateVariable,
        selector: &IndexSelector,
    ) -> SimpleResult<Vec<i64>> {
        let values: Vec<i64> = match object {
            ObjectId::NeuronGroup(id) => {
                let group = self
                    .neuron_groups
                    .get(id)
                    .ok_or_else(|| unknown_object(object))?;

                let states = group.states().iter();
                match variable {
                    StateVariable::Voltage => states.map(|state| state.voltage as i64).collect(),
                    StateVariable::Current => states.map(|state| state.current as i64).collect(),
                    StateVariable::RefractoryCounter => {
                        states.map(|state| state.refractory_counter as i64).collect()
                    }
                    _ => return Err(inapplicable(object, variable)),
                }
            }
            ObjectId::Synapses(id) => {
                let synapses = self
                    .synapse_groups
                    .get(id)
                    .ok_or_else(|| unknown_object(object))?;

                match variable {
                    StateVariable::Trace(kind) => synapses
                        .traces()
                        .iter()
                        .map(|traces| traces.get(kind) as i64)
                        .collect(),
                    StateVariable::WeightMantissa => synapses
                        .weights()
                        .iter()
                        .map(|weight| weight.mantissa() as i64)
                        .collect(),
                    StateVariable::ActualWeight => synapses
                        .weights()
                        .iter()
                        .map(|weight| weight.actual() as i64)
                        .collect(),
                    _ => return Err(inapplicable(object, variable)),
                }
            }
            ObjectId::SpikeSource(id) => {
                if id >= self.spike_sources.len() {
                    return Err(unknown_object(object));
                }

                return Err(inapplicable(object, variable));
            }
        };

        match selector {
            IndexSelector::All => Ok(values),
            IndexSelector::Indices(indices) => indices
                .iter()
                .map(|&index| {
                    values.get(index).copied().ok_or_else(|| {
                        SimpleError::new(format!(
                            "index {} out of range for {:?} with {} elements",
                            index,
                            object,
                            values.len()
                        ))
                    })
                })
                .collect(),
        }
    }

    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            neuron_groups: self
                .neuron_groups
                .iter()
                .map(|group| group.states().to_vec())
                .collect(),
            synapse_groups: self.synapse_groups.iter().map(Synapses::states).collect(),
        }
    }

    /// Writes a snapshot back. Nothing changes unless every group accepts its part.
    pub fn restore(&mut self, snapshot: &StateSnapshot) -> Result<(), EmulatorError> {
        ShapeError::check(
            "neuron groups",
            self.neuron_groups.len(),
            snapshot.neuron_groups.len(),
        )?;
        ShapeError::check(
            "synapse groups",
            self.synapse_groups.len(),
            snapshot.synapse_groups.len(),
        )?;

        let mut neuron_groups = self.neuron_groups.clone();
        for (group, states) in neuron_groups.iter_mut().zip(&snapshot.neuron_groups) {
            group.restore_states(states)?;
        }

        let mut synapse_groups = self.synapse_groups.clone();
        for (group, states) in synapse_groups.iter_mut().zip(&snapshot.synapse_groups) {
            group.restore_states(states)?;
        }

        self.neuron_groups = neuron_groups;
        self.synapse_groups = synapse_groups;
        Ok(())
    }
}

fn unknown_object(object: ObjectId) -> SimpleError {
    SimpleError::new(format!("unknown object: {:?}", object))
}

fn inapplicable(object: ObjectId, variable: StateVariable) -> SimpleError {
    SimpleError::new(format!(
        "state variable {} does not apply to {:?}",
        variable, object
    ))
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::params::{ConnectionParams, NeuronGroupParams, NeuronParams, SynapseGroupParams};
    use crate::util::test_util;

    #[test]
    fn state_variable_names() {
        for name in ["v", "I", "refractory", "x1", "x2", "y1", "y2", "y3", "w", "w_act"] {
            let variable: StateVariable = name.parse().unwrap();
            assert_eq!(variable.to_string(), name);
        }

        assert_eq!(
            "u".parse::<StateVariable>().unwrap_err().as_str(),
            "unknown state variable: u"
        );
    }

    #[test]
    fn pipeline_order() {
        assert_eq!(Phase::PIPELINE.first(), Some(&Phase::SpikeDelivery));
        assert_eq!(Phase::PIPELINE.last(), Some(&Phase::WeightCommit));
    }

    #[test]
    fn shape_error_comes_first() {
        let mut params = test_util::get_template_network_params();
        params.spike_sources[0].times.pop();
        params.neuron_groups[0].neuron_params.decay_v = 5000;

        assert!(matches!(
            Network::configure(params),
            Err(EmulatorError::Shape(_))
        ));
    }

    #[test]
    fn rule_syntax_error() {
        let mut params = test_util::get_template_network_params();
        params.synapse_groups[1].synapse_params.learning_rule = "x1 * w".to_string();

        match Network::configure(params) {
            Err(EmulatorError::RuleSyntax(err)) => assert_eq!(err.token, "w"),
            Err(err) => panic!("unexpected error: {}", err),
            Ok(_) => panic!("expected error"),
        }
    }

    #[test]
    fn source_spikes_are_delivered_same_step() {
        let mut params = test_util::get_template_network_params();
        params.neuron_groups[0].neuron_params.threshold_v_mant = 10;
        let mut sut = Network::configure(params).unwrap();

        let result = sut.step(0);
        assert_eq!(result.indices_for(ObjectId::SpikeSource(0)), Some(&[0][..]));
        assert_eq!(result.indices_for(ObjectId::NeuronGroup(0)), Some(&[0][..]));
        assert_eq!(result.synaptic_transmission_count, 1);
        assert_eq!(sut.next_t(), 1);
    }

    #[test]
    fn neuron_spikes_travel_with_delay() {
        let mut params = test_util::get_template_network_params();
        params.neuron_groups[0].neuron_params.threshold_v_mant = 10;
        params.neuron_groups[1].neuron_params.threshold_v_mant = 5;
        let mut sut = Network::configure(params).unwrap();

        let results = sut.run(5);

        // spiked at 0, picked up at 1, delay of 2 steps
        for result in &results[..3] {
            assert_eq!(result.indices_for(ObjectId::NeuronGroup(1)), Some(&[][..]));
        }
        assert_eq!(results[3].indices_for(ObjectId::NeuronGroup(1)), Some(&[0][..]));
    }

    #[test]
    fn record_request() {
        let mut params = test_util::get_template_network_params();
        params.neuron_groups[0].neuron_params.threshold_v_mant = 1000;
        let mut sut = Network::configure(params).unwrap();
        sut.step(0);

        let voltages = sut
            .record_request(
                ObjectId::NeuronGroup(0),
                StateVariable::Voltage,
                &IndexSelector::All,
            )
            .unwrap();
        assert_eq!(voltages, vec![640, 0, 0]);

        let weights = sut
            .record_request(
                ObjectId::Synapses(0),
                StateVariable::ActualWeight,
                &IndexSelector::Indices(vec![2, 0]),
            )
            .unwrap();
        assert_eq!(weights, vec![30 << 6, 10 << 6]);

        assert!(sut
            .record_request(
                ObjectId::NeuronGroup(0),
                StateVariable::WeightMantissa,
                &IndexSelector::All
            )
            .is_err());
        assert!(sut
            .record_request(
                ObjectId::NeuronGroup(7),
                StateVariable::Voltage,
                &IndexSelector::All
            )
            .is_err());
        assert!(sut
            .record_request(
                ObjectId::SpikeSource(0),
                StateVariable::Voltage,
                &IndexSelector::All
            )
            .is_err());

        let err = sut
            .record_request(
                ObjectId::Synapses(1),
                StateVariable::Trace(TraceKind::X1),
                &IndexSelector::Indices(vec![2]),
            )
            .unwrap_err();
        assert_eq!(
            err.as_str(),
            "index 2 out of range for Synapses(1) with 2 elements"
        );
    }

    #[test]
    fn restore_is_all_or_nothing() {
        let mut sut = Network::configure(test_util::get_template_network_params()).unwrap();
        sut.run(3);
        let before = sut.snapshot();

        let mut snapshot = before.clone();
        snapshot.neuron_groups[0][0].voltage = 17;
        snapshot.synapse_groups[1][0].mantissa = -5;

        assert!(matches!(
            sut.restore(&snapshot),
            Err(EmulatorError::Configuration(_))
        ));
        assert_eq!(sut.snapshot(), before);

        snapshot.synapse_groups[1][0].mantissa = 5;
        snapshot.synapse_groups.pop();
        assert!(matches!(sut.restore(&snapshot), Err(EmulatorError::Shape(_))));
    }

    #[test]
    fn recurrent_group() {
        let params = NetworkParams {
            neuron_groups: vec![NeuronGroupParams::new(
                2,
                NeuronParams {
                    threshold_v_mant: 0,
                    ..NeuronParams::default()
                },
            )],
            synapse_groups: vec![SynapseGroupParams {
                source: SourceRef::NeuronGroup(0),
                target_group: 0,
                connections: vec![ConnectionParams {
                    pre: 0,
                    post: 1,
                    weight: 1,
                }],
                synapse_params: Default::default(),
            }],
            ..NetworkParams::default()
        };
        let mut sut = Network::configure(params).unwrap();

        let results = sut.run(3);
        assert_eq!(results[0].synaptic_transmission_count, 0);
        assert_eq!(results[1].synaptic_transmission_count, 1);
        assert_eq!(results[2].indices_for(ObjectId::NeuronGroup(0)), Some(&[0, 1][..]));
    }
}
