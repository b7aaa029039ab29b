use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use simple_error::SimpleError;

use crate::{
    delay_queue::DelayQueue,
    error::{ConfigurationError, EmulatorError, ShapeError},
    fixed_point::FixedPointUnit,
    learning_rule::LearningRule,
    params::{
        validate_synapse_params, validate_weights, SourceRef, SynapseGroupParams, SynapseParams,
    },
    trace::{TraceKind, TraceState, TRACE_MAX},
    types::HashMap,
    weight::{WeightQuantizer, WeightRegister},
};

/// Persisted state of one synapse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynapseState {
    pub pre: usize,
    pub post: usize,
    pub mantissa: i32,
    pub actual: i32,
    pub traces: TraceState,
}

/// A group of synapses sharing delay, quantization, traces and learning rule, connecting one
/// source to one neuron group.
#[derive(Debug, Clone)]
pub struct Synapses {
    source: SourceRef,
    target_group: usize,
    params: SynapseParams,
    pre: Vec<usize>,
    post: Vec<usize>,
    quantizer: WeightQuantizer,
    weights: Vec<WeightRegister>,
    traces: Vec<TraceState>,
    rule: Option<LearningRule>,
    pre_to_synapses: HashMap<usize, Vec<usize>>,
    post_to_synapses: HashMap<usize, Vec<usize>>,
    delay_queue: DelayQueue<usize>,
    pre_arrived: Vec<bool>,
    post_spiked: Vec<bool>,
    touched: Vec<usize>,
    pending_deltas: Vec<(usize, i64)>,
    rng: StdRng,
}

impl Synapses {
    pub fn new(params: &SynapseGroupParams, rng: StdRng) -> Result<Self, EmulatorError> {
        let synapse_params = &params.synapse_params;
        validate_synapse_params(synapse_params)?;
        validate_weights(
            "connections",
            synapse_params.sign_mode,
            params.connections.iter().map(|connection| &connection.weight),
        )?;

        let rule = if synapse_params.learning_rule.trim().is_empty() {
            None
        } else {
            Some(LearningRule::parse(&synapse_params.learning_rule)?)
        };

        let quantizer = WeightQuantizer::new(
            synapse_params.sign_mode,
            synapse_params.num_weight_bits,
            synapse_params.w_exp,
        );

        let pre: Vec<usize> = params.connections.iter().map(|c| c.pre).collect();
        let post: Vec<usize> = params.connections.iter().map(|c| c.post).collect();
        let weights = params
            .connections
            .iter()
            .map(|c| quantizer.quantize(c.weight as i64))
            .collect();

        let num_synapses = pre.len();

        Ok(Self {
            source: params.source,
            target_group: params.target_group,
            params: synapse_params.clone(),
            pre_to_synapses: index_by_neuron(&pre),
            post_to_synapses: index_by_neuron(&post),
            pre,
            post,
            quantizer,
            weights,
            traces: vec![TraceState::default(); num_synapses],
            rule,
            delay_queue: DelayQueue::new(synapse_params.delay as usize),
            pre_arrived: vec![false; num_synapses],
            post_spiked: vec![false; num_synapses],
            touched: Vec::new(),
            pending_deltas: Vec::new(),
            rng,
        })
    }

    pub fn len(&self) -> usize {
        self.pre.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pre.is_empty()
    }

    pub fn source(&self) -> SourceRef {
        self.source
    }

    pub fn target_group(&self) -> usize {
        self.target_group
    }

    pub fn params(&self) -> &SynapseParams {
        &self.params
    }

    pub fn pre(&self) -> &[usize] {
        &self.pre
    }

    pub fn post(&self) -> &[usize] {
        &self.post
    }

    pub fn weights(&self) -> &[WeightRegister] {
        &self.weights
    }

    pub fn traces(&self) -> &[TraceState] {
        &self.traces
    }

    pub fn quantizer(&self) -> &WeightQuantizer {
        &self.quantizer
    }

    pub fn learning_rule(&self) -> Option<&LearningRule> {
        self.rule.as_ref()
    }

    /// Spikes queued behind the conduction delay.
    pub fn num_in_flight(&self) -> usize {
        self.delay_queue.num_pending()
    }

    /// Queues `pre_spikes` behind the conduction delay, then adds the actual weight of every
    /// synapse whose spike arrives now to its target's input. Targets outside `target_input`
    /// are skipped. Returns the number of transmissions.
    pub fn transmit(&mut self, pre_spikes: &[usize], target_input: &mut [i64]) -> usize {
        let delay = self.params.delay as usize;

        for &pre in pre_spikes {
            self.delay_queue.schedule(delay, pre);
        }

        let mut count = 0;

        for pre in self.delay_queue.drain_and_advance() {
            if let Some(synapses) = self.pre_to_synapses.get(&pre) {
                for &syn_idx in synapses {
                    let input = match target_input.get_mut(self.post[syn_idx]) {
                        Some(input) => input,
                        None => continue,
                    };
                    *input += self.weights[syn_idx].actual() as i64;

                    if !self.pre_arrived[syn_idx] && !self.post_spiked[syn_idx] {
                        self.touched.push(syn_idx);
                    }
                    self.pre_arrived[syn_idx] = true;
                    count += 1;
                }
            }
        }

        count
    }

    /// Decays every trace, then adds impulses for this step's pre-spike arrivals and for the
    /// target neurons in `post_spikes`.
    pub fn update_traces(&mut self, post_spikes: &[usize], fpu: &FixedPointUnit) {
        let trace_params = &self.params.traces;

        for trace in self.traces.iter_mut() {
            trace.decay(trace_params, fpu, &mut self.rng);
        }

        for &post in post_spikes {
            if let Some(synapses) = self.post_to_synapses.get(&post) {
                for &syn_idx in synapses {
                    if !self.pre_arrived[syn_idx] && !self.post_spiked[syn_idx] {
                        self.touched.push(syn_idx);
                    }
                    self.post_spiked[syn_idx] = true;
                }
            }
        }

        for &syn_idx in &self.touched {
            if self.pre_arrived[syn_idx] {
                self.traces[syn_idx].on_pre_syn_spike(trace_params);
            }

            if self.post_spiked[syn_idx] {
                self.traces[syn_idx].on_post_syn_spike(trace_params);
            }
        }
    }

    pub fn evaluate_learning_rule(&mut self) {
        let rule = match &self.rule {
            Some(rule) => rule,
            None => return,
        };

        for &syn_idx in &self.touched {
            if rule.is_triggered(self.pre_arrived[syn_idx], self.post_spiked[syn_idx]) {
                let delta = rule.evaluate(&self.traces[syn_idx]);
                self.pending_deltas.push((syn_idx, delta));
            }
        }
    }

    /// Rounds pending deltas onto the weight precision grid and commits them. Returns the
    /// number of changed weights.
    pub fn commit_weights(&mut self, fpu: &FixedPointUnit) -> usize {
        let precision = self.quantizer.precision() as i64;
        let mut num_changed = 0;

        for (syn_idx, delta) in self.pending_deltas.drain(..) {
            let delta = fpu.round_to_multiple(delta, precision, &mut self.rng);
            let register = self
                .quantizer
                .quantize((self.weights[syn_idx].mantissa() as i64).saturating_add(delta));

            if register != self.weights[syn_idx] {
                num_changed += 1;
            }
            self.weights[syn_idx] = register;
        }

        for syn_idx in self.touched.drain(..) {
            self.pre_arrived[syn_idx] = false;
            self.post_spiked[syn_idx] = false;
        }

        num_changed
    }

    /// Replaces all weight mantissas, subject to the same checks as construction.
    pub fn set_weights(&mut self, mantissas: &[i32]) -> Result<(), EmulatorError> {
        ShapeError::check("synapse weights", self.weights.len(), mantissas.len())?;
        validate_weights("synapses", self.quantizer.sign_mode(), mantissas)?;

        for (register, &mantissa) in self.weights.iter_mut().zip(mantissas) {
            *register = self.quantizer.quantize(mantissa as i64);
        }

        Ok(())
    }

    pub fn states(&self) -> Vec<SynapseState> {
        (0..self.len())
            .map(|syn_idx| SynapseState {
                pre: self.pre[syn_idx],
                post: self.post[syn_idx],
                mantissa: self.weights[syn_idx].mantissa(),
                actual: self.weights[syn_idx].actual(),
                traces: self.traces[syn_idx],
            })
            .collect()
    }

    /// Restores weights and traces. Spikes still in flight are kept.
    pub fn restore_states(&mut self, states: &[SynapseState]) -> Result<(), EmulatorError> {
        ShapeError::check("synapse states", self.len(), states.len())?;

        let range = self.quantizer.sign_mode().mantissa_range();
        let mut errors = Vec::new();

        for (syn_idx, state) in states.iter().enumerate() {
            if state.pre != self.pre[syn_idx] || state.post != self.post[syn_idx] {
                errors.push(SimpleError::new(format!(
                    "synapse_states[{}] connects {} -> {}, expected {} -> {}",
                    syn_idx, state.pre, state.post, self.pre[syn_idx], self.post[syn_idx]
                )));
            }

            if !range.contains(&state.mantissa) {
                errors.push(SimpleError::new(format!(
                    "synapse_states[{}].mantissa has to be between {} and {}, got {}",
                    syn_idx,
                    range.start(),
                    range.end(),
                    state.mantissa
                )));
            } else if self.quantizer.quantize(state.mantissa as i64)
                != WeightRegister::new(state.mantissa, state.actual)
            {
                errors.push(SimpleError::new(format!(
                    "synapse_states[{}] holds an unrepresentable weight ({}, {})",
                    syn_idx, state.mantissa, state.actual
                )));
            }

            for kind in TraceKind::ALL {
                let value = state.traces.get(kind);
                if !(0..=TRACE_MAX).contains(&value) {
                    errors.push(SimpleError::new(format!(
                        "synapse_states[{}].traces.{} has to be between 0 and {}, got {}",
                        syn_idx, kind, TRACE_MAX, value
                    )));
                }
            }
        }

        ConfigurationError::check(errors)?;

        for (syn_idx, state) in states.iter().enumerate() {
            self.weights[syn_idx] = WeightRegister::new(state.mantissa, state.actual);
            self.traces[syn_idx] = state.traces;
        }

        Ok(())
    }
}

fn index_by_neuron(neurons: &[usize]) -> HashMap<usize, Vec<usize>> {
    let mut result: HashMap<usize, Vec<usize>> = HashMap::default();

    for (syn_idx, &neuron) in neurons.iter().enumerate() {
        result.entry(neuron).or_default().push(syn_idx);
    }

    result
}
