use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use simple_error::SimpleError;

use crate::{
    error::{ConfigurationError, EmulatorError, ShapeError},
    fixed_point::{saturate, FixedPointUnit, CURRENT_MAX, CURRENT_MIN, VOLTAGE_MAX, VOLTAGE_MIN},
    params::{validate_neuron_params, NeuronParams, REFRACTORY_PERIOD_MAX},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeuronState {
    pub voltage: i32,
    pub current: i32,
    pub refractory_counter: u8,
}

impl NeuronState {
    fn update(
        &mut self,
        input: i64,
        params: &NeuronParams,
        fpu: &FixedPointUnit,
        rng: &mut StdRng,
    ) -> bool {
        if self.refractory_counter > 0 {
            self.refractory_counter -= 1;

            if self.refractory_counter > 0 {
                return false;
            }
        }

        let current = fpu.decay(self.current, params.decay_i, rng) as i64 + input;
        self.current = saturate(current, CURRENT_MIN, CURRENT_MAX);

        let voltage = fpu.decay(self.voltage, params.decay_v, rng) as i64 + self.current as i64;
        self.voltage = saturate(voltage, VOLTAGE_MIN, VOLTAGE_MAX);

        if self.voltage >= params.threshold() {
            self.voltage = 0;
            self.refractory_counter = params.refractory_period;
            true
        } else {
            false
        }
    }
}

/// A population of compartments sharing one parameter set.
#[derive(Debug, Clone)]
pub struct NeuronGroup {
    params: NeuronParams,
    states: Vec<NeuronState>,
    input: Vec<i64>,
    rng: StdRng,
    last_spikes: Vec<usize>,
}

impl NeuronGroup {
    pub fn new(
        num_neurons: usize,
        params: NeuronParams,
        rng: StdRng,
    ) -> Result<Self, ConfigurationError> {
        validate_neuron_params(&params)?;

        Ok(Self {
            params,
            states: vec![NeuronState::default(); num_neurons],
            input: vec![0; num_neurons],
            rng,
            last_spikes: Vec::new(),
        })
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn params(&self) -> &NeuronParams {
        &self.params
    }

    pub fn states(&self) -> &[NeuronState] {
        &self.states
    }

    /// Indices that spiked during the most recent update.
    pub fn last_spikes(&self) -> &[usize] {
        &self.last_spikes
    }

    /// Synaptic input accumulators, consumed by the next update.
    pub fn input_mut(&mut self) -> &mut [i64] {
        &mut self.input
    }

    pub fn add_input(&mut self, neuron: usize, amount: i64) {
        self.input[neuron] += amount;
    }

    pub fn update(&mut self, fpu: &FixedPointUnit) {
        self.last_spikes.clear();

        let inputs = self.input.iter_mut();

        for (index, (state, input)) in self.states.iter_mut().zip(inputs).enumerate() {
            let input = std::mem::take(input);

            if state.update(input, &self.params, fpu, &mut self.rng) {
                self.last_spikes.push(index);
            }
        }
    }

    pub fn restore_states(&mut self, states: &[NeuronState]) -> Result<(), EmulatorError> {
        ShapeError::check("neuron states", self.states.len(), states.len())?;

        let mut errors = Vec::new();

        for (index, state) in states.iter().enumerate() {
            if !(VOLTAGE_MIN..=VOLTAGE_MAX).contains(&state.voltage) {
                errors.push(SimpleError::new(format!(
                    "neuron_states[{}].voltage has to be between {} and {}, got {}",
                    index, VOLTAGE_MIN, VOLTAGE_MAX, state.voltage
                )));
            }

            if !(CURRENT_MIN..=CURRENT_MAX).contains(&state.current) {
                errors.push(SimpleError::new(format!(
                    "neuron_states[{}].current has to be between {} and {}, got {}",
                    index, CURRENT_MIN, CURRENT_MAX, state.current
                )));
            }

            if state.refractory_counter > REFRACTORY_PERIOD_MAX {
                errors.push(SimpleError::new(format!(
                    "neuron_states[{}].refractory_counter has to be between 0 and {}, got {}",
                    index, REFRACTORY_PERIOD_MAX, state.refractory_counter
                )));
            }
        }

        ConfigurationError::check(errors)?;

        self.states.copy_from_slice(states);
        self.input.iter_mut().for_each(|input| *input = 0);
        self.last_spikes.clear();
        Ok(())
    }
}
