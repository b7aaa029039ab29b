use loihi_emu::params::{ConnectionParams, NetworkParams, SourceRef};
use rand::{
    distributions::Uniform, prelude::Distribution, rngs::StdRng, seq::SliceRandom, Rng,
};
use statrs::distribution::Poisson;

/// Connection density and initial weight range, one entry per synapse group below.
const PROJECTIONS: [(f64, i32, i32); 5] = [
    (0.0, 200, 200),
    (0.05, 0, 64),
    (0.25, 64, 64),
    (0.25, -128, -128),
    (0.25, -128, -128),
];

const STIMULUS_RATE: f64 = 5.0;

pub fn get_scenario_params() -> NetworkParams {
    let params_yaml_str = r#"
neuron_groups:
- num_neurons: 800
  neuron_params:
    refractory_period: 5
    threshold_v_mant: 300
    decay_v: 256
    decay_i: 1024
- num_neurons: 200
  neuron_params:
    refractory_period: 2
    threshold_v_mant: 200
    decay_v: 512
    decay_i: 1024
spike_sources:
- num_neurons: 800
  indices: []
  times: []
  period: 1000
synapse_groups:
- source: !SpikeSource 0
  target_group: 0
  connections: []
  synapse_params:
    w_exp: 2
- source: !NeuronGroup 0
  target_group: 0
  connections: []
  synapse_params:
    delay: 3
    learning_rule: 2*x1*y1 - x1*y2
    num_weight_bits: 6
    traces:
      x1:
        impulse: 40
        tau: 20
      y1:
        impulse: 40
        tau: 20
      y2:
        impulse: 20
        tau: 40
- source: !NeuronGroup 0
  target_group: 1
  connections: []
  synapse_params:
    delay: 1
- source: !NeuronGroup 1
  target_group: 0
  connections: []
  synapse_params:
    sign_mode: Inhibitory
- source: !NeuronGroup 1
  target_group: 1
  connections: []
  synapse_params:
    sign_mode: Inhibitory
technical_params:
  seed: 0
  rounding_mode: Stochastic
  num_threads: 1
"#;

    serde_yaml::from_str(params_yaml_str).unwrap()
}

/// Draws the random connectivity and a Poisson stimulus pattern into `params`.
pub fn populate(params: &mut NetworkParams, rng: &mut StdRng) {
    let group_sizes: Vec<usize> = params
        .neuron_groups
        .iter()
        .map(|group| group.num_neurons)
        .collect();

    let stimulus = &mut params.spike_sources[0];
    let all_indices: Vec<usize> = (0..stimulus.num_neurons).collect();
    let num_stimulus_spikes_dist = Poisson::new(STIMULUS_RATE).unwrap();

    for t in 0..stimulus.period {
        let num_stimulus_spikes = num_stimulus_spikes_dist.sample(rng) as usize;
        for &index in all_indices.choose_multiple(rng, num_stimulus_spikes) {
            stimulus.indices.push(index);
            stimulus.times.push(t);
        }
    }
    stimulus.sorted = false;

    for (group, &(density, weight_min, weight_max)) in
        params.synapse_groups.iter_mut().zip(PROJECTIONS.iter())
    {
        let weight_dist = Uniform::new_inclusive(weight_min, weight_max);
        let target_size = group_sizes[group.target_group];

        let source_size = match group.source {
            SourceRef::NeuronGroup(id) => group_sizes[id],
            SourceRef::SpikeSource(_) => all_indices.len(),
        };

        for pre in 0..source_size {
            if density == 0.0 {
                if pre < target_size {
                    group.connections.push(ConnectionParams {
                        pre,
                        post: pre,
                        weight: weight_dist.sample(rng),
                    });
                }
                continue;
            }

            for post in 0..target_size {
                if rng.gen_bool(density) {
                    group.connections.push(ConnectionParams {
                        pre,
                        post,
                        weight: weight_dist.sample(rng),
                    });
                }
            }
        }
    }
}
