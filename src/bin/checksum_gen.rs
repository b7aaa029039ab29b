use loihi_emu::network::{Network, ObjectId};
use rand::{rngs::StdRng, SeedableRng};

#[path = "../scenario_params.rs"]
mod scenario_params;

fn main() {
    let mut params = scenario_params::get_scenario_params();
    let mut rng = StdRng::seed_from_u64(0);
    scenario_params::populate(&mut params, &mut rng);

    let mut network = Network::configure(params).unwrap();

    let mut synaptic_transmission_count = 0usize;
    let mut weight_update_count = 0usize;
    let mut excitatory_checksum = 0;
    let mut inhibitory_checksum = 0;
    let t_stop = 1000;

    for step_result in network.run(t_stop) {
        synaptic_transmission_count += step_result.synaptic_transmission_count;
        weight_update_count += step_result.weight_update_count;

        if let Some(indices) = step_result.indices_for(ObjectId::NeuronGroup(0)) {
            for index in indices {
                excitatory_checksum += step_result.t * index;
            }
        }

        if let Some(indices) = step_result.indices_for(ObjectId::NeuronGroup(1)) {
            for index in indices {
                inhibitory_checksum += step_result.t * index;
            }
        }
    }

    println!("batch result:");
    println!("...excitatory checksum: {}", excitatory_checksum);
    println!("...inhibitory checksum: {}", inhibitory_checksum);
    println!(
        "...synaptic transmission count: {}",
        synaptic_transmission_count
    );
    println!("...weight update count: {}", weight_update_count);

    let state_snapshot = network.snapshot();

    let voltage_checksum: i64 = state_snapshot
        .neuron_groups
        .iter()
        .flatten()
        .map(|neuron_state| neuron_state.voltage as i64)
        .sum();

    let mut syn_state_checksum = 0i64;

    for syn_state in state_snapshot.synapse_groups.iter().flatten() {
        syn_state_checksum +=
            syn_state.pre as i64 * syn_state.post as i64 * syn_state.mantissa as i64;
    }

    println!("snapshot:");
    println!("...voltages checksum: {}", voltage_checksum);
    println!("...synapse states checksum: {}", syn_state_checksum);
}
