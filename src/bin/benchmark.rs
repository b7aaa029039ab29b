use std::time::Instant;

use loihi_emu::network::Network;
use rand::{rngs::StdRng, SeedableRng};

#[path = "../scenario_params.rs"]
mod scenario_params;

fn main() {
    let mut params = scenario_params::get_scenario_params();
    params.technical_params.num_threads = num_cpus::get().min(4);

    let mut rng = StdRng::seed_from_u64(0);
    scenario_params::populate(&mut params, &mut rng);

    let num_synapses: usize = params
        .synapse_groups
        .iter()
        .map(|group| group.connections.len())
        .sum();

    let mut network = Network::configure(params).unwrap();

    let mut spike_count = 0usize;
    let mut synaptic_transmission_count = 0usize;
    let mut weight_update_count = 0usize;
    let mut checksum = 0;
    let t_stop = 20000;

    let wall_start = Instant::now();

    for t in 0..t_stop {
        let step_result = network.step(t);

        spike_count += step_result.num_spikes();
        synaptic_transmission_count += step_result.synaptic_transmission_count;
        weight_update_count += step_result.weight_update_count;

        for group in &step_result.spikes {
            checksum += group.indices.iter().sum::<usize>();
        }
    }

    let wall_time = wall_start.elapsed();
    let synaptic_transm_proc_throughput =
        synaptic_transmission_count as f64 / wall_time.as_secs_f64();

    eprintln!("Synapses: {}", num_synapses);
    eprintln!("Spikes per step: {}", spike_count as f64 / t_stop as f64);
    eprintln!(
        "Weight updates per step: {}",
        weight_update_count as f64 / t_stop as f64
    );
    eprintln!(
        "Synaptic transmission processing throughput: {:.3e} ({:.3} ns per transmission)",
        synaptic_transm_proc_throughput,
        1e9 / synaptic_transm_proc_throughput
    );
    eprintln!("Checksum: {}", checksum);
}
