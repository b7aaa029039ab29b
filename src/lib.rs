pub mod error;
pub mod fixed_point;
pub mod learning_rule;
pub mod network;
pub mod neuron;
pub mod params;
pub mod rounding;
pub mod spike_source;
pub mod state_snapshot;
pub mod synapse;
pub mod trace;
pub mod weight;

mod delay_queue;
mod types;
mod util;
