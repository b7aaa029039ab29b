use serde::{Deserialize, Serialize};

use crate::{neuron::NeuronState, synapse::SynapseState};

/// Persistent state of a network, one inner vector per neuron group and per synapse group.
/// Spikes in flight and generator state are not captured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub neuron_groups: Vec<Vec<NeuronState>>,
    pub synapse_groups: Vec<Vec<SynapseState>>,
}
