use serde::{Deserialize, Serialize};

use crate::{
    error::{EmulatorError, ShapeError},
    params::{validate_spike_source_params, SpikeSourceParams},
};

/// Ordered by time, then index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SpikeEvent {
    pub time: usize,
    pub index: usize,
}

/// Replays a fixed spike pattern, once or periodically.
#[derive(Debug, Clone)]
pub struct SpikeEventSource {
    num_neurons: usize,
    period: usize,
    events: Vec<SpikeEvent>,
    last_spikes: Vec<usize>,
}

impl SpikeEventSource {
    pub fn new(params: &SpikeSourceParams) -> Result<Self, EmulatorError> {
        ShapeError::check(
            "spike source indices and times",
            params.indices.len(),
            params.times.len(),
        )?;
        validate_spike_source_params(params)?;

        let mut events: Vec<SpikeEvent> = params
            .times
            .iter()
            .zip(params.indices.iter())
            .map(|(&time, &index)| SpikeEvent { time, index })
            .collect();

        if !params.sorted {
            events.sort_unstable();
        }

        Ok(Self {
            num_neurons: params.num_neurons,
            period: params.period,
            events,
            last_spikes: Vec::new(),
        })
    }

    pub fn len(&self) -> usize {
        self.num_neurons
    }

    pub fn is_empty(&self) -> bool {
        self.num_neurons == 0
    }

    pub fn period(&self) -> usize {
        self.period
    }

    pub fn events(&self) -> &[SpikeEvent] {
        &self.events
    }

    /// Indices due at `t`, in event order.
    pub fn due_at(&self, t: usize) -> impl Iterator<Item = usize> + '_ {
        let local_t = if self.period > 0 { t % self.period } else { t };
        let start = self.events.partition_point(|event| event.time < local_t);

        self.events[start..]
            .iter()
            .take_while(move |event| event.time == local_t)
            .map(|event| event.index)
    }

    pub fn emit(&mut self, t: usize) -> &[usize] {
        let mut spikes = std::mem::take(&mut self.last_spikes);
        spikes.clear();
        spikes.extend(self.due_at(t));
        self.last_spikes = spikes;
        &self.last_spikes
    }

    pub fn last_spikes(&self) -> &[usize] {
        &self.last_spikes
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use itertools::assert_equal;

    fn source(indices: Vec<usize>, times: Vec<usize>, period: usize) -> SpikeEventSource {
        let mut params = SpikeSourceParams::new(8, indices, times);
        params.period = period;
        SpikeEventSource::new(&params).unwrap()
    }

    #[test]
    fn length_mismatch() {
        let params = SpikeSourceParams::new(8, vec![0, 1], vec![3]);
        let err = SpikeEventSource::new(&params).unwrap_err();

        match err {
            EmulatorError::Shape(err) => {
                assert_eq!(err.left_len, 2);
                assert_eq!(err.right_len, 1);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn invalid_index() {
        let params = SpikeSourceParams::new(2, vec![0, 2], vec![3, 4]);
        assert!(matches!(
            SpikeEventSource::new(&params),
            Err(EmulatorError::Configuration(_))
        ));
    }

    #[test]
    fn events_are_sorted_by_time_then_index() {
        let sut = source(vec![5, 1, 3, 0], vec![9, 2, 2, 0], 0);

        assert_equal(
            sut.events().iter().map(|event| (event.time, event.index)),
            [(0, 0), (2, 1), (2, 3), (9, 5)],
        );
    }

    #[test]
    fn presorted_input_is_trusted() {
        let mut params = SpikeSourceParams::new(8, vec![3, 1], vec![2, 2]);
        params.sorted = true;
        let sut = SpikeEventSource::new(&params).unwrap();

        assert_equal(sut.due_at(2), [3, 1]);
    }

    #[test]
    fn fire_once() {
        let mut sut = source(vec![4, 2, 6], vec![3, 3, 7], 0);

        assert!(sut.emit(0).is_empty());
        assert_eq!(sut.emit(3), &[2, 4]);
        assert_eq!(sut.last_spikes(), &[2, 4]);
        assert!(sut.emit(4).is_empty());
        assert_eq!(sut.emit(7), &[6]);
        assert!(sut.emit(10).is_empty());
        assert!(sut.emit(13).is_empty());
    }

    #[test]
    fn periodic() {
        let mut sut = source(vec![4, 2], vec![0, 3], 5);

        let spike_times: Vec<(usize, usize)> = (0..16)
            .flat_map(|t| sut.emit(t).to_vec().into_iter().map(move |index| (t, index)))
            .collect();

        assert_eq!(
            spike_times,
            vec![(0, 4), (3, 2), (5, 4), (8, 2), (10, 4), (13, 2), (15, 4)]
        );
    }
}
