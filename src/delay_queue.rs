/// Ring of per-step batches. An item scheduled at offset `d` is drained `d` steps after the
/// current one; offset zero is drained by the current step.
#[derive(Debug, Clone)]
pub struct DelayQueue<T> {
    batches: Vec<Vec<T>>,
    current_pos: usize,
}

impl<T: Clone> DelayQueue<T> {
    pub fn new(max_delay: usize) -> DelayQueue<T> {
        DelayQueue {
            batches: vec![Vec::new(); max_delay + 1],
            current_pos: 0,
        }
    }

    pub fn schedule(&mut self, offset: usize, item: T) {
        debug_assert!(offset < self.batches.len());

        let target_pos = (self.current_pos + offset) % self.batches.len();
        self.batches[target_pos].push(item);
    }

    pub fn num_pending(&self) -> usize {
        self.batches.iter().map(Vec::len).sum()
    }

    pub fn drain_and_advance(&mut self) -> impl Iterator<Item = T> + '_ {
        let pos = self.current_pos;
        self.current_pos += 1;
        if self.current_pos == self.batches.len() {
            self.current_pos = 0;
        }
        self.batches[pos].drain(..)
    }
}

#[cfg(test)]
mod tests {

    use super::DelayQueue;
    use itertools::assert_equal;
    use rand::{distributions::Uniform, prelude::Distribution, rngs::StdRng, SeedableRng};

    const NONE: [usize; 0] = [];

    #[test]
    fn nothing_scheduled() {
        let mut sut: DelayQueue<usize> = DelayQueue::new(3);
        assert_equal(sut.drain_and_advance(), NONE);
        assert_eq!(sut.num_pending(), 0);
    }

    #[test]
    fn zero_delay_arrives_same_step() {
        let mut sut: DelayQueue<usize> = DelayQueue::new(0);

        sut.schedule(0, 4);
        sut.schedule(0, 2);
        assert_equal(sut.drain_and_advance(), [4, 2]);
        assert_equal(sut.drain_and_advance(), NONE);
    }

    #[test]
    fn spike_arrives_after_delay() {
        let mut sut: DelayQueue<usize> = DelayQueue::new(2);

        sut.schedule(2, 7);
        assert_eq!(sut.num_pending(), 1);
        assert_equal(sut.drain_and_advance(), NONE);
        assert_equal(sut.drain_and_advance(), NONE);
        assert_equal(sut.drain_and_advance(), [7]);
        assert_equal(sut.drain_and_advance(), NONE);
        assert_eq!(sut.num_pending(), 0);
    }

    #[test]
    fn constant_delay_preserves_spike_train() {
        let delay = 5;
        let num_steps = 200;
        let mut rng = StdRng::seed_from_u64(0);
        let dist = Uniform::new(0, 4);
        let mut sut: DelayQueue<usize> = DelayQueue::new(delay);
        let mut sent: Vec<Vec<usize>> = Vec::new();
        let mut received: Vec<Vec<usize>> = Vec::new();

        for _ in 0..num_steps {
            let batch: Vec<usize> = (0..dist.sample(&mut rng))
                .map(|_| dist.sample(&mut rng))
                .collect();
            for item in batch.iter() {
                sut.schedule(delay, *item);
            }
            sent.push(batch);
            received.push(sut.drain_and_advance().collect());
        }

        for t in delay..num_steps {
            assert_eq!(received[t], sent[t - delay]);
        }

        for batch in received.iter().take(delay) {
            assert!(batch.is_empty());
        }
    }
}
