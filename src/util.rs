use std::hash::{Hash, Hasher};
use std::ops::Range;
use std::thread;

use rand::{rngs::StdRng, SeedableRng};
use rustc_hash::FxHasher;

pub fn get_partition_range(
    num_threads: usize,
    thread_id: usize,
    num_items: usize,
) -> Range<usize> {
    let min_partition_size = num_items / num_threads;
    let remainder = num_items % num_threads;

    if thread_id < remainder {
        let partition_size = min_partition_size + 1;
        let start = partition_size * thread_id;
        let end = start + partition_size;
        Range { start, end }
    } else {
        let start =
            (min_partition_size + 1) * remainder + min_partition_size * (thread_id - remainder);
        let end = start + min_partition_size;
        Range { start, end }
    }
}

/// Generator for one simulation object, independent of thread count and of other objects.
pub fn object_rng(seed: u64, kind: &str, index: usize) -> StdRng {
    let mut hasher = FxHasher::default();
    seed.hash(&mut hasher);
    kind.hash(&mut hasher);
    index.hash(&mut hasher);
    StdRng::seed_from_u64(hasher.finish())
}

/// Applies `f` to every item, spreading contiguous partitions over scoped worker threads.
pub fn for_each_partitioned<T, F>(items: &mut [T], num_threads: usize, f: F)
where
    T: Send,
    F: Fn(&mut T) + Sync,
{
    let num_threads = num_threads.min(items.len());

    if num_threads <= 1 {
        items.iter_mut().for_each(f);
        return;
    }

    let f = &f;
    let num_items = items.len();

    thread::scope(|scope| {
        let mut rest = items;

        for thread_id in 0..num_threads {
            let range = get_partition_range(num_threads, thread_id, num_items);
            let (partition, tail) = std::mem::take(&mut rest).split_at_mut(range.len());
            rest = tail;
            scope.spawn(move || partition.iter_mut().for_each(f));
        }
    });
}


#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn partition_range() {
        assert_eq!(get_partition_range(1, 0, 11), Range { start: 0, end: 11 });

        assert_eq!(get_partition_range(2, 0, 11), Range { start: 0, end: 6 });
        assert_eq!(get_partition_range(2, 1, 11), Range { start: 6, end: 11 });

        assert_eq!(get_partition_range(3, 0, 11), Range { start: 0, end: 4 });
        assert_eq!(get_partition_range(3, 1, 11), Range { start: 4, end: 8 });
        assert_eq!(get_partition_range(3, 2, 11), Range { start: 8, end: 11 });

        for i in 0..11 {
            assert_eq!(
                get_partition_range(11, i, 11),
                Range {
                    start: i,
                    end: i + 1
                }
            );
        }

        assert_eq!(get_partition_range(4, 0, 13), Range { start: 0, end: 4 });
        assert_eq!(get_partition_range(4, 1, 13), Range { start: 4, end: 7 });
        assert_eq!(get_partition_range(4, 2, 13), Range { start: 7, end: 10 });
        assert_eq!(get_partition_range(4, 3, 13), Range { start: 10, end: 13 });
    }

    #[test]
    fn object_rng_is_deterministic_and_distinct() {
        let a: u64 = object_rng(7, "neuron_group", 0).gen();
        let b: u64 = object_rng(7, "neuron_group", 0).gen();
        let c: u64 = object_rng(7, "neuron_group", 1).gen();
        let d: u64 = object_rng(7, "synapse_group", 0).gen();
        let e: u64 = object_rng(8, "neuron_group", 0).gen();

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
        assert_ne!(a, e);
    }

    #[test]
    fn partitioned_for_each_visits_every_item_once() {
        for num_threads in 1..=4 {
            let mut items: Vec<usize> = (0..10).collect();
            for_each_partitioned(&mut items, num_threads, |item| *item *= 2);
            itertools::assert_equal(items, (0..10).map(|i| i * 2));
        }

        let mut empty: Vec<usize> = Vec::new();
        for_each_partitioned(&mut empty, 3, |item| *item += 1);
        assert!(empty.is_empty());
    }
}
