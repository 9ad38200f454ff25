//! Local Permutation Engine.
//!
//! Reorders one shard in memory. Valid whenever every qubit on a global
//! position keeps that position, which always holds with one partition.
//!
//! The new content of slot `j` is the old content of slot
//! `old.program_to_data(new.data_to_program(j))`. That composition is a
//! bijection on the shard's offsets, so every slot is read once and written
//! once. The loop is written as a gather over destinations: each rayon task
//! owns its output slot outright, and the full copy of the shard means no
//! task ever reads a slot another task writes.

use rayon::prelude::*;

use crate::amplitude::Amplitude;
use crate::config::PermuteConfig;
use crate::permutation::Permutation;

/// Source offset feeding destination `offset` when moving from `old` to `new`.
#[inline]
pub(crate) fn source_of(offset: usize, old: &Permutation, new: &Permutation) -> usize {
    old.program_to_data(new.data_to_program(offset))
}

/// Reorder `shard` from the `old` layout to the `new` layout.
///
/// `shard` is indexed by local offset. Callers guarantee that positions
/// `[log2(shard.len()), n)` hold the same qubits in both permutations.
pub fn remap<A: Amplitude>(shard: &mut [A], old: &Permutation, new: &Permutation, config: &PermuteConfig) {
    debug_assert!(shard.len().is_power_of_two());
    debug_assert_eq!(old.num_qubits(), new.num_qubits());

    if config.parallel(shard.len()) {
        let source: Vec<A> = shard.par_iter().copied().collect();

        shard.par_iter_mut().enumerate().for_each(|(offset, slot)| {
            *slot = source[source_of(offset, old, new)];
        });
    } else {
        let source: Vec<A> = shard.to_vec();

        for (offset, slot) in shard.iter_mut().enumerate() {
            *slot = source[source_of(offset, old, new)];
        }
    }

    #[cfg(feature = "tracing")]
    tracing::trace!(len = shard.len(), from = %old, to = %new, "local remap done");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permutation::MapStyle;

    fn sequential() -> PermuteConfig {
        PermuteConfig::default().with_parallel_threshold(usize::MAX)
    }

    fn parallel() -> PermuteConfig {
        PermuteConfig::default().with_parallel_threshold(0)
    }

    #[test]
    fn test_two_qubit_swap_moves_middle_amplitudes() {
        // index bit0 = qubit 0, bit1 = qubit 1
        let mut shard = ["a00", "a01", "a10", "a11"];
        let old = Permutation::identity(2);
        let new = Permutation::from_map(&[1, 0], MapStyle::Direct).unwrap();

        remap(&mut shard, &old, &new, &sequential());

        assert_eq!(shard, ["a00", "a10", "a01", "a11"]);
    }

    #[test]
    fn test_scatter_definition_matches() {
        // shard[new(old^-1(i))] = copy[i] for every source i
        let old = Permutation::from_map(&[2, 0, 3, 1], MapStyle::Direct).unwrap();
        let new = Permutation::from_map(&[1, 3, 0, 2], MapStyle::Direct).unwrap();
        let original: Vec<u32> = (0..16).collect();

        let mut expected = vec![0u32; 16];
        for (i, &value) in original.iter().enumerate() {
            expected[new.program_to_data(old.data_to_program(i))] = value;
        }

        let mut shard = original.clone();
        remap(&mut shard, &old, &new, &sequential());
        assert_eq!(shard, expected);

        let mut shard = original;
        remap(&mut shard, &old, &new, &parallel());
        assert_eq!(shard, expected);
    }

    #[test]
    fn test_same_layout_is_identity() {
        let p = Permutation::from_map(&[2, 0, 1], MapStyle::Direct).unwrap();
        let mut shard: Vec<u8> = (0..8).collect();

        remap(&mut shard, &p, &p, &parallel());
        assert_eq!(shard, (0..8).collect::<Vec<u8>>());
    }

    #[test]
    fn test_local_offsets_with_fixed_global_qubit() {
        // n = 3, shard covers positions {0, 1}; qubit 2 stays on position 2
        let old = Permutation::identity(3);
        let new = Permutation::from_map(&[1, 0, 2], MapStyle::Direct).unwrap();
        let mut shard = [0u8, 1, 2, 3];

        remap(&mut shard, &old, &new, &sequential());
        assert_eq!(shard, [0, 2, 1, 3]);
    }
}
