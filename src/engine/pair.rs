//! Swap-exchange collaborator for one local/global qubit pair.
//!
//! Swapping a qubit on local position `l` with a qubit on global position
//! `g` only involves pairs of partitions that differ in bit `g - M` of their
//! rank. Each rank keeps the half of its shard whose bit `l` already equals
//! its own rank bit, and trades the other half with its partner. That is
//! half a shard per rank, against a full shard for a general redistribution.

use crate::amplitude::Amplitude;
use crate::error::{PermuteError, Result};
use crate::split::Topology;
use crate::transport::{Segments, Transport};

/// The qubit pair being swapped, as seen under the current permutation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PairSwap {
    /// Logical qubit currently on a local position.
    pub local_qubit: usize,

    /// Logical qubit currently on a global position.
    pub global_qubit: usize,

    /// Current position of `local_qubit` (`< M`).
    pub local_position: usize,

    /// Current position of `global_qubit` (`>= M`).
    pub global_position: usize,
}

/// Moves amplitudes so the shard matches a local/global pair swap.
///
/// Implementations move data only. The caller updates the permutation
/// afterwards. Every rank must call with the same pair.
pub trait SwapExchange<A: Amplitude, T: Transport> {
    /// Exchange amplitudes for `pair` across partitions.
    ///
    /// # Errors
    ///
    /// Any transport failure. Implementations should leave the shard
    /// untouched when they fail.
    fn swap_exchange(&mut self, shard: &mut [A], transport: &T, topology: &Topology, pair: PairSwap) -> Result<()>;
}

/// Built-in [`SwapExchange`] trading half a shard with one partner rank.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PairwiseExchange;

impl<A: Amplitude, T: Transport> SwapExchange<A, T> for PairwiseExchange {
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(level = "debug", skip(self, shard, transport, topology), fields(rank = topology.rank()))
    )]
    fn swap_exchange(&mut self, shard: &mut [A], transport: &T, topology: &Topology, pair: PairSwap) -> Result<()> {
        let m: usize = topology.local_qubits();

        if pair.local_position >= m || pair.global_position < m || pair.global_position >= topology.num_qubits() {
            return Err(PermuteError::InvalidPairKind {
                first: pair.local_qubit,
                second: pair.global_qubit,
            });
        }

        let rank_bit: usize = pair.global_position - m;
        let my_bit: usize = (topology.rank() >> rank_bit) & 1;
        let partner: usize = topology.rank() ^ (1 << rank_bit);

        // Offsets whose local bit disagrees with our rank bit belong to the
        // partner after the swap; the partner's matching half lands on the
        // same offsets. Both sides list them in ascending order, so the k-th
        // element sent fills the k-th offset received.
        let outgoing: Vec<usize> = (0..shard.len())
            .filter(|&offset| (offset >> pair.local_position) & 1 != my_bit)
            .collect();

        let send: Vec<A> = outgoing.iter().map(|&offset| shard[offset]).collect();
        let segments = Segments::single(topology.partitions(), partner, outgoing.len());
        let mut recv: Vec<A> = vec![A::default(); outgoing.len()];

        transport.all_to_allv(&send, &segments, &mut recv, &segments)?;

        for (&offset, amplitude) in outgoing.iter().zip(recv) {
            shard[offset] = amplitude;
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(partner, moved = outgoing.len(), "pair exchange complete");

        Ok(())
    }
}
