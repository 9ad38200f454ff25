//! Distributed Full-Permutation Engine.
//!
//! Used when a new layout moves qubits onto or off global positions, so
//! amplitudes change owners. Two algorithms produce identical shards:
//!
//! | Algorithm | Memory per rank | Traffic per rank |
//! |---|---|---|
//! | [`all_gather`] | global size | global size |
//! | [`personalized_exchange`] | shard size | shard size |
//!
//! [`all_gather`] is the simple reference. [`personalized_exchange`] is the
//! production path: every element is sent once, straight to its new owner,
//! tagged with its destination offset.
//!
//! Neither function writes to the shard until all of its collectives have
//! returned successfully.

use rayon::prelude::*;

use crate::amplitude::Amplitude;
use crate::config::PermuteConfig;
use crate::engine::local::source_of;
use crate::error::{PermuteError, Result};
use crate::permutation::Permutation;
use crate::split::Topology;
use crate::transport::{Segments, Transport};

/// Amplitude tagged with the shard offset it lands on.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub(crate) struct Tagged<A> {
    pub(crate) offset: usize,
    pub(crate) amplitude: A,
}

// ============================================================================
//  All-gather baseline
// ============================================================================

/// Redistribute by gathering the whole vector on every rank.
///
/// Each rank then fills its own shard from the gathered copy. Only suitable
/// for small vectors or as a correctness oracle.
///
/// # Errors
///
/// [`PermuteError::Transport`] if the gather fails. The shard is untouched.
#[cfg_attr(
    feature = "tracing",
    tracing::instrument(level = "debug", skip_all, fields(rank = topology.rank(), from = %old, to = %new))
)]
pub fn all_gather<A, T>(
    shard: &mut [A],
    old: &Permutation,
    new: &Permutation,
    topology: &Topology,
    transport: &T,
    config: &PermuteConfig,
) -> Result<()>
where
    A: Amplitude,
    T: Transport,
{
    debug_assert_eq!(shard.len(), topology.shard_size());

    let mut global: Vec<A> = vec![A::default(); topology.global_size()];
    transport.all_gather(shard, &mut global)?;

    // Destination global index -> source global index, restricted to our slots.
    let fill = |(offset, slot): (usize, &mut A)| {
        *slot = global[source_of(topology.global_index(offset), old, new)];
    };

    if config.parallel(shard.len()) {
        shard.par_iter_mut().enumerate().for_each(fill);
    } else {
        shard.iter_mut().enumerate().for_each(fill);
    }

    Ok(())
}

// ============================================================================
//  Personalized exchange
// ============================================================================

/// Redistribute with one variable-length all-to-all.
///
/// 1. For every local element compute `(destination rank, destination offset)`.
/// 2. Count elements per destination and derive displacements.
/// 3. Pack [`Tagged`] records into one send buffer, bucketed by destination.
/// 4. Exchange counts, then payload.
/// 5. Write every received record to the offset it carries.
///
/// The order of records inside a bucket is irrelevant: each one carries
/// its destination.
///
/// # Errors
///
/// [`PermuteError::Transport`] if a collective fails or the received volume
/// does not fill the shard. The shard is untouched in both cases.
#[cfg_attr(
    feature = "tracing",
    tracing::instrument(level = "debug", skip_all, fields(rank = topology.rank(), from = %old, to = %new))
)]
pub fn personalized_exchange<A, T>(
    shard: &mut [A],
    old: &Permutation,
    new: &Permutation,
    topology: &Topology,
    transport: &T,
    config: &PermuteConfig,
) -> Result<()>
where
    A: Amplitude,
    T: Transport,
{
    debug_assert_eq!(shard.len(), topology.shard_size());

    let partitions: usize = topology.partitions();

    let destination = |offset: usize| -> (usize, usize) {
        let to: usize = new.program_to_data(old.data_to_program(topology.global_index(offset)));
        (topology.owner(to), topology.offset(to))
    };

    let routes: Vec<(usize, usize)> = if config.parallel(shard.len()) {
        (0..shard.len()).into_par_iter().map(destination).collect()
    } else {
        (0..shard.len()).map(destination).collect()
    };

    let mut counts: Vec<usize> = vec![0; partitions];
    for &(rank, _) in &routes {
        counts[rank] += 1;
    }

    let send_segments = Segments::from_counts(counts);

    let mut cursor: Vec<usize> = send_segments.displs().to_vec();
    let mut send: Vec<Tagged<A>> = vec![Tagged::default(); shard.len()];

    for (&(rank, offset), &amplitude) in routes.iter().zip(shard.iter()) {
        send[cursor[rank]] = Tagged { offset, amplitude };
        cursor[rank] += 1;
    }
    drop(routes);

    let recv_counts: Vec<usize> = transport.all_to_all_counts(send_segments.counts())?;
    let recv_segments = Segments::from_counts(recv_counts);

    // Every rank must reach all_to_allv. An oversized layout is refused
    // inside the collective; a short one is caught below.
    let mut recv: Vec<Tagged<A>> = vec![Tagged::default(); shard.len()];
    transport.all_to_allv(&send, &send_segments, &mut recv, &recv_segments)?;
    drop(send);

    if recv_segments.total() != shard.len() {
        return Err(PermuteError::transport(format!(
            "rank {} received {} amplitudes for a shard of {}",
            topology.rank(),
            recv_segments.total(),
            shard.len()
        )));
    }

    #[cfg(feature = "tracing")]
    tracing::debug!(
        sent = ?send_segments.counts(),
        received = ?recv_segments.counts(),
        "exchange complete"
    );

    for record in recv {
        shard[record.offset] = record.amplitude;
    }

    Ok(())
}
