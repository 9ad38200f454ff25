//! Collective communication between partitions.
//!
//! [`Transport`] is the seam between the permutation engine and whatever
//! process group runs it. All methods are blocking collectives: every rank
//! must call the same method, in the same order, with compatible sizes.
//! A rank that never arrives stalls the others; there is no timeout.
//!
//! Two implementations ship with the crate:
//! - [`SingleProcess`]: one partition, collectives are local copies
//! - [`ThreadFabric`]: `P` ranks running as threads of one process

mod fabric;

pub use fabric::{FabricEndpoint, ThreadFabric};

use std::ops::Range;

use crate::error::{PermuteError, Result};

// ============================================================================
//  Segments
// ============================================================================

/// Per-rank counts and displacements of a variable-length buffer.
///
/// Segment `r` occupies `displs[r]..displs[r] + counts[r]`. Segments are
/// packed back to back in rank order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Segments {
    counts: Vec<usize>,
    displs: Vec<usize>,
}

impl Segments {
    /// Build packed segments from per-rank counts.
    #[must_use]
    pub fn from_counts(counts: Vec<usize>) -> Self {
        let mut displs: Vec<usize> = Vec::with_capacity(counts.len());
        let mut next: usize = 0;

        for &count in &counts {
            displs.push(next);
            next += count;
        }

        Self { counts, displs }
    }

    /// Single segment of `count` elements addressed to `rank`, out of `partitions`.
    #[must_use]
    pub fn single(partitions: usize, rank: usize, count: usize) -> Self {
        let mut counts: Vec<usize> = vec![0; partitions];
        counts[rank] = count;
        Self::from_counts(counts)
    }

    /// Element counts per rank.
    #[inline]
    #[must_use]
    pub fn counts(&self) -> &[usize] {
        &self.counts
    }

    /// Start offsets per rank.
    #[inline]
    #[must_use]
    pub fn displs(&self) -> &[usize] {
        &self.displs
    }

    /// Number of ranks described.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Whether no ranks are described.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Total number of elements across all segments.
    #[must_use]
    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    /// Buffer range of one rank's segment.
    #[inline]
    #[must_use]
    pub fn range(&self, rank: usize) -> Range<usize> {
        self.displs[rank]..self.displs[rank] + self.counts[rank]
    }
}

// ============================================================================
//  Transport
// ============================================================================

/// Blocking collectives over a fixed set of partitions.
///
/// Element types only need to be `Copy`: payloads are moved as typed
/// buffers, never serialized.
pub trait Transport {
    /// Number of partitions in the group.
    fn partitions(&self) -> usize;

    /// This partition's rank.
    fn rank(&self) -> usize;

    /// Concatenate every rank's `send` into `recv`, in rank order.
    ///
    /// `recv.len()` must be `send.len() * partitions()`.
    ///
    /// # Errors
    ///
    /// [`PermuteError::Transport`] on a size mismatch or a broken exchange.
    fn all_gather<E>(&self, send: &[E], recv: &mut [E]) -> Result<()>
    where
        E: Copy + Send + 'static;

    /// Exchange one count per rank pair.
    ///
    /// `send_counts[r]` is what this rank will send to `r`; the result holds
    /// at index `r` what `r` will send to this rank.
    ///
    /// # Errors
    ///
    /// [`PermuteError::Transport`] on a size mismatch or a broken exchange.
    fn all_to_all_counts(&self, send_counts: &[usize]) -> Result<Vec<usize>>;

    /// Personalized all-to-all with variable segment sizes.
    ///
    /// Segment `r` of `send` goes to rank `r`; the segment received from
    /// rank `r` lands in `recv[recv_segments.range(r)]`.
    ///
    /// # Errors
    ///
    /// [`PermuteError::Transport`] on a size mismatch or a broken exchange.
    fn all_to_allv<E>(
        &self,
        send: &[E],
        send_segments: &Segments,
        recv: &mut [E],
        recv_segments: &Segments,
    ) -> Result<()>
    where
        E: Copy + Send + 'static;
}

/// Check that a segment layout fits a buffer and the group size.
pub(crate) fn check_segments(
    label: &str,
    segments: &Segments,
    buffer_len: usize,
    partitions: usize,
) -> Result<()> {
    if segments.len() != partitions {
        return Err(PermuteError::transport(format!(
            "{label} segments describe {} ranks, group has {partitions}",
            segments.len()
        )));
    }

    let total: usize = segments.total();
    if total > buffer_len {
        return Err(PermuteError::transport(format!(
            "{label} segments cover {total} elements, buffer holds {buffer_len}"
        )));
    }

    Ok(())
}

// ============================================================================
//  SingleProcess
// ============================================================================

/// Transport for a group of one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SingleProcess;

impl Transport for SingleProcess {
    #[inline]
    fn partitions(&self) -> usize {
        1
    }

    #[inline]
    fn rank(&self) -> usize {
        0
    }

    fn all_gather<E>(&self, send: &[E], recv: &mut [E]) -> Result<()>
    where
        E: Copy + Send + 'static,
    {
        if recv.len() != send.len() {
            return Err(PermuteError::transport(format!(
                "all_gather: recv holds {}, expected {}",
                recv.len(),
                send.len()
            )));
        }

        recv.copy_from_slice(send);
        Ok(())
    }

    fn all_to_all_counts(&self, send_counts: &[usize]) -> Result<Vec<usize>> {
        if send_counts.len() != 1 {
            return Err(PermuteError::transport(format!(
                "all_to_all_counts: {} counts for a group of 1",
                send_counts.len()
            )));
        }

        Ok(send_counts.to_vec())
    }

    fn all_to_allv<E>(
        &self,
        send: &[E],
        send_segments: &Segments,
        recv: &mut [E],
        recv_segments: &Segments,
    ) -> Result<()>
    where
        E: Copy + Send + 'static,
    {
        check_segments("send", send_segments, send.len(), 1)?;
        check_segments("recv", recv_segments, recv.len(), 1)?;

        let from = send_segments.range(0);
        let to = recv_segments.range(0);

        if from.len() != to.len() {
            return Err(PermuteError::transport(format!(
                "all_to_allv: sending {} to self, expecting {}",
                from.len(),
                to.len()
            )));
        }

        recv[to].copy_from_slice(&send[from]);
        Ok(())
    }
}
