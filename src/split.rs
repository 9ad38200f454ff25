//! Partition geometry and the local/global split check.
//!
//! With `P` partitions the top `log2(P)` bit positions of a global index
//! select the owning partition and the low `M = n - log2(P)` positions select
//! the offset inside that partition's shard. Which logical qubits sit above
//! the boundary decides which partition owns which amplitude, so a map that
//! moves a qubit across it implies moving data between partitions.

use crate::error::{PermuteError, Result};

// ============================================================================
//  Topology
// ============================================================================

/// Fixed partitioning of an `n`-qubit state vector.
///
/// # Invariants
///
/// - `partitions` is a power of two and `log2(partitions) <= num_qubits`
/// - `num_qubits < usize::BITS`
/// - `rank < partitions`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Topology {
    num_qubits: usize,
    partitions: usize,
    rank: usize,
    local_qubits: usize,
}

impl Topology {
    /// Create a topology.
    ///
    /// # Errors
    ///
    /// [`PermuteError::InvalidTopology`] if any invariant is violated.
    pub fn new(num_qubits: usize, partitions: usize, rank: usize) -> Result<Self> {
        if num_qubits >= usize::BITS as usize {
            return Err(PermuteError::topology(format!(
                "{num_qubits} qubits do not fit a {}-bit index",
                usize::BITS
            )));
        }

        if !partitions.is_power_of_two() {
            return Err(PermuteError::topology(format!(
                "partition count {partitions} is not a power of two"
            )));
        }

        let global_qubits: usize = partitions.trailing_zeros() as usize;

        if global_qubits > num_qubits {
            return Err(PermuteError::topology(format!(
                "{partitions} partitions need at least {global_qubits} qubits, got {num_qubits}"
            )));
        }

        if rank >= partitions {
            return Err(PermuteError::topology(format!(
                "rank {rank} >= partition count {partitions}"
            )));
        }

        Ok(Self {
            num_qubits,
            partitions,
            rank,
            local_qubits: num_qubits - global_qubits,
        })
    }

    /// Single partition owning the whole vector.
    ///
    /// # Errors
    ///
    /// [`PermuteError::InvalidTopology`] if `num_qubits` is too large.
    pub fn single(num_qubits: usize) -> Result<Self> {
        Self::new(num_qubits, 1, 0)
    }

    /// Number of qubits `n`.
    #[inline]
    #[must_use]
    pub const fn num_qubits(&self) -> usize {
        self.num_qubits
    }

    /// Number of partitions `P`.
    #[inline]
    #[must_use]
    pub const fn partitions(&self) -> usize {
        self.partitions
    }

    /// This partition's rank.
    #[inline]
    #[must_use]
    pub const fn rank(&self) -> usize {
        self.rank
    }

    /// Number of local positions `M`.
    #[inline]
    #[must_use]
    pub const fn local_qubits(&self) -> usize {
        self.local_qubits
    }

    /// Number of global positions `log2(P)`.
    #[inline]
    #[must_use]
    pub const fn global_qubits(&self) -> usize {
        self.num_qubits - self.local_qubits
    }

    /// Amplitudes per partition (`2^M`).
    #[inline]
    #[must_use]
    pub const fn shard_size(&self) -> usize {
        1usize << self.local_qubits
    }

    /// Amplitudes in the full vector (`2^n`).
    #[inline]
    #[must_use]
    pub const fn global_size(&self) -> usize {
        1usize << self.num_qubits
    }

    /// Whether a physical position is local.
    #[inline]
    #[must_use]
    pub const fn is_local(&self, position: usize) -> bool {
        position < self.local_qubits
    }

    /// Partition owning a global index.
    #[inline]
    #[must_use]
    pub const fn owner(&self, global_index: usize) -> usize {
        global_index >> self.local_qubits
    }

    /// Offset of a global index inside its owner's shard.
    #[inline]
    #[must_use]
    pub const fn offset(&self, global_index: usize) -> usize {
        global_index & (self.shard_size() - 1)
    }

    /// Global index of an offset in this partition's shard.
    #[inline]
    #[must_use]
    pub const fn global_index(&self, offset: usize) -> usize {
        (self.rank << self.local_qubits) | offset
    }
}

// ============================================================================
//  Split check
// ============================================================================

/// Which side of the boundary a permutation is allowed to reorder.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SplitScope {
    /// Only positions `[0, M)` may change; `[M, n)` stay identical.
    LocalOnly,

    /// Only positions `[M, n)` may change; `[0, M)` stay identical.
    GlobalOnly,
}

/// Check that `new_inverse` keeps the local/global split of `old_inverse`.
///
/// Both arguments are inverse maps (`position -> logical`) of equal length.
/// For [`SplitScope::LocalOnly`] the set of qubits on `[0, M)` must be the
/// same and every position in `[M, n)` must be unchanged.
/// [`SplitScope::GlobalOnly`] is the mirror image.
///
/// # Errors
///
/// [`PermuteError::SplitViolation`] naming the first offending position.
pub fn check_split_preserved(
    old_inverse: &[usize],
    new_inverse: &[usize],
    local_qubits: usize,
    scope: SplitScope,
) -> Result<()> {
    debug_assert_eq!(old_inverse.len(), new_inverse.len());
    debug_assert!(local_qubits <= old_inverse.len());

    let n: usize = old_inverse.len();

    let (movable, fixed) = match scope {
        SplitScope::LocalOnly => (0..local_qubits, local_qubits..n),
        SplitScope::GlobalOnly => (local_qubits..n, 0..local_qubits),
    };

    for position in fixed {
        if old_inverse[position] != new_inverse[position] {
            return Err(PermuteError::SplitViolation { position });
        }
    }

    // Qubits that may be shuffled among the movable positions.
    let mut member: Vec<bool> = vec![false; n];
    for position in movable.clone() {
        member[old_inverse[position]] = true;
    }

    for position in movable {
        if !member[new_inverse[position]] {
            return Err(PermuteError::SplitViolation { position });
        }
    }

    Ok(())
}
