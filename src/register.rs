//! Filepath: src/register.rs
//!
//! `QubitRegister` - one partition's view of a distributed state vector.
//!
//! The register owns its shard and the active [`Permutation`]. Every
//! operation validates first, then moves data, then installs the new
//! permutation in a single assignment. A returned error therefore means
//! neither the shard nor the permutation changed.
//!
//! # Multi-partition use
//!
//! All ranks must call the same operation with the same map and style.
//! Divergent calls are a caller error and are not detected locally. With
//! [`ThreadFabric`](crate::ThreadFabric) each rank's register lives on its
//! own thread.

use crate::amplitude::Amplitude;
use crate::config::{PermuteConfig, Redistribution};
use crate::engine::pair::{PairSwap, SwapExchange};
use crate::engine::{local, redistribute};
use crate::error::{PermuteError, Result};
use crate::permutation::{MapStyle, Permutation, resolve_to_inverse};
use crate::split::{SplitScope, Topology, check_split_preserved};
use crate::transport::{SingleProcess, Transport};

/// One partition of an `n`-qubit state vector plus its qubit layout.
///
/// # Type Parameters
///
/// * `A` - amplitude type, e.g. [`ComplexDP`](crate::ComplexDP)
/// * `T` - transport to the other partitions
///
/// # Example
///
/// ```rust
/// use qureg_permute::{MapStyle, QubitRegister};
///
/// // |q1 q0>: index bit 0 is qubit 0
/// let mut reg = QubitRegister::single(2, vec!["a00", "a01", "a10", "a11"]).unwrap();
///
/// reg.permute(&[1, 0], MapStyle::Direct).unwrap();
///
/// assert_eq!(reg.permutation().physical(), &[1, 0]);
/// assert_eq!(reg.shard(), &["a00", "a10", "a01", "a11"]);
/// ```
#[derive(Debug)]
pub struct QubitRegister<A: Amplitude, T: Transport = SingleProcess> {
    shard: Vec<A>,
    permutation: Permutation,
    topology: Topology,
    transport: Option<T>,
    config: PermuteConfig,
}

impl<A: Amplitude> QubitRegister<A, SingleProcess> {
    /// Single-partition register over the whole vector.
    ///
    /// # Errors
    ///
    /// - [`PermuteError::InvalidTopology`] if `num_qubits` is too large
    /// - [`PermuteError::ShardLength`] if `amplitudes.len() != 2^num_qubits`
    pub fn single(num_qubits: usize, amplitudes: Vec<A>) -> Result<Self> {
        Self::new(Topology::single(num_qubits)?, amplitudes, Some(SingleProcess))
    }
}

impl<A: Amplitude, T: Transport> QubitRegister<A, T> {
    /// Register for one partition, starting from the identity layout.
    ///
    /// The configuration comes from [`PermuteConfig::from_env`]; override it
    /// with [`with_config`](Self::with_config).
    ///
    /// `transport` may be `None`; multi-partition operations then fail with
    /// [`PermuteError::MissingTransportBackend`].
    ///
    /// # Errors
    ///
    /// - [`PermuteError::ShardLength`] if `shard.len() != topology.shard_size()`
    /// - [`PermuteError::InvalidTopology`] if the transport disagrees with
    ///   `topology` on partition count or rank
    pub fn new(topology: Topology, shard: Vec<A>, transport: Option<T>) -> Result<Self> {
        if shard.len() != topology.shard_size() {
            return Err(PermuteError::ShardLength {
                expected: topology.shard_size(),
                actual: shard.len(),
            });
        }

        if let Some(ref t) = transport {
            if t.partitions() != topology.partitions() || t.rank() != topology.rank() {
                return Err(PermuteError::topology(format!(
                    "transport is rank {} of {}, topology is rank {} of {}",
                    t.rank(),
                    t.partitions(),
                    topology.rank(),
                    topology.partitions()
                )));
            }
        }

        Ok(Self {
            shard,
            permutation: Permutation::identity(topology.num_qubits()),
            topology,
            transport,
            config: PermuteConfig::from_env(),
        })
    }

    /// Register whose partition count and rank come from `transport`.
    ///
    /// # Errors
    ///
    /// Same as [`Topology::new`] and [`QubitRegister::new`].
    pub fn distributed(num_qubits: usize, shard: Vec<A>, transport: T) -> Result<Self> {
        let topology = Topology::new(num_qubits, transport.partitions(), transport.rank())?;
        Self::new(topology, shard, Some(transport))
    }

    /// Replace the configuration.
    #[must_use]
    pub fn with_config(mut self, config: PermuteConfig) -> Self {
        self.config = config;
        self
    }

    /// Start from a given layout instead of the identity.
    ///
    /// The shard is taken to already be laid out according to `permutation`.
    ///
    /// # Errors
    ///
    /// [`PermuteError::InvalidTopology`] if the qubit counts differ.
    pub fn with_permutation(mut self, permutation: Permutation) -> Result<Self> {
        if permutation.num_qubits() != self.topology.num_qubits() {
            return Err(PermuteError::topology(format!(
                "permutation covers {} qubits, register has {}",
                permutation.num_qubits(),
                self.topology.num_qubits()
            )));
        }

        self.permutation = permutation;
        Ok(self)
    }

    // ========================================================================
    //  Accessors
    // ========================================================================

    /// Number of qubits `n`.
    #[inline]
    #[must_use]
    pub const fn num_qubits(&self) -> usize {
        self.topology.num_qubits()
    }

    /// Number of local positions `M`.
    #[inline]
    #[must_use]
    pub const fn local_qubits(&self) -> usize {
        self.topology.local_qubits()
    }

    /// Amplitudes held by this partition.
    #[inline]
    #[must_use]
    pub const fn shard_size(&self) -> usize {
        self.topology.shard_size()
    }

    /// Amplitudes in the full vector.
    #[inline]
    #[must_use]
    pub const fn global_size(&self) -> usize {
        self.topology.global_size()
    }

    /// Partition geometry.
    #[inline]
    #[must_use]
    pub const fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Active qubit layout.
    #[inline]
    #[must_use]
    pub const fn permutation(&self) -> &Permutation {
        &self.permutation
    }

    /// This partition's amplitudes, indexed by local offset.
    #[inline]
    #[must_use]
    pub fn shard(&self) -> &[A] {
        &self.shard
    }

    /// Active configuration.
    #[inline]
    #[must_use]
    pub const fn config(&self) -> &PermuteConfig {
        &self.config
    }

    /// Give back the shard.
    #[must_use]
    pub fn into_shard(self) -> Vec<A> {
        self.shard
    }

    // ========================================================================
    //  Permutation entry points
    // ========================================================================

    /// Apply a new layout to the data.
    ///
    /// Uses the local engine with one partition, or when every global
    /// position keeps its qubit. Otherwise redistributes across partitions
    /// with the configured [`Redistribution`].
    ///
    /// # Errors
    ///
    /// - [`PermuteError::InvalidSize`] / [`PermuteError::InvalidMap`] for a bad map
    /// - [`PermuteError::MissingTransportBackend`] with several partitions and no transport
    /// - [`PermuteError::Transport`] if a collective fails
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(level = "debug", skip(self), fields(rank = self.topology.rank()))
    )]
    pub fn permute(&mut self, map: &[usize], style: MapStyle) -> Result<()> {
        let new_inverse: Vec<usize> = resolve_to_inverse(map, style, self.num_qubits())?;
        let multi: bool = self.topology.partitions() > 1;

        if multi && self.transport.is_none() {
            return Err(PermuteError::MissingTransportBackend);
        }

        let new = Permutation::from_valid_inverse(new_inverse);

        if new == self.permutation {
            return Ok(());
        }

        let m: usize = self.local_qubits();
        let globals_fixed: bool = self.permutation.logical()[m..] == new.logical()[m..];

        match (&self.transport, globals_fixed) {
            (_, true) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(multi, "permute: local path");

                local::remap(&mut self.shard, &self.permutation, &new, &self.config);
            }

            (Some(transport), false) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(strategy = %self.config.redistribution, "permute: distributed path");

                match self.config.redistribution {
                    Redistribution::AllGather => redistribute::all_gather(
                        &mut self.shard,
                        &self.permutation,
                        &new,
                        &self.topology,
                        transport,
                        &self.config,
                    )?,

                    Redistribution::PersonalizedExchange => redistribute::personalized_exchange(
                        &mut self.shard,
                        &self.permutation,
                        &new,
                        &self.topology,
                        transport,
                        &self.config,
                    )?,
                }
            }

            (None, false) => return Err(PermuteError::MissingTransportBackend),
        }

        self.permutation = new;
        Ok(())
    }

    /// Reorder qubits among local positions only.
    ///
    /// With several partitions the map must keep every global position and
    /// the set of local qubits unchanged. With one partition any map is
    /// accepted.
    ///
    /// # Errors
    ///
    /// - [`PermuteError::InvalidSize`] / [`PermuteError::InvalidMap`] for a bad map
    /// - [`PermuteError::SplitViolation`] if the map crosses the boundary
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(level = "debug", skip(self), fields(rank = self.topology.rank()))
    )]
    pub fn permute_local(&mut self, map: &[usize], style: MapStyle) -> Result<()> {
        let new_inverse: Vec<usize> = resolve_to_inverse(map, style, self.num_qubits())?;

        if self.topology.partitions() > 1 {
            check_split_preserved(
                self.permutation.logical(),
                &new_inverse,
                self.local_qubits(),
                SplitScope::LocalOnly,
            )?;
        }

        let new = Permutation::from_valid_inverse(new_inverse);
        local::remap(&mut self.shard, &self.permutation, &new, &self.config);

        self.permutation = new;
        Ok(())
    }

    /// Reorder qubits among global positions only.
    ///
    /// Renumbering partitions is not implemented, so the only accepted map
    /// is one that leaves every global position as it is. No data moves.
    ///
    /// # Errors
    ///
    /// - [`PermuteError::InvalidSize`] / [`PermuteError::InvalidMap`] for a bad map
    /// - [`PermuteError::SplitViolation`] if a local position changes or a
    ///   qubit crosses the boundary
    /// - [`PermuteError::UnsupportedGlobalReorder`] if global qubits are reordered
    pub fn permute_global(&mut self, map: &[usize], style: MapStyle) -> Result<()> {
        let new_inverse: Vec<usize> = resolve_to_inverse(map, style, self.num_qubits())?;
        let m: usize = self.local_qubits();

        check_split_preserved(self.permutation.logical(), &new_inverse, m, SplitScope::GlobalOnly)?;

        let current: &[usize] = self.permutation.logical();

        // TODO: accept real reorders by renumbering partitions once Transport
        // can expose a rank-to-global-bits table.
        if let Some(position) = (m..self.num_qubits()).find(|&p| current[p] != new_inverse[p]) {
            #[cfg(feature = "tracing")]
            tracing::warn!(position, "permute_global: reorder of global qubits rejected");

            return Err(PermuteError::UnsupportedGlobalReorder { position });
        }

        Ok(())
    }

    // ========================================================================
    //  Swap shortcuts
    // ========================================================================

    /// Exchange the qubits on positions `a` and `b` without moving data.
    ///
    /// O(1). The shard is now read with the two positions relabelled, which
    /// is how a SWAP gate is emulated.
    ///
    /// # Errors
    ///
    /// [`PermuteError::InvalidQubit`] if a position is `>= n`.
    pub fn swap_positions(&mut self, a: usize, b: usize) -> Result<()> {
        let n: usize = self.num_qubits();

        for position in [a, b] {
            if position >= n {
                return Err(PermuteError::InvalidQubit {
                    qubit: position,
                    num_qubits: n,
                });
            }
        }

        self.permutation.swap_positions(a, b);
        Ok(())
    }

    /// Emulate a SWAP gate between two logical qubits.
    ///
    /// Looks up where each qubit currently sits and swaps the two positions.
    ///
    /// # Errors
    ///
    /// [`PermuteError::InvalidQubit`] if a qubit is `>= n`.
    pub fn emulate_swap(&mut self, qubit_a: usize, qubit_b: usize) -> Result<()> {
        let n: usize = self.num_qubits();

        for qubit in [qubit_a, qubit_b] {
            if qubit >= n {
                return Err(PermuteError::InvalidQubit { qubit, num_qubits: n });
            }
        }

        let a: usize = self.permutation.to_physical(qubit_a);
        let b: usize = self.permutation.to_physical(qubit_b);

        self.permutation.swap_positions(a, b);
        Ok(())
    }

    /// Apply a map that swaps exactly one local qubit with one global qubit.
    ///
    /// `exchanger` moves the data; the permutation is updated afterwards.
    /// Cheaper than [`permute`](Self::permute) for this case since only half
    /// a shard crosses partitions.
    ///
    /// # Errors
    ///
    /// - [`PermuteError::InvalidSize`] / [`PermuteError::InvalidMap`] for a bad map
    /// - [`PermuteError::NotASinglePairSwap`] unless exactly two qubits move
    /// - [`PermuteError::InvalidPairKind`] unless one is local and one global
    /// - [`PermuteError::MissingTransportBackend`] without a transport
    /// - whatever `exchanger` returns
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(level = "debug", skip(self, exchanger), fields(rank = self.topology.rank()))
    )]
    pub fn exchange_local_global_pair<X>(&mut self, map: &[usize], style: MapStyle, exchanger: &mut X) -> Result<()>
    where
        X: SwapExchange<A, T>,
    {
        let new_inverse: Vec<usize> = resolve_to_inverse(map, style, self.num_qubits())?;
        let new = Permutation::from_valid_inverse(new_inverse);

        let changed: Vec<usize> = (0..self.num_qubits())
            .filter(|&q| new.to_physical(q) != self.permutation.to_physical(q))
            .collect();

        let &[first, second] = changed.as_slice() else {
            return Err(PermuteError::NotASinglePairSwap { changed: changed.len() });
        };

        let pos_first: usize = self.permutation.to_physical(first);
        let pos_second: usize = self.permutation.to_physical(second);

        let pair: PairSwap = match (self.topology.is_local(pos_first), self.topology.is_local(pos_second)) {
            (true, false) => PairSwap {
                local_qubit: first,
                global_qubit: second,
                local_position: pos_first,
                global_position: pos_second,
            },

            (false, true) => PairSwap {
                local_qubit: second,
                global_qubit: first,
                local_position: pos_second,
                global_position: pos_first,
            },

            _ => return Err(PermuteError::InvalidPairKind { first, second }),
        };

        let Some(transport) = self.transport.as_ref() else {
            return Err(PermuteError::MissingTransportBackend);
        };

        exchanger.swap_exchange(&mut self.shard, transport, &self.topology, pair)?;
        self.permutation.swap_positions(pair.local_position, pair.global_position);

        debug_assert_eq!(self.permutation, new);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::pair::PairwiseExchange;

    #[test]
    fn test_single_rejects_wrong_shard_length() {
        let err = QubitRegister::single(2, vec![0u8; 3]).unwrap_err();
        assert_eq!(err, PermuteError::ShardLength { expected: 4, actual: 3 });
    }

    #[test]
    fn test_new_rejects_mismatched_transport() {
        let topology = Topology::new(2, 2, 1).unwrap();
        let err = QubitRegister::new(topology, vec![0u8; 2], Some(SingleProcess)).unwrap_err();
        assert!(matches!(err, PermuteError::InvalidTopology(_)));
    }

    #[test]
    fn test_missing_transport_rejected_before_mutation() {
        let topology = Topology::new(3, 2, 0).unwrap();
        let mut reg: QubitRegister<u8> = QubitRegister::new(topology, vec![0, 1, 2, 3], None).unwrap();

        let err = reg.permute(&[2, 1, 0], MapStyle::Direct).unwrap_err();
        assert_eq!(err, PermuteError::MissingTransportBackend);
        assert_eq!(reg.shard(), &[0, 1, 2, 3]);
        assert_eq!(reg.permutation(), &Permutation::identity(3));
    }

    #[test]
    fn test_permute_needs_transport_but_permute_local_does_not() {
        let topology = Topology::new(3, 2, 0).unwrap();
        let mut reg: QubitRegister<u8> = QubitRegister::new(topology, vec![0, 1, 2, 3], None).unwrap();

        assert_eq!(reg.permute(&[1, 0, 2], MapStyle::Direct), Err(PermuteError::MissingTransportBackend));

        // permute_local needs no transport at all
        reg.permute_local(&[1, 0, 2], MapStyle::Direct).unwrap();
        assert_eq!(reg.shard(), &[0, 2, 1, 3]);
    }

    #[test]
    fn test_with_permutation_checks_qubit_count() {
        let reg = QubitRegister::single(2, vec![0u8; 4]).unwrap();
        let err = reg.with_permutation(Permutation::identity(3)).unwrap_err();
        assert!(matches!(err, PermuteError::InvalidTopology(_)), "{err}");

        let swapped = Permutation::from_map(&[1, 0], MapStyle::Direct).unwrap();
        let reg = QubitRegister::single(2, vec![0u8; 4]).unwrap().with_permutation(swapped.clone()).unwrap();
        assert_eq!(reg.permutation(), &swapped);
    }

    #[test]
    fn test_new_register_reads_environment_config() {
        let reg = QubitRegister::single(2, vec![0u8; 4]).unwrap();
        assert_eq!(reg.config(), &PermuteConfig::from_env());
    }

    #[test]
    fn test_pair_exchange_single_partition_has_no_global_qubit() {
        let mut reg = QubitRegister::single(2, vec![0u8; 4]).unwrap();

        let err = reg
            .exchange_local_global_pair(&[1, 0], MapStyle::Direct, &mut PairwiseExchange)
            .unwrap_err();
        assert_eq!(err, PermuteError::InvalidPairKind { first: 0, second: 1 });
    }
}
