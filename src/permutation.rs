//! Filepath: src/permutation.rs
//!
//! Bijection between logical qubits and physical bit positions.
//!
//! A [`Permutation`] stores both directions of the map so that either lookup
//! is O(1):
//! - `to_physical[logical]` is the bit position holding that qubit
//! - `to_logical[position]` is the qubit sitting at that bit position
//!
//! The two arrays are exact inverses at all times. Every operation that
//! builds a permutation validates the input first, and
//! [`Permutation::swap_positions`] is the only in-place edit.
//!
//! # Global index remapping
//!
//! A physical (data) index has bit `p` equal to the value of qubit
//! `to_logical[p]`. [`Permutation::data_to_program`] turns it into a logical
//! (program) index where bit `q` is the value of qubit `q`, and
//! [`Permutation::program_to_data`] goes back. Moving data from an old
//! layout to a new one is `new.program_to_data(old.data_to_program(i))`.

use std::fmt as StdFmt;
use std::str::FromStr;

use crate::error::{PermuteError, Result};

// ============================================================================
//  MapStyle
// ============================================================================

/// Encoding of a candidate map.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum MapStyle {
    /// `map[logical] = position`.
    #[default]
    Direct,

    /// `map[position] = logical`.
    Inverse,
}

impl MapStyle {
    /// Name accepted by [`FromStr`].
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Inverse => "inverse",
        }
    }
}

impl FromStr for MapStyle {
    type Err = PermuteError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "direct" => Ok(Self::Direct),
            "inverse" => Ok(Self::Inverse),
            other => Err(PermuteError::InvalidStyle(other.to_string())),
        }
    }
}

impl StdFmt::Display for MapStyle {
    fn fmt(&self, f: &mut StdFmt::Formatter<'_>) -> StdFmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
//  resolve_to_inverse
// ============================================================================

/// Convert a candidate map to canonical inverse form (`position -> logical`).
///
/// # Errors
///
/// - [`PermuteError::InvalidSize`] if `map.len() != num_qubits`
/// - [`PermuteError::InvalidMap`] if an entry is `>= num_qubits` or repeated
pub fn resolve_to_inverse(map: &[usize], style: MapStyle, num_qubits: usize) -> Result<Vec<usize>> {
    if map.len() != num_qubits {
        return Err(PermuteError::InvalidSize {
            expected: num_qubits,
            actual: map.len(),
        });
    }

    let mut seen: Vec<bool> = vec![false; num_qubits];

    for (index, &value) in map.iter().enumerate() {
        if value >= num_qubits || seen[value] {
            return Err(PermuteError::InvalidMap { index, value });
        }
        seen[value] = true;
    }

    match style {
        MapStyle::Inverse => Ok(map.to_vec()),

        MapStyle::Direct => Ok(invert(map)),
    }
}

/// Invert a validated bijection.
fn invert(map: &[usize]) -> Vec<usize> {
    let mut inverse: Vec<usize> = vec![0; map.len()];

    for (from, &to) in map.iter().enumerate() {
        inverse[to] = from;
    }

    inverse
}

// ============================================================================
//  Permutation
// ============================================================================

/// Current assignment of logical qubits to physical bit positions.
///
/// # Invariants
///
/// - `to_physical.len() == to_logical.len() == num_qubits()`
/// - `to_logical[to_physical[q]] == q` for every qubit `q`
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Permutation {
    to_physical: Vec<usize>,
    to_logical: Vec<usize>,
}

impl Permutation {
    /// Identity permutation: qubit `q` sits at position `q`.
    #[must_use]
    pub fn identity(num_qubits: usize) -> Self {
        let to_physical: Vec<usize> = (0..num_qubits).collect();

        Self {
            to_logical: to_physical.clone(),
            to_physical,
        }
    }

    /// Build a permutation from a candidate map in either style.
    ///
    /// # Errors
    ///
    /// [`PermuteError::InvalidMap`] if `map` is not a bijection over
    /// `0..map.len()`.
    pub fn from_map(map: &[usize], style: MapStyle) -> Result<Self> {
        let inverse: Vec<usize> = resolve_to_inverse(map, style, map.len())?;

        Ok(Self::from_valid_inverse(inverse))
    }

    /// Build from an inverse array already checked by [`resolve_to_inverse`].
    pub(crate) fn from_valid_inverse(to_logical: Vec<usize>) -> Self {
        let perm = Self {
            to_physical: invert(&to_logical),
            to_logical,
        };

        #[cfg(debug_assertions)]
        perm.debug_assert_valid();

        perm
    }

    /// Number of qubits.
    #[inline]
    #[must_use]
    pub fn num_qubits(&self) -> usize {
        self.to_physical.len()
    }

    /// Physical position of a logical qubit.
    ///
    /// # Panics
    /// Panics if `logical >= num_qubits()`.
    #[inline]
    #[must_use]
    pub fn to_physical(&self, logical: usize) -> usize {
        self.to_physical[logical]
    }

    /// Logical qubit at a physical position.
    ///
    /// # Panics
    /// Panics if `position >= num_qubits()`.
    #[inline]
    #[must_use]
    pub fn to_logical(&self, position: usize) -> usize {
        self.to_logical[position]
    }

    /// Forward map as a slice (`[logical] -> position`).
    #[inline]
    #[must_use]
    pub fn physical(&self) -> &[usize] {
        &self.to_physical
    }

    /// Inverse map as a slice (`[position] -> logical`).
    #[inline]
    #[must_use]
    pub fn logical(&self) -> &[usize] {
        &self.to_logical
    }

    /// Exchange the qubits sitting at positions `a` and `b`.
    ///
    /// O(1) metadata edit, no amplitude moves. Works for any pair of
    /// positions, local or global.
    ///
    /// # Panics
    /// Panics if either position is `>= num_qubits()`.
    pub fn swap_positions(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }

        let qa: usize = self.to_logical[a];
        let qb: usize = self.to_logical[b];

        self.to_logical.swap(a, b);
        self.to_physical.swap(qa, qb);

        #[cfg(debug_assertions)]
        self.debug_assert_valid();
    }

    /// Reinterpret a physical index as a logical (program) index.
    ///
    /// Bit `p` of `index` becomes bit `to_logical[p]` of the result.
    #[inline]
    #[must_use]
    pub fn data_to_program(&self, index: usize) -> usize {
        remap_bits(index, &self.to_logical)
    }

    /// Reinterpret a logical (program) index as a physical index.
    ///
    /// Bit `q` of `index` becomes bit `to_physical[q]` of the result.
    #[inline]
    #[must_use]
    pub fn program_to_data(&self, index: usize) -> usize {
        remap_bits(index, &self.to_physical)
    }

    /// Verify the permutation invariants (debug builds only).
    ///
    /// # Panics
    /// If the arrays differ in length or are not mutual inverses.
    #[cfg(debug_assertions)]
    pub fn debug_assert_valid(&self) {
        assert_eq!(
            self.to_physical.len(),
            self.to_logical.len(),
            "forward and inverse maps differ in length"
        );

        for (logical, &position) in self.to_physical.iter().enumerate() {
            assert!(position < self.to_logical.len(), "position {position} out of range");
            assert_eq!(
                self.to_logical[position], logical,
                "maps disagree at qubit {logical}"
            );
        }
    }

    /// Verify the permutation invariants (no-op in release builds).
    #[inline]
    #[cfg(not(debug_assertions))]
    pub fn debug_assert_valid(&self) {}
}

/// Move every set bit `b` of `index` to bit `table[b]`.
#[inline]
fn remap_bits(index: usize, table: &[usize]) -> usize {
    let mut bits: usize = index;
    let mut out: usize = 0;

    while bits != 0 {
        let bit: usize = bits.trailing_zeros() as usize;
        out |= 1usize << table[bit];
        bits &= bits - 1;
    }

    out
}

impl StdFmt::Display for Permutation {
    fn fmt(&self, f: &mut StdFmt::Formatter<'_>) -> StdFmt::Result {
        f.write_str("[")?;

        for (i, position) in self.to_physical.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{position}")?;
        }

        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== resolve_to_inverse ====================

    #[test]
    fn test_resolve_direct_inverts() {
        let inverse = resolve_to_inverse(&[2, 0, 1], MapStyle::Direct, 3).unwrap();
        assert_eq!(inverse, vec![1, 2, 0]);
    }

    #[test]
    fn test_resolve_inverse_is_copied() {
        let inverse = resolve_to_inverse(&[2, 0, 1], MapStyle::Inverse, 3).unwrap();
        assert_eq!(inverse, vec![2, 0, 1]);
    }

    #[test]
    fn test_resolve_rejects_wrong_length() {
        let err = resolve_to_inverse(&[0, 1], MapStyle::Direct, 3).unwrap_err();
        assert_eq!(err, PermuteError::InvalidSize { expected: 3, actual: 2 });
    }

    #[test]
    fn test_resolve_rejects_duplicates_and_out_of_range() {
        let err = resolve_to_inverse(&[0, 0, 1], MapStyle::Direct, 3).unwrap_err();
        assert_eq!(err, PermuteError::InvalidMap { index: 1, value: 0 });

        let err = resolve_to_inverse(&[0, 3, 1], MapStyle::Inverse, 3).unwrap_err();
        assert_eq!(err, PermuteError::InvalidMap { index: 1, value: 3 });
    }

    #[test]
    fn test_style_parsing() {
        assert_eq!("direct".parse::<MapStyle>().unwrap(), MapStyle::Direct);
        assert_eq!("inverse".parse::<MapStyle>().unwrap(), MapStyle::Inverse);
        assert_eq!(
            "sideways".parse::<MapStyle>().unwrap_err(),
            PermuteError::InvalidStyle("sideways".to_string())
        );
        assert_eq!(MapStyle::Inverse.to_string(), "inverse");
    }

    // ==================== Permutation ====================

    #[test]
    fn test_identity() {
        let p = Permutation::identity(4);

        for q in 0..4 {
            assert_eq!(p.to_physical(q), q);
            assert_eq!(p.to_logical(q), q);
        }
        assert_eq!(p.data_to_program(0b1011), 0b1011);
    }

    #[test]
    fn test_from_map_styles_agree() {
        let direct = Permutation::from_map(&[1, 2, 0], MapStyle::Direct).unwrap();
        let inverse = Permutation::from_map(&[2, 0, 1], MapStyle::Inverse).unwrap();

        assert_eq!(direct, inverse);
        assert_eq!(direct.physical(), &[1, 2, 0]);
        assert_eq!(direct.logical(), &[2, 0, 1]);
    }

    #[test]
    fn test_swap_positions_updates_both_maps() {
        let mut p = Permutation::from_map(&[1, 2, 0], MapStyle::Direct).unwrap();

        // position 0 holds qubit 2, position 1 holds qubit 0
        p.swap_positions(0, 1);

        assert_eq!(p.to_logical(0), 0);
        assert_eq!(p.to_logical(1), 2);
        assert_eq!(p.to_physical(0), 0);
        assert_eq!(p.to_physical(2), 1);
        p.debug_assert_valid();
    }

    #[test]
    fn test_swap_same_position_is_noop() {
        let mut p = Permutation::from_map(&[1, 2, 0], MapStyle::Direct).unwrap();
        let before = p.clone();

        p.swap_positions(2, 2);
        assert_eq!(p, before);
    }

    #[test]
    fn test_index_remapping_round_trips() {
        let p = Permutation::from_map(&[2, 0, 3, 1], MapStyle::Direct).unwrap();

        // qubit 0 at bit 2, so program index 0b0001 is data index 0b0100
        assert_eq!(p.program_to_data(0b0001), 0b0100);
        assert_eq!(p.data_to_program(0b0100), 0b0001);

        for i in 0..16 {
            assert_eq!(p.data_to_program(p.program_to_data(i)), i);
        }
    }

    #[test]
    fn test_display_renders_forward_map() {
        let p = Permutation::from_map(&[1, 0, 2], MapStyle::Direct).unwrap();
        assert_eq!(p.to_string(), "[1 0 2]");
        assert_eq!(Permutation::identity(0).to_string(), "[]");
    }
}
