//! Error taxonomy for the permutation engine.
//!
//! Every variant is a caller contract violation or a collective failure.
//! Validation errors are raised before any shard write or collective call,
//! so a register that returned one is left exactly as it was.

use std::fmt as StdFmt;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, PermuteError>;

// ============================================================================
//  PermuteError
// ============================================================================

/// Errors returned by permutation operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermuteError {
    /// Candidate map length differs from the number of qubits.
    InvalidSize {
        /// Number of qubits in the register.
        expected: usize,
        /// Length of the supplied map.
        actual: usize,
    },

    /// Map style string is neither `"direct"` nor `"inverse"`.
    InvalidStyle(String),

    /// Redistribution name is not a known algorithm.
    InvalidRedistribution(String),

    /// Candidate map is not a bijection over `0..n`.
    /// `index` is the first entry that is out of range or repeated.
    InvalidMap {
        /// Index of the offending entry in the map.
        index: usize,
        /// Value found at that index.
        value: usize,
    },

    /// The map moves a qubit across the local/global boundary
    /// (or touches the side that must stay fixed).
    SplitViolation {
        /// First physical position that breaks the split.
        position: usize,
    },

    /// A real reassignment of global positions was requested.
    /// Partition renumbering is not implemented.
    UnsupportedGlobalReorder {
        /// First global position whose qubit would change.
        position: usize,
    },

    /// Single-pair exchange needs exactly two qubits to change position.
    NotASinglePairSwap {
        /// Number of logical qubits whose position changed.
        changed: usize,
    },

    /// The two exchanged qubits are not one local and one global.
    InvalidPairKind {
        /// First changed logical qubit.
        first: usize,
        /// Second changed logical qubit.
        second: usize,
    },

    /// A multi-partition operation was requested without a transport.
    MissingTransportBackend,

    /// Qubit or position index outside `0..n`.
    InvalidQubit {
        /// The offending index.
        qubit: usize,
        /// Number of qubits in the register.
        num_qubits: usize,
    },

    /// Partition count, rank or qubit count is inconsistent.
    InvalidTopology(String),

    /// Shard passed to a constructor has the wrong length.
    ShardLength {
        /// `2^M` for the topology.
        expected: usize,
        /// Length of the supplied shard.
        actual: usize,
    },

    /// A collective operation failed.
    Transport(String),
}

impl PermuteError {
    /// Create a transport failure.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a topology error.
    pub fn topology(msg: impl Into<String>) -> Self {
        Self::InvalidTopology(msg.into())
    }
}

impl StdFmt::Display for PermuteError {
    fn fmt(&self, f: &mut StdFmt::Formatter<'_>) -> StdFmt::Result {
        match self {
            Self::InvalidSize { expected, actual } => {
                write!(f, "map has {actual} entries, register has {expected} qubits")
            }

            Self::InvalidStyle(style) => {
                write!(f, "unknown map style {style:?} (expected \"direct\" or \"inverse\")")
            }

            Self::InvalidRedistribution(name) => {
                write!(f, "unknown redistribution {name:?} (expected \"all-gather\" or \"exchange\")")
            }

            Self::InvalidMap { index, value } => {
                write!(f, "map entry {index} = {value} is out of range or repeated")
            }

            Self::SplitViolation { position } => {
                write!(f, "map changes the local/global split at position {position}")
            }

            Self::UnsupportedGlobalReorder { position } => {
                write!(f, "reordering global position {position} is not supported")
            }

            Self::NotASinglePairSwap { changed } => {
                write!(f, "expected exactly 2 qubits to change position, got {changed}")
            }

            Self::InvalidPairKind { first, second } => {
                write!(f, "qubits {first} and {second} are not one local and one global")
            }

            Self::MissingTransportBackend => {
                write!(f, "multi-partition operation requires a transport backend")
            }

            Self::InvalidQubit { qubit, num_qubits } => {
                write!(f, "qubit {qubit} out of range for {num_qubits} qubits")
            }

            Self::InvalidTopology(msg) => write!(f, "invalid topology: {msg}"),

            Self::ShardLength { expected, actual } => {
                write!(f, "shard has {actual} amplitudes, expected {expected}")
            }

            Self::Transport(msg) => write!(f, "transport failure: {msg}"),
        }
    }
}

impl std::error::Error for PermuteError {}
