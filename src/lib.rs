//! # `qureg-permute`
//!
//! Qubit permutations over a state vector split across partitions.
//!
//! A register of `n` qubits holds `2^n` amplitudes. With `P = 2^k`
//! partitions each one owns `2^(n-k)` of them:
//! - Positions `[0, M)` (with `M = n - k`) are **local**: they index inside a shard
//! - Positions `[M, n)` are **global**: they select the owning partition
//!
//! The crate tracks which logical qubit sits on which position
//! ([`Permutation`]) and physically reorders amplitudes when that layout
//! changes ([`QubitRegister::permute`]).
//!
//! ## Engines
//!
//! | Situation | Engine | Communication |
//! |---|---|---|
//! | one partition, or global positions unchanged | local remap | none |
//! | anything else | [`Redistribution`] strategy | one collective |
//! | one local qubit traded with one global qubit | [`SwapExchange`] | half a shard, one partner |
//! | SWAP gate | [`QubitRegister::emulate_swap`] | none, relabel only |
//!
//! ## Example
//!
//! ```rust
//! use std::thread;
//!
//! use qureg_permute::{MapStyle, QubitRegister, ThreadFabric};
//!
//! // 3 qubits over 2 partitions: positions 0 and 1 local, position 2 global
//! let fabric = ThreadFabric::new(2).unwrap();
//!
//! thread::scope(|s| {
//!     for endpoint in fabric.endpoints() {
//!         s.spawn(move || {
//!             let base = endpoint_base(&endpoint);
//!             let shard: Vec<u32> = (base..base + 4).collect();
//!             let mut reg = QubitRegister::distributed(3, shard, endpoint).unwrap();
//!
//!             // move qubit 2 onto a local position
//!             reg.permute(&[2, 1, 0], MapStyle::Direct).unwrap();
//!             assert_eq!(reg.permutation().physical(), &[2, 1, 0]);
//!         });
//!     }
//! });
//!
//! # fn endpoint_base(e: &qureg_permute::FabricEndpoint) -> u32 {
//! #     use qureg_permute::Transport;
//! #     (e.rank() * 4) as u32
//! # }
//! ```
//!
//! ## Features
//!
//! - `tracing`: spans and events on every engine and dispatcher decision

#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod amplitude;
pub mod config;
pub mod engine;
pub mod error;
pub mod permutation;
pub mod register;
pub mod split;
pub mod transport;

pub use amplitude::{Amplitude, ComplexDP, ComplexSP};
pub use config::{PermuteConfig, Redistribution};
pub use engine::pair::{PairSwap, PairwiseExchange, SwapExchange};
pub use error::{PermuteError, Result};
pub use permutation::{MapStyle, Permutation};
pub use register::QubitRegister;
pub use split::{SplitScope, Topology};
pub use transport::{FabricEndpoint, Segments, SingleProcess, ThreadFabric, Transport};
