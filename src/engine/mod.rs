//! Data-movement engines.
//!
//! - [`local`]: in-memory reorder of one shard
//! - [`redistribute`]: full multi-partition redistribution
//! - [`pair`]: half-shard exchange for a single local/global swap
//!
//! Engines only move amplitudes. Validation and installing the new
//! permutation belong to the register.

pub mod local;
pub mod pair;
pub mod redistribute;
