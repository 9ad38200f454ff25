//! Tuning knobs for the permutation engine.
//!
//! # Environment
//!
//! [`PermuteConfig::from_env`] reads:
//! - `QUREG_REDISTRIBUTION`: `exchange` (default) or `all-gather`
//! - `QUREG_PARALLEL_THRESHOLD`: minimum shard length for rayon loops
//!
//! Values that fail to parse are ignored and the default is kept.
//! [`PermuteConfig::from_lookup`] does the same from any key/value source.

use std::env;
use std::fmt as StdFmt;
use std::str::FromStr;

use crate::error::PermuteError;

/// Environment variable selecting the redistribution algorithm.
pub const REDISTRIBUTION_ENV: &str = "QUREG_REDISTRIBUTION";

/// Environment variable overriding the parallel threshold.
pub const PARALLEL_THRESHOLD_ENV: &str = "QUREG_PARALLEL_THRESHOLD";

/// Default minimum shard length before loops go parallel.
///
/// Below this the rayon fork/join overhead outweighs the copy itself.
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 1 << 14;

// ============================================================================
//  Redistribution
// ============================================================================

/// Algorithm used when a permutation moves qubits across partitions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Redistribution {
    /// Every partition gathers the full vector and keeps its own part.
    /// O(global size) memory and traffic per partition.
    AllGather,

    /// Each element goes straight to its new owner in one all-to-all.
    /// O(shard size) memory and traffic per partition.
    #[default]
    PersonalizedExchange,
}

impl FromStr for Redistribution {
    type Err = PermuteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all-gather" | "allgather" => Ok(Self::AllGather),
            "exchange" | "personalized-exchange" | "alltoallv" => Ok(Self::PersonalizedExchange),
            other => Err(PermuteError::InvalidRedistribution(other.to_string())),
        }
    }
}

impl StdFmt::Display for Redistribution {
    fn fmt(&self, f: &mut StdFmt::Formatter<'_>) -> StdFmt::Result {
        match self {
            Self::AllGather => f.write_str("all-gather"),
            Self::PersonalizedExchange => f.write_str("exchange"),
        }
    }
}

// ============================================================================
//  PermuteConfig
// ============================================================================

/// Configuration carried by a register.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PermuteConfig {
    /// Algorithm for multi-partition permutations.
    pub redistribution: Redistribution,

    /// Shards shorter than this are processed on the calling thread.
    pub parallel_threshold: usize,
}

impl Default for PermuteConfig {
    fn default() -> Self {
        Self {
            redistribution: Redistribution::default(),
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
        }
    }
}

impl PermuteConfig {
    /// Defaults overridden by `QUREG_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each `QUREG_*` key.
    ///
    /// `lookup` returns `None` for an unset key. Values that fail to parse
    /// leave the default in place.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(REDISTRIBUTION_ENV) {
            match raw.parse::<Redistribution>() {
                Ok(redistribution) => config.redistribution = redistribution,

                Err(err) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(value = %raw, error = %err, "ignoring {REDISTRIBUTION_ENV}");

                    #[cfg(not(feature = "tracing"))]
                    let _ = err;
                }
            }
        }

        if let Some(raw) = lookup(PARALLEL_THRESHOLD_ENV) {
            match raw.trim().parse::<usize>() {
                Ok(threshold) => config.parallel_threshold = threshold,

                Err(err) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(value = %raw, error = %err, "ignoring {PARALLEL_THRESHOLD_ENV}");

                    #[cfg(not(feature = "tracing"))]
                    let _ = err;
                }
            }
        }

        config
    }

    /// Set the redistribution algorithm.
    #[must_use]
    pub const fn with_redistribution(mut self, redistribution: Redistribution) -> Self {
        self.redistribution = redistribution;
        self
    }

    /// Set the parallel threshold. `0` always uses rayon.
    #[must_use]
    pub const fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold;
        self
    }

    /// Whether a loop over `len` elements should run on rayon.
    #[inline]
    #[must_use]
    pub const fn parallel(&self, len: usize) -> bool {
        len >= self.parallel_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_uses_personalized_exchange() {
        let config = PermuteConfig::default();

        assert_eq!(config.redistribution, Redistribution::PersonalizedExchange);
        assert_eq!(config.parallel_threshold, DEFAULT_PARALLEL_THRESHOLD);
    }

    #[test]
    fn test_redistribution_parsing() {
        assert_eq!("all-gather".parse::<Redistribution>().unwrap(), Redistribution::AllGather);
        assert_eq!(" Exchange ".parse::<Redistribution>().unwrap(), Redistribution::PersonalizedExchange);
        assert_eq!(
            "broadcast".parse::<Redistribution>(),
            Err(PermuteError::InvalidRedistribution("broadcast".to_string()))
        );
        assert_eq!(Redistribution::AllGather.to_string(), "all-gather");
    }

    #[test]
    fn test_builder_and_threshold() {
        let config = PermuteConfig::default()
            .with_redistribution(Redistribution::AllGather)
            .with_parallel_threshold(8);

        assert_eq!(config.redistribution, Redistribution::AllGather);
        assert!(!config.parallel(7));
        assert!(config.parallel(8));
        assert!(PermuteConfig::default().with_parallel_threshold(0).parallel(0));
    }

    fn lookup<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |key| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| (*v).to_string())
        }
    }

    #[test]
    fn test_lookup_unset_keeps_defaults() {
        assert_eq!(PermuteConfig::from_lookup(lookup(&[])), PermuteConfig::default());
    }

    #[test]
    fn test_lookup_applies_valid_values() {
        let config = PermuteConfig::from_lookup(lookup(&[
            (REDISTRIBUTION_ENV, "all-gather"),
            (PARALLEL_THRESHOLD_ENV, " 256 "),
        ]));

        assert_eq!(config.redistribution, Redistribution::AllGather);
        assert_eq!(config.parallel_threshold, 256);
    }

    #[test]
    fn test_lookup_ignores_unparseable_values() {
        let config = PermuteConfig::from_lookup(lookup(&[
            (REDISTRIBUTION_ENV, "broadcast"),
            (PARALLEL_THRESHOLD_ENV, "lots"),
        ]));

        assert_eq!(config, PermuteConfig::default());

        // one bad key does not discard the other
        let config = PermuteConfig::from_lookup(lookup(&[
            (REDISTRIBUTION_ENV, "allgather"),
            (PARALLEL_THRESHOLD_ENV, "-1"),
        ]));

        assert_eq!(config.redistribution, Redistribution::AllGather);
        assert_eq!(config.parallel_threshold, DEFAULT_PARALLEL_THRESHOLD);
    }
}
