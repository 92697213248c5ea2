//! Search configuration.
//!
//! `SearchConfig` is plain data so the CLI can load it from JSON and override
//! individual fields from flags. Missing JSON fields fall back to `Default`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::transform::TransformKind;

/// Default cap on how many chunk positions one trial selects.
pub const DEFAULT_MAX_POSITIONS: u32 = 64;

/// How each trial picks its chunk size.
///
/// Sizes larger than the input are never usable; `Uniform` and `Sweep` clamp
/// their range to the input length, `FixedSet` entries that don't fit are
/// rejected at sampling time and resampled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum ChunkSizePolicy {
    /// Uniform over `min..=max`.
    Uniform { min: u32, max: u32 },
    /// Uniform over a fixed list of sizes.
    FixedSet { sizes: Vec<u32> },
    /// Every size in `min..=max` stepping by `step`, ascending, once each.
    Sweep { min: u32, max: u32, step: u32 },
}

impl Default for ChunkSizePolicy {
    fn default() -> Self {
        ChunkSizePolicy::Uniform { min: 2, max: 4096 }
    }
}

impl ChunkSizePolicy {
    pub fn validate(&self) -> Result<()> {
        match self {
            ChunkSizePolicy::Uniform { min, max } | ChunkSizePolicy::Sweep { min, max, .. }
                if *min == 0 || min > max =>
            {
                Err(Error::InvalidParameter(format!(
                    "chunk size range {}..={} is empty or starts at 0",
                    min, max
                )))
            }
            ChunkSizePolicy::Sweep { step: 0, .. } => {
                Err(Error::InvalidParameter("sweep step must be positive".into()))
            }
            ChunkSizePolicy::FixedSet { sizes } if sizes.is_empty() || sizes.contains(&0) => {
                Err(Error::InvalidParameter(
                    "fixed chunk sizes must be non-empty and positive".into(),
                ))
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub chunk_sizes: ChunkSizePolicy,
    /// Transform kinds a trial may pick from, uniformly.
    pub kinds: Vec<TransformKind>,
    pub max_positions: u32,
    /// Stop after this many trials.
    pub max_iterations: Option<u64>,
    /// Stop after this many consecutive trials without a strictly smaller result.
    pub patience: Option<u64>,
    /// Stop once this much wall-clock time has elapsed, checked between trials.
    pub time_budget_ms: Option<u64>,
    pub seed: u64,
    /// Trials evaluated concurrently per batch. 1 keeps the search sequential.
    pub workers: usize,
    /// How many of the smallest candidates are kept as verification fallbacks.
    pub retain_candidates: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            chunk_sizes: ChunkSizePolicy::default(),
            kinds: vec![TransformKind::Reverse],
            max_positions: DEFAULT_MAX_POSITIONS,
            max_iterations: Some(200),
            patience: Some(32),
            time_budget_ms: None,
            seed: 42,
            workers: 1,
            retain_candidates: 4,
        }
    }
}

impl SearchConfig {
    pub fn time_budget(&self) -> Option<Duration> {
        self.time_budget_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> Result<()> {
        self.chunk_sizes.validate()?;
        if self.kinds.is_empty() {
            return Err(Error::InvalidParameter("no transform kinds configured".into()));
        }
        for kind in &self.kinds {
            kind.validate()?;
        }
        if self.max_iterations.is_none() && self.patience.is_none() && self.time_budget_ms.is_none()
        {
            return Err(Error::InvalidParameter(
                "at least one of max_iterations, patience or time_budget_ms must be set".into(),
            ));
        }
        if self.workers == 0 {
            return Err(Error::InvalidParameter("workers must be at least 1".into()));
        }
        if self.retain_candidates == 0 {
            return Err(Error::InvalidParameter(
                "retain_candidates must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        SearchConfig::default().validate().unwrap();
    }

    #[test]
    fn needs_a_stop_rule() {
        let config = SearchConfig {
            max_iterations: None,
            patience: None,
            time_budget_ms: None,
            ..SearchConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidParameter(_))));
    }

    #[test]
    fn rejects_bad_policies() {
        for policy in [
            ChunkSizePolicy::Uniform { min: 0, max: 4 },
            ChunkSizePolicy::Uniform { min: 9, max: 4 },
            ChunkSizePolicy::Sweep { min: 1, max: 4, step: 0 },
            ChunkSizePolicy::FixedSet { sizes: vec![] },
            ChunkSizePolicy::FixedSet { sizes: vec![4, 0] },
        ] {
            assert!(policy.validate().is_err(), "{:?}", policy);
        }
    }

    #[test]
    fn partial_config_falls_back_to_defaults() {
        let json = r#"{"seed": 7, "chunk_sizes": {"policy": "fixed_set", "sizes": [8, 16]}}"#;
        let config: SearchConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(
            config.chunk_sizes,
            ChunkSizePolicy::FixedSet { sizes: vec![8, 16] }
        );
        assert_eq!(config.max_positions, DEFAULT_MAX_POSITIONS);
        assert_eq!(config.kinds, vec![TransformKind::Reverse]);
    }
}
