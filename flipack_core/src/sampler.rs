use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};

use crate::chunker::chunk_count_for;
use crate::config::{ChunkSizePolicy, SearchConfig};
use crate::error::{Error, Result};
use crate::transform::{TransformKind, TransformParameters};

/// How many times one trial redraws after an `InvalidParameter` sample.
pub const MAX_RESAMPLE_ATTEMPTS: usize = 32;

/// Outcome of asking the sampler for the next trial's parameters.
#[derive(Debug)]
pub enum Draw {
    Params(TransformParameters),
    /// Every redraw was invalid; carries the last rejection.
    Invalid(Error),
    /// A sweep has visited every chunk size.
    Exhausted,
}

/// Seeded source of trial parameters for one input length.
///
/// The same seed, configuration and input length always produce the same
/// sequence of draws.
pub struct Sampler {
    rng: StdRng,
    policy: ChunkSizePolicy,
    kinds: Vec<TransformKind>,
    max_positions: u32,
    input_len: usize,
    sweep: Vec<u32>,
    sweep_cursor: usize,
}

impl Sampler {
    pub fn new(config: &SearchConfig, input_len: usize) -> Self {
        let sweep = match &config.chunk_sizes {
            ChunkSizePolicy::Sweep { min, max, step } => {
                let hi = (*max as usize).min(input_len) as u32;
                (*min..=hi).step_by(*step as usize).collect()
            }
            _ => Vec::new(),
        };
        Self {
            rng: StdRng::seed_from_u64(config.seed),
            policy: config.chunk_sizes.clone(),
            kinds: config.kinds.clone(),
            max_positions: config.max_positions,
            input_len,
            sweep,
            sweep_cursor: 0,
        }
    }

    /// Number of distinct chunk sizes a sweep will visit; `None` for random policies.
    pub fn sweep_len(&self) -> Option<usize> {
        match self.policy {
            ChunkSizePolicy::Sweep { .. } => Some(self.sweep.len()),
            _ => None,
        }
    }

    /// Draw parameters for the next trial, redrawing invalid samples.
    pub fn draw(&mut self) -> Draw {
        let mut last_err = None;
        for _ in 0..MAX_RESAMPLE_ATTEMPTS {
            match self.sample_once() {
                None => return Draw::Exhausted,
                Some(Ok(params)) => return Draw::Params(params),
                Some(Err(err)) => {
                    log::trace!("resampling after rejected draw: {}", err);
                    last_err = Some(err);
                }
            }
        }
        Draw::Invalid(last_err.unwrap_or_else(|| {
            Error::InvalidParameter("no valid parameters could be drawn".into())
        }))
    }

    fn sample_once(&mut self) -> Option<Result<TransformParameters>> {
        let chunk_size = self.sample_chunk_size()?;
        let kind = self.kinds[self.rng.random_range(0..self.kinds.len())];

        // A size that doesn't fit still consumes its draw so that the
        // sequence of draws doesn't depend on which samples were rejected.
        let chunk_count = chunk_count_for(self.input_len, chunk_size as usize);
        let cap = (self.max_positions as usize).min(chunk_count);
        let amount = self.rng.random_range(0..=cap);
        let positions: Vec<u32> = index::sample(&mut self.rng, chunk_count.max(1), amount)
            .into_iter()
            .map(|i| i as u32)
            .collect();

        let params = TransformParameters::new(chunk_size, positions, kind);
        Some(params.validate(self.input_len).map(|_| params))
    }

    fn sample_chunk_size(&mut self) -> Option<u32> {
        let len = u32::try_from(self.input_len).unwrap_or(u32::MAX);
        match &self.policy {
            ChunkSizePolicy::Uniform { min, max } => {
                let lo = (*min).min(len).max(1);
                let hi = (*max).min(len).max(lo);
                Some(self.rng.random_range(lo..=hi))
            }
            ChunkSizePolicy::FixedSet { sizes } => {
                Some(sizes[self.rng.random_range(0..sizes.len())])
            }
            ChunkSizePolicy::Sweep { .. } => {
                let size = self.sweep.get(self.sweep_cursor).copied()?;
                self.sweep_cursor += 1;
                Some(size)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params_of(draw: Draw) -> TransformParameters {
        match draw {
            Draw::Params(p) => p,
            other => panic!("expected parameters, got {:?}", other),
        }
    }

    #[test]
    fn same_seed_same_sequence() {
        let config = SearchConfig::default();
        let mut a = Sampler::new(&config, 10_000);
        let mut b = Sampler::new(&config, 10_000);
        for _ in 0..50 {
            assert_eq!(params_of(a.draw()), params_of(b.draw()));
        }
    }

    #[test]
    fn draws_respect_bounds() {
        let config = SearchConfig {
            chunk_sizes: ChunkSizePolicy::Uniform { min: 4, max: 64 },
            max_positions: 5,
            kinds: vec![TransformKind::Reverse, TransformKind::XorMask(1)],
            ..SearchConfig::default()
        };
        let mut sampler = Sampler::new(&config, 1000);
        for _ in 0..200 {
            let p = params_of(sampler.draw());
            assert!((4..=64).contains(&p.chunk_size));
            assert!(p.positions().len() <= 5);
            assert!(p.validate(1000).is_ok());
            assert!(p.positions().windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn uniform_range_is_clamped_to_input() {
        let config = SearchConfig {
            chunk_sizes: ChunkSizePolicy::Uniform { min: 16, max: 4096 },
            ..SearchConfig::default()
        };
        let mut sampler = Sampler::new(&config, 10);
        for _ in 0..20 {
            assert_eq!(params_of(sampler.draw()).chunk_size, 10);
        }
    }

    #[test]
    fn oversized_fixed_sizes_are_invalid() {
        let config = SearchConfig {
            chunk_sizes: ChunkSizePolicy::FixedSet { sizes: vec![64] },
            ..SearchConfig::default()
        };
        let mut sampler = Sampler::new(&config, 10);
        assert!(matches!(sampler.draw(), Draw::Invalid(Error::InvalidParameter(_))));
    }

    #[test]
    fn sweep_visits_each_size_once_then_exhausts() {
        let config = SearchConfig {
            chunk_sizes: ChunkSizePolicy::Sweep { min: 2, max: 100, step: 3 },
            ..SearchConfig::default()
        };
        let mut sampler = Sampler::new(&config, 11);
        assert_eq!(sampler.sweep_len(), Some(4));
        let sizes: Vec<u32> = (0..4).map(|_| params_of(sampler.draw()).chunk_size).collect();
        assert_eq!(sizes, vec![2, 5, 8, 11]);
        assert!(matches!(sampler.draw(), Draw::Exhausted));
    }
}
