//! Randomized local search over transform parameters.
//!
//! # Trial
//! 1. Draw [`TransformParameters`] from the seeded [`Sampler`].
//! 2. Build `metadata ++ join(apply(split(buffer)))`.
//! 3. Compress it with the configured [`Codec`].
//! 4. Merge into [`SearchState`]: a strictly smaller result becomes the new
//!    best and resets the no-improvement counter, anything else bumps it.
//!
//! # Stopping
//! [`StopRules`] and the [`CancelToken`] are checked between trials only.
//! When the loop ends, the retained candidates are verified smallest first;
//! the first one that round-trips is returned. If none does the search fails.
//!
//! # Parallelism
//! With `workers > 1` the parameters for a batch of trials are drawn up front
//! in trial order, the batch is compressed on the rayon pool, and the results
//! are merged back in trial order. The search state is only ever touched by
//! the calling thread, and a run stopped by iteration or patience caps picks
//! the same winner as the sequential run with the same seed.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::prelude::*;

use crate::candidate::{CandidateResult, VerifiedCandidate};
use crate::codec::Codec;
use crate::config::SearchConfig;
use crate::error::{Error, Result};
use crate::format::MAX_ORIGINAL_SIZE;
use crate::pipeline;
use crate::sampler::{Draw, Sampler};
use crate::stop::{CancelToken, StopReason, StopRules};
use crate::transform::TransformParameters;
use crate::verify;

/// Mutable state of one search run.
///
/// Created when a run starts, updated once per trial, and consumed when the
/// winner is handed to verification.
#[derive(Debug)]
pub struct SearchState {
    /// Smallest candidates seen so far, best first.
    leaderboard: Vec<CandidateResult>,
    retain: usize,
    iterations_run: u64,
    consecutive_no_improvement: u64,
    started_at: Instant,
    improvements: Vec<(u64, usize)>,
}

impl SearchState {
    pub fn new(retain: usize) -> Self {
        Self {
            leaderboard: Vec::with_capacity(retain + 1),
            retain: retain.max(1),
            iterations_run: 0,
            consecutive_no_improvement: 0,
            started_at: Instant::now(),
            improvements: Vec::new(),
        }
    }

    pub fn best(&self) -> Option<&CandidateResult> {
        self.leaderboard.first()
    }

    pub fn iterations_run(&self) -> u64 {
        self.iterations_run
    }

    pub fn consecutive_no_improvement(&self) -> u64 {
        self.consecutive_no_improvement
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// `(trial, compressed size)` for every trial that became the new best,
    /// in the order they did. One entry per improvement, not per trial.
    pub fn improvements(&self) -> &[(u64, usize)] {
        &self.improvements
    }

    /// Merge one finished trial. `None` is a trial that produced no candidate.
    ///
    /// Returns `true` when the trial became the new best.
    pub fn record(&mut self, outcome: Option<CandidateResult>) -> bool {
        let improved = match outcome {
            Some(candidate) => {
                let size = candidate.compressed_size();
                let improved = self.best().map_or(true, |best| size < best.compressed_size());
                if improved {
                    self.improvements.push((candidate.trial, size));
                }
                self.retain_candidate(candidate);
                improved
            }
            None => false,
        };

        if improved {
            self.consecutive_no_improvement = 0;
        } else {
            self.consecutive_no_improvement += 1;
        }
        self.iterations_run += 1;
        improved
    }

    fn retain_candidate(&mut self, candidate: CandidateResult) {
        let at = self
            .leaderboard
            .iter()
            .position(|kept| candidate.ranks_before(kept))
            .unwrap_or(self.leaderboard.len());
        if at < self.retain {
            self.leaderboard.insert(at, candidate);
            self.leaderboard.truncate(self.retain);
        }
    }
}

/// Result of a successful search.
#[derive(Debug)]
pub struct SearchReport {
    pub best: VerifiedCandidate,
    pub stop_reason: StopReason,
    pub iterations: u64,
    pub elapsed: Duration,
    /// `(trial, compressed size)` per improvement; the last entry is the
    /// best unverified candidate.
    pub improvements: Vec<(u64, usize)>,
    /// Trials whose candidates failed verification before `best` passed.
    pub rejected: Vec<u64>,
}

/// Drives trials against one codec with one configuration.
pub struct SearchOptimizer {
    codec: Arc<dyn Codec>,
    config: SearchConfig,
    rules: StopRules,
    cancel: CancelToken,
}

impl SearchOptimizer {
    pub fn new(codec: Arc<dyn Codec>, config: SearchConfig) -> Result<Self> {
        config.validate()?;
        let rules = StopRules::from_config(&config);
        Ok(Self {
            codec,
            config,
            rules,
            cancel: CancelToken::new(),
        })
    }

    /// Share an externally owned cancellation flag with this optimizer.
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Search for the transform that compresses `buffer` smallest.
    pub fn run(&self, buffer: &[u8]) -> Result<SearchReport> {
        if buffer.is_empty() {
            return Err(Error::InvalidParameter("cannot search an empty input".into()));
        }
        if buffer.len() as u64 > MAX_ORIGINAL_SIZE {
            return Err(Error::InvalidParameter(format!(
                "input of {} bytes exceeds the {} byte ceiling",
                buffer.len(),
                MAX_ORIGINAL_SIZE
            )));
        }

        let mut sampler = Sampler::new(&self.config, buffer.len());
        let mut state = SearchState::new(self.config.retain_candidates);

        log::info!(
            "search start: {} bytes, codec {}, policy {:?}, seed {}, workers {}",
            buffer.len(),
            self.codec.name(),
            self.config.chunk_sizes,
            self.config.seed,
            self.config.workers
        );
        if let Some(n) = sampler.sweep_len() {
            log::info!("sweeping {} chunk sizes", n);
        }

        let stop_reason = self.search_loop(buffer, &mut sampler, &mut state);

        log::info!(
            "search stopped ({}) after {} trials in {:.2?}; best {} bytes",
            stop_reason,
            state.iterations_run(),
            state.elapsed(),
            state.best().map_or(0, |b| b.compressed_size())
        );

        self.accept(buffer, state, stop_reason)
    }

    fn search_loop(
        &self,
        buffer: &[u8],
        sampler: &mut Sampler,
        state: &mut SearchState,
    ) -> StopReason {
        let batch_size = self.config.workers.max(1);
        loop {
            if let Some(reason) = self.should_stop(state) {
                return reason;
            }

            let first_trial = state.iterations_run();
            let mut batch: Vec<Result<TransformParameters>> = Vec::with_capacity(batch_size);
            let mut sweep_done = false;
            for _ in 0..batch_size {
                match sampler.draw() {
                    Draw::Params(params) => batch.push(Ok(params)),
                    Draw::Invalid(err) => batch.push(Err(err)),
                    Draw::Exhausted => {
                        sweep_done = true;
                        break;
                    }
                }
            }

            let outcomes: Vec<Option<CandidateResult>> = if batch_size > 1 {
                batch
                    .into_par_iter()
                    .enumerate()
                    .map(|(i, draw)| self.evaluate(buffer, first_trial + i as u64, draw))
                    .collect()
            } else {
                batch
                    .into_iter()
                    .enumerate()
                    .map(|(i, draw)| self.evaluate(buffer, first_trial + i as u64, draw))
                    .collect()
            };

            for outcome in outcomes {
                let trial = state.iterations_run();
                if state.record(outcome) {
                    log::info!(
                        "trial {}: new best {} bytes",
                        trial,
                        state.best().map_or(0, |b| b.compressed_size())
                    );
                }
                if let Some(reason) = self.should_stop(state) {
                    return reason;
                }
            }

            if sweep_done {
                return StopReason::Exhausted;
            }
        }
    }

    fn should_stop(&self, state: &SearchState) -> Option<StopReason> {
        if self.cancel.is_cancelled() {
            return Some(StopReason::Cancelled);
        }
        self.rules.check(state)
    }

    /// Run one trial. Failures are logged and yield no candidate.
    fn evaluate(
        &self,
        buffer: &[u8],
        trial: u64,
        draw: Result<TransformParameters>,
    ) -> Option<CandidateResult> {
        let params = match draw {
            Ok(params) => params,
            Err(err) => {
                log::debug!("trial {}: no valid parameters ({})", trial, err);
                return None;
            }
        };

        let started = Instant::now();
        let compressed = pipeline::forward(buffer, &params).and_then(|p| self.codec.compress(&p));
        match compressed {
            Ok(compressed_bytes) => {
                log::debug!(
                    "trial {}: chunk_size {} kind {} positions {} -> {} bytes in {:.2?}",
                    trial,
                    params.chunk_size,
                    params.kind,
                    params.positions().len(),
                    compressed_bytes.len(),
                    started.elapsed()
                );
                Some(CandidateResult {
                    trial,
                    params,
                    compressed_bytes,
                })
            }
            Err(err) => {
                log::warn!("trial {}: {}", trial, err);
                None
            }
        }
    }

    fn accept(
        &self,
        buffer: &[u8],
        state: SearchState,
        stop_reason: StopReason,
    ) -> Result<SearchReport> {
        let iterations = state.iterations_run;
        let elapsed = state.elapsed();
        let improvements = state.improvements;
        let mut rejected = Vec::new();

        for candidate in state.leaderboard {
            let trial = candidate.trial;
            match verify::verify(buffer, candidate, self.codec.as_ref()) {
                Ok(best) => {
                    if !rejected.is_empty() {
                        log::warn!(
                            "accepted trial {} after rejecting {} candidate(s)",
                            trial,
                            rejected.len()
                        );
                    }
                    return Ok(SearchReport {
                        best,
                        stop_reason,
                        iterations,
                        elapsed,
                        improvements,
                        rejected,
                    });
                }
                Err(err) => {
                    log::warn!("trial {} rejected by verification: {}", trial, err);
                    rejected.push(trial);
                }
            }
        }

        let reason = if rejected.is_empty() {
            format!("no trial produced a candidate ({})", stop_reason)
        } else {
            format!("all {} retained candidates failed verification", rejected.len())
        };
        Err(Error::SearchFailed { iterations, reason })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChunkSizePolicy;
    use crate::transform::TransformKind;

    /// Stores bytes as-is; size is a direct function of the metadata length.
    struct Identity;

    impl Codec for Identity {
        fn name(&self) -> &'static str {
            "identity"
        }
        fn compress(&self, raw: &[u8]) -> Result<Vec<u8>> {
            Ok(raw.to_vec())
        }
        fn decompress(&self, compressed: &[u8]) -> Result<Vec<u8>> {
            Ok(compressed.to_vec())
        }
    }

    /// Corrupts the leading byte on the way back.
    struct Lossy;

    impl Codec for Lossy {
        fn name(&self) -> &'static str {
            "lossy"
        }
        fn compress(&self, raw: &[u8]) -> Result<Vec<u8>> {
            Ok(raw.to_vec())
        }
        fn decompress(&self, compressed: &[u8]) -> Result<Vec<u8>> {
            let mut out = compressed.to_vec();
            if let Some(b) = out.first_mut() {
                *b ^= 0xFF;
            }
            Ok(out)
        }
    }

    fn candidate(trial: u64, size: usize) -> CandidateResult {
        CandidateResult {
            trial,
            params: TransformParameters::new(1, vec![], TransformKind::Reverse),
            compressed_bytes: vec![0; size],
        }
    }

    #[test]
    fn state_tracks_improvement_and_ties() {
        let mut state = SearchState::new(2);
        assert!(state.record(Some(candidate(0, 100))));
        assert!(!state.record(Some(candidate(1, 100))));
        assert!(!state.record(None));
        assert_eq!(state.consecutive_no_improvement(), 2);
        assert_eq!(state.best().unwrap().trial, 0);

        assert!(state.record(Some(candidate(3, 90))));
        assert_eq!(state.consecutive_no_improvement(), 0);
        assert_eq!(state.iterations_run(), 4);
        assert_eq!(state.improvements(), &[(0, 100), (3, 90)]);

        let kept: Vec<u64> = state.leaderboard.iter().map(|c| c.trial).collect();
        assert_eq!(kept, vec![3, 0]);
    }

    #[test]
    fn stop_rules_fire_on_their_caps() {
        use crate::stop::StopRule;

        let mut state = SearchState::new(1);
        state.record(Some(candidate(0, 10)));
        state.record(None);
        state.record(None);

        assert_eq!(StopRule::MaxIterations(3).check(&state), Some(StopReason::Exhausted));
        assert_eq!(StopRule::MaxIterations(4).check(&state), None);
        assert_eq!(StopRule::Patience(2).check(&state), Some(StopReason::Converged));
        assert_eq!(StopRule::Patience(3).check(&state), None);
        assert_eq!(
            StopRule::TimeBudget(Duration::ZERO).check(&state),
            Some(StopReason::TimedOut)
        );

        let rules = StopRules::new(vec![StopRule::MaxIterations(100), StopRule::Patience(2)]);
        assert_eq!(rules.check(&state), Some(StopReason::Converged));
    }

    #[test]
    fn identical_sizes_keep_the_first_trial() {
        let config = SearchConfig {
            chunk_sizes: ChunkSizePolicy::FixedSet { sizes: vec![16] },
            max_positions: 0,
            max_iterations: None,
            patience: Some(3),
            ..SearchConfig::default()
        };
        let optimizer = SearchOptimizer::new(Arc::new(Identity), config).unwrap();
        let report = optimizer.run(&[7u8; 256]).unwrap();
        assert_eq!(report.stop_reason, StopReason::Converged);
        assert_eq!(report.iterations, 4);
        assert_eq!(report.best.trial(), 0);
    }

    #[test]
    fn lossy_backend_fails_the_search() {
        let config = SearchConfig {
            max_iterations: Some(5),
            ..SearchConfig::default()
        };
        let optimizer = SearchOptimizer::new(Arc::new(Lossy), config).unwrap();
        match optimizer.run(b"some input that will not survive the trip") {
            Err(Error::SearchFailed { iterations, .. }) => assert_eq!(iterations, 5),
            other => panic!("expected SearchFailed, got {:?}", other),
        }
    }

    #[test]
    fn cancelled_before_start_runs_no_trials() {
        let optimizer =
            SearchOptimizer::new(Arc::new(Identity), SearchConfig::default()).unwrap();
        optimizer.cancel_token().cancel();
        match optimizer.run(b"abcdef") {
            Err(Error::SearchFailed { iterations, .. }) => assert_eq!(iterations, 0),
            other => panic!("expected SearchFailed, got {:?}", other),
        }
    }

    #[test]
    fn unusable_sizes_fail_without_looping() {
        let config = SearchConfig {
            chunk_sizes: ChunkSizePolicy::FixedSet { sizes: vec![1024] },
            max_iterations: Some(3),
            patience: None,
            ..SearchConfig::default()
        };
        let optimizer = SearchOptimizer::new(Arc::new(Identity), config).unwrap();
        assert!(matches!(
            optimizer.run(b"tiny"),
            Err(Error::SearchFailed { iterations: 3, .. })
        ));
    }

    #[test]
    fn empty_input_is_invalid() {
        let optimizer =
            SearchOptimizer::new(Arc::new(Identity), SearchConfig::default()).unwrap();
        assert!(matches!(optimizer.run(&[]), Err(Error::InvalidParameter(_))));
    }
}
