//! Stop predicates for the search loop.
//!
//! Rules are combined with logical OR and evaluated only between trials, so a
//! trial already in flight always runs to completion.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::SearchConfig;
use crate::search::SearchState;

/// Why a search stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The no-improvement cap was reached.
    Converged,
    /// The wall-clock budget ran out.
    TimedOut,
    /// The iteration cap was reached or a sweep covered its whole space.
    Exhausted,
    /// A [`CancelToken`] was triggered.
    Cancelled,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StopReason::Converged => "converged",
            StopReason::TimedOut => "timed out",
            StopReason::Exhausted => "exhausted",
            StopReason::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopRule {
    MaxIterations(u64),
    Patience(u64),
    TimeBudget(Duration),
}

impl StopRule {
    pub fn check(&self, state: &SearchState) -> Option<StopReason> {
        match *self {
            StopRule::MaxIterations(cap) if state.iterations_run() >= cap => {
                Some(StopReason::Exhausted)
            }
            StopRule::Patience(cap) if state.consecutive_no_improvement() >= cap => {
                Some(StopReason::Converged)
            }
            StopRule::TimeBudget(budget) if state.elapsed() >= budget => {
                Some(StopReason::TimedOut)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StopRules {
    rules: Vec<StopRule>,
}

impl StopRules {
    pub fn new(rules: Vec<StopRule>) -> Self {
        Self { rules }
    }

    pub fn from_config(config: &SearchConfig) -> Self {
        let mut rules = Vec::new();
        if let Some(cap) = config.max_iterations {
            rules.push(StopRule::MaxIterations(cap));
        }
        if let Some(cap) = config.patience {
            rules.push(StopRule::Patience(cap));
        }
        if let Some(budget) = config.time_budget() {
            rules.push(StopRule::TimeBudget(budget));
        }
        Self { rules }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// First rule that fires, in configuration order.
    pub fn check(&self, state: &SearchState) -> Option<StopReason> {
        self.rules.iter().find_map(|rule| rule.check(state))
    }
}

/// Cooperative cancellation flag shared between a search and its caller.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}
