use tracing::{info, warn};

use super::config::{DIRECT_STRATEGY, PRICE_SEARCH_STRATEGY};
use super::direct::DirectOptimization;
use super::price_search::MonotonicPriceSearch;
use super::traits::{Attempt, PriceTrial, PricingContext, PricingStrategy, StrategyKind, StrategyOutcome};
use super::PricingError;
use crate::oracle::ConstraintSolver;

/// Why one strategy of the chain gave up.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyFailure {
    pub strategy: StrategyKind,
    pub reason: String,
    pub trials: Vec<PriceTrial>,
}

/// Winning attempt plus the failures that preceded it.
#[derive(Debug, Clone)]
pub struct Selection {
    pub attempt: Attempt,
    pub failures: Vec<StrategyFailure>,
}

/// Ordered fallback chain of pricing strategies; the first success wins.
pub struct StrategySelector {
    strategies: Vec<Box<dyn PricingStrategy>>,
}

impl std::fmt::Debug for StrategySelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategySelector")
            .field("strategies", &self.ids())
            .finish()
    }
}

impl Default for StrategySelector {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl StrategySelector {
    /// Empty chain; add strategies with [`push`](Self::push).
    pub fn new() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }

    /// Direct optimization, then the price search.
    pub fn with_defaults() -> Self {
        let mut selector = Self::new();
        selector.push(Box::new(DirectOptimization));
        selector.push(Box::new(MonotonicPriceSearch));
        selector
    }

    /// Build a chain from strategy ids, in order.
    pub fn from_ids<S: AsRef<str>>(ids: &[S]) -> Result<Self, PricingError> {
        let mut selector = Self::new();
        for id in ids {
            match id.as_ref() {
                DIRECT_STRATEGY => selector.push(Box::new(DirectOptimization)),
                PRICE_SEARCH_STRATEGY => selector.push(Box::new(MonotonicPriceSearch)),
                other => {
                    return Err(PricingError::InvalidInput(format!(
                        "unknown strategy '{other}'"
                    )))
                }
            }
        }
        Ok(selector)
    }

    pub fn push(&mut self, strategy: Box<dyn PricingStrategy>) {
        self.strategies.push(strategy);
    }

    pub fn ids(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.id()).collect()
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Try each strategy in order.
    ///
    /// Fails with [`PricingError::InfeasibleAll`] only after every strategy
    /// has failed.
    pub fn select(
        &self,
        ctx: &PricingContext<'_>,
        solver: &mut dyn ConstraintSolver,
    ) -> Result<Selection, PricingError> {
        let mut failures = Vec::new();
        for strategy in &self.strategies {
            match strategy.attempt(ctx, solver)? {
                StrategyOutcome::Solved(attempt) => {
                    info!(strategy = strategy.id(), "pricing solved");
                    return Ok(Selection { attempt, failures });
                }
                StrategyOutcome::Failed { reason, trials } => {
                    warn!(strategy = strategy.id(), reason = %reason, "strategy failed");
                    failures.push(StrategyFailure {
                        strategy: strategy.kind(),
                        reason,
                        trials,
                    });
                }
            }
        }
        Err(PricingError::InfeasibleAll(failures))
    }
}
