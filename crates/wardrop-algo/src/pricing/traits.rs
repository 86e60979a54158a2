//! Strategy trait for the pricing fallback chain.

use std::fmt;
use wardrop_core::Demand;

use super::config::PricingConfig;
use super::routes::RouteSet;
use super::variables::VariableModel;
use super::PricingError;
use crate::oracle::{ConstraintSolver, Model, Outcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    /// Minimise total cost under all constraints in one oracle call
    Direct,
    /// Descend a uniform price until the constraints become infeasible
    PriceSearch,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Direct => super::config::DIRECT_STRATEGY,
            StrategyKind::PriceSearch => super::config::PRICE_SEARCH_STRATEGY,
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inputs shared by every strategy of one solve.
#[derive(Debug, Clone, Copy)]
pub struct PricingContext<'a> {
    pub routes: &'a RouteSet,
    pub demands: &'a [Demand],
    /// Unknowns declared for this solve; strategies work on copies
    pub variables: &'a VariableModel,
    pub config: &'a PricingConfig,
}

/// One feasibility check of the price search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceTrial {
    /// Uniform price given to every unknown price, `None` when there was none
    pub price: Option<f64>,
    pub outcome: Outcome,
}

/// A successful strategy run.
#[derive(Debug, Clone)]
pub struct Attempt {
    pub strategy: StrategyKind,
    pub model: Model,
    /// Variable model the model belongs to, with any values the strategy fixed
    pub variables: VariableModel,
    /// Uniform price committed to originally unknown prices
    pub committed_price: Option<f64>,
    pub trials: Vec<PriceTrial>,
}

#[derive(Debug, Clone)]
pub enum StrategyOutcome {
    Solved(Attempt),
    Failed {
        reason: String,
        trials: Vec<PriceTrial>,
    },
}

impl StrategyOutcome {
    pub fn failed(reason: impl Into<String>) -> Self {
        StrategyOutcome::Failed {
            reason: reason.into(),
            trials: Vec::new(),
        }
    }

    pub fn is_solved(&self) -> bool {
        matches!(self, StrategyOutcome::Solved(_))
    }
}

/// A way of solving the pricing problem against an oracle.
///
/// Strategies must leave the solver's scope depth as they found it.
pub trait PricingStrategy: Send + Sync {
    /// Unique identifier (e.g., "direct", "price-search")
    fn id(&self) -> &str;

    fn kind(&self) -> StrategyKind;

    /// Recoverable failures come back as [`StrategyOutcome::Failed`]; `Err`
    /// means the solver itself is in a bad state.
    fn attempt(
        &self,
        ctx: &PricingContext<'_>,
        solver: &mut dyn ConstraintSolver,
    ) -> Result<StrategyOutcome, PricingError>;
}
