//! Equilibrium pricing engine
//!
//! Computes congestion-dependent prices on a multi-modal network so that the
//! resulting flows form a Wardrop user equilibrium under capacity limits.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │  enumerate_routes ──▶ build_variables ──┬─▶ build_constraints        │
//! │                                         └─▶ build_objective          │
//! │                                                   │                  │
//! │                    StrategySelector  ◀────────────┘                  │
//! │                     1. DirectOptimization   (minimise F)             │
//! │                     2. MonotonicPriceSearch (p = 120, 115, ..., 5)   │
//! │                                                   │                  │
//! │                    extract_solution ──▶ apply_solution ──▶ Network   │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Formulation
//!
//! ```text
//! cost_R = Σ_{e∈R} (k_e·f_e + price_e)
//!
//! minimize    F = Σ_i Σ_R f_R · cost_R
//!
//! subject to:
//!   f_e = Σ_{R∋e} f_R                       flow conservation
//!   f_e ≤ capacity_e                         capacity
//!   Σ_R f_R = d_i                            demand satisfaction
//!   f_R ≥ 1  ⇒  |cost_R − T_i| ≤ 5           used routes share the minimum cost
//!   cost_R ≥ T_i                             no route is cheaper than T_i
//!   f_R ≥ 0,  5 ≤ price_e ≤ 120 (direct optimization only)
//! ```
//!
//! Under flow conservation `F` equals `Σ_e k_e·f_e² + Σ_R f_R · price_R`
//! ([`build_separable_objective`]), which is what direct optimization hands
//! to the oracle.
//!
//! The engine only talks to a [`ConstraintSolver`]; see [`crate::oracle`].

mod config;
mod constraints;
mod direct;
mod extract;
mod objective;
mod price_search;
mod routes;
mod selector;
mod traits;
mod variables;

pub use config::{PricingConfig, DIRECT_STRATEGY, PRICE_SEARCH_STRATEGY};
pub use constraints::{build_constraints, ConstraintFamily, ConstraintOptions, ConstraintSet};
pub use direct::DirectOptimization;
pub use extract::{apply_solution, extract_solution, EdgeResolution, Solution, ZERO_FLOW_EPSILON};
pub use objective::{build_objective, build_separable_objective};
pub use price_search::{split_fixed_price_demands, MonotonicPriceSearch};
pub use routes::{
    enumerate_routes, Route, RouteSet, SYNTHETIC_CAPACITY, SYNTHETIC_K, SYNTHETIC_PRICE,
};
pub use selector::{Selection, StrategyFailure, StrategySelector};
pub use traits::{
    Attempt, PriceTrial, PricingContext, PricingStrategy, StrategyKind, StrategyOutcome,
};
pub use variables::{build_variables, EdgeVars, Quantity, VariableModel};

use thiserror::Error;
use tracing::{debug, info};
use wardrop_core::{Demand, Network, NetworkError};

use crate::oracle::{ConstraintSolver, OracleError};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PricingError {
    /// Every strategy of the chain failed for this event
    #[error("no strategy found a feasible pricing ({})", describe_failures(.0))]
    InfeasibleAll(Vec<StrategyFailure>),

    #[error("oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("network error: {0}")]
    Network(#[from] NetworkError),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

fn describe_failures(failures: &[StrategyFailure]) -> String {
    if failures.is_empty() {
        return "no strategies configured".to_string();
    }
    failures
        .iter()
        .map(|f| format!("{}: {}", f.strategy, f.reason))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result of one solve, already applied to the network.
#[derive(Debug, Clone)]
pub struct PricingOutcome {
    pub routes: RouteSet,
    pub solution: Solution,
}

/// Runs the full pipeline for one edge-addition event.
#[derive(Debug)]
pub struct PricingEngine {
    config: PricingConfig,
    selector: StrategySelector,
}

impl PricingEngine {
    pub fn new(config: PricingConfig) -> Result<Self, PricingError> {
        config.validate()?;
        let selector = StrategySelector::from_ids(&config.strategies)?;
        Ok(Self { config, selector })
    }

    /// Use a custom strategy chain instead of `config.strategies`.
    pub fn with_selector(config: PricingConfig, selector: StrategySelector) -> Result<Self, PricingError> {
        config.validate()?;
        Ok(Self { config, selector })
    }

    pub fn config(&self) -> &PricingConfig {
        &self.config
    }

    pub fn selector(&self) -> &StrategySelector {
        &self.selector
    }

    /// Enumerate routes for `demands`, solve, and write the result onto `network`.
    ///
    /// On failure the network keeps its unknown prices; the only change is
    /// any synthetic personal edge added during enumeration.
    pub fn solve(
        &self,
        network: &mut Network,
        demands: &[Demand],
        solver: &mut dyn ConstraintSolver,
    ) -> Result<PricingOutcome, PricingError> {
        network.validate()?;
        let routes = enumerate_routes(
            network,
            demands,
            self.config.max_hops,
            self.config.max_routes_per_demand,
        )?;
        debug!(
            demands = demands.len(),
            routes = routes.total_routes(),
            unpriced = network.unpriced_edges().len(),
            "enumerated candidate routes"
        );

        solver.push_scope();
        let result = self.solve_routes(network, &routes, demands, solver);
        solver.pop_scope()?;
        let solution = result?;

        apply_solution(network, &solution)?;
        info!(
            strategy = %solution.strategy,
            objective = solution.objective,
            committed_price = ?solution.committed_price,
            "applied pricing"
        );
        Ok(PricingOutcome { routes, solution })
    }

    fn solve_routes(
        &self,
        network: &Network,
        routes: &RouteSet,
        demands: &[Demand],
        solver: &mut dyn ConstraintSolver,
    ) -> Result<Solution, PricingError> {
        let variables = build_variables(network, routes, demands, solver)?;
        let ctx = PricingContext {
            routes,
            demands,
            variables: &variables,
            config: &self.config,
        };
        let selection = self.selector.select(&ctx, solver)?;
        let objective = build_objective(routes, &selection.attempt.variables)?;
        let mut solution = extract_solution(network, routes, &selection.attempt, &objective)?;
        solution.failures = selection.failures;
        Ok(solution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{Response, ScriptedOracle};
    use wardrop_core::TransitEdge;

    #[test]
    fn test_engine_rejects_invalid_config() {
        let config = PricingConfig {
            strategies: vec![],
            ..PricingConfig::default()
        };
        assert!(matches!(
            PricingEngine::new(config),
            Err(PricingError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_failed_solve_leaves_prices_unknown() {
        let mut network = Network::new();
        network.add_edge("A", "B", TransitEdge::new("Bus", 2.0)).unwrap();
        let demands = vec![Demand::new("A", "B", 10.0)];
        let mut oracle = ScriptedOracle::new(vec![Response::Unsat, Response::Unsat]);
        let engine = PricingEngine::new(PricingConfig::default()).unwrap();

        let err = engine.solve(&mut network, &demands, &mut oracle).unwrap_err();
        assert!(err.to_string().contains("direct: direct optimization returned unsat"));
        assert_eq!(network.unpriced_edges().len(), 1);
        assert!(network.graph.edge_weights().all(|e| e.flow.is_none()));
        assert_eq!(oracle.depth(), 0);
        assert_eq!(oracle.num_vars(), 0);
    }

    #[test]
    fn test_failures_are_kept_on_solution() {
        let mut network = Network::new();
        network.add_edge("A", "B", TransitEdge::new("Bus", 2.0)).unwrap();
        let demands = vec![Demand::new("A", "B", 10.0)];
        let mut oracle = ScriptedOracle::new(vec![
            Response::Timeout,
            Response::Sat(vec![
                ("f_A-B-Bus-0".to_string(), 10.0),
                ("flow_0_0".to_string(), 10.0),
            ]),
            Response::Unsat,
        ]);
        let engine = PricingEngine::new(PricingConfig::default()).unwrap();

        let outcome = engine.solve(&mut network, &demands, &mut oracle).unwrap();
        let solution = outcome.solution;
        assert_eq!(solution.strategy, StrategyKind::PriceSearch);
        assert_eq!(solution.committed_price, Some(120.0));
        assert_eq!(solution.failures.len(), 1);
        assert_eq!(solution.failures[0].strategy, StrategyKind::Direct);

        let edge = network.edge_ids().next().unwrap();
        assert_eq!(network.edge(edge).unwrap().price, Some(120.0));
        assert_eq!(network.edge(edge).unwrap().flow, Some(10.0));
        // 10 · (2·10 + 120)
        assert!((solution.objective - 1400.0).abs() < 1e-9);
    }
}
