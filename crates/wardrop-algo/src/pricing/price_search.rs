//! Monotonic price search.
//!
//! Every unknown price gets the same value `p`, descending from `price_max`
//! to `price_min`. Each rung is a pure feasibility check without objective or
//! price bounds. The last satisfiable rung before the first failure wins, so
//! the committed price is the lowest one that still admits an equilibrium.

use tracing::{debug, info, warn};

use super::constraints::{build_constraints, ConstraintOptions};
use super::traits::{
    Attempt, PriceTrial, PricingContext, PricingStrategy, StrategyKind, StrategyOutcome,
};
use super::variables::{Quantity, VariableModel};
use super::PricingError;
use crate::oracle::{ConstraintSolver, Model, OracleError, Outcome};

#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicPriceSearch;

/// Replace route flows of demands whose routes are all fully priced by a
/// split proportional to route price. Returns how many demands were split.
pub fn split_fixed_price_demands(ctx: &PricingContext<'_>, variables: &mut VariableModel) -> usize {
    let mut split = 0;
    for ((i, candidates), demand) in ctx.routes.iter().zip(ctx.demands) {
        if candidates.is_empty() || !candidates.iter().all(|r| variables.route_fully_priced(r)) {
            continue;
        }
        let prices: Vec<f64> = candidates.iter().map(|r| variables.route_price(r)).collect();
        let total: f64 = prices.iter().sum();
        for (j, price) in prices.iter().enumerate() {
            let share = if total == 0.0 {
                demand.d / candidates.len() as f64
            } else {
                price / total * demand.d
            };
            variables.set_route_flow(i, j, Quantity::Known(share));
        }
        split += 1;
    }
    split
}

impl MonotonicPriceSearch {
    fn trial(
        &self,
        ctx: &PricingContext<'_>,
        variables: &VariableModel,
        solver: &mut dyn ConstraintSolver,
    ) -> Result<(Outcome, Option<Model>), PricingError> {
        let options = ConstraintOptions::from_config(ctx.config, false);
        build_constraints(ctx.routes, variables, ctx.demands, &options, solver)?;
        match solver.check_sat(Some(ctx.config.trial_timeout())) {
            Ok(outcome) => Ok((outcome, solver.current_model().cloned())),
            Err(OracleError::ScopeUnderflow) => Err(OracleError::ScopeUnderflow.into()),
            Err(e) => {
                warn!(error = %e, "price trial backend error");
                Ok((Outcome::Unsat, None))
            }
        }
    }
}

impl PricingStrategy for MonotonicPriceSearch {
    fn id(&self) -> &str {
        StrategyKind::PriceSearch.as_str()
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::PriceSearch
    }

    fn attempt(
        &self,
        ctx: &PricingContext<'_>,
        solver: &mut dyn ConstraintSolver,
    ) -> Result<StrategyOutcome, PricingError> {
        let mut working = ctx.variables.clone();
        let split = split_fixed_price_demands(ctx, &mut working);
        if split > 0 {
            debug!(demands = split, "split fixed-price demands proportionally");
        }

        let ladder: Vec<Option<f64>> = if working.has_unknown_prices() {
            ctx.config.price_ladder().into_iter().map(Some).collect()
        } else {
            vec![None]
        };

        let mut trials = Vec::new();
        let mut best: Option<(Option<f64>, Model, VariableModel)> = None;
        for price in ladder {
            let mut candidate = working.clone();
            if let Some(p) = price {
                candidate.fix_unknown_prices(p);
            }

            solver.push_scope();
            let result = self.trial(ctx, &candidate, solver);
            solver.pop_scope()?;
            let (outcome, model) = result?;

            debug!(price = ?price, outcome = %outcome, "price trial");
            trials.push(PriceTrial { price, outcome });
            match (outcome, model) {
                (Outcome::Sat, Some(model)) => best = Some((price, model, candidate)),
                _ => break,
            }
        }

        match best {
            Some((price, model, variables)) => {
                info!(
                    price = ?price,
                    trials = trials.len(),
                    "price search committed"
                );
                Ok(StrategyOutcome::Solved(Attempt {
                    strategy: StrategyKind::PriceSearch,
                    model,
                    variables,
                    committed_price: price,
                    trials,
                }))
            }
            None => Ok(StrategyOutcome::Failed {
                reason: "no satisfiable price".to_string(),
                trials,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::{build_variables, enumerate_routes, PricingConfig, RouteSet};
    use crate::test_utils::{two_mode_network, Response, ScriptedOracle};
    use wardrop_core::{Demand, Network, TransitEdge};

    struct Fixture {
        routes: RouteSet,
        demands: Vec<Demand>,
        variables: VariableModel,
        config: PricingConfig,
    }

    impl Fixture {
        fn new(mut network: Network, demands: Vec<Demand>, oracle: &mut ScriptedOracle) -> Self {
            let routes = enumerate_routes(&mut network, &demands, 3, 8).unwrap();
            let variables = build_variables(&network, &routes, &demands, oracle).unwrap();
            Self {
                routes,
                demands,
                variables,
                config: PricingConfig::default(),
            }
        }

        fn ctx(&self) -> PricingContext<'_> {
            PricingContext {
                routes: &self.routes,
                demands: &self.demands,
                variables: &self.variables,
                config: &self.config,
            }
        }
    }

    #[test]
    fn test_commits_last_satisfiable_price() {
        let mut oracle = ScriptedOracle::new(vec![
            Response::Sat(vec![]),
            Response::Sat(vec![]),
            Response::Sat(vec![]),
            Response::Unsat,
        ]);
        let fx = Fixture::new(two_mode_network(), vec![Demand::new("A", "B", 10.0)], &mut oracle);

        let StrategyOutcome::Solved(attempt) = MonotonicPriceSearch.attempt(&fx.ctx(), &mut oracle).unwrap()
        else {
            panic!("expected success");
        };
        let prices: Vec<Option<f64>> = attempt.trials.iter().map(|t| t.price).collect();
        assert_eq!(prices, vec![Some(120.0), Some(115.0), Some(110.0), Some(105.0)]);
        assert_eq!(attempt.committed_price, Some(110.0));
        assert!(!attempt.variables.has_unknown_prices());

        for check in oracle.checks() {
            assert!(!check.has_objective);
            assert_eq!(check.depth, 1);
        }
        assert_eq!(oracle.depth(), 0);
    }

    #[test]
    fn test_runs_to_price_floor_when_all_sat() {
        let mut oracle = ScriptedOracle::always(Response::Sat(vec![]));
        let fx = Fixture::new(two_mode_network(), vec![Demand::new("A", "B", 10.0)], &mut oracle);

        let StrategyOutcome::Solved(attempt) = MonotonicPriceSearch.attempt(&fx.ctx(), &mut oracle).unwrap()
        else {
            panic!("expected success");
        };
        assert_eq!(attempt.trials.len(), 24);
        assert_eq!(attempt.committed_price, Some(5.0));
    }

    #[test]
    fn test_fails_when_highest_price_unsat() {
        let mut oracle = ScriptedOracle::new(vec![Response::Unsat, Response::Sat(vec![])]);
        let fx = Fixture::new(two_mode_network(), vec![Demand::new("A", "B", 10.0)], &mut oracle);

        match MonotonicPriceSearch.attempt(&fx.ctx(), &mut oracle).unwrap() {
            StrategyOutcome::Failed { trials, .. } => {
                assert_eq!(trials.len(), 1);
                assert_eq!(trials[0].price, Some(120.0));
                assert_eq!(trials[0].outcome, Outcome::Unsat);
            }
            StrategyOutcome::Solved(_) => panic!("expected failure"),
        }
    }

    #[test]
    fn test_timeout_stops_search() {
        let mut oracle = ScriptedOracle::new(vec![Response::Sat(vec![]), Response::Timeout]);
        let fx = Fixture::new(two_mode_network(), vec![Demand::new("A", "B", 10.0)], &mut oracle);

        let StrategyOutcome::Solved(attempt) = MonotonicPriceSearch.attempt(&fx.ctx(), &mut oracle).unwrap()
        else {
            panic!("expected success");
        };
        assert_eq!(attempt.committed_price, Some(120.0));
        assert_eq!(attempt.trials[1].outcome, Outcome::Timeout);
    }

    #[test]
    fn test_single_trial_without_unknown_prices() {
        let mut network = Network::new();
        network
            .add_edge("A", "B", TransitEdge::new("Bus", 2.0).with_price(5.0))
            .unwrap();
        network
            .add_edge("A", "B", TransitEdge::new("red", 1.0).with_price(15.0))
            .unwrap();
        let mut oracle = ScriptedOracle::always(Response::Sat(vec![]));
        let fx = Fixture::new(network, vec![Demand::new("A", "B", 10.0)], &mut oracle);

        let StrategyOutcome::Solved(attempt) = MonotonicPriceSearch.attempt(&fx.ctx(), &mut oracle).unwrap()
        else {
            panic!("expected success");
        };
        assert_eq!(attempt.trials.len(), 1);
        assert_eq!(attempt.trials[0].price, None);
        assert_eq!(attempt.committed_price, None);

        // 5 / 20 and 15 / 20 of the demand
        assert_eq!(attempt.variables.route_flow(0, 0), Some(Quantity::Known(2.5)));
        assert_eq!(attempt.variables.route_flow(0, 1), Some(Quantity::Known(7.5)));
    }

    #[test]
    fn test_zero_price_routes_split_equally() {
        let mut network = Network::new();
        network
            .add_edge("A", "B", TransitEdge::new("Bus", 2.0).with_price(0.0))
            .unwrap();
        network
            .add_edge("A", "B", TransitEdge::new("red", 1.0).with_price(0.0))
            .unwrap();
        let mut oracle = ScriptedOracle::new(vec![]);
        let fx = Fixture::new(network, vec![Demand::new("A", "B", 10.0)], &mut oracle);

        let mut working = fx.variables.clone();
        assert_eq!(split_fixed_price_demands(&fx.ctx(), &mut working), 1);
        assert_eq!(working.route_flow(0, 0), Some(Quantity::Known(5.0)));
        assert_eq!(working.route_flow(0, 1), Some(Quantity::Known(5.0)));
    }

    #[test]
    fn test_demands_with_unknown_prices_keep_unknown_flows() {
        let mut oracle = ScriptedOracle::new(vec![]);
        let fx = Fixture::new(two_mode_network(), vec![Demand::new("A", "B", 10.0)], &mut oracle);
        let mut working = fx.variables.clone();
        assert_eq!(split_fixed_price_demands(&fx.ctx(), &mut working), 0);
        assert!(working.route_flows(0).iter().all(Quantity::is_unknown));
    }
}
