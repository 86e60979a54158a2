use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::constraints::{build_constraints, ConstraintOptions};
use super::objective::build_separable_objective;
use super::traits::{Attempt, PricingContext, PricingStrategy, StrategyKind, StrategyOutcome};
use super::PricingError;
use crate::oracle::{ConstraintSolver, LinExpr, Model, ObjectiveSense, OracleError, Outcome, VarId};

/// Relative objective change below which polishing stops.
const POLISH_TOLERANCE: f64 = 1e-7;

/// Minimise total system cost subject to every constraint, prices bounded.
///
/// The oracle may only be able to optimise a relaxation of the bilinear
/// route-flow times price terms. When the model it returns reports a gap to
/// the relaxation, the incumbent is polished: prices are held at their
/// current values and the flows re-optimised, then route flows are held and
/// the prices re-optimised, for up to `polish_rounds` rounds or until a
/// round stops improving. Each half of a round is exact for the oracle, so
/// the committed objective never exceeds the best assignment seen.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectOptimization;

impl DirectOptimization {
    fn run(
        &self,
        ctx: &PricingContext<'_>,
        solver: &mut dyn ConstraintSolver,
    ) -> Result<StrategyOutcome, PricingError> {
        let deadline = Instant::now() + ctx.config.direct_timeout();
        let options = ConstraintOptions::from_config(ctx.config, true);
        build_constraints(ctx.routes, ctx.variables, ctx.demands, &options, solver)?;
        let objective = build_separable_objective(ctx.routes, ctx.variables)?;
        solver.set_objective(ObjectiveSense::Minimise, objective);

        let outcome = match solver.check_sat(Some(ctx.config.direct_timeout())) {
            Ok(outcome) => outcome,
            Err(OracleError::ScopeUnderflow) => return Err(OracleError::ScopeUnderflow.into()),
            Err(e) => {
                warn!(error = %e, "direct optimization backend error");
                return Ok(StrategyOutcome::failed(e.to_string()));
            }
        };

        let model = match (outcome, solver.current_model()) {
            (Outcome::Sat, Some(model)) => model.clone(),
            (Outcome::Sat, None) => {
                return Ok(StrategyOutcome::failed(
                    "oracle reported sat without a model",
                ))
            }
            (outcome, _) => {
                return Ok(StrategyOutcome::failed(format!(
                    "direct optimization returned {outcome}"
                )))
            }
        };

        let model = if needs_polish(&model) {
            self.polish(ctx, solver, model, deadline)?
        } else {
            model
        };
        debug!(objective = ?model.objective(), "direct optimization succeeded");
        Ok(StrategyOutcome::Solved(Attempt {
            strategy: StrategyKind::Direct,
            model,
            variables: ctx.variables.clone(),
            committed_price: None,
            trials: Vec::new(),
        }))
    }

    fn polish(
        &self,
        ctx: &PricingContext<'_>,
        solver: &mut dyn ConstraintSolver,
        mut best: Model,
        deadline: Instant,
    ) -> Result<Model, PricingError> {
        let prices: Vec<VarId> = ctx
            .variables
            .unknown_prices()
            .into_iter()
            .map(|(_, var)| var)
            .collect();
        let variables = ctx.variables;
        let route_flows: Vec<VarId> = (0..variables.num_demands())
            .flat_map(|i| variables.route_flows(i).iter().filter_map(|q| q.var()))
            .collect();

        for round in 0..ctx.config.polish_rounds {
            let mut improved = false;
            for held in [&prices, &route_flows] {
                if held.is_empty() {
                    continue;
                }
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    debug!(round, "direct budget spent while polishing");
                    return Ok(best);
                }
                let Some(candidate) = resolve_holding(solver, &best, held, remaining)? else {
                    continue;
                };
                if improves(&candidate, &best) {
                    best = candidate;
                    improved = true;
                }
            }
            debug!(round, objective = ?best.objective(), improved, "polish round");
            if !improved {
                break;
            }
        }
        Ok(best)
    }
}

fn needs_polish(model: &Model) -> bool {
    match (model.gap(), model.objective()) {
        (Some(gap), Some(objective)) => gap > POLISH_TOLERANCE * (1.0 + objective.abs()),
        _ => false,
    }
}

fn improves(candidate: &Model, incumbent: &Model) -> bool {
    match (candidate.objective(), incumbent.objective()) {
        (Some(new), Some(old)) => new < old - POLISH_TOLERANCE * (1.0 + old.abs()),
        _ => false,
    }
}

/// Re-solve in a nested scope with every `held` unknown boxed tightly around
/// its value in `incumbent`. `None` when that problem has no answer in time.
fn resolve_holding(
    solver: &mut dyn ConstraintSolver,
    incumbent: &Model,
    held: &[VarId],
    budget: Duration,
) -> Result<Option<Model>, PricingError> {
    solver.push_scope();
    for &var in held {
        let Some(value) = incumbent.value(var) else {
            continue;
        };
        // tolerance box, not an equality
        let slack = POLISH_TOLERANCE * (1.0 + value.abs());
        solver.add_constraint(LinExpr::var(var).geq(value - slack).into());
        solver.add_constraint(LinExpr::var(var).leq(value + slack).into());
    }
    let result = solver.check_sat(Some(budget));
    let candidate = match result {
        Ok(Outcome::Sat) => solver.current_model().cloned(),
        Ok(_) => None,
        Err(OracleError::ScopeUnderflow) => {
            solver.pop_scope()?;
            return Err(OracleError::ScopeUnderflow.into());
        }
        Err(e) => {
            warn!(error = %e, "polish solve failed");
            None
        }
    };
    solver.pop_scope()?;
    Ok(candidate)
}

impl PricingStrategy for DirectOptimization {
    fn id(&self) -> &str {
        StrategyKind::Direct.as_str()
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::Direct
    }

    fn attempt(
        &self,
        ctx: &PricingContext<'_>,
        solver: &mut dyn ConstraintSolver,
    ) -> Result<StrategyOutcome, PricingError> {
        solver.push_scope();
        let result = self.run(ctx, solver);
        solver.pop_scope()?;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::{build_variables, enumerate_routes, PricingConfig};
    use crate::test_utils::{two_mode_network, Response, ScriptedOracle};
    use std::time::Duration;
    use wardrop_core::Demand;

    #[test]
    fn test_direct_checks_with_objective_and_price_bounds() {
        let mut network = two_mode_network();
        let demands = vec![Demand::new("A", "B", 10.0)];
        let routes = enumerate_routes(&mut network, &demands, 3, 8).unwrap();
        let mut oracle = ScriptedOracle::new(vec![Response::Sat(vec![])]);
        let variables = build_variables(&network, &routes, &demands, &mut oracle).unwrap();
        let config = PricingConfig::default();
        let ctx = PricingContext {
            routes: &routes,
            demands: &demands,
            variables: &variables,
            config: &config,
        };

        let outcome = DirectOptimization.attempt(&ctx, &mut oracle).unwrap();
        assert!(outcome.is_solved());

        // exact answers are not polished
        assert_eq!(oracle.checks().len(), 1);
        let check = &oracle.checks()[0];
        assert!(check.has_objective);
        assert_eq!(check.depth, 1);
        assert_eq!(check.timeout, Some(Duration::from_millis(2_000)));
        // two bounds on the single unknown price
        assert!(check.constraints >= 2);
        assert_eq!(oracle.depth(), 0);
        assert_eq!(oracle.num_constraints(), 0);
    }

    #[test]
    fn test_direct_falls_through_on_unsat_timeout_and_errors() {
        let mut network = two_mode_network();
        let demands = vec![Demand::new("A", "B", 10.0)];
        let routes = enumerate_routes(&mut network, &demands, 3, 8).unwrap();
        let mut oracle = ScriptedOracle::new(vec![
            Response::Unsat,
            Response::Timeout,
            Response::Error("boom".to_string()),
        ]);
        let variables = build_variables(&network, &routes, &demands, &mut oracle).unwrap();
        let config = PricingConfig::default();
        let ctx = PricingContext {
            routes: &routes,
            demands: &demands,
            variables: &variables,
            config: &config,
        };

        for expected in ["unsat", "timeout", "boom"] {
            match DirectOptimization.attempt(&ctx, &mut oracle).unwrap() {
                StrategyOutcome::Failed { reason, trials } => {
                    assert!(reason.contains(expected), "{reason}");
                    assert!(trials.is_empty());
                }
                StrategyOutcome::Solved(_) => panic!("expected failure"),
            }
            assert_eq!(oracle.depth(), 0);
        }
    }
}
