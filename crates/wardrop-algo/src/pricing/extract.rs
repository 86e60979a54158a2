//! Turn an oracle assignment into concrete flows and prices.

use serde::Serialize;
use wardrop_core::{EdgeId, Network};

use super::routes::RouteSet;
use super::selector::StrategyFailure;
use super::traits::{Attempt, PriceTrial, StrategyKind};
use super::variables::Quantity;
use super::PricingError;
use crate::oracle::QuadExpr;

/// Edge flows at or below this are treated as no traffic.
pub const ZERO_FLOW_EPSILON: f64 = 1e-6;

/// Resolved values of one edge.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeResolution {
    pub edge: EdgeId,
    pub flow: Option<f64>,
    /// `None` for an originally unpriced edge left unconstrained
    pub price: Option<f64>,
}

/// Outcome of one successful solve.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    /// `[demand][route]`
    pub route_flows: Vec<Vec<f64>>,
    pub edges: Vec<EdgeResolution>,
    pub objective: f64,
    pub strategy: StrategyKind,
    pub committed_price: Option<f64>,
    pub trials: Vec<PriceTrial>,
    /// Strategies that failed before the winning one
    pub failures: Vec<StrategyFailure>,
}

impl Solution {
    pub fn edge(&self, id: EdgeId) -> Option<&EdgeResolution> {
        self.edges.iter().find(|e| e.edge == id)
    }

    pub fn route_flow(&self, demand: usize, route: usize) -> Option<f64> {
        self.route_flows.get(demand)?.get(route).copied()
    }
}

/// Read route flows, edge flows and prices from a successful attempt.
///
/// Prices follow one rule for every strategy: a price set in the input is
/// kept, and an originally unknown price is resolved only on an edge that
/// carries flow above [`ZERO_FLOW_EPSILON`]. An unused edge keeps `None`,
/// also after a price search committed a uniform price to every unknown; that
/// committed value stays available as [`Solution::committed_price`]. Revenue
/// therefore only counts edges that were actually priced for their riders.
///
/// `objective` must be built from `attempt.variables` so constants fixed by
/// the strategy are part of it.
pub fn extract_solution(
    network: &Network,
    routes: &RouteSet,
    attempt: &Attempt,
    objective: &QuadExpr,
) -> Result<Solution, PricingError> {
    let model = &attempt.model;
    let variables = &attempt.variables;

    let mut route_flows = Vec::with_capacity(routes.num_demands());
    for (i, candidates) in routes.iter() {
        let mut flows = Vec::with_capacity(candidates.len());
        for j in 0..candidates.len() {
            let value = variables
                .route_flow(i, j)
                .and_then(|q| q.resolve(model))
                .ok_or_else(|| {
                    PricingError::InvalidInput(format!(
                        "model has no value for route {j} of demand {i}"
                    ))
                })?;
            flows.push(value.max(0.0));
        }
        route_flows.push(flows);
    }

    let mut edges = Vec::new();
    for id in network.edge_ids() {
        let Some(edge) = network.edge(id) else {
            continue;
        };
        let Some(vars) = variables.edge(id) else {
            edges.push(EdgeResolution {
                edge: id,
                flow: edge.flow,
                price: edge.price,
            });
            continue;
        };
        let flow = model.value(vars.flow).map(|f| f.max(0.0));
        let price = match edge.price {
            Some(price) => Some(price),
            None => {
                let carries_traffic = flow.is_some_and(|f| f > ZERO_FLOW_EPSILON);
                match vars.price {
                    _ if !carries_traffic => None,
                    Quantity::Known(price) => Some(price),
                    Quantity::Unknown(var) => model.value(var),
                }
            }
        };
        edges.push(EdgeResolution {
            edge: id,
            flow,
            price,
        });
    }

    let objective = objective
        .evaluate(|var| model.value(var))
        .or(model.objective())
        .ok_or_else(|| PricingError::InvalidInput("objective not covered by model".to_string()))?;

    Ok(Solution {
        route_flows,
        edges,
        objective,
        strategy: attempt.strategy,
        committed_price: attempt.committed_price,
        trials: attempt.trials.clone(),
        failures: Vec::new(),
    })
}

/// Write resolved flows and prices onto the network.
pub fn apply_solution(network: &mut Network, solution: &Solution) -> Result<(), PricingError> {
    for resolution in &solution.edges {
        let edge = network.edge_mut(resolution.edge).ok_or_else(|| {
            PricingError::InvalidInput(format!("{} is not in the network", resolution.edge))
        })?;
        edge.flow = resolution.flow;
        edge.price = resolution.price;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::{Model, VarId};
    use crate::pricing::{build_objective, build_variables, enumerate_routes, VariableModel};
    use crate::test_utils::{two_mode_network, ScriptedOracle};
    use std::collections::BTreeMap;
    use wardrop_core::Demand;

    struct Setup {
        network: Network,
        routes: RouteSet,
        variables: VariableModel,
    }

    fn setup() -> Setup {
        let mut network = two_mode_network();
        let demands = vec![Demand::new("A", "B", 10.0)];
        let routes = enumerate_routes(&mut network, &demands, 3, 8).unwrap();
        let mut oracle = ScriptedOracle::new(vec![]);
        let variables = build_variables(&network, &routes, &demands, &mut oracle).unwrap();
        Setup {
            network,
            routes,
            variables,
        }
    }

    fn attempt(setup: &Setup, values: BTreeMap<VarId, f64>) -> Attempt {
        Attempt {
            strategy: StrategyKind::Direct,
            model: Model::new(values, None),
            variables: setup.variables.clone(),
            committed_price: None,
            trials: Vec::new(),
        }
    }

    fn values(setup: &Setup, bus: f64, metro: f64, price: f64) -> BTreeMap<VarId, f64> {
        let bus_edge = setup.routes.for_demand(0)[0].edges[0];
        let metro_edge = setup.routes.for_demand(0)[1].edges[0];
        let bus_vars = setup.variables.edge(bus_edge).unwrap();
        let metro_vars = setup.variables.edge(metro_edge).unwrap();
        let mut values = BTreeMap::new();
        values.insert(bus_vars.flow, bus);
        values.insert(metro_vars.flow, metro);
        values.insert(metro_vars.price.var().unwrap(), price);
        values.insert(setup.variables.route_flow(0, 0).unwrap().var().unwrap(), bus);
        values.insert(setup.variables.route_flow(0, 1).unwrap().var().unwrap(), metro);
        values
    }

    #[test]
    fn test_unknown_price_takes_model_value() {
        let setup = setup();
        let attempt = attempt(&setup, values(&setup, 4.0, 6.0, 17.0));
        let objective = build_objective(&setup.routes, &attempt.variables).unwrap();
        let solution = extract_solution(&setup.network, &setup.routes, &attempt, &objective).unwrap();

        let metro = setup.routes.for_demand(0)[1].edges[0];
        assert_eq!(solution.edge(metro).unwrap().price, Some(17.0));
        assert_eq!(solution.edge(metro).unwrap().flow, Some(6.0));
        assert_eq!(solution.route_flows, vec![vec![4.0, 6.0]]);
        // 4·(2·4 + 5) + 6·(1·6 + 17)
        assert!((solution.objective - 190.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_flow_edge_has_no_price() {
        let setup = setup();
        let attempt = attempt(&setup, values(&setup, 10.0, 0.0, 60.0));
        let objective = build_objective(&setup.routes, &attempt.variables).unwrap();
        let solution = extract_solution(&setup.network, &setup.routes, &attempt, &objective).unwrap();

        let bus = setup.routes.for_demand(0)[0].edges[0];
        let metro = setup.routes.for_demand(0)[1].edges[0];
        assert_eq!(solution.edge(metro).unwrap().price, None);
        assert_eq!(solution.edge(metro).unwrap().flow, Some(0.0));
        // known prices are never dropped
        assert_eq!(solution.edge(bus).unwrap().price, Some(5.0));
    }

    #[test]
    fn test_unseen_price_variable_is_none() {
        let setup = setup();
        let mut values = values(&setup, 4.0, 6.0, 17.0);
        let metro = setup.routes.for_demand(0)[1].edges[0];
        let price_var = setup.variables.edge(metro).unwrap().price.var().unwrap();
        values.remove(&price_var);
        let attempt = attempt(&setup, values);
        let solution =
            extract_solution(&setup.network, &setup.routes, &attempt, &QuadExpr::zero()).unwrap();
        assert_eq!(solution.edge(metro).unwrap().price, None);
    }

    #[test]
    fn test_committed_price_used_for_fixed_unknowns() {
        let setup = setup();
        let mut attempt = attempt(&setup, values(&setup, 4.0, 6.0, 0.0));
        attempt.variables.fix_unknown_prices(45.0);
        attempt.committed_price = Some(45.0);
        attempt.strategy = StrategyKind::PriceSearch;
        let objective = build_objective(&setup.routes, &attempt.variables).unwrap();
        let solution = extract_solution(&setup.network, &setup.routes, &attempt, &objective).unwrap();

        let metro = setup.routes.for_demand(0)[1].edges[0];
        assert_eq!(solution.edge(metro).unwrap().price, Some(45.0));
        assert_eq!(solution.committed_price, Some(45.0));
    }

    #[test]
    fn test_apply_writes_back() {
        let mut setup = setup();
        let attempt = attempt(&setup, values(&setup, 4.0, 6.0, 17.0));
        let solution =
            extract_solution(&setup.network, &setup.routes, &attempt, &QuadExpr::zero()).unwrap();
        apply_solution(&mut setup.network, &solution).unwrap();

        let metro = setup.routes.for_demand(0)[1].edges[0];
        let edge = setup.network.edge(metro).unwrap();
        assert_eq!(edge.flow, Some(6.0));
        assert_eq!(edge.price, Some(17.0));
    }
}
