//! Variable model: the unknowns of one solve.
//!
//! Every edge gets a flow unknown, every unset price a price unknown and every
//! (demand, route) pair a route-flow unknown. Fixed prices stay constants.
//! The model is keyed by [`EdgeId`] and `(demand, route)`; nothing is stored on
//! the graph.

use std::collections::BTreeMap;
use wardrop_core::{Demand, EdgeId, Network};

use super::routes::{Route, RouteSet};
use super::PricingError;
use crate::oracle::{ConstraintSolver, LinExpr, Model, VarDecl, VarId};

/// A value that is either still an unknown of the solver or already fixed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Quantity {
    Unknown(VarId),
    Known(f64),
}

impl Quantity {
    pub fn expr(&self) -> LinExpr {
        match self {
            Quantity::Unknown(var) => LinExpr::var(*var),
            Quantity::Known(value) => LinExpr::constant(*value),
        }
    }

    pub fn var(&self) -> Option<VarId> {
        match self {
            Quantity::Unknown(var) => Some(*var),
            Quantity::Known(_) => None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Quantity::Unknown(_))
    }

    /// Value under `model`; `None` for an unknown the model does not cover.
    pub fn resolve(&self, model: &Model) -> Option<f64> {
        match self {
            Quantity::Unknown(var) => model.value(*var),
            Quantity::Known(value) => Some(*value),
        }
    }
}

/// Unknowns and constants attached to one edge.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeVars {
    pub flow: VarId,
    pub price: Quantity,
    pub k: f64,
    pub capacity: f64,
}

impl EdgeVars {
    /// `k·f_e + price_e`
    pub fn cost(&self) -> LinExpr {
        LinExpr::term(self.k, self.flow) + self.price.expr()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableModel {
    edges: BTreeMap<EdgeId, EdgeVars>,
    route_flows: Vec<Vec<Quantity>>,
}

impl VariableModel {
    pub fn edge(&self, id: EdgeId) -> Option<&EdgeVars> {
        self.edges.get(&id)
    }

    pub fn edges(&self) -> impl Iterator<Item = (EdgeId, &EdgeVars)> + '_ {
        self.edges.iter().map(|(id, vars)| (*id, vars))
    }

    pub fn route_flow(&self, demand: usize, route: usize) -> Option<Quantity> {
        self.route_flows.get(demand)?.get(route).copied()
    }

    pub fn route_flows(&self, demand: usize) -> &[Quantity] {
        self.route_flows
            .get(demand)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn num_demands(&self) -> usize {
        self.route_flows.len()
    }

    /// Replace a route flow, e.g. by a closed-form split.
    pub fn set_route_flow(&mut self, demand: usize, route: usize, value: Quantity) {
        if let Some(slot) = self
            .route_flows
            .get_mut(demand)
            .and_then(|flows| flows.get_mut(route))
        {
            *slot = value;
        }
    }

    /// Edges whose price is still an unknown, with that unknown.
    pub fn unknown_prices(&self) -> Vec<(EdgeId, VarId)> {
        self.edges
            .iter()
            .filter_map(|(id, vars)| vars.price.var().map(|v| (*id, v)))
            .collect()
    }

    pub fn has_unknown_prices(&self) -> bool {
        self.edges.values().any(|vars| vars.price.is_unknown())
    }

    /// Turn every unknown price into the constant `price`.
    pub fn fix_unknown_prices(&mut self, price: f64) {
        for vars in self.edges.values_mut() {
            if vars.price.is_unknown() {
                vars.price = Quantity::Known(price);
            }
        }
    }

    /// `cost_R = Σ_{e∈R} (k_e·f_e + price_e)`
    pub fn route_cost(&self, route: &Route) -> Result<LinExpr, PricingError> {
        route
            .edges
            .iter()
            .map(|id| {
                self.edges
                    .get(id)
                    .map(EdgeVars::cost)
                    .ok_or_else(|| PricingError::InvalidInput(format!("{id} has no variables")))
            })
            .sum()
    }

    /// Every price on the route is fixed.
    pub fn route_fully_priced(&self, route: &Route) -> bool {
        route.edges.iter().all(|id| {
            self.edges
                .get(id)
                .is_some_and(|vars| !vars.price.is_unknown())
        })
    }

    /// Sum of the fixed prices along a route (unknown prices count as zero).
    pub fn route_price(&self, route: &Route) -> f64 {
        route
            .edges
            .iter()
            .filter_map(|id| match self.edges.get(id)?.price {
                Quantity::Known(price) => Some(price),
                Quantity::Unknown(_) => None,
            })
            .sum()
    }
}

fn edge_label(network: &Network, id: EdgeId) -> Result<String, PricingError> {
    let (u, v) = network
        .endpoint_names(id)
        .ok_or_else(|| PricingError::InvalidInput(format!("{id} is not in the network")))?;
    let edge = network
        .edge(id)
        .ok_or_else(|| PricingError::InvalidInput(format!("{id} is not in the network")))?;
    Ok(format!("{u}-{v}-{}-{}", edge.color, edge.key))
}

/// Declare the unknowns of one solve on `solver`.
///
/// Bounds carry only facts implied by the problem: flows are non-negative, a
/// route never carries more than its demand and an edge never more than the
/// total demand. No constraint is asserted and the network is not touched.
pub fn build_variables(
    network: &Network,
    routes: &RouteSet,
    demands: &[Demand],
    solver: &mut dyn ConstraintSolver,
) -> Result<VariableModel, PricingError> {
    if routes.num_demands() != demands.len() {
        return Err(PricingError::InvalidInput(format!(
            "route set covers {} demands, expected {}",
            routes.num_demands(),
            demands.len()
        )));
    }
    let total_demand: f64 = demands.iter().map(|d| d.d).sum();

    let mut model = VariableModel::default();
    for id in network.edge_ids() {
        let label = edge_label(network, id)?;
        let Some(edge) = network.edge(id) else {
            continue;
        };
        let flow = solver.declare(VarDecl::bounded(format!("f_{label}"), 0.0, total_demand));
        let price = match edge.price {
            Some(price) => Quantity::Known(price),
            None => Quantity::Unknown(solver.declare(VarDecl::free(format!("p_{label}")))),
        };
        model.edges.insert(
            id,
            EdgeVars {
                flow,
                price,
                k: edge.k,
                capacity: edge.capacity,
            },
        );
    }

    for ((i, candidates), demand) in routes.iter().zip(demands) {
        let flows = (0..candidates.len())
            .map(|j| {
                Quantity::Unknown(solver.declare(VarDecl::bounded(
                    format!("flow_{i}_{j}"),
                    0.0,
                    demand.d,
                )))
            })
            .collect();
        model.route_flows.push(flows);
    }

    Ok(model)
}
