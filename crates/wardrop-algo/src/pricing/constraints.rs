//! Equilibrium constraint system.
//!
//! | family | constraint |
//! |--------|------------|
//! | flow conservation | `f_e = Σ f_R` over routes through `e`, or `f_e = 0` |
//! | capacity | `f_e <= capacity_e` |
//! | demand satisfaction | `Σ_R f_R = d_i` |
//! | minimum cost | `cost_R >= T_i` |
//! | equilibrium | `f_R >= flow_tol ⇒ |cost_R - T_i| <= cost_tol` |
//!
//! plus `f_R >= 0` and, for direct optimization only, bounds on every unknown
//! price. `T_i` is the minimum route cost of demand `i`, declared here.

use tracing::debug;
use wardrop_core::Demand;

use super::config::PricingConfig;
use super::routes::{Route, RouteSet};
use super::variables::{Quantity, VariableModel};
use super::PricingError;
use crate::oracle::{Comparison, ConstraintSolver, Constraint, LinExpr, VarDecl, VarId};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstraintOptions {
    pub flow_tolerance: f64,
    pub cost_tolerance: f64,
    /// `[min, max]` imposed on unknown prices, if any
    pub price_bounds: Option<(f64, f64)>,
}

impl ConstraintOptions {
    pub fn from_config(config: &PricingConfig, with_price_bounds: bool) -> Self {
        Self {
            flow_tolerance: config.flow_tolerance,
            cost_tolerance: config.cost_tolerance,
            price_bounds: with_price_bounds.then_some((config.price_min, config.price_max)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintFamily {
    FlowConservation,
    Capacity,
    DemandSatisfaction,
    MinimumCost,
    Equilibrium,
    NonNegativity,
    PriceBounds,
}

/// Constraints asserted for one solve.
#[derive(Debug, Clone, Default)]
pub struct ConstraintSet {
    pub constraints: Vec<(ConstraintFamily, Constraint)>,
    /// `T_i` per demand
    pub min_costs: Vec<VarId>,
}

impl ConstraintSet {
    pub fn count(&self, family: ConstraintFamily) -> usize {
        self.constraints.iter().filter(|(f, _)| *f == family).count()
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    fn push(&mut self, family: ConstraintFamily, constraint: impl Into<Constraint>) {
        self.constraints.push((family, constraint.into()));
    }
}

/// Lower and upper bound of a route cost under declared bounds.
fn cost_range(
    route: &Route,
    variables: &VariableModel,
    options: &ConstraintOptions,
    solver: &dyn ConstraintSolver,
) -> (f64, f64) {
    let mut lo = 0.0;
    let mut hi = 0.0;
    for id in &route.edges {
        let Some(vars) = variables.edge(*id) else {
            continue;
        };
        let (flo, fhi) = solver.bounds(vars.flow);
        let fhi = fhi.min(vars.capacity);
        lo += vars.k * flo;
        hi += vars.k * fhi;
        let (plo, phi) = match vars.price {
            Quantity::Known(price) => (price, price),
            Quantity::Unknown(var) => {
                let (dlo, dhi) = solver.bounds(var);
                match options.price_bounds {
                    Some((pmin, pmax)) => (dlo.max(pmin), dhi.min(pmax)),
                    None => (dlo, dhi),
                }
            }
        };
        lo += plo;
        hi += phi;
    }
    (lo, hi)
}

/// Assert the equilibrium system, non-negativity and optional price bounds on `solver`.
///
/// Declares one minimum-cost unknown per demand. Call inside a pushed scope;
/// everything added here is meant to be popped after the check.
pub fn build_constraints(
    routes: &RouteSet,
    variables: &VariableModel,
    demands: &[Demand],
    options: &ConstraintOptions,
    solver: &mut dyn ConstraintSolver,
) -> Result<ConstraintSet, PricingError> {
    let mut set = ConstraintSet::default();

    for (id, vars) in variables.edges() {
        let through: LinExpr = routes
            .iter()
            .flat_map(|(i, candidates)| {
                candidates
                    .iter()
                    .enumerate()
                    .filter(move |(_, route)| route.uses(id))
                    .map(move |(j, _)| (i, j))
            })
            .filter_map(|(i, j)| variables.route_flow(i, j))
            .map(|q| q.expr())
            .sum();
        set.push(
            ConstraintFamily::FlowConservation,
            LinExpr::var(vars.flow).equals(through),
        );
        set.push(
            ConstraintFamily::Capacity,
            LinExpr::var(vars.flow).leq(vars.capacity),
        );
    }

    for ((i, candidates), demand) in routes.iter().zip(demands) {
        let total: LinExpr = variables.route_flows(i).iter().map(Quantity::expr).sum();
        set.push(ConstraintFamily::DemandSatisfaction, total.equals(demand.d));

        let ranges: Vec<(f64, f64)> = candidates
            .iter()
            .map(|route| cost_range(route, variables, options, &*solver))
            .collect();
        let t_lo = ranges.iter().map(|r| r.0).fold(f64::INFINITY, f64::min);
        let t_hi = ranges.iter().map(|r| r.1).fold(f64::INFINITY, f64::min);
        let min_cost = solver.declare(VarDecl::bounded(format!("T_{i}"), t_lo, t_hi));
        set.min_costs.push(min_cost);

        for (j, route) in candidates.iter().enumerate() {
            let flow = variables.route_flow(i, j).ok_or_else(|| {
                PricingError::InvalidInput(format!("no flow variable for route {j} of demand {i}"))
            })?;
            let gap = variables.route_cost(route)? - LinExpr::var(min_cost);

            set.push(ConstraintFamily::MinimumCost, gap.clone().geq(0.0));

            // used routes sit within the tolerance of T_i
            let conclusions: Vec<Comparison> = vec![
                gap.clone().leq(options.cost_tolerance),
                gap.geq(-options.cost_tolerance),
            ];
            match flow {
                Quantity::Unknown(var) => {
                    set.push(
                        ConstraintFamily::Equilibrium,
                        Constraint::implies(
                            LinExpr::var(var).geq(options.flow_tolerance),
                            conclusions,
                        ),
                    );
                    set.push(ConstraintFamily::NonNegativity, LinExpr::var(var).geq(0.0));
                }
                Quantity::Known(value) => {
                    if value >= options.flow_tolerance {
                        for conclusion in conclusions {
                            set.push(ConstraintFamily::Equilibrium, conclusion);
                        }
                    }
                }
            }
        }
    }

    if let Some((pmin, pmax)) = options.price_bounds {
        for (_, var) in variables.unknown_prices() {
            set.push(ConstraintFamily::PriceBounds, LinExpr::var(var).geq(pmin));
            set.push(ConstraintFamily::PriceBounds, LinExpr::var(var).leq(pmax));
        }
    }

    debug!(
        constraints = set.len(),
        demands = demands.len(),
        routes = routes.total_routes(),
        "built equilibrium constraints"
    );
    for (_, constraint) in &set.constraints {
        solver.add_constraint(constraint.clone());
    }
    Ok(set)
}
