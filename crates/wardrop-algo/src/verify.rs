//! Independent re-check of a committed solution.
//!
//! Works on the resolved numbers only (network flows and prices plus the
//! solution's route flows), never on oracle state, so it catches lowering or
//! extraction mistakes as well as backend inaccuracy.

use std::fmt;
use wardrop_core::{Demand, EdgeId, Network};

use crate::pricing::{PricingConfig, RouteSet, Solution};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VerifyOptions {
    pub flow_tolerance: f64,
    pub cost_tolerance: f64,
    /// Absolute slack for solver round-off, scaled up for large magnitudes
    pub numeric_tolerance: f64,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self::from(&PricingConfig::default())
    }
}

impl From<&PricingConfig> for VerifyOptions {
    fn from(config: &PricingConfig) -> Self {
        Self {
            flow_tolerance: config.flow_tolerance,
            cost_tolerance: config.cost_tolerance,
            numeric_tolerance: 1e-5,
        }
    }
}

impl VerifyOptions {
    fn slack(&self, magnitude: f64) -> f64 {
        self.numeric_tolerance * magnitude.abs().max(1.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Violation {
    FlowConservation {
        edge: EdgeId,
        edge_flow: f64,
        route_flow: f64,
    },
    Capacity {
        edge: EdgeId,
        flow: f64,
        capacity: f64,
    },
    Demand {
        demand: usize,
        required: f64,
        assigned: f64,
    },
    NegativeFlow {
        demand: usize,
        route: usize,
        flow: f64,
    },
    /// A used route crosses an edge without a resolved price
    UnresolvedPrice { demand: usize, route: usize },
    Equilibrium {
        demand: usize,
        route: usize,
        cost: f64,
        min_cost: f64,
    },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::FlowConservation {
                edge,
                edge_flow,
                route_flow,
            } => write!(
                f,
                "{edge}: edge flow {edge_flow:.4} differs from route flow {route_flow:.4}"
            ),
            Violation::Capacity {
                edge,
                flow,
                capacity,
            } => write!(f, "{edge}: flow {flow:.4} exceeds capacity {capacity:.4}"),
            Violation::Demand {
                demand,
                required,
                assigned,
            } => write!(
                f,
                "demand {demand}: assigned {assigned:.4} of required {required:.4}"
            ),
            Violation::NegativeFlow {
                demand,
                route,
                flow,
            } => write!(f, "demand {demand} route {route}: negative flow {flow:.4}"),
            Violation::UnresolvedPrice { demand, route } => {
                write!(f, "demand {demand} route {route}: used route has an unresolved price")
            }
            Violation::Equilibrium {
                demand,
                route,
                cost,
                min_cost,
            } => write!(
                f,
                "demand {demand} route {route}: used route costs {cost:.4}, minimum is {min_cost:.4}"
            ),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VerificationReport {
    pub violations: Vec<Violation>,
    pub checked_edges: usize,
    pub checked_routes: usize,
}

impl VerificationReport {
    pub fn is_ok(&self) -> bool {
        self.violations.is_empty()
    }
}

fn route_cost(network: &Network, edges: &[EdgeId]) -> Option<f64> {
    edges
        .iter()
        .map(|id| {
            let edge = network.edge(*id)?;
            Some(edge.k * edge.flow.unwrap_or(0.0) + edge.price?)
        })
        .sum()
}

/// Re-check flow conservation, capacity, demand satisfaction and the
/// equilibrium conditions on an applied solution.
pub fn verify_solution(
    network: &Network,
    routes: &RouteSet,
    demands: &[Demand],
    solution: &Solution,
    options: &VerifyOptions,
) -> VerificationReport {
    let mut report = VerificationReport::default();

    for id in network.edge_ids() {
        let Some(edge) = network.edge(id) else {
            continue;
        };
        let edge_flow = edge.flow.unwrap_or(0.0);
        let route_flow: f64 = routes
            .iter()
            .flat_map(|(i, candidates)| {
                candidates
                    .iter()
                    .enumerate()
                    .filter(move |(_, r)| r.uses(id))
                    .map(move |(j, _)| (i, j))
            })
            .filter_map(|(i, j)| solution.route_flow(i, j))
            .sum();
        if (edge_flow - route_flow).abs() > options.slack(edge_flow) {
            report.violations.push(Violation::FlowConservation {
                edge: id,
                edge_flow,
                route_flow,
            });
        }
        if edge_flow > edge.capacity + options.slack(edge.capacity) {
            report.violations.push(Violation::Capacity {
                edge: id,
                flow: edge_flow,
                capacity: edge.capacity,
            });
        }
        report.checked_edges += 1;
    }

    for ((i, candidates), demand) in routes.iter().zip(demands) {
        let flows: Vec<f64> = (0..candidates.len())
            .map(|j| solution.route_flow(i, j).unwrap_or(0.0))
            .collect();
        let assigned: f64 = flows.iter().sum();
        if (assigned - demand.d).abs() > options.slack(demand.d) {
            report.violations.push(Violation::Demand {
                demand: i,
                required: demand.d,
                assigned,
            });
        }

        let costs: Vec<Option<f64>> = candidates
            .iter()
            .map(|route| route_cost(network, &route.edges))
            .collect();
        let min_cost = costs
            .iter()
            .flatten()
            .copied()
            .fold(f64::INFINITY, f64::min);

        for (j, (flow, cost)) in flows.iter().zip(&costs).enumerate() {
            report.checked_routes += 1;
            if *flow < -options.slack(*flow) {
                report.violations.push(Violation::NegativeFlow {
                    demand: i,
                    route: j,
                    flow: *flow,
                });
            }
            if *flow < options.flow_tolerance {
                continue;
            }
            match cost {
                None => report
                    .violations
                    .push(Violation::UnresolvedPrice { demand: i, route: j }),
                Some(cost) if cost - min_cost > options.cost_tolerance + options.slack(*cost) => {
                    report.violations.push(Violation::Equilibrium {
                        demand: i,
                        route: j,
                        cost: *cost,
                        min_cost,
                    })
                }
                Some(_) => {}
            }
        }
    }

    report
}
