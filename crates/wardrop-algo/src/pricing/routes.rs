//! Candidate route enumeration.
//!
//! Routes are simple node paths expanded over parallel edges, so two routes
//! over the same stops but different lines are distinct. A demand with no path
//! inside the hop bound is served by a synthetic "personal" edge.

use itertools::Itertools;
use std::fmt::Write as _;
use tracing::{debug, info};
use wardrop_core::{simple_paths, Demand, EdgeId, Network, NodeIndex, TransitEdge, PERSONAL_MODE};

use super::PricingError;

/// Congestion coefficient of a synthetic personal edge.
pub const SYNTHETIC_K: f64 = 1.0;
/// Capacity of a synthetic personal edge.
pub const SYNTHETIC_CAPACITY: f64 = 200.0;
/// Price of a synthetic personal edge.
pub const SYNTHETIC_PRICE: f64 = 100.0;

/// One concrete edge sequence from a demand's source to its target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Route {
    /// Stops visited, source first
    pub nodes: Vec<NodeIndex>,
    /// Edge taken on each hop
    pub edges: Vec<EdgeId>,
}

impl Route {
    pub fn hops(&self) -> usize {
        self.edges.len()
    }

    pub fn uses(&self, edge: EdgeId) -> bool {
        self.edges.contains(&edge)
    }

    /// Human readable form, e.g. `A -[Bus/0]- B -[red/1]- C`.
    pub fn describe(&self, network: &Network) -> String {
        let mut out = String::new();
        for (i, node) in self.nodes.iter().enumerate() {
            if i > 0 {
                let edge = self.edges.get(i - 1).and_then(|id| network.edge(*id));
                match edge {
                    Some(edge) => {
                        let _ = write!(out, " -[{}/{}]- ", edge.color, edge.key);
                    }
                    None => out.push_str(" -?- "),
                }
            }
            out.push_str(network.stop_name(*node));
        }
        out
    }
}

/// Candidate routes of every demand, indexed like the demand list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteSet {
    routes: Vec<Vec<Route>>,
    /// Personal edges inserted for demands without a route
    pub synthetic: Vec<EdgeId>,
}

impl RouteSet {
    pub fn new(routes: Vec<Vec<Route>>) -> Self {
        Self {
            routes,
            synthetic: Vec::new(),
        }
    }

    pub fn for_demand(&self, demand: usize) -> &[Route] {
        self.routes.get(demand).map(Vec::as_slice).unwrap_or(&[])
    }

    /// `(demand index, routes)` pairs in demand order
    pub fn iter(&self) -> impl Iterator<Item = (usize, &[Route])> + '_ {
        self.routes.iter().map(Vec::as_slice).enumerate()
    }

    pub fn num_demands(&self) -> usize {
        self.routes.len()
    }

    pub fn total_routes(&self) -> usize {
        self.routes.iter().map(Vec::len).sum()
    }
}

/// Enumerate at most `max_routes` candidate routes of at most `max_hops` edges
/// per demand.
///
/// Mutates the network only to add synthetic personal edges; an existing
/// synthetic edge for the same pair is reused.
pub fn enumerate_routes(
    network: &mut Network,
    demands: &[Demand],
    max_hops: usize,
    max_routes: usize,
) -> Result<RouteSet, PricingError> {
    let mut set = RouteSet::default();
    for demand in demands {
        demand.validate()?;
        let routes = match (network.stop(&demand.s), network.stop(&demand.t)) {
            (Some(s), Some(t)) => expand_paths(network, s, t, max_hops, max_routes),
            _ => Vec::new(),
        };
        if routes.is_empty() {
            let (route, inserted) = synthetic_route(network, demand)?;
            if inserted {
                info!(
                    demand = %demand,
                    max_hops,
                    "no route within hop bound; added personal edge"
                );
                set.synthetic.extend(route.edges.iter().copied());
            }
            set.routes.push(vec![route]);
        } else {
            debug!(demand = %demand, routes = routes.len(), "enumerated routes");
            set.routes.push(routes);
        }
    }
    Ok(set)
}

fn expand_paths(
    network: &Network,
    s: NodeIndex,
    t: NodeIndex,
    max_hops: usize,
    max_routes: usize,
) -> Vec<Route> {
    simple_paths(network, s, t, max_hops)
        .into_iter()
        .flat_map(|nodes| {
            let choices: Vec<Vec<EdgeId>> = nodes
                .windows(2)
                .map(|hop| network.edges_between(hop[0], hop[1]))
                .collect();
            choices
                .into_iter()
                .multi_cartesian_product()
                .map(move |edges| Route {
                    nodes: nodes.clone(),
                    edges,
                })
        })
        .take(max_routes)
        .collect()
}

fn synthetic_key(demand: &Demand) -> String {
    format!("auto_{}_{}", demand.s, demand.t)
}

/// The personal edge route of `demand`, inserting the edge when missing.
fn synthetic_route(network: &mut Network, demand: &Demand) -> Result<(Route, bool), PricingError> {
    let key = synthetic_key(demand);
    let s = network.add_stop(&demand.s);
    let t = network.add_stop(&demand.t);

    let existing = network
        .edges_between(s, t)
        .into_iter()
        .find(|id| network.edge(*id).is_some_and(|e| e.key == key));
    let (edge, inserted) = match existing {
        Some(id) => (id, false),
        None => {
            let edge = TransitEdge::new(PERSONAL_MODE, SYNTHETIC_K)
                .with_capacity(SYNTHETIC_CAPACITY)
                .with_price(SYNTHETIC_PRICE)
                .with_key(key);
            (network.add_edge(&demand.s, &demand.t, edge)?, true)
        }
    };
    Ok((
        Route {
            nodes: vec![s, t],
            edges: vec![edge],
        },
        inserted,
    ))
}
