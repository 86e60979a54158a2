//! Per-event reporting metrics.

use serde::{Deserialize, Serialize};
use wardrop_core::Network;

/// Metrics appended to the results store after a successful event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EventMetrics {
    pub revenue: f64,
    /// `None` when no resolved edge carries flow
    pub avg_cost: Option<f64>,
}

/// Edges with both a resolved flow and a resolved price, as `(k, flow, price)`.
fn resolved(network: &Network) -> impl Iterator<Item = (f64, f64, f64)> + '_ {
    network
        .graph
        .edge_weights()
        .filter_map(|e| Some((e.k, e.flow?, e.price?)))
}

/// `Σ (k_e·f_e + price_e)` over edges with resolved flow and price.
pub fn revenue(network: &Network) -> f64 {
    resolved(network).map(|(k, flow, price)| k * flow + price).sum()
}

/// `objective / Σ f_e` over edges with resolved flow and price.
pub fn average_cost(network: &Network, objective: f64) -> Option<f64> {
    let total_flow: f64 = resolved(network).map(|(_, flow, _)| flow).sum();
    if total_flow > 0.0 {
        Some(objective / total_flow)
    } else {
        None
    }
}

pub fn event_metrics(network: &Network, objective: f64) -> EventMetrics {
    EventMetrics {
        revenue: revenue(network),
        avg_cost: average_cost(network, objective),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wardrop_core::TransitEdge;

    fn solved_network() -> Network {
        let mut network = Network::new();
        let bus = network
            .add_edge("A", "B", TransitEdge::new("Bus", 2.0).with_price(5.0))
            .unwrap();
        let metro = network.add_edge("A", "B", TransitEdge::new("blue", 1.0)).unwrap();
        let idle = network.add_edge("B", "C", TransitEdge::new("blue", 1.0)).unwrap();
        network.edge_mut(bus).unwrap().flow = Some(4.0);
        let metro_edge = network.edge_mut(metro).unwrap();
        metro_edge.flow = Some(6.0);
        metro_edge.price = Some(17.0);
        // zero flow, price left unresolved
        network.edge_mut(idle).unwrap().flow = Some(0.0);
        network
    }

    #[test]
    fn test_revenue_skips_unresolved_prices() {
        let network = solved_network();
        // (2·4 + 5) + (1·6 + 17)
        assert_eq!(revenue(&network), 36.0);
    }

    #[test]
    fn test_average_cost() {
        let network = solved_network();
        assert_eq!(average_cost(&network, 190.0), Some(19.0));
        assert_eq!(average_cost(&Network::new(), 10.0), None);
        let metrics = event_metrics(&network, 190.0);
        assert_eq!(metrics.revenue, 36.0);
    }
}
