use super::routes::RouteSet;
use super::variables::{Quantity, VariableModel};
use super::PricingError;
use crate::oracle::{LinExpr, QuadExpr};

/// Total system cost `F = Σ_i Σ_R f_R · cost_R`.
pub fn build_objective(
    routes: &RouteSet,
    variables: &VariableModel,
) -> Result<QuadExpr, PricingError> {
    let mut objective = QuadExpr::zero();
    for (i, candidates) in routes.iter() {
        for (j, route) in candidates.iter().enumerate() {
            let cost = variables.route_cost(route)?;
            match variables.route_flow(i, j) {
                Some(Quantity::Unknown(flow)) => objective.add_scaled_by_var(flow, &cost),
                Some(Quantity::Known(flow)) => objective.add_linear(cost * flow),
                None => {
                    return Err(PricingError::InvalidInput(format!(
                        "no flow variable for route {j} of demand {i}"
                    )))
                }
            }
        }
    }
    Ok(objective)
}

/// `F` rewritten per edge: `Σ_e k_e·f_e² + Σ_i Σ_R f_R · price_R`.
///
/// Wherever flow conservation holds, `Σ_R f_R · Σ_{e∈R} k_e·f_e` equals
/// `Σ_e k_e·f_e²`, so this takes the same value as [`build_objective`]. The
/// flow part is a sum of convex squares the oracle can minimise exactly; only
/// the products of route flows with unknown prices remain bilinear.
pub fn build_separable_objective(
    routes: &RouteSet,
    variables: &VariableModel,
) -> Result<QuadExpr, PricingError> {
    let mut objective = QuadExpr::zero();
    for (_, vars) in variables.edges() {
        if vars.k != 0.0 {
            objective.add_product(vars.k, vars.flow, vars.flow);
        }
    }
    for (i, candidates) in routes.iter() {
        for (j, route) in candidates.iter().enumerate() {
            let mut price = LinExpr::zero();
            for id in &route.edges {
                let vars = variables.edge(*id).ok_or_else(|| {
                    PricingError::InvalidInput(format!("{id} has no variables"))
                })?;
                price += vars.price.expr();
            }
            match variables.route_flow(i, j) {
                Some(Quantity::Unknown(flow)) => objective.add_scaled_by_var(flow, &price),
                Some(Quantity::Known(flow)) => objective.add_linear(price * flow),
                None => {
                    return Err(PricingError::InvalidInput(format!(
                        "no flow variable for route {j} of demand {i}"
                    )))
                }
            }
        }
    }
    Ok(objective)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::{Model, VarId};
    use crate::pricing::{build_variables, enumerate_routes};
    use crate::test_utils::ScriptedOracle;
    use std::collections::BTreeMap;
    use wardrop_core::{Demand, Network, TransitEdge};

    #[test]
    fn test_objective_matches_hand_computation() {
        let mut network = Network::new();
        network
            .add_edge("A", "B", TransitEdge::new("Bus", 2.0).with_price(5.0))
            .unwrap();
        network.add_edge("A", "B", TransitEdge::new("red", 1.0)).unwrap();
        let demands = vec![Demand::new("A", "B", 10.0)];
        let routes = enumerate_routes(&mut network, &demands, 3, 8).unwrap();
        let mut oracle = ScriptedOracle::new(vec![]);
        let vars = build_variables(&network, &routes, &demands, &mut oracle).unwrap();
        let objective = build_objective(&routes, &vars).unwrap();
        assert!(!objective.is_linear());

        let bus = vars.edge(routes.for_demand(0)[0].edges[0]).unwrap();
        let red = vars.edge(routes.for_demand(0)[1].edges[0]).unwrap();
        let mut values: BTreeMap<VarId, f64> = BTreeMap::new();
        values.insert(bus.flow, 4.0);
        values.insert(red.flow, 6.0);
        values.insert(red.price.var().unwrap(), 7.0);
        values.insert(vars.route_flow(0, 0).unwrap().var().unwrap(), 4.0);
        values.insert(vars.route_flow(0, 1).unwrap().var().unwrap(), 6.0);
        let model = Model::new(values, None);

        // 4·(2·4 + 5) + 6·(1·6 + 7)
        let value = objective.evaluate(|v| model.value(v)).unwrap();
        assert!((value - 130.0).abs() < 1e-9);
    }

    #[test]
    fn test_known_flows_stay_linear() {
        let mut network = Network::new();
        network
            .add_edge("A", "B", TransitEdge::new("Bus", 2.0).with_price(5.0))
            .unwrap();
        let demands = vec![Demand::new("A", "B", 3.0)];
        let routes = enumerate_routes(&mut network, &demands, 3, 8).unwrap();
        let mut oracle = ScriptedOracle::new(vec![]);
        let mut vars = build_variables(&network, &routes, &demands, &mut oracle).unwrap();
        vars.set_route_flow(0, 0, Quantity::Known(3.0));

        let objective = build_objective(&routes, &vars).unwrap();
        assert!(objective.is_linear());
        assert_eq!(objective.linear().constant_part(), 15.0);
    }

    #[test]
    fn test_separable_form_agrees_under_conservation() {
        let mut network = Network::new();
        network
            .add_edge("A", "B", TransitEdge::new("Bus", 2.0).with_price(5.0))
            .unwrap();
        network.add_edge("A", "B", TransitEdge::new("red", 1.0)).unwrap();
        network
            .add_edge("B", "C", TransitEdge::new("Bus", 3.0).with_price(2.0))
            .unwrap();
        let demands = vec![Demand::new("A", "B", 10.0), Demand::new("A", "C", 4.0)];
        let routes = enumerate_routes(&mut network, &demands, 3, 8).unwrap();
        let mut oracle = ScriptedOracle::new(vec![]);
        let vars = build_variables(&network, &routes, &demands, &mut oracle).unwrap();

        // demand 0: bus 3, red 7; demand 1: bus+bus 1, red+bus 3
        let route_values = [[3.0, 7.0], [1.0, 3.0]];
        let mut values: BTreeMap<VarId, f64> = BTreeMap::new();
        let mut edge_flow: BTreeMap<_, f64> = BTreeMap::new();
        for (i, candidates) in routes.iter() {
            for (j, route) in candidates.iter().enumerate() {
                let flow = route_values[i][j];
                values.insert(vars.route_flow(i, j).unwrap().var().unwrap(), flow);
                for id in &route.edges {
                    *edge_flow.entry(*id).or_insert(0.0) += flow;
                }
            }
        }
        for (id, edge) in vars.edges() {
            values.insert(edge.flow, edge_flow.get(&id).copied().unwrap_or(0.0));
            if let Some(price) = edge.price.var() {
                values.insert(price, 9.0);
            }
        }

        let full = build_objective(&routes, &vars).unwrap();
        let separable = build_separable_objective(&routes, &vars).unwrap();
        let a = full.evaluate(|v| values.get(&v).copied()).unwrap();
        let b = separable.evaluate(|v| values.get(&v).copied()).unwrap();
        assert!((a - b).abs() < 1e-9, "{a} vs {b}");
    }
}
