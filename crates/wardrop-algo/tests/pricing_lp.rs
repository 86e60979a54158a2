//! End-to-end solves against the good_lp backend.

use wardrop_algo::oracle::{LpOracle, LpOracleConfig};
use wardrop_algo::test_utils::{line_network, two_mode_network};
use wardrop_algo::{
    event_metrics, verify_solution, PricingConfig, PricingEngine, PricingError, StrategyKind,
    StrategySelector, VerifyOptions, SYNTHETIC_PRICE,
};
use wardrop_core::{Demand, EdgeId, Network, TransitEdge};

const TOL: f64 = 1e-5;

fn oracle() -> LpOracle {
    LpOracle::new(LpOracleConfig::default())
}

fn metro_edge(network: &Network) -> EdgeId {
    network
        .edge_ids()
        .find(|id| network.edge(*id).is_some_and(|e| e.color == "blue"))
        .unwrap()
}

fn capped_metro_network(capacity: f64) -> Network {
    let mut network = Network::new();
    network
        .add_edge("A", "B", TransitEdge::new("Bus", 2.0).with_price(5.0))
        .unwrap();
    network
        .add_edge("A", "B", TransitEdge::new("blue", 1.0).with_capacity(capacity))
        .unwrap();
    network
}

#[test]
fn direct_optimization_reaches_verified_equilibrium() {
    let mut network = two_mode_network();
    let demands = vec![Demand::new("A", "B", 10.0)];
    let engine = PricingEngine::new(PricingConfig::default()).unwrap();

    let outcome = engine.solve(&mut network, &demands, &mut oracle()).unwrap();
    let solution = &outcome.solution;
    assert_eq!(solution.strategy, StrategyKind::Direct);
    assert!(solution.failures.is_empty());

    let assigned: f64 = solution.route_flows[0].iter().sum();
    assert!((assigned - 10.0).abs() < TOL);

    let report = verify_solution(
        &network,
        &outcome.routes,
        &demands,
        solution,
        &VerifyOptions::default(),
    );
    assert!(report.is_ok(), "{:?}", report.violations);

    let metro = network.edge(metro_edge(&network)).unwrap();
    if let Some(price) = metro.price {
        assert!((5.0 - TOL..=120.0 + TOL).contains(&price));
        assert!(metro.flow.unwrap() > 0.0);
    }
}

#[test]
fn direct_optimization_commits_minimum_total_cost() {
    // F = 2·f_bus² + 5·f_bus + f_blue² + p·f_blue with f_bus + f_blue = 10 is
    // smallest at p = 5, f_bus = 10/3, where both routes cost 35/3
    let mut network = two_mode_network();
    let demands = vec![Demand::new("A", "B", 10.0)];
    let engine = PricingEngine::new(PricingConfig::default()).unwrap();

    let outcome = engine.solve(&mut network, &demands, &mut oracle()).unwrap();
    let solution = &outcome.solution;
    assert_eq!(solution.strategy, StrategyKind::Direct);
    assert!(
        (solution.objective - 350.0 / 3.0).abs() < 1e-2,
        "objective {}",
        solution.objective
    );

    let metro = network.edge(metro_edge(&network)).unwrap();
    assert!((metro.price.unwrap() - 5.0).abs() < 1e-3);
    assert!((metro.flow.unwrap() - 20.0 / 3.0).abs() < 1e-2);

    let report = verify_solution(
        &network,
        &outcome.routes,
        &demands,
        solution,
        &VerifyOptions::default(),
    );
    assert!(report.is_ok(), "{:?}", report.violations);
}

#[test]
fn polishing_never_raises_the_objective() {
    let demands = vec![Demand::new("A", "B", 10.0)];
    let unpolished = PricingConfig {
        polish_rounds: 0,
        ..PricingConfig::default()
    };

    let mut first = two_mode_network();
    let rough = PricingEngine::new(unpolished)
        .unwrap()
        .solve(&mut first, &demands, &mut oracle())
        .unwrap();
    let mut second = two_mode_network();
    let polished = PricingEngine::new(PricingConfig::default())
        .unwrap()
        .solve(&mut second, &demands, &mut oracle())
        .unwrap();

    assert!(polished.solution.objective <= rough.solution.objective + TOL);
}

#[test]
fn price_search_commits_lowest_satisfiable_price() {
    // metro capped at 3: below p = 11 the bus gap exceeds the tolerance
    let mut network = capped_metro_network(3.0);
    let demands = vec![Demand::new("A", "B", 10.0)];
    let engine = PricingEngine::with_selector(
        PricingConfig::default(),
        StrategySelector::from_ids(&["price-search"]).unwrap(),
    )
    .unwrap();

    let outcome = engine.solve(&mut network, &demands, &mut oracle()).unwrap();
    let solution = &outcome.solution;
    assert_eq!(solution.strategy, StrategyKind::PriceSearch);
    assert_eq!(solution.committed_price, Some(15.0));

    let prices: Vec<f64> = solution.trials.iter().filter_map(|t| t.price).collect();
    assert_eq!(prices.len(), 23);
    assert_eq!(prices.first(), Some(&120.0));
    assert_eq!(prices.last(), Some(&10.0));
    assert!(prices.windows(2).all(|w| (w[0] - w[1] - 5.0).abs() < 1e-9));
    assert!(solution.trials[..22].iter().all(|t| t.outcome.is_sat()));
    assert!(!solution.trials[22].outcome.is_sat());

    let report = verify_solution(
        &network,
        &outcome.routes,
        &demands,
        solution,
        &VerifyOptions::default(),
    );
    assert!(report.is_ok(), "{:?}", report.violations);
}

#[test]
fn zero_flow_edge_gets_null_price_and_no_revenue() {
    let mut network = capped_metro_network(0.0);
    let demands = vec![Demand::new("A", "B", 10.0)];
    let engine = PricingEngine::new(PricingConfig::default()).unwrap();

    let outcome = engine.solve(&mut network, &demands, &mut oracle()).unwrap();
    let metro = network.edge(metro_edge(&network)).unwrap();
    assert_eq!(metro.price, None);
    assert!(metro.flow.unwrap().abs() < TOL);

    // only the bus counts: 2·10 + 5
    let metrics = event_metrics(&network, outcome.solution.objective);
    assert!((metrics.revenue - 25.0).abs() < TOL);
    assert!((metrics.avg_cost.unwrap() - 25.0).abs() < TOL);
}

#[test]
fn unreachable_demand_is_served_by_personal_edge() {
    let mut network = line_network();
    let demands = vec![Demand::new("A", "E", 150.0)];
    let engine = PricingEngine::new(PricingConfig::default()).unwrap();

    let outcome = engine.solve(&mut network, &demands, &mut oracle()).unwrap();
    assert_eq!(outcome.routes.synthetic.len(), 1);
    let personal = network.edge(outcome.routes.synthetic[0]).unwrap();
    assert_eq!(personal.price, Some(SYNTHETIC_PRICE));
    assert!((personal.flow.unwrap() - 150.0).abs() < TOL);
    // 150 · (1·150 + 100)
    assert!((outcome.solution.objective - 37_500.0).abs() < 1e-3);

    for id in network.edge_ids().filter(|id| *id != outcome.routes.synthetic[0]) {
        assert!(network.edge(id).unwrap().flow.unwrap().abs() < TOL);
    }
}

#[test]
fn demand_above_personal_capacity_fails_every_strategy() {
    let mut network = line_network();
    let edges_before = network.graph.edge_count();
    let demands = vec![Demand::new("A", "E", 400.0)];
    let engine = PricingEngine::new(PricingConfig::default()).unwrap();

    let err = engine.solve(&mut network, &demands, &mut oracle()).unwrap_err();
    let PricingError::InfeasibleAll(failures) = err else {
        panic!("expected InfeasibleAll, got {err}");
    };
    assert_eq!(failures.len(), 2);
    assert_eq!(failures[1].trials.len(), 1);
    // the personal edge stays, nothing is resolved
    assert_eq!(network.graph.edge_count(), edges_before + 1);
    assert!(network.graph.edge_weights().all(|e| e.flow.is_none()));
}

#[test]
fn successive_events_reuse_the_oracle() {
    let mut network = two_mode_network();
    let demands = vec![Demand::new("A", "B", 10.0)];
    let engine = PricingEngine::new(PricingConfig::default()).unwrap();
    let mut oracle = oracle();

    engine.solve(&mut network, &demands, &mut oracle).unwrap();
    network
        .add_edge("A", "B", TransitEdge::new("green", 1.5))
        .unwrap();
    let outcome = engine.solve(&mut network, &demands, &mut oracle).unwrap();
    assert_eq!(outcome.routes.for_demand(0).len(), 3);

    let report = verify_solution(
        &network,
        &outcome.routes,
        &demands,
        &outcome.solution,
        &VerifyOptions::default(),
    );
    assert!(report.is_ok(), "{:?}", report.violations);
}
