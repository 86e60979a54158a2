//! Strategy fallback behaviour, driven by a scripted oracle.

use wardrop_algo::oracle::Outcome;
use wardrop_algo::test_utils::{two_mode_network, Response, ScriptedOracle};
use wardrop_algo::{
    DirectOptimization, MonotonicPriceSearch, PricingConfig, PricingEngine, PricingError,
    StrategyKind, StrategySelector,
};
use wardrop_core::Demand;

fn engine() -> PricingEngine {
    PricingEngine::new(PricingConfig::default()).unwrap()
}

#[test]
fn direct_infeasible_falls_back_to_price_search() {
    let mut network = two_mode_network();
    let demands = vec![Demand::new("A", "B", 10.0)];
    let mut oracle = ScriptedOracle::new(vec![
        Response::Unsat,
        Response::Sat(vec![
            ("f_A-B-Bus-0".to_string(), 10.0),
            ("flow_0_0".to_string(), 10.0),
        ]),
        Response::Sat(vec![
            ("f_A-B-Bus-0".to_string(), 10.0),
            ("flow_0_0".to_string(), 10.0),
        ]),
        Response::Unsat,
    ]);

    let outcome = engine().solve(&mut network, &demands, &mut oracle).unwrap();
    let solution = outcome.solution;
    assert_eq!(solution.strategy, StrategyKind::PriceSearch);
    assert_eq!(solution.committed_price, Some(115.0));
    assert_eq!(solution.failures.len(), 1);
    assert_eq!(solution.failures[0].strategy, StrategyKind::Direct);

    // direct check, then 120, 115, 110
    let checks = oracle.checks();
    assert_eq!(checks.len(), 4);
    assert!(checks[0].has_objective);
    assert!(checks[1..].iter().all(|c| !c.has_objective));
    assert!(checks.iter().all(|c| c.depth == 2));
    assert_eq!(oracle.depth(), 0);
    assert_eq!(oracle.num_vars(), 0);

    // the unused metro carried no flow, so its price stays open
    let metro = network
        .graph
        .edge_weights()
        .find(|e| e.color == "blue")
        .unwrap();
    assert_eq!(metro.price, None);
    assert_eq!(metro.flow, Some(0.0));
}

#[test]
fn direct_timeout_counts_as_failure() {
    let mut network = two_mode_network();
    let demands = vec![Demand::new("A", "B", 10.0)];
    let mut oracle = ScriptedOracle::new(vec![Response::Timeout, Response::Sat(vec![])]);

    let outcome = engine().solve(&mut network, &demands, &mut oracle).unwrap();
    assert_eq!(outcome.solution.strategy, StrategyKind::PriceSearch);
    assert!(outcome.solution.failures[0].reason.contains("timeout"));
}

#[test]
fn failure_reported_only_after_both_strategies() {
    let mut network = two_mode_network();
    let demands = vec![Demand::new("A", "B", 10.0)];
    let mut oracle = ScriptedOracle::new(vec![Response::Error("solver crashed".to_string())]);

    let err = engine().solve(&mut network, &demands, &mut oracle).unwrap_err();
    let PricingError::InfeasibleAll(failures) = &err else {
        panic!("expected InfeasibleAll, got {err}");
    };
    assert_eq!(failures.len(), 2);
    assert!(failures[0].reason.contains("solver crashed"));
    assert_eq!(failures[1].trials.len(), 1);
    assert_eq!(failures[1].trials[0].outcome, Outcome::Unsat);
    assert_eq!(oracle.checks().len(), 2);
    assert!(err.to_string().contains("price-search: no satisfiable price"));
}

#[test]
fn custom_chain_runs_in_given_order() {
    let mut selector = StrategySelector::new();
    selector.push(Box::new(MonotonicPriceSearch));
    selector.push(Box::new(DirectOptimization));
    let engine = PricingEngine::with_selector(PricingConfig::default(), selector).unwrap();

    let mut network = two_mode_network();
    let demands = vec![Demand::new("A", "B", 10.0)];
    let mut oracle = ScriptedOracle::new(vec![Response::Unsat, Response::Sat(vec![])]);

    let outcome = engine.solve(&mut network, &demands, &mut oracle).unwrap();
    assert_eq!(outcome.solution.strategy, StrategyKind::Direct);
    assert_eq!(outcome.solution.failures[0].strategy, StrategyKind::PriceSearch);
}
