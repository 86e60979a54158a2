//! # wardrop-algo: Equilibrium Pricing for Transport Networks
//!
//! This crate computes congestion-dependent edge prices on a multi-modal
//! network so that demand distributes according to a Wardrop user
//! equilibrium while respecting capacity limits.
//!
//! ## Pricing Engine
//!
//! [`PricingEngine`] runs one solve per edge-addition event:
//!
//! | Step | Function |
//! |------|----------|
//! | Route enumeration | [`enumerate_routes`] |
//! | Variable model | [`build_variables`] |
//! | Equilibrium constraints | [`build_constraints`] |
//! | Total system cost | [`build_objective`] |
//! | Strategy chain | [`StrategySelector`] |
//! | Solution extraction | [`extract_solution`], [`apply_solution`] |
//!
//! ### Architecture
//!
//! - **[`oracle::ConstraintSolver`]**: backend-neutral oracle (what the engine talks to)
//! - **[`oracle::LpOracle`]**: MILP backend on `good_lp` (how it is solved)
//! - **[`PricingStrategy`]**: one way of solving; the selector tries them in order
//!
//! ## Reporting
//!
//! - [`metrics`]: revenue and average cost per event
//! - [`verify`]: independent re-check of a committed solution
//!
//! ## Example
//!
//! ```no_run
//! use wardrop_algo::oracle::{LpOracle, LpOracleConfig};
//! use wardrop_algo::{PricingConfig, PricingEngine};
//! use wardrop_core::{Demand, Network, TransitEdge};
//!
//! let mut network = Network::new();
//! network.add_edge("A", "B", TransitEdge::new("Bus", 2.0).with_price(5.0))?;
//! network.add_edge("A", "B", TransitEdge::new("blue", 1.0))?;
//! let demands = vec![Demand::new("A", "B", 10.0)];
//!
//! let engine = PricingEngine::new(PricingConfig::default())?;
//! let mut oracle = LpOracle::new(LpOracleConfig::default());
//! let outcome = engine.solve(&mut network, &demands, &mut oracle)?;
//! println!("strategy {}, cost {:.2}", outcome.solution.strategy, outcome.solution.objective);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod metrics;
pub mod oracle;
pub mod pricing;
pub mod test_utils;
pub mod verify;

pub use metrics::{average_cost, event_metrics, revenue, EventMetrics};
pub use oracle::{ConstraintSolver, LpOracle, LpOracleConfig, LpSolverKind, Outcome};
pub use pricing::*;
pub use verify::{verify_solution, VerificationReport, VerifyOptions, Violation};
