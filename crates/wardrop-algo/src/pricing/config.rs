use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::PricingError;

/// Strategy id of direct optimization.
pub const DIRECT_STRATEGY: &str = "direct";
/// Strategy id of the monotonic price search.
pub const PRICE_SEARCH_STRATEGY: &str = "price-search";

/// Tunables of the pricing engine.
///
/// Every field has a default, so a partial TOML table is enough.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    /// Longest route considered, in edges
    pub max_hops: usize,

    /// Routes kept per demand, in discovery order
    pub max_routes_per_demand: usize,

    /// Route flow from which a route counts as used
    pub flow_tolerance: f64,

    /// Allowed cost gap between a used route and the demand's minimum cost
    pub cost_tolerance: f64,

    /// Lowest price tried or allowed
    pub price_min: f64,

    /// Highest price tried or allowed
    pub price_max: f64,

    /// Step of the price search
    pub price_delta: f64,

    /// Budget of the direct optimization, milliseconds
    pub direct_timeout_ms: u64,

    /// Budget of each price-search trial, milliseconds
    pub trial_timeout_ms: u64,

    /// Re-solves of direct optimization with prices, then route flows, held
    /// at the incumbent; 0 keeps the first answer
    pub polish_rounds: usize,

    /// Strategy ids in the order they are tried
    pub strategies: Vec<String>,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            max_hops: 3,
            max_routes_per_demand: 8,
            flow_tolerance: 1.0,
            cost_tolerance: 5.0,
            price_min: 5.0,
            price_max: 120.0,
            price_delta: 5.0,
            direct_timeout_ms: 2_000,
            trial_timeout_ms: 2_000,
            polish_rounds: 4,
            strategies: vec![
                DIRECT_STRATEGY.to_string(),
                PRICE_SEARCH_STRATEGY.to_string(),
            ],
        }
    }
}

impl PricingConfig {
    pub fn direct_timeout(&self) -> Duration {
        Duration::from_millis(self.direct_timeout_ms)
    }

    pub fn trial_timeout(&self) -> Duration {
        Duration::from_millis(self.trial_timeout_ms)
    }

    /// Prices tried by the search: `price_max` down to `price_min` in `price_delta` steps.
    pub fn price_ladder(&self) -> Vec<f64> {
        let mut ladder = Vec::new();
        let mut step = 0u32;
        loop {
            let price = self.price_max - f64::from(step) * self.price_delta;
            // absorb float drift at the bottom rung
            if price < self.price_min - 1e-9 {
                break;
            }
            ladder.push(price);
            step += 1;
        }
        ladder
    }

    pub fn validate(&self) -> Result<(), PricingError> {
        if self.max_routes_per_demand == 0 {
            return Err(PricingError::InvalidInput(
                "max_routes_per_demand must be at least 1".to_string(),
            ));
        }
        if !(self.price_delta > 0.0) {
            return Err(PricingError::InvalidInput(format!(
                "price_delta must be positive, got {}",
                self.price_delta
            )));
        }
        if !(self.price_min <= self.price_max) {
            return Err(PricingError::InvalidInput(format!(
                "price_min ({}) must not exceed price_max ({})",
                self.price_min, self.price_max
            )));
        }
        if self.flow_tolerance < 0.0 || self.cost_tolerance < 0.0 {
            return Err(PricingError::InvalidInput(
                "tolerances must be non-negative".to_string(),
            ));
        }
        if self.strategies.is_empty() {
            return Err(PricingError::InvalidInput(
                "at least one strategy must be configured".to_string(),
            ));
        }
        for id in &self.strategies {
            if id != DIRECT_STRATEGY && id != PRICE_SEARCH_STRATEGY {
                return Err(PricingError::InvalidInput(format!(
                    "unknown strategy '{id}'; supported values: {DIRECT_STRATEGY}, {PRICE_SEARCH_STRATEGY}"
                )));
            }
        }
        Ok(())
    }
}
