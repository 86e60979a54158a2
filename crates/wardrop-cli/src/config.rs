//! `--config` TOML file: a `[pricing]` table for the engine and an `[oracle]`
//! table for the LP backend. Both tables and every key are optional.
//!
//! ```toml
//! [pricing]
//! max_hops = 4
//! strategies = ["direct", "price-search"]
//! polish_rounds = 2
//!
//! [oracle]
//! solver = "microlp"
//! big_m = 1e5
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use wardrop_algo::{LpOracleConfig, PricingConfig};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub pricing: PricingConfig,
    #[serde(default)]
    pub oracle: LpOracleConfig,
}

impl RunConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("parsing pricing config TOML")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_toml_str(&contents).with_context(|| format!("in {}", path.display()))
    }

    /// File contents when a path is given, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}
