//! Results file: `{"graphs": [...], "metrics": {"revenue": [...], "avg_cost": [...]}}`.
//!
//! Every append reads the current file (if any), extends one list and rewrites
//! the whole document pretty-printed. Writes go to a sibling temp file first
//! and are renamed into place.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde_json::{json, Map, Value};
use tracing::debug;
use wardrop_core::Network;

use super::node_link::NodeLinkGraph;

/// Handle on one results file.
#[derive(Debug, Clone)]
pub struct ResultsFile {
    path: PathBuf,
}

impl ResultsFile {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current document, or an empty object when the file does not exist yet.
    pub fn load(&self) -> Result<Map<String, Value>> {
        if !self.path.exists() {
            return Ok(Map::new());
        }
        let text = fs::read_to_string(&self.path)
            .with_context(|| format!("reading results file {}", self.path.display()))?;
        match serde_json::from_str(&text)
            .with_context(|| format!("parsing results file {}", self.path.display()))?
        {
            Value::Object(map) => Ok(map),
            _ => Err(anyhow!(
                "results file {} is not a JSON object",
                self.path.display()
            )),
        }
    }

    /// Append a node-link snapshot of `network` to `graphs`.
    pub fn append_graph(&self, network: &Network) -> Result<()> {
        let graph = serde_json::to_value(NodeLinkGraph::from_network(network))
            .context("serializing network graph")?;
        let mut doc = self.load()?;
        match doc.get_mut("graphs") {
            Some(Value::Array(graphs)) => graphs.push(graph),
            _ => {
                doc.insert("graphs".to_string(), Value::Array(vec![graph]));
            }
        }
        self.store(&doc)?;
        debug!(path = %self.path.display(), "appended graph");
        Ok(())
    }

    /// Append one event's revenue and average cost to `metrics`.
    ///
    /// An undefined average cost (no resolved flow) is written as `null`.
    pub fn append_metrics(&self, revenue: f64, avg_cost: Option<f64>) -> Result<()> {
        let mut doc = self.load()?;
        let metrics = doc
            .entry("metrics")
            .or_insert_with(|| json!({ "revenue": [], "avg_cost": [] }));
        if !metrics.is_object() {
            *metrics = json!({ "revenue": [], "avg_cost": [] });
        }
        push_metric(metrics, "revenue", json!(revenue))?;
        push_metric(metrics, "avg_cost", json!(avg_cost))?;
        self.store(&doc)?;
        debug!(revenue, avg_cost = ?avg_cost, "appended metrics");
        Ok(())
    }

    fn store(&self, doc: &Map<String, Value>) -> Result<()> {
        let json = serde_json::to_string_pretty(doc).context("serializing results")?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &self.path).with_context(|| {
            format!("renaming {} -> {}", tmp.display(), self.path.display())
        })?;
        Ok(())
    }
}

fn push_metric(metrics: &mut Value, name: &str, value: Value) -> Result<()> {
    let map = metrics
        .as_object_mut()
        .ok_or_else(|| anyhow!("metrics is not an object"))?;
    match map.get_mut(name) {
        Some(Value::Array(values)) => values.push(value),
        _ => {
            map.insert(name.to_string(), Value::Array(vec![value]));
        }
    }
    Ok(())
}

/// Append a graph snapshot to the results file at `path`.
pub fn append_graph(path: impl AsRef<Path>, network: &Network) -> Result<()> {
    ResultsFile::new(path).append_graph(network)
}

/// Append one event's metrics to the results file at `path`.
pub fn append_metrics(path: impl AsRef<Path>, revenue: f64, avg_cost: Option<f64>) -> Result<()> {
    ResultsFile::new(path).append_metrics(revenue, avg_cost)
}
