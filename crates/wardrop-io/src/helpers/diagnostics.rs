use serde::Serialize;
use wardrop_core::{Demand, Network};

use crate::importers::KTable;

/// Severity level for import issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning, // Imported with a defaulted value
    Error,   // Could not import element
}

/// A single issue encountered during import
#[derive(Debug, Clone, Serialize)]
pub struct ImportIssue {
    pub severity: Severity,
    pub category: String,       // "default", "parse", "validation"
    pub message: String,        // "capacity missing, using 500"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>, // "edge A-C (red)"
}

/// Counts of what an import produced
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportStats {
    pub networks: usize,
    pub stops: usize,
    pub edges: usize,
    pub unpriced_edges: usize,
    pub demands: usize,
    pub defaulted_values: usize,
}

/// Complete diagnostics for an import operation
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportDiagnostics {
    pub stats: ImportStats,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<ImportIssue>,
}

impl ImportDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a value that was filled in because the input omitted it.
    pub fn add_default(&mut self, entity: &str, message: &str) {
        self.issues.push(ImportIssue {
            severity: Severity::Warning,
            category: "default".to_string(),
            message: message.to_string(),
            entity: Some(entity.to_string()),
        });
        self.stats.defaulted_values += 1;
    }

    pub fn add_warning(&mut self, category: &str, message: &str) {
        self.issues.push(ImportIssue {
            severity: Severity::Warning,
            category: category.to_string(),
            message: message.to_string(),
            entity: None,
        });
    }

    pub fn add_error(&mut self, category: &str, message: &str) {
        self.issues.push(ImportIssue {
            severity: Severity::Error,
            category: category.to_string(),
            message: message.to_string(),
            entity: None,
        });
    }

    pub fn warning_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Warning)
            .count()
    }

    pub fn error_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Error)
            .count()
    }

    pub fn has_issues(&self) -> bool {
        !self.issues.is_empty()
    }

    /// Merge another diagnostics into this one; stats stay with the parser
    pub fn merge(&mut self, other: ImportDiagnostics) {
        self.issues.extend(other.issues);
    }
}

/// Result of loading a network file
#[derive(Debug, Clone)]
pub struct ImportResult {
    pub network: Network,
    pub demands: Vec<Demand>,
    /// Root congestion table, reused to resolve `k` of later route additions
    pub k_table: KTable,
    pub diagnostics: ImportDiagnostics,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostics_counts() {
        let mut diag = ImportDiagnostics::new();
        diag.add_default("edge A-B (Bus)", "capacity missing, using 500");
        diag.add_error("parse", "test error");
        diag.add_warning("validation", "isolated stop");

        assert_eq!(diag.warning_count(), 2);
        assert_eq!(diag.error_count(), 1);
        assert_eq!(diag.stats.defaulted_values, 1);
        assert!(diag.has_issues());
    }

    #[test]
    fn test_diagnostics_serialization() {
        let mut diag = ImportDiagnostics::new();
        diag.stats.stops = 5;
        diag.add_default("edge A-C (red)", "capacity missing, using 500");

        let json = serde_json::to_string_pretty(&diag).unwrap();
        assert!(json.contains("\"stops\": 5"));
        assert!(json.contains("\"warning\""));
        assert!(json.contains("\"entity\": \"edge A-C (red)\""));
    }
}
