pub mod diagnostics;
pub mod network_validator;

pub use diagnostics::{ImportDiagnostics, ImportIssue, ImportResult, ImportStats, Severity};
pub use network_validator::{validate_network, ValidationConfig};
