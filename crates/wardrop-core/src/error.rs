//! Error types for the network model
//!
//! [`NetworkError`] covers everything that can go wrong while building or
//! querying a [`Network`](crate::Network): unknown stops, duplicate parallel-edge
//! keys, and invalid edge or demand data. Higher layers wrap it in their own
//! error enums or convert it to `anyhow::Error` at API boundaries.
//!
//! # Example
//!
//! ```
//! use wardrop_core::{Network, NetworkError, NetworkResult, TransitEdge};
//!
//! fn connect(network: &mut Network) -> NetworkResult<()> {
//!     network.add_edge("A", "B", TransitEdge::new("Bus", 2.0))?;
//!     Ok(())
//! }
//!
//! let mut network = Network::new();
//! connect(&mut network).unwrap();
//! assert_eq!(network.graph.edge_count(), 1);
//! ```

use thiserror::Error;

/// Unified error type for network operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NetworkError {
    /// A stop name was referenced that does not exist in the network
    #[error("Unknown stop: {0}")]
    UnknownStop(String),

    /// An edge id does not refer to an edge of this network
    #[error("Unknown edge id: {0}")]
    UnknownEdge(usize),

    /// Two parallel edges between the same stops were given the same key
    #[error("Duplicate edge key '{key}' between {u} and {v}")]
    DuplicateEdgeKey { u: String, v: String, key: String },

    /// Edge or demand data failed validation
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Convenience type alias for Results using NetworkError.
pub type NetworkResult<T> = Result<T, NetworkError>;

impl From<String> for NetworkError {
    fn from(s: String) -> Self {
        NetworkError::Validation(s)
    }
}

impl From<&str> for NetworkError {
    fn from(s: &str) -> Self {
        NetworkError::Validation(s.to_string())
    }
}
