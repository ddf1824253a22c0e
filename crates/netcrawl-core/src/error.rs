use thiserror::Error;

/// Validation errors for a topology node.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NodeError {
    #[error("Node {address} has an empty device type")]
    EmptyType { address: String },

    #[error("Node {address} has an empty interface key")]
    EmptyInterface { address: String },
}
