//! Distinguishable error type definition

use thiserror::Error;

/// An error type containing reoccurring errors with standard messages.
///
/// Contains information about the nature/type/cause of the error, which can
/// be matched on by the caller to take appropriate action, as opposed to
/// `anyhow::Error` which is used everywhere else for ad-hoc failures.
#[derive(Debug, Error)]
pub enum TypedError {
    /// An address claimed in a control message does not match the peer
    /// address observed on the TCP connection it arrived on.
    #[error("address mismatch: claimed {claimed}, connection is from {observed}")]
    AddressMismatch { claimed: String, observed: String },
    /// An address was expected to already be registered but isn't (or vice
    /// versa).
    #[error("{name} with value {value} not found")]
    ValueNotFound { name: String, value: String },
    #[error("{name} with value {value} already exists")]
    ValueExists { name: String, value: String },
    /// A `NodeData` packet arrived with `source` equal to the receiving
    /// node's own id. Preserved per design note: the connection carrying it
    /// is closed, not just the packet dropped.
    #[error("received NodeData with source equal to own id {0}")]
    SelfOriginatedPacket(i32),
    /// A peer reported a fatal setup or task-finish failure (result > 127).
    #[error("peer {0} reported a fatal round failure")]
    FatalRoundFailure(u32),
}

impl TypedError {
    pub fn value_exists(name: impl ToString, value: impl ToString) -> Self {
        Self::ValueExists {
            name: name.to_string(),
            value: value.to_string(),
        }
    }

    pub fn value_not_found(name: impl ToString, value: impl ToString) -> Self {
        Self::ValueNotFound {
            name: name.to_string(),
            value: value.to_string(),
        }
    }
}
