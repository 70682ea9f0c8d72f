//! Hierarchy engine errors

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::executor::{Domain, QueryError};
use crate::core::identity::{NodeIdentity, RootKey, ValidationError};

/// Errors surfaced by the loader, the lazy tree and the eager builder.
///
/// Cycle and depth truncation are not errors; they are recorded on the node.
#[derive(Debug, Error)]
pub enum TreeError {
    #[error("{root} not found")]
    NotFound { root: RootKey },

    #[error("failed to load children of {identity}: {source}")]
    Load {
        identity: NodeIdentity,
        #[source]
        source: QueryError,
    },

    #[error("{domain} search failed: {source}")]
    Search {
        domain: Domain,
        #[source]
        source: QueryError,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("build cancelled")]
    Cancelled,

    #[error("no node with id {0} in this tree")]
    UnknownNode(usize),
}

impl TreeError {
    /// Whether expanding the same node again may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, TreeError::Load { .. } | TreeError::Search { .. })
    }
}

/// Last failure recorded on a node, kept for display and for the retry path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Identity of the node whose load failed
    pub identity: String,
    pub message: String,
    pub retryable: bool,
}

impl ErrorInfo {
    pub fn from_error(identity: &NodeIdentity, err: &TreeError) -> Self {
        Self {
            identity: identity.to_string(),
            message: err.to_string(),
            retryable: err.is_retryable(),
        }
    }
}
