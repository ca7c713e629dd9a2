//! Domain-level errors (no external dependencies)

use thiserror::Error;

use crate::domain::entities::NodeId;
use crate::domain::form::FormError;

/// Domain errors represent violations of the tree invariants.
/// These are independent of infrastructure concerns.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("node id already exists: {0}")]
    DuplicateId(NodeId),

    #[error("node {id} references unknown parent {parent_id}")]
    UnknownParent { id: NodeId, parent_id: NodeId },

    #[error("cycle detected: node {id} cannot be placed under {parent_id}")]
    CycleDetected { id: NodeId, parent_id: NodeId },

    #[error("unknown node type: {0}")]
    UnknownNodeType(String),

    #[error("{0}")]
    InvalidForm(#[from] FormError),
}
