//! I/O boundary traits for testability
//!
//! The remote tree service is abstracted so services can run against the
//! HTTP backend or an in-memory double.

use crate::domain::{NodeId, TreeNode};
use crate::infrastructure::error::RemoteResult;

/// Persistence backend for tree nodes.
pub trait RemoteStore: Send + Sync {
    /// Read the full node collection.
    fn fetch_all(&self) -> RemoteResult<Vec<TreeNode>>;

    /// Persist a new node; returns the record as stored (the id may differ).
    fn create(&self, node: &TreeNode) -> RemoteResult<TreeNode>;

    /// Overwrite the record with `id`.
    fn update(&self, id: NodeId, node: &TreeNode) -> RemoteResult<TreeNode>;

    /// Delete the record with `id`.
    fn remove(&self, id: NodeId) -> RemoteResult<()>;
}
