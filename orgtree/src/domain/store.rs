//! Flat store: the ordered, id-unique collection of all tree nodes.
//!
//! The store is the single source of truth. Hierarchies are derived from it,
//! never the other way round.

use std::collections::HashSet;

use tracing::{trace, warn};

use crate::domain::entities::{NodeId, TreeNode};
use crate::domain::error::DomainError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlatStore {
    nodes: Vec<TreeNode>,
}

impl FlatStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole content.
    ///
    /// Later records repeating an id already seen are dropped so the
    /// uniqueness invariant holds. Returns the number of dropped records.
    pub fn set_all(&mut self, nodes: Vec<TreeNode>) -> usize {
        let mut seen = HashSet::with_capacity(nodes.len());
        let total = nodes.len();
        self.nodes = nodes
            .into_iter()
            .filter(|n| {
                let fresh = seen.insert(n.id);
                if !fresh {
                    warn!("set_all: dropping duplicate id {}", n.id);
                }
                fresh
            })
            .collect();
        total - self.nodes.len()
    }

    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.position(id).is_some()
    }

    pub fn get(&self, id: NodeId) -> Option<&TreeNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn position(&self, id: NodeId) -> Option<usize> {
        self.nodes.iter().position(|n| n.id == id)
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().map(|n| n.id)
    }

    /// Append a node.
    pub fn insert(&mut self, node: TreeNode) -> Result<(), DomainError> {
        let index = self.nodes.len();
        self.insert_at(index, node)
    }

    /// Insert a node at `index` (clamped to the current length).
    pub fn insert_at(&mut self, index: usize, node: TreeNode) -> Result<(), DomainError> {
        if self.contains(node.id) {
            return Err(DomainError::DuplicateId(node.id));
        }
        let index = index.min(self.nodes.len());
        trace!("insert_at: id={} index={}", node.id, index);
        self.nodes.insert(index, node);
        Ok(())
    }

    /// Replace the record carrying `node.id` in place.
    ///
    /// Returns the previous record, or `None` (and leaves the store untouched)
    /// when the id is unknown.
    pub fn replace(&mut self, node: TreeNode) -> Option<TreeNode> {
        let index = self.position(node.id)?;
        Some(std::mem::replace(&mut self.nodes[index], node))
    }

    /// Remove a single record. Children are left in place.
    pub fn remove(&mut self, id: NodeId) -> Option<(usize, TreeNode)> {
        let index = self.position(id)?;
        Some((index, self.nodes.remove(index)))
    }

    pub fn children_of(&self, id: NodeId) -> impl Iterator<Item = &TreeNode> + '_ {
        self.nodes.iter().filter(move |n| n.parent_id == Some(id))
    }

    /// Whether placing `id` under `parent_id` would make `id` its own ancestor.
    pub fn would_create_cycle(&self, id: NodeId, parent_id: NodeId) -> bool {
        let mut visited = HashSet::new();
        let mut current = Some(parent_id);
        while let Some(cur) = current {
            if cur == id {
                return true;
            }
            // A pre-existing cycle above us must not loop forever
            if !visited.insert(cur) {
                return false;
            }
            current = self.get(cur).and_then(|n| n.parent_id);
        }
        false
    }

    /// Rename a node id and repoint every child that referenced it.
    pub fn remap_id(&mut self, from: NodeId, to: NodeId) -> Result<bool, DomainError> {
        if from == to {
            return Ok(self.contains(from));
        }
        if self.contains(to) {
            return Err(DomainError::DuplicateId(to));
        }
        let Some(index) = self.position(from) else {
            return Ok(false);
        };
        self.nodes[index].id = to;
        for node in self.nodes.iter_mut() {
            if node.parent_id == Some(from) {
                node.parent_id = Some(to);
            }
        }
        Ok(true)
    }

    /// Smallest id `>= candidate` not yet in use.
    pub fn next_free_id(&self, candidate: NodeId) -> NodeId {
        let used: HashSet<NodeId> = self.ids().collect();
        let mut id = candidate;
        while used.contains(&id) {
            id += 1;
        }
        id
    }
}
