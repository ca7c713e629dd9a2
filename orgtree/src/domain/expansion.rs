//! Expansion tracker: which nodes currently show their children.
//!
//! Keyed by node id only, so the state survives hierarchy rebuilds.

use std::collections::BTreeSet;

use crate::domain::entities::NodeId;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpansionSet {
    expanded: BTreeSet<NodeId>,
}

impl ExpansionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip membership of `id`, returning the new state.
    pub fn toggle(&mut self, id: NodeId) -> bool {
        if self.expanded.remove(&id) {
            false
        } else {
            self.expanded.insert(id);
            true
        }
    }

    pub fn is_expanded(&self, id: NodeId) -> bool {
        self.expanded.contains(&id)
    }

    pub fn expand(&mut self, id: NodeId) -> bool {
        self.expanded.insert(id)
    }

    pub fn collapse(&mut self, id: NodeId) -> bool {
        self.expanded.remove(&id)
    }

    /// Retire the entry of a deleted node.
    pub fn remove(&mut self, id: NodeId) -> bool {
        self.expanded.remove(&id)
    }

    pub fn retain(&mut self, mut keep: impl FnMut(NodeId) -> bool) {
        self.expanded.retain(|&id| keep(id));
    }

    pub fn expand_all(&mut self, ids: impl IntoIterator<Item = NodeId>) {
        self.expanded.extend(ids);
    }

    pub fn collapse_all(&mut self) {
        self.expanded.clear();
    }

    /// Move an entry to a new id (server-assigned id replacing a temporary one).
    pub fn rename(&mut self, from: NodeId, to: NodeId) {
        if self.expanded.remove(&from) {
            self.expanded.insert(to);
        }
    }

    pub fn len(&self) -> usize {
        self.expanded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expanded.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.expanded.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_id_when_toggled_twice_then_restores_original_state() {
        let mut set = ExpansionSet::new();

        assert!(set.toggle(5));
        assert!(set.is_expanded(5));
        assert!(!set.toggle(5));
        assert!(!set.is_expanded(5));
    }

    #[test]
    fn given_expanded_ids_when_retaining_then_drops_others() {
        let mut set = ExpansionSet::new();
        set.expand_all([1, 2, 3]);

        set.retain(|id| id != 2);

        assert_eq!(set.iter().collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn given_unknown_id_when_removing_then_noop() {
        let mut set = ExpansionSet::new();

        assert!(!set.remove(42));
        assert!(set.is_empty());
    }

    #[test]
    fn given_expanded_temp_id_when_renaming_then_moves_entry() {
        let mut set = ExpansionSet::new();
        set.expand(10);

        set.rename(10, 20);
        set.rename(30, 40);

        assert!(set.is_expanded(20));
        assert!(!set.is_expanded(10));
        assert!(!set.is_expanded(40));
    }
}
