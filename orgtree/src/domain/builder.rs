//! Tree builder: derives the nested hierarchy from the flat store.

use std::collections::{HashMap, HashSet};

use generational_arena::{Arena, Index};
use tracing::{instrument, trace};

use crate::domain::entities::{HierarchyNode, NodeId, TreeNode};

/// Working copy of a node while its children are collected.
#[derive(Debug)]
struct Slot {
    node: TreeNode,
    children: Vec<Index>,
}

/// Arena holding one slot per distinct id, in first-occurrence order.
struct Linked {
    arena: Arena<Slot>,
    roots: Vec<Index>,
    duplicates: Vec<NodeId>,
    orphans: Vec<NodeId>,
}

fn link(nodes: &[TreeNode]) -> Linked {
    let mut arena = Arena::with_capacity(nodes.len());
    let mut index_of: HashMap<NodeId, Index> = HashMap::with_capacity(nodes.len());
    let mut order = Vec::with_capacity(nodes.len());
    let mut duplicates = Vec::new();

    // Pass 1: every id is known before any parent lookup happens
    for node in nodes {
        if index_of.contains_key(&node.id) {
            duplicates.push(node.id);
            continue;
        }
        let idx = arena.insert(Slot {
            node: node.clone(),
            children: Vec::new(),
        });
        index_of.insert(node.id, idx);
        order.push(idx);
    }

    // Pass 2: attach in input order
    let mut roots = Vec::new();
    let mut orphans = Vec::new();
    for idx in order {
        let (id, parent_id) = {
            let slot = &arena[idx];
            (slot.node.id, slot.node.parent_id)
        };
        match parent_id {
            None => roots.push(idx),
            Some(pid) => match index_of.get(&pid) {
                Some(&parent_idx) => arena[parent_idx].children.push(idx),
                None => {
                    trace!("link: orphan {} (missing parent {})", id, pid);
                    orphans.push(id);
                }
            },
        }
    }

    Linked {
        arena,
        roots,
        duplicates,
        orphans,
    }
}

/// A node whose children are still being built.
struct Frame {
    node: TreeNode,
    pending: std::vec::IntoIter<Index>,
    built: Vec<HierarchyNode>,
}

impl Frame {
    fn open(slot: Slot) -> Self {
        Self {
            node: slot.node,
            pending: slot.children.into_iter(),
            built: Vec::new(),
        }
    }
}

/// Move a slot and its subtree out of the arena.
///
/// Post-order walk with an explicit stack; chain depth is unbounded.
/// Every node has a single parent, so anything reachable from a root is
/// visited exactly once; cycle members are never reached.
fn materialize(arena: &mut Arena<Slot>, idx: Index) -> Option<HierarchyNode> {
    let mut stack = vec![Frame::open(arena.remove(idx)?)];
    loop {
        let top = stack.last_mut()?;
        if let Some(child) = top.pending.next() {
            if let Some(slot) = arena.remove(child) {
                stack.push(Frame::open(slot));
            }
            continue;
        }
        let Frame { node, built, .. } = stack.pop()?;
        let finished = HierarchyNode {
            node,
            children: built,
        };
        match stack.last_mut() {
            Some(parent) => parent.built.push(finished),
            None => return Some(finished),
        }
    }
}

/// Convert a flat node sequence into a forest of roots.
///
/// - roots and children keep their first-occurrence order from the input
/// - a node whose parent id is missing (orphan) is left out, as is its subtree
/// - nodes on a parent cycle never hang below a root and are left out
/// - for a repeated id only the first record is used
#[instrument(level = "debug", skip(nodes), fields(n = nodes.len()))]
pub fn build_hierarchy(nodes: &[TreeNode]) -> Vec<HierarchyNode> {
    let Linked {
        mut arena, roots, ..
    } = link(nodes);
    roots
        .into_iter()
        .filter_map(|idx| materialize(&mut arena, idx))
        .collect()
}

/// Integrity findings for a flat node sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HierarchyReport {
    /// Nodes with no parent
    pub roots: Vec<NodeId>,
    /// Nodes whose parent id does not exist
    pub orphans: Vec<NodeId>,
    /// Nodes that are their own ancestor
    pub cyclic: Vec<NodeId>,
    /// Nodes hidden only because an ancestor is an orphan or on a cycle
    pub unreachable: Vec<NodeId>,
    /// Ids that occur more than once (later occurrences are ignored)
    pub duplicates: Vec<NodeId>,
    /// Number of nodes that end up in the hierarchy
    pub visible: usize,
}

impl HierarchyReport {
    pub fn is_consistent(&self) -> bool {
        self.orphans.is_empty()
            && self.cyclic.is_empty()
            && self.unreachable.is_empty()
            && self.duplicates.is_empty()
    }

    /// Every id excluded from the rendered hierarchy.
    pub fn hidden(&self) -> Vec<NodeId> {
        let mut hidden: Vec<NodeId> = self
            .orphans
            .iter()
            .chain(&self.cyclic)
            .chain(&self.unreachable)
            .copied()
            .collect();
        hidden.sort_unstable();
        hidden
    }
}

/// Classify every node of `nodes` the same way [`build_hierarchy`] treats it.
pub fn analyze(nodes: &[TreeNode]) -> HierarchyReport {
    let linked = link(nodes);
    let roots: Vec<NodeId> = linked
        .roots
        .iter()
        .map(|&idx| linked.arena[idx].node.id)
        .collect();

    let forest = build_hierarchy(nodes);
    let visible: HashSet<NodeId> = forest.iter().flat_map(|r| r.descendant_ids()).collect();

    let parent_of: HashMap<NodeId, Option<NodeId>> = linked
        .arena
        .iter()
        .map(|(_, slot)| (slot.node.id, slot.node.parent_id))
        .collect();

    // Walk parent chains of hidden nodes; a chain that revisits itself is a cycle
    let mut cyclic: HashSet<NodeId> = HashSet::new();
    let mut finished: HashSet<NodeId> = HashSet::new();
    for (_, slot) in linked.arena.iter() {
        let start = slot.node.id;
        if visible.contains(&start) || finished.contains(&start) {
            continue;
        }
        let mut path: Vec<NodeId> = Vec::new();
        let mut on_path: HashMap<NodeId, usize> = HashMap::new();
        let mut current = Some(start);
        while let Some(cur) = current {
            if finished.contains(&cur) {
                break;
            }
            if let Some(&pos) = on_path.get(&cur) {
                cyclic.extend(&path[pos..]);
                break;
            }
            on_path.insert(cur, path.len());
            path.push(cur);
            current = parent_of.get(&cur).copied().flatten();
            if current.is_some_and(|p| !parent_of.contains_key(&p)) {
                break;
            }
        }
        finished.extend(path);
    }

    let orphan_set: HashSet<NodeId> = linked.orphans.iter().copied().collect();
    let mut unreachable: Vec<NodeId> = parent_of
        .keys()
        .filter(|id| !visible.contains(id) && !orphan_set.contains(id) && !cyclic.contains(id))
        .copied()
        .collect();
    unreachable.sort_unstable();

    let mut cyclic: Vec<NodeId> = cyclic.into_iter().collect();
    cyclic.sort_unstable();

    HierarchyReport {
        roots,
        orphans: linked.orphans,
        cyclic,
        unreachable,
        duplicates: linked.duplicates,
        visible: visible.len(),
    }
}
