//! Hierarchy rendering with termtree.
//!
//! Collapsed nodes show a `[+]` marker and hide their children.

use itertools::Itertools;
use termtree::Tree;
use tracing::instrument;

use crate::domain::{ExpansionSet, HierarchyNode, HierarchyReport, NodeId};

pub trait ToTermTree {
    fn to_term_tree(&self, expansion: &ExpansionSet) -> Tree<String>;
}

/// Display label of a node: marker, name, type and id.
pub fn label(node: &HierarchyNode, expanded: bool) -> String {
    let marker = match (node.has_children(), expanded) {
        (false, _) => "",
        (true, true) => "[-] ",
        (true, false) => "[+] ",
    };
    format!("{}{}", marker, node.node)
}

/// A visible node whose rendered children are still being collected.
struct Frame<'a> {
    tree: Tree<String>,
    pending: std::slice::Iter<'a, HierarchyNode>,
}

fn open<'a>(node: &'a HierarchyNode, expansion: &ExpansionSet) -> Frame<'a> {
    let expanded = expansion.is_expanded(node.id());
    let shown: &'a [HierarchyNode] = if expanded { node.children.as_slice() } else { &[] };
    Frame {
        tree: Tree::new(label(node, expanded)),
        pending: shown.iter(),
    }
}

impl ToTermTree for HierarchyNode {
    fn to_term_tree(&self, expansion: &ExpansionSet) -> Tree<String> {
        let mut root = open(self, expansion);
        let mut stack: Vec<Frame> = Vec::new();
        loop {
            let top = stack.last_mut().unwrap_or(&mut root);
            if let Some(child) = top.pending.next() {
                stack.push(open(child, expansion));
                continue;
            }
            let Some(done) = stack.pop() else {
                return root.tree;
            };
            stack
                .last_mut()
                .unwrap_or(&mut root)
                .tree
                .leaves
                .push(done.tree);
        }
    }
}

/// Drop a rendered tree level by level; `Tree`'s own drop recurses.
fn dismantle(tree: Tree<String>) {
    let mut stack = vec![tree];
    while let Some(mut current) = stack.pop() {
        stack.append(&mut current.leaves);
    }
}

/// Render every root below each other.
#[instrument(level = "trace", skip_all)]
pub fn render_forest(forest: &[HierarchyNode], expansion: &ExpansionSet) -> String {
    if forest.is_empty() {
        return "(empty tree)\n".to_string();
    }
    let mut out = String::new();
    for root in forest {
        let tree = root.to_term_tree(expansion);
        out.push_str(&tree.to_string());
        dismantle(tree);
    }
    out
}

fn join_ids(ids: &[NodeId]) -> String {
    ids.iter().map(|id| format!("#{id}")).join(", ")
}

/// One line per integrity finding; empty for a consistent tree.
pub fn report_lines(report: &HierarchyReport) -> Vec<String> {
    let findings = [
        ("orphans (unknown parent)", &report.orphans),
        ("on a parent cycle", &report.cyclic),
        ("below an orphan or cycle", &report.unreachable),
        ("duplicate ids", &report.duplicates),
    ];
    findings
        .iter()
        .filter(|(_, ids)| !ids.is_empty())
        .map(|(what, ids)| format!("{what}: {}", join_ids(ids)))
        .collect()
}
