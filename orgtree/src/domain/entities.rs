//! Domain entities: core data structures

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::error::DomainError;

/// Identifier of a node in the flat store.
pub type NodeId = i64;

/// Closed set of organizational levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    Institute,
    School,
    Department,
    #[default]
    Teacher,
}

impl NodeType {
    pub const ALL: [NodeType; 4] = [
        NodeType::Institute,
        NodeType::School,
        NodeType::Department,
        NodeType::Teacher,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Institute => "institute",
            NodeType::School => "school",
            NodeType::Department => "department",
            NodeType::Teacher => "teacher",
        }
    }

    /// The level that usually sits directly below this one.
    ///
    /// Used to pre-fill the add form; nothing enforces it.
    pub fn child_type(&self) -> Option<NodeType> {
        match self {
            NodeType::Institute => Some(NodeType::School),
            NodeType::School => Some(NodeType::Department),
            NodeType::Department => Some(NodeType::Teacher),
            NodeType::Teacher => None,
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        NodeType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| DomainError::UnknownNodeType(wanted.to_string()))
    }
}

/// A single record of the flat store, as persisted by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    pub id: NodeId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    /// `None` marks a root.
    #[serde(rename = "parentId")]
    pub parent_id: Option<NodeId>,
}

impl TreeNode {
    pub fn new(
        id: NodeId,
        name: impl Into<String>,
        description: impl Into<String>,
        node_type: NodeType,
        parent_id: Option<NodeId>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            description: description.into(),
            node_type,
            parent_id,
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

impl fmt::Display for TreeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}) #{}", self.name, self.node_type, self.id)
    }
}

/// Derived, read-only view of a node with its nested children.
///
/// Rebuilt from the flat store on every change; never persisted.
///
/// Parent chains from the backend have no depth limit, so every walk over
/// this type uses an explicit stack instead of recursion.
#[derive(Debug)]
pub struct HierarchyNode {
    pub node: TreeNode,
    pub children: Vec<HierarchyNode>,
}

impl Drop for HierarchyNode {
    fn drop(&mut self) {
        // Detach grandchildren first so no drop nests deeper than one level
        let mut stack = std::mem::take(&mut self.children);
        while let Some(mut child) = stack.pop() {
            stack.append(&mut child.children);
        }
    }
}

impl HierarchyNode {
    pub fn id(&self) -> NodeId {
        self.node.id
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// Number of nodes in this subtree, including self.
    pub fn count(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(current) = stack.pop() {
            count += 1;
            stack.extend(&current.children);
        }
        count
    }

    /// Number of levels in this subtree; a leaf has depth 1.
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack = vec![(self, 1)];
        while let Some((current, level)) = stack.pop() {
            deepest = deepest.max(level);
            stack.extend(current.children.iter().map(|c| (c, level + 1)));
        }
        deepest
    }

    /// First match in pre-order.
    pub fn find(&self, id: NodeId) -> Option<&HierarchyNode> {
        let mut stack = vec![self];
        while let Some(current) = stack.pop() {
            if current.node.id == id {
                return Some(current);
            }
            stack.extend(current.children.iter().rev());
        }
        None
    }

    /// Ids of this subtree in pre-order, including self.
    pub fn descendant_ids(&self) -> Vec<NodeId> {
        let mut ids = Vec::new();
        let mut stack = vec![self];
        while let Some(current) = stack.pop() {
            ids.push(current.node.id);
            // Reverse push keeps left-to-right order
            for child in current.children.iter().rev() {
                stack.push(child);
            }
        }
        ids
    }
}

/// Total number of nodes in a forest.
pub fn total_count(forest: &[HierarchyNode]) -> usize {
    forest.iter().map(HierarchyNode::count).sum()
}

/// Look a node up anywhere in a forest.
pub fn find_in_forest(forest: &[HierarchyNode], id: NodeId) -> Option<&HierarchyNode> {
    forest.iter().find_map(|root| root.find(id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_mixed_case_type_when_parsing_then_matches_variant() {
        assert_eq!("School".parse::<NodeType>().unwrap(), NodeType::School);
        assert_eq!(" teacher ".parse::<NodeType>().unwrap(), NodeType::Teacher);
        assert!("faculty".parse::<NodeType>().is_err());
    }

    #[test]
    fn given_node_when_serializing_then_uses_wire_field_names() {
        let node = TreeNode::new(2, "Sch", "A school", NodeType::School, Some(1));

        let json = serde_json::to_value(&node).unwrap();

        assert_eq!(json["type"], "school");
        assert_eq!(json["parentId"], 1);
        assert_eq!(json["id"], 2);
    }

    #[test]
    fn given_root_node_when_serializing_then_parent_is_null() {
        let node = TreeNode::new(1, "Inst", "An institute", NodeType::Institute, None);

        let json = serde_json::to_value(&node).unwrap();

        assert!(json["parentId"].is_null());
        assert!(node.is_root());
    }

    #[test]
    fn given_nested_hierarchy_when_counting_then_includes_all_levels() {
        let leaf = HierarchyNode {
            node: TreeNode::new(3, "T", "teacher", NodeType::Teacher, Some(2)),
            children: vec![],
        };
        let mid = HierarchyNode {
            node: TreeNode::new(2, "D", "dept", NodeType::Department, Some(1)),
            children: vec![leaf],
        };
        let root = HierarchyNode {
            node: TreeNode::new(1, "S", "school", NodeType::School, None),
            children: vec![mid],
        };

        assert_eq!(root.count(), 3);
        assert_eq!(root.depth(), 3);
        assert_eq!(root.descendant_ids(), vec![1, 2, 3]);
        assert_eq!(root.find(3).map(|n| n.node.name.as_str()), Some("T"));
        assert!(root.find(42).is_none());
    }

    #[test]
    fn given_levels_when_asking_child_type_then_follows_hierarchy() {
        assert_eq!(NodeType::Institute.child_type(), Some(NodeType::School));
        assert_eq!(NodeType::Teacher.child_type(), None);
    }
}
