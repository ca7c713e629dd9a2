//! Integration tests for building the hierarchy from the flat store.

use rstest::{fixture, rstest};

use orgtree::domain::{
    analyze, build_hierarchy, find_in_forest, total_count, FlatStore, NodeId, NodeType, TreeNode,
};
use orgtree::util::testing;

#[ctor::ctor]
fn init() {
    testing::init_test_setup();
}

fn node(id: NodeId, name: &str, parent: Option<NodeId>) -> TreeNode {
    TreeNode::new(id, name, "some description", NodeType::School, parent)
}

#[fixture]
fn sample() -> Vec<TreeNode> {
    testing::sample_nodes()
}

#[rstest]
fn given_valid_references_when_building_then_every_node_is_placed(sample: Vec<TreeNode>) {
    // Act
    let forest = build_hierarchy(&sample);

    // Assert: node count preserved, roots are exactly the parentless nodes
    assert_eq!(total_count(&forest), sample.len());
    let root_ids: Vec<NodeId> = forest.iter().map(|r| r.id()).collect();
    let expected: Vec<NodeId> = sample
        .iter()
        .filter(|n| n.parent_id.is_none())
        .map(|n| n.id)
        .collect();
    assert_eq!(root_ids, expected);
}

#[test]
fn given_orphan_when_building_then_excluded_everywhere() {
    // Arrange
    let nodes = vec![
        node(1, "Inst", None),
        node(2, "Sch", Some(1)),
        node(3, "Orphan", Some(99)),
    ];

    // Act
    let forest = build_hierarchy(&nodes);

    // Assert
    assert_eq!(forest.len(), 1);
    assert_eq!(forest[0].id(), 1);
    assert_eq!(forest[0].children.len(), 1);
    assert_eq!(forest[0].children[0].id(), 2);
    assert!(forest[0].children[0].children.is_empty());
    assert!(find_in_forest(&forest, 3).is_none());
}

#[test]
fn given_orphan_with_children_when_building_then_whole_branch_hidden() {
    // Arrange
    let nodes = vec![
        node(1, "Inst", None),
        node(3, "Orphan", Some(99)),
        node(4, "Below orphan", Some(3)),
    ];

    // Act
    let forest = build_hierarchy(&nodes);
    let report = analyze(&nodes);

    // Assert
    assert_eq!(total_count(&forest), 1);
    assert_eq!(report.orphans, vec![3]);
    assert_eq!(report.unreachable, vec![4]);
}

#[test]
fn given_broken_fixture_when_analyzing_then_cycle_and_orphan_reported() {
    // Arrange
    let nodes = testing::broken_nodes();

    // Act
    let forest = build_hierarchy(&nodes);
    let report = analyze(&nodes);

    // Assert
    assert_eq!(total_count(&forest), 4);
    assert_eq!(report.orphans, vec![5]);
    let mut cyclic = report.cyclic.clone();
    cyclic.sort_unstable();
    assert_eq!(cyclic, vec![6, 7]);
    assert_eq!(report.hidden(), vec![5, 6, 7]);
    assert!(!report.is_consistent());
}

#[test]
fn given_child_listed_before_parent_when_building_then_still_nested() {
    // Arrange
    let nodes = vec![node(2, "Sch", Some(1)), node(1, "Inst", None)];

    // Act
    let forest = build_hierarchy(&nodes);

    // Assert
    assert_eq!(forest.len(), 1);
    assert_eq!(forest[0].children[0].id(), 2);
}

#[test]
fn given_siblings_when_building_then_input_order_kept() {
    // Arrange
    let nodes = vec![
        node(1, "Inst", None),
        node(30, "C", Some(1)),
        node(10, "A", Some(1)),
        node(20, "B", Some(1)),
    ];

    // Act
    let forest = build_hierarchy(&nodes);

    // Assert
    let order: Vec<NodeId> = forest[0].children.iter().map(|c| c.id()).collect();
    assert_eq!(order, vec![30, 10, 20]);
}

#[rstest]
fn given_store_when_set_all_then_reads_back_same_sequence(sample: Vec<TreeNode>) {
    // Arrange
    let mut store = FlatStore::new();

    // Act
    let dropped = store.set_all(sample.clone());

    // Assert
    assert_eq!(dropped, 0);
    assert_eq!(store.nodes(), sample.as_slice());
}

#[test]
fn given_sample_chain_when_building_then_depth_matches() {
    // Arrange
    let nodes = testing::sample_nodes();

    // Act
    let forest = build_hierarchy(&nodes);

    // Assert
    assert_eq!(forest[0].depth(), 4);
    assert_eq!(forest[0].descendant_ids(), vec![1, 2, 3, 4]);
}

#[test]
fn given_deep_parent_chain_when_building_and_walking_then_no_stack_overflow() {
    // Arrange: node i hangs below node i - 1
    const DEPTH: NodeId = 200_000;
    let nodes: Vec<TreeNode> = (1..=DEPTH)
        .map(|id| node(id, "level", (id > 1).then(|| id - 1)))
        .collect();

    // Act
    let forest = build_hierarchy(&nodes);
    let report = analyze(&nodes);

    // Assert
    assert_eq!(forest.len(), 1);
    assert_eq!(forest[0].depth(), DEPTH as usize);
    assert_eq!(total_count(&forest), DEPTH as usize);
    assert_eq!(find_in_forest(&forest, DEPTH).map(|n| n.id()), Some(DEPTH));
    assert!(report.is_consistent());
    assert_eq!(report.visible, DEPTH as usize);
    drop(forest);
}

#[test]
fn given_deep_orphaned_chain_when_analyzing_then_all_below_unreachable() {
    // Arrange: the top of the chain points at a missing parent
    const DEPTH: NodeId = 100_000;
    let nodes: Vec<TreeNode> = (1..=DEPTH)
        .map(|id| node(id, "level", Some(if id == 1 { -1 } else { id - 1 })))
        .collect();

    // Act
    let forest = build_hierarchy(&nodes);
    let report = analyze(&nodes);

    // Assert
    assert!(forest.is_empty());
    assert_eq!(report.orphans, vec![1]);
    assert_eq!(report.unreachable.len(), (DEPTH - 1) as usize);
}
