//! Integration tests for the editor session (the operations a UI drives).

use std::sync::Arc;

use orgtree::application::services::{
    EditorSession, MutationOutcome, SyncOptions, SyncPolicy, TreeService,
};
use orgtree::application::ApplicationError;
use orgtree::domain::{DomainError, FormMode, NodeForm, NodeType};
use orgtree::infrastructure::{MemoryRemoteStore, RemoteCall};
use orgtree::util::testing;

#[ctor::ctor]
fn init() {
    testing::init_test_setup();
}

fn session(policy: SyncPolicy) -> (Arc<MemoryRemoteStore>, EditorSession) {
    let remote = Arc::new(MemoryRemoteStore::with_nodes(testing::sample_nodes()));
    let mut service = TreeService::new(remote.clone(), policy, SyncOptions::default());
    service.load().expect("load sample");
    (remote, EditorSession::new(service))
}

#[test]
fn given_add_form_when_submitting_then_node_created_under_parent() {
    // Arrange
    let (remote, mut session) = session(SyncPolicy::OptimisticNoRollback);
    let mut form = session.on_add(Some(3)).unwrap();
    form.name = "Grace Hopper".into();
    form.description = "Teaches compilers".into();

    // Act
    let outcome = session.submit(&form).unwrap();
    session.service_mut().flush();

    // Assert: type defaulted to the level below a department
    assert_eq!(outcome, MutationOutcome::Applied);
    let added = session.service().nodes().last().unwrap().clone();
    assert_eq!(added.node_type, NodeType::Teacher);
    assert_eq!(added.parent_id, Some(3));
    assert!(remote.calls().contains(&RemoteCall::Create(added.id)));
    let forest = session.hierarchy();
    let dept = forest[0].find(3).unwrap();
    assert_eq!(dept.children.last().unwrap().id(), added.id);
}

#[test]
fn given_root_add_form_when_opening_then_defaults_to_institute() {
    // Arrange
    let (_remote, mut session) = session(SyncPolicy::OptimisticNoRollback);

    // Act
    let form = session.on_add(None).unwrap();

    // Assert
    assert_eq!(form.node_type, "institute");
    assert_eq!(session.pending(), Some(&FormMode::Add { parent_id: None }));
}

#[test]
fn given_unknown_parent_when_opening_add_then_not_found() {
    // Arrange
    let (_remote, mut session) = session(SyncPolicy::OptimisticNoRollback);

    // Act
    let result = session.on_add(Some(99));

    // Assert
    assert!(matches!(result, Err(ApplicationError::NodeNotFound(99))));
    assert!(session.pending().is_none());
}

#[test]
fn given_invalid_fields_when_submitting_then_every_field_reported() {
    // Arrange
    let (_remote, mut session) = session(SyncPolicy::OptimisticNoRollback);
    session.on_add(None).unwrap();
    let form = NodeForm::new("x".repeat(51), "abc", "faculty");

    // Act
    let result = session.submit(&form);

    // Assert
    match result {
        Err(ApplicationError::Domain(DomainError::InvalidForm(e))) => {
            assert!(e.has_field("name"));
            assert!(e.has_field("description"));
            assert!(e.has_field("type"));
        }
        other => panic!("expected form error, got {other:?}"),
    }
    assert_eq!(session.service().nodes().len(), 4);
}

#[test]
fn given_edit_form_when_opening_then_prefilled_from_node() {
    // Arrange
    let (_remote, mut session) = session(SyncPolicy::OptimisticNoRollback);

    // Act
    let form = session.on_edit(2).unwrap();

    // Assert
    assert_eq!(form.name, "School of Science");
    assert_eq!(form.description, "Natural sciences");
    assert_eq!(form.node_type, "school");
    assert!(session.pending().unwrap().is_edit());
}

#[test]
fn given_unknown_id_when_opening_edit_then_nothing_opens() {
    // Arrange
    let (_remote, mut session) = session(SyncPolicy::OptimisticNoRollback);

    // Act
    let form = session.on_edit(42);

    // Assert
    assert!(form.is_none());
    assert!(session.pending().is_none());
}

#[test]
fn given_open_form_when_cancelling_then_nothing_changes() {
    // Arrange
    let (remote, mut session) = session(SyncPolicy::OptimisticNoRollback);
    session.on_edit(2).unwrap();
    let revision = session.revision();

    // Act
    session.cancel();
    session.service_mut().flush();

    // Assert
    assert!(session.pending().is_none());
    assert_eq!(session.revision(), revision);
    assert_eq!(remote.calls(), vec![RemoteCall::FetchAll]);
}

#[test]
fn given_expanded_node_when_deleting_then_expansion_entry_retired() {
    // Arrange
    let (_remote, mut session) = session(SyncPolicy::OptimisticNoRollback);
    assert!(session.on_toggle_expand(4));

    // Act
    let outcome = session.on_delete(4).unwrap();

    // Assert
    assert_eq!(outcome, MutationOutcome::Applied);
    assert!(!session.expansion().is_expanded(4));
}

#[test]
fn given_pessimistic_policy_when_backend_rejects_then_form_stays_open() {
    // Arrange
    let (remote, mut session) = session(SyncPolicy::Pessimistic);
    remote.set_fail_writes(true);
    let mut form = session.on_edit(2).unwrap();
    form.name = "Never saved".into();

    // Act
    let result = session.submit(&form);

    // Assert
    assert!(matches!(result, Err(ApplicationError::Remote(_))));
    assert!(session.pending().is_some());
    assert_eq!(session.service().get(2).unwrap().name, "School of Science");
}

#[test]
fn given_id_replaced_by_backend_while_edit_form_open_when_submitting_then_edits_new_id() {
    // Arrange: a node is added and its edit form opened before the create is confirmed
    let (remote, mut session) = session(SyncPolicy::OptimisticNoRollback);
    remote.assign_ids_from(500);
    let mut form = session.on_add(Some(3)).unwrap();
    form.name = "Grace Hopper".into();
    form.description = "Teaches compilers".into();
    session.submit(&form).unwrap();
    let temp_id = session.service().nodes().last().unwrap().id;
    let mut edit = session.on_edit(temp_id).unwrap();
    edit.name = "Rear Admiral Hopper".into();

    // Act
    session.service_mut().flush();
    let outcome = session.submit(&edit).unwrap();
    session.service_mut().flush();

    // Assert
    assert_eq!(outcome, MutationOutcome::Applied);
    let node = session.service().get(500).unwrap();
    assert_eq!(node.name, "Rear Admiral Hopper");
    assert_eq!(node.parent_id, Some(3));
    assert!(remote.calls().contains(&RemoteCall::Update(500)));
    assert!(session.service().failures().is_empty());
}

#[test]
fn given_parent_id_replaced_while_add_form_open_when_submitting_then_attached_to_new_id() {
    // Arrange
    let (remote, mut session) = session(SyncPolicy::OptimisticNoRollback);
    remote.assign_ids_from(500);
    let mut form = session.on_add(Some(2)).unwrap();
    form.name = "Chemistry".into();
    form.description = "Chemistry department".into();
    session.submit(&form).unwrap();
    let temp_id = session.service().nodes().last().unwrap().id;
    let mut child = session.on_add(Some(temp_id)).unwrap();
    child.name = "Marie Curie".into();
    child.description = "Teaches radiochemistry".into();

    // Act
    session.service_mut().flush();
    session.submit(&child).unwrap();
    session.service_mut().flush();

    // Assert
    let added = session.service().get(501).unwrap();
    assert_eq!(added.parent_id, Some(500));
    assert!(session.service().failures().is_empty());
}
