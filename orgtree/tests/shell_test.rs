//! Integration tests for the interactive shell, driven by scripted input.

use std::io::Cursor;
use std::sync::Arc;

use orgtree::application::services::{EditorSession, SyncOptions, SyncPolicy, TreeService};
use orgtree::cli::shell;
use orgtree::domain::NodeType;
use orgtree::infrastructure::{MemoryRemoteStore, RemoteCall};
use orgtree::util::testing;

#[ctor::ctor]
fn init() {
    testing::init_test_setup();
}

fn session(remote: &Arc<MemoryRemoteStore>, policy: SyncPolicy) -> EditorSession {
    let mut service = TreeService::new(remote.clone(), policy, SyncOptions::default());
    service.load().expect("load sample");
    EditorSession::new(service)
}

/// Run `script` through the shell and return everything it printed.
fn run_script(session: &mut EditorSession, script: &str) -> String {
    let mut input = Cursor::new(script.as_bytes().to_vec());
    let mut out = Vec::new();
    shell::run(session, &mut input, &mut out).expect("shell run");
    String::from_utf8(out).expect("utf8 output")
}

#[test]
fn given_ls_when_collapsed_then_only_roots_shown() {
    // Arrange
    let remote = Arc::new(MemoryRemoteStore::with_nodes(testing::sample_nodes()));
    let mut session = session(&remote, SyncPolicy::OptimisticNoRollback);

    // Act
    let out = run_script(&mut session, "ls\nquit\n");

    // Assert
    assert!(out.contains("[+] North Institute (institute) #1"));
    assert!(!out.contains("School of Science"));
}

#[test]
fn given_toggle_when_listing_then_children_visible() {
    // Arrange
    let remote = Arc::new(MemoryRemoteStore::with_nodes(testing::sample_nodes()));
    let mut session = session(&remote, SyncPolicy::OptimisticNoRollback);

    // Act
    let out = run_script(&mut session, "toggle 1\nls\n");

    // Assert
    assert!(out.contains("#1 expanded"));
    assert!(out.contains("[-] North Institute (institute) #1"));
    assert!(out.contains("[+] School of Science (school) #2"));
}

#[test]
fn given_add_script_when_running_then_node_added_and_synced() {
    // Arrange: empty type keeps the pre-filled "department"
    let remote = Arc::new(MemoryRemoteStore::with_nodes(testing::sample_nodes()));
    let mut session = session(&remote, SyncPolicy::OptimisticNoRollback);

    // Act
    let out = run_script(&mut session, "add 2\nChemistry\nChemistry department\n\nquit\n");

    // Assert
    assert!(out.contains("added Chemistry (department)"));
    let added = session.service().nodes().last().unwrap().clone();
    assert_eq!(added.node_type, NodeType::Department);
    assert_eq!(added.parent_id, Some(2));
    assert!(remote.calls().contains(&RemoteCall::Create(added.id)));
}

#[test]
fn given_edit_with_empty_answers_when_running_then_fields_kept() {
    // Arrange
    let remote = Arc::new(MemoryRemoteStore::with_nodes(testing::sample_nodes()));
    let mut session = session(&remote, SyncPolicy::OptimisticNoRollback);

    // Act
    let out = run_script(&mut session, "edit 3\nNuclear Physics\n\n\n");

    // Assert
    assert!(out.contains("updated"));
    let node = session.service().get(3).unwrap();
    assert_eq!(node.name, "Nuclear Physics");
    assert_eq!(node.description, "Physics department");
    assert_eq!(node.parent_id, Some(2));
}

#[test]
fn given_invalid_form_when_running_then_error_printed_and_shell_continues() {
    // Arrange
    let remote = Arc::new(MemoryRemoteStore::with_nodes(testing::sample_nodes()));
    let mut session = session(&remote, SyncPolicy::OptimisticNoRollback);

    // Act
    let out = run_script(&mut session, "add\nNew\nabc\n\nls\n");

    // Assert
    assert!(out.contains("error: invalid form"));
    assert!(out.contains("North Institute"));
    assert_eq!(session.service().nodes().len(), 4);
    assert!(session.pending().is_none());
}

#[test]
fn given_rm_and_check_when_running_then_orphan_reported() {
    // Arrange
    let remote = Arc::new(MemoryRemoteStore::with_nodes(testing::sample_nodes()));
    let mut session = session(&remote, SyncPolicy::OptimisticNoRollback);

    // Act
    let out = run_script(&mut session, "rm 2\nrm 2\ncheck\n");

    // Assert
    assert!(out.contains("deleted #2"));
    assert!(out.contains("no node #2"));
    assert!(out.contains("orphans (unknown parent): #3"));
}

#[test]
fn given_failing_backend_when_quitting_then_failure_reported() {
    // Arrange
    let remote = Arc::new(MemoryRemoteStore::with_nodes(testing::sample_nodes()));
    remote.set_fail_writes(true);
    let mut session = session(&remote, SyncPolicy::OptimisticWithRollback);

    // Act
    let out = run_script(&mut session, "rm 4\nquit\n");

    // Assert: the delete was undone after the backend refused it
    assert!(out.contains("! delete #4 failed (rolled back)"));
    assert!(session.service().get(4).is_some());
}

#[test]
fn given_unknown_command_when_running_then_usage_hint() {
    // Arrange
    let remote = Arc::new(MemoryRemoteStore::new());
    let mut session = session(&remote, SyncPolicy::OptimisticNoRollback);

    // Act
    let out = run_script(&mut session, "frobnicate\nls\n");

    // Assert
    assert!(out.contains("error: unknown command 'frobnicate'"));
    assert!(out.contains("(empty tree)"));
}
