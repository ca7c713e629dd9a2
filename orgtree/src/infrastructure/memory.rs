//! In-memory remote store.
//!
//! Behaves like the REST backend (404 for unknown ids, optional server-side
//! id assignment) and can be told to fail, which makes it the test double for
//! every sync policy.

use std::sync::{Mutex, MutexGuard};

use crate::domain::{NodeId, TreeNode};
use crate::infrastructure::error::{RemoteError, RemoteResult};
use crate::infrastructure::traits::RemoteStore;

/// A call observed by the store, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    FetchAll,
    Create(NodeId),
    Update(NodeId),
    Remove(NodeId),
}

#[derive(Debug, Default)]
struct MemoryState {
    nodes: Vec<TreeNode>,
    calls: Vec<RemoteCall>,
    fail_fetch: bool,
    fail_writes: bool,
    failures_left: u32,
    next_server_id: Option<NodeId>,
}

impl MemoryState {
    fn write_should_fail(&mut self) -> bool {
        if self.fail_writes {
            return true;
        }
        if self.failures_left > 0 {
            self.failures_left -= 1;
            return true;
        }
        false
    }
}

#[derive(Debug, Default)]
pub struct MemoryRemoteStore {
    state: Mutex<MemoryState>,
}

fn not_found(method: &'static str, id: NodeId) -> RemoteError {
    RemoteError::Status {
        method,
        url: format!("memory://tree/{id}"),
        status: 404,
    }
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_nodes(nodes: Vec<TreeNode>) -> Self {
        let store = Self::default();
        store.lock().nodes = nodes;
        store
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        // A panicking test thread must not poison every later assertion
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Every write fails while set.
    pub fn set_fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    /// The next `n` writes fail, later ones succeed.
    pub fn fail_next_writes(&self, n: u32) {
        self.lock().failures_left = n;
    }

    pub fn set_fail_fetch(&self, fail: bool) {
        self.lock().fail_fetch = fail;
    }

    /// Ignore client ids on create and hand out ids from `start` upwards.
    pub fn assign_ids_from(&self, start: NodeId) {
        self.lock().next_server_id = Some(start);
    }

    pub fn nodes(&self) -> Vec<TreeNode> {
        self.lock().nodes.clone()
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.lock().calls.clone()
    }
}

impl RemoteStore for MemoryRemoteStore {
    fn fetch_all(&self) -> RemoteResult<Vec<TreeNode>> {
        let mut state = self.lock();
        state.calls.push(RemoteCall::FetchAll);
        if state.fail_fetch {
            return Err(RemoteError::Unavailable("fetch disabled".into()));
        }
        Ok(state.nodes.clone())
    }

    fn create(&self, node: &TreeNode) -> RemoteResult<TreeNode> {
        let mut state = self.lock();
        state.calls.push(RemoteCall::Create(node.id));
        if state.write_should_fail() {
            return Err(RemoteError::Unavailable(format!("create {}", node.id)));
        }
        let mut stored = node.clone();
        if let Some(next) = state.next_server_id {
            stored.id = next;
            state.next_server_id = Some(next + 1);
        }
        if state.nodes.iter().any(|n| n.id == stored.id) {
            return Err(RemoteError::Status {
                method: "POST",
                url: "memory://tree".into(),
                status: 500,
            });
        }
        state.nodes.push(stored.clone());
        Ok(stored)
    }

    fn update(&self, id: NodeId, node: &TreeNode) -> RemoteResult<TreeNode> {
        let mut state = self.lock();
        state.calls.push(RemoteCall::Update(id));
        if state.write_should_fail() {
            return Err(RemoteError::Unavailable(format!("update {id}")));
        }
        let slot = state
            .nodes
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| not_found("PUT", id))?;
        *slot = node.clone();
        Ok(node.clone())
    }

    fn remove(&self, id: NodeId) -> RemoteResult<()> {
        let mut state = self.lock();
        state.calls.push(RemoteCall::Remove(id));
        if state.write_should_fail() {
            return Err(RemoteError::Unavailable(format!("delete {id}")));
        }
        let before = state.nodes.len();
        state.nodes.retain(|n| n.id != id);
        if state.nodes.len() == before {
            return Err(not_found("DELETE", id));
        }
        Ok(())
    }
}
