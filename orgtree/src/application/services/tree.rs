//! Tree service: the mutation engine over the flat store.
//!
//! Local state always changes synchronously. How that relates to the remote
//! write depends on the [`SyncPolicy`]:
//! - optimistic policies change the store first and queue the write
//! - the pessimistic policy writes first and changes the store on success
//!
//! Background write outcomes are applied by [`TreeService::reconcile`] and
//! [`TreeService::flush`] on the owner's thread only.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, instrument, warn};

use crate::application::services::sync::{
    RemoteWrite, SyncOptions, SyncOutcome, SyncPolicy, SyncQueue, WriteKind, WriteOp,
};
use crate::application::ApplicationResult;
use crate::domain::{
    analyze, build_hierarchy, DomainError, ExpansionSet, FlatStore, HierarchyNode,
    HierarchyReport, NodeId, TreeNode,
};
use crate::infrastructure::traits::RemoteStore;

/// Whether a mutation changed anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    Applied,
    /// Target id unknown; nothing changed and nothing was sent
    NoOp,
}

impl MutationOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, MutationOutcome::Applied)
    }
}

/// A background write the backend did not accept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncFailure {
    pub seq: u64,
    pub kind: WriteKind,
    pub id: NodeId,
    pub error: String,
    /// Local state was restored to what it was before the write
    pub rolled_back: bool,
}

/// How to take a local change back.
#[derive(Debug, Clone)]
enum Undo {
    Remove(NodeId),
    Restore(TreeNode),
    Reinsert { index: usize, node: TreeNode },
}

impl Undo {
    fn remap(&mut self, from: NodeId, to: NodeId) {
        let fix = |n: &mut TreeNode| {
            if n.id == from {
                n.id = to;
            }
            if n.parent_id == Some(from) {
                n.parent_id = Some(to);
            }
        };
        match self {
            Undo::Remove(id) if *id == from => *id = to,
            Undo::Remove(_) => {}
            Undo::Restore(n) => fix(n),
            Undo::Reinsert { node, .. } => fix(node),
        }
    }
}

pub struct TreeService {
    remote: Arc<dyn RemoteStore>,
    policy: SyncPolicy,
    options: SyncOptions,
    store: FlatStore,
    expansion: ExpansionSet,
    queue: Option<SyncQueue>,
    next_seq: u64,
    /// Latest local write per id; a failed write only rolls back if still latest
    last_write: HashMap<NodeId, u64>,
    undo: HashMap<u64, Undo>,
    failures: Vec<SyncFailure>,
    /// Temporary id -> server id; kept for the session since the worker
    /// keeps redirecting the temporary id
    renamed: HashMap<NodeId, NodeId>,
    revision: u64,
}

impl TreeService {
    pub fn new(remote: Arc<dyn RemoteStore>, policy: SyncPolicy, options: SyncOptions) -> Self {
        Self {
            remote,
            policy,
            options,
            store: FlatStore::new(),
            expansion: ExpansionSet::new(),
            queue: None,
            next_seq: 0,
            last_write: HashMap::new(),
            undo: HashMap::new(),
            failures: Vec::new(),
            renamed: HashMap::new(),
            revision: 0,
        }
    }

    pub fn policy(&self) -> SyncPolicy {
        self.policy
    }

    pub fn store(&self) -> &FlatStore {
        &self.store
    }

    pub fn nodes(&self) -> &[TreeNode] {
        self.store.nodes()
    }

    pub fn get(&self, id: NodeId) -> Option<&TreeNode> {
        self.store.get(id)
    }

    pub fn expansion(&self) -> &ExpansionSet {
        &self.expansion
    }

    /// Bumped on every change to the store or the expansion set.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn touch(&mut self) {
        self.revision += 1;
    }

    /// Derive the hierarchy from the current store.
    pub fn hierarchy(&self) -> Vec<HierarchyNode> {
        build_hierarchy(self.store.nodes())
    }

    pub fn report(&self) -> HierarchyReport {
        analyze(self.store.nodes())
    }

    /// Time-based id that is not in use yet.
    ///
    /// Temporary ids the backend replaced are skipped too; queued writes
    /// naming them are redirected to the server id.
    pub fn generate_id(&self) -> NodeId {
        let mut id = self.store.next_free_id(Utc::now().timestamp_millis());
        while self.renamed.contains_key(&id) {
            id = self.store.next_free_id(id + 1);
        }
        id
    }

    // ------------------------------------------------------------
    // Loading
    // ------------------------------------------------------------

    /// Replace the store with the backend's collection.
    ///
    /// On failure the store is left as it was.
    #[instrument(level = "debug", skip(self))]
    pub fn load(&mut self) -> ApplicationResult<usize> {
        match self.remote.fetch_all() {
            Ok(nodes) => {
                self.set_all(nodes);
                info!("loaded {} nodes", self.store.len());
                Ok(self.store.len())
            }
            Err(e) => {
                error!("loading tree failed: {}", e);
                Err(e.into())
            }
        }
    }

    /// Replace the whole store. Does not contact the backend.
    ///
    /// Returns the number of records dropped as duplicate ids.
    pub fn set_all(&mut self, nodes: Vec<TreeNode>) -> usize {
        let dropped = self.store.set_all(nodes);
        let store = &self.store;
        self.expansion.retain(|id| store.contains(id));
        self.touch();
        dropped
    }

    // ------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------

    fn check_parent(&self, id: NodeId, parent_id: Option<NodeId>) -> Result<(), DomainError> {
        let Some(parent_id) = parent_id else {
            return Ok(());
        };
        if !self.store.contains(parent_id) {
            return Err(DomainError::UnknownParent { id, parent_id });
        }
        if self.store.would_create_cycle(id, parent_id) {
            return Err(DomainError::CycleDetected { id, parent_id });
        }
        Ok(())
    }

    /// Append a node and persist it.
    #[instrument(level = "debug", skip(self, node), fields(id = node.id))]
    pub fn add(&mut self, node: TreeNode) -> ApplicationResult<MutationOutcome> {
        if self.store.contains(node.id) {
            return Err(DomainError::DuplicateId(node.id).into());
        }
        self.check_parent(node.id, node.parent_id)?;

        if !self.policy.is_optimistic() {
            let stored = self.remote.create(&node)?;
            self.store.insert(stored)?;
            self.touch();
            return Ok(MutationOutcome::Applied);
        }

        let id = node.id;
        self.store.insert(node.clone())?;
        self.touch();
        debug!("add: {} applied locally", id);
        self.dispatch(WriteOp::Create(node), Undo::Remove(id));
        Ok(MutationOutcome::Applied)
    }

    /// Replace an existing node in place and persist it; unknown ids are a no-op.
    #[instrument(level = "debug", skip(self, node), fields(id = node.id))]
    pub fn edit(&mut self, node: TreeNode) -> ApplicationResult<MutationOutcome> {
        let Some(previous) = self.store.get(node.id).cloned() else {
            debug!("edit: unknown id {}, ignoring", node.id);
            return Ok(MutationOutcome::NoOp);
        };
        if node.parent_id != previous.parent_id {
            self.check_parent(node.id, node.parent_id)?;
        }

        if !self.policy.is_optimistic() {
            let stored = self.remote.update(node.id, &node)?;
            // The local id is authoritative for an update
            let confirmed = if stored.id == node.id { stored } else { node };
            self.store.replace(confirmed);
            self.touch();
            return Ok(MutationOutcome::Applied);
        }

        self.store.replace(node.clone());
        self.touch();
        self.dispatch(WriteOp::Update(node), Undo::Restore(previous));
        Ok(MutationOutcome::Applied)
    }

    /// Remove a single node and persist the removal; unknown ids are a no-op.
    ///
    /// Children are not touched; they become orphans.
    #[instrument(level = "debug", skip(self))]
    pub fn delete(&mut self, id: NodeId) -> ApplicationResult<MutationOutcome> {
        if !self.store.contains(id) {
            debug!("delete: unknown id {}, ignoring", id);
            return Ok(MutationOutcome::NoOp);
        }

        if !self.policy.is_optimistic() {
            self.remote.remove(id)?;
        }

        let Some((index, node)) = self.store.remove(id) else {
            return Ok(MutationOutcome::NoOp);
        };
        self.expansion.remove(id);
        self.touch();
        let orphaned = self.store.children_of(id).count();
        if orphaned > 0 {
            warn!("delete: {} children of {} are now orphans", orphaned, id);
        }

        if self.policy.is_optimistic() {
            self.dispatch(WriteOp::Delete(id), Undo::Reinsert { index, node });
        }
        Ok(MutationOutcome::Applied)
    }

    // ------------------------------------------------------------
    // Expansion
    // ------------------------------------------------------------

    pub fn toggle_expand(&mut self, id: NodeId) -> bool {
        let expanded = self.expansion.toggle(id);
        self.touch();
        expanded
    }

    pub fn is_expanded(&self, id: NodeId) -> bool {
        self.expansion.is_expanded(id)
    }

    pub fn expand_all(&mut self) {
        let ids: Vec<NodeId> = self.store.ids().collect();
        self.expansion.expand_all(ids);
        self.touch();
    }

    pub fn collapse_all(&mut self) {
        self.expansion.collapse_all();
        self.touch();
    }

    // ------------------------------------------------------------
    // Remote reconciliation
    // ------------------------------------------------------------

    fn dispatch(&mut self, op: WriteOp, undo: Undo) {
        self.next_seq += 1;
        let seq = self.next_seq;
        self.last_write.insert(op.id(), seq);
        self.undo.insert(seq, undo);

        let remote = self.remote.clone();
        let options = self.options;
        self.queue
            .get_or_insert_with(|| SyncQueue::spawn(remote, options))
            .enqueue(RemoteWrite { seq, op });
    }

    /// Apply every write outcome that has arrived so far.
    pub fn reconcile(&mut self) -> usize {
        let outcomes = match self.queue.as_mut() {
            Some(queue) => queue.drain(),
            None => return 0,
        };
        self.apply_outcomes(outcomes)
    }

    /// Wait for all queued writes, then apply their outcomes.
    ///
    /// Writes held back behind a server-assigned id are released by applying
    /// the create's outcome, so this repeats until nothing is held.
    pub fn flush(&mut self) -> usize {
        let mut applied = 0;
        loop {
            let Some(queue) = self.queue.as_mut() else {
                return applied;
            };
            let outcomes = queue.flush();
            let held = queue.held();
            let count = self.apply_outcomes(outcomes);
            applied += count;
            if held == 0 {
                return applied;
            }
            if count == 0 {
                warn!("flush: {} writes still held back", held);
                return applied;
            }
        }
    }

    /// Writes queued but not yet reconciled.
    pub fn pending_writes(&self) -> usize {
        self.undo.len()
    }

    fn apply_outcomes(&mut self, outcomes: Vec<SyncOutcome>) -> usize {
        let count = outcomes.len();
        for outcome in outcomes {
            self.apply_outcome(outcome);
        }
        count
    }

    fn apply_outcome(&mut self, outcome: SyncOutcome) {
        let undo = self.undo.remove(&outcome.seq);
        let id = outcome.op.id();
        let latest = self.last_write.get(&id) == Some(&outcome.seq);
        if latest {
            self.last_write.remove(&id);
        }

        match outcome.result {
            Ok(stored) => {
                if let (WriteOp::Create(sent), Some(stored)) = (&outcome.op, stored) {
                    if stored.id != sent.id {
                        self.adopt_server_id(outcome.seq, sent.id, stored.id);
                    }
                }
                debug!("{} {} confirmed", outcome.op.kind(), id);
            }
            Err(message) => {
                let rolled_back = match undo {
                    Some(undo) if self.policy.rolls_back() && latest => self.undo_write(undo),
                    _ => false,
                };
                warn!(
                    "{} {} failed after {} attempt(s){}: {}",
                    outcome.op.kind(),
                    id,
                    outcome.attempts,
                    if rolled_back { ", rolled back" } else { "" },
                    message
                );
                self.failures.push(SyncFailure {
                    seq: outcome.seq,
                    kind: outcome.op.kind(),
                    id,
                    error: message,
                    rolled_back,
                });
            }
        }
    }

    fn undo_write(&mut self, undo: Undo) -> bool {
        let undone = match undo {
            Undo::Remove(id) => {
                let removed = self.store.remove(id).is_some();
                self.expansion.remove(id);
                removed
            }
            Undo::Restore(previous) => self.store.replace(previous).is_some(),
            Undo::Reinsert { index, node } => self.store.insert_at(index, node).is_ok(),
        };
        if undone {
            self.touch();
        }
        undone
    }

    /// Switch a created node over to the id the backend assigned.
    ///
    /// The worker holds back later writes until it hears the decision. A
    /// refused id is reported as a failed create and writes keep the local id.
    fn adopt_server_id(&mut self, seq: u64, from: NodeId, to: NodeId) {
        match self.remap(from, to) {
            Ok(()) => {
                if let Some(queue) = self.queue.as_mut() {
                    queue.confirm_id(from);
                }
            }
            Err(e) => {
                if let Some(queue) = self.queue.as_mut() {
                    queue.reject_id(from);
                }
                warn!("create {}: backend id {} refused: {}", from, to, e);
                self.failures.push(SyncFailure {
                    seq,
                    kind: WriteKind::Create,
                    id: from,
                    error: format!("backend assigned id {to}, which is taken locally: {e}"),
                    rolled_back: false,
                });
            }
        }
    }

    /// Replace a temporary id with the one the backend assigned.
    fn remap(&mut self, from: NodeId, to: NodeId) -> Result<(), DomainError> {
        if self.store.remap_id(from, to)? {
            info!("node {} is now {}", from, to);
            self.expansion.rename(from, to);
            if let Some(seq) = self.last_write.remove(&from) {
                self.last_write.insert(to, seq);
            }
            for undo in self.undo.values_mut() {
                undo.remap(from, to);
            }
            self.renamed.insert(from, to);
            self.touch();
        } else {
            // Deleted locally meanwhile; queued writes still follow the alias
            debug!("remap: {} no longer present", from);
        }
        Ok(())
    }

    /// Current id of a node, following ids the backend replaced.
    ///
    /// An id still present in the store is returned as is.
    pub fn current_id(&self, id: NodeId) -> NodeId {
        let mut current = id;
        for _ in 0..=self.renamed.len() {
            if self.store.contains(current) {
                break;
            }
            match self.renamed.get(&current) {
                Some(&next) => current = next,
                None => break,
            }
        }
        current
    }

    pub fn failures(&self) -> &[SyncFailure] {
        &self.failures
    }

    pub fn take_failures(&mut self) -> Vec<SyncFailure> {
        std::mem::take(&mut self.failures)
    }
}
