//! Remote write queue
//!
//! Fire-and-forget writes are executed by a single background worker, so they
//! reach the backend in dispatch order. Results travel back over a channel and
//! are applied to local state only when the owner drains them.
//!
//! When the backend assigns its own id to a created node, the worker holds
//! back every later write until the owner confirms or rejects the new id.
//! Only a confirmed id is used to rewrite queued writes.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::str::FromStr;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::domain::{NodeId, TreeNode};
use crate::infrastructure::traits::RemoteStore;

/// When local state changes relative to remote confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SyncPolicy {
    /// Apply locally, write in the background, only report failures
    #[default]
    OptimisticNoRollback,
    /// Apply locally, write in the background, undo failed writes
    OptimisticWithRollback,
    /// Write first, apply locally only once the backend accepted it
    Pessimistic,
}

impl SyncPolicy {
    pub const ALL: [SyncPolicy; 3] = [
        SyncPolicy::OptimisticNoRollback,
        SyncPolicy::OptimisticWithRollback,
        SyncPolicy::Pessimistic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncPolicy::OptimisticNoRollback => "optimistic-no-rollback",
            SyncPolicy::OptimisticWithRollback => "optimistic-with-rollback",
            SyncPolicy::Pessimistic => "pessimistic",
        }
    }

    pub fn is_optimistic(&self) -> bool {
        !matches!(self, SyncPolicy::Pessimistic)
    }

    pub fn rolls_back(&self) -> bool {
        matches!(self, SyncPolicy::OptimisticWithRollback)
    }
}

impl fmt::Display for SyncPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        SyncPolicy::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                format!(
                    "unknown sync policy '{wanted}' (expected one of: {})",
                    SyncPolicy::ALL.map(|p| p.as_str()).join(", ")
                )
            })
    }
}

/// Retry behaviour of the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    /// Extra attempts after the first failure
    pub retry_count: u32,
    /// Pause before retry `n` is `n * retry_backoff`
    pub retry_backoff: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            retry_count: 0,
            retry_backoff: Duration::from_millis(250),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteKind {
    Create,
    Update,
    Delete,
}

impl fmt::Display for WriteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WriteKind::Create => "create",
            WriteKind::Update => "update",
            WriteKind::Delete => "delete",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    Create(TreeNode),
    Update(TreeNode),
    Delete(NodeId),
}

impl WriteOp {
    pub fn id(&self) -> NodeId {
        match self {
            WriteOp::Create(n) | WriteOp::Update(n) => n.id,
            WriteOp::Delete(id) => *id,
        }
    }

    pub fn kind(&self) -> WriteKind {
        match self {
            WriteOp::Create(_) => WriteKind::Create,
            WriteOp::Update(_) => WriteKind::Update,
            WriteOp::Delete(_) => WriteKind::Delete,
        }
    }

    fn mentions(&self, id: NodeId) -> bool {
        match self {
            WriteOp::Create(n) | WriteOp::Update(n) => n.id == id || n.parent_id == Some(id),
            WriteOp::Delete(target) => *target == id,
        }
    }

    /// Rewrite temporary ids the backend has since replaced.
    fn resolve(self, aliases: &HashMap<NodeId, NodeId>) -> Self {
        let map = |id: NodeId| aliases.get(&id).copied().unwrap_or(id);
        let remap_node = |mut n: TreeNode| {
            n.id = map(n.id);
            n.parent_id = n.parent_id.map(map);
            n
        };
        match self {
            WriteOp::Create(n) => WriteOp::Create(remap_node(n)),
            WriteOp::Update(n) => WriteOp::Update(remap_node(n)),
            WriteOp::Delete(id) => WriteOp::Delete(map(id)),
        }
    }
}

/// A write handed to the worker, tagged with a local sequence number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteWrite {
    pub seq: u64,
    pub op: WriteOp,
}

/// What happened to a write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    pub seq: u64,
    /// The write as sent, with aliases resolved
    pub op: WriteOp,
    /// Stored record for create/update, `None` for delete; error text on failure
    pub result: Result<Option<TreeNode>, String>,
    pub attempts: u32,
}

impl SyncOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

enum Command {
    Write(RemoteWrite),
    /// Owner adopted the server id for this temporary id
    ConfirmId(NodeId),
    /// Owner kept the temporary id; writes keep using it
    RejectId(NodeId),
    /// Reply with the number of writes still held back
    Flush(Sender<usize>),
}

/// Owner side of the background writer.
pub struct SyncQueue {
    commands: Option<Sender<Command>>,
    outcomes: Receiver<SyncOutcome>,
    worker: Option<JoinHandle<()>>,
    /// Outcomes produced locally when the worker is gone
    stranded: Vec<SyncOutcome>,
    /// Held-back writes reported by the last flush
    held: usize,
}

impl SyncQueue {
    pub fn spawn(remote: Arc<dyn RemoteStore>, options: SyncOptions) -> Self {
        let (command_tx, command_rx) = mpsc::channel();
        let (outcome_tx, outcome_rx) = mpsc::channel();
        let worker = thread::Builder::new()
            .name("orgtree-sync".into())
            .spawn(move || Worker::new(remote, options, outcome_tx).run(command_rx))
            .map_err(|e| warn!("cannot start sync worker: {}", e))
            .ok();

        Self {
            commands: worker.as_ref().map(|_| command_tx),
            outcomes: outcome_rx,
            worker,
            stranded: Vec::new(),
            held: 0,
        }
    }

    pub fn enqueue(&mut self, write: RemoteWrite) {
        trace!("enqueue: seq={} {} {}", write.seq, write.op.kind(), write.op.id());
        let Some(commands) = &self.commands else {
            self.strand(write);
            return;
        };
        if let Err(mpsc::SendError(Command::Write(write))) = commands.send(Command::Write(write)) {
            self.commands = None;
            self.strand(write);
        }
    }

    fn strand(&mut self, write: RemoteWrite) {
        warn!("sync worker unavailable, write seq={} not sent", write.seq);
        self.stranded.push(SyncOutcome {
            seq: write.seq,
            op: write.op,
            result: Err("sync worker unavailable".into()),
            attempts: 0,
        });
    }

    /// Later writes naming `temp` go to the id the backend assigned.
    pub fn confirm_id(&mut self, temp: NodeId) {
        self.send(Command::ConfirmId(temp));
    }

    /// Later writes naming `temp` keep using it.
    pub fn reject_id(&mut self, temp: NodeId) {
        self.send(Command::RejectId(temp));
    }

    fn send(&mut self, command: Command) {
        if let Some(commands) = &self.commands {
            if commands.send(command).is_err() {
                self.commands = None;
            }
        }
    }

    /// Outcomes that have arrived so far, without blocking.
    pub fn drain(&mut self) -> Vec<SyncOutcome> {
        let mut outcomes = std::mem::take(&mut self.stranded);
        outcomes.extend(self.outcomes.try_iter());
        outcomes
    }

    /// Block until every write enqueued so far has been attempted or held
    /// back, then drain.
    pub fn flush(&mut self) -> Vec<SyncOutcome> {
        self.held = 0;
        if let Some(commands) = &self.commands {
            let (ack_tx, ack_rx) = mpsc::channel();
            if commands.send(Command::Flush(ack_tx)).is_ok() {
                // Err means the worker exited; its outcomes are still queued
                self.held = ack_rx.recv().unwrap_or(0);
            }
        }
        self.drain()
    }

    /// Writes the worker held back at the last flush, waiting for an id decision.
    pub fn held(&self) -> usize {
        self.held
    }
}

impl Drop for SyncQueue {
    fn drop(&mut self) {
        // Closing the channel ends the worker loop
        self.commands.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("sync worker panicked");
            }
        }
    }
}

struct Worker {
    remote: Arc<dyn RemoteStore>,
    options: SyncOptions,
    outcomes: Sender<SyncOutcome>,
    /// Confirmed temporary id -> server id
    aliases: HashMap<NodeId, NodeId>,
    /// Server ids the owner has not decided on yet
    undecided: HashMap<NodeId, NodeId>,
    /// Writes waiting for a decision, in dispatch order
    held: VecDeque<RemoteWrite>,
}

impl Worker {
    fn new(
        remote: Arc<dyn RemoteStore>,
        options: SyncOptions,
        outcomes: Sender<SyncOutcome>,
    ) -> Self {
        Self {
            remote,
            options,
            outcomes,
            aliases: HashMap::new(),
            undecided: HashMap::new(),
            held: VecDeque::new(),
        }
    }

    fn run(mut self, commands: Receiver<Command>) {
        for command in commands {
            let owner_alive = match command {
                Command::Write(write) => self.submit(write),
                Command::ConfirmId(temp) => {
                    if let Some(server) = self.undecided.remove(&temp) {
                        self.aliases.insert(temp, server);
                    }
                    self.release()
                }
                Command::RejectId(temp) => {
                    self.undecided.remove(&temp);
                    self.release()
                }
                Command::Flush(ack) => {
                    let _ = ack.send(self.held.len());
                    true
                }
            };
            if !owner_alive {
                break;
            }
        }
        if !self.held.is_empty() {
            warn!("sync worker stopped with {} writes held back", self.held.len());
        }
        trace!("sync worker stopped");
    }

    fn blocked(&self, op: &WriteOp) -> bool {
        self.undecided.keys().any(|&temp| op.mentions(temp))
    }

    /// Returns false once the owner is gone.
    fn submit(&mut self, write: RemoteWrite) -> bool {
        if !self.held.is_empty() || self.blocked(&write.op) {
            trace!("holding back seq={} until id decision", write.seq);
            self.held.push_back(write);
            return true;
        }
        self.execute(write)
    }

    /// Send held writes in order until one is still blocked.
    fn release(&mut self) -> bool {
        while self.held.front().is_some_and(|w| !self.blocked(&w.op)) {
            let Some(write) = self.held.pop_front() else {
                break;
            };
            if !self.execute(write) {
                return false;
            }
        }
        true
    }

    fn execute(&mut self, write: RemoteWrite) -> bool {
        let op = write.op.resolve(&self.aliases);
        let (result, attempts) = execute_with_retry(self.remote.as_ref(), &op, self.options);

        if let (WriteOp::Create(sent), Ok(Some(stored))) = (&op, &result) {
            if stored.id != sent.id {
                debug!("backend assigned id {} to {}", stored.id, sent.id);
                self.undecided.insert(sent.id, stored.id);
            }
        }

        let outcome = SyncOutcome {
            seq: write.seq,
            op,
            result,
            attempts,
        };
        self.outcomes.send(outcome).is_ok()
    }
}

fn execute_with_retry(
    remote: &dyn RemoteStore,
    op: &WriteOp,
    options: SyncOptions,
) -> (Result<Option<TreeNode>, String>, u32) {
    let max_attempts = options.retry_count.saturating_add(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        let result = match op {
            WriteOp::Create(node) => remote.create(node).map(Some),
            WriteOp::Update(node) => remote.update(node.id, node).map(Some),
            WriteOp::Delete(id) => remote.remove(*id).map(|_| None),
        };
        match result {
            Ok(stored) => return (Ok(stored), attempt),
            Err(e) if attempt < max_attempts && e.is_retryable() => {
                warn!(
                    "{} {} failed (attempt {}/{}): {}",
                    op.kind(),
                    op.id(),
                    attempt,
                    max_attempts,
                    e
                );
                thread::sleep(options.retry_backoff * attempt);
            }
            Err(e) => return (Err(e.to_string()), attempt),
        }
    }
}
