//! Application services
//!
//! Concrete service implementations that orchestrate domain logic.
//! Services depend on the `RemoteStore` boundary trait but are themselves
//! concrete structs, not traits.

pub mod session;
pub mod sync;
pub mod tree;

pub use session::EditorSession;
pub use sync::{SyncOptions, SyncOutcome, SyncPolicy, WriteKind, WriteOp};
pub use tree::{MutationOutcome, SyncFailure, TreeService};
