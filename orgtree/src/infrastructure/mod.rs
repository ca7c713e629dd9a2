//! Infrastructure layer: remote store implementations and DI container
//!
//! This layer implements I/O boundary traits and wires up services.

pub mod di;
pub mod error;
pub mod memory;
pub mod remote;
pub mod traits;

pub use error::{RemoteError, RemoteResult};
pub use memory::{MemoryRemoteStore, RemoteCall};
pub use remote::HttpRemoteStore;
pub use traits::RemoteStore;
