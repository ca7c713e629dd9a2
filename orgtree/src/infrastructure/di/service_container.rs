//! Service container for dependency injection
//!
//! Wires up all services with their dependencies.

use std::sync::Arc;

use tracing::debug;

use crate::application::services::{EditorSession, TreeService};
use crate::application::ApplicationResult;
use crate::config::Settings;
use crate::infrastructure::remote::HttpRemoteStore;
use crate::infrastructure::traits::RemoteStore;

/// Container holding the settings and the remote store every service shares.
pub struct ServiceContainer {
    /// Application settings
    pub settings: Arc<Settings>,

    /// Backend the tree is persisted to
    pub remote: Arc<dyn RemoteStore>,
}

impl ServiceContainer {
    /// Create a new service container talking HTTP to `settings.base_url`.
    pub fn new(settings: Settings) -> ApplicationResult<Self> {
        let remote = HttpRemoteStore::new(settings.base_url.clone(), settings.request_timeout())?;
        debug!("remote store at {}", remote.collection_url());
        Ok(Self::with_deps(settings, Arc::new(remote)))
    }

    /// Create a service container with a custom remote store (for testing).
    pub fn with_deps(settings: Settings, remote: Arc<dyn RemoteStore>) -> Self {
        let settings = Arc::new(settings);

        Self { settings, remote }
    }

    /// A fresh, empty tree service; call `load()` to fill it.
    pub fn tree_service(&self) -> TreeService {
        TreeService::new(
            self.remote.clone(),
            self.settings.sync_policy,
            self.settings.sync_options(),
        )
    }

    pub fn editor_session(&self) -> EditorSession {
        EditorSession::new(self.tree_service())
    }
}
