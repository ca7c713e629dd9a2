//! Editor session: the operations a presentation layer drives.
//!
//! Holds at most one open form. Opening a new form replaces the old one.

use tracing::{debug, instrument};

use crate::application::services::tree::{MutationOutcome, TreeService};
use crate::application::{ApplicationError, ApplicationResult};
use crate::domain::{
    DomainError, ExpansionSet, FormMode, HierarchyNode, NodeForm, NodeId, NodeType,
};

pub struct EditorSession {
    service: TreeService,
    pending: Option<FormMode>,
}

impl EditorSession {
    pub fn new(service: TreeService) -> Self {
        Self {
            service,
            pending: None,
        }
    }

    pub fn service(&self) -> &TreeService {
        &self.service
    }

    pub fn service_mut(&mut self) -> &mut TreeService {
        &mut self.service
    }

    pub fn into_service(self) -> TreeService {
        self.service
    }

    /// Open the add form below `parent_id` (`None` for a new root).
    ///
    /// The type is pre-filled with the level below the parent.
    pub fn on_add(&mut self, parent_id: Option<NodeId>) -> ApplicationResult<NodeForm> {
        let default_type = match parent_id {
            None => NodeType::Institute,
            Some(pid) => {
                let parent = self
                    .service
                    .get(pid)
                    .ok_or(ApplicationError::NodeNotFound(pid))?;
                parent.node_type.child_type().unwrap_or_default()
            }
        };
        let mode = FormMode::Add { parent_id };
        let form = mode.prefill(default_type);
        self.pending = Some(mode);
        Ok(form)
    }

    /// Open the edit form for `id`, pre-filled with its current values.
    ///
    /// Unknown ids open nothing.
    pub fn on_edit(&mut self, id: NodeId) -> Option<NodeForm> {
        let node = self.service.get(id)?.clone();
        let mode = FormMode::Edit { node };
        let form = mode.prefill(NodeType::default());
        self.pending = Some(mode);
        Some(form)
    }

    pub fn on_delete(&mut self, id: NodeId) -> ApplicationResult<MutationOutcome> {
        self.service.delete(id)
    }

    pub fn on_toggle_expand(&mut self, id: NodeId) -> bool {
        self.service.toggle_expand(id)
    }

    /// Validate and apply the open form.
    ///
    /// The form stays open when validation or the mutation fails.
    #[instrument(level = "debug", skip(self, form))]
    pub fn submit(&mut self, form: &NodeForm) -> ApplicationResult<MutationOutcome> {
        let mode = self.pending.as_ref().ok_or(ApplicationError::NoPendingForm)?;
        let validated = form.validate().map_err(DomainError::from)?;

        let outcome = match mode {
            FormMode::Add { parent_id } => {
                let parent_id = parent_id.map(|pid| self.service.current_id(pid));
                let node = validated.into_node(self.service.generate_id(), parent_id);
                debug!("submit: add {}", node);
                self.service.add(node)?
            }
            FormMode::Edit { node } => {
                // The backend may have replaced the id since the form opened
                let id = self.service.current_id(node.id);
                let base = self.service.get(id).unwrap_or(node);
                let updated = validated.apply_to(base);
                debug!("submit: edit {}", updated);
                self.service.edit(updated)?
            }
        };
        self.pending = None;
        Ok(outcome)
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }

    pub fn pending(&self) -> Option<&FormMode> {
        self.pending.as_ref()
    }

    pub fn hierarchy(&self) -> Vec<HierarchyNode> {
        self.service.hierarchy()
    }

    pub fn expansion(&self) -> &ExpansionSet {
        self.service.expansion()
    }

    pub fn revision(&self) -> u64 {
        self.service.revision()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::application::services::sync::{SyncOptions, SyncPolicy};
    use crate::domain::TreeNode;
    use crate::infrastructure::MemoryRemoteStore;

    fn session() -> EditorSession {
        let remote = Arc::new(MemoryRemoteStore::new());
        let mut service = TreeService::new(
            remote,
            SyncPolicy::OptimisticNoRollback,
            SyncOptions::default(),
        );
        service.set_all(vec![
            TreeNode::new(1, "Inst", "An institute", NodeType::Institute, None),
            TreeNode::new(2, "Sch", "A school", NodeType::School, Some(1)),
        ]);
        EditorSession::new(service)
    }

    #[test]
    fn given_school_parent_when_opening_add_then_type_is_department() {
        let mut s = session();

        let form = s.on_add(Some(2)).unwrap();

        assert_eq!(form.node_type, "department");
        assert!(form.name.is_empty());
    }

    #[test]
    fn given_invalid_form_when_submitting_then_form_stays_open() {
        let mut s = session();
        s.on_add(None).unwrap();

        let result = s.submit(&NodeForm::new("", "tiny", "institute"));

        assert!(result.is_err());
        assert!(s.pending().is_some());
        assert_eq!(s.service().nodes().len(), 2);
    }

    #[test]
    fn given_edit_form_when_submitting_then_id_and_parent_preserved() {
        let mut s = session();
        let mut form = s.on_edit(2).unwrap();
        form.name = "Renamed".into();

        s.submit(&form).unwrap();

        let node = s.service().get(2).unwrap();
        assert_eq!(node.name, "Renamed");
        assert_eq!(node.parent_id, Some(1));
        assert!(s.pending().is_none());
    }

    #[test]
    fn given_no_open_form_when_submitting_then_error() {
        let mut s = session();

        let result = s.submit(&NodeForm::new("Name", "valid text", "school"));

        assert!(matches!(result, Err(ApplicationError::NoPendingForm)));
    }
}
