//! Form payloads for adding and editing nodes, and their validation rules.

use std::fmt;

use itertools::Itertools;
use thiserror::Error;

use crate::domain::entities::{NodeId, NodeType, TreeNode};

pub const NAME_MAX_CHARS: usize = 50;
pub const DESCRIPTION_MIN_CHARS: usize = 5;
pub const DESCRIPTION_MAX_CHARS: usize = 200;

/// Raw, unvalidated form input as typed by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeForm {
    pub name: String,
    pub description: String,
    pub node_type: String,
}

/// What a submitted form is going to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormMode {
    /// Create a new node below `parent_id` (`None` = new root)
    Add { parent_id: Option<NodeId> },
    /// Overwrite the fields of an existing node
    Edit { node: TreeNode },
}

impl FormMode {
    pub fn is_edit(&self) -> bool {
        matches!(self, FormMode::Edit { .. })
    }

    /// Initial field values shown to the user.
    pub fn prefill(&self, default_type: NodeType) -> NodeForm {
        match self {
            FormMode::Add { .. } => NodeForm {
                name: String::new(),
                description: String::new(),
                node_type: default_type.to_string(),
            },
            FormMode::Edit { node } => NodeForm::from(node),
        }
    }
}

impl From<&TreeNode> for NodeForm {
    fn from(node: &TreeNode) -> Self {
        Self {
            name: node.name.clone(),
            description: node.description.clone(),
            node_type: node.node_type.to_string(),
        }
    }
}

/// Form content that passed every rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedForm {
    pub name: String,
    pub description: String,
    pub node_type: NodeType,
}

impl ValidatedForm {
    pub fn into_node(self, id: NodeId, parent_id: Option<NodeId>) -> TreeNode {
        TreeNode {
            id,
            name: self.name,
            description: self.description,
            node_type: self.node_type,
            parent_id,
        }
    }

    /// Merge onto an existing node; id and parent stay untouched.
    pub fn apply_to(self, node: &TreeNode) -> TreeNode {
        self.into_node(node.id, node.parent_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid form: {}", join_fields(.fields))]
pub struct FormError {
    pub fields: Vec<FieldError>,
}

impl FormError {
    pub fn has_field(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f.field == field)
    }
}

fn join_fields(fields: &[FieldError]) -> String {
    fields.iter().map(|f| f.to_string()).join("; ")
}

impl NodeForm {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        node_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            node_type: node_type.into(),
        }
    }

    /// Check all fields and report every violation at once.
    ///
    /// Surrounding whitespace is trimmed before lengths are counted (in chars).
    pub fn validate(&self) -> Result<ValidatedForm, FormError> {
        let mut fields = Vec::new();

        let name = self.name.trim();
        let name_len = name.chars().count();
        if name_len == 0 {
            fields.push(FieldError {
                field: "name",
                message: "name is required".into(),
            });
        } else if name_len > NAME_MAX_CHARS {
            fields.push(FieldError {
                field: "name",
                message: format!("name cannot exceed {NAME_MAX_CHARS} characters"),
            });
        }

        let description = self.description.trim();
        let description_len = description.chars().count();
        if description_len < DESCRIPTION_MIN_CHARS {
            fields.push(FieldError {
                field: "description",
                message: format!("description must be at least {DESCRIPTION_MIN_CHARS} characters"),
            });
        } else if description_len > DESCRIPTION_MAX_CHARS {
            fields.push(FieldError {
                field: "description",
                message: format!("description cannot exceed {DESCRIPTION_MAX_CHARS} characters"),
            });
        }

        let node_type = match self.node_type.parse::<NodeType>() {
            Ok(t) => Some(t),
            Err(_) => {
                fields.push(FieldError {
                    field: "type",
                    message: format!(
                        "type must be one of institute, school, department, teacher (got '{}')",
                        self.node_type.trim()
                    ),
                });
                None
            }
        };

        match node_type {
            Some(node_type) if fields.is_empty() => Ok(ValidatedForm {
                name: name.to_string(),
                description: description.to_string(),
                node_type,
            }),
            _ => Err(FormError { fields }),
        }
    }
}
