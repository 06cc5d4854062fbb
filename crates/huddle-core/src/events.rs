//! Field-level update events.
//!
//! Each variant names the entity that changed and carries the overwritten
//! fields. Events are idempotent field overwrites: applying the same event
//! twice yields the same state, so the relay needs no ordering across
//! senders.
//!
//! Wire shape (camelCase, tagged by `kind`):
//!
//! ```json
//! {"kind":"blockUpdated","blockId":"block:7","changedFields":{"content":"hi"}}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::ProtocolError;
use crate::ids::EntityId;

/// Overwritten fields of an entity, keyed by field name.
pub type FieldMap = serde_json::Map<String, Value>;

/// Kind of entity an update targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    /// Editor page.
    Page,
    /// Block inside a page.
    Block,
    /// Task.
    Task,
    /// Subtask of a task.
    Subtask,
    /// CRM contact.
    Contact,
    /// Workspace.
    Workspace,
}

/// A field-level mutation emitted by one client for its room peers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum UpdateEvent {
    /// Page-level fields (title, icon, ...).
    PageUpdated {
        /// Page being changed.
        page_id: EntityId,
        /// New field values.
        changed_fields: FieldMap,
    },
    /// Block content or position.
    BlockUpdated {
        /// Block being changed.
        block_id: EntityId,
        /// New field values.
        changed_fields: FieldMap,
    },
    /// Task status, assignee, due date, ...
    TaskUpdated {
        /// Task being changed.
        task_id: EntityId,
        /// New field values.
        changed_fields: FieldMap,
    },
    /// Subtask fields.
    SubtaskUpdated {
        /// Subtask being changed.
        subtask_id: EntityId,
        /// New field values.
        changed_fields: FieldMap,
    },
    /// Contact fields.
    ContactUpdated {
        /// Contact being changed.
        contact_id: EntityId,
        /// New field values.
        changed_fields: FieldMap,
    },
    /// Workspace fields.
    WorkspaceUpdated {
        /// Workspace being changed.
        workspace_id: EntityId,
        /// New field values.
        changed_fields: FieldMap,
    },
}

impl UpdateEvent {
    /// The entity this event targets.
    #[must_use]
    pub fn entity_id(&self) -> &EntityId {
        match self {
            Self::PageUpdated { page_id: id, .. }
            | Self::BlockUpdated { block_id: id, .. }
            | Self::TaskUpdated { task_id: id, .. }
            | Self::SubtaskUpdated { subtask_id: id, .. }
            | Self::ContactUpdated { contact_id: id, .. }
            | Self::WorkspaceUpdated { workspace_id: id, .. } => id,
        }
    }

    /// Kind of the target entity.
    #[must_use]
    pub fn entity_kind(&self) -> EntityKind {
        match self {
            Self::PageUpdated { .. } => EntityKind::Page,
            Self::BlockUpdated { .. } => EntityKind::Block,
            Self::TaskUpdated { .. } => EntityKind::Task,
            Self::SubtaskUpdated { .. } => EntityKind::Subtask,
            Self::ContactUpdated { .. } => EntityKind::Contact,
            Self::WorkspaceUpdated { .. } => EntityKind::Workspace,
        }
    }

    /// The overwritten fields.
    #[must_use]
    pub fn changed_fields(&self) -> &FieldMap {
        match self {
            Self::PageUpdated { changed_fields, .. }
            | Self::BlockUpdated { changed_fields, .. }
            | Self::TaskUpdated { changed_fields, .. }
            | Self::SubtaskUpdated { changed_fields, .. }
            | Self::ContactUpdated { changed_fields, .. }
            | Self::WorkspaceUpdated { changed_fields, .. } => changed_fields,
        }
    }

    /// Build an event for `kind` from its parts.
    #[must_use]
    pub fn for_entity(kind: EntityKind, entity_id: EntityId, changed_fields: FieldMap) -> Self {
        match kind {
            EntityKind::Page => Self::PageUpdated {
                page_id: entity_id,
                changed_fields,
            },
            EntityKind::Block => Self::BlockUpdated {
                block_id: entity_id,
                changed_fields,
            },
            EntityKind::Task => Self::TaskUpdated {
                task_id: entity_id,
                changed_fields,
            },
            EntityKind::Subtask => Self::SubtaskUpdated {
                subtask_id: entity_id,
                changed_fields,
            },
            EntityKind::Contact => Self::ContactUpdated {
                contact_id: entity_id,
                changed_fields,
            },
            EntityKind::Workspace => Self::WorkspaceUpdated {
                workspace_id: entity_id,
                changed_fields,
            },
        }
    }

    /// Check the rules serde cannot express: a non-blank entity id and at
    /// least one changed field.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.entity_id().is_blank() {
            return Err(ProtocolError::InvalidEvent("entity id is empty".into()));
        }
        if self.changed_fields().is_empty() {
            return Err(ProtocolError::InvalidEvent(
                "changedFields must contain at least one field".into(),
            ));
        }
        Ok(())
    }
}
