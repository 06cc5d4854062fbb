//! Locally held copies of watched resources.

use std::collections::{BTreeMap, HashMap};

use huddle_core::{EntityId, FieldMap, ResourceKey};
use serde::{Deserialize, Serialize};

/// Authoritative state of one resource as returned by the CRUD API.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSnapshot {
    /// Resource this snapshot describes.
    pub resource_id: ResourceKey,
    /// Every entity under the resource, with its current fields.
    #[serde(default)]
    pub entities: BTreeMap<EntityId, FieldMap>,
}

impl ResourceSnapshot {
    /// Empty snapshot for `resource_id`.
    pub fn new(resource_id: ResourceKey) -> Self {
        Self {
            resource_id,
            entities: BTreeMap::new(),
        }
    }

    /// Builder-style entity insert.
    #[must_use]
    pub fn with_entity(mut self, entity_id: impl Into<EntityId>, fields: FieldMap) -> Self {
        let _ = self.entities.insert(entity_id.into(), fields);
        self
    }

    /// Fields of one entity.
    pub fn entity(&self, entity_id: &EntityId) -> Option<&FieldMap> {
        self.entities.get(entity_id)
    }
}

/// Result of merging an update into the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Fields were overwritten.
    Applied,
    /// No snapshot held for the resource.
    UnknownResource,
    /// Snapshot held, but the entity is not in it.
    UnknownEntity,
}

/// Snapshots keyed by resource.
#[derive(Debug, Default, Clone)]
pub struct LocalView {
    resources: HashMap<ResourceKey, ResourceSnapshot>,
}

impl LocalView {
    /// Empty view.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace whatever is held for the snapshot's resource.
    pub fn replace(&mut self, snapshot: ResourceSnapshot) {
        let _ = self
            .resources
            .insert(snapshot.resource_id.clone(), snapshot);
    }

    /// Drop the snapshot for `key`.
    pub fn remove(&mut self, key: &ResourceKey) -> Option<ResourceSnapshot> {
        self.resources.remove(key)
    }

    /// Snapshot held for `key`.
    pub fn get(&self, key: &ResourceKey) -> Option<&ResourceSnapshot> {
        self.resources.get(key)
    }

    /// Fields of one entity.
    pub fn entity(&self, key: &ResourceKey, entity_id: &EntityId) -> Option<&FieldMap> {
        self.get(key).and_then(|s| s.entity(entity_id))
    }

    /// Number of resources held.
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Whether no resources are held.
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Overwrite `changed` fields on an entity that is already present.
    ///
    /// Fields not named in `changed` keep their values. Absent entities are
    /// never created here.
    pub fn merge(
        &mut self,
        key: &ResourceKey,
        entity_id: &EntityId,
        changed: &FieldMap,
    ) -> MergeOutcome {
        let Some(snapshot) = self.resources.get_mut(key) else {
            return MergeOutcome::UnknownResource;
        };
        let Some(fields) = snapshot.entities.get_mut(entity_id) else {
            return MergeOutcome::UnknownEntity;
        };
        for (name, value) in changed {
            let _ = fields.insert(name.clone(), value.clone());
        }
        MergeOutcome::Applied
    }
}
