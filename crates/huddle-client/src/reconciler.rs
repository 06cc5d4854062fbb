//! Keeps the local view in line with the relay and the CRUD API.
//!
//! Live updates are merged as they arrive. After a reconnect the view is
//! rebuilt from fresh snapshots instead of replaying anything missed.

use std::collections::BTreeSet;
use std::sync::Arc;

use huddle_core::{RelayedUpdate, ResourceKey};
use tracing::{debug, info, warn};

use crate::crud::CrudApi;
use crate::errors::{ApplicationError, ClientError};
use crate::state::{ConnectionState, ConnectionStateMachine};
use crate::view::{LocalView, MergeOutcome};

/// What the transport must do after entering `Connected`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resync {
    /// Resources to (re-)join, in key order.
    pub joins: Vec<ResourceKey>,
    /// Whether every watched resource must be re-fetched.
    pub refetch: bool,
}

/// A watched resource whose re-fetch failed. Its previous copy is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    /// Resource that could not be fetched.
    pub resource_id: ResourceKey,
    /// Stable error code, e.g. `CONFLICT`.
    pub code: &'static str,
    /// Human-readable detail.
    pub message: String,
}

/// Result of [`Reconciler::refetch_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefetchReport {
    /// Resources now matching the CRUD API (including ones found deleted).
    pub refreshed: usize,
    /// Resources left at their previous copy.
    pub failures: Vec<FetchFailure>,
}

/// Client-side state: connection lifecycle, watched set, local view.
pub struct Reconciler {
    machine: ConnectionStateMachine,
    watched: BTreeSet<ResourceKey>,
    view: LocalView,
    crud: Arc<dyn CrudApi>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("state", &self.machine.state())
            .field("watched", &self.watched)
            .field("resources", &self.view.len())
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Disconnected reconciler reading snapshots from `crud`.
    pub fn new(crud: Arc<dyn CrudApi>) -> Self {
        Self {
            machine: ConnectionStateMachine::new(),
            watched: BTreeSet::new(),
            view: LocalView::new(),
            crud,
        }
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.machine.state()
    }

    /// Local copies of watched resources.
    pub fn view(&self) -> &LocalView {
        &self.view
    }

    /// Record that `key` is being viewed. Returns `false` if it already was.
    pub fn watch(&mut self, key: ResourceKey) -> bool {
        self.watched.insert(key)
    }

    /// Stop viewing `key` and drop its snapshot. Returns `false` if it was not watched.
    pub fn unwatch(&mut self, key: &ResourceKey) -> bool {
        let _ = self.view.remove(key);
        self.watched.remove(key)
    }

    /// Whether `key` is watched.
    pub fn is_watched(&self, key: &ResourceKey) -> bool {
        self.watched.contains(key)
    }

    /// Watched resources in key order.
    pub fn watched(&self) -> impl Iterator<Item = &ResourceKey> {
        self.watched.iter()
    }

    /// `Disconnected → Connecting`.
    pub fn begin_connecting(&mut self) -> Result<(), ClientError> {
        let _ = self.machine.transition(ConnectionState::Connecting)?;
        Ok(())
    }

    /// `Connecting | Connected → Disconnected`.
    pub fn on_disconnected(&mut self) -> Result<(), ClientError> {
        let _ = self.machine.transition(ConnectionState::Disconnected)?;
        Ok(())
    }

    /// `Connecting → Connected`, returning the joins to issue and whether
    /// this is a reconnect that needs a full re-fetch.
    pub fn on_connected(&mut self) -> Result<Resync, ClientError> {
        let _ = self.machine.transition(ConnectionState::Connected)?;
        let refetch = self.machine.was_connected();
        info!(
            watched = self.watched.len(),
            reconnect = refetch,
            "connected"
        );
        Ok(Resync {
            joins: self.watched.iter().cloned().collect(),
            refetch,
        })
    }

    /// Replace the local copy of `key` with a fresh snapshot.
    ///
    /// A resource that no longer exists is dropped from the view. The fetch
    /// result is discarded if `key` stopped being watched meanwhile.
    pub async fn refresh(&mut self, key: &ResourceKey) -> Result<(), ClientError> {
        match self.crud.fetch_resource(key).await {
            Ok(snapshot) => {
                if self.watched.contains(key) {
                    self.view.replace(snapshot);
                }
                Ok(())
            }
            Err(ClientError::Application(ApplicationError::NotFound(detail))) => {
                warn!(resource = %key, %detail, "watched resource is gone");
                let _ = self.view.remove(key);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Re-fetch every watched resource independently.
    ///
    /// A failed fetch keeps that resource's previous copy and is reported in
    /// the [`RefetchReport`]. Only [`ClientError::Auth`] aborts the pass.
    pub async fn refetch_all(&mut self) -> Result<RefetchReport, ClientError> {
        let keys: Vec<ResourceKey> = self.watched.iter().cloned().collect();
        let mut report = RefetchReport::default();
        for key in keys {
            match self.refresh(&key).await {
                Ok(()) => report.refreshed += 1,
                Err(e @ ClientError::Auth(_)) => return Err(e),
                Err(e) => {
                    warn!(
                        resource = %key,
                        code = e.code(),
                        error = %e,
                        "re-fetch failed, keeping previous copy"
                    );
                    report.failures.push(FetchFailure {
                        resource_id: key,
                        code: e.code(),
                        message: e.to_string(),
                    });
                }
            }
        }
        debug!(
            refreshed = report.refreshed,
            failed = report.failures.len(),
            "re-fetched watched resources"
        );
        Ok(report)
    }

    /// Merge a peer's change into the local view.
    ///
    /// Unwatched resources and entities missing from the snapshot are
    /// ignored. Nothing is queued for later.
    pub fn apply_update(&mut self, update: &RelayedUpdate) -> MergeOutcome {
        if !self.watched.contains(&update.resource_id) {
            debug!(resource = %update.resource_id, "update for unwatched resource dropped");
            return MergeOutcome::UnknownResource;
        }
        let outcome = self.view.merge(
            &update.resource_id,
            &update.entity_id,
            &update.changed_fields,
        );
        if outcome != MergeOutcome::Applied {
            debug!(
                resource = %update.resource_id,
                entity = %update.entity_id,
                ?outcome,
                "update dropped"
            );
        }
        outcome
    }
}
