//! Route editing session: the one place that coordinates the draft with
//! its remote and local collaborators.
//!
//! Every public mutation flows through the session so the side effects
//! around an edit happen in one place: the crash-recovery snapshot is
//! written after each change (new-route mode only), a removed stop redraws
//! the path preview, and an edit to a persisted stop is pushed to the
//! store. Side effects are best-effort by contract; their failures are
//! logged and reported, never turned into errors.
//!
//! `optimize` is the state machine transition. Its steps run strictly in
//! sequence: ensure the route exists remotely, refresh the persisted
//! per-stop constraints, call the optimizer, reconcile the outcome into
//! the draft, then redraw the path. The draft's status only moves on a
//! confirmed optimizer response; a transport failure surfaces the error
//! and leaves local state exactly as it was.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::directory::{CustomerDirectory, DebounceProfile, DebouncedSearch};
use crate::draft::{
    AddOutcome, BatchAddReport, DraftError, RouteDraft, StopUpdate, UpdateReport,
};
use crate::model::{Customer, CustomerId, RouteId, RouteMetadata, StopDefaults, StopEntry};
use crate::optimizer_data::{Objective, OptimizeRequest};
use crate::path::RoutePath;
use crate::reconcile::{self, ReconcileSummary};
use crate::snapshot::DraftSnapshot;
use crate::traits::{
    BackendError, DirectionsProvider, DraftStore, OptimizerApi, RouteBackend, StopConstraint,
    StoreError,
};

#[derive(Debug, Error)]
pub enum SessionError {
    /// The draft cannot do this yet; the guidance says what to fix first.
    #[error("route is not ready: {guidance}")]
    NotReady { guidance: &'static str },
    #[error(transparent)]
    Draft(#[from] DraftError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Fate of one best-effort side effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SideEffect {
    /// Not applicable in the current mode or state.
    #[default]
    Skipped,
    Done,
    /// Attempted and failed; the failure is logged, never propagated.
    Failed,
}

/// A draft mutation's primary result plus the fate of its side effects.
#[derive(Debug, Clone, PartialEq)]
pub struct Mutation<T> {
    pub result: T,
    /// Crash-recovery snapshot write.
    pub snapshot: SideEffect,
    /// Single-stop push to the remote store.
    pub remote: SideEffect,
    /// Route path preview redraw.
    pub path_redraw: SideEffect,
}

impl<T> Mutation<T> {
    fn local(result: T, snapshot: SideEffect) -> Self {
        Self {
            result,
            snapshot,
            remote: SideEffect::Skipped,
            path_redraw: SideEffect::Skipped,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    /// Drafting a route that has never been submitted; edits are
    /// snapshotted locally for crash recovery.
    NewRoute,
    /// Editing a persisted route; the remote store is authoritative and no
    /// local snapshot is kept.
    EditExisting,
}

#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    pub avoid_tolls: bool,
    pub stop_defaults: StopDefaults,
    pub debounce: DebounceProfile,
}

/// The injected capabilities a session works against.
pub struct Collaborators {
    pub directory: Arc<CustomerDirectory>,
    pub backend: Arc<dyn RouteBackend>,
    pub optimizer: Arc<dyn OptimizerApi>,
    pub directions: Arc<dyn DirectionsProvider>,
    pub store: Box<dyn DraftStore>,
}

pub struct RouteSession {
    draft: RouteDraft,
    directory: Arc<CustomerDirectory>,
    backend: Arc<dyn RouteBackend>,
    optimizer: Arc<dyn OptimizerApi>,
    directions: Arc<dyn DirectionsProvider>,
    store: Box<dyn DraftStore>,
    mode: SessionMode,
    config: SessionConfig,
    path: Option<RoutePath>,
}

impl std::fmt::Debug for RouteSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteSession")
            .field("draft", &self.draft)
            .field("mode", &self.mode)
            .field("config", &self.config)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl RouteSession {
    /// Starts an empty new-route session.
    pub fn new_route(collaborators: Collaborators, config: SessionConfig) -> Self {
        let draft = RouteDraft::new(config.stop_defaults);
        Self::with_draft(draft, SessionMode::NewRoute, collaborators, config)
    }

    /// Opens a persisted route for editing. Stops whose customer has left
    /// the workspace directory are dropped with a warning.
    pub async fn edit_existing(
        route_id: RouteId,
        collaborators: Collaborators,
        config: SessionConfig,
    ) -> Result<Self, SessionError> {
        let persisted = collaborators.backend.load_route(route_id).await?;

        let mut stops = Vec::with_capacity(persisted.stops.len());
        for row in persisted.stops {
            let Some(customer) = collaborators.directory.get(row.customer_id) else {
                warn!(customer = %row.customer_id, "persisted stop references unknown customer, dropping");
                continue;
            };
            let mut entry = StopEntry::new(customer, config.stop_defaults);
            entry.route_stop_id = Some(row.route_stop_id);
            entry.override_window = row.override_window;
            entry.position = row.position;
            entry.service_minutes = row.service_minutes.max(1);
            entry.signature_required = row.signature_required;
            entry.photo_required = row.photo_required;
            entry.notes = row.notes;
            stops.push(entry);
        }

        let draft = RouteDraft::from_persisted(
            persisted.route_id,
            persisted.metadata,
            stops,
            config.stop_defaults,
        );
        Ok(Self::with_draft(
            draft,
            SessionMode::EditExisting,
            collaborators,
            config,
        ))
    }

    /// Resumes an interrupted new-route session from the local snapshot.
    /// `None` when there is nothing to recover.
    pub fn recover(
        collaborators: Collaborators,
        config: SessionConfig,
    ) -> Result<Option<Self>, SessionError> {
        let Some(snapshot) = collaborators.store.load()? else {
            return Ok(None);
        };
        let draft = snapshot.restore(&collaborators.directory, config.stop_defaults);
        Ok(Some(Self::with_draft(
            draft,
            SessionMode::NewRoute,
            collaborators,
            config,
        )))
    }

    fn with_draft(
        draft: RouteDraft,
        mode: SessionMode,
        collaborators: Collaborators,
        config: SessionConfig,
    ) -> Self {
        Self {
            draft,
            directory: collaborators.directory,
            backend: collaborators.backend,
            optimizer: collaborators.optimizer,
            directions: collaborators.directions,
            store: collaborators.store,
            mode,
            config,
            path: None,
        }
    }

    pub fn draft(&self) -> &RouteDraft {
        &self.draft
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    /// Last traced path preview, if any.
    pub fn path(&self) -> Option<&RoutePath> {
        self.path.as_ref()
    }

    /// Debounced search handle over the session's customer directory.
    pub fn searcher(&self) -> DebouncedSearch {
        DebouncedSearch::new(Arc::clone(&self.directory), self.config.debounce)
    }

    // ========================================================================
    // Draft mutations
    // ========================================================================

    pub fn add_stop(&mut self, customer: Arc<Customer>) -> Result<Mutation<AddOutcome>, DraftError> {
        let outcome = self.draft.add_stop(customer)?;
        Ok(Mutation::local(outcome, self.save_snapshot()))
    }

    pub fn add_stops<I>(&mut self, customers: I) -> Result<Mutation<BatchAddReport>, DraftError>
    where
        I: IntoIterator<Item = Arc<Customer>>,
    {
        let report = self.draft.add_stops(customers)?;
        Ok(Mutation::local(report, self.save_snapshot()))
    }

    /// Removes a stop and redraws the path preview for the shorter route.
    pub async fn remove_stop(
        &mut self,
        customer: CustomerId,
    ) -> Result<Mutation<StopEntry>, DraftError> {
        let removed = self.draft.remove_stop(customer)?;
        let snapshot = self.save_snapshot();
        let path_redraw = self.redraw_path().await;
        Ok(Mutation {
            result: removed,
            snapshot,
            remote: SideEffect::Skipped,
            path_redraw,
        })
    }

    pub fn reorder_stops(&mut self, order: &[CustomerId]) -> Result<Mutation<()>, DraftError> {
        self.draft.reorder_stops(order)?;
        Ok(Mutation::local((), self.save_snapshot()))
    }

    /// Edits one stop; when the route and the stop both have remote
    /// identities the change is also pushed to the store, best-effort. An
    /// update with nothing in it is a cancelled edit upstream and triggers
    /// no side effects at all.
    pub async fn update_stop(
        &mut self,
        index: usize,
        update: StopUpdate,
    ) -> Result<Mutation<UpdateReport>, DraftError> {
        let report = self.draft.update_stop(index, update)?;
        if report.ignored_empty {
            return Ok(Mutation::local(report, SideEffect::Skipped));
        }
        let snapshot = self.save_snapshot();
        let remote = self.push_stop(index).await;
        Ok(Mutation {
            result: report,
            snapshot,
            remote,
            path_redraw: SideEffect::Skipped,
        })
    }

    pub fn set_metadata(&mut self, metadata: RouteMetadata) -> Mutation<()> {
        self.draft.metadata = metadata;
        Mutation::local((), self.save_snapshot())
    }

    /// Moves an excluded stop back into the draft; the stop set changed, so
    /// the draft needs re-optimization afterwards.
    pub fn restore_excluded(&mut self, customer: CustomerId) -> Result<Mutation<()>, DraftError> {
        self.draft.restore_excluded(customer)?;
        Ok(Mutation::local((), self.save_snapshot()))
    }

    /// Discards the draft and its snapshot.
    pub fn reset(&mut self) -> Mutation<()> {
        self.draft.reset();
        self.path = None;
        Mutation::local((), self.clear_snapshot())
    }

    // ========================================================================
    // Lifecycle transitions
    // ========================================================================

    /// Runs one optimization pass and reconciles the outcome into the
    /// draft.
    ///
    /// A route with no remote identity is created first; the optimizer
    /// works against persisted state, so every stop's order code and
    /// effective window are pushed before the run (best-effort; the run
    /// proceeds on last persisted constraints if the push fails). Transport
    /// errors surface verbatim with the draft untouched.
    pub async fn optimize(&mut self) -> Result<ReconcileSummary, SessionError> {
        self.check_ready()?;

        let route_id = match self.draft.route_id() {
            Some(id) => id,
            None => {
                let created = self
                    .backend
                    .create_route(&self.draft.metadata, self.draft.stops())
                    .await?;
                debug!(route_id = %created.route_id, "route persisted ahead of optimization");
                self.draft
                    .assign_remote_identity(created.route_id, &created.stop_ids);
                created.route_id
            }
        };

        let constraints: Vec<StopConstraint> = self
            .draft
            .stops()
            .iter()
            .map(StopConstraint::from_entry)
            .collect();
        if let Err(e) = self.backend.push_stop_constraints(route_id, &constraints).await {
            warn!(error = %e, %route_id, "constraint push failed, optimizing with last persisted constraints");
        }

        let response = self
            .optimizer
            .optimize(OptimizeRequest {
                route_id,
                objective: Objective::Distance,
                avoid_tolls: self.config.avoid_tolls,
            })
            .await?;

        let summary =
            reconcile::apply_outcome(&mut self.draft, response.classify(), &self.directory);

        self.redraw_path().await;
        self.save_snapshot();

        Ok(summary)
    }

    /// Final submission: persists the route, clears the session's own
    /// recovery snapshot (new-route mode only) and resets the draft for the
    /// next one.
    pub async fn submit(&mut self) -> Result<RouteId, SessionError> {
        if self.draft.stops().is_empty() {
            return Err(SessionError::NotReady {
                guidance: "add at least one stop before submitting",
            });
        }
        if self.draft.metadata.name.trim().is_empty() {
            return Err(SessionError::NotReady {
                guidance: "name the route before submitting",
            });
        }

        let route_id = match self.draft.route_id() {
            Some(id) => {
                self.backend
                    .save_route(id, &self.draft.metadata, self.draft.stops())
                    .await?;
                id
            }
            None => {
                self.backend
                    .create_route(&self.draft.metadata, self.draft.stops())
                    .await?
                    .route_id
            }
        };
        debug!(%route_id, "route submitted");

        self.clear_snapshot();
        self.draft.reset();
        self.path = None;
        Ok(route_id)
    }

    fn check_ready(&self) -> Result<(), SessionError> {
        if self.draft.stops().len() < 2 {
            return Err(SessionError::NotReady {
                guidance: "add at least two stops before optimizing",
            });
        }
        if self.draft.metadata.depot.is_none() {
            return Err(SessionError::NotReady {
                guidance: "choose a depot before optimizing",
            });
        }
        if self.draft.metadata.name.trim().is_empty() {
            return Err(SessionError::NotReady {
                guidance: "name the route before optimizing",
            });
        }
        Ok(())
    }

    // ========================================================================
    // Best-effort side effects
    // ========================================================================

    fn save_snapshot(&self) -> SideEffect {
        if self.mode != SessionMode::NewRoute {
            return SideEffect::Skipped;
        }
        match self.store.save(&DraftSnapshot::capture(&self.draft)) {
            Ok(()) => SideEffect::Done,
            Err(e) => {
                warn!(error = %e, "draft snapshot write failed");
                SideEffect::Failed
            }
        }
    }

    fn clear_snapshot(&self) -> SideEffect {
        if self.mode != SessionMode::NewRoute {
            return SideEffect::Skipped;
        }
        match self.store.clear() {
            Ok(()) => SideEffect::Done,
            Err(e) => {
                warn!(error = %e, "draft snapshot clear failed");
                SideEffect::Failed
            }
        }
    }

    async fn redraw_path(&mut self) -> SideEffect {
        let waypoints: Vec<(f64, f64)> = self
            .draft
            .stops()
            .iter()
            .map(|stop| stop.customer.location)
            .collect();
        if waypoints.len() < 2 {
            self.path = None;
            return SideEffect::Skipped;
        }
        match self.directions.trace(&waypoints).await {
            Ok(path) => {
                self.path = Some(path);
                SideEffect::Done
            }
            Err(e) => {
                warn!(error = %e, "route path redraw failed");
                SideEffect::Failed
            }
        }
    }

    async fn push_stop(&self, index: usize) -> SideEffect {
        let Some(route_id) = self.draft.route_id() else {
            return SideEffect::Skipped;
        };
        let Some(stop) = self.draft.stops().get(index) else {
            return SideEffect::Skipped;
        };
        let Some(stop_id) = stop.route_stop_id else {
            return SideEffect::Skipped;
        };
        match self.backend.update_stop(route_id, stop_id, stop).await {
            Ok(()) => SideEffect::Done,
            Err(e) => {
                warn!(error = %e, %route_id, %stop_id, "remote stop update failed");
                SideEffect::Failed
            }
        }
    }
}
