//! Project session: the in-memory project and markers, mirrored to a
//! [`PersistentStore`].
//!
//! Every mutation follows the same two-phase shape: apply it in memory,
//! await the store, and undo the in-memory change if the store refuses. The
//! host therefore never shows a marker that is not persisted, and never loses
//! one that is.
//!
//! The session also owns the project lifecycle (restore on start-up, setup,
//! workspace, exit) and the entry points for archive save/load and report
//! export.

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;

use tracing::{error, info, warn};

use crate::archive::{self, ArchiveError, ArchivePackager, VirtualTree};
use crate::cluster::{self, ClusterDescriptor};
use crate::decode::{DecodeError, ImageDecoder};
use crate::doc::{Asset, FloorPlan, FormError, ImageSize, Marker, MarkerData, MarkerId, MarkerIdGen, MarkerStore, PlanPosition, Project};
use crate::export;
use crate::store::{PersistentStore, StoreError};
use crate::transform::Point;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("a photo is required")]
    MissingPhoto,
    #[error("a location is required")]
    MissingLocation,
    #[error("invalid form: {0}")]
    Form(#[from] FormError),
    #[error("a project name is required")]
    MissingName,
    #[error("at least one floor plan is required")]
    NoPlans,
    #[error("floor plan {0} does not exist")]
    NoSuchPlan(usize),
    #[error("floor plan {0} has not been measured yet")]
    PlanNotMeasured(usize),
    #[error("marker {0} does not exist")]
    NoSuchMarker(MarkerId),
    #[error("floor plan {name} still carries {count} markers")]
    PlanInUse { name: String, count: usize },
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
    #[error("image error: {0}")]
    Decode(#[from] DecodeError),
    #[error("archive error: {0}")]
    Archive(#[from] ArchiveError),
    #[error("project load failed: {0}")]
    LoadArchive(#[source] ArchiveError),
    #[error("project load failed: {0}")]
    LoadStore(#[source] StoreError),
}

impl SessionError {
    /// The load was aborted and storage wiped; the host should restart from a clean state.
    #[must_use]
    pub fn needs_reload(&self) -> bool {
        matches!(self, Self::LoadArchive(_) | Self::LoadStore(_))
    }
}

/// Which screen the project is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Stage {
    /// Naming the project and importing plans.
    #[default]
    Setup,
    /// Placing and editing markers.
    Workspace,
}

/// A marker being created or edited in the form.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerDraft {
    pub id: MarkerId,
    pub plan_index: usize,
    pub position: PlanPosition,
    pub seq: u32,
    pub data: MarkerData,
    /// Photo taken or chosen for the marker; required to save.
    pub photo: Option<Asset>,
    /// `false` when editing a stored marker.
    pub is_new: bool,
}

/// One project session over a persistent store.
pub struct Session<S> {
    store: S,
    stage: Stage,
    project: Project,
    markers: MarkerStore,
    current_plan: usize,
    ids: MarkerIdGen,
    /// Location of the most recently saved marker, offered for the next one.
    last_location: String,
    /// Form contents of the last save; floor and mezzanine carry over.
    last_form: MarkerData,
}

impl<S: PersistentStore> Session<S> {
    #[must_use]
    pub fn new(store: S) -> Self {
        Self {
            store,
            stage: Stage::Setup,
            project: Project::default(),
            markers: MarkerStore::new(),
            current_plan: 0,
            ids: MarkerIdGen::default(),
            last_location: String::new(),
            last_form: MarkerData::default(),
        }
    }

    // --- Queries ---

    #[must_use]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    #[must_use]
    pub fn project(&self) -> &Project {
        &self.project
    }

    #[must_use]
    pub fn markers(&self) -> &MarkerStore {
        &self.markers
    }

    #[must_use]
    pub fn current_plan(&self) -> usize {
        self.current_plan
    }

    #[must_use]
    pub fn last_location(&self) -> &str {
        &self.last_location
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    // --- Lifecycle ---

    /// Open the store and pick up a previous session.
    ///
    /// Returns `true` when a saved project with plans was found, in which case
    /// the session is already in the workspace.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Store`] if the store cannot be opened or read.
    pub async fn restore(&mut self) -> Result<bool, SessionError> {
        self.store.init().await?;
        let Some(project) = self.store.get_project().await? else {
            return Ok(false);
        };
        if project.floor_plans.is_empty() {
            return Ok(false);
        }
        let markers = self.store.get_all_markers().await?;
        info!(project = %project.name, plans = project.floor_plans.len(), markers = markers.len(), "session restored");
        self.enter_workspace(project, markers);
        Ok(true)
    }

    /// Set the project name during setup.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.project.name = name.into();
    }

    /// Append plans during setup. Nothing is persisted until [`Self::start_project`].
    pub fn add_plans(&mut self, plans: impl IntoIterator<Item = FloorPlan>) {
        self.project.floor_plans.extend(plans);
    }

    /// Add plans from the workspace, persist, and switch to the first new one.
    ///
    /// Returns the index of the first new plan.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NoPlans`] for an empty import, or
    /// [`SessionError::Store`] if the project cannot be saved; the import is
    /// then undone.
    pub async fn import_plans(&mut self, plans: Vec<FloorPlan>) -> Result<usize, SessionError> {
        if plans.is_empty() {
            return Err(SessionError::NoPlans);
        }
        let first_new = self.project.floor_plans.len();
        self.project.floor_plans.extend(plans);
        if let Err(e) = self.store.save_project(&self.project).await {
            self.project.floor_plans.truncate(first_new);
            return Err(e.into());
        }
        self.current_plan = first_new;
        Ok(first_new)
    }

    /// Rename a plan. Persisted right away in the workspace.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NoSuchPlan`] for a bad index, or
    /// [`SessionError::Store`] if the rename cannot be persisted; the old
    /// name is then put back.
    pub async fn rename_plan(&mut self, index: usize, name: impl Into<String>) -> Result<(), SessionError> {
        let plan = self.project.floor_plans.get_mut(index).ok_or(SessionError::NoSuchPlan(index))?;
        let old = std::mem::replace(&mut plan.name, name.into());
        if let Err(e) = self.persist_project().await {
            if let Some(plan) = self.project.floor_plans.get_mut(index) {
                plan.name = old;
            }
            return Err(e);
        }
        Ok(())
    }

    /// Remove a plan that no marker sits on. Markers on later plans are re-indexed.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::PlanInUse`] while markers reference the plan,
    /// [`SessionError::NoSuchPlan`] for a bad index, or
    /// [`SessionError::Store`] if the change cannot be persisted; memory and
    /// any markers already rewritten in the store are then restored.
    pub async fn remove_plan(&mut self, index: usize) -> Result<FloorPlan, SessionError> {
        let Some(plan) = self.project.floor_plans.get(index) else {
            return Err(SessionError::NoSuchPlan(index));
        };
        let count = self.markers.for_plan(index).count();
        if count > 0 {
            return Err(SessionError::PlanInUse { name: plan.name.clone(), count });
        }

        let saved_project = self.project.clone();
        let saved_markers = self.markers.clone();
        let saved_current = self.current_plan;

        let removed = self.project.floor_plans.remove(index);
        let shifted: Vec<Marker> = self
            .markers
            .iter()
            .filter(|m| m.plan_index > index)
            .map(|m| Marker { plan_index: m.plan_index - 1, ..m.clone() })
            .collect();
        for marker in &shifted {
            self.markers.upsert(marker.clone());
        }
        if self.current_plan >= self.project.floor_plans.len() || self.current_plan > index {
            self.current_plan = self.current_plan.saturating_sub(1);
        }

        if let Err(e) = self.persist_removal(&shifted).await {
            error!(error = %e, plan = index, "plan removal failed; restored");
            self.project = saved_project;
            self.markers = saved_markers;
            self.current_plan = saved_current;
            self.revert_removal(&shifted).await;
            return Err(e);
        }
        Ok(removed)
    }

    /// Shifted markers go first so the stored project never lists fewer
    /// plans than its markers point past.
    async fn persist_removal(&self, shifted: &[Marker]) -> Result<(), SessionError> {
        if self.stage != Stage::Workspace {
            return Ok(());
        }
        for marker in shifted {
            self.store.add_marker(marker).await?;
        }
        self.store.save_project(&self.project).await?;
        Ok(())
    }

    /// Put the pre-removal copies of `shifted` back in the store. Runs after
    /// memory has been restored.
    async fn revert_removal(&self, shifted: &[Marker]) {
        if self.stage != Stage::Workspace {
            return;
        }
        for original in shifted.iter().filter_map(|m| self.markers.get(m.id)) {
            if let Err(e) = self.store.add_marker(original).await {
                warn!(error = %e, marker = original.id, "could not restore marker after failed plan removal");
            }
        }
    }

    /// Leave setup: requires a name and at least one plan.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::MissingName`] or [`SessionError::NoPlans`] if
    /// setup is incomplete, or [`SessionError::Store`] if the project cannot
    /// be saved.
    pub async fn start_project(&mut self) -> Result<(), SessionError> {
        if self.project.name.trim().is_empty() {
            return Err(SessionError::MissingName);
        }
        if self.project.floor_plans.is_empty() {
            return Err(SessionError::NoPlans);
        }
        self.store.save_project(&self.project).await?;
        self.stage = Stage::Workspace;
        self.current_plan = 0;
        Ok(())
    }

    /// Switch the plan shown in the workspace.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NoSuchPlan`] for a bad index.
    pub fn select_plan(&mut self, index: usize) -> Result<(), SessionError> {
        if index >= self.project.floor_plans.len() {
            return Err(SessionError::NoSuchPlan(index));
        }
        self.current_plan = index;
        Ok(())
    }

    /// Wipe storage and start over.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Store`] if storage cannot be cleared; memory
    /// is left untouched in that case.
    pub async fn reset(&mut self) -> Result<(), SessionError> {
        self.store.clear_all().await?;
        self.clear_memory();
        Ok(())
    }

    /// Leave the project, optionally saving an archive first.
    ///
    /// The archive save is awaited before storage is cleared; if it fails,
    /// nothing is cleared.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Archive`] if the save fails, or
    /// [`SessionError::Store`] if storage cannot be cleared.
    pub async fn exit(&mut self, save_to: Option<&dyn ArchivePackager>) -> Result<(), SessionError> {
        if let Some(packager) = save_to {
            self.save_archive(packager).await?;
        }
        self.reset().await
    }

    // --- Plans ---

    /// Pixel size of a plan, decoding it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NoSuchPlan`] for a bad index, or
    /// [`SessionError::Decode`] if the image cannot be read.
    pub fn plan_size<D>(&mut self, index: usize, decoder: &D) -> Result<ImageSize, SessionError>
    where
        D: ImageDecoder + ?Sized,
    {
        let plan = self.project.floor_plans.get_mut(index).ok_or(SessionError::NoSuchPlan(index))?;
        if let Some(size) = plan.size {
            return Ok(size);
        }
        let size = decoder.dimensions(&plan.image)?;
        plan.size = Some(size);
        Ok(size)
    }

    /// Clusters for the current plan at an on-screen threshold. Empty until
    /// the plan has been measured.
    #[must_use]
    pub fn visible_clusters(&self, threshold_px: f64) -> Vec<ClusterDescriptor> {
        let Some(size) = self.project.floor_plans.get(self.current_plan).and_then(|p| p.size) else {
            return Vec::new();
        };
        cluster::cluster(self.markers.for_plan(self.current_plan), size, threshold_px)
    }

    // --- Markers ---

    /// Start a new marker at an image-pixel point on a plan.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NoSuchPlan`] for a bad index, or
    /// [`SessionError::PlanNotMeasured`] before [`Self::plan_size`] has run
    /// for that plan.
    pub fn draft_marker(&mut self, plan_index: usize, at: Point, now_ms: i64) -> Result<MarkerDraft, SessionError> {
        let plan = self.project.floor_plans.get(plan_index).ok_or(SessionError::NoSuchPlan(plan_index))?;
        let size = plan.size.ok_or(SessionError::PlanNotMeasured(plan_index))?;
        let position = PlanPosition::from_image_point(at, size).ok_or(SessionError::PlanNotMeasured(plan_index))?;
        Ok(MarkerDraft {
            id: self.ids.next_id(now_ms),
            plan_index,
            position,
            seq: self.markers.next_seq(),
            data: self.last_form.for_new_marker(&self.last_location),
            photo: None,
            is_new: true,
        })
    }

    /// Open a stored marker in the form.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NoSuchMarker`] if the id is unknown.
    pub fn edit_marker(&self, id: MarkerId) -> Result<MarkerDraft, SessionError> {
        let m = self.markers.get(id).ok_or(SessionError::NoSuchMarker(id))?;
        Ok(MarkerDraft {
            id: m.id,
            plan_index: m.plan_index,
            position: m.position,
            seq: m.seq,
            data: m.data.clone(),
            photo: Some(m.photo.clone()),
            is_new: false,
        })
    }

    /// Validate and commit a draft.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::MissingPhoto`],
    /// [`SessionError::MissingLocation`] or [`SessionError::Form`] without
    /// touching anything,
    /// [`SessionError::NoSuchPlan`] if the plan is gone, or
    /// [`SessionError::Store`] if persisting fails; the in-memory change is
    /// then rolled back.
    pub async fn save_marker(&mut self, draft: MarkerDraft) -> Result<Marker, SessionError> {
        let photo = draft.photo.filter(|p| !p.is_empty()).ok_or(SessionError::MissingPhoto)?;
        if draft.data.location.trim().is_empty() {
            return Err(SessionError::MissingLocation);
        }
        draft.data.check()?;
        if draft.plan_index >= self.project.floor_plans.len() {
            return Err(SessionError::NoSuchPlan(draft.plan_index));
        }

        let marker = Marker {
            id: draft.id,
            plan_index: draft.plan_index,
            position: draft.position,
            seq: draft.seq,
            data: draft.data,
            photo,
        };
        let high_water = self.markers.seq_high_water();
        let previous = self.markers.upsert(marker.clone());

        if let Err(e) = self.store.add_marker(&marker).await {
            error!(error = %e, marker = marker.id, "marker save failed; rolled back");
            match previous {
                Some(old) => {
                    self.markers.upsert(old);
                }
                None => {
                    self.markers.remove(marker.id);
                }
            }
            self.markers.rewind_seq_high_water(high_water);
            return Err(e.into());
        }

        self.last_location.clone_from(&marker.data.location);
        self.last_form = marker.data.clone();
        Ok(marker)
    }

    /// Delete a marker.
    ///
    /// When the newest sequence number goes away, the project record is
    /// updated first so the number stays retired across restarts.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NoSuchMarker`] if the id is unknown, or
    /// [`SessionError::Store`] if persisting fails; the marker is then put
    /// back where it was.
    pub async fn delete_marker(&mut self, id: MarkerId) -> Result<Marker, SessionError> {
        let (index, marker) = self.markers.remove(id).ok_or(SessionError::NoSuchMarker(id))?;
        let saved_high_water = self.project.seq_high_water;

        if let Err(e) = self.persist_delete(&marker).await {
            error!(error = %e, marker = id, "marker delete failed; restored");
            self.project.seq_high_water = saved_high_water;
            self.markers.restore_at(index, marker);
            return Err(e);
        }
        Ok(marker)
    }

    async fn persist_delete(&mut self, marker: &Marker) -> Result<(), SessionError> {
        if marker.seq > self.project.seq_high_water {
            self.project.seq_high_water = self.markers.seq_high_water();
            self.store.save_project(&self.project).await?;
        }
        self.store.delete_marker(marker.id).await?;
        Ok(())
    }

    // --- Archives ---

    /// Pack the project and hand it to `packager`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Archive`] if packing or packaging fails.
    pub async fn save_archive(&self, packager: &dyn ArchivePackager) -> Result<String, SessionError> {
        let mut project = self.project.clone();
        project.seq_high_water = project.seq_high_water.max(self.markers.seq_high_water());
        let bundle = archive::pack_project(&project, &self.markers)?;
        packager.pack(&bundle.file_name, &bundle.tree).await?;
        info!(file = %bundle.file_name, markers = self.markers.len(), "project archive saved");
        Ok(bundle.file_name)
    }

    /// Replace everything with the contents of an archive.
    ///
    /// # Errors
    ///
    /// On any failure storage is wiped, memory emptied, and a
    /// [`SessionError::LoadArchive`] or [`SessionError::LoadStore`] is
    /// returned; [`SessionError::needs_reload`] is `true` for both.
    pub async fn load_archive<D>(&mut self, tree: &VirtualTree, decoder: &D) -> Result<(), SessionError>
    where
        D: ImageDecoder + ?Sized,
    {
        let loaded = match archive::unpack_project(tree, decoder) {
            Ok(loaded) => loaded,
            Err(e) => return Err(self.abort_load(SessionError::LoadArchive(e)).await),
        };
        if let Err(e) = self.replace_stored(&loaded.project, &loaded.markers).await {
            return Err(self.abort_load(SessionError::LoadStore(e)).await);
        }
        info!(project = %loaded.project.name, markers = loaded.markers.len(), "project archive loaded");
        self.enter_workspace(loaded.project, loaded.markers);
        Ok(())
    }

    async fn replace_stored(&self, project: &Project, markers: &[Marker]) -> Result<(), StoreError> {
        self.store.clear_all().await?;
        self.store.save_project(project).await?;
        for marker in markers {
            self.store.add_marker(marker).await?;
        }
        Ok(())
    }

    async fn abort_load(&mut self, err: SessionError) -> SessionError {
        error!(error = %err, "project load aborted");
        if let Err(e) = self.store.clear_all().await {
            warn!(error = %e, "could not clear storage after failed load");
        }
        self.clear_memory();
        err
    }

    // --- Export ---

    /// Build the report and hand it to `packager`.
    ///
    /// Returns the names of plans whose map could not be rendered.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Archive`] if packaging fails.
    pub async fn export_report<D>(&self, decoder: &D, packager: &dyn ArchivePackager) -> Result<Vec<String>, SessionError>
    where
        D: ImageDecoder + ?Sized,
    {
        let report = export::build_report(&self.project, &self.markers, decoder);
        packager.pack(&report.bundle.file_name, &report.bundle.tree).await?;
        Ok(report.skipped_plans)
    }

    // --- Internals ---

    async fn persist_project(&self) -> Result<(), SessionError> {
        if self.stage == Stage::Workspace {
            self.store.save_project(&self.project).await?;
        }
        Ok(())
    }

    fn enter_workspace(&mut self, project: Project, markers: Vec<Marker>) {
        self.markers.load_snapshot(markers, project.seq_high_water);
        self.project = project;
        self.ids = MarkerIdGen::after(self.markers.max_id());
        self.last_location = self.markers.last_location().unwrap_or_default().to_owned();
        self.last_form = MarkerData::default();
        self.current_plan = 0;
        self.stage = Stage::Workspace;
    }

    fn clear_memory(&mut self) {
        self.project = Project::default();
        self.markers.clear();
        self.current_plan = 0;
        self.last_location.clear();
        self.last_form = MarkerData::default();
        self.stage = Stage::Setup;
    }
}
