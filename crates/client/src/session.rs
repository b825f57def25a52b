//! Per-user session context.
//!
//! [`Session`] is the single owner of everything a flow may read or
//! change: the persistent store, the panel model, the viewport and the
//! slice viewer of the phantom on display. Flows take it by `&mut`.

use koma_core::error::CoreError;
use koma_core::geometry::SlicePlane;
use koma_core::types::{JobId, Vec3, Viewport};
use koma_core::view_state::{
    MapMode, PersistedMode, ResultMode, SeqMode, ViewerMode, KEY_JOB_ID, KEY_PHANTOM, KEY_TOKEN,
    KEY_USERNAME,
};
use koma_core::viewer::SliceViewer;

use crate::error::ClientError;
use crate::panel::PanelState;
use crate::store::PersistentStore;

pub struct Session {
    store: PersistentStore,
    pub panel: PanelState,
    viewport: Viewport,
    viewer: Option<SliceViewer>,
}

impl Session {
    /// Build a session whose panels reflect the persisted modes.
    pub fn open(store: PersistentStore, viewport: Viewport) -> Self {
        let panel = PanelState::new(store.mode(), store.mode(), store.mode());
        Self {
            store,
            panel,
            viewport,
            viewer: None,
        }
    }

    pub fn store(&self) -> &PersistentStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut PersistentStore {
        &mut self.store
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn viewer(&self) -> Option<&SliceViewer> {
        self.viewer.as_ref()
    }

    pub fn set_viewer(&mut self, viewer: Option<SliceViewer>) {
        self.viewer = viewer;
    }

    /// Phantom last put on display, kept across sessions.
    pub fn current_phantom(&self) -> Option<&str> {
        self.store.get(KEY_PHANTOM)
    }

    pub fn set_current_phantom(&mut self, phantom: &str) -> Result<(), ClientError> {
        self.store.set(KEY_PHANTOM, phantom)?;
        Ok(())
    }

    // ---- persisted modes ----

    pub fn viewer_mode(&self) -> ViewerMode {
        self.store.mode()
    }

    pub fn map_mode(&self) -> MapMode {
        self.store.mode()
    }

    pub fn result_mode(&self) -> ResultMode {
        self.store.mode()
    }

    pub fn seq_mode(&self) -> SeqMode {
        self.store.mode()
    }

    /// Returns `false` and leaves everything untouched when `mode` is
    /// already active.
    pub fn set_viewer_mode(&mut self, mode: ViewerMode) -> Result<bool, ClientError> {
        let changed = self.persist(mode)?;
        if changed {
            self.panel.set_viewer_mode(mode);
        }
        Ok(changed)
    }

    /// Persist the map mode. Reloading the phantom is up to the caller,
    /// see [`crate::plots::change_map_mode`].
    pub fn set_map_mode(&mut self, mode: MapMode) -> Result<bool, ClientError> {
        self.persist(mode)
    }

    pub fn set_result_mode(&mut self, mode: ResultMode) -> Result<bool, ClientError> {
        let changed = self.persist(mode)?;
        if changed {
            self.panel.set_result_mode(mode);
        }
        Ok(changed)
    }

    pub fn set_seq_mode(&mut self, mode: SeqMode) -> Result<bool, ClientError> {
        let changed = self.persist(mode)?;
        if changed {
            self.panel.set_seq_mode(mode);
        }
        Ok(changed)
    }

    /// Persist modes the panel switched by itself, e.g. to reveal the
    /// output of a finished job.
    pub fn persist_panel_modes(&mut self) -> Result<(), ClientError> {
        let viewer = self.panel.viewer_mode();
        if viewer != self.viewer_mode() {
            self.persist(viewer)?;
        }
        let result = self.panel.result_mode();
        if result != self.result_mode() {
            self.persist(result)?;
        }
        let seq = self.panel.seq_mode();
        if seq != self.seq_mode() {
            self.persist(seq)?;
        }
        Ok(())
    }

    /// Re-apply the persisted viewer mode to the panels.
    pub fn apply_viewer_mode(&mut self) {
        let mode = self.viewer_mode();
        self.panel.set_viewer_mode(mode);
    }

    fn persist<M: PersistedMode>(&mut self, mode: M) -> Result<bool, ClientError> {
        if self.store.mode::<M>() == mode && self.store.get(M::KEY).is_some() {
            return Ok(false);
        }
        let changed = self.store.set_mode(mode)?;
        if changed {
            tracing::info!(key = M::KEY, value = %mode, "Mode changed");
        }
        Ok(changed)
    }

    // ---- identity and job ----

    pub fn token(&self) -> Option<&str> {
        self.store.get(KEY_TOKEN)
    }

    pub fn set_token(&mut self, token: &str) -> Result<(), ClientError> {
        self.store.set(KEY_TOKEN, token)?;
        Ok(())
    }

    pub fn username(&self) -> Option<&str> {
        self.store.get(KEY_USERNAME)
    }

    pub fn set_username(&mut self, username: &str) -> Result<(), ClientError> {
        self.store.set(KEY_USERNAME, username)?;
        Ok(())
    }

    /// Id of the most recent simulation job, used for reconstruction.
    pub fn job_id(&self) -> Option<JobId> {
        self.store.get(KEY_JOB_ID).map(str::to_string)
    }

    pub fn set_job_id(&mut self, job_id: &str) -> Result<(), ClientError> {
        self.store.set(KEY_JOB_ID, job_id)?;
        Ok(())
    }

    /// Wipe every persisted key and reset the panels to the defaults.
    pub fn clear(&mut self) -> Result<(), ClientError> {
        self.store.clear()?;
        self.panel = PanelState::default();
        self.viewer = None;
        Ok(())
    }

    // ---- slice viewer ----

    /// Position the oblique slice plane of the loaded phantom.
    pub fn set_normal_plane(
        &mut self,
        gradient: Vec3,
        delta_f: f64,
        gamma: f64,
    ) -> Result<SlicePlane, ClientError> {
        let viewer = self
            .viewer
            .as_mut()
            .ok_or_else(|| CoreError::Validation("no phantom volume is loaded".into()))?;
        Ok(*viewer.set_normal_plane(gradient, delta_f, gamma)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use koma_core::view_state::{KEY_RESULT_MODE, KEY_VIEWER_MODE};
    use koma_core::volume::ImageVolume;
    use tempfile::tempdir;

    use crate::panel::{JobView, RenderedSurface, Surface};

    fn session() -> Session {
        Session::open(PersistentStore::in_memory(), Viewport::default())
    }

    #[test]
    fn panels_restore_persisted_modes() {
        let mut store = PersistentStore::in_memory();
        store.set_mode(ViewerMode::ThreeD).unwrap();
        store.set_mode(ResultMode::Kspace).unwrap();

        let session = Session::open(store, Viewport::default());
        assert_eq!(session.panel.viewer_mode(), ViewerMode::ThreeD);
        assert_eq!(session.panel.result_mode(), ResultMode::Kspace);
        assert_eq!(session.seq_mode(), SeqMode::Diagram);
        assert!(!session.panel.slices_visible);
    }

    #[test]
    fn setting_the_same_mode_twice_is_a_no_op() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        let mut session = Session::open(
            PersistentStore::open(&path).unwrap(),
            Viewport::default(),
        );
        session
            .panel
            .load_surface(Surface::ReconImage, "<img>".into());

        assert!(session.set_result_mode(ResultMode::Image).unwrap());
        let panel = session.panel.clone();
        std::fs::remove_file(&path).unwrap();

        assert!(!session.set_result_mode(ResultMode::Image).unwrap());
        assert_eq!(session.panel, panel);
        assert!(!path.exists());
        assert!(session.panel.surface(Surface::ReconImage).visible);
    }

    #[test]
    fn default_mode_is_persisted_on_first_explicit_set() {
        let mut session = session();
        assert!(session.set_viewer_mode(ViewerMode::Slices).unwrap());
        assert_eq!(session.store().get(KEY_VIEWER_MODE), Some("slices"));
        assert!(!session.set_viewer_mode(ViewerMode::Slices).unwrap());
    }

    #[test]
    fn map_mode_is_persisted() {
        let mut session = session();
        assert_eq!(session.map_mode(), MapMode::T1);
        assert!(session.set_map_mode(MapMode::Dw).unwrap());
        assert_eq!(session.map_mode(), MapMode::Dw);
    }

    #[test]
    fn normal_plane_needs_a_volume() {
        let mut session = session();
        assert_matches!(
            session.set_normal_plane([0.0, 0.0, 1.0], 100.0, 42.58e6),
            Err(ClientError::Core(CoreError::Validation(_)))
        );

        let volume = ImageVolume::new([4, 4, 4], [1.0; 3], [0.0; 3], vec![0.0; 64]).unwrap();
        session.set_viewer(Some(SliceViewer::load(volume)));
        let plane = session
            .set_normal_plane([0.0, 0.0, 1.0], 0.0, 1.0)
            .unwrap();
        assert_eq!(plane.origin, [1.5, 1.5, 1.5]);

        assert_matches!(
            session.set_normal_plane([0.0, 0.0, 0.0], 1.0, 1.0),
            Err(ClientError::Core(CoreError::DegenerateGeometry(_)))
        );
    }

    #[test]
    fn revealed_result_mode_is_persisted() {
        let mut session = session();
        session.panel.on_success(&[RenderedSurface {
            surface: Surface::ReconKspace,
            html: "<ksp>".into(),
        }]);
        assert_eq!(session.result_mode(), ResultMode::Signal);

        session.persist_panel_modes().unwrap();
        assert_eq!(session.result_mode(), ResultMode::Kspace);
        assert_eq!(session.store().get(KEY_RESULT_MODE), Some("kspace"));
        assert!(session.store().get(KEY_VIEWER_MODE).is_none());
    }

    #[test]
    fn current_phantom_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        let mut session = Session::open(
            PersistentStore::open(&path).unwrap(),
            Viewport::default(),
        );
        session.set_current_phantom("brain").unwrap();

        let reopened = Session::open(
            PersistentStore::open(&path).unwrap(),
            Viewport::default(),
        );
        assert_eq!(reopened.current_phantom(), Some("brain"));
    }

    #[test]
    fn clear_resets_identity_and_job() {
        let mut session = session();
        session.set_token("abc").unwrap();
        session.set_username("ana").unwrap();
        session.set_job_id("42").unwrap();
        session.set_current_phantom("brain").unwrap();
        session.clear().unwrap();
        assert!(session.current_phantom().is_none());
        assert!(session.token().is_none());
        assert!(session.username().is_none());
        assert!(session.job_id().is_none());
    }
}
