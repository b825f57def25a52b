//! In-memory model of the user-visible panels.
//!
//! The job controller and the plot flows never touch a real display;
//! they report through [`JobView`]. [`PanelState`] is the standard
//! implementation: it records exactly what a user would see (progress
//! text, bar width, iframe contents and visibility, error text) so the
//! CLI can render it and tests can assert on it.

use std::collections::BTreeMap;

use koma_core::progress::ProgressSignal;
use koma_core::view_state::{ResultMode, SeqMode, ViewerMode};
use serde::Serialize;

/// A render surface receiving server-produced HTML.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Surface {
    /// Simulated signal plot.
    SimResult,
    /// Reconstructed image.
    ReconImage,
    /// Reconstructed k-space.
    ReconKspace,
    /// Sequence diagram.
    SeqDiagram,
    /// Sequence k-space trajectory.
    SeqKspace,
    /// Interactive 3-D phantom plot.
    PhantomViewer,
}

impl Surface {
    pub fn file_stem(self) -> &'static str {
        match self {
            Surface::SimResult => "signal",
            Surface::ReconImage => "image",
            Surface::ReconKspace => "kspace",
            Surface::SeqDiagram => "sequence",
            Surface::SeqKspace => "sequence_kspace",
            Surface::PhantomViewer => "phantom",
        }
    }
}

/// HTML destined for one surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedSurface {
    pub surface: Surface,
    pub html: String,
}

/// What a progress update does to the progress bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarUpdate {
    /// Leave the bar as it is.
    Unchanged,
    /// Show the bar filled to this percentage.
    Fill(u8),
    Collapse,
}

/// Text and bar state shown while a job is in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub text: String,
    pub bar: BarUpdate,
}

/// Receiver of job lifecycle updates.
pub trait JobView {
    /// A new submission is about to be sent; previous results are hidden.
    fn on_submitted(&mut self, surfaces: &[Surface]);
    /// A non-terminal status poll was answered.
    fn on_progress(&mut self, update: &ProgressUpdate);
    /// The job finished and produced output.
    fn on_success(&mut self, surfaces: &[RenderedSurface]);
    /// The job or its submission failed.
    fn on_error(&mut self, message: &str);
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SurfaceState {
    /// Document injected into the surface, if any.
    pub srcdoc: Option<String>,
    pub visible: bool,
}

/// The complete visible state of the application panels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelState {
    pub progress_visible: bool,
    pub response_visible: bool,
    pub response_text: String,
    pub bar_visible: bool,
    pub bar_width: String,
    pub error_text: Option<String>,
    /// Orthogonal-slice view of the phantom.
    pub slices_visible: bool,
    viewer_mode: ViewerMode,
    result_mode: ResultMode,
    seq_mode: SeqMode,
    surfaces: BTreeMap<Surface, SurfaceState>,
}

impl Default for PanelState {
    fn default() -> Self {
        Self::new(ViewerMode::Slices, ResultMode::Signal, SeqMode::Diagram)
    }
}

impl PanelState {
    pub fn new(viewer_mode: ViewerMode, result_mode: ResultMode, seq_mode: SeqMode) -> Self {
        let mut panel = Self {
            progress_visible: false,
            response_visible: false,
            response_text: String::new(),
            bar_visible: false,
            bar_width: "0%".to_string(),
            error_text: None,
            slices_visible: false,
            viewer_mode,
            result_mode,
            seq_mode,
            surfaces: BTreeMap::new(),
        };
        panel.apply_modes();
        panel
    }

    pub fn surface(&self, surface: Surface) -> SurfaceState {
        self.surfaces.get(&surface).cloned().unwrap_or_default()
    }

    /// Surfaces that currently show content, in display order.
    pub fn visible_surfaces(&self) -> Vec<(Surface, &str)> {
        self.surfaces
            .iter()
            .filter(|(_, state)| state.visible)
            .filter_map(|(surface, state)| state.srcdoc.as_deref().map(|html| (*surface, html)))
            .collect()
    }

    pub fn viewer_mode(&self) -> ViewerMode {
        self.viewer_mode
    }

    pub fn result_mode(&self) -> ResultMode {
        self.result_mode
    }

    pub fn seq_mode(&self) -> SeqMode {
        self.seq_mode
    }

    /// Switch between the slice view and the 3-D plot.
    pub fn set_viewer_mode(&mut self, mode: ViewerMode) {
        self.viewer_mode = mode;
        self.apply_modes();
    }

    pub fn set_result_mode(&mut self, mode: ResultMode) {
        self.result_mode = mode;
        self.apply_modes();
    }

    pub fn set_seq_mode(&mut self, mode: SeqMode) {
        self.seq_mode = mode;
        self.apply_modes();
    }

    /// Hide both phantom views while a phantom is loading.
    pub fn hide_phantom_views(&mut self) {
        self.slices_visible = false;
        self.surfaces.entry(Surface::PhantomViewer).or_default().visible = false;
    }

    /// Inject HTML into a surface; it becomes visible when the current
    /// modes select it.
    pub fn load_surface(&mut self, surface: Surface, html: String) {
        let selected = self.is_selected(surface);
        let state = self.surfaces.entry(surface).or_default();
        state.srcdoc = Some(html);
        state.visible = selected;
    }

    pub fn show_error(&mut self, message: &str) {
        self.error_text = Some(message.to_string());
    }

    pub fn clear_error(&mut self) {
        self.error_text = None;
    }

    /// Switch the mode that owns `surface` so that it is the one shown.
    fn reveal(&mut self, surface: Surface) {
        match surface {
            Surface::SimResult => self.result_mode = ResultMode::Signal,
            Surface::ReconImage => self.result_mode = ResultMode::Image,
            Surface::ReconKspace => self.result_mode = ResultMode::Kspace,
            Surface::SeqDiagram => self.seq_mode = SeqMode::Diagram,
            Surface::SeqKspace => self.seq_mode = SeqMode::Kspace,
            Surface::PhantomViewer => self.viewer_mode = ViewerMode::ThreeD,
        }
        self.apply_modes();
    }

    fn is_selected(&self, surface: Surface) -> bool {
        match surface {
            Surface::SimResult => self.result_mode == ResultMode::Signal,
            Surface::ReconImage => self.result_mode == ResultMode::Image,
            Surface::ReconKspace => self.result_mode == ResultMode::Kspace,
            Surface::SeqDiagram => self.seq_mode == SeqMode::Diagram,
            Surface::SeqKspace => self.seq_mode == SeqMode::Kspace,
            Surface::PhantomViewer => self.viewer_mode == ViewerMode::ThreeD,
        }
    }

    /// Recompute visibility of loaded surfaces from the current modes.
    fn apply_modes(&mut self) {
        self.slices_visible = self.viewer_mode == ViewerMode::Slices;
        let selected: Vec<(Surface, bool)> = self
            .surfaces
            .keys()
            .map(|&surface| (surface, self.is_selected(surface)))
            .collect();
        for (surface, selected) in selected {
            if let Some(state) = self.surfaces.get_mut(&surface) {
                state.visible = selected && state.srcdoc.is_some();
            }
        }
    }

    fn collapse_progress(&mut self) {
        self.progress_visible = false;
        self.response_visible = false;
        self.bar_visible = false;
        self.bar_width = "0%".to_string();
    }
}

impl JobView for PanelState {
    fn on_submitted(&mut self, surfaces: &[Surface]) {
        self.clear_error();
        for surface in surfaces {
            self.surfaces.entry(*surface).or_default().visible = false;
        }
    }

    fn on_progress(&mut self, update: &ProgressUpdate) {
        self.progress_visible = true;
        self.response_visible = true;
        self.response_text = update.text.clone();
        match update.bar {
            BarUpdate::Unchanged => {}
            BarUpdate::Fill(percent) => {
                self.bar_visible = true;
                self.bar_width = format!("{percent}%");
            }
            BarUpdate::Collapse => self.bar_visible = false,
        }
        tracing::info!(status = %update.text, "Job progress");
    }

    /// Finished output is always shown: when the current modes select
    /// none of the rendered surfaces, the first one is revealed.
    fn on_success(&mut self, surfaces: &[RenderedSurface]) {
        self.collapse_progress();
        for rendered in surfaces {
            self.load_surface(rendered.surface, rendered.html.clone());
        }
        if !surfaces.iter().any(|r| self.is_selected(r.surface)) {
            if let Some(first) = surfaces.first() {
                self.reveal(first.surface);
            }
        }
    }

    fn on_error(&mut self, message: &str) {
        self.collapse_progress();
        self.show_error(message);
    }
}

/// Progress text shown for a simulation status signal.
pub fn simulation_progress(signal: ProgressSignal) -> ProgressUpdate {
    match signal {
        ProgressSignal::Queued => ProgressUpdate {
            text: "Starting simulation...".into(),
            bar: BarUpdate::Unchanged,
        },
        ProgressSignal::Running(p) => ProgressUpdate {
            text: format!("{p}%"),
            bar: BarUpdate::Fill(p),
        },
        ProgressSignal::Finishing => ProgressUpdate {
            text: "Reconstructing...".into(),
            bar: BarUpdate::Collapse,
        },
        ProgressSignal::Failed => ProgressUpdate {
            text: "Simulation failed".into(),
            bar: BarUpdate::Collapse,
        },
    }
}

/// Progress text shown for a reconstruction status signal.
pub fn reconstruction_progress(signal: ProgressSignal) -> ProgressUpdate {
    let (text, bar) = match signal {
        ProgressSignal::Queued | ProgressSignal::Running(_) => {
            ("Reconstructing...", BarUpdate::Unchanged)
        }
        ProgressSignal::Finishing => ("Rendering reconstruction...", BarUpdate::Unchanged),
        ProgressSignal::Failed => ("Reconstruction failed", BarUpdate::Collapse),
    };
    ProgressUpdate {
        text: text.into(),
        bar,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_updates_text_and_bar() {
        let mut panel = PanelState::default();
        panel.on_progress(&simulation_progress(ProgressSignal::Running(50)));
        assert!(panel.progress_visible);
        assert!(panel.bar_visible);
        assert_eq!(panel.bar_width, "50%");
        assert_eq!(panel.response_text, "50%");

        panel.on_progress(&simulation_progress(ProgressSignal::Finishing));
        assert_eq!(panel.response_text, "Reconstructing...");
        assert!(!panel.bar_visible);
    }

    #[test]
    fn queued_signal_leaves_bar_alone() {
        let mut panel = PanelState::default();
        panel.on_progress(&simulation_progress(ProgressSignal::Running(30)));
        panel.on_progress(&simulation_progress(ProgressSignal::Queued));

        assert_eq!(panel.response_text, "Starting simulation...");
        assert!(panel.bar_visible);
        assert_eq!(panel.bar_width, "30%");

        let mut fresh = PanelState::default();
        fresh.on_progress(&simulation_progress(ProgressSignal::Queued));
        assert!(!fresh.bar_visible);
    }

    #[test]
    fn success_collapses_progress_and_shows_selected_surface() {
        let mut panel = PanelState::default();
        panel.on_progress(&simulation_progress(ProgressSignal::Running(10)));
        panel.on_success(&[RenderedSurface {
            surface: Surface::SimResult,
            html: "<p>signal</p>".into(),
        }]);

        assert!(!panel.progress_visible);
        assert_eq!(panel.bar_width, "0%");
        let state = panel.surface(Surface::SimResult);
        assert_eq!(state.srcdoc.as_deref(), Some("<p>signal</p>"));
        assert!(state.visible);
    }

    fn reconstruction_output() -> Vec<RenderedSurface> {
        vec![
            RenderedSurface {
                surface: Surface::ReconImage,
                html: "img".into(),
            },
            RenderedSurface {
                surface: Surface::ReconKspace,
                html: "ksp".into(),
            },
        ]
    }

    #[test]
    fn unselected_output_is_revealed_on_success() {
        let mut panel = PanelState::default();
        panel.on_success(&reconstruction_output());

        assert_eq!(panel.result_mode(), ResultMode::Image);
        assert!(panel.surface(Surface::ReconImage).visible);
        assert!(!panel.surface(Surface::ReconKspace).visible);
        assert_eq!(panel.visible_surfaces(), vec![(Surface::ReconImage, "img")]);
    }

    #[test]
    fn selected_output_keeps_current_mode() {
        let mut panel = PanelState::new(ViewerMode::Slices, ResultMode::Kspace, SeqMode::Diagram);
        panel.on_success(&reconstruction_output());

        assert_eq!(panel.result_mode(), ResultMode::Kspace);
        assert!(panel.surface(Surface::ReconKspace).visible);
        assert!(!panel.surface(Surface::ReconImage).visible);
    }

    #[test]
    fn result_mode_switches_visible_surface() {
        let mut panel = PanelState::default();
        panel.on_success(&reconstruction_output());

        panel.set_result_mode(ResultMode::Kspace);
        assert!(panel.surface(Surface::ReconKspace).visible);
        assert!(!panel.surface(Surface::ReconImage).visible);

        panel.set_result_mode(ResultMode::Image);
        assert!(panel.surface(Surface::ReconImage).visible);
        assert!(!panel.surface(Surface::ReconKspace).visible);

        let before = panel.clone();
        panel.set_result_mode(ResultMode::Image);
        assert_eq!(panel, before);
    }

    #[test]
    fn viewer_mode_toggles_slices_and_plot() {
        let mut panel = PanelState::default();
        panel.load_surface(Surface::PhantomViewer, "<div/>".into());
        assert!(panel.slices_visible);
        assert!(!panel.surface(Surface::PhantomViewer).visible);

        panel.set_viewer_mode(ViewerMode::ThreeD);
        assert!(!panel.slices_visible);
        assert!(panel.surface(Surface::PhantomViewer).visible);
    }

    #[test]
    fn submission_hides_previous_result_and_error() {
        let mut panel = PanelState::default();
        panel.load_surface(Surface::SimResult, "old".into());
        panel.show_error("boom");

        panel.on_submitted(&[Surface::SimResult]);
        assert!(!panel.surface(Surface::SimResult).visible);
        assert!(panel.error_text.is_none());
    }

    #[test]
    fn error_is_recorded() {
        let mut panel = PanelState::default();
        panel.on_error("bad sequence");
        assert_eq!(panel.error_text.as_deref(), Some("bad sequence"));
    }
}
