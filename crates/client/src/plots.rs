//! Sequence plots and phantom display.

use koma_core::nifti;
use koma_core::view_state::MapMode;
use koma_core::viewer::SliceViewer;
use koma_core::volume::ImageVolume;

use crate::api::{KomaApi, PhantomPlotRequest, SequencePlot, SequencePlotRequest};
use crate::error::ClientError;
use crate::panel::Surface;
use crate::session::Session;

/// Render the sequence diagram and k-space trajectory into their
/// surfaces. A failure is shown in the error panel.
pub async fn plot_sequence(
    api: &KomaApi,
    session: &mut Session,
    scanner: &serde_json::Value,
    sequence: &serde_json::Value,
) -> Result<SequencePlot, ClientError> {
    let viewport = session.viewport();
    let request = SequencePlotRequest {
        scanner,
        sequence,
        width: viewport.width,
        height: viewport.height,
    };

    match api.plot_sequence(&request).await {
        Ok(plot) => {
            session.panel.clear_error();
            session
                .panel
                .load_surface(Surface::SeqDiagram, plot.seq_html.clone());
            session
                .panel
                .load_surface(Surface::SeqKspace, plot.kspace_html.clone());
            Ok(plot)
        }
        Err(e) => {
            tracing::error!(error = %e, "Sequence plot failed");
            session.panel.show_error(&e.user_message());
            Err(e)
        }
    }
}

/// Which halves of a phantom display succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhantomDisplay {
    pub plot_loaded: bool,
    pub volume_loaded: bool,
}

/// Load a phantom into both views: the server-rendered 3-D plot and the
/// local slice viewer for the current map. Both requests run
/// concurrently and are always awaited; failures are logged and leave
/// the corresponding view empty. The persisted viewer mode is applied
/// afterwards.
pub async fn display_phantom(api: &KomaApi, session: &mut Session, phantom: &str) -> PhantomDisplay {
    let map = session.map_mode();
    let viewport = session.viewport();
    if let Err(e) = session.set_current_phantom(phantom) {
        tracing::warn!(phantom, error = %e, "Could not remember current phantom");
    }
    session.panel.hide_phantom_views();

    let request = PhantomPlotRequest {
        phantom,
        map,
        width: viewport.width,
        height: viewport.height,
    };
    let (plot, volume) = tokio::join!(api.plot_phantom(&request), load_volume(api, phantom, map));

    let plot_loaded = match plot {
        Ok(html) => {
            session.panel.load_surface(Surface::PhantomViewer, html);
            true
        }
        Err(e) => {
            tracing::warn!(phantom, map = %map, error = %e, "Phantom plot failed");
            false
        }
    };

    let volume_loaded = match volume {
        Ok(volume) => {
            session.set_viewer(Some(SliceViewer::load(volume)));
            true
        }
        Err(e) => {
            tracing::warn!(phantom, map = %map, error = %e, "Phantom volume failed");
            session.set_viewer(None);
            false
        }
    };

    session.apply_viewer_mode();
    tracing::info!(phantom, map = %map, plot_loaded, volume_loaded, "Phantom displayed");

    PhantomDisplay {
        plot_loaded,
        volume_loaded,
    }
}

/// Persist a new map mode and, if it changed while a phantom is on
/// display, reload that phantom with the new map.
pub async fn change_map_mode(
    api: &KomaApi,
    session: &mut Session,
    mode: MapMode,
) -> Result<Option<PhantomDisplay>, ClientError> {
    if !session.set_map_mode(mode)? {
        return Ok(None);
    }
    let Some(phantom) = session.current_phantom().map(str::to_string) else {
        return Ok(None);
    };
    Ok(Some(display_phantom(api, session, &phantom).await))
}

async fn load_volume(api: &KomaApi, phantom: &str, map: MapMode) -> Result<ImageVolume, ClientError> {
    let bytes = api.fetch_volume(phantom, map).await?;
    Ok(nifti::decode(&bytes)?)
}
