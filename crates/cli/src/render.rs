//! Writes panel contents to disk: HTML surfaces as files, phantom
//! slices as greyscale PNGs.

use std::fs;
use std::path::{Path, PathBuf};

use image::GrayImage;
use koma_client::panel::PanelState;
use koma_core::viewer::SliceViewer;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error(transparent)]
    Core(#[from] koma_core::error::CoreError),
    #[error("Slice '{0}' has inconsistent dimensions")]
    SliceSize(&'static str),
}

/// Write every visible surface as `<stem>.html` under `dir`.
pub fn write_surfaces(panel: &PanelState, dir: &Path) -> Result<Vec<PathBuf>, RenderError> {
    let surfaces = panel.visible_surfaces();
    if surfaces.is_empty() {
        return Ok(Vec::new());
    }
    fs::create_dir_all(dir)?;

    let mut written = Vec::with_capacity(surfaces.len());
    for (surface, html) in surfaces {
        let path = dir.join(format!("{}.html", surface.file_stem()));
        fs::write(&path, html)?;
        tracing::info!(surface = ?surface, path = %path.display(), "Surface written");
        written.push(path);
    }
    Ok(written)
}

/// Render the axis slices (and the oblique one, when placed) as PNGs
/// named `slice_<label>.png`.
pub fn write_slices(viewer: &SliceViewer, dir: &Path) -> Result<Vec<PathBuf>, RenderError> {
    fs::create_dir_all(dir)?;
    let window_level = viewer.window_level();

    let mut written = Vec::new();
    for labelled in viewer.reslices()? {
        let slice = &labelled.slice;
        let (Ok(width), Ok(height)) = (u32::try_from(slice.width), u32::try_from(slice.height))
        else {
            return Err(RenderError::SliceSize(labelled.label));
        };
        let image = GrayImage::from_raw(width, height, slice.to_luma8(&window_level))
            .ok_or(RenderError::SliceSize(labelled.label))?;

        let path = dir.join(format!("slice_{}.png", labelled.label));
        image.save(&path)?;
        tracing::info!(slice = labelled.label, width, height, path = %path.display(), "Slice written");
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use koma_client::panel::{JobView, RenderedSurface, Surface};
    use koma_core::volume::ImageVolume;

    #[test]
    fn only_visible_surfaces_are_written() {
        let dir = tempfile::tempdir().unwrap();
        let mut panel = PanelState::default();
        panel.load_surface(Surface::SimResult, "<sig>".into());
        panel.load_surface(Surface::ReconImage, "<img>".into());

        let written = write_surfaces(&panel, dir.path()).unwrap();
        assert_eq!(written, vec![dir.path().join("signal.html")]);
        assert_eq!(fs::read_to_string(&written[0]).unwrap(), "<sig>");
    }

    #[test]
    fn finished_reconstruction_is_written_in_default_mode() {
        let dir = tempfile::tempdir().unwrap();
        let mut panel = PanelState::default();
        panel.on_success(&[
            RenderedSurface {
                surface: Surface::ReconImage,
                html: "<img>".into(),
            },
            RenderedSurface {
                surface: Surface::ReconKspace,
                html: "<ksp>".into(),
            },
        ]);

        let written = write_surfaces(&panel, dir.path()).unwrap();
        assert_eq!(written, vec![dir.path().join("image.html")]);
        assert_eq!(fs::read_to_string(&written[0]).unwrap(), "<img>");
    }

    #[test]
    fn slices_become_pngs() {
        let dir = tempfile::tempdir().unwrap();
        let scalars: Vec<f32> = (0..27).map(|v| v as f32).collect();
        let volume = ImageVolume::new([3, 3, 3], [1.0; 3], [0.0; 3], scalars).unwrap();
        let mut viewer = SliceViewer::load(volume);
        viewer.set_normal_plane([1.0, 1.0, 0.0], 0.0, 1.0).unwrap();

        let written = write_slices(&viewer, dir.path()).unwrap();
        assert_eq!(written.len(), 4);
        let decoded = image::open(&written[0]).unwrap();
        assert_eq!(decoded.width(), 3);
    }
}
