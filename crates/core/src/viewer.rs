//! Slice viewer state for one loaded volume.
//!
//! Holds the volume together with its three axis planes, the optional
//! oblique plane and the display window/level, so callers carry one
//! explicit value instead of a set of globals.

use crate::error::CoreError;
use crate::geometry::{oblique_plane, Axis, SlicePlane};
use crate::reslice::{axis_slice, reslice, Slice2D};
use crate::types::Vec3;
use crate::volume::{ImageVolume, WindowLevel};

/// One rendered slice, labelled for display.
#[derive(Debug, Clone)]
pub struct LabelledSlice {
    pub label: &'static str,
    pub plane: SlicePlane,
    pub slice: Slice2D,
}

pub struct SliceViewer {
    volume: ImageVolume,
    window_level: WindowLevel,
    axis_planes: [SlicePlane; 3],
    oblique: Option<SlicePlane>,
}

impl SliceViewer {
    /// Centre the three axis planes on the volume and compute the
    /// full-range window/level. No oblique plane is shown yet.
    pub fn load(volume: ImageVolume) -> Self {
        let center = volume.center();
        let window_level = volume.window_level();
        let axis_planes = Axis::ALL.map(|axis| SlicePlane::axis(axis, center));

        tracing::debug!(
            dims = ?volume.dims(),
            window = window_level.window,
            level = window_level.level,
            "Volume loaded into slice viewer",
        );

        Self {
            volume,
            window_level,
            axis_planes,
            oblique: None,
        }
    }

    pub fn volume(&self) -> &ImageVolume {
        &self.volume
    }

    pub fn window_level(&self) -> WindowLevel {
        self.window_level
    }

    pub fn axis_planes(&self) -> &[SlicePlane; 3] {
        &self.axis_planes
    }

    pub fn oblique(&self) -> Option<&SlicePlane> {
        self.oblique.as_ref()
    }

    /// Place the oblique plane from a gradient direction and resonance
    /// offset.
    ///
    /// A degenerate input leaves the current plane untouched.
    pub fn set_normal_plane(
        &mut self,
        gradient: Vec3,
        delta_f: f64,
        gamma: f64,
    ) -> Result<&SlicePlane, CoreError> {
        match oblique_plane(self.volume.center(), gradient, delta_f, gamma) {
            Ok(plane) => {
                tracing::info!(
                    normal = ?plane.normal,
                    origin = ?plane.origin,
                    spacing = ?self.volume.spacing(),
                    "Oblique slice plane updated",
                );
                Ok(&*self.oblique.insert(plane))
            }
            Err(e) => {
                tracing::error!(error = %e, ?gradient, "Slice plane not updated");
                Err(e)
            }
        }
    }

    /// The i, j and k slices followed by the oblique slice, if placed.
    pub fn reslices(&self) -> Result<Vec<LabelledSlice>, CoreError> {
        let mut out: Vec<LabelledSlice> = Axis::ALL
            .iter()
            .zip(self.axis_planes.iter())
            .map(|(&axis, plane)| LabelledSlice {
                label: axis.label(),
                plane: *plane,
                slice: axis_slice(&self.volume, axis, plane.origin),
            })
            .collect();

        if let Some(plane) = &self.oblique {
            out.push(LabelledSlice {
                label: "oblique",
                plane: *plane,
                slice: reslice(&self.volume, plane)?,
            });
        }
        Ok(out)
    }
}
