//! 2-D slices extracted from an [`ImageVolume`].
//!
//! Axis-aligned slices copy voxels straight out of the grid. Oblique
//! slices resample the volume on a square grid lying in the plane.

use crate::error::CoreError;
use crate::geometry::{add, plane_basis, scale, Axis, SlicePlane};
use crate::volume::{ImageVolume, WindowLevel};

/// Upper bound on the side of an oblique reslice, in pixels.
pub const MAX_RESLICE_SIDE: usize = 1024;

/// A 2-D grid of scalars. Pixels outside the volume are `NaN`.
#[derive(Debug, Clone)]
pub struct Slice2D {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<f32>,
}

impl Slice2D {
    pub fn pixel(&self, x: usize, y: usize) -> f32 {
        self.pixels[x + y * self.width]
    }

    /// Apply a window/level and produce row-major 8-bit grey pixels.
    pub fn to_luma8(&self, window_level: &WindowLevel) -> Vec<u8> {
        self.pixels
            .iter()
            .map(|&v| if v.is_nan() { 0 } else { window_level.map(v) })
            .collect()
    }
}

/// Exact voxel slice orthogonal to `axis` through the voxel nearest to
/// `point`.
///
/// The in-plane axes keep their index order: the `i` slice spans
/// `(j, k)`, the `j` slice `(i, k)` and the `k` slice `(i, j)`.
pub fn axis_slice(volume: &ImageVolume, axis: Axis, point: [f64; 3]) -> Slice2D {
    let dims = volume.dims();
    let fixed = volume.nearest_index(axis.index(), point[axis.index()]);
    let (a, b) = match axis {
        Axis::I => (1, 2),
        Axis::J => (0, 2),
        Axis::K => (0, 1),
    };

    let (width, height) = (dims[a], dims[b]);
    let mut pixels = Vec::with_capacity(width * height);
    for y in 0..height {
        for x in 0..width {
            let mut idx = [0usize; 3];
            idx[axis.index()] = fixed;
            idx[a] = x;
            idx[b] = y;
            pixels.push(volume.voxel(idx[0], idx[1], idx[2]));
        }
    }

    Slice2D {
        width,
        height,
        pixels,
    }
}

/// Resample the volume on an arbitrary plane.
///
/// The grid is centred on the plane origin, spans the volume diagonal
/// and uses the finest voxel spacing as its pixel size (capped at
/// [`MAX_RESLICE_SIDE`] pixels per side).
pub fn reslice(volume: &ImageVolume, plane: &SlicePlane) -> Result<Slice2D, CoreError> {
    let (u, v) = plane_basis(plane.normal)?;

    let spacing = volume.spacing();
    let finest = spacing[0].min(spacing[1]).min(spacing[2]);
    let extent = volume.diagonal().max(finest);
    let side = ((extent / finest).ceil() as usize + 1).clamp(1, MAX_RESLICE_SIDE);
    let step = if side > 1 {
        extent / (side - 1) as f64
    } else {
        finest
    };
    let half = (side - 1) as f64 / 2.0;

    let mut pixels = Vec::with_capacity(side * side);
    for y in 0..side {
        let dv = (y as f64 - half) * step;
        for x in 0..side {
            let du = (x as f64 - half) * step;
            let point = add(plane.origin, add(scale(u, du), scale(v, dv)));
            pixels.push(volume.sample(point).unwrap_or(f32::NAN));
        }
    }

    Ok(Slice2D {
        width: side,
        height: side,
        pixels,
    })
}
