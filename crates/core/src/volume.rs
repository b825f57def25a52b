//! Scalar image volumes on a regular grid.

use serde::Serialize;

use crate::error::CoreError;
use crate::types::Vec3;

/// A 3-D scalar volume with axis-aligned voxel spacing.
///
/// Voxels are stored with `i` varying fastest, then `j`, then `k`.
#[derive(Debug, Clone)]
pub struct ImageVolume {
    dims: [usize; 3],
    spacing: Vec3,
    origin: Vec3,
    scalars: Vec<f32>,
}

/// Intensity window and level used to map scalars to display grey.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WindowLevel {
    pub window: f64,
    pub level: f64,
}

impl WindowLevel {
    /// Full-range window over a sample set.
    ///
    /// `window = max - min`, `level = min + window / 2`. Empty input
    /// yields a zero window at level zero.
    pub fn from_samples(samples: &[f32]) -> Self {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for &v in samples {
            let v = f64::from(v);
            if v < min {
                min = v;
            }
            if v > max {
                max = v;
            }
        }
        if min > max {
            return Self {
                window: 0.0,
                level: 0.0,
            };
        }
        let window = max - min;
        Self {
            window,
            level: min + window / 2.0,
        }
    }

    /// Map a scalar to 8-bit grey.
    pub fn map(&self, value: f32) -> u8 {
        let v = f64::from(value);
        if self.window <= 0.0 {
            return if v > self.level { 255 } else { 0 };
        }
        let lower = self.level - self.window / 2.0;
        let t = ((v - lower) / self.window).clamp(0.0, 1.0);
        (t * 255.0).round() as u8
    }
}

impl ImageVolume {
    pub fn new(
        dims: [usize; 3],
        spacing: Vec3,
        origin: Vec3,
        scalars: Vec<f32>,
    ) -> Result<Self, CoreError> {
        if dims.iter().any(|&d| d == 0) {
            return Err(CoreError::Validation(format!(
                "volume dimensions must be non-zero, got {dims:?}"
            )));
        }
        let expected = dims[0] * dims[1] * dims[2];
        if scalars.len() != expected {
            return Err(CoreError::Validation(format!(
                "expected {expected} scalars for {dims:?}, got {}",
                scalars.len()
            )));
        }
        if spacing.iter().any(|&s| !(s > 0.0 && s.is_finite())) {
            return Err(CoreError::Validation(format!(
                "voxel spacing must be positive, got {spacing:?}"
            )));
        }
        Ok(Self {
            dims,
            spacing,
            origin,
            scalars,
        })
    }

    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    pub fn spacing(&self) -> Vec3 {
        self.spacing
    }

    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    pub fn scalars(&self) -> &[f32] {
        &self.scalars
    }

    /// `[xmin, xmax, ymin, ymax, zmin, zmax]` in millimetres.
    pub fn bounds(&self) -> [f64; 6] {
        let mut b = [0.0; 6];
        for axis in 0..3 {
            let extent = (self.dims[axis] - 1) as f64 * self.spacing[axis];
            b[axis * 2] = self.origin[axis];
            b[axis * 2 + 1] = self.origin[axis] + extent;
        }
        b
    }

    /// Geometric centre of the bounds.
    pub fn center(&self) -> Vec3 {
        let b = self.bounds();
        [
            (b[0] + b[1]) / 2.0,
            (b[2] + b[3]) / 2.0,
            (b[4] + b[5]) / 2.0,
        ]
    }

    /// Length of the bounding-box diagonal.
    pub fn diagonal(&self) -> f64 {
        let b = self.bounds();
        let dx = b[1] - b[0];
        let dy = b[3] - b[2];
        let dz = b[5] - b[4];
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    pub fn voxel(&self, i: usize, j: usize, k: usize) -> f32 {
        self.scalars[i + self.dims[0] * (j + self.dims[1] * k)]
    }

    /// Nearest voxel index of a physical coordinate along one axis,
    /// clamped into the grid.
    pub fn nearest_index(&self, axis: usize, coordinate: f64) -> usize {
        let continuous = (coordinate - self.origin[axis]) / self.spacing[axis];
        let max = (self.dims[axis] - 1) as f64;
        continuous.round().clamp(0.0, max) as usize
    }

    /// Trilinear interpolation at a physical point.
    ///
    /// Returns `None` outside the sampled grid. Single-voxel axes accept
    /// points within half a voxel of the sample.
    pub fn sample(&self, point: Vec3) -> Option<f32> {
        let mut lo = [0usize; 3];
        let mut hi = [0usize; 3];
        let mut t = [0.0f64; 3];

        for axis in 0..3 {
            let c = (point[axis] - self.origin[axis]) / self.spacing[axis];
            let dim = self.dims[axis];
            if dim == 1 {
                if c.abs() > 0.5 {
                    return None;
                }
                continue;
            }
            let max = (dim - 1) as f64;
            if !(0.0..=max).contains(&c) {
                return None;
            }
            let base = (c.floor() as usize).min(dim - 2);
            lo[axis] = base;
            hi[axis] = base + 1;
            t[axis] = c - base as f64;
        }

        let mut acc = 0.0f64;
        for corner in 0..8 {
            let pick = |axis: usize| (corner >> axis) & 1 == 1;
            let mut weight = 1.0;
            let mut idx = [0usize; 3];
            for axis in 0..3 {
                if pick(axis) {
                    weight *= t[axis];
                    idx[axis] = hi[axis];
                } else {
                    weight *= 1.0 - t[axis];
                    idx[axis] = lo[axis];
                }
            }
            if weight != 0.0 {
                acc += weight * f64::from(self.voxel(idx[0], idx[1], idx[2]));
            }
        }
        Some(acc as f32)
    }

    /// Window/level spanning the full scalar range of the volume.
    pub fn window_level(&self) -> WindowLevel {
        WindowLevel::from_samples(&self.scalars)
    }
}
