//! Vector helpers and slice-plane placement in physical space.

use serde::Serialize;

use crate::error::CoreError;
use crate::types::Vec3;

/// Metres to millimetres.
pub const MM_PER_M: f64 = 1000.0;

/// A plane through `origin` with unit `normal`, in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SlicePlane {
    pub origin: Vec3,
    pub normal: Vec3,
}

/// Volume axis, in voxel index order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Axis {
    I,
    J,
    K,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::I, Axis::J, Axis::K];

    pub fn index(self) -> usize {
        match self {
            Axis::I => 0,
            Axis::J => 1,
            Axis::K => 2,
        }
    }

    pub fn unit(self) -> Vec3 {
        let mut v = [0.0; 3];
        v[self.index()] = 1.0;
        v
    }

    pub fn label(self) -> &'static str {
        match self {
            Axis::I => "i",
            Axis::J => "j",
            Axis::K => "k",
        }
    }
}

impl SlicePlane {
    /// Axis-aligned plane through `origin`.
    pub fn axis(axis: Axis, origin: Vec3) -> Self {
        Self {
            origin,
            normal: axis.unit(),
        }
    }
}

pub fn dot(a: Vec3, b: Vec3) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

pub fn cross(a: Vec3, b: Vec3) -> Vec3 {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

pub fn norm(v: Vec3) -> f64 {
    dot(v, v).sqrt()
}

pub fn add(a: Vec3, b: Vec3) -> Vec3 {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

pub fn scale(v: Vec3, s: f64) -> Vec3 {
    [v[0] * s, v[1] * s, v[2] * s]
}

/// Unit vector in the direction of `v`.
///
/// Rejects zero-length and non-finite vectors.
pub fn normalize(v: Vec3) -> Result<Vec3, CoreError> {
    let n = norm(v);
    if n == 0.0 || !n.is_finite() {
        return Err(CoreError::DegenerateGeometry(format!(
            "cannot normalize vector {v:?}"
        )));
    }
    Ok(scale(v, 1.0 / n))
}

/// Place the oblique slice plane selected by a gradient direction.
///
/// `gradient` is the gradient vector (T/m), `delta_f` the resonance
/// offset (Hz) and `gamma` the gyromagnetic ratio (Hz/T). The plane
/// passes through `center + r * normalize(gradient) * 1000` where
/// `r = delta_f / (gamma * |gradient|)` is the offset in metres.
pub fn oblique_plane(
    center: Vec3,
    gradient: Vec3,
    delta_f: f64,
    gamma: f64,
) -> Result<SlicePlane, CoreError> {
    let n = norm(gradient);
    let unit = normalize(gradient)?;
    if gamma == 0.0 || !gamma.is_finite() || !delta_f.is_finite() {
        return Err(CoreError::DegenerateGeometry(format!(
            "invalid offset ratio: delta_f={delta_f}, gamma={gamma}"
        )));
    }

    let r = delta_f / (gamma * n);
    let offset = scale(unit, r * MM_PER_M);

    Ok(SlicePlane {
        origin: add(center, offset),
        normal: unit,
    })
}

/// Two unit vectors spanning the plane orthogonal to `normal`.
///
/// The helper axis is the one least aligned with the normal, which keeps
/// the basis well conditioned for any direction.
pub fn plane_basis(normal: Vec3) -> Result<(Vec3, Vec3), CoreError> {
    let n = normalize(normal)?;
    let helper = if n[0].abs() <= n[1].abs() && n[0].abs() <= n[2].abs() {
        Axis::I.unit()
    } else if n[1].abs() <= n[2].abs() {
        Axis::J.unit()
    } else {
        Axis::K.unit()
    };
    let u = normalize(cross(helper, n))?;
    let v = cross(n, u);
    Ok((u, v))
}
