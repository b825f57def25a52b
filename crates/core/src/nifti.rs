//! Minimal NIfTI-1 decoder for phantom parameter maps.
//!
//! Phantom maps are served as single-file NIfTI-1 volumes (`n+1`),
//! usually gzip-compressed. Only what the slice viewer needs is read:
//! grid dimensions, voxel spacing, origin and the first 3-D volume of
//! scalars (after `scl_slope`/`scl_inter` scaling).

use std::io::Read;

use flate2::read::GzDecoder;

use crate::error::CoreError;
use crate::volume::ImageVolume;

const HEADER_SIZE: usize = 348;
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

// Header field offsets.
const OFF_DIM: usize = 40;
const OFF_DATATYPE: usize = 70;
const OFF_PIXDIM: usize = 76;
const OFF_VOX_OFFSET: usize = 108;
const OFF_SCL_SLOPE: usize = 112;
const OFF_SCL_INTER: usize = 116;
const OFF_QFORM_CODE: usize = 252;
const OFF_SFORM_CODE: usize = 254;
const OFF_QOFFSET: usize = 268;
const OFF_SROW_X: usize = 280;
const OFF_SROW_Y: usize = 296;
const OFF_SROW_Z: usize = 312;
const OFF_MAGIC: usize = 344;

// Supported datatype codes.
pub const DT_UINT8: i16 = 2;
pub const DT_INT16: i16 = 4;
pub const DT_INT32: i16 = 8;
pub const DT_FLOAT32: i16 = 16;
pub const DT_FLOAT64: i16 = 64;
pub const DT_INT8: i16 = 256;
pub const DT_UINT16: i16 = 512;
pub const DT_UINT32: i16 = 768;

/// Decode a NIfTI-1 file, gunzipping it first when compressed.
pub fn decode(bytes: &[u8]) -> Result<ImageVolume, CoreError> {
    if bytes.starts_with(&GZIP_MAGIC) {
        let mut raw = Vec::new();
        GzDecoder::new(bytes)
            .read_to_end(&mut raw)
            .map_err(|e| CoreError::VolumeDecode(format!("gzip: {e}")))?;
        decode_uncompressed(&raw)
    } else {
        decode_uncompressed(bytes)
    }
}

fn decode_uncompressed(bytes: &[u8]) -> Result<ImageVolume, CoreError> {
    if bytes.len() < HEADER_SIZE {
        return Err(CoreError::VolumeDecode(format!(
            "file too short for a NIfTI-1 header ({} bytes)",
            bytes.len()
        )));
    }

    let header = Header::detect(bytes)?;

    if &bytes[OFF_MAGIC..OFF_MAGIC + 4] != b"n+1\0" {
        return Err(CoreError::VolumeDecode(
            "only single-file NIfTI-1 (n+1) volumes are supported".into(),
        ));
    }

    let ndim = header.i16(OFF_DIM);
    if !(1..=7).contains(&ndim) {
        return Err(CoreError::VolumeDecode(format!("invalid dim[0] = {ndim}")));
    }
    let mut dims = [1usize; 3];
    for (axis, dim) in dims.iter_mut().enumerate() {
        if (axis as i16) < ndim {
            let value = header.i16(OFF_DIM + 2 * (axis + 1));
            if value < 1 {
                return Err(CoreError::VolumeDecode(format!(
                    "invalid dim[{}] = {value}",
                    axis + 1
                )));
            }
            *dim = value as usize;
        }
    }

    let mut spacing = [1.0f64; 3];
    for (axis, s) in spacing.iter_mut().enumerate() {
        let value = f64::from(header.f32(OFF_PIXDIM + 4 * (axis + 1))).abs();
        if value > 0.0 && value.is_finite() {
            *s = value;
        }
    }

    let origin = if header.i16(OFF_SFORM_CODE) > 0 {
        [
            f64::from(header.f32(OFF_SROW_X + 12)),
            f64::from(header.f32(OFF_SROW_Y + 12)),
            f64::from(header.f32(OFF_SROW_Z + 12)),
        ]
    } else if header.i16(OFF_QFORM_CODE) > 0 {
        [
            f64::from(header.f32(OFF_QOFFSET)),
            f64::from(header.f32(OFF_QOFFSET + 4)),
            f64::from(header.f32(OFF_QOFFSET + 8)),
        ]
    } else {
        [0.0; 3]
    };

    let vox_offset = header.f32(OFF_VOX_OFFSET);
    if !(vox_offset.is_finite() && vox_offset >= HEADER_SIZE as f32) {
        return Err(CoreError::VolumeDecode(format!(
            "invalid vox_offset {vox_offset}"
        )));
    }

    let count = dims[0] * dims[1] * dims[2];
    let mut scalars = header.voxels(vox_offset as usize, count, header.i16(OFF_DATATYPE))?;

    let slope = header.f32(OFF_SCL_SLOPE);
    let inter = header.f32(OFF_SCL_INTER);
    if slope != 0.0 && slope.is_finite() && inter.is_finite() && !(slope == 1.0 && inter == 0.0) {
        for v in &mut scalars {
            *v = *v * slope + inter;
        }
    }

    tracing::debug!(?dims, ?spacing, ?origin, "Decoded NIfTI volume");

    ImageVolume::new(dims, spacing, origin, scalars)
}

/// Endianness-aware view over the raw file bytes.
struct Header<'a> {
    bytes: &'a [u8],
    big_endian: bool,
}

impl<'a> Header<'a> {
    /// `sizeof_hdr` must read 348 in one of the two byte orders.
    fn detect(bytes: &'a [u8]) -> Result<Self, CoreError> {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&bytes[0..4]);
        if i32::from_le_bytes(raw) == HEADER_SIZE as i32 {
            Ok(Self {
                bytes,
                big_endian: false,
            })
        } else if i32::from_be_bytes(raw) == HEADER_SIZE as i32 {
            Ok(Self {
                bytes,
                big_endian: true,
            })
        } else {
            Err(CoreError::VolumeDecode("not a NIfTI-1 header".into()))
        }
    }

    fn array<const N: usize>(&self, at: usize) -> [u8; N] {
        let mut raw = [0u8; N];
        raw.copy_from_slice(&self.bytes[at..at + N]);
        if self.big_endian {
            raw.reverse();
        }
        raw
    }

    fn i16(&self, at: usize) -> i16 {
        i16::from_le_bytes(self.array(at))
    }

    fn f32(&self, at: usize) -> f32 {
        f32::from_le_bytes(self.array(at))
    }

    fn voxels(&self, offset: usize, count: usize, datatype: i16) -> Result<Vec<f32>, CoreError> {
        let size = match datatype {
            DT_UINT8 | DT_INT8 => 1,
            DT_INT16 | DT_UINT16 => 2,
            DT_INT32 | DT_UINT32 | DT_FLOAT32 => 4,
            DT_FLOAT64 => 8,
            other => {
                return Err(CoreError::VolumeDecode(format!(
                    "unsupported datatype {other}"
                )))
            }
        };

        let end = count
            .checked_mul(size)
            .and_then(|len| len.checked_add(offset))
            .ok_or_else(|| CoreError::VolumeDecode("voxel data size overflows".into()))?;
        if end > self.bytes.len() {
            return Err(CoreError::VolumeDecode(format!(
                "truncated voxel data: need {end} bytes, have {}",
                self.bytes.len()
            )));
        }

        let values = (0..count)
            .map(|n| {
                let at = offset + n * size;
                match datatype {
                    DT_UINT8 => f32::from(self.bytes[at]),
                    DT_INT8 => f32::from(self.bytes[at] as i8),
                    DT_INT16 => f32::from(i16::from_le_bytes(self.array(at))),
                    DT_UINT16 => f32::from(u16::from_le_bytes(self.array(at))),
                    DT_INT32 => i32::from_le_bytes(self.array(at)) as f32,
                    DT_UINT32 => u32::from_le_bytes(self.array(at)) as f32,
                    DT_FLOAT32 => f32::from_le_bytes(self.array(at)),
                    _ => f64::from_le_bytes(self.array(at)) as f32,
                }
            })
            .collect();
        Ok(values)
    }
}
