use std::path::Path;

use ndarray::prelude::*;
use tracing::*;

use crate::error::SegboxError;

pub mod nifti;
pub mod nrrd;

/// On-disk formats understood by [`load_volume`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeFormat {
    Nrrd,
    Nifti,
}

impl VolumeFormat {
    /// Picks the format from the file name (`.nrrd`, `.seg.nrrd`, `.nii`, `.nii.gz`).
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, SegboxError> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        if name.ends_with(".nrrd") {
            Ok(Self::Nrrd)
        } else if name.ends_with(".nii") || name.ends_with(".nii.gz") {
            Ok(Self::Nifti)
        } else {
            Err(SegboxError::UnsupportedFormat {
                path: path.to_string_lossy().into_owned(),
            })
        }
    }
}

/// Loads a volume as `[slice, row, column]` voxels.
pub fn load_volume<P: AsRef<Path>>(path: P) -> Result<Array3<f32>, SegboxError> {
    let path = path.as_ref();
    let format = VolumeFormat::from_path(path)?;
    debug!("loading {:?} volume from {}", format, path.display());

    let volume = match format {
        VolumeFormat::Nrrd => nrrd::load(path)?,
        VolumeFormat::Nifti => nifti::load(path)?,
    };
    info!("Shape of {}: {:?}", path.display(), volume.shape());
    Ok(volume)
}

/// Fails with [`SegboxError::ShapeMismatch`] unless both volumes share `(D, H, W)`.
pub fn ensure_same_shape<A, B>(
    volume: ArrayView3<'_, A>,
    segmentation: ArrayView3<'_, B>,
) -> Result<(), SegboxError> {
    if volume.shape() != segmentation.shape() {
        return Err(SegboxError::ShapeMismatch {
            volume: volume.shape().to_vec(),
            segmentation: segmentation.shape().to_vec(),
        });
    }
    Ok(())
}

/// Reduces a slowest-axis-first shape to three axes by dropping leading
/// singleton axes. Anything that does not reduce to 3D is rejected.
pub(crate) fn squeeze_to_3d(shape: &[usize], path: &str) -> Result<[usize; 3], SegboxError> {
    let mut axes: Vec<usize> = shape.to_vec();
    while axes.len() > 3 {
        match axes.iter().position(|&size| size == 1) {
            Some(index) => {
                axes.remove(index);
            }
            None => break,
        }
    }

    match axes.as_slice() {
        &[depth, height, width] => Ok([depth, height, width]),
        _ => Err(SegboxError::InvalidInputShape {
            shape: shape.to_vec(),
            source_name: path.to_string(),
        }),
    }
}
