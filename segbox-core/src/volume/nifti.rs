use std::path::Path;

use ::nifti::{NiftiObject, NiftiVolume, ReaderOptions};
use ndarray::prelude::*;
use snafu::ResultExt;

use crate::{error::*, volume::squeeze_to_3d};

/// Loads a `.nii` or `.nii.gz` file into `[slice, row, column]` order.
///
/// Voxel values are scaled by the header slope and intercept.
pub fn load<P: AsRef<Path>>(path: P) -> Result<Array3<f32>, SegboxError> {
    let path = path.as_ref();
    let path_name = path.to_string_lossy();

    let object = ReaderOptions::new().read_file(path).context(NiftiSnafu {
        path: path_name.clone(),
    })?;

    let volume = object.into_volume();
    // NIfTI stores the x axis fastest; reversing gives [z, y, x]
    let shape: Vec<usize> = volume.dim().iter().rev().map(|&dim| dim as usize).collect();
    let [depth, height, width] = squeeze_to_3d(&shape, &path_name)?;

    let values = volume
        .into_nifti_typed_data::<f32>()
        .context(NiftiSnafu { path: path_name })?;
    Array3::from_shape_vec((depth, height, width), values).context(ShapeSnafu { stage: "nifti" })
}
