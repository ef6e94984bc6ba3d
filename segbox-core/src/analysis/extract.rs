use std::fs;
use std::path::{Path, PathBuf};

use ndarray::prelude::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::ser::PrettyFormatter;
use snafu::ResultExt;
use tracing::*;

use crate::{analysis::bbox::SliceBox, consts::JSON_INDENT, error::*};

/// Bounding box of one slice, or `None` when the slice has no labeled voxel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SliceBoundingBox {
    pub slice_index: usize,
    pub bounding_box: Option<SliceBox>,
}

impl SliceBoundingBox {
    pub fn is_present(&self) -> bool {
        self.bounding_box.is_some()
    }
}

/// Ordered per-slice records of a whole volume, one per slice index.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BoundingBoxCollection {
    records: Vec<SliceBoundingBox>,
}

impl BoundingBoxCollection {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SliceBoundingBox> {
        self.records.iter()
    }

    /// Records that carry a bounding box, in slice order.
    pub fn present(&self) -> impl Iterator<Item = &SliceBoundingBox> {
        self.records.iter().filter(|record| record.is_present())
    }

    pub fn present_count(&self) -> usize {
        self.present().count()
    }

    /// Serializes into the indented JSON document.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut buffer = Vec::new();
        let formatter = PrettyFormatter::with_indent(JSON_INDENT);
        let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
        self.serialize(&mut serializer)?;
        Ok(buffer)
    }

    pub fn to_json_string(&self) -> Result<String, SegboxError> {
        let bytes = self.to_json_bytes().context(JsonSnafu { path: "<memory>" })?;
        String::from_utf8(bytes).context(Utf8Snafu)
    }

    /// Writes the document in one shot; nothing is written if serialization fails.
    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<(), SegboxError> {
        let path = path.as_ref();
        let bytes = self.to_json_bytes().context(JsonSnafu {
            path: path.to_string_lossy(),
        })?;
        fs::write(path, bytes).context(IoWriteSnafu {
            path: path.to_string_lossy(),
        })?;
        Ok(())
    }

    pub fn from_json_str(json: &str) -> Result<Self, SegboxError> {
        let collection: Self =
            serde_json::from_str(json).context(JsonSnafu { path: "<memory>" })?;
        collection.validate()?;
        Ok(collection)
    }

    pub fn read_json<P: AsRef<Path>>(path: P) -> Result<Self, SegboxError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).context(IoReadSnafu {
            path: path.to_string_lossy(),
        })?;
        let collection: Self = serde_json::from_str(&json).context(JsonSnafu {
            path: path.to_string_lossy(),
        })?;
        collection.validate()?;
        Ok(collection)
    }

    fn validate(&self) -> Result<(), SegboxError> {
        for (expected, record) in self.records.iter().enumerate() {
            if record.slice_index != expected {
                return Err(SegboxError::SliceOutOfRange {
                    slice_index: record.slice_index,
                    depth: self.records.len(),
                });
            }
        }
        Ok(())
    }
}

/// Summary of one extraction run that was persisted to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionReport {
    /// Number of slices processed (the volume depth).
    pub slices: usize,
    /// Number of slices with a bounding box.
    pub present: usize,
    /// Where the document was written.
    pub output: PathBuf,
}

/// Smallest box enclosing every voxel strictly above the background value.
///
/// The background is `A::default()`, i.e. zero for numeric types.
pub fn slice_bounding_box<A>(slice: ArrayView2<'_, A>) -> Option<SliceBox>
where
    A: PartialOrd + Default,
{
    let background = A::default();
    let mut bbox: Option<SliceBox> = None;

    for ((row, col), value) in slice.indexed_iter() {
        if *value > background {
            let (col, row) = (col as u32, row as u32);
            match bbox.as_mut() {
                Some(bbox) => bbox.include(col, row),
                None => bbox = Some(SliceBox::from_pixel(col, row)),
            }
        }
    }

    bbox
}

/// Scans a `[slice, row, column]` volume slice by slice.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoundingBoxExtractor {
    parallel: bool,
}

impl BoundingBoxExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Processes slices on the rayon pool; record order is unchanged.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn extract<A>(&self, volume: ArrayView3<'_, A>) -> BoundingBoxCollection
    where
        A: PartialOrd + Default + Sync,
    {
        let depth = volume.len_of(Axis(0));
        debug!("extracting bounding boxes from {depth} slices");

        let records = if self.parallel {
            (0..depth)
                .into_par_iter()
                .map(|slice_index| SliceBoundingBox {
                    slice_index,
                    bounding_box: slice_bounding_box(volume.index_axis(Axis(0), slice_index)),
                })
                .collect()
        } else {
            volume
                .outer_iter()
                .enumerate()
                .map(|(slice_index, slice)| SliceBoundingBox {
                    slice_index,
                    bounding_box: slice_bounding_box(slice),
                })
                .collect()
        };

        BoundingBoxCollection { records }
    }

    /// Like [`Self::extract`] but accepts an array of unchecked dimensionality.
    pub fn extract_dyn<A>(
        &self,
        volume: ArrayViewD<'_, A>,
        source_name: &str,
    ) -> Result<BoundingBoxCollection, SegboxError>
    where
        A: PartialOrd + Default + Sync,
    {
        let shape = volume.shape().to_vec();
        let volume = volume
            .into_dimensionality::<Ix3>()
            .map_err(|_| SegboxError::InvalidInputShape {
                shape,
                source_name: source_name.to_string(),
            })?;
        Ok(self.extract(volume))
    }

    /// Extracts and persists the collection, returning it with a report.
    pub fn extract_to_file<A, P>(
        &self,
        volume: ArrayView3<'_, A>,
        output: P,
    ) -> Result<(BoundingBoxCollection, ExtractionReport), SegboxError>
    where
        A: PartialOrd + Default + Sync,
        P: AsRef<Path>,
    {
        let output = output.as_ref();
        let collection = self.extract(volume);
        collection.write_json(output)?;

        let report = ExtractionReport {
            slices: collection.len(),
            present: collection.present_count(),
            output: output.to_path_buf(),
        };
        info!(
            "Bounding boxes for {} slices ({} with a region) saved to {}",
            report.slices,
            report.present,
            output.display()
        );
        Ok((collection, report))
    }
}
