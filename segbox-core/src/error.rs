use snafu::prelude::*;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SegboxError {
    #[snafu(display("`{}` must be a 3-dimensional array, got shape {:?}", source_name, shape))]
    InvalidInputShape {
        shape: Vec<usize>,
        source_name: String,
    },
    #[snafu(display(
        "Volume shape {:?} does not match segmentation shape {:?}",
        volume,
        segmentation
    ))]
    ShapeMismatch {
        volume: Vec<usize>,
        segmentation: Vec<usize>,
    },
    #[snafu(display("Read `{}` error: {}", path, source))]
    IoRead {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Write `{}` error: {}", path, source))]
    IoWrite {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Json `{}` error: {}", path, source))]
    Json {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Image Write `{}` error: {}", path, source))]
    ImageWrite {
        source: image::ImageError,
        path: String,
    },
    #[snafu(display("Nifti `{}` error: {}", path, source))]
    Nifti {
        source: nifti::NiftiError,
        path: String,
    },
    #[snafu(display("Nrrd `{}` error: {}", path, message))]
    Nrrd { path: String, message: String },
    #[snafu(display("Json document is not valid UTF-8: {}", source))]
    Utf8 { source: std::string::FromUtf8Error },
    #[snafu(display("Unsupported volume format: `{}`", path))]
    UnsupportedFormat { path: String },
    #[snafu(display("Ndarray Shape error at stage `{}`: {}", stage, source))]
    Shape {
        source: ndarray::ShapeError,
        stage: String,
    },
    #[snafu(display("Load Font error: {}", source))]
    Font { source: ab_glyph::InvalidFont },
    #[snafu(display("Invalid bounding box {:?}, expected min <= max", values))]
    InvalidBox { values: [u32; 4] },
    #[snafu(display("Slice index {} out of range for depth {}", slice_index, depth))]
    SliceOutOfRange { slice_index: usize, depth: usize },
    #[snafu(display("Invalid configuration: {}", message))]
    InvalidConfig { message: String },
}
