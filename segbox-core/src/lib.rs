pub mod analysis;
pub mod consts;
pub mod error;
pub mod pipeline;
pub mod render;
pub mod volume;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use analysis::{
    bbox::SliceBox,
    extract::{BoundingBoxCollection, BoundingBoxExtractor, SliceBoundingBox},
};
pub use error::SegboxError;
pub use pipeline::{PipelineConfig, PipelineConfigBuilder, PipelineReport};
pub use render::{RenderConfig, RenderConfigBuilder, RenderOutcome, SliceOverlayRenderer};
