use std::path::PathBuf;

use derive_builder::Builder;
use ndarray::prelude::*;
use tracing::*;

use crate::{
    analysis::extract::{BoundingBoxCollection, BoundingBoxExtractor, ExtractionReport},
    consts::*,
    error::SegboxError,
    render::{FigureSink, RenderConfig, RenderOutcome, SliceOverlayRenderer},
    volume::{ensure_same_shape, load_volume},
};

/// Inputs and settings of one extraction run.
#[derive(Debug, Clone, Builder)]
#[builder(setter(into))]
pub struct PipelineConfig {
    /// Anatomical volume the overlays are drawn on.
    pub volume: PathBuf,
    /// Labeled volume the boxes are extracted from.
    pub segmentation: PathBuf,
    #[builder(default = "PathBuf::from(DEFAULT_OUTPUT_FILE)")]
    pub output: PathBuf,
    /// Present slices skipped before the render window.
    #[builder(default = "DEFAULT_NUM_SLICES")]
    pub num_slices: usize,
    #[builder(default)]
    pub parallel: bool,
    #[builder(default)]
    pub render: RenderConfig,
}

#[derive(Debug)]
pub struct PipelineReport {
    pub shape: [usize; 3],
    pub extraction: ExtractionReport,
    /// `None` when no sink was given; `Err` holds the render failure message.
    pub render: Option<Result<RenderOutcome, String>>,
}

/// Loads both volumes from disk and runs [`process`].
pub fn run(
    config: &PipelineConfig,
    sink: Option<&mut dyn FigureSink>,
) -> Result<PipelineReport, SegboxError> {
    let volume = load_volume(&config.volume)?;
    let segmentation = load_volume(&config.segmentation)?;
    process(config, volume.view(), segmentation.view(), sink)
}

/// Checks shapes, extracts and persists the boxes, then renders if a sink is given.
///
/// Every failure before the write aborts the run with nothing written. A
/// failing render is logged and reported but leaves the written document intact.
pub fn process(
    config: &PipelineConfig,
    volume: ArrayView3<'_, f32>,
    segmentation: ArrayView3<'_, f32>,
    sink: Option<&mut dyn FigureSink>,
) -> Result<PipelineReport, SegboxError> {
    ensure_same_shape(volume, segmentation)?;
    let (depth, height, width) = segmentation.dim();

    let (collection, extraction) = BoundingBoxExtractor::new()
        .with_parallel(config.parallel)
        .extract_to_file(segmentation, &config.output)?;
    info!("Generated bounding boxes for {} slices.", collection.len());

    let render = sink.map(|sink| render_isolated(config, volume, segmentation, &collection, sink));

    Ok(PipelineReport {
        shape: [depth, height, width],
        extraction,
        render,
    })
}

fn render_isolated(
    config: &PipelineConfig,
    volume: ArrayView3<'_, f32>,
    segmentation: ArrayView3<'_, f32>,
    collection: &BoundingBoxCollection,
    sink: &mut dyn FigureSink,
) -> Result<RenderOutcome, String> {
    SliceOverlayRenderer::new(config.render.clone())
        .and_then(|renderer| {
            renderer.render(volume, segmentation, collection, config.num_slices, sink)
        })
        .map_err(|err| {
            error!("Rendering failed, bounding boxes are kept: {}", err);
            err.to_string()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        render::{Figure, MemorySink},
        test_support::{TempDir, write_nrrd_u8},
    };

    struct FailingSink;

    impl FigureSink for FailingSink {
        fn present(&mut self, _figure: Figure) -> Result<(), SegboxError> {
            Err(SegboxError::InvalidConfig {
                message: "display backend unavailable".to_string(),
            })
        }
    }

    /// Writes the (10, 100, 100) scenario: a 10x10 square at [40, 50) on slices 2..=4.
    fn write_scenario(dir: &TempDir) -> (PathBuf, PathBuf) {
        let (depth, height, width) = (10, 100, 100);
        let mut mask = vec![0u8; depth * height * width];
        let mut anatomy = vec![0u8; depth * height * width];
        for z in 0..depth {
            for y in 0..height {
                for x in 0..width {
                    let index = (z * height + y) * width + x;
                    anatomy[index] = ((x + y) % 256) as u8;
                    if (2..=4).contains(&z) && (40..50).contains(&y) && (40..50).contains(&x) {
                        mask[index] = 1;
                    }
                }
            }
        }

        let volume = dir.path().join("MRBrainTumor2.nrrd");
        let segmentation = dir.path().join("Segmentation.seg.nrrd");
        write_nrrd_u8(&volume, [width, height, depth], &anatomy);
        write_nrrd_u8(&segmentation, [width, height, depth], &mask);
        (volume, segmentation)
    }

    fn config(dir: &TempDir, volume: PathBuf, segmentation: PathBuf) -> PipelineConfig {
        PipelineConfigBuilder::default()
            .volume(volume)
            .segmentation(segmentation)
            .output(dir.path().join("bounding_boxes.json"))
            .num_slices(0usize)
            .build()
            .unwrap()
    }

    #[test]
    fn test_config_defaults() {
        let config = PipelineConfigBuilder::default()
            .volume("volume.nrrd")
            .segmentation("mask.seg.nrrd")
            .build()
            .unwrap();
        assert_eq!(config.output, PathBuf::from(DEFAULT_OUTPUT_FILE));
        assert_eq!(config.num_slices, DEFAULT_NUM_SLICES);
        assert!(!config.parallel);

        assert!(PipelineConfigBuilder::default().volume("v.nrrd").build().is_err());
    }

    #[test]
    fn test_run_scenario() {
        let dir = TempDir::new();
        let (volume, segmentation) = write_scenario(&dir);
        let config = config(&dir, volume, segmentation);

        let mut sink = MemorySink::default();
        let report = run(&config, Some(&mut sink)).unwrap();

        assert_eq!(report.shape, [10, 100, 100]);
        assert_eq!(report.extraction.slices, 10);
        assert_eq!(report.extraction.present, 3);
        assert_eq!(
            report.render,
            Some(Ok(RenderOutcome::Rendered {
                slices: vec![2, 3, 4]
            }))
        );

        let collection = BoundingBoxCollection::read_json(&config.output).unwrap();
        for record in collection.iter() {
            let expected = (2..=4)
                .contains(&record.slice_index)
                .then_some([40, 40, 49, 49]);
            assert_eq!(record.bounding_box.map(|bbox| bbox.to_array()), expected);
        }
        assert_eq!(sink.figures.len(), 1);
    }

    #[test]
    fn test_run_without_sink() {
        let dir = TempDir::new();
        let (volume, segmentation) = write_scenario(&dir);
        let config = config(&dir, volume, segmentation);

        let report = run(&config, None).unwrap();
        assert!(report.render.is_none());
        assert!(config.output.exists());
    }

    #[test]
    fn test_shape_mismatch_writes_nothing() {
        let dir = TempDir::new();
        let volume = dir.path().join("volume.nrrd");
        let segmentation = dir.path().join("mask.nrrd");
        write_nrrd_u8(&volume, [4, 4, 2], &[0; 32]);
        write_nrrd_u8(&segmentation, [4, 2, 4], &[1; 32]);
        let config = config(&dir, volume, segmentation);

        let result = run(&config, None);
        assert!(matches!(result, Err(SegboxError::ShapeMismatch { .. })));
        assert!(!config.output.exists());
    }

    #[test]
    fn test_missing_input() {
        let dir = TempDir::new();
        let config = config(
            &dir,
            dir.path().join("absent.nrrd"),
            dir.path().join("absent.seg.nrrd"),
        );
        assert!(matches!(
            run(&config, None),
            Err(SegboxError::IoRead { .. })
        ));
    }

    #[test]
    fn test_render_failure_keeps_boxes() {
        let dir = TempDir::new();
        let config = config(&dir, dir.path().join("unused"), dir.path().join("unused"));
        let volume = Array3::<f32>::ones((3, 6, 6));
        let mut segmentation = Array3::<f32>::zeros((3, 6, 6));
        segmentation[[1, 2, 3]] = 1.0;

        let report = process(
            &config,
            volume.view(),
            segmentation.view(),
            Some(&mut FailingSink),
        )
        .unwrap();

        assert!(matches!(report.render, Some(Err(_))));
        let collection = BoundingBoxCollection::read_json(&config.output).unwrap();
        assert_eq!(collection.present_count(), 1);
        assert_eq!(
            collection
                .iter()
                .find(|record| record.slice_index == 1)
                .and_then(|record| record.bounding_box)
                .map(|bbox| bbox.to_array()),
            Some([3, 2, 3, 2])
        );
    }
}
