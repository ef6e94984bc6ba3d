use std::fs;
use std::path::PathBuf;

use ab_glyph::{FontVec, PxScale};
use derive_builder::Builder;
use image::{Rgb, RgbImage, imageops, imageops::FilterType};
use imageproc::{
    drawing::{draw_hollow_rect_mut, draw_text_mut},
    rect::Rect,
};
use ndarray::prelude::*;
use snafu::ResultExt;
use tracing::*;

use crate::{
    analysis::{
        bbox::SliceBox,
        extract::{BoundingBoxCollection, SliceBoundingBox},
    },
    consts::*,
    error::*,
    volume::ensure_same_shape,
};

pub mod colormap;
pub mod figure;

pub use figure::{Figure, FigureSink, MemorySink, PngSink};

use colormap::{Normalizer, blend, gray, jet};

/// Presentation settings of [`SliceOverlayRenderer`].
#[derive(Debug, Clone, Builder)]
#[builder(default, setter(into), build_fn(validate = "Self::validate"))]
pub struct RenderConfig {
    /// Opacity of the segmentation overlay, in `[0, 1]`.
    pub overlay_alpha: f32,
    pub box_color: [u8; 3],
    pub box_thickness: u32,
    /// Integer nearest-neighbour upscaling of each panel.
    pub panel_scale: u32,
    /// Maximum number of slices per figure.
    pub window: usize,
    /// TrueType font for the "Slice N" panel titles; no titles when unset.
    pub font_path: Option<PathBuf>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            overlay_alpha: OVERLAY_ALPHA,
            box_color: BOX_COLOR,
            box_thickness: BOX_THICKNESS,
            panel_scale: 1,
            window: RENDER_WINDOW,
            font_path: None,
        }
    }
}

impl RenderConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(alpha) = self.overlay_alpha {
            if !(0.0..=1.0).contains(&alpha) {
                return Err(format!("overlay alpha {alpha} is outside [0, 1]"));
            }
        }
        if self.panel_scale == Some(0) {
            return Err("panel scale must be at least 1".to_string());
        }
        if self.box_thickness == Some(0) {
            return Err("box thickness must be at least 1".to_string());
        }
        Ok(())
    }
}

/// What a render call ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutcome {
    /// No slice has a bounding box; nothing was drawn.
    EmptyCollection,
    /// Every present slice was skipped by the requested offset.
    WindowEmpty { present: usize },
    Rendered { slices: Vec<usize> },
}

/// Draws a few slices with their segmentation and bounding box overlaid.
pub struct SliceOverlayRenderer {
    config: RenderConfig,
    font: Option<FontVec>,
}

impl SliceOverlayRenderer {
    pub fn new(config: RenderConfig) -> Result<Self, SegboxError> {
        let font = match &config.font_path {
            Some(path) => {
                let bytes = fs::read(path).context(IoReadSnafu {
                    path: path.to_string_lossy(),
                })?;
                Some(FontVec::try_from_vec(bytes).context(FontSnafu)?)
            }
            None => None,
        };
        Ok(Self { config, font })
    }

    /// Skips the first `num_slices` records that carry a box and takes up to
    /// `window` of the following ones. Positions count present records only.
    pub fn select_window<'a>(
        &self,
        collection: &'a BoundingBoxCollection,
        num_slices: usize,
    ) -> Vec<&'a SliceBoundingBox> {
        collection
            .present()
            .skip(num_slices)
            .take(self.config.window)
            .collect()
    }

    pub fn render(
        &self,
        volume: ArrayView3<'_, f32>,
        segmentation: ArrayView3<'_, f32>,
        collection: &BoundingBoxCollection,
        num_slices: usize,
        sink: &mut dyn FigureSink,
    ) -> Result<RenderOutcome, SegboxError> {
        ensure_same_shape(volume, segmentation)?;

        let present = collection.present_count();
        if present == 0 {
            warn!("No slices with bounding boxes found.");
            return Ok(RenderOutcome::EmptyCollection);
        }

        let window = self.select_window(collection, num_slices);
        if window.is_empty() {
            info!("All {present} slices with bounding boxes skipped by offset {num_slices}");
            return Ok(RenderOutcome::WindowEmpty { present });
        }

        let (depth, height, width) = volume.dim();
        let mut panels = Vec::with_capacity(window.len());
        for record in window {
            let Some(bbox) = record.bounding_box else {
                continue;
            };
            if record.slice_index >= depth {
                return Err(SegboxError::SliceOutOfRange {
                    slice_index: record.slice_index,
                    depth,
                });
            }
            if !bbox.fits_within(width, height) {
                return Err(SegboxError::InvalidBox {
                    values: bbox.to_array(),
                });
            }

            let panel = self.render_panel(
                volume.index_axis(Axis(0), record.slice_index),
                segmentation.index_axis(Axis(0), record.slice_index),
                record.slice_index,
                bbox,
            );
            panels.push((record.slice_index, panel));
        }

        let figure = Figure::compose(panels);
        let slices = figure.slice_indices.clone();
        debug!("rendering slices {slices:?}");
        sink.present(figure)?;

        Ok(RenderOutcome::Rendered { slices })
    }

    fn render_panel(
        &self,
        volume: ArrayView2<'_, f32>,
        segmentation: ArrayView2<'_, f32>,
        slice_index: usize,
        bbox: SliceBox,
    ) -> RgbImage {
        let (height, width) = volume.dim();
        let intensity = Normalizer::from_slice(volume);
        let labels = Normalizer::from_slice(segmentation);
        let alpha = self.config.overlay_alpha;

        let mut image = RgbImage::from_fn(width as u32, height as u32, |x, y| {
            let (row, col) = (y as usize, x as usize);
            let base = gray(intensity.apply(volume[[row, col]]));
            let overlay = jet(labels.apply(segmentation[[row, col]]));
            Rgb(blend(base, overlay, alpha))
        });

        let scale = self.config.panel_scale;
        if scale > 1 {
            image = imageops::resize(
                &image,
                image.width() * scale,
                image.height() * scale,
                FilterType::Nearest,
            );
        }

        let x = (bbox.min.x * scale) as i32;
        let y = (bbox.min.y * scale) as i32;
        let box_width = bbox.width() * scale;
        let box_height = bbox.height() * scale;
        let color = Rgb(self.config.box_color);
        // thicker outline grows outwards
        for offset in 0..self.config.box_thickness {
            let thick_rect = Rect::at(x - offset as i32, y - offset as i32)
                .of_size(box_width + offset * 2, box_height + offset * 2);
            draw_hollow_rect_mut(&mut image, thick_rect, color);
        }

        match &self.font {
            Some(font) => self.add_title(image, font, slice_index),
            None => image,
        }
    }

    fn add_title(&self, panel: RgbImage, font: &FontVec, slice_index: usize) -> RgbImage {
        let mut canvas = RgbImage::from_pixel(
            panel.width(),
            panel.height() + TITLE_HEIGHT,
            Rgb(FIGURE_BACKGROUND),
        );
        imageops::overlay(&mut canvas, &panel, 0, TITLE_HEIGHT as i64);
        draw_text_mut(
            &mut canvas,
            Rgb([0, 0, 0]),
            4,
            4,
            PxScale::from(TITLE_FONT_SCALE),
            font,
            &format!("Slice {slice_index}"),
        );
        canvas
    }
}
