use std::fs;
use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage, imageops};
use snafu::ResultExt;
use tracing::*;

use crate::{
    consts::{FIGURE_BACKGROUND, PANEL_GAP},
    error::*,
};

/// Panels of one render call laid out left to right.
#[derive(Debug, Clone)]
pub struct Figure {
    pub slice_indices: Vec<usize>,
    pub image: RgbImage,
}

impl Figure {
    /// Composes panels side by side on a white canvas, top aligned.
    pub fn compose(panels: Vec<(usize, RgbImage)>) -> Self {
        let gaps = PANEL_GAP * panels.len().saturating_sub(1) as u32;
        let width = panels.iter().map(|(_, panel)| panel.width()).sum::<u32>() + gaps;
        let height = panels
            .iter()
            .map(|(_, panel)| panel.height())
            .max()
            .unwrap_or(0);

        let mut image = RgbImage::from_pixel(width, height, Rgb(FIGURE_BACKGROUND));
        let mut slice_indices = Vec::with_capacity(panels.len());
        let mut x = 0i64;
        for (slice_index, panel) in &panels {
            imageops::overlay(&mut image, panel, x, 0);
            x += (panel.width() + PANEL_GAP) as i64;
            slice_indices.push(*slice_index);
        }

        Self {
            slice_indices,
            image,
        }
    }

    /// File name derived from the slices shown, e.g. `overlay-2_3_4.png`.
    pub fn file_name(&self) -> String {
        let indices = self
            .slice_indices
            .iter()
            .map(|index| index.to_string())
            .collect::<Vec<_>>()
            .join("_");
        format!("overlay-{indices}.png")
    }
}

/// Destination of rendered figures, handed to the renderer explicitly.
pub trait FigureSink {
    fn present(&mut self, figure: Figure) -> Result<(), SegboxError>;
}

/// Writes each figure as a PNG file into a directory.
#[derive(Debug, Clone)]
pub struct PngSink {
    dir: PathBuf,
    written: Vec<PathBuf>,
}

impl PngSink {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            written: Vec::new(),
        }
    }

    /// Paths written so far, in order.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }
}

impl FigureSink for PngSink {
    fn present(&mut self, figure: Figure) -> Result<(), SegboxError> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir).context(IoWriteSnafu {
                path: self.dir.to_string_lossy(),
            })?;
            info!("Created output directory: {}", self.dir.display());
        }

        let output = self.dir.join(figure.file_name());
        figure.image.save(&output).context(ImageWriteSnafu {
            path: output.to_string_lossy(),
        })?;
        info!("Overlay saved to {}", output.display());

        self.written.push(output);
        Ok(())
    }
}

/// Keeps figures in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub figures: Vec<Figure>,
}

impl FigureSink for MemorySink {
    fn present(&mut self, figure: Figure) -> Result<(), SegboxError> {
        self.figures.push(figure);
        Ok(())
    }
}
