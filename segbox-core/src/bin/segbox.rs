use std::error::Error;
use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use segbox_core::consts::*;
use segbox_core::pipeline::{self, PipelineReport};
use segbox_core::render::{FigureSink, PngSink};
use segbox_core::{PipelineConfigBuilder, RenderConfigBuilder, RenderOutcome, SegboxError};

#[derive(Parser)]
#[command(name = "segbox")]
#[command(about = "Per-slice bounding boxes of a segmentation volume")]
struct Args {
    #[arg(long, help = "Anatomical volume (.nrrd, .nii, .nii.gz)")]
    volume: PathBuf,

    #[arg(long, help = "Segmentation volume with non-zero labels")]
    segmentation: PathBuf,

    #[arg(short, long, default_value = DEFAULT_OUTPUT_FILE, help = "Output JSON file")]
    output: PathBuf,

    #[arg(
        short,
        long,
        default_value_t = DEFAULT_NUM_SLICES,
        help = "Slices with a bounding box skipped before the rendered ones"
    )]
    num_slices: usize,

    #[arg(long, default_value = DEFAULT_RENDER_DIR, help = "Directory for overlay images")]
    render_dir: PathBuf,

    #[arg(long, help = "Skip rendering overlays")]
    no_render: bool,

    #[arg(long, help = "Scan slices in parallel")]
    parallel: bool,

    #[arg(long, help = "TrueType font for slice titles")]
    font: Option<PathBuf>,

    #[arg(long, default_value_t = 1, help = "Integer upscaling of overlay panels")]
    panel_scale: u32,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV_NAME).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn build_config(args: &Args) -> Result<segbox_core::PipelineConfig, SegboxError> {
    let render = RenderConfigBuilder::default()
        .panel_scale(args.panel_scale)
        .font_path(args.font.clone())
        .build()
        .map_err(|err| SegboxError::InvalidConfig {
            message: err.to_string(),
        })?;

    PipelineConfigBuilder::default()
        .volume(args.volume.clone())
        .segmentation(args.segmentation.clone())
        .output(args.output.clone())
        .num_slices(args.num_slices)
        .parallel(args.parallel)
        .render(render)
        .build()
        .map_err(|err| SegboxError::InvalidConfig {
            message: err.to_string(),
        })
}

/// Print run summary to console
fn print_summary(report: &PipelineReport, sink: Option<&PngSink>) {
    println!("\n=== Bounding Box Extraction Summary ===");
    println!("Shape: {:?}", report.shape);
    println!("Slices processed: {}", report.extraction.slices);
    println!("Slices with a region: {}", report.extraction.present);
    println!("Bounding boxes saved to {}", report.extraction.output.display());

    match &report.render {
        None => println!("Rendering: skipped"),
        Some(Ok(RenderOutcome::EmptyCollection)) => {
            println!("Rendering: no slices with bounding boxes found")
        }
        Some(Ok(RenderOutcome::WindowEmpty { present })) => {
            println!("Rendering: all {present} slices with bounding boxes were skipped")
        }
        Some(Ok(RenderOutcome::Rendered { slices })) => {
            println!("Rendered slices: {slices:?}");
            for path in sink.map(PngSink::written).unwrap_or_default() {
                println!("  - {}", path.display());
            }
        }
        Some(Err(message)) => println!("Rendering failed: {message}"),
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();

    let args = Args::parse();
    info!("Volume: {}", args.volume.display());
    info!("Segmentation: {}", args.segmentation.display());
    info!("Output: {}", args.output.display());

    let config = build_config(&args)?;

    let mut png_sink = (!args.no_render).then(|| PngSink::new(&args.render_dir));
    let sink = png_sink.as_mut().map(|sink| sink as &mut dyn FigureSink);

    let report = pipeline::run(&config, sink).inspect_err(|err| {
        error!("Extraction failed: {}", err);
    })?;

    print_summary(&report, png_sink.as_ref());
    info!("Extraction completed successfully!");
    Ok(())
}
