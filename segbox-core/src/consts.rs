/// Default file name of the persisted bounding-box document.
pub const DEFAULT_OUTPUT_FILE: &str = "bounding_boxes.json";

/// Default directory for rendered overlay figures.
pub const DEFAULT_RENDER_DIR: &str = "overlays";

/// Number of present records skipped before the render window starts.
pub const DEFAULT_NUM_SLICES: usize = 3;

/// Maximum number of slices rendered side by side in one figure.
///
/// The renderer skips `n` slices that carry a bounding box and then takes
/// at most this many of the following ones.
pub const RENDER_WINDOW: usize = 3;

/// Indentation used for the JSON document, one level per nesting depth.
pub const JSON_INDENT: &[u8] = b"    ";

/// Opacity of the segmentation overlay blended over the volume slice.
pub const OVERLAY_ALPHA: f32 = 0.3;

/// Outline color of the bounding box.
pub const BOX_COLOR: [u8; 3] = [255, 0, 0];

/// Outline thickness in output pixels.
pub const BOX_THICKNESS: u32 = 2;

/// Horizontal gap between panels of a figure.
pub const PANEL_GAP: u32 = 8;

/// Height of the title strip above each panel when a font is configured.
pub const TITLE_HEIGHT: u32 = 24;

/// Font size of the panel title.
pub const TITLE_FONT_SCALE: f32 = 16.0;

/// Background of the composed figure (white, as a plotting canvas).
pub const FIGURE_BACKGROUND: [u8; 3] = [255, 255, 255];

/// Magic prefix shared by every NRRD revision.
pub const NRRD_MAGIC: &str = "NRRD000";

/// Environment variable read for the log filter.
pub const LOG_ENV_NAME: &str = "RUST_LOG";
