//! Folioprint
//!
//! Print export for live resume previews: temporarily restyle a preview
//! subtree for print, rasterize it once at high resolution, put every style
//! back, then slice the tall raster into portrait A4 pages of a PDF.
//!
//! # Features
//!
//! - **Reversible print mode**: inline styles are snapshotted before any
//!   rescaling and restored by a scoped guard on every exit path
//! - **Settled capture**: the rasterizer refuses a layout older than the
//!   latest style change
//! - **Swappable backends**: `Rasterizer` and `DocumentAssembler` traits with a
//!   software rasterizer and an lopdf writer built in
//!
//! # Example
//!
//! ```no_run
//! use folioprint::{Capabilities, ExportConfig, ExportController, Host, RenderTree, ResumeProfile};
//! use folioprint::platform::{DirectoryDownloads, LabelCell, LogNotifier};
//! use std::sync::Arc;
//!
//! # async fn run() -> folioprint::Result<()> {
//! let config = ExportConfig::default();
//! let mut tree = RenderTree::parse_html(&std::fs::read_to_string("preview.html")?, config.viewport)?;
//! let host = Host::new(
//!     Arc::new(LabelCell::new(&config.labels.idle)),
//!     Arc::new(LogNotifier::new()),
//!     Arc::new(DirectoryDownloads::new(".")),
//! );
//! let mut controller = ExportController::new(config, Capabilities::software(), host);
//! let target = tree.find_by_id("resume-preview");
//! if let Some(report) = controller.export(&mut tree, target, &ResumeProfile::named("Jane Doe")).await? {
//!     println!("{}: {} page(s)", report.file_name, report.page_count);
//! }
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub mod error;
pub use error::{Error, Result};

pub mod dom;
pub mod export;
pub mod paginate;
pub mod pdf;
pub mod platform;
pub mod print;
pub mod profile;
pub mod rendering;
pub mod style;

pub use dom::{InlineStyle, NodeId, RenderTree};
pub use export::{Capabilities, ExportController, ExportReport, ExportState};
pub use paginate::{ImageCompression, PageFormat, Paginator};
pub use platform::Host;
pub use print::{PrintMode, PrintProfile, PrintRescaler, RestoreOutcome, StyleSnapshot};
pub use profile::ResumeProfile;
pub use rendering::{CaptureOptions, RasterImage, Rasterizer, SoftwareRasterizer};

/// Viewport dimensions in CSS px
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

/// Captions of the export trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusLabels {
    /// Shown while an export is running
    pub busy: String,
    /// Shown otherwise
    pub idle: String,
}

impl Default for StatusLabels {
    fn default() -> Self {
        Self {
            busy: "Generating PDF...".to_string(),
            idle: "Download PDF".to_string(),
        }
    }
}

/// Configuration for an export
///
/// The defaults reproduce the builder's export: 2.5x capture on white, a
/// 200 ms settle delay, portrait A4 with compression, and the standard print
/// profile. Every field may be overridden from JSON; missing fields keep
/// their defaults.
///
/// # Examples
///
/// ```
/// let cfg = folioprint::ExportConfig::default();
/// assert_eq!(cfg.scale, 2.5);
/// assert_eq!(cfg.settle_delay().as_millis(), 200);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Device pixels per CSS px in the capture
    pub scale: f64,
    /// Opaque fill behind the captured content
    pub background: String,
    /// Wait between applying print styles and re-laying out for capture
    pub settle_delay_ms: u64,
    /// Fetch images from other origins during capture
    pub allow_cross_origin: bool,
    /// Let the rasterizer log its own progress
    pub rasterizer_logging: bool,
    /// Physical page size in mm
    pub page_format: PageFormat,
    /// Compress PDF content streams
    pub compress: bool,
    /// Compression effort for the embedded capture
    pub image_compression: ImageCompression,
    /// Print rescaling factors
    pub print: PrintProfile,
    /// Export trigger captions
    pub labels: StatusLabels,
    /// Viewport the preview is laid out in
    pub viewport: Viewport,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            scale: 2.5,
            background: "#ffffff".to_string(),
            settle_delay_ms: 200,
            allow_cross_origin: true,
            rasterizer_logging: false,
            page_format: PageFormat::A4,
            compress: true,
            image_compression: ImageCompression::Fast,
            print: PrintProfile::default(),
            labels: StatusLabels::default(),
            viewport: Viewport::default(),
        }
    }
}

impl ExportConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Load overrides from a JSON file and validate the result.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigError(format!("{}: {}", path.display(), e)))?;
        let config: ExportConfig =
            serde_json::from_str(&text).map_err(|e| Error::ConfigError(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.scale.is_finite() && self.scale > 0.0) {
            return Err(Error::ConfigError(format!("scale must be positive, got {}", self.scale)));
        }
        if !(self.page_format.width > 0.0 && self.page_format.height > 0.0) {
            return Err(Error::ConfigError(format!(
                "page format must be positive, got {}x{}",
                self.page_format.width, self.page_format.height
            )));
        }
        if self.viewport.width == 0 {
            return Err(Error::ConfigError("viewport width must be non-zero".into()));
        }
        if style::parse_color(&self.background).is_none() {
            return Err(Error::ConfigError(format!("unrecognized background color {:?}", self.background)));
        }
        Ok(())
    }
}
