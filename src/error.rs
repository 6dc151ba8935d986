//! Error types for the export pipeline

use thiserror::Error;

/// Result type alias for export operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while exporting a preview
#[derive(Error, Debug)]
pub enum Error {
    /// A required capability (rasterizer, document assembler) is not available yet
    #[error("Export capability not ready: {0}")]
    NotReady(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Failed to parse input markup, styles or profile data
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Styles changed since the last reflow; layout must settle before capture
    #[error("Layout is stale (style generation {current}, laid out at {laid_out:?})")]
    LayoutStale { current: u64, laid_out: Option<u64> },

    /// Failed to render content
    #[error("Rendering failed: {0}")]
    RenderError(String),

    /// Failed to load or decode an image
    #[error("Image error: {0}")]
    ImageError(String),

    /// Failed to assemble the paginated document
    #[error("Document assembly failed: {0}")]
    DocumentError(String),

    /// The host refused or failed to accept the generated file
    #[error("Download failed: {0}")]
    DownloadError(String),

    /// I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<lopdf::Error> for Error {
    fn from(err: lopdf::Error) -> Self {
        Error::DocumentError(err.to_string())
    }
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::ImageError(err.to_string())
    }
}
