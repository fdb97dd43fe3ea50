//! Error types for the capture pipeline

use thiserror::Error;

/// Result type alias for capture operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while capturing, exporting or compositing
#[derive(Error, Debug)]
pub enum Error {
    /// A platform capability (e.g. display capture) is not present at all
    #[error("Capability unavailable: {0}")]
    CapabilityUnavailable(String),

    /// The user (or platform) refused a permission prompt
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Failed to produce a raster from the document (missing surface, zero size, ...)
    #[error("Rendering failed: {0}")]
    RenderError(String),

    /// The annotation layer could not be exported
    #[error("Annotation export failed: {0}")]
    ExportError(String),

    /// A raster could not be loaded for compositing
    #[error("Image load failed: {0}")]
    ImageLoadError(String),

    /// Pixel read refused because the source is cross-origin
    #[error("Tainted source: {0}")]
    Tainted(String),

    /// Operation timed out
    #[error("Operation timed out after {0}ms")]
    Timeout(u64),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Document model misuse (unknown node, wrong node kind, ...)
    #[error("Document error: {0}")]
    DomError(String),

    /// Failed to load a document
    #[error("Failed to load document: {0}")]
    LoadError(String),

    /// CDP-specific error
    #[cfg(feature = "cdp")]
    #[error("CDP error: {0}")]
    CdpError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::ImageLoadError(err.to_string())
    }
}

impl From<base64::DecodeError> for Error {
    fn from(err: base64::DecodeError) -> Self {
        Error::ImageLoadError(format!("invalid base64 payload: {}", err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::ConfigError(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Other(err.to_string())
    }
}

impl Error {
    /// Whether this error means the capability is missing rather than the
    /// capture having been attempted and failed.
    pub fn is_capability_absent(&self) -> bool {
        matches!(self, Error::CapabilityUnavailable(_))
    }
}
