//! Error types for the drawing to EPS pipeline.
//!
//! Each stage has its own error so callers can tell input-file problems
//! (`LoadError`) from output-target problems (`DeviceError`).
//! `ConversionError` records which stage of a conversion failed.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failure to turn a drawing file into a document.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("cannot read drawing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed drawing {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{path} is not a drawing file (format tag {found:?})")]
    NotADrawing { path: PathBuf, found: String },

    #[error("unsupported drawing format version {found} (supported: {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },
}

/// Failure reported by an output device.
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("cannot open output {target}: {source}")]
    Open {
        target: String,
        #[source]
        source: io::Error,
    },

    #[error("cannot read font file {path}: {source}")]
    Font {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("output error: {0}")]
    Io(#[from] io::Error),

    #[error("device is already closed")]
    Closed,

    #[error("unbalanced {0}")]
    Unbalanced(&'static str),
}

/// A conversion failure, tagged with the stage that failed.
#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("loading the drawing failed")]
    LoadFailed(#[source] LoadError),

    #[error("opening the PostScript output failed")]
    DeviceOpenFailed(#[source] DeviceError),

    #[error("rendering the drawing failed")]
    RenderFailed(#[source] DeviceError),

    #[error("closing the PostScript output failed")]
    CloseFailed(#[source] DeviceError),
}

/// Convenience Result type alias for ConversionError.
pub type Result<T> = std::result::Result<T, ConversionError>;
