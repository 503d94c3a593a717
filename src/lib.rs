//! Drawing to EPS Export Library
//!
//! This library converts layered vector drawings into Encapsulated
//! PostScript. It exposes modules for loading drawings, selecting layers,
//! computing bounding boxes and writing PostScript.
//!
//! ## Module Overview
//!
//! - `cli`: `sk2ps` command line parsing and exit status
//! - `converter`: the load → bounding box → render → close pipeline
//! - `device`: renderer and device factory traits, output targets
//! - `document`: layered drawing model and the `Document` trait
//! - `error`: error types for each pipeline stage
//! - `geometry`: bounding boxes and outlines built on `kurbo`
//! - `loader`: JSON drawing file loader
//! - `options`: layer selection and EPS header options
//! - `postscript`: EPS output device
//! - `telemetry`: structured logging
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use eps_export::{
//!     converter::EpsConverter,
//!     device::OutputTarget,
//!     options::{ConversionOptions, LayerSelection},
//! };
//! use std::path::{Path, PathBuf};
//!
//! let converter = EpsConverter::new();
//!
//! // Printable and visible layers, title taken from the file name
//! let options = ConversionOptions::default()
//!     .with_selection(LayerSelection::new(true, true));
//!
//! let report = converter.convert(
//!     Path::new("drawing.json"),
//!     OutputTarget::Path(PathBuf::from("drawing.eps")),
//!     &options,
//! );
//! assert!(report.is_ok());
//! ```

pub mod cli;
pub mod converter;
pub mod device;
pub mod document;
pub mod error;
pub mod geometry;
pub mod loader;
pub mod options;
pub mod postscript;
pub mod telemetry;

pub use converter::{convert, ConversionReport, EpsConverter};
pub use error::{ConversionError, DeviceError, LoadError};
