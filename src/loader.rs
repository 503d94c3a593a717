//! Drawing file loader.
//!
//! Drawings are JSON documents:
//!
//! ```json
//! {
//!   "format": "sk2ps-drawing",
//!   "version": 1,
//!   "layers": [
//!     { "name": "Artwork", "visible": true, "printable": true,
//!       "shapes": [ { "type": "rectangle", "x": 0, "y": 0,
//!                     "width": 10, "height": 10,
//!                     "style": { "fill": [0, 0, 1] } } ] }
//!   ]
//! }
//! ```

use crate::document::{Document, Drawing, Layer};
use crate::error::LoadError;
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{debug, info};

/// Format tag every drawing file starts with.
pub const FORMAT_TAG: &str = "sk2ps-drawing";

/// Newest drawing format version this loader understands.
pub const SUPPORTED_VERSION: u32 = 1;

/// Turns a path into a document.
#[cfg_attr(test, mockall::automock)]
pub trait Loader {
    fn load(&self, path: &Path) -> Result<Box<dyn Document>, LoadError>;
}

#[derive(Debug, Deserialize)]
struct DrawingFile {
    format: String,
    version: u32,
    #[serde(default)]
    layers: Vec<Layer>,
}

/// Loads JSON drawing files from disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct DrawingLoader;

impl DrawingLoader {
    pub fn new() -> Self {
        Self
    }

    /// Parses a drawing, checking its format tag and version.
    pub fn load_drawing(&self, path: &Path) -> Result<Drawing, LoadError> {
        let file = File::open(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let parsed: DrawingFile =
            serde_json::from_reader(BufReader::new(file)).map_err(|source| {
                if source.is_io() {
                    LoadError::Io {
                        path: path.to_path_buf(),
                        source: source.into(),
                    }
                } else {
                    LoadError::Malformed {
                        path: path.to_path_buf(),
                        source,
                    }
                }
            })?;

        if parsed.format != FORMAT_TAG {
            return Err(LoadError::NotADrawing {
                path: path.to_path_buf(),
                found: parsed.format,
            });
        }
        if parsed.version == 0 || parsed.version > SUPPORTED_VERSION {
            return Err(LoadError::UnsupportedVersion {
                found: parsed.version,
                supported: SUPPORTED_VERSION,
            });
        }

        for layer in &parsed.layers {
            debug!(
                layer = %layer.name,
                visible = layer.visible,
                printable = layer.printable,
                kind = ?layer.kind,
                shapes = layer.shapes.len(),
                "Loaded layer"
            );
        }
        info!(
            path = %path.display(),
            layers = parsed.layers.len(),
            "Drawing loaded"
        );
        Ok(Drawing::new(parsed.layers))
    }
}

impl Loader for DrawingLoader {
    fn load(&self, path: &Path) -> Result<Box<dyn Document>, LoadError> {
        Ok(Box::new(self.load_drawing(path)?))
    }
}
