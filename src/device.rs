//! Output device abstraction.
//!
//! The converter only knows a device through [`DeviceFactory`] and
//! [`Renderer`]; [`crate::postscript`] provides the EPS implementation.

use crate::document::{Style, Text};
use crate::error::DeviceError;
use crate::geometry::{Affine, BezPath, BoundingBox};
use crate::options::{EpsHeader, LayerSelection};
use std::collections::BTreeSet;
use std::fmt;
use std::io::Write;
use std::path::PathBuf;

/// Where the rendered output goes.
pub enum OutputTarget {
    Path(PathBuf),
    Stdout,
    /// A caller-supplied stream; the device flushes it on close.
    Writer(Box<dyn Write>),
}

impl fmt::Debug for OutputTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputTarget::Path(path) => f.debug_tuple("Path").field(path).finish(),
            OutputTarget::Stdout => f.write_str("Stdout"),
            OutputTarget::Writer(_) => f.write_str("Writer(..)"),
        }
    }
}

impl fmt::Display for OutputTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputTarget::Path(path) => write!(f, "{}", path.display()),
            OutputTarget::Stdout => f.write_str("<stdout>"),
            OutputTarget::Writer(_) => f.write_str("<stream>"),
        }
    }
}

impl From<Option<PathBuf>> for OutputTarget {
    fn from(path: Option<PathBuf>) -> Self {
        path.map_or(OutputTarget::Stdout, OutputTarget::Path)
    }
}

/// Everything a device needs to write the document header and body.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderParams {
    pub bounding_box: BoundingBox,
    pub selection: LayerSelection,
    pub header: EpsHeader,
    pub rotate: bool,
    pub embed_fonts: bool,
    pub fonts: BTreeSet<String>,
    pub font_path: Vec<PathBuf>,
}

/// Drawing operations a document issues while it draws itself.
#[cfg_attr(test, mockall::automock)]
pub trait Renderer {
    /// Selection the document must apply when choosing layers to draw.
    fn selection(&self) -> LayerSelection;

    fn begin_layer(&mut self, name: &str) -> Result<(), DeviceError>;

    fn end_layer(&mut self) -> Result<(), DeviceError>;

    fn push_transform(&mut self, transform: &Affine) -> Result<(), DeviceError>;

    fn pop_transform(&mut self) -> Result<(), DeviceError>;

    fn draw_path(&mut self, path: &BezPath, style: &Style) -> Result<(), DeviceError>;

    fn draw_text(&mut self, text: &Text) -> Result<(), DeviceError>;

    /// Finishes and flushes the output.
    fn close(&mut self) -> Result<(), DeviceError>;
}

/// Opens a renderer bound to an output target.
#[cfg_attr(test, mockall::automock)]
pub trait DeviceFactory {
    fn open(
        &self,
        output: OutputTarget,
        params: &RenderParams,
    ) -> Result<Box<dyn Renderer>, DeviceError>;
}
