//! Conversion options and EPS header metadata.

use chrono::Local;
use std::path::{Path, PathBuf};

/// Which layers take part in a conversion.
///
/// A layer is eligible when `(visible && layer.visible) ||
/// (printable && layer.printable)`. The same predicate drives both the
/// bounding box and what gets drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayerSelection {
    pub visible: bool,
    pub printable: bool,
}

impl LayerSelection {
    pub const fn new(visible: bool, printable: bool) -> Self {
        Self { visible, printable }
    }

    pub const fn includes(&self, layer_visible: bool, layer_printable: bool) -> bool {
        (self.visible && layer_visible) || (self.printable && layer_printable)
    }

    /// True when no layer can ever qualify.
    pub const fn is_none(&self) -> bool {
        !self.visible && !self.printable
    }
}

impl Default for LayerSelection {
    /// Printable layers, regardless of their visibility.
    fn default() -> Self {
        Self::new(false, true)
    }
}

/// Values for the `%%Title`, `%%CreationDate` and `%%For` comments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpsHeader {
    pub title: String,
    pub creation_date: String,
    pub for_user: String,
}

impl EpsHeader {
    pub fn new(title: &str, creation_date: &str, for_user: &str) -> Self {
        Self {
            title: sanitize(title),
            creation_date: sanitize(creation_date),
            for_user: sanitize(for_user),
        }
    }
}

/// Options for one conversion. Built once, never mutated by the converter.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionOptions {
    pub selection: LayerSelection,
    /// Rotate the drawing 90 degrees counter-clockwise.
    pub rotate: bool,
    pub embed_fonts: bool,
    /// `None` means the input file's base name.
    pub title: Option<String>,
    pub creation_date: String,
    pub for_user: String,
    /// Directories searched for `.pfa` files when embedding fonts.
    pub font_path: Vec<PathBuf>,
}

impl ConversionOptions {
    pub fn with_selection(mut self, selection: LayerSelection) -> Self {
        self.selection = selection;
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_rotate(mut self, rotate: bool) -> Self {
        self.rotate = rotate;
        self
    }

    pub fn with_embed_fonts(mut self, embed_fonts: bool) -> Self {
        self.embed_fonts = embed_fonts;
        self
    }

    pub fn with_font_path(mut self, font_path: Vec<PathBuf>) -> Self {
        self.font_path = font_path;
        self
    }

    /// Resolves the header for `input`, falling back to its base name for
    /// the title.
    pub fn header_for(&self, input: &Path) -> EpsHeader {
        let title = match &self.title {
            Some(title) => title.clone(),
            None => default_title(input),
        };
        EpsHeader::new(&title, &self.creation_date, &self.for_user)
    }
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            selection: LayerSelection::default(),
            rotate: false,
            embed_fonts: false,
            title: None,
            creation_date: current_date(),
            for_user: real_username(),
            font_path: Vec::new(),
        }
    }
}

/// Base name of the input file, or the whole path if it has none.
pub fn default_title(input: &Path) -> String {
    input
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| input.to_string_lossy().into_owned())
}

/// Current local time in `ctime` layout, e.g. `Mon Oct 19 14:03:11 2026`.
pub fn current_date() -> String {
    Local::now().format("%a %b %e %H:%M:%S %Y").to_string()
}

/// Name of the user running the conversion.
pub fn real_username() -> String {
    ["USER", "LOGNAME", "USERNAME"]
        .iter()
        .find_map(|key| std::env::var(key).ok().filter(|v| !v.is_empty()))
        .unwrap_or_else(|| "unknown".to_string())
}

/// DSC comments are line oriented; control characters would end them early.
fn sanitize(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect()
}
