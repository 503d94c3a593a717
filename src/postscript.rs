//! Encapsulated PostScript output device.
//!
//! The header (DSC comments, prolog and font setup) is written when the
//! device is opened, the body is streamed as the document draws itself and
//! the trailer is written by [`Renderer::close`]. File output goes to a
//! temporary file beside the destination, which only replaces the
//! destination once the trailer has been flushed.

use crate::device::{DeviceFactory, OutputTarget, RenderParams, Renderer};
use crate::document::{Color, Style, Text};
use crate::error::DeviceError;
use crate::geometry::{Affine, BezPath, BoundingBox, PathEl, Point};
use crate::options::LayerSelection;
use kurbo::QuadBez;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::{Builder, TempPath};
use tracing::{debug, info, warn};

const CREATOR: &str = concat!("sk2ps ", env!("CARGO_PKG_VERSION"));

/// Decimal places kept for coordinates.
const PRECISION: usize = 3;

const PROLOG: &str = "\
/sk2ps_dict 16 dict def
sk2ps_dict begin
/m { moveto } bind def
/l { lineto } bind def
/c { curveto } bind def
/cp { closepath } bind def
/rgb { setrgbcolor } bind def
/lw { setlinewidth } bind def
end
";

/// Opens [`PostScriptDevice`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostScriptDeviceFactory;

impl PostScriptDeviceFactory {
    pub fn new() -> Self {
        Self
    }
}

impl DeviceFactory for PostScriptDeviceFactory {
    fn open(
        &self,
        output: OutputTarget,
        params: &RenderParams,
    ) -> Result<Box<dyn Renderer>, DeviceError> {
        Ok(Box::new(PostScriptDevice::open(output, params)?))
    }
}

/// Fonts split into those found on the font path and those left to the
/// consumer of the EPS file.
#[derive(Debug, Default)]
struct FontResources {
    embedded: Vec<(String, Vec<u8>)>,
    needed: Vec<String>,
}

impl FontResources {
    fn resolve(params: &RenderParams) -> Result<Self, DeviceError> {
        let mut resources = FontResources::default();
        for font in &params.fonts {
            let name = ps_name(font);
            if !params.embed_fonts {
                resources.needed.push(name);
                continue;
            }
            match find_font_file(&params.font_path, &name) {
                Some(path) => {
                    let program = fs::read(&path)
                        .map_err(|source| DeviceError::Font { path, source })?;
                    resources.embedded.push((name, program));
                }
                None => {
                    warn!(font = %name, "Font file not found, referencing it instead of embedding");
                    resources.needed.push(name);
                }
            }
        }
        Ok(resources)
    }
}

fn find_font_file(font_path: &[PathBuf], name: &str) -> Option<PathBuf> {
    font_path
        .iter()
        .map(|dir| dir.join(format!("{name}.pfa")))
        .find(|candidate| candidate.is_file())
}

/// A file output still under a temporary name.
///
/// Dropping it without [`PendingFile::commit`] deletes the temporary file
/// and leaves the destination untouched.
struct PendingFile {
    temp: TempPath,
    dest: PathBuf,
}

impl PendingFile {
    fn create(dest: PathBuf) -> io::Result<(File, Self)> {
        let dir = match dest.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let (file, temp) = Builder::new()
            .prefix(".sk2ps-")
            .suffix(".eps.tmp")
            .tempfile_in(dir)?
            .into_parts();
        Ok((file, Self { temp, dest }))
    }

    fn commit(self) -> io::Result<()> {
        // Temporary files are created owner-only.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.temp, fs::Permissions::from_mode(0o644))?;
        }
        self.temp.persist(&self.dest).map_err(|e| e.error)
    }
}

/// Renderer writing a single-page EPS document.
pub struct PostScriptDevice {
    out: Box<dyn Write>,
    pending: Option<PendingFile>,
    selection: LayerSelection,
    transforms: usize,
    layer_open: bool,
    closed: bool,
}

impl PostScriptDevice {
    /// Resolves fonts, opens `output` and writes everything up to the page
    /// body. On error nothing is left at the destination.
    pub fn open(output: OutputTarget, params: &RenderParams) -> Result<Self, DeviceError> {
        let fonts = FontResources::resolve(params)?;
        let target = output.to_string();

        let (out, pending): (Box<dyn Write>, Option<PendingFile>) = match output {
            OutputTarget::Path(dest) => {
                let (file, pending) =
                    PendingFile::create(dest).map_err(|source| DeviceError::Open {
                        target: target.clone(),
                        source,
                    })?;
                (Box::new(BufWriter::new(file)), Some(pending))
            }
            OutputTarget::Stdout => (Box::new(BufWriter::new(io::stdout())), None),
            OutputTarget::Writer(writer) => (writer, None),
        };

        info!(
            output = %target,
            bbox = ?params.bounding_box.to_eps_ints(),
            rotate = params.rotate,
            embedded_fonts = fonts.embedded.len(),
            "Opened PostScript device"
        );
        Self::start(out, pending, params, &fonts)
    }

    fn start(
        out: Box<dyn Write>,
        pending: Option<PendingFile>,
        params: &RenderParams,
        fonts: &FontResources,
    ) -> Result<Self, DeviceError> {
        let mut device = Self {
            out,
            pending,
            selection: params.selection,
            transforms: 0,
            layer_open: false,
            closed: false,
        };
        device.write_header(params, fonts)?;
        Ok(device)
    }

    fn write_header(&mut self, params: &RenderParams, fonts: &FontResources) -> io::Result<()> {
        let bbox = if params.rotate {
            params.bounding_box.rotated_ccw()
        } else {
            params.bounding_box
        };
        let [llx, lly, urx, ury] = bbox.to_eps_ints();
        let out = &mut self.out;

        writeln!(out, "%!PS-Adobe-3.0 EPSF-3.0")?;
        writeln!(out, "%%BoundingBox: {llx} {lly} {urx} {ury}")?;
        writeln!(out, "%%HiResBoundingBox: {}", fmt_box(&bbox))?;
        writeln!(out, "%%Creator: {CREATOR}")?;
        writeln!(out, "%%Title: {}", params.header.title)?;
        writeln!(out, "%%CreationDate: {}", params.header.creation_date)?;
        writeln!(out, "%%For: {}", params.header.for_user)?;
        writeln!(out, "%%Pages: 1")?;
        let supplied: Vec<&str> = fonts.embedded.iter().map(|(n, _)| n.as_str()).collect();
        write_resource_list(&mut *out, "DocumentSuppliedResources", &supplied)?;
        let needed: Vec<&str> = fonts.needed.iter().map(String::as_str).collect();
        write_resource_list(&mut *out, "DocumentNeededResources", &needed)?;
        writeln!(out, "%%EndComments")?;

        writeln!(out, "%%BeginProlog")?;
        out.write_all(PROLOG.as_bytes())?;
        writeln!(out, "%%EndProlog")?;

        writeln!(out, "%%BeginSetup")?;
        for (name, program) in &fonts.embedded {
            writeln!(out, "%%BeginResource: font {name}")?;
            out.write_all(program)?;
            if program.last() != Some(&b'\n') {
                writeln!(out)?;
            }
            writeln!(out, "%%EndResource")?;
        }
        for name in &fonts.needed {
            writeln!(out, "%%IncludeResource: font {name}")?;
        }
        writeln!(out, "%%EndSetup")?;

        writeln!(out, "%%Page: 1 1")?;
        writeln!(out, "%%BeginPageSetup")?;
        writeln!(out, "sk2ps_dict begin")?;
        writeln!(out, "gsave")?;
        if params.rotate {
            writeln!(out, "90 rotate")?;
        }
        writeln!(out, "%%EndPageSetup")?;
        // Surface a full disk or closed pipe while the device is opening.
        out.flush()
    }

    fn ensure_open(&self) -> Result<(), DeviceError> {
        if self.closed {
            Err(DeviceError::Closed)
        } else {
            Ok(())
        }
    }

    fn write_path(&mut self, path: &BezPath) -> io::Result<()> {
        let mut start = Point::ZERO;
        let mut current = Point::ZERO;
        for element in path.elements() {
            match *element {
                PathEl::MoveTo(p) => {
                    writeln!(self.out, "{} m", fmt_point(p))?;
                    start = p;
                    current = p;
                }
                PathEl::LineTo(p) => {
                    writeln!(self.out, "{} l", fmt_point(p))?;
                    current = p;
                }
                PathEl::QuadTo(p1, p2) => {
                    let cubic = QuadBez::new(current, p1, p2).raise();
                    self.write_curve(cubic.p1, cubic.p2, cubic.p3)?;
                    current = p2;
                }
                PathEl::CurveTo(p1, p2, p3) => {
                    self.write_curve(p1, p2, p3)?;
                    current = p3;
                }
                PathEl::ClosePath => {
                    writeln!(self.out, "cp")?;
                    current = start;
                }
            }
        }
        Ok(())
    }

    fn write_curve(&mut self, p1: Point, p2: Point, p3: Point) -> io::Result<()> {
        writeln!(
            self.out,
            "{} {} {} c",
            fmt_point(p1),
            fmt_point(p2),
            fmt_point(p3)
        )
    }
}

impl Renderer for PostScriptDevice {
    fn selection(&self) -> LayerSelection {
        self.selection
    }

    fn begin_layer(&mut self, name: &str) -> Result<(), DeviceError> {
        self.ensure_open()?;
        if self.layer_open {
            return Err(DeviceError::Unbalanced("begin_layer"));
        }
        writeln!(self.out, "% Layer: {}", name.replace(|c: char| c.is_control(), " "))?;
        writeln!(self.out, "gsave")?;
        self.layer_open = true;
        Ok(())
    }

    fn end_layer(&mut self) -> Result<(), DeviceError> {
        self.ensure_open()?;
        if !self.layer_open {
            return Err(DeviceError::Unbalanced("end_layer"));
        }
        writeln!(self.out, "grestore")?;
        self.layer_open = false;
        Ok(())
    }

    fn push_transform(&mut self, transform: &Affine) -> Result<(), DeviceError> {
        self.ensure_open()?;
        let matrix: Vec<String> = transform.as_coeffs().iter().map(|v| fmt_num(*v)).collect();
        writeln!(self.out, "gsave [{}] concat", matrix.join(" "))?;
        self.transforms += 1;
        Ok(())
    }

    fn pop_transform(&mut self) -> Result<(), DeviceError> {
        self.ensure_open()?;
        if self.transforms == 0 {
            return Err(DeviceError::Unbalanced("pop_transform"));
        }
        writeln!(self.out, "grestore")?;
        self.transforms -= 1;
        Ok(())
    }

    fn draw_path(&mut self, path: &BezPath, style: &Style) -> Result<(), DeviceError> {
        self.ensure_open()?;
        if path.elements().is_empty() || (style.fill.is_none() && style.stroke.is_none()) {
            return Ok(());
        }
        writeln!(self.out, "newpath")?;
        self.write_path(path)?;
        let fill_op = if style.even_odd { "eofill" } else { "fill" };
        match (style.fill, style.stroke) {
            (Some(fill), None) => writeln!(self.out, "{} rgb {fill_op}", fmt_color(fill))?,
            (None, Some(stroke)) => writeln!(
                self.out,
                "{} lw {} rgb stroke",
                fmt_num(stroke.width),
                fmt_color(stroke.color)
            )?,
            (Some(fill), Some(stroke)) => {
                writeln!(self.out, "gsave {} rgb {fill_op} grestore", fmt_color(fill))?;
                writeln!(
                    self.out,
                    "{} lw {} rgb stroke",
                    fmt_num(stroke.width),
                    fmt_color(stroke.color)
                )?;
            }
            (None, None) => {}
        }
        Ok(())
    }

    fn draw_text(&mut self, text: &Text) -> Result<(), DeviceError> {
        self.ensure_open()?;
        writeln!(
            self.out,
            "/{} findfont {} scalefont setfont",
            ps_name(&text.font),
            fmt_num(text.size)
        )?;
        writeln!(
            self.out,
            "{} rgb {} m {} show",
            fmt_color(text.color),
            fmt_point(text.position),
            ps_string(&text.text)
        )?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), DeviceError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        // A failed draw can leave groups or a layer open.
        for _ in 0..self.transforms {
            writeln!(self.out, "grestore")?;
        }
        if self.layer_open {
            writeln!(self.out, "grestore")?;
        }
        writeln!(self.out, "grestore")?;
        writeln!(self.out, "end")?;
        writeln!(self.out, "showpage")?;
        writeln!(self.out, "%%PageTrailer")?;
        writeln!(self.out, "%%Trailer")?;
        writeln!(self.out, "%%EOF")?;
        self.out.flush()?;
        if let Some(pending) = self.pending.take() {
            // Release the file handle before the rename.
            self.out = Box::new(io::sink());
            let dest = pending.dest.clone();
            pending.commit()?;
            debug!(output = %dest.display(), "Moved EPS file into place");
        }
        debug!("Closed PostScript device");
        Ok(())
    }
}

fn write_resource_list(out: &mut dyn Write, key: &str, fonts: &[&str]) -> io::Result<()> {
    for (i, font) in fonts.iter().enumerate() {
        if i == 0 {
            writeln!(out, "%%{key}: font {font}")?;
        } else {
            writeln!(out, "%%+ font {font}")?;
        }
    }
    Ok(())
}

/// Format a number to [`PRECISION`] places, stripping trailing zeros.
fn fmt_num(v: f64) -> String {
    let s = format!("{v:.PRECISION$}");
    let s = if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.').to_owned()
    } else {
        s
    };
    if s == "-0" {
        "0".to_owned()
    } else {
        s
    }
}

fn fmt_point(p: Point) -> String {
    format!("{} {}", fmt_num(p.x), fmt_num(p.y))
}

fn fmt_color(c: Color) -> String {
    format!(
        "{} {} {}",
        fmt_num(c.r.clamp(0.0, 1.0)),
        fmt_num(c.g.clamp(0.0, 1.0)),
        fmt_num(c.b.clamp(0.0, 1.0))
    )
}

fn fmt_box(bb: &BoundingBox) -> String {
    bb.to_array()
        .iter()
        .map(|v| fmt_num(*v))
        .collect::<Vec<_>>()
        .join(" ")
}

/// PostScript literal string; characters outside printable ASCII are
/// written as Latin-1 octal escapes, anything beyond Latin-1 as `?`.
fn ps_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('(');
    for ch in s.chars() {
        match ch {
            '(' | ')' | '\\' => {
                out.push('\\');
                out.push(ch);
            }
            ' '..='~' => out.push(ch),
            _ => {
                let code = u32::from(ch);
                if code <= 0xFF {
                    out.push_str(&format!("\\{code:03o}"));
                } else {
                    out.push('?');
                }
            }
        }
    }
    out.push(')');
    out
}

/// Font names become PostScript name literals; whitespace and delimiters
/// are not allowed in them.
fn ps_name(font: &str) -> String {
    font.chars()
        .map(|c| {
            if c.is_whitespace() || "()<>[]{}/%".contains(c) {
                '-'
            } else {
                c
            }
        })
        .collect()
}
