//! Drawing to EPS conversion.

use crate::device::{DeviceFactory, OutputTarget, RenderParams, Renderer};
use crate::document::Document;
use crate::error::{ConversionError, DeviceError, Result};
use crate::geometry::BoundingBox;
use crate::loader::{DrawingLoader, Loader};
use crate::options::ConversionOptions;
use crate::postscript::PostScriptDeviceFactory;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Outcome of a successful conversion.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionReport {
    pub input: PathBuf,
    pub output: String,
    pub bounding_box: BoundingBox,
    pub fonts: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ConversionReport {
    pub fn duration_ms(&self) -> i64 {
        self.finished_at
            .signed_duration_since(self.started_at)
            .num_milliseconds()
    }
}

/// An open renderer that is closed exactly once: explicitly through
/// [`ScopedDevice::close`], or on drop if drawing unwound.
struct ScopedDevice(Option<Box<dyn Renderer>>);

impl ScopedDevice {
    fn new(device: Box<dyn Renderer>) -> Self {
        Self(Some(device))
    }

    fn draw(&mut self, document: &dyn Document) -> std::result::Result<(), DeviceError> {
        match self.0.as_deref_mut() {
            Some(device) => document.draw(device),
            None => Err(DeviceError::Closed),
        }
    }

    fn close(mut self) -> std::result::Result<(), DeviceError> {
        match self.0.take() {
            Some(mut device) => device.close(),
            None => Ok(()),
        }
    }
}

impl Drop for ScopedDevice {
    fn drop(&mut self) {
        if let Some(mut device) = self.0.take() {
            if let Err(e) = device.close() {
                warn!(error = %e, "Failed to close output while unwinding");
            }
        }
    }
}

/// Converts drawings to EPS.
///
/// The loader and device factory are seams: the defaults read JSON drawing
/// files and write PostScript, tests substitute their own.
pub struct EpsConverter<L = DrawingLoader, F = PostScriptDeviceFactory> {
    loader: L,
    devices: F,
}

impl EpsConverter {
    /// Creates a converter with the JSON loader and PostScript device.
    pub fn new() -> Self {
        Self::with_parts(DrawingLoader::new(), PostScriptDeviceFactory::new())
    }
}

impl Default for EpsConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: Loader, F: DeviceFactory> EpsConverter<L, F> {
    pub fn with_parts(loader: L, devices: F) -> Self {
        Self { loader, devices }
    }

    /// Converts the drawing at `input` and writes EPS to `output`.
    ///
    /// The bounding box is computed with the same layer selection that the
    /// document applies while drawing, so `%%BoundingBox` always matches the
    /// drawn content. Once the device is open it is closed exactly once,
    /// whatever happens while drawing.
    ///
    /// # Errors
    ///
    /// - `LoadFailed` if the drawing cannot be read; no device is opened
    /// - `DeviceOpenFailed` if the output cannot be created
    /// - `RenderFailed` if drawing fails (the output may be incomplete)
    /// - `CloseFailed` if the output cannot be finished or flushed
    pub fn convert(
        &self,
        input: &Path,
        output: OutputTarget,
        options: &ConversionOptions,
    ) -> Result<ConversionReport> {
        let started_at = Utc::now();
        info!("Converting drawing to EPS: input={}", input.display());

        let document = self
            .loader
            .load(input)
            .map_err(ConversionError::LoadFailed)?;

        let selection = options.selection;
        if selection.is_none() {
            warn!("Neither visible nor printable layers are selected");
        }
        let bounding_box = document.bounding_rect(selection);
        if bounding_box.is_empty() {
            warn!(
                visible = selection.visible,
                printable = selection.printable,
                "No eligible geometry, writing an empty bounding box"
            );
        }

        let params = RenderParams {
            bounding_box,
            selection,
            header: options.header_for(input),
            rotate: options.rotate,
            embed_fonts: options.embed_fonts,
            fonts: document.used_fonts(selection),
            font_path: options.font_path.clone(),
        };
        let target = output.to_string();

        let device = self
            .devices
            .open(output, &params)
            .map_err(ConversionError::DeviceOpenFailed)?;
        let mut device = ScopedDevice::new(device);

        let drawn = device.draw(document.as_ref());
        let closed = device.close();
        match (drawn, closed) {
            (Err(e), closed) => {
                if let Err(close_err) = closed {
                    warn!(error = %close_err, "Closing output after a failed draw also failed");
                }
                return Err(ConversionError::RenderFailed(e));
            }
            (Ok(()), Err(e)) => return Err(ConversionError::CloseFailed(e)),
            (Ok(()), Ok(())) => {}
        }

        let report = ConversionReport {
            input: input.to_path_buf(),
            output: target,
            bounding_box,
            fonts: params.fonts.len(),
            started_at,
            finished_at: Utc::now(),
        };
        info!(
            "EPS export complete: output={}, bbox={:?}",
            report.output,
            bounding_box.to_eps_ints()
        );
        Ok(report)
    }
}

/// Converts `input` with the default loader and PostScript device.
pub fn convert(
    input: &Path,
    output: OutputTarget,
    options: &ConversionOptions,
) -> Result<ConversionReport> {
    EpsConverter::new().convert(input, output, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{MockDeviceFactory, MockRenderer};
    use crate::document::{Color, Drawing, Layer, Shape, Style};
    use crate::error::LoadError;
    use crate::loader::MockLoader;
    use crate::options::LayerSelection;
    use pretty_assertions::assert_eq;
    use std::io;

    fn square(x: f64, y: f64, size: f64) -> Shape {
        Shape::Rectangle {
            x,
            y,
            width: size,
            height: size,
            style: Style::filled(Color::BLACK),
        }
    }

    fn two_layer_drawing() -> Drawing {
        Drawing::new(vec![
            Layer::new("A", true, false).with_shape(square(0.0, 0.0, 10.0)),
            Layer::new("B", false, true).with_shape(square(5.0, 5.0, 15.0)),
        ])
    }

    fn loader_for(drawing: Drawing) -> MockLoader {
        let mut loader = MockLoader::new();
        loader
            .expect_load()
            .times(1)
            .return_once(move |_| Ok(Box::new(drawing) as Box<dyn Document>));
        loader
    }

    /// A renderer that accepts everything and must be closed once.
    fn accepting_renderer(selection: LayerSelection) -> MockRenderer {
        let mut renderer = MockRenderer::new();
        renderer.expect_selection().return_const(selection);
        renderer.expect_begin_layer().returning(|_| Ok(()));
        renderer.expect_end_layer().returning(|| Ok(()));
        renderer.expect_draw_path().returning(|_, _| Ok(()));
        renderer.expect_close().times(1).returning(|| Ok(()));
        renderer
    }

    fn options() -> ConversionOptions {
        ConversionOptions {
            creation_date: "Mon Oct 19 12:00:00 2026".to_string(),
            for_user: "alice".to_string(),
            ..ConversionOptions::default()
        }
    }

    #[test]
    fn test_default_options_use_printable_box() {
        let mut devices = MockDeviceFactory::new();
        devices
            .expect_open()
            .withf(|_, params| {
                params.bounding_box.to_array() == [5.0, 5.0, 20.0, 20.0]
                    && params.selection == LayerSelection::default()
                    && params.header.title == "two.sk"
                    && params.header.for_user == "alice"
            })
            .times(1)
            .return_once(|_, _| {
                let renderer = accepting_renderer(LayerSelection::default());
                Ok(Box::new(renderer) as Box<dyn Renderer>)
            });

        let converter = EpsConverter::with_parts(loader_for(two_layer_drawing()), devices);
        let report = converter
            .convert(Path::new("/tmp/two.sk"), OutputTarget::Stdout, &options())
            .unwrap();
        assert_eq!(report.bounding_box.to_array(), [5.0, 5.0, 20.0, 20.0]);
    }

    #[test]
    fn test_visible_selection_widens_box() {
        let selection = LayerSelection::new(true, true);
        let mut devices = MockDeviceFactory::new();
        devices
            .expect_open()
            .withf(|_, params| params.bounding_box.to_array() == [0.0, 0.0, 20.0, 20.0])
            .times(1)
            .return_once(move |_, _| {
                Ok(Box::new(accepting_renderer(selection)) as Box<dyn Renderer>)
            });

        let converter = EpsConverter::with_parts(loader_for(two_layer_drawing()), devices);
        let report = converter
            .convert(
                Path::new("two.sk"),
                OutputTarget::Stdout,
                &options().with_selection(selection),
            )
            .unwrap();
        assert_eq!(report.bounding_box.to_array(), [0.0, 0.0, 20.0, 20.0]);
    }

    #[test]
    fn test_empty_selection_still_converts() {
        let selection = LayerSelection::new(false, false);
        let mut devices = MockDeviceFactory::new();
        devices
            .expect_open()
            .withf(|_, params| params.bounding_box.is_empty())
            .times(1)
            .return_once(move |_, _| {
                let mut renderer = MockRenderer::new();
                renderer.expect_selection().return_const(selection);
                renderer.expect_begin_layer().never();
                renderer.expect_close().times(1).returning(|| Ok(()));
                Ok(Box::new(renderer) as Box<dyn Renderer>)
            });

        let converter = EpsConverter::with_parts(loader_for(two_layer_drawing()), devices);
        let report = converter
            .convert(
                Path::new("two.sk"),
                OutputTarget::Stdout,
                &options().with_selection(selection),
            )
            .unwrap();
        assert!(report.bounding_box.is_empty());
    }

    #[test]
    fn test_close_runs_once_when_draw_fails() {
        let mut devices = MockDeviceFactory::new();
        devices.expect_open().times(1).return_once(|_, _| {
            let mut renderer = MockRenderer::new();
            renderer
                .expect_selection()
                .return_const(LayerSelection::default());
            renderer.expect_begin_layer().returning(|_| Ok(()));
            renderer
                .expect_draw_path()
                .returning(|_, _| Err(DeviceError::Io(io::Error::other("disk full"))));
            renderer.expect_end_layer().never();
            renderer.expect_close().times(1).returning(|| Ok(()));
            Ok(Box::new(renderer) as Box<dyn Renderer>)
        });

        let converter = EpsConverter::with_parts(loader_for(two_layer_drawing()), devices);
        let err = converter
            .convert(Path::new("two.sk"), OutputTarget::Stdout, &options())
            .unwrap_err();
        assert!(matches!(err, ConversionError::RenderFailed(DeviceError::Io(_))));
    }

    #[test]
    fn test_render_error_wins_over_close_error() {
        let mut devices = MockDeviceFactory::new();
        devices.expect_open().times(1).return_once(|_, _| {
            let mut renderer = MockRenderer::new();
            renderer
                .expect_selection()
                .return_const(LayerSelection::default());
            renderer
                .expect_begin_layer()
                .returning(|_| Err(DeviceError::Unbalanced("begin_layer")));
            renderer
                .expect_close()
                .times(1)
                .returning(|| Err(DeviceError::Io(io::Error::other("flush failed"))));
            Ok(Box::new(renderer) as Box<dyn Renderer>)
        });

        let converter = EpsConverter::with_parts(loader_for(two_layer_drawing()), devices);
        let err = converter
            .convert(Path::new("two.sk"), OutputTarget::Stdout, &options())
            .unwrap_err();
        assert!(matches!(err, ConversionError::RenderFailed(_)));
    }

    #[test]
    fn test_close_failure_is_reported() {
        let mut devices = MockDeviceFactory::new();
        devices.expect_open().times(1).return_once(|_, _| {
            let mut renderer = MockRenderer::new();
            renderer
                .expect_selection()
                .return_const(LayerSelection::default());
            renderer.expect_begin_layer().returning(|_| Ok(()));
            renderer.expect_end_layer().returning(|| Ok(()));
            renderer.expect_draw_path().returning(|_, _| Ok(()));
            renderer
                .expect_close()
                .times(1)
                .returning(|| Err(DeviceError::Io(io::Error::other("flush failed"))));
            Ok(Box::new(renderer) as Box<dyn Renderer>)
        });

        let converter = EpsConverter::with_parts(loader_for(two_layer_drawing()), devices);
        let err = converter
            .convert(Path::new("two.sk"), OutputTarget::Stdout, &options())
            .unwrap_err();
        assert!(matches!(err, ConversionError::CloseFailed(_)));
    }

    #[test]
    fn test_load_failure_skips_device() {
        let mut loader = MockLoader::new();
        loader.expect_load().times(1).returning(|path| {
            Err(LoadError::NotADrawing {
                path: path.to_path_buf(),
                found: "corrupt".to_string(),
            })
        });
        let mut devices = MockDeviceFactory::new();
        devices.expect_open().never();

        let converter = EpsConverter::with_parts(loader, devices);
        let err = converter
            .convert(Path::new("bad.sk"), OutputTarget::Stdout, &options())
            .unwrap_err();
        assert!(matches!(err, ConversionError::LoadFailed(_)));
    }

    #[test]
    fn test_device_open_failure() {
        let mut devices = MockDeviceFactory::new();
        devices.expect_open().times(1).returning(|target, _| {
            Err(DeviceError::Open {
                target: target.to_string(),
                source: io::Error::from(io::ErrorKind::PermissionDenied),
            })
        });

        let converter = EpsConverter::with_parts(loader_for(two_layer_drawing()), devices);
        let err = converter
            .convert(
                Path::new("two.sk"),
                OutputTarget::Path(PathBuf::from("/readonly/out.eps")),
                &options(),
            )
            .unwrap_err();
        assert!(matches!(err, ConversionError::DeviceOpenFailed(_)));
    }

    #[test]
    fn test_scoped_device_closes_on_drop() {
        let mut renderer = MockRenderer::new();
        renderer.expect_close().times(1).returning(|| Ok(()));
        let device = ScopedDevice::new(Box::new(renderer));
        drop(device);
    }
}
