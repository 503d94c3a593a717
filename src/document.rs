//! Layered drawing model and the `Document` seam used by the converter.
//!
//! A drawing is a stack of layers; each layer carries its own `visible` and
//! `printable` flags and a list of shapes. Guide and grid layers are
//! editing aids: they never print, never contribute geometry and are never
//! drawn, whatever the selection.

use crate::device::Renderer;
use crate::error::DeviceError;
use crate::geometry::{
    self, ellipse_bounds, ellipse_outline, path_bounds, rect_outline, scale_factor, Affine,
    BezPath, BoundingBox, Ellipse, Point, Rect,
};
use crate::options::LayerSelection;
use serde::Deserialize;
use std::collections::BTreeSet;
use tracing::debug;

/// What the conversion pipeline needs from a loaded drawing.
pub trait Document {
    /// Union of the extents of every layer eligible under `selection`.
    fn bounding_rect(&self, selection: LayerSelection) -> BoundingBox;

    /// Fonts referenced by text in eligible layers.
    fn used_fonts(&self, selection: LayerSelection) -> BTreeSet<String>;

    /// Draws eligible layers, using the selection reported by the renderer.
    fn draw(&self, renderer: &mut dyn Renderer) -> Result<(), DeviceError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerKind {
    #[default]
    Normal,
    Guides,
    Grid,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(from = "[f64; 3]")]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl Color {
    pub const BLACK: Color = Color {
        r: 0.0,
        g: 0.0,
        b: 0.0,
    };

    pub const fn rgb(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b }
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::BLACK
    }
}

impl From<[f64; 3]> for Color {
    fn from([r, g, b]: [f64; 3]) -> Self {
        Self { r, g, b }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Stroke {
    #[serde(default)]
    pub color: Color,
    #[serde(default = "default_line_width")]
    pub width: f64,
}

fn default_line_width() -> f64 {
    1.0
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
pub struct Style {
    #[serde(default)]
    pub fill: Option<Color>,
    #[serde(default)]
    pub stroke: Option<Stroke>,
    #[serde(default)]
    pub even_odd: bool,
}

impl Style {
    pub fn filled(color: Color) -> Self {
        Self {
            fill: Some(color),
            ..Self::default()
        }
    }

    fn half_stroke(&self) -> f64 {
        self.stroke.map_or(0.0, |s| s.width / 2.0)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Text {
    pub text: String,
    #[serde(default = "default_font")]
    pub font: String,
    #[serde(default = "default_font_size")]
    pub size: f64,
    #[serde(deserialize_with = "geometry::point_from_array")]
    pub position: Point,
    #[serde(default)]
    pub color: Color,
}

fn default_font() -> String {
    "Times-Roman".to_string()
}

fn default_font_size() -> f64 {
    12.0
}

impl Text {
    /// Approximate extent without font metrics: 0.6em advance per
    /// character, 0.8em ascent and 0.2em descent.
    pub fn extent(&self) -> BoundingBox {
        let advance = 0.6 * self.size * self.text.chars().count() as f64;
        let Point { x, y } = self.position;
        BoundingBox::new(x, y - 0.2 * self.size, x + advance, y + 0.8 * self.size)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Shape {
    Rectangle {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        #[serde(default)]
        style: Style,
    },
    Ellipse {
        cx: f64,
        cy: f64,
        rx: f64,
        ry: f64,
        #[serde(default)]
        style: Style,
    },
    /// Outline in SVG path syntax under the `d` key.
    Path {
        #[serde(rename = "d", deserialize_with = "geometry::path_from_svg")]
        path: BezPath,
        #[serde(default)]
        style: Style,
    },
    Text(Text),
    Group {
        children: Vec<Shape>,
        /// `[a, b, c, d, e, f]`, applied to the children.
        #[serde(default)]
        transform: Option<Affine>,
    },
}

impl Shape {
    /// Outline and style of path-like shapes; `None` for text and groups.
    pub fn outline(&self) -> Option<(BezPath, Style)> {
        match self {
            Shape::Rectangle {
                x,
                y,
                width,
                height,
                style,
            } => Some((rect_outline(rectangle(*x, *y, *width, *height)), *style)),
            Shape::Ellipse {
                cx,
                cy,
                rx,
                ry,
                style,
            } => Some((ellipse_outline(ellipse(*cx, *cy, *rx, *ry)), *style)),
            Shape::Path { path, style } => Some((path.clone(), *style)),
            Shape::Text(_) | Shape::Group { .. } => None,
        }
    }

    /// Extent of the shape in document space under `ctm`.
    pub fn bounds(&self, ctm: Affine) -> BoundingBox {
        let stroked = |bb: BoundingBox, style: &Style| {
            bb.grow(style.half_stroke() * scale_factor(ctm))
        };
        match self {
            Shape::Rectangle {
                x,
                y,
                width,
                height,
                style,
            } => stroked(
                BoundingBox::from_rect(rectangle(*x, *y, *width, *height)).transformed(ctm),
                style,
            ),
            Shape::Ellipse {
                cx,
                cy,
                rx,
                ry,
                style,
            } => stroked(ellipse_bounds(ellipse(*cx, *cy, *rx, *ry), ctm), style),
            Shape::Path { path, style } => stroked(path_bounds(&(ctm * path.clone())), style),
            Shape::Text(text) => text.extent().transformed(ctm),
            Shape::Group {
                children,
                transform,
            } => {
                let ctm = transform.map_or(ctm, |t| ctm * t);
                children
                    .iter()
                    .fold(BoundingBox::EMPTY, |bb, child| bb.union(child.bounds(ctm)))
            }
        }
    }

    fn collect_fonts(&self, fonts: &mut BTreeSet<String>) {
        match self {
            Shape::Text(text) => {
                fonts.insert(text.font.clone());
            }
            Shape::Group { children, .. } => {
                for child in children {
                    child.collect_fonts(fonts);
                }
            }
            _ => {}
        }
    }

    fn draw(&self, renderer: &mut dyn Renderer) -> Result<(), DeviceError> {
        match self {
            Shape::Text(text) => renderer.draw_text(text),
            Shape::Group {
                children,
                transform,
            } => {
                if let Some(t) = transform {
                    renderer.push_transform(t)?;
                }
                for child in children {
                    child.draw(renderer)?;
                }
                if transform.is_some() {
                    renderer.pop_transform()?;
                }
                Ok(())
            }
            _ => match self.outline() {
                Some((path, style)) => renderer.draw_path(&path, &style),
                None => Ok(()),
            },
        }
    }
}

fn rectangle(x: f64, y: f64, width: f64, height: f64) -> Rect {
    Rect::new(x, y, x + width, y + height)
}

fn ellipse(cx: f64, cy: f64, rx: f64, ry: f64) -> Ellipse {
    Ellipse::new((cx, cy), (rx, ry), 0.0)
}

fn yes() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Layer {
    pub name: String,
    #[serde(default = "yes")]
    pub visible: bool,
    #[serde(default = "yes")]
    pub printable: bool,
    #[serde(default)]
    pub kind: LayerKind,
    #[serde(default)]
    pub shapes: Vec<Shape>,
}

impl Layer {
    pub fn new(name: impl Into<String>, visible: bool, printable: bool) -> Self {
        Self {
            name: name.into(),
            visible,
            printable,
            kind: LayerKind::Normal,
            shapes: Vec::new(),
        }
    }

    pub fn with_shape(mut self, shape: Shape) -> Self {
        self.shapes.push(shape);
        self
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Guide and grid layers never print.
    pub fn is_printable(&self) -> bool {
        self.printable && self.kind == LayerKind::Normal
    }

    fn has_output(&self) -> bool {
        self.kind == LayerKind::Normal
    }

    pub fn bounding_rect(&self) -> BoundingBox {
        if !self.has_output() {
            return BoundingBox::EMPTY;
        }
        self.shapes.iter().fold(BoundingBox::EMPTY, |bb, shape| {
            bb.union(shape.bounds(Affine::IDENTITY))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct Drawing {
    #[serde(default)]
    pub layers: Vec<Layer>,
}

impl Drawing {
    pub fn new(layers: Vec<Layer>) -> Self {
        Self { layers }
    }

    /// Layers satisfying `selection`, bottom to top.
    pub fn eligible_layers(&self, selection: LayerSelection) -> impl Iterator<Item = &Layer> {
        self.layers
            .iter()
            .filter(move |layer| selection.includes(layer.is_visible(), layer.is_printable()))
    }
}

impl Document for Drawing {
    fn bounding_rect(&self, selection: LayerSelection) -> BoundingBox {
        self.eligible_layers(selection)
            .fold(BoundingBox::EMPTY, |bb, layer| bb.union(layer.bounding_rect()))
    }

    fn used_fonts(&self, selection: LayerSelection) -> BTreeSet<String> {
        let mut fonts = BTreeSet::new();
        for layer in self.eligible_layers(selection).filter(|l| l.has_output()) {
            for shape in &layer.shapes {
                shape.collect_fonts(&mut fonts);
            }
        }
        fonts
    }

    fn draw(&self, renderer: &mut dyn Renderer) -> Result<(), DeviceError> {
        let selection = renderer.selection();
        for layer in self.eligible_layers(selection).filter(|l| l.has_output()) {
            debug!(layer = %layer.name, shapes = layer.shapes.len(), "Drawing layer");
            renderer.begin_layer(&layer.name)?;
            for shape in &layer.shapes {
                shape.draw(renderer)?;
            }
            renderer.end_layer()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::MockRenderer;
    use mockall::predicate::eq;
    use pretty_assertions::assert_eq;

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

    #[test]
    fn test_default_selection_uses_printable_layers() {
        let bb = two_layer_drawing().bounding_rect(LayerSelection::default());
        assert_eq!(bb.to_array(), [5.0, 5.0, 20.0, 20.0]);
    }

    #[test]
    fn test_visible_and_printable_is_union() {
        let bb = two_layer_drawing().bounding_rect(LayerSelection::new(true, true));
        assert_eq!(bb.to_array(), [0.0, 0.0, 20.0, 20.0]);
    }

    #[test]
    fn test_visible_only() {
        let bb = two_layer_drawing().bounding_rect(LayerSelection::new(true, false));
        assert_eq!(bb.to_array(), [0.0, 0.0, 10.0, 10.0]);
    }

    #[test]
    fn test_no_selection_gives_empty_box() {
        let bb = two_layer_drawing().bounding_rect(LayerSelection::new(false, false));
        assert!(bb.is_empty());
        assert!(Drawing::default()
            .bounding_rect(LayerSelection::default())
            .is_empty());
    }

    #[test]
    fn test_ineligible_geometry_does_not_matter() {
        let mut drawing = two_layer_drawing();
        let before = drawing.bounding_rect(LayerSelection::default());
        drawing.layers[0].shapes.push(square(-500.0, -500.0, 2000.0));
        assert_eq!(drawing.bounding_rect(LayerSelection::default()), before);
    }

    #[test]
    fn test_guide_layers_never_contribute() {
        let mut guides = Layer::new("Guides", true, true).with_shape(square(-100.0, -100.0, 10.0));
        guides.kind = LayerKind::Guides;
        assert!(!guides.is_printable());

        let mut drawing = two_layer_drawing();
        drawing.layers.push(guides);
        let bb = drawing.bounding_rect(LayerSelection::new(true, true));
        assert_eq!(bb.to_array(), [0.0, 0.0, 20.0, 20.0]);
    }

    #[test]
    fn test_stroke_grows_bounds() {
        let shape = Shape::Rectangle {
            x: 0.0,
            y: 0.0,
            width: 10.0,
            height: 10.0,
            style: Style {
                stroke: Some(Stroke {
                    color: Color::BLACK,
                    width: 2.0,
                }),
                ..Style::default()
            },
        };
        let bb = shape.bounds(Affine::scale(2.0));
        assert_eq!(bb.to_array(), [-2.0, -2.0, 22.0, 22.0]);
    }

    #[test]
    fn test_group_transform_applies_to_children() {
        let group = Shape::Group {
            children: vec![square(0.0, 0.0, 10.0)],
            transform: Some(Affine::translate((100.0, 50.0))),
        };
        let layer = Layer::new("L", true, true).with_shape(group);
        assert_eq!(layer.bounding_rect().to_array(), [100.0, 50.0, 110.0, 60.0]);
    }

    #[test]
    fn test_used_fonts_follow_selection() {
        let text = |font: &str| {
            Shape::Text(Text {
                text: "hi".to_string(),
                font: font.to_string(),
                size: 10.0,
                position: Point::new(0.0, 0.0),
                color: Color::BLACK,
            })
        };
        let drawing = Drawing::new(vec![
            Layer::new("A", true, false).with_shape(text("Helvetica")),
            Layer::new("B", false, true).with_shape(text("Courier")),
        ]);
        let fonts = drawing.used_fonts(LayerSelection::default());
        assert_eq!(fonts.into_iter().collect::<Vec<_>>(), vec!["Courier"]);
    }

    #[test]
    fn test_draw_uses_renderer_selection() {
        let drawing = two_layer_drawing();
        let mut renderer = MockRenderer::new();
        renderer
            .expect_selection()
            .return_const(LayerSelection::default());
        renderer
            .expect_begin_layer()
            .with(eq("B"))
            .times(1)
            .returning(|_| Ok(()));
        renderer.expect_draw_path().times(1).returning(|_, _| Ok(()));
        renderer.expect_end_layer().times(1).returning(|| Ok(()));

        drawing.draw(&mut renderer).unwrap();
    }
}
