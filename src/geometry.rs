//! Bounding boxes and outline helpers on top of `kurbo`.
//!
//! Coordinates are PostScript points with Y pointing up, so shapes can be
//! emitted to the device without any flipping.

pub use kurbo::{Affine, BezPath, Ellipse, PathEl, Point, Rect};
use kurbo::{ParamCurveExtrema, Shape as _};
use serde::{Deserialize, Deserializer, Serialize};

/// Maximum distance, in points, between an ellipse and the Bézier curves
/// that draw it.
pub const CURVE_TOLERANCE: f64 = 0.01;

/// Axis-aligned extent in document space.
///
/// [`BoundingBox::EMPTY`] is the identity for [`BoundingBox::union`]; it is
/// what a selection with no eligible geometry produces.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct BoundingBox(Option<Rect>);

impl BoundingBox {
    pub const EMPTY: BoundingBox = BoundingBox(None);

    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self::from_rect(Rect::new(x0, y0, x1, y1))
    }

    pub fn from_rect(rect: Rect) -> Self {
        Self(Some(rect.abs()))
    }

    pub fn rect(&self) -> Option<Rect> {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    pub fn union(self, other: BoundingBox) -> Self {
        match (self.0, other.0) {
            (Some(a), Some(b)) => Self(Some(a.union(b))),
            (a, b) => Self(a.or(b)),
        }
    }

    pub fn grow(self, margin: f64) -> Self {
        if margin <= 0.0 {
            return self;
        }
        Self(self.0.map(|r| r.inflate(margin, margin)))
    }

    /// Bounding box of this rectangle after `t`.
    pub fn transformed(&self, t: Affine) -> Self {
        Self(self.0.map(|r| t.transform_rect_bbox(r)))
    }

    /// The box after a 90° counter-clockwise rotation about the origin.
    pub fn rotated_ccw(&self) -> Self {
        Self(self.0.map(|r| Rect::new(-r.y1, r.x0, -r.y0, r.x1)))
    }

    /// Integer box for the `%%BoundingBox` comment; `0 0 0 0` when empty.
    pub fn to_eps_ints(&self) -> [i64; 4] {
        match self.0 {
            Some(r) => [
                r.x0.floor() as i64,
                r.y0.floor() as i64,
                r.x1.ceil() as i64,
                r.y1.ceil() as i64,
            ],
            None => [0; 4],
        }
    }

    pub fn to_array(&self) -> [f64; 4] {
        self.0.map_or([0.0; 4], |r| [r.x0, r.y0, r.x1, r.y1])
    }
}

/// Exact bounds of an outline, curve extrema included. A path without
/// segments (a lone move) has no extent.
pub fn path_bounds(path: &BezPath) -> BoundingBox {
    path.segments().fold(BoundingBox::EMPTY, |bb, segment| {
        bb.union(BoundingBox::from_rect(ParamCurveExtrema::bounding_box(&segment)))
    })
}

/// Exact bounds of an ellipse placed by `ctm`.
pub fn ellipse_bounds(ellipse: Ellipse, ctm: Affine) -> BoundingBox {
    BoundingBox::from_rect((ctm * ellipse).bounding_box())
}

pub fn rect_outline(rect: Rect) -> BezPath {
    rect.to_path(CURVE_TOLERANCE)
}

pub fn ellipse_outline(ellipse: Ellipse) -> BezPath {
    ellipse.to_path(CURVE_TOLERANCE)
}

/// Average linear scale of `t`, used to scale stroke widths.
pub fn scale_factor(t: Affine) -> f64 {
    t.determinant().abs().sqrt()
}

/// Reads a point written as `[x, y]`.
pub(crate) fn point_from_array<'de, D>(deserializer: D) -> Result<Point, D::Error>
where
    D: Deserializer<'de>,
{
    let [x, y] = <[f64; 2]>::deserialize(deserializer)?;
    Ok(Point::new(x, y))
}

/// Reads an outline written as SVG path data, e.g. `"M0 0 L10 0 Z"`.
pub(crate) fn path_from_svg<'de, D>(deserializer: D) -> Result<BezPath, D::Error>
where
    D: Deserializer<'de>,
{
    let data = String::deserialize(deserializer)?;
    BezPath::from_svg(&data).map_err(serde::de::Error::custom)
}
