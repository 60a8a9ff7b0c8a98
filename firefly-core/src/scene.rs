//! Scene contracts supplied by the editor: shapes, fill patterns,
//! elements and the scene that orders them.
//!
//! Shapes and patterns are closed enums. Adding a variant forces every
//! `match` in the scan and fill code to handle it.

use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::color::Color;
use crate::error::FireflyError;
use crate::geometry::{Path, Point, Rect, Segment};

/// A scene shared between the editor (writer) and the scanner (reader).
pub type SharedScene = Arc<RwLock<Scene>>;

// ── OrthogonalRectangle ──────────────────────────────────────────

/// A rectangle whose edges run along the strip and time axes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrthogonalRectangle {
    /// Top-left corner (lowest position, earliest time).
    pub origin: Point,
    pub width: f64,
    pub duration: f64,
}

impl OrthogonalRectangle {
    pub fn new(origin: Point, width: f64, duration: f64) -> Self {
        Self {
            origin,
            width,
            duration,
        }
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(self.origin.p, self.origin.t, self.width, self.duration)
    }

    pub fn path(&self) -> Path {
        Path::new(
            self.origin,
            vec![
                Segment::line(self.width, 0.0),
                Segment::line(0.0, self.duration),
                Segment::line(-self.width, 0.0),
                Segment::line(0.0, -self.duration),
            ],
        )
    }
}

// ── BentTrapezoid ────────────────────────────────────────────────

/// A trapezoid whose parallel edges are orthogonal to the time axis and
/// whose other two edges are bent.
///
/// ```text
///    position    top_width
///             +-------------+          -
///            /               \         |
///           /                 \        | duration
///          /                   \       |
///         +---------------------+      -
///               bottom_width
///         |---|
///         bottom_offset (negative here)
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BentTrapezoid {
    /// Left end of the top edge.
    pub position: Point,
    pub top_width: f64,
    pub bottom_width: f64,
    /// Position of the bottom edge's left end relative to `position.p`.
    pub bottom_offset: f64,
    pub duration: f64,
    /// Bend of the side edges, both components in `[0,1]`.
    pub bend: Point,
}

impl BentTrapezoid {
    pub fn new(top: Point, bottom: Point, top_width: f64, bottom_width: f64) -> Self {
        Self {
            position: top,
            top_width,
            bottom_width,
            bottom_offset: bottom.p - top.p,
            duration: bottom.t - top.t,
            bend: Point::new(0.5, 0.5),
        }
    }

    pub fn bounds(&self) -> Rect {
        if self.bottom_offset >= 0.0 {
            Rect::new(
                self.position.p,
                self.position.t,
                self.top_width.max(self.bottom_offset + self.bottom_width),
                self.duration,
            )
        } else {
            Rect::new(
                self.position.p + self.bottom_offset,
                self.position.t,
                (self.top_width - self.bottom_offset).max(self.bottom_width),
                self.duration,
            )
        }
    }

    pub fn path(&self) -> Path {
        let right_shift = self.bottom_offset + self.bottom_width - self.top_width;
        Path::new(
            self.position,
            vec![
                // top edge
                Segment::line(self.top_width, 0.0),
                // right side
                Segment::QuadCurve {
                    control: Point::new(
                        bend_along(right_shift, self.bend.p),
                        self.duration * self.bend.t,
                    ),
                    end: Point::new(right_shift, self.duration),
                },
                // bottom edge
                Segment::line(-self.bottom_width, 0.0),
                // left side
                Segment::QuadCurve {
                    control: Point::new(
                        -bend_along(self.bottom_offset, 1.0 - self.bend.p),
                        -self.duration * (1.0 - self.bend.t),
                    ),
                    end: Point::new(-self.bottom_offset, -self.duration),
                },
            ],
        )
    }
}

fn bend_along(distance: f64, bend: f64) -> f64 {
    if distance > 0.0 {
        distance * bend
    } else {
        distance * (1.0 - bend)
    }
}

// ── Shape ────────────────────────────────────────────────────────

/// Geometry of an element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Shape {
    Rectangle(OrthogonalRectangle),
    BentTrapezoid(BentTrapezoid),
}

impl Shape {
    /// Outer bounds in strip/time space.
    pub fn bounds(&self) -> Rect {
        match self {
            Shape::Rectangle(r) => r.bounds(),
            Shape::BentTrapezoid(b) => b.bounds(),
        }
    }

    /// The outline the scanner intersects.
    pub fn path(&self) -> Path {
        match self {
            Shape::Rectangle(r) => r.path(),
            Shape::BentTrapezoid(b) => b.path(),
        }
    }
}

impl From<OrthogonalRectangle> for Shape {
    fn from(r: OrthogonalRectangle) -> Self {
        Shape::Rectangle(r)
    }
}

impl From<BentTrapezoid> for Shape {
    fn from(b: BentTrapezoid) -> Self {
        Shape::BentTrapezoid(b)
    }
}

// ── Pattern ──────────────────────────────────────────────────────

/// A gradient anchor in shape-local `[0,1]×[0,1]` coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GradientAnchor {
    pub point: Point,
    pub color: Color,
}

/// An intermediate gradient color.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GradientStep {
    pub position: f64,
    pub color: Color,
}

/// How an element is filled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Pattern {
    SolidColor {
        color: Color,
    },
    LinearGradient {
        start: GradientAnchor,
        stop: GradientAnchor,
        /// Carried for the editor; the fill evaluator interpolates between
        /// `start` and `stop` only.
        #[serde(default)]
        steps: Vec<GradientStep>,
    },
}

impl Pattern {
    pub fn solid(color: Color) -> Self {
        Pattern::SolidColor { color }
    }

    /// Vertical gradient from the top-center to the bottom-center of the
    /// shape.
    pub fn linear_gradient(from: Color, to: Color) -> Self {
        Pattern::LinearGradient {
            start: GradientAnchor {
                point: Point::new(0.5, 0.0),
                color: from,
            },
            stop: GradientAnchor {
                point: Point::new(0.5, 1.0),
                color: to,
            },
            steps: Vec::new(),
        }
    }
}

// ── Element / Scene ──────────────────────────────────────────────

/// A shape placed in the scene with a fill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    /// Compositing order; higher values paint over lower ones.
    pub z_index: f64,
    pub shape: Shape,
    pub pattern: Pattern,
}

impl Element {
    pub fn new(z_index: f64, shape: impl Into<Shape>, pattern: Pattern) -> Self {
        Self {
            z_index,
            shape: shape.into(),
            pattern,
        }
    }
}

/// An ordered collection of elements.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub elements: Vec<Element>,
}

impl Scene {
    pub fn new(elements: Vec<Element>) -> Self {
        Self { elements }
    }

    pub fn push(&mut self, element: Element) {
        self.elements.push(element);
    }

    /// Elements whose bounds include `time`, in insertion order.
    pub fn elements_at(&self, time: f64) -> Vec<&Element> {
        self.elements
            .iter()
            .filter(|e| e.shape.bounds().includes_time(time))
            .collect()
    }

    /// Parse a scene from its serde JSON form.
    pub fn from_json(text: &str) -> Result<Self, FireflyError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn into_shared(self) -> SharedScene {
        Arc::new(RwLock::new(self))
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rectangle_bounds_and_path_close() {
        let rect = OrthogonalRectangle::new(Point::new(0.1, 2.0), 0.5, 3.0);
        assert_eq!(rect.bounds(), Rect::new(0.1, 2.0, 0.5, 3.0));

        let path = rect.path();
        let end = path
            .segments
            .iter()
            .fold(path.start, |at, s| at + s.end_point());
        assert!((end.p - path.start.p).abs() < 1e-12);
        assert!((end.t - path.start.t).abs() < 1e-12);
    }

    #[test]
    fn trapezoid_path_closes() {
        let trap = BentTrapezoid::new(Point::new(0.2, 0.0), Point::new(0.5, 4.0), 0.2, 0.4);
        let path = trap.path();
        let end = path
            .segments
            .iter()
            .fold(path.start, |at, s| at + s.end_point());
        assert!((end.p - path.start.p).abs() < 1e-12);
        assert!((end.t - path.start.t).abs() < 1e-12);
    }

    #[test]
    fn trapezoid_bounds_negative_offset() {
        let trap = BentTrapezoid::new(Point::new(0.5, 0.0), Point::new(0.2, 1.0), 0.2, 0.1);
        let b = trap.bounds();
        assert!((b.location.p - 0.2).abs() < 1e-12);
        // top edge spans 0.5..0.7, bottom edge 0.2..0.3
        assert!((b.dimensions.p - 0.5).abs() < 1e-12);
    }

    #[test]
    fn elements_at_keeps_insertion_order() {
        let shape = OrthogonalRectangle::new(Point::new(0.0, 0.0), 1.0, 1.0);
        let late = OrthogonalRectangle::new(Point::new(0.0, 5.0), 1.0, 1.0);
        let scene = Scene::new(vec![
            Element::new(2.0, shape.clone(), Pattern::solid(Color::WHITE)),
            Element::new(1.0, late, Pattern::solid(Color::WHITE)),
            Element::new(0.0, shape, Pattern::solid(Color::BLACK)),
        ]);
        let active = scene.elements_at(0.5);
        assert_eq!(active.len(), 2);
        assert_eq!(active[0].z_index, 2.0);
        assert_eq!(active[1].z_index, 0.0);
    }

    #[test]
    fn scene_json_roundtrip() {
        let scene = Scene::new(vec![Element::new(
            1.0,
            BentTrapezoid::new(Point::new(0.0, 0.0), Point::new(0.0, 1.0), 0.5, 0.5),
            Pattern::linear_gradient(Color::rgb8(255, 0, 0), Color::rgb8(0, 0, 255)),
        )]);
        let text = serde_json::to_string(&scene).unwrap();
        assert!(text.contains("bent_trapezoid"));
        assert_eq!(Scene::from_json(&text).unwrap(), scene);
    }
}
