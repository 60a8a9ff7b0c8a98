//! Strip/time geometry: points, rectangles, path segments and the
//! time-plane intersection math used by the scanner.
//!
//! Every coordinate lives in the same two-dimensional space:
//!
//! ```text
//!   P ──────────────────────►  normalized strip position [0, 1]
//!   │
//!   │   ┌──────────┐
//!   │   │  shape   │   ◄── a Path of Segments
//!   │   └──────────┘
//!   ▼
//!   T  seconds on the timeline
//! ```
//!
//! Segment coordinates are relative to the point where the segment
//! starts, i.e. the cumulative end point of all previous segments.

use std::ops::{Add, Neg, Sub};

use serde::{Deserialize, Serialize};

/// Two floats closer than this are treated as equal.
const EPSILON: f64 = 1e-8;

/// Iteration cap for the cubic bisection.
const BISECTION_STEPS: usize = 64;

// ── Point ────────────────────────────────────────────────────────

/// A position in the scene.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Position along the strip axis.
    pub p: f64,
    /// Point in time in seconds.
    pub t: f64,
}

impl Point {
    pub const fn new(p: f64, t: f64) -> Self {
        Self { p, t }
    }

    pub fn dot(self, other: Point) -> f64 {
        self.p * other.p + self.t * other.t
    }

    pub fn length(self) -> f64 {
        self.dot(self).sqrt()
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.p + rhs.p, self.t + rhs.t)
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.p - rhs.p, self.t - rhs.t)
    }
}

impl Neg for Point {
    type Output = Point;

    fn neg(self) -> Point {
        Point::new(-self.p, -self.t)
    }
}

// ── Rect ─────────────────────────────────────────────────────────

/// An axis-aligned rectangle in strip/time space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    /// Top-left corner: lowest position, earliest time.
    pub location: Point,
    /// Width along P and duration along T.
    pub dimensions: Point,
}

impl Rect {
    pub const fn new(p: f64, t: f64, width: f64, duration: f64) -> Self {
        Self {
            location: Point::new(p, t),
            dimensions: Point::new(width, duration),
        }
    }

    /// Whether `time` lies within the rectangle's temporal span
    /// (both ends inclusive).
    pub fn includes_time(&self, time: f64) -> bool {
        time >= self.location.t && time <= self.location.t + self.dimensions.t
    }

    /// Map `point` into the rectangle's local `[0,1]×[0,1]` space.
    ///
    /// Returns the origin when either dimension is zero.
    pub fn normalize(&self, point: Point) -> Point {
        if self.dimensions.p == 0.0 || self.dimensions.t == 0.0 {
            return Point::default();
        }
        let local = point - self.location;
        Point::new(local.p / self.dimensions.p, local.t / self.dimensions.t)
    }
}

// ── Segment ──────────────────────────────────────────────────────

/// A single path primitive, relative to its start point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Segment {
    /// Straight line to `end`.
    Line { end: Point },
    /// Quadratic bezier with one control point.
    QuadCurve { control: Point, end: Point },
    /// Cubic bezier with two control points.
    CubicCurve {
        control_a: Point,
        control_b: Point,
        end: Point,
    },
}

impl Segment {
    pub fn line(p: f64, t: f64) -> Self {
        Segment::Line {
            end: Point::new(p, t),
        }
    }

    /// End point relative to the segment start.
    pub fn end_point(&self) -> Point {
        match *self {
            Segment::Line { end }
            | Segment::QuadCurve { end, .. }
            | Segment::CubicCurve { end, .. } => end,
        }
    }

    /// Shift every point of the segment by `offset`.
    pub fn translate(&mut self, offset: Point) {
        match self {
            Segment::Line { end } => *end = *end + offset,
            Segment::QuadCurve { control, end } => {
                *control = *control + offset;
                *end = *end + offset;
            }
            Segment::CubicCurve {
                control_a,
                control_b,
                end,
            } => {
                *control_a = *control_a + offset;
                *control_b = *control_b + offset;
                *end = *end + offset;
            }
        }
    }

    /// The latest relative time any point of this segment reaches.
    pub fn latest_time(&self) -> f64 {
        match *self {
            Segment::Line { end } => end.t,
            Segment::QuadCurve { control, end } => control.t.max(end.t),
            Segment::CubicCurve {
                control_a,
                control_b,
                end,
            } => control_a.t.max(control_b.t).max(end.t),
        }
    }

    /// Position (relative to the segment start) where the segment reaches
    /// the relative time `dt`.
    ///
    /// Callers only ask for times strictly between the segment's start and
    /// end times. When no solution exists the result is `0`.
    pub fn crossing(&self, dt: f64) -> f64 {
        match *self {
            Segment::Line { end } => end.p * (dt / end.t),
            Segment::QuadCurve { control, end } => match quad_parameter(control.t, end.t, dt) {
                Some(s) => 2.0 * s * (1.0 - s) * control.p + s * s * end.p,
                None => 0.0,
            },
            Segment::CubicCurve {
                control_a,
                control_b,
                end,
            } => {
                let s = cubic_parameter(control_a.t, control_b.t, end.t, dt);
                cubic(control_a.p, control_b.p, end.p, s)
            }
        }
    }
}

/// Solve `2s(1-s)·c + s²·e = dt` for `s ∈ [0,1]`.
///
/// When `2c == e` the quadratic term vanishes and the equation is solved
/// directly. If both roots are valid the larger-sign root wins.
fn quad_parameter(c: f64, e: f64, dt: f64) -> Option<f64> {
    if (2.0 * c - e).abs() < EPSILON {
        return Some(dt / e);
    }
    let discriminant = c * c - 2.0 * c * dt + e * dt;
    if discriminant < 0.0 {
        return None;
    }
    let root = discriminant.sqrt();
    let denominator = 2.0 * c - e;
    let candidates = [(c - root) / denominator, (c + root) / denominator];
    candidates
        .into_iter()
        .filter(|s| (0.0..=1.0).contains(s))
        .last()
}

/// Cubic bezier component starting at zero.
fn cubic(a: f64, b: f64, e: f64, s: f64) -> f64 {
    let inv = 1.0 - s;
    3.0 * s * inv * inv * a + 3.0 * s * s * inv * b + s * s * s * e
}

/// Bisect the curve parameter until the time component reaches `dt`.
///
/// The time component is `0` at `s = 0` and `e` at `s = 1`, and `dt`
/// lies strictly between them, so a sign change is guaranteed.
fn cubic_parameter(a: f64, b: f64, e: f64, dt: f64) -> f64 {
    let rising = e > 0.0;
    let (mut low, mut high) = (0.0_f64, 1.0_f64);
    for _ in 0..BISECTION_STEPS {
        let mid = 0.5 * (low + high);
        let below = cubic(a, b, e, mid) < dt;
        if below == rising {
            low = mid;
        } else {
            high = mid;
        }
        if high - low < EPSILON * EPSILON {
            break;
        }
    }
    0.5 * (low + high)
}

// ── Path ─────────────────────────────────────────────────────────

/// A closed outline: a start point followed by relative segments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Path {
    pub start: Point,
    pub segments: Vec<Segment>,
}

impl Path {
    pub fn new(start: Point, segments: Vec<Segment>) -> Self {
        Self { start, segments }
    }

    /// Length of the path on the time axis, measured from `start`.
    pub fn duration(&self) -> f64 {
        let mut cursor = 0.0_f64;
        let mut latest = 0.0_f64;
        for segment in &self.segments {
            latest = latest.max(cursor + segment.latest_time());
            cursor += segment.end_point().t;
        }
        latest
    }

    /// Absolute strip positions where the outline crosses the plane
    /// `T = time`, in path order.
    ///
    /// Only segments whose endpoints lie strictly on opposite sides of
    /// `time` contribute a crossing.
    pub fn time_crossings(&self, time: f64) -> Vec<f64> {
        let mut crossings = Vec::new();
        let mut current = self.start;
        for segment in &self.segments {
            let next = current + segment.end_point();
            let straddles =
                (current.t < time && next.t > time) || (current.t > time && next.t < time);
            if straddles {
                crossings.push(current.p + segment.crossing(time - current.t));
            }
            current = next;
        }
        crossings
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn rect_includes_time_inclusive() {
        let r = Rect::new(0.0, 1.0, 1.0, 2.0);
        assert!(r.includes_time(1.0));
        assert!(r.includes_time(3.0));
        assert!(!r.includes_time(0.999));
        assert!(!r.includes_time(3.001));
    }

    #[test]
    fn rect_normalize_zero_dimension_falls_back() {
        let r = Rect::new(0.2, 1.0, 0.0, 2.0);
        assert_eq!(r.normalize(Point::new(0.5, 1.5)), Point::default());
    }

    #[test]
    fn rect_normalize_maps_corners() {
        let r = Rect::new(0.2, 1.0, 0.4, 2.0);
        let p = r.normalize(Point::new(0.6, 3.0));
        assert!(close(p.p, 1.0));
        assert!(close(p.t, 1.0));
    }

    #[test]
    fn line_crossing_interpolates() {
        let seg = Segment::line(0.5, 2.0);
        assert!(close(seg.crossing(1.0), 0.25));
    }

    #[test]
    fn quad_degenerate_is_linear() {
        // control.t * 2 == end.t: time grows linearly with the parameter.
        let seg = Segment::QuadCurve {
            control: Point::new(0.0, 1.0),
            end: Point::new(1.0, 2.0),
        };
        // s = 0.5 → p = 2·0.5·0.5·0 + 0.25·1
        assert!(close(seg.crossing(1.0), 0.25));
    }

    #[test]
    fn quad_crossing_solves_quadratic() {
        let seg = Segment::QuadCurve {
            control: Point::new(0.5, 0.0),
            end: Point::new(1.0, 1.0),
        };
        // T(s) = s², so T = 0.25 at s = 0.5; P(0.5) = 2·0.25·0.5 + 0.25
        assert!(close(seg.crossing(0.25), 0.5));
    }

    #[test]
    fn cubic_crossing_bisects() {
        // Straight cubic along the diagonal: T(s) = P(s).
        let seg = Segment::CubicCurve {
            control_a: Point::new(1.0 / 3.0, 1.0 / 3.0),
            control_b: Point::new(2.0 / 3.0, 2.0 / 3.0),
            end: Point::new(1.0, 1.0),
        };
        assert!((seg.crossing(0.3) - 0.3).abs() < 1e-6);
    }

    #[test]
    fn cubic_crossing_descending() {
        let seg = Segment::CubicCurve {
            control_a: Point::new(0.0, -1.0 / 3.0),
            control_b: Point::new(0.0, -2.0 / 3.0),
            end: Point::new(0.0, -1.0),
        };
        // Vertical edge: the position stays zero whatever the parameter.
        assert!(close(seg.crossing(-0.5), 0.0));
    }

    #[test]
    fn latest_time_picks_maximum() {
        let seg = Segment::QuadCurve {
            control: Point::new(0.0, 3.0),
            end: Point::new(0.0, 1.0),
        };
        assert_eq!(seg.latest_time(), 3.0);
    }

    #[test]
    fn translate_moves_all_points() {
        let mut seg = Segment::CubicCurve {
            control_a: Point::new(0.0, 0.0),
            control_b: Point::new(1.0, 1.0),
            end: Point::new(2.0, 2.0),
        };
        seg.translate(Point::new(1.0, -1.0));
        assert_eq!(seg.end_point(), Point::new(3.0, 1.0));
    }

    #[test]
    fn square_path_crossings() {
        let path = Path::new(
            Point::new(0.25, 1.0),
            vec![
                Segment::line(0.5, 0.0),
                Segment::line(0.0, 2.0),
                Segment::line(-0.5, 0.0),
                Segment::line(0.0, -2.0),
            ],
        );
        let crossings = path.time_crossings(2.0);
        assert_eq!(crossings.len(), 2);
        assert!(close(crossings[0], 0.75));
        assert!(close(crossings[1], 0.25));
        assert!(close(path.duration(), 2.0));
        assert!(path.time_crossings(1.0).is_empty());
    }
}
