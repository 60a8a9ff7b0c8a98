//! Pattern fill evaluation.

use crate::color::Color;
use crate::geometry::Point;
use crate::scene::{Element, Pattern};

/// Color of `element` at the scene point `point`.
///
/// The point is first mapped into the shape's local `[0,1]×[0,1]` space.
/// Gradients interpolate between their two anchors only; intermediate
/// steps are not consulted.
pub fn fill(element: &Element, point: Point) -> Color {
    let local = element.shape.bounds().normalize(point);
    match &element.pattern {
        Pattern::SolidColor { color } => *color,
        Pattern::LinearGradient { start, stop, .. } => {
            let to_point = local - start.point;
            let track = stop.point - start.point;
            let length_squared = track.dot(track);
            let progress = if length_squared == 0.0 {
                0.0
            } else {
                to_point.dot(track) / length_squared
            };
            start.color.lerp(stop.color, progress)
        }
    }
}
