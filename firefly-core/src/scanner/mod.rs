//! The scanner turns the scene into a strip of colors for one instant.
//!
//! ## Scan
//!
//! ```text
//!  T ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─►
//!        ┌─────────┐
//!        │    A    │      ╱‾‾‾‾‾‾‾‾╲
//!  time ━┿━━━━━━━━━┿━━━━━╋━━━━B━━━━╋━━━━━━━━━  ◄── scan line
//!        └─────────┘     ╲________╱
//!        [ coverage A ]  [ coverage B ]
//! ```
//!
//! Every active element's outline is intersected with the scan line,
//! giving a coverage interval on the strip. Pixels are then sampled at
//! their centers and every covering element is composited over the pixel
//! in ascending z-index order.

pub mod fill;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::color::Color;
use crate::geometry::{Path, Point};
use crate::mapping::Mapping;
use crate::scene::SharedScene;

pub use fill::fill;

// ── Frame ────────────────────────────────────────────────────────

/// The colors of every pixel of the strip at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub time: f64,
    pub pixels: Vec<Color>,
}

// ── Scanner ──────────────────────────────────────────────────────

/// Scans a shared scene through a pixel mapping.
///
/// Cloning yields another handle to the same scene and mapping, so the
/// mapping can be replaced while a pipeline owns the scanner. The
/// mapping lock is held for the whole scan; [`set_mapping`](Self::set_mapping)
/// waits for an in-flight scan and vice versa.
#[derive(Debug, Clone)]
pub struct Scanner {
    scene: SharedScene,
    mapping: Arc<Mutex<Mapping>>,
}

impl Scanner {
    /// Scanner over `scene` for a plain strip of `pixels` LEDs.
    pub fn new(scene: SharedScene, pixels: usize) -> Self {
        Self::with_mapping(scene, Mapping::linear(pixels))
    }

    pub fn with_mapping(scene: SharedScene, mut mapping: Mapping) -> Self {
        mapping.normalize();
        Self {
            scene,
            mapping: Arc::new(Mutex::new(mapping)),
        }
    }

    /// Replace the mapping. It is normalized before use.
    pub fn set_mapping(&self, mut mapping: Mapping) {
        mapping.normalize();
        *self.lock_mapping() = mapping;
    }

    /// A copy of the current mapping.
    pub fn mapping(&self) -> Mapping {
        self.lock_mapping().clone()
    }

    /// See [`Mapping::pixel_position`].
    pub fn pixel_position(&self, index: usize) -> (f64, f64) {
        self.lock_mapping().pixel_position(index)
    }

    pub fn scene(&self) -> &SharedScene {
        &self.scene
    }

    /// Scan the scene at `time`.
    pub fn scan(&self, time: f64) -> Frame {
        let mapping = self.lock_mapping();

        let size = mapping.total_pixels();
        let mut pixels = vec![Color::BLACK; size];
        let first = mapping.start_offset.min(size);
        let end = size.saturating_sub(mapping.end_offset).max(first);

        let scene = self.scene.read().unwrap_or_else(PoisonError::into_inner);
        let mut elements = scene.elements_at(time);
        // Stable: equal z-indices keep scene order.
        elements.sort_by(|a, b| a.z_index.total_cmp(&b.z_index));

        let coverage: Vec<Option<(f64, f64)>> = elements
            .iter()
            .map(|e| path_coverage(&e.shape.path(), time))
            .collect();

        for index in first..end {
            let (position, width) = mapping.pixel_position(index);
            let center = position + width / 2.0;
            let sample = Point::new(center, time);

            let mut color = Color::BLACK;
            for (element, covered) in elements.iter().zip(&coverage) {
                let Some((start, stop)) = *covered else {
                    continue;
                };
                if start <= center && center <= stop {
                    color = color.over(fill(element, sample));
                }
            }

            let target = if mapping.reversed {
                first + (end - 1 - index)
            } else {
                index
            };
            pixels[target] = color;
        }

        Frame { time, pixels }
    }

    fn lock_mapping(&self) -> MutexGuard<'_, Mapping> {
        self.mapping.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Strip interval `[start, stop]` an outline covers at `time`.
///
/// Expects exactly two crossings (entry and exit). With fewer the shape
/// is invisible at `time` and `None` is returned.
fn path_coverage(path: &Path, time: f64) -> Option<(f64, f64)> {
    let crossings = path.time_crossings(time);
    match crossings.as_slice() {
        [a, b, ..] => Some((a.min(*b), a.max(*b))),
        _ => {
            warn!(
                crossings = crossings.len(),
                time, "not enough edges found for shape coverage"
            );
            None
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
