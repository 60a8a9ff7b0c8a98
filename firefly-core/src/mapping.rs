//! Pixel mapping: relates physical LED indices to normalized strip
//! positions.
//!
//! A mapping has a black region at each end of the strip and a list of
//! segments in between. Each segment spreads `pixel_size` LEDs over the
//! strip span from the previous segment's `to` up to its own `to`, so
//! LED density can differ along the strip:
//!
//! ```text
//! index:   0 .. start_offset | segment 0 | segment 1 | .. | end_offset
//! span:       (black)        | 0 .. to₀  | to₀ .. to₁| .. | (black)
//! ```

use serde::{Deserialize, Serialize};

/// One run of evenly spaced LEDs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MappingSegment {
    pub pixel_size: usize,
    /// Strip position where this segment ends.
    pub to: f64,
}

/// Physical LED layout of a strip.
///
/// `segments` is non-empty and the last segment ends at exactly `1.0`
/// once [`normalize`](Self::normalize) has run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Mapping {
    pub start_offset: usize,
    pub end_offset: usize,
    /// The strip is wired back to front.
    pub reversed: bool,
    pub segments: Vec<MappingSegment>,
}

impl Mapping {
    /// One segment spanning the whole strip.
    pub fn linear(pixels: usize) -> Self {
        Self {
            start_offset: 0,
            end_offset: 0,
            reversed: false,
            segments: vec![MappingSegment {
                pixel_size: pixels,
                to: 1.0,
            }],
        }
    }

    /// Build a mapping from `(position, pixels)` stops and normalize it.
    pub fn from_stops(
        start_offset: usize,
        end_offset: usize,
        stops: impl IntoIterator<Item = (f64, usize)>,
    ) -> Self {
        let mut mapping = Self {
            start_offset,
            end_offset,
            reversed: false,
            segments: Vec::new(),
        };
        for (position, pixels) in stops {
            mapping.add_stop(position, pixels);
        }
        mapping.normalize();
        mapping
    }

    /// Total number of addressable pixels, offsets included.
    pub fn total_pixels(&self) -> usize {
        self.start_offset
            + self.end_offset
            + self.segments.iter().map(|s| s.pixel_size).sum::<usize>()
    }

    /// Insert a segment ending at `position` before the first segment that
    /// ends later. Colliding positions are kept as separate segments.
    pub fn add_stop(&mut self, position: f64, pixel_count: usize) {
        let segment = MappingSegment {
            pixel_size: pixel_count,
            to: position,
        };
        match self.segments.iter().position(|s| s.to > position) {
            Some(index) => self.segments.insert(index, segment),
            None => self.segments.push(segment),
        }
    }

    /// Normalized position of pixel `index` and the normalized width of
    /// one pixel in its segment.
    ///
    /// Indices outside the segments (offset regions, out of range) yield
    /// `(0.0, 0.0)`.
    pub fn pixel_position(&self, index: usize) -> (f64, f64) {
        if index < self.start_offset {
            return (0.0, 0.0);
        }
        let mut pixel_offset = self.start_offset;
        let mut last_position = 0.0;
        for segment in &self.segments {
            if pixel_offset + segment.pixel_size > index {
                let span = segment.to - last_position;
                let local = (index - pixel_offset) as f64 / segment.pixel_size as f64;
                let width = span / segment.pixel_size as f64;
                return (last_position + span * local, width);
            }
            pixel_offset += segment.pixel_size;
            last_position = segment.to;
        }
        (0.0, 0.0)
    }

    /// Make the mapping valid: at least one segment, every `to` within
    /// `[0,1]` and the last one ending at `1.0`.
    pub fn normalize(&mut self) {
        for segment in &mut self.segments {
            segment.to = segment.to.clamp(0.0, 1.0);
        }
        match self.segments.last_mut() {
            Some(last) => last.to = 1.0,
            None => self.segments.push(MappingSegment {
                pixel_size: 1,
                to: 1.0,
            }),
        }
    }

    /// A plain strip: no offsets, not reversed, a single segment.
    pub fn is_linear(&self) -> bool {
        self.start_offset == 0 && self.end_offset == 0 && !self.reversed && self.segments.len() == 1
    }
}

impl Default for Mapping {
    fn default() -> Self {
        Self::linear(30)
    }
}

// ── Tests ────────────────────────────────────────────────────────
