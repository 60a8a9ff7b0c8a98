//! 16-bit RGBA color used throughout the scan path.
//!
//! Blending happens in 16-bit float space; colors are only reduced to
//! 8-bit when a streamer writes them to the wire.

use serde::{Deserialize, Serialize};

/// Full-scale channel value.
pub const CHANNEL_MAX: f64 = 65535.0;

/// Gamma applied by the legacy and fragmenting protocols.
pub const DEFAULT_GAMMA: f64 = 2.2;

/// A color with 16 bits per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u16,
    pub g: u16,
    pub b: u16,
    pub a: u16,
}

impl Color {
    pub const BLACK: Color = Color::rgba16(0, 0, 0, u16::MAX);
    pub const WHITE: Color = Color::rgba16(u16::MAX, u16::MAX, u16::MAX, u16::MAX);
    pub const TRANSPARENT: Color = Color::rgba16(0, 0, 0, 0);

    pub const fn rgba16(r: u16, g: u16, b: u16, a: u16) -> Self {
        Self { r, g, b, a }
    }

    /// Build from 8-bit components, scaling each by 257 (`0xff` → `0xffff`).
    pub const fn rgba8(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self::rgba16(
            r as u16 * 257,
            g as u16 * 257,
            b as u16 * 257,
            a as u16 * 257,
        )
    }

    pub const fn rgb8(r: u8, g: u8, b: u8) -> Self {
        Self::rgba8(r, g, b, 0xff)
    }

    fn to_floats(self) -> [f64; 4] {
        [self.r as f64, self.g as f64, self.b as f64, self.a as f64]
    }

    fn from_floats([r, g, b, a]: [f64; 4]) -> Self {
        let channel = |v: f64| v.round().clamp(0.0, CHANNEL_MAX) as u16;
        Self::rgba16(channel(r), channel(g), channel(b), channel(a))
    }

    /// Linear interpolation towards `other`; `progress` is clamped to `[0,1]`.
    pub fn lerp(self, other: Color, progress: f64) -> Color {
        let progress = progress.clamp(0.0, 1.0);
        let a = self.to_floats();
        let b = other.to_floats();
        Self::from_floats(std::array::from_fn(|i| a[i] + (b[i] - a[i]) * progress))
    }

    /// Paint `layer` over `self`.
    ///
    /// The layer's alpha is the blend weight, the alpha of `self` is
    /// ignored and the result is always fully opaque.
    pub fn over(self, layer: Color) -> Color {
        let weight = layer.a as f64 / CHANNEL_MAX;
        let base = self.to_floats();
        let top = layer.to_floats();
        let blend = |i: usize| base[i] * (1.0 - weight) + top[i] * weight;
        Self::from_floats([blend(0), blend(1), blend(2), CHANNEL_MAX])
    }

    /// RGB reduced to 8 bits without correction.
    pub fn to_rgb8(self) -> [u8; 3] {
        let byte = |c: u16| (c as f64 / CHANNEL_MAX * 255.0).round() as u8;
        [byte(self.r), byte(self.g), byte(self.b)]
    }

    /// RGB reduced to 8 bits with `byte = round((c / 65535)^gamma · 255)`.
    pub fn to_rgb8_gamma(self, gamma: f64) -> [u8; 3] {
        let byte = |c: u16| ((c as f64 / CHANNEL_MAX).powf(gamma) * 255.0).round() as u8;
        [byte(self.r), byte(self.g), byte(self.b)]
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::BLACK
    }
}

// ── Tests ────────────────────────────────────────────────────────
