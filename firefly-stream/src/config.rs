//! Configuration for the streaming service.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use firefly_core::{DEFAULT_GAMMA, Mapping, Protocol};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Physical strip layout.
    pub strip: StripConfig,
    /// Playback clock settings.
    pub playback: PlaybackConfig,
    /// Outputs; every entry becomes one streamer.
    pub streamers: Vec<StreamerConfig>,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Strip layout. Without `stops` the strip is one evenly spaced segment
/// of `led_count` LEDs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StripConfig {
    pub led_count: usize,
    /// Unlit LEDs before the visible region.
    pub start_offset: usize,
    /// Unlit LEDs after the visible region.
    pub end_offset: usize,
    /// The strip is wired back to front.
    pub reversed: bool,
    pub stops: Vec<StopConfig>,
}

/// A segment of `pixels` LEDs ending at strip `position` (0..=1).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StopConfig {
    pub position: f64,
    pub pixels: usize,
}

/// Playback clock.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Frames per second sent to the pipeline.
    pub fps: u32,
    /// Scene time of the first frame, in seconds.
    pub start: f64,
    /// Scene time at which playback wraps or stops.
    pub end: f64,
    /// Restart at `start` after reaching `end`.
    pub looping: bool,
    /// JSON scene file. A built-in demo scene is used when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scene: Option<PathBuf>,
}

/// One output.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamerConfig {
    pub protocol: Protocol,
    /// UDP target, e.g. `"192.168.1.40:20202"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Capture file; used when no address is given.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// Gamma for the legacy and fragmenting protocols.
    pub gamma: f64,
    /// UDP send timeout in milliseconds, 0 to disable.
    pub timeout_ms: u64,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for StripConfig {
    fn default() -> Self {
        Self {
            led_count: 60,
            start_offset: 0,
            end_offset: 0,
            reversed: false,
            stops: Vec::new(),
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            fps: 30,
            start: 0.0,
            end: 10.0,
            looping: true,
            scene: None,
        }
    }
}

impl Default for StreamerConfig {
    fn default() -> Self {
        Self {
            protocol: Protocol::Fragmenting,
            address: Some("127.0.0.1:20202".into()),
            path: None,
            gamma: DEFAULT_GAMMA,
            timeout_ms: 50,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl StreamConfig {
    /// Load configuration from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Default configuration with one UDP streamer, as written by
    /// `--gen-config`.
    pub fn example() -> Self {
        Self {
            streamers: vec![StreamerConfig::default()],
            ..Self::default()
        }
    }

    /// Write the example configuration to a file (for bootstrapping).
    pub fn write_default(path: &Path) -> std::io::Result<()> {
        let text = toml::to_string_pretty(&Self::example()).map_err(std::io::Error::other)?;
        std::fs::write(path, text)
    }

    /// Build the pixel mapping described by `[strip]`.
    pub fn to_mapping(&self) -> Mapping {
        let strip = &self.strip;
        let mut mapping = if strip.stops.is_empty() {
            Mapping {
                start_offset: strip.start_offset,
                end_offset: strip.end_offset,
                ..Mapping::linear(strip.led_count)
            }
        } else {
            Mapping::from_stops(
                strip.start_offset,
                strip.end_offset,
                strip.stops.iter().map(|s| (s.position, s.pixels)),
            )
        };
        mapping.reversed = strip.reversed;
        mapping
    }
}

impl PlaybackConfig {
    /// Scene time for `elapsed` seconds of wall clock, or `None` once a
    /// non-looping playback has passed `end`.
    pub fn time_at(&self, elapsed: f64) -> Option<f64> {
        let span = self.end - self.start;
        if span <= 0.0 {
            return Some(self.start);
        }
        if self.looping {
            Some(self.start + elapsed.rem_euclid(span))
        } else if elapsed <= span {
            Some(self.start + elapsed)
        } else {
            None
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn example_config_serializes() {
        let text = toml::to_string_pretty(&StreamConfig::example()).unwrap();
        assert!(text.contains("led_count"));
        assert!(text.contains("[[streamers]]"));
        assert!(text.contains("protocol = \"fragmenting\""));
    }

    #[test]
    fn roundtrip_config() {
        let text = toml::to_string_pretty(&StreamConfig::example()).unwrap();
        let parsed: StreamConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.strip.led_count, 60);
        assert_eq!(parsed.playback.fps, 30);
        assert_eq!(parsed.streamers.len(), 1);
        assert_eq!(parsed.streamers[0].address.as_deref(), Some("127.0.0.1:20202"));
    }

    #[test]
    fn partial_config_uses_defaults() {
        let text = r#"
            [strip]
            led_count = 144
            reversed = true

            [[streamers]]
            protocol = "drgb"
            address = "10.0.0.7:21324"

            [[streamers]]
            protocol = "diagnostic"
            path = "capture.bin"
        "#;
        let cfg: StreamConfig = toml::from_str(text).unwrap();
        assert_eq!(cfg.strip.led_count, 144);
        assert_eq!(cfg.playback.fps, 30);
        assert_eq!(cfg.streamers[0].protocol, Protocol::Drgb);
        assert_eq!(cfg.streamers[0].gamma, DEFAULT_GAMMA);
        assert_eq!(cfg.streamers[1].path, Some(PathBuf::from("capture.bin")));
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn linear_mapping_from_strip() {
        let mut cfg = StreamConfig::default();
        cfg.strip.start_offset = 2;
        cfg.strip.end_offset = 1;
        cfg.strip.reversed = true;
        let mapping = cfg.to_mapping();
        assert_eq!(mapping.total_pixels(), 63);
        assert!(mapping.reversed);
        assert_eq!(mapping.segments.len(), 1);
    }

    #[test]
    fn stops_mapping_from_strip() {
        let mut cfg = StreamConfig::default();
        cfg.strip.stops = vec![
            StopConfig {
                position: 1.0,
                pixels: 30,
            },
            StopConfig {
                position: 0.25,
                pixels: 10,
            },
        ];
        let mapping = cfg.to_mapping();
        assert_eq!(mapping.total_pixels(), 40);
        assert_eq!(mapping.segments[0].to, 0.25);
        assert_eq!(mapping.segments[1].to, 1.0);
    }

    #[test]
    fn playback_clock_wraps_or_ends() {
        let looping = PlaybackConfig {
            start: 2.0,
            end: 6.0,
            ..PlaybackConfig::default()
        };
        assert_eq!(looping.time_at(1.0), Some(3.0));
        assert_eq!(looping.time_at(5.0), Some(3.0));

        let once = PlaybackConfig {
            looping: false,
            ..looping.clone()
        };
        assert_eq!(once.time_at(4.0), Some(6.0));
        assert_eq!(once.time_at(4.5), None);

        let frozen = PlaybackConfig {
            start: 1.0,
            end: 1.0,
            ..PlaybackConfig::default()
        };
        assert_eq!(frozen.time_at(100.0), Some(1.0));
    }
}
