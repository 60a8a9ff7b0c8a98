//! # firefly-stream - LED strip streaming service
//!
//! Long-running service that plays a scene onto one or more LED strips.
//! A playback clock feeds scene time into a `firefly_core::Pipeline`;
//! every frame is encoded by the configured streamers and sent over UDP
//! or written to a capture file.
//!
//! ## Configuration
//!
//! A TOML file with `[strip]`, `[playback]`, `[[streamers]]` and
//! `[logging]` sections, see [`config::StreamConfig`].

pub mod config;
pub mod service;
