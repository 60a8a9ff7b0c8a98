//! # firefly-core
//!
//! Scan-and-stream engine for addressable LED strips.
//!
//! This crate contains:
//! - **Scene**: vector shapes (rectangles, bent trapezoids) with solid or
//!   gradient patterns, laid out on a position × time plane
//! - **Mapping**: physical LED index → normalized strip position
//! - **Scanner**: samples the scene at one instant into a `Frame`
//! - **Pipeline**: a single worker that scans on demand and fans frames
//!   out to streamers
//! - **Streamer**: wire encoders (legacy, fragmenting, DRGB, diagnostic)
//!   writing to UDP, file or memory sinks
//! - **Error**: `FireflyError`, a `thiserror`-based error type

pub mod color;
pub mod error;
pub mod geometry;
pub mod mapping;
pub mod pipeline;
pub mod scanner;
pub mod scene;
pub mod streamer;
pub mod transport;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use color::{Color, DEFAULT_GAMMA};
pub use error::FireflyError;
pub use geometry::{Path, Point, Rect, Segment};
pub use mapping::{Mapping, MappingSegment};
pub use pipeline::Pipeline;
pub use scanner::{Frame, Scanner};
pub use scene::{
    BentTrapezoid, Element, GradientAnchor, GradientStep, OrthogonalRectangle, Pattern, Scene,
    Shape, SharedScene,
};
pub use streamer::{PacketStreamer, Protocol, Streamer};
pub use transport::{FileSink, MemorySink, PacketSink, UdpSink};
