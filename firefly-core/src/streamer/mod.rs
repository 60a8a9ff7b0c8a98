//! Streamers encode frames and push them to a packet sink.
//!
//! | Protocol      | Packets per frame | Gamma | Consumer                    |
//! |---------------|-------------------|-------|-----------------------------|
//! | `legacy`      | 1                 | 2.2   | original firmware (v0)      |
//! | `fragmenting` | ⌈n / 300⌉         | 2.2   | current firmware (v1)       |
//! | `drgb`        | 1                 | none  | WLED-style controllers      |
//! | `diagnostic`  | 1 record          | none  | offline capture files       |
//!
//! Streaming never fails from the caller's point of view: encoding and
//! transport errors are logged and the frame is dropped.

pub mod encode;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{error, trace};

use crate::color::DEFAULT_GAMMA;
use crate::error::FireflyError;
use crate::scanner::Frame;
use crate::transport::PacketSink;

pub use encode::{
    MAX_PIXELS_PER_PACKET, decode_capture, encode_diagnostic, encode_drgb, encode_fragments,
    encode_legacy,
};

// ── Streamer ─────────────────────────────────────────────────────

/// Anything the pipeline can hand a finished frame to.
#[async_trait]
pub trait Streamer: Send + Sync {
    /// Deliver `frame`. Failures are handled (logged) internally.
    async fn stream(&self, frame: &Frame);
}

// ── Protocol ─────────────────────────────────────────────────────

/// Wire format spoken by a [`PacketStreamer`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    /// Version 0: a single gamma corrected packet.
    Legacy,
    /// Version 1: gamma corrected packets of at most 300 pixels.
    #[default]
    Fragmenting,
    /// WLED "Direct RGB".
    Drgb,
    /// Length-delimited bincode frames.
    Diagnostic,
}

impl Protocol {
    /// Encode `frame` into the packets of this protocol, in send order.
    pub fn encode(self, frame: &Frame, gamma: f64) -> Result<Vec<Bytes>, FireflyError> {
        Ok(match self {
            Protocol::Legacy => vec![encode_legacy(frame, gamma)],
            Protocol::Fragmenting => encode_fragments(frame, gamma),
            Protocol::Drgb => vec![encode_drgb(frame)],
            Protocol::Diagnostic => vec![encode_diagnostic(frame)?],
        })
    }
}

// ── PacketStreamer ───────────────────────────────────────────────

/// Encodes frames with one [`Protocol`] and writes them to a sink.
///
/// The destination can be swapped while streaming; both operations take
/// the same per-streamer lock, which is independent of the scan lock.
pub struct PacketStreamer {
    protocol: Protocol,
    gamma: f64,
    destination: Mutex<Option<Arc<dyn PacketSink>>>,
}

impl PacketStreamer {
    pub fn new(protocol: Protocol, destination: Option<Arc<dyn PacketSink>>) -> Self {
        Self {
            protocol,
            gamma: DEFAULT_GAMMA,
            destination: Mutex::new(destination),
        }
    }

    /// Override the gamma used by the gamma corrected protocols.
    pub fn with_gamma(mut self, gamma: f64) -> Self {
        self.gamma = gamma;
        self
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// Replace the sink. `None` makes the streamer drop frames silently.
    pub async fn set_destination(&self, destination: Option<Arc<dyn PacketSink>>) {
        *self.destination.lock().await = destination;
    }

    /// Encode and send `frame`, reporting the first failure.
    pub async fn try_stream(&self, frame: &Frame) -> Result<(), FireflyError> {
        let destination = self.destination.lock().await;
        let sink = destination.as_ref().ok_or(FireflyError::NoDestination)?;
        for packet in self.protocol.encode(frame, self.gamma)? {
            sink.send_packet(&packet).await?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for PacketStreamer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacketStreamer")
            .field("protocol", &self.protocol)
            .field("gamma", &self.gamma)
            .finish()
    }
}

#[async_trait]
impl Streamer for PacketStreamer {
    async fn stream(&self, frame: &Frame) {
        match self.try_stream(frame).await {
            Ok(()) => {}
            Err(FireflyError::NoDestination) => {
                trace!(protocol = ?self.protocol, "no destination; frame dropped");
            }
            Err(e) => {
                error!(protocol = ?self.protocol, time = frame.time, "streaming error: {e}");
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use crate::transport::MemorySink;

    struct FailingSink;

    #[async_trait]
    impl PacketSink for FailingSink {
        async fn send_packet(&self, _packet: &[u8]) -> Result<(), FireflyError> {
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused").into())
        }
    }

    fn white(len: usize) -> Frame {
        Frame {
            time: 0.0,
            pixels: vec![Color::WHITE; len],
        }
    }

    #[tokio::test]
    async fn streams_all_fragments_in_order() {
        let sink = Arc::new(MemorySink::new());
        let streamer = PacketStreamer::new(Protocol::Fragmenting, Some(sink.clone()));
        streamer.stream(&white(650)).await;

        let packets = sink.packets();
        assert_eq!(packets.len(), 3);
        let offsets: Vec<u16> = packets
            .iter()
            .map(|p| {
                let at = 2 + p[1] as usize;
                u16::from_le_bytes([p[at], p[at + 1]])
            })
            .collect();
        assert_eq!(offsets, vec![0, 300, 600]);
    }

    #[tokio::test]
    async fn missing_destination_drops_silently() {
        let streamer = PacketStreamer::new(Protocol::Legacy, None);
        streamer.stream(&white(4)).await;
        assert!(matches!(
            streamer.try_stream(&white(4)).await,
            Err(FireflyError::NoDestination)
        ));
    }

    #[tokio::test]
    async fn destination_can_be_swapped() {
        let first = Arc::new(MemorySink::new());
        let second = Arc::new(MemorySink::new());
        let streamer = PacketStreamer::new(Protocol::Drgb, Some(first.clone()));

        streamer.stream(&white(1)).await;
        streamer.set_destination(Some(second.clone())).await;
        streamer.stream(&white(1)).await;

        assert_eq!(first.packets(), vec![vec![2, 255, 255, 255, 255]]);
        assert_eq!(second.packets().len(), 1);
    }

    #[tokio::test]
    async fn transport_failure_is_swallowed() {
        let streamer = PacketStreamer::new(Protocol::Fragmenting, Some(Arc::new(FailingSink)));
        // Must not panic or surface the error.
        streamer.stream(&white(10)).await;
        assert!(streamer.try_stream(&white(10)).await.is_err());
    }

    #[tokio::test]
    async fn custom_gamma_is_used() {
        let sink = Arc::new(MemorySink::new());
        let streamer = PacketStreamer::new(Protocol::Legacy, Some(sink.clone())).with_gamma(1.0);
        let grey = Frame {
            time: 0.0,
            pixels: vec![Color::rgba16(32768, 32768, 32768, 65535)],
        };
        streamer.stream(&grey).await;
        assert_eq!(sink.packets(), vec![vec![0, 128, 128, 128]]);
    }

    #[test]
    fn protocol_names() {
        let p: Protocol = serde_json::from_str("\"drgb\"").unwrap();
        assert_eq!(p, Protocol::Drgb);
        assert_eq!(Protocol::default(), Protocol::Fragmenting);
    }
}
