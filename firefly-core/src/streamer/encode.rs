//! Wire encoders for each streaming protocol.
//!
//! ## Legacy (v0)
//! ```text
//! type:     u8 = 0
//! pixels:   [r g b] × n    gamma corrected
//! ```
//!
//! ## Fragmenting (v1)
//! ```text
//! type:          u8 = 1
//! header_len:    u8
//! header:        [u8; header_len]   first packet only:
//!                                     0x00, total_pixels: u16 LE
//! pixel_offset:  u16 LE
//! payload_len:   u16 LE             3 × pixels in this packet
//! payload:       [r g b] × ≤ 300    gamma corrected
//! ```
//!
//! ## DRGB
//! ```text
//! protocol:  u8 = 2
//! timeout:   u8 = 255   hold the frame until the next one
//! pixels:    [r g b] × n    raw
//! ```
//!
//! ## Diagnostic
//! ```text
//! length:  u32 BE
//! frame:   bincode(Frame)
//! ```

use bytes::{BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder, LengthDelimitedCodec};
use tracing::error;

use crate::error::FireflyError;
use crate::scanner::Frame;

// ── Constants ────────────────────────────────────────────────────

/// Packet type tag of the single-packet legacy protocol.
pub const LEGACY_PACKET_TYPE: u8 = 0;

/// Packet type tag of the fragmenting protocol.
pub const FRAGMENT_PACKET_TYPE: u8 = 1;

/// Pixels carried by one fragmenting packet at most.
pub const MAX_PIXELS_PER_PACKET: usize = 300;

/// Header field tag for the total pixel count.
const HEADER_FIELD_TOTAL_PIXELS: u8 = 0;

/// DRGB protocol id.
pub const DRGB_PROTOCOL_ID: u8 = 2;

/// DRGB timeout value meaning "keep this frame until told otherwise".
pub const DRGB_HOLD: u8 = 255;

// ── Legacy ───────────────────────────────────────────────────────

/// Encode the whole frame into one legacy packet.
pub fn encode_legacy(frame: &Frame, gamma: f64) -> Bytes {
    let mut packet = BytesMut::with_capacity(1 + 3 * frame.pixels.len());
    packet.put_u8(LEGACY_PACKET_TYPE);
    for pixel in &frame.pixels {
        packet.put_slice(&pixel.to_rgb8_gamma(gamma));
    }
    packet.freeze()
}

// ── Fragmenting ──────────────────────────────────────────────────

/// Split the frame into packets of at most [`MAX_PIXELS_PER_PACKET`]
/// pixels. Only the first packet carries the frame header.
///
/// Pixels whose offset does not fit the `u16` offset field are not sent,
/// and a total that does not fit is left out of the header.
pub fn encode_fragments(frame: &Frame, gamma: f64) -> Vec<Bytes> {
    frame
        .pixels
        .chunks(MAX_PIXELS_PER_PACKET)
        .enumerate()
        .filter_map(|(index, chunk)| {
            let offset = index * MAX_PIXELS_PER_PACKET;
            let Ok(pixel_offset) = u16::try_from(offset) else {
                error!(
                    offset,
                    pixels = frame.pixels.len(),
                    "streamer: pixel offset exceeds u16; fragment dropped"
                );
                return None;
            };
            let mut packet = BytesMut::with_capacity(6 + 3 * chunk.len());
            packet.put_u8(FRAGMENT_PACKET_TYPE);
            if index == 0 {
                put_header(&mut packet, &frame_header(frame));
            } else {
                packet.put_u8(0);
            }
            packet.put_u16_le(pixel_offset);
            // At most 3 × MAX_PIXELS_PER_PACKET, well within u16.
            packet.put_u16_le((chunk.len() * 3) as u16);
            for pixel in chunk {
                packet.put_slice(&pixel.to_rgb8_gamma(gamma));
            }
            Some(packet.freeze())
        })
        .collect()
}

/// Frame-level metadata sent in the first fragment. Empty when the pixel
/// count does not fit its `u16` field.
fn frame_header(frame: &Frame) -> Bytes {
    let Ok(total) = u16::try_from(frame.pixels.len()) else {
        error!(
            pixels = frame.pixels.len(),
            "streamer: total pixel count exceeds u16; header field dropped"
        );
        return Bytes::new();
    };
    let mut header = BytesMut::with_capacity(3);
    header.put_u8(HEADER_FIELD_TOTAL_PIXELS);
    header.put_u16_le(total);
    header.freeze()
}

/// Write `header_len` followed by `header`.
///
/// A header that does not fit the length byte is dropped and a zero
/// length is written so the pixel data still goes out.
fn put_header(packet: &mut BytesMut, header: &[u8]) {
    match u8::try_from(header.len()) {
        Ok(len) => {
            packet.put_u8(len);
            packet.put_slice(header);
        }
        Err(_) => {
            let e = FireflyError::HeaderTooLarge { size: header.len() };
            error!("streamer: first packet header dropped: {e}");
            packet.put_u8(0);
        }
    }
}

// ── DRGB ─────────────────────────────────────────────────────────

/// Encode the frame as one DRGB packet. No gamma correction is applied;
/// the controller does that itself.
pub fn encode_drgb(frame: &Frame) -> Bytes {
    let mut packet = BytesMut::with_capacity(2 + 3 * frame.pixels.len());
    packet.put_u8(DRGB_PROTOCOL_ID);
    packet.put_u8(DRGB_HOLD);
    for pixel in &frame.pixels {
        packet.put_slice(&pixel.to_rgb8());
    }
    packet.freeze()
}

// ── Diagnostic ───────────────────────────────────────────────────

/// Serialize the whole frame as one length-delimited bincode record.
pub fn encode_diagnostic(frame: &Frame) -> Result<Bytes, FireflyError> {
    let payload = bincode::serialize(frame)?;
    let mut record = BytesMut::with_capacity(4 + payload.len());
    LengthDelimitedCodec::new().encode(Bytes::from(payload), &mut record)?;
    Ok(record.freeze())
}

/// Read back every frame of a diagnostic capture.
pub fn decode_capture(capture: &[u8]) -> Result<Vec<Frame>, FireflyError> {
    let mut codec = LengthDelimitedCodec::new();
    let mut buffer = BytesMut::from(capture);
    let mut frames = Vec::new();
    while let Some(record) = codec.decode(&mut buffer)? {
        frames.push(bincode::deserialize(&record)?);
    }
    if !buffer.is_empty() {
        return Err(FireflyError::Encoding(format!(
            "truncated capture: {} trailing bytes",
            buffer.len()
        )));
    }
    Ok(frames)
}

// ── Tests ────────────────────────────────────────────────────────
