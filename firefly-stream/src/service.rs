//! Streaming service core logic.
//!
//! Builds the scanner, pipeline and streamers from a [`StreamConfig`] and
//! drives the pipeline with a wall-clock playback timer until stopped.

use std::error::Error;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use firefly_core::{
    BentTrapezoid, Color, Element, FileSink, FireflyError, OrthogonalRectangle, PacketSink,
    PacketStreamer, Pattern, Pipeline, Point, Scanner, Scene, UdpSink,
};

use crate::config::{StreamConfig, StreamerConfig};

/// Upper bound for the playback rate.
const MAX_FPS: u32 = 240;

// ── StreamService ────────────────────────────────────────────────

/// The top-level streaming service.
pub struct StreamService {
    config: StreamConfig,
    stop: CancellationToken,
}

impl StreamService {
    pub fn new(config: StreamConfig) -> Self {
        Self {
            config,
            stop: CancellationToken::new(),
        }
    }

    /// Obtain a handle that stops the service from another task.
    pub fn stop_handle(&self) -> CancellationToken {
        self.stop.clone()
    }

    pub fn stop(&self) {
        self.stop.cancel();
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Run the service until stopped.
    ///
    /// 1. Loads the scene (JSON file or the demo scene).
    /// 2. Opens one streamer per `[[streamers]]` entry.
    /// 3. Sends the playback time to the pipeline at `fps`.
    /// 4. Returns when stopped or when a non-looping playback ends.
    pub async fn run(&self) -> Result<(), Box<dyn Error>> {
        let scene = match &self.config.playback.scene {
            Some(path) => load_scene(path)?,
            None => demo_scene(),
        };
        info!("scene with {} elements", scene.elements.len());

        let mapping = self.config.to_mapping();
        info!(
            "strip: {} pixels, reversed: {}",
            mapping.total_pixels(),
            mapping.reversed
        );
        let pipeline = Pipeline::new(Scanner::with_mapping(scene.into_shared(), mapping));

        for (index, streamer_config) in self.config.streamers.iter().enumerate() {
            let streamer = open_streamer(index, streamer_config).await?;
            info!("streamer {index}: {:?}", streamer_config.protocol);
            pipeline.add_streamer(streamer);
        }

        let playback = &self.config.playback;
        let fps = playback.fps.clamp(1, MAX_FPS);
        let frame_interval = Duration::from_secs_f64(1.0 / fps as f64);
        let started = Instant::now();

        while !self.stop.is_cancelled() {
            let loop_start = Instant::now();
            let Some(time) = playback.time_at(started.elapsed().as_secs_f64()) else {
                info!("playback reached {}", playback.end);
                break;
            };

            tokio::select! {
                biased;
                _ = self.stop.cancelled() => break,
                sent = pipeline.send(time) => sent?,
            }
            tokio::select! {
                _ = self.stop.cancelled() => break,
                _ = pace(loop_start, frame_interval) => {}
            }
        }

        let frames = pipeline.scan_count();
        pipeline.join().await;
        info!("stream service stopped after {frames} frames");
        Ok(())
    }
}

// ── Internal ─────────────────────────────────────────────────────

/// Sleep for the remainder of the frame interval.
async fn pace(loop_start: Instant, interval: Duration) {
    let elapsed = loop_start.elapsed();
    if elapsed < interval {
        tokio::time::sleep(interval - elapsed).await;
    }
}

fn load_scene(path: &Path) -> Result<Scene, FireflyError> {
    let text = std::fs::read_to_string(path)?;
    Scene::from_json(&text)
}

/// Open the sink named by `config` and wrap it in a streamer.
async fn open_streamer(
    index: usize,
    config: &StreamerConfig,
) -> Result<Arc<PacketStreamer>, FireflyError> {
    let sink: Option<Arc<dyn PacketSink>> = if let Some(address) = &config.address {
        let remote = tokio::net::lookup_host(address.as_str())
            .await?
            .next()
            .ok_or_else(|| FireflyError::Other(format!("address {address} did not resolve")))?;
        let mut udp = UdpSink::connect(remote).await?;
        if config.timeout_ms > 0 {
            udp = udp.with_timeout(Duration::from_millis(config.timeout_ms));
        }
        let sink: Arc<dyn PacketSink> = Arc::new(udp);
        Some(sink)
    } else if let Some(path) = &config.path {
        let sink: Arc<dyn PacketSink> = Arc::new(FileSink::create(path).await?);
        Some(sink)
    } else {
        warn!("streamer {index} has neither address nor path; frames are dropped");
        None
    };
    Ok(Arc::new(
        PacketStreamer::new(config.protocol, sink).with_gamma(config.gamma),
    ))
}

/// Ten seconds of animation on the whole strip.
pub fn demo_scene() -> Scene {
    let backdrop = OrthogonalRectangle::new(Point::new(0.0, 0.0), 1.0, 10.0);
    let sweep = BentTrapezoid::new(Point::new(0.0, 1.0), Point::new(0.7, 6.0), 0.1, 0.3);
    let flash = OrthogonalRectangle::new(Point::new(0.4, 7.0), 0.2, 2.0);

    Scene::new(vec![
        Element::new(
            0.0,
            backdrop,
            Pattern::linear_gradient(Color::rgb8(0, 0, 40), Color::rgb8(40, 0, 20)),
        ),
        Element::new(
            1.0,
            sweep,
            Pattern::linear_gradient(Color::rgb8(255, 160, 0), Color::rgb8(255, 0, 80)),
        ),
        Element::new(2.0, flash, Pattern::solid(Color::rgba8(255, 255, 255, 160))),
    ])
}

// ── Tests ────────────────────────────────────────────────────────
