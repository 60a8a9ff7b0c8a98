//! Scan-and-stream pipeline.
//!
//! ```text
//! send(time) ──► [hand-off] ──► worker: scan(time) ──► streamer 1
//!                                                  ──► streamer 2
//!                                                  ──► …
//!                                                  ──► latest frame (watch)
//! ```
//!
//! One background task per pipeline is the only caller of
//! [`Scanner::scan`], so scans never overlap. The scan itself runs on the
//! blocking pool since it holds the mapping and scene locks.
//! [`Pipeline::send`] returns once the worker has accepted the time value;
//! while the worker is busy the sender waits. Nothing is queued or
//! coalesced beyond that.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::error::FireflyError;
use crate::scanner::{Frame, Scanner};
use crate::streamer::Streamer;

type StreamerList = Arc<Mutex<Vec<Arc<dyn Streamer>>>>;

/// A time value plus the acknowledgement the worker sends on receipt.
struct Update {
    time: f64,
    accepted: oneshot::Sender<()>,
}

// ── Pipeline ─────────────────────────────────────────────────────

/// Owns a scanner, its streamers and the worker task driving them.
///
/// Must be created inside a Tokio runtime.
pub struct Pipeline {
    scanner: Scanner,
    streamers: StreamerList,
    update_tx: mpsc::Sender<Update>,
    latest_rx: watch::Receiver<Option<Arc<Frame>>>,
    scans: Arc<AtomicU64>,
    cancel: CancellationToken,
    worker: JoinHandle<()>,
}

impl Pipeline {
    /// Start a pipeline around `scanner` with no streamers.
    pub fn new(scanner: Scanner) -> Self {
        let (update_tx, update_rx) = mpsc::channel(1);
        let (latest_tx, latest_rx) = watch::channel(None);
        let streamers: StreamerList = Arc::new(Mutex::new(Vec::new()));
        let scans = Arc::new(AtomicU64::new(0));
        let cancel = CancellationToken::new();

        let worker = tokio::spawn(Self::routine(
            scanner.clone(),
            Arc::clone(&streamers),
            update_rx,
            latest_tx,
            Arc::clone(&scans),
            cancel.clone(),
        ));

        Self {
            scanner,
            streamers,
            update_tx,
            latest_rx,
            scans,
            cancel,
            worker,
        }
    }

    /// Start a pipeline with an initial list of streamers.
    pub fn with_streamers(
        scanner: Scanner,
        streamers: impl IntoIterator<Item = Arc<dyn Streamer>>,
    ) -> Self {
        let pipeline = Self::new(scanner);
        for streamer in streamers {
            pipeline.add_streamer(streamer);
        }
        pipeline
    }

    /// Append a streamer. It receives frames from the next cycle on.
    pub fn add_streamer(&self, streamer: Arc<dyn Streamer>) {
        self.streamers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(streamer);
    }

    /// Hand a time value to the worker.
    ///
    /// Waits until the worker has accepted it. Fails with
    /// [`FireflyError::PipelineStopped`] once [`stop`](Self::stop) was
    /// called.
    pub async fn send(&self, time: f64) -> Result<(), FireflyError> {
        if self.cancel.is_cancelled() {
            return Err(FireflyError::PipelineStopped);
        }
        let (accepted, ack) = oneshot::channel();
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(FireflyError::PipelineStopped),
            sent = self.update_tx.send(Update { time, accepted }) => {
                sent.map_err(|_| FireflyError::PipelineStopped)?;
            }
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(FireflyError::PipelineStopped),
            received = ack => received.map_err(|_| FireflyError::PipelineStopped),
        }
    }

    /// The scanner this pipeline drives; use it to swap the mapping.
    pub fn scanner(&self) -> &Scanner {
        &self.scanner
    }

    /// The frame of the most recently completed cycle.
    pub fn latest_frame(&self) -> Option<Arc<Frame>> {
        self.latest_rx.borrow().clone()
    }

    /// Receiver notified after every completed cycle.
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<Frame>>> {
        self.latest_rx.clone()
    }

    /// Number of scans performed so far.
    pub fn scan_count(&self) -> u64 {
        self.scans.load(Ordering::SeqCst)
    }

    /// A token that stops the pipeline when cancelled.
    pub fn stop_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop accepting time values. A cycle already running completes.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Stop the pipeline and wait for the worker to finish.
    pub async fn join(self) {
        self.cancel.cancel();
        if let Err(e) = self.worker.await {
            error!("pipeline worker panicked: {e}");
        }
    }

    // ── Worker ───────────────────────────────────────────────────

    async fn routine(
        scanner: Scanner,
        streamers: StreamerList,
        mut update_rx: mpsc::Receiver<Update>,
        latest_tx: watch::Sender<Option<Arc<Frame>>>,
        scans: Arc<AtomicU64>,
        cancel: CancellationToken,
    ) {
        loop {
            let update = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                update = update_rx.recv() => match update {
                    Some(update) => update,
                    None => break,
                },
            };
            let _ = update.accepted.send(());

            let started = Instant::now();
            let time = update.time;
            let job = scanner.clone();
            let frame = match tokio::task::spawn_blocking(move || job.scan(time)).await {
                Ok(frame) => Arc::new(frame),
                Err(e) => {
                    error!(time, "scan failed: {e}");
                    continue;
                }
            };
            scans.fetch_add(1, Ordering::SeqCst);

            let current: Vec<Arc<dyn Streamer>> = streamers
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();
            for streamer in &current {
                streamer.stream(&frame).await;
            }

            debug!(
                time = update.time,
                pixels = frame.pixels.len(),
                streamers = current.len(),
                elapsed_us = started.elapsed().as_micros() as u64,
                "pipeline cycle"
            );
            latest_tx.send_replace(Some(frame));
        }
        debug!("pipeline worker stopped");
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use crate::geometry::Point;
    use crate::scene::{Element, OrthogonalRectangle, Pattern, Scene};
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::sync::Notify;

    /// Records the time of every frame it sees.
    #[derive(Default)]
    struct Recorder {
        times: Mutex<Vec<f64>>,
    }

    #[async_trait]
    impl Streamer for Recorder {
        async fn stream(&self, frame: &Frame) {
            self.times.lock().unwrap().push(frame.time);
        }
    }

    fn scanner() -> Scanner {
        let rect = OrthogonalRectangle::new(Point::new(0.0, 0.0), 1.0, 10.0);
        let scene = Scene::new(vec![Element::new(0.0, rect, Pattern::solid(Color::WHITE))]);
        Scanner::new(scene.into_shared(), 6)
    }

    async fn next_frame(rx: &mut watch::Receiver<Option<Arc<Frame>>>) -> Arc<Frame> {
        tokio::time::timeout(Duration::from_secs(5), rx.changed())
            .await
            .expect("timeout")
            .expect("worker gone");
        rx.borrow_and_update().clone().expect("frame")
    }

    #[tokio::test]
    async fn sequential_sends_scan_each_time() {
        let recorder = Arc::new(Recorder::default());
        let pipeline = Pipeline::new(scanner());
        pipeline.add_streamer(recorder.clone());
        let mut rx = pipeline.subscribe();

        for (i, t) in [1.0, 2.0, 3.5].into_iter().enumerate() {
            pipeline.send(t).await.unwrap();
            let frame = next_frame(&mut rx).await;
            assert_eq!(frame.time, t);
            assert_eq!(pipeline.scan_count(), i as u64 + 1);
            assert_eq!(pipeline.latest_frame().unwrap().time, t);
        }
        assert_eq!(*recorder.times.lock().unwrap(), vec![1.0, 2.0, 3.5]);
        pipeline.join().await;
    }

    #[tokio::test]
    async fn streamers_run_in_registration_order() {
        struct Tagged(u8, Arc<Mutex<Vec<u8>>>);

        #[async_trait]
        impl Streamer for Tagged {
            async fn stream(&self, _frame: &Frame) {
                self.1.lock().unwrap().push(self.0);
            }
        }

        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::with_streamers(
            scanner(),
            [
                Arc::new(Tagged(1, log.clone())) as Arc<dyn Streamer>,
                Arc::new(Tagged(2, log.clone())),
            ],
        );
        pipeline.add_streamer(Arc::new(Tagged(3, log.clone())));
        let mut rx = pipeline.subscribe();

        pipeline.send(0.5).await.unwrap();
        next_frame(&mut rx).await;
        assert_eq!(*log.lock().unwrap(), vec![1, 2, 3]);
    }

    /// Signals when streaming starts, then holds the cycle until released.
    #[derive(Default)]
    struct Gate {
        started: Notify,
        release: Notify,
    }

    #[async_trait]
    impl Streamer for Gate {
        async fn stream(&self, _frame: &Frame) {
            self.started.notify_one();
            self.release.notified().await;
        }
    }

    #[tokio::test]
    async fn busy_worker_holds_senders_and_finishes_cycle_on_stop() {
        let gate = Arc::new(Gate::default());
        let pipeline = Arc::new(Pipeline::new(scanner()));
        pipeline.add_streamer(gate.clone());
        let mut rx = pipeline.subscribe();

        pipeline.send(1.0).await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), gate.started.notified())
            .await
            .expect("streamer never ran");

        // The worker is mid-stream, so a second time value is not accepted.
        let second = tokio::spawn({
            let pipeline = Arc::clone(&pipeline);
            async move { pipeline.send(2.0).await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!second.is_finished());

        pipeline.stop();
        let rejected = tokio::time::timeout(Duration::from_secs(5), second)
            .await
            .expect("timeout")
            .unwrap();
        assert!(matches!(rejected, Err(FireflyError::PipelineStopped)));
        assert!(pipeline.latest_frame().is_none());

        // The running cycle still completes and publishes its frame.
        gate.release.notify_one();
        let frame = next_frame(&mut rx).await;
        assert_eq!(frame.time, 1.0);
        assert_eq!(pipeline.scan_count(), 1);
    }

    #[tokio::test]
    async fn send_after_stop_fails() {
        let pipeline = Pipeline::new(scanner());
        pipeline.stop();
        assert!(pipeline.is_stopped());
        assert!(matches!(
            pipeline.send(1.0).await,
            Err(FireflyError::PipelineStopped)
        ));
        pipeline.join().await;
    }

    #[tokio::test]
    async fn mapping_swap_applies_to_next_scan() {
        let pipeline = Pipeline::new(scanner());
        let mut rx = pipeline.subscribe();

        pipeline.send(1.0).await.unwrap();
        assert_eq!(next_frame(&mut rx).await.pixels.len(), 6);

        pipeline
            .scanner()
            .set_mapping(crate::mapping::Mapping::from_stops(1, 1, [(1.0, 4)]));
        pipeline.send(1.0).await.unwrap();
        let frame = next_frame(&mut rx).await;
        assert_eq!(frame.pixels.len(), 6);
        assert_eq!(frame.pixels[0], Color::BLACK);
        assert_eq!(frame.pixels[1], Color::WHITE);
    }
}
