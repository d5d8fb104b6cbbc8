//! Frame driver — the cooperative per-frame loop that owns a session.
//!
//! One tokio task runs the whole session: each tick grabs a frame, runs
//! detection, advances the engagement state machine, dispatches captures,
//! and paints the overlay. All session state is owned by that task, so
//! there are no concurrent writers and frame N is fully applied before
//! frame N+1 starts.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use lumicam_core::{AlignmentThresholds, Engagement, EngagementEvent, Landmark};
use lumicam_video::VideoSource;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::MissedTickBehavior;

use crate::capture::{self, CaptureArtifact, CaptureTrigger};
use crate::provider::LandmarkProvider;
use crate::sink::{AnalysisUploader, PersistSink};

/// Frames to wait between re-attempts at persisting a capture whose save
/// failed. One second at the default frame rate.
const RETRY_BACKOFF_FRAMES: u32 = 30;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("capture failed: {0}")]
    Capture(String),
    #[error("session task exited")]
    ChannelClosed,
}

/// The tuple the session exposes upward to presentation components.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct UiStatus {
    pub is_camera_on: bool,
    pub is_locked: bool,
    pub status_message: String,
}

impl UiStatus {
    fn camera_off() -> Self {
        Self {
            is_camera_on: false,
            is_locked: false,
            status_message: "Camera off".to_string(),
        }
    }
}

/// Paints the animated mesh while the session is locked.
pub trait OverlayRenderer: Send {
    /// `elapsed` is the time since the overlay locked, driving the
    /// animation phase.
    fn render(&mut self, landmarks: &[Landmark], elapsed: Duration);
}

/// Renderer that traces overlay frames; stands in for the kiosk UI.
pub struct LogRenderer;

impl OverlayRenderer for LogRenderer {
    fn render(&mut self, landmarks: &[Landmark], elapsed: Duration) {
        tracing::trace!(
            points = landmarks.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "overlay frame"
        );
    }
}

/// Messages from callers into the session task.
enum SessionCommand {
    /// Explicit user capture: grab, persist, reply with the stored path.
    Capture {
        reply: oneshot::Sender<Result<PathBuf, String>>,
    },
    Shutdown,
}

/// Clone-free handle to a running session.
pub struct SessionHandle {
    cmd: mpsc::Sender<SessionCommand>,
    status: watch::Receiver<UiStatus>,
    task: tokio::task::JoinHandle<()>,
}

impl SessionHandle {
    /// Watch the `{is_camera_on, is_locked, status_message}` tuple.
    pub fn status(&self) -> watch::Receiver<UiStatus> {
        self.status.clone()
    }

    /// Trigger a manual capture; resolves with the persisted path.
    pub async fn capture_now(&self) -> Result<PathBuf, SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd
            .send(SessionCommand::Capture { reply: reply_tx })
            .await
            .map_err(|_| SessionError::ChannelClosed)?;
        reply_rx
            .await
            .map_err(|_| SessionError::ChannelClosed)?
            .map_err(SessionError::Capture)
    }

    /// Stop the session: the pending tick is cancelled, in-flight frame
    /// work completes, state is reset, and the video source is released.
    pub async fn stop(self) -> Result<(), SessionError> {
        let _ = self.cmd.send(SessionCommand::Shutdown).await;
        self.task.await.map_err(|_| SessionError::ChannelClosed)
    }
}

/// Spawn the session driver on the runtime.
///
/// Resource acquisition (capture directory, upload client) happens before
/// this call so startup failures surface immediately; everything after is
/// non-fatal by design.
pub fn spawn_session<S, P, R>(
    source: S,
    provider: P,
    renderer: R,
    persist: PersistSink,
    uploader: Option<AnalysisUploader>,
    frame_interval: Duration,
) -> SessionHandle
where
    S: VideoSource + 'static,
    P: LandmarkProvider + 'static,
    R: OverlayRenderer + 'static,
{
    let (cmd_tx, cmd_rx) = mpsc::channel(4);
    let (status_tx, status_rx) = watch::channel(UiStatus::camera_off());

    let session = Session {
        source,
        provider,
        renderer,
        engagement: Engagement::new(AlignmentThresholds::default()),
        persist,
        uploader,
        status_tx,
        frame_interval,
        capture_note: None,
        retained: None,
        retry_in: 0,
        seen_frame: false,
    };

    let task = tokio::spawn(session.run(cmd_rx));

    SessionHandle {
        cmd: cmd_tx,
        status: status_rx,
        task,
    }
}

struct Session<S, P, R> {
    source: S,
    provider: P,
    renderer: R,
    engagement: Engagement,
    persist: PersistSink,
    uploader: Option<AnalysisUploader>,
    status_tx: watch::Sender<UiStatus>,
    frame_interval: Duration,
    /// Overrides the engagement prompt after a degraded capture outcome;
    /// cleared when the machine reverts to the guide.
    capture_note: Option<&'static str>,
    /// Capture whose save failed, kept so the session's one-shot
    /// auto-capture survives a transient storage fault.
    retained: Option<CaptureArtifact>,
    /// Frames until the next retained-capture save attempt.
    retry_in: u32,
    /// Whether the source has delivered at least one frame.
    seen_frame: bool,
}

impl<S, P, R> Session<S, P, R>
where
    S: VideoSource,
    P: LandmarkProvider,
    R: OverlayRenderer,
{
    async fn run(mut self, mut cmd_rx: mpsc::Receiver<SessionCommand>) {
        let mut ticker = tokio::time::interval(self.frame_interval);
        // A slow frame must delay the next tick, not queue a burst of
        // overlapping iterations.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(interval_ms = self.frame_interval.as_millis() as u64, "session started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.step(Instant::now()).await;
                }
                cmd = cmd_rx.recv() => match cmd {
                    Some(SessionCommand::Capture { reply }) => {
                        let _ = reply.send(self.manual_capture().await);
                    }
                    Some(SessionCommand::Shutdown) | None => break,
                },
            }
        }

        // Last chance to land a capture stuck behind a storage fault.
        self.flush_retained().await;

        // Stale counters and the auto-capture latch must not leak into the
        // next camera session.
        self.engagement.reset();
        self.status_tx.send_replace(UiStatus::camera_off());
        tracing::info!("session stopped");
    }

    /// One frame: grab, detect, advance, maybe capture, maybe render.
    async fn step(&mut self, now: Instant) {
        let frame = match self.source.grab() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                tracing::trace!("video source not ready, skipping frame");
                // The camera is live while the source warms up; tell the
                // UI so it does not sit on "Camera off".
                if !self.seen_frame {
                    self.publish(UiStatus {
                        is_camera_on: true,
                        is_locked: false,
                        status_message: "Starting camera".to_string(),
                    });
                }
                return;
            }
            Err(err) => {
                tracing::warn!(error = %err, "frame grab failed, skipping frame");
                return;
            }
        };
        self.seen_frame = true;

        // Provider failures degrade to "no face" and never stop the loop.
        let detection = match self.provider.detect(&frame) {
            Ok(detection) => detection,
            Err(err) => {
                tracing::debug!(error = %err, "detection failed, treating as no landmarks");
                None
            }
        };

        match self.engagement.advance(detection, now) {
            Some(EngagementEvent::Locked) => {
                tracing::info!(sequence = frame.sequence, "face locked");
            }
            Some(EngagementEvent::Reverted) => {
                tracing::info!("tracking lost, reverting to guide");
                self.capture_note = None;
            }
            Some(EngagementEvent::AutoCapture) => {
                tracing::info!(sequence = frame.sequence, "auto-capture triggered");
                self.auto_capture(&frame).await;
            }
            None => {}
        }

        if self.engagement.is_locked() {
            if let (Some(landmarks), Some(elapsed)) = (
                self.engagement.overlay_landmarks(),
                self.engagement.lock_elapsed(now),
            ) {
                self.renderer.render(landmarks, elapsed);
            }
        }

        self.publish_status();

        if self.retained.is_some() {
            if self.retry_in == 0 {
                self.flush_retained().await;
            } else {
                self.retry_in -= 1;
            }
        }
    }

    /// One-shot capture fired by the engagement machine: persist, then
    /// upload when a sink is configured. Every failure here is non-fatal.
    async fn auto_capture(&mut self, frame: &lumicam_video::Frame) {
        let artifact = match capture::capture_frame(frame) {
            Ok(artifact) => artifact,
            Err(err) => {
                tracing::warn!(error = %err, "auto-capture rasterization failed");
                self.capture_note = Some("Capture failed, hold steady");
                return;
            }
        };

        let saved = match self.persist.store(&artifact).await {
            Ok(path) => {
                tracing::info!(path = %path.display(), "auto-capture saved");
                true
            }
            Err(err) => {
                tracing::warn!(error = %err, "auto-capture save failed, keeping photo for retry");
                false
            }
        };

        if let Some(uploader) = &self.uploader {
            match uploader.upload(&artifact, CaptureTrigger::Auto).await {
                Ok(receipt) => tracing::info!(
                    file_id = receipt.file_id.as_deref().unwrap_or("-"),
                    "analysis upload accepted"
                ),
                Err(err) => {
                    tracing::warn!(error = %err, "analysis upload failed");
                    self.capture_note = Some("Upload failed, photo saved locally");
                }
            }
        }

        if !saved {
            self.capture_note = Some("Save failed, photo kept for retry");
            self.retain(artifact);
        }
    }

    /// Explicit user capture: persist only, report the outcome to the
    /// caller as status text rather than a session failure.
    async fn manual_capture(&mut self) -> Result<PathBuf, String> {
        // A capture stuck behind an earlier storage fault gets the first
        // attempt at a recovered disk.
        self.flush_retained().await;

        let frame = match self.source.grab() {
            Ok(Some(frame)) => frame,
            Ok(None) => return Err("video source not ready".to_string()),
            Err(err) => return Err(err.to_string()),
        };

        let artifact = capture::capture_frame(&frame).map_err(|e| e.to_string())?;
        match self.persist.store(&artifact).await {
            Ok(path) => {
                tracing::info!(
                    path = %path.display(),
                    trigger = CaptureTrigger::Manual.as_str(),
                    "manual capture saved"
                );
                Ok(path)
            }
            Err(err) => {
                tracing::warn!(error = %err, "manual capture save failed, keeping photo for retry");
                let message = format!("save failed: {err}; photo kept for retry");
                self.retain(artifact);
                Err(message)
            }
        }
    }

    /// Keep an artifact whose save failed and schedule a retry. An already
    /// retained capture has first claim and is never evicted.
    fn retain(&mut self, artifact: CaptureArtifact) {
        if self.retained.is_none() {
            self.retained = Some(artifact);
        }
        self.retry_in = RETRY_BACKOFF_FRAMES;
    }

    /// Re-attempt persisting the retained capture, putting it back on
    /// failure so the photo is never dropped while the session runs.
    async fn flush_retained(&mut self) {
        let Some(artifact) = self.retained.take() else {
            return;
        };
        match self.persist.store(&artifact).await {
            Ok(path) => {
                tracing::info!(path = %path.display(), "retained capture saved");
                self.capture_note = None;
            }
            Err(err) => {
                tracing::warn!(error = %err, "retained capture save failed");
                self.retained = Some(artifact);
                self.retry_in = RETRY_BACKOFF_FRAMES;
            }
        }
    }

    fn publish_status(&self) {
        self.publish(UiStatus {
            is_camera_on: true,
            is_locked: self.engagement.is_locked(),
            status_message: self
                .capture_note
                .unwrap_or_else(|| self.engagement.status_message())
                .to_string(),
        });
    }

    fn publish(&self, status: UiStatus) {
        // Only notify watchers on a real change; per-frame sends would wake
        // the UI at the full frame rate.
        self.status_tx.send_if_modified(|current| {
            if *current != status {
                *current = status;
                true
            } else {
                false
            }
        });
    }
}
