//! Hardware stream ownership and drainable turn buffers.
//!
//! A `MediaCapture` goes through three steps: `request_permissions` acquires
//! the devices, `start_continuous_capture` starts the audio encoder and the
//! frame timer, and `end_session` releases everything. Between the last two,
//! `capture_current_buffer` may be called any number of times to drain what
//! accumulated since the previous turn while capture keeps running.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;

use super::error::CaptureError;
use super::frames::{Frame, FrameRing, DEFAULT_FRAME_CAPACITY};
use super::platform::{
    AudioEncoder, ChunkSink, EncoderFactory, MediaConstraints, MediaDevices, MediaStream,
    PreviewSink, VideoConstraints,
};

/// Timing and sizing knobs for a capture session.
#[derive(Debug, Clone)]
pub struct CaptureSettings {
    /// Requested camera geometry
    pub video: VideoConstraints,
    /// Period of the frame-capture timer
    pub frame_interval: Duration,
    /// Number of recent frames kept between turns
    pub frame_capacity: usize,
    /// Longest gap between encoder chunk emissions
    pub timeslice: Duration,
    /// Upper bound on waiting for an encoder flush acknowledgement
    pub flush_timeout: Duration,
    /// JPEG quality for rasterized frames (0-100)
    pub jpeg_quality: u8,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            video: VideoConstraints::default(),
            frame_interval: Duration::from_millis(500),
            frame_capacity: DEFAULT_FRAME_CAPACITY,
            timeslice: Duration::from_millis(1000),
            flush_timeout: Duration::from_millis(500),
            jpeg_quality: 80,
        }
    }
}

/// Everything captured for one turn.
#[derive(Debug, Clone)]
pub struct TurnBuffer {
    /// Assembled audio blob; empty when nothing was recorded
    pub audio: Vec<u8>,
    /// MIME type of `audio`
    pub mime_type: String,
    /// Upload file name for `audio`
    pub file_name: String,
    /// Frames captured since the previous turn, oldest first
    pub frames: Vec<Frame>,
    /// When the buffer was drained
    pub captured_at: DateTime<Utc>,
}

impl TurnBuffer {
    pub fn has_audio(&self) -> bool {
        !self.audio.is_empty()
    }
}

/// Accumulated data between two drains.
#[derive(Debug)]
struct CaptureBuffers {
    audio_chunks: Vec<Vec<u8>>,
    frames: FrameRing,
}

/// Owns one live hardware acquisition and its buffers.
pub struct MediaCapture {
    devices: Arc<dyn MediaDevices>,
    encoders: Arc<dyn EncoderFactory>,
    settings: CaptureSettings,
    stream: Option<MediaStream>,
    encoder: Option<Box<dyn AudioEncoder>>,
    buffers: Arc<Mutex<CaptureBuffers>>,
    frame_timer: Option<JoinHandle<()>>,
}

impl MediaCapture {
    pub fn new(
        devices: Arc<dyn MediaDevices>,
        encoders: Arc<dyn EncoderFactory>,
        settings: CaptureSettings,
    ) -> Self {
        let buffers = CaptureBuffers {
            audio_chunks: Vec::new(),
            frames: FrameRing::new(settings.frame_capacity),
        };
        Self {
            devices,
            encoders,
            settings,
            stream: None,
            encoder: None,
            buffers: Arc::new(Mutex::new(buffers)),
            frame_timer: None,
        }
    }

    /// Asks the platform for simultaneous audio and video access.
    ///
    /// Only stores the stream; nothing is encoded or captured yet. A stream
    /// left over from an earlier call is released first.
    ///
    /// # Errors
    /// - `PermissionDenied` if the platform declines access
    pub async fn request_permissions(&mut self) -> Result<(), CaptureError> {
        tracing::info!("Requesting camera and microphone permissions");
        let constraints = MediaConstraints::audio_video(self.settings.video);

        let stream = self
            .devices
            .get_user_media(&constraints)
            .await
            .inspect_err(|e| tracing::error!("Permission request failed: {}", e))?;

        tracing::debug!("Media stream acquired: {:?}", stream);
        if let Some(previous) = self.stream.replace(stream) {
            previous.stop_all();
        }
        Ok(())
    }

    /// Starts the audio encoder and the frame timer over the acquired stream.
    ///
    /// Frames are only captured when a preview sink is given, since frames are
    /// rasterized from the preview.
    ///
    /// # Errors
    /// - `NotReady` if `request_permissions` has not succeeded
    /// - `NoAudioDevice` if the stream has no audio track
    /// - `Encoder` if the encoder cannot be created or started
    pub fn start_continuous_capture(
        &mut self,
        preview: Option<Arc<dyn PreviewSink>>,
    ) -> Result<(), CaptureError> {
        let Some(stream) = self.stream.as_ref() else {
            tracing::error!("No media stream. Call request_permissions first.");
            return Err(CaptureError::NotReady);
        };

        if self.is_running() {
            tracing::warn!("Continuous capture already running");
            return Ok(());
        }

        if let Some(preview) = preview.as_ref() {
            preview.attach(stream);
        }

        let audio = stream.audio_only();
        tracing::info!("Continuous mode: found {} audio tracks", audio.tracks().len());
        if audio.tracks().is_empty() {
            tracing::error!("No audio track found in media stream");
            return Err(CaptureError::NoAudioDevice);
        }

        let mut encoder = self.encoders.create(&audio)?;

        {
            let mut buffers = self.lock_buffers();
            buffers.audio_chunks.clear();
            buffers.frames.reset();
        }

        let sink_buffers = Arc::clone(&self.buffers);
        let sink: ChunkSink = Arc::new(move |chunk: Vec<u8>| {
            if !chunk.is_empty() {
                sink_buffers
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .audio_chunks
                    .push(chunk);
            }
        });
        encoder.start(self.settings.timeslice, sink)?;
        self.encoder = Some(encoder);

        if let Some(preview) = preview {
            self.frame_timer = Some(self.spawn_frame_timer(preview));
        }

        tracing::info!("Continuous capture started: audio + video frames");
        Ok(())
    }

    /// Drains everything captured since the previous turn.
    ///
    /// Returns `None` when no encoder is running. The encoder and the frame
    /// timer keep running afterwards.
    ///
    /// # Errors
    /// - `Encoder` if the drained chunks cannot be assembled into a blob
    pub async fn capture_current_buffer(&mut self) -> Result<Option<TurnBuffer>, CaptureError> {
        let Some(encoder) = self.encoder.as_mut().filter(|e| e.is_active()) else {
            tracing::warn!("No active recording to capture buffer from");
            return Ok(None);
        };

        match tokio::time::timeout(self.settings.flush_timeout, encoder.request_data()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!("Encoder flush failed: {}", e),
            Err(_) => tracing::warn!(
                "Encoder flush not acknowledged within {}ms; draining what has arrived",
                self.settings.flush_timeout.as_millis()
            ),
        }

        let (chunks, frames) = {
            let mut buffers = self.buffers.lock().unwrap_or_else(PoisonError::into_inner);
            let chunks = std::mem::take(&mut buffers.audio_chunks);
            (chunks, buffers.frames.drain())
        };

        let audio = encoder.assemble(chunks)?;
        let turn = TurnBuffer {
            audio,
            mime_type: encoder.mime_type().to_string(),
            file_name: encoder.file_name().to_string(),
            frames,
            captured_at: Utc::now(),
        };

        tracing::info!(
            "Buffer captured. Audio size: {}, frames: {}",
            turn.audio.len(),
            turn.frames.len()
        );
        Ok(Some(turn))
    }

    /// Stops the timer and the encoder, releases every track and clears the
    /// buffers. Safe to call in any state, any number of times.
    pub fn end_session(&mut self) {
        if self.stream.is_none() && self.encoder.is_none() && self.frame_timer.is_none() {
            return;
        }
        tracing::info!("Ending continuous capture session");

        if let Some(timer) = self.frame_timer.take() {
            timer.abort();
        }

        if let Some(mut encoder) = self.encoder.take() {
            if encoder.is_active() {
                encoder.stop();
            }
        }

        if let Some(stream) = self.stream.take() {
            stream.stop_all();
        }

        {
            let mut buffers = self.lock_buffers();
            buffers.audio_chunks.clear();
            buffers.frames.reset();
        }

        tracing::info!("Session ended. All capture resources released.");
    }

    /// Whether a stream has been acquired and not yet released.
    pub fn has_stream(&self) -> bool {
        self.stream.is_some()
    }

    /// Whether the encoder is currently producing chunks.
    pub fn is_running(&self) -> bool {
        self.encoder.as_ref().is_some_and(|e| e.is_active())
    }

    pub fn settings(&self) -> &CaptureSettings {
        &self.settings
    }

    fn spawn_frame_timer(&self, preview: Arc<dyn PreviewSink>) -> JoinHandle<()> {
        let buffers = Arc::clone(&self.buffers);
        let period = self.settings.frame_interval;
        let quality = self.settings.jpeg_quality;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately; frames start one period in.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Some(jpeg) = preview.grab_jpeg(quality) {
                    buffers
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .frames
                        .push(jpeg);
                }
            }
        })
    }

    fn lock_buffers(&self) -> MutexGuard<'_, CaptureBuffers> {
        self.buffers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for MediaCapture {
    fn drop(&mut self) {
        self.end_session();
    }
}
