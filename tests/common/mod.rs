//! In-memory implementations of the capture platform traits.

#![allow(dead_code)]

use std::any::Any;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use hybridbot::capture::{
    AudioEncoder, CaptureError, CaptureSettings, ChunkSink, EncoderFactory, MediaCapture,
    MediaConstraints, MediaDevices, MediaStream, MediaTrack, PreviewSink, TrackKind,
};

pub struct FakeTrack {
    kind: TrackKind,
    live: AtomicBool,
    pub stops: AtomicUsize,
}

impl FakeTrack {
    pub fn new(kind: TrackKind) -> Arc<Self> {
        Arc::new(Self {
            kind,
            live: AtomicBool::new(true),
            stops: AtomicUsize::new(0),
        })
    }
}

impl MediaTrack for FakeTrack {
    fn kind(&self) -> TrackKind {
        self.kind
    }

    fn label(&self) -> String {
        format!("fake {:?}", self.kind)
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    fn stop(&self) {
        self.live.store(false, Ordering::SeqCst);
        self.stops.fetch_add(1, Ordering::SeqCst);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceBehavior {
    Grant,
    Deny,
    NoMicrophone,
}

/// Hands out fresh fake tracks and remembers them for inspection.
pub struct FakeDevices {
    behavior: DeviceBehavior,
    pub requests: AtomicUsize,
    pub issued: Mutex<Vec<Arc<FakeTrack>>>,
}

impl FakeDevices {
    pub fn new(behavior: DeviceBehavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            requests: AtomicUsize::new(0),
            issued: Mutex::new(Vec::new()),
        })
    }

    pub fn issued(&self) -> Vec<Arc<FakeTrack>> {
        self.issued.lock().unwrap().clone()
    }

    pub fn all_released(&self) -> bool {
        self.issued().iter().all(|t| !t.is_live())
    }
}

#[async_trait]
impl MediaDevices for FakeDevices {
    async fn get_user_media(
        &self,
        _constraints: &MediaConstraints,
    ) -> Result<MediaStream, CaptureError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let kinds: &[TrackKind] = match self.behavior {
            DeviceBehavior::Deny => {
                return Err(CaptureError::PermissionDenied("NotAllowedError".to_string()))
            }
            DeviceBehavior::NoMicrophone => &[TrackKind::Video],
            DeviceBehavior::Grant => &[TrackKind::Audio, TrackKind::Video],
        };

        let tracks: Vec<Arc<FakeTrack>> = kinds.iter().map(|k| FakeTrack::new(*k)).collect();
        self.issued.lock().unwrap().extend(tracks.iter().cloned());
        Ok(MediaStream::new(
            tracks
                .into_iter()
                .map(|t| t as Arc<dyn MediaTrack>)
                .collect(),
        ))
    }
}

/// Shared view into the encoders a factory has built.
///
/// `speak` queues bytes the next flush will emit; `emit` delivers a chunk
/// right away, as a timeslice would.
#[derive(Default)]
pub struct EncoderProbe {
    pending: Mutex<Vec<u8>>,
    sink: Mutex<Option<ChunkSink>>,
    pub flushes: AtomicUsize,
    pub stops: AtomicUsize,
    pub hang_on_flush: AtomicBool,
}

impl EncoderProbe {
    pub fn speak(&self, bytes: &[u8]) {
        self.pending.lock().unwrap().extend_from_slice(bytes);
    }

    pub fn emit(&self, bytes: &[u8]) {
        let sink = self.sink.lock().unwrap().clone().expect("encoder not started");
        sink(bytes.to_vec());
    }
}

pub struct FakeEncoder {
    probe: Arc<EncoderProbe>,
    active: bool,
}

#[async_trait]
impl AudioEncoder for FakeEncoder {
    fn mime_type(&self) -> &str {
        "audio/wav"
    }

    fn file_name(&self) -> &str {
        "input.wav"
    }

    fn start(&mut self, _timeslice: Duration, sink: ChunkSink) -> Result<(), CaptureError> {
        *self.probe.sink.lock().unwrap() = Some(sink);
        self.active = true;
        Ok(())
    }

    async fn request_data(&mut self) -> Result<(), CaptureError> {
        self.probe.flushes.fetch_add(1, Ordering::SeqCst);
        if self.probe.hang_on_flush.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        let chunk = std::mem::take(&mut *self.probe.pending.lock().unwrap());
        let sink = self.probe.sink.lock().unwrap().clone();
        if let Some(sink) = sink {
            sink(chunk);
        }
        Ok(())
    }

    fn stop(&mut self) {
        self.active = false;
        self.probe.stops.fetch_add(1, Ordering::SeqCst);
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn assemble(&self, chunks: Vec<Vec<u8>>) -> Result<Vec<u8>, CaptureError> {
        Ok(chunks.concat())
    }
}

pub struct FakeEncoderFactory {
    pub probe: Arc<EncoderProbe>,
}

impl EncoderFactory for FakeEncoderFactory {
    fn create(&self, audio: &MediaStream) -> Result<Box<dyn AudioEncoder>, CaptureError> {
        assert!(audio.video_tracks().is_empty(), "encoder must get audio only");
        Ok(Box::new(FakeEncoder {
            probe: Arc::clone(&self.probe),
            active: false,
        }))
    }
}

/// Preview whose every grab yields a distinct one-byte "JPEG".
#[derive(Default)]
pub struct FakePreview {
    next: AtomicU8,
    pub attached: AtomicBool,
}

impl PreviewSink for FakePreview {
    fn attach(&self, _stream: &MediaStream) {
        self.attached.store(true, Ordering::SeqCst);
    }

    fn grab_jpeg(&self, _quality: u8) -> Option<Vec<u8>> {
        Some(vec![self.next.fetch_add(1, Ordering::SeqCst)])
    }
}

pub fn test_settings() -> CaptureSettings {
    CaptureSettings {
        frame_interval: Duration::from_millis(100),
        frame_capacity: 5,
        flush_timeout: Duration::from_millis(50),
        ..CaptureSettings::default()
    }
}

pub fn fake_capture(behavior: DeviceBehavior) -> (MediaCapture, Arc<FakeDevices>, Arc<EncoderProbe>) {
    let devices = FakeDevices::new(behavior);
    let probe = Arc::new(EncoderProbe::default());
    let capture = MediaCapture::new(
        devices.clone(),
        Arc::new(FakeEncoderFactory {
            probe: Arc::clone(&probe),
        }),
        test_settings(),
    );
    (capture, devices, probe)
}
