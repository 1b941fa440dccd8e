//! Capture primitives the host platform must provide.
//!
//! `MediaCapture` only talks to these traits: a device layer that hands out
//! media streams, an encoder that turns the audio sub-stream into chunks, and
//! a preview sink that shows the live stream and rasterizes frames.

use async_trait::async_trait;
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use super::error::CaptureError;

/// Which way the requested camera should face.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacingMode {
    User,
    Environment,
}

/// Requested video geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoConstraints {
    pub width: u32,
    pub height: u32,
    pub facing: FacingMode,
}

impl Default for VideoConstraints {
    fn default() -> Self {
        Self {
            width: 320,
            height: 240,
            facing: FacingMode::User,
        }
    }
}

/// What a `get_user_media` call asks the platform for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaConstraints {
    pub audio: bool,
    pub video: Option<VideoConstraints>,
}

impl MediaConstraints {
    /// Simultaneous audio and video access.
    pub fn audio_video(video: VideoConstraints) -> Self {
        Self {
            audio: true,
            video: Some(video),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Audio,
    Video,
}

/// A device-level track. Stopping it releases the underlying hardware.
pub trait MediaTrack: Send + Sync {
    fn kind(&self) -> TrackKind;
    fn label(&self) -> String;
    fn is_live(&self) -> bool;
    fn stop(&self);
    /// Lets a platform's encoder factory reach its own concrete track type.
    fn as_any(&self) -> &dyn Any;
}

/// A set of live tracks acquired together.
#[derive(Clone, Default)]
pub struct MediaStream {
    tracks: Vec<Arc<dyn MediaTrack>>,
}

impl MediaStream {
    pub fn new(tracks: Vec<Arc<dyn MediaTrack>>) -> Self {
        Self { tracks }
    }

    pub fn tracks(&self) -> &[Arc<dyn MediaTrack>] {
        &self.tracks
    }

    pub fn audio_tracks(&self) -> Vec<Arc<dyn MediaTrack>> {
        self.tracks_of(TrackKind::Audio)
    }

    pub fn video_tracks(&self) -> Vec<Arc<dyn MediaTrack>> {
        self.tracks_of(TrackKind::Video)
    }

    /// Derives a stream sharing only the audio tracks of this one.
    pub fn audio_only(&self) -> MediaStream {
        MediaStream::new(self.audio_tracks())
    }

    /// Stops every track so the OS capture indicator turns off.
    pub fn stop_all(&self) {
        for track in &self.tracks {
            if track.is_live() {
                tracing::debug!("Stopping {:?} track '{}'", track.kind(), track.label());
                track.stop();
            }
        }
    }

    fn tracks_of(&self, kind: TrackKind) -> Vec<Arc<dyn MediaTrack>> {
        self.tracks
            .iter()
            .filter(|t| t.kind() == kind)
            .cloned()
            .collect()
    }
}

impl std::fmt::Debug for MediaStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaStream")
            .field("audio_tracks", &self.audio_tracks().len())
            .field("video_tracks", &self.video_tracks().len())
            .finish()
    }
}

/// Hands out media streams; the equivalent of a permission prompt.
#[async_trait]
pub trait MediaDevices: Send + Sync {
    async fn get_user_media(
        &self,
        constraints: &MediaConstraints,
    ) -> Result<MediaStream, CaptureError>;
}

/// Receives encoded audio chunks in emission order.
pub type ChunkSink = Arc<dyn Fn(Vec<u8>) + Send + Sync>;

/// A chunked audio encoder running over an audio-only stream.
#[async_trait]
pub trait AudioEncoder: Send + Sync {
    /// MIME type of the assembled blob.
    fn mime_type(&self) -> &str;

    /// File name used when uploading the assembled blob.
    fn file_name(&self) -> &str;

    /// Starts encoding, emitting a chunk into `sink` at least every `timeslice`.
    fn start(&mut self, timeslice: Duration, sink: ChunkSink) -> Result<(), CaptureError>;

    /// Flushes pending data out of band. Resolves once the flushed chunk has
    /// been handed to the sink.
    async fn request_data(&mut self) -> Result<(), CaptureError>;

    fn stop(&mut self);

    fn is_active(&self) -> bool;

    /// Joins ordered chunks into one uploadable blob. Empty input yields an
    /// empty blob.
    fn assemble(&self, chunks: Vec<Vec<u8>>) -> Result<Vec<u8>, CaptureError>;
}

/// Builds an encoder for the audio sub-stream of an acquired stream.
pub trait EncoderFactory: Send + Sync {
    fn create(&self, audio: &MediaStream) -> Result<Box<dyn AudioEncoder>, CaptureError>;
}

/// Visual feedback surface for the live stream.
pub trait PreviewSink: Send + Sync {
    fn attach(&self, stream: &MediaStream);

    /// Rasterizes the current preview frame as JPEG, if one is showing.
    fn grab_jpeg(&self, quality: u8) -> Option<Vec<u8>>;
}
