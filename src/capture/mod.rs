//! Continuous audio/video capture.
//!
//! Owns the hardware media stream for a live session and exposes drainable
//! audio/frame buffers, so turns can be extracted without reacquiring devices.

pub mod error;
pub mod frames;
pub mod media;
pub mod native;
pub mod platform;

pub use error::CaptureError;
pub use frames::{Frame, FrameRing};
pub use media::{CaptureSettings, MediaCapture, TurnBuffer};
pub use native::{list_input_devices, InputDeviceInfo, NativeEncoderFactory, NativeMediaDevices};
pub use platform::{
    AudioEncoder, ChunkSink, EncoderFactory, FacingMode, MediaConstraints, MediaDevices,
    MediaStream, MediaTrack, PreviewSink, TrackKind, VideoConstraints,
};
