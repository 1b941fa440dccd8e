use thiserror::Error;

/// Failures raised while acquiring or driving capture hardware.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The platform refused camera/microphone access.
    #[error("Permission denied. Please allow access to camera and microphone. ({0})")]
    PermissionDenied(String),

    /// Access was granted but the stream carries no audio track.
    #[error("Microphone not detected. Check that an input device is connected.")]
    NoAudioDevice,

    /// An operation was invoked before its prerequisite step.
    #[error("No media stream. Request permissions before starting capture.")]
    NotReady,

    /// The audio encoder could not be created, flushed or assembled.
    #[error("Audio encoder failed: {0}")]
    Encoder(String),
}
