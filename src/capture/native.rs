//! Native capture backend built on cpal.
//!
//! The microphone is opened on a dedicated thread that owns the cpal stream
//! for its whole life, since streams cannot move between threads on every
//! host. Samples are downmixed to mono i16 and collected in a shared buffer
//! that the WAV chunk encoder drains. There is no camera backend, so native
//! streams carry audio tracks only.

use std::any::Any;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use hound::WavWriter;

use super::error::CaptureError;
use super::platform::{
    AudioEncoder, ChunkSink, EncoderFactory, MediaConstraints, MediaDevices, MediaStream,
    MediaTrack, TrackKind,
};

#[cfg(target_os = "linux")]
use std::fs::OpenOptions;
#[cfg(target_os = "linux")]
use std::os::unix::io::AsRawFd;

type SampleBuffer = Arc<Mutex<Vec<i16>>>;

/// Opens the configured microphone as a `MediaStream`.
pub struct NativeMediaDevices {
    /// "default", a numeric index, or a device name from `list-devices`
    device_name: String,
    /// Preferred sample rate; the device's native rate wins when they differ
    sample_rate: u32,
}

impl NativeMediaDevices {
    pub fn new(device_name: impl Into<String>, sample_rate: u32) -> Self {
        Self {
            device_name: device_name.into(),
            sample_rate,
        }
    }
}

#[async_trait]
impl MediaDevices for NativeMediaDevices {
    async fn get_user_media(
        &self,
        constraints: &MediaConstraints,
    ) -> Result<MediaStream, CaptureError> {
        if constraints.video.is_some() {
            tracing::warn!("No camera backend available; continuing with audio only");
        }
        if !constraints.audio {
            return Ok(MediaStream::default());
        }

        let device_name = self.device_name.clone();
        let sample_rate = self.sample_rate;
        let track = tokio::task::spawn_blocking(move || CpalTrack::open(&device_name, sample_rate))
            .await
            .map_err(|e| CaptureError::PermissionDenied(format!("device task failed: {e}")))??;

        let tracks: Vec<Arc<dyn MediaTrack>> = match track {
            Some(track) => vec![Arc::new(track)],
            None => Vec::new(),
        };
        Ok(MediaStream::new(tracks))
    }
}

/// A live microphone track backed by a cpal input stream.
pub struct CpalTrack {
    label: String,
    sample_rate: u32,
    samples: SampleBuffer,
    live: AtomicBool,
    stop_tx: Mutex<Option<mpsc::Sender<()>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl CpalTrack {
    /// Opens the device on a worker thread and waits until it is streaming.
    ///
    /// Returns `Ok(None)` when no matching input device exists.
    ///
    /// # Errors
    /// - `PermissionDenied` if the device exists but refuses to stream
    fn open(device_spec: &str, requested_sample_rate: u32) -> Result<Option<Self>, CaptureError> {
        let samples: SampleBuffer = Arc::new(Mutex::new(Vec::new()));
        let (ready_tx, ready_rx) = mpsc::channel::<Result<Option<(String, u32)>, String>>();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let spec = device_spec.to_string();
        let worker_samples = Arc::clone(&samples);
        let worker = std::thread::Builder::new()
            .name("hybridbot-mic".to_string())
            .spawn(move || {
                let stream = match build_input_stream(&spec, requested_sample_rate, worker_samples)
                {
                    Ok(Some((stream, label, rate))) => {
                        let _ = ready_tx.send(Ok(Some((label, rate))));
                        stream
                    }
                    Ok(None) => {
                        let _ = ready_tx.send(Ok(None));
                        return;
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.to_string()));
                        return;
                    }
                };
                // Park until the track is stopped; dropping the stream releases the device.
                let _ = stop_rx.recv();
                drop(stream);
                tracing::debug!("Microphone stream released");
            })
            .map_err(|e| CaptureError::PermissionDenied(format!("failed to spawn audio thread: {e}")))?;

        match ready_rx.recv() {
            Ok(Ok(Some((label, sample_rate)))) => Ok(Some(Self {
                label,
                sample_rate,
                samples,
                live: AtomicBool::new(true),
                stop_tx: Mutex::new(Some(stop_tx)),
                worker: Mutex::new(Some(worker)),
            })),
            Ok(Ok(None)) => {
                let _ = worker.join();
                Ok(None)
            }
            Ok(Err(reason)) => {
                let _ = worker.join();
                Err(CaptureError::PermissionDenied(reason))
            }
            Err(_) => Err(CaptureError::PermissionDenied(
                "audio thread exited before the device opened".to_string(),
            )),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn samples(&self) -> SampleBuffer {
        Arc::clone(&self.samples)
    }
}

impl MediaTrack for CpalTrack {
    fn kind(&self) -> TrackKind {
        TrackKind::Audio
    }

    fn label(&self) -> String {
        self.label.clone()
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    fn stop(&self) {
        if !self.live.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(tx) = self.stop_tx.lock().unwrap_or_else(PoisonError::into_inner).take() {
            let _ = tx.send(());
        }
        if let Some(worker) = self.worker.lock().unwrap_or_else(PoisonError::into_inner).take() {
            if worker.join().is_err() {
                tracing::warn!("Audio thread panicked while stopping");
            }
        }
        tracing::info!("Microphone '{}' stopped", self.label);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for CpalTrack {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Creates WAV chunk encoders over native microphone tracks.
#[derive(Debug, Default)]
pub struct NativeEncoderFactory;

impl EncoderFactory for NativeEncoderFactory {
    fn create(&self, audio: &MediaStream) -> Result<Box<dyn AudioEncoder>, CaptureError> {
        let track = audio
            .audio_tracks()
            .into_iter()
            .next()
            .ok_or(CaptureError::NoAudioDevice)?;
        let cpal_track = track
            .as_any()
            .downcast_ref::<CpalTrack>()
            .ok_or_else(|| CaptureError::Encoder("audio track is not a native microphone".into()))?;

        Ok(Box::new(WavChunkEncoder::new(
            cpal_track.samples(),
            cpal_track.sample_rate(),
        )))
    }
}

/// Emits raw 16-bit PCM chunks and assembles them into a mono WAV blob.
pub struct WavChunkEncoder {
    samples: SampleBuffer,
    sample_rate: u32,
    sink: Option<ChunkSink>,
    ticker: Option<tokio::task::JoinHandle<()>>,
}

impl WavChunkEncoder {
    fn new(samples: SampleBuffer, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
            sink: None,
            ticker: None,
        }
    }

    /// Moves pending samples into the sink as one chunk.
    ///
    /// The sample lock is held across the sink call so chunks reach the sink
    /// in capture order even when a flush races the timeslice ticker.
    fn emit_pending(samples: &SampleBuffer, sink: &ChunkSink) {
        let mut pending = samples.lock().unwrap_or_else(PoisonError::into_inner);
        if pending.is_empty() {
            return;
        }
        let chunk: Vec<u8> = pending.drain(..).flat_map(|s| s.to_le_bytes()).collect();
        sink(chunk);
    }
}

#[async_trait]
impl AudioEncoder for WavChunkEncoder {
    fn mime_type(&self) -> &str {
        "audio/wav"
    }

    fn file_name(&self) -> &str {
        "input.wav"
    }

    fn start(&mut self, timeslice: Duration, sink: ChunkSink) -> Result<(), CaptureError> {
        if self.is_active() {
            return Ok(());
        }
        // Anything captured before the encoder started belongs to no turn.
        self.samples
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();

        let samples = Arc::clone(&self.samples);
        let tick_sink = Arc::clone(&sink);
        self.ticker = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(timeslice);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                Self::emit_pending(&samples, &tick_sink);
            }
        }));
        self.sink = Some(sink);

        tracing::debug!(
            "WAV chunk encoder started ({}Hz, timeslice {}ms)",
            self.sample_rate,
            timeslice.as_millis()
        );
        Ok(())
    }

    async fn request_data(&mut self) -> Result<(), CaptureError> {
        let sink = self.sink.as_ref().ok_or(CaptureError::NotReady)?;
        Self::emit_pending(&self.samples, sink);
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
        if let Some(sink) = self.sink.take() {
            Self::emit_pending(&self.samples, &sink);
        }
        tracing::debug!("WAV chunk encoder stopped");
    }

    fn is_active(&self) -> bool {
        self.ticker.is_some()
    }

    fn assemble(&self, chunks: Vec<Vec<u8>>) -> Result<Vec<u8>, CaptureError> {
        encode_wav(&chunks, self.sample_rate)
    }
}

impl Drop for WavChunkEncoder {
    fn drop(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }
}

/// Wraps little-endian PCM chunks in a mono 16-bit WAV container.
fn encode_wav(chunks: &[Vec<u8>], sample_rate: u32) -> Result<Vec<u8>, CaptureError> {
    let total: usize = chunks.iter().map(Vec::len).sum();
    if total == 0 {
        return Ok(Vec::new());
    }

    let wav_spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut out = Vec::with_capacity(total + 44);
    {
        let mut writer = WavWriter::new(Cursor::new(&mut out), wav_spec)
            .map_err(|e| CaptureError::Encoder(e.to_string()))?;
        for pair in chunks.iter().flatten().copied().collect::<Vec<u8>>().chunks_exact(2) {
            writer
                .write_sample(i16::from_le_bytes([pair[0], pair[1]]))
                .map_err(|e| CaptureError::Encoder(e.to_string()))?;
        }
        writer
            .finalize()
            .map_err(|e| CaptureError::Encoder(e.to_string()))?;
    }
    Ok(out)
}

/// Builds and starts an input stream on the calling thread.
///
/// Returns `Ok(None)` when the requested device does not exist.
fn build_input_stream(
    device_spec: &str,
    requested_sample_rate: u32,
    samples: SampleBuffer,
) -> anyhow::Result<Option<(cpal::Stream, String, u32)>> {
    let device = suppress_alsa_warnings(|| {
        let host = cpal::default_host();
        if device_spec == "default" {
            Ok(host.default_input_device())
        } else {
            find_device_by_name(&host, device_spec)
        }
    })?;

    let Some(device) = device else {
        tracing::warn!("Audio input device '{}' not available", device_spec);
        return Ok(None);
    };

    let device_name = device
        .name()
        .unwrap_or_else(|_| "Unknown device".to_string());
    tracing::info!("Recording device: {}", device_name);

    let device_config = device.default_input_config()?;
    let sample_rate = device_config.sample_rate().0;
    let num_channels = device_config.channels() as usize;

    if sample_rate != requested_sample_rate {
        tracing::warn!(
            "Requested sample rate {}Hz but device uses {}Hz. Recording at device rate.",
            requested_sample_rate,
            sample_rate
        );
    }
    tracing::debug!(
        "Device configuration: {}Hz, {} channels, {:?}",
        sample_rate,
        num_channels,
        device_config.sample_format()
    );

    let on_error = |err: cpal::StreamError| tracing::error!("Audio stream error: {}", err);
    let stream = match device_config.sample_format() {
        cpal::SampleFormat::I16 => device.build_input_stream(
            &device_config.into(),
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                push_mono(data, &samples, num_channels);
            },
            on_error,
            None,
        )?,
        cpal::SampleFormat::F32 => device.build_input_stream(
            &device_config.into(),
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let converted: Vec<i16> = data
                    .iter()
                    .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
                    .collect();
                push_mono(&converted, &samples, num_channels);
            },
            on_error,
            None,
        )?,
        other => return Err(anyhow!("Unsupported input sample format: {other:?}")),
    };

    stream.play()?;
    tracing::debug!("Audio stream started");
    Ok(Some((stream, device_name, sample_rate)))
}

/// Appends interleaved samples as mono by averaging channels.
fn push_mono(data: &[i16], samples: &SampleBuffer, num_channels: usize) {
    let mut samples = samples.lock().unwrap_or_else(PoisonError::into_inner);
    match num_channels {
        0 | 1 => samples.extend_from_slice(data),
        _ => {
            for frame in data.chunks_exact(num_channels) {
                let sum: i32 = frame.iter().map(|&s| s as i32).sum();
                samples.push((sum / num_channels as i32) as i16);
            }
        }
    }
}

/// Finds an input device by numeric index or exact name.
fn find_device_by_name(host: &cpal::Host, device_spec: &str) -> anyhow::Result<Option<cpal::Device>> {
    let devices = host
        .input_devices()
        .map_err(|e| anyhow!("Failed to enumerate devices: {e}"))?;

    if let Ok(index) = device_spec.parse::<usize>() {
        return Ok(devices.into_iter().nth(index));
    }

    Ok(devices
        .into_iter()
        .find(|d| d.name().is_ok_and(|name| name == device_spec)))
}

/// One enumerated microphone.
#[derive(Debug, Clone)]
pub struct InputDeviceInfo {
    pub name: String,
    pub is_default: bool,
    /// Default sample rate and channel count, when the device reports one
    pub default_config: Option<(u32, u16)>,
}

/// Lists every input device the default host exposes.
///
/// # Errors
/// - If the audio host cannot enumerate devices
pub fn list_input_devices() -> anyhow::Result<Vec<InputDeviceInfo>> {
    suppress_alsa_warnings(|| {
        let host = cpal::default_host();
        let default_name = host.default_input_device().and_then(|d| d.name().ok());
        let devices = host
            .input_devices()
            .map_err(|e| anyhow!("Failed to enumerate audio devices: {e}"))?;

        Ok(devices
            .filter_map(|d| {
                let name = d.name().ok()?;
                let config = d
                    .default_input_config()
                    .ok()
                    .map(|c| (c.sample_rate().0, c.channels()));
                let is_default = default_name.as_deref() == Some(name.as_str());
                Some(InputDeviceInfo {
                    name,
                    is_default,
                    default_config: config,
                })
            })
            .collect())
    })
}

/// Temporarily redirects stderr to /dev/null to suppress ALSA library warnings on Linux.
#[cfg(target_os = "linux")]
fn suppress_alsa_warnings<F, T>(f: F) -> anyhow::Result<T>
where
    F: FnOnce() -> anyhow::Result<T>,
{
    let dev_null = OpenOptions::new()
        .write(true)
        .open("/dev/null")
        .map_err(|e| anyhow!("Failed to open /dev/null: {e}"))?;

    let old_stderr = unsafe { libc::dup(libc::STDERR_FILENO) };
    if old_stderr == -1 {
        return Err(anyhow!("Failed to duplicate stderr"));
    }

    if unsafe { libc::dup2(dev_null.as_raw_fd(), libc::STDERR_FILENO) } == -1 {
        unsafe { libc::close(old_stderr) };
        return Err(anyhow!("Failed to redirect stderr"));
    }

    let result = f();

    unsafe {
        libc::dup2(old_stderr, libc::STDERR_FILENO);
        libc::close(old_stderr);
    }

    result
}

#[cfg(not(target_os = "linux"))]
fn suppress_alsa_warnings<F, T>(f: F) -> anyhow::Result<T>
where
    F: FnOnce() -> anyhow::Result<T>,
{
    f()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_mono_averages_stereo() {
        let samples: SampleBuffer = Arc::new(Mutex::new(Vec::new()));
        push_mono(&[100, 300, -50, 50], &samples, 2);
        assert_eq!(*samples.lock().unwrap(), vec![200, 0]);
    }

    #[test]
    fn test_encode_wav_empty_chunks_yield_empty_blob() {
        assert!(encode_wav(&[], 16000).unwrap().is_empty());
        assert!(encode_wav(&[Vec::new(), Vec::new()], 16000).unwrap().is_empty());
    }

    #[test]
    fn test_encode_wav_keeps_samples_in_chunk_order() {
        let first: Vec<u8> = [1i16, 2].iter().flat_map(|s| s.to_le_bytes()).collect();
        let second: Vec<u8> = [3i16].iter().flat_map(|s| s.to_le_bytes()).collect();
        let blob = encode_wav(&[first, second], 16000).unwrap();

        let reader = hound::WavReader::new(Cursor::new(blob)).unwrap();
        assert_eq!(reader.spec().sample_rate, 16000);
        assert_eq!(reader.spec().channels, 1);
        let decoded: Vec<i16> = reader.into_samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(decoded, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_dropping_started_encoder_stops_ticker() {
        let samples: SampleBuffer = Arc::new(Mutex::new(Vec::new()));
        let mut encoder = WavChunkEncoder::new(samples, 16000);
        let sink: ChunkSink = Arc::new(|_| {});

        encoder.start(Duration::from_millis(10), Arc::clone(&sink)).unwrap();
        // One clone held by the encoder, one by its ticker task.
        assert_eq!(Arc::strong_count(&sink), 3);

        drop(encoder);
        for _ in 0..100 {
            if Arc::strong_count(&sink) == 1 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(Arc::strong_count(&sink), 1);
    }

    #[tokio::test]
    async fn test_flush_emits_pending_samples_once() {
        let samples: SampleBuffer = Arc::new(Mutex::new(Vec::new()));
        let mut encoder = WavChunkEncoder::new(Arc::clone(&samples), 16000);
        let received = Arc::new(Mutex::new(Vec::<Vec<u8>>::new()));
        let sink_received = Arc::clone(&received);
        let sink: ChunkSink = Arc::new(move |chunk| sink_received.lock().unwrap().push(chunk));

        encoder.start(Duration::from_secs(60), sink).unwrap();
        samples.lock().unwrap().extend_from_slice(&[7, 8]);
        encoder.request_data().await.unwrap();
        encoder.request_data().await.unwrap();

        let chunks = received.lock().unwrap().clone();
        assert_eq!(chunks, vec![vec![7, 0, 8, 0]]);
        encoder.stop();
        assert!(!encoder.is_active());
    }
}
