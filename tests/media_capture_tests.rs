mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use common::{fake_capture, DeviceBehavior, FakePreview};
use hybridbot::capture::{CaptureError, PreviewSink};

#[tokio::test]
async fn test_denied_permission_leaves_no_stream() {
    let (mut capture, devices, _) = fake_capture(DeviceBehavior::Deny);

    let err = capture.request_permissions().await.unwrap_err();
    assert!(matches!(err, CaptureError::PermissionDenied(_)));
    assert!(!capture.has_stream());
    assert_eq!(devices.requests.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_start_before_permissions_is_not_ready() {
    let (mut capture, _, _) = fake_capture(DeviceBehavior::Grant);

    let err = capture.start_continuous_capture(None).unwrap_err();
    assert!(matches!(err, CaptureError::NotReady));
    assert!(!capture.is_running());
}

#[tokio::test]
async fn test_stream_without_microphone_is_rejected() {
    let (mut capture, _, _) = fake_capture(DeviceBehavior::NoMicrophone);
    capture.request_permissions().await.unwrap();

    let err = capture.start_continuous_capture(None).unwrap_err();
    assert!(matches!(err, CaptureError::NoAudioDevice));
    assert!(!capture.is_running());
}

#[tokio::test]
async fn test_drain_includes_timeslice_chunks_and_flushed_tail() {
    let (mut capture, _, probe) = fake_capture(DeviceBehavior::Grant);
    capture.request_permissions().await.unwrap();
    capture.start_continuous_capture(None).unwrap();

    probe.emit(b"hello ");
    probe.speak(b"world");

    let turn = capture.capture_current_buffer().await.unwrap().unwrap();
    assert_eq!(turn.audio, b"hello world");
    assert_eq!(turn.mime_type, "audio/wav");
    assert_eq!(probe.flushes.load(Ordering::SeqCst), 1);
    assert!(capture.is_running(), "capture keeps running after a drain");

    // Nothing new was said: the next turn is empty, not a repeat.
    let turn = capture.capture_current_buffer().await.unwrap().unwrap();
    assert!(!turn.has_audio());

    probe.speak(b"again");
    let turn = capture.capture_current_buffer().await.unwrap().unwrap();
    assert_eq!(turn.audio, b"again");
}

#[tokio::test(start_paused = true)]
async fn test_frames_are_neither_lost_nor_repeated_across_turns() {
    let (mut capture, _, _) = fake_capture(DeviceBehavior::Grant);
    let preview = Arc::new(FakePreview::default());
    capture.request_permissions().await.unwrap();
    capture
        .start_continuous_capture(Some(preview.clone() as Arc<dyn PreviewSink>))
        .unwrap();
    assert!(preview.attached.load(Ordering::SeqCst));

    tokio::time::sleep(Duration::from_millis(350)).await;
    let first = capture.capture_current_buffer().await.unwrap().unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;
    let second = capture.capture_current_buffer().await.unwrap().unwrap();

    let seqs: Vec<u64> = first
        .frames
        .iter()
        .chain(second.frames.iter())
        .map(|f| f.seq)
        .collect();
    assert_eq!(first.frames.len(), 3);
    assert!(!second.frames.is_empty());
    let expected: Vec<u64> = (0..seqs.len() as u64).collect();
    assert_eq!(seqs, expected);
}

#[tokio::test(start_paused = true)]
async fn test_frame_ring_keeps_only_most_recent() {
    let (mut capture, _, _) = fake_capture(DeviceBehavior::Grant);
    capture.request_permissions().await.unwrap();
    capture
        .start_continuous_capture(Some(Arc::new(FakePreview::default())))
        .unwrap();

    // Ten ticks into a ring of five.
    tokio::time::sleep(Duration::from_millis(1050)).await;
    let turn = capture.capture_current_buffer().await.unwrap().unwrap();

    let seqs: Vec<u64> = turn.frames.iter().map(|f| f.seq).collect();
    assert_eq!(seqs, vec![5, 6, 7, 8, 9]);
}

#[tokio::test(start_paused = true)]
async fn test_unacknowledged_flush_drains_after_timeout() {
    let (mut capture, _, probe) = fake_capture(DeviceBehavior::Grant);
    capture.request_permissions().await.unwrap();
    capture.start_continuous_capture(None).unwrap();

    probe.emit(b"partial");
    probe.hang_on_flush.store(true, Ordering::SeqCst);

    let turn = capture.capture_current_buffer().await.unwrap().unwrap();
    assert_eq!(turn.audio, b"partial");
}

#[tokio::test]
async fn test_end_session_releases_everything_and_is_idempotent() {
    let (mut capture, devices, probe) = fake_capture(DeviceBehavior::Grant);
    capture.request_permissions().await.unwrap();
    capture.start_continuous_capture(None).unwrap();
    probe.emit(b"unsent");

    capture.end_session();
    capture.end_session();

    assert!(devices.all_released());
    for track in devices.issued() {
        assert_eq!(track.stops.load(Ordering::SeqCst), 1);
    }
    assert_eq!(probe.stops.load(Ordering::SeqCst), 1);
    assert!(!capture.has_stream());
    assert!(capture.capture_current_buffer().await.unwrap().is_none());
}

#[tokio::test]
async fn test_end_session_before_start_is_harmless() {
    let (mut capture, devices, _) = fake_capture(DeviceBehavior::Grant);
    capture.end_session();
    assert_eq!(devices.requests.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_repeated_permission_request_releases_previous_stream() {
    let (mut capture, devices, _) = fake_capture(DeviceBehavior::Grant);
    capture.request_permissions().await.unwrap();
    let first = devices.issued();

    capture.request_permissions().await.unwrap();

    assert!(first.iter().all(|t| t.stops.load(Ordering::SeqCst) == 1));
    assert_eq!(devices.issued().len(), 4);
    assert!(capture.has_stream());
}

#[tokio::test]
async fn test_dropping_capture_releases_hardware() {
    let (mut capture, devices, _) = fake_capture(DeviceBehavior::Grant);
    capture.request_permissions().await.unwrap();
    capture.start_continuous_capture(None).unwrap();

    drop(capture);

    assert!(devices.all_released());
}
