use super::testing::{wait_until, CollectingConsumer, ScriptedSource};
use super::{
    frame_amplitude, frame_bytes_for, sample_score, AudioFrame, CaptureSession, FrameSource,
    ReadError, ReplaySource, SessionState, SourceError, StartOutcome, VadConfig,
    VoiceActivityDetector, MAX_AMPLITUDE_SCORE,
};
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

const WAIT: Duration = Duration::from_secs(2);

fn frame(bytes: &[u8]) -> AudioFrame<'_> {
    AudioFrame::new(bytes, bytes.len())
}

#[test]
fn sample_score_combines_absolute_byte_values() {
    assert_eq!(sample_score(0x00, 0x00), 0);
    assert_eq!(sample_score(0xFF, 0x7F), (127 << 8) + 1);
    assert_eq!(sample_score(0x80, 0x80), MAX_AMPLITUDE_SCORE);
    assert_eq!(sample_score(0x05, 0xFE), (2 << 8) + 5);
}

#[test]
fn frame_amplitude_is_mean_score() {
    let bytes = [0x00, 0x00, 0xFF, 0x7F];
    let amplitude = frame_amplitude(&frame(&bytes)).expect("two samples");
    assert!((amplitude - 16_256.5).abs() < 1e-9);
}

#[test]
fn frame_amplitude_ignores_trailing_odd_byte() {
    let bytes = [0x10, 0x00, 0x7F];
    assert_eq!(frame_amplitude(&frame(&bytes)), Some(16.0));
    assert_eq!(frame_amplitude(&frame(&bytes[..1])), None);
    assert_eq!(frame_amplitude(&AudioFrame::new(&bytes, 0)), None);
}

#[test]
fn loud_frame_reports_speaking_once() {
    let mut vad = VoiceActivityDetector::new(&VadConfig::default());
    let loud = [0x00, 0x00, 0xFF, 0x7F];
    assert_eq!(vad.process_frame(&frame(&loud)), Some(true));
    assert_eq!(vad.process_frame(&frame(&loud)), None);
    assert!(vad.current());
}

#[test]
fn quiet_frames_produce_no_edges() {
    let mut vad = VoiceActivityDetector::default();
    let quiet = [0x10, 0x00, 0x20, 0x00];
    for _ in 0..5 {
        assert_eq!(vad.process_frame(&frame(&quiet)), None);
    }
    assert!(!vad.current());
}

#[test]
fn alternating_frames_report_every_edge() {
    let mut vad = VoiceActivityDetector::default();
    let loud = [0x00, 0x40];
    let quiet = [0x00, 0x00];
    let edges: Vec<Option<bool>> = [&loud, &quiet, &loud, &quiet]
        .iter()
        .map(|bytes| vad.process_frame(&frame(bytes.as_slice())))
        .collect();
    assert_eq!(edges, vec![Some(true), Some(false), Some(true), Some(false)]);
}

#[test]
fn threshold_is_exclusive() {
    let vad = VoiceActivityDetector::new(&VadConfig {
        amplitude_threshold: 16,
    });
    assert!(!vad.is_speaking(&frame(&[0x10, 0x00])));
    assert!(vad.is_speaking(&frame(&[0x11, 0x00])));
}

#[test]
fn empty_frame_counts_as_silence() {
    let mut vad = VoiceActivityDetector::new(&VadConfig {
        amplitude_threshold: 1,
    });
    assert_eq!(vad.process_frame(&frame(&[0x00, 0x40])), Some(true));
    assert_eq!(vad.process_frame(&AudioFrame::new(&[], 0)), Some(false));
}

#[test]
fn reset_rearms_speaking_edge() {
    let mut vad = VoiceActivityDetector::default();
    let loud = [0x00, 0x40];
    assert_eq!(vad.process_frame(&frame(&loud)), Some(true));
    vad.reset();
    assert_eq!(vad.process_frame(&frame(&loud)), Some(true));
}

#[test]
fn frame_bytes_for_rounds_down_to_whole_samples() {
    assert_eq!(frame_bytes_for(16_000, 20), 640);
    assert_eq!(frame_bytes_for(44_100, 10), 882);
    assert_eq!(frame_bytes_for(8_000, 0), 2);
}

#[test]
fn audio_frame_clamps_valid_length() {
    let buf = [1u8, 2, 3, 4];
    let short = AudioFrame::new(&buf, 10);
    assert_eq!(short.len(), 4);
    assert_eq!(short.capacity(), 4);
    let partial = AudioFrame::new(&buf, 2);
    assert_eq!(partial.bytes(), &[1, 2]);
    assert_eq!(partial.sample_count(), 1);
}

#[test]
fn session_delivers_frames_in_order() {
    let (source, script) = ScriptedSource::new(4);
    let consumer = CollectingConsumer::default();
    let mut session = CaptureSession::new(Box::new(source)).with_consumer(Box::new(consumer.clone()));

    assert_eq!(session.start(), StartOutcome::Started);
    assert_eq!(session.state(), SessionState::Recording);
    script.frame(&[1, 0, 2, 0]);
    script.frame(&[3, 0]);
    assert!(wait_until(WAIT, || consumer.frames().len() == 2));

    let metrics = session.stop().expect("was recording");
    assert_eq!(consumer.frames(), vec![vec![1, 0, 2, 0], vec![3, 0]]);
    assert_eq!(metrics.frames_processed, 2);
    assert_eq!(metrics.bytes_processed, 6);
    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(consumer.starts.load(Ordering::SeqCst), 1);
    assert_eq!(consumer.stops.load(Ordering::SeqCst), 1);
    assert_eq!(script.calls.stops(), 1);
}

#[test]
fn double_start_runs_a_single_loop() {
    let (source, script) = ScriptedSource::new(4);
    let mut session = CaptureSession::new(Box::new(source));
    assert_eq!(session.start(), StartOutcome::Started);
    assert_eq!(session.start(), StartOutcome::AlreadyRecording);
    assert_eq!(script.calls.starts(), 1);
    session.stop();
    assert_eq!(script.calls.stops(), 1);
}

#[test]
fn stop_while_idle_is_noop() {
    let (source, script) = ScriptedSource::new(4);
    let mut session = CaptureSession::new(Box::new(source));
    assert!(session.stop().is_none());
    assert_eq!(script.calls.stops(), 0);
    assert_eq!(session.state(), SessionState::Idle);
}

#[test]
fn failed_start_leaves_session_idle_and_retryable() {
    let (source, script) = ScriptedSource::new(4);
    let mut session = CaptureSession::new(Box::new(source));
    script.fail_next_start(SourceError::Busy);
    assert_eq!(
        session.start(),
        StartOutcome::Unavailable(SourceError::Busy)
    );
    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(session.start(), StartOutcome::Started);
}

#[test]
fn transient_read_errors_keep_the_loop_running() {
    let (source, script) = ScriptedSource::new(2);
    let consumer = CollectingConsumer::default();
    let mut session = CaptureSession::new(Box::new(source)).with_consumer(Box::new(consumer.clone()));
    session.start();

    script.read_error(ReadError::DeadObject);
    script.read_error(ReadError::Busy);
    script.frame(&[9, 0]);
    assert!(wait_until(WAIT, || consumer.frames().len() == 1));
    assert!(session.is_recording());

    let metrics = session.stop().expect("was recording");
    assert!(metrics.read_errors >= 2);
    assert_eq!(metrics.frames_processed, 1);
}

#[test]
fn terminate_is_idempotent_and_blocks_restart() {
    let (source, script) = ScriptedSource::new(2);
    let mut session = CaptureSession::new(Box::new(source));
    session.start();
    session.terminate();
    session.terminate();
    assert_eq!(session.state(), SessionState::Terminated);
    assert_eq!(script.calls.stops(), 1);
    assert_eq!(script.calls.releases(), 1);

    assert_eq!(session.start(), StartOutcome::Terminated);
    assert_eq!(script.calls.starts(), 1);
}

#[test]
fn dropping_session_releases_source() {
    let (source, script) = ScriptedSource::new(2);
    {
        let mut session = CaptureSession::new(Box::new(source));
        session.start();
    }
    assert_eq!(script.calls.stops(), 1);
    assert_eq!(script.calls.releases(), 1);
}

#[test]
fn consumers_attach_only_while_idle() {
    let (source, _script) = ScriptedSource::new(2);
    let mut session = CaptureSession::new(Box::new(source));
    session.start();
    assert!(!session.add_consumer(Box::new(CollectingConsumer::default())));
    session.stop();
    assert!(session.add_consumer(Box::new(CollectingConsumer::default())));
}

#[test]
fn restart_after_stop_resumes_delivery() {
    let (source, script) = ScriptedSource::new(2);
    let consumer = CollectingConsumer::default();
    let mut session = CaptureSession::new(Box::new(source)).with_consumer(Box::new(consumer.clone()));
    session.start();
    script.frame(&[1, 0]);
    assert!(wait_until(WAIT, || consumer.frames().len() == 1));
    session.stop();

    assert_eq!(session.start(), StartOutcome::Started);
    script.frame(&[2, 0]);
    assert!(wait_until(WAIT, || consumer.frames().len() == 2));
    session.stop();
    assert_eq!(session.last_metrics().map(|m| m.frames_processed), Some(1));
}

#[test]
fn replay_source_serves_frames_then_silence() {
    let pcm = vec![1u8, 2, 3, 4, 5, 6];
    let mut source = ReplaySource::from_pcm(pcm, 8_000, 0);
    let mut buf = [0xAAu8; 4];

    assert_eq!(source.read(&mut buf), Err(ReadError::InvalidOperation));
    source.start().expect("start");
    assert_eq!(source.read(&mut buf), Ok(2));
    assert_eq!(&buf[..2], &[1, 2]);
    source.read(&mut buf).expect("read");
    source.read(&mut buf).expect("read");
    assert!(source.exhausted());
    assert_eq!(source.read(&mut buf), Ok(2));
    assert_eq!(&buf[..2], &[0, 0]);
}

#[test]
fn replay_source_paces_trailing_silence() {
    let mut source = ReplaySource::from_pcm(vec![1u8, 2], 16_000, 20);
    source.start().expect("start");
    let mut buf = vec![0u8; source.frame_bytes()];
    source.read(&mut buf).expect("read");
    assert!(source.exhausted());

    let started = Instant::now();
    for _ in 0..4 {
        source.read(&mut buf).expect("read");
    }
    assert!(started.elapsed() >= Duration::from_millis(50));
}

#[test]
fn replay_source_pads_short_final_frame() {
    let mut source = ReplaySource::from_pcm(vec![7u8, 7, 7], 16_000, 1);
    source.start().expect("start");
    let mut buf = [0xAAu8; 32];
    assert_eq!(source.read(&mut buf), Ok(32));
    assert_eq!(&buf[..4], &[7, 7, 7, 0]);
}

#[test]
fn replay_source_rejects_start_after_release() {
    let mut source = ReplaySource::from_pcm(Vec::new(), 16_000, 20);
    source.release();
    assert_eq!(source.start(), Err(SourceError::Released));
}

#[test]
fn replay_source_reads_file() {
    let path = std::env::temp_dir().join(format!("voicechannel-replay-{}.pcm", std::process::id()));
    std::fs::write(&path, [0x00, 0x40, 0x00, 0x40]).expect("write pcm");
    let mut source = ReplaySource::from_file(&path, 16_000, 20).expect("load");
    let _ = std::fs::remove_file(&path);

    assert!(source.name().starts_with("replay:"));
    assert_eq!(source.frame_bytes(), 640);
    source.start().expect("start");
    let mut buf = vec![0u8; source.frame_bytes()];
    source.read(&mut buf).expect("read");
    assert_eq!(&buf[..4], &[0x00, 0x40, 0x00, 0x40]);
}

#[test]
fn replay_source_missing_file_is_an_error() {
    let missing = std::env::temp_dir().join("voicechannel-does-not-exist.pcm");
    assert!(ReplaySource::from_file(&missing, 16_000, 20).is_err());
}
