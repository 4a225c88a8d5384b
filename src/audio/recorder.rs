//! System microphone capture via CPAL.
//!
//! The CPAL stream is not `Send`, so it lives on its own thread for as long as
//! the source is started. The device callback downmixes to mono PCM16LE,
//! re-chunks into fixed frames and pushes them through a bounded channel that
//! `read` drains.

use super::dispatch::FrameDispatcher;
use super::source::{frame_bytes_for, FrameSource, ReadError, SourceError};
use crate::config::AppConfig;
use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Frames buffered between the device callback and the capture loop.
const FRAME_CHANNEL_CAPACITY: usize = 32;

/// Assumed rate until the device reports its own.
const FALLBACK_SAMPLE_RATE: u32 = 44_100;

/// List microphone names so the CLI can expose a human-friendly selector.
pub fn list_devices() -> Result<Vec<String>> {
    let host = cpal::default_host();
    let devices = host.input_devices().context("no input devices available")?;
    let mut names = Vec::new();
    for device in devices {
        if let Ok(name) = device.name() {
            names.push(name);
        }
    }
    Ok(names)
}

fn find_device(preferred: Option<&str>) -> Result<cpal::Device, String> {
    let host = cpal::default_host();
    match preferred {
        Some(name) => {
            let mut devices = host
                .input_devices()
                .map_err(|err| format!("no input devices available: {err}"))?;
            devices
                .find(|d| d.name().map(|n| n == name).unwrap_or(false))
                .ok_or_else(|| format!("input device '{name}' not found"))
        }
        None => host.default_input_device().ok_or_else(|| {
            format!(
                "no default input device available. {}",
                mic_permission_hint()
            )
        }),
    }
}

fn mic_permission_hint() -> &'static str {
    #[cfg(target_os = "macos")]
    {
        "macOS: System Settings > Privacy & Security > Microphone (enable your terminal)."
    }
    #[cfg(target_os = "linux")]
    {
        "Linux: check PipeWire/PulseAudio permissions and ensure the device is not muted."
    }
    #[cfg(target_os = "windows")]
    {
        "Windows: Settings > Privacy & Security > Microphone (allow access for your terminal)."
    }
    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    {
        "Check OS microphone permissions."
    }
}

struct StreamFormat {
    sample_rate: u32,
    frame_bytes: usize,
    device_name: String,
}

struct RunningStream {
    frames: Receiver<Vec<u8>>,
    shutdown: Sender<()>,
    thread: JoinHandle<()>,
}

/// Microphone-backed [`FrameSource`].
pub struct CpalSource {
    preferred_device: Option<String>,
    frame_ms: u64,
    read_timeout: Duration,
    sample_rate: u32,
    frame_bytes: usize,
    device_name: Option<String>,
    running: Option<RunningStream>,
    dropped: Arc<AtomicUsize>,
    released: bool,
}

impl CpalSource {
    pub fn new(preferred_device: Option<String>, frame_ms: u64, read_timeout: Duration) -> Self {
        Self {
            preferred_device,
            frame_ms,
            read_timeout,
            sample_rate: FALLBACK_SAMPLE_RATE,
            frame_bytes: frame_bytes_for(FALLBACK_SAMPLE_RATE, frame_ms),
            device_name: None,
            running: None,
            dropped: Arc::new(AtomicUsize::new(0)),
            released: false,
        }
    }

    pub fn from_config(cfg: &AppConfig) -> Self {
        Self::new(
            cfg.input_device.clone(),
            cfg.frame_ms,
            Duration::from_millis(cfg.read_timeout_ms),
        )
    }

    /// Frames discarded because the reader fell behind the device.
    pub fn dropped_frames(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl FrameSource for CpalSource {
    fn start(&mut self) -> Result<(), SourceError> {
        if self.released {
            return Err(SourceError::Released);
        }
        if self.running.is_some() {
            return Err(SourceError::Busy);
        }

        let (frame_tx, frame_rx) = bounded::<Vec<u8>>(FRAME_CHANNEL_CAPACITY);
        let (ready_tx, ready_rx) = bounded::<Result<StreamFormat, String>>(1);
        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
        let preferred = self.preferred_device.clone();
        let frame_ms = self.frame_ms;
        let dropped = self.dropped.clone();

        let thread = thread::Builder::new()
            .name("cpal-stream".to_string())
            .spawn(move || {
                run_stream(preferred, frame_ms, frame_tx, dropped, ready_tx, shutdown_rx)
            })
            .map_err(|err| SourceError::Device(format!("failed to spawn stream thread: {err}")))?;

        let format = match ready_rx.recv() {
            Ok(Ok(format)) => format,
            Ok(Err(message)) => {
                let _ = thread.join();
                return Err(SourceError::Device(message));
            }
            Err(_) => {
                let _ = thread.join();
                return Err(SourceError::Device("audio stream thread exited".to_string()));
            }
        };

        tracing::debug!(
            device = %format.device_name,
            sample_rate = format.sample_rate,
            frame_bytes = format.frame_bytes,
            "microphone stream started"
        );
        self.sample_rate = format.sample_rate;
        self.frame_bytes = format.frame_bytes;
        self.device_name = Some(format.device_name);
        self.running = Some(RunningStream {
            frames: frame_rx,
            shutdown: shutdown_tx,
            thread,
        });
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, ReadError> {
        let Some(running) = self.running.as_ref() else {
            return Err(ReadError::InvalidOperation);
        };
        match running.frames.recv_timeout(self.read_timeout) {
            Ok(frame) => {
                let len = frame.len().min(buf.len());
                buf[..len].copy_from_slice(&frame[..len]);
                Ok(len)
            }
            Err(RecvTimeoutError::Timeout) => Err(ReadError::TimedOut),
            Err(RecvTimeoutError::Disconnected) => Err(ReadError::DeadObject),
        }
    }

    fn stop(&mut self) -> Result<(), SourceError> {
        let Some(running) = self.running.take() else {
            return Ok(());
        };
        let _ = running.shutdown.send(());
        if running.thread.join().is_err() {
            return Err(SourceError::Device("audio stream thread panicked".to_string()));
        }
        tracing::debug!(dropped = self.dropped_frames(), "microphone stream stopped");
        Ok(())
    }

    fn release(&mut self) {
        if let Err(err) = self.stop() {
            tracing::debug!(error = %err, "stop during release failed");
        }
        self.released = true;
    }

    fn frame_bytes(&self) -> usize {
        self.frame_bytes
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn name(&self) -> String {
        match &self.device_name {
            Some(name) => format!("microphone:{name}"),
            None => "microphone".to_string(),
        }
    }
}

impl Drop for CpalSource {
    fn drop(&mut self) {
        self.release();
    }
}

/// Body of the stream thread: open the device, report its format, then keep
/// the stream alive until shutdown is signalled (or the sender dropped).
fn run_stream(
    preferred: Option<String>,
    frame_ms: u64,
    frame_tx: Sender<Vec<u8>>,
    dropped: Arc<AtomicUsize>,
    ready_tx: Sender<Result<StreamFormat, String>>,
    shutdown_rx: Receiver<()>,
) {
    let stream = match open_stream(preferred.as_deref(), frame_ms, frame_tx, dropped) {
        Ok((stream, format)) => {
            if ready_tx.send(Ok(format)).is_err() {
                return;
            }
            stream
        }
        Err(message) => {
            let _ = ready_tx.send(Err(message));
            return;
        }
    };

    let _ = shutdown_rx.recv();
    if let Err(err) = stream.pause() {
        tracing::debug!(error = %err, "failed to pause audio stream");
    }
}

fn open_stream(
    preferred: Option<&str>,
    frame_ms: u64,
    frame_tx: Sender<Vec<u8>>,
    dropped: Arc<AtomicUsize>,
) -> Result<(cpal::Stream, StreamFormat), String> {
    let device = find_device(preferred)?;
    let device_name = device
        .name()
        .unwrap_or_else(|_| "unknown input device".to_string());
    let default_config = device
        .default_input_config()
        .map_err(|err| format!("cannot query '{device_name}': {err}"))?;
    let format = default_config.sample_format();
    let device_config: StreamConfig = default_config.into();
    let sample_rate = device_config.sample_rate.0;
    let channels = usize::from(device_config.channels.max(1));
    let frame_bytes = frame_bytes_for(sample_rate, frame_ms);

    tracing::debug!(
        ?format,
        sample_rate,
        channels,
        "recorder config"
    );

    let dispatcher = Arc::new(Mutex::new(FrameDispatcher::new(
        frame_bytes,
        frame_tx,
        dropped.clone(),
    )));
    let err_fn = |err| tracing::debug!(error = %err, "audio stream error");

    let stream = match format {
        SampleFormat::F32 => {
            let dispatcher = dispatcher.clone();
            let dropped = dropped.clone();
            device.build_input_stream(
                &device_config,
                move |data: &[f32], _| {
                    if let Ok(mut pump) = dispatcher.try_lock() {
                        pump.push(data, channels, |sample| sample);
                    } else {
                        dropped.fetch_add(1, Ordering::Relaxed);
                    }
                },
                err_fn,
                None,
            )
        }
        SampleFormat::I16 => {
            let dispatcher = dispatcher.clone();
            let dropped = dropped.clone();
            device.build_input_stream(
                &device_config,
                move |data: &[i16], _| {
                    if let Ok(mut pump) = dispatcher.try_lock() {
                        pump.push(data, channels, |sample| sample as f32 / 32_768.0);
                    } else {
                        dropped.fetch_add(1, Ordering::Relaxed);
                    }
                },
                err_fn,
                None,
            )
        }
        SampleFormat::U16 => {
            let dispatcher = dispatcher.clone();
            let dropped = dropped.clone();
            device.build_input_stream(
                &device_config,
                move |data: &[u16], _| {
                    if let Ok(mut pump) = dispatcher.try_lock() {
                        pump.push(data, channels, |sample| {
                            (sample as f32 - 32_768.0) / 32_768.0
                        });
                    } else {
                        dropped.fetch_add(1, Ordering::Relaxed);
                    }
                },
                err_fn,
                None,
            )
        }
        other => return Err(format!("unsupported sample format: {other:?}")),
    }
    .map_err(|err| format!("cannot open '{device_name}': {err}"))?;

    stream
        .play()
        .map_err(|err| format!("cannot start '{device_name}': {err}"))?;

    Ok((
        stream,
        StreamFormat {
            sample_rate,
            frame_bytes,
            device_name,
        },
    ))
}
