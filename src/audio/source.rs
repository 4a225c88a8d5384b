//! Hardware abstraction the capture loop reads from.

/// Failure to start, stop, or otherwise control a [`FrameSource`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    #[error("audio device is busy")]
    Busy,
    #[error("audio source has been released")]
    Released,
    #[error("audio device error: {0}")]
    Device(String),
}

/// Failure of a single frame read. The capture loop treats every variant as
/// transient and simply reads again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ReadError {
    #[error("device busy")]
    Busy,
    #[error("invalid operation")]
    InvalidOperation,
    #[error("bad parameters")]
    BadValue,
    #[error("device is gone")]
    DeadObject,
    #[error("timed out waiting for audio")]
    TimedOut,
}

/// A microphone (or stand-in) producing PCM16LE mono frames.
///
/// Owned exclusively by one `CaptureSession`: control calls come from the
/// session, reads only from its capture loop.
pub trait FrameSource: Send {
    /// Open the device and begin producing frames.
    fn start(&mut self) -> Result<(), SourceError>;

    /// Block until the next frame is available and copy it into `buf`.
    /// Returns the number of valid bytes written.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, ReadError>;

    /// Stop producing frames. Must tolerate being called when not started.
    fn stop(&mut self) -> Result<(), SourceError>;

    /// Release the device for good. No `start` is valid afterwards.
    fn release(&mut self);

    /// Size in bytes of the frames this source produces.
    fn frame_bytes(&self) -> usize;

    fn sample_rate(&self) -> u32;

    fn name(&self) -> String {
        "unknown_source".to_string()
    }
}

/// Bytes in a mono PCM16 frame of `frame_ms` at `sample_rate`.
pub fn frame_bytes_for(sample_rate: u32, frame_ms: u64) -> usize {
    let samples = ((u64::from(sample_rate) * frame_ms) / 1000).max(1);
    samples as usize * 2
}
